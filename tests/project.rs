use std::fs;
use std::path::PathBuf;

use tempdir::TempDir;

use uncertainty_budget::config::Settings;
use uncertainty_budget::project::Project;
use uncertainty_budget::regression::{read_csv_file, FitError};
use uncertainty_budget::uncertainty::ResolveError;
use uncertainty_budget::units::Status;
use uncertainty_budget::{Error, Result};

const PROJECT: &str = r#"
equation = "y = c * r + offset"
calibration_points = ["2.0", "4.0"]

[result_units]
y = "mm"

[document]
number = "CAL-12"
name = "Displacement sensor"
version = "2"

[[document.revisions]]
version = "1"
description = "first issue"
author = "metrology"
date = "2024-03-01"

[[variables]]
name = "c"
type = "type_a"
description = "gain correction"
values."2.0" = { samples = [0.99, 1.0, 1.01] }
values."4.0" = { samples = [0.98, 1.0, 1.02] }

[[variables]]
name = "r"
type = "regression"
unit = "mm"

[variables.values."2.0"]
regression = "curve"
x_source = "point_name"
input_uncertainty = 0.01

[variables.values."4.0"]
regression = "curve"
x_source = "point_name"
input_uncertainty = 0.01
replicates = 3

[[variables]]
name = "offset"
type = "type_b"
distribution = "normal"
values."2.0" = { central_value = 0.0, half_width = 0.02, confidence = 0.95 }
values."4.0" = { central_value = 0.0, half_width = 0.02, confidence = 0.95 }

[regressions.curve]
description = "reference displacement"
mode = "direct"

[regressions.spare]
"#;

const CURVE: &str = "0, 1.01\n1, 2.98\n\n2, 5.02\n3, 7.0\n4, 8.99\n5, abc\n";

const SETTINGS: &str = r#"
confidence_level = 0.95

[rounding]
significant_digits = 2
mode = "half_up"

[monte_carlo]
samples = 20000
"#;

struct Workspace {
    _dir: TempDir,
    project: PathBuf,
    curve: PathBuf,
    settings: PathBuf,
}

fn create_workspace(test_name: &str) -> Workspace {
    let dir = TempDir::new(test_name).unwrap();
    let project = dir.path().join("project.toml");
    let curve = dir.path().join("curve.csv");
    let settings = dir.path().join("settings.toml");
    fs::write(&project, PROJECT).unwrap();
    fs::write(&curve, CURVE).unwrap();
    fs::write(&settings, SETTINGS).unwrap();
    Workspace {
        _dir: dir,
        project,
        curve,
        settings,
    }
}

/// Load the project and fit its calibration curve from the CSV file
fn load(workspace: &Workspace) -> Result<Project> {
    let mut project = Project::from_file(&workspace.project)?;
    let import = read_csv_file(&workspace.curve)?;
    assert_eq!(import.points.len(), 5);
    assert_eq!(import.errors.len(), 1);
    assert_eq!(import.errors[0].line, 7);

    project
        .regressions
        .get_mut("curve")
        .unwrap()
        .set_data(import.points);
    let failures = project.fit_regressions();
    assert_eq!(failures.len(), 1);
    let Error::Regression { name, source } = &failures[0] else {
        panic!("expected a regression failure, got {:?}", failures[0]);
    };
    assert_eq!(name, "spare");
    assert_eq!(*source, FitError::InsufficientData { found: 0 });
    Ok(project)
}

#[test]
fn budget_from_files() -> Result<()> {
    let workspace = create_workspace("budget_from_files");
    let project = load(&workspace)?;
    let settings = Settings::from_file(&workspace.settings)?;

    let budget = project.budget("y", "2.0", &settings)?;

    // Line through the data: slope 1.998, intercept 1.004
    approx::assert_relative_eq!(budget.central_value, 0.996 / 1.998, epsilon = 1e-9);
    assert_eq!(budget.unit, "mm");
    assert_eq!(budget.rows.len(), 3);
    assert_eq!(
        budget.rows.iter().map(|row| row.variable.as_str()).collect::<Vec<_>>(),
        vec!["c", "r", "offset"]
    );
    approx::assert_relative_eq!(
        budget.rows[2].standard_uncertainty,
        0.02 / 1.959_964,
        epsilon = 1e-6
    );
    approx::assert_relative_eq!(budget.rows[0].degrees_of_freedom, 2.0);
    assert!(budget.rows[1].degrees_of_freedom.is_finite());

    let total = budget
        .rows
        .iter()
        .map(|row| row.contribution_rate_percent)
        .sum::<f64>();
    approx::assert_relative_eq!(total, 100.0, epsilon = 1e-9);
    assert!(budget.effective_degrees_of_freedom.is_finite());
    assert!(budget.coverage_factor > 1.96);
    assert!(
        (budget.rounded_expanded_uncertainty - budget.expanded_uncertainty).abs()
            <= 0.05 * budget.expanded_uncertainty
    );

    assert_eq!(budget.regressions.len(), 1);
    assert_eq!(budget.regressions[0].name, "curve");
    assert_eq!(budget.regressions[0].count, 5);
    approx::assert_relative_eq!(budget.regressions[0].slope, 1.998, epsilon = 1e-9);
    assert!(budget.regressions[0].p_value.unwrap() < 1e-4);

    assert_eq!(budget.derivatives.len(), 3);
    assert_eq!(budget.derivatives[0].expression, "r");
    assert_eq!(budget.derivatives[1].expression, "c");
    assert_eq!(budget.derivatives[2].expression, "1");
    Ok(())
}

#[test]
fn every_pair_is_calculated() -> Result<()> {
    let workspace = create_workspace("every_pair_is_calculated");
    let project = load(&workspace)?;
    let outcomes = project.calculate_all(&Settings::default())?;

    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|outcome| outcome.budget.is_ok()));
    assert_eq!(project.unused_regressions(), vec!["spare"]);
    Ok(())
}

#[test]
fn replicates_reduce_the_regression_uncertainty() -> Result<()> {
    let workspace = create_workspace("replicates");
    let mut project = load(&workspace)?;
    assert!(project.refresh_variables().is_empty());

    let r = project.variable("r").unwrap();
    let single = r.resolved("2.0").unwrap();
    let averaged = r.resolved("4.0").unwrap();
    approx::assert_relative_eq!(single.central_value, 0.996 / 1.998, epsilon = 1e-9);
    approx::assert_relative_eq!(averaged.central_value, 2.996 / 1.998, epsilon = 1e-9);
    assert!(averaged.standard_uncertainty < single.standard_uncertainty);
    Ok(())
}

#[test]
fn unfitted_regressions_are_reported() {
    let workspace = create_workspace("unfitted");
    let project = Project::from_file(&workspace.project).unwrap();

    let error = project.calculate("y", "2.0", 0.95).unwrap_err();
    match error {
        Error::Resolve {
            variable,
            point,
            source: ResolveError::Fit { model, source },
        } => {
            assert_eq!(variable, "r");
            assert_eq!(point, "2.0");
            assert_eq!(model, "curve");
            assert_eq!(source, FitError::ModelNotFit);
        }
        other => panic!("expected an unfitted model, got {other:?}"),
    }
}

#[test]
fn monte_carlo_agrees_with_the_propagation_law() -> Result<()> {
    let workspace = create_workspace("monte_carlo");
    let project = load(&workspace)?;
    let settings = Settings::from_file(&workspace.settings)?;

    let budget = project.budget("y", "2.0", &settings)?;
    let summary = project.monte_carlo("y", "2.0", &settings)?;

    assert_eq!(summary.requested, 20_000);
    assert_eq!(summary.accepted, 20_000);
    approx::assert_relative_eq!(summary.mean, budget.central_value, epsilon = 2e-3);
    approx::assert_relative_eq!(
        summary.standard_deviation,
        budget.combined_standard_uncertainty,
        max_relative = 0.1
    );
    assert!(summary.coverage_interval.0 < budget.central_value);
    assert!(summary.coverage_interval.1 > budget.central_value);

    let again = project.monte_carlo("y", "2.0", &settings)?;
    assert_eq!(summary, again);
    Ok(())
}

#[test]
fn units_are_checked_against_the_model() -> Result<()> {
    let workspace = create_workspace("units");
    let project = Project::from_file(&workspace.project)?;
    let report = project.check_units()?;

    let statuses = report
        .variables
        .iter()
        .map(|check| (check.name.as_str(), check.status))
        .collect::<Vec<_>>();
    assert_eq!(
        statuses,
        vec![
            ("y", Status::Ok),
            ("c", Status::Warn),
            ("r", Status::Ok),
            ("offset", Status::Warn),
        ]
    );
    assert_eq!(report.equations.len(), 1);
    assert_eq!(report.equations[0].status, Status::Error);
    assert_eq!(report.equations[0].message, "unit of 'c' is unresolved");
    assert!(!report.is_consistent());
    Ok(())
}
