//! Aggregation of per-module artifacts into one report configuration.
//!
//! This module wires the trigger, threshold resolution and file collection
//! together, then submits the result to the report engine. A configuration
//! that fails to assemble is never submitted.

use super::thresholds;
use crate::config::Config;
use crate::error::{AggregationError, IoOperation};
use crate::models::{
    AggregatedConfig, AggregatedConfigBuilder, DiffSource, ExecDataLocator, ReportsConfig,
};
use crate::reactor::{is_last_module, BuildGraph};
use crate::report::ReportEngine;
use crate::scanner;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Report output directory, relative to the top-level project.
pub const OUTPUT_DIR: &str = "target/diffCoverage";

/// Run aggregation if `current_module` is the last module of the build.
///
/// Returns `Ok(None)` without side effects for every other module.
pub fn execute(
    graph: &dyn BuildGraph,
    current_module: &str,
    config: &Config,
    engine: &dyn ReportEngine,
) -> Result<Option<AggregatedConfig>, AggregationError> {
    if !is_last_module(graph.sorted_modules(), current_module) {
        debug!("{} is not the last module, skipping aggregation", current_module);
        return Ok(None);
    }

    let aggregated = run(graph, current_module, config)?;
    invoke(engine, &aggregated)?;
    Ok(Some(aggregated))
}

/// Assemble the aggregated configuration.
pub fn run(
    graph: &dyn BuildGraph,
    current_module: &str,
    config: &Config,
) -> Result<AggregatedConfig, AggregationError> {
    let root_dir = graph.top_level_dir();
    let modules = graph.sorted_modules();

    let report_dir = output_dir(root_dir);
    create_dir(&report_dir)?;

    let diff_source = DiffSource::select(
        root_dir,
        config.diff_source.file.as_deref(),
        config.diff_source.url.as_deref(),
        config.diff_source.git.as_deref(),
    );

    let violations = &config.violations;
    let thresholds = thresholds::resolve(
        violations.min_coverage,
        violations.per_metric(),
        violations.fail_on_violation,
    )?;

    // Data file defaults are relative to the module running the aggregation
    let module_dir = modules
        .iter()
        .find(|m| m.has_id(current_module))
        .map(|m| m.base_dir.as_path())
        .unwrap_or(root_dir);
    let locator = ExecDataLocator::new(
        config.data_file.resolved_path(module_dir),
        config.data_file.includes.as_deref(),
        config.data_file.excludes.as_deref(),
    );

    let exec_files = scanner::collect_exec_files(root_dir, &locator)?;
    let class_files = scanner::collect_class_files(modules, &config.classes.file_set())?;
    let source_dirs = scanner::collect_source_dirs(modules);

    debug!("Classes dirs: {:?}", class_files);
    debug!("Sources: {:?}", source_dirs);
    debug!("Exec files: {:?}", exec_files);

    let reports = ReportsConfig::new(
        report_dir,
        config.reports.html,
        config.reports.csv,
        config.reports.xml,
    );

    let aggregated = AggregatedConfigBuilder::new(config.report_name.clone(), reports)
        .diff_source(diff_source)
        .thresholds(thresholds)
        .exec_files(exec_files)
        .class_files(class_files)
        .source_dirs(source_dirs)
        .build()?;

    info!(
        "Aggregated {} modules: {} class entries, {} source dirs, {} exec files",
        modules.len(),
        aggregated.class_files().len(),
        aggregated.source_dirs().len(),
        aggregated.exec_files().len()
    );
    Ok(aggregated)
}

/// Persist the diff snapshot, then generate reports.
pub fn invoke(engine: &dyn ReportEngine, config: &AggregatedConfig) -> Result<(), AggregationError> {
    let report_dir = &config.reports().base_report_dir;
    create_dir(report_dir)?;

    let saved = engine
        .save_diff_to_dir(config, report_dir)
        .map_err(AggregationError::Engine)?;
    info!("Diff content saved to '{}'", saved.display());

    engine.create(config).map_err(AggregationError::Engine)?;
    info!("Diff coverage report generated in {}", report_dir.display());
    Ok(())
}

fn create_dir(dir: &Path) -> Result<(), AggregationError> {
    fs::create_dir_all(dir).map_err(|e| AggregationError::filesystem(dir, IoOperation::CreateDir, e))
}

/// Output directory for a given top-level project.
pub fn output_dir(root_dir: &Path) -> PathBuf {
    root_dir.join(OUTPUT_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BuildModule;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct TestGraph {
        root: PathBuf,
        modules: Vec<BuildModule>,
    }

    impl BuildGraph for TestGraph {
        fn sorted_modules(&self) -> &[BuildModule] {
            &self.modules
        }

        fn top_level_dir(&self) -> &Path {
            &self.root
        }
    }

    #[derive(Default)]
    struct RecordingEngine {
        calls: RefCell<Vec<String>>,
        fail_save: bool,
    }

    impl ReportEngine for RecordingEngine {
        fn save_diff_to_dir(&self, _config: &AggregatedConfig, dir: &Path) -> anyhow::Result<PathBuf> {
            self.calls.borrow_mut().push("save_diff".to_string());
            if self.fail_save {
                anyhow::bail!("diff unavailable");
            }
            Ok(dir.join("diff.patch"))
        }

        fn create(&self, _config: &AggregatedConfig) -> anyhow::Result<()> {
            self.calls.borrow_mut().push("create".to_string());
            Ok(())
        }
    }

    fn graph(root: &Path) -> TestGraph {
        let module = |id: &str| {
            let base = root.join(id);
            BuildModule::new(
                id,
                base.clone(),
                base.join("target/classes"),
                vec![base.join("src/main/java")],
            )
        };
        TestGraph {
            root: root.to_path_buf(),
            modules: vec![module("api"), module("core"), module("web")],
        }
    }

    fn config_with_git() -> Config {
        let mut config = Config::default();
        config.diff_source.git = Some("origin/main".to_string());
        config
    }

    #[test]
    fn test_non_last_module_does_nothing() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine::default();

        let result = execute(&graph(temp.path()), "core", &config_with_git(), &engine).unwrap();

        assert!(result.is_none());
        assert!(engine.calls.borrow().is_empty());
        assert!(!output_dir(temp.path()).exists());
    }

    #[test]
    fn test_last_module_aggregates_and_invokes_engine() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine::default();

        let aggregated = execute(&graph(temp.path()), "WEB", &config_with_git(), &engine)
            .unwrap()
            .unwrap();

        assert_eq!(*engine.calls.borrow(), vec!["save_diff", "create"]);
        assert!(output_dir(temp.path()).is_dir());
        assert_eq!(aggregated.class_files().len(), 3);
        assert_eq!(aggregated.source_dirs().len(), 3);
        assert_eq!(
            aggregated.exec_files().iter().collect::<Vec<_>>(),
            vec![&temp.path().join("web/target/jacoco.exec")]
        );
        assert_eq!(
            aggregated.diff_source(),
            &DiffSource::Revision("origin/main".to_string())
        );
        assert_eq!(aggregated.reports().base_report_dir, output_dir(temp.path()));
    }

    #[test]
    fn test_empty_class_files_never_reach_engine() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine::default();
        let mut config = config_with_git();
        config.classes.includes = vec!["com/**".to_string()];

        let err = execute(&graph(temp.path()), "web", &config, &engine).unwrap_err();

        assert!(matches!(err, AggregationError::EmptyResult { .. }));
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn test_threshold_conflict_never_reaches_engine() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine::default();
        let mut config = config_with_git();
        config.violations.min_coverage = 0.8;
        config.violations.min_lines = 0.5;

        let err = execute(&graph(temp.path()), "web", &config, &engine).unwrap_err();

        assert!(err.to_string().contains("minLines = 0.5"));
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn test_unwritable_report_dir_never_reaches_engine() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("target"), b"not a directory").unwrap();
        let engine = RecordingEngine::default();

        let err = execute(&graph(temp.path()), "web", &config_with_git(), &engine).unwrap_err();

        match err {
            AggregationError::Filesystem {
                path, operation, ..
            } => {
                assert_eq!(path, output_dir(temp.path()));
                assert_eq!(operation, IoOperation::CreateDir);
            }
            other => panic!("expected filesystem error, got {:?}", other),
        }
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn test_engine_failure_stops_generation() {
        let temp = TempDir::new().unwrap();
        let engine = RecordingEngine {
            fail_save: true,
            ..RecordingEngine::default()
        };

        let err = execute(&graph(temp.path()), "web", &config_with_git(), &engine).unwrap_err();

        assert!(matches!(err, AggregationError::Engine(_)));
        assert_eq!(*engine.calls.borrow(), vec!["save_diff"]);
    }

    #[test]
    fn test_filtered_classes_and_globbed_exec_files() {
        let temp = TempDir::new().unwrap();
        let g = graph(temp.path());
        for rel in [
            "core/target/classes/com/acme/Core.class",
            "web/target/classes/com/acme/Web.class",
            "web/target/classes/com/acme/WebTest.class",
            "core/target/jacoco.exec",
            "web/target/jacoco.exec",
        ] {
            let path = temp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, b"x").unwrap();
        }

        let mut config = config_with_git();
        config.classes.includes = vec!["com/**".to_string()];
        config.classes.excludes = vec!["**/*Test.class".to_string()];
        config.data_file.includes = Some("**/target/*.exec".to_string());
        config.violations.min_coverage = 0.9;

        let aggregated = run(&g, "web", &config).unwrap();

        assert_eq!(aggregated.class_files().len(), 2);
        assert!(aggregated
            .class_files()
            .contains(&temp.path().join("core/target/classes/com/acme/Core.class")));
        assert_eq!(aggregated.exec_files().len(), 2);
        assert_eq!(aggregated.thresholds().min_branches, 0.9);
    }

    #[test]
    fn test_diff_file_resolved_against_root() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.diff_source.file = Some(PathBuf::from("changes.patch"));
        config.diff_source.git = Some("HEAD".to_string());

        let aggregated = run(&graph(temp.path()), "web", &config).unwrap();

        assert_eq!(
            aggregated.diff_source(),
            &DiffSource::File(temp.path().join("changes.patch"))
        );
    }
}
