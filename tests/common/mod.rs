//! Shared test utilities for integration and E2E tests.
//!
//! `Kr8Fixture` lays out a small kr8 project in a temp directory:
//!
//! ```text
//! clusters/
//!   params.jsonnet              _kr8_spec + _components (web, db)
//!   dev/cluster.jsonnet         tier dev, region us
//!   eu/params.jsonnet           region eu
//!   eu/prod-eu/cluster.jsonnet  tier prod, web.replicas = 3
//! components/
//!   web/  params.jsonnet deploy.jsonnet motd.tpl
//!   db/   params.jsonnet db.yml
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! let fixture = Kr8Fixture::standard();
//! let report = fixture.generate();
//! assert_eq!(report.cache_hits(), 0);
//! ```

use assert_fs::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use kr8::evaluator::LayeredEvaluator;
use kr8::phases::{ComponentOutcome, Engine, RunReport};
use kr8::settings::EngineSettings;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::{outcome, project, Kr8Fixture};
}

/// Standard project files
pub mod project {
    pub const ROOT_PARAMS: &str = r#"{
  "_kr8_spec": {"generate_dir": "generated"},
  "_components": {
    "web": {"path": "components/web"},
    "db": {"path": "components/db"}
  }
}"#;

    pub const EU_PARAMS: &str = r#"{"_cluster": {"region": "eu"}}"#;

    pub const DEV_CLUSTER: &str = r#"{"_cluster": {"tier": "dev", "region": "us"}}"#;

    pub const PROD_EU_CLUSTER: &str = r#"{"_cluster": {"tier": "prod"}, "web": {"replicas": 3}}"#;

    pub const WEB_PARAMS: &str = r#"{
  "kr8_spec": {
    "includes": ["deploy.jsonnet", {"file": "motd.tpl", "dest_ext": "txt"}]
  },
  "replicas": 1,
  "image": "nginx"
}"#;

    pub const WEB_DEPLOY: &str = r#"{
  "kind": "Deployment",
  "image": {"$var": "kr8", "path": "image"},
  "replicas": {"$var": "kr8", "path": "replicas"}
}"#;

    pub const WEB_MOTD: &str = "web in {{ kr8_cluster.cluster_name }} ({{ kr8_cluster.region }})\n";

    pub const DB_PARAMS: &str = r#"{"kr8_spec": {"includes": "db.yml"}, "size": "small"}"#;

    pub const DB_MANIFEST: &str = "kind: StatefulSet\nsize: small\n";
}

/// A kr8 project in a temporary directory.
pub struct Kr8Fixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl Kr8Fixture {
    /// An empty project directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// The standard two-cluster, two-component project.
    pub fn standard() -> Self {
        Self::new()
            .with_file("clusters/params.jsonnet", project::ROOT_PARAMS)
            .with_file("clusters/dev/cluster.jsonnet", project::DEV_CLUSTER)
            .with_file("clusters/eu/params.jsonnet", project::EU_PARAMS)
            .with_file("clusters/eu/prod-eu/cluster.jsonnet", project::PROD_EU_CLUSTER)
            .with_file("components/web/params.jsonnet", project::WEB_PARAMS)
            .with_file("components/web/deploy.jsonnet", project::WEB_DEPLOY)
            .with_file("components/web/motd.tpl", project::WEB_MOTD)
            .with_file("components/db/params.jsonnet", project::DB_PARAMS)
            .with_file("components/db/db.yml", project::DB_MANIFEST)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.write(path, content);
        self
    }

    /// Create or replace a file.
    pub fn write(&self, path: &str, content: &str) {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
    }

    pub fn read(&self, path: &str) -> String {
        fs::read_to_string(self.path().join(path))
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.path().join(path).exists()
    }

    pub fn remove(&self, path: &str) {
        fs::remove_file(self.path().join(path)).expect("Failed to remove file");
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn join(&self, path: &str) -> PathBuf {
        self.path().join(path)
    }

    /// A path inside the project, for `assert_fs` assertions.
    pub fn child_path(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Default engine settings for this project.
    pub fn settings(&self) -> EngineSettings {
        EngineSettings::new(self.path()).with_parallelism(2, 2)
    }

    pub fn engine(&self, settings: EngineSettings) -> Engine {
        Engine::new(settings, Arc::new(LayeredEvaluator::new()))
    }

    /// Run `generate` with the default settings.
    pub fn generate(&self) -> RunReport {
        self.generate_with(self.settings())
    }

    pub fn generate_with(&self, settings: EngineSettings) -> RunReport {
        self.engine(settings)
            .generate()
            .expect("generate failed at run level")
    }

    /// Create a command running the kr8 binary against this project.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("kr8");
        cmd.current_dir(self.path())
            .arg("--base")
            .arg(self.path())
            .arg("--color")
            .arg("never");
        cmd
    }
}

impl Default for Kr8Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome lookups on a report
#[allow(dead_code)]
pub mod outcome {
    use super::*;

    pub fn of<'a>(report: &'a RunReport, cluster: &str, component: &str) -> &'a ComponentOutcome {
        &report
            .cluster(cluster)
            .unwrap_or_else(|| panic!("no report for cluster {}", cluster))
            .component(component)
            .unwrap_or_else(|| panic!("no report for {}/{}", cluster, component))
            .outcome
    }

    pub fn is_generated(report: &RunReport, cluster: &str, component: &str) -> bool {
        matches!(of(report, cluster, component), ComponentOutcome::Generated { .. })
    }

    pub fn is_cached(report: &RunReport, cluster: &str, component: &str) -> bool {
        matches!(of(report, cluster, component), ComponentOutcome::Cached)
    }

    pub fn is_failed(report: &RunReport, cluster: &str, component: &str) -> bool {
        matches!(of(report, cluster, component), ComponentOutcome::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_fixture_layout() {
        let fixture = Kr8Fixture::standard();
        assert!(fixture.exists("clusters/dev/cluster.jsonnet"));
        assert!(fixture.exists("components/web/motd.tpl"));
    }

    #[test]
    fn test_project_files_are_valid_json() {
        for content in [
            project::ROOT_PARAMS,
            project::EU_PARAMS,
            project::DEV_CLUSTER,
            project::PROD_EU_CLUSTER,
            project::WEB_PARAMS,
            project::WEB_DEPLOY,
            project::DB_PARAMS,
        ] {
            serde_json::from_str::<serde_json::Value>(content).expect("fixture should be JSON");
        }
    }
}
