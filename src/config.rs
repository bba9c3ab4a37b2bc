use std::time::Duration;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::{RepairError, Result};
use crate::operators::MutationPolicy;
use crate::search::{RecursionPolicy, SearchSettings};

/// Validated session configuration. Echoed into `summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairConfig {
    pub sources: Vec<Utf8PathBuf>,
    pub classpath: Vec<Utf8PathBuf>,
    pub faulty_coverage: Utf8PathBuf,
    pub seed_coverage: Utf8PathBuf,
    pub candidates: usize,
    pub generations: usize,
    pub attempts: usize,
    pub seed: u64,
    pub build_dir: Utf8PathBuf,
    pub build_cmd: Option<String>,
    pub test_cmd: String,
    pub artifacts: Option<Utf8PathBuf>,
    pub timeout_secs: Option<u64>,
    pub mutation: MutationPolicy,
    pub recursion: RecursionPolicy,
    pub scope_gate: bool,
}

impl RepairConfig {
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            return Err(RepairError::Config("at least one --source is required".into()));
        }
        for (name, value) in [
            ("candidates", self.candidates),
            ("generations", self.generations),
            ("attempts", self.attempts),
        ] {
            if value == 0 {
                return Err(RepairError::Config(format!("--{name} must be at least 1")));
            }
        }
        for path in self.sources.iter().chain([&self.faulty_coverage, &self.seed_coverage]) {
            if !path.exists() {
                return Err(RepairError::Config(format!("{path} does not exist")));
            }
        }
        if self.test_cmd.trim().is_empty() {
            return Err(RepairError::Config("--test-cmd must not be empty".into()));
        }
        if self.timeout_secs == Some(0) {
            return Err(RepairError::Config("--timeout-secs must be positive".into()));
        }
        if self.artifacts.is_some() && self.build_cmd.is_none() {
            return Err(RepairError::Config("--artifacts needs a --build-cmd".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn settings(&self, quiet: bool) -> SearchSettings {
        SearchSettings {
            candidates: self.candidates,
            generations: self.generations,
            attempts: self.attempts,
            policy: self.mutation,
            recursion: self.recursion,
            scope_gate: self.scope_gate,
            quiet,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> RepairConfig {
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::write(root.join("app.py"), "x = 1\n").unwrap();
        std::fs::write(root.join("faulty.json"), "[]").unwrap();
        std::fs::write(root.join("seed.json"), "[]").unwrap();
        RepairConfig {
            sources: vec![root.join("app.py")],
            classpath: vec![],
            faulty_coverage: root.join("faulty.json"),
            seed_coverage: root.join("seed.json"),
            candidates: 2,
            generations: 2,
            attempts: 3,
            seed: 1,
            build_dir: root.join("build"),
            build_cmd: None,
            test_cmd: "true".into(),
            artifacts: None,
            timeout_secs: None,
            mutation: MutationPolicy::Random,
            recursion: RecursionPolicy::Always,
            scope_gate: false,
        }
    }

    #[test]
    fn accepts_a_complete_config() {
        let dir = TempDir::new().unwrap();
        assert!(config(&dir).validate().is_ok());
    }

    #[test]
    fn rejects_zero_budgets() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.attempts = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("--attempts"));
    }

    #[test]
    fn rejects_missing_coverage() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.seed_coverage = cfg.seed_coverage.with_file_name("missing.json");
        assert!(matches!(cfg.validate(), Err(RepairError::Config(_))));
    }

    #[test]
    fn artifacts_need_a_build_command() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.artifacts = Some("out".into());
        assert!(cfg.validate().is_err());
        cfg.build_cmd = Some("make".into());
        assert!(cfg.validate().is_ok());
    }
}
