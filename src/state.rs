use std::fs::OpenOptions;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::config::RepairConfig;
use crate::document::DocumentSet;
use crate::error::{RepairError, Result};
use crate::runner::Compiler;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S%3f";

/// Fixed layout of the build directory a session writes into.
#[derive(Debug, Clone)]
pub struct BuildDirectory {
    root: Utf8PathBuf,
}

impl BuildDirectory {
    pub fn create(root: impl Into<Utf8PathBuf>) -> Result<Self> {
        let build = Self { root: root.into() };
        let patches = build.patches_dir();
        std::fs::create_dir_all(&patches).map_err(|e| RepairError::io(patches.as_std_path(), e))?;
        Ok(build)
    }

    /// A view of an existing directory, for reading a past session.
    pub fn open(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub fn log_path(&self) -> Utf8PathBuf {
        self.root.join("log")
    }

    pub fn patches_dir(&self) -> Utf8PathBuf {
        self.root.join("patches")
    }

    pub fn summary_path(&self) -> Utf8PathBuf {
        self.root.join("summary.json")
    }

    pub fn patch_path(&self, candidate: usize, generation: usize, timestamp: &str) -> Utf8PathBuf {
        self.patches_dir()
            .join(format!("Candidate{candidate}_Generation{generation}_{timestamp}"))
    }

    pub fn classes_dir(&self, candidate: usize, generation: usize, timestamp: &str) -> Utf8PathBuf {
        self.root
            .join(format!("classes_Candidate{candidate}_Generation{generation}_{timestamp}"))
    }

    /// Append one attempted mutation to `<build>/log`. Failures propagate.
    pub fn append_log(&self, text: &str) -> Result<()> {
        let path = self.log_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RepairError::io(path.as_std_path(), e))?;
        writeln!(file, "{text}").map_err(|e| RepairError::io(path.as_std_path(), e))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchArtifact {
    pub candidate: usize,
    pub generation: usize,
    pub timestamp: String,
    pub mutations: Vec<String>,
    pub patch_file: Utf8PathBuf,
    pub compiled: Option<Utf8PathBuf>,
    pub diff: String,
}

/// Persists successful repairs. Best effort: write failures are logged and
/// never abort the search.
pub struct PatchRecorder {
    build: BuildDirectory,
    recorded: Vec<PatchArtifact>,
}

impl PatchRecorder {
    pub fn new(build: BuildDirectory) -> Self {
        Self {
            build,
            recorded: Vec::new(),
        }
    }

    pub fn build(&self) -> &BuildDirectory {
        &self.build
    }

    pub fn recorded(&self) -> &[PatchArtifact] {
        &self.recorded
    }

    pub fn into_recorded(self) -> Vec<PatchArtifact> {
        self.recorded
    }

    pub fn record(
        &mut self,
        candidate: usize,
        generation: usize,
        patches: &[String],
        documents: &DocumentSet,
        compiler: &dyn Compiler,
    ) -> Option<PatchArtifact> {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let patch_file = self.build.patch_path(candidate, generation, &timestamp);

        let mut body = String::new();
        for patch in patches {
            body.push_str(patch);
            body.push('\n');
        }
        if let Err(e) = std::fs::write(&patch_file, body) {
            log::warn!("could not write patch {patch_file}: {e}");
            return None;
        }

        let classes = self.build.classes_dir(candidate, generation, &timestamp);
        let compiled = match compiler.store_compiled(documents, classes.as_std_path()) {
            Ok(()) => Some(classes),
            Err(e) => {
                log::warn!("could not store compiled output for {patch_file}: {e}");
                None
            }
        };

        let artifact = PatchArtifact {
            candidate,
            generation,
            timestamp,
            mutations: patches.to_vec(),
            patch_file: patch_file.clone(),
            compiled,
            diff: documents.diff(),
        };
        let sidecar = patch_file.with_extension("json");
        match serde_json::to_string_pretty(&artifact) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&sidecar, json) {
                    log::warn!("could not write {sidecar}: {e}");
                }
            }
            Err(e) => log::warn!("could not serialize {sidecar}: {e}"),
        }

        log::info!("recorded patch {patch_file}");
        self.recorded.push(artifact.clone());
        Some(artifact)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub config: RepairConfig,
    pub started: String,
    pub candidates_run: usize,
    pub candidates_failed: usize,
    pub compilations: usize,
    pub test_runs: usize,
    pub patches: Vec<PatchArtifact>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn save(&self, build: &BuildDirectory) -> Result<()> {
        let path = build.summary_path();
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| RepairError::Setup(format!("could not serialize summary: {e}")))?;
        std::fs::write(&path, json).map_err(|e| RepairError::io(path.as_std_path(), e))
    }
}

pub fn load_summary(build: &BuildDirectory) -> Option<RunSummary> {
    let data = std::fs::read_to_string(build.summary_path()).ok()?;
    serde_json::from_str(&data).ok()
}
