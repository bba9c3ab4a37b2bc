use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use camino::Utf8PathBuf;

use crate::copy_tree;
use crate::document::DocumentSet;
use crate::error::{RepairError, Result};

pub const COMPILE_OK: i32 = 0;
pub const COMPILE_FAILED: i32 = -1;
pub const TESTS_PASSED: i32 = 1;
pub const TESTS_FAILED: i32 = 0;
pub const TESTS_ERROR: i32 = -1;

/// Builds the program from the current document texts.
///
/// `compile` returns a status: negative is a compile failure, zero or
/// positive is success. `Err` means the compiler itself could not run.
pub trait Compiler {
    fn set_context(
        &mut self,
        documents: &DocumentSet,
        sourcepaths: &[Utf8PathBuf],
        classpaths: &[Utf8PathBuf],
    ) -> Result<()>;
    fn compile(&mut self, documents: &DocumentSet) -> Result<i32>;
    fn store_compiled(&self, documents: &DocumentSet, destination: &Path) -> Result<()>;
}

/// Runs the test suite against the last compiled program.
/// Positive: tests passed, zero: tests ran but did not pass, negative: error.
pub trait TestRunner {
    fn run_tests(&mut self) -> Result<i32>;
}

/// Treats "parses without errors" as "compiles".
#[derive(Debug, Default)]
pub struct SyntaxCompiler;

impl Compiler for SyntaxCompiler {
    fn set_context(&mut self, _: &DocumentSet, _: &[Utf8PathBuf], _: &[Utf8PathBuf]) -> Result<()> {
        Ok(())
    }

    fn compile(&mut self, documents: &DocumentSet) -> Result<i32> {
        let broken = documents.iter().find(|(_, doc)| doc.has_syntax_errors());
        Ok(match broken {
            Some((_, doc)) => {
                log::debug!("{} has syntax errors", doc.path());
                COMPILE_FAILED
            }
            None => COMPILE_OK,
        })
    }

    /// Writes the current sources under `destination`, laid out by package.
    fn store_compiled(&self, documents: &DocumentSet, destination: &Path) -> Result<()> {
        for (_, doc) in documents.iter() {
            let mut target = destination.join(doc.package().replace('.', "/"));
            if let Some(ext) = doc.path().extension() {
                target.set_extension(ext);
            }
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| RepairError::io(parent, e))?;
            }
            std::fs::write(&target, doc.current()).map_err(|e| RepairError::io(&target, e))?;
        }
        Ok(())
    }
}

/// Isolated copy of the project the build and test commands run in.
/// The original sources are never modified.
pub struct Workspace {
    root: PathBuf,
    project_root: PathBuf,
    _temp_dir: tempfile::TempDir,
}

impl Workspace {
    pub fn isolated(project_root: &Path, session_id: &str) -> Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("rsrepair-{}-", session_id))
            .tempdir()
            .map_err(|e| RepairError::Setup(format!("failed to create temp directory: {e}")))?;
        copy_tree::copy_project(project_root, temp_dir.path())
            .map_err(|e| RepairError::Setup(format!("failed to copy project tree: {e}")))?;
        Ok(Self {
            root: temp_dir.path().to_path_buf(),
            project_root: project_root.to_path_buf(),
            _temp_dir: temp_dir,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a file of the original project lives inside the copy.
    pub fn map_path(&self, original: &Path) -> Result<PathBuf> {
        let relative = original.strip_prefix(&self.project_root).map_err(|_| {
            RepairError::Setup(format!(
                "{} is outside the project root {}",
                original.display(),
                self.project_root.display()
            ))
        })?;
        Ok(self.root.join(relative))
    }
}

/// Writes changed documents into the workspace and runs a build command.
/// Without a build command the documents are written and syntax-checked.
pub struct CommandCompiler {
    workspace: Workspace,
    build_cmd: Option<String>,
    artifacts: Option<PathBuf>,
    timeout: Option<Duration>,
    targets: Vec<PathBuf>,
    written: Vec<Option<u64>>,
    env: Vec<(String, String)>,
}

impl CommandCompiler {
    pub fn new(workspace: Workspace, build_cmd: Option<&str>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            workspace,
            build_cmd: build_cmd.map(|cmd| resolve_cmd(cmd, &cwd)),
            artifacts: None,
            timeout: None,
            targets: Vec::new(),
            written: Vec::new(),
            env: Vec::new(),
        }
    }

    /// Directory, relative to the project root, holding the build output.
    pub fn with_artifacts(mut self, artifacts: Option<PathBuf>) -> Self {
        self.artifacts = artifacts;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    fn write_changed(&mut self, documents: &DocumentSet) -> Result<()> {
        for (id, doc) in documents.iter() {
            let Some(target) = self.targets.get(id.0) else {
                return Err(RepairError::Collaborator(format!(
                    "{} was not part of the compiler context",
                    doc.path()
                )));
            };
            if self.written[id.0] == Some(doc.revision()) {
                continue;
            }
            std::fs::write(target, doc.current()).map_err(|e| RepairError::io(target, e))?;
            self.written[id.0] = Some(doc.revision());
        }
        Ok(())
    }
}

impl Compiler for CommandCompiler {
    fn set_context(
        &mut self,
        documents: &DocumentSet,
        sourcepaths: &[Utf8PathBuf],
        classpaths: &[Utf8PathBuf],
    ) -> Result<()> {
        self.targets = documents
            .iter()
            .map(|(_, doc)| self.workspace.map_path(doc.path().as_std_path()))
            .collect::<Result<_>>()?;
        // Unmodified files are already in place from the tree copy.
        self.written = documents.iter().map(|(_, doc)| Some(doc.revision())).collect();

        let sources: Vec<String> = sourcepaths
            .iter()
            .map(|p| {
                std::fs::canonicalize(p)
                    .ok()
                    .and_then(|c| self.workspace.map_path(&c).ok())
                    .map(|m| m.display().to_string())
                    .unwrap_or_else(|| p.to_string())
            })
            .collect();
        let classes: Vec<String> = classpaths.iter().map(|p| p.to_string()).collect();
        self.env = vec![
            ("RSREPAIR_SOURCEPATH".to_string(), sources.join(":")),
            ("RSREPAIR_CLASSPATH".to_string(), classes.join(":")),
        ];
        Ok(())
    }

    fn compile(&mut self, documents: &DocumentSet) -> Result<i32> {
        self.write_changed(documents)?;
        let Some(build_cmd) = &self.build_cmd else {
            return SyntaxCompiler.compile(documents);
        };
        let outcome = run_command(build_cmd, self.workspace.root(), &self.env, self.timeout)
            .map_err(|e| RepairError::Collaborator(format!("failed to run {build_cmd}: {e}")))?;
        Ok(match outcome {
            CommandOutcome::Success { .. } => COMPILE_OK,
            CommandOutcome::Failed { output, .. } => {
                log::debug!("build failed:\n{output}");
                COMPILE_FAILED
            }
            CommandOutcome::TimedOut => {
                log::warn!("build timed out: {build_cmd}");
                COMPILE_FAILED
            }
        })
    }

    fn store_compiled(&self, _: &DocumentSet, destination: &Path) -> Result<()> {
        let source = match &self.artifacts {
            Some(dir) => self.workspace.root().join(dir),
            None => self.workspace.root().to_path_buf(),
        };
        copy_tree::copy_project(&source, destination)
    }
}

/// Runs a test command in the workspace.
pub struct CommandTestRunner {
    test_cmd: String,
    working_dir: PathBuf,
    timeout: Option<Duration>,
}

impl CommandTestRunner {
    pub fn new(test_cmd: &str, working_dir: &Path, timeout: Option<Duration>) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            test_cmd: resolve_cmd(test_cmd, &cwd),
            working_dir: working_dir.to_path_buf(),
            timeout,
        }
    }
}

impl TestRunner for CommandTestRunner {
    fn run_tests(&mut self) -> Result<i32> {
        let outcome = run_command(&self.test_cmd, &self.working_dir, &[], self.timeout)
            .map_err(|e| RepairError::TestExecution(format!("failed to run {}: {e}", self.test_cmd)))?;
        Ok(match outcome {
            CommandOutcome::Success { .. } => TESTS_PASSED,
            CommandOutcome::Failed { output, .. } => {
                log::debug!("tests failed:\n{output}");
                TESTS_FAILED
            }
            CommandOutcome::TimedOut => TESTS_ERROR,
        })
    }
}

#[derive(Debug)]
pub enum CommandOutcome {
    Success { duration_ms: u64 },
    Failed { output: String, duration_ms: u64 },
    TimedOut,
}

pub fn parse_command(cmd: &str) -> (String, Vec<String>) {
    let parts: Vec<&str> = cmd.split_whitespace().collect();
    if parts.len() > 1 {
        (parts[0].to_string(), parts[1..].iter().map(|s| s.to_string()).collect())
    } else {
        (cmd.to_string(), vec![])
    }
}

/// Make a relative program path (`.venv/bin/pytest`) absolute so it still
/// works from inside the workspace copy.
fn resolve_cmd(cmd: &str, cwd: &Path) -> String {
    let (program, args) = parse_command(cmd);
    let p = Path::new(&program);
    if p.is_absolute() || !program.contains('/') {
        return cmd.to_string();
    }
    let from_cwd = cwd.join(p);
    if !from_cwd.exists() {
        return cmd.to_string();
    }
    let mut resolved = from_cwd.to_string_lossy().to_string();
    for arg in args {
        resolved.push(' ');
        resolved.push_str(&arg);
    }
    resolved
}

/// Run `cmd` to completion or until `timeout`, capturing combined output.
pub fn run_command(
    cmd: &str,
    working_dir: &Path,
    env: &[(String, String)],
    timeout: Option<Duration>,
) -> std::io::Result<CommandOutcome> {
    let start = Instant::now();
    let (program, args) = parse_command(cmd);
    // A file rather than a pipe, so a chatty child never blocks on a full buffer.
    let mut log_file: File = tempfile::tempfile()?;
    let mut child = Command::new(&program)
        .args(&args)
        .current_dir(working_dir)
        .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::null())
        .stdout(Stdio::from(log_file.try_clone()?))
        .stderr(Stdio::from(log_file.try_clone()?))
        .spawn()?;

    let status = loop {
        match child.try_wait()? {
            Some(status) => break status,
            None => {
                if timeout.is_some_and(|t| start.elapsed() > t) {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Ok(CommandOutcome::TimedOut);
                }
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    if status.success() {
        return Ok(CommandOutcome::Success { duration_ms });
    }
    let mut output = Vec::new();
    log_file.seek(SeekFrom::Start(0))?;
    log_file.read_to_end(&mut output)?;
    Ok(CommandOutcome::Failed {
        output: String::from_utf8_lossy(&output).into_owned(),
        duration_ms,
    })
}
