use rsrepair::config::RepairConfig;
use rsrepair::copy_tree;
use rsrepair::coverage::LineCoverage;
use rsrepair::document::DocumentSet;
use rsrepair::operators::MutationPolicy;
use rsrepair::output;
use rsrepair::pool::StatementPool;
use rsrepair::runner::{CommandCompiler, CommandTestRunner, Compiler, Workspace};
use rsrepair::scope::ScopeValidator;
use rsrepair::search::{Collaborators, RecursionPolicy, SearchController};
use rsrepair::state::{self, BuildDirectory, PatchRecorder, RunSummary};
use rsrepair::RepairError;

use std::process;
use std::time::Instant;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rsrepair", version, about = "Randomized mutation search for program repair")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a patch that makes the tests pass
    Repair(SessionArgs),
    /// Compile and test the unmodified program once under a null mutation
    Probe(SessionArgs),
    /// Summary of the last session in a build directory
    Status {
        #[arg(long, env = "RSREPAIR_BUILD_DIR", default_value = "rsrepair-build")]
        build_dir: Utf8PathBuf,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Source file or directory (repeatable)
    #[arg(long = "source", env = "RSREPAIR_SOURCE", value_delimiter = ',', required = true)]
    sources: Vec<Utf8PathBuf>,
    /// Extra classpath entries, exported to the build command
    #[arg(long, env = "RSREPAIR_CLASSPATH", value_delimiter = ',')]
    classpath: Vec<Utf8PathBuf>,
    /// Coverage of the failing tests (JSON records)
    #[arg(long, env = "RSREPAIR_FAULTY_COVERAGE")]
    faulty_coverage: Utf8PathBuf,
    /// Coverage of the passing tests (JSON records)
    #[arg(long, env = "RSREPAIR_SEED_COVERAGE")]
    seed_coverage: Utf8PathBuf,
    #[arg(long, env = "RSREPAIR_CANDIDATES", default_value = "10")]
    candidates: usize,
    #[arg(long, env = "RSREPAIR_GENERATIONS", default_value = "2")]
    generations: usize,
    /// Attempts per generation before giving up on it
    #[arg(long, env = "RSREPAIR_ATTEMPTS", default_value = "10")]
    attempts: usize,
    /// Random seed (default: picked at random and recorded in the summary)
    #[arg(long, env = "RSREPAIR_SEED")]
    seed: Option<u64>,
    #[arg(long, env = "RSREPAIR_BUILD_DIR", default_value = "rsrepair-build")]
    build_dir: Utf8PathBuf,
    /// Build command run in the project copy (default: syntax check only)
    #[arg(long, env = "RSREPAIR_BUILD_CMD")]
    build_cmd: Option<String>,
    /// Test command run in the project copy; exit 0 means the tests pass
    #[arg(long, env = "RSREPAIR_TEST_CMD")]
    test_cmd: String,
    /// Build output directory, relative to the project root
    #[arg(long, env = "RSREPAIR_ARTIFACTS")]
    artifacts: Option<Utf8PathBuf>,
    /// Timeout for each build and test command
    #[arg(long, env = "RSREPAIR_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
    /// random, null, addition, replacement or deletion
    #[arg(long, env = "RSREPAIR_MUTATION", default_value = "random")]
    mutation: String,
    /// Do not descend past a generation that exhausted its attempts
    #[arg(long, env = "RSREPAIR_STOP_ON_EXHAUSTED")]
    stop_on_exhausted: bool,
    /// Reject mutations with out-of-scope names before compiling
    #[arg(long, env = "RSREPAIR_SCOPE_GATE")]
    scope_gate: bool,
    /// Output JSON instead of human-readable text
    #[arg(long)]
    json: bool,
    /// Exit code only, no output
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Repair(args) => cmd_session(args, Mode::Repair),
        Commands::Probe(args) => cmd_session(args, Mode::Probe),
        Commands::Status { build_dir, json } => cmd_status(build_dir, json),
    };

    process::exit(exit_code);
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Repair,
    Probe,
}

fn generate_session_id() -> String {
    format!("{:08x}", fastrand::u32(..))
}

fn exit_code_for(e: &RepairError) -> i32 {
    if e.is_input_error() { 2 } else { 3 }
}

fn build_config(args: &SessionArgs) -> Result<RepairConfig, RepairError> {
    let mutation = MutationPolicy::parse(&args.mutation).ok_or_else(|| {
        RepairError::Config(format!(
            "unknown mutation '{}'. Expected random, null, addition, replacement or deletion",
            args.mutation
        ))
    })?;
    let config = RepairConfig {
        sources: args.sources.clone(),
        classpath: args.classpath.clone(),
        faulty_coverage: args.faulty_coverage.clone(),
        seed_coverage: args.seed_coverage.clone(),
        candidates: args.candidates,
        generations: args.generations,
        attempts: args.attempts,
        seed: args.seed.unwrap_or_else(|| fastrand::u64(..)),
        build_dir: args.build_dir.clone(),
        build_cmd: args.build_cmd.clone(),
        test_cmd: args.test_cmd.clone(),
        artifacts: args.artifacts.clone(),
        timeout_secs: args.timeout_secs,
        mutation,
        recursion: if args.stop_on_exhausted {
            RecursionPolicy::StopWhenExhausted
        } else {
            RecursionPolicy::Always
        },
        scope_gate: args.scope_gate,
    };
    config.validate()?;
    Ok(config)
}

fn cmd_session(args: SessionArgs, mode: Mode) -> i32 {
    let config = match build_config(&args) {
        Ok(c) => c,
        Err(e) => {
            output::print_error(&e.to_string());
            return 2;
        }
    };
    match run_session(&config, mode, args.json, args.quiet) {
        Ok(code) => code,
        Err(e) => {
            if !args.quiet {
                output::print_error(&e.to_string());
            }
            exit_code_for(&e)
        }
    }
}

fn run_session(config: &RepairConfig, mode: Mode, json_mode: bool, quiet: bool) -> Result<i32, RepairError> {
    let started = Instant::now();
    let started_at = chrono::Local::now().format(state::TIMESTAMP_FORMAT).to_string();

    let files = copy_tree::discover_sources(&config.sources)?;
    if files.is_empty() {
        return Err(RepairError::Setup("no supported source files found".into()));
    }
    let documents = DocumentSet::load(&files)?;
    let faulty_coverage = LineCoverage::load(config.faulty_coverage.as_std_path())?;
    let seed_coverage = LineCoverage::load(config.seed_coverage.as_std_path())?;
    let (faulty, seeds) = StatementPool::build(&documents, &faulty_coverage, &seed_coverage)?;

    let project_root = copy_tree::find_project_root(files[0].path.as_std_path());
    let workspace = Workspace::isolated(&project_root, &generate_session_id())?;
    let workspace_root = workspace.root().to_path_buf();
    let mut compiler = CommandCompiler::new(workspace, config.build_cmd.as_deref())
        .with_artifacts(config.artifacts.clone().map(Utf8PathBuf::into_std_path_buf))
        .with_timeout(config.timeout());
    compiler.set_context(&documents, &config.sources, &config.classpath)?;
    let mut tests = CommandTestRunner::new(&config.test_cmd, &workspace_root, config.timeout());

    let build = BuildDirectory::create(config.build_dir.clone())?;
    let mut recorder = PatchRecorder::new(build.clone());
    let scope = ScopeValidator::default();

    let mut controller = SearchController::new(
        documents,
        faulty,
        seeds,
        config.settings(quiet || json_mode),
        config.seed,
    )?;
    let mut env = Collaborators {
        compiler: &mut compiler,
        tests: &mut tests,
        scope: &scope,
        recorder: &mut recorder,
    };

    if mode == Mode::Probe {
        let outcome = controller.probe(&mut env)?;
        if !quiet {
            if json_mode {
                let value = serde_json::json!({
                    "compile": outcome.compile,
                    "tests": outcome.tests,
                });
                println!("{value}");
            } else {
                output::print_probe(&outcome);
            }
        }
        return Ok(match outcome.tests {
            Some(status) if status >= 0 => 0,
            _ => 1,
        });
    }

    let stats = controller.repair(&mut env)?;
    let summary = RunSummary {
        config: config.clone(),
        started: started_at,
        candidates_run: stats.candidates_run,
        candidates_failed: stats.candidates_failed,
        compilations: stats.compilations,
        test_runs: stats.test_runs,
        patches: recorder.into_recorded(),
        duration_ms: started.elapsed().as_millis() as u64,
    };
    if let Err(e) = summary.save(&build) {
        log::warn!("could not save summary: {e}");
    }

    if !quiet {
        if json_mode {
            match serde_json::to_string(&summary) {
                Ok(json) => println!("{json}"),
                Err(e) => output::print_error(&format!("could not serialize summary: {e}")),
            }
        } else {
            output::print_summary(&summary);
        }
    }

    Ok(if summary.patches.is_empty() { 1 } else { 0 })
}

fn cmd_status(build_dir: Utf8PathBuf, json_mode: bool) -> i32 {
    let build = BuildDirectory::open(build_dir);
    match state::load_summary(&build) {
        Some(summary) => {
            if json_mode {
                match serde_json::to_string(&summary) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        output::print_error(&format!("could not serialize summary: {e}"));
                        return 3;
                    }
                }
            } else {
                output::print_status(&summary);
            }
            0
        }
        None => {
            output::print_error(&format!(
                "No previous run found in {}. Run `rsrepair repair` first.",
                build.root()
            ));
            2
        }
    }
}

