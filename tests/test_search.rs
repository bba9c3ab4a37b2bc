use std::path::Path;

use camino::Utf8PathBuf;
use rsrepair::document::{DocId, DocumentSet, SourceDocument, StatementRef};
use rsrepair::mutants::MutationKind;
use rsrepair::operators::MutationPolicy;
use rsrepair::pool::StatementPool;
use rsrepair::runner::{Compiler, SyntaxCompiler, TestRunner};
use rsrepair::scope::{BindingResolver, ScopeReport, ScopeValidator, UnresolvedName};
use rsrepair::search::{Collaborators, RecursionPolicy, SearchController, SearchSettings};
use rsrepair::state::{BuildDirectory, PatchRecorder};
use rsrepair::{Language, RepairError, Result};
use tempfile::TempDir;

const SOURCE: &str = "def area(w, h):
    result = w * h
    print(result)
    return result

def perimeter(w, h):
    total = 2 * (w + h)
    return total
";

struct ScriptedCompiler {
    calls: usize,
    status: i32,
    /// Every n-th call errors instead of compiling.
    error_every: Option<usize>,
}

impl ScriptedCompiler {
    fn returning(status: i32) -> Self {
        Self {
            calls: 0,
            status,
            error_every: None,
        }
    }
}

impl Compiler for ScriptedCompiler {
    fn set_context(&mut self, _: &DocumentSet, _: &[Utf8PathBuf], _: &[Utf8PathBuf]) -> Result<()> {
        Ok(())
    }

    fn compile(&mut self, _: &DocumentSet) -> Result<i32> {
        self.calls += 1;
        match self.error_every {
            Some(n) if self.calls % n == 0 => Err(RepairError::Collaborator("compiler crashed".into())),
            _ => Ok(self.status),
        }
    }

    fn store_compiled(&self, documents: &DocumentSet, destination: &Path) -> Result<()> {
        SyntaxCompiler.store_compiled(documents, destination)
    }
}

enum Behavior {
    Status(i32),
    Error,
}

struct ScriptedTests {
    calls: usize,
    behavior: Behavior,
}

impl ScriptedTests {
    fn new(behavior: Behavior) -> Self {
        Self { calls: 0, behavior }
    }
}

impl TestRunner for ScriptedTests {
    fn run_tests(&mut self) -> Result<i32> {
        self.calls += 1;
        match self.behavior {
            Behavior::Status(status) => Ok(status),
            Behavior::Error => Err(RepairError::TestExecution("runner crashed".into())),
        }
    }
}

struct NothingResolves;

impl BindingResolver for NothingResolves {
    fn resolve_bindings(&self, _: Language, _: &str) -> Result<ScopeReport> {
        Ok(ScopeReport {
            unresolved: vec![UnresolvedName {
                name: "ghost".into(),
                line: 1,
            }],
            well_formed: true,
        })
    }
}

fn settings(candidates: usize, generations: usize, attempts: usize) -> SearchSettings {
    SearchSettings {
        candidates,
        generations,
        attempts,
        policy: MutationPolicy::Random,
        recursion: RecursionPolicy::Always,
        scope_gate: false,
        quiet: true,
    }
}

fn documents() -> DocumentSet {
    let doc = SourceDocument::parse("geometry.py", "geometry", Language::Python, SOURCE).unwrap();
    DocumentSet::new(vec![doc])
}

fn pools(documents: &DocumentSet) -> (StatementPool, StatementPool) {
    let mut faulty = StatementPool::new();
    let mut seeds = StatementPool::new();
    for (statement, _) in documents.statements() {
        faulty.add(statement, 1.0 + statement.index as f64).unwrap();
        seeds.add(statement, 1.0).unwrap();
    }
    (faulty, seeds)
}

fn controller(settings: SearchSettings, seed: u64) -> SearchController {
    let docs = documents();
    let (faulty, seeds) = pools(&docs);
    SearchController::new(docs, faulty, seeds, settings, seed).unwrap()
}

fn recorder(dir: &TempDir) -> PatchRecorder {
    let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
    PatchRecorder::new(BuildDirectory::create(root).unwrap())
}

fn pristine(controller: &SearchController) -> bool {
    let doc = controller.documents().document(DocId(0)).unwrap();
    controller.documents().is_pristine() && doc.current() == SOURCE
}

// --- candidate loop ---

#[test]
fn compile_count_is_bounded_and_documents_roll_back() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(0);
    let mut tests = ScriptedTests::new(Behavior::Status(0));
    let scope = ScopeValidator::default();
    let mut search = controller(settings(3, 2, 4), 7);

    let stats = search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    assert!(compiler.calls >= 3, "only {} compilations", compiler.calls);
    assert!(compiler.calls <= 3 * 2 * 4, "{} compilations", compiler.calls);
    assert_eq!(stats.compilations, compiler.calls);
    assert_eq!(stats.candidates_run, 3);
    assert!(pristine(&search));
    assert!(search.patch_stack().is_empty());
}

#[test]
fn failing_tests_use_every_attempt() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(0);
    let mut tests = ScriptedTests::new(Behavior::Status(-1));
    let scope = ScopeValidator::default();
    let mut search = controller(settings(3, 2, 4), 11);

    let stats = search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    assert_eq!(stats.compilations, 24);
    assert_eq!(stats.test_runs, 24);
    assert_eq!(stats.patches, 0);
    assert!(pristine(&search));
}

#[test]
fn exhausted_generations_keep_nothing() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(-1);
    let mut tests = ScriptedTests::new(Behavior::Status(1));
    let scope = ScopeValidator::default();
    let mut search = controller(settings(2, 3, 2), 3);

    let stats = search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    // Searching continues below an exhausted generation.
    assert_eq!(stats.compilations, 2 * 3 * 2);
    assert_eq!(tests.calls, 0);
    assert!(search.patch_stack().is_empty());
    assert!(pristine(&search));
}

#[test]
fn stop_when_exhausted_ends_the_candidate() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(-1);
    let mut tests = ScriptedTests::new(Behavior::Status(1));
    let scope = ScopeValidator::default();
    let mut config = settings(2, 3, 2);
    config.recursion = RecursionPolicy::StopWhenExhausted;
    let mut search = controller(config, 3);

    let stats = search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    assert_eq!(stats.compilations, 2 * 2);
    assert!(pristine(&search));
}

#[test]
fn test_runner_errors_count_as_failed_attempts() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(0);
    let mut tests = ScriptedTests::new(Behavior::Error);
    let scope = ScopeValidator::default();
    let mut search = controller(settings(2, 2, 3), 5);

    let stats = search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    assert_eq!(stats.candidates_failed, 0);
    assert_eq!(tests.calls, 2 * 2 * 3);
    assert!(pristine(&search));
}

#[test]
fn passing_tests_record_one_patch_per_generation() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(0);
    let mut tests = ScriptedTests::new(Behavior::Status(1));
    let scope = ScopeValidator::default();
    let mut search = controller(settings(3, 2, 4), 21);

    let stats = search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    assert_eq!(stats.patches, 6);
    assert_eq!(stats.compilations, 6);
    let recorded = rec.recorded();
    assert_eq!(recorded.len(), 6);
    for artifact in recorded {
        assert_eq!(artifact.mutations.len(), artifact.generation);
        assert!(artifact.mutations[0].starts_with(&format!(
            "Candidate {}, Generation 1\n",
            artifact.candidate
        )));
        assert!(artifact.patch_file.exists());
        assert!(artifact.compiled.as_ref().unwrap().exists());
    }
    assert!(pristine(&search));
}

#[test]
fn collaborator_errors_abort_only_the_candidate() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler {
        calls: 0,
        status: 0,
        error_every: Some(2),
    };
    let mut tests = ScriptedTests::new(Behavior::Status(0));
    let scope = ScopeValidator::default();
    let mut search = controller(settings(3, 2, 4), 9);

    let stats = search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    assert_eq!(stats.candidates_run, 3);
    assert_eq!(stats.candidates_failed, 3);
    assert!(search.patch_stack().is_empty());
    assert!(pristine(&search));
}

#[test]
fn kind_is_fixed_within_a_generation() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(0);
    let mut tests = ScriptedTests::new(Behavior::Status(-1));
    let scope = ScopeValidator::default();
    let attempts = 5;
    let mut search = controller(settings(4, 2, attempts), 13);

    search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    let log = std::fs::read_to_string(rec.build().log_path()).unwrap();
    let kinds: Vec<&str> = log.lines().filter(|l| l.ends_with(" mutation")).collect();
    assert_eq!(kinds.len(), 4 * 2 * attempts);
    for generation in kinds.chunks(attempts) {
        assert!(
            generation.iter().all(|k| *k == generation[0]),
            "kind changed within a generation: {generation:?}"
        );
    }
}

#[test]
fn fixed_policy_only_uses_its_kind() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(0);
    let mut tests = ScriptedTests::new(Behavior::Status(-1));
    let scope = ScopeValidator::default();
    let mut config = settings(2, 2, 2);
    config.policy = MutationPolicy::Fixed(MutationKind::Deletion);
    let mut search = controller(config, 1);

    search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    let log = std::fs::read_to_string(rec.build().log_path()).unwrap();
    assert!(log.lines().filter(|l| l.ends_with(" mutation")).all(|l| l == "Deletion mutation"));
    assert!(!log.contains("  seed: "));
}

#[test]
fn same_seed_reproduces_the_search() {
    let run = |seed| {
        let dir = TempDir::new().unwrap();
        let mut rec = recorder(&dir);
        let mut compiler = ScriptedCompiler::returning(0);
        let mut tests = ScriptedTests::new(Behavior::Status(-1));
        let scope = ScopeValidator::default();
        let mut search = controller(settings(3, 2, 3), seed);
        search
            .repair(&mut Collaborators {
                compiler: &mut compiler,
                tests: &mut tests,
                scope: &scope,
                recorder: &mut rec,
            })
            .unwrap();
        std::fs::read_to_string(rec.build().log_path()).unwrap()
    };
    assert_eq!(run(42), run(42));
}

#[test]
fn scope_gate_rejects_before_compiling() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(0);
    let mut tests = ScriptedTests::new(Behavior::Status(1));
    let scope = ScopeValidator::new(NothingResolves);
    let mut config = settings(2, 2, 3);
    config.scope_gate = true;
    let mut search = controller(config, 4);

    let stats = search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    assert_eq!(stats.compilations, 0);
    assert_eq!(stats.patches, 0);
    assert!(pristine(&search));
}

#[test]
fn scope_report_is_diagnostic_without_the_gate() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(0);
    let mut tests = ScriptedTests::new(Behavior::Status(1));
    let scope = ScopeValidator::new(NothingResolves);
    let mut search = controller(settings(1, 1, 3), 4);

    let stats = search
        .repair(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    assert_eq!(stats.compilations, 1);
    assert_eq!(stats.patches, 1);
}

// --- probe ---

#[test]
fn probe_runs_a_null_mutation() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = SyntaxCompiler;
    let mut tests = ScriptedTests::new(Behavior::Status(1));
    let scope = ScopeValidator::default();
    let mut search = controller(settings(1, 1, 1), 8);

    let outcome = search
        .probe(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    assert_eq!(outcome.compile, 0);
    assert_eq!(outcome.tests, Some(1));
    assert!(pristine(&search));
}

#[test]
fn probe_skips_tests_when_compile_fails() {
    let dir = TempDir::new().unwrap();
    let mut rec = recorder(&dir);
    let mut compiler = ScriptedCompiler::returning(-1);
    let mut tests = ScriptedTests::new(Behavior::Status(1));
    let scope = ScopeValidator::default();
    let mut search = controller(settings(1, 1, 1), 8);

    let outcome = search
        .probe(&mut Collaborators {
            compiler: &mut compiler,
            tests: &mut tests,
            scope: &scope,
            recorder: &mut rec,
        })
        .unwrap();

    assert_eq!(outcome.tests, None);
    assert_eq!(tests.calls, 0);
}

// --- setup ---

#[test]
fn empty_sessions_are_setup_failures() {
    let result = SearchController::new(
        DocumentSet::default(),
        StatementPool::new(),
        StatementPool::new(),
        settings(1, 1, 1),
        0,
    );
    assert!(matches!(result, Err(RepairError::Setup(_))));
}

#[test]
fn empty_pools_are_rejected() {
    let docs = documents();
    let (faulty, _) = pools(&docs);
    let result = SearchController::new(docs, faulty, StatementPool::new(), settings(1, 1, 1), 0);
    assert!(matches!(result, Err(RepairError::EmptyPool)));

    let docs = documents();
    let (_, seeds) = pools(&docs);
    let result = SearchController::new(docs, StatementPool::new(), seeds, settings(1, 1, 1), 0);
    assert!(matches!(result, Err(RepairError::EmptyPool)));
}

#[test]
fn deletion_only_needs_no_seeds() {
    let docs = documents();
    let (faulty, _) = pools(&docs);
    let mut config = settings(1, 1, 1);
    config.policy = MutationPolicy::Fixed(MutationKind::Deletion);
    assert!(SearchController::new(docs, faulty, StatementPool::new(), config, 0).is_ok());
}

#[test]
fn statement_refs_stay_valid_across_documents() {
    let a = SourceDocument::parse("a.py", "a", Language::Python, "x = 1\ny = 2\n").unwrap();
    let b = SourceDocument::parse("b.py", "b", Language::Python, "z = 3\n").unwrap();
    let docs = DocumentSet::new(vec![a, b]);
    let seed = StatementRef {
        doc: DocId(1),
        index: 0,
    };
    assert_eq!(docs.location(seed).unwrap(), "b.py:1");
}
