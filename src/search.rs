//! Depth-bounded backtracking search over mutations.
//!
//! Each candidate descends through generations 1..=N, keeping at most one
//! mutation per generation, then unwinds by undoing the kept mutations in
//! reverse order. The descent is an explicit frame stack rather than
//! recursion.

use fastrand::Rng;
use serde::{Deserialize, Serialize};

use crate::document::DocumentSet;
use crate::error::{RepairError, Result};
use crate::mutants::{Mutation, MutationKind};
use crate::operators::MutationPolicy;
use crate::output;
use crate::pool::StatementPool;
use crate::runner::{Compiler, TestRunner};
use crate::scope::ScopeValidator;
use crate::state::PatchRecorder;

/// What happens after a generation used its whole attempt budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecursionPolicy {
    /// Descend anyway, with nothing kept at the exhausted level.
    #[default]
    Always,
    StopWhenExhausted,
}

#[derive(Debug, Clone)]
pub struct SearchSettings {
    pub candidates: usize,
    pub generations: usize,
    pub attempts: usize,
    pub policy: MutationPolicy,
    pub recursion: RecursionPolicy,
    /// Reject out-of-scope mutations before compiling them.
    pub scope_gate: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStats {
    pub candidates_run: usize,
    pub candidates_failed: usize,
    pub compilations: usize,
    pub test_runs: usize,
    pub patches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub compile: i32,
    /// `None` when the program did not compile.
    pub tests: Option<i32>,
}

/// Everything outside the controller that one search talks to.
pub struct Collaborators<'a> {
    pub compiler: &'a mut dyn Compiler,
    pub tests: &'a mut dyn TestRunner,
    pub scope: &'a ScopeValidator,
    pub recorder: &'a mut PatchRecorder,
}

#[derive(Debug)]
enum GenerationOutcome {
    Kept { mutation: Mutation, status: i32 },
    Exhausted,
}

struct Frame {
    generation: usize,
    kept: Option<Mutation>,
}

pub struct SearchController {
    documents: DocumentSet,
    faulty: StatementPool,
    seeds: StatementPool,
    settings: SearchSettings,
    faulty_rng: Rng,
    seed_rng: Rng,
    policy_rng: Rng,
    patches: Vec<String>,
    stats: SearchStats,
}

impl SearchController {
    pub fn new(
        documents: DocumentSet,
        faulty: StatementPool,
        seeds: StatementPool,
        settings: SearchSettings,
        seed: u64,
    ) -> Result<Self> {
        if documents.is_empty() {
            return Err(RepairError::Setup("no source documents to repair".into()));
        }
        if faulty.total_weight() <= 0.0 {
            return Err(RepairError::EmptyPool);
        }
        let needs_seeds = match settings.policy {
            MutationPolicy::Random => true,
            MutationPolicy::Fixed(kind) => kind.needs_seed(),
        };
        if needs_seeds && seeds.total_weight() <= 0.0 {
            return Err(RepairError::EmptyPool);
        }

        let mut master = Rng::with_seed(seed);
        let faulty_rng = Rng::with_seed(master.u64(..));
        let seed_rng = Rng::with_seed(master.u64(..));
        let policy_rng = Rng::with_seed(master.u64(..));

        Ok(Self {
            documents,
            faulty,
            seeds,
            settings,
            faulty_rng,
            seed_rng,
            policy_rng,
            patches: Vec::new(),
            stats: SearchStats::default(),
        })
    }

    pub fn documents(&self) -> &DocumentSet {
        &self.documents
    }

    /// Descriptions of the mutations currently kept, oldest first.
    pub fn patch_stack(&self) -> &[String] {
        &self.patches
    }

    pub fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Run every candidate. Only an error while restoring the documents
    /// stops the loop early.
    pub fn repair(&mut self, env: &mut Collaborators<'_>) -> Result<SearchStats> {
        for candidate in 1..=self.settings.candidates {
            if !self.settings.quiet {
                output::print_candidate(candidate, self.settings.candidates);
            }
            self.stats.candidates_run += 1;
            self.run_candidate(candidate, env)?;
        }
        Ok(self.stats.clone())
    }

    /// Apply a null mutation, compile and test, then undo it.
    pub fn probe(&mut self, env: &mut Collaborators<'_>) -> Result<ProbeOutcome> {
        let faulty = self.faulty.draw_random(&mut self.faulty_rng)?;
        let mut mutation = Mutation::new(MutationKind::Null, faulty, None, &self.documents)?;
        mutation.mutate(&mut self.documents)?;

        let outcome = self.probe_applied(env);
        mutation.undo(&mut self.documents)?;
        outcome
    }

    fn probe_applied(&mut self, env: &mut Collaborators<'_>) -> Result<ProbeOutcome> {
        self.stats.compilations += 1;
        let compile = env.compiler.compile(&self.documents)?;
        if compile < 0 {
            return Ok(ProbeOutcome {
                compile,
                tests: None,
            });
        }
        self.stats.test_runs += 1;
        let tests = env.tests.run_tests()?;
        Ok(ProbeOutcome {
            compile,
            tests: Some(tests),
        })
    }

    fn run_candidate(&mut self, candidate: usize, env: &mut Collaborators<'_>) -> Result<()> {
        let mut frames: Vec<Frame> = Vec::new();
        let mut failure = None;

        for generation in 1..=self.settings.generations {
            if !self.settings.quiet {
                output::print_generation(generation, self.settings.generations);
            }
            match self.run_generation(candidate, generation, env) {
                Ok(GenerationOutcome::Kept { mutation, status }) => {
                    self.patches.push(format!(
                        "Candidate {candidate}, Generation {generation}\n{mutation}"
                    ));
                    frames.push(Frame {
                        generation,
                        kept: Some(mutation),
                    });
                    if status > 0 {
                        self.record_patch(candidate, generation, env);
                    }
                }
                Ok(GenerationOutcome::Exhausted) => {
                    log::info!(
                        "candidate {candidate} generation {generation}: attempts exhausted"
                    );
                    frames.push(Frame {
                        generation,
                        kept: None,
                    });
                    if self.settings.recursion == RecursionPolicy::StopWhenExhausted {
                        break;
                    }
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        while let Some(frame) = frames.pop() {
            if let Some(mut mutation) = frame.kept {
                log::debug!("candidate {candidate}: undoing generation {}", frame.generation);
                self.patches.pop();
                mutation.undo(&mut self.documents)?;
            }
        }

        if let Some(e) = failure {
            log::warn!("candidate {candidate} failed: {e}");
            if !self.settings.quiet {
                output::print_error(&format!("Candidate {candidate} failed: {e}"));
            }
            self.stats.candidates_failed += 1;
        }
        Ok(())
    }

    /// The retry loop of one generation. The operator is chosen once and
    /// reused for every attempt.
    fn run_generation(
        &mut self,
        candidate: usize,
        generation: usize,
        env: &mut Collaborators<'_>,
    ) -> Result<GenerationOutcome> {
        let kind = self.settings.policy.choose(&mut self.policy_rng);
        let mut attempts = 0;
        loop {
            let mut mutation = self.draw_mutation(kind)?;
            mutation.mutate(&mut self.documents)?;
            if !self.settings.quiet {
                output::print_mutation(&mutation);
            }

            match self.attempt(&mutation, env) {
                Ok(Some(status)) => return Ok(GenerationOutcome::Kept { mutation, status }),
                Ok(None) => {
                    mutation.undo(&mut self.documents)?;
                    attempts += 1;
                    if attempts >= self.settings.attempts {
                        return Ok(GenerationOutcome::Exhausted);
                    }
                    log::debug!(
                        "candidate {candidate} generation {generation}: attempt {attempts} failed"
                    );
                }
                Err(e) => {
                    if let Err(undo) = mutation.undo(&mut self.documents) {
                        log::error!("could not undo after failed attempt: {undo}");
                    }
                    return Err(e);
                }
            }
        }
    }

    /// `Some(status)` keeps the applied mutation, `None` asks for a retry.
    fn attempt(&mut self, mutation: &Mutation, env: &mut Collaborators<'_>) -> Result<Option<i32>> {
        let document = self.documents.document(mutation.document())?;
        match env.scope.check_scope(document) {
            Ok(report) if self.settings.scope_gate && !report.in_scope() => {
                log::info!("rejected before compiling: names out of scope");
                return Ok(None);
            }
            Ok(_) => {}
            Err(e) => log::warn!("scope check failed: {e}"),
        }

        env.recorder.build().append_log(&mutation.to_string())?;

        self.stats.compilations += 1;
        let compiled = env.compiler.compile(&self.documents)?;
        if compiled < 0 {
            if !self.settings.quiet {
                output::print_compile_failed();
            }
            return Ok(None);
        }
        if !self.settings.quiet {
            output::print_compiled();
        }

        self.stats.test_runs += 1;
        let status = match env.tests.run_tests() {
            Ok(status) => status,
            Err(e) => {
                log::warn!("test run failed: {e}");
                return Ok(None);
            }
        };
        if !self.settings.quiet {
            output::print_tests(status);
        }
        Ok((status >= 0).then_some(status))
    }

    fn draw_mutation(&mut self, kind: MutationKind) -> Result<Mutation> {
        let faulty = self.faulty.draw_random(&mut self.faulty_rng)?;
        let seed = if kind.needs_seed() {
            Some(self.seeds.draw_random_excluding(&mut self.seed_rng, faulty)?)
        } else {
            None
        };
        Mutation::new(kind, faulty, seed, &self.documents)
    }

    fn record_patch(&mut self, candidate: usize, generation: usize, env: &mut Collaborators<'_>) {
        let recorded = env.recorder.record(
            candidate,
            generation,
            &self.patches,
            &self.documents,
            &*env.compiler,
        );
        if let Some(artifact) = recorded {
            self.stats.patches += 1;
            if !self.settings.quiet {
                output::print_patch(&artifact);
            }
        }
    }
}
