use std::fmt;

use serde::{Deserialize, Serialize};

use crate::document::{DocId, DocumentSet, EditId, EditOp, EditOutcome, SkipReason, StatementRef};
use crate::error::{RepairError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationKind {
    Null,
    Addition,
    Replacement,
    Deletion,
}

impl MutationKind {
    pub fn name(self) -> &'static str {
        match self {
            MutationKind::Null => "null",
            MutationKind::Addition => "addition",
            MutationKind::Replacement => "replacement",
            MutationKind::Deletion => "deletion",
        }
    }

    pub fn needs_seed(self) -> bool {
        matches!(self, MutationKind::Addition | MutationKind::Replacement)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Applied(Option<EditId>),
    Undone,
}

/// One-shot memento: `mutate` once, then `undo` once.
#[derive(Debug, Clone)]
pub struct Mutation {
    kind: MutationKind,
    faulty: StatementRef,
    seed: Option<StatementRef>,
    state: State,
    skipped: Option<SkipReason>,
    description: String,
}

impl Mutation {
    pub fn new(
        kind: MutationKind,
        faulty: StatementRef,
        seed: Option<StatementRef>,
        documents: &DocumentSet,
    ) -> Result<Self> {
        if kind.needs_seed() && seed.is_none() {
            return Err(RepairError::MutationState("addition and replacement need a seed statement"));
        }
        let description = describe(kind, faulty, seed, documents)?;
        Ok(Self {
            kind,
            faulty,
            seed,
            state: State::Pending,
            skipped: None,
            description,
        })
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn faulty(&self) -> StatementRef {
        self.faulty
    }

    pub fn seed(&self) -> Option<StatementRef> {
        self.seed
    }

    /// The document this mutation edits.
    pub fn document(&self) -> DocId {
        self.faulty.doc
    }

    pub fn is_applied(&self) -> bool {
        matches!(self.state, State::Applied(_))
    }

    /// Why the last `mutate` left the text unchanged, if it did.
    pub fn skipped(&self) -> Option<SkipReason> {
        self.skipped
    }

    pub fn mutate(&mut self, documents: &mut DocumentSet) -> Result<()> {
        if self.state != State::Pending {
            return Err(RepairError::MutationState("mutate called twice"));
        }
        let op = match self.kind {
            MutationKind::Null => {
                self.state = State::Applied(None);
                return Ok(());
            }
            MutationKind::Addition => EditOp::InsertBefore(documents.donor(self.seed_ref()?)?),
            MutationKind::Replacement => EditOp::Replace(documents.donor(self.seed_ref()?)?),
            MutationKind::Deletion => EditOp::Delete,
        };
        let edit = match documents.apply(self.faulty, op)? {
            EditOutcome::Applied(id) => Some(id),
            EditOutcome::Skipped(reason) => {
                log::debug!("{} mutation skipped: {:?}", self.kind.name(), reason);
                self.skipped = Some(reason);
                None
            }
        };
        self.state = State::Applied(edit);
        Ok(())
    }

    pub fn undo(&mut self, documents: &mut DocumentSet) -> Result<()> {
        let State::Applied(edit) = self.state else {
            return Err(RepairError::MutationState("undo called without a successful mutate"));
        };
        if let Some(id) = edit {
            documents.undo(self.faulty.doc, id)?;
        }
        self.state = State::Undone;
        Ok(())
    }

    fn seed_ref(&self) -> Result<StatementRef> {
        self.seed
            .ok_or(RepairError::MutationState("addition and replacement need a seed statement"))
    }
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description)?;
        if let Some(reason) = self.skipped {
            let why = match reason {
                SkipReason::NotInBlock => "parent is not a block",
                SkipReason::TargetRemoved => "target already removed",
            };
            writeln!(f, "  (skipped: {why})")?;
        }
        Ok(())
    }
}

fn describe(
    kind: MutationKind,
    faulty: StatementRef,
    seed: Option<StatementRef>,
    documents: &DocumentSet,
) -> Result<String> {
    let mut out = format!("{} mutation\n", capitalize(kind.name()));
    out.push_str(&format!("  faulty: {}\n", documents.location(faulty)?));
    push_indented(&mut out, documents.statement_text(faulty)?);
    if let Some(seed) = seed {
        out.push_str(&format!("  seed: {}\n", documents.location(seed)?));
        push_indented(&mut out, documents.statement_text(seed)?);
    }
    Ok(out)
}

fn push_indented(out: &mut String, text: &str) {
    for line in text.lines() {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
