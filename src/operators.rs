//! Mutation operator selection.

use fastrand::Rng;
use serde::{Deserialize, Serialize};

use crate::mutants::MutationKind;

/// Operators the random draw chooses between, with equal probability.
pub const RANDOM_KINDS: [MutationKind; 3] = [
    MutationKind::Addition,
    MutationKind::Replacement,
    MutationKind::Deletion,
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationPolicy {
    #[default]
    Random,
    /// Explicit override; the only way to get `Null`.
    Fixed(MutationKind),
}

impl MutationPolicy {
    /// Called once per generation; the result is reused for every retry of
    /// that generation.
    pub fn choose(self, rng: &mut Rng) -> MutationKind {
        match self {
            MutationPolicy::Random => RANDOM_KINDS[rng.usize(..RANDOM_KINDS.len())],
            MutationPolicy::Fixed(kind) => kind,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "random" => Some(MutationPolicy::Random),
            "null" => Some(MutationPolicy::Fixed(MutationKind::Null)),
            "addition" => Some(MutationPolicy::Fixed(MutationKind::Addition)),
            "replacement" => Some(MutationPolicy::Fixed(MutationKind::Replacement)),
            "deletion" => Some(MutationPolicy::Fixed(MutationKind::Deletion)),
            _ => None,
        }
    }
}
