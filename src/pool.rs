use std::fmt;

use fastrand::Rng;

use crate::coverage::LineCoverage;
use crate::document::{DocumentSet, StatementRef};
use crate::error::{RepairError, Result};

/// Redraws allowed before `draw_random_excluding` settles for any statement.
pub const MAX_EXCLUDE_RETRIES: usize = 8;

#[derive(Debug, Clone, Copy)]
struct PoolEntry {
    cumulative: f64,
    weight: f64,
    statement: StatementRef,
}

/// Statements weighted by coverage, drawn with probability weight / total.
///
/// Built once from coverage data and read-only during search.
#[derive(Debug, Clone, Default)]
pub struct StatementPool {
    entries: Vec<PoolEntry>,
    total: f64,
}

impl StatementPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every statement of `documents` into a faulty pool (coverage
    /// weight) and a seed pool (weight 1 per covered statement).
    pub fn build(
        documents: &DocumentSet,
        faulty_coverage: &LineCoverage,
        seed_coverage: &LineCoverage,
    ) -> Result<(StatementPool, StatementPool)> {
        let mut faulty = StatementPool::new();
        let mut seeds = StatementPool::new();
        for (statement, info) in documents.statements() {
            let package = documents.document(statement.doc)?.package();
            if let Some(weight) = faulty_coverage.contains(package, &info.type_name, info.line) {
                faulty.add(statement, weight)?;
            }
            if seed_coverage
                .contains(package, &info.type_name, info.line)
                .is_some()
            {
                seeds.add(statement, 1.0)?;
            }
        }
        log::info!(
            "indexed {} faulty and {} seed statements",
            faulty.len(),
            seeds.len()
        );
        Ok((faulty, seeds))
    }

    pub fn add(&mut self, statement: StatementRef, weight: f64) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(RepairError::InvalidWeight(weight));
        }
        self.total += weight;
        self.entries.push(PoolEntry {
            cumulative: self.total,
            weight,
            statement,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }

    /// The statement owning `draw` on the cumulative weight line: the
    /// first positive-weight entry whose cumulative weight is >= `draw`.
    pub fn select(&self, draw: f64) -> Result<StatementRef> {
        if self.total <= 0.0 {
            return Err(RepairError::EmptyPool);
        }
        let first = self.entries.partition_point(|e| e.cumulative < draw);
        self.entries[first..]
            .iter()
            .find(|e| e.weight > 0.0)
            .or_else(|| self.entries.iter().rev().find(|e| e.weight > 0.0))
            .map(|e| e.statement)
            .ok_or(RepairError::EmptyPool)
    }

    pub fn draw_random(&self, rng: &mut Rng) -> Result<StatementRef> {
        self.select(rng.f64() * self.total)
    }

    /// Draw a statement other than `exclude`, giving up after a bounded
    /// number of redraws so single-entry pools still answer.
    pub fn draw_random_excluding(&self, rng: &mut Rng, exclude: StatementRef) -> Result<StatementRef> {
        for _ in 0..MAX_EXCLUDE_RETRIES {
            let statement = self.draw_random(rng)?;
            if statement != exclude {
                return Ok(statement);
            }
        }
        self.draw_random(rng)
    }
}

impl fmt::Display for StatementPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "{} : doc {} statement {}",
                entry.cumulative, entry.statement.doc.0, entry.statement.index
            )?;
        }
        Ok(())
    }
}
