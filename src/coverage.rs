use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RepairError, Result};

/// One covered line as it appears in a coverage file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRecord {
    pub package: String,
    #[serde(rename = "type", default)]
    pub type_name: String,
    pub line: usize,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CoverageKey {
    package: String,
    type_name: String,
    line: usize,
}

/// Lookup from (package, type, line) to a coverage weight.
#[derive(Debug, Clone, Default)]
pub struct LineCoverage {
    weights: HashMap<CoverageKey, f64>,
}

impl LineCoverage {
    /// Read a JSON array of coverage records.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| RepairError::io(path, e))?;
        let records: Vec<CoverageRecord> =
            serde_json::from_str(&data).map_err(|source| RepairError::Coverage {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_records(records)
    }

    /// Later records for the same line replace earlier ones.
    pub fn from_records(records: impl IntoIterator<Item = CoverageRecord>) -> Result<Self> {
        let mut weights = HashMap::new();
        for record in records {
            if !record.weight.is_finite() || record.weight < 0.0 {
                return Err(RepairError::InvalidWeight(record.weight));
            }
            weights.insert(
                CoverageKey {
                    package: record.package,
                    type_name: record.type_name,
                    line: record.line,
                },
                record.weight,
            );
        }
        Ok(Self { weights })
    }

    pub fn contains(&self, package: &str, type_name: &str, line: usize) -> Option<f64> {
        self.weights
            .get(&CoverageKey {
                package: package.to_string(),
                type_name: type_name.to_string(),
                line,
            })
            .copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}
