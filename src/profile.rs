//! Profile input: `{function-name, block-id, execution-count}`
//! records fed back into the optimizer's layout-hinting pass
//!. Kept as its own module rather than folded into `optimize`
//! so a profile can be loaded, inspected, and reused independently of
//! any particular compile. Grounded on
//! `mastercyb-trident/src/config/project.rs`'s hand-rolled line-based
//! parsing (no serde: the format is small and line-oriented, one record
//! per line).

use std::collections::HashMap;
use std::path::Path;

use crate::mir::{BlockId, ExecutionHint};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileRecord {
    pub function: String,
    pub block: BlockId,
    pub count: u64,
}

#[derive(Clone, Debug, Default)]
pub struct Profile {
    records: HashMap<(String, BlockId), u64>,
}

impl Profile {
    pub fn from_records(records: Vec<ProfileRecord>) -> Self {
        let mut records_map = HashMap::new();
        for r in records {
            records_map.insert((r.function, r.block), r.count);
        }
        Self { records: records_map }
    }

    /// Parse `name:block-id:count` lines, one record per line, `#`-prefixed
    /// comments and blank lines ignored. Unknown or malformed lines are
    /// skipped and returned
    /// alongside the parsed profile so the caller can surface the warning
    /// through its own diagnostic channel.
    pub fn parse(content: &str) -> (Self, Vec<String>) {
        let mut records = Vec::new();
        let mut warnings = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let parts: Vec<&str> = trimmed.split(':').collect();
            let (Some(name), Some(block_str), Some(count_str)) = (parts.first(), parts.get(1), parts.get(2)) else {
                warnings.push(format!("line {}: expected 'function:block-id:count', got '{}'", lineno + 1, trimmed));
                continue;
            };
            let (Ok(block_id), Ok(count)) = (block_str.parse::<u32>(), count_str.parse::<u64>()) else {
                warnings.push(format!("line {}: malformed block id or count in '{}'", lineno + 1, trimmed));
                continue;
            };
            records.push(ProfileRecord { function: name.to_string(), block: BlockId(block_id), count });
        }
        (Self::from_records(records), warnings)
    }

    pub fn load(path: &Path) -> Result<(Self, Vec<String>), std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

/// Map a raw execution count to a coarse hint: the precise
    /// thresholds are target-independent, so this uses the same cold/warm/hot
    /// split regardless of backend.
    pub fn hint_for(&self, function: &str, block: BlockId) -> Option<ExecutionHint> {
        self.records.get(&(function.to_string(), block)).map(|&count| match count {
            0 => ExecutionHint::Cold,
            1..=1000 => ExecutionHint::Warm,
            _ => ExecutionHint::Hot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_records() {
        let (profile, warnings) = Profile::parse("main:0:5000\nhelper:1:3\n");
        assert!(warnings.is_empty());
        assert_eq!(profile.hint_for("main", BlockId(0)), Some(ExecutionHint::Hot));
        assert_eq!(profile.hint_for("helper", BlockId(1)), Some(ExecutionHint::Warm));
    }

    #[test]
    fn ignores_comments_and_blank_lines() {
        let (profile, warnings) = Profile::parse("# comment\n\nmain:0:0\n");
        assert!(warnings.is_empty());
        assert_eq!(profile.hint_for("main", BlockId(0)), Some(ExecutionHint::Cold));
    }

    #[test]
    fn malformed_line_produces_warning_not_panic() {
        let (profile, warnings) = Profile::parse("garbage line\nmain:0:10\n");
        assert_eq!(warnings.len(), 1);
        assert_eq!(profile.hint_for("main", BlockId(0)), Some(ExecutionHint::Warm));
    }

    #[test]
    fn unknown_function_yields_no_hint() {
        let (profile, _) = Profile::parse("main:0:10\n");
        assert_eq!(profile.hint_for("other", BlockId(0)), None);
    }
}
