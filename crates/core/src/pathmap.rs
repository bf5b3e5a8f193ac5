// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Path mapping rules used by attachment sync (spec §4.2, §8 invariant 9).

use serde::{Deserialize, Serialize};

/// A rewrite from a remote path recorded in a manifest to a local path
/// under the session working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMappingRule {
    pub source_path: String,
    pub destination_path: String,
    pub source_path_format: PathFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathFormat {
    Posix,
    Windows,
}

impl PathMappingRule {
    /// Number of path components in `source_path`, used to order rules so
    /// more-specific (longer) prefixes are tried first.
    fn source_component_count(&self) -> usize {
        let sep: &[char] = match self.source_path_format {
            PathFormat::Posix => &['/'],
            PathFormat::Windows => &['/', '\\'],
        };
        self.source_path
            .split(sep)
            .filter(|segment| !segment.is_empty())
            .count()
    }
}

/// Sort path-mapping rules by strictly non-increasing source-path component
/// count, so that the executor tries more-specific prefixes before less
/// specific ones (spec §4.2 step 4, §8 invariant 9).
///
/// The sort is stable: rules with equal component counts keep their
/// relative order.
pub fn sort_path_mapping_rules(rules: &mut [PathMappingRule]) {
    rules.sort_by(|a, b| b.source_component_count().cmp(&a.source_component_count()));
}

#[cfg(test)]
#[path = "pathmap_tests.rs"]
mod tests;
