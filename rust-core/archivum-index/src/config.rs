// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use serde::{Deserialize, Serialize};

/// Index configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Apply each write immediately. When false, writes are staged and only
    /// become visible to readers on `commit`.
    pub auto_commit: bool,
    /// Storage path under which the collections live.
    pub root: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            auto_commit: true,
            root: "index".to_string(),
        }
    }
}
