// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use std::path::PathBuf;

use archivum_index::IndexConfig;
use archivum_plugins::EngineConfig;
use serde::{Deserialize, Serialize};

use crate::error::JobError;

pub const DATA_DIR: &str = "ARCHIVUM_DATA_DIR";
pub const MAX_WORKERS: &str = "ARCHIVUM_MAX_WORKERS";
pub const INDEX_AUTO_COMMIT: &str = "ARCHIVUM_INDEX_AUTO_COMMIT";
pub const HALT_ON_VALIDATION_ERROR: &str = "ARCHIVUM_HALT_ON_VALIDATION_ERROR";

/// Everything needed to open a [`Repository`](crate::Repository).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    pub engine: EngineConfig,
    pub index: IndexConfig,
    /// Directory for the redb files. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
}

impl RepositoryConfig {
    /// Defaults overridden by `ARCHIVUM_*` environment variables.
    pub fn from_env() -> Result<Self, JobError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, JobError> {
        let mut config = Self::default();
        if let Some(dir) = lookup(DATA_DIR).filter(|d| !d.trim().is_empty()) {
            config.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup(MAX_WORKERS) {
            let workers: usize = value
                .trim()
                .parse()
                .map_err(|_| JobError::Config(format!("{MAX_WORKERS}: '{value}' is not a number")))?;
            if workers == 0 {
                return Err(JobError::Config(format!("{MAX_WORKERS} must be at least 1")));
            }
            config.engine.max_workers = workers;
        }
        if let Some(value) = lookup(INDEX_AUTO_COMMIT) {
            config.index.auto_commit = parse_flag(INDEX_AUTO_COMMIT, &value)?;
        }
        if let Some(value) = lookup(HALT_ON_VALIDATION_ERROR) {
            config.engine.halt_on_validation_error = parse_flag(HALT_ON_VALIDATION_ERROR, &value)?;
        }
        Ok(config)
    }
}

fn parse_flag(name: &str, value: &str) -> Result<bool, JobError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(JobError::Config(format!("{name}: '{value}' is not a boolean"))),
    }
}
