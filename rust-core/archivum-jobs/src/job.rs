// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//! Job records.

use archivum_index::Filter;
use archivum_plugins::{ParameterValues, PluginType, Progress, Report};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `Created -> Running -> {Completed, Failed, Stopped}`. A created job may
/// also be stopped before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Created,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Stopped)
    }
}

/// Which objects a job processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "selection", rename_all = "snake_case")]
pub enum SelectedObjects {
    /// Exactly these ids, in this order.
    Ids { ids: Vec<String> },
    /// Whatever the index matches when the job starts.
    Filter { filter: Filter },
    /// Every object of the target type held by the store.
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub plugin_id: String,
    /// Known once the plugin has been instantiated.
    pub plugin_type: Option<PluginType>,
    /// Entity type key of the objects, e.g. `"aip"`.
    pub target: String,
    pub parameters: ParameterValues,
    pub selection: SelectedObjects,
    pub state: JobState,
    pub progress: Progress,
    pub report: Option<Report>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(
        name: impl Into<String>,
        plugin_id: impl Into<String>,
        target: impl Into<String>,
        selection: SelectedObjects,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            plugin_id: plugin_id.into(),
            plugin_type: None,
            target: target.into(),
            parameters: ParameterValues::new(),
            selection,
            state: JobState::Created,
            progress: Progress::default(),
            report: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}
