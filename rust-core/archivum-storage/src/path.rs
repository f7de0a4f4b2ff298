// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hierarchical storage addressing for Archivum.
//
// A `StoragePath` is an ordered, immutable sequence of non-empty segments.
// The first segment is the container (the logical collection), the rest are
// nested identifiers. The textual form joins segments with `/`; separator and
// escape characters inside a segment are percent-escaped so that every valid
// path survives a `to_string` / `parse` round trip.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between segments in the textual form.
pub const SEPARATOR: char = '/';

const ESCAPE: char = '%';

/// Errors raised while building or parsing a [`StoragePath`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    /// The textual form could not be parsed.
    #[error("invalid storage path '{input}': {reason}")]
    InvalidFormat { input: String, reason: String },

    /// A segment was empty.
    #[error("storage path segments must not be empty")]
    EmptySegment,
}

/// A location in storage: container first, then nested ids.
///
/// Two paths are equal iff their segment sequences are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoragePath {
    segments: Vec<String>,
}

impl StoragePath {
    /// Build a path from raw (unescaped) segments.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() || segments.iter().any(|s| s.is_empty()) {
            return Err(PathError::EmptySegment);
        }
        Ok(Self { segments })
    }

    /// A single-segment path naming a container.
    pub fn container_path(container: impl Into<String>) -> Result<Self, PathError> {
        Self::from_segments([container.into()])
    }

    /// Parse the textual form produced by [`fmt::Display`].
    pub fn parse(input: &str) -> Result<Self, PathError> {
        if input.is_empty() {
            return Err(PathError::InvalidFormat {
                input: input.to_string(),
                reason: "empty path".to_string(),
            });
        }

        let mut segments = Vec::new();
        for raw in input.split(SEPARATOR) {
            if raw.is_empty() {
                return Err(PathError::InvalidFormat {
                    input: input.to_string(),
                    reason: "empty segment".to_string(),
                });
            }
            segments.push(unescape(raw).map_err(|reason| PathError::InvalidFormat {
                input: input.to_string(),
                reason,
            })?);
        }

        Ok(Self { segments })
    }

    /// Append a segment, returning the new path.
    pub fn child(&self, segment: impl Into<String>) -> Result<Self, PathError> {
        let segment = segment.into();
        if segment.is_empty() {
            return Err(PathError::EmptySegment);
        }
        let mut segments = self.segments.clone();
        segments.push(segment);
        Ok(Self { segments })
    }

    /// Append several segments at once.
    pub fn join<I, S>(&self, segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut path = self.clone();
        for segment in segments {
            path = path.child(segment)?;
        }
        Ok(path)
    }

    /// The container (first segment).
    pub fn container(&self) -> &str {
        &self.segments[0]
    }

    /// The last segment.
    pub fn name(&self) -> &str {
        // Never empty by construction.
        &self.segments[self.segments.len() - 1]
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Paths always hold at least one segment.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// True if this path names only a container.
    pub fn is_container(&self) -> bool {
        self.segments.len() == 1
    }

    /// The enclosing path, or `None` for a container.
    pub fn parent(&self) -> Option<Self> {
        if self.is_container() {
            None
        } else {
            Some(Self {
                segments: self.segments[..self.segments.len() - 1].to_vec(),
            })
        }
    }

    /// True if `prefix` is this path or one of its ancestors.
    pub fn starts_with(&self, prefix: &StoragePath) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Segments of this path below `prefix`, if `prefix` is an ancestor.
    pub fn strip_prefix(&self, prefix: &StoragePath) -> Option<&[String]> {
        if self.starts_with(prefix) {
            Some(&self.segments[prefix.segments.len()..])
        } else {
            None
        }
    }

    /// Re-root the part of this path below `from` under `to`.
    pub fn rebase(&self, from: &StoragePath, to: &StoragePath) -> Option<Self> {
        let rest = self.strip_prefix(from)?;
        let mut segments = to.segments.clone();
        segments.extend(rest.iter().cloned());
        Some(Self { segments })
    }

    /// Textual prefix shared by every strict descendant of this path.
    pub fn descendant_prefix(&self) -> String {
        let mut prefix = self.to_string();
        prefix.push(SEPARATOR);
        prefix
    }
}

impl fmt::Display for StoragePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, "{SEPARATOR}")?;
            }
            write!(f, "{}", escape(segment))?;
        }
        Ok(())
    }
}

impl FromStr for StoragePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StoragePath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StoragePath> for String {
    fn from(path: StoragePath) -> Self {
        path.to_string()
    }
}

fn escape(segment: &str) -> String {
    let mut out = String::with_capacity(segment.len());
    for c in segment.chars() {
        match c {
            '%' => out.push_str("%25"),
            '/' => out.push_str("%2F"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(raw: &str) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != ESCAPE {
            out.push(c);
            continue;
        }
        let code: String = chars.by_ref().take(2).collect();
        match code.as_str() {
            "25" => out.push('%'),
            "2F" | "2f" => out.push('/'),
            other => return Err(format!("unknown escape sequence '%{other}'")),
        }
    }
    Ok(out)
}
