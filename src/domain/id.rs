//! Identifiers for projects, tasks and dependencies
//!
//! ID Format:
//! - Project IDs: caller-chosen slug (`[A-Za-z0-9._-]+`, not starting with `.`)
//! - Task IDs: opaque, owned by the external scheduler (any non-empty string)
//! - Dependency IDs: `d-{12-char-hash}` (e.g., `d-7f2b4c19a0e1`)
//!
//! Dependency hashes are derived from project, endpoints, creation timestamp
//! and a process-wide sequence, so two edges created in the same instant
//! still get distinct IDs.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const DEPENDENCY_HASH_LEN: usize = 12;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid project ID: expected '[A-Za-z0-9._-]+' not starting with '.', got '{0}'")]
    InvalidProjectId(String),

    #[error("Invalid task ID: must not be empty")]
    EmptyTaskId,

    #[error("Invalid dependency ID format: expected 'd-{{12-char-hash}}', got '{0}'")]
    InvalidDependencyId(String),
}

/// Generates a short hash from the given parts
fn generate_hash(parts: &[&str], timestamp: DateTime<Utc>) -> String {
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    hasher.update(&timestamp.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    let hex = hasher.finalize().to_hex();
    hex[..DEPENDENCY_HASH_LEN].to_string()
}

/// Project ID partitioning the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Returns the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProjectId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty()
            && !s.starts_with('.')
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

        if !valid {
            return Err(IdError::InvalidProjectId(s.to_string()));
        }

        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ProjectId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

/// Task ID as handed to us by the scheduler
///
/// Opaque: the engine never checks that the task exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    /// Returns the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TaskId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(IdError::EmptyTaskId);
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for TaskId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.0
    }
}

/// Dependency ID in the format `d-{12-char-hash}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DependencyId {
    hash: String,
}

impl DependencyId {
    /// Generates a fresh ID for an edge created at `timestamp`
    pub fn generate(
        project: &ProjectId,
        source: &TaskId,
        target: &TaskId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            hash: generate_hash(
                &[project.as_str(), source.as_str(), target.as_str()],
                timestamp,
            ),
        }
    }

    /// Returns the hash portion of the ID
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for DependencyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "d-{}", self.hash)
    }
}

impl FromStr for DependencyId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hash = s
            .strip_prefix("d-")
            .ok_or_else(|| IdError::InvalidDependencyId(s.to_string()))?;

        if hash.len() != DEPENDENCY_HASH_LEN
            || !hash
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(IdError::InvalidDependencyId(s.to_string()));
        }

        Ok(Self {
            hash: hash.to_string(),
        })
    }
}

impl TryFrom<String> for DependencyId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DependencyId> for String {
    fn from(id: DependencyId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (ProjectId, TaskId, TaskId) {
        (
            "tower-a".parse().unwrap(),
            "excavate".parse().unwrap(),
            "foundations".parse().unwrap(),
        )
    }

    #[test]
    fn dependency_id_format() {
        let (project, source, target) = ids();
        let id = DependencyId::generate(&project, &source, &target, Utc::now());

        let s = id.to_string();
        assert!(s.starts_with("d-"));
        assert_eq!(s.len(), 2 + DEPENDENCY_HASH_LEN);
        assert_eq!(s.parse::<DependencyId>().unwrap(), id);
    }

    #[test]
    fn same_instant_yields_distinct_ids() {
        let (project, source, target) = ids();
        let now = Utc::now();

        let a = DependencyId::generate(&project, &source, &target, now);
        let b = DependencyId::generate(&project, &source, &target, now);
        assert_ne!(a, b);
    }

    #[test]
    fn invalid_dependency_ids() {
        assert!("x-0123456789ab".parse::<DependencyId>().is_err());
        assert!("d-0123".parse::<DependencyId>().is_err());
        assert!("d-0123456789AB".parse::<DependencyId>().is_err());
        assert!("d-0123456789zz".parse::<DependencyId>().is_err());
    }

    #[test]
    fn project_id_validation() {
        assert!("site-42_phase.1".parse::<ProjectId>().is_ok());
        assert!("".parse::<ProjectId>().is_err());
        assert!(".hidden".parse::<ProjectId>().is_err());
        assert!("../escape".parse::<ProjectId>().is_err());
        assert!("has space".parse::<ProjectId>().is_err());
    }

    #[test]
    fn task_id_is_opaque() {
        let id: TaskId = "WBS 1.2.3 / pour slab".parse().unwrap();
        assert_eq!(id.as_str(), "WBS 1.2.3 / pour slab");
        assert_eq!("   ".parse::<TaskId>(), Err(IdError::EmptyTaskId));
    }

    #[test]
    fn serde_roundtrip_uses_string_form() {
        let (project, source, target) = ids();
        let id = DependencyId::generate(&project, &source, &target, Utc::now());

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id));

        let bad: Result<DependencyId, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }
}
