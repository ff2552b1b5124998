//! Host-supplied limits on dependency mutations
//!
//! Licensing or demo restrictions live in the host application; the engine
//! only sees the resulting limits, passed explicitly into each mutation.

use serde::{Deserialize, Serialize};

use super::dependency::DependencyType;

/// Limits applied by `DependencyRepository` mutations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DependencyPolicy {
    /// Maximum number of edges a project may hold (`None` = unlimited)
    pub max_edges_per_project: Option<usize>,

    /// Relationship types that may be created (`None` = all four)
    pub allowed_types: Option<Vec<DependencyType>>,
}

impl DependencyPolicy {
    /// No limits
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn with_max_edges(mut self, max: usize) -> Self {
        self.max_edges_per_project = Some(max);
        self
    }

    pub fn with_allowed_types(mut self, types: impl IntoIterator<Item = DependencyType>) -> Self {
        self.allowed_types = Some(types.into_iter().collect());
        self
    }

    /// Returns true if edges of this type may be created or set
    pub fn allows_type(&self, dep_type: DependencyType) -> bool {
        self.allowed_types
            .as_ref()
            .map_or(true, |types| types.contains(&dep_type))
    }

    /// Returns true if a project already holding `current` edges may take one more
    pub fn allows_another_edge(&self, current: usize) -> bool {
        self.max_edges_per_project.map_or(true, |max| current < max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrestricted_allows_everything() {
        let policy = DependencyPolicy::unrestricted();
        assert!(DependencyType::ALL.iter().all(|t| policy.allows_type(*t)));
        assert!(policy.allows_another_edge(usize::MAX - 1));
    }

    #[test]
    fn type_allow_list() {
        let policy = DependencyPolicy::default().with_allowed_types([DependencyType::FinishToStart]);
        assert!(policy.allows_type(DependencyType::FinishToStart));
        assert!(!policy.allows_type(DependencyType::StartToFinish));
    }

    #[test]
    fn edge_quota() {
        let policy = DependencyPolicy::default().with_max_edges(2);
        assert!(policy.allows_another_edge(1));
        assert!(!policy.allows_another_edge(2));
    }

    #[test]
    fn parses_from_toml() {
        let policy: DependencyPolicy = toml::from_str(
            r#"
max_edges_per_project = 10
allowed_types = ["FS", "SS"]
"#,
        )
        .unwrap();

        assert_eq!(policy.max_edges_per_project, Some(10));
        assert!(policy.allows_type(DependencyType::StartToStart));
        assert!(!policy.allows_type(DependencyType::FinishToFinish));
    }
}
