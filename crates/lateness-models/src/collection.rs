//! Collection schema and lifecycle state.

use serde::{Deserialize, Serialize};

use crate::DistanceMetric;

/// Configuration a collection is created with.
///
/// Every collection stores multi-vectors: each point holds a variable-length
/// sequence of `vector_dim`-dimensional token vectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub vector_dim: usize,
    #[serde(default)]
    pub distance: DistanceMetric,
    /// Storage placement hint; does not affect results.
    #[serde(default)]
    pub on_disk: bool,
    #[serde(default = "default_multi_vector")]
    pub multi_vector: bool,
}

fn default_multi_vector() -> bool {
    true
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>, vector_dim: usize) -> Self {
        Self {
            name: name.into(),
            vector_dim,
            distance: DistanceMetric::default(),
            on_disk: false,
            multi_vector: true,
        }
    }

    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_on_disk(mut self, on_disk: bool) -> Self {
        self.on_disk = on_disk;
        self
    }
}

/// Lifecycle of a collection as observed from the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionState {
    NotCreated,
    Created,
    Populated,
    Searchable,
}

impl CollectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionState::NotCreated => "not_created",
            CollectionState::Created => "created",
            CollectionState::Populated => "populated",
            CollectionState::Searchable => "searchable",
        }
    }
}

impl std::fmt::Display for CollectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_defaults() {
        let schema = CollectionSchema::new("docs", 128);
        assert_eq!(schema.distance, DistanceMetric::Cosine);
        assert!(!schema.on_disk);
        assert!(schema.multi_vector);
    }

    #[test]
    fn test_schema_deserialize_defaults() {
        let schema: CollectionSchema =
            serde_json::from_str(r#"{"name": "docs", "vector_dim": 64}"#).unwrap();
        assert_eq!(schema, CollectionSchema::new("docs", 64));
    }
}
