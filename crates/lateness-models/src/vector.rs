//! Token matrices and the similarity metrics defined over them.

use serde::{Deserialize, Serialize};

/// Shape violations when building token matrices.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShapeError {
    #[error("Token sequence is empty")]
    Empty,

    #[error("Vector dimension must be non-zero")]
    ZeroDimension,

    #[error("Row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Flat buffer of {len} values is not a multiple of dimension {dim}")]
    FlatLength { len: usize, dim: usize },

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("No arena entry at index {0}")]
    UnknownEntry(usize),
}

/// Similarity metric for a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Dot,
    Euclidean,
}

impl DistanceMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::Cosine => "cosine",
            DistanceMetric::Dot => "dot",
            DistanceMetric::Euclidean => "euclidean",
        }
    }

    /// Higher-is-better similarity between two vectors of equal length.
    ///
    /// Cosine and dot are returned as-is; euclidean distance is negated.
    /// Cosine against a zero vector is 0.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        debug_assert_eq!(a.len(), b.len());
        match self {
            DistanceMetric::Dot => dot(a, b),
            DistanceMetric::Cosine => {
                let norms = norm(a) * norm(b);
                if norms > 0.0 {
                    dot(a, b) / norms
                } else {
                    0.0
                }
            }
            DistanceMetric::Euclidean => {
                let sq: f32 = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum();
                -sq.sqrt()
            }
        }
    }
}

impl std::str::FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" | "dotproduct" | "dot_product" => Ok(Self::Dot),
            "euclidean" | "euclid" | "l2" => Ok(Self::Euclidean),
            _ => Err(format!("Unknown distance metric: {}", s)),
        }
    }
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(a: &[f32]) -> f32 {
    dot(a, a).sqrt()
}

/// An ordered, non-empty sequence of fixed-dimension token embeddings.
///
/// Rows are stored back to back in one flat buffer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMultiVector")]
pub struct MultiVector {
    dim: usize,
    data: Vec<f32>,
}

/// Unchecked wire form of [`MultiVector`].
#[derive(Deserialize)]
struct RawMultiVector {
    dim: usize,
    data: Vec<f32>,
}

impl TryFrom<RawMultiVector> for MultiVector {
    type Error = ShapeError;

    fn try_from(raw: RawMultiVector) -> Result<Self, Self::Error> {
        Self::from_flat(raw.dim, raw.data)
    }
}

impl MultiVector {
    /// Build from one `Vec` per token.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self, ShapeError> {
        let first = rows.first().ok_or(ShapeError::Empty)?;
        let dim = first.len();
        if dim == 0 {
            return Err(ShapeError::ZeroDimension);
        }

        let mut data = Vec::with_capacity(dim * rows.len());
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != dim {
                return Err(ShapeError::RaggedRow {
                    row,
                    expected: dim,
                    found: values.len(),
                });
            }
            data.extend(values);
        }

        Ok(Self { dim, data })
    }

    /// Build from a flat row-major buffer.
    pub fn from_flat(dim: usize, data: Vec<f32>) -> Result<Self, ShapeError> {
        if dim == 0 {
            return Err(ShapeError::ZeroDimension);
        }
        if data.is_empty() {
            return Err(ShapeError::Empty);
        }
        if data.len() % dim != 0 {
            return Err(ShapeError::FlatLength {
                len: data.len(),
                dim,
            });
        }
        Ok(Self { dim, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Always false for a constructed value; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        self.view().row(index)
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.data.chunks_exact(self.dim)
    }

    pub fn as_flat(&self) -> &[f32] {
        &self.data
    }

    pub fn into_flat(self) -> Vec<f32> {
        self.data
    }

    pub fn to_rows(&self) -> Vec<Vec<f32>> {
        self.rows().map(<[f32]>::to_vec).collect()
    }

    pub fn view(&self) -> MultiVectorView<'_> {
        MultiVectorView {
            dim: self.dim,
            data: &self.data,
        }
    }

    /// Fail unless every token has dimension `expected`.
    pub fn check_dim(&self, expected: usize) -> Result<(), ShapeError> {
        if self.dim != expected {
            return Err(ShapeError::DimensionMismatch {
                expected,
                found: self.dim,
            });
        }
        Ok(())
    }
}

/// Borrowed token matrix, either from a [`MultiVector`] or a [`RaggedArena`](crate::RaggedArena) entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiVectorView<'a> {
    dim: usize,
    data: &'a [f32],
}

impl<'a> MultiVectorView<'a> {
    pub(crate) fn new(dim: usize, data: &'a [f32]) -> Self {
        Self { dim, data }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn row(&self, index: usize) -> Option<&'a [f32]> {
        let start = index.checked_mul(self.dim)?;
        self.data.get(start..start + self.dim)
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'a, f32> {
        self.data.chunks_exact(self.dim)
    }

    pub fn as_flat(&self) -> &'a [f32] {
        self.data
    }

    pub fn to_owned(&self) -> MultiVector {
        MultiVector {
            dim: self.dim,
            data: self.data.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_from_rows_flattens() {
        let mv = MultiVector::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        assert_eq!(mv.dim(), 2);
        assert_eq!(mv.len(), 2);
        assert_eq!(mv.as_flat(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(mv.row(1), Some(&[3.0, 4.0][..]));
        assert_eq!(mv.row(2), None);
    }

    #[test]
    fn test_from_rows_rejects_bad_shapes() {
        assert_eq!(MultiVector::from_rows(vec![]), Err(ShapeError::Empty));
        assert_eq!(
            MultiVector::from_rows(vec![vec![]]),
            Err(ShapeError::ZeroDimension)
        );
        assert_eq!(
            MultiVector::from_rows(vec![vec![1.0, 2.0], vec![1.0]]),
            Err(ShapeError::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn test_from_flat_checks_length() {
        assert!(MultiVector::from_flat(3, vec![0.0; 6]).is_ok());
        assert_eq!(
            MultiVector::from_flat(3, vec![0.0; 5]),
            Err(ShapeError::FlatLength { len: 5, dim: 3 })
        );
        assert_eq!(MultiVector::from_flat(3, vec![]), Err(ShapeError::Empty));
    }

    #[test]
    fn test_deserialize_enforces_shape() {
        let mv: MultiVector = serde_json::from_str(r#"{"dim":2,"data":[1.0,2.0,3.0,4.0]}"#).unwrap();
        assert_eq!(mv.len(), 2);

        assert!(serde_json::from_str::<MultiVector>(r#"{"dim":0,"data":[]}"#).is_err());
        assert!(serde_json::from_str::<MultiVector>(r#"{"dim":3,"data":[1.0,2.0]}"#).is_err());
        assert!(serde_json::from_str::<MultiVector>(r#"{"dim":3,"data":[]}"#).is_err());
    }

    #[test]
    fn test_check_dim() {
        let mv = MultiVector::from_rows(vec![vec![1.0, 0.0, 0.0]]).unwrap();
        assert!(mv.check_dim(3).is_ok());
        assert_eq!(
            mv.check_dim(4),
            Err(ShapeError::DimensionMismatch {
                expected: 4,
                found: 3
            })
        );
    }

    #[rstest]
    #[case(DistanceMetric::Cosine, 1.0)]
    #[case(DistanceMetric::Dot, 4.0)]
    #[case(DistanceMetric::Euclidean, 0.0)]
    fn test_similarity_parallel_vectors(#[case] metric: DistanceMetric, #[case] expected: f32) {
        let sim = metric.similarity(&[2.0, 0.0], &[2.0, 0.0]);
        assert!((sim - expected).abs() < 1e-6);
    }

    #[test]
    fn test_euclidean_is_negated_distance() {
        let sim = DistanceMetric::Euclidean.similarity(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((sim + 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vector() {
        assert_eq!(DistanceMetric::Cosine.similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_metric_parsing() {
        assert_eq!("cosine".parse::<DistanceMetric>().unwrap(), DistanceMetric::Cosine);
        assert_eq!("DOT".parse::<DistanceMetric>().unwrap(), DistanceMetric::Dot);
        assert_eq!(
            "euclid".parse::<DistanceMetric>().unwrap(),
            DistanceMetric::Euclidean
        );
        assert!("manhattan".parse::<DistanceMetric>().is_err());
        assert_eq!(DistanceMetric::default(), DistanceMetric::Cosine);
    }
}
