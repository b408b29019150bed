//! MaxSim aggregation and ranking.
//!
//! `score(d) = Σ_i max_j sim(q_i, t_j)` over query tokens `q_i` and document
//! tokens `t_j`, with `sim` oriented so higher is better for every metric.

use std::cmp::Ordering;

use lateness_models::{DistanceMetric, MultiVector, SearchResult};

use crate::error::{Error, Result};

/// Exact late-interaction scorer for one distance metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scorer {
    metric: DistanceMetric,
}

impl Scorer {
    pub fn new(metric: DistanceMetric) -> Self {
        Self { metric }
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// MaxSim score of one document against a query.
    pub fn score(&self, query: &MultiVector, doc: &MultiVector) -> Result<f32> {
        if query.dim() != doc.dim() {
            return Err(Error::InvalidInput(format!(
                "query dimension {} does not match document dimension {}",
                query.dim(),
                doc.dim()
            )));
        }

        let mut maxima: Vec<f32> = query
            .rows()
            .map(|q| {
                doc.rows()
                    .map(|t| self.metric.similarity(q, t))
                    .fold(f32::NEG_INFINITY, f32::max)
            })
            .collect();

        // Summation order is fixed by value so token order cannot change the result.
        maxima.sort_by(f32::total_cmp);
        Ok(maxima.iter().map(|&m| f64::from(m)).sum::<f64>() as f32)
    }

    /// Score every candidate and return the best `top_k`.
    pub fn rank<'d, I>(&self, query: &MultiVector, docs: I, top_k: usize) -> Result<Vec<SearchResult>>
    where
        I: IntoIterator<Item = (&'d str, &'d MultiVector)>,
    {
        let scored = docs
            .into_iter()
            .map(|(doc_id, tokens)| Ok((doc_id.to_string(), self.score(query, tokens)?)))
            .collect::<Result<Vec<_>>>()?;
        Ok(rank(scored, top_k))
    }
}

/// Order scores descending (ties by ascending doc id), assign ranks from 1
/// and keep the first `top_k`.
pub fn rank(mut scored: Vec<(String, f32)>, top_k: usize) -> Vec<SearchResult> {
    scored.sort_by(|(a_id, a), (b_id, b)| match b.total_cmp(a) {
        Ordering::Equal => a_id.cmp(b_id),
        other => other,
    });

    scored
        .into_iter()
        .take(top_k)
        .enumerate()
        .map(|(i, (doc_id, score))| SearchResult {
            doc_id,
            score,
            rank: i + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn mv(rows: Vec<Vec<f32>>) -> MultiVector {
        MultiVector::from_rows(rows).unwrap()
    }

    #[test]
    fn test_maxsim_sums_best_matches() {
        let query = mv(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        let doc = mv(vec![vec![1.0, 0.0], vec![0.6, 0.8]]);
        // q1 best = 1.0 (t1), q2 best = 0.8 (t2)
        let score = Scorer::new(DistanceMetric::Cosine).score(&query, &doc).unwrap();
        assert!((score - 1.8).abs() < 1e-6);
    }

    #[rstest]
    #[case(DistanceMetric::Cosine, 2.0)]
    #[case(DistanceMetric::Dot, 6.0)]
    #[case(DistanceMetric::Euclidean, -4.0)]
    fn test_metric_orientation(#[case] metric: DistanceMetric, #[case] expected: f32) {
        let query = mv(vec![vec![1.0, 0.0], vec![1.0, 0.0]]);
        let doc = mv(vec![vec![3.0, 0.0], vec![-1.0, 0.0]]);
        // cosine: 1 + 1; dot: 3 + 3; euclidean: -2 + -2
        let score = Scorer::new(metric).score(&query, &doc).unwrap();
        assert!((score - expected).abs() < 1e-6, "{} -> {}", metric, score);
    }

    #[test]
    fn test_zero_norm_cosine_is_zero() {
        let query = mv(vec![vec![0.0, 0.0]]);
        let doc = mv(vec![vec![1.0, 1.0]]);
        assert_eq!(Scorer::default().score(&query, &doc).unwrap(), 0.0);
    }

    #[test]
    fn test_permutation_invariance() {
        let scorer = Scorer::new(DistanceMetric::Dot);
        let q = vec![vec![0.3, 0.1], vec![-0.2, 0.9], vec![0.5, 0.5]];
        let d = vec![vec![0.1, 0.4], vec![0.7, -0.3]];

        let base = scorer.score(&mv(q.clone()), &mv(d.clone())).unwrap();

        let mut q_rev = q;
        q_rev.reverse();
        let mut d_rev = d;
        d_rev.reverse();
        let permuted = scorer.score(&mv(q_rev), &mv(d_rev)).unwrap();
        assert!((base - permuted).abs() < 1e-6);
    }

    #[test]
    fn test_query_token_order_is_bit_exact() {
        let scorer = Scorer::new(DistanceMetric::Dot);
        let doc = mv(vec![vec![1.0]]);

        let forward = scorer
            .score(&mv(vec![vec![1e8], vec![1.0], vec![-1e8]]), &doc)
            .unwrap();
        let swapped = scorer
            .score(&mv(vec![vec![1e8], vec![-1e8], vec![1.0]]), &doc)
            .unwrap();

        assert_eq!(forward, swapped);
        assert_eq!(forward, 1.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = Scorer::default().score(&mv(vec![vec![1.0]]), &mv(vec![vec![1.0, 0.0]]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_rank_orders_and_breaks_ties() {
        let results = rank(
            vec![
                ("doc_b".into(), 1.0),
                ("doc_c".into(), 2.0),
                ("doc_a".into(), 1.0),
            ],
            10,
        );
        let order: Vec<(&str, usize)> = results.iter().map(|r| (r.doc_id.as_str(), r.rank)).collect();
        assert_eq!(order, vec![("doc_c", 1), ("doc_a", 2), ("doc_b", 3)]);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(2, 2)]
    #[case(10, 3)]
    fn test_rank_top_k(#[case] top_k: usize, #[case] expected: usize) {
        let scored = vec![("a".into(), 0.1), ("b".into(), 0.2), ("c".into(), 0.3)];
        assert_eq!(rank(scored, top_k).len(), expected);
    }

    #[test]
    fn test_rank_over_documents() {
        let scorer = Scorer::new(DistanceMetric::Cosine);
        let query = mv(vec![vec![1.0, 0.0]]);
        let near = mv(vec![vec![1.0, 0.1]]);
        let far = mv(vec![vec![0.0, 1.0]]);

        let results = scorer
            .rank(&query, [("far", &far), ("near", &near)], 1)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].doc_id, "near");
        assert_eq!(results[0].rank, 1);
    }
}
