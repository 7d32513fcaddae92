//! Item-to-item recommendations from cosine similarity over text embeddings.

use crate::{
    error::{ApiError, Result},
    ml::embedder::Embedder,
    models::{ItemText, Recommendations, TargetKey},
};
use ndarray::{concatenate, Array2, ArrayView1, Axis};
use std::cmp::Ordering;
use tracing::{debug, info};

/// Texts sent to the embedder per request.
pub const DEFAULT_BATCH_SIZE: usize = 32;

pub struct SimilarityEngine<'a> {
    embedder: &'a dyn Embedder,
    batch_size: usize,
}

impl<'a> SimilarityEngine<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self {
            embedder,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Recommends up to `top_n` other items for every item in `items`.
    ///
    /// Embeddings are recomputed for the whole set on every call.
    pub async fn compute(&self, items: &[ItemText], top_n: usize) -> Result<Recommendations> {
        if top_n < 1 {
            return Err(ApiError::InvalidRequest(
                "top_n must be at least 1".to_string(),
            ));
        }
        if items.is_empty() {
            return Ok(Recommendations::new());
        }

        info!(
            "Computing embeddings for {} items with {}",
            items.len(),
            self.embedder.model_name()
        );
        let texts: Vec<String> = items.iter().map(|item| item.text.clone()).collect();
        let embeddings = self.embed_in_batches(&texts).await?;
        debug!("Embedding dimension: {}", embeddings.ncols());

        let similarity = similarity_matrix(&embeddings);
        let item_ids: Vec<i64> = items.iter().map(|item| item.id).collect();
        top_n_similar(&similarity, &item_ids, top_n)
    }

    async fn embed_in_batches(&self, texts: &[String]) -> Result<Array2<f32>> {
        let total_batches = texts.len().div_ceil(self.batch_size);
        let mut batches = Vec::with_capacity(total_batches);

        for (batch_index, chunk) in texts.chunks(self.batch_size).enumerate() {
            let batch = self.embedder.embed(chunk).await?;
            if batch.nrows() != chunk.len() {
                return Err(ApiError::ModelInference(format!(
                    "Embedder returned {} vectors for {} texts",
                    batch.nrows(),
                    chunk.len()
                )));
            }
            debug!("Embedded batch {}/{}", batch_index + 1, total_batches);
            batches.push(batch);
        }

        let views: Vec<_> = batches.iter().map(|batch| batch.view()).collect();
        Ok(concatenate(Axis(0), &views)?)
    }
}

/// Pairwise cosine similarity of row-normalized embeddings.
pub fn similarity_matrix(embeddings: &Array2<f32>) -> Array2<f32> {
    embeddings.dot(&embeddings.t())
}

/// Extracts the `top_n` most similar other items for every row of `similarity`.
///
/// Each row goes through two phases: a partial selection that moves the
/// `top_n + 1` best columns to the front without ordering the rest, then a
/// sort of just that shortlist. The extra slot absorbs the row's own item,
/// which is skipped by id. Equal scores come out in no particular order.
pub fn top_n_similar(
    similarity: &Array2<f32>,
    item_ids: &[i64],
    top_n: usize,
) -> Result<Recommendations> {
    let num_items = item_ids.len();
    if similarity.dim() != (num_items, num_items) {
        return Err(ApiError::ModelInference(format!(
            "Similarity matrix shape {:?} does not match {} items",
            similarity.dim(),
            num_items
        )));
    }

    let mut recommendations = Recommendations::new();
    for (idx, &item_id) in item_ids.iter().enumerate() {
        let key = TargetKey::item(item_id);
        if num_items <= 1 {
            recommendations.insert(key, Vec::new());
            continue;
        }

        let shortlist = shortlist(similarity.row(idx), top_n.saturating_add(1));
        let similar_items: Vec<i64> = shortlist
            .into_iter()
            .map(|candidate_idx| item_ids[candidate_idx])
            .filter(|&candidate_id| candidate_id != item_id)
            .take(top_n)
            .collect();

        recommendations.insert(key, similar_items);
    }

    Ok(recommendations)
}

/// Column indices of the `count` highest scores, best first.
fn shortlist(scores: ArrayView1<'_, f32>, count: usize) -> Vec<usize> {
    let by_score_desc = |a: &usize, b: &usize| -> Ordering { scores[*b].total_cmp(&scores[*a]) };

    let mut indices: Vec<usize> = (0..scores.len()).collect();
    let count = count.min(indices.len());
    if count < indices.len() {
        indices.select_nth_unstable_by(count - 1, by_score_desc);
        indices.truncate(count);
    }
    indices.sort_unstable_by(by_score_desc);
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ndarray::array;

    struct FixedEmbedder(Array2<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }

        async fn embed(&self, _texts: &[String]) -> Result<Array2<f32>> {
            Ok(self.0.clone())
        }
    }

    fn items(ids: &[i64]) -> Vec<ItemText> {
        ids.iter()
            .map(|&id| ItemText::from_parts(id, Some("title"), None))
            .collect()
    }

    fn near_pair_embeddings() -> Array2<f32> {
        // items 1 and 2 nearly identical, item 3 orthogonal but leaning toward 1
        let mut m = array![[1.0_f32, 0.0, 0.0], [0.99, 0.141, 0.0], [0.1, 0.0, 0.995],];
        crate::ml::normalize_rows(&mut m);
        m
    }

    #[tokio::test]
    async fn near_identical_items_recommend_each_other() {
        let embedder = FixedEmbedder(near_pair_embeddings());
        let engine = SimilarityEngine::new(&embedder);

        let recs = engine.compute(&items(&[1, 2, 3]), 1).await.unwrap();

        assert_eq!(recs[&TargetKey::item(1)], vec![2]);
        assert_eq!(recs[&TargetKey::item(2)], vec![1]);
        assert_eq!(recs[&TargetKey::item(3)], vec![1]);
    }

    #[tokio::test]
    async fn single_item_gets_empty_list() {
        let embedder = FixedEmbedder(array![[1.0_f32, 0.0]]);
        let engine = SimilarityEngine::new(&embedder);

        let recs = engine.compute(&items(&[42]), 5).await.unwrap();

        assert_eq!(recs.len(), 1);
        assert!(recs[&TargetKey::item(42)].is_empty());
    }

    #[tokio::test]
    async fn zero_top_n_is_rejected() {
        let embedder = FixedEmbedder(array![[1.0_f32, 0.0]]);
        let engine = SimilarityEngine::new(&embedder);

        let err = engine.compute(&items(&[1]), 0).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn embedder_row_count_must_match_items() {
        let embedder = FixedEmbedder(array![[1.0_f32, 0.0]]);
        let engine = SimilarityEngine::new(&embedder);

        let err = engine.compute(&items(&[1, 2]), 1).await.unwrap_err();
        assert!(matches!(err, ApiError::ModelInference(_)));
    }

    /// Hands out consecutive rows of a fixed matrix, one call per batch.
    struct BatchCountingEmbedder {
        rows: Array2<f32>,
        calls: std::sync::Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Embedder for BatchCountingEmbedder {
        fn model_name(&self) -> &str {
            "batch-counting"
        }

        async fn embed(&self, texts: &[String]) -> Result<Array2<f32>> {
            let mut calls = self.calls.lock().unwrap();
            let start: usize = calls.iter().sum();
            calls.push(texts.len());
            Ok(self
                .rows
                .slice(ndarray::s![start..start + texts.len(), ..])
                .to_owned())
        }
    }

    #[tokio::test]
    async fn batched_embeddings_match_a_single_pass() {
        let rows = near_pair_embeddings();
        let batched = BatchCountingEmbedder {
            rows: rows.clone(),
            calls: std::sync::Mutex::new(Vec::new()),
        };
        let whole = FixedEmbedder(rows);

        let from_batches = SimilarityEngine::new(&batched)
            .with_batch_size(2)
            .compute(&items(&[1, 2, 3]), 2)
            .await
            .unwrap();
        let from_whole = SimilarityEngine::new(&whole)
            .compute(&items(&[1, 2, 3]), 2)
            .await
            .unwrap();

        assert_eq!(from_batches, from_whole);
        assert_eq!(*batched.calls.lock().unwrap(), vec![2, 1]);
    }

    #[test]
    fn results_exclude_self_and_respect_bounds() {
        let embeddings = array![
            [1.0_f32, 0.0, 0.0, 0.0],
            [0.8, 0.6, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.6, 0.8, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        let ids = [10, 11, 12, 13, 14];
        let similarity = similarity_matrix(&embeddings);

        for top_n in 1..=7 {
            let recs = top_n_similar(&similarity, &ids, top_n).unwrap();
            for &id in &ids {
                let list = &recs[&TargetKey::item(id)];
                assert!(!list.contains(&id));
                assert!(list.len() <= top_n);
                assert!(list.len() <= ids.len() - 1);
            }
        }
    }

    #[test]
    fn fewer_candidates_than_top_n_are_not_padded() {
        let similarity = similarity_matrix(&array![[1.0_f32, 0.0], [0.0, 1.0]]);
        let recs = top_n_similar(&similarity, &[1, 2], 10).unwrap();

        assert_eq!(recs[&TargetKey::item(1)], vec![2]);
        assert_eq!(recs[&TargetKey::item(2)], vec![1]);
    }

    #[test]
    fn largest_top_n_returns_every_other_item() {
        let similarity = similarity_matrix(&array![[1.0_f32, 0.0], [0.0, 1.0]]);
        let recs = top_n_similar(&similarity, &[1, 2], usize::MAX).unwrap();

        assert_eq!(recs[&TargetKey::item(1)], vec![2]);
        assert_eq!(recs[&TargetKey::item(2)], vec![1]);
    }

    #[test]
    fn results_are_in_descending_score_order() {
        let similarity = array![
            [1.0_f32, 0.2, 0.9, 0.5],
            [0.2, 1.0, 0.1, 0.3],
            [0.9, 0.1, 1.0, 0.4],
            [0.5, 0.3, 0.4, 1.0],
        ];
        let recs = top_n_similar(&similarity, &[1, 2, 3, 4], 3).unwrap();

        assert_eq!(recs[&TargetKey::item(1)], vec![3, 4, 2]);
        assert_eq!(recs[&TargetKey::item(2)], vec![4, 1, 3]);
    }

    #[test]
    fn tied_scores_yield_some_valid_candidate() {
        // Tie order is unspecified; only membership is checked.
        let similarity = array![[1.0_f32, 0.5, 0.5], [0.5, 1.0, 0.5], [0.5, 0.5, 1.0]];
        let recs = top_n_similar(&similarity, &[1, 2, 3], 1).unwrap();

        let first = &recs[&TargetKey::item(1)];
        assert_eq!(first.len(), 1);
        assert!(first[0] == 2 || first[0] == 3);
    }

    #[test]
    fn mismatched_matrix_is_rejected() {
        let similarity = Array2::<f32>::zeros((2, 2));
        assert!(top_n_similar(&similarity, &[1, 2, 3], 1).is_err());
    }
}
