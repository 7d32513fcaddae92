use crate::error::Result;
use async_trait::async_trait;
use ndarray::{Array2, Axis};

/// Turns text into fixed-width, L2-normalized vectors.
///
/// Implementations must return exactly one row per input text, in input order,
/// and must be deterministic for a fixed model artifact.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Name of the underlying model, for logging.
    fn model_name(&self) -> &str;

    async fn embed(&self, texts: &[String]) -> Result<Array2<f32>>;
}

/// Scales every row of `matrix` to unit length. Zero rows stay zero.
pub fn normalize_rows(matrix: &mut Array2<f32>) {
    for mut row in matrix.axis_iter_mut(Axis(0)) {
        let magnitude = row.dot(&row).sqrt();
        if magnitude > 0.0 {
            row.mapv_inplace(|x| x / magnitude);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rows_become_unit_length() {
        let mut m = array![[3.0_f32, 4.0], [0.0, 2.0]];
        normalize_rows(&mut m);
        assert!((m[[0, 0]] - 0.6).abs() < 1e-6);
        assert!((m[[0, 1]] - 0.8).abs() < 1e-6);
        assert!((m[[1, 1]] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_rows_are_left_alone() {
        let mut m = array![[0.0_f32, 0.0]];
        normalize_rows(&mut m);
        assert_eq!(m, array![[0.0_f32, 0.0]]);
    }
}
