pub mod embedder;
pub mod huggingface_embedder;
pub mod similarity;

pub use embedder::{normalize_rows, Embedder};
pub use huggingface_embedder::{HuggingFaceConfig, HuggingFaceEmbedder};
pub use similarity::SimilarityEngine;
