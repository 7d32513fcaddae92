//! Generation models and the batch runner that persists their output.

use crate::{
    error::{ApiError, Result},
    ml::{similarity::DEFAULT_BATCH_SIZE, Embedder, SimilarityEngine},
    models::{RecommendationRow, Recommendations},
    services::{
        catalog::{CsvCatalog, EntityCatalog},
        random_baseline::{rng_for, RandomBaseline},
        store::RecommendationStore,
    },
};
use chrono::Utc;
use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};
use tracing::info;

/// Every generation model this service knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModelKind {
    Random,
    ItemSimilarity,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::ItemSimilarity, ModelKind::Random];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelKind::Random => "random",
            ModelKind::ItemSimilarity => "item_similarity",
        }
    }

    /// Model names in sorted order, for help text and error messages.
    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|kind| kind.as_str()).collect()
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ApiError::UnknownModel {
                name: s.to_string(),
                available: Self::names(),
            })
    }
}

#[derive(Debug, Clone, Default)]
pub struct RandomConfig {
    pub seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct SimilarityConfig {
    pub batch_size: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// A model together with its own configuration.
#[derive(Debug, Clone)]
pub enum ModelSpec {
    Random(RandomConfig),
    ItemSimilarity(SimilarityConfig),
}

impl ModelSpec {
    /// Builds the configuration for `kind` from the invocation-wide settings.
    pub fn new(kind: ModelKind, seed: Option<u64>, batch_size: usize) -> Self {
        match kind {
            ModelKind::Random => ModelSpec::Random(RandomConfig { seed }),
            // similarity is deterministic and ignores the seed
            ModelKind::ItemSimilarity => ModelSpec::ItemSimilarity(SimilarityConfig { batch_size }),
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::Random(_) => ModelKind::Random,
            ModelSpec::ItemSimilarity(_) => ModelKind::ItemSimilarity,
        }
    }

    /// Produces ranked candidates for every target this model covers.
    pub async fn generate(
        &self,
        top_n: usize,
        catalog: &dyn EntityCatalog,
        embedder: Option<&dyn Embedder>,
    ) -> Result<Recommendations> {
        if top_n < 1 {
            return Err(ApiError::InvalidRequest(
                "top_n must be at least 1".to_string(),
            ));
        }

        match self {
            ModelSpec::Random(config) => {
                let user_ids = catalog.list_user_ids().await?;
                let item_ids = catalog.list_item_ids().await?;
                let mut rng = rng_for(config.seed);
                RandomBaseline::new(user_ids, item_ids).recommend(top_n, &mut rng)
            }
            ModelSpec::ItemSimilarity(config) => {
                let embedder = embedder.ok_or_else(|| {
                    ApiError::MissingPrerequisite(
                        "item_similarity requires an embedding provider".to_string(),
                    )
                })?;
                let items = catalog.list_item_texts().await?;
                SimilarityEngine::new(embedder)
                    .with_batch_size(config.batch_size)
                    .compute(&items, top_n)
                    .await
            }
        }
    }
}

/// Parameters of one batch invocation.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub models: Vec<String>,
    pub top_n: usize,
    pub seed: Option<u64>,
    pub embedding_batch_size: usize,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

/// Rows written for one model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelRun {
    pub model: ModelKind,
    pub rows: usize,
}

/// Runs generation models and stores their output in a single transaction.
pub struct ModelRunner {
    embedder: Option<Arc<dyn Embedder>>,
}

impl ModelRunner {
    pub fn new(embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self { embedder }
    }

    /// Validates `request`, then generates and persists every requested model.
    ///
    /// Nothing is committed unless every model succeeds.
    pub async fn run(&self, request: &RunRequest) -> Result<Vec<ModelRun>> {
        let specs = self.prepare(request)?;
        let store = RecommendationStore::connect(&request.db_path).await?;
        let catalog = CsvCatalog::new(&request.data_dir);
        self.run_with(&store, &catalog, &specs, request.top_n).await
    }

    /// Checks everything that can be checked before any computation starts.
    pub fn prepare(&self, request: &RunRequest) -> Result<Vec<ModelSpec>> {
        ensure_exists(&request.db_path, "Database")?;
        ensure_exists(&request.data_dir, "Data directory")?;

        if request.top_n < 1 {
            return Err(ApiError::InvalidRequest(
                "top_n must be at least 1".to_string(),
            ));
        }

        let specs = request
            .models
            .iter()
            .map(|name| {
                name.parse()
                    .map(|kind| ModelSpec::new(kind, request.seed, request.embedding_batch_size))
            })
            .collect::<Result<Vec<_>>>()?;

        if self.embedder.is_none()
            && specs
                .iter()
                .any(|spec| spec.kind() == ModelKind::ItemSimilarity)
        {
            return Err(ApiError::MissingPrerequisite(
                "item_similarity requires an embedding provider".to_string(),
            ));
        }

        Ok(specs)
    }

    /// Generates each model in order against `catalog` and upserts into `store`.
    pub async fn run_with(
        &self,
        store: &RecommendationStore,
        catalog: &dyn EntityCatalog,
        specs: &[ModelSpec],
        top_n: usize,
    ) -> Result<Vec<ModelRun>> {
        store.ensure_schema().await?;

        let generated_at = Utc::now();
        let mut tx = store.begin().await?;
        let mut runs = Vec::with_capacity(specs.len());

        for spec in specs {
            let kind = spec.kind();
            info!("Running model '{}' with top_n={}", kind, top_n);

            let recommendations = spec
                .generate(top_n, catalog, self.embedder.as_deref())
                .await?;
            let rows = RecommendationRow::from_recommendations(kind.as_str(), &recommendations);
            let written = RecommendationStore::upsert_in(&mut tx, &rows, generated_at).await?;

            info!("Model '{}' produced {} target rows", kind, written);
            runs.push(ModelRun {
                model: kind,
                rows: written,
            });
        }

        tx.commit().await?;
        Ok(runs)
    }
}

fn ensure_exists(path: &Path, what: &str) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(ApiError::MissingPrerequisite(format!(
            "{} not found: {}",
            what,
            path.display()
        )))
    }
}
