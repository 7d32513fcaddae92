use anyhow::Context;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use recsys_api::{
    config::Config,
    ml::{Embedder, HuggingFaceConfig, HuggingFaceEmbedder},
    services::{ModelKind, ModelRunner, RunRequest},
};
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Generate recommendations with one or more models and store them in SQLite.
#[derive(Debug, Parser)]
#[command(name = "generate-recommendations")]
struct Cli {
    /// Models to run, in order (item_similarity, random)
    #[arg(long, num_args = 1.., default_value = "random")]
    models: Vec<String>,

    /// Number of recommendations to generate per target
    #[arg(long, default_value_t = 10)]
    top_n: usize,

    /// Seed for the random model
    #[arg(long)]
    seed: Option<u64>,

    /// Directory containing users.csv and items.csv
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// SQLite database to write into
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Texts per embedding request for item_similarity
    #[arg(long)]
    batch_size: Option<usize>,
}

fn build_embedder(config: &Config) -> anyhow::Result<Arc<dyn Embedder>> {
    let hf_config = HuggingFaceConfig::from_config(config)
        .context("item_similarity needs APP_HUGGINGFACE_API_KEY")?;
    let embedder = HuggingFaceEmbedder::new(hf_config)?;
    Ok(Arc::new(embedder))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "recsys_api=info,generate_recommendations=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load().context("failed to load configuration")?;

    let request = RunRequest {
        models: cli.models.clone(),
        top_n: cli.top_n,
        seed: cli.seed,
        embedding_batch_size: cli.batch_size.unwrap_or(config.embedding_batch_size),
        data_dir: cli.data_dir.unwrap_or_else(|| config.data_dir.clone()),
        db_path: cli.db_path.unwrap_or_else(|| config.database_path.clone()),
    };

    info!("🚀 Starting recommendation generation...");
    info!("📁 Data directory: {}", request.data_dir.display());
    info!("🗄️  Database: {}", request.db_path.display());
    info!("🤖 Models: {}", request.models.join(", "));

    let needs_embedder = request
        .models
        .iter()
        .any(|name| name == ModelKind::ItemSimilarity.as_str());
    let embedder = if needs_embedder {
        Some(build_embedder(&config)?)
    } else {
        None
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}"));
    spinner.set_message("Generating recommendations...");
    spinner.enable_steady_tick(100);

    let result = ModelRunner::new(embedder).run(&request).await;
    spinner.finish_and_clear();

    let runs = match result {
        Ok(runs) => runs,
        Err(e) => {
            error!("❌ Generation failed, nothing was stored: {}", e);
            return Err(e).context("recommendation generation failed");
        }
    };

    for run in &runs {
        println!(
            "{} Stored {} recommendation rows for model '{}'",
            style("✔").green().bold(),
            style(run.rows).bold(),
            style(run.model).cyan()
        );
    }

    info!("🎉 Generation complete for {} model(s)", runs.len());
    Ok(())
}
