pub mod config;
pub mod pipeline;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use pipeline::completion::{
    BackendError, ChatMessage, CompletionError, CompletionInvoker, GroqClient, ResponseOptions,
};
use pipeline::dataset::{DatasetError, DatasetLayout, HubSnapshotSource};
use pipeline::file_index::Stage;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Completion error: {0}")]
    Completion(#[from] CompletionError),
}

/// Install the global tracing subscriber (no-op if one is already set).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

/// Resume point of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageStatus {
    pub stage: String,
    pub latest: Option<std::path::PathBuf>,
    /// `None` when the stage is full up to the scan ceiling.
    pub next: Option<std::path::PathBuf>,
}

/// Latest and next slot for each stage in `stages`.
pub fn stage_status(layout: &DatasetLayout, stages: &[Stage<'_>]) -> Vec<StageStatus> {
    let resolver = layout.resolver();
    stages
        .iter()
        .map(|&stage| StageStatus {
            stage: stage.to_string(),
            latest: resolver.latest_filename(stage, false),
            next: resolver.next_filename(stage),
        })
        .collect()
}

/// Resolve the dataset layout and report where each stage resumes.
pub fn run_status(config: &config::AppConfig) -> Result<Vec<StageStatus>, AppError> {
    let source = HubSnapshotSource::default_hub()?;
    let layout = DatasetLayout::from_config(config, &source)?;

    tracing::info!(
        dataset = layout.dataset(),
        snapshot = layout.snapshot(),
        data_dir = %layout.data_dir().display(),
        "Dataset resolved"
    );

    let statuses = stage_status(&layout, &[Stage::FULL, Stage::FILTERED]);
    for status in &statuses {
        tracing::info!(
            stage = %status.stage,
            latest = ?status.latest,
            next = ?status.next,
            "Stage resume point"
        );
        if status.next.is_none() {
            tracing::warn!(stage = %status.stage, "Stage has no free slot below the scan ceiling");
        }
    }
    Ok(statuses)
}

/// Send one prompt through the resilient invoker.
pub fn run_ask(
    config: &config::AppConfig,
    system: Option<&str>,
    prompt: &str,
    options: &ResponseOptions,
) -> Result<String, AppError> {
    let client = GroqClient::from_config(config)?;
    let mut invoker = CompletionInvoker::from_config(client, config);
    tracing::info!(model = invoker.current_model(), "Model selected");

    let mut conversation = Vec::with_capacity(2);
    if let Some(system) = system {
        conversation.push(ChatMessage::system(system));
    }
    conversation.push(ChatMessage::user(prompt));

    Ok(invoker.get_response(&conversation, options)?)
}
