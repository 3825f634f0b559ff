use event_api::EventError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Event(#[from] EventError),

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("registry: {0}")]
    Registry(#[from] schema_registry::RegistryError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),

    #[error("task: {0}")]
    Task(#[from] tokio::task::JoinError),
}
