use event_api::EventError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("subscription ({topic}): {source}")]
    Subscription { topic: String, source: EventError },

    #[error("commit ({topic}/{partition}@{offset}): {source}")]
    Commit { topic: String, partition: i32, offset: i64, source: EventError },

    #[error("handler ({topic}/{partition}@{offset}): {source}")]
    Handler { topic: String, partition: i32, offset: i64, source: EventError },
}
