use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;

use event_api::{EventError, EventHandler};

/// Logs every record at info level.
pub struct LoggingHandler<T> {
    _record: PhantomData<fn(&T)>,
}

impl<T> LoggingHandler<T> {
    pub fn new() -> Self {
        Self { _record: PhantomData }
    }
}

impl<T> Default for LoggingHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Debug + Send + Sync> EventHandler<T> for LoggingHandler<T> {
    fn handle<'a>(
        &'a self,
        record: Option<&'a T>,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + 'a>> {
        Box::pin(async move {
            let record = record.ok_or_else(|| EventError::invalid_argument("handle: record is required"))?;
            tracing::info!(record = ?record, "received");
            Ok(())
        })
    }
}
