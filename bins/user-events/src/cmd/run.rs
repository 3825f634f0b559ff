use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use event_api::UserEvent;
use pipeline::{EventLoop, EventProducer, LoggingHandler};

use super::config::Effective;
use super::error::AppError;
use super::produce::ticker;
use super::wiring::{self, Broker};

/// `run` and `consume` commands: the event loop until Ctrl+C, plus the
/// producer ticker when `with_producer` is set.
pub async fn run(eff: &Effective, with_producer: bool) -> Result<(), AppError> {
    tracing::info!(topic = %eff.topic, transport = ?eff.transport, "user-events starting");

    let registry = wiring::registry(eff)?;
    let codec = wiring::codec(registry)?;
    let broker = Broker::new(eff);
    let token = CancellationToken::new();

    let event_loop = EventLoop::new(
        eff.topic.clone(),
        &eff.consumer,
        broker.consumer()?,
        codec.clone(),
        Arc::new(LoggingHandler::<UserEvent>::new()),
    );
    let mut loop_task = tokio::spawn(event_loop.run(token.clone()));

    let ticker_task = if with_producer {
        let producer = EventProducer::new(eff.topic.clone(), broker.publisher()?, codec);
        Some(tokio::spawn(ticker(producer, eff.producer.interval(), token.clone())))
    } else {
        None
    };

    let finished = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("shutting down...");
            None
        }
        joined = &mut loop_task => Some(joined),
    };

    token.cancel();
    let result = match finished {
        Some(joined) => joined?,
        None => loop_task.await?,
    };
    if let Some(task) = ticker_task {
        task.await?;
    }

    let stats = result?;
    tracing::info!(
        consumed = stats.consumed,
        handled = stats.handled,
        committed = stats.committed,
        "stopped"
    );
    Ok(())
}
