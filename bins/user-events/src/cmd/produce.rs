use tokio_util::sync::CancellationToken;

use event_api::{UserEvent, now_ms};
use pipeline::EventProducer;

use super::config::Effective;
use super::error::AppError;
use super::wiring::{self, Broker};

/// Fresh event with a random id.
pub fn synthetic_event() -> UserEvent {
    let id = uuid::Uuid::new_v4().to_string();
    let name = format!("user-{}", &id[..8]);
    let email = format!("{name}@example.com");
    UserEvent::new(id, name, email, now_ms())
}

/// `produce` command: send `count` events, stop at the first failure.
pub async fn run(eff: &Effective, count: u64) -> Result<(), AppError> {
    let codec = wiring::codec(wiring::registry(eff)?)?;
    let broker = Broker::new(eff);
    let producer = EventProducer::new(eff.topic.clone(), broker.publisher()?, codec);

    for _ in 0..count {
        let event = synthetic_event();
        producer.produce(&event.user_id, Some(&event)).await?;
    }
    tracing::info!(topic = %eff.topic, count, "produced");
    Ok(())
}

/// Produce one event per tick until cancelled. Failures are already logged
/// by the producer and do not stop the ticker.
pub async fn ticker(producer: EventProducer<UserEvent>, every: std::time::Duration, token: CancellationToken) -> u64 {
    let mut interval = tokio::time::interval(every);
    let mut failed = 0u64;
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                let event = synthetic_event();
                if producer.produce(&event.user_id, Some(&event)).await.is_err() {
                    failed += 1;
                }
            }
        }
    }
    tracing::info!(topic = %producer.topic(), failed, "producer ticker stopped");
    failed
}
