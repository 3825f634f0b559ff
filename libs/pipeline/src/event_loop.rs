use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use event_api::{ConsumedMessage, EventError, EventHandler, MessageConsumer, ValueCodec};

use crate::config::{ConsumerConfig, HandlerErrorPolicy};
use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  States
// ═══════════════════════════════════════════════════════════════

/// Observable phase of the loop, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Idle,
    Subscribed,
    Consuming,
    Dispatching,
    Committing,
    Closed,
}

enum State<T> {
    Idle,
    Subscribed,
    Consuming,
    /// Exactly one record in flight.
    Dispatching(ConsumedMessage, Option<T>),
    Committing(ConsumedMessage),
    Closed,
}

impl<T> State<T> {
    fn phase(&self) -> LoopPhase {
        match self {
            State::Idle => LoopPhase::Idle,
            State::Subscribed => LoopPhase::Subscribed,
            State::Consuming => LoopPhase::Consuming,
            State::Dispatching(..) => LoopPhase::Dispatching,
            State::Committing(_) => LoopPhase::Committing,
            State::Closed => LoopPhase::Closed,
        }
    }
}

/// Counters reported when the loop closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub consumed: u64,
    pub handled: u64,
    pub committed: u64,
    pub consume_errors: u64,
    pub handler_errors: u64,
}

// ═══════════════════════════════════════════════════════════════
//  Consumer guard
// ═══════════════════════════════════════════════════════════════

/// Owns the consumer for the lifetime of `run` and closes it exactly
/// once: explicitly on `Closed`, or on drop for every other exit
/// (error return, panic, the run future being dropped).
struct ConsumerGuard {
    consumer: Box<dyn MessageConsumer>,
    closed: bool,
}

impl ConsumerGuard {
    fn new(consumer: Box<dyn MessageConsumer>) -> Self {
        Self { consumer, closed: false }
    }

    fn get(&mut self) -> &mut dyn MessageConsumer {
        &mut *self.consumer
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.consumer.close();
        }
    }
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        self.close();
    }
}

// ═══════════════════════════════════════════════════════════════
//  EventLoop
// ═══════════════════════════════════════════════════════════════

/// Subscribe → consume → dispatch → commit until cancelled.
///
/// One record is in flight at a time: the handler is awaited before the
/// offset is committed, and the commit finishes before the next consume.
/// A commit therefore means "handled up to and including this offset".
pub struct EventLoop<T> {
    topic: String,
    poll_timeout: Duration,
    on_handler_error: HandlerErrorPolicy,
    consumer: Box<dyn MessageConsumer>,
    codec: Arc<dyn ValueCodec<T>>,
    handler: Arc<dyn EventHandler<T>>,
}

impl<T: Send + Sync + 'static> EventLoop<T> {
    pub fn new(
        topic: impl Into<String>,
        config: &ConsumerConfig,
        consumer: Box<dyn MessageConsumer>,
        codec: Arc<dyn ValueCodec<T>>,
        handler: Arc<dyn EventHandler<T>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            poll_timeout: config.poll_timeout(),
            on_handler_error: config.on_handler_error,
            consumer,
            codec,
            handler,
        }
    }

    /// Run until `token` is cancelled.
    ///
    /// Returns `Ok` on cancellation. Errors: subscription failure (setup),
    /// commit failure, and handler failure under `HandlerErrorPolicy::Stop`.
    /// Consume and decode failures are logged and never end the loop.
    pub async fn run(self, token: CancellationToken) -> Result<LoopStats, PipelineError> {
        let EventLoop {
            topic,
            poll_timeout,
            on_handler_error,
            consumer,
            codec,
            handler,
        } = self;

        let mut consumer = ConsumerGuard::new(consumer);
        let mut stats = LoopStats::default();
        let mut state: State<T> = State::Idle;

        loop {
            tracing::trace!(topic = %topic, phase = ?state.phase(), "event loop");

            state = match state {
                State::Idle => {
                    consumer
                        .get()
                        .subscribe(&topic)
                        .map_err(|source| PipelineError::Subscription { topic: topic.clone(), source })?;
                    tracing::info!(topic = %topic, "subscribed");
                    State::Subscribed
                }

                State::Subscribed => State::Consuming,

                State::Consuming => {
                    if token.is_cancelled() {
                        State::Closed
                    } else {
                        let polled = tokio::select! {
                            biased;
                            _ = token.cancelled() => None,
                            result = consumer.get().consume(poll_timeout) => Some(result),
                        };

                        match polled {
                            None => State::Closed,
                            Some(Ok(None)) => {
                                tracing::trace!(topic = %topic, "poll timeout");
                                State::Consuming
                            }
                            Some(Ok(Some(message))) => match decode_payload(&*codec, &message).await {
                                Ok(value) => {
                                    stats.consumed += 1;
                                    State::Dispatching(message, value)
                                }
                                Err(e) => {
                                    stats.consume_errors += 1;
                                    tracing::warn!(
                                        topic = %message.topic,
                                        partition = message.partition,
                                        offset = message.offset,
                                        error = ?e,
                                        "undecodable message, skipping"
                                    );
                                    State::Consuming
                                }
                            },
                            Some(Err(e)) => {
                                stats.consume_errors += 1;
                                tracing::warn!(topic = %topic, error = ?e, "consume error");
                                State::Consuming
                            }
                        }
                    }
                }

                State::Dispatching(message, value) => match handler.handle(value.as_ref()).await {
                    Ok(()) => {
                        stats.handled += 1;
                        State::Committing(message)
                    }
                    Err(e) => {
                        stats.handler_errors += 1;
                        match on_handler_error {
                            HandlerErrorPolicy::Skip => {
                                tracing::warn!(
                                    topic = %message.topic,
                                    partition = message.partition,
                                    offset = message.offset,
                                    error = ?e,
                                    "handler failed, message not committed"
                                );
                                State::Consuming
                            }
                            HandlerErrorPolicy::Stop => {
                                tracing::error!(
                                    topic = %message.topic,
                                    partition = message.partition,
                                    offset = message.offset,
                                    error = ?e,
                                    "handler failed, stopping"
                                );
                                return Err(PipelineError::Handler {
                                    topic: message.topic,
                                    partition: message.partition,
                                    offset: message.offset,
                                    source: e,
                                });
                            }
                        }
                    }
                },

                State::Committing(message) => {
                    let committed = consumer.get().commit(&message).await;
                    match committed {
                        Ok(()) => {
                            stats.committed += 1;
                            tracing::debug!(
                                topic = %message.topic,
                                partition = message.partition,
                                offset = message.offset,
                                "committed"
                            );
                            State::Consuming
                        }
                        Err(e) => {
                            tracing::error!(
                                topic = %message.topic,
                                partition = message.partition,
                                offset = message.offset,
                                error = ?e,
                                "commit failed"
                            );
                            return Err(PipelineError::Commit {
                                topic: message.topic,
                                partition: message.partition,
                                offset: message.offset,
                                source: e,
                            });
                        }
                    }
                }

                State::Closed => {
                    consumer.close();
                    tracing::info!(
                        topic = %topic,
                        consumed = stats.consumed,
                        committed = stats.committed,
                        consume_errors = stats.consume_errors,
                        handler_errors = stats.handler_errors,
                        "event loop closed"
                    );
                    return Ok(stats);
                }
            };
        }
    }
}

/// Tombstones (no payload) decode to the absence value.
async fn decode_payload<T>(
    codec: &dyn ValueCodec<T>,
    message: &ConsumedMessage,
) -> Result<Option<T>, EventError> {
    match &message.payload {
        Some(bytes) => codec.decode(&message.topic, bytes).await.map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use event_api::ErrorKind;

    use super::*;

    type Log = Arc<Mutex<Vec<String>>>;

    enum Step {
        Message(i64, Option<&'static str>),
        Timeout,
        Fail,
        /// Wait forever without touching the token.
        Block,
    }

    /// Replays a script. When the script runs out it cancels `done`
    /// and then blocks, so the loop closes through cancellation.
    struct ScriptedConsumer {
        steps: VecDeque<Step>,
        log: Log,
        closes: Arc<AtomicUsize>,
        done: CancellationToken,
        fail_subscribe: bool,
        fail_commit_at: Option<i64>,
        /// Commit waits this long on the timer before acknowledging.
        commit_delay: Option<Duration>,
    }

    impl MessageConsumer for ScriptedConsumer {
        fn subscribe(&mut self, topic: &str) -> Result<(), EventError> {
            self.log.lock().unwrap().push(format!("subscribe {topic}"));
            if self.fail_subscribe {
                return Err(EventError::transport("broker unreachable"));
            }
            Ok(())
        }

        fn consume(
            &mut self,
            _timeout: Duration,
        ) -> Pin<Box<dyn Future<Output = Result<Option<ConsumedMessage>, EventError>> + Send + '_>> {
            self.log.lock().unwrap().push("consume".into());
            let step = self.steps.pop_front();
            let done = self.done.clone();
            Box::pin(async move {
                match step {
                    Some(Step::Message(offset, payload)) => Ok(Some(ConsumedMessage {
                        topic: "users".into(),
                        partition: 0,
                        offset,
                        key: None,
                        payload: payload.map(|p| p.as_bytes().to_vec()),
                        ts_ms: None,
                    })),
                    Some(Step::Timeout) => Ok(None),
                    Some(Step::Fail) => Err(EventError::transport("broker unreachable")),
                    Some(Step::Block) => std::future::pending().await,
                    None => {
                        done.cancel();
                        std::future::pending().await
                    }
                }
            })
        }

        fn commit<'a>(
            &'a mut self,
            message: &'a ConsumedMessage,
        ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + 'a>> {
            self.log.lock().unwrap().push(format!("commit {}", message.offset));
            let rejected = self.fail_commit_at == Some(message.offset);
            let delay = self.commit_delay;
            let log = self.log.clone();
            Box::pin(async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                    log.lock().unwrap().push(format!("acked {}", message.offset));
                }
                if rejected {
                    return Err(EventError::transport("commit rejected"));
                }
                Ok(())
            })
        }

        fn close(&mut self) {
            self.log.lock().unwrap().push("close".into());
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Payload bytes are the record; "bad" does not decode.
    struct Utf8Codec;

    impl ValueCodec<String> for Utf8Codec {
        fn encode<'a>(
            &'a self,
            _topic: &'a str,
            value: &'a String,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, EventError>> + Send + 'a>> {
            Box::pin(async move { Ok(value.as_bytes().to_vec()) })
        }

        fn decode<'a>(
            &'a self,
            _topic: &'a str,
            data: &'a [u8],
        ) -> Pin<Box<dyn Future<Output = Result<String, EventError>> + Send + 'a>> {
            Box::pin(async move {
                if data == b"bad" {
                    return Err(EventError::format_err("undecodable"));
                }
                Ok(String::from_utf8(data.to_vec())?)
            })
        }
    }

    /// Rejects the absence value and "boom".
    struct RecordingHandler {
        log: Log,
    }

    impl EventHandler<String> for RecordingHandler {
        fn handle<'a>(
            &'a self,
            record: Option<&'a String>,
        ) -> Pin<Box<dyn Future<Output = Result<(), EventError>> + Send + 'a>> {
            Box::pin(async move {
                let record = record.ok_or_else(|| EventError::invalid_argument("record is required"))?;
                self.log.lock().unwrap().push(format!("handle {record}"));
                if record == "boom" {
                    return Err(EventError::new("handler exploded"));
                }
                Ok(())
            })
        }
    }

    struct Harness {
        log: Log,
        closes: Arc<AtomicUsize>,
        token: CancellationToken,
        event_loop: EventLoop<String>,
    }

    fn harness(steps: Vec<Step>, config: ConsumerConfig) -> Harness {
        harness_with(steps, config, |_| {})
    }

    fn harness_with(
        steps: Vec<Step>,
        config: ConsumerConfig,
        tweak: impl FnOnce(&mut ScriptedConsumer),
    ) -> Harness {
        let log: Log = Arc::default();
        let closes = Arc::new(AtomicUsize::new(0));
        let token = CancellationToken::new();
        let mut consumer = ScriptedConsumer {
            steps: steps.into(),
            log: log.clone(),
            closes: closes.clone(),
            done: token.clone(),
            fail_subscribe: false,
            fail_commit_at: None,
            commit_delay: None,
        };
        tweak(&mut consumer);
        let event_loop = EventLoop::new(
            "users",
            &config,
            Box::new(consumer),
            Arc::new(Utf8Codec),
            Arc::new(RecordingHandler { log: log.clone() }),
        );
        Harness { log, closes, token, event_loop }
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn dispatches_and_commits_in_receive_order() {
        let h = harness(
            vec![
                Step::Message(0, Some("m1")),
                Step::Message(1, Some("m2")),
                Step::Message(2, Some("m3")),
            ],
            ConsumerConfig::default(),
        );

        let stats = h.event_loop.run(h.token.clone()).await.unwrap();

        assert_eq!(
            entries(&h.log),
            [
                "subscribe users",
                "consume", "handle m1", "commit 0",
                "consume", "handle m2", "commit 1",
                "consume", "handle m3", "commit 2",
                "consume", "close",
            ]
        );
        assert_eq!(stats.consumed, 3);
        assert_eq!(stats.handled, 3);
        assert_eq!(stats.committed, 3);
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn consume_error_does_not_end_the_loop() {
        let h = harness(vec![Step::Fail, Step::Message(0, Some("m1"))], ConsumerConfig::default());

        let stats = h.event_loop.run(h.token.clone()).await.unwrap();

        assert_eq!(stats.consume_errors, 1);
        assert_eq!(stats.handled, 1);
        assert!(entries(&h.log).contains(&"handle m1".to_string()));
        assert!(entries(&h.log).contains(&"commit 0".to_string()));
    }

    #[tokio::test]
    async fn undecodable_payload_is_skipped_without_commit() {
        let h = harness(
            vec![Step::Message(0, Some("bad")), Step::Timeout, Step::Message(1, Some("m2"))],
            ConsumerConfig::default(),
        );

        let stats = h.event_loop.run(h.token.clone()).await.unwrap();

        let log = entries(&h.log);
        assert!(!log.contains(&"commit 0".to_string()));
        assert!(log.contains(&"commit 1".to_string()));
        assert_eq!(stats.consume_errors, 1);
        assert_eq!(stats.consumed, 1);
    }

    #[tokio::test]
    async fn tombstone_reaches_handler_as_absence_and_is_not_committed() {
        let h = harness(
            vec![Step::Message(0, None), Step::Message(1, Some("m2"))],
            ConsumerConfig::default(),
        );

        let stats = h.event_loop.run(h.token.clone()).await.unwrap();

        let log = entries(&h.log);
        assert!(!log.contains(&"commit 0".to_string()));
        assert!(log.contains(&"commit 1".to_string()));
        assert_eq!(stats.handler_errors, 1);
        assert_eq!(stats.committed, 1);
    }

    #[tokio::test]
    async fn stop_policy_returns_handler_error() {
        let config = ConsumerConfig { on_handler_error: HandlerErrorPolicy::Stop, ..Default::default() };
        let h = harness(vec![Step::Message(4, Some("boom")), Step::Message(5, Some("m2"))], config);

        let err = h.event_loop.run(h.token.clone()).await.unwrap_err();

        match err {
            PipelineError::Handler { offset, source, .. } => {
                assert_eq!(offset, 4);
                assert_eq!(source.message(), "handler exploded");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(!entries(&h.log).contains(&"commit 4".to_string()));
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn commit_failure_ends_run_and_releases_consumer() {
        let h = harness_with(
            vec![Step::Message(0, Some("m1")), Step::Message(1, Some("m2"))],
            ConsumerConfig::default(),
            |c| c.fail_commit_at = Some(0),
        );

        let err = h.event_loop.run(h.token.clone()).await.unwrap_err();

        assert!(matches!(err, PipelineError::Commit { offset: 0, .. }));
        assert_eq!(
            entries(&h.log),
            ["subscribe users", "consume", "handle m1", "commit 0", "close"]
        );
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_commit_yields_the_worker_and_finishes_before_next_consume() {
        let h = harness_with(
            vec![Step::Message(0, Some("m1")), Step::Message(1, Some("m2"))],
            ConsumerConfig::default(),
            |c| c.commit_delay = Some(Duration::from_millis(30)),
        );
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = tokio::spawn({
            let ticks = ticks.clone();
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(1)).await;
                }
            }
        });

        let stats = h.event_loop.run(h.token.clone()).await.unwrap();
        ticker.abort();

        assert_eq!(
            entries(&h.log),
            [
                "subscribe users",
                "consume", "handle m1", "commit 0", "acked 0",
                "consume", "handle m2", "commit 1", "acked 1",
                "consume", "close",
            ]
        );
        assert_eq!(stats.committed, 2);
        // The ticker shares the single worker thread with the loop.
        assert!(ticks.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test]
    async fn subscribe_failure_is_a_setup_error() {
        let h = harness_with(vec![], ConsumerConfig::default(), |c| c.fail_subscribe = true);

        let err = h.event_loop.run(h.token.clone()).await.unwrap_err();

        match err {
            PipelineError::Subscription { topic, source } => {
                assert_eq!(topic, "users");
                assert_eq!(source.kind(), ErrorKind::Transport);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(entries(&h.log), ["subscribe users", "close"]);
    }

    #[tokio::test]
    async fn cancellation_while_blocked_in_consume_closes_cleanly() {
        let h = harness(vec![Step::Block], ConsumerConfig::default());
        let token = h.token.clone();

        let task = tokio::spawn(h.event_loop.run(token.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        let stats = task.await.unwrap().unwrap();

        assert_eq!(stats, LoopStats::default());
        assert_eq!(entries(&h.log), ["subscribe users", "consume", "close"]);
        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_before_start_never_consumes() {
        let h = harness(vec![Step::Message(0, Some("m1"))], ConsumerConfig::default());
        h.token.cancel();

        h.event_loop.run(h.token.clone()).await.unwrap();

        assert_eq!(entries(&h.log), ["subscribe users", "close"]);
    }

    #[tokio::test]
    async fn dropping_the_run_future_releases_consumer_once() {
        let h = harness(vec![Step::Block], ConsumerConfig::default());

        let task = tokio::spawn(h.event_loop.run(h.token.clone()));
        tokio::time::sleep(Duration::from_millis(20)).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert_eq!(h.closes.load(Ordering::SeqCst), 1);
    }
}
