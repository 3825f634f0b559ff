//! Consume → dispatch → commit loop and the producer that feeds it.

pub mod config;
pub mod error;
mod event_loop;
mod handler;
pub mod memory;
mod producer;

pub use config::{ConsumerConfig, HandlerErrorPolicy, ProducerConfig};
pub use error::PipelineError;
pub use event_loop::{EventLoop, LoopPhase, LoopStats};
pub use handler::LoggingHandler;
pub use producer::EventProducer;
