pub mod config;
pub mod error;
pub mod produce;
pub mod run;
mod wiring;
