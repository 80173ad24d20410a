//! Data models and structures for the burst tester

pub mod burst;
pub mod config;
pub mod metrics;

// Re-export main model types
pub use burst::{RawTestParams, TestConfig, RequestTask};
pub use config::Config;
pub use metrics::{RequestResult, Outcome, ResponsePayload, TransportInfo, TestSummary};
