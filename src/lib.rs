pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod policy;
pub mod synth;
pub mod transcript;

pub use error::{PipelineError, Result};
