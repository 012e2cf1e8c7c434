//! Error types for softtimer-demo

use softtimer::TimerError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DemoError {
    #[error("Cannot read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error in {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    #[error("{name} failed to start: {source}")]
    TimerSetup {
        name: &'static str,
        #[source]
        source: TimerError,
    },
}
