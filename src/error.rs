//! Crate-wide error type.
//!
//! Fatal startup problems (configuration, assets, fonts, hardware init) and
//! transient runtime failures (sink writes, weather fetches, bus publishes)
//! share one enum so every layer can use `?`. Callers decide which variants
//! are fatal: `main` aborts on anything that surfaces during startup, while
//! the orchestrator, scheduler, and bus log and carry on.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed credentials in {path}: {source}")]
    Credentials {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("malformed font asset: {0}")]
    Font(&'static str),

    #[error("display sink error: {0}")]
    Sink(String),

    #[error("weather request failed: {0}")]
    Weather(#[from] reqwest::Error),

    #[error("unknown weather condition code {0}")]
    UnknownCondition(u32),

    #[error("weather response contained no conditions")]
    EmptyWeather,

    #[error("failed to install Ctrl+C handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("message bus error: {0}")]
    Bus(#[from] rumqttc::ClientError),
}

pub type Result<T> = std::result::Result<T, Error>;
