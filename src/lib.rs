//! # GestureMate
//!
//! Turns a noisy stream of per-frame hand-pose classifications into a
//! displayed character and an append-only sentence for sign-language
//! spelling input.
//!
//! ## Pipeline
//!
//! ```text
//! frame ─▶ HandDetector ─▶ LandmarkSet::normalize ─▶ Classifier
//!                                                      │
//!        Snapshot ◀── SentenceAssembler ◀── TemporalSmoother + BestCandidate
//! ```
//!
//! - [`landmarks`]: 21-point landmark sets and the 42-value feature vector
//! - [`labels`]: label file loading and the `NEXT` / `SPACE` commands
//! - [`smoothing`]: bounded decision history and majority-vote stabilization
//! - [`candidate`]: best character seen since the last commit
//! - [`assembler`]: command state machine that grows the sentence
//! - [`engine`]: per-frame state machine over classifier output
//! - [`session`]: shared, serialized, lazily initialized orchestrator
//! - [`detector`], [`classifier`]: external capability seams
//! - [`video`], [`overlay`]: frame sources, annotation and MJPEG output
//! - [`config`]: typed configuration

pub mod assembler;
pub mod candidate;
pub mod classifier;
pub mod config;
pub mod detector;
pub mod engine;
pub mod labels;
pub mod landmarks;
pub mod overlay;
pub mod session;
pub mod smoothing;
pub mod video;

use std::path::PathBuf;

pub use assembler::Display;
pub use classifier::{Classifier, MlpClassifier, Prediction};
pub use config::Config;
pub use detector::{HandDetector, ReplayDetector, SidecarDetector};
pub use engine::{Engine, FrameOutcome};
pub use labels::{Command, LabelSet};
pub use landmarks::{FeatureVector, LandmarkSet};
pub use session::{FrameOutput, Health, Pipeline, Session, Snapshot};

/// Result type alias for the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the recognition pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("expected {expected} landmark values, got {actual}")]
    LandmarkCount { expected: usize, actual: usize },

    #[error("model artifact not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("invalid model artifact: {0}")]
    Model(String),

    #[error("classification error: {0}")]
    Classification(String),

    #[error("hand detector error: {0}")]
    Detector(String),

    #[error("camera error: {0}")]
    Camera(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("session has been shut down")]
    ShutDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
