// src/session.rs - Shared recognition context handed to every caller
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Local};
use image::DynamicImage;
use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::assembler::PLACEHOLDER_GLYPH;
use crate::classifier::{Classifier, MlpClassifier};
use crate::config::Config;
use crate::detector::{HandDetector, SidecarDetector};
use crate::engine::{Engine, FrameOutcome};
use crate::labels::LabelSet;
use crate::overlay;
use crate::{Error, Result};

/// The external capabilities, built once on first use.
pub struct Pipeline {
    pub detector: Box<dyn HandDetector>,
    pub classifier: Box<dyn Classifier>,
}

pub type PipelineFactory = Box<dyn Fn(&Config) -> Result<Pipeline> + Send + Sync>;

impl Pipeline {
    pub fn new(detector: impl HandDetector + 'static, classifier: impl Classifier + 'static) -> Self {
        Self {
            detector: Box::new(detector),
            classifier: Box::new(classifier),
        }
    }

    /// Model artifact first, so a missing model fails before a detector
    /// process is started.
    pub fn from_config(config: &Config) -> Result<Self> {
        let classifier = MlpClassifier::load(&config.model_path)?;
        let detector = SidecarDetector::spawn(&config.detector)?;
        Ok(Self::new(detector, classifier))
    }
}

/// Latest user-facing state, as served to status queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    #[serde(rename = "char")]
    pub character: String,
    pub sentence: String,
    /// Rounded to two decimals
    pub confidence: f64,
}

impl Snapshot {
    pub fn placeholder() -> Self {
        Self {
            character: PLACEHOLDER_GLYPH.to_string(),
            sentence: String::new(),
            confidence: 0.0,
        }
    }

    fn from_outcome(outcome: &FrameOutcome) -> Self {
        Self {
            character: outcome.display.glyph().to_string(),
            sentence: outcome.sentence.clone(),
            confidence: (outcome.confidence * 100.0).round() / 100.0,
        }
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::placeholder()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub engine_initialized: bool,
    pub session_id: String,
    pub started_at: String,
    pub frames_processed: u64,
    pub latest_state: Snapshot,
}

/// One processed frame.
pub struct FrameOutput {
    /// Annotated when a hand was found
    pub frame: DynamicImage,
    pub character: String,
    pub sentence: String,
    pub confidence: f64,
    /// The frame hit a detector or classifier error and left state untouched
    pub skipped: bool,
}

struct State {
    engine: Engine,
    latest: Snapshot,
}

impl State {
    fn publish(&mut self, frame: DynamicImage, outcome: FrameOutcome) -> FrameOutput {
        self.latest = Snapshot::from_outcome(&outcome);
        FrameOutput {
            frame,
            character: outcome.display.glyph().to_string(),
            sentence: outcome.sentence,
            confidence: outcome.confidence,
            skipped: false,
        }
    }

    fn skipped(&self, frame: DynamicImage) -> FrameOutput {
        FrameOutput {
            frame,
            character: self.latest.character.clone(),
            sentence: self.latest.sentence.clone(),
            confidence: self.latest.confidence,
            skipped: true,
        }
    }
}

/// Owns the engine state for the life of the process.
///
/// `process` calls are serialized by the pipeline mutex. `status`, `reset`
/// and `health` only take the state mutex, which `process` holds just long
/// enough to update the engine, so they may be called from any thread at
/// any time, including before the first frame or during a slow detection.
pub struct Session {
    config: Config,
    factory: PipelineFactory,
    pipeline: OnceCell<Mutex<Pipeline>>,
    state: Mutex<State>,
    frames_processed: AtomicU64,
    shut_down: AtomicBool,
    id: Uuid,
    started_at: DateTime<Local>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    pub fn new(config: Config, factory: PipelineFactory) -> Self {
        let labels = LabelSet::load_or_default(&config.labels_path);
        Self::with_labels(config, labels, factory)
    }

    /// Session backed by the sidecar detector and the JSON model from `config`.
    pub fn from_config(config: Config) -> Self {
        Self::new(config, Box::new(Pipeline::from_config))
    }

    pub fn with_labels(config: Config, labels: LabelSet, factory: PipelineFactory) -> Self {
        let engine = Engine::new(labels, config.smoothing.clone());
        let id = Uuid::new_v4();
        info!("Session {} created, pipeline initializes on first frame", id);
        Self {
            config,
            factory,
            pipeline: OnceCell::new(),
            state: Mutex::new(State {
                engine,
                latest: Snapshot::placeholder(),
            }),
            frames_processed: AtomicU64::new(0),
            shut_down: AtomicBool::new(false),
            id,
            started_at: Local::now(),
        }
    }

    fn pipeline(&self) -> Result<&Mutex<Pipeline>> {
        self.pipeline.get_or_try_init(|| {
            info!("Initializing recognition pipeline");
            match (self.factory)(&self.config) {
                Ok(pipeline) => {
                    info!("Recognition pipeline ready");
                    Ok(Mutex::new(pipeline))
                }
                Err(e) => {
                    error!("Recognition pipeline failed to initialize: {}", e);
                    Err(e)
                }
            }
        })
    }

    /// Builds the pipeline now instead of on the first frame. Concurrent
    /// callers share a single initialization.
    pub fn initialize(&self) -> Result<()> {
        self.pipeline().map(|_| ())
    }

    pub fn is_initialized(&self) -> bool {
        self.pipeline.get().is_some()
    }

    /// Runs one frame through detection, classification, smoothing and
    /// sentence assembly.
    ///
    /// Errors only when the pipeline cannot be built or the session is shut
    /// down. Detector and classifier failures skip the frame and echo the
    /// last published values.
    pub fn process(&self, frame: DynamicImage) -> Result<FrameOutput> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(Error::ShutDown);
        }
        let pipeline = self.pipeline()?;

        // The pipeline lock orders frames. The state lock is only taken to
        // update the engine, so queries never wait on detection.
        let mut pipeline = lock(pipeline);
        self.frames_processed.fetch_add(1, Ordering::Relaxed);

        let hand = match pipeline.detector.detect(&frame) {
            Ok(hand) => hand,
            Err(e) => {
                warn!("Hand detection failed, skipping frame: {}", e);
                return Ok(lock(&self.state).skipped(frame));
            }
        };

        let Some(hand) = hand else {
            let mut state = lock(&self.state);
            let outcome = state.engine.no_hand();
            return Ok(state.publish(frame, outcome));
        };

        let probabilities = match pipeline.classifier.predict_proba(&hand.normalize()) {
            Ok(probabilities) => probabilities,
            Err(e) => {
                warn!("Classification failed, skipping frame: {}", e);
                return Ok(lock(&self.state).skipped(frame));
            }
        };
        let annotated = overlay::annotate(&frame, &hand);

        let mut state = lock(&self.state);
        match state.engine.observe(&probabilities) {
            Ok(outcome) => Ok(state.publish(annotated, outcome)),
            Err(e) => {
                warn!("Classification failed, skipping frame: {}", e);
                Ok(state.skipped(frame))
            }
        }
    }

    pub fn status(&self) -> Snapshot {
        lock(&self.state).latest.clone()
    }

    /// Clears sentence, candidate, history and display state.
    pub fn reset(&self) -> Snapshot {
        let mut state = lock(&self.state);
        state.engine.reset();
        state.latest = Snapshot::placeholder();
        info!("Session state reset");
        state.latest.clone()
    }

    pub fn health(&self) -> Health {
        Health {
            status: "ok",
            engine_initialized: self.is_initialized(),
            session_id: self.id.to_string(),
            started_at: self.started_at.to_rfc3339(),
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            latest_state: self.status(),
        }
    }

    /// Stops accepting frames. Status and reset keep working.
    pub fn shutdown(&self) {
        if !self.shut_down.swap(true, Ordering::SeqCst) {
            info!("Session {} shutting down", self.id);
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_rounding_and_json() {
        let snapshot = Snapshot {
            character: "B".to_string(),
            sentence: "AB".to_string(),
            confidence: 0.87,
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["char"], "B");
        assert_eq!(json["sentence"], "AB");

        let outcome = FrameOutcome {
            display: crate::Display::Committed,
            sentence: "A".to_string(),
            confidence: 0.91666,
            admission: None,
        };
        let snapshot = Snapshot::from_outcome(&outcome);
        assert_eq!(snapshot.confidence, 0.92);
        assert_eq!(snapshot.character, "✓");
    }

    #[test]
    fn test_reset_before_first_frame() {
        let session = Session::with_labels(
            Config::default(),
            LabelSet::default(),
            Box::new(|_: &Config| -> Result<Pipeline> {
                Err(Error::Detector("unavailable".to_string()))
            }),
        );
        assert_eq!(session.reset(), Snapshot::placeholder());
        assert!(!session.is_initialized());
        assert!(!session.health().engine_initialized);
    }

    #[test]
    fn test_init_failure_is_reported() {
        let session = Session::with_labels(
            Config::default(),
            LabelSet::default(),
            Box::new(Pipeline::from_config),
        );
        assert!(matches!(session.initialize(), Err(Error::ModelNotFound(_))));
        assert!(matches!(
            session.process(DynamicImage::new_rgb8(4, 4)),
            Err(Error::ModelNotFound(_))
        ));
    }
}
