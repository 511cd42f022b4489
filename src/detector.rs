// src/detector.rs - Hand landmark detection seam
//
// Landmark inference runs out of process. `SidecarDetector` drives any
// program that speaks the line protocol below; `ReplayDetector` plays back
// landmarks recorded to CSV.
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use csv::{ReaderBuilder, Trim};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::DetectorConfig;
use crate::landmarks::{LandmarkSet, FEATURE_LEN};
use crate::{Error, Result};

/// Finds at most one hand per frame.
pub trait HandDetector: Send {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Option<LandmarkSet>>;
}

/// Header line written before each frame's raw bytes.
#[derive(Debug, Serialize)]
struct FrameHeader<'a> {
    width: u32,
    height: u32,
    format: &'a str,
    len: usize,
}

/// One reply line from the sidecar.
#[derive(Debug, Deserialize)]
struct DetectionReply {
    #[serde(default)]
    hands: Vec<Vec<[f64; 2]>>,
    #[serde(default)]
    error: Option<String>,
}

/// Talks to a long-lived landmark process over stdin/stdout.
///
/// Per frame: a JSON header line `{"width","height","format":"rgb8","len"}`
/// followed by `len` bytes of RGB pixels; the process answers with one JSON
/// line `{"hands": [[[x, y], ...21], ...]}`.
pub struct SidecarDetector {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl SidecarDetector {
    pub fn spawn(config: &DetectorConfig) -> Result<Self> {
        let (program, args) = config
            .command
            .split_first()
            .ok_or_else(|| Error::Detector("no detector command configured".to_string()))?;

        info!("Starting hand detector: {}", config.command.join(" "));
        let mut child = Command::new(program)
            .args(args)
            .env("GESTURE_MATE_MAX_NUM_HANDS", config.max_num_hands.to_string())
            .env("GESTURE_MATE_MIN_DETECTION_CONFIDENCE", config.min_detection_confidence.to_string())
            .env("GESTURE_MATE_MIN_TRACKING_CONFIDENCE", config.min_tracking_confidence.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::Detector(format!("failed to start '{}': {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| Error::Detector("detector stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Detector("detector stdout unavailable".to_string()))?;

        info!("Hand detector started (pid {})", child.id());
        Ok(Self {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }
}

impl HandDetector for SidecarDetector {
    fn detect(&mut self, frame: &DynamicImage) -> Result<Option<LandmarkSet>> {
        let rgb = frame.to_rgb8();
        let header = FrameHeader {
            width: rgb.width(),
            height: rgb.height(),
            format: "rgb8",
            len: rgb.as_raw().len(),
        };
        serde_json::to_writer(&mut self.stdin, &header)?;
        self.stdin.write_all(b"\n")?;
        self.stdin.write_all(rgb.as_raw())?;
        self.stdin.flush()?;

        let mut line = String::new();
        if self.stdout.read_line(&mut line)? == 0 {
            return Err(Error::Detector("detector process closed its output".to_string()));
        }
        parse_reply(&line)
    }
}

impl Drop for SidecarDetector {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn parse_reply(line: &str) -> Result<Option<LandmarkSet>> {
    let reply: DetectionReply = serde_json::from_str(line.trim())?;
    if let Some(message) = reply.error {
        return Err(Error::Detector(message));
    }
    if reply.hands.len() > 1 {
        warn!("Detector returned {} hands, tracking the first", reply.hands.len());
    }
    reply
        .hands
        .into_iter()
        .next()
        .map(|hand| {
            let flat: Vec<f64> = hand.iter().flat_map(|p| [p[0], p[1]]).collect();
            LandmarkSet::from_flat(&flat)
        })
        .transpose()
}

/// Plays back recorded landmarks, one CSV row per frame.
///
/// A row of 42 numbers is a detected hand; a single `-` means no hand.
pub struct ReplayDetector {
    frames: Vec<Option<LandmarkSet>>,
    position: usize,
}

impl ReplayDetector {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_path(path)?;

        let mut frames = Vec::new();
        for (row, record) in reader.records().enumerate() {
            let record = record?;
            if record.len() == 1 && &record[0] == "-" {
                frames.push(None);
                continue;
            }
            if record.len() != FEATURE_LEN {
                return Err(Error::LandmarkCount {
                    expected: FEATURE_LEN,
                    actual: record.len(),
                });
            }
            let values = record
                .iter()
                .map(|v| v.parse::<f64>())
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| Error::Detector(format!("{} row {}: {}", path.display(), row + 1, e)))?;
            frames.push(Some(LandmarkSet::from_flat(&values)?));
        }

        info!("Loaded {} recorded frames from {}", frames.len(), path.display());
        Ok(Self::from_frames(frames))
    }

    pub fn from_frames(frames: Vec<Option<LandmarkSet>>) -> Self {
        Self { frames, position: 0 }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.frames.len() - self.position
    }
}

impl HandDetector for ReplayDetector {
    fn detect(&mut self, _frame: &DynamicImage) -> Result<Option<LandmarkSet>> {
        let hand = self.frames.get(self.position).cloned().flatten();
        if self.position < self.frames.len() {
            self.position += 1;
        }
        Ok(hand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn hand_row(offset: f64) -> String {
        (0..FEATURE_LEN)
            .map(|i| format!("{:.3}", offset + i as f64 * 0.01))
            .collect::<Vec<_>>()
            .join(",")
    }

    #[test]
    fn test_replay_rows_in_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", hand_row(0.1)).unwrap();
        writeln!(file, "-").unwrap();
        writeln!(file, "{}", hand_row(0.2)).unwrap();

        let mut detector = ReplayDetector::load(file.path()).unwrap();
        let frame = DynamicImage::new_rgb8(4, 4);
        assert_eq!(detector.len(), 3);

        let first = detector.detect(&frame).unwrap().unwrap();
        assert!((first.wrist().x - 0.1).abs() < 1e-9);
        assert!(detector.detect(&frame).unwrap().is_none());
        assert!(detector.detect(&frame).unwrap().is_some());
        assert_eq!(detector.remaining(), 0);
        assert!(detector.detect(&frame).unwrap().is_none());
    }

    #[test]
    fn test_replay_rejects_short_row() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0.1,0.2,0.3").unwrap();
        assert!(matches!(
            ReplayDetector::load(file.path()),
            Err(Error::LandmarkCount { expected: 42, actual: 3 })
        ));
    }

    #[test]
    fn test_parse_reply_first_hand() {
        let hand: Vec<[f64; 2]> = (0..21).map(|i| [i as f64 * 0.01, 0.5]).collect();
        let line = serde_json::json!({ "hands": [hand.clone(), hand] }).to_string();
        let set = parse_reply(&line).unwrap().unwrap();
        assert!((set.points()[20].x - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_parse_reply_no_hand_and_error() {
        assert!(parse_reply(r#"{"hands": []}"#).unwrap().is_none());
        assert!(parse_reply("{}").unwrap().is_none());
        assert!(matches!(parse_reply(r#"{"error": "boom"}"#), Err(Error::Detector(_))));
        assert!(parse_reply(r#"{"hands": [[[0.1, 0.2]]]}"#).is_err());
    }

    #[test]
    fn test_spawn_without_command() {
        let err = SidecarDetector::spawn(&DetectorConfig::default()).err().unwrap();
        assert!(matches!(err, Error::Detector(_)));
    }
}
