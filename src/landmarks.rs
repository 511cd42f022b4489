// src/landmarks.rs - Hand landmark sets and wrist-relative feature extraction
use nalgebra::Vector2;

use crate::{Error, Result};

/// Number of keypoints per tracked hand
pub const LANDMARK_COUNT: usize = 21;

/// Length of the classifier input
pub const FEATURE_LEN: usize = LANDMARK_COUNT * 2;

// Hand landmark indices
pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// Bone connections used when drawing a hand
pub const HAND_CONNECTIONS: [(usize, usize); 21] = [
    (WRIST, THUMB_CMC), (THUMB_CMC, THUMB_MCP), (THUMB_MCP, THUMB_IP), (THUMB_IP, THUMB_TIP),
    (WRIST, INDEX_MCP), (INDEX_MCP, INDEX_PIP), (INDEX_PIP, INDEX_DIP), (INDEX_DIP, INDEX_TIP),
    (INDEX_MCP, MIDDLE_MCP), (MIDDLE_MCP, MIDDLE_PIP), (MIDDLE_PIP, MIDDLE_DIP), (MIDDLE_DIP, MIDDLE_TIP),
    (MIDDLE_MCP, RING_MCP), (RING_MCP, RING_PIP), (RING_PIP, RING_DIP), (RING_DIP, RING_TIP),
    (RING_MCP, PINKY_MCP), (PINKY_MCP, PINKY_PIP), (PINKY_PIP, PINKY_DIP), (PINKY_DIP, PINKY_TIP),
    (WRIST, PINKY_MCP),
];

/// The 21 keypoints of one detected hand, in normalized image coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: [Vector2<f64>; LANDMARK_COUNT],
}

/// Wrist-relative, scale-normalized landmarks flattened point-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_LEN]);

impl LandmarkSet {
    pub fn new(points: [Vector2<f64>; LANDMARK_COUNT]) -> Self {
        Self { points }
    }

    pub fn from_points(points: &[Vector2<f64>]) -> Result<Self> {
        let points: [Vector2<f64>; LANDMARK_COUNT] =
            points.try_into().map_err(|_| Error::LandmarkCount {
                expected: LANDMARK_COUNT,
                actual: points.len(),
            })?;
        Ok(Self { points })
    }

    /// Builds a set from `[x0, y0, x1, y1, ...]`.
    pub fn from_flat(values: &[f64]) -> Result<Self> {
        if values.len() != FEATURE_LEN {
            return Err(Error::LandmarkCount {
                expected: FEATURE_LEN,
                actual: values.len(),
            });
        }
        let mut points = [Vector2::zeros(); LANDMARK_COUNT];
        for (point, xy) in points.iter_mut().zip(values.chunks_exact(2)) {
            *point = Vector2::new(xy[0], xy[1]);
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[Vector2<f64>; LANDMARK_COUNT] {
        &self.points
    }

    pub fn wrist(&self) -> Vector2<f64> {
        self.points[WRIST]
    }

    /// Translates the wrist to the origin and divides by the largest absolute
    /// coordinate. A degenerate hand (every point on the wrist) stays all zero.
    pub fn normalize(&self) -> FeatureVector {
        let wrist = self.wrist();
        let translated = self.points.map(|p| p - wrist);

        let max_val = translated
            .iter()
            .flat_map(|p| [p.x.abs(), p.y.abs()])
            .fold(0.0_f64, f64::max);

        let mut features = [0.0; FEATURE_LEN];
        for (i, p) in translated.iter().enumerate() {
            let scaled = if max_val != 0.0 { p / max_val } else { *p };
            features[2 * i] = scaled.x;
            features[2 * i + 1] = scaled.y;
        }
        FeatureVector(features)
    }
}

impl FeatureVector {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl From<[f64; FEATURE_LEN]> for FeatureVector {
    fn from(values: [f64; FEATURE_LEN]) -> Self {
        Self(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hand() -> LandmarkSet {
        let flat: Vec<f64> = (0..LANDMARK_COUNT)
            .flat_map(|i| {
                let t = i as f64;
                [0.4 + 0.01 * t, 0.6 - 0.015 * t + 0.002 * t * t]
            })
            .collect();
        LandmarkSet::from_flat(&flat).unwrap()
    }

    #[test]
    fn test_wrist_becomes_origin() {
        let features = sample_hand().normalize();
        assert_eq!(features.as_slice()[0], 0.0);
        assert_eq!(features.as_slice()[1], 0.0);
    }

    #[test]
    fn test_max_magnitude_is_one() {
        let features = sample_hand().normalize();
        let max = features.as_slice().iter().map(|v| v.abs()).fold(0.0, f64::max);
        assert!((max - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_translation_invariant() {
        let hand = sample_hand();
        let shifted: Vec<Vector2<f64>> = hand
            .points()
            .iter()
            .map(|p| p + Vector2::new(0.125, -0.25))
            .collect();
        let shifted = LandmarkSet::from_points(&shifted).unwrap();

        let a = hand.normalize();
        let b = shifted.normalize();
        for (x, y) in a.as_slice().iter().zip(b.as_slice()) {
            assert!((x - y).abs() < 1e-9, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_degenerate_hand_is_all_zero() {
        let hand = LandmarkSet::new([Vector2::new(0.3, 0.7); LANDMARK_COUNT]);
        let features = hand.normalize();
        assert!(features.as_slice().iter().all(|v| *v == 0.0));
        assert!(features.as_slice().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_point_major_order() {
        let mut points = [Vector2::zeros(); LANDMARK_COUNT];
        points[1] = Vector2::new(2.0, -1.0);
        let features = LandmarkSet::new(points).normalize();
        assert_eq!(features.as_slice()[2], 1.0);
        assert_eq!(features.as_slice()[3], -0.5);
    }

    #[test]
    fn test_wrong_point_count_rejected() {
        let err = LandmarkSet::from_points(&[Vector2::zeros(); 20]).unwrap_err();
        assert!(matches!(err, Error::LandmarkCount { expected: 21, actual: 20 }));

        let err = LandmarkSet::from_flat(&[0.0; 43]).unwrap_err();
        assert!(matches!(err, Error::LandmarkCount { expected: 42, actual: 43 }));
    }
}
