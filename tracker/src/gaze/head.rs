//! Head stability monitor: drift from the calibration anchor, live gaze
//! compensation, and the one-shot recalibration alarm.
//!
//! The face center is the midpoint of two inner eye-corner landmarks, which
//! moves less under head rotation than the nose tip. While the head is still
//! the anchor slowly follows the face (elastic decay) so sub-threshold drift
//! is absorbed without discrete jumps. Sustained misalignment while still
//! raises a warning and then a single recalibration request; the request is
//! not repeated until the user has come back into alignment.

use std::time::Instant;

use tracing::{debug, info, warn};

use super::geometry::Point;
use crate::clock::elapsed_ms;
use crate::error::ConfigError;

// ── Alignment ───────────────────────────────────────────────

/// Classification of the head offset magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Aligned,
    Misaligned,
    Critical,
}

impl Alignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aligned => "aligned",
            Self::Misaligned => "misaligned",
            Self::Critical => "critical",
        }
    }
}

// ── Config ──────────────────────────────────────────────────

/// Configuration for drift detection and compensation.
#[derive(Debug, Clone)]
pub struct HeadConfig {
    /// Gain applied to the head offset before adding it to raw gaze.
    pub compensation_factor: f64,
    /// Frame-to-frame movement below this (px) counts as still.
    pub still_epsilon: f64,
    /// Per-still-frame weight of the current position in the elastic anchor.
    pub anchor_decay: f64,
    /// Offset distance (px) above which the head is misaligned.
    pub misaligned_px: f64,
    /// Offset distance (px) above which the head is critically misaligned.
    pub critical_px: f64,
    /// How long misalignment must persist before a recalibration request.
    pub misaligned_ms: f64,
    /// Still frames required before a request may fire.
    pub required_stable_frames: u32,
    /// Landmark index of the left inner eye corner.
    pub left_eye_index: usize,
    /// Landmark index of the right inner eye corner.
    pub right_eye_index: usize,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            compensation_factor: 4.0,
            still_epsilon: 2.0,
            anchor_decay: 0.002,
            misaligned_px: 12.0,
            critical_px: 25.0,
            misaligned_ms: 2000.0,
            required_stable_frames: 20,
            left_eye_index: 133,
            right_eye_index: 362,
        }
    }
}

impl HeadConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.compensation_factor >= 0.0 && self.compensation_factor.is_finite()) {
            return Err(ConfigError::InvalidCompensation(self.compensation_factor));
        }
        if !(self.still_epsilon > 0.0) {
            return Err(ConfigError::NonPositiveStillEpsilon(self.still_epsilon));
        }
        if !(self.anchor_decay >= 0.0 && self.anchor_decay < 1.0) {
            return Err(ConfigError::InvalidAnchorDecay(self.anchor_decay));
        }
        if !(self.misaligned_px > 0.0 && self.critical_px > self.misaligned_px) {
            return Err(ConfigError::InvalidDriftThresholds {
                misaligned: self.misaligned_px,
                critical: self.critical_px,
            });
        }
        if !(self.misaligned_ms > 0.0) {
            return Err(ConfigError::NonPositiveMisalignDuration(self.misaligned_ms));
        }
        if self.left_eye_index == self.right_eye_index {
            return Err(ConfigError::InvalidLandmarkPair(
                self.left_eye_index,
                self.right_eye_index,
            ));
        }
        Ok(())
    }

    /// Classify an offset distance.
    pub fn classify(&self, distance: f64) -> Alignment {
        if distance > self.critical_px {
            Alignment::Critical
        } else if distance > self.misaligned_px {
            Alignment::Misaligned
        } else {
            Alignment::Aligned
        }
    }

    pub fn config_sexp(&self) -> String {
        format!(
            "(:compensation-factor {:.1} :still-epsilon {:.1} :misaligned-px {:.0} :critical-px {:.0} :misaligned-ms {:.0} :required-stable-frames {})",
            self.compensation_factor,
            self.still_epsilon,
            self.misaligned_px,
            self.critical_px,
            self.misaligned_ms,
            self.required_stable_frames,
        )
    }
}

/// Midpoint of the configured eye-corner pair, if both landmarks exist.
pub fn face_center(landmarks: &[Point], config: &HeadConfig) -> Option<Point> {
    let left = landmarks.get(config.left_eye_index)?;
    let right = landmarks.get(config.right_eye_index)?;
    let center = left.midpoint(*right);
    center.is_finite().then_some(center)
}

// ── Events ──────────────────────────────────────────────────

/// Events emitted by the head monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum HeadEvent {
    AlignmentChanged { from: Alignment, to: Alignment },
    /// Misalignment has started its countdown toward a recalibration request.
    DriftWarning { offset: Point },
    /// Misalignment persisted; the anchor should be refreshed.
    RecalibrationRequested { offset: Point },
}

impl HeadEvent {
    pub fn to_sexp(&self) -> String {
        match self {
            Self::AlignmentChanged { from, to } => format!(
                "(:type :event :event :head-alignment :from :{} :to :{})",
                from.as_str(),
                to.as_str()
            ),
            Self::DriftWarning { offset } => format!(
                "(:type :event :event :head-drift-warning :offset {} :distance {:.1})",
                offset.to_sexp(),
                offset.length()
            ),
            Self::RecalibrationRequested { offset } => format!(
                "(:type :event :event :recalibration-requested :offset {} :distance {:.1})",
                offset.to_sexp(),
                offset.length()
            ),
        }
    }
}

// ── Monitor ─────────────────────────────────────────────────

/// Tracks the face reference point against the calibration anchor.
#[derive(Debug, Clone)]
pub struct HeadMonitor {
    config: HeadConfig,
    anchor: Option<Point>,
    last_position: Option<Point>,
    stable_frames: u32,
    offset: Point,
    alignment: Alignment,
    /// Start of the current still-and-misaligned stretch.
    misaligned_since: Option<Instant>,
    /// Request already sent for this misalignment episode.
    request_latched: bool,
}

impl HeadMonitor {
    pub fn new(config: HeadConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            anchor: None,
            last_position: None,
            stable_frames: 0,
            offset: Point::ZERO,
            alignment: Alignment::Aligned,
            misaligned_since: None,
            request_latched: false,
        })
    }

    /// Process one landmark frame. `None` (no face) holds the last offset.
    pub fn update(&mut self, now: Instant, landmarks: Option<&[Point]>) -> Vec<HeadEvent> {
        let mut events = Vec::new();
        let center = match landmarks.and_then(|lm| face_center(lm, &self.config)) {
            Some(c) => c,
            None => return events,
        };

        self.track_stillness(center);
        self.last_position = Some(center);

        let anchor = match self.anchor {
            Some(a) => a,
            None => return events,
        };

        self.offset = center - anchor;
        let alignment = self.config.classify(self.offset.length());
        if alignment != self.alignment {
            debug!(
                "Head alignment {} -> {} (offset {:.1}px)",
                self.alignment.as_str(),
                alignment.as_str(),
                self.offset.length()
            );
            events.push(HeadEvent::AlignmentChanged {
                from: self.alignment,
                to: alignment,
            });
            self.alignment = alignment;
        }

        if alignment == Alignment::Aligned {
            if self.request_latched {
                info!("Head back in alignment, recalibration re-armed");
            }
            self.request_latched = false;
            self.misaligned_since = None;
            return events;
        }

        // Moving heads are not recalibrated; wait for stillness.
        if self.request_latched || self.stable_frames == 0 {
            return events;
        }

        match self.misaligned_since {
            None => {
                self.misaligned_since = Some(now);
                warn!(
                    "Head drift {:.1}px ({}), recalibration in {:.0}ms if sustained",
                    self.offset.length(),
                    alignment.as_str(),
                    self.config.misaligned_ms
                );
                events.push(HeadEvent::DriftWarning {
                    offset: self.offset,
                });
            }
            Some(since) => {
                if elapsed_ms(now, since) >= self.config.misaligned_ms
                    && self.stable_frames >= self.config.required_stable_frames
                {
                    self.request_latched = true;
                    self.misaligned_since = None;
                    info!(
                        "Recalibration requested: offset {:.1}px held for {:.0}ms",
                        self.offset.length(),
                        elapsed_ms(now, since)
                    );
                    events.push(HeadEvent::RecalibrationRequested {
                        offset: self.offset,
                    });
                }
            }
        }
        events
    }

    fn track_stillness(&mut self, center: Point) {
        let Some(last) = self.last_position else {
            return;
        };
        if center.distance(last) < self.config.still_epsilon {
            self.stable_frames = self.stable_frames.saturating_add(1);
            if let Some(anchor) = self.anchor {
                self.anchor = Some(anchor.lerp(center, self.config.anchor_decay));
            }
        } else {
            self.stable_frames = 0;
            self.misaligned_since = None;
        }
    }

    /// Raw gaze shifted by the head offset; applied before filtering.
    pub fn compensate(&self, raw: Point) -> Point {
        if self.anchor.is_none() {
            return raw;
        }
        raw + self.offset * self.config.compensation_factor
    }

    /// Capture the anchor at the current face position.
    pub fn capture_anchor(&mut self) -> Option<Point> {
        let center = self.last_position?;
        self.set_anchor(center);
        Some(center)
    }

    /// Hard-set the anchor and clear any alarm state.
    pub fn set_anchor(&mut self, anchor: Point) {
        info!("Head anchor set at {}", anchor.to_sexp());
        self.anchor = Some(anchor);
        self.offset = Point::ZERO;
        self.alignment = Alignment::Aligned;
        self.misaligned_since = None;
        self.request_latched = false;
    }

    /// Drop the anchor; compensation and alarms stop until a new one is set.
    pub fn clear_anchor(&mut self) {
        self.anchor = None;
        self.offset = Point::ZERO;
        self.alignment = Alignment::Aligned;
        self.misaligned_since = None;
        self.request_latched = false;
    }

    /// Clear per-session stability tracking. The anchor survives.
    pub fn reset(&mut self) {
        self.last_position = None;
        self.stable_frames = 0;
        self.offset = Point::ZERO;
        self.alignment = Alignment::Aligned;
        self.misaligned_since = None;
        self.request_latched = false;
    }

    pub fn anchor(&self) -> Option<Point> {
        self.anchor
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn alignment(&self) -> Alignment {
        self.alignment
    }

    pub fn face_position(&self) -> Option<Point> {
        self.last_position
    }

    pub fn stable_frames(&self) -> u32 {
        self.stable_frames
    }

    /// Whether a recalibration request could still fire this episode.
    pub fn recalibration_armed(&self) -> bool {
        self.anchor.is_some() && !self.request_latched
    }

    pub fn config(&self) -> &HeadConfig {
        &self.config
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:anchor {} :offset {} :distance {:.1} :alignment :{} :stable-frames {} :armed {})",
            self.anchor
                .map(|a| a.to_sexp())
                .unwrap_or_else(|| "nil".to_string()),
            self.offset.to_sexp(),
            self.offset.length(),
            self.alignment.as_str(),
            self.stable_frames,
            if self.recalibration_armed() { "t" } else { "nil" },
        )
    }
}

// ── Tests ───────────────────────────────────────────────────
