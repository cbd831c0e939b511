//! Gaze sample filter: windowed outlier-resistant aggregation followed by
//! an exponential moving average.
//!
//! The window is a ring buffer of the most recent raw samples. Each push
//! aggregates the window per axis (median by default, so one wild reading
//! cannot drag the estimate) and then low-passes the aggregate with EMA.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::debug;

use super::geometry::Point;
use crate::error::ConfigError;

// ── Gaze sample ─────────────────────────────────────────────

/// One gaze estimate in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeSample {
    pub x: f64,
    pub y: f64,
    /// When the engine produced the estimate.
    pub t: Instant,
}

impl GazeSample {
    pub fn new(x: f64, y: f64, t: Instant) -> Self {
        Self { x, y, t }
    }

    pub fn at(point: Point, t: Instant) -> Self {
        Self::new(point.x, point.y, t)
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

// ── Aggregation ─────────────────────────────────────────────

/// How the window is collapsed into a single estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Per-axis median; robust to isolated outliers.
    Median,
    /// Arithmetic mean.
    Mean,
    /// Linear recency weighting, weight = index + 1 (newest heaviest).
    LinearWeighted,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Median => "median",
            Self::Mean => "mean",
            Self::LinearWeighted => "linear-weighted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "median" => Some(Self::Median),
            "mean" => Some(Self::Mean),
            "linear-weighted" => Some(Self::LinearWeighted),
            _ => None,
        }
    }
}

// ── Config ──────────────────────────────────────────────────

/// Configuration for the sample filter.
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Number of raw samples kept in the window.
    pub window_size: usize,
    /// EMA factor: small = smoother but slower, 1 = no low-pass.
    pub ema_alpha: f64,
    /// Window aggregation method.
    pub aggregation: Aggregation,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            ema_alpha: 0.2,
            aggregation: Aggregation::Median,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if !(self.ema_alpha > 0.0 && self.ema_alpha <= 1.0) {
            return Err(ConfigError::InvalidEmaFactor(self.ema_alpha));
        }
        Ok(())
    }

    pub fn config_sexp(&self) -> String {
        format!(
            "(:window-size {} :ema-alpha {:.2} :aggregation :{})",
            self.window_size,
            self.ema_alpha,
            self.aggregation.as_str(),
        )
    }
}

// ── Filter ──────────────────────────────────────────────────

/// Stateful gaze smoother.
#[derive(Debug, Clone)]
pub struct SampleFilter {
    config: FilterConfig,
    window: VecDeque<Point>,
    ema: Option<Point>,
}

impl SampleFilter {
    pub fn new(config: FilterConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            window: VecDeque::with_capacity(config.window_size),
            config,
            ema: None,
        })
    }

    /// Add a raw sample and return the current smoothed estimate.
    ///
    /// The first sample after construction or `reset` passes through unchanged.
    pub fn push(&mut self, sample: GazeSample) -> GazeSample {
        if self.window.len() >= self.config.window_size {
            self.window.pop_front();
        }
        self.window.push_back(sample.position());

        let aggregate = self.aggregate();
        let next = match self.ema {
            Some(prev) => prev + (aggregate - prev) * self.config.ema_alpha,
            None => aggregate,
        };
        self.ema = Some(next);
        GazeSample::at(next, sample.t)
    }

    /// Latest smoothed position, if any sample has been seen.
    pub fn current(&self) -> Option<Point> {
        self.ema
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Clear window and EMA state together.
    pub fn reset(&mut self) {
        if !self.window.is_empty() {
            debug!("Sample filter reset ({} samples dropped)", self.window.len());
        }
        self.window.clear();
        self.ema = None;
    }

    fn aggregate(&self) -> Point {
        match self.config.aggregation {
            Aggregation::Median => Point::new(
                median(self.window.iter().map(|p| p.x)),
                median(self.window.iter().map(|p| p.y)),
            ),
            Aggregation::Mean => {
                let n = self.window.len() as f64;
                let sum = self
                    .window
                    .iter()
                    .fold(Point::ZERO, |acc, p| acc + *p);
                sum * (1.0 / n)
            }
            Aggregation::LinearWeighted => {
                let mut total = 0.0;
                let mut acc = Point::ZERO;
                for (i, p) in self.window.iter().enumerate() {
                    let w = (i + 1) as f64;
                    acc = acc + *p * w;
                    total += w;
                }
                acc * (1.0 / total)
            }
        }
    }
}

/// Median of a non-empty sequence (mean of the middle pair for even lengths).
fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut sorted: Vec<f64> = values.collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

// ── Tests ───────────────────────────────────────────────────
