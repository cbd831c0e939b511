//! Zone hysteresis: a raw zone must repeat for `threshold` consecutive
//! readings before it becomes the stable zone.

use tracing::debug;

use super::zone::{zone_sexp, Zone};
use crate::error::ConfigError;

/// What an off-target (`None`) raw reading does to the stable zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullZonePolicy {
    /// `None` is counted like any other zone and clears the stable zone only
    /// after `threshold` consecutive readings. Tolerates blinks.
    Counted,
    /// A single `None` clears the stable zone.
    ClearImmediately,
}

impl NullZonePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Counted => "counted",
            Self::ClearImmediately => "clear-immediately",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "counted" => Some(Self::Counted),
            "clear-immediately" => Some(Self::ClearImmediately),
            _ => None,
        }
    }
}

/// Configuration for zone hysteresis.
#[derive(Debug, Clone)]
pub struct HysteresisConfig {
    /// Consecutive identical readings required to switch zones.
    pub threshold: u32,
    pub null_policy: NullZonePolicy,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            null_policy: NullZonePolicy::Counted,
        }
    }
}

impl HysteresisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threshold == 0 {
            return Err(ConfigError::ZeroStabilityThreshold);
        }
        Ok(())
    }
}

/// Anti-flicker filter over the raw zone stream.
#[derive(Debug, Clone)]
pub struct ZoneHysteresis {
    config: HysteresisConfig,
    last_raw: Option<Zone>,
    consecutive: u32,
    stable: Option<Zone>,
}

impl ZoneHysteresis {
    pub fn new(config: HysteresisConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            last_raw: None,
            consecutive: 0,
            stable: None,
        })
    }

    /// Feed one raw reading and return the stable zone.
    pub fn update(&mut self, raw: Option<Zone>) -> Option<Zone> {
        if self.consecutive > 0 && raw == self.last_raw {
            self.consecutive = self.consecutive.saturating_add(1);
        } else {
            self.last_raw = raw;
            self.consecutive = 1;
        }

        if raw.is_none() && self.config.null_policy == NullZonePolicy::ClearImmediately {
            if self.stable.is_some() {
                debug!("Stable zone cleared (gaze off target)");
            }
            self.stable = None;
            return None;
        }

        if self.consecutive >= self.config.threshold && self.stable != raw {
            debug!(
                "Stable zone {} -> {} after {} readings",
                zone_sexp(self.stable),
                zone_sexp(raw),
                self.consecutive
            );
            self.stable = raw;
        }
        self.stable
    }

    pub fn stable(&self) -> Option<Zone> {
        self.stable
    }

    /// Length of the current run of identical raw readings.
    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn config(&self) -> &HysteresisConfig {
        &self.config
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.last_raw = None;
        self.consecutive = 0;
        self.stable = None;
    }

    pub fn status_sexp(&self) -> String {
        format!(
            "(:stable-zone {} :candidate {} :count {} :threshold {} :null-policy :{})",
            zone_sexp(self.stable),
            zone_sexp(self.last_raw),
            self.consecutive,
            self.config.threshold,
            self.config.null_policy.as_str(),
        )
    }
}

// ── Tests ───────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gaze::zone::{Col, Row};

    const A: Zone = Zone::Band {
        row: Row::Up,
        col: Col::Left,
    };
    const B: Zone = Zone::Band {
        row: Row::Down,
        col: Col::Right,
    };

    fn hysteresis(threshold: u32, null_policy: NullZonePolicy) -> ZoneHysteresis {
        ZoneHysteresis::new(HysteresisConfig {
            threshold,
            null_policy,
        })
        .unwrap()
    }

    #[test]
    fn test_single_b_insufficient() {
        let mut h = hysteresis(5, NullZonePolicy::Counted);
        let seq = [A, A, A, A, A, B];
        let mut out = Vec::new();
        for z in seq {
            out.push(h.update(Some(z)));
        }
        assert_eq!(out[3], None);
        assert_eq!(out[4], Some(A));
        assert_eq!(out[5], Some(A));
    }

    #[test]
    fn test_alternating_short_runs_never_switch() {
        for threshold in 2..7u32 {
            let mut h = hysteresis(threshold, NullZonePolicy::Counted);
            // Establish A first
            for _ in 0..threshold {
                h.update(Some(A));
            }
            assert_eq!(h.stable(), Some(A));

            // Runs of B shorter than threshold, separated by A
            for run in 1..threshold {
                for _ in 0..run {
                    assert_eq!(h.update(Some(B)), Some(A));
                }
                assert_eq!(h.update(Some(A)), Some(A));
            }
        }
    }

    #[test]
    fn test_converges_after_threshold() {
        let mut h = hysteresis(4, NullZonePolicy::Counted);
        for _ in 0..4 {
            h.update(Some(A));
        }
        for i in 0..4 {
            let out = h.update(Some(B));
            if i < 3 {
                assert_eq!(out, Some(A));
            } else {
                assert_eq!(out, Some(B));
            }
        }
    }

    #[test]
    fn test_counted_null_tolerates_blink() {
        let mut h = hysteresis(5, NullZonePolicy::Counted);
        for _ in 0..5 {
            h.update(Some(A));
        }
        // Two dropped readings do not clear the zone
        assert_eq!(h.update(None), Some(A));
        assert_eq!(h.update(None), Some(A));
        assert_eq!(h.update(Some(A)), Some(A));

        // Sustained off-target does
        for _ in 0..4 {
            assert_eq!(h.update(None), Some(A));
        }
        assert_eq!(h.update(None), None);
    }

    #[test]
    fn test_clear_immediately_policy() {
        let mut h = hysteresis(3, NullZonePolicy::ClearImmediately);
        for _ in 0..3 {
            h.update(Some(A));
        }
        assert_eq!(h.update(None), None);
        // Coming back still needs the full run
        assert_eq!(h.update(Some(A)), None);
        assert_eq!(h.update(Some(A)), None);
        assert_eq!(h.update(Some(A)), Some(A));
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut h = hysteresis(3, NullZonePolicy::Counted);
        for _ in 0..10 {
            h.update(Some(B));
        }
        h.reset();
        h.reset();
        assert_eq!(h.stable(), None);
        assert_eq!(h.consecutive(), 0);
        assert_eq!(h.update(Some(A)), None);
        assert_eq!(h.consecutive(), 1);
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let err = ZoneHysteresis::new(HysteresisConfig {
            threshold: 0,
            null_policy: NullZonePolicy::Counted,
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::ZeroStabilityThreshold);
    }

    #[test]
    fn test_status_sexp() {
        let mut h = hysteresis(2, NullZonePolicy::Counted);
        h.update(Some(A));
        h.update(Some(A));
        let sexp = h.status_sexp();
        assert!(sexp.contains(":stable-zone (:row :up :col :left)"));
        assert!(sexp.contains(":count 2"));
        assert!(sexp.contains(":null-policy :counted"));
    }
}
