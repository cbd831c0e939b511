//! Tracker configuration aggregate.
//!
//! One struct carries every tunable of the pipeline. Each stage validates its
//! own section; `TrackerConfig::validate` runs them all so a bad value is
//! rejected before any session state exists.

use crate::error::ConfigError;
use crate::gaze::calibration::CalibrationConfig;
use crate::gaze::dwell::DwellConfig;
use crate::gaze::filter::FilterConfig;
use crate::gaze::head::HeadConfig;
use crate::gaze::hysteresis::HysteresisConfig;
use crate::gaze::zone::GridSpec;

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Screen size in pixels, used for banded zones and calibration points.
    pub screen_width: f64,
    pub screen_height: f64,
    pub grid: GridSpec,
    pub filter: FilterConfig,
    pub hysteresis: HysteresisConfig,
    pub dwell: DwellConfig,
    pub head: HeadConfig,
    pub calibration: CalibrationConfig,
    /// Ask the engine to keep its learned model across sessions.
    pub persist_model: bool,
    /// Soft-recalibrate automatically when the head monitor requests it.
    pub auto_reanchor: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920.0,
            screen_height: 1080.0,
            grid: GridSpec::default(),
            filter: FilterConfig::default(),
            hysteresis: HysteresisConfig::default(),
            dwell: DwellConfig::default(),
            head: HeadConfig::default(),
            calibration: CalibrationConfig::default(),
            persist_model: true,
            auto_reanchor: true,
        }
    }
}

impl TrackerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.screen_width > 0.0 && self.screen_height > 0.0) {
            return Err(ConfigError::InvalidScreen {
                width: self.screen_width,
                height: self.screen_height,
            });
        }
        self.grid.validate()?;
        self.filter.validate()?;
        self.hysteresis.validate()?;
        self.dwell.validate()?;
        self.head.validate()?;
        self.calibration.validate()?;
        Ok(())
    }

    pub fn config_sexp(&self) -> String {
        format!(
            "(:screen ({:.0} {:.0}) :grid {} :filter {} :stability-threshold {} :dwell {} :head {} :clicks-per-point {} :persist-model {} :auto-reanchor {})",
            self.screen_width,
            self.screen_height,
            self.grid.as_sexp(),
            self.filter.config_sexp(),
            self.hysteresis.threshold,
            self.dwell.config_sexp(),
            self.head.config_sexp(),
            self.calibration.clicks_per_point,
            if self.persist_model { "t" } else { "nil" },
            if self.auto_reanchor { "t" } else { "nil" },
        )
    }
}
