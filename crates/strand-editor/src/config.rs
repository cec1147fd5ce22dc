//! Editor tuning knobs.
//!
//! Every field has a default so a partial JSON file is enough to override
//! a single value.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use strand_core::canvas::DEFAULT_GRID_SIZE;
use strand_core::strand::{DEFAULT_COLOR, DEFAULT_WIDTH};
use strand_render::hit::{ATTACH_RADIUS, HIT_TOLERANCE, MOVE_AREA};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EditorConfig {
    pub default_color: String,
    pub default_width: f64,
    pub grid_size: f64,
    pub undo_capacity: usize,
    pub hit_tolerance: f64,
    pub attach_radius: f64,
    pub move_area: f64,
    /// Shortest strand an attach gesture may create.
    pub min_attach_length: f64,
    pub zoom_step: f64,
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub autosave_secs: u64,
    /// Minimum spacing between freehand samples.
    pub draw_sample_spacing: f64,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            default_color: DEFAULT_COLOR.to_string(),
            default_width: DEFAULT_WIDTH,
            grid_size: DEFAULT_GRID_SIZE,
            undo_capacity: 50,
            hit_tolerance: HIT_TOLERANCE,
            attach_radius: ATTACH_RADIUS,
            move_area: MOVE_AREA,
            min_attach_length: 10.0,
            zoom_step: 1.2,
            min_zoom: 0.2,
            max_zoom: 5.0,
            autosave_secs: 30,
            draw_sample_spacing: 5.0,
        }
    }
}

impl EditorConfig {
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn autosave_period(&self) -> Duration {
        Duration::from_secs(self.autosave_secs.max(1))
    }

    pub fn clamp_zoom(&self, zoom: f64) -> f64 {
        zoom.clamp(self.min_zoom, self.max_zoom)
    }
}
