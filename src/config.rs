use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fractal::FractalKind;
use crate::gesture::{DEFAULT_DEADZONE, TrackerKind};
use crate::math::C;
use crate::viewport::{PhysicsParams, Viewport};

pub const DEFAULT_CONFIG_PATH: &str = "fractal_voyager.json";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub viewport: ViewportConfig,
    pub physics: PhysicsParams,
    pub gesture: GestureConfig,
    pub narration: NarrationConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: usize,
    pub height: usize,
    pub target_fps: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig { width: 960, height: 600, target_fps: 60 }
    }
}

/// Starting viewport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportConfig {
    pub center: (f64, f64),
    pub zoom: f64,
    pub iterations: u32,
    pub fractal: FractalKind,
    pub color_phase: f64,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        let vp = Viewport::default();
        ViewportConfig {
            center: (vp.center.re, vp.center.im),
            zoom: vp.zoom,
            iterations: vp.iterations,
            fractal: vp.fractal,
            color_phase: vp.color_phase,
        }
    }
}

impl ViewportConfig {
    pub fn to_viewport(&self) -> Viewport {
        Viewport {
            center: C::new(self.center.0, self.center.1),
            zoom: self.zoom,
            iterations: self.iterations,
            fractal: self.fractal,
            color_phase: self.color_phase.rem_euclid(1.0),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub deadzone: f64,
    pub poll_hz: u32,
    pub tracker: TrackerKind,
    pub sim_jitter: f64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        GestureConfig {
            deadzone: DEFAULT_DEADZONE,
            poll_hz: 30,
            tracker: TrackerKind::Simulated,
            sim_jitter: 0.002,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub model: String,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        NarrationConfig {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout_secs: 15,
            api_key_env: "API_KEY".to_string(),
        }
    }
}

impl NarrationConfig {
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.trim().is_empty())
    }
}

impl Config {
    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_json(&text)?;
        log::info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let vp = &self.viewport;
        if !(vp.zoom.is_finite() && vp.zoom > 0.0) {
            return Err(ConfigError::Invalid(format!("viewport.zoom must be positive, got {}", vp.zoom)));
        }
        if vp.iterations == 0 {
            return Err(ConfigError::Invalid("viewport.iterations must be at least 1".into()));
        }
        if !(vp.center.0.is_finite() && vp.center.1.is_finite()) {
            return Err(ConfigError::Invalid("viewport.center must be finite".into()));
        }
        let p = &self.physics;
        for (name, value) in [
            ("physics.zoom_in_factor", p.zoom_in_factor),
            ("physics.zoom_out_factor", p.zoom_out_factor),
            ("physics.min_zoom", p.min_zoom),
            ("physics.max_zoom", p.max_zoom),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!("{} must be positive and finite, got {}", name, value)));
            }
        }
        if p.min_zoom > p.max_zoom {
            return Err(ConfigError::Invalid("physics.min_zoom must not exceed physics.max_zoom".into()));
        }
        if !(p.min_zoom..=p.max_zoom).contains(&vp.zoom) {
            return Err(ConfigError::Invalid(format!(
                "viewport.zoom {} is outside [{}, {}]",
                vp.zoom, p.min_zoom, p.max_zoom
            )));
        }
        let g = &self.gesture;
        for (name, value) in [
            ("physics.base_pan_speed", p.base_pan_speed),
            ("physics.pan_gate", p.pan_gate),
            ("physics.color_phase_rate", p.color_phase_rate),
            ("gesture.deadzone", g.deadzone),
            ("gesture.sim_jitter", g.sim_jitter),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!("{} must be finite and non-negative, got {}", name, value)));
            }
        }
        if !vp.color_phase.is_finite() {
            return Err(ConfigError::Invalid("viewport.color_phase must be finite".into()));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("window size must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_startup_view() {
        let config = Config::default();
        assert_eq!(config.viewport.to_viewport(), Viewport::default());
        assert_eq!(config.physics, PhysicsParams::default());
        assert_eq!(config.gesture.deadzone, 0.15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config = Config::from_json(r#"{ "viewport": { "fractal": "Julia", "iterations": 400 }, "gesture": { "tracker": "none" } }"#)
            .unwrap();
        assert_eq!(config.viewport.fractal, FractalKind::Julia);
        assert_eq!(config.viewport.iterations, 400);
        assert_eq!(config.viewport.zoom, 1.0);
        assert_eq!(config.gesture.tracker, TrackerKind::None);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(Config::from_json(r#"{ "viewport": { "zoom": 0.0 } }"#), Err(ConfigError::Invalid(_))));
        assert!(matches!(Config::from_json(r#"{ "viewport": { "iterations": 0 } }"#), Err(ConfigError::Invalid(_))));
        assert!(matches!(Config::from_json("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn rejects_non_finite_or_negative_tuning() {
        let fields = [
            ("physics", "zoom_in_factor"),
            ("physics", "zoom_out_factor"),
            ("physics", "base_pan_speed"),
            ("physics", "pan_gate"),
            ("physics", "color_phase_rate"),
            ("physics", "min_zoom"),
            ("physics", "max_zoom"),
            ("gesture", "deadzone"),
            ("gesture", "sim_jitter"),
        ];
        for (section, field) in fields {
            // JSON has no NaN or inf literal, so check in-memory values too.
            for bad in [f64::NAN, f64::INFINITY, -1.0] {
                let mut config = Config::default();
                match (section, field) {
                    ("physics", "zoom_in_factor") => config.physics.zoom_in_factor = bad,
                    ("physics", "zoom_out_factor") => config.physics.zoom_out_factor = bad,
                    ("physics", "base_pan_speed") => config.physics.base_pan_speed = bad,
                    ("physics", "pan_gate") => config.physics.pan_gate = bad,
                    ("physics", "color_phase_rate") => config.physics.color_phase_rate = bad,
                    ("physics", "min_zoom") => config.physics.min_zoom = bad,
                    ("physics", "max_zoom") => config.physics.max_zoom = bad,
                    ("gesture", "deadzone") => config.gesture.deadzone = bad,
                    _ => config.gesture.sim_jitter = bad,
                }
                assert!(
                    matches!(config.validate(), Err(ConfigError::Invalid(_))),
                    "{section}.{field} = {bad} was accepted"
                );
            }

            let json = format!(r#"{{ "{section}": {{ "{field}": -0.5 }} }}"#);
            assert!(matches!(Config::from_json(&json), Err(ConfigError::Invalid(_))), "{json}");
        }
    }

    #[test]
    fn rejects_inverted_or_excluding_zoom_limits() {
        let inverted = r#"{ "physics": { "min_zoom": 10.0, "max_zoom": 2.0 } }"#;
        assert!(matches!(Config::from_json(inverted), Err(ConfigError::Invalid(_))));
        let outside = r#"{ "viewport": { "zoom": 1e-20 } }"#;
        assert!(matches!(Config::from_json(outside), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_means_defaults() {
        let config = Config::load(Path::new("/definitely/not/here/fractal_voyager.json")).unwrap();
        assert_eq!(config, Config::default());
    }
}
