use serde::{Deserialize, Serialize};

use crate::fractal::FractalKind;
use crate::gesture::{GestureReading, ZoomAction};
use crate::math::C;

/// Camera state over the fractal plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub center: C,
    /// Always > 0; only ever multiplied.
    pub zoom: f64,
    pub iterations: u32,
    pub fractal: FractalKind,
    /// Palette drift, kept in [0, 1).
    pub color_phase: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Viewport {
            center: C::new(-0.5, 0.0),
            zoom: 1.0,
            iterations: 100,
            fractal: FractalKind::Mandelbrot,
            color_phase: 0.0,
        }
    }
}

/// Fixed per-tick constants for [`integrate`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsParams {
    pub zoom_in_factor: f64,
    pub zoom_out_factor: f64,
    /// Plane units per tick at zoom 1, full deflection.
    pub base_pan_speed: f64,
    /// Pan applies only when some axis exceeds this magnitude.
    pub pan_gate: f64,
    pub color_phase_rate: f64,
    /// Zoom is clamped to `[min_zoom, max_zoom]` so it stays finite and
    /// reversible in both directions.
    pub min_zoom: f64,
    pub max_zoom: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        PhysicsParams {
            zoom_in_factor: 1.02,
            zoom_out_factor: 0.98,
            base_pan_speed: 0.02,
            pan_gate: 0.1,
            color_phase_rate: 0.002,
            min_zoom: 1e-12,
            max_zoom: 1e300,
        }
    }
}

/// Zoom in two-decimal exponential form with a signed exponent, e.g. `1.23e+4`.
pub fn format_zoom(zoom: f64) -> String {
    let s = format!("{:.2e}", zoom);
    match s.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{}e+{}", mantissa, exp),
        _ => s,
    }
}

/// One physics tick. Center and zoom move only while a hand is detected;
/// color phase always advances.
pub fn integrate(prev: &Viewport, reading: &GestureReading, params: &PhysicsParams) -> Viewport {
    let mut next = *prev;

    if reading.detected {
        next.zoom = match reading.zoom_action {
            ZoomAction::In => prev.zoom * params.zoom_in_factor,
            ZoomAction::Out => prev.zoom * params.zoom_out_factor,
            ZoomAction::Idle => prev.zoom,
        }
        .max(params.min_zoom)
        .min(params.max_zoom);

        let (px, py) = reading.pan_vector;
        if px.abs() > params.pan_gate || py.abs() > params.pan_gate {
            let pan_speed = params.base_pan_speed / next.zoom;
            // Image y grows downward, plane y grows upward.
            let moved = C::new(prev.center.re + px * pan_speed, prev.center.im - py * pan_speed);
            if moved.re.is_finite() && moved.im.is_finite() {
                next.center = moved;
            }
        }
    }

    next.color_phase = (prev.color_phase + params.color_phase_rate).rem_euclid(1.0);
    next
}
