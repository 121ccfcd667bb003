use std::f64::consts::{LN_2, TAU};
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::math::C;
use crate::viewport::Viewport;

/// Hard per-pixel iteration ceiling, whatever the viewport asks for.
pub const MAX_ITERATIONS: u32 = 1000;
pub const ESCAPE_RADIUS_SQ: f64 = 4.0;
/// Fixed parameter iterated by the Julia family.
pub const JULIA_C: C = C { re: -0.8, im: 0.156 };
/// Scale applied to the smoothed iteration count before palette lookup.
pub const PALETTE_SCALE: f64 = 0.05;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FractalKind {
    #[default]
    Mandelbrot,
    Julia,
    BurningShip,
}

impl FractalKind {
    pub const ALL: [FractalKind; 3] = [FractalKind::Mandelbrot, FractalKind::Julia, FractalKind::BurningShip];

    /// Stable integer tag for each family.
    pub fn id(self) -> u32 {
        match self {
            FractalKind::Mandelbrot => 0,
            FractalKind::Julia => 1,
            FractalKind::BurningShip => 2,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        match id {
            0 => Some(FractalKind::Mandelbrot),
            1 => Some(FractalKind::Julia),
            2 => Some(FractalKind::BurningShip),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FractalKind::Mandelbrot => "Mandelbrot",
            FractalKind::Julia => "Julia",
            FractalKind::BurningShip => "Burning Ship",
        }
    }
}

impl fmt::Display for FractalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FractalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "mandelbrot" => Ok(FractalKind::Mandelbrot),
            "julia" => Ok(FractalKind::Julia),
            "burningship" => Ok(FractalKind::BurningShip),
            other => Err(format!("unknown fractal '{}' (expected mandelbrot, julia or burning-ship)", other)),
        }
    }
}

/// Outcome of iterating one plane point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Orbit {
    /// Left the escape radius on iteration `n`; `z` is the first value outside it.
    Escaped { n: u32, z: C },
    /// Stayed bounded for the whole iteration budget.
    Bounded,
}

pub fn escape(kind: FractalKind, point: C, iterations: u32) -> Orbit {
    let cap = iterations.min(MAX_ITERATIONS);
    let (mut z, c) = match kind {
        FractalKind::Mandelbrot | FractalKind::BurningShip => (C::ZERO, point),
        FractalKind::Julia => (point, JULIA_C),
    };

    for n in 0..cap {
        if kind == FractalKind::BurningShip {
            z = z.fold_abs();
        }
        let next = z.square_add(c);
        if next.abs_sq() > ESCAPE_RADIUS_SQ {
            return Orbit::Escaped { n, z: next };
        }
        z = next;
    }
    Orbit::Bounded
}

/// Continuous iteration count for an escaped orbit.
pub fn smooth_iteration(n: u32, z: C) -> f64 {
    let log_zn = 0.5 * z.abs_sq().ln();
    let nu = (log_zn / LN_2).ln() / LN_2;
    n as f64 + 1.0 - nu
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };

    pub fn to_rgb8(self) -> [u8; 3] {
        let q = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b)]
    }

    /// Packed 0RGB, the layout minifb presents.
    pub fn to_argb(self) -> u32 {
        let [r, g, b] = self.to_rgb8();
        ((r as u32) << 16) | ((g as u32) << 8) | b as u32
    }
}

const PALETTE_A: [f64; 3] = [0.5, 0.5, 0.5];
const PALETTE_B: [f64; 3] = [0.5, 0.5, 0.5];
const PALETTE_C: [f64; 3] = [1.0, 1.0, 1.0];
const PALETTE_D: [f64; 3] = [0.263, 0.416, 0.557];

/// Cosine palette `a + b·cos(2π(c·t + d + phase))`.
pub fn palette(t: f64, phase: f64) -> Rgba {
    let ch = |i: usize| PALETTE_A[i] + PALETTE_B[i] * (TAU * (PALETTE_C[i] * t + PALETTE_D[i] + phase)).cos();
    Rgba { r: ch(0), g: ch(1), b: ch(2), a: 1.0 }
}

/// Resolution-dependent values, computed once per resize.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameGeometry {
    pub width: usize,
    pub height: usize,
    half_w: f64,
    half_h: f64,
    inv_height: f64,
}

impl FrameGeometry {
    pub fn new(width: usize, height: usize) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        FrameGeometry {
            width,
            height,
            half_w: 0.5 * width as f64,
            half_h: 0.5 * height as f64,
            inv_height: 1.0 / height as f64,
        }
    }

    /// Maps a device-pixel coordinate (origin bottom-left) to the plane.
    /// Height is the common divisor so pixels stay square.
    pub fn plane_point(&self, frag: (f64, f64), viewport: &Viewport) -> C {
        let uv = C::new((frag.0 - self.half_w) * self.inv_height, (frag.1 - self.half_h) * self.inv_height);
        viewport.center.add(uv.scale(1.0 / viewport.zoom))
    }
}

pub fn evaluate_pixel(frag: (f64, f64), viewport: &Viewport, geometry: &FrameGeometry) -> Rgba {
    let point = geometry.plane_point(frag, viewport);
    match escape(viewport.fractal, point, viewport.iterations) {
        Orbit::Bounded => Rgba::BLACK,
        Orbit::Escaped { n, z } => palette(smooth_iteration(n, z) * PALETTE_SCALE, viewport.color_phase),
    }
}

/// Fills a top-down row-major buffer. Rows are evaluated in parallel.
pub fn render_frame(pixels: &mut [u32], geometry: &FrameGeometry, viewport: &Viewport) {
    let width = geometry.width;
    let height = geometry.height;
    pixels
        .par_chunks_mut(width)
        .take(height)
        .enumerate()
        .for_each(|(row, line)| {
            let frag_y = (height - 1 - row) as f64 + 0.5;
            for (col, px) in line.iter_mut().enumerate() {
                *px = evaluate_pixel((col as f64 + 0.5, frag_y), viewport, geometry).to_argb();
            }
        });
}
