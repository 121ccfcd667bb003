use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::time::{SystemTime, UNIX_EPOCH};

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use crate::config::WindowConfig;
use crate::error::RenderError;
use crate::fractal::FractalKind;
use crate::gesture::{GestureReading, SimInput, SimPose, ZoomAction};
use crate::llm::{Narration, Narrator};
use crate::render_loop::{ControlHandle, Frame, RenderLoop};
use crate::snapshot::save_frame;
use crate::viewport::{Viewport, format_zoom};

const GLYPH_SCALE: usize = 2;
const GLYPH_ADVANCE: usize = 4 * GLYPH_SCALE;
const LINE_HEIGHT: usize = 7 * GLYPH_SCALE;
const MARGIN: usize = 16;

const CYAN: u32 = 0x22D3EE;
const DIM_CYAN: u32 = 0x0E7490;
const WHITE: u32 = 0xFFFFFF;
const GREEN: u32 = 0x4ADE80;
const RED: u32 = 0xF87171;

/// Per-frame sim-hand step in normalized image units.
const SIM_STEP: f64 = 0.01;

// 3x5 bitmap font; uppercase is folded to lowercase before lookup.
fn glyph(ch: char) -> [u8; 5] {
    match ch {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' => [0b101, 0b111, 0b111, 0b101, 0b101],
        'n' => [0b110, 0b101, 0b101, 0b101, 0b101],
        'o' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' => [0b101, 0b101, 0b101, 0b101, 0b010],
        'w' => [0b101, 0b101, 0b111, 0b111, 0b101],
        'x' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '[' => [0b110, 0b100, 0b100, 0b100, 0b110],
        ']' => [0b011, 0b001, 0b001, 0b001, 0b011],
        '(' => [0b010, 0b100, 0b100, 0b100, 0b010],
        ')' => [0b010, 0b001, 0b001, 0b001, 0b010],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        '!' => [0b010, 0b010, 0b010, 0b000, 0b010],
        '?' => [0b111, 0b001, 0b011, 0b000, 0b010],
        _ => [0b000; 5],
    }
}

/// Software canvas over a [`Frame`]; all drawing clips to its bounds.
struct Canvas<'a> {
    pixels: &'a mut [u32],
    width: usize,
    height: usize,
}

impl Canvas<'_> {
    fn put(&mut self, x: usize, y: usize, color: u32) {
        if x < self.width && y < self.height {
            self.pixels[y * self.width + x] = color;
        }
    }

    /// Darkens a rectangle toward black by `alpha` (0..=255).
    fn shade(&mut self, x: usize, y: usize, w: usize, h: usize, alpha: u32) {
        let keep = 255 - alpha.min(255);
        for yy in y..(y + h).min(self.height) {
            for xx in x..(x + w).min(self.width) {
                let p = &mut self.pixels[yy * self.width + xx];
                let r = ((*p >> 16) & 0xFF) * keep / 255;
                let g = ((*p >> 8) & 0xFF) * keep / 255;
                let b = (*p & 0xFF) * keep / 255;
                *p = (r << 16) | (g << 8) | b;
            }
        }
    }

    fn draw_char(&mut self, x: usize, y: usize, ch: char, color: u32) {
        for (dy, row) in glyph(ch.to_ascii_lowercase()).iter().enumerate() {
            for dx in 0..3 {
                if (row >> (2 - dx)) & 1 == 0 {
                    continue;
                }
                for sy in 0..GLYPH_SCALE {
                    for sx in 0..GLYPH_SCALE {
                        self.put(x + dx * GLYPH_SCALE + sx, y + dy * GLYPH_SCALE + sy, color);
                    }
                }
            }
        }
    }

    fn text(&mut self, x: usize, y: usize, text: &str, color: u32) {
        let mut cx = x;
        for ch in text.chars() {
            if cx + GLYPH_ADVANCE > self.width {
                break;
            }
            self.draw_char(cx, y, ch, color);
            cx += GLYPH_ADVANCE;
        }
    }

    fn text_right(&mut self, right: usize, y: usize, text: &str, color: u32) {
        let w = text.chars().count() * GLYPH_ADVANCE;
        self.text(right.saturating_sub(w), y, text, color);
    }

    fn ring(&mut self, cx: f64, cy: f64, radius: f64, color: u32) {
        let steps = (radius * 8.0).max(16.0) as usize;
        for i in 0..steps {
            let a = i as f64 / steps as f64 * std::f64::consts::TAU;
            for r in [radius, radius - 1.0] {
                let x = cx + r * a.cos();
                let y = cy + r * a.sin();
                if x >= 0.0 && y >= 0.0 {
                    self.put(x as usize, y as usize, color);
                }
            }
        }
    }
}

/// Greedy word wrap to at most `cols` characters per line.
fn wrap(text: &str, cols: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + 1 + word.len() > cols {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

struct Hud<'a> {
    viewport: Viewport,
    reading: GestureReading,
    input_online: bool,
    narration: Option<&'a Narration>,
    scanning: bool,
}

fn draw_hud(frame: &mut Frame, hud: &Hud) {
    let width = frame.width();
    let height = frame.height();
    let mut canvas = Canvas { pixels: frame.pixels_mut(), width, height };
    let vp = &hud.viewport;

    // Header.
    canvas.shade(0, 0, width, MARGIN + LINE_HEIGHT * 4, 110);
    canvas.text(MARGIN, MARGIN, "FRACTAL VOYAGER", WHITE);
    canvas.text(
        MARGIN,
        MARGIN + LINE_HEIGHT,
        &format!("COORDINATES: {:.6} : {:.6}", vp.center.re, vp.center.im),
        CYAN,
    );
    canvas.text(MARGIN, MARGIN + LINE_HEIGHT * 2, &format!("ZOOM: {}", format_zoom(vp.zoom)), CYAN);

    for (i, kind) in FractalKind::ALL.iter().enumerate() {
        let color = if *kind == vp.fractal { WHITE } else { DIM_CYAN };
        let label = format!("[{}] {}", i + 1, kind.name());
        canvas.text_right(width.saturating_sub(MARGIN), MARGIN + LINE_HEIGHT * i, &label, color);
    }

    // Footer.
    let footer_y = height.saturating_sub(MARGIN + LINE_HEIGHT * 4);
    canvas.shade(0, footer_y.saturating_sub(MARGIN / 2), width, height, 110);
    let action = if hud.scanning { "SCANNING..." } else { "[N] ANALYZE SECTOR" };
    canvas.text(MARGIN, footer_y, action, CYAN);
    let status = if hud.input_online { "SYSTEM ONLINE" } else { "WAITING FOR INPUT" };
    canvas.text(MARGIN, footer_y + LINE_HEIGHT * 2, status, DIM_CYAN);
    let hints = ["PAN: MOVE HAND", "ZOOM IN: OPEN PALM", "ZOOM OUT: CLOSE FIST"];
    for (i, hint) in hints.iter().enumerate() {
        canvas.text_right(width.saturating_sub(MARGIN), footer_y + LINE_HEIGHT * i, hint, DIM_CYAN);
    }

    let panel_w = (width * 2 / 3).min(60 * GLYPH_ADVANCE);
    if let Some(n) = hud.narration.filter(|_| panel_w >= 2 * MARGIN + GLYPH_ADVANCE) {
        let cols = (panel_w.saturating_sub(2 * MARGIN) / GLYPH_ADVANCE).max(8);
        let body = wrap(&n.description, cols);
        let fact = wrap(&n.fact, cols);
        let panel_h = MARGIN * 2 + LINE_HEIGHT * (body.len() + fact.len() + 4);
        let x = width.saturating_sub(panel_w) / 2;
        let y = height.saturating_sub(panel_h) / 2;
        canvas.shade(x, y, panel_w, panel_h, 200);

        let mut line_y = y + MARGIN;
        canvas.text(x + MARGIN, line_y, &n.title, WHITE);
        canvas.text_right((x + panel_w).saturating_sub(MARGIN), line_y, "[X]", DIM_CYAN);
        line_y += LINE_HEIGHT * 2;
        for line in &body {
            canvas.text(x + MARGIN, line_y, line, CYAN);
            line_y += LINE_HEIGHT;
        }
        line_y += LINE_HEIGHT;
        canvas.text(x + MARGIN, line_y, "DATA NODE:", DIM_CYAN);
        line_y += LINE_HEIGHT;
        for line in &fact {
            canvas.text(x + MARGIN, line_y, line, CYAN);
            line_y += LINE_HEIGHT;
        }
    }

    // Hand cursor, mirrored like a selfie camera preview.
    if hud.reading.detected {
        let (hx, hy) = hud.reading.hand_center;
        let (color, radius) = match hud.reading.zoom_action {
            ZoomAction::In => (GREEN, 24.0),
            ZoomAction::Out => (RED, 8.0),
            ZoomAction::Idle => (CYAN, 16.0),
        };
        canvas.ring((1.0 - hx) * width as f64, hy * height as f64, radius, color);
    }
}

fn snapshot_path() -> PathBuf {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    PathBuf::from(format!("fractal_voyager_{}.png", secs))
}

/// Owns the window; everything here happens on the calling thread.
pub struct Visualizer {
    window: Window,
    frame: Frame,
    sim_tx: Option<Sender<SimInput>>,
    input_online: bool,
}

impl Visualizer {
    pub fn new(config: &WindowConfig, sim_tx: Option<Sender<SimInput>>, input_online: bool) -> Result<Self, RenderError> {
        let mut window = Window::new(
            "Fractal Voyager",
            config.width,
            config.height,
            WindowOptions { resize: true, ..WindowOptions::default() },
        )
        .map_err(RenderError::Surface)?;
        window.set_target_fps(config.target_fps);

        Ok(Visualizer {
            window,
            frame: Frame::new(config.width, config.height),
            sim_tx,
            input_online,
        })
    }

    /// Runs until the window closes or Escape is pressed.
    pub fn run(&mut self, render_loop: &mut RenderLoop, narrator: &Narrator) -> Result<(), RenderError> {
        let controls = render_loop.controls();

        while self.window.is_open() && !self.window.is_key_down(Key::Escape) {
            let (w, h) = self.window.get_size();
            if self.frame.resize(w, h) {
                log::debug!("surface resized to {}x{}", self.frame.width(), self.frame.height());
            }

            self.handle_keys(&controls, render_loop.viewport(), narrator);
            self.forward_sim_input();

            let viewport = render_loop.tick(&mut self.frame);
            let narration = narrator.latest();
            draw_hud(&mut self.frame, &Hud {
                viewport,
                reading: render_loop.last_reading(),
                input_online: self.input_online,
                narration: narration.as_ref(),
                scanning: narrator.is_pending(),
            });

            self.window
                .update_with_buffer(self.frame.pixels(), self.frame.width(), self.frame.height())
                .map_err(RenderError::Present)?;
        }
        Ok(())
    }

    fn handle_keys(&mut self, controls: &ControlHandle, viewport: Viewport, narrator: &Narrator) {
        let pressed = |key: Key| self.window.is_key_pressed(key, KeyRepeat::No);

        for (key, kind) in [(Key::Key1, FractalKind::Mandelbrot), (Key::Key2, FractalKind::Julia), (Key::Key3, FractalKind::BurningShip)] {
            if pressed(key) {
                controls.select_fractal(kind);
            }
        }
        if pressed(Key::N) {
            narrator.request(viewport);
        }
        if pressed(Key::X) || pressed(Key::Backspace) {
            narrator.dismiss();
        }
        if pressed(Key::P) {
            let path = snapshot_path();
            // The last presented frame, HUD included.
            if let Err(e) = save_frame(self.frame.pixels(), self.frame.width(), self.frame.height(), &path) {
                log::error!("snapshot failed: {}", e);
            }
        }
    }

    fn forward_sim_input(&mut self) {
        let Some(tx) = &self.sim_tx else { return };
        let mut inputs = Vec::new();

        // Screen-right is image-left: the camera view is mirrored.
        let mut dx = 0.0;
        let mut dy = 0.0;
        if self.window.is_key_down(Key::Right) { dx -= SIM_STEP; }
        if self.window.is_key_down(Key::Left) { dx += SIM_STEP; }
        if self.window.is_key_down(Key::Down) { dy += SIM_STEP; }
        if self.window.is_key_down(Key::Up) { dy -= SIM_STEP; }
        if dx != 0.0 || dy != 0.0 {
            inputs.push(SimInput::Move { dx, dy });
        }

        let pressed = |key: Key| self.window.is_key_pressed(key, KeyRepeat::No);
        if pressed(Key::O) { inputs.push(SimInput::Pose(SimPose::Open)); }
        if pressed(Key::F) { inputs.push(SimInput::Pose(SimPose::Fist)); }
        if pressed(Key::R) { inputs.push(SimInput::Pose(SimPose::Relaxed)); }
        if pressed(Key::H) { inputs.push(SimInput::ToggleVisible); }

        for input in inputs {
            if tx.send(input).is_err() {
                log::warn!("simulated tracker went away; keyboard hand disabled");
                self.sim_tx = None;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_respects_width() {
        let lines = wrap("a poetic description of the visual complexity here", 12);
        assert!(lines.iter().all(|l| l.len() <= 12));
        assert_eq!(lines.join(" "), "a poetic description of the visual complexity here");
        assert!(wrap("", 10).is_empty());
    }

    #[test]
    fn font_covers_hud_text() {
        let hud_text = "FRACTAL VOYAGER COORDINATES: -0.500000 ZOOM: 1.00e+0 [1] Burning Ship SCANNING... DATA NODE";
        for ch in hud_text.chars().filter(|c| !c.is_whitespace()) {
            assert_ne!(glyph(ch.to_ascii_lowercase()), [0; 5], "missing glyph for {ch:?}");
        }
    }

    #[test]
    fn hud_draws_within_bounds() {
        let mut frame = Frame::new(120, 80);
        let narration = Narration::unavailable();
        let reading = GestureReading { detected: true, hand_center: (0.0, 1.0), ..GestureReading::default() };
        draw_hud(&mut frame, &Hud {
            viewport: Viewport::default(),
            reading,
            input_online: true,
            narration: Some(&narration),
            scanning: true,
        });
        assert!(frame.pixels().iter().any(|&p| p == WHITE));
    }

    #[test]
    fn hud_survives_tiny_and_minimized_windows() {
        let narration = Narration::unavailable();
        for (w, h) in [(1, 1), (0, 0), (23, 9), (40, 2), (2, 300)] {
            let mut frame = Frame::new(w, h);
            let reading = GestureReading { detected: true, hand_center: (0.5, 0.5), ..GestureReading::default() };
            draw_hud(&mut frame, &Hud {
                viewport: Viewport::default(),
                reading,
                input_online: false,
                narration: Some(&narration),
                scanning: false,
            });
            assert_eq!(frame.pixels().len(), frame.width() * frame.height());
        }
    }
}
