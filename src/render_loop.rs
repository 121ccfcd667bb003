//! Per-frame driver: gesture → physics → pixels → snapshot.
//!
//! [`RenderLoop`] is the only owner of the live [`Viewport`]. Everything else
//! sees copies, either through [`RenderLoop::subscribe`] or the value returned
//! from each tick.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use tokio::sync::watch;

use crate::fractal::{FractalKind, FrameGeometry, render_frame};
use crate::gesture::{GestureReading, GestureSlot};
use crate::viewport::{PhysicsParams, Viewport, integrate};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    SelectFractal(FractalKind),
}

/// Cloneable sender for user commands, applied at the start of the next tick.
#[derive(Clone)]
pub struct ControlHandle {
    tx: Sender<Control>,
}

impl ControlHandle {
    pub fn select_fractal(&self, kind: FractalKind) -> bool {
        self.tx.send(Control::SelectFractal(kind)).is_ok()
    }
}

/// Row-major 0RGB pixel buffer with its cached geometry.
pub struct Frame {
    geometry: FrameGeometry,
    pixels: Vec<u32>,
}

impl Frame {
    pub fn new(width: usize, height: usize) -> Self {
        let geometry = FrameGeometry::new(width, height);
        Frame {
            pixels: vec![0; geometry.width * geometry.height],
            geometry,
        }
    }

    /// Reallocates for a new size; old contents are dropped, not scaled.
    /// Returns whether anything changed.
    pub fn resize(&mut self, width: usize, height: usize) -> bool {
        let geometry = FrameGeometry::new(width, height);
        if geometry == self.geometry {
            return false;
        }
        self.geometry = geometry;
        self.pixels = vec![0; geometry.width * geometry.height];
        true
    }

    pub fn width(&self) -> usize {
        self.geometry.width
    }

    pub fn height(&self) -> usize {
        self.geometry.height
    }

    pub fn geometry(&self) -> &FrameGeometry {
        &self.geometry
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }
}

pub struct RenderLoop {
    viewport: Viewport,
    params: PhysicsParams,
    gestures: GestureSlot,
    reading: GestureReading,
    control_tx: Sender<Control>,
    control_rx: Receiver<Control>,
    snapshots: watch::Sender<Viewport>,
}

impl RenderLoop {
    pub fn new(initial: Viewport, params: PhysicsParams, gestures: GestureSlot) -> Self {
        let (control_tx, control_rx) = mpsc::channel();
        let (snapshots, _) = watch::channel(initial);
        RenderLoop {
            viewport: initial,
            params,
            gestures,
            reading: GestureReading::default(),
            control_tx,
            control_rx,
            snapshots,
        }
    }

    pub fn controls(&self) -> ControlHandle {
        ControlHandle { tx: self.control_tx.clone() }
    }

    /// Receiver of the viewport as published after each tick.
    pub fn subscribe(&self) -> watch::Receiver<Viewport> {
        self.snapshots.subscribe()
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Reading used by the most recent tick.
    pub fn last_reading(&self) -> GestureReading {
        self.reading
    }

    /// Applies pending controls and one physics step. Does not draw.
    pub fn advance(&mut self) -> Viewport {
        self.apply_controls();
        if let Some(reading) = self.gestures.latest() {
            self.reading = reading;
        }
        self.viewport = integrate(&self.viewport, &self.reading, &self.params);
        self.viewport
    }

    /// One full frame: advance, evaluate every pixel, publish the snapshot.
    pub fn tick(&mut self, frame: &mut Frame) -> Viewport {
        let viewport = self.advance();
        let geometry = *frame.geometry();
        render_frame(frame.pixels_mut(), &geometry, &viewport);
        self.snapshots.send_replace(viewport);
        viewport
    }

    fn apply_controls(&mut self) {
        loop {
            match self.control_rx.try_recv() {
                Ok(Control::SelectFractal(kind)) => {
                    if kind != self.viewport.fractal {
                        log::info!("fractal: {} -> {}", self.viewport.fractal, kind);
                    }
                    self.viewport.fractal = kind;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture::ZoomAction;
    use crate::math::C;

    fn fist() -> GestureReading {
        GestureReading {
            detected: true,
            pan_vector: (0.0, 0.0),
            zoom_action: ZoomAction::Out,
            hand_center: (0.5, 0.5),
        }
    }

    #[test]
    fn runs_without_any_gesture_source() {
        let start = Viewport::default();
        let mut rl = RenderLoop::new(start, PhysicsParams::default(), GestureSlot::new());
        let mut frame = Frame::new(16, 10);
        for _ in 0..5 {
            rl.tick(&mut frame);
        }
        let vp = rl.viewport();
        assert_eq!(vp.center, start.center);
        assert_eq!(vp.zoom, start.zoom);
        assert!((vp.color_phase - 0.01).abs() < 1e-12);
    }

    #[test]
    fn uses_newest_reading_each_tick() {
        let slot = GestureSlot::new();
        let mut rl = RenderLoop::new(Viewport::default(), PhysicsParams::default(), slot.clone());
        slot.publish(fist());
        rl.advance();
        slot.publish(GestureReading { zoom_action: ZoomAction::In, ..fist() });
        rl.advance();
        assert!((rl.viewport().zoom - 0.98 * 1.02).abs() < 1e-12);
        assert_eq!(rl.last_reading().zoom_action, ZoomAction::In);
    }

    #[test]
    fn stale_reading_is_reused() {
        let slot = GestureSlot::new();
        let mut rl = RenderLoop::new(Viewport::default(), PhysicsParams::default(), slot.clone());
        slot.publish(fist());
        for _ in 0..3 {
            rl.advance();
        }
        assert!((rl.viewport().zoom - 0.98f64.powi(3)).abs() < 1e-12);
    }

    #[test]
    fn busy_slot_falls_back_to_previous_reading() {
        let slot = GestureSlot::new();
        let mut rl = RenderLoop::new(Viewport::default(), PhysicsParams::default(), slot.clone());
        slot.publish(fist());
        rl.advance();

        {
            let mut held = slot.hold();
            // Written but not yet released: the loop must not see it, nor wait for it.
            *held = GestureReading { zoom_action: ZoomAction::In, ..fist() };
            assert_eq!(slot.latest(), None);
            rl.advance();
            rl.advance();
        }
        assert_eq!(rl.last_reading().zoom_action, ZoomAction::Out);
        assert!((rl.viewport().zoom - 0.98f64.powi(3)).abs() < 1e-12);

        rl.advance();
        assert_eq!(rl.last_reading().zoom_action, ZoomAction::In);
    }

    #[test]
    fn fractal_selection_keeps_camera() {
        let slot = GestureSlot::new();
        slot.publish(fist());
        let mut rl = RenderLoop::new(Viewport::default(), PhysicsParams::default(), slot);
        rl.advance();
        let before = rl.viewport();

        let controls = rl.controls();
        assert!(controls.select_fractal(FractalKind::BurningShip));
        // Not applied until the next tick.
        assert_eq!(rl.viewport().fractal, FractalKind::Mandelbrot);
        let after = rl.advance();
        assert_eq!(after.fractal, FractalKind::BurningShip);
        assert_eq!(after.center, before.center);
        assert!((after.zoom - before.zoom * 0.98).abs() < 1e-12);
        assert!(after.color_phase > before.color_phase);
    }

    #[test]
    fn snapshots_are_copies() {
        let mut rl = RenderLoop::new(Viewport::default(), PhysicsParams::default(), GestureSlot::new());
        let rx = rl.subscribe();
        let mut frame = Frame::new(8, 8);
        let published = rl.tick(&mut frame);
        let mut seen = *rx.borrow();
        assert_eq!(seen, published);

        // Mutating the copy has no effect on the loop.
        seen.center = C::new(9.0, 9.0);
        assert_ne!(rl.viewport().center, seen.center);
    }

    #[test]
    fn resize_reallocates() {
        let mut frame = Frame::new(4, 4);
        assert!(!frame.resize(4, 4));
        assert!(frame.resize(10, 3));
        assert_eq!(frame.pixels().len(), 30);
        assert_eq!(frame.geometry().width, 10);
        // Degenerate sizes clamp to one pixel.
        assert!(frame.resize(0, 0));
        assert_eq!(frame.pixels().len(), 1);
    }

    #[test]
    fn tick_fills_every_pixel() {
        let mut rl = RenderLoop::new(Viewport::default(), PhysicsParams::default(), GestureSlot::new());
        let mut frame = Frame::new(32, 20);
        frame.pixels_mut().fill(0xDEAD_BEEF);
        rl.tick(&mut frame);
        // 0RGB never sets the top byte.
        assert!(frame.pixels().iter().all(|&p| p >> 24 == 0));
    }
}
