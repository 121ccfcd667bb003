pub mod math;
pub mod fractal;
pub mod viewport;
pub mod gesture;
pub mod render_loop;
pub mod llm;
pub mod config;
pub mod error;
pub mod snapshot;
pub mod visualizer;

pub use math::C;
pub use fractal::{
    FractalKind, FrameGeometry, Orbit, Rgba, escape, evaluate_pixel, palette, render_frame,
    smooth_iteration,
};
pub use viewport::{PhysicsParams, Viewport, format_zoom, integrate};
pub use gesture::{
    GestureClassifier, GestureReading, GestureSlot, HandLandmarks, HandTracker, Landmark,
    SimulatedHandTracker, TrackerKind, ZoomAction, join_gesture_loop, spawn_gesture_loop,
    synthetic_hand,
};
pub use render_loop::{ControlHandle, Frame, RenderLoop};
pub use llm::{Narration, NarrationBridge, NarrationError, Narrator};
pub use config::Config;
pub use error::{ConfigError, RenderError};
pub use visualizer::Visualizer;
