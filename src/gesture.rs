//! Hand-landmark gesture classification.
//!
//! A detector (anything implementing [`HandTracker`]) reports at most one hand
//! per frame as 21 normalized landmarks. [`GestureClassifier`] turns that into
//! a [`GestureReading`]: a deadzoned pan vector from the palm position and a
//! ternary zoom action from which fingers are extended. The acquisition loop
//! publishes readings into a [`GestureSlot`] where the render loop picks up
//! whatever is newest.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

// ── landmark indices ─────────────────────────────────────────────────────────

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_CMC: usize = 1;
pub const THUMB_MCP: usize = 2;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_DIP: usize = 7;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_DIP: usize = 11;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_PIP: usize = 14;
pub const RING_DIP: usize = 15;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_DIP: usize = 19;
pub const PINKY_TIP: usize = 20;

/// (tip, proximal joint) for index, middle, ring, pinky. The thumb is left out.
pub const FINGERS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_PIP),
    (MIDDLE_TIP, MIDDLE_PIP),
    (RING_TIP, RING_PIP),
    (PINKY_TIP, PINKY_PIP),
];

pub const DEFAULT_DEADZONE: f64 = 0.15;

// ── data ─────────────────────────────────────────────────────────────────────

/// Keypoint in normalized image space; `z` is relative depth and unused here.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Landmark {
    pub fn new(x: f64, y: f64) -> Self {
        Landmark { x, y, z: 0.0 }
    }

    fn distance(&self, other: &Landmark) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

pub type HandLandmarks = [Landmark; LANDMARK_COUNT];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ZoomAction {
    In,
    Out,
    #[default]
    Idle,
}

impl ZoomAction {
    /// Fist zooms out, open palm zooms in, anything mixed holds.
    pub fn from_fingers(open: [bool; 4]) -> Self {
        match open {
            [false, false, false, false] => ZoomAction::Out,
            [true, true, true, true] => ZoomAction::In,
            _ => ZoomAction::Idle,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GestureReading {
    pub detected: bool,
    /// Each axis in [-1, 1], image orientation (y down).
    pub pan_vector: (f64, f64),
    pub zoom_action: ZoomAction,
    /// Last known palm position in [0, 1]², kept through dropouts.
    pub hand_center: (f64, f64),
}

impl Default for GestureReading {
    fn default() -> Self {
        GestureReading {
            detected: false,
            pan_vector: (0.0, 0.0),
            zoom_action: ZoomAction::Idle,
            hand_center: (0.5, 0.5),
        }
    }
}

// ── classification ───────────────────────────────────────────────────────────

/// A finger is open when its tip is farther from the wrist than its proximal joint.
pub fn finger_states(hand: &HandLandmarks) -> [bool; 4] {
    let wrist = &hand[WRIST];
    FINGERS.map(|(tip, pip)| hand[tip].distance(wrist) > hand[pip].distance(wrist))
}

/// Zeroes `|d| < deadzone` and shifts the rest toward zero so the output is
/// continuous at the boundary.
pub fn apply_deadzone(d: f64, deadzone: f64) -> f64 {
    if !d.is_finite() || d.abs() < deadzone {
        0.0
    } else {
        d.signum() * (d.abs() - deadzone)
    }
}

#[derive(Clone, Debug)]
pub struct GestureClassifier {
    deadzone: f64,
    last_center: (f64, f64),
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_DEADZONE)
    }
}

impl GestureClassifier {
    pub fn new(deadzone: f64) -> Self {
        GestureClassifier {
            deadzone: deadzone.max(0.0),
            last_center: GestureReading::default().hand_center,
        }
    }

    pub fn classify(&mut self, hand: Option<&HandLandmarks>) -> GestureReading {
        let Some(hand) = hand else {
            return self.undetected();
        };

        let palm = hand[MIDDLE_MCP];
        if !palm.x.is_finite() || !palm.y.is_finite() {
            return self.undetected();
        }
        let center = (palm.x, palm.y);
        self.last_center = center;

        let pan_vector = (
            apply_deadzone((center.0 - 0.5) * 2.0, self.deadzone),
            apply_deadzone((center.1 - 0.5) * 2.0, self.deadzone),
        );

        GestureReading {
            detected: true,
            pan_vector,
            zoom_action: ZoomAction::from_fingers(finger_states(hand)),
            hand_center: center,
        }
    }

    fn undetected(&self) -> GestureReading {
        GestureReading {
            detected: false,
            pan_vector: (0.0, 0.0),
            zoom_action: ZoomAction::Idle,
            hand_center: self.last_center,
        }
    }
}

// ── detector capability ──────────────────────────────────────────────────────

/// Source of hand landmarks, polled once per acquisition cycle.
pub trait HandTracker: Send {
    fn latest_hand_landmarks(&mut self) -> Option<HandLandmarks>;

    fn name(&self) -> &str;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    None,
    #[default]
    Simulated,
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerKind::None => f.write_str("none"),
            TrackerKind::Simulated => f.write_str("simulated"),
        }
    }
}

impl FromStr for TrackerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(TrackerKind::None),
            "sim" | "simulated" => Ok(TrackerKind::Simulated),
            other => Err(format!("unknown tracker '{}' (expected none or simulated)", other)),
        }
    }
}

// ── synthetic hands ──────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimPose {
    Open,
    Fist,
    /// Index and middle out, ring and pinky curled.
    Relaxed,
}

impl SimPose {
    pub fn fingers(self) -> [bool; 4] {
        match self {
            SimPose::Open => [true; 4],
            SimPose::Fist => [false; 4],
            SimPose::Relaxed => [true, true, false, false],
        }
    }
}

/// Builds an upright right hand whose middle-finger base sits at `center`.
pub fn synthetic_hand(center: (f64, f64), open: [bool; 4]) -> HandLandmarks {
    let (cx, cy) = center;
    let mut hand = [Landmark::default(); LANDMARK_COUNT];

    hand[WRIST] = Landmark::new(cx, cy + 0.20);
    hand[THUMB_CMC] = Landmark::new(cx - 0.06, cy + 0.15);
    hand[THUMB_MCP] = Landmark::new(cx - 0.09, cy + 0.10);
    hand[THUMB_IP] = Landmark::new(cx - 0.11, cy + 0.06);
    hand[THUMB_TIP] = Landmark::new(cx - 0.12, cy + 0.02);

    let columns = [
        (INDEX_MCP, -0.04),
        (MIDDLE_MCP, 0.0),
        (RING_MCP, 0.04),
        (PINKY_MCP, 0.08),
    ];
    for ((mcp, dx), is_open) in columns.into_iter().zip(open) {
        let x = cx + dx;
        hand[mcp] = Landmark::new(x, cy);
        hand[mcp + 1] = Landmark::new(x, cy - 0.08);
        if is_open {
            hand[mcp + 2] = Landmark::new(x, cy - 0.12);
            hand[mcp + 3] = Landmark::new(x, cy - 0.16);
        } else {
            // Curled back down over the palm.
            hand[mcp + 2] = Landmark::new(x, cy - 0.05);
            hand[mcp + 3] = Landmark::new(x, cy - 0.02);
        }
    }
    hand
}

/// Input forwarded from the window to the simulated detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SimInput {
    Move { dx: f64, dy: f64 },
    Pose(SimPose),
    ToggleVisible,
}

/// Keyboard-driven stand-in for a camera detector. Produces a jittered
/// synthetic hand wherever the user has steered it.
pub struct SimulatedHandTracker {
    rx: Receiver<SimInput>,
    center: (f64, f64),
    pose: SimPose,
    visible: bool,
    jitter: f64,
    rng: StdRng,
}

impl SimulatedHandTracker {
    pub fn new(rx: Receiver<SimInput>, jitter: f64) -> Self {
        Self::with_rng(rx, jitter, StdRng::from_entropy())
    }

    pub fn seeded(rx: Receiver<SimInput>, jitter: f64, seed: u64) -> Self {
        Self::with_rng(rx, jitter, StdRng::seed_from_u64(seed))
    }

    fn with_rng(rx: Receiver<SimInput>, jitter: f64, rng: StdRng) -> Self {
        SimulatedHandTracker {
            rx,
            center: (0.5, 0.5),
            pose: SimPose::Relaxed,
            visible: true,
            jitter: jitter.abs(),
            rng,
        }
    }

    fn apply(&mut self, input: SimInput) {
        match input {
            SimInput::Move { dx, dy } => {
                self.center.0 = (self.center.0 + dx).clamp(0.0, 1.0);
                self.center.1 = (self.center.1 + dy).clamp(0.0, 1.0);
            }
            SimInput::Pose(pose) => self.pose = pose,
            SimInput::ToggleVisible => self.visible = !self.visible,
        }
    }
}

impl HandTracker for SimulatedHandTracker {
    fn latest_hand_landmarks(&mut self) -> Option<HandLandmarks> {
        loop {
            match self.rx.try_recv() {
                Ok(input) => self.apply(input),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }

        if !self.visible {
            return None;
        }

        let mut hand = synthetic_hand(self.center, self.pose.fingers());
        if self.jitter > 0.0 {
            for lm in hand.iter_mut() {
                lm.x += self.rng.gen_range(-self.jitter..=self.jitter);
                lm.y += self.rng.gen_range(-self.jitter..=self.jitter);
            }
        }
        Some(hand)
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

// ── latest-value slot and acquisition loop ───────────────────────────────────

/// Single most-recent reading shared between the acquisition and render loops.
/// Writers overwrite; readers never wait.
#[derive(Clone, Default)]
pub struct GestureSlot {
    inner: Arc<Mutex<GestureReading>>,
}

impl GestureSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, reading: GestureReading) {
        match self.inner.lock() {
            Ok(mut slot) => *slot = reading,
            Err(poisoned) => *poisoned.into_inner() = reading,
        }
    }

    /// `None` when the writer holds the slot right now; callers reuse their
    /// previous reading.
    pub fn latest(&self) -> Option<GestureReading> {
        self.inner.try_lock().ok().map(|r| *r)
    }

    /// Holds the slot the way a writer mid-publish would.
    #[cfg(test)]
    pub(crate) fn hold(&self) -> std::sync::MutexGuard<'_, GestureReading> {
        self.inner.lock().unwrap()
    }
}

/// Polls `tracker` every `interval` on its own thread until `running` clears.
pub fn spawn_gesture_loop(
    mut tracker: Box<dyn HandTracker>,
    mut classifier: GestureClassifier,
    slot: GestureSlot,
    interval: Duration,
    running: Arc<AtomicBool>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name("gesture".into()).spawn(move || {
        log::info!("gesture loop started with '{}' tracker", tracker.name());
        while running.load(Ordering::Relaxed) {
            let hand = tracker.latest_hand_landmarks();
            slot.publish(classifier.classify(hand.as_ref()));
            thread::sleep(interval);
        }
        log::debug!("gesture loop stopped");
    })
}

/// Waits for the acquisition thread; `Err` carries its panic message.
pub fn join_gesture_loop(handle: JoinHandle<()>) -> Result<(), String> {
    handle.join().map_err(|payload| {
        payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown cause".to_string())
    })
}
