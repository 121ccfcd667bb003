use fractal_voyager::gesture::SimPose;
use fractal_voyager::{
    C, FractalKind, Frame, GestureClassifier, GestureSlot, PhysicsParams, RenderLoop, Viewport, ZoomAction,
    integrate, synthetic_hand,
};

fn close(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

#[test]
fn sustained_fist_zooms_out() {
    let mut classifier = GestureClassifier::default();
    let params = PhysicsParams::default();
    let fist = synthetic_hand((0.5, 0.5), SimPose::Fist.fingers());

    let mut vp = Viewport::default();
    for _ in 0..50 {
        let reading = classifier.classify(Some(&fist));
        assert_eq!(reading.zoom_action, ZoomAction::Out);
        vp = integrate(&vp, &reading, &params);
    }

    assert!(close(vp.zoom, 0.98f64.powi(50), 1e-12));
    assert!(close(vp.zoom, 0.364, 5e-4));
    // Centered hand: no pan.
    assert_eq!(vp.center, Viewport::default().center);
}

#[test]
fn open_palm_through_render_loop() {
    let slot = GestureSlot::new();
    let mut classifier = GestureClassifier::default();
    let mut rl = RenderLoop::new(Viewport::default(), PhysicsParams::default(), slot.clone());
    let palm = synthetic_hand((0.5, 0.5), SimPose::Open.fingers());

    for _ in 0..30 {
        slot.publish(classifier.classify(Some(&palm)));
        rl.advance();
    }
    assert!(close(rl.viewport().zoom, 1.02f64.powi(30), 1e-9));
}

#[test]
fn hand_loss_freezes_camera_but_not_color() {
    let slot = GestureSlot::new();
    let mut classifier = GestureClassifier::default();
    let mut rl = RenderLoop::new(Viewport::default(), PhysicsParams::default(), slot.clone());

    // Hand off to the upper right with an open palm: zoom in and pan.
    let hand = synthetic_hand((0.9, 0.1), SimPose::Open.fingers());
    for _ in 0..10 {
        slot.publish(classifier.classify(Some(&hand)));
        rl.advance();
    }
    let moving = rl.viewport();
    assert!(moving.center.re > -0.5);
    assert!(moving.center.im > 0.0);

    let lost = classifier.classify(None);
    assert_eq!(lost.hand_center.0, 0.9);
    slot.publish(lost);
    for _ in 0..20 {
        rl.advance();
    }
    let frozen = rl.viewport();
    assert_eq!(frozen.center, moving.center);
    assert_eq!(frozen.zoom, moving.zoom);
    assert!(close(frozen.color_phase, moving.color_phase + 20.0 * 0.002, 1e-9));
}

#[test]
fn switching_fractal_mid_flight_renders_new_family() {
    let slot = GestureSlot::new();
    let start = Viewport { center: C::new(-0.5, -0.5), ..Viewport::default() };
    let mut rl = RenderLoop::new(start, PhysicsParams::default(), slot);
    let mut frame = Frame::new(64, 48);

    rl.tick(&mut frame);
    let mandel = frame.pixels().to_vec();

    rl.controls().select_fractal(FractalKind::BurningShip);
    let vp = rl.tick(&mut frame);
    assert_eq!(vp.fractal, FractalKind::BurningShip);
    assert_eq!(vp.center, start.center);
    assert_ne!(frame.pixels(), &mandel[..]);
}
