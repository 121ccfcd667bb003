use std::path::Path;

use image::{Rgb, RgbImage};

use crate::error::RenderError;
use crate::fractal::{FrameGeometry, render_frame};
use crate::viewport::Viewport;

/// Renders `viewport` off-screen at `width`×`height`.
pub fn render_image(viewport: &Viewport, width: usize, height: usize) -> RgbImage {
    let geometry = FrameGeometry::new(width, height);
    let mut pixels = vec![0u32; geometry.width * geometry.height];
    render_frame(&mut pixels, &geometry, viewport);
    frame_to_image(&pixels, geometry.width, geometry.height)
}

pub fn frame_to_image(pixels: &[u32], width: usize, height: usize) -> RgbImage {
    RgbImage::from_fn(width as u32, height as u32, |x, y| {
        let p = pixels.get(y as usize * width + x as usize).copied().unwrap_or(0);
        Rgb([(p >> 16) as u8, (p >> 8) as u8, p as u8])
    })
}

pub fn save_frame(pixels: &[u32], width: usize, height: usize, path: &Path) -> Result<(), RenderError> {
    if pixels.len() != width * height {
        return Err(RenderError::BufferSize { expected: width * height, got: pixels.len() });
    }
    frame_to_image(pixels, width, height).save(path)?;
    log::info!("wrote {}x{} snapshot to {}", width, height, path.display());
    Ok(())
}

pub fn save_snapshot(viewport: &Viewport, width: usize, height: usize, path: &Path) -> Result<(), RenderError> {
    let img = render_image(viewport, width, height);
    img.save(path)?;
    log::info!("wrote {}x{} snapshot to {}", img.width(), img.height(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fractal::{FractalKind, evaluate_pixel};
    use crate::math::C;

    #[test]
    fn image_matches_evaluator() {
        let vp = Viewport { fractal: FractalKind::Julia, center: C::new(0.0, 0.0), ..Viewport::default() };
        let img = render_image(&vp, 40, 30);
        let geom = FrameGeometry::new(40, 30);
        let expected = evaluate_pixel((5.5, 30.0 - 7.0 - 0.5), &vp, &geom).to_rgb8();
        assert_eq!(img.get_pixel(5, 7).0, expected);
    }

    #[test]
    fn repeated_renders_are_identical() {
        let vp = Viewport { zoom: 3.0, color_phase: 0.7, ..Viewport::default() };
        assert_eq!(render_image(&vp, 48, 32), render_image(&vp, 48, 32));
    }

    #[test]
    fn origin_pixel_is_black_in_mandelbrot() {
        let vp = Viewport { center: C::new(0.0, 0.0), iterations: 1000, ..Viewport::default() };
        // Odd size puts a pixel center exactly on the plane origin.
        let img = render_image(&vp, 41, 41);
        assert_eq!(img.get_pixel(20, 20).0, [0, 0, 0]);
    }

    #[test]
    fn saved_frame_round_trips_through_png() {
        let pixels = [0x00FF_0000, 0x0000_FF00, 0x0000_00FF, 0x0012_3456, 0, 0x00FF_FFFF];
        let path = std::env::temp_dir().join(format!("fractal_voyager_frame_{}.png", std::process::id()));
        save_frame(&pixels, 3, 2, &path).unwrap();
        let img = image::open(&path).unwrap().to_rgb8();
        let _ = std::fs::remove_file(&path);
        assert_eq!(img.dimensions(), (3, 2));
        assert_eq!(img.get_pixel(0, 0).0, [0xFF, 0, 0]);
        assert_eq!(img.get_pixel(0, 1).0, [0x12, 0x34, 0x56]);
    }

    #[test]
    fn save_rejects_mismatched_buffer() {
        let err = save_frame(&[0; 5], 3, 2, Path::new("unused.png")).unwrap_err();
        assert!(matches!(err, RenderError::BufferSize { expected: 6, got: 5 }));
    }
}
