//! Composited surface.
//!
//! `OverlayRenderer` owns the one drawing surface of the page. Every tick it is
//! fully repainted: the current frame scaled to the surface, then a 2px box and
//! a label per retained detection. The recorder and the preview both read this
//! surface; nothing else draws on it.

mod font;

use anyhow::{anyhow, Result};
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::detect::Prediction;
use crate::frame::Frame;

pub const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const LABEL_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Label baseline for a box whose top edge is at `top`.
///
/// The label sits 5px above the box unless that would push it within 10px of
/// the surface top, in which case it is pinned at 10.
pub fn label_y(top: f32) -> f32 {
    if top > 10.0 {
        top - 5.0
    } else {
        10.0
    }
}

/// `"{class} - {percent}%"`.
pub fn label_text(prediction: &Prediction) -> String {
    format!("{} - {}%", prediction.class, prediction.percent())
}

pub struct OverlayRenderer {
    surface: RgbImage,
}

impl OverlayRenderer {
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!(
                "surface dimensions must be non-zero (got {}x{})",
                width,
                height
            ));
        }
        Ok(Self {
            surface: RgbImage::new(width, height),
        })
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }

    /// The composited surface as of the last `render`.
    pub fn surface(&self) -> &RgbImage {
        &self.surface
    }

    /// Repaint the surface with `frame` and the given detections.
    ///
    /// Boxes arrive in frame coordinates and are scaled to the surface.
    pub fn render(&mut self, frame: &Frame, detections: &[Prediction]) -> Result<()> {
        self.draw_frame(frame)?;

        let sx = self.surface.width() as f32 / frame.width.max(1) as f32;
        let sy = self.surface.height() as f32 / frame.height.max(1) as f32;
        for prediction in detections {
            let bbox = prediction.bbox.scaled(sx, sy);
            self.stroke_box(bbox.x, bbox.y, bbox.width, bbox.height);
            font::draw_text(
                &mut self.surface,
                &label_text(prediction),
                bbox.x.round() as i64,
                label_y(bbox.y).round() as i64,
                LABEL_COLOR,
            );
        }
        Ok(())
    }

    fn draw_frame(&mut self, frame: &Frame) -> Result<()> {
        let (width, height) = self.surface.dimensions();
        if frame.width == width && frame.height == height {
            self.surface.copy_from_slice(frame.pixels());
            return Ok(());
        }
        let source = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not fit {}x{}", frame.width, frame.height))?;
        let scaled = image::imageops::resize(&source, width, height, FilterType::Triangle);
        self.surface.copy_from_slice(scaled.as_raw());
        Ok(())
    }

    /// 2px stroke centred on the box outline.
    fn stroke_box(&mut self, x: f32, y: f32, width: f32, height: f32) {
        let x = x.round() as i32;
        let y = y.round() as i32;
        let w = (width.round() as i32).max(1) as u32;
        let h = (height.round() as i32).max(1) as u32;
        draw_hollow_rect_mut(
            &mut self.surface,
            Rect::at(x - 1, y - 1).of_size(w + 2, h + 2),
            BOX_COLOR,
        );
        draw_hollow_rect_mut(&mut self.surface, Rect::at(x, y).of_size(w, h), BOX_COLOR);
    }
}
