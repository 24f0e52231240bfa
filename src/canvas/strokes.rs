use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};

use crate::data::{ImageTensor, IMAGE_SIDE};
use crate::error::{Error, Result};

pub const DEFAULT_LINE_WIDTH: f32 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Point { x, y }
    }
}

/// One continuous stroke, in drawing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Line {
    pub points: Vec<Point>,
}

/// Anything that can hand over what the user drew as a model input.
pub trait CanvasAdapter {
    fn capture_drawing(&self) -> Result<ImageTensor>;
}

/// A freehand drawing surface: white strokes on a black background, the
/// same polarity as the training images.
#[derive(Debug, Clone)]
pub struct Canvas {
    width: u32,
    height: u32,
    line_width: f32,
    lines: Vec<Line>,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        Canvas { width, height, line_width: DEFAULT_LINE_WIDTH, lines: Vec::new() }
    }

    pub fn with_line_width(mut self, line_width: f32) -> Self {
        self.line_width = line_width;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn line_width(&self) -> f32 {
        self.line_width
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Starts a new stroke at `point` (pointer down).
    pub fn begin(&mut self, point: Point) {
        self.lines.push(Line { points: vec![point] });
    }

    /// Extends the current stroke (pointer drag). Starts one if there is none.
    pub fn move_to(&mut self, point: Point) {
        match self.lines.last_mut() {
            Some(line) => line.points.push(point),
            None => self.begin(point),
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Rasterizes the strokes at full canvas resolution.
    pub fn render(&self) -> GrayImage {
        let mut img = GrayImage::new(self.width, self.height);
        let radius = self.line_width / 2.0;
        for line in &self.lines {
            match line.points.as_slice() {
                [] => {}
                [only] => stamp(&mut img, *only, radius),
                points => {
                    for pair in points.windows(2) {
                        stroke_segment(&mut img, pair[0], pair[1], radius);
                    }
                }
            }
        }
        img
    }
}

impl CanvasAdapter for Canvas {
    /// Renders, downsamples to 28×28 and scales intensities to [0, 1].
    fn capture_drawing(&self) -> Result<ImageTensor> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Usage(format!(
                "cannot capture a {}x{} canvas",
                self.width, self.height
            )));
        }
        let side = IMAGE_SIDE as u32;
        let small = imageops::resize(&self.render(), side, side, FilterType::Triangle);
        ImageTensor::new(small.pixels().map(|p| p.0[0] as f32 / 255.0).collect())
    }
}

/// Round-capped segment: discs one pixel apart along `a → b`.
fn stroke_segment(img: &mut GrayImage, a: Point, b: Point, radius: f32) {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let steps = dx.hypot(dy).ceil().max(1.0) as usize;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp(img, Point::new(a.x + dx * t, a.y + dy * t), radius);
    }
}

fn stamp(img: &mut GrayImage, center: Point, radius: f32) {
    let (w, h) = (img.width() as i64, img.height() as i64);
    let x0 = ((center.x - radius).floor() as i64).max(0);
    let x1 = ((center.x + radius).ceil() as i64).min(w - 1);
    let y0 = ((center.y - radius).floor() as i64).max(0);
    let y1 = ((center.y + radius).ceil() as i64).min(h - 1);
    let r2 = radius * radius;
    for y in y0..=y1 {
        for x in x0..=x1 {
            let (px, py) = (x as f32 + 0.5 - center.x, y as f32 + 0.5 - center.y);
            if px * px + py * py <= r2 {
                img.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_canvas_captures_all_black() {
        let canvas = Canvas::new(280, 280);
        let tensor = canvas.capture_drawing().unwrap();
        assert!(tensor.as_slice().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn horizontal_stroke_lands_in_the_middle_rows() {
        let mut canvas = Canvas::new(280, 280);
        canvas.begin(Point::new(20.0, 140.0));
        canvas.move_to(Point::new(260.0, 140.0));
        let tensor = canvas.capture_drawing().unwrap();

        assert!(tensor.at(14, 14) > 0.5);
        assert_eq!(tensor.at(0, 0), 0.0);
        assert_eq!(tensor.at(27, 14), 0.0);
        assert!(tensor.as_slice().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn move_without_begin_starts_a_stroke_and_clear_resets() {
        let mut canvas = Canvas::new(100, 100);
        canvas.move_to(Point::new(10.0, 10.0));
        canvas.move_to(Point::new(20.0, 20.0));
        canvas.begin(Point::new(50.0, 50.0));
        assert_eq!(canvas.lines().len(), 2);
        assert_eq!(canvas.lines()[0].points.len(), 2);

        canvas.clear();
        assert!(canvas.is_empty());
    }

    #[test]
    fn single_point_leaves_a_dot() {
        let mut canvas = Canvas::new(50, 50).with_line_width(10.0);
        canvas.begin(Point::new(25.0, 25.0));
        let img = canvas.render();
        assert_eq!(img.get_pixel(25, 25).0[0], 255);
        assert_eq!(img.get_pixel(0, 0).0[0], 0);
    }

    #[test]
    fn zero_sized_canvas_cannot_be_captured() {
        assert!(matches!(Canvas::new(0, 10).capture_drawing(), Err(Error::Usage(_))));
    }
}
