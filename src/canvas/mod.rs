//! Turning user drawings and image files into 28×28 model inputs.

pub mod image;
pub mod strokes;

pub use self::image::image_bytes_to_tensor;
pub use strokes::{Canvas, CanvasAdapter, Line, Point, DEFAULT_LINE_WIDTH};
