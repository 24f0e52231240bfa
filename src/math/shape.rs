use serde::{Deserialize, Serialize};

/// Channel-major shape of an activation volume flowing between layers.
///
/// A flattened vector of `n` values is `Shape { channels: n, height: 1, width: 1 }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shape {
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl Shape {
    pub const fn new(channels: usize, height: usize, width: usize) -> Self {
        Shape { channels, height, width }
    }

    pub const fn flat(len: usize) -> Self {
        Shape { channels: len, height: 1, width: 1 }
    }

    pub const fn len(&self) -> usize {
        self.channels * self.height * self.width
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub const fn is_flat(&self) -> bool {
        self.height == 1 && self.width == 1
    }

    /// Flat index of (channel, row, col).
    #[inline]
    pub const fn index(&self, c: usize, y: usize, x: usize) -> usize {
        (c * self.height + y) * self.width + x
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.channels, self.height, self.width)
    }
}
