// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

use serde::{Deserialize, Serialize};
use std::fmt;

/// Image size in pixels
///
/// ```
/// use camstack::geometry::Size;
///
/// let size = Size::new(1920, 1080);
/// assert_eq!(size.to_string(), "1920x1080");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub const fn is_null(&self) -> bool {
        self.width == 0 && self.height == 0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Range of sizes supported by a device for one pixel format.
///
/// Discrete sizes are represented with `min == max` and zero steps. A
/// continuous range has steps of 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SizeRange {
    pub min: Size,
    pub max: Size,
    pub h_step: u32,
    pub v_step: u32,
}

impl SizeRange {
    pub const fn discrete(size: Size) -> Self {
        Self {
            min: size,
            max: size,
            h_step: 0,
            v_step: 0,
        }
    }

    pub const fn continuous(min: Size, max: Size) -> Self {
        Self {
            min,
            max,
            h_step: 1,
            v_step: 1,
        }
    }

    pub const fn stepwise(min: Size, max: Size, h_step: u32, v_step: u32) -> Self {
        Self {
            min,
            max,
            h_step,
            v_step,
        }
    }

    /// Whether `size` lies within the range and on its step grid.
    pub fn contains(&self, size: Size) -> bool {
        if size.width < self.min.width
            || size.width > self.max.width
            || size.height < self.min.height
            || size.height > self.max.height
        {
            return false;
        }

        let on_grid = |value: u32, min: u32, step: u32| step == 0 || (value - min) % step == 0;
        on_grid(size.width, self.min.width, self.h_step)
            && on_grid(size.height, self.min.height, self.v_step)
    }
}

impl fmt::Display for SizeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            return write!(f, "{}", self.min);
        }
        write!(
            f,
            "({})-({})/(+{},+{})",
            self.min, self.max, self.h_step, self.v_step
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_range_contains() {
        let range = SizeRange::stepwise(Size::new(64, 64), Size::new(1920, 1080), 16, 8);
        assert!(range.contains(Size::new(640, 480)));
        assert!(!range.contains(Size::new(641, 480)));
        assert!(!range.contains(Size::new(4096, 480)));

        let discrete = SizeRange::discrete(Size::new(1280, 720));
        assert!(discrete.contains(Size::new(1280, 720)));
        assert!(!discrete.contains(Size::new(1280, 721)));
    }

    #[test]
    fn test_size_range_display() {
        assert_eq!(SizeRange::discrete(Size::new(320, 240)).to_string(), "320x240");
        assert_eq!(
            SizeRange::continuous(Size::new(1, 1), Size::new(100, 50)).to_string(),
            "(1x1)-(100x50)/(+1,+1)"
        );
    }
}
