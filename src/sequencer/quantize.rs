// Quantizer - snaps a loop-relative position to a beat grid

use serde::{Deserialize, Serialize};

// Absorbs float error when a position sits on a grid line (0.3 / 0.1 = 2.9999...)
const GRID_EPSILON: f64 = 1e-9;

/// Which grid point to pick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantizeMode {
    Nearest,
    Previous,
    Next,
}

/// Grid points surrounding a position inside a loop of `length` beats
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    pub grid: f64,
    pub length: f64,
}

impl Quantizer {
    pub fn new(grid: f64, length: f64) -> Self {
        Self { grid, length }
    }

    fn is_valid(&self) -> bool {
        self.grid.is_finite() && self.grid > 0.0 && self.length.is_finite() && self.length > 0.0
    }

    fn wrap(&self, beats: f64) -> f64 {
        beats % self.length
    }

    /// Last grid point at or before `position`, unwrapped
    fn last_point(&self, position: f64) -> f64 {
        (position / self.grid + GRID_EPSILON).floor() * self.grid
    }

    /// Previous grid point (the one at or before the position)
    pub fn previous(&self, position: f64) -> f64 {
        if !self.is_valid() {
            return position;
        }
        self.wrap(self.last_point(position))
    }

    /// Next grid point after the previous one, wrapped into the loop
    pub fn next(&self, position: f64) -> f64 {
        if !self.is_valid() {
            return position;
        }
        self.wrap(self.last_point(position) + self.grid)
    }

    /// Closest grid point; a tie goes to the next one
    pub fn nearest(&self, position: f64) -> f64 {
        if !self.is_valid() {
            return position;
        }
        let last = self.last_point(position);
        let next = last + self.grid;
        if position - last < next - position {
            self.wrap(last)
        } else {
            self.wrap(next)
        }
    }

    pub fn quantize(&self, position: f64, mode: QuantizeMode) -> f64 {
        match mode {
            QuantizeMode::Nearest => self.nearest(position),
            QuantizeMode::Previous => self.previous(position),
            QuantizeMode::Next => self.next(position),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_basic() {
        let q = Quantizer::new(1.0, 8.0);
        assert_eq!(q.nearest(2.6), 3.0);
        assert_eq!(q.previous(2.6), 2.0);
        assert_eq!(q.next(2.6), 3.0);

        assert_eq!(q.nearest(2.4), 2.0);
    }

    #[test]
    fn test_tie_goes_to_next() {
        let q = Quantizer::new(1.0, 8.0);
        assert_eq!(q.nearest(2.5), 3.0);

        let sixteenths = Quantizer::new(0.25, 4.0);
        assert_eq!(sixteenths.nearest(0.125), 0.25);
    }

    #[test]
    fn test_on_grid_position() {
        let q = Quantizer::new(0.1, 4.0);
        let previous = q.previous(0.3);
        assert!((previous - 0.3).abs() < 1e-12);

        let whole = Quantizer::new(1.0, 8.0);
        assert_eq!(whole.previous(3.0), 3.0);
        assert_eq!(whole.next(3.0), 4.0);
        assert_eq!(whole.nearest(3.0), 3.0);
    }

    #[test]
    fn test_wraps_at_loop_end() {
        let q = Quantizer::new(1.0, 8.0);
        assert_eq!(q.next(7.2), 0.0);
        // 7.9 is 0.1 away from the wrapped next point
        assert_eq!(q.nearest(7.9), 0.0);
        assert_eq!(q.previous(7.9), 7.0);
    }

    #[test]
    fn test_grid_larger_than_length() {
        let q = Quantizer::new(3.0, 2.0);
        assert_eq!(q.previous(1.0), 0.0);
        assert_eq!(q.next(1.0), 1.0);
    }

    #[test]
    fn test_invalid_grid_returns_position() {
        assert_eq!(Quantizer::new(0.0, 8.0).nearest(2.6), 2.6);
        assert_eq!(Quantizer::new(-1.0, 8.0).next(2.6), 2.6);
        assert_eq!(Quantizer::new(1.0, 0.0).previous(2.6), 2.6);
        assert_eq!(Quantizer::new(f64::NAN, 8.0).nearest(1.0), 1.0);
    }

    #[test]
    fn test_quantize_mode_dispatch() {
        let q = Quantizer::new(0.5, 4.0);
        assert_eq!(q.quantize(1.3, QuantizeMode::Previous), 1.0);
        assert_eq!(q.quantize(1.3, QuantizeMode::Next), 1.5);
        assert_eq!(q.quantize(1.3, QuantizeMode::Nearest), 1.5);
    }
}
