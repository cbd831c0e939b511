//! Screen-space point math shared by the gaze pipeline.

use std::ops::{Add, Mul, Sub};

/// A 2D position in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    pub fn distance_sq(self, other: Self) -> f64 {
        let d = self - other;
        d.x * d.x + d.y * d.y
    }

    pub fn midpoint(self, other: Self) -> Self {
        self.lerp(other, 0.5)
    }

    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// S-expression form for IPC output.
    pub fn to_sexp(self) -> String {
        format!("(:x {:.1} :y {:.1})", self.x, self.y)
    }
}

impl Add for Point {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < 1e-9);
        assert!((a.distance_sq(b) - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_midpoint_and_ops() {
        let a = Point::new(10.0, 20.0);
        let b = Point::new(30.0, 40.0);
        assert_eq!(a.midpoint(b), Point::new(20.0, 30.0));
        assert_eq!(b - a, Point::new(20.0, 20.0));
        assert_eq!(a + b * 0.5, Point::new(25.0, 40.0));
    }

    #[test]
    fn test_sexp() {
        assert_eq!(Point::new(1.0, 2.5).to_sexp(), "(:x 1.0 :y 2.5)");
    }
}
