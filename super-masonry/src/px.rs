//! Pixel coordinate types used by the masonry engine.
//!
//! Column widths are derived by dividing the container width, so the engine
//! works in fractional pixels rather than whole device pixels.
//!
//! # Key Types
//!
//! - [`Px`] - A single pixel value
//! - [`PxPosition`] - A 2D position inside the container (x, y)
//! - [`PxSize`] - A measured bounding box (width, height)
//!
//! # Coordinate System
//!
//! - Origin (0, 0) at the top-left corner of the container
//! - X-axis increases to the right
//! - Y-axis increases downward
//!
//! # Example
//!
//! ```
//! use super_masonry::px::{Px, PxPosition, PxSize};
//!
//! let position = PxPosition::new(Px::new(210.0), Px::new(0.0));
//! let size = PxSize::new(Px::new(200.0), Px::new(120.0));
//!
//! let below = position.offset(Px::ZERO, size.height);
//! assert_eq!(below.y, Px::new(120.0));
//! ```

use std::{
    fmt,
    ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign},
};

/// A pixel value.
///
/// `Px` wraps an `f32`. Values produced by the engine are always finite; use
/// [`Px::sanitize`] on embedder supplied values before doing arithmetic with
/// them.
///
/// # Examples
///
/// ```
/// use super_masonry::px::Px;
///
/// let gutter = Px::new(10.0);
/// let width = Px::new(800.0);
/// let column = (width - gutter) / 2.0;
/// assert_eq!(column, Px::new(395.0));
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Px(pub f32);

impl Px {
    /// Zero pixels.
    pub const ZERO: Self = Self(0.0);

    /// Creates a new `Px`.
    pub const fn new(value: f32) -> Self {
        Px(value)
    }

    /// Returns the raw f32 value.
    pub fn raw(self) -> f32 {
        self.0
    }

    /// Returns `true` if the value is neither NaN nor infinite.
    pub fn is_finite(self) -> bool {
        self.0.is_finite()
    }

    /// Returns the larger of two values.
    pub fn max(self, other: Self) -> Self {
        Px(self.0.max(other.0))
    }

    /// Returns the smaller of two values.
    pub fn min(self, other: Self) -> Self {
        Px(self.0.min(other.0))
    }

    /// Clamps negative and non-finite values to zero.
    ///
    /// ```
    /// use super_masonry::px::Px;
    ///
    /// assert_eq!(Px::new(-4.0).sanitize(), Px::ZERO);
    /// assert_eq!(Px::new(f32::NAN).sanitize(), Px::ZERO);
    /// assert_eq!(Px::new(12.5).sanitize(), Px::new(12.5));
    /// ```
    pub fn sanitize(self) -> Self {
        if self.0.is_finite() && self.0 > 0.0 {
            self
        } else {
            Px::ZERO
        }
    }

    /// Formats the value as a CSS pixel length, e.g. `"12.5px"`.
    pub fn to_css(self) -> String {
        format!("{}px", self.0)
    }
}

impl fmt::Display for Px {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}px", self.0)
    }
}

impl From<f32> for Px {
    fn from(value: f32) -> Self {
        Px(value)
    }
}

impl From<Px> for f32 {
    fn from(value: Px) -> Self {
        value.0
    }
}

impl Add for Px {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Px(self.0 + rhs.0)
    }
}

impl Sub for Px {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Px(self.0 - rhs.0)
    }
}

impl Neg for Px {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Px(-self.0)
    }
}

impl Mul<f32> for Px {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self::Output {
        Px(self.0 * rhs)
    }
}

impl Div<f32> for Px {
    type Output = Self;

    fn div(self, rhs: f32) -> Self::Output {
        Px(self.0 / rhs)
    }
}

impl AddAssign for Px {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Px {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl std::iter::Sum for Px {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Px::ZERO, |acc, value| acc + value)
    }
}

/// A 2D position in pixel space.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PxPosition {
    /// The x coordinate.
    pub x: Px,
    /// The y coordinate.
    pub y: Px,
}

impl PxPosition {
    /// The container origin.
    pub const ZERO: Self = Self {
        x: Px::ZERO,
        y: Px::ZERO,
    };

    /// Creates a new position.
    pub const fn new(x: Px, y: Px) -> Self {
        Self { x, y }
    }

    /// Returns a copy moved by the given deltas.
    pub fn offset(self, dx: Px, dy: Px) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Formats the position as a CSS `translate(..)` transform.
    ///
    /// ```
    /// use super_masonry::px::{Px, PxPosition};
    ///
    /// let pos = PxPosition::new(Px::new(210.0), Px::new(35.0));
    /// assert_eq!(pos.to_css_transform(), "translate(210px, 35px)");
    /// ```
    pub fn to_css_transform(self) -> String {
        format!("translate({}, {})", self.x, self.y)
    }
}

/// A measured bounding box.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PxSize {
    /// The width.
    pub width: Px,
    /// The height.
    pub height: Px,
}

impl PxSize {
    /// A zero-sized box.
    pub const ZERO: Self = Self {
        width: Px::ZERO,
        height: Px::ZERO,
    };

    /// Creates a new size.
    pub const fn new(width: Px, height: Px) -> Self {
        Self { width, height }
    }

    /// Returns `true` if both dimensions are finite.
    pub fn is_finite(self) -> bool {
        self.width.is_finite() && self.height.is_finite()
    }
}
