//! Integer geometry used at the compositor boundary.
//!
//! The compositor speaks in whole device pixels, so unlike the float types a
//! renderer would use, everything here is `i32`. Rectangles are half-open:
//! a rect at `x` with `width` covers columns `x..x + width`.

use std::fmt;

/// A point in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The origin point (0, 0).
    pub const ZERO: Self = Self { x: 0, y: 0 };

    /// Offset this point by the given deltas.
    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// A point with fractional coordinates, used for normalized touch positions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointF {
    pub x: f64,
    pub y: f64,
}

impl PointF {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A size in device pixels (or millimetres for physical display sizes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    /// Create a new size.
    #[inline]
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Zero size.
    pub const ZERO: Self = Self {
        width: 0,
        height: 0,
    };

    /// Check if the size has zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Swap width and height.
    #[inline]
    pub const fn transposed(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }

    /// Clamp an empty size to the smallest allocatable one (1x1).
    #[inline]
    pub const fn non_empty(self) -> Self {
        if self.is_empty() {
            Self::new(1, 1)
        } else {
            self
        }
    }

    /// Scale this size to fit inside `bounds` while keeping the aspect ratio.
    pub fn scaled_to_fit(self, bounds: Size) -> Self {
        if self.is_empty() {
            return bounds;
        }
        let by_width = i64::from(bounds.width) * i64::from(self.height) / i64::from(self.width);
        if by_width <= i64::from(bounds.height) {
            Self::new(bounds.width, by_width as i32)
        } else {
            let by_height =
                i64::from(bounds.height) * i64::from(self.width) / i64::from(self.height);
            Self::new(by_height as i32, bounds.height)
        }
    }
}

impl From<(i32, i32)> for Size {
    fn from((width, height): (i32, i32)) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// An axis-aligned rectangle in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle at the origin with the given size.
    #[inline]
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Create a rectangle from a position and a size.
    #[inline]
    pub const fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    #[inline]
    pub const fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    #[inline]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Exclusive right edge.
    #[inline]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Exclusive bottom edge.
    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Move the rectangle so that its center lands on `center`.
    pub fn with_center(self, center: Point) -> Self {
        Self::new(
            center.x - self.width / 2,
            center.y - self.height / 2,
            self.width,
            self.height,
        )
    }

    pub fn with_size(self, size: Size) -> Self {
        Self::new(self.x, self.y, size.width, size.height)
    }

    pub const fn translated(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    pub fn contains_rect(&self, other: &Rect) -> bool {
        !other.is_empty()
            && other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.intersection(other).is_some()
    }

    /// Compute the overlap of two rectangles, if any.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right > x && bottom > y {
            Some(Rect::new(x, y, right - x, bottom - y))
        } else {
            None
        }
    }

    /// Smallest rectangle containing both rectangles. Empty rectangles are ignored.
    pub fn united(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, right - x, bottom - y)
    }

    /// The parts of `self` not covered by `other` (at most four pieces).
    pub fn subtract(&self, other: &Rect) -> Vec<Rect> {
        let Some(cut) = self.intersection(other) else {
            return if self.is_empty() { Vec::new() } else { vec![*self] };
        };
        let mut pieces = Vec::with_capacity(4);
        if cut.y > self.y {
            pieces.push(Rect::new(self.x, self.y, self.width, cut.y - self.y));
        }
        if cut.bottom() < self.bottom() {
            pieces.push(Rect::new(
                self.x,
                cut.bottom(),
                self.width,
                self.bottom() - cut.bottom(),
            ));
        }
        if cut.x > self.x {
            pieces.push(Rect::new(self.x, cut.y, cut.x - self.x, cut.height));
        }
        if cut.right() < self.right() {
            pieces.push(Rect::new(
                cut.right(),
                cut.y,
                self.right() - cut.right(),
                cut.height,
            ));
        }
        pieces
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

/// A region made of disjoint rectangles.
///
/// Used for dirty/preserve bookkeeping when posting render buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.add_rect(rect);
        region
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Add a rectangle, keeping the stored rectangles disjoint.
    pub fn add_rect(&mut self, rect: Rect) {
        if rect.is_empty() {
            return;
        }
        let mut pending = vec![rect];
        for existing in &self.rects {
            pending = pending.iter().flat_map(|piece| piece.subtract(existing)).collect();
            if pending.is_empty() {
                return;
            }
        }
        self.rects.extend(pending);
    }

    pub fn united(&self, other: &Region) -> Region {
        let mut out = self.clone();
        for rect in &other.rects {
            out.add_rect(*rect);
        }
        out
    }

    /// Everything in `self` that is not in `other`.
    pub fn subtracted(&self, other: &Region) -> Region {
        let mut remaining = self.rects.clone();
        for cut in &other.rects {
            remaining = remaining.iter().flat_map(|r| r.subtract(cut)).collect();
        }
        Region { rects: remaining }
    }

    pub fn bounding_rect(&self) -> Rect {
        self.rects
            .iter()
            .fold(Rect::default(), |acc, rect| acc.united(rect))
    }

    pub fn intersects(&self, rect: &Rect) -> bool {
        self.rects.iter().any(|r| r.intersects(rect))
    }

    /// Total covered pixel count.
    pub fn area(&self) -> i64 {
        self.rects
            .iter()
            .map(|r| i64::from(r.width) * i64::from(r.height))
            .sum()
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(5, 5, 10, 10);
        assert_eq!(a.intersection(&b), Some(Rect::new(5, 5, 5, 5)));
        assert!(a.intersection(&Rect::new(10, 0, 5, 5)).is_none());
    }

    #[test]
    fn test_rect_subtract_middle() {
        let outer = Rect::new(0, 0, 10, 10);
        let pieces = outer.subtract(&Rect::new(2, 2, 4, 4));
        let total: i32 = pieces.iter().map(|r| r.width * r.height).sum();
        assert_eq!(total, 100 - 16);
        assert_eq!(pieces.len(), 4);
    }

    #[test]
    fn test_region_subtract_and_bounds() {
        let region = Region::from_rect(Rect::new(0, 0, 100, 100));
        let dirty = Region::from_rect(Rect::new(0, 0, 100, 50));
        let preserve = region.subtracted(&dirty);
        assert_eq!(preserve.bounding_rect(), Rect::new(0, 50, 100, 50));
        assert_eq!(preserve.area(), 5000);
    }

    #[test]
    fn test_region_add_keeps_disjoint() {
        let mut region = Region::new();
        region.add_rect(Rect::new(0, 0, 10, 10));
        region.add_rect(Rect::new(5, 0, 10, 10));
        assert_eq!(region.area(), 150);
    }

    #[test]
    fn test_scaled_to_fit_keeps_aspect() {
        let size = Size::new(2000, 1000).scaled_to_fit(Size::new(800, 600));
        assert_eq!(size, Size::new(800, 400));
        let size = Size::new(1000, 2000).scaled_to_fit(Size::new(800, 600));
        assert_eq!(size, Size::new(300, 600));
    }

    #[test]
    fn test_non_empty_clamp() {
        assert_eq!(Size::ZERO.non_empty(), Size::new(1, 1));
        assert_eq!(Size::new(3, 4).non_empty(), Size::new(3, 4));
    }
}
