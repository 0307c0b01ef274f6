//! Page geometry and placement calculations
//!
//! All values are PDF points (1/72 inch) in the default user space, with the
//! origin at the bottom-left corner of the page.

/// Points per millimetre
pub const POINTS_PER_MM: f64 = 72.0 / 25.4;

/// Page dimensions in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// A4 size as commonly rounded to whole points (595 × 842)
    ///
    /// Used when a document carries neither a MediaBox nor a CropBox.
    pub fn a4() -> Self {
        Self::new(595.0, 842.0)
    }

    /// Build a size from a `[llx lly urx ury]` page box
    pub fn from_box(llx: f64, lly: f64, urx: f64, ury: f64) -> Self {
        Self::new(urx - llx, ury - lly)
    }
}

/// Positions `0, step, 2*step, ...` strictly below `extent`
///
/// The last position may sit close enough to the edge that content drawn
/// from it runs off the page; callers rely on the page clipping it.
pub fn grid_positions(extent: f64, step: f64) -> Vec<f64> {
    let mut positions = Vec::new();
    if step <= 0.0 {
        return positions;
    }

    let mut pos = 0.0;
    while pos < extent {
        positions.push(pos);
        pos += step;
    }
    positions
}

/// Origins of every watermark tile, row by row from the bottom
pub fn tile_origins(
    page: &PageSize,
    horizontal_spacing: f64,
    vertical_spacing: f64,
) -> Vec<(f64, f64)> {
    let xs = grid_positions(page.width, horizontal_spacing);
    grid_positions(page.height, vertical_spacing)
        .into_iter()
        .flat_map(|y| xs.iter().map(move |&x| (x, y)))
        .collect()
}

/// Lower-left corner that places a `width` × `height` box flush with the
/// top-right corner of the page
///
/// Clamped at zero so an oversized box anchors to the origin instead of
/// starting at negative coordinates.
pub fn top_right_anchor(page: &PageSize, width: f64, height: f64) -> (f64, f64) {
    ((page.width - width).max(0.0), (page.height - height).max(0.0))
}

/// A PDF transformation matrix [a b c d e f]
/// where: x' = a*x + c*y + e, y' = b*x + d*y + f
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Transform {
    /// Identity matrix (no transformation)
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    pub fn translate(x: f64, y: f64) -> Self {
        Self { e: x, f: y, ..Self::identity() }
    }

    pub fn scale(s: f64) -> Self {
        Self { a: s, d: s, ..Self::identity() }
    }

    /// Counter-clockwise rotation about the origin
    pub fn rotate_degrees(angle: f64) -> Self {
        let (sin, cos) = angle.to_radians().sin_cos();
        Self { a: cos, b: sin, c: -sin, d: cos, e: 0.0, f: 0.0 }
    }

    /// Apply `inner` first, then `self`
    ///
    /// This matches issuing `self` then `inner` as consecutive `cm` operators,
    /// so `translate(x, y).then(rotate)` draws rotated content at (x, y).
    pub fn then(&self, inner: &Transform) -> Self {
        Self {
            a: inner.a * self.a + inner.b * self.c,
            b: inner.a * self.b + inner.b * self.d,
            c: inner.c * self.a + inner.d * self.c,
            d: inner.c * self.b + inner.d * self.d,
            e: inner.e * self.a + inner.f * self.c + self.e,
            f: inner.e * self.b + inner.f * self.d + self.f,
        }
    }

    /// Map a point through the matrix
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.c * y + self.e, self.b * x + self.d * y + self.f)
    }

    /// Operands for the `cm` operator
    pub fn to_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.d, self.e, self.f]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_a4_fallback_size() {
        let a4 = PageSize::a4();
        assert_eq!(a4.width, 595.0);
        assert_eq!(a4.height, 842.0);
    }

    #[test]
    fn test_from_box_with_offset_origin() {
        let size = PageSize::from_box(10.0, 20.0, 622.0, 812.0);
        assert_eq!(size, PageSize::new(612.0, 792.0));
    }

    #[test]
    fn test_grid_positions_overshoot_last_tile() {
        // 595 wide, 300 step: tiles at 0 and 300, the second runs past the edge
        assert_eq!(grid_positions(595.0, 300.0), vec![0.0, 300.0]);
        // Exactly on the edge is not drawn
        assert_eq!(grid_positions(600.0, 300.0), vec![0.0, 300.0]);
        assert_eq!(grid_positions(600.1, 300.0), vec![0.0, 300.0, 600.0]);
    }

    #[test]
    fn test_grid_positions_degenerate() {
        assert!(grid_positions(0.0, 10.0).is_empty());
        assert!(grid_positions(100.0, 0.0).is_empty());
        assert!(grid_positions(100.0, -5.0).is_empty());
    }

    #[test]
    fn test_tile_origins_a4_defaults() {
        let tiles = tile_origins(&PageSize::a4(), 300.0, 150.0);
        // 2 columns (0, 300) × 6 rows (0..=750)
        assert_eq!(tiles.len(), 12);
        assert_eq!(tiles[0], (0.0, 0.0));
        assert_eq!(tiles[1], (300.0, 0.0));
        assert_eq!(tiles[11], (300.0, 750.0));
    }

    #[test]
    fn test_top_right_anchor() {
        let page = PageSize::a4();
        assert_eq!(top_right_anchor(&page, 95.0, 42.0), (500.0, 800.0));
    }

    #[test]
    fn test_top_right_anchor_clamps_oversized() {
        let page = PageSize::new(50.0, 50.0);
        assert_eq!(top_right_anchor(&page, 80.0, 20.0), (0.0, 30.0));
        assert_eq!(top_right_anchor(&page, 80.0, 80.0), (0.0, 0.0));
    }

    #[test]
    fn test_translate_then_rotate() {
        let m = Transform::translate(100.0, 50.0).then(&Transform::rotate_degrees(90.0));
        let (x, y) = m.apply(10.0, 0.0);
        assert!(close(x, 100.0));
        assert!(close(y, 60.0));
    }

    #[test]
    fn test_rotate_45_matrix() {
        let m = Transform::rotate_degrees(45.0).to_array();
        let h = std::f64::consts::FRAC_1_SQRT_2;
        assert!(close(m[0], h));
        assert!(close(m[1], h));
        assert!(close(m[2], -h));
        assert!(close(m[3], h));
    }

    #[test]
    fn test_translate_then_scale() {
        let m = Transform::translate(5.0, 7.0).then(&Transform::scale(0.5));
        assert_eq!(m.to_array(), [0.5, 0.0, 0.0, 0.5, 5.0, 7.0]);
    }
}
