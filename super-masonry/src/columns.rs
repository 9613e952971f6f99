//! Column count and column geometry.

use tracing::warn;

use crate::{
    options::{Columns, DEFAULT_COLUMN_WIDTH, MasonryOptions},
    px::Px,
};

/// Number of columns for `options` at `container_width`. Always at least 1.
///
/// ```
/// use super_masonry::{Columns, MasonryOptions, columns::compute_columns, px::Px};
///
/// let auto: MasonryOptions<()> = MasonryOptions::default()
///     .column_width(Px::new(200.0))
///     .gutter_x(Px::new(10.0));
/// assert_eq!(compute_columns(&auto, Px::new(850.0)), 4);
/// assert_eq!(compute_columns(&auto, Px::new(100.0)), 1);
///
/// let fixed = auto.columns(Columns::Fixed(0));
/// assert_eq!(compute_columns(&fixed, Px::new(850.0)), 1);
/// ```
pub fn compute_columns<T>(options: &MasonryOptions<T>, container_width: Px) -> usize {
    match options.columns {
        Columns::Fixed(count) => {
            if count == 0 {
                warn!("fixed column count of 0 configured; using 1 column");
            }
            count.max(1)
        }
        Columns::Auto => {
            let width = container_width.raw();
            if !width.is_finite() || width <= 0.0 {
                return 1;
            }
            let gutter = options.gutter_x.sanitize().raw();
            let column_width = column_width_hint(options).raw();
            let count = ((width + gutter) / (column_width + gutter)).floor();
            if count >= 1.0 { count as usize } else { 1 }
        }
    }
}

/// Width of each of `column_count` columns at `container_width`.
///
/// Falls back to the configured column width hint when the gutters alone
/// would exceed the container.
pub fn compute_column_width<T>(
    options: &MasonryOptions<T>,
    container_width: Px,
    column_count: usize,
) -> Px {
    let count = column_count.max(1);
    let gutter = options.gutter_x.sanitize();
    let width = (container_width - gutter * (count - 1) as f32) / count as f32;
    if width.is_finite() && width >= Px::ZERO {
        width
    } else {
        column_width_hint(options)
    }
}

fn column_width_hint<T>(options: &MasonryOptions<T>) -> Px {
    let hint = options.column_width;
    if hint.is_finite() && hint > Px::ZERO {
        hint
    } else {
        DEFAULT_COLUMN_WIDTH
    }
}

/// Resolved column geometry for one pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnGeometry {
    /// Number of columns, at least 1.
    pub count: usize,
    /// Width of every column.
    pub column_width: Px,
    /// Horizontal gutter.
    pub gutter_x: Px,
    /// Vertical gutter.
    pub gutter_y: Px,
    /// Width the geometry was resolved against.
    pub container_width: Px,
    /// Whether column 0 sits at the left edge.
    pub origin_left: bool,
}

impl ColumnGeometry {
    /// Resolves geometry from already breakpoint-merged options.
    pub fn resolve<T>(options: &MasonryOptions<T>, container_width: Px) -> Self {
        let container_width = container_width.sanitize();
        let count = compute_columns(options, container_width);
        Self {
            count,
            column_width: compute_column_width(options, container_width, count),
            gutter_x: options.gutter_x.sanitize(),
            gutter_y: options.gutter_y.sanitize(),
            container_width,
            origin_left: options.origin_left,
        }
    }

    /// Left offset of column `index`.
    pub fn column_x(&self, index: usize) -> Px {
        let stride = self.column_width + self.gutter_x;
        if self.origin_left {
            stride * index as f32
        } else {
            self.container_width - stride * (index + 1) as f32 + self.gutter_x
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auto(column_width: f32, gutter: f32) -> MasonryOptions<()> {
        MasonryOptions::default()
            .columns(Columns::Auto)
            .column_width(Px(column_width))
            .gutter_x(Px(gutter))
    }

    #[test]
    fn test_auto_columns_monotonic_and_positive() {
        let options = auto(200.0, 10.0);
        let mut previous = 0;
        for width in (0..3000).step_by(7) {
            let count = compute_columns(&options, Px(width as f32));
            assert!(count >= 1);
            assert!(count >= previous, "column count dropped at width {width}");
            previous = count;
        }
    }

    #[test]
    fn test_auto_columns_boundaries() {
        let options = auto(200.0, 10.0);
        // (w + 10) / 210
        assert_eq!(compute_columns(&options, Px(409.0)), 1);
        assert_eq!(compute_columns(&options, Px(410.0)), 2);
        assert_eq!(compute_columns(&options, Px(620.0)), 3);
        assert_eq!(compute_columns(&options, Px(-50.0)), 1);
        assert_eq!(compute_columns(&options, Px(f32::NAN)), 1);
    }

    #[test]
    fn test_zero_column_width_uses_default() {
        let options = auto(0.0, 0.0);
        assert_eq!(compute_columns(&options, Px(1000.0)), 5);
        let options = auto(-20.0, 0.0);
        assert_eq!(compute_columns(&options, Px(400.0)), 2);
    }

    #[test]
    fn test_fixed_columns() {
        let options = auto(200.0, 10.0).columns(Columns::Fixed(3));
        assert_eq!(compute_columns(&options, Px(10.0)), 3);
        assert_eq!(compute_columns(&options, Px(5000.0)), 3);
    }

    #[test]
    fn test_column_width() {
        let options = auto(200.0, 10.0);
        assert_eq!(compute_column_width(&options, Px(800.0), 2), Px(395.0));
        assert_eq!(compute_column_width(&options, Px(800.0), 1), Px(800.0));
        // gutters wider than the container fall back to the hint
        assert_eq!(compute_column_width(&options, Px(15.0), 3), Px(200.0));
    }

    #[test]
    fn test_column_x_left_and_right_origin() {
        let options = auto(200.0, 10.0).columns(Columns::Fixed(3));
        let left = ColumnGeometry::resolve(&options, Px(620.0));
        assert_eq!(left.column_width, Px(200.0));
        assert_eq!(left.column_x(0), Px(0.0));
        assert_eq!(left.column_x(2), Px(420.0));

        let right = ColumnGeometry::resolve(&options.origin_left(false), Px(620.0));
        assert_eq!(right.column_x(0), Px(420.0));
        assert_eq!(right.column_x(1), Px(210.0));
        assert_eq!(right.column_x(2), Px(0.0));
    }
}
