//! Greedy shortest-column placement.
//!
//! Each item, in selection order, goes into the column whose running height
//! is currently smallest (ties go to the lowest index). Items are never moved
//! between columns afterwards, so the result is not an optimal packing; it is
//! the stable, predictable one.

use smallvec::{SmallVec, smallvec};
use tracing::trace;

use crate::{
    columns::ColumnGeometry,
    item::ItemKey,
    options::PackMode,
    px::{Px, PxPosition},
};

/// Running column heights for one pass.
pub type ColumnHeights = SmallVec<[Px; 8]>;

/// One measured item to place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementInput {
    /// Item identity.
    pub key: ItemKey,
    /// Measured height.
    pub height: Px,
}

/// Where an item landed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacedItem {
    /// Item identity.
    pub key: ItemKey,
    /// Column index.
    pub column: usize,
    /// Top-left corner inside the container.
    pub position: PxPosition,
    /// Width the item is given (the column width).
    pub width: Px,
    /// Measured height used for placement.
    pub height: Px,
}

/// Output of [`place`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Placement {
    /// Placed items in placement order.
    pub items: Vec<PlacedItem>,
    /// Final height of every column.
    pub column_heights: ColumnHeights,
    /// Height of the tallest column, zero without items.
    pub container_height: Px,
}

impl Placement {
    /// Looks up the placement of `key`.
    pub fn get(&self, key: ItemKey) -> Option<&PlacedItem> {
        self.items.iter().find(|item| item.key == key)
    }
}

/// Places `items` into the columns described by `geometry`.
///
/// The vertical gutter is added below every item except those in the last
/// `geometry.count` positions, so the grid has no trailing padding.
///
/// ```
/// use super_masonry::{
///     Columns, MasonryOptions, PackMode,
///     columns::ColumnGeometry,
///     item::ItemKey,
///     placement::{PlacementInput, place},
///     px::Px,
/// };
///
/// let options: MasonryOptions<()> = MasonryOptions::default()
///     .columns(Columns::Fixed(2))
///     .gutter_x(Px::new(10.0))
///     .gutter_y(Px::new(10.0));
/// let geometry = ColumnGeometry::resolve(&options, Px::new(410.0));
/// let inputs = [100.0, 50.0, 30.0].map(|h| PlacementInput {
///     key: ItemKey(h as u64),
///     height: Px::new(h),
/// });
///
/// let placement = place(&inputs, &geometry, PackMode::Justified);
/// let third = placement.get(ItemKey(30)).unwrap();
/// assert_eq!(third.column, 1);
/// assert_eq!(third.position.x, Px::new(210.0));
/// assert_eq!(third.position.y, Px::new(50.0));
/// assert_eq!(placement.container_height, Px::new(110.0));
/// ```
pub fn place(items: &[PlacementInput], geometry: &ColumnGeometry, pack: PackMode) -> Placement {
    match pack {
        PackMode::Justified => place_shortest_column(items, geometry),
        // Tighter packing and cascading are not implemented yet; both run the
        // greedy placement.
        PackMode::Packed | PackMode::Cascade => {
            trace!("pack mode {} falls back to greedy placement", pack.as_str());
            place_shortest_column(items, geometry)
        }
    }
}

fn place_shortest_column(items: &[PlacementInput], geometry: &ColumnGeometry) -> Placement {
    let column_count = geometry.count.max(1);
    let mut column_heights: ColumnHeights = smallvec![Px::ZERO; column_count];
    let mut placed = Vec::with_capacity(items.len());
    let last_row_start = items.len().saturating_sub(column_count);

    for (index, item) in items.iter().enumerate() {
        let column = find_shortest_column(&column_heights);
        let y = column_heights[column];
        let height = item.height.sanitize();

        placed.push(PlacedItem {
            key: item.key,
            column,
            position: PxPosition::new(geometry.column_x(column), y),
            width: geometry.column_width,
            height,
        });

        column_heights[column] += height;
        if index < last_row_start {
            column_heights[column] += geometry.gutter_y;
        }
    }

    let container_height = column_heights.iter().copied().fold(Px::ZERO, Px::max);
    Placement {
        items: placed,
        column_heights,
        container_height,
    }
}

/// Index of the smallest height, first occurrence on ties.
pub fn find_shortest_column(heights: &[Px]) -> usize {
    let mut index = 0;
    let mut best = heights.first().copied().unwrap_or(Px::ZERO);
    for (i, height) in heights.iter().enumerate().skip(1) {
        if *height < best {
            best = *height;
            index = i;
        }
    }
    index
}
