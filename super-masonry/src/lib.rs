//! super-masonry is a framework-agnostic masonry grid layout engine.
//!
//! Given a container and a set of items of variable height, it places every
//! item into the currently shortest column, producing a packed,
//! Pinterest-style grid. Column counts can be fixed or derived from the
//! container width, breakpoints override options per width range, and items
//! can be filtered and sorted before placement.
//!
//! # Host integration
//!
//! The engine never touches a UI toolkit directly. It talks to the host
//! through the capability traits in [`item`]:
//!
//! - [`ItemHandle`](item::ItemHandle): measure, show/hide and position one item.
//! - [`ContainerHandle`](item::ContainerHandle): read the width, write the height.
//! - [`ResizeObserver`](item::ResizeObserver): resize notifications.
//! - [`FrameScheduler`](item::FrameScheduler): run something on the next frame.
//!
//! [`headless`] implements all of them in memory.
//!
//! # Passes
//!
//! Every change (options, items, sizes, filters) marks a pass as pending;
//! all changes before the next frame collapse into one pass. A pass resolves
//! options for the current width, filters and sorts, measures, places, and
//! reports through [`MasonryEvent`].
//!
//! ```
//! use std::sync::Arc;
//! use super_masonry::{
//!     Breakpoints, Columns, Masonry, MasonryOptions, OptionsOverride, Searchable,
//!     headless::{HeadlessHost, HeadlessItem},
//!     item::ItemKey,
//! };
//!
//! struct Photo {
//!     likes: u32,
//! }
//!
//! impl Searchable for Photo {}
//!
//! let host = HeadlessHost::new(800.0);
//! let options: MasonryOptions<Photo> = MasonryOptions::default()
//!     .columns(Columns::Fixed(4))
//!     .breakpoints(
//!         Breakpoints::new()
//!             .with(600, OptionsOverride::default().columns(Columns::Fixed(1)))
//!             .with(1200, OptionsOverride::default().columns(Columns::Fixed(3))),
//!     )
//!     .filter_by(|photo: &Photo| photo.likes % 2 == 0);
//!
//! let masonry = Masonry::new(host.environment(), options);
//! masonry.set_items(
//!     (0..6)
//!         .map(|i| Arc::new(HeadlessItem::new(ItemKey(i), Photo { likes: i as u32 }, 100.0)))
//!         .collect(),
//! );
//! masonry.start();
//! host.scheduler.run_frame();
//!
//! assert_eq!(masonry.visible_items(), vec![ItemKey(0), ItemKey(2), ItemKey(4)]);
//! assert_eq!(masonry.last_layout().map(|layout| layout.columns), Some(3));
//! ```

#![deny(missing_docs, clippy::unwrap_used)]

pub mod columns;
mod engine;
pub mod error;
mod event;
pub mod headless;
pub mod item;
pub mod options;
pub mod placement;
pub mod px;
pub mod select;

pub use crate::{
    engine::{Masonry, ScrollMetrics},
    error::{MasonryError, MeasurementError, PipelineStage},
    event::{LayoutEvent, ListenerId, MasonryEvent, PointerEvent},
    options::{
        Breakpoints, Columns, MasonryOptions, OptionsOverride, PackMode, StyleVariables,
        TransitionEffect,
    },
    select::{
        ConditionValue, FieldValue, MatchMode, Operator, SearchCondition, Searchable,
    },
};
