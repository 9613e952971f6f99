//! Notifications delivered to the embedder.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
    time::Duration,
};

use parking_lot::RwLock;
use tracing::error;

use crate::{
    error::MasonryError,
    item::{ImageKey, ImageOutcome, ItemKey},
    px::{Px, PxPosition},
};

/// Metrics of one completed pass.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LayoutEvent {
    /// Wall time spent in the pass.
    pub duration: Duration,
    /// Number of items placed.
    pub item_count: usize,
    /// Resolved column count.
    pub columns: usize,
    /// Container width the pass resolved against.
    pub container_width: Px,
    /// Resulting container height.
    pub container_height: Px,
}

/// Pointer details forwarded with click and hover events.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerEvent {
    /// Pointer position relative to the container.
    pub position: PxPosition,
}

/// Everything the engine reports.
#[derive(Debug, Clone, PartialEq)]
pub enum MasonryEvent {
    /// A pass is about to run (emitted before any image wait).
    BeforeLayout,
    /// A pass finished.
    LayoutComplete(LayoutEvent),
    /// The filters ran; the visible keys in placement order.
    ItemsFiltered(Vec<ItemKey>),
    /// The sort ran; the visible keys in sorted order.
    ItemsSorted(Vec<ItemKey>),
    /// First pass after a runtime filter change finished; the visible keys.
    FilterComplete(Vec<ItemKey>),
    /// An image a pass was waiting on settled.
    ImageLoaded {
        /// Item owning the image.
        item: ItemKey,
        /// The image.
        image: ImageKey,
        /// Load or error.
        outcome: ImageOutcome,
    },
    /// A registered item was clicked.
    ItemClick {
        /// The item.
        item: ItemKey,
        /// Pointer details.
        pointer: PointerEvent,
    },
    /// The pointer entered a registered item.
    ItemHover {
        /// The item.
        item: ItemKey,
        /// Pointer details.
        pointer: PointerEvent,
    },
    /// The viewport reached the bottom threshold; load more items.
    InfiniteScroll,
    /// A pass failed.
    Error(MasonryError),
}

/// Handle returned by [`Masonry::subscribe`](crate::Masonry::subscribe).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&MasonryEvent) + Send + Sync>;

#[derive(Default)]
pub(crate) struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Listener)>,
}

pub(crate) type SharedListeners = Arc<RwLock<Listeners>>;

impl Listeners {
    pub(crate) fn add(&mut self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub(crate) fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        before != self.entries.len()
    }
}

/// Delivers `event` to every listener.
///
/// The registry lock is released before listeners run, so a listener may
/// subscribe, unsubscribe or drive the engine. A panicking listener is logged
/// and skipped.
pub(crate) fn emit(listeners: &SharedListeners, event: &MasonryEvent) {
    let snapshot: Vec<Listener> = listeners
        .read()
        .entries
        .iter()
        .map(|(_, listener)| listener.clone())
        .collect();
    for listener in snapshot {
        if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
            error!("masonry event listener panicked while handling {event:?}");
        }
    }
}
