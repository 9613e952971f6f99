//! Capability traits implemented by the host environment.
//!
//! ## Usage
//!
//! Implement these for your UI toolkit (or use the in-memory versions in
//! [`headless`](crate::headless)). The engine only ever talks to the host
//! through them: it reads sizes, writes positions/visibility, subscribes to
//! resize notifications and asks for the next frame.

use std::{sync::Arc, time::Duration};

use smallvec::SmallVec;

use crate::{
    error::MeasurementError,
    options::{StyleVariables, TransitionEffect},
    px::{Px, PxPosition, PxSize},
};

/// Stable identity of a registered item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ItemKey(pub u64);

/// Identity of an image inside an item's subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageKey(pub u64);

/// How an image finished loading. Both outcomes unblock a gated pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ImageOutcome {
    /// The image decoded successfully.
    Loaded,
    /// The image failed to load.
    Failed,
}

/// Staggered transition hint applied to an item after a pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Entry effect.
    pub effect: TransitionEffect,
    /// Delay before the effect starts (`index * stagger`).
    pub delay: Duration,
    /// Effect duration.
    pub duration: Duration,
    /// CSS-style timing function name.
    pub timing_function: String,
}

impl Transition {
    /// The class name a DOM host would add, e.g. `masonry-item-fade-in`.
    pub fn class_name(&self) -> String {
        format!("masonry-item-{}-in", self.effect.as_str())
    }
}

/// A positionable, measurable visual element plus its data payload.
pub trait ItemHandle: Send + Sync + 'static {
    /// Payload type read by filter and sort callbacks.
    type Data: Send + Sync + 'static;

    /// Returns the stable identity of this item.
    fn key(&self) -> ItemKey;

    /// Returns the associated data payload.
    fn data(&self) -> &Self::Data;

    /// Reads the current rendered size. Called once per pass for each visible
    /// item; the engine never caches the result.
    fn measure(&self) -> Result<PxSize, MeasurementError>;

    /// Images in this item's subtree that have not finished loading yet.
    fn pending_images(&self) -> SmallVec<[ImageKey; 4]> {
        SmallVec::new()
    }

    /// Shows or hides the item.
    fn set_visible(&self, visible: bool);

    /// Moves the item to `position` and sets its width.
    fn set_frame(&self, position: PxPosition, width: Px);

    /// Applies a presentational transition.
    fn set_transition(&self, _transition: &Transition) {}
}

/// The element that hosts the grid.
pub trait ContainerHandle: Send + Sync + 'static {
    /// Current inner width of the container.
    fn width(&self) -> Px;

    /// Sets the container height computed by the last pass.
    fn set_height(&self, height: Px);

    /// Pushes the style variables derived from the current options.
    fn apply_variables(&self, _variables: &StyleVariables) {}
}

/// What a resize observation is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObserveTarget {
    /// The grid container.
    Container,
    /// A registered item.
    Item(ItemKey),
}

/// Callback invoked by the host when an observed target changes size.
pub type ResizeCallback = Arc<dyn Fn() + Send + Sync>;

/// Resize notification capability.
///
/// Every `observe` is balanced by an `unobserve` from the engine, either when
/// the item set changes or when the engine stops.
pub trait ResizeObserver: Send + Sync + 'static {
    /// Starts observing `target`.
    fn observe(&self, target: ObserveTarget, on_resize: ResizeCallback);

    /// Stops observing `target`.
    fn unobserve(&self, target: ObserveTarget);
}

/// Callback run on the next frame.
pub type FrameCallback = Box<dyn FnOnce() + Send>;

/// "Run this on the next frame" capability.
pub trait FrameScheduler: Send + Sync + 'static {
    /// Queues `callback` for the next frame boundary.
    fn request_frame(&self, callback: FrameCallback);
}

/// Everything the engine needs from its host, bundled.
#[derive(Clone)]
pub struct Environment {
    /// The grid container.
    pub container: Arc<dyn ContainerHandle>,
    /// Resize notifications.
    pub observer: Arc<dyn ResizeObserver>,
    /// Frame scheduling.
    pub scheduler: Arc<dyn FrameScheduler>,
}

impl Environment {
    /// Bundles the three host capabilities.
    pub fn new(
        container: Arc<dyn ContainerHandle>,
        observer: Arc<dyn ResizeObserver>,
        scheduler: Arc<dyn FrameScheduler>,
    ) -> Self {
        Self {
            container,
            observer,
            scheduler,
        }
    }
}
