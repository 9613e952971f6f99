//! In-memory host: items, container, resize observer and a manually pumped
//! frame scheduler.
//!
//! Useful for tests, server-side layout and any embedder that only wants the
//! numbers. Every write the engine performs is recorded and can be read back.
//!
//! ```
//! use std::sync::Arc;
//! use super_masonry::{
//!     Columns, Masonry, MasonryOptions,
//!     headless::{HeadlessHost, HeadlessItem},
//!     item::ItemKey,
//!     px::Px,
//! };
//!
//! let host = HeadlessHost::new(410.0);
//! let options: MasonryOptions<()> = MasonryOptions::default()
//!     .columns(Columns::Fixed(2))
//!     .gutter_x(Px::new(10.0))
//!     .gutter_y(Px::new(10.0));
//! let masonry = Masonry::new(host.environment(), options);
//!
//! let items: Vec<_> = [100.0, 50.0, 30.0]
//!     .into_iter()
//!     .enumerate()
//!     .map(|(i, h)| Arc::new(HeadlessItem::new(ItemKey(i as u64), (), h)))
//!     .collect();
//! masonry.set_items(items.clone());
//! masonry.start();
//! host.scheduler.run_frame();
//!
//! assert_eq!(items[2].position(), Some(super_masonry::px::PxPosition::new(Px::new(210.0), Px::new(50.0))));
//! assert_eq!(host.container.height(), Px::new(110.0));
//! ```

use std::{collections::VecDeque, sync::Arc};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::{
    error::MeasurementError,
    item::{
        ContainerHandle, Environment, FrameCallback, FrameScheduler, ImageKey, ItemHandle,
        ItemKey, ObserveTarget, ResizeCallback, ResizeObserver, Transition,
    },
    options::StyleVariables,
    px::{Px, PxPosition, PxSize},
};

/// Everything the engine last wrote to a [`HeadlessItem`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ItemStyle {
    /// `None` until the first pass touched the item.
    pub visible: Option<bool>,
    /// Last position written.
    pub position: Option<PxPosition>,
    /// Last width written.
    pub width: Option<Px>,
    /// Last transition applied.
    pub transition: Option<Transition>,
}

/// An item living only in memory.
pub struct HeadlessItem<T> {
    key: ItemKey,
    data: T,
    size: RwLock<PxSize>,
    detached: RwLock<bool>,
    pending_images: RwLock<SmallVec<[ImageKey; 4]>>,
    style: RwLock<ItemStyle>,
}

impl<T> HeadlessItem<T> {
    /// Creates an item with the given rendered height.
    pub fn new(key: ItemKey, data: T, height: f32) -> Self {
        Self {
            key,
            data,
            size: RwLock::new(PxSize::new(Px::ZERO, Px::new(height))),
            detached: RwLock::new(false),
            pending_images: RwLock::new(SmallVec::new()),
            style: RwLock::new(ItemStyle::default()),
        }
    }

    /// Changes the height reported by `measure`.
    pub fn set_height(&self, height: f32) {
        self.size.write().height = Px::new(height);
    }

    /// Makes `measure` fail as if the element had been removed.
    pub fn detach(&self) {
        *self.detached.write() = true;
    }

    /// Adds an image that has not loaded yet.
    pub fn add_pending_image(&self, image: ImageKey) {
        self.pending_images.write().push(image);
    }

    /// Marks an image as settled so it is no longer reported as pending.
    pub fn settle_image(&self, image: ImageKey) {
        self.pending_images.write().retain(|pending| *pending != image);
    }

    /// Snapshot of the recorded style.
    pub fn style(&self) -> ItemStyle {
        self.style.read().clone()
    }

    /// Last position written, if any.
    pub fn position(&self) -> Option<PxPosition> {
        self.style.read().position
    }

    /// Whether the last pass showed this item.
    pub fn is_visible(&self) -> bool {
        self.style.read().visible.unwrap_or(false)
    }
}

impl<T: Send + Sync + 'static> ItemHandle for HeadlessItem<T> {
    type Data = T;

    fn key(&self) -> ItemKey {
        self.key
    }

    fn data(&self) -> &T {
        &self.data
    }

    fn measure(&self) -> Result<PxSize, MeasurementError> {
        if *self.detached.read() {
            return Err(MeasurementError::Detached(self.key));
        }
        let size = *self.size.read();
        if size.is_finite() {
            Ok(size)
        } else {
            Err(MeasurementError::NonFinite(self.key))
        }
    }

    fn pending_images(&self) -> SmallVec<[ImageKey; 4]> {
        self.pending_images.read().clone()
    }

    fn set_visible(&self, visible: bool) {
        self.style.write().visible = Some(visible);
    }

    fn set_frame(&self, position: PxPosition, width: Px) {
        let mut style = self.style.write();
        style.position = Some(position);
        style.width = Some(width);
        // width feeds back into the next measurement like a reflowed element
        self.size.write().width = width;
    }

    fn set_transition(&self, transition: &Transition) {
        self.style.write().transition = Some(transition.clone());
    }
}

/// An in-memory container.
#[derive(Default)]
pub struct HeadlessContainer {
    width: RwLock<Px>,
    height: RwLock<Px>,
    variables: RwLock<Option<StyleVariables>>,
}

impl HeadlessContainer {
    /// Creates a container of the given width.
    pub fn new(width: f32) -> Self {
        Self {
            width: RwLock::new(Px::new(width)),
            ..Self::default()
        }
    }

    /// Changes the width. Does not notify observers; see
    /// [`HeadlessResizeObserver::notify`].
    pub fn set_width(&self, width: f32) {
        *self.width.write() = Px::new(width);
    }

    /// Height written by the last pass.
    pub fn height(&self) -> Px {
        *self.height.read()
    }

    /// Style variables last pushed by the engine.
    pub fn variables(&self) -> Option<StyleVariables> {
        self.variables.read().clone()
    }
}

impl ContainerHandle for HeadlessContainer {
    fn width(&self) -> Px {
        *self.width.read()
    }

    fn set_height(&self, height: Px) {
        *self.height.write() = height;
    }

    fn apply_variables(&self, variables: &StyleVariables) {
        *self.variables.write() = Some(variables.clone());
    }
}

/// A resize observer driven by explicit [`notify`](Self::notify) calls.
#[derive(Default)]
pub struct HeadlessResizeObserver {
    callbacks: Mutex<FxHashMap<ObserveTarget, ResizeCallback>>,
}

impl HeadlessResizeObserver {
    /// Creates an observer with nothing observed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Invokes the callback registered for `target`. Returns `false` when
    /// `target` is not observed.
    pub fn notify(&self, target: ObserveTarget) -> bool {
        let callback = self.callbacks.lock().get(&target).cloned();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// Whether `target` is currently observed.
    pub fn is_observing(&self, target: ObserveTarget) -> bool {
        self.callbacks.lock().contains_key(&target)
    }

    /// Number of live observations.
    pub fn observed_count(&self) -> usize {
        self.callbacks.lock().len()
    }
}

impl ResizeObserver for HeadlessResizeObserver {
    fn observe(&self, target: ObserveTarget, on_resize: ResizeCallback) {
        self.callbacks.lock().insert(target, on_resize);
    }

    fn unobserve(&self, target: ObserveTarget) {
        self.callbacks.lock().remove(&target);
    }
}

/// A frame scheduler pumped by hand.
#[derive(Default)]
pub struct ManualFrameScheduler {
    queue: Mutex<VecDeque<FrameCallback>>,
}

impl ManualFrameScheduler {
    /// Creates an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the callbacks queued before this call and returns how many ran.
    /// Callbacks requested while running wait for the next frame.
    pub fn run_frame(&self) -> usize {
        let frame: Vec<FrameCallback> = self.queue.lock().drain(..).collect();
        let count = frame.len();
        for callback in frame {
            callback();
        }
        count
    }

    /// Runs frames until none are requested, at most `max_frames` times.
    /// Returns the number of frames that ran a callback.
    pub fn run_until_idle(&self, max_frames: usize) -> usize {
        let mut frames = 0;
        while frames < max_frames && self.run_frame() > 0 {
            frames += 1;
        }
        frames
    }

    /// Number of callbacks waiting for the next frame.
    pub fn pending_frames(&self) -> usize {
        self.queue.lock().len()
    }
}

impl FrameScheduler for ManualFrameScheduler {
    fn request_frame(&self, callback: FrameCallback) {
        self.queue.lock().push_back(callback);
    }
}

/// The three headless capabilities bundled together.
#[derive(Clone)]
pub struct HeadlessHost {
    /// The container.
    pub container: Arc<HeadlessContainer>,
    /// The resize observer.
    pub observer: Arc<HeadlessResizeObserver>,
    /// The frame scheduler.
    pub scheduler: Arc<ManualFrameScheduler>,
}

impl HeadlessHost {
    /// Creates a host whose container is `width` wide.
    pub fn new(width: f32) -> Self {
        Self {
            container: Arc::new(HeadlessContainer::new(width)),
            observer: Arc::new(HeadlessResizeObserver::new()),
            scheduler: Arc::new(ManualFrameScheduler::new()),
        }
    }

    /// An [`Environment`] backed by this host.
    pub fn environment(&self) -> Environment {
        Environment::new(
            self.container.clone(),
            self.observer.clone(),
            self.scheduler.clone(),
        )
    }

    /// Resizes the container and notifies the engine.
    pub fn resize(&self, width: f32) {
        self.container.set_width(width);
        self.observer.notify(ObserveTarget::Container);
    }
}
