//! The masonry engine: lifecycle, change detection and frame-coalesced passes.
//!
//! ## Usage
//!
//! Create a [`Masonry`] with the host [`Environment`], register items, then
//! call [`Masonry::start`]. Every trigger (options replaced, items changed,
//! container or item resized, filter changed, explicit [`Masonry::layout`])
//! marks a pass as pending and requests one frame; triggers arriving before
//! that frame runs are folded into the same pass.
//!
//! A pass goes through the same steps every time: resolve options for the
//! current width, filter, sort, apply visibility, measure, place, write
//! frames, write the container height, apply transitions, emit events.

use std::{
    sync::{Arc, Weak},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace, warn};

use crate::{
    columns::ColumnGeometry,
    error::{MasonryError, MeasurementError, PipelineStage},
    event::{LayoutEvent, ListenerId, MasonryEvent, PointerEvent, SharedListeners, emit},
    item::{
        Environment, ImageKey, ImageOutcome, ItemHandle, ItemKey, ObserveTarget, ResizeCallback,
        Transition,
    },
    options::{MasonryOptions, TransitionEffect},
    placement::{PlacementInput, place},
    px::Px,
    select::{Predicate, Searchable, guarded, is_filtering, select_indices},
};

/// What asked for a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LayoutTrigger {
    Started,
    OptionsChanged,
    ItemsChanged,
    ContainerResized,
    ItemResized,
    FilterChanged,
    ImagesSettled,
    Requested,
}

#[derive(Debug, Default)]
enum Phase {
    /// Not started, or stopped.
    #[default]
    Inactive,
    Idle,
    /// A frame has been requested for the pending pass.
    Pending,
    /// The pending pass is waiting for these images (image -> owning item).
    AwaitingImages(FxHashMap<ImageKey, ItemKey>),
}

#[derive(Debug, Default)]
struct PendingPass {
    animate: bool,
    announced: bool,
    coalesced: usize,
}

/// Scroll position reported by the host for infinite scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    /// Current scroll offset of the viewport.
    pub scroll_top: Px,
    /// Height of the viewport.
    pub viewport_height: Px,
    /// Offset of the container's top edge in the same coordinate space.
    pub container_top: Px,
}

struct EngineState<I: ItemHandle> {
    options: MasonryOptions<I::Data>,
    items: Vec<Arc<I>>,
    runtime_filter: Option<Predicate<I::Data>>,
    filter_changed: bool,
    phase: Phase,
    pending: PendingPass,
    generation: u64,
    observed: FxHashSet<ObserveTarget>,
    container_width: Px,
    active_breakpoint: Option<u32>,
    last_layout: Option<LayoutEvent>,
    visible: Vec<ItemKey>,
    loading_more: bool,
    initial_filter_applied: bool,
}

impl<I: ItemHandle> EngineState<I> {
    fn is_registered(&self, key: ItemKey) -> bool {
        self.items.iter().any(|item| item.key() == key)
    }

    /// Updates the tracked breakpoint, returning `true` when it changed.
    fn track_breakpoint(&mut self) -> bool {
        let active = self.options.breakpoints.active(self.container_width);
        if active == self.active_breakpoint {
            return false;
        }
        debug!(
            from = ?self.active_breakpoint,
            to = ?active,
            width = %self.container_width,
            "active breakpoint changed"
        );
        self.active_breakpoint = active;
        true
    }
}

struct PassSnapshot<I: ItemHandle> {
    options: MasonryOptions<I::Data>,
    items: Vec<Arc<I>>,
    runtime_filter: Option<Predicate<I::Data>>,
    container_width: Px,
    animate: bool,
    filter_changed: bool,
}

struct PassOutcome {
    selected: Vec<ItemKey>,
    filtered: bool,
    sorted: bool,
    layout: LayoutEvent,
}

struct Shared<I: ItemHandle> {
    env: Environment,
    state: Mutex<EngineState<I>>,
    listeners: SharedListeners,
}

/// A masonry grid bound to one container.
///
/// `Masonry` is a cheap handle; clones drive the same grid. Observers and
/// frame callbacks only hold weak references, so dropping the last handle
/// releases every observation.
pub struct Masonry<I: ItemHandle> {
    shared: Arc<Shared<I>>,
}

impl<I: ItemHandle> Clone for Masonry<I> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<I> Masonry<I>
where
    I: ItemHandle,
    I::Data: Searchable,
{
    /// Creates an engine. Nothing is observed or laid out until
    /// [`start`](Self::start).
    pub fn new(env: Environment, options: MasonryOptions<I::Data>) -> Self {
        let state = EngineState {
            options,
            items: Vec::new(),
            runtime_filter: None,
            filter_changed: false,
            phase: Phase::Inactive,
            pending: PendingPass::default(),
            generation: 0,
            observed: FxHashSet::default(),
            container_width: Px::ZERO,
            active_breakpoint: None,
            last_layout: None,
            visible: Vec::new(),
            loading_more: false,
            initial_filter_applied: false,
        };
        Self {
            shared: Arc::new(Shared {
                env,
                state: Mutex::new(state),
                listeners: SharedListeners::default(),
            }),
        }
    }

    /// Starts observing the container and items and schedules the first
    /// pass. Calling it on a running engine does nothing.
    pub fn start(&self) {
        let shared = &self.shared;
        let width = shared.env.container.width();
        {
            let mut state = shared.state.lock();
            if !matches!(state.phase, Phase::Inactive) {
                return;
            }
            state.phase = Phase::Idle;
            state.container_width = width;
            state.track_breakpoint();
            // once per options value; a later reset_filter sticks across restarts
            if !state.initial_filter_applied {
                state.initial_filter_applied = true;
                if state.runtime_filter.is_none()
                    && let Some(initial) = state.options.initial_filter.clone()
                {
                    state.runtime_filter = Some(initial);
                    state.filter_changed = true;
                }
            }
        }
        debug!(width = %width, "masonry started");
        shared.sync_variables();
        shared.observe(ObserveTarget::Container, shared.container_resize_callback());
        shared.rebind_item_observers();
        shared.request(LayoutTrigger::Started, true);
    }

    /// Releases every observer. Pending frames become no-ops.
    pub fn stop(&self) {
        let released = {
            let mut state = self.shared.state.lock();
            state.phase = Phase::Inactive;
            state.pending = PendingPass::default();
            state.generation += 1;
            std::mem::take(&mut state.observed)
        };
        debug!(observers = released.len(), "masonry stopped");
        for target in released {
            self.shared.env.observer.unobserve(target);
        }
    }

    /// Replaces the options wholesale and schedules a pass.
    pub fn set_options(&self, options: MasonryOptions<I::Data>) {
        {
            let mut state = self.shared.state.lock();
            state.options = options;
            state.initial_filter_applied = false;
            state.track_breakpoint();
        }
        self.shared.sync_variables();
        self.shared.request(LayoutTrigger::OptionsChanged, true);
    }

    /// Replaces the registered items and schedules a pass.
    ///
    /// Observers for the previous set are released and new ones attached, and
    /// an in-flight infinite scroll load is considered finished.
    pub fn set_items(&self, items: Vec<Arc<I>>) {
        let mut keys = FxHashSet::default();
        for item in &items {
            if !keys.insert(item.key()) {
                warn!(key = ?item.key(), "duplicate item key registered");
            }
        }
        {
            let mut state = self.shared.state.lock();
            state.items = items;
            state.loading_more = false;
        }
        self.shared.rebind_item_observers();
        self.shared.request(LayoutTrigger::ItemsChanged, true);
    }

    /// Forces a pass. Folded into an already pending pass if there is one.
    pub fn layout(&self, animate: bool) {
        self.shared.request(LayoutTrigger::Requested, animate);
    }

    /// Installs a runtime filter on top of the configured ones.
    pub fn filter<F>(&self, predicate: F)
    where
        F: Fn(&I::Data) -> bool + Send + Sync + 'static,
    {
        self.set_runtime_filter(Some(Arc::new(predicate)));
    }

    /// Removes the runtime filter.
    pub fn reset_filter(&self) {
        self.set_runtime_filter(None);
    }

    fn set_runtime_filter(&self, filter: Option<Predicate<I::Data>>) {
        {
            let mut state = self.shared.state.lock();
            state.runtime_filter = filter;
            state.filter_changed = true;
        }
        self.shared.request(LayoutTrigger::FilterChanged, true);
    }

    /// Reports that an image has finished loading or failed.
    pub fn image_settled(&self, image: ImageKey, outcome: ImageOutcome) {
        self.shared.image_settled(image, outcome);
    }

    /// Forwards a click on `item` to listeners.
    pub fn item_clicked(&self, item: ItemKey, pointer: PointerEvent) {
        if self.shared.state.lock().is_registered(item) {
            emit(
                &self.shared.listeners,
                &MasonryEvent::ItemClick { item, pointer },
            );
        }
    }

    /// Forwards a hover over `item` to listeners.
    pub fn item_hovered(&self, item: ItemKey, pointer: PointerEvent) {
        if self.shared.state.lock().is_registered(item) {
            emit(
                &self.shared.listeners,
                &MasonryEvent::ItemHover { item, pointer },
            );
        }
    }

    /// Checks the scroll position against the infinite scroll threshold.
    ///
    /// Fires [`MasonryEvent::InfiniteScroll`] at most once per load: the next
    /// one needs [`infinite_scroll_done`](Self::infinite_scroll_done) or a new
    /// item set.
    pub fn on_scroll(&self, metrics: ScrollMetrics) {
        let fire = {
            let mut state = self.shared.state.lock();
            if matches!(state.phase, Phase::Inactive)
                || !state.options.infinite_scroll
                || state.loading_more
            {
                false
            } else {
                let height = state
                    .last_layout
                    .as_ref()
                    .map_or(Px::ZERO, |layout| layout.container_height);
                let bottom = metrics.container_top + height;
                let reached = metrics.scroll_top + metrics.viewport_height
                    >= bottom - state.options.infinite_scroll_threshold.sanitize();
                state.loading_more = reached;
                reached
            }
        };
        if fire {
            debug!("infinite scroll threshold reached");
            emit(&self.shared.listeners, &MasonryEvent::InfiniteScroll);
        }
    }

    /// Marks the current infinite scroll load as finished.
    pub fn infinite_scroll_done(&self) {
        self.shared.state.lock().loading_more = false;
    }

    /// Registers an event listener.
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&MasonryEvent) + Send + Sync + 'static,
    {
        self.shared.listeners.write().add(Arc::new(listener))
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.shared.listeners.write().remove(id)
    }

    /// Metrics of the last successful pass.
    pub fn last_layout(&self) -> Option<LayoutEvent> {
        self.shared.state.lock().last_layout.clone()
    }

    /// Keys shown by the last successful pass, in placement order.
    pub fn visible_items(&self) -> Vec<ItemKey> {
        self.shared.state.lock().visible.clone()
    }

    /// A copy of the current (unresolved) options.
    pub fn options(&self) -> MasonryOptions<I::Data> {
        self.shared.state.lock().options.clone()
    }

    /// The breakpoint threshold active at the last known container width.
    pub fn active_breakpoint(&self) -> Option<u32> {
        self.shared.state.lock().active_breakpoint
    }

    /// Whether a pass is scheduled or waiting for images.
    pub fn is_pending(&self) -> bool {
        matches!(
            self.shared.state.lock().phase,
            Phase::Pending | Phase::AwaitingImages(_)
        )
    }

    /// Whether the engine is started.
    pub fn is_running(&self) -> bool {
        !matches!(self.shared.state.lock().phase, Phase::Inactive)
    }
}

impl<I> Shared<I>
where
    I: ItemHandle,
    I::Data: Searchable,
{
    fn request(self: &Arc<Self>, trigger: LayoutTrigger, animate: bool) {
        let generation = {
            let mut state = self.state.lock();
            match state.phase {
                Phase::Inactive => {
                    trace!(?trigger, "engine not running; trigger ignored");
                    return;
                }
                Phase::Idle => {
                    state.phase = Phase::Pending;
                    state.pending = PendingPass {
                        animate,
                        ..PendingPass::default()
                    };
                    state.generation += 1;
                    state.generation
                }
                Phase::Pending => {
                    state.pending.animate |= animate;
                    state.pending.coalesced += 1;
                    trace!(?trigger, "folded into pending pass");
                    return;
                }
                // The awaited images belong to the previous items or options;
                // the gate is rebuilt from the current ones on the next frame.
                Phase::AwaitingImages(_)
                    if matches!(
                        trigger,
                        LayoutTrigger::ItemsChanged | LayoutTrigger::OptionsChanged
                    ) =>
                {
                    debug!(?trigger, "image wait released");
                    state.pending.animate |= animate;
                    state.pending.coalesced += 1;
                    state.phase = Phase::Pending;
                    state.generation += 1;
                    state.generation
                }
                Phase::AwaitingImages(_) => {
                    state.pending.animate |= animate;
                    state.pending.coalesced += 1;
                    trace!(?trigger, "folded into pass waiting for images");
                    return;
                }
            }
        };
        trace!(?trigger, generation, "pass scheduled");
        self.schedule_frame(generation);
    }

    fn schedule_frame(self: &Arc<Self>, generation: u64) {
        let weak = Arc::downgrade(self);
        self.env.scheduler.request_frame(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_frame(generation);
            }
        }));
    }

    fn is_current(state: &EngineState<I>, generation: u64) -> bool {
        state.generation == generation && matches!(state.phase, Phase::Pending)
    }

    fn on_frame(self: &Arc<Self>, generation: u64) {
        let (items, use_images, announce) = {
            let mut state = self.state.lock();
            if !Self::is_current(&state, generation) {
                trace!(generation, "stale frame skipped");
                return;
            }
            let announce = !state.pending.announced;
            state.pending.announced = true;
            (
                state.items.clone(),
                state.options.use_images_loaded,
                announce,
            )
        };

        if announce {
            emit(&self.listeners, &MasonryEvent::BeforeLayout);
        }

        if use_images {
            let outstanding: FxHashMap<ImageKey, ItemKey> = items
                .iter()
                .flat_map(|item| {
                    let key = item.key();
                    item.pending_images().into_iter().map(move |image| (image, key))
                })
                .collect();
            if !outstanding.is_empty() {
                let mut state = self.state.lock();
                if Self::is_current(&state, generation) {
                    debug!(images = outstanding.len(), "waiting for images before layout");
                    state.phase = Phase::AwaitingImages(outstanding);
                }
                return;
            }
        }

        self.run_pass(generation);
    }

    fn image_settled(self: &Arc<Self>, image: ImageKey, outcome: ImageOutcome) {
        let (item, resume) = {
            let mut state = self.state.lock();
            let Phase::AwaitingImages(outstanding) = &mut state.phase else {
                trace!(?image, "image settled while no pass was waiting");
                return;
            };
            let Some(item) = outstanding.remove(&image) else {
                trace!(?image, "image was not awaited");
                return;
            };
            let resume = if outstanding.is_empty() {
                state.phase = Phase::Pending;
                state.generation += 1;
                Some(state.generation)
            } else {
                None
            };
            (item, resume)
        };

        if outcome == ImageOutcome::Failed {
            debug!(?image, ?item, "image failed to load; layout continues");
        }
        emit(
            &self.listeners,
            &MasonryEvent::ImageLoaded {
                item,
                image,
                outcome,
            },
        );
        if let Some(generation) = resume {
            trace!(trigger = ?LayoutTrigger::ImagesSettled, generation, "images settled");
            self.schedule_frame(generation);
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    fn run_pass(self: &Arc<Self>, generation: u64) {
        let started = Instant::now();
        let width = self.env.container.width();
        let (snapshot, breakpoint_changed) = {
            let mut state = self.state.lock();
            if !Self::is_current(&state, generation) {
                return;
            }
            state.container_width = width;
            let breakpoint_changed = state.track_breakpoint();
            if state.pending.coalesced > 0 {
                trace!(coalesced = state.pending.coalesced, "running coalesced pass");
            }
            let snapshot = PassSnapshot {
                options: state.options.clone(),
                items: state.items.clone(),
                runtime_filter: state.runtime_filter.clone(),
                container_width: width,
                animate: state.pending.animate,
                filter_changed: std::mem::take(&mut state.filter_changed),
            };
            (snapshot, breakpoint_changed)
        };
        if breakpoint_changed {
            self.sync_variables();
        }

        let filter_changed = snapshot.filter_changed;
        let result = self.execute(snapshot, started);

        {
            let mut state = self.state.lock();
            if Self::is_current(&state, generation) {
                state.phase = Phase::Idle;
                state.pending = PendingPass::default();
            }
            match &result {
                Ok(outcome) => {
                    state.last_layout = Some(outcome.layout.clone());
                    state.visible = outcome.selected.clone();
                }
                Err(_) => state.filter_changed |= filter_changed,
            }
        }

        match result {
            Ok(outcome) => {
                debug!(
                    items = outcome.layout.item_count,
                    columns = outcome.layout.columns,
                    height = %outcome.layout.container_height,
                    elapsed = ?outcome.layout.duration,
                    "layout pass complete"
                );
                if outcome.filtered {
                    emit(
                        &self.listeners,
                        &MasonryEvent::ItemsFiltered(outcome.selected.clone()),
                    );
                }
                if outcome.sorted {
                    emit(
                        &self.listeners,
                        &MasonryEvent::ItemsSorted(outcome.selected.clone()),
                    );
                }
                if filter_changed {
                    emit(
                        &self.listeners,
                        &MasonryEvent::FilterComplete(outcome.selected),
                    );
                }
                emit(&self.listeners, &MasonryEvent::LayoutComplete(outcome.layout));
            }
            Err(err) => {
                warn!("layout pass aborted: {err}");
                emit(&self.listeners, &MasonryEvent::Error(err));
            }
        }
    }

    fn execute(
        &self,
        snapshot: PassSnapshot<I>,
        started: Instant,
    ) -> Result<PassOutcome, MasonryError> {
        let PassSnapshot {
            options,
            items,
            runtime_filter,
            container_width,
            animate,
            ..
        } = snapshot;

        let options = options.resolve(container_width);
        let geometry = ColumnGeometry::resolve(&options, container_width);
        let (visible, hidden) = select_indices(&items, &options, runtime_filter.as_ref())?;

        let placement = guarded(PipelineStage::Apply, || {
            for &index in &hidden {
                items[index].set_visible(false);
            }

            let mut handles = Vec::with_capacity(visible.len());
            let mut inputs = Vec::with_capacity(visible.len());
            for &index in &visible {
                let item = &items[index];
                item.set_visible(true);
                match measure(&**item) {
                    Ok(height) => {
                        handles.push(item);
                        inputs.push(PlacementInput {
                            key: item.key(),
                            height,
                        });
                    }
                    Err(err) => warn!("skipping item this pass: {err}"),
                }
            }

            let placement = place(&inputs, &geometry, options.pack);
            for (handle, placed) in handles.iter().zip(&placement.items) {
                handle.set_frame(placed.position, placed.width);
            }
            self.env.container.set_height(placement.container_height);

            if animate
                && options.animation_enabled
                && options.transition_effect != TransitionEffect::None
            {
                for (index, handle) in handles.iter().enumerate() {
                    handle.set_transition(&Transition {
                        effect: options.transition_effect,
                        delay: stagger_delay(options.stagger, index),
                        duration: options.animation_duration,
                        timing_function: options.animation_timing_function.clone(),
                    });
                }
            }
            placement
        })?;

        Ok(PassOutcome {
            selected: visible.iter().map(|&index| items[index].key()).collect(),
            filtered: is_filtering(&options, runtime_filter.is_some()),
            sorted: options.sort_function.is_some(),
            layout: LayoutEvent {
                duration: started.elapsed(),
                item_count: placement.items.len(),
                columns: geometry.count,
                container_width: geometry.container_width,
                container_height: placement.container_height,
            },
        })
    }

    fn sync_variables(&self) {
        let variables = {
            let state = self.state.lock();
            state.options.resolve(state.container_width).style_variables()
        };
        self.env.container.apply_variables(&variables);
    }

    fn observe(&self, target: ObserveTarget, callback: ResizeCallback) {
        self.state.lock().observed.insert(target);
        self.env.observer.observe(target, callback);
    }

    fn rebind_item_observers(self: &Arc<Self>) {
        let (stale, fresh) = {
            let mut state = self.state.lock();
            if matches!(state.phase, Phase::Inactive) {
                return;
            }
            let stale: Vec<ObserveTarget> = state
                .observed
                .iter()
                .copied()
                .filter(|target| matches!(target, ObserveTarget::Item(_)))
                .collect();
            for target in &stale {
                state.observed.remove(target);
            }
            let fresh: Vec<ItemKey> = state.items.iter().map(|item| item.key()).collect();
            (stale, fresh)
        };
        trace!(released = stale.len(), attached = fresh.len(), "rebinding item observers");
        for target in stale {
            self.env.observer.unobserve(target);
        }
        for key in fresh {
            self.observe(ObserveTarget::Item(key), self.item_resize_callback());
        }
    }

    fn item_resize_callback(self: &Arc<Self>) -> ResizeCallback {
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.request(LayoutTrigger::ItemResized, false);
            }
        })
    }

    fn container_resize_callback(self: &Arc<Self>) -> ResizeCallback {
        let weak: Weak<Self> = Arc::downgrade(self);
        Arc::new(move || {
            let Some(shared) = weak.upgrade() else {
                return;
            };
            let width = shared.env.container.width();
            let changed = {
                let mut state = shared.state.lock();
                state.container_width = width;
                state.track_breakpoint()
            };
            if changed {
                shared.sync_variables();
            }
            shared.request(LayoutTrigger::ContainerResized, false);
        })
    }
}

impl<I: ItemHandle> Drop for Shared<I> {
    fn drop(&mut self) {
        let observed = std::mem::take(&mut self.state.get_mut().observed);
        for target in observed {
            self.env.observer.unobserve(target);
        }
    }
}

fn measure<I: ItemHandle>(item: &I) -> Result<Px, MeasurementError> {
    let size = item.measure()?;
    if size.is_finite() {
        Ok(size.height)
    } else {
        Err(MeasurementError::NonFinite(item.key()))
    }
}

fn stagger_delay(stagger: Duration, index: usize) -> Duration {
    stagger.saturating_mul(u32::try_from(index).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Breakpoints, Columns, OptionsOverride, PackMode,
        headless::{HeadlessHost, HeadlessItem},
        px::PxPosition,
        select::FieldValue,
    };

    #[test]
    fn test_stagger_delay() {
        assert_eq!(stagger_delay(Duration::from_millis(50), 0), Duration::ZERO);
        assert_eq!(
            stagger_delay(Duration::from_millis(50), 3),
            Duration::from_millis(150)
        );
        assert_eq!(
            stagger_delay(Duration::from_secs(u64::MAX), 2),
            Duration::MAX
        );
    }

    #[derive(Debug, Clone)]
    struct Card {
        price: f64,
    }

    impl Searchable for Card {
        fn field(&self, property: &str) -> Option<FieldValue> {
            (property == "price").then_some(FieldValue::Number(self.price))
        }
    }

    type Item = HeadlessItem<Card>;

    fn cards(heights: &[f32]) -> Vec<Arc<Item>> {
        heights
            .iter()
            .enumerate()
            .map(|(i, h)| {
                Arc::new(HeadlessItem::new(
                    ItemKey(i as u64),
                    Card {
                        price: (i as f64 + 1.0) * 10.0,
                    },
                    *h,
                ))
            })
            .collect()
    }

    fn two_columns() -> MasonryOptions<Card> {
        MasonryOptions::default()
            .columns(Columns::Fixed(2))
            .gutter_x(Px(10.0))
            .gutter_y(Px(10.0))
    }

    fn record(masonry: &Masonry<Item>) -> Arc<Mutex<Vec<MasonryEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        masonry.subscribe(move |event| sink.lock().push(event.clone()));
        events
    }

    fn kinds(events: &Mutex<Vec<MasonryEvent>>) -> Vec<&'static str> {
        events
            .lock()
            .iter()
            .map(|event| match event {
                MasonryEvent::BeforeLayout => "before",
                MasonryEvent::LayoutComplete(_) => "complete",
                MasonryEvent::ItemsFiltered(_) => "filtered",
                MasonryEvent::ItemsSorted(_) => "sorted",
                MasonryEvent::FilterComplete(_) => "filter-complete",
                MasonryEvent::ImageLoaded { .. } => "image",
                MasonryEvent::ItemClick { .. } => "click",
                MasonryEvent::ItemHover { .. } => "hover",
                MasonryEvent::InfiniteScroll => "scroll",
                MasonryEvent::Error(_) => "error",
            })
            .collect()
    }

    fn started(
        width: f32,
        options: MasonryOptions<Card>,
        items: &[Arc<Item>],
    ) -> (HeadlessHost, Masonry<Item>, Arc<Mutex<Vec<MasonryEvent>>>) {
        let host = HeadlessHost::new(width);
        let masonry = Masonry::new(host.environment(), options);
        let events = record(&masonry);
        masonry.set_items(items.to_vec());
        masonry.start();
        (host, masonry, events)
    }

    #[test]
    fn test_eleven_items_through_engine() {
        let heights = [
            120.0, 80.0, 60.0, 150.0, 90.0, 40.0, 200.0, 70.0, 110.0, 30.0, 50.0,
        ];
        let items = cards(&heights);
        let options = two_columns();
        let inputs: Vec<PlacementInput> = heights
            .iter()
            .enumerate()
            .map(|(i, h)| PlacementInput {
                key: ItemKey(i as u64),
                height: Px(*h),
            })
            .collect();
        let expected = place(
            &inputs,
            &ColumnGeometry::resolve(&options, Px(410.0)),
            PackMode::Justified,
        );

        let (host, masonry, events) = started(410.0, options, &items);
        assert_eq!(host.scheduler.run_frame(), 1);

        for (item, placed) in items.iter().zip(&expected.items) {
            assert!(item.is_visible());
            assert_eq!(item.position(), Some(placed.position));
            assert_eq!(item.style().width, Some(Px(200.0)));
        }
        assert_eq!(host.container.height(), expected.container_height);
        assert_eq!(kinds(&events), vec!["before", "complete"]);

        let layout = masonry.last_layout().unwrap();
        assert_eq!(layout.item_count, 11);
        assert_eq!(layout.columns, 2);
        assert_eq!(layout.container_width, Px(410.0));
        assert_eq!(layout.container_height, expected.container_height);
    }

    #[test]
    fn test_triggers_coalesce_into_one_pass() {
        let items = cards(&[100.0, 50.0, 30.0]);
        let (host, masonry, events) = started(410.0, two_columns(), &items);

        masonry.layout(false);
        masonry.layout(true);
        host.observer.notify(ObserveTarget::Item(ItemKey(1)));
        host.resize(410.0);
        assert!(masonry.is_pending());
        assert_eq!(host.scheduler.pending_frames(), 1);

        assert_eq!(host.scheduler.run_frame(), 1);
        assert_eq!(host.scheduler.pending_frames(), 0);
        assert!(!masonry.is_pending());
        assert_eq!(kinds(&events), vec!["before", "complete"]);

        let first: Vec<_> = items.iter().map(|item| item.position()).collect();
        masonry.layout(false);
        host.scheduler.run_frame();
        let second: Vec<_> = items.iter().map(|item| item.position()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_nothing_runs_before_start() {
        let host = HeadlessHost::new(410.0);
        let masonry = Masonry::new(host.environment(), two_columns());
        masonry.set_items(cards(&[10.0]));
        masonry.layout(true);
        assert_eq!(host.scheduler.pending_frames(), 0);
        assert_eq!(host.observer.observed_count(), 0);
        assert!(!masonry.is_running());
    }

    #[test]
    fn test_observers_follow_item_set_and_stop() {
        let items = cards(&[10.0, 20.0, 30.0]);
        let (host, masonry, _events) = started(410.0, two_columns(), &items);
        assert!(host.observer.is_observing(ObserveTarget::Container));
        assert_eq!(host.observer.observed_count(), 4);

        let replacement: Vec<Arc<Item>> = [10, 11]
            .into_iter()
            .map(|key| Arc::new(HeadlessItem::new(ItemKey(key), Card { price: 1.0 }, 10.0)))
            .collect();
        masonry.set_items(replacement);
        assert!(host.observer.is_observing(ObserveTarget::Item(ItemKey(10))));
        assert!(host.observer.is_observing(ObserveTarget::Item(ItemKey(11))));
        assert!(!host.observer.is_observing(ObserveTarget::Item(ItemKey(0))));
        assert_eq!(host.observer.observed_count(), 3);

        masonry.stop();
        assert_eq!(host.observer.observed_count(), 0);
        assert!(!masonry.is_running());
    }

    #[test]
    fn test_stop_turns_scheduled_frame_into_no_op() {
        let items = cards(&[10.0, 20.0]);
        let (host, masonry, events) = started(410.0, two_columns(), &items);
        masonry.stop();
        assert_eq!(host.scheduler.run_frame(), 1);
        assert!(events.lock().is_empty());
        assert_eq!(items[0].position(), None);
    }

    #[test]
    fn test_restart_runs_exactly_one_pass() {
        let items = cards(&[10.0, 20.0]);
        let (host, masonry, events) = started(410.0, two_columns(), &items);
        masonry.stop();
        masonry.start();
        // the stale frame from the first start is skipped
        assert_eq!(host.scheduler.run_frame(), 2);
        assert_eq!(kinds(&events), vec!["before", "complete"]);
    }

    #[test]
    fn test_dropping_engine_releases_observers() {
        let items = cards(&[10.0, 20.0]);
        let (host, masonry, _events) = started(410.0, two_columns(), &items);
        assert_eq!(host.observer.observed_count(), 3);
        drop(masonry);
        assert_eq!(host.observer.observed_count(), 0);
        // the pending frame outlives the engine harmlessly
        assert_eq!(host.scheduler.run_frame(), 1);
    }

    #[test]
    fn test_item_resize_triggers_pass() {
        let items = cards(&[100.0, 50.0, 30.0]);
        let (host, _masonry, _events) = started(410.0, two_columns(), &items);
        host.scheduler.run_frame();
        assert_eq!(
            items[2].position(),
            Some(PxPosition::new(Px(210.0), Px(50.0)))
        );

        items[1].set_height(200.0);
        assert!(host.observer.notify(ObserveTarget::Item(ItemKey(1))));
        host.scheduler.run_frame();
        assert_eq!(items[2].position(), Some(PxPosition::new(Px(0.0), Px(110.0))));
        assert_eq!(host.container.height(), Px(200.0));
    }

    #[test]
    fn test_image_gate_waits_for_every_image() {
        let items = cards(&[100.0, 50.0]);
        items[0].add_pending_image(ImageKey(1));
        items[0].add_pending_image(ImageKey(2));
        items[1].add_pending_image(ImageKey(3));
        let (host, masonry, events) = started(410.0, two_columns(), &items);

        host.scheduler.run_frame();
        assert_eq!(kinds(&events), vec!["before"]);
        assert!(masonry.is_pending());
        assert_eq!(items[0].position(), None);

        // more triggers while waiting are folded into the gated pass
        masonry.layout(false);
        assert_eq!(host.scheduler.pending_frames(), 0);

        for (item, image, outcome) in [
            (0, 1, ImageOutcome::Loaded),
            (0, 2, ImageOutcome::Failed),
            (1, 3, ImageOutcome::Loaded),
        ] {
            items[item].settle_image(ImageKey(image));
            masonry.image_settled(ImageKey(image), outcome);
        }
        // unknown images are ignored
        masonry.image_settled(ImageKey(42), ImageOutcome::Loaded);
        assert_eq!(host.scheduler.pending_frames(), 1);

        host.scheduler.run_frame();
        assert_eq!(
            kinds(&events),
            vec!["before", "image", "image", "image", "complete"]
        );
        assert!(events.lock().contains(&MasonryEvent::ImageLoaded {
            item: ItemKey(0),
            image: ImageKey(2),
            outcome: ImageOutcome::Failed,
        }));
        assert_eq!(items[1].position(), Some(PxPosition::new(Px(210.0), Px(0.0))));
        assert!(!masonry.is_pending());
    }

    #[test]
    fn test_image_wait_released_when_items_replaced() {
        let items = cards(&[100.0, 50.0]);
        items[0].add_pending_image(ImageKey(1));
        let (host, masonry, events) = started(410.0, two_columns(), &items);
        host.scheduler.run_frame();
        assert!(masonry.is_pending());

        // same keys, fresh items without outstanding images
        let replacement = cards(&[30.0, 40.0]);
        masonry.set_items(replacement.clone());
        masonry.layout(true);
        host.resize(500.0);
        host.scheduler.run_until_idle(10);

        assert!(!masonry.is_pending());
        assert_eq!(replacement[0].position(), Some(PxPosition::new(Px(0.0), Px(0.0))));
        assert!(replacement[1].position().is_some());
        assert_eq!(kinds(&events).last(), Some(&"complete"));
        assert_eq!(items[0].position(), None);
    }

    #[test]
    fn test_image_wait_rebuilt_for_new_items() {
        let items = cards(&[100.0]);
        items[0].add_pending_image(ImageKey(1));
        let (host, masonry, events) = started(410.0, two_columns(), &items);
        host.scheduler.run_frame();

        let replacement = cards(&[30.0]);
        replacement[0].add_pending_image(ImageKey(5));
        masonry.set_items(replacement.clone());
        host.scheduler.run_until_idle(10);
        assert!(masonry.is_pending());
        assert_eq!(replacement[0].position(), None);

        // the old item's image no longer holds anything back
        masonry.image_settled(ImageKey(1), ImageOutcome::Loaded);
        assert_eq!(host.scheduler.pending_frames(), 0);

        replacement[0].settle_image(ImageKey(5));
        masonry.image_settled(ImageKey(5), ImageOutcome::Loaded);
        host.scheduler.run_until_idle(10);
        assert_eq!(kinds(&events), vec!["before", "image", "complete"]);
    }

    #[test]
    fn test_image_wait_released_when_gating_disabled() {
        let items = cards(&[100.0, 50.0]);
        items[0].add_pending_image(ImageKey(1));
        let (host, masonry, events) = started(410.0, two_columns(), &items);
        host.scheduler.run_frame();
        assert!(masonry.is_pending());

        masonry.set_options(two_columns().use_images_loaded(false));
        assert_eq!(host.scheduler.pending_frames(), 1);
        host.scheduler.run_frame();

        assert!(!masonry.is_pending());
        assert_eq!(items[1].position(), Some(PxPosition::new(Px(210.0), Px(0.0))));
        assert_eq!(kinds(&events), vec!["before", "complete"]);
    }

    #[test]
    fn test_image_gate_can_be_disabled() {
        let items = cards(&[100.0]);
        items[0].add_pending_image(ImageKey(1));
        let (host, _masonry, events) =
            started(410.0, two_columns().use_images_loaded(false), &items);
        host.scheduler.run_frame();
        assert_eq!(kinds(&events), vec!["before", "complete"]);
    }

    #[test]
    fn test_callback_panic_reports_error_and_returns_idle() {
        let items = cards(&[10.0, 20.0, 30.0]);
        let options = two_columns().sort_by(|_: &Card, _: &Card| panic!("comparator exploded"));
        let (host, masonry, events) = started(410.0, options, &items);

        host.scheduler.run_frame();
        assert_eq!(kinds(&events), vec!["before", "error"]);
        assert!(events.lock().contains(&MasonryEvent::Error(
            MasonryError::CallbackPanicked {
                stage: PipelineStage::Sort,
                message: "comparator exploded".to_string(),
            }
        )));
        assert!(!masonry.is_pending());
        assert!(masonry.last_layout().is_none());

        masonry.set_options(two_columns());
        host.scheduler.run_frame();
        assert_eq!(kinds(&events).last(), Some(&"complete"));
        assert_eq!(masonry.last_layout().map(|layout| layout.item_count), Some(3));
    }

    #[test]
    fn test_filter_and_reset_filter() {
        let items = cards(&[10.0, 20.0, 30.0, 40.0]);
        let (host, masonry, events) = started(410.0, two_columns(), &items);
        host.scheduler.run_frame();
        events.lock().clear();

        masonry.filter(|card: &Card| card.price > 20.0);
        host.scheduler.run_frame();
        let shown = vec![ItemKey(2), ItemKey(3)];
        let seen = events.lock().clone();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0], MasonryEvent::BeforeLayout);
        assert_eq!(seen[1], MasonryEvent::ItemsFiltered(shown.clone()));
        assert_eq!(seen[2], MasonryEvent::FilterComplete(shown.clone()));
        assert!(matches!(&seen[3], MasonryEvent::LayoutComplete(layout) if layout.item_count == 2));
        assert_eq!(masonry.visible_items(), shown);
        assert!(!items[0].is_visible());
        assert!(items[2].is_visible());
        assert_eq!(items[2].position(), Some(PxPosition::new(Px(0.0), Px(0.0))));

        events.lock().clear();
        masonry.reset_filter();
        host.scheduler.run_frame();
        assert_eq!(kinds(&events), vec!["before", "filter-complete", "complete"]);
        assert!(items.iter().all(|item| item.is_visible()));
    }

    #[test]
    fn test_initial_filter_installed_on_start() {
        let items = cards(&[10.0, 20.0, 30.0]);
        let options = two_columns().initial_filter_by(|card: &Card| card.price < 25.0);
        let (host, masonry, events) = started(410.0, options, &items);
        host.scheduler.run_frame();
        assert_eq!(masonry.visible_items(), vec![ItemKey(0), ItemKey(1)]);
        assert!(kinds(&events).contains(&"filter-complete"));

        masonry.reset_filter();
        host.scheduler.run_frame();
        assert_eq!(masonry.visible_items().len(), 3);
    }

    #[test]
    fn test_reset_filter_survives_restart() {
        let items = cards(&[10.0, 20.0, 30.0]);
        let options = two_columns().initial_filter_by(|card: &Card| card.price < 25.0);
        let (host, masonry, _events) = started(410.0, options, &items);
        host.scheduler.run_frame();
        masonry.reset_filter();
        host.scheduler.run_frame();

        masonry.stop();
        masonry.start();
        host.scheduler.run_frame();
        assert_eq!(masonry.visible_items().len(), 3);
        assert!(items.iter().all(|item| item.is_visible()));

        // fresh options bring the initial filter back
        masonry.set_options(two_columns().initial_filter_by(|card: &Card| card.price < 25.0));
        masonry.stop();
        masonry.start();
        host.scheduler.run_frame();
        assert_eq!(masonry.visible_items(), vec![ItemKey(0), ItemKey(1)]);
    }

    #[test]
    fn test_sorted_pass_emits_order() {
        let items = cards(&[10.0, 20.0, 30.0]);
        let options = two_columns().sort_by(|a: &Card, b: &Card| b.price.total_cmp(&a.price));
        let (host, masonry, events) = started(410.0, options, &items);
        host.scheduler.run_frame();
        let order = vec![ItemKey(2), ItemKey(1), ItemKey(0)];
        assert!(events.lock().contains(&MasonryEvent::ItemsSorted(order.clone())));
        assert_eq!(masonry.visible_items(), order);
        assert_eq!(items[2].position(), Some(PxPosition::new(Px(0.0), Px(0.0))));
    }

    #[test]
    fn test_breakpoints_follow_container_resize() {
        let options = MasonryOptions::default()
            .columns(Columns::Fixed(4))
            .gutter_x(Px(10.0))
            .breakpoints(
                Breakpoints::new()
                    .with(600, OptionsOverride::default().columns(Columns::Fixed(1)))
                    .with(1200, OptionsOverride::default().columns(Columns::Fixed(3))),
            );
        let items = cards(&[10.0, 10.0, 10.0, 10.0]);
        let (host, masonry, _events) = started(800.0, options, &items);
        host.scheduler.run_frame();
        assert_eq!(masonry.active_breakpoint(), Some(1200));
        assert_eq!(masonry.last_layout().map(|l| l.columns), Some(3));

        host.resize(500.0);
        host.scheduler.run_frame();
        assert_eq!(masonry.active_breakpoint(), Some(600));
        assert_eq!(masonry.last_layout().map(|l| l.columns), Some(1));
        assert_eq!(
            host.container.variables().map(|v| v.column_width),
            Some("calc(100% - 20px)".to_string())
        );

        host.resize(1500.0);
        host.scheduler.run_frame();
        assert_eq!(masonry.active_breakpoint(), None);
        assert_eq!(masonry.last_layout().map(|l| l.columns), Some(4));
    }

    #[test]
    fn test_transitions_are_staggered() {
        let items = cards(&[10.0, 10.0, 10.0]);
        let (host, _masonry, _events) = started(
            410.0,
            two_columns()
                .stagger(Duration::from_millis(40))
                .transition_effect(TransitionEffect::Scale),
            &items,
        );
        host.scheduler.run_frame();
        for (i, item) in items.iter().enumerate() {
            let transition = item.style().transition.unwrap();
            assert_eq!(transition.delay, Duration::from_millis(40 * i as u64));
            assert_eq!(transition.duration, Duration::from_millis(300));
            assert_eq!(transition.class_name(), "masonry-item-scale-in");
        }
    }

    #[test]
    fn test_disabled_animation_skips_transitions() {
        let items = cards(&[10.0, 10.0]);
        let (host, _masonry, _events) =
            started(410.0, two_columns().animation_enabled(false), &items);
        host.scheduler.run_frame();
        assert!(items.iter().all(|item| item.style().transition.is_none()));
    }

    #[test]
    fn test_detached_item_is_skipped() {
        let items = cards(&[100.0, 50.0, 30.0]);
        items[1].detach();
        let (host, masonry, _events) = started(410.0, two_columns(), &items);
        host.scheduler.run_frame();
        assert_eq!(items[1].position(), None);
        assert_eq!(items[2].position(), Some(PxPosition::new(Px(210.0), Px(0.0))));
        assert_eq!(masonry.last_layout().map(|l| l.item_count), Some(2));
    }

    #[test]
    fn test_empty_item_set() {
        let (host, masonry, events) = started(410.0, two_columns(), &[]);
        host.scheduler.run_frame();
        assert_eq!(kinds(&events), vec!["before", "complete"]);
        assert_eq!(host.container.height(), Px::ZERO);
        assert_eq!(masonry.last_layout().map(|l| l.item_count), Some(0));
    }

    #[test]
    fn test_infinite_scroll_fires_once_per_load() {
        let options = MasonryOptions::default()
            .columns(Columns::Fixed(1))
            .gutter_y(Px(10.0))
            .infinite_scroll(true);
        let items = cards(&[100.0, 100.0, 100.0, 100.0]);
        let (host, masonry, events) = started(300.0, options, &items);
        host.scheduler.run_frame();
        assert_eq!(host.container.height(), Px(430.0));
        events.lock().clear();

        let at = |scroll_top: f32| ScrollMetrics {
            scroll_top: Px(scroll_top),
            viewport_height: Px(100.0),
            container_top: Px(0.0),
        };
        masonry.on_scroll(at(0.0));
        assert!(events.lock().is_empty());

        masonry.on_scroll(at(150.0));
        masonry.on_scroll(at(200.0));
        assert_eq!(kinds(&events), vec!["scroll"]);

        masonry.infinite_scroll_done();
        masonry.on_scroll(at(200.0));
        assert_eq!(kinds(&events), vec!["scroll", "scroll"]);

        masonry.set_items(cards(&[100.0; 6]));
        masonry.on_scroll(at(200.0));
        assert_eq!(kinds(&events), vec!["scroll", "scroll", "scroll"]);
    }

    #[test]
    fn test_infinite_scroll_disabled_by_default() {
        let items = cards(&[100.0]);
        let (host, masonry, events) = started(300.0, two_columns(), &items);
        host.scheduler.run_frame();
        events.lock().clear();
        masonry.on_scroll(ScrollMetrics {
            scroll_top: Px(10_000.0),
            viewport_height: Px(100.0),
            container_top: Px(0.0),
        });
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_pointer_events_for_registered_items_only() {
        let items = cards(&[10.0]);
        let (_host, masonry, events) = started(300.0, two_columns(), &items);
        let pointer = PointerEvent {
            position: PxPosition::new(Px(3.0), Px(4.0)),
        };
        masonry.item_clicked(ItemKey(0), pointer);
        masonry.item_hovered(ItemKey(0), pointer);
        masonry.item_clicked(ItemKey(99), pointer);
        assert_eq!(
            *events.lock(),
            vec![
                MasonryEvent::ItemClick {
                    item: ItemKey(0),
                    pointer
                },
                MasonryEvent::ItemHover {
                    item: ItemKey(0),
                    pointer
                },
            ]
        );
    }

    #[test]
    fn test_listener_may_drive_engine() {
        let items = cards(&[10.0, 20.0]);
        let host = HeadlessHost::new(410.0);
        let masonry = Masonry::new(host.environment(), two_columns());
        let passes = Arc::new(Mutex::new(0));
        let id = {
            let engine = masonry.clone();
            let passes = passes.clone();
            masonry.subscribe(move |event| {
                if let MasonryEvent::LayoutComplete(_) = event {
                    let mut passes = passes.lock();
                    *passes += 1;
                    if *passes == 1 {
                        engine.layout(false);
                    }
                }
            })
        };
        masonry.set_items(items);
        masonry.start();

        assert_eq!(host.scheduler.run_until_idle(10), 2);
        assert_eq!(*passes.lock(), 2);
        assert!(masonry.unsubscribe(id));
    }

    #[test]
    fn test_options_push_style_variables() {
        let items = cards(&[10.0]);
        let (host, masonry, _events) = started(410.0, MasonryOptions::default(), &items);
        let variables = host.container.variables().unwrap();
        assert_eq!(variables.column_width, "200px");
        assert_eq!(variables.gutter_x, Px(10.0));

        masonry.set_options(two_columns());
        let variables = host.container.variables().unwrap();
        assert_eq!(variables.column_width, "calc(50% - 10px)");
        assert_eq!(masonry.options(), two_columns());
    }
}
