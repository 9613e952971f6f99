//! Layout options, responsive breakpoints and the configuration resolver.
//!
//! ## Usage
//!
//! Build a [`MasonryOptions`] with its setters, attach per-width overrides in
//! [`Breakpoints`], and hand the whole value to
//! [`Masonry::set_options`](crate::Masonry::set_options). Options are always
//! replaced wholesale.
//!
//! ```
//! use super_masonry::{Breakpoints, Columns, MasonryOptions, OptionsOverride, px::Px};
//!
//! let options: MasonryOptions<()> = MasonryOptions::default()
//!     .columns(Columns::Fixed(4))
//!     .gutter_x(Px::new(16.0))
//!     .breakpoints(
//!         Breakpoints::new()
//!             .with(600, OptionsOverride::default().columns(Columns::Fixed(1)))
//!             .with(1200, OptionsOverride::default().columns(Columns::Fixed(3))),
//!     );
//!
//! assert_eq!(options.resolve(Px::new(800.0)).columns, Columns::Fixed(3));
//! assert_eq!(options.resolve(Px::new(500.0)).columns, Columns::Fixed(1));
//! assert_eq!(options.resolve(Px::new(1600.0)).columns, Columns::Fixed(4));
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use derive_setters::Setters;

use crate::{
    px::Px,
    select::{Comparator, Predicate, SearchCondition},
};

/// Default column width hint used when none (or an unusable one) is given.
pub const DEFAULT_COLUMN_WIDTH: Px = Px(200.0);

/// How many columns the grid has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Columns {
    /// Exactly this many columns. Zero is treated as one.
    Fixed(usize),
    /// As many `column_width` columns as fit the container.
    #[default]
    Auto,
}

/// Placement strategy.
///
/// `Packed` and `Cascade` are reserved names: they currently run the same
/// greedy shortest-column algorithm as `Justified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PackMode {
    /// Greedy shortest-column placement.
    #[default]
    Justified,
    /// Alias of `Justified`.
    Packed,
    /// Alias of `Justified`.
    Cascade,
}

impl PackMode {
    /// Lower-case name of the mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Justified => "justified",
            Self::Packed => "packed",
            Self::Cascade => "cascade",
        }
    }
}

/// Entry effect applied to items after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransitionEffect {
    /// Fade in.
    #[default]
    Fade,
    /// Scale up from 80%.
    Scale,
    /// Slide up.
    Slide,
    /// No entry effect.
    None,
}

impl TransitionEffect {
    /// Lower-case name of the effect.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fade => "fade",
            Self::Scale => "scale",
            Self::Slide => "slide",
            Self::None => "none",
        }
    }
}

/// A partial set of options applied on top of the base options while a
/// breakpoint is active. `None` fields keep the base value.
#[derive(Debug, Clone, Default, PartialEq, Setters)]
#[setters(strip_option)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OptionsOverride {
    /// Column mode override.
    pub columns: Option<Columns>,
    /// Column width hint override.
    pub column_width: Option<Px>,
    /// Horizontal gutter override.
    pub gutter_x: Option<Px>,
    /// Vertical gutter override.
    pub gutter_y: Option<Px>,
    /// Animation toggle override.
    pub animation_enabled: Option<bool>,
    /// Animation duration override.
    pub animation_duration: Option<Duration>,
    /// Timing function override.
    #[setters(into)]
    pub animation_timing_function: Option<String>,
    /// Stagger delay override.
    pub stagger: Option<Duration>,
    /// Transition effect override.
    pub transition_effect: Option<TransitionEffect>,
    /// Origin override.
    pub origin_left: Option<bool>,
    /// Pack mode override.
    pub pack: Option<PackMode>,
}

/// Width thresholds mapped to option overrides.
///
/// A threshold is the maximum container width at which its override applies.
/// When several thresholds are at least the container width, the smallest of
/// them wins.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Breakpoints(BTreeMap<u32, OptionsOverride>);

impl Breakpoints {
    /// Creates an empty breakpoint map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) an override, builder style.
    pub fn with(mut self, threshold: u32, overrides: OptionsOverride) -> Self {
        self.insert(threshold, overrides);
        self
    }

    /// Adds (or replaces) an override.
    pub fn insert(&mut self, threshold: u32, overrides: OptionsOverride) {
        self.0.insert(threshold, overrides);
    }

    /// Returns `true` if no breakpoint is configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the threshold active at `width`, if any.
    pub fn active(&self, width: Px) -> Option<u32> {
        self.0
            .keys()
            .copied()
            .find(|threshold| width.raw() <= *threshold as f32)
    }

    /// Returns the override registered at `threshold`.
    pub fn get(&self, threshold: u32) -> Option<&OptionsOverride> {
        self.0.get(&threshold)
    }
}

impl FromIterator<(u32, OptionsOverride)> for Breakpoints {
    fn from_iter<I: IntoIterator<Item = (u32, OptionsOverride)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Configuration of a masonry grid over items carrying data of type `T`.
#[derive(Setters)]
pub struct MasonryOptions<T> {
    /// Fixed column count or `Auto`.
    pub columns: Columns,
    /// Column width hint, used in `Auto` mode and as fallback width.
    pub column_width: Px,
    /// Horizontal spacing between columns.
    pub gutter_x: Px,
    /// Vertical spacing between stacked items.
    pub gutter_y: Px,
    /// Whether items receive entry transitions after a pass.
    pub animation_enabled: bool,
    /// Transition duration.
    pub animation_duration: Duration,
    /// Transition timing function, e.g. `ease-out`.
    #[setters(into)]
    pub animation_timing_function: String,
    /// Per-item delay increment for staggered transitions.
    pub stagger: Duration,
    /// Entry effect.
    pub transition_effect: TransitionEffect,
    /// Count columns from the left edge (`true`) or the right edge.
    pub origin_left: bool,
    /// Placement strategy.
    pub pack: PackMode,
    /// Wait for every pending image before measuring.
    pub use_images_loaded: bool,
    /// Emit infinite-scroll events near the bottom of the grid.
    pub infinite_scroll: bool,
    /// Distance from the bottom at which infinite scroll fires.
    pub infinite_scroll_threshold: Px,
    /// Responsive overrides.
    pub breakpoints: Breakpoints,
    /// Structured search conditions, folded left to right.
    pub search_conditions: Vec<SearchCondition>,
    /// Comparator applied after filtering.
    #[setters(skip)]
    pub sort_function: Option<Comparator<T>>,
    /// Predicate over item data.
    #[setters(skip)]
    pub filter_function: Option<Predicate<T>>,
    /// Runtime filter installed when the engine starts.
    #[setters(skip)]
    pub initial_filter: Option<Predicate<T>>,
}

impl<T> MasonryOptions<T> {
    /// Sets the sort comparator.
    pub fn sort_by<F>(mut self, compare: F) -> Self
    where
        F: Fn(&T, &T) -> std::cmp::Ordering + Send + Sync + 'static,
    {
        self.sort_function = Some(Arc::new(compare));
        self
    }

    /// Sets the filter predicate.
    pub fn filter_by<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter_function = Some(Arc::new(predicate));
        self
    }

    /// Sets the filter installed by [`Masonry::start`](crate::Masonry::start).
    pub fn initial_filter_by<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.initial_filter = Some(Arc::new(predicate));
        self
    }

    /// Returns these options with the breakpoint active at `container_width`
    /// merged in. Without an active breakpoint the result equals `self`.
    pub fn resolve(&self, container_width: Px) -> Self {
        let mut resolved = self.clone();
        if let Some(overrides) = self
            .breakpoints
            .active(container_width)
            .and_then(|threshold| self.breakpoints.get(threshold))
        {
            resolved.apply_override(overrides);
        }
        resolved
    }

    fn apply_override(&mut self, overrides: &OptionsOverride) {
        if let Some(columns) = overrides.columns {
            self.columns = columns;
        }
        if let Some(width) = overrides.column_width {
            self.column_width = width;
        }
        if let Some(gutter) = overrides.gutter_x {
            self.gutter_x = gutter;
        }
        if let Some(gutter) = overrides.gutter_y {
            self.gutter_y = gutter;
        }
        if let Some(enabled) = overrides.animation_enabled {
            self.animation_enabled = enabled;
        }
        if let Some(duration) = overrides.animation_duration {
            self.animation_duration = duration;
        }
        if let Some(timing) = &overrides.animation_timing_function {
            self.animation_timing_function = timing.clone();
        }
        if let Some(stagger) = overrides.stagger {
            self.stagger = stagger;
        }
        if let Some(effect) = overrides.transition_effect {
            self.transition_effect = effect;
        }
        if let Some(origin_left) = overrides.origin_left {
            self.origin_left = origin_left;
        }
        if let Some(pack) = overrides.pack {
            self.pack = pack;
        }
    }

    /// Style variables a host pushes onto the container element.
    pub fn style_variables(&self) -> StyleVariables {
        StyleVariables::from_options(self)
    }
}

impl<T> Default for MasonryOptions<T> {
    fn default() -> Self {
        Self {
            columns: Columns::Auto,
            column_width: DEFAULT_COLUMN_WIDTH,
            gutter_x: Px(10.0),
            gutter_y: Px(10.0),
            animation_enabled: true,
            animation_duration: Duration::from_millis(300),
            animation_timing_function: "ease-out".to_string(),
            stagger: Duration::from_millis(50),
            transition_effect: TransitionEffect::Fade,
            origin_left: true,
            pack: PackMode::Justified,
            use_images_loaded: true,
            infinite_scroll: false,
            infinite_scroll_threshold: Px(200.0),
            breakpoints: Breakpoints::default(),
            search_conditions: Vec::new(),
            sort_function: None,
            filter_function: None,
            initial_filter: None,
        }
    }
}

impl<T> Clone for MasonryOptions<T> {
    fn clone(&self) -> Self {
        Self {
            columns: self.columns,
            column_width: self.column_width,
            gutter_x: self.gutter_x,
            gutter_y: self.gutter_y,
            animation_enabled: self.animation_enabled,
            animation_duration: self.animation_duration,
            animation_timing_function: self.animation_timing_function.clone(),
            stagger: self.stagger,
            transition_effect: self.transition_effect,
            origin_left: self.origin_left,
            pack: self.pack,
            use_images_loaded: self.use_images_loaded,
            infinite_scroll: self.infinite_scroll,
            infinite_scroll_threshold: self.infinite_scroll_threshold,
            breakpoints: self.breakpoints.clone(),
            search_conditions: self.search_conditions.clone(),
            sort_function: self.sort_function.clone(),
            filter_function: self.filter_function.clone(),
            initial_filter: self.initial_filter.clone(),
        }
    }
}

fn same_callback<C: ?Sized>(a: &Option<Arc<C>>, b: &Option<Arc<C>>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => Arc::ptr_eq(a, b),
        (None, None) => true,
        _ => false,
    }
}

// Callbacks compare by identity.
impl<T> PartialEq for MasonryOptions<T> {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
            && self.column_width == other.column_width
            && self.gutter_x == other.gutter_x
            && self.gutter_y == other.gutter_y
            && self.animation_enabled == other.animation_enabled
            && self.animation_duration == other.animation_duration
            && self.animation_timing_function == other.animation_timing_function
            && self.stagger == other.stagger
            && self.transition_effect == other.transition_effect
            && self.origin_left == other.origin_left
            && self.pack == other.pack
            && self.use_images_loaded == other.use_images_loaded
            && self.infinite_scroll == other.infinite_scroll
            && self.infinite_scroll_threshold == other.infinite_scroll_threshold
            && self.breakpoints == other.breakpoints
            && self.search_conditions == other.search_conditions
            && same_callback(&self.sort_function, &other.sort_function)
            && same_callback(&self.filter_function, &other.filter_function)
            && same_callback(&self.initial_filter, &other.initial_filter)
    }
}

impl<T> fmt::Debug for MasonryOptions<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasonryOptions")
            .field("columns", &self.columns)
            .field("column_width", &self.column_width)
            .field("gutter_x", &self.gutter_x)
            .field("gutter_y", &self.gutter_y)
            .field("animation_enabled", &self.animation_enabled)
            .field("animation_duration", &self.animation_duration)
            .field("stagger", &self.stagger)
            .field("transition_effect", &self.transition_effect)
            .field("origin_left", &self.origin_left)
            .field("pack", &self.pack)
            .field("use_images_loaded", &self.use_images_loaded)
            .field("infinite_scroll", &self.infinite_scroll)
            .field("breakpoints", &self.breakpoints)
            .field("search_conditions", &self.search_conditions)
            .field("sort_function", &self.sort_function.is_some())
            .field("filter_function", &self.filter_function.is_some())
            .finish_non_exhaustive()
    }
}

/// Container-level style variables derived from the options.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleVariables {
    /// CSS expression for the column width.
    pub column_width: String,
    /// Horizontal gutter.
    pub gutter_x: Px,
    /// Vertical gutter.
    pub gutter_y: Px,
    /// Transition duration.
    pub animation_duration: Duration,
    /// Transition timing function.
    pub timing_function: String,
    /// Stagger delay increment.
    pub stagger: Duration,
}

impl StyleVariables {
    /// Derives the variables from a set of options.
    ///
    /// Fixed columns produce a percentage expression so CSS-only layouts stay
    /// close to the computed one before the first pass lands.
    pub fn from_options<T>(options: &MasonryOptions<T>) -> Self {
        let gutter_x = options.gutter_x.sanitize();
        let column_width = match options.columns {
            Columns::Fixed(count) => {
                let count = count.max(1) as f32;
                format!(
                    "calc({}% - {}px)",
                    100.0 / count,
                    gutter_x.raw() / count * 2.0
                )
            }
            Columns::Auto => options.column_width.to_css(),
        };
        Self {
            column_width,
            gutter_x,
            gutter_y: options.gutter_y.sanitize(),
            animation_duration: options.animation_duration,
            timing_function: options.animation_timing_function.clone(),
            stagger: options.stagger,
        }
    }

    /// The variables as CSS custom property pairs.
    pub fn to_css_properties(&self) -> Vec<(&'static str, String)> {
        vec![
            ("--masonry-column-width", self.column_width.clone()),
            ("--masonry-gutter-x", self.gutter_x.to_css()),
            ("--masonry-gutter-y", self.gutter_y.to_css()),
            (
                "--masonry-animation-duration",
                format!("{}ms", self.animation_duration.as_millis()),
            ),
            ("--masonry-animation-timing", self.timing_function.clone()),
            (
                "--masonry-stagger-delay",
                format!("{}ms", self.stagger.as_millis()),
            ),
        ]
    }
}
