//! Item selection: filtering and sorting before placement.
//!
//! ## Usage
//!
//! Filtering always runs before sorting. An item is visible when it passes
//! every active filter: the options' predicate, the options' search
//! conditions, and the runtime filter set through
//! [`Masonry::filter`](crate::Masonry::filter). Items that fail are hidden,
//! never unregistered, so a later pass can show them again.
//!
//! Search conditions are folded left to right: the first condition seeds the
//! result and every following condition combines with the running result by
//! its own [`Operator`].
//!
//! ```
//! use super_masonry::select::{
//!     ConditionValue, FieldValue, MatchMode, Operator, SearchCondition, Searchable,
//!     matches_conditions,
//! };
//!
//! struct Product {
//!     title: &'static str,
//!     price: f64,
//! }
//!
//! impl Searchable for Product {
//!     fn field(&self, property: &str) -> Option<FieldValue> {
//!         match property {
//!             "title" => Some(FieldValue::Text(self.title.to_string())),
//!             "price" => Some(FieldValue::Number(self.price)),
//!             _ => None,
//!         }
//!     }
//! }
//!
//! let conditions = vec![
//!     SearchCondition::new("price", ConditionValue::Range(0.0, 100.0), MatchMode::Range),
//!     SearchCondition::new("title", ConditionValue::text("LAMP"), MatchMode::Contains)
//!         .operator(Operator::Or),
//! ];
//!
//! let cheap = Product { title: "Chair", price: 40.0 };
//! let lamp = Product { title: "Floor lamp", price: 400.0 };
//! let sofa = Product { title: "Sofa", price: 900.0 };
//! assert!(matches_conditions(&cheap, &conditions));
//! assert!(matches_conditions(&lamp, &conditions));
//! assert!(!matches_conditions(&sofa, &conditions));
//! ```

use std::{
    any::Any,
    cmp::Ordering,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use derive_setters::Setters;
use tracing::warn;

use crate::{
    error::{MasonryError, PipelineStage},
    item::{ItemHandle, ItemKey},
    options::MasonryOptions,
};

/// Predicate over item data.
pub type Predicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Total order over item data.
pub type Comparator<T> = Arc<dyn Fn(&T, &T) -> Ordering + Send + Sync>;

/// A property value exposed by item data for search conditions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldValue {
    /// Text, compared case-insensitively.
    Text(String),
    /// A number.
    Number(f64),
    /// A flag.
    Bool(bool),
}

/// Gives search conditions access to item data by property name.
///
/// Data types that are never searched can rely on the default, which
/// exposes no properties (every condition then evaluates to `false`).
pub trait Searchable {
    /// Returns the value of `property`, if the data has one.
    fn field(&self, _property: &str) -> Option<FieldValue> {
        None
    }
}

impl Searchable for () {}

/// The value a condition compares against.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConditionValue {
    /// Text operand.
    Text(String),
    /// Numeric operand.
    Number(f64),
    /// Boolean operand.
    Bool(bool),
    /// Inclusive `[min, max]` operand for [`MatchMode::Range`].
    Range(f64, f64),
}

impl ConditionValue {
    /// Shorthand for a text operand.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// How a field is compared with the condition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchMode {
    /// Equal (case-insensitive for text).
    #[default]
    Exact,
    /// Text contains the operand.
    Contains,
    /// Text starts with the operand.
    StartsWith,
    /// Text ends with the operand.
    EndsWith,
    /// Number lies in the inclusive range.
    Range,
}

/// How a condition combines with the result accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Operator {
    /// Narrow the result.
    #[default]
    And,
    /// Widen the result.
    Or,
}

/// One structured search condition.
#[derive(Debug, Clone, PartialEq, Setters)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchCondition {
    /// Property name looked up through [`Searchable::field`].
    #[setters(into)]
    pub property: String,
    /// Operand.
    pub value: ConditionValue,
    /// Comparison.
    pub match_mode: MatchMode,
    /// Combination with the previous result. Ignored on the first condition.
    #[cfg_attr(feature = "serde", serde(default))]
    pub operator: Operator,
}

impl SearchCondition {
    /// Creates an `And` condition.
    pub fn new(property: impl Into<String>, value: ConditionValue, match_mode: MatchMode) -> Self {
        Self {
            property: property.into(),
            value,
            match_mode,
            operator: Operator::And,
        }
    }

    /// Evaluates this condition alone against `data`.
    pub fn matches<T: Searchable + ?Sized>(&self, data: &T) -> bool {
        let Some(field) = data.field(&self.property) else {
            return false;
        };
        match self.match_mode {
            MatchMode::Range => match (&self.value, field) {
                (ConditionValue::Range(min, max), FieldValue::Number(n)) => *min <= n && n <= *max,
                (ConditionValue::Range(..), _) => false,
                (other, _) => {
                    warn!(
                        property = %self.property,
                        "range condition needs a [min, max] operand, got {other:?}"
                    );
                    false
                }
            },
            MatchMode::Exact => match (&self.value, field) {
                (ConditionValue::Number(v), FieldValue::Number(n)) => *v == n,
                (ConditionValue::Bool(v), FieldValue::Bool(b)) => *v == b,
                (value, field) => match (operand_text(value), field_text(&field)) {
                    (Some(v), Some(f)) => v == f,
                    _ => false,
                },
            },
            mode => {
                let (Some(needle), Some(haystack)) = (operand_text(&self.value), field_text(&field))
                else {
                    return false;
                };
                match mode {
                    MatchMode::Contains => haystack.contains(&needle),
                    MatchMode::StartsWith => haystack.starts_with(&needle),
                    MatchMode::EndsWith => haystack.ends_with(&needle),
                    MatchMode::Exact | MatchMode::Range => false,
                }
            }
        }
    }
}

fn operand_text(value: &ConditionValue) -> Option<String> {
    match value {
        ConditionValue::Text(text) => Some(text.to_lowercase()),
        ConditionValue::Number(n) => Some(n.to_string()),
        ConditionValue::Bool(b) => Some(b.to_string()),
        ConditionValue::Range(..) => None,
    }
}

fn field_text(field: &FieldValue) -> Option<String> {
    Some(match field {
        FieldValue::Text(text) => text.to_lowercase(),
        FieldValue::Number(n) => n.to_string(),
        FieldValue::Bool(b) => b.to_string(),
    })
}

/// Folds `conditions` left to right over `data`. An empty list matches.
pub fn matches_conditions<T: Searchable + ?Sized>(data: &T, conditions: &[SearchCondition]) -> bool {
    let mut iter = conditions.iter();
    let Some(first) = iter.next() else {
        return true;
    };
    iter.fold(first.matches(data), |acc, condition| match condition.operator {
        Operator::And => acc && condition.matches(data),
        Operator::Or => acc || condition.matches(data),
    })
}

/// Result of the selection pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selection {
    /// Items to place, in placement order.
    pub visible: Vec<ItemKey>,
    /// Registered items that failed the filters.
    pub hidden: Vec<ItemKey>,
    /// Whether any filter was active.
    pub filtered: bool,
    /// Whether a sort comparator ran.
    pub sorted: bool,
}

/// Runs filters then sort over `items`, returning indices into `items`.
///
/// Panics raised by user callbacks are caught and returned as
/// [`MasonryError::CallbackPanicked`].
pub fn select_indices<I>(
    items: &[Arc<I>],
    options: &MasonryOptions<I::Data>,
    runtime_filter: Option<&Predicate<I::Data>>,
) -> Result<(Vec<usize>, Vec<usize>), MasonryError>
where
    I: ItemHandle,
    I::Data: Searchable,
{
    let mut visible = Vec::with_capacity(items.len());
    let mut hidden = Vec::new();

    guarded(PipelineStage::Filter, || {
        for (index, item) in items.iter().enumerate() {
            let data = item.data();
            let keep = options.filter_function.as_ref().is_none_or(|f| f(data))
                && matches_conditions(data, &options.search_conditions)
                && runtime_filter.is_none_or(|f| f(data));
            if keep {
                visible.push(index);
            } else {
                hidden.push(index);
            }
        }
    })?;

    if let Some(compare) = &options.sort_function {
        guarded(PipelineStage::Sort, || {
            visible.sort_by(|a, b| compare(items[*a].data(), items[*b].data()));
        })?;
    }

    Ok((visible, hidden))
}

/// Runs the pipeline and reports keys.
pub fn select<I>(
    items: &[Arc<I>],
    options: &MasonryOptions<I::Data>,
    runtime_filter: Option<&Predicate<I::Data>>,
) -> Result<Selection, MasonryError>
where
    I: ItemHandle,
    I::Data: Searchable,
{
    let (visible, hidden) = select_indices(items, options, runtime_filter)?;
    Ok(Selection {
        visible: visible.into_iter().map(|i| items[i].key()).collect(),
        hidden: hidden.into_iter().map(|i| items[i].key()).collect(),
        filtered: is_filtering(options, runtime_filter.is_some()),
        sorted: options.sort_function.is_some(),
    })
}

pub(crate) fn is_filtering<T>(options: &MasonryOptions<T>, runtime_filter: bool) -> bool {
    runtime_filter || options.filter_function.is_some() || !options.search_conditions.is_empty()
}

pub(crate) fn guarded<R>(stage: PipelineStage, f: impl FnOnce() -> R) -> Result<R, MasonryError> {
    catch_unwind(AssertUnwindSafe(f))
        .map_err(|payload: Box<dyn Any + Send>| MasonryError::from_panic(stage, payload))
}
