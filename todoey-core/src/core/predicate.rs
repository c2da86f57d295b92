//! Query building blocks: scope, predicates and sort order.
//!
//! Predicates form a small closed algebra (field, comparison, value,
//! case-sensitivity) evaluated directly against loaded [`Item`]s. There is no
//! textual query language.

use std::cmp::Reverse;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::core::item::{map_item_row, ITEM_SELECT};
use crate::{ChangeEvent, Item, Result};

/// Lower-cases `text` and strips diacritics, so `"Crème"` folds to `"creme"`.
pub fn fold(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// An item field a [`Predicate`] can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemField {
    Title,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    Equals,
    /// Substring containment. Only meaningful for text values.
    Contains,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PredicateValue {
    Text(String),
    Bool(bool),
}

/// One condition on an item.
///
/// A value of the wrong type for the field never matches. Boolean fields
/// compare for equality whatever the comparison kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: ItemField,
    pub comparison: Comparison,
    pub value: PredicateValue,
    /// When `false`, text is compared after [`fold`]ing both sides.
    pub case_sensitive: bool,
}

impl Predicate {
    /// Case- and diacritic-insensitive substring search over titles.
    pub fn title_contains(text: impl Into<String>) -> Self {
        Self {
            field: ItemField::Title,
            comparison: Comparison::Contains,
            value: PredicateValue::Text(text.into()),
            case_sensitive: false,
        }
    }

    pub fn done(done: bool) -> Self {
        Self {
            field: ItemField::Done,
            comparison: Comparison::Equals,
            value: PredicateValue::Bool(done),
            case_sensitive: true,
        }
    }

    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        match (self.field, &self.value) {
            (ItemField::Title, PredicateValue::Text(needle)) => {
                if self.case_sensitive {
                    compare_text(&item.title, needle, self.comparison)
                } else {
                    compare_text(&fold(&item.title), &fold(needle), self.comparison)
                }
            }
            (ItemField::Done, PredicateValue::Bool(expected)) => item.done == *expected,
            _ => false,
        }
    }
}

fn compare_text(haystack: &str, needle: &str, comparison: Comparison) -> bool {
    match comparison {
        Comparison::Equals => haystack == needle,
        Comparison::Contains => haystack.contains(needle),
    }
}

/// An item field a result can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortField {
    /// Folded title first, raw title to break ties.
    Title,
    DateCreated,
    Done,
    /// Insertion order within the category.
    Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: SortField,
    pub ascending: bool,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: SortField::Title,
            ascending: true,
        }
    }
}

impl Sort {
    /// Stable-sorts `items`; equal keys keep their load order.
    pub fn apply(&self, items: &mut [Item]) {
        match self.field {
            SortField::Title => sort_directed(items, self.ascending, |i| (fold(&i.title), i.title.clone())),
            SortField::DateCreated => sort_directed(items, self.ascending, |i| i.date_created),
            SortField::Done => sort_directed(items, self.ascending, |i| i.done),
            SortField::Position => sort_directed(items, self.ascending, |i| i.position),
        }
    }
}

fn sort_directed<K: Ord>(items: &mut [Item], ascending: bool, mut key: impl FnMut(&Item) -> K) {
    if ascending {
        items.sort_by_cached_key(key);
    } else {
        items.sort_by_cached_key(|i| Reverse(key(i)));
    }
}

/// Which items a query draws from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// Items owned by one category. An unknown id yields no items, not an error.
    Category(String),
    /// Every item, grouped by category in creation order.
    AllItems,
}

/// A scope, the predicates every result must satisfy, and an ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub scope: Scope,
    pub predicates: Vec<Predicate>,
    pub sort: Sort,
}

impl Query {
    /// Items of `category_id`, title ascending.
    pub fn in_category(category_id: impl Into<String>) -> Self {
        Self {
            scope: Scope::Category(category_id.into()),
            predicates: Vec::new(),
            sort: Sort::default(),
        }
    }

    /// Every item, title ascending.
    pub fn all_items() -> Self {
        Self {
            scope: Scope::AllItems,
            predicates: Vec::new(),
            sort: Sort::default(),
        }
    }

    /// Adds `predicate` to the ones already required.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    /// Replaces the ordering.
    #[must_use]
    pub fn sort_by(mut self, field: SortField, ascending: bool) -> Self {
        self.sort = Sort { field, ascending };
        self
    }

    /// Same scope, no predicates, default ordering.
    #[must_use]
    pub fn reset(&self) -> Self {
        Self {
            scope: self.scope.clone(),
            predicates: Vec::new(),
            sort: Sort::default(),
        }
    }

    #[must_use]
    pub fn matches(&self, item: &Item) -> bool {
        self.predicates.iter().all(|p| p.matches(item))
    }

    /// Whether a commit described by `event` can change this query's result.
    #[must_use]
    pub fn is_affected_by(&self, event: &ChangeEvent) -> bool {
        if !event.touches_items() {
            return false;
        }
        match &self.scope {
            Scope::AllItems => true,
            Scope::Category(id) => event.category_id() == id,
        }
    }

    /// Loads, filters and orders the matching items.
    pub(crate) fn load(&self, conn: &Connection) -> Result<Vec<Item>> {
        let mut items = match &self.scope {
            Scope::Category(id) => {
                let mut stmt = conn.prepare(&format!(
                    "{ITEM_SELECT} WHERE ci.category_id = ?1 ORDER BY ci.position"
                ))?;
                let rows = stmt
                    .query_map([id], map_item_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
            Scope::AllItems => {
                let mut stmt = conn.prepare(&format!(
                    "{ITEM_SELECT} JOIN categories c ON c.id = ci.category_id
                     ORDER BY c.created_at, c.rowid, ci.position"
                ))?;
                let rows = stmt
                    .query_map([], map_item_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                rows
            }
        };

        items.retain(|item| self.matches(item));
        self.sort.apply(&mut items);
        Ok(items)
    }
}
