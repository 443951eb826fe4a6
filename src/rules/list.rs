//! Ordered list with insertion disciplines
//!
//! [`OrderedList`] backs every rule list and the flat binding list. Elements
//! are kept in insertion order; there is no priority field, an element runs
//! earlier only because it was prepended.

use std::fmt;

/// How [`OrderedList::add`] inserts (or removes) a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddFlag {
    /// Insert at the tail
    Append,
    /// Insert at the tail unless an equal element exists
    #[default]
    AppendUnique,
    /// Remove the equal element; the passed value is only a lookup key
    Remove,
    /// Insert at the tail, or remove the equal element if there is one
    Toggle,
    /// Insert at the head
    Prepend,
    /// Insert at the head unless an equal element exists
    PrependUnique,
    /// Insert at the head, or remove the equal element if there is one
    PrependToggle,
}

/// What [`OrderedList::add`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    /// The value was inserted
    Inserted,
    /// An equal element was removed and dropped
    Removed,
    /// Nothing changed and the passed value was dropped
    Discarded,
}

impl AddResult {
    /// Whether the passed value now lives in the list
    pub fn is_inserted(self) -> bool {
        self == AddResult::Inserted
    }
}

/// Insertion-ordered, owning list
///
/// Equality of elements (`PartialEq`) is the identity used by the unique,
/// remove and toggle disciplines.
#[derive(Clone)]
pub struct OrderedList<T> {
    items: Vec<T>,
}

impl<T: fmt::Debug> fmt::Debug for OrderedList<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.items.iter()).finish()
    }
}

impl<T> Default for OrderedList<T> {
    fn default() -> Self {
        OrderedList { items: Vec::new() }
    }
}

impl<T> OrderedList<T> {
    /// Create an empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the list has no elements
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate the elements in dispatch order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Drop every element
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Remove and return the first element matching `pred`
    pub fn remove_by<F: FnMut(&T) -> bool>(&mut self, pred: F) -> Option<T> {
        let index = self.items.iter().position(pred)?;
        Some(self.items.remove(index))
    }

    /// Copy of the current elements
    ///
    /// Walking a snapshot lets the elements themselves mutate the list they
    /// came from without affecting the walk in progress.
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.items.clone()
    }
}

impl<T: PartialEq> OrderedList<T> {
    /// Whether an element equal to `value` is present
    pub fn contains(&self, value: &T) -> bool {
        self.items.contains(value)
    }

    /// Remove and return the element equal to `key`
    pub fn remove(&mut self, key: &T) -> Option<T> {
        self.remove_by(|item| item == key)
    }

    /// Insert or remove `value` according to `flag`
    ///
    /// A value that does not end up in the list is dropped before this
    /// returns, as is any element removed from it.
    pub fn add(&mut self, value: T, flag: AddFlag) -> AddResult {
        match flag {
            AddFlag::Append => {
                self.items.push(value);
                AddResult::Inserted
            }
            AddFlag::Prepend => {
                self.items.insert(0, value);
                AddResult::Inserted
            }
            AddFlag::AppendUnique | AddFlag::PrependUnique => {
                if self.contains(&value) {
                    return AddResult::Discarded;
                }
                self.add(
                    value,
                    if flag == AddFlag::AppendUnique {
                        AddFlag::Append
                    } else {
                        AddFlag::Prepend
                    },
                )
            }
            AddFlag::Remove => match self.remove(&value) {
                Some(_) => AddResult::Removed,
                None => AddResult::Discarded,
            },
            AddFlag::Toggle | AddFlag::PrependToggle => {
                if self.remove(&value).is_some() {
                    return AddResult::Removed;
                }
                self.add(
                    value,
                    if flag == AddFlag::Toggle {
                        AddFlag::Append
                    } else {
                        AddFlag::Prepend
                    },
                )
            }
        }
    }
}

impl<'a, T> IntoIterator for &'a OrderedList<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
