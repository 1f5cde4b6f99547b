// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Priority-ordered collection.
//!
//! Entries are kept in ascending priority. An entry inserted with a
//! priority equal to existing entries lands after all of them, so among
//! equal priorities the front holds the oldest entry and the back the
//! newest.

/// Ascending priority list with stable ordering for ties
#[derive(Debug, Clone, PartialEq)]
pub struct PriorityList<T, P = i32> {
    entries: Vec<(P, T)>,
}

impl<T, P> Default for PriorityList<T, P> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: PartialEq, P: Ord + Copy> PriorityList<T, P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    /// Insert after every entry whose priority is `<= priority`.
    /// Returns the position the item was placed at.
    pub fn insert(&mut self, item: T, priority: P) -> usize {
        let pos = self.entries.partition_point(|(p, _)| *p <= priority);
        self.entries.insert(pos, (priority, item));
        pos
    }

    /// Remove the first entry equal to `item`, returning whether one existed
    pub fn remove(&mut self, item: &T) -> bool {
        match self.position(item) {
            Some(pos) => {
                self.entries.remove(pos);
                true
            }
            None => false,
        }
    }

    #[inline]
    pub fn contains(&self, item: &T) -> bool {
        self.position(item).is_some()
    }

    pub fn position(&self, item: &T) -> Option<usize> {
        self.entries.iter().position(|(_, existing)| existing == item)
    }

    pub fn priority_of(&self, item: &T) -> Option<P> {
        self.entries
            .iter()
            .find(|(_, existing)| existing == item)
            .map(|(p, _)| *p)
    }

    /// Remove and return the lowest-priority (oldest among ties) entry
    pub fn pop_front(&mut self) -> Option<(P, T)> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// Remove and return the highest-priority (newest among ties) entry
    pub fn pop_back(&mut self) -> Option<(P, T)> {
        self.entries.pop()
    }

    pub fn front(&self) -> Option<&T> {
        self.entries.first().map(|(_, item)| item)
    }

    pub fn back(&self) -> Option<&T> {
        self.entries.last().map(|(_, item)| item)
    }

    /// Entries in ascending priority
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (P, &T)> + '_ {
        self.entries.iter().map(|(p, item)| (*p, item))
    }

    /// Items in ascending priority
    pub fn items(&self) -> impl DoubleEndedIterator<Item = &T> + '_ {
        self.entries.iter().map(|(_, item)| item)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry, returning the items in ascending priority
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.entries.drain(..).map(|(_, item)| item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascending_with_ties_after_existing() {
        let mut list = PriorityList::new();
        list.insert("b", 5);
        list.insert("a", 1);
        list.insert("c", 5);
        list.insert("d", 3);

        assert_eq!(list.items().copied().collect::<Vec<_>>(), vec!["a", "d", "b", "c"]);
        assert_eq!(list.insert("e", 5), 4);
        assert_eq!(list.back(), Some(&"e"));
    }

    #[test]
    fn test_remove_reports_presence() {
        let mut list = PriorityList::new();
        list.insert(1u32, 0);
        assert!(list.remove(&1));
        assert!(!list.remove(&1));
        assert!(list.is_empty());
    }

    #[test]
    fn test_pop_ends() {
        let mut list = PriorityList::new();
        list.insert('x', 2);
        list.insert('y', 2);
        list.insert('z', 9);

        assert_eq!(list.pop_front(), Some((2, 'x')));
        assert_eq!(list.pop_back(), Some((9, 'z')));
        assert_eq!(list.priority_of(&'y'), Some(2));
        assert_eq!(list.pop_front(), Some((2, 'y')));
        assert_eq!(list.pop_front(), None);
    }

    #[test]
    fn test_reinsert_moves_entry() {
        let mut list = PriorityList::new();
        list.insert(10u32, 0);
        list.insert(11u32, 0);
        list.remove(&10);
        list.insert(10, 0);
        assert_eq!(list.items().copied().collect::<Vec<_>>(), vec![11, 10]);
    }
}
