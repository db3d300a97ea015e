//! # Selection Set
//!
//! Tracks which discovered items are marked for import.
//!
//! Items keep their discovery order. Ids are unique within a set: inserting an
//! item whose id is already present is ignored. Toggling an unknown id is a
//! silent no-op.

use crate::types::{DiscoveredItem, ItemId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionSet {
    items: Vec<DiscoveredItem>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append newly discovered items, skipping ids already present.
    ///
    /// Returns the number of items actually added.
    pub fn extend<I>(&mut self, items: I) -> usize
    where
        I: IntoIterator<Item = DiscoveredItem>,
    {
        let mut added = 0;
        for item in items {
            if self.contains(&item.id) {
                continue;
            }
            self.items.push(item);
            added += 1;
        }
        added
    }

    /// Flip the selection flag of one item.
    ///
    /// Returns `false` when the id is unknown.
    pub fn toggle(&mut self, id: &ItemId) -> bool {
        match self.items.iter_mut().find(|item| &item.id == id) {
            Some(item) => {
                item.is_selected = !item.is_selected;
                true
            }
            None => false,
        }
    }

    /// Clear every flag if all items are selected, otherwise select all.
    pub fn toggle_all(&mut self) {
        let select = !self.is_all_selected();
        for item in &mut self.items {
            item.is_selected = select;
        }
    }

    /// Number of selected items.
    pub fn count(&self) -> usize {
        self.items.iter().filter(|item| item.is_selected).count()
    }

    /// Selected items in discovery order.
    pub fn selected(&self) -> impl Iterator<Item = &DiscoveredItem> {
        self.items.iter().filter(|item| item.is_selected)
    }

    pub fn is_all_selected(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|item| item.is_selected)
    }

    pub fn is_selected(&self, id: &ItemId) -> bool {
        self.get(id).map(|item| item.is_selected).unwrap_or(false)
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &ItemId) -> Option<&DiscoveredItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    pub fn items(&self) -> &[DiscoveredItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(n: usize) -> SelectionSet {
        let mut set = SelectionSet::new();
        set.extend((0..n).map(|i| {
            DiscoveredItem::new(format!("item-{i}"), format!("IMG_{i:04}.jpg"), "sim://preview")
        }));
        set
    }

    fn id(i: usize) -> ItemId {
        ItemId::new(format!("item-{i}"))
    }

    #[test]
    fn test_extend_skips_duplicates() {
        let mut set = set_of(3);
        let added = set.extend(vec![
            DiscoveredItem::new("item-1", "dup.jpg", "sim://dup"),
            DiscoveredItem::new("item-9", "new.jpg", "sim://new"),
        ]);
        assert_eq!(added, 1);
        assert_eq!(set.len(), 4);
        assert_eq!(set.get(&id(1)).unwrap().name, "IMG_0001.jpg");
    }

    #[test]
    fn test_toggle_flips_one_item() {
        let mut set = set_of(3);
        assert!(set.toggle(&id(1)));
        assert!(set.is_selected(&id(1)));
        assert!(!set.is_selected(&id(0)));
        assert!(!set.is_selected(&id(2)));
        assert_eq!(set.count(), 1);
    }

    #[test]
    fn test_toggle_unknown_id_is_noop() {
        let mut set = set_of(2);
        set.toggle(&id(0));
        let before = set.clone();
        assert!(!set.toggle(&ItemId::new("missing")));
        assert_eq!(set, before);
    }

    #[test]
    fn test_toggle_parity_independent_of_other_ids() {
        let mut set = set_of(5);
        // Deterministic interleaving: item i is toggled (i + 1) * 3 times
        let mut calls = Vec::new();
        for round in 0..15 {
            for i in 0..5 {
                if round < (i + 1) * 3 {
                    calls.push(i);
                }
            }
        }
        for i in &calls {
            set.toggle(&id(*i));
        }

        for i in 0..5 {
            let toggles = calls.iter().filter(|c| **c == i).count();
            assert_eq!(set.is_selected(&id(i)), toggles % 2 == 1, "item {i}");
        }
    }

    #[test]
    fn test_toggle_all_selects_when_partial() {
        let mut set = set_of(4);
        set.toggle(&id(2));
        set.toggle_all();
        assert!(set.is_all_selected());
        assert_eq!(set.count(), 4);
    }

    #[test]
    fn test_toggle_all_twice_from_all_cleared() {
        let mut set = set_of(4);
        set.toggle_all();
        set.toggle_all();
        assert_eq!(set.count(), 0);
    }

    #[test]
    fn test_toggle_all_twice_from_all_selected() {
        let mut set = set_of(4);
        set.toggle_all();
        assert!(set.is_all_selected());
        set.toggle_all();
        set.toggle_all();
        assert!(set.is_all_selected());
    }

    #[test]
    fn test_selected_preserves_order() {
        let mut set = set_of(6);
        set.toggle(&id(4));
        set.toggle(&id(1));
        set.toggle(&id(3));
        let ids: Vec<_> = set.selected().map(|item| item.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["item-1", "item-3", "item-4"]);
    }

    #[test]
    fn test_empty_set() {
        let mut set = SelectionSet::new();
        assert!(!set.is_all_selected());
        set.toggle_all();
        assert_eq!(set.count(), 0);
        assert!(set.is_empty());
    }
}
