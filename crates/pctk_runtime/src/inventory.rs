//! Per-actor inventory: an ordered list of carried objects.
//!
//! Rows are display slots in the control panel. Removal keeps the remaining
//! rows dense, shifting everything behind the removed item down by one.

use crate::object::ObjectId;

#[derive(Default)]
pub struct Inventory {
    items: Vec<(String, ObjectId)>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append an item, returning the row it was assigned.
    pub fn add(&mut self, name: impl Into<String>, object: ObjectId) -> usize {
        self.items.push((name.into(), object));
        self.items.len() - 1
    }

    pub fn contains(&self, object: &ObjectId) -> bool {
        self.items.iter().any(|(_, id)| id == object)
    }

    pub fn row_of(&self, object: &ObjectId) -> Option<usize> {
        self.items.iter().position(|(_, id)| id == object)
    }

    pub fn get(&self, row: usize) -> Option<(&str, &ObjectId)> {
        self.items.get(row).map(|(name, id)| (name.as_str(), id))
    }

    /// Drop an item; rows behind it shift down by one.
    pub fn remove(&mut self, object: &ObjectId) -> bool {
        match self.row_of(object) {
            Some(row) => {
                self.items.remove(row);
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str, &ObjectId)> {
        self.items
            .iter()
            .enumerate()
            .map(|(row, (name, id))| (row, name.as_str(), id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(id: &str) -> ObjectId {
        ObjectId::new(id)
    }

    #[test]
    fn rows_are_assigned_in_insertion_order() {
        let mut inventory = Inventory::new();
        assert_eq!(inventory.add("key", object("key")), 0);
        assert_eq!(inventory.add("rope", object("rope")), 1);
        assert_eq!(inventory.add("lamp", object("lamp")), 2);
        assert_eq!(inventory.row_of(&object("rope")), Some(1));
    }

    #[test]
    fn removal_shifts_higher_rows_down() {
        let mut inventory = Inventory::new();
        for id in ["key", "rope", "lamp", "coin"] {
            inventory.add(id, object(id));
        }
        assert!(inventory.remove(&object("key")));

        // Remaining rows stay densely assigned from zero.
        assert_eq!(inventory.len(), 3);
        assert_eq!(inventory.row_of(&object("rope")), Some(0));
        assert_eq!(inventory.row_of(&object("lamp")), Some(1));
        assert_eq!(inventory.row_of(&object("coin")), Some(2));
    }

    #[test]
    fn rows_are_readable_by_index_and_in_order() {
        let mut inventory = Inventory::new();
        inventory.add("brass key", object("key"));
        inventory.add("rope", object("rope"));

        assert_eq!(inventory.get(0), Some(("brass key", &object("key"))));
        assert_eq!(inventory.get(1), Some(("rope", &object("rope"))));
        assert_eq!(inventory.get(2), None);

        let rows: Vec<(usize, String)> = inventory
            .iter()
            .map(|(row, name, _)| (row, name.to_string()))
            .collect();
        assert_eq!(
            rows,
            vec![(0, "brass key".to_string()), (1, "rope".to_string())]
        );
    }

    #[test]
    fn removing_an_absent_item_is_reported() {
        let mut inventory = Inventory::new();
        inventory.add("key", object("key"));
        assert!(!inventory.remove(&object("rope")));
        assert_eq!(inventory.len(), 1);
    }
}
