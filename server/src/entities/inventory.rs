// gore_server/server/src/entities/inventory.rs
use super::item::{ItemEntity, MAX_STACK};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct Inventory {
    slots: Vec<Option<ItemEntity>>,
}

impl Inventory {
    pub fn new(slot_count: usize) -> Self {
        Inventory { slots: vec![None; slot_count] }
    }

    /// Stacks onto matching items first, then fills empty slots.
    /// Returns whatever did not fit.
    pub fn add(&mut self, mut item: ItemEntity) -> Option<ItemEntity> {
        for existing in self.slots.iter_mut().flatten() {
            if item.amount == 0 {
                break;
            }
            if existing.can_stack_with(&item) && existing.amount < MAX_STACK {
                let moved = (MAX_STACK - existing.amount).min(item.amount);
                existing.amount += moved;
                item.amount -= moved;
            }
        }
        if item.amount == 0 {
            return None;
        }
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(item);
                None
            }
            None => Some(item),
        }
    }

    pub fn remove(&mut self, slot: usize) -> Option<ItemEntity> {
        self.slots.get_mut(slot)?.take()
    }

    pub fn get(&self, slot: usize) -> Option<&ItemEntity> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn items(&self) -> impl Iterator<Item = &ItemEntity> {
        self.slots.iter().flatten()
    }

    pub fn take_all(&mut self) -> Vec<ItemEntity> {
        self.slots.iter_mut().filter_map(Option::take).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EquipSlot {
    Weapon,
    Body,
    Head,
}

#[derive(Clone, Debug, Default)]
pub struct Equipped {
    slots: BTreeMap<EquipSlot, ItemEntity>,
}

impl Equipped {
    /// Returns the item previously in the slot.
    pub fn equip(&mut self, slot: EquipSlot, item: ItemEntity) -> Option<ItemEntity> {
        self.slots.insert(slot, item)
    }

    pub fn unequip(&mut self, slot: EquipSlot) -> Option<ItemEntity> {
        self.slots.remove(&slot)
    }

    pub fn get(&self, slot: EquipSlot) -> Option<&ItemEntity> {
        self.slots.get(&slot)
    }

    pub fn take_all(&mut self) -> Vec<ItemEntity> {
        std::mem::take(&mut self.slots).into_values().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ItemId;

    #[test]
    fn stacks_before_using_new_slots() {
        let mut inv = Inventory::new(2);
        assert!(inv.add(ItemEntity::new(ItemId(1), "potion", 90)).is_none());
        assert!(inv.add(ItemEntity::new(ItemId(2), "Potion", 20)).is_none());
        let amounts: Vec<u8> = inv.items().map(|i| i.amount).collect();
        assert_eq!(amounts, vec![99, 11]);
    }

    #[test]
    fn full_inventory_returns_remainder() {
        let mut inv = Inventory::new(1);
        inv.add(ItemEntity::new(ItemId(1), "sword", 1));
        let rest = inv.add(ItemEntity::new(ItemId(2), "shield", 1));
        assert_eq!(rest.map(|i| i.name), Some("shield".to_string()));
    }

    #[test]
    fn take_all_empties_both_containers() {
        let mut inv = Inventory::new(4);
        inv.add(ItemEntity::new(ItemId(1), "a", 1));
        let mut eq = Equipped::default();
        eq.equip(EquipSlot::Weapon, ItemEntity::new(ItemId(2), "b", 1));
        assert_eq!(inv.take_all().len() + eq.take_all().len(), 2);
        assert!(inv.is_empty() && eq.is_empty());
    }
}
