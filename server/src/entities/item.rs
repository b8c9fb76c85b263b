// gore_server/server/src/entities/item.rs
use crate::core::types::{ItemId, Rect, Timestamp, Vec2};
use serde::{Deserialize, Serialize};

pub const MAX_STACK: u8 = 99;

/// An item instance, either lying on a map or held by a character.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemEntity {
    pub id: ItemId,
    pub name: String,
    pub amount: u8,
    pub position: Vec2,
    pub size: Vec2,
    /// Set while the item lies on a map with an expiry pending.
    #[serde(default)]
    pub dropped_at: Option<Timestamp>,
}

impl ItemEntity {
    pub fn new(id: ItemId, name: impl Into<String>, amount: u8) -> Self {
        ItemEntity {
            id,
            name: name.into(),
            amount: amount.max(1),
            position: Vec2::zero(),
            size: Vec2::new(16.0, 16.0),
            dropped_at: None,
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::from_position(self.position, self.size)
    }

    pub fn is_expired(&self, now: Timestamp, lifetime_ms: u64) -> bool {
        lifetime_ms > 0 && self.dropped_at.map_or(false, |t| now >= t + lifetime_ms)
    }

    pub fn can_stack_with(&self, other: &ItemEntity) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }
}
