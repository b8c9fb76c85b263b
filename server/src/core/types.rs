// gore_server/server/src/core/types.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Milliseconds on the server's monotonic clock.
pub type Timestamp = u64;

#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self { Vec2 { x, y } }
    pub const fn zero() -> Self { Vec2 { x: 0.0, y: 0.0 } }

    pub fn add(self, other: Vec2) -> Vec2 { Vec2::new(self.x + other.x, self.y + other.y) }
    pub fn scale(self, s: f32) -> Vec2 { Vec2::new(self.x * s, self.y * s) }

    pub fn distance_squared(self, other: Vec2) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Axis-aligned rectangle, `position` is the top-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Rect { x, y, width, height }
    }

    pub fn from_position(position: Vec2, size: Vec2) -> Self {
        Rect::new(position.x, position.y, size.x, size.y)
    }

    pub fn min(&self) -> Vec2 { Vec2::new(self.x, self.y) }
    pub fn max(&self) -> Vec2 { Vec2::new(self.x + self.width, self.y + self.height) }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.x && p.x < self.x + self.width && p.y >= self.y && p.y < self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    pub fn inflate(&self, amount: f32) -> Rect {
        Rect::new(self.x - amount, self.y - amount, self.width + amount * 2.0, self.height + amount * 2.0)
    }
}

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident, $inner:ty) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub $inner);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Index into the world's dense map array.
    MapId, u16
);
id_type!(CharacterId, u64);
id_type!(ItemId, u64);
id_type!(WallId, u64);
id_type!(MapGrhId, u64);
id_type!(ConnectionId, u64);

impl MapId {
    pub fn index(self) -> usize { self.0 as usize }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Left,
    Right,
}

/// Static map geometry. Platforms only block from above.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wall {
    pub id: WallId,
    pub bounds: Rect,
    #[serde(default)]
    pub platform: bool,
}

/// A placed graphic. Indexed for queries, never collides.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapGrh {
    pub id: MapGrhId,
    pub grh: u32,
    pub bounds: Rect,
    #[serde(default)]
    pub foreground: bool,
}

/// World-unique ids for runtime entities.
#[derive(Debug)]
pub struct IdAllocator {
    next_character: AtomicU64,
    next_item: AtomicU64,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator {
            next_character: AtomicU64::new(1),
            next_item: AtomicU64::new(1),
        }
    }

    pub fn next_character(&self) -> CharacterId {
        CharacterId(self.next_character.fetch_add(1, Ordering::Relaxed))
    }

    pub fn next_item(&self) -> ItemId {
        ItemId(self.next_item.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
