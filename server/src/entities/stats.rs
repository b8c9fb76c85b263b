// gore_server/server/src/entities/stats.rs
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatKind {
    Hp,
    MaxHp,
    Mp,
    MaxMp,
    Str,
    Def,
}

impl StatKind {
    pub const ALL: [StatKind; 6] = [
        StatKind::Hp,
        StatKind::MaxHp,
        StatKind::Mp,
        StatKind::MaxMp,
        StatKind::Str,
        StatKind::Def,
    ];

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<StatKind> {
        Self::ALL.get(v as usize).copied()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterStats {
    pub hp: i32,
    pub max_hp: i32,
    pub mp: i32,
    pub max_mp: i32,
    pub str: i32,
    pub def: i32,
}

impl Default for CharacterStats {
    fn default() -> Self {
        CharacterStats { hp: 50, max_hp: 50, mp: 50, max_mp: 50, str: 1, def: 1 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatChange {
    pub stat: StatKind,
    pub old: i32,
    pub new: i32,
}

impl CharacterStats {
    pub fn get(&self, stat: StatKind) -> i32 {
        match stat {
            StatKind::Hp => self.hp,
            StatKind::MaxHp => self.max_hp,
            StatKind::Mp => self.mp,
            StatKind::MaxMp => self.max_mp,
            StatKind::Str => self.str,
            StatKind::Def => self.def,
        }
    }

    /// Sets a stat, clamping HP/MP into `0..=max`. Returns the change, or
    /// `None` when the stored value did not move.
    pub fn set(&mut self, stat: StatKind, value: i32) -> Option<StatChange> {
        let value = match stat {
            StatKind::Hp => value.clamp(0, self.max_hp),
            StatKind::Mp => value.clamp(0, self.max_mp),
            _ => value.max(0),
        };
        let old = self.get(stat);
        if old == value {
            return None;
        }
        match stat {
            StatKind::Hp => self.hp = value,
            StatKind::MaxHp => self.max_hp = value,
            StatKind::Mp => self.mp = value,
            StatKind::MaxMp => self.max_mp = value,
            StatKind::Str => self.str = value,
            StatKind::Def => self.def = value,
        }
        Some(StatChange { stat, old, new: value })
    }
}
