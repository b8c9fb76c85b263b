// gore_server/server/src/systems/ai/strategies.rs
use super::{AiAction, AiStrategy, AiView};
use crate::core::constants::MELEE_RANGE;
use crate::core::types::{Direction, Timestamp};
use crate::entities::character::Character;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Stands still.
#[derive(Debug, Default)]
pub struct IdleAi;

impl AiStrategy for IdleAi {
    fn name(&self) -> &'static str {
        "idle"
    }

    fn update(&mut self, _actor: &Character, _view: &AiView<'_>) -> AiAction {
        AiAction::Idle
    }
}

/// Picks a random direction every few seconds, with the odd jump.
#[derive(Debug)]
pub struct WanderAi {
    rng: StdRng,
    next_decision: Timestamp,
}

impl WanderAi {
    pub fn new(seed: u64) -> Self {
        WanderAi { rng: StdRng::seed_from_u64(seed), next_decision: 0 }
    }

    fn decide(&mut self, now: Timestamp) -> AiAction {
        if now < self.next_decision {
            return AiAction::Idle;
        }
        self.next_decision = now + self.rng.gen_range(1000..3000);
        match self.rng.gen_range(0..10) {
            0..=2 => AiAction::Move(Direction::Left),
            3..=5 => AiAction::Move(Direction::Right),
            6 => AiAction::Jump,
            _ => AiAction::Stop,
        }
    }
}

impl AiStrategy for WanderAi {
    fn name(&self) -> &'static str {
        "wander"
    }

    fn update(&mut self, _actor: &Character, view: &AiView<'_>) -> AiAction {
        self.decide(view.now)
    }
}

/// Chases and attacks the nearest user in sight, wanders otherwise.
#[derive(Debug)]
pub struct AggressiveAi {
    wander: WanderAi,
    sight: f32,
}

impl AggressiveAi {
    pub fn new(seed: u64) -> Self {
        AggressiveAi { wander: WanderAi::new(seed), sight: 300.0 }
    }
}

impl AiStrategy for AggressiveAi {
    fn name(&self) -> &'static str {
        "aggressive"
    }

    fn update(&mut self, actor: &Character, view: &AiView<'_>) -> AiAction {
        let me = actor.center();
        let Some((_, target)) = view.nearest_user(me, self.sight) else {
            return self.wander.decide(view.now);
        };
        let dx = target.x - me.x;
        let facing = if dx < 0.0 { Direction::Left } else { Direction::Right };
        if dx.abs() <= actor.size.x * 0.5 + MELEE_RANGE {
            if actor.heading != facing {
                return AiAction::Move(facing);
            }
            return AiAction::Attack;
        }
        AiAction::Move(facing)
    }
}
