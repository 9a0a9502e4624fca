//! Combat system module (hit-scan)
//!
//! ECS ответственность:
//! - Weapon state: FireGate cooldown, stats, observers
//! - Combat rules: nearest-hit ray query, damage через DamageReceiver
//! - Events: WeaponFired, EnemyHit, DamageDealt, EntityDied
//!
//! Визуальный feedback (impact VFX) — `crate::effects`, collision — `crate::collision`.

use bevy::prelude::*;

pub mod damage;
pub mod events;
pub mod gate;
pub mod hit;
pub mod systems;
pub mod weapon;

#[cfg(test)]
mod weapon_tests;

// Re-export основных типов
pub use damage::{DamageDealt, Dead, EntityDied};
pub use events::{EnemyHit, FireIntent, SubscriptionId, WeaponEvent, WeaponFired, WeaponObservers};
pub use gate::FireGate;
pub use hit::{DamageReceiver, HitResult, HitTarget, TargetRegistry};
pub use systems::process_fire_intents;
pub use weapon::{AimState, FireContext, FireStats, HitScanWeapon, WeaponConfig};

use crate::collision::{sync_collision_world, CollisionWorld};
use crate::config::CombatConfig;
use crate::effects::{prewarm_impact_pools, tick_impact_effects, EffectSpawner};
use crate::pool::PoolRegistry;
use crate::timer::{advance_combat_clock, CombatClock};
use crate::DeterministicRng;

/// Combat Plugin
///
/// Регистрирует combat системы в FixedUpdate.
///
/// Порядок выполнения:
/// 1. advance_combat_clock — combat время (gate, auto-return)
/// 2. sync_collision_world — снимок colliders до выстрелов
/// 3. process_fire_intents — FireIntent → выстрел → урон → события
/// 4. tick_impact_effects — auto-return истёкших VFX
///
/// EffectSpawner собирается из `CombatConfig` (если resource вставлен до плагина).
pub struct CombatPlugin;

impl Plugin for CombatPlugin {
    fn build(&self, app: &mut App) {
        let config = app.world().get_resource::<CombatConfig>().cloned().unwrap_or_default();

        // Spread детерминирован только при seeded RNG
        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(config.seed));
        }

        // Регистрация событий
        app.add_event::<FireIntent>()
            .add_event::<WeaponFired>()
            .add_event::<EnemyHit>()
            .add_event::<DamageDealt>()
            .add_event::<EntityDied>();

        app.init_resource::<CombatClock>()
            .init_resource::<CollisionWorld>()
            .init_resource::<PoolRegistry>()
            .insert_resource(EffectSpawner::from_config(&config));

        app.add_systems(Startup, prewarm_impact_pools);

        app.add_systems(
            FixedUpdate,
            (
                advance_combat_clock,
                sync_collision_world,
                process_fire_intents,
                tick_impact_effects,
            )
                .chain(), // Последовательное выполнение
        );
    }
}
