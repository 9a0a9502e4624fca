//! RICOCHET Simulation Core
//!
//! Hit-scan боевой pipeline на Bevy 0.16 (headless):
//! - pool: GenericPool + PoolRegistry (переиспользование VFX инстансов)
//! - timer: CombatClock + AutoReturnTimer (scheduled release)
//! - combat: HitScanWeapon (FireGate → raycast → урон → события)
//! - effects: EffectSpawner (impact VFX из пулов, auto-return)
//! - collision: CollisionQuery + headless CollisionWorld

use bevy::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// Публичные модули
pub mod collision;
pub mod combat;
pub mod components;
pub mod config;
pub mod effects;
pub mod logger;
pub mod pool;
pub mod timer;

// Re-export базовых типов для удобства
pub use collision::{Collider, CollisionQuery, CollisionWorld, LayerMask, RayHit, RayQuery};
pub use combat::{
    AimState, CombatPlugin, DamageDealt, DamageReceiver, Dead, EnemyHit, EntityDied, FireIntent, HitResult,
    HitScanWeapon, WeaponConfig, WeaponEvent, WeaponFired,
};
pub use components::*;
pub use config::{CombatConfig, ConfigError};
pub use effects::{EffectSpawner, ImpactEffect, ImpactPrototype};
pub use logger::init_logger;
pub use pool::{GenericPool, PoolConfig, PoolHandle, PoolRegistry};
pub use timer::{AutoReturnTimer, CombatClock};

/// Главный plugin симуляции (объединяет все подсистемы)
#[derive(Default)]
pub struct SimulationPlugin {
    pub config: CombatConfig,
}

impl SimulationPlugin {
    pub fn new(config: CombatConfig) -> Self {
        Self { config }
    }
}

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        // create_headless_app мог уже задать seed — не перетираем
        if !app.world().contains_resource::<DeterministicRng>() {
            app.insert_resource(DeterministicRng::new(self.config.seed));
        }

        app
            // Fixed timestep 60Hz для simulation tick (легче считать интервалы)
            .insert_resource(Time::<Fixed>::from_hz(60.0))
            .insert_resource(self.config.clone())
            // Подсистемы
            .add_plugins(CombatPlugin);
    }
}

/// Детерминистичный RNG resource (seeded)
#[derive(Resource)]
pub struct DeterministicRng {
    pub rng: ChaCha8Rng,
    pub seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }
}

/// Создаёт minimal Bevy App для headless симуляции
pub fn create_headless_app(seed: u64) -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .insert_resource(DeterministicRng::new(seed))
        .insert_resource(Time::<Fixed>::from_hz(60.0)); // 60Hz FixedUpdate

    app
}

/// Snapshot мира для сравнения детерминизма
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    // Сортируем по Entity ID для детерминизма
    entities.sort_by_key(|(entity, _)| entity.index());

    // Сериализуем в байты через Debug (простейший способ)
    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
