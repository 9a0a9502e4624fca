//! HitScanWeapon — rate-gated raycast оружие.
//!
//! Pipeline `try_fire`:
//! 1. FireGate закрыт → `false`, НИКАКИХ side effects
//! 2. origin/direction из sightline (AimState); нет aim → muzzle forward
//! 3. один nearest-hit raycast в пределах `max_range`
//! 4. HitResult (miss = полноценный детерминированный результат)
//! 5. урон через DamageReceiver (если capability есть)
//! 6. `Fired` всегда, `EnemyHit` только по hostile
//! 7. impact VFX в точке hit
//!
//! Sightline origin и muzzle намеренно развязаны: луч прицеливания идёт от
//! камеры, визуальный beam рисуется от muzzle до `hit_point`.

use std::f32::consts::TAU;
use std::time::Duration;

use bevy::prelude::*;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use super::events::{SubscriptionId, WeaponEvent, WeaponObservers};
use super::gate::FireGate;
use super::hit::{HitResult, TargetRegistry};
use crate::collision::{CollisionQuery, LayerMask, RayQuery, COLLISION_MASK_HITSCAN};
use crate::config::ConfigError;
use crate::effects::ImpactSink;
use crate::logger;

/// Параметры оружия (из внешнего config)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct WeaponConfig {
    /// Cooldown между выстрелами (секунды)
    pub fire_rate: f32,

    /// Дальность луча (метры)
    pub max_range: f32,

    /// Урон за попадание
    pub damage: f32,

    /// Collision mask для ray query
    pub target_filter: LayerMask,

    /// Half-angle конуса разброса (радианы, 0 = идеально точно)
    pub spread: f32,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self::rifle()
    }
}

impl WeaponConfig {
    pub fn rifle() -> Self {
        Self {
            fire_rate: 0.15,
            max_range: 100.0,
            damage: 25.0,
            target_filter: COLLISION_MASK_HITSCAN,
            spread: 0.0,
        }
    }

    pub fn pistol() -> Self {
        Self {
            fire_rate: 0.4,
            max_range: 50.0,
            damage: 35.0,
            target_filter: COLLISION_MASK_HITSCAN,
            spread: 0.01,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("fire_rate", self.fire_rate),
            ("max_range", self.max_range),
            ("damage", self.damage),
            ("spread", self.spread),
        ];

        for (field, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidWeapon { field, value });
            }
        }
        Ok(())
    }
}

/// Sightline наблюдателя (камера игрока / глаза AI).
///
/// Отсутствие компонента → weapon стреляет по своему muzzle forward.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct AimState {
    pub sightline: Ray3d,
}

impl AimState {
    pub fn new(origin: Vec3, direction: Dir3) -> Self {
        Self {
            sightline: Ray3d::new(origin, direction),
        }
    }

    /// Sightline из камеры, смотрящей на точку
    pub fn looking_at(origin: Vec3, target: Vec3) -> Option<Self> {
        Dir3::new(target - origin)
            .ok()
            .map(|direction| Self::new(origin, direction))
    }
}

/// Счётчики выстрелов
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FireStats {
    pub shots_fired: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Всё, что нужно одному выстрелу от окружения
pub struct FireContext<'a> {
    pub now: Duration,

    /// World-space muzzle: позиция + fixed forward оружия
    pub muzzle: Ray3d,

    /// Sightline (None → fallback на `muzzle`)
    pub aim: Option<Ray3d>,

    /// Стрелок (исключается из ray query)
    pub shooter: Option<Entity>,

    pub collision: &'a dyn CollisionQuery,
    pub targets: &'a mut dyn TargetRegistry,
    pub impacts: Option<&'a mut dyn ImpactSink>,

    /// RNG для spread (None → spread игнорируется)
    pub rng: Option<&'a mut ChaCha8Rng>,
}

#[derive(Component, Debug)]
pub struct HitScanWeapon {
    config: WeaponConfig,
    gate: FireGate,

    /// Muzzle offset относительно Transform владельца
    pub muzzle_offset: Vec3,

    /// Fixed forward оружия в локальных координатах владельца
    pub forward: Dir3,

    stats: FireStats,
    outbox: Vec<WeaponEvent>,
    observers: WeaponObservers,
}

impl Default for HitScanWeapon {
    fn default() -> Self {
        Self::new(WeaponConfig::default())
    }
}

impl HitScanWeapon {
    pub fn new(config: WeaponConfig) -> Self {
        Self {
            config,
            gate: FireGate::new(config.fire_rate),
            muzzle_offset: Vec3::ZERO,
            forward: Dir3::NEG_Z,
            stats: FireStats::default(),
            outbox: Vec::new(),
            observers: WeaponObservers::default(),
        }
    }

    pub fn with_muzzle_offset(mut self, offset: Vec3) -> Self {
        self.muzzle_offset = offset;
        self
    }

    pub fn config(&self) -> &WeaponConfig {
        &self.config
    }

    /// Новый config; уже идущий cooldown не сбрасывается
    pub fn set_config(&mut self, config: WeaponConfig) {
        self.gate.set_fire_rate(config.fire_rate);
        self.config = config;
    }

    pub fn gate(&self) -> &FireGate {
        &self.gate
    }

    pub fn stats(&self) -> FireStats {
        self.stats
    }

    pub fn is_ready(&self, now: Duration) -> bool {
        self.gate.is_open(now)
    }

    /// Weapon swap / respawn: следующий выстрел без cooldown
    pub fn reset_cooldown(&mut self) {
        self.gate.reset();
    }

    /// World-space muzzle ray для владельца с данным Transform
    pub fn muzzle_ray(&self, owner: &Transform) -> Ray3d {
        Ray3d::new(owner.transform_point(self.muzzle_offset), owner.rotation * self.forward)
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&WeaponEvent) + Send + Sync + 'static) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Забирает notifications последнего выстрела в порядке эмиссии.
    ///
    /// Outbox хранит только последний выстрел: каждый прошедший gate `try_fire`
    /// его перезаписывает, поэтому без `drain_events` он не растёт.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, WeaponEvent> {
        self.outbox.drain(..)
    }

    pub fn pending_events(&self) -> &[WeaponEvent] {
        &self.outbox
    }

    /// Пытается выстрелить. `false` — gate закрыт (это не ошибка, а steady state).
    pub fn try_fire(&mut self, ctx: FireContext<'_>) -> bool {
        if !self.gate.try_pass(ctx.now) {
            return false;
        }
        self.outbox.clear();

        let FireContext {
            now,
            muzzle,
            aim,
            shooter,
            collision,
            targets,
            impacts,
            rng,
        } = ctx;

        let sightline = aim.unwrap_or(muzzle);
        let origin = sightline.origin;
        let direction = match rng {
            // NaN / inf spread из непроверенного config → стреляем без разброса
            Some(rng) if self.config.spread.is_finite() && self.config.spread > 0.0 => {
                apply_spread(sightline.direction, self.config.spread, rng)
            }
            _ => sightline.direction,
        };
        let max_range = self.config.max_range;

        let query = RayQuery {
            origin,
            direction,
            max_distance: max_range,
            layer_mask: self.config.target_filter,
            exclude: shooter,
        };

        // Только ближайший hit в [0, max_range]; всё дальше — miss
        let hit = match collision.raycast(&query) {
            Some(ray_hit) if (0.0..=max_range).contains(&ray_hit.distance) => {
                let target = targets.describe(ray_hit.target);
                HitResult::from_ray_hit(origin, direction, max_range, &ray_hit, target)
            }
            _ => HitResult::miss(origin, direction, max_range),
        };

        if let Some(entity) = hit.damage_target() {
            if let Some(receiver) = targets.damage_receiver(entity) {
                receiver.take_damage(self.config.damage, hit.hit_point, hit.direction);
            }
        }

        self.stats.shots_fired += 1;
        if hit.did_hit {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
        }

        self.emit(WeaponEvent::Fired(hit));
        if hit.is_hostile_hit() {
            self.emit(WeaponEvent::EnemyHit(hit));
        }

        if hit.did_hit {
            if let Some(impacts) = impacts {
                impacts.spawn_impact(hit.hit_point, hit.hit_normal, hit.is_hostile_hit());
            }
        }

        logger::log(&format!(
            "🔫 Shot at {:.3}s: {} (distance {:.1}m, target {:?})",
            now.as_secs_f32(),
            if hit.did_hit { "hit" } else { "miss" },
            hit.hit_distance,
            hit.target.map(|target| target.entity)
        ));

        true
    }

    fn emit(&mut self, event: WeaponEvent) {
        self.observers.notify(&event);
        self.outbox.push(event);
    }
}

/// Случайное отклонение внутри конуса с half-angle `spread`
fn apply_spread(direction: Dir3, spread: f32, rng: &mut ChaCha8Rng) -> Dir3 {
    let angle = rng.gen_range(0.0..spread);
    let around = rng.gen_range(0.0..TAU);

    let (u, v) = direction.any_orthonormal_pair();
    let offset = (u * around.cos() + v * around.sin()) * angle.sin();
    Dir3::new(*direction * angle.cos() + offset).unwrap_or(direction)
}
