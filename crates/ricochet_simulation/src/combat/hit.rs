//! HitResult + damage capability.
//!
//! Capability цели резолвится ОДИН раз в момент ray query и кладётся в
//! `HitResult::target`. Отсутствие `DamageReceiver` — обычная ветка, не ошибка.

use bevy::prelude::*;

use crate::collision::RayHit;

/// Любой объект с этим capability — валидная цель урона
pub trait DamageReceiver {
    fn take_damage(&mut self, amount: f32, hit_point: Vec3, hit_direction: Dir3);
}

/// Резолвер capabilities по target handle (ECS query, тестовый двойник, ...)
pub trait TargetRegistry {
    /// Что умеет цель (resolve once)
    fn describe(&self, target: Entity) -> HitTarget;

    fn damage_receiver(&mut self, target: Entity) -> Option<&mut dyn DamageReceiver>;
}

/// Цель, в которую попал луч
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HitTarget {
    pub entity: Entity,
    /// Есть DamageReceiver capability
    pub damageable: bool,
    /// Tagged hostile/enemy
    pub hostile: bool,
}

impl HitTarget {
    /// Цель без capabilities (стена, декор)
    pub fn inert(entity: Entity) -> Self {
        Self {
            entity,
            damageable: false,
            hostile: false,
        }
    }
}

/// Результат одного hit-scan выстрела.
///
/// Miss (`did_hit = false`): `hit_point = origin + direction * max_range`,
/// `hit_distance = max_range` — VFX рисует луч на полную дальность.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitResult {
    pub origin: Vec3,
    pub direction: Dir3,
    pub max_range: f32,
    pub did_hit: bool,
    pub hit_point: Vec3,
    pub hit_normal: Dir3,
    pub hit_distance: f32,
    pub target: Option<HitTarget>,
}

impl HitResult {
    pub fn miss(origin: Vec3, direction: Dir3, max_range: f32) -> Self {
        Self {
            origin,
            direction,
            max_range,
            did_hit: false,
            hit_point: origin + *direction * max_range,
            // Нормаль "конца луча" смотрит на стрелка
            hit_normal: -direction,
            hit_distance: max_range,
            target: None,
        }
    }

    pub fn from_ray_hit(origin: Vec3, direction: Dir3, max_range: f32, hit: &RayHit, target: HitTarget) -> Self {
        Self {
            origin,
            direction,
            max_range,
            did_hit: true,
            hit_point: hit.point,
            hit_normal: hit.normal,
            hit_distance: hit.distance,
            target: Some(target),
        }
    }

    pub fn is_hostile_hit(&self) -> bool {
        self.did_hit && self.target.is_some_and(|target| target.hostile)
    }

    /// Цель, которой положен урон (hit + capability)
    pub fn damage_target(&self) -> Option<Entity> {
        self.target
            .filter(|target| self.did_hit && target.damageable)
            .map(|target| target.entity)
    }
}
