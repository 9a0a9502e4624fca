//! Damage events + death handling.
//!
//! Урон применяет сам weapon через `DamageReceiver` (Health). Здесь только
//! ECS-поверхность: события для UI/звука и маркер смерти.

use bevy::prelude::*;

/// Событие: урон нанесен
///
/// Генерируется после применения damage к Health.
/// Используется для UI, звуков, эффектов.
#[derive(Event, Debug, Clone)]
pub struct DamageDealt {
    pub attacker: Entity,
    pub target: Entity,
    pub damage: f32,
    pub impact_point: Vec3,
    pub impact_normal: Vec3,
}

/// Событие: entity умер (health <= 0)
#[derive(Event, Debug, Clone)]
pub struct EntityDied {
    pub entity: Entity,
    pub killer: Option<Entity>,
}

/// Компонент-маркер: entity мертв (Health <= 0)
///
/// Мёртвые не стреляют и не получают урон; collider остаётся
/// (трупы блокируют линию огня).
#[derive(Component, Debug)]
pub struct Dead;
