//! ECS Components для игровых entity
//!
//! - actor: живучесть и отношение (Health, Hostile)
//!
//! Боевые компоненты (HitScanWeapon, AimState) живут в `combat`,
//! Collider — в `collision`.

pub mod actor;

pub use actor::*;
