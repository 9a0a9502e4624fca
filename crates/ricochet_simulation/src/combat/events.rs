//! Weapon notifications.
//!
//! Два уровня:
//! - `WeaponEvent` + `WeaponObservers` — observer list, которым владеет сам weapon
//!   (порядок эмиссии сохраняется, ноль подписчиков = no-op)
//! - Bevy events (`WeaponFired`, `EnemyHit`, ...) — ECS surface для UI/audio/VFX систем

use std::fmt;

use bevy::prelude::*;

use super::hit::HitResult;

/// Notification от HitScanWeapon
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WeaponEvent {
    /// Каждый успешный выстрел (hit или miss)
    Fired(HitResult),
    /// Только hit по цели с тегом hostile
    EnemyHit(HitResult),
}

impl WeaponEvent {
    pub fn hit(&self) -> &HitResult {
        match self {
            WeaponEvent::Fired(hit) | WeaponEvent::EnemyHit(hit) => hit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&WeaponEvent) + Send + Sync>;

/// Observer list: subscribe/unsubscribe в любой момент, notify в порядке подписки
#[derive(Default)]
pub struct WeaponObservers {
    observers: Vec<(SubscriptionId, Observer)>,
    next_id: u64,
}

impl WeaponObservers {
    pub fn subscribe(&mut self, observer: impl FnMut(&WeaponEvent) + Send + Sync + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(subscription, _)| *subscription != id);
        self.observers.len() != before
    }

    pub fn notify(&mut self, event: &WeaponEvent) {
        for (_, observer) in self.observers.iter_mut() {
            observer(event);
        }
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }
}

impl fmt::Debug for WeaponObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeaponObservers")
            .field("subscribers", &self.observers.len())
            .finish()
    }
}

/// Event: актёр ХОЧЕТ выстрелить (input / AI → simulation).
/// Gate, ray query и урон решаются в `process_fire_intents`.
#[derive(Event, Debug, Clone, Copy)]
pub struct FireIntent {
    pub shooter: Entity,
}

/// Event: выстрел состоялся (hit или miss).
///
/// Луч для VFX рисуется от `muzzle` до `hit.hit_point`; `hit.origin` — точка
/// прицеливания (sightline), они могут расходиться намеренно.
#[derive(Event, Debug, Clone, Copy)]
pub struct WeaponFired {
    pub shooter: Entity,
    pub muzzle: Vec3,
    pub hit: HitResult,
}

/// Event: попадание по hostile цели
#[derive(Event, Debug, Clone, Copy)]
pub struct EnemyHit {
    pub shooter: Entity,
    pub hit: HitResult,
}
