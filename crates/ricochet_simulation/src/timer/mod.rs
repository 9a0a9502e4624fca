//! Per-tick timers: `CombatClock` + `AutoReturnTimer`.
//!
//! Никаких OS callbacks и скрытых suspension points: deadlines хранятся в
//! упорядоченной очереди и дренируются раз в fixed tick, строго по порядку.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::time::Duration;

use bevy::prelude::*;

/// Время боевой симуляции (монотонное, продвигается раз в FixedUpdate tick)
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CombatClock {
    elapsed: Duration,
    delta: Duration,
    tick: u64,
}

impl CombatClock {
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// Delta последнего tick
    pub fn delta(&self) -> Duration {
        self.delta
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn advance(&mut self, delta: Duration) {
        self.elapsed = self.elapsed.saturating_add(delta);
        self.delta = delta;
        self.tick = self.tick.wrapping_add(1);
    }

    /// Жёстко выставить время (replay, тесты)
    pub fn set_elapsed(&mut self, elapsed: Duration) {
        self.delta = elapsed.saturating_sub(self.elapsed);
        self.elapsed = elapsed;
    }
}

/// System: продвигает CombatClock (FixedUpdate, запускается ПЕРВЫМ)
pub fn advance_combat_clock(time: Res<Time>, mut clock: ResMut<CombatClock>) {
    clock.advance(time.delta());
}

/// Секунды из config → Duration (с точностью до микросекунды).
///
/// Отрицательные / NaN / inf → `None`.
pub fn secs_to_duration(secs: f32) -> Option<Duration> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::from_micros((secs as f64 * 1_000_000.0).round() as u64))
}

type ExpireCallback<K, C> = Box<dyn FnOnce(K, &mut C) + Send + Sync>;

/// (deadline, sequence) — sequence разрывает ничьи в порядке планирования
type Slot = (Duration, u64);

struct ScheduledReturn<K, C> {
    key: K,
    on_expire: ExpireCallback<K, C>,
}

/// Auto-return таймеры для pooled инстансов.
///
/// - `schedule` армирует deadline `now + duration`; повторный schedule того же
///   ключа ЗАМЕНЯЕТ deadline (без stacking)
/// - `tick(now)` вызывает `on_expire` ровно один раз для каждого истёкшего
///   ключа, в порядке deadline
/// - `cancel` разоружает без вызова callback (идемпотентно)
///
/// `C` — контекст, который получает callback (обычно `PoolRegistry`).
pub struct AutoReturnTimer<K, C> {
    queue: BTreeMap<Slot, ScheduledReturn<K, C>>,
    armed: HashMap<K, Slot>,
    next_sequence: u64,
}

impl<K, C> Default for AutoReturnTimer<K, C> {
    fn default() -> Self {
        Self {
            queue: BTreeMap::new(),
            armed: HashMap::new(),
            next_sequence: 0,
        }
    }
}

impl<K, C> AutoReturnTimer<K, C>
where
    K: Copy + Eq + Hash,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Армирует (или переармирует) таймер, возвращает deadline
    pub fn schedule(
        &mut self,
        key: K,
        now: Duration,
        duration: Duration,
        on_expire: impl FnOnce(K, &mut C) + Send + Sync + 'static,
    ) -> Duration {
        if let Some(previous) = self.armed.remove(&key) {
            self.queue.remove(&previous);
        }

        let deadline = now.saturating_add(duration);
        let slot = (deadline, self.next_sequence);
        self.next_sequence = self.next_sequence.wrapping_add(1);

        self.queue.insert(
            slot,
            ScheduledReturn {
                key,
                on_expire: Box::new(on_expire),
            },
        );
        self.armed.insert(key, slot);
        deadline
    }

    /// Разоружает без callback. `false` — таймер и так не был армирован.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.armed.remove(key) {
            Some(slot) => {
                self.queue.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Дренирует все истёкшие (`now ≥ deadline`) таймеры, возвращает сколько сработало
    pub fn tick(&mut self, now: Duration, ctx: &mut C) -> usize {
        let mut fired = 0;

        while let Some(entry) = self.queue.first_entry() {
            if entry.key().0 > now {
                break;
            }

            let scheduled = entry.remove();
            self.armed.remove(&scheduled.key);
            (scheduled.on_expire)(scheduled.key, ctx);
            fired += 1;
        }

        fired
    }

    pub fn is_armed(&self, key: &K) -> bool {
        self.armed.contains_key(key)
    }

    pub fn deadline(&self, key: &K) -> Option<Duration> {
        self.armed.get(key).map(|(deadline, _)| *deadline)
    }

    /// Ближайший deadline среди армированных
    pub fn next_deadline(&self) -> Option<Duration> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    pub fn len(&self) -> usize {
        self.armed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.armed.is_empty()
    }
}

impl<K, C> fmt::Debug for AutoReturnTimer<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoReturnTimer")
            .field("armed", &self.armed.len())
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}
