//! FireGate — rate gate оружия.
//!
//! Два логических состояния (Ready / Cooling) определяются одним сравнением
//! timestamp'ов, отдельный state enum не нужен.
//!
//! Инвариант: выстрел проходит iff `now ≥ next_allowed`;
//! при успехе `next_allowed := now + fire_rate`.

use std::time::Duration;

use crate::timer::secs_to_duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireGate {
    fire_rate: Duration,
    next_allowed: Duration,
}

impl FireGate {
    /// `fire_rate_secs` < 0 / NaN → gate без cooldown
    pub fn new(fire_rate_secs: f32) -> Self {
        Self {
            fire_rate: secs_to_duration(fire_rate_secs).unwrap_or(Duration::ZERO),
            next_allowed: Duration::ZERO,
        }
    }

    pub fn fire_rate(&self) -> Duration {
        self.fire_rate
    }

    pub fn next_allowed(&self) -> Duration {
        self.next_allowed
    }

    pub fn is_open(&self, now: Duration) -> bool {
        now >= self.next_allowed
    }

    /// Пропускает выстрел и закрывает gate на `fire_rate`.
    ///
    /// Закрытый gate → `false` без каких-либо изменений.
    pub fn try_pass(&mut self, now: Duration) -> bool {
        if !self.is_open(now) {
            return false;
        }
        self.next_allowed = now.saturating_add(self.fire_rate);
        true
    }

    /// Сколько осталось до открытия (ZERO если открыт)
    pub fn remaining(&self, now: Duration) -> Duration {
        self.next_allowed.saturating_sub(now)
    }

    /// Смена fire rate не трогает уже назначенный `next_allowed`
    pub fn set_fire_rate(&mut self, fire_rate_secs: f32) {
        self.fire_rate = secs_to_duration(fire_rate_secs).unwrap_or(Duration::ZERO);
    }

    /// Открывает gate немедленно (weapon swap, respawn)
    pub fn reset(&mut self) {
        self.next_allowed = Duration::ZERO;
    }
}
