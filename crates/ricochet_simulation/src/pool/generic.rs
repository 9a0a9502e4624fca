//! GenericPool<T> — capacity-aware free-list переиспользуемых инстансов.
//!
//! Каждый слот (`PoolEntry`) всегда ровно в одном состоянии: Available или Active.
//! Вызывающий код получает `PoolHandle`, а не сам объект — пул единственный
//! владелец lifecycle (construction, activation flag, destruction).
//!
//! Политика:
//! - reuse-first: `acquire` НЕ конструирует, пока есть Available инстанс
//! - exhaustion (non-expandable / max_size) → `None`, не ошибка
//! - release чужого/уже отпущенного handle → log + no-op

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::PrototypeId;
use crate::config::ConfigError;
use crate::logger;

static NEXT_POOL_ID: AtomicU32 = AtomicU32::new(1);

/// Уникальный id пула внутри процесса (для отсечения чужих handles)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId(u32);

impl PoolId {
    fn next() -> Self {
        Self(NEXT_POOL_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Borrow одного Active инстанса.
///
/// `generation` растёт при каждом release слота, поэтому устаревший handle
/// (double release, release после переиспользования) распознаётся как чужой.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolHandle {
    pool: PoolId,
    index: u32,
    generation: u32,
}

impl PoolHandle {
    pub fn pool(&self) -> PoolId {
        self.pool
    }

    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// Конфигурация пула
///
/// Инвариант: `initial_size ≤ max_size` когда `max_size > 0` (0 = unbounded).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Reflect)]
#[serde(default)]
pub struct PoolConfig {
    /// Сколько инстансов создать при pre-warm
    pub initial_size: u32,

    /// Жёсткий потолок TotalCount (0 = без ограничения)
    pub max_size: u32,

    /// Можно ли конструировать новые инстансы при overflow
    pub expandable: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 10,
            max_size: 0,
            expandable: true,
        }
    }
}

impl PoolConfig {
    pub fn new(initial_size: u32, max_size: u32, expandable: bool) -> Self {
        Self {
            initial_size,
            max_size,
            expandable,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.max_size > 0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.is_bounded() && self.initial_size > self.max_size {
            return Err(ConfigError::PoolBounds {
                initial: self.initial_size,
                max: self.max_size,
            });
        }
        Ok(())
    }
}

/// Hooks, через которые пул управляет состоянием инстанса
pub trait Poolable: Send + Sync + 'static {
    /// Instance переходит в Active (после `place`, если он был)
    fn on_activate(&mut self) {}

    /// Instance возвращается в Available
    fn on_deactivate(&mut self) {}

    fn place(&mut self, _position: Vec3, _rotation: Quat) {}
}

/// Прототип, из которого пул конструирует инстансы.
///
/// `id()` — identity прототипа для `PoolRegistry` (один пул на (T, prototype)).
pub trait Prototype: Send + Sync + 'static {
    type Instance: Poolable;

    fn id(&self) -> PrototypeId;

    fn instantiate(&self) -> Self::Instance;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Available,
    Active,
}

#[derive(Debug)]
struct PoolEntry<T> {
    instance: T,
    state: EntryState,
    generation: u32,
}

/// Счётчики пула (observability + reuse-first проверки)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Всего сконструировано (pre-warm включительно)
    pub constructed: u64,
    pub acquired: u64,
    pub released: u64,
    /// Acquire вернул None из-за capacity
    pub exhausted: u64,
    /// Release с чужим/устаревшим handle
    pub rejected_releases: u64,
}

pub struct GenericPool<T: Poolable> {
    id: PoolId,
    config: PoolConfig,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    entries: Vec<PoolEntry<T>>,
    /// FIFO: первым переиспользуется давно отпущенный инстанс
    available: VecDeque<u32>,
    active_count: usize,
    stats: PoolStats,
    cleared: bool,
}

impl<T: Poolable> GenericPool<T> {
    /// Создаёт пул и сразу делает pre-warm `initial_size` инстансов.
    ///
    /// Невалидный config (initial > max) не фейлит: pre-warm обрезается до `max_size`.
    pub fn new(factory: impl Fn() -> T + Send + Sync + 'static, config: PoolConfig) -> Self {
        let mut pool = Self {
            id: PoolId::next(),
            config,
            factory: Box::new(factory),
            entries: Vec::new(),
            available: VecDeque::new(),
            active_count: 0,
            stats: PoolStats::default(),
            cleared: false,
        };

        if let Err(err) = config.validate() {
            logger::log_warning(&format!("Pool {:?}: {} — pre-warm clamped", pool.id, err));
        }

        let prewarm = if config.is_bounded() {
            config.initial_size.min(config.max_size)
        } else {
            config.initial_size
        };

        pool.entries.reserve(prewarm as usize);
        for _ in 0..prewarm {
            pool.construct();
        }

        pool
    }

    pub fn from_prototype<P>(prototype: &P, config: PoolConfig) -> Self
    where
        P: Prototype<Instance = T> + Clone,
    {
        let prototype = prototype.clone();
        Self::new(move || prototype.instantiate(), config)
    }

    pub fn id(&self) -> PoolId {
        self.id
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Берёт инстанс: сначала reuse, потом (если можно) construction.
    ///
    /// `None` — пул исчерпан (или cleared); это сигнал, не ошибка.
    pub fn acquire(&mut self) -> Option<PoolHandle> {
        self.acquire_with(|_| {})
    }

    /// Как `acquire`, но позиционирует инстанс ДО активации
    pub fn acquire_at(&mut self, position: Vec3, rotation: Quat) -> Option<PoolHandle> {
        self.acquire_with(|instance| instance.place(position, rotation))
    }

    fn acquire_with(&mut self, prepare: impl FnOnce(&mut T)) -> Option<PoolHandle> {
        if self.cleared {
            logger::log_warning(&format!("Pool {:?}: acquire after clear ignored", self.id));
            return None;
        }

        let index = match self.available.pop_front() {
            Some(index) => index,
            None if self.can_expand() => self.construct_detached(),
            None => {
                self.stats.exhausted += 1;
                logger::log(&format!(
                    "Pool {:?} exhausted: {} active, max_size {}, expandable {}",
                    self.id, self.active_count, self.config.max_size, self.config.expandable
                ));
                return None;
            }
        };

        let entry = &mut self.entries[index as usize];
        debug_assert_eq!(entry.state, EntryState::Available);

        prepare(&mut entry.instance);
        entry.state = EntryState::Active;
        entry.instance.on_activate();

        self.active_count += 1;
        self.stats.acquired += 1;

        Some(PoolHandle {
            pool: self.id,
            index,
            generation: entry.generation,
        })
    }

    /// Возвращает инстанс в пул.
    ///
    /// Handle, который этот пул сейчас НЕ считает Active (double release,
    /// чужой пул, устаревшая generation) → log + `false`, счётчики не меняются.
    pub fn release(&mut self, handle: PoolHandle) -> bool {
        if !self.is_active_handle(handle) {
            self.stats.rejected_releases += 1;
            logger::log_warning(&format!(
                "Pool {:?}: ignored release of {:?} (not active in this pool)",
                self.id, handle
            ));
            return false;
        }

        let entry = &mut self.entries[handle.index as usize];
        entry.instance.on_deactivate();
        entry.state = EntryState::Available;
        entry.generation = entry.generation.wrapping_add(1);

        self.available.push_back(handle.index);
        self.active_count -= 1;
        self.stats.released += 1;
        true
    }

    /// Отпускает все Active инстансы, возвращает сколько отпущено
    pub fn release_all(&mut self) -> usize {
        // Snapshot: release мутирует состояние слотов
        let active: Vec<PoolHandle> = self.active_handles().collect();
        active.into_iter().filter(|&handle| self.release(handle)).count()
    }

    /// Уничтожает все инстансы (Available и Active). Пул после этого неработоспособен.
    pub fn clear(&mut self) {
        if self.cleared {
            return;
        }

        logger::log_info(&format!(
            "Pool {:?}: cleared ({} instances, {} were active)",
            self.id,
            self.entries.len(),
            self.active_count
        ));

        self.entries.clear();
        self.available.clear();
        self.active_count = 0;
        self.cleared = true;
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn total_count(&self) -> usize {
        self.entries.len()
    }

    /// true если немедленный `acquire` вернёт инстанс
    pub fn has_available(&self) -> bool {
        !self.cleared && (!self.available.is_empty() || self.can_expand())
    }

    pub fn is_active_handle(&self, handle: PoolHandle) -> bool {
        handle.pool == self.id
            && !self.cleared
            && self
                .entries
                .get(handle.index as usize)
                .is_some_and(|entry| {
                    entry.state == EntryState::Active && entry.generation == handle.generation
                })
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        if !self.is_active_handle(handle) {
            return None;
        }
        self.entries.get(handle.index as usize).map(|entry| &entry.instance)
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        if !self.is_active_handle(handle) {
            return None;
        }
        self.entries
            .get_mut(handle.index as usize)
            .map(|entry| &mut entry.instance)
    }

    pub fn active_handles(&self) -> impl Iterator<Item = PoolHandle> + '_ {
        let pool = self.id;
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.state == EntryState::Active)
            .map(move |(index, entry)| PoolHandle {
                pool,
                index: index as u32,
                generation: entry.generation,
            })
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (PoolHandle, &T)> + '_ {
        let pool = self.id;
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.state == EntryState::Active)
            .map(move |(index, entry)| {
                let handle = PoolHandle {
                    pool,
                    index: index as u32,
                    generation: entry.generation,
                };
                (handle, &entry.instance)
            })
    }

    pub fn iter_active_mut(&mut self) -> impl Iterator<Item = (PoolHandle, &mut T)> + '_ {
        let pool = self.id;
        self.entries
            .iter_mut()
            .enumerate()
            .filter(|(_, entry)| entry.state == EntryState::Active)
            .map(move |(index, entry)| {
                let handle = PoolHandle {
                    pool,
                    index: index as u32,
                    generation: entry.generation,
                };
                (handle, &mut entry.instance)
            })
    }

    /// Состояние слота (для проверок partition-инварианта)
    pub fn entry_state(&self, index: usize) -> Option<EntryState> {
        self.entries.get(index).map(|entry| entry.state)
    }

    fn can_expand(&self) -> bool {
        self.config.expandable
            && (!self.config.is_bounded() || self.total_count() < self.config.max_size as usize)
    }

    /// Pre-warm: новый слот сразу в Available
    fn construct(&mut self) {
        let index = self.construct_detached();
        self.available.push_back(index);
    }

    /// Новый слот в состоянии Available, но НЕ в free-list (сразу уйдёт в acquire)
    fn construct_detached(&mut self) -> u32 {
        let index = self.entries.len() as u32;
        self.entries.push(PoolEntry {
            instance: (self.factory)(),
            state: EntryState::Available,
            generation: 0,
        });
        self.stats.constructed += 1;
        index
    }
}

impl<T: Poolable> fmt::Debug for GenericPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericPool")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("available", &self.available.len())
            .field("active", &self.active_count)
            .field("total", &self.entries.len())
            .field("cleared", &self.cleared)
            .finish_non_exhaustive()
    }
}
