//! PoolRegistry — один `GenericPool` на пару (тип инстанса, prototype identity).
//!
//! Не глобальный singleton: registry — обычный `Resource`, который создаётся явно
//! (один на App / сессию). Тесты поднимают изолированные registry.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use super::{GenericPool, PoolConfig, Poolable, Prototype};
use crate::logger;

/// Identity прототипа (например `"impact.default"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PrototypeId(String);

impl PrototypeId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PrototypeId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for PrototypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type-erased доступ к пулу (clear / counts без знания T)
trait ErasedPool: Send + Sync {
    fn clear(&mut self);
    fn active_count(&self) -> usize;
    fn total_count(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Poolable> ErasedPool for GenericPool<T> {
    fn clear(&mut self) {
        GenericPool::clear(self);
    }

    fn active_count(&self) -> usize {
        GenericPool::active_count(self)
    }

    fn total_count(&self) -> usize {
        GenericPool::total_count(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

type PoolKey = (TypeId, PrototypeId);

#[derive(Resource, Default)]
pub struct PoolRegistry {
    pools: HashMap<PoolKey, Box<dyn ErasedPool>>,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Возвращает пул для (T, prototype), создавая (с pre-warm) при первом обращении.
    ///
    /// Повторный вызов с тем же ключом отдаёт ТОТ ЖЕ пул; `config` второго вызова
    /// игнорируется (если отличается — warning). `None` только если под ключом
    /// лежит пул чужого типа (ключ содержит TypeId инстанса, так что на практике недостижимо).
    pub fn get_or_create<P>(&mut self, prototype: &P, config: PoolConfig) -> Option<&mut GenericPool<P::Instance>>
    where
        P: Prototype + Clone,
    {
        let id = prototype.id();
        let key = (TypeId::of::<P::Instance>(), id.clone());

        let erased = self.pools.entry(key).or_insert_with(|| {
            logger::log_info(&format!(
                "PoolRegistry: created pool '{}' (initial {}, max {}, expandable {})",
                id, config.initial_size, config.max_size, config.expandable
            ));
            Box::new(GenericPool::from_prototype(prototype, config))
        });

        let Some(pool) = erased.as_any_mut().downcast_mut::<GenericPool<P::Instance>>() else {
            logger::log_error(&format!("PoolRegistry: pool '{}' holds a different instance type", id));
            return None;
        };

        if pool.config() != config {
            logger::log_warning(&format!(
                "PoolRegistry: pool '{}' already exists with {:?}, requested {:?} ignored",
                id,
                pool.config(),
                config
            ));
        }

        Some(pool)
    }

    pub fn get<T: Poolable>(&self, id: &PrototypeId) -> Option<&GenericPool<T>> {
        self.pools
            .get(&(TypeId::of::<T>(), id.clone()))
            .and_then(|pool| pool.as_any().downcast_ref::<GenericPool<T>>())
    }

    pub fn get_mut<T: Poolable>(&mut self, id: &PrototypeId) -> Option<&mut GenericPool<T>> {
        self.pools
            .get_mut(&(TypeId::of::<T>(), id.clone()))
            .and_then(|pool| pool.as_any_mut().downcast_mut::<GenericPool<T>>())
    }

    pub fn contains<T: Poolable>(&self, id: &PrototypeId) -> bool {
        self.pools.contains_key(&(TypeId::of::<T>(), id.clone()))
    }

    /// Clear + forget пула данного прототипа
    pub fn remove<P: Prototype>(&mut self, prototype: &P) -> bool {
        let key = (TypeId::of::<P::Instance>(), prototype.id());
        match self.pools.remove(&key) {
            Some(mut pool) => {
                pool.clear();
                true
            }
            None => false,
        }
    }

    /// Clear всех пулов. Очищенные пулы неработоспособны, поэтому registry их забывает.
    pub fn clear_all(&mut self) {
        for pool in self.pools.values_mut() {
            pool.clear();
        }
        self.pools.clear();
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Сумма Active инстансов по всем пулам
    pub fn total_active(&self) -> usize {
        self.pools.values().map(|pool| pool.active_count()).sum()
    }

    pub fn total_instances(&self) -> usize {
        self.pools.values().map(|pool| pool.total_count()).sum()
    }
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&PrototypeId> = self.pools.keys().map(|(_, id)| id).collect();
        ids.sort();
        f.debug_struct("PoolRegistry").field("pools", &ids).finish()
    }
}
