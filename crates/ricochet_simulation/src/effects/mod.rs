//! Impact VFX: pooled effects + auto-return.
//!
//! Flow:
//! 1. Weapon резолвит hit → `ImpactSink::spawn_impact(point, normal, hostile)`
//! 2. `EffectSpawner` выбирает пул (hostile → специализированный, fallback → default)
//! 3. `acquire_at` (позиция + ориентация по нормали) → `play()`
//! 4. `AutoReturnTimer` через `effect_duration` вызывает `release`
//!
//! Exhausted пул → spawn молча пропускается. Это штатная деградация при
//! высоком fire rate, выстрел при этом не страдает.

use std::time::Duration;

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::CombatConfig;
use crate::logger;
use crate::pool::{PoolConfig, PoolHandle, PoolRegistry, Poolable, Prototype, PrototypeId};
use crate::timer::{AutoReturnTimer, CombatClock};

pub const IMPACT_GENERIC_ID: &str = "impact.generic";
pub const IMPACT_HOSTILE_ID: &str = "impact.hostile";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Reflect)]
pub enum ImpactKind {
    /// Искры / пыль (стены, нейтральные цели)
    #[default]
    Generic,
    /// Кровь / энергия (hostile цели)
    Hostile,
}

/// Pooled impact effect (presentation state, рендер читает его снаружи)
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactEffect {
    pub kind: ImpactKind,
    pub position: Vec3,
    pub rotation: Quat,
    pub visible: bool,
    pub playing: bool,
    /// Сколько проиграно с последнего `play()`
    pub playback: Duration,
    /// Сколько раз инстанс был проигран (reuse counter)
    pub plays: u32,
}

impl ImpactEffect {
    pub fn new(kind: ImpactKind) -> Self {
        Self {
            kind,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            visible: false,
            playing: false,
            playback: Duration::ZERO,
            plays: 0,
        }
    }

    pub fn play(&mut self) {
        self.playing = true;
        self.playback = Duration::ZERO;
        self.plays += 1;
    }

    pub fn advance(&mut self, delta: Duration) {
        if self.playing {
            self.playback = self.playback.saturating_add(delta);
        }
    }

    /// Ось Y эффекта (направление выброса частиц)
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

impl Poolable for ImpactEffect {
    fn on_activate(&mut self) {
        self.visible = true;
    }

    fn on_deactivate(&mut self) {
        self.visible = false;
        self.playing = false;
        self.playback = Duration::ZERO;
    }

    fn place(&mut self, position: Vec3, rotation: Quat) {
        self.position = position;
        self.rotation = rotation;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImpactPrototype {
    pub id: PrototypeId,
    pub kind: ImpactKind,
}

impl ImpactPrototype {
    pub fn generic() -> Self {
        Self {
            id: PrototypeId::new(IMPACT_GENERIC_ID),
            kind: ImpactKind::Generic,
        }
    }

    pub fn hostile() -> Self {
        Self {
            id: PrototypeId::new(IMPACT_HOSTILE_ID),
            kind: ImpactKind::Hostile,
        }
    }
}

impl Prototype for ImpactPrototype {
    type Instance = ImpactEffect;

    fn id(&self) -> PrototypeId {
        self.id.clone()
    }

    fn instantiate(&self) -> ImpactEffect {
        ImpactEffect::new(self.kind)
    }
}

/// Куда weapon отдаёт resolved hit для визуального feedback
pub trait ImpactSink {
    fn spawn_impact(&mut self, point: Vec3, normal: Dir3, hostile: bool) -> Option<PoolHandle>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpawnStats {
    pub spawned: u64,
    /// Пул исчерпан или прототип не задан
    pub skipped: u64,
    /// Возвращено таймером
    pub returned: u64,
}

#[derive(Resource, Debug)]
pub struct EffectSpawner {
    default_impact: Option<ImpactPrototype>,
    hostile_impact: Option<ImpactPrototype>,
    pool_config: PoolConfig,
    effect_duration: Duration,
    returns: AutoReturnTimer<PoolHandle, PoolRegistry>,
    stats: SpawnStats,
}

impl Default for EffectSpawner {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), PoolConfig::default())
    }
}

impl EffectSpawner {
    pub fn new(effect_duration: Duration, pool_config: PoolConfig) -> Self {
        Self {
            default_impact: Some(ImpactPrototype::generic()),
            hostile_impact: Some(ImpactPrototype::hostile()),
            pool_config,
            effect_duration,
            returns: AutoReturnTimer::new(),
            stats: SpawnStats::default(),
        }
    }

    pub fn from_config(config: &CombatConfig) -> Self {
        Self::new(config.effect_duration(), config.impact_pool)
    }

    pub fn with_default_impact(mut self, prototype: Option<ImpactPrototype>) -> Self {
        self.default_impact = prototype;
        self
    }

    /// `None` → hostile hits используют default пул
    pub fn with_hostile_impact(mut self, prototype: Option<ImpactPrototype>) -> Self {
        self.hostile_impact = prototype;
        self
    }

    pub fn effect_duration(&self) -> Duration {
        self.effect_duration
    }

    pub fn stats(&self) -> SpawnStats {
        self.stats
    }

    /// Сколько эффектов сейчас ждут auto-return
    pub fn pending_returns(&self) -> usize {
        self.returns.len()
    }

    /// Создаёт пулы заранее, чтобы первый hit не конструировал инстансы
    pub fn prewarm(&self, pools: &mut PoolRegistry) {
        for prototype in self.prototypes() {
            pools.get_or_create(prototype, self.pool_config);
        }
    }

    pub fn select_prototype(&self, hostile: bool) -> Option<&ImpactPrototype> {
        if hostile {
            self.hostile_impact.as_ref().or(self.default_impact.as_ref())
        } else {
            self.default_impact.as_ref()
        }
    }

    /// Acquire + place + play + schedule auto-return.
    ///
    /// `None` — spawn пропущен (пул исчерпан / прототип не задан), не ошибка.
    pub fn spawn_impact(
        &mut self,
        pools: &mut PoolRegistry,
        now: Duration,
        point: Vec3,
        normal: Dir3,
        hostile: bool,
    ) -> Option<PoolHandle> {
        let Some(prototype) = self.select_prototype(hostile).cloned() else {
            self.stats.skipped += 1;
            logger::log("Impact skipped: no prototype configured");
            return None;
        };

        // Ось Y эффекта вдоль нормали поверхности
        let rotation = Quat::from_rotation_arc(Vec3::Y, *normal);

        let Some(pool) = pools.get_or_create(&prototype, self.pool_config) else {
            self.stats.skipped += 1;
            return None;
        };
        let Some(handle) = pool.acquire_at(point, rotation) else {
            self.stats.skipped += 1;
            logger::log(&format!("Impact skipped: pool '{}' exhausted", prototype.id));
            return None;
        };

        if let Some(effect) = pool.get_mut(handle) {
            effect.play();
        }

        let id = prototype.id;
        self.returns.schedule(handle, now, self.effect_duration, move |handle, pools: &mut PoolRegistry| {
            if let Some(pool) = pools.get_mut::<ImpactEffect>(&id) {
                pool.release(handle);
            }
        });

        self.stats.spawned += 1;
        Some(handle)
    }

    /// Дренирует истёкшие auto-return таймеры
    pub fn tick(&mut self, pools: &mut PoolRegistry, now: Duration) -> usize {
        let returned = self.returns.tick(now, pools);
        self.stats.returned += returned as u64;
        returned
    }

    /// Отменяет auto-return (инстанс уничтожен/отключён снаружи)
    pub fn cancel(&mut self, handle: PoolHandle) -> bool {
        self.returns.cancel(&handle)
    }

    /// Досрочный release: таймер разоружается, инстанс сразу в пул
    pub fn release_early(&mut self, pools: &mut PoolRegistry, handle: PoolHandle) -> bool {
        self.returns.cancel(&handle);

        for prototype in self.prototypes() {
            if let Some(pool) = pools.get_mut::<ImpactEffect>(&prototype.id) {
                if pool.id() == handle.pool() {
                    return pool.release(handle);
                }
            }
        }
        false
    }

    pub fn advance_playback(&self, pools: &mut PoolRegistry, delta: Duration) {
        for prototype in self.prototypes() {
            if let Some(pool) = pools.get_mut::<ImpactEffect>(&prototype.id) {
                for (_, effect) in pool.iter_active_mut() {
                    effect.advance(delta);
                }
            }
        }
    }

    /// Активные эффекты по всем пулам спавнера
    pub fn active_effects<'a>(&'a self, pools: &'a PoolRegistry) -> Vec<(PoolHandle, &'a ImpactEffect)> {
        self.prototypes()
            .filter_map(|prototype| pools.get::<ImpactEffect>(&prototype.id))
            .flat_map(|pool| pool.iter_active())
            .collect()
    }

    fn prototypes(&self) -> impl Iterator<Item = &ImpactPrototype> {
        // Один и тот же пул не обходим дважды
        let hostile = self.hostile_impact.as_ref().filter(|hostile| {
            self.default_impact
                .as_ref()
                .is_none_or(|default| default.id != hostile.id)
        });
        self.default_impact.iter().chain(hostile)
    }
}

/// Связка spawner + pools + now для вызова из weapon
pub struct ImpactContext<'a> {
    pub spawner: &'a mut EffectSpawner,
    pub pools: &'a mut PoolRegistry,
    pub now: Duration,
}

impl ImpactSink for ImpactContext<'_> {
    fn spawn_impact(&mut self, point: Vec3, normal: Dir3, hostile: bool) -> Option<PoolHandle> {
        self.spawner.spawn_impact(self.pools, self.now, point, normal, hostile)
    }
}

/// System (Startup): pre-warm impact пулов
pub fn prewarm_impact_pools(spawner: Res<EffectSpawner>, mut pools: ResMut<PoolRegistry>) {
    spawner.prewarm(&mut pools);
}

/// System: auto-return истёкших эффектов + playback активных
pub fn tick_impact_effects(
    clock: Res<CombatClock>,
    mut spawner: ResMut<EffectSpawner>,
    mut pools: ResMut<PoolRegistry>,
) {
    let returned = spawner.tick(&mut pools, clock.elapsed());
    if returned > 0 {
        logger::log(&format!("♻️ {} impact effect(s) returned to pool", returned));
    }
    spawner.advance_playback(&mut pools, clock.delta());
}
