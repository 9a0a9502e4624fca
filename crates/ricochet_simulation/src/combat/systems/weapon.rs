//! Weapon systems (hit-scan fire pipeline).

use bevy::prelude::*;

use crate::collision::CollisionWorld;
use crate::combat::{
    AimState, DamageDealt, DamageReceiver, Dead, EnemyHit, EntityDied, FireContext, FireIntent, HitScanWeapon,
    HitTarget, TargetRegistry, WeaponEvent, WeaponFired,
};
use crate::components::{Health, Hostile};
use crate::effects::{EffectSpawner, ImpactContext};
use crate::pool::PoolRegistry;
use crate::timer::CombatClock;
use crate::DeterministicRng;

type TargetData = (Option<&'static mut Health>, Has<Hostile>, Has<Dead>);

/// TargetRegistry поверх ECS query: capability = наличие живого Health
struct EcsTargets<'q, 'w, 's> {
    query: &'q mut Query<'w, 's, TargetData>,
}

impl TargetRegistry for EcsTargets<'_, '_, '_> {
    fn describe(&self, target: Entity) -> HitTarget {
        let Ok((health, hostile, dead)) = self.query.get(target) else {
            return HitTarget::inert(target);
        };

        // Dead вставляется через Commands (deferred): труп этого же тика
        // узнаём по HP, а не только по маркеру
        let alive = !dead && health.is_none_or(|health| health.is_alive());

        HitTarget {
            entity: target,
            damageable: alive && health.is_some(),
            hostile: hostile && alive,
        }
    }

    fn damage_receiver(&mut self, target: Entity) -> Option<&mut dyn DamageReceiver> {
        let (health, _, _) = self.query.get_mut(target).ok()?;
        health.map(|health| health.into_inner() as &mut dyn DamageReceiver)
    }
}

/// System: FireIntent → try_fire → ECS events
///
/// 1. FireGate / ray query / урон решает `HitScanWeapon::try_fire`
/// 2. Outbox weapon'а переводится в WeaponFired / EnemyHit
/// 3. Урон по Health → DamageDealt, смерть → EntityDied + Dead
///
/// Intent при закрытом gate молча отбрасывается (нормальный режим при зажатом курке).
#[allow(clippy::too_many_arguments)]
pub fn process_fire_intents(
    mut commands: Commands,
    mut intents: EventReader<FireIntent>,
    clock: Res<CombatClock>,
    collision: Res<CollisionWorld>,
    mut spawner: ResMut<EffectSpawner>,
    mut pools: ResMut<PoolRegistry>,
    mut rng: ResMut<DeterministicRng>,
    mut shooters: Query<(&Transform, &mut HitScanWeapon, Option<&AimState>), Without<Dead>>,
    mut targets: Query<TargetData>,
    mut fired_events: EventWriter<WeaponFired>,
    mut enemy_hit_events: EventWriter<EnemyHit>,
    mut damage_events: EventWriter<DamageDealt>,
    mut died_events: EventWriter<EntityDied>,
) {
    let now = clock.elapsed();

    for intent in intents.read() {
        let shooter = intent.shooter;
        let Ok((transform, mut weapon, aim)) = shooters.get_mut(shooter) else {
            crate::logger::log(&format!("FireIntent from {:?} ignored: no armed living shooter", shooter));
            continue;
        };

        let muzzle = weapon.muzzle_ray(transform);
        let damage = weapon.config().damage;

        let fired = weapon.try_fire(FireContext {
            now,
            muzzle,
            aim: aim.map(|aim| aim.sightline),
            shooter: Some(shooter),
            collision: &*collision,
            targets: &mut EcsTargets { query: &mut targets },
            impacts: Some(&mut ImpactContext {
                spawner: &mut spawner,
                pools: &mut pools,
                now,
            }),
            rng: Some(&mut rng.rng),
        });

        if !fired {
            continue;
        }

        for event in weapon.drain_events() {
            match event {
                WeaponEvent::Fired(hit) => {
                    fired_events.write(WeaponFired {
                        shooter,
                        muzzle: muzzle.origin,
                        hit,
                    });

                    let Some(target) = hit.damage_target() else {
                        continue;
                    };

                    damage_events.write(DamageDealt {
                        attacker: shooter,
                        target,
                        damage,
                        impact_point: hit.hit_point,
                        impact_normal: *hit.hit_normal,
                    });

                    let Ok((Some(health), _, _)) = targets.get(target) else {
                        continue;
                    };
                    crate::logger::log(&format!(
                        "💥 {:?} → {:?}: {} damage (HP: {})",
                        shooter, target, damage, health.current
                    ));

                    if !health.is_alive() {
                        commands.entity(target).insert(Dead);
                        died_events.write(EntityDied {
                            entity: target,
                            killer: Some(shooter),
                        });
                        crate::logger::log(&format!("💀 Entity {:?} killed by {:?}", target, shooter));
                    }
                }
                WeaponEvent::EnemyHit(hit) => {
                    enemy_hit_events.write(EnemyHit { shooter, hit });
                }
            }
        }
    }
}
