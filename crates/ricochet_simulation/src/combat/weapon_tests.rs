//! Tests for HitScanWeapon.

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bevy::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::collision::{Collider, CollisionWorld, COLLISION_LAYER_ACTORS, COLLISION_LAYER_ENVIRONMENT};
    use crate::combat::events::WeaponEvent;
    use crate::combat::hit::{DamageReceiver, HitTarget, TargetRegistry};
    use crate::combat::weapon::{FireContext, HitScanWeapon, WeaponConfig};
    use crate::effects::ImpactSink;
    use crate::pool::PoolHandle;

    #[derive(Default)]
    struct Dummy {
        damage_taken: Vec<f32>,
    }

    impl DamageReceiver for Dummy {
        fn take_damage(&mut self, amount: f32, _hit_point: Vec3, _hit_direction: Dir3) {
            self.damage_taken.push(amount);
        }
    }

    #[derive(Default)]
    struct Targets {
        receivers: HashMap<Entity, Dummy>,
        hostile: HashSet<Entity>,
    }

    impl Targets {
        fn damage_to(&self, entity: Entity) -> f32 {
            self.receivers
                .get(&entity)
                .map(|dummy| dummy.damage_taken.iter().sum())
                .unwrap_or(0.0)
        }

        fn damage_calls(&self) -> usize {
            self.receivers.values().map(|dummy| dummy.damage_taken.len()).sum()
        }
    }

    impl TargetRegistry for Targets {
        fn describe(&self, target: Entity) -> HitTarget {
            HitTarget {
                entity: target,
                damageable: self.receivers.contains_key(&target),
                hostile: self.hostile.contains(&target),
            }
        }

        fn damage_receiver(&mut self, target: Entity) -> Option<&mut dyn DamageReceiver> {
            self.receivers
                .get_mut(&target)
                .map(|dummy| dummy as &mut dyn DamageReceiver)
        }
    }

    #[derive(Default)]
    struct ImpactRecorder {
        spawned: Vec<(Vec3, bool)>,
    }

    impl ImpactSink for ImpactRecorder {
        fn spawn_impact(&mut self, point: Vec3, _normal: Dir3, hostile: bool) -> Option<PoolHandle> {
            self.spawned.push((point, hostile));
            None
        }
    }

    struct Range {
        world: CollisionWorld,
        targets: Targets,
    }

    impl Range {
        fn new() -> Self {
            Self {
                world: CollisionWorld::default(),
                targets: Targets::default(),
            }
        }

        /// Hostile + damageable актёр (сфера r=0.5)
        fn enemy(&mut self, id: u32, position: Vec3) -> Entity {
            let entity = Entity::from_raw(id);
            self.world.insert(entity, position, Collider::sphere(0.5, COLLISION_LAYER_ACTORS));
            self.targets.receivers.insert(entity, Dummy::default());
            self.targets.hostile.insert(entity);
            entity
        }

        /// Damageable, но не hostile (ящик, союзник)
        fn crate_at(&mut self, id: u32, position: Vec3) -> Entity {
            let entity = Entity::from_raw(id);
            self.world.insert(entity, position, Collider::cuboid(Vec3::splat(0.5), COLLISION_LAYER_ENVIRONMENT));
            self.targets.receivers.insert(entity, Dummy::default());
            entity
        }

        /// Без capabilities
        fn wall(&mut self, id: u32, position: Vec3) -> Entity {
            let entity = Entity::from_raw(id);
            self.world.insert(entity, position, Collider::cuboid(Vec3::new(5.0, 5.0, 0.5), COLLISION_LAYER_ENVIRONMENT));
            entity
        }

        fn fire(&mut self, weapon: &mut HitScanWeapon, now_secs: f32) -> bool {
            self.fire_with(weapon, now_secs, None, None)
        }

        fn fire_with<'a>(
            &'a mut self,
            weapon: &mut HitScanWeapon,
            now_secs: f32,
            aim: Option<Ray3d>,
            impacts: Option<&'a mut dyn ImpactSink>,
        ) -> bool {
            weapon.try_fire(FireContext {
                now: Duration::from_secs_f32(now_secs),
                muzzle: Ray3d::new(Vec3::ZERO, Dir3::NEG_Z),
                aim,
                shooter: None,
                collision: &self.world,
                targets: &mut self.targets,
                impacts,
                rng: None,
            })
        }
    }

    fn record_events(weapon: &mut HitScanWeapon) -> Arc<Mutex<Vec<WeaponEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        weapon.subscribe(move |event| sink.lock().unwrap().push(*event));
        events
    }

    fn rifle(fire_rate: f32, damage: f32) -> HitScanWeapon {
        HitScanWeapon::new(WeaponConfig {
            fire_rate,
            damage,
            ..WeaponConfig::rifle()
        })
    }

    #[test]
    fn test_scenario_fire_rate_gate_and_damage() {
        let mut range = Range::new();
        let enemy = range.enemy(1, Vec3::new(0.0, 0.0, -10.0));
        let mut weapon = rifle(0.15, 25.0);

        assert!(range.fire(&mut weapon, 0.00));
        assert!(!range.fire(&mut weapon, 0.05));
        assert!(range.fire(&mut weapon, 0.20));

        assert_eq!(range.targets.damage_to(enemy), 50.0);
        assert_eq!(weapon.stats().shots_fired, 2);
        assert_eq!(weapon.stats().hits, 2);
    }

    #[test]
    fn test_scenario_target_beyond_range_is_miss() {
        let mut range = Range::new();
        range.enemy(1, Vec3::new(0.0, 0.0, -150.0));
        let mut weapon = HitScanWeapon::new(WeaponConfig {
            max_range: 100.0,
            ..WeaponConfig::rifle()
        });
        let events = record_events(&mut weapon);

        assert!(range.fire(&mut weapon, 0.0));

        assert_eq!(range.targets.damage_calls(), 0);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        let WeaponEvent::Fired(hit) = events[0] else {
            panic!("expected Fired, got {:?}", events[0]);
        };
        assert!(!hit.did_hit);
        assert_eq!(hit.hit_distance, 100.0);
        assert!((hit.hit_point - Vec3::new(0.0, 0.0, -100.0)).length() < 1e-4);
        assert_eq!(weapon.stats().misses, 1);
    }

    #[test]
    fn test_closed_gate_has_no_side_effects() {
        let mut range = Range::new();
        let enemy = range.enemy(1, Vec3::new(0.0, 0.0, -10.0));
        let mut weapon = rifle(1.0, 10.0);
        let events = record_events(&mut weapon);
        let mut impacts = ImpactRecorder::default();

        assert!(range.fire_with(&mut weapon, 0.0, None, Some(&mut impacts)));
        let gate_after_shot = *weapon.gate();

        assert!(!range.fire_with(&mut weapon, 0.5, None, Some(&mut impacts)));

        assert_eq!(*weapon.gate(), gate_after_shot);
        assert_eq!(events.lock().unwrap().len(), 2, "Fired + EnemyHit from the first shot only");
        assert_eq!(impacts.spawned.len(), 1);
        assert_eq!(range.targets.damage_to(enemy), 10.0);
        assert_eq!(weapon.stats().shots_fired, 1);
    }

    #[test]
    fn test_missing_aim_falls_back_to_muzzle() {
        let mut range = Range::new();
        range.enemy(1, Vec3::new(0.0, 0.0, -8.0));
        let mut weapon = HitScanWeapon::default();

        assert!(range.fire(&mut weapon, 0.0));

        let event = weapon.drain_events().next().unwrap();
        assert_eq!(event.hit().origin, Vec3::ZERO);
        assert_eq!(event.hit().direction, Dir3::NEG_Z);
        assert!(event.hit().did_hit);
    }

    #[test]
    fn test_sightline_origin_differs_from_muzzle() {
        let mut range = Range::new();
        // Цель на линии камеры, но не на линии muzzle
        let enemy = range.enemy(1, Vec3::new(0.0, 2.0, -10.0));
        let mut weapon = HitScanWeapon::default();
        let camera = Ray3d::new(Vec3::new(0.0, 2.0, 1.0), Dir3::NEG_Z);

        assert!(range.fire_with(&mut weapon, 0.0, Some(camera), None));

        let event = weapon.drain_events().next().unwrap();
        assert_eq!(event.hit().origin, camera.origin);
        assert_eq!(event.hit().target.map(|target| target.entity), Some(enemy));
    }

    #[test]
    fn test_hit_without_damage_capability() {
        let mut range = Range::new();
        let wall = range.wall(1, Vec3::new(0.0, 0.0, -20.0));
        let mut weapon = HitScanWeapon::default();
        let mut impacts = ImpactRecorder::default();

        assert!(range.fire_with(&mut weapon, 0.0, None, Some(&mut impacts)));

        let events: Vec<_> = weapon.drain_events().collect();
        assert_eq!(events.len(), 1);
        let hit = events[0].hit();
        assert!(hit.did_hit);
        assert_eq!(hit.target, Some(HitTarget::inert(wall)));
        assert_eq!(range.targets.damage_calls(), 0);
        assert_eq!(impacts.spawned, vec![(hit.hit_point, false)]);
    }

    #[test]
    fn test_enemy_hit_only_for_hostile_targets() {
        let mut range = Range::new();
        let crate_entity = range.crate_at(1, Vec3::new(0.0, 0.0, -5.0));
        let mut weapon = rifle(0.1, 20.0);

        assert!(range.fire(&mut weapon, 0.0));
        let events: Vec<_> = weapon.drain_events().collect();
        assert!(matches!(events.as_slice(), [WeaponEvent::Fired(_)]));
        assert_eq!(range.targets.damage_to(crate_entity), 20.0);

        // Ящик убран → следующий выстрел по врагу за ним
        range.world.remove(crate_entity);
        range.enemy(2, Vec3::new(0.0, 0.0, -30.0));

        assert!(range.fire(&mut weapon, 1.0));
        let events: Vec<_> = weapon.drain_events().collect();
        assert!(matches!(events.as_slice(), [WeaponEvent::Fired(_), WeaponEvent::EnemyHit(_)]));
        assert_eq!(events[0].hit(), events[1].hit());
    }

    #[test]
    fn test_impact_spawned_only_on_hit() {
        let mut range = Range::new();
        let mut weapon = rifle(0.1, 20.0);
        let mut impacts = ImpactRecorder::default();

        assert!(range.fire_with(&mut weapon, 0.0, None, Some(&mut impacts)));
        assert!(impacts.spawned.is_empty());

        range.enemy(1, Vec3::new(0.0, 0.0, -10.0));
        assert!(range.fire_with(&mut weapon, 1.0, None, Some(&mut impacts)));
        assert_eq!(impacts.spawned.len(), 1);
        assert!(impacts.spawned[0].1, "hostile flag passed to the sink");
    }

    #[test]
    fn test_shooter_is_excluded_from_ray() {
        let mut range = Range::new();
        let shooter = range.enemy(1, Vec3::ZERO);
        let target = range.enemy(2, Vec3::new(0.0, 0.0, -10.0));
        let mut weapon = HitScanWeapon::default();

        let fired = weapon.try_fire(FireContext {
            now: Duration::ZERO,
            muzzle: Ray3d::new(Vec3::ZERO, Dir3::NEG_Z),
            aim: None,
            shooter: Some(shooter),
            collision: &range.world,
            targets: &mut range.targets,
            impacts: None,
            rng: None,
        });

        assert!(fired);
        assert_eq!(range.targets.damage_calls(), 1);
        assert!(range.targets.damage_to(target) > 0.0);
    }

    #[test]
    fn test_identical_setups_resolve_identically() {
        let run = || {
            let mut range = Range::new();
            range.wall(1, Vec3::new(0.0, 0.0, -40.0));
            range.enemy(2, Vec3::new(0.2, 0.0, -25.0));
            let mut weapon = HitScanWeapon::default();
            range.fire(&mut weapon, 0.0);
            let event = weapon.drain_events().next().unwrap();
            *event.hit()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_spread_is_seeded_and_bounded() {
        let spread = 0.05;
        let shoot = |seed: u64| {
            let mut range = Range::new();
            let mut weapon = HitScanWeapon::new(WeaponConfig {
                spread,
                ..WeaponConfig::rifle()
            });
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let mut directions = Vec::new();
            for shot in 0..5 {
                weapon.try_fire(FireContext {
                    now: Duration::from_secs(shot),
                    muzzle: Ray3d::new(Vec3::ZERO, Dir3::NEG_Z),
                    aim: None,
                    shooter: None,
                    collision: &range.world,
                    targets: &mut range.targets,
                    impacts: None,
                    rng: Some(&mut rng),
                });
                directions.push(weapon.drain_events().next().unwrap().hit().direction);
            }
            directions
        };

        let first = shoot(42);
        assert_eq!(first, shoot(42));
        for direction in first {
            assert!(direction.dot(Vec3::NEG_Z) >= spread.cos() - 1e-5);
        }
    }

    #[test]
    fn test_reset_cooldown() {
        let mut range = Range::new();
        let mut weapon = rifle(5.0, 1.0);

        assert!(range.fire(&mut weapon, 0.0));
        assert!(!weapon.is_ready(Duration::from_secs(1)));

        weapon.reset_cooldown();
        assert!(range.fire(&mut weapon, 1.0));
    }

    #[test]
    fn test_unsubscribed_observer_is_silent() {
        let mut range = Range::new();
        let mut weapon = rifle(0.0, 1.0);
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let id = weapon.subscribe(move |_| *counter.lock().unwrap() += 1);

        range.fire(&mut weapon, 0.0);
        assert!(weapon.unsubscribe(id));
        range.fire(&mut weapon, 1.0);

        assert_eq!(*count.lock().unwrap(), 1);
        // Outbox пишется независимо от подписчиков (последний выстрел)
        assert_eq!(weapon.pending_events().len(), 1);
    }

    #[test]
    fn test_outbox_holds_only_latest_shot() {
        let mut range = Range::new();
        range.enemy(1, Vec3::new(0.0, 0.0, -10.0));
        let mut weapon = rifle(0.0, 0.0);
        let events = record_events(&mut weapon);

        for shot in 0..1_000 {
            assert!(range.fire(&mut weapon, shot as f32 * 0.01));
        }

        // Observer видит все выстрелы, outbox без drain не растёт
        assert_eq!(events.lock().unwrap().len(), 2_000);
        assert!(matches!(
            weapon.pending_events(),
            [WeaponEvent::Fired(_), WeaponEvent::EnemyHit(_)]
        ));
    }

    #[test]
    fn test_rejected_shot_keeps_undrained_events() {
        let mut range = Range::new();
        range.enemy(1, Vec3::new(0.0, 0.0, -10.0));
        let mut weapon = rifle(1.0, 5.0);

        assert!(range.fire(&mut weapon, 0.0));
        assert!(!range.fire(&mut weapon, 0.5));

        assert_eq!(weapon.pending_events().len(), 2);
    }

    #[test]
    fn test_non_finite_spread_fires_straight() {
        let mut range = Range::new();
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for spread in [f32::INFINITY, f32::NAN] {
            let mut weapon = HitScanWeapon::new(WeaponConfig {
                spread,
                ..WeaponConfig::rifle()
            });

            assert!(weapon.try_fire(FireContext {
                now: Duration::ZERO,
                muzzle: Ray3d::new(Vec3::ZERO, Dir3::NEG_Z),
                aim: None,
                shooter: None,
                collision: &range.world,
                targets: &mut range.targets,
                impacts: None,
                rng: Some(&mut rng),
            }));
            assert_eq!(weapon.pending_events()[0].hit().direction, Dir3::NEG_Z);
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(WeaponConfig::rifle().validate().is_ok());
        assert!(WeaponConfig::pistol().validate().is_ok());

        let broken = WeaponConfig {
            max_range: f32::NAN,
            ..WeaponConfig::rifle()
        };
        assert!(broken.validate().is_err());

        let negative = WeaponConfig {
            fire_rate: -0.1,
            ..WeaponConfig::rifle()
        };
        assert!(negative.validate().is_err());
    }
}
