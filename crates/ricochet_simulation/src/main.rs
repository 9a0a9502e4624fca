//! Headless симуляция RICOCHET
//!
//! Стрелок с винтовкой, враг и стена за ним. Курок зажат 10 секунд
//! (600 тиков по 60Hz). Опционально: путь к TOML config первым аргументом.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bevy::prelude::*;
use bevy::time::TimeUpdateStrategy;
use ricochet_simulation::collision::{COLLISION_LAYER_ACTORS, COLLISION_LAYER_ENVIRONMENT};
use ricochet_simulation::*;

fn main() {
    let config = match std::env::args().nth(1) {
        Some(path) => match CombatConfig::load(&path) {
            Ok(config) => config,
            Err(error) => {
                eprintln!("Failed to load {}: {}", path, error);
                std::process::exit(1);
            }
        },
        None => CombatConfig::default(),
    };

    println!("Starting RICOCHET headless simulation (seed: {})", config.seed);

    let mut app = create_headless_app(config.seed);
    app.insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f64(1.0 / 60.0)))
        .add_plugins(SimulationPlugin::new(config.clone()));

    // Observer прямо на оружии (помимо ECS событий)
    let enemy_hits = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&enemy_hits);
    let mut weapon = HitScanWeapon::new(config.weapon).with_muzzle_offset(Vec3::new(0.3, -0.2, -0.5));
    weapon.subscribe(move |event| {
        if matches!(event, WeaponEvent::EnemyHit(_)) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    });

    let world = app.world_mut();
    let shooter = world
        .spawn((
            Transform::from_xyz(0.0, 1.5, 0.0),
            weapon,
            // Камера на уровне глаз, muzzle ниже и правее
            AimState::new(Vec3::new(0.0, 1.7, 0.0), Dir3::NEG_Z),
            Health::new(100.0),
            Collider::sphere(0.5, COLLISION_LAYER_ACTORS),
        ))
        .id();
    let enemy = world
        .spawn((
            Transform::from_xyz(0.0, 1.5, -20.0),
            Health::new(200.0),
            Hostile,
            Collider::sphere(0.6, COLLISION_LAYER_ACTORS),
        ))
        .id();
    world.spawn((
        Transform::from_xyz(0.0, 2.0, -40.0),
        Collider::cuboid(Vec3::new(10.0, 5.0, 0.5), COLLISION_LAYER_ENVIRONMENT),
    ));

    for tick in 0..600 {
        app.world_mut().send_event(FireIntent { shooter });
        app.update();

        if tick % 60 == 0 {
            let world = app.world();
            let hp = world.get::<Health>(enemy).map(|health| health.current).unwrap_or_default();
            let effects = world.resource::<PoolRegistry>().total_active();
            println!("Tick {}: enemy HP {:.0}, active impacts {}", tick, hp, effects);
        }
    }

    let world = app.world();
    if let Some(weapon) = world.get::<HitScanWeapon>(shooter) {
        let stats = weapon.stats();
        println!(
            "Shots: {} (hits {}, misses {}), enemy hits observed: {}",
            stats.shots_fired,
            stats.hits,
            stats.misses,
            enemy_hits.load(Ordering::Relaxed)
        );
    }
    println!("Enemy dead: {}", world.get::<Dead>(enemy).is_some());
    println!("Simulation complete!");
}
