//! Collision-query service: один синхронный nearest-hit raycast.
//!
//! Weapon видит только trait `CollisionQuery`. `CollisionWorld` — headless
//! реализация поверх bounding volumes из `bevy::math`; хост-движок может
//! подставить свою физику через тот же trait.
//!
//! ## Layers (битовая маска):
//! - Layer 2 (0b10 = 2): Actors
//! - Layer 3 (0b100 = 4): Environment (walls, obstacles)
//! - Layer 4 (0b1000 = 8): Effects (impact VFX — в raycast не участвуют)

use bevy::math::bounding::{Aabb3d, BoundingSphere, RayCast3d};
use bevy::prelude::*;

/// Битовая маска collision слоёв
pub type LayerMask = u32;

/// Layer 2: Actors (players, NPCs, dummies)
pub const COLLISION_LAYER_ACTORS: LayerMask = 0b10;

/// Layer 3: Environment (walls, obstacles, terrain)
pub const COLLISION_LAYER_ENVIRONMENT: LayerMask = 0b100;

/// Layer 4: Effects (pooled VFX)
pub const COLLISION_LAYER_EFFECTS: LayerMask = 0b1000;

/// Mask: hit-scan видит Actors + Environment (стены блокируют выстрел)
pub const COLLISION_MASK_HITSCAN: LayerMask = COLLISION_LAYER_ACTORS | COLLISION_LAYER_ENVIRONMENT;

/// Получить название слоя для debug логов
pub fn get_layer_name(layer_bits: LayerMask) -> &'static str {
    match layer_bits {
        COLLISION_LAYER_ACTORS => "Actors",
        COLLISION_LAYER_ENVIRONMENT => "Environment",
        COLLISION_LAYER_EFFECTS => "Effects",
        _ => "Unknown",
    }
}

/// Параметры одного raycast
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayQuery {
    pub origin: Vec3,
    pub direction: Dir3,
    pub max_distance: f32,
    pub layer_mask: LayerMask,
    /// Collider, который игнорируется (сам стрелок)
    pub exclude: Option<Entity>,
}

/// Ближайшее пересечение
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Dir3,
    pub distance: f32,
    pub target: Entity,
}

/// Внешний сервис ray-запросов (синхронный, opaque для combat core)
pub trait CollisionQuery {
    /// Ближайший hit в пределах `[0, max_distance]`, иначе `None`
    fn raycast(&self, query: &RayQuery) -> Option<RayHit>;
}

#[derive(Debug, Clone, Copy, PartialEq, Reflect)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Cuboid { half_extents: Vec3 },
}

/// Collider component (центр = `Transform::translation`)
#[derive(Component, Debug, Clone, Copy, PartialEq, Reflect)]
#[reflect(Component)]
pub struct Collider {
    pub shape: ColliderShape,
    pub layer: LayerMask,
}

impl Collider {
    pub fn sphere(radius: f32, layer: LayerMask) -> Self {
        Self {
            shape: ColliderShape::Sphere { radius },
            layer,
        }
    }

    pub fn cuboid(half_extents: Vec3, layer: LayerMask) -> Self {
        Self {
            shape: ColliderShape::Cuboid { half_extents },
            layer,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PlacedCollider {
    entity: Entity,
    center: Vec3,
    collider: Collider,
}

impl PlacedCollider {
    /// Distance до входа луча в volume (0 если origin внутри)
    fn intersect(&self, cast: &RayCast3d) -> Option<f32> {
        match self.collider.shape {
            ColliderShape::Sphere { radius } => {
                cast.sphere_intersection_at(&BoundingSphere::new(self.center, radius))
            }
            ColliderShape::Cuboid { half_extents } => {
                cast.aabb_intersection_at(&Aabb3d::new(self.center, half_extents))
            }
        }
    }

    fn normal_at(&self, point: Vec3, direction: Dir3) -> Dir3 {
        let offset = point - self.center;
        let normal = match self.collider.shape {
            ColliderShape::Sphere { .. } => offset,
            ColliderShape::Cuboid { half_extents } => {
                // Грань = ось с максимальной нормированной координатой
                let local = offset / half_extents.max(Vec3::splat(f32::EPSILON));
                let abs = local.abs();
                if abs.x >= abs.y && abs.x >= abs.z {
                    Vec3::X * local.x.signum()
                } else if abs.y >= abs.z {
                    Vec3::Y * local.y.signum()
                } else {
                    Vec3::Z * local.z.signum()
                }
            }
        };

        // Origin внутри collider'а → нормаль навстречу лучу
        Dir3::new(normal).unwrap_or(-direction)
    }
}

/// Headless collision world (снимок colliders на текущий tick)
#[derive(Resource, Debug, Default)]
pub struct CollisionWorld {
    colliders: Vec<PlacedCollider>,
}

impl CollisionWorld {
    pub fn insert(&mut self, entity: Entity, center: Vec3, collider: Collider) {
        self.remove(entity);
        self.colliders.push(PlacedCollider {
            entity,
            center,
            collider,
        });
    }

    pub fn remove(&mut self, entity: Entity) -> bool {
        let before = self.colliders.len();
        self.colliders.retain(|placed| placed.entity != entity);
        self.colliders.len() != before
    }

    pub fn clear(&mut self) {
        self.colliders.clear();
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

impl CollisionQuery for CollisionWorld {
    fn raycast(&self, query: &RayQuery) -> Option<RayHit> {
        if query.max_distance.is_nan() || query.max_distance < 0.0 {
            return None;
        }

        let cast = RayCast3d::from_ray(Ray3d::new(query.origin, query.direction), query.max_distance);

        let (nearest, distance) = self
            .colliders
            .iter()
            .filter(|placed| placed.collider.layer & query.layer_mask != 0)
            .filter(|placed| Some(placed.entity) != query.exclude)
            .filter_map(|placed| placed.intersect(&cast).map(|distance| (placed, distance)))
            .filter(|(_, distance)| *distance <= query.max_distance)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))?;

        let point = query.origin + *query.direction * distance;
        Some(RayHit {
            point,
            normal: nearest.normal_at(point, query.direction),
            distance,
            target: nearest.entity,
        })
    }
}

/// System: пересобирает CollisionWorld из ECS colliders (раз в tick, до выстрелов)
pub fn sync_collision_world(
    mut world: ResMut<CollisionWorld>,
    colliders: Query<(Entity, &Transform, &Collider)>,
) {
    world.clear();
    for (entity, transform, collider) in colliders.iter() {
        world.insert(entity, transform.translation, *collider);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(origin: Vec3, direction: Dir3, max_distance: f32) -> RayQuery {
        RayQuery {
            origin,
            direction,
            max_distance,
            layer_mask: COLLISION_MASK_HITSCAN,
            exclude: None,
        }
    }

    #[test]
    fn test_sphere_hit_distance_and_normal() {
        let mut world = CollisionWorld::default();
        let target = Entity::from_raw(1);
        world.insert(target, Vec3::new(0.0, 0.0, -10.0), Collider::sphere(1.0, COLLISION_LAYER_ACTORS));

        let hit = world.raycast(&query(Vec3::ZERO, Dir3::NEG_Z, 100.0)).unwrap();

        assert_eq!(hit.target, target);
        assert!((hit.distance - 9.0).abs() < 1e-4, "distance = {}", hit.distance);
        assert!((hit.point - Vec3::new(0.0, 0.0, -9.0)).length() < 1e-4);
        assert!(hit.normal.dot(Vec3::Z) > 0.999);
    }

    #[test]
    fn test_nearest_hit_wins() {
        let mut world = CollisionWorld::default();
        let far = Entity::from_raw(1);
        let near = Entity::from_raw(2);
        world.insert(far, Vec3::new(0.0, 0.0, -20.0), Collider::sphere(1.0, COLLISION_LAYER_ACTORS));
        world.insert(near, Vec3::new(0.0, 0.0, -5.0), Collider::cuboid(Vec3::splat(0.5), COLLISION_LAYER_ENVIRONMENT));

        let hit = world.raycast(&query(Vec3::ZERO, Dir3::NEG_Z, 100.0)).unwrap();

        assert_eq!(hit.target, near);
        assert!((hit.distance - 4.5).abs() < 1e-4);
        assert!(hit.normal.dot(Vec3::Z) > 0.999);
    }

    #[test]
    fn test_beyond_max_distance_is_miss() {
        let mut world = CollisionWorld::default();
        world.insert(Entity::from_raw(1), Vec3::new(0.0, 0.0, -150.0), Collider::sphere(0.5, COLLISION_LAYER_ACTORS));

        assert!(world.raycast(&query(Vec3::ZERO, Dir3::NEG_Z, 100.0)).is_none());
    }

    #[test]
    fn test_layer_mask_and_exclude() {
        let mut world = CollisionWorld::default();
        let shooter = Entity::from_raw(1);
        let vfx = Entity::from_raw(2);
        world.insert(shooter, Vec3::ZERO, Collider::sphere(0.5, COLLISION_LAYER_ACTORS));
        world.insert(vfx, Vec3::new(0.0, 0.0, -3.0), Collider::sphere(0.5, COLLISION_LAYER_EFFECTS));

        let mut ray = query(Vec3::ZERO, Dir3::NEG_Z, 100.0);
        ray.exclude = Some(shooter);

        assert!(world.raycast(&ray).is_none());
    }

    #[test]
    fn test_layer_names() {
        assert_eq!(get_layer_name(COLLISION_LAYER_ACTORS), "Actors");
        assert_eq!(get_layer_name(COLLISION_LAYER_EFFECTS), "Effects");
        assert_eq!(get_layer_name(COLLISION_MASK_HITSCAN), "Unknown");
    }

    #[test]
    fn test_insert_replaces_existing_entity() {
        let mut world = CollisionWorld::default();
        let entity = Entity::from_raw(1);
        world.insert(entity, Vec3::ZERO, Collider::sphere(1.0, COLLISION_LAYER_ACTORS));
        world.insert(entity, Vec3::X, Collider::sphere(1.0, COLLISION_LAYER_ACTORS));

        assert_eq!(world.len(), 1);
        assert!(world.remove(entity));
        assert!(world.is_empty());
    }
}
