pub mod accel;
pub mod geometry;
pub mod scene;
pub mod tunnel;

#[cfg(test)]
pub(crate) mod test_util {
    use proptest::prelude::*;

    use crate::{
        geometry::{Hit, Plane, Point, Primitive, Ray, Sphere, Triangle, Vector},
        scene::Scene,
    };

    pub fn point(range: f32) -> impl Strategy<Value = Point> {
        (-range..range, -range..range, -range..range).prop_map(|(x, y, z)| Point::new(x, y, z))
    }

    pub fn direction() -> impl Strategy<Value = Vector> {
        (-1.0..1.0f32, -1.0..1.0f32, -1.0..1.0f32)
            .prop_map(|(x, y, z)| Vector::new(x, y, z))
            .prop_filter("direction too short", |x| x.norm() > 0.1)
            .prop_map(|x| x.normalize())
    }

    fn primitive() -> impl Strategy<Value = Primitive> {
        prop_oneof![
            3 => (point(10.0), point(2.0), point(2.0)).prop_map(|(a, u, v)| {
                Primitive::from(Triangle::new(a, a + u.coords, a + v.coords))
            }),
            1 => (point(10.0), 0.2..2.0f32).prop_map(|(center, radius)| {
                Primitive::from(Sphere::new(center, radius))
            }),
        ]
    }

    /// Up to `max` triangles and spheres around the origin, sometimes with
    /// a plane behind them.
    pub fn random_scene(max: usize) -> impl Strategy<Value = Scene> {
        (
            proptest::collection::vec(primitive(), 1..=max.max(1)),
            proptest::option::of((direction(), 8.0..14.0f32)),
        )
            .prop_map(|(mut primitives, plane)| {
                if let Some((normal, offset)) = plane {
                    primitives.push(Plane::new(normal, offset).into());
                }
                Scene::new(primitives)
            })
    }

    pub fn ray_strategy() -> impl Strategy<Value = Ray> {
        (point(15.0), direction()).prop_map(|(origin, direction)| Ray::new(origin, direction))
    }

    /// Both miss, or both hit at the same distance.
    pub fn same_hit(a: Option<Hit>, b: Option<Hit>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => (a.distance - b.distance).abs() < 1e-3,
            _ => false,
        }
    }
}
