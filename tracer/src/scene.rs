use std::{ops::Range, sync::Arc};

use crate::{
    accel::Accelerator,
    geometry::{BoundingBox, Hit, Plane, Primitive, Ray, Sphere, Triangle},
};

/// A frozen list of primitives. Cloning is cheap and every index built over
/// the scene holds its own handle.
#[derive(Debug, Clone)]
pub struct Scene {
    inner: Arc<SceneInner>,
}

#[derive(Debug)]
struct SceneInner {
    primitives: Box<[Primitive]>,
    bounds: BoundingBox,
    unbounded: Box<[u32]>,
}

/// An unordered aggregate queried by linear scan. Members may themselves be
/// accelerated indices or nested sets.
#[derive(Default)]
pub struct GeometrySet {
    members: Vec<Geometry>,
}

pub enum Geometry {
    Primitive(Primitive),
    Accelerated(Accelerator),
    Set(GeometrySet),
}

impl Scene {
    pub fn new(primitives: Vec<Primitive>) -> Self {
        let mut bounds = BoundingBox::empty();
        let mut unbounded = Vec::new();
        for (idx, primitive) in primitives.iter().enumerate() {
            match primitive.bounds() {
                Some(primitive_bounds) => bounds.expand_box(&primitive_bounds),
                None => unbounded.push(idx as u32),
            }
        }

        Self {
            inner: Arc::new(SceneInner {
                primitives: primitives.into_boxed_slice(),
                bounds,
                unbounded: unbounded.into_boxed_slice(),
            }),
        }
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.inner.primitives
    }

    pub fn get(&self, index: u32) -> &Primitive {
        &self.inner.primitives[index as usize]
    }

    pub fn len(&self) -> usize {
        self.inner.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.primitives.is_empty()
    }

    /// Bounds of every primitive that has them. Empty if there are none.
    pub fn bounds(&self) -> BoundingBox {
        self.inner.bounds
    }

    /// Indices of the primitives that can't be placed in a spatial index.
    pub fn unbounded(&self) -> &[u32] {
        &self.inner.unbounded
    }

    /// Indices of every primitive with finite bounds.
    pub fn bounded(&self) -> Vec<u32> {
        (0..self.len() as u32)
            .filter(|&x| self.get(x).bounds().is_some())
            .collect()
    }

    /// Brute force closest hit over every primitive.
    pub fn intersect(&self, ray: &Ray) -> Option<Hit<'_>> {
        closest_of(self.primitives().iter(), ray)
    }

    /// Closest hit among the given primitives.
    pub fn intersect_subset(&self, indices: &[u32], ray: &Ray) -> Option<Hit<'_>> {
        closest_of(indices.iter().map(|&x| self.get(x)), ray)
    }

    /// Closest hit among a contiguous run of primitives.
    pub fn intersect_range(&self, range: Range<u32>, ray: &Ray) -> Option<Hit<'_>> {
        closest_of(range.map(|x| self.get(x)), ray)
    }
}

fn closest_of<'a>(
    primitives: impl Iterator<Item = &'a Primitive>,
    ray: &Ray,
) -> Option<Hit<'a>> {
    primitives.fold(None, |best, primitive| {
        Hit::closest(best, primitive.intersect(ray))
    })
}

impl GeometrySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, member: impl Into<Geometry>) {
        self.members.push(member.into());
    }

    pub fn with(mut self, member: impl Into<Geometry>) -> Self {
        self.push(member);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Closest hit over all members. Every member is queried with the same
    /// ray so tunnel members may update its context.
    pub fn intersect(&self, ray: &mut Ray) -> Option<Hit<'_>> {
        let mut best = None;
        for member in &self.members {
            best = Hit::closest(best, member.intersect(ray));
        }
        best
    }
}

impl Geometry {
    pub fn intersect(&self, ray: &mut Ray) -> Option<Hit<'_>> {
        match self {
            Geometry::Primitive(primitive) => primitive.intersect(ray),
            Geometry::Accelerated(index) => index.intersect(ray),
            Geometry::Set(set) => set.intersect(ray),
        }
    }
}

macro_rules! geometry_from_primitive {
    ($($kind:ty),*) => {
        $(impl From<$kind> for Geometry {
            fn from(value: $kind) -> Self {
                Geometry::Primitive(value.into())
            }
        })*
    };
}

geometry_from_primitive!(Primitive, Triangle, Plane, Sphere);

impl From<Accelerator> for Geometry {
    fn from(value: Accelerator) -> Self {
        Geometry::Accelerated(value)
    }
}

impl From<GeometrySet> for Geometry {
    fn from(value: GeometrySet) -> Self {
        Geometry::Set(value)
    }
}
