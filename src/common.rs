//! Rays and axis-aligned bounding boxes.
//!
//! Both renderer and picking trace rays against instanced objects, so the
//! intersection helpers here work on rays whose direction is *not* required
//! to be normalized: transforming a ray into object space keeps the `t`
//! parameter comparable with world-space distances.

use cgmath::{ElementWise, InnerSpace, Matrix4, Point3, Transform, Vector3};

/// A ray for intersection testing.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Ray origin.
    pub origin: Point3<f32>,
    /// Ray direction. Not necessarily unit length.
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self { origin, direction }
    }

    /// Point along the ray at parameter `t`.
    pub fn point_at(&self, t: f32) -> Point3<f32> {
        self.origin + self.direction * t
    }

    /// Ray mapped through a transform. `t` values stay comparable with the
    /// untransformed ray because the direction length is carried along.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Ray {
        Ray {
            origin: matrix.transform_point(self.origin),
            direction: matrix.transform_vector(self.direction),
        }
    }
}

/// Axis-aligned bounding box given by its lower and upper corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub lower: Point3<f32>,
    pub upper: Point3<f32>,
}

impl Aabb {
    pub fn new(lower: Point3<f32>, upper: Point3<f32>) -> Self {
        Self { lower, upper }
    }

    /// An inverted box that unions as the identity.
    pub fn empty() -> Self {
        Self {
            lower: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            upper: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lower.x > self.upper.x || self.lower.y > self.upper.y || self.lower.z > self.upper.z
    }

    pub fn center(&self) -> Point3<f32> {
        self.lower + (self.upper - self.lower) * 0.5
    }

    /// Grow the box to contain `point`.
    pub fn extend(&mut self, point: Point3<f32>) {
        self.lower.x = self.lower.x.min(point.x);
        self.lower.y = self.lower.y.min(point.y);
        self.lower.z = self.lower.z.min(point.z);
        self.upper.x = self.upper.x.max(point.x);
        self.upper.y = self.upper.y.max(point.y);
        self.upper.z = self.upper.z.max(point.z);
    }

    /// Union of two boxes.
    pub fn union(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        if !other.is_empty() {
            out.extend(other.lower);
            out.extend(other.upper);
        }
        out
    }

    /// Box containing all eight transformed corners.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Aabb {
        let corners = [
            Point3::new(self.lower.x, self.lower.y, self.lower.z),
            Point3::new(self.upper.x, self.lower.y, self.lower.z),
            Point3::new(self.lower.x, self.upper.y, self.lower.z),
            Point3::new(self.lower.x, self.lower.y, self.upper.z),
            Point3::new(self.upper.x, self.upper.y, self.lower.z),
            Point3::new(self.upper.x, self.lower.y, self.upper.z),
            Point3::new(self.lower.x, self.upper.y, self.upper.z),
            Point3::new(self.upper.x, self.upper.y, self.upper.z),
        ];

        let mut out = Aabb::empty();
        for corner in corners {
            out.extend(matrix.transform_point(corner));
        }
        out
    }

    /// Slab test. Returns the entry and exit parameters, or `None` if the
    /// ray misses the box or the box lies entirely behind the origin.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32)> {
        let inv_dir = Vector3::new(
            1.0 / ray.direction.x,
            1.0 / ray.direction.y,
            1.0 / ray.direction.z,
        );

        let t_lo = (self.lower - ray.origin).mul_element_wise(inv_dir);
        let t_hi = (self.upper - ray.origin).mul_element_wise(inv_dir);

        let t1 = Vector3::new(
            t_lo.x.min(t_hi.x),
            t_lo.y.min(t_hi.y),
            t_lo.z.min(t_hi.z),
        );
        let t2 = Vector3::new(
            t_lo.x.max(t_hi.x),
            t_lo.y.max(t_hi.y),
            t_lo.z.max(t_hi.z),
        );

        let t_near = t1.x.max(t1.y.max(t1.z));
        let t_far = t2.x.min(t2.y.min(t2.z));

        if t_near <= t_far && t_far >= 0.0 {
            Some((t_near.max(0.0), t_far))
        } else {
            None
        }
    }
}
