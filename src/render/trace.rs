//! # Ray Tracing Core
//!
//! Intersection and shading routines shared by the renderer and picking.
//! All rays here are world-space; instanced geometry is tested by mapping
//! the ray into object space through the instance's inverse transform,
//! which keeps `t` values comparable across instances because the
//! direction length is carried along (see [`Ray::transformed`]).

use cgmath::{ElementWise, InnerSpace, Transform, Vector3, Vector4};
use rand::rngs::StdRng;
use rand::Rng;

use crate::common::Ray;
use crate::render::renderer::RendererState;
use crate::scene::world::{PreparedScene, PreparedSurface, PreparedVolume};

/// Accumulated volume opacity beyond this is treated as fully opaque.
const TERMINATION_ALPHA: f32 = 0.99;

/// Offset applied along the normal before tracing occlusion rays, to step
/// off the surface the ray originated from.
const OCCLUSION_BIAS: f32 = 1e-3;

/// Nearest surface intersection along a world-space ray.
pub(crate) struct SurfaceHit {
    pub(crate) surface_index: usize,
    pub(crate) prim: usize,
    pub(crate) t: f32,
    pub(crate) u: f32,
    pub(crate) v: f32,
}

/// Möller–Trumbore ray/triangle test. Returns `(t, u, v)` with `t` in the
/// ray's own parameterization and `(u, v)` the barycentric weights of the
/// second and third vertex.
pub(crate) fn intersect_triangle(
    ray: &Ray,
    v0: Vector3<f32>,
    v1: Vector3<f32>,
    v2: Vector3<f32>,
) -> Option<(f32, f32, f32)> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    let origin = Vector3::new(ray.origin.x, ray.origin.y, ray.origin.z);
    let tvec = origin - v0;
    let u = tvec.dot(pvec) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let qvec = tvec.cross(edge1);
    let v = ray.direction.dot(qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = edge2.dot(qvec) * inv_det;
    if t <= 1e-6 {
        return None;
    }
    Some((t, u, v))
}

fn surface_hit_in_range(
    surface: &PreparedSurface,
    ray: &Ray,
    t_max: f32,
) -> Option<(usize, f32, f32, f32)> {
    let (t_near, _) = surface.world_bounds.intersect_ray(ray)?;
    if t_near > t_max {
        return None;
    }
    let local = ray.transformed(&surface.inverse);

    let mut nearest: Option<(usize, f32, f32, f32)> = None;
    let mut limit = t_max;
    for prim in 0..surface.mesh.triangle_count() {
        let [i0, i1, i2] = surface.mesh.triangle(prim);
        let hit = intersect_triangle(
            &local,
            surface.mesh.position(i0),
            surface.mesh.position(i1),
            surface.mesh.position(i2),
        );
        if let Some((t, u, v)) = hit {
            if t < limit {
                limit = t;
                nearest = Some((prim, t, u, v));
            }
        }
    }
    nearest
}

/// Closest surface hit over every instanced mesh, or `None`.
pub(crate) fn nearest_surface_hit(
    scene: &PreparedScene,
    ray: &Ray,
    t_max: f32,
) -> Option<SurfaceHit> {
    let mut best: Option<SurfaceHit> = None;
    let mut limit = t_max;
    for (surface_index, surface) in scene.surfaces.iter().enumerate() {
        if let Some((prim, t, u, v)) = surface_hit_in_range(surface, ray, limit) {
            limit = t;
            best = Some(SurfaceHit {
                surface_index,
                prim,
                t,
                u,
                v,
            });
        }
    }
    best
}

/// Whether anything blocks the ray before `t_max`. Cheaper than the
/// nearest-hit query because the first hit suffices.
pub(crate) fn occluded(scene: &PreparedScene, ray: &Ray, t_max: f32) -> bool {
    scene
        .surfaces
        .iter()
        .any(|surface| surface_hit_in_range(surface, ray, t_max).is_some())
}

/// Geometric normal of a hit, in world space, flipped to face the ray.
pub(crate) fn world_normal(surface: &PreparedSurface, prim: usize, ray: &Ray) -> Vector3<f32> {
    let [i0, i1, i2] = surface.mesh.triangle(prim);
    let v0 = surface.mesh.position(i0);
    let v1 = surface.mesh.position(i1);
    let v2 = surface.mesh.position(i2);
    let object_normal = (v1 - v0).cross(v2 - v0);
    let mut normal = (surface.normal_matrix * object_normal).normalize();
    if normal.dot(ray.direction) > 0.0 {
        normal = -normal;
    }
    normal
}

/// Shading color at a hit: interpolated vertex colors when the mesh has
/// them, the model's base color otherwise.
pub(crate) fn surface_color(surface: &PreparedSurface, hit: &SurfaceHit) -> Vector4<f32> {
    if surface.mesh.has_colors() {
        let [i0, i1, i2] = surface.mesh.triangle(hit.prim);
        let w = 1.0 - hit.u - hit.v;
        surface.mesh.color(i0) * w
            + surface.mesh.color(i1) * hit.u
            + surface.mesh.color(i2) * hit.v
    } else {
        surface.base_color
    }
}

fn cosine_hemisphere(normal: Vector3<f32>, rng: &mut StdRng) -> Vector3<f32> {
    let r1: f32 = rng.random();
    let r2: f32 = rng.random();
    let phi = 2.0 * std::f32::consts::PI * r1;
    let radius = r2.sqrt();
    let (x, y) = (radius * phi.cos(), radius * phi.sin());
    let z = (1.0 - r2).max(0.0).sqrt();

    let axis = if normal.x.abs() > 0.9 {
        Vector3::new(0.0, 1.0, 0.0)
    } else {
        Vector3::new(1.0, 0.0, 0.0)
    };
    let tangent = axis.cross(normal).normalize();
    let bitangent = normal.cross(tangent);
    tangent * x + bitangent * y + normal * z
}

/// Fraction of cosine-weighted hemisphere directions that escape the
/// scene within `ao_distance`. Zero samples means no darkening.
pub(crate) fn ambient_occlusion(
    scene: &PreparedScene,
    position: cgmath::Point3<f32>,
    normal: Vector3<f32>,
    renderer: &RendererState,
    rng: &mut StdRng,
) -> f32 {
    if renderer.ao_samples == 0 {
        return 1.0;
    }
    let origin = position + normal * OCCLUSION_BIAS;
    let mut visible = 0u32;
    for _ in 0..renderer.ao_samples {
        let direction = cosine_hemisphere(normal, rng);
        let ray = Ray::new(origin, direction);
        if !occluded(scene, &ray, renderer.ao_distance) {
            visible += 1;
        }
    }
    visible as f32 / renderer.ao_samples as f32
}

/// Front-to-back march of one volume over the world-`t` range `[t0, t1]`.
/// Returns the accumulated premultiplied color and the `t` of the first
/// sample that contributed any opacity.
pub(crate) fn march_volume(
    pv: &PreparedVolume,
    ray: &Ray,
    t0: f32,
    t1: f32,
) -> (Vector4<f32>, Option<f32>) {
    let mut accum = Vector4::new(0.0, 0.0, 0.0, 0.0);
    let mut first_hit = None;

    let step = pv.volume.min_spacing() / pv.sampling_rate;
    // Scale opacity so the apparent density does not change with the rate.
    let correction = 1.0 / pv.sampling_rate;

    let mut t = t0 + step * 0.5;
    while t < t1 {
        let world = ray.point_at(t);
        let object = pv.inverse.transform_point(world);
        let sample = pv.volume.sample_object(object);
        let mapped = pv.transfer_function.lookup(sample);

        let alpha = 1.0 - (1.0 - mapped.w.clamp(0.0, 1.0)).powf(correction);
        if alpha > 0.0 {
            if first_hit.is_none() {
                first_hit = Some(t);
            }
            let weight = alpha * (1.0 - accum.w);
            accum.x += mapped.x * weight;
            accum.y += mapped.y * weight;
            accum.z += mapped.z * weight;
            accum.w += weight;
            if accum.w > TERMINATION_ALPHA {
                break;
            }
        }
        t += step;
    }
    (accum, first_hit)
}

/// Traces one primary ray to a premultiplied RGBA sample and a depth
/// value (`f32::INFINITY` when nothing was hit).
pub(crate) fn shade(
    scene: &PreparedScene,
    renderer: &RendererState,
    ray: &Ray,
    rng: &mut StdRng,
) -> (Vector4<f32>, f32) {
    let surface = nearest_surface_hit(scene, ray, f32::INFINITY);
    let surface_t = surface.as_ref().map_or(f32::INFINITY, |hit| hit.t);

    // Background, then the surface over it.
    let mut color = renderer.background;
    let mut depth = f32::INFINITY;
    if let Some(hit) = &surface {
        let prepared = &scene.surfaces[hit.surface_index];
        let base = surface_color(prepared, hit);
        let position = ray.point_at(hit.t);
        let normal = world_normal(prepared, hit.prim, ray);
        let ao = ambient_occlusion(scene, position, normal, renderer, rng);
        let lit = Vector3::new(base.x, base.y, base.z)
            .mul_element_wise(scene.ambient)
            * ao;

        let alpha = base.w.clamp(0.0, 1.0);
        color = Vector4::new(
            lit.x * alpha + color.x * (1.0 - alpha),
            lit.y * alpha + color.y * (1.0 - alpha),
            lit.z * alpha + color.z * (1.0 - alpha),
            alpha + color.w * (1.0 - alpha),
        );
        depth = hit.t;
    }

    // Volumes in front of the surface, composited in entry order.
    let mut spans: Vec<(f32, f32, &PreparedVolume)> = Vec::new();
    for pv in &scene.volumes {
        if let Some((t_near, t_far)) = pv.world_bounds.intersect_ray(ray) {
            let t_far = t_far.min(surface_t);
            if t_far > t_near {
                spans.push((t_near, t_far, pv));
            }
        }
    }
    spans.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut volume_accum = Vector4::new(0.0, 0.0, 0.0, 0.0);
    for (t_near, t_far, pv) in spans {
        if volume_accum.w > TERMINATION_ALPHA {
            break;
        }
        let (contribution, first_hit) = march_volume(pv, ray, t_near, t_far);
        let transmittance = 1.0 - volume_accum.w;
        volume_accum += contribution * transmittance;
        if let Some(t) = first_hit {
            depth = depth.min(t);
        }
    }

    let transmittance = 1.0 - volume_accum.w;
    (volume_accum + color * transmittance, depth)
}
