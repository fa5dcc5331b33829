//! Full-pipeline test: builds the tutorial scene through the public API
//! and checks rendering, accumulation, cache invalidation, and picking
//! against each other.

use std::sync::Arc;

use cairn::{
    Camera, ChannelLayout, Data, DataType, FrameBuffer, FrameBufferFormat, GeometricModel,
    Geometry, Group, Handle, Instance, Light, PickedModel, Renderer, TransferFunction, Volume,
    VolumetricModel, World,
};
use cgmath::{Vector2, Vector3, Vector4};

const WIDTH: usize = 32;
const HEIGHT: usize = 24;

struct Scene {
    world: Handle<World>,
    camera: Handle<Camera>,
    renderer: Handle<Renderer>,
    transfer_function: Handle<TransferFunction>,
}

/// File-style volume payload: a throwaway header followed by 8³ density
/// bytes, bound zero-copy at an offset.
fn volume_bytes() -> Arc<[u8]> {
    let mut blob = vec![0u8; 26];
    for z in 0..8 {
        for y in 0..8 {
            for x in 0..8usize {
                let center = |i: usize| i as f32 - 3.5;
                let r2 = center(x).powi(2) + center(y).powi(2) + center(z).powi(2);
                blob.push(if r2 < 9.0 { 255 } else { 0 });
            }
        }
    }
    Arc::from(blob)
}

fn build_scene() -> Scene {
    let vertices: [[f32; 3]; 4] = [
        [-1.0, -1.0, 3.0],
        [-1.0, 1.0, 3.0],
        [1.0, -1.0, 3.0],
        [0.1, 0.1, 0.3],
    ];
    let colors: [[f32; 4]; 4] = [
        [0.9, 0.5, 0.5, 1.0],
        [0.8, 0.8, 0.8, 1.0],
        [0.8, 0.8, 0.8, 1.0],
        [0.5, 0.9, 0.5, 1.0],
    ];
    let indices: [[u32; 3]; 2] = [[0, 1, 2], [1, 2, 3]];

    let mesh = Geometry::mesh();
    mesh.set(
        "vertex.position",
        Data::from_slice(DataType::Vec3f, &vertices).unwrap(),
    )
    .unwrap();
    mesh.set(
        "vertex.color",
        Data::from_slice(DataType::Vec4f, &colors).unwrap(),
    )
    .unwrap();
    mesh.set(
        "index",
        Data::from_slice(DataType::Vec3ui, &indices).unwrap(),
    )
    .unwrap();
    mesh.commit().unwrap();
    let mesh_model = GeometricModel::new(&mesh);
    mesh_model.commit().unwrap();

    let volume = Volume::structured_regular();
    volume
        .set(
            "data",
            Data::shared(volume_bytes(), 26, DataType::UChar, [8, 8, 8]).unwrap(),
        )
        .unwrap();
    volume.set("gridOrigin", Vector3::new(-3.5, -1.0, 2.0)).unwrap();
    volume
        .set("gridSpacing", Vector3::new(2.0 / 7.0, 2.0 / 7.0, 2.0 / 7.0))
        .unwrap();
    volume.commit().unwrap();

    let transfer_function = TransferFunction::piecewise_linear();
    transfer_function
        .set(
            "color",
            Data::from_slice(DataType::Vec3f, &[[0.1f32, 0.2, 0.8], [0.9, 0.4, 0.1]]).unwrap(),
        )
        .unwrap();
    transfer_function
        .set(
            "opacity",
            Data::from_slice(DataType::Float, &[0.0f32, 0.9]).unwrap(),
        )
        .unwrap();
    transfer_function
        .set("valueRange", Vector2::new(0.0, 255.0))
        .unwrap();
    transfer_function.commit().unwrap();

    let volume_model = VolumetricModel::new(&volume);
    volume_model
        .set("transferFunction", &transfer_function)
        .unwrap();
    volume_model.commit().unwrap();

    let group = Group::new();
    group.set("geometry", vec![mesh_model]).unwrap();
    group.set("volume", vec![volume_model]).unwrap();
    group.commit().unwrap();
    let instance = Instance::new(&group);
    instance.commit().unwrap();

    let light = Light::ambient();
    light.commit().unwrap();

    let world = World::new();
    world.set("instance", vec![instance]).unwrap();
    world.set("light", vec![light]).unwrap();
    world.commit().unwrap();

    let camera = Camera::perspective();
    camera
        .set("aspect", WIDTH as f32 / HEIGHT as f32)
        .unwrap();
    camera.set("position", Vector3::new(0.0, 0.0, 0.0)).unwrap();
    camera.set("direction", Vector3::new(0.1, 0.0, 1.0)).unwrap();
    camera.commit().unwrap();

    let renderer = Renderer::ambient_occlusion();
    renderer.set("aoSamples", 1i32).unwrap();
    renderer
        .set("backgroundColor", Vector4::new(1.0, 1.0, 1.0, 1.0))
        .unwrap();
    renderer.commit().unwrap();

    Scene {
        world,
        camera,
        renderer,
        transfer_function,
    }
}

fn accum_buffer() -> FrameBuffer {
    FrameBuffer::new(
        WIDTH,
        HEIGHT,
        FrameBufferFormat::Srgba,
        ChannelLayout {
            accum: true,
            depth: true,
        },
    )
    .unwrap()
}

#[test]
fn test_tutorial_scene_renders_and_accumulates() {
    let scene = build_scene();
    let mut fb = accum_buffer();

    for _ in 0..4 {
        cairn::render_frame(&mut fb, &scene.renderer, &scene.camera, &scene.world).unwrap();
    }
    assert_eq!(fb.accumulation_count(), 4);

    // Against a white background every pixel ends up opaque.
    let pixels = fb.map_color();
    assert_eq!(pixels.len(), WIDTH * HEIGHT * 4);
    assert!(pixels.chunks_exact(4).all(|p| p[3] == 255));
    // The scene is visible: not every pixel is pure background.
    assert!(pixels.chunks_exact(4).any(|p| p[0] != 255 || p[1] != 255));
}

#[test]
fn test_two_sittings_match_one() {
    let scene = build_scene();
    let mut split = accum_buffer();
    let mut straight = accum_buffer();

    for _ in 0..2 {
        cairn::render_frame(&mut split, &scene.renderer, &scene.camera, &scene.world).unwrap();
    }
    for _ in 0..2 {
        cairn::render_frame(&mut split, &scene.renderer, &scene.camera, &scene.world).unwrap();
    }
    for _ in 0..4 {
        cairn::render_frame(&mut straight, &scene.renderer, &scene.camera, &scene.world)
            .unwrap();
    }
    assert_eq!(split.map_color(), straight.map_color());
}

#[test]
fn test_transfer_function_edit_changes_next_frame() {
    let scene = build_scene();
    let mut fb = accum_buffer();
    cairn::render_frame(&mut fb, &scene.renderer, &scene.camera, &scene.world).unwrap();
    let before = fb.map_color().to_vec();

    // Staged edits alone must fail the render, not silently show through.
    scene
        .transfer_function
        .set(
            "opacity",
            Data::from_slice(DataType::Float, &[0.0f32, 0.0]).unwrap(),
        )
        .unwrap();
    let err =
        cairn::render_frame(&mut fb, &scene.renderer, &scene.camera, &scene.world).unwrap_err();
    assert!(matches!(err, cairn::Error::UncommittedState { .. }));

    scene.transfer_function.commit().unwrap();
    fb.reset_accumulation();
    cairn::render_frame(&mut fb, &scene.renderer, &scene.camera, &scene.world).unwrap();
    assert_ne!(fb.map_color(), before.as_slice());
}

#[test]
fn test_center_pick_agrees_with_depth() {
    let scene = build_scene();
    let mut fb = accum_buffer();
    cairn::render_frame(&mut fb, &scene.renderer, &scene.camera, &scene.world).unwrap();

    let result = cairn::pick(&fb, &scene.renderer, &scene.camera, &scene.world, 0.5, 0.5)
        .unwrap()
        .expect("the triangles cover the image center");
    assert!(matches!(result.model, PickedModel::Geometric(_)));
    // The center ray crosses the slanted second triangle.
    assert_eq!(result.prim_id, 1);
    assert!(result.world_position.z > 0.3 && result.world_position.z < 3.0);

    // The depth channel saw the same hit through the same pixel.
    let depth = fb.map_depth().unwrap();
    let (px, py) = (WIDTH / 2, HEIGHT / 2);
    assert!(depth[py * WIDTH + px].is_finite());
}

#[test]
fn test_world_bounds_cover_mesh_and_volume() {
    let scene = build_scene();
    let bounds = scene.world.bounds().unwrap();
    assert!(bounds.lower.x <= -3.5);
    assert!(bounds.upper.x >= 1.0);
    assert!(bounds.upper.z >= 4.0);
}
