//! End-to-end walkthrough: two shaded triangles next to a procedural
//! volume, rendered with progressive accumulation, picked at the image
//! center, and written out as PPM images.
//!
//! Run with `cargo run --example tutorial`; writes `first_frame.ppm` and
//! `accumulated_frame.ppm` into the working directory.

use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result};
use cairn::{
    Camera, ChannelLayout, Data, DataType, FrameBuffer, FrameBufferFormat, GeometricModel,
    Geometry, Group, Instance, Light, PickedModel, Renderer, TransferFunction, Volume,
    VolumetricModel, World,
};
use cgmath::{Vector2, Vector3, Vector4};

const IMAGE_SIZE: (usize, usize) = (1024, 768);
const ACCUMULATION_FRAMES: usize = 10;

fn main() -> Result<()> {
    cairn::init(&cairn::InitOptions::default())?;

    // Two triangles sharing an edge, with per-vertex colors.
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
    mesh.set("vertex.position", Data::from_slice(DataType::Vec3f, &vertices)?)?;
    mesh.set("vertex.color", Data::from_slice(DataType::Vec4f, &colors)?)?;
    mesh.set("index", Data::from_slice(DataType::Vec3ui, &indices)?)?;
    mesh.commit()?;

    let mesh_model = GeometricModel::new(&mesh);
    mesh_model.commit()?;

    // A procedural density field, mapped through a blue-to-orange transfer
    // function and placed to the left of the triangles.
    let volume = Volume::structured_regular();
    volume.set("data", wavelet_field(32)?)?;
    volume.set("gridOrigin", Vector3::new(-3.5, -1.0, 2.0))?;
    volume.set("gridSpacing", Vector3::new(2.0 / 31.0, 2.0 / 31.0, 2.0 / 31.0))?;
    volume.commit()?;

    let tf = TransferFunction::piecewise_linear();
    tf.set(
        "color",
        Data::from_slice(
            DataType::Vec3f,
            &[[0.1f32, 0.2, 0.8], [0.9, 0.9, 0.9], [0.9, 0.4, 0.1]],
        )?,
    )?;
    tf.set(
        "opacity",
        Data::from_slice(DataType::Float, &[0.0f32, 0.05, 0.8])?,
    )?;
    tf.set("valueRange", Vector2::new(0.0, 1.0))?;
    tf.commit()?;

    let volume_model = VolumetricModel::new(&volume);
    volume_model.set("transferFunction", &tf)?;
    volume_model.commit()?;

    let group = Group::new();
    group.set("geometry", vec![mesh_model])?;
    group.set("volume", vec![volume_model])?;
    group.commit()?;

    let instance = Instance::new(&group);
    instance.commit()?;

    let light = Light::ambient();
    light.commit()?;

    let world = World::new();
    world.set("instance", vec![instance])?;
    world.set("light", vec![light])?;
    world.commit()?;

    let bounds = world.bounds()?;
    println!("world bounds: {:?}..{:?}", bounds.lower, bounds.upper);

    let (width, height) = IMAGE_SIZE;
    let camera = Camera::perspective();
    camera.set("aspect", width as f32 / height as f32)?;
    camera.set("position", Vector3::new(0.0, 0.0, 0.0))?;
    camera.set("direction", Vector3::new(0.1, 0.0, 1.0))?;
    camera.set("up", Vector3::new(0.0, 1.0, 0.0))?;
    camera.commit()?;

    let renderer = Renderer::ambient_occlusion();
    renderer.set("aoSamples", 1i32)?;
    renderer.set("backgroundColor", Vector4::new(1.0, 1.0, 1.0, 1.0))?;
    renderer.commit()?;

    let mut framebuffer = FrameBuffer::new(
        width,
        height,
        FrameBufferFormat::Srgba,
        ChannelLayout {
            accum: true,
            depth: false,
        },
    )?;

    cairn::render_frame(&mut framebuffer, &renderer, &camera, &world)?;
    write_ppm("first_frame.ppm", &framebuffer).context("writing first_frame.ppm")?;

    for _ in 1..ACCUMULATION_FRAMES {
        cairn::render_frame(&mut framebuffer, &renderer, &camera, &world)?;
    }
    write_ppm("accumulated_frame.ppm", &framebuffer)
        .context("writing accumulated_frame.ppm")?;

    match cairn::pick(&framebuffer, &renderer, &camera, &world, 0.5, 0.5)? {
        Some(result) => {
            let kind = match result.model {
                PickedModel::Geometric(_) => "geometry",
                PickedModel::Volumetric(_) => "volume",
            };
            println!(
                "picked {} primitive {} at {:?}",
                kind, result.prim_id, result.world_position
            );
        }
        None => println!("picked nothing at the image center"),
    }

    Ok(())
}

/// A smooth pseudo-wavelet density in `[0, 1]` over an n³ grid.
fn wavelet_field(n: usize) -> Result<Data> {
    let mut samples = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let to = |i: usize| (i as f32 / (n - 1) as f32) * 2.0 - 1.0;
                let (px, py, pz) = (to(x), to(y), to(z));
                let r2 = px * px + py * py + pz * pz;
                let value = (1.0 - r2).max(0.0) * (0.5 + 0.5 * (6.0 * px).sin() * (6.0 * py).cos());
                samples.push(value);
            }
        }
    }
    Ok(Data::from_slice_3d(DataType::Float, [n, n, n], &samples)?)
}

/// Binary PPM writer. Frame buffer rows are bottom-first, PPM expects
/// top-first, so rows are written in reverse.
fn write_ppm(path: &str, framebuffer: &FrameBuffer) -> Result<()> {
    let (width, height) = (framebuffer.width(), framebuffer.height());
    let pixels = framebuffer.map_color();

    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "P6\n{width} {height}\n255")?;
    for row in (0..height).rev() {
        for x in 0..width {
            let i = (row * width + x) * 4;
            out.write_all(&pixels[i..i + 3])?;
        }
    }
    println!("wrote {path}");
    Ok(())
}
