// Copyright @yucwang 2026

use crate::core::error::TraceError;
use crate::core::scene::{
    Camera, Environment, Instance, Material, MaterialType, Scene, Shape,
};
use crate::math::constants::{Float, Vector3f};
use crate::math::transform::Transform;

fn quad_shape(positions: Vec<Vector3f>) -> Shape {
    let quads = (0..positions.len() / 4)
        .map(|q| [4 * q, 4 * q + 1, 4 * q + 2, 4 * q + 3])
        .collect();
    Shape {
        positions,
        normals: Vec::new(),
        texcoords: Vec::new(),
        triangles: Vec::new(),
        quads,
    }
}

fn matte(color: Vector3f) -> Material {
    Material {
        mtype: MaterialType::Matte,
        color,
        roughness: 1.0,
        ..Material::default()
    }
}

fn add_instance(scene: &mut Scene, shape: Shape, material: Material) {
    scene.shapes.push(shape);
    scene.materials.push(material);
    scene.instances.push(Instance {
        frame: Transform::default(),
        shape: scene.shapes.len() - 1,
        material: scene.materials.len() - 1,
    });
}

// The classic box with two blocks and a warm area light at the ceiling.
pub fn make_cornellbox() -> Scene {
    let mut scene = Scene::default();

    scene.cameras.push(Camera {
        frame: Transform::from_translation(Vector3f::new(0.0, 1.0, 3.9)),
        orthographic: false,
        lens: 0.035,
        film: 0.024,
        aspect: 1.0,
        focus: 3.9,
        aperture: 0.0,
    });

    let white = Vector3f::new(0.725, 0.71, 0.68);
    let red = Vector3f::new(0.63, 0.065, 0.05);
    let green = Vector3f::new(0.14, 0.45, 0.091);

    add_instance(&mut scene, quad_shape(vec![
        Vector3f::new(-1.0, 0.0, 1.0),
        Vector3f::new(1.0, 0.0, 1.0),
        Vector3f::new(1.0, 0.0, -1.0),
        Vector3f::new(-1.0, 0.0, -1.0),
    ]), matte(white));

    add_instance(&mut scene, quad_shape(vec![
        Vector3f::new(-1.0, 2.0, 1.0),
        Vector3f::new(-1.0, 2.0, -1.0),
        Vector3f::new(1.0, 2.0, -1.0),
        Vector3f::new(1.0, 2.0, 1.0),
    ]), matte(white));

    add_instance(&mut scene, quad_shape(vec![
        Vector3f::new(-1.0, 0.0, -1.0),
        Vector3f::new(1.0, 0.0, -1.0),
        Vector3f::new(1.0, 2.0, -1.0),
        Vector3f::new(-1.0, 2.0, -1.0),
    ]), matte(white));

    add_instance(&mut scene, quad_shape(vec![
        Vector3f::new(1.0, 0.0, -1.0),
        Vector3f::new(1.0, 0.0, 1.0),
        Vector3f::new(1.0, 2.0, 1.0),
        Vector3f::new(1.0, 2.0, -1.0),
    ]), matte(green));

    add_instance(&mut scene, quad_shape(vec![
        Vector3f::new(-1.0, 0.0, 1.0),
        Vector3f::new(-1.0, 0.0, -1.0),
        Vector3f::new(-1.0, 2.0, -1.0),
        Vector3f::new(-1.0, 2.0, 1.0),
    ]), matte(red));

    add_instance(&mut scene, quad_shape(vec![
        Vector3f::new(0.53, 0.6, 0.75),
        Vector3f::new(0.7, 0.6, 0.17),
        Vector3f::new(0.13, 0.6, 0.0),
        Vector3f::new(-0.05, 0.6, 0.57),
        Vector3f::new(-0.05, 0.0, 0.57),
        Vector3f::new(-0.05, 0.6, 0.57),
        Vector3f::new(0.13, 0.6, 0.0),
        Vector3f::new(0.13, 0.0, 0.0),
        Vector3f::new(0.53, 0.0, 0.75),
        Vector3f::new(0.53, 0.6, 0.75),
        Vector3f::new(-0.05, 0.6, 0.57),
        Vector3f::new(-0.05, 0.0, 0.57),
        Vector3f::new(0.7, 0.0, 0.17),
        Vector3f::new(0.7, 0.6, 0.17),
        Vector3f::new(0.53, 0.6, 0.75),
        Vector3f::new(0.53, 0.0, 0.75),
        Vector3f::new(0.13, 0.0, 0.0),
        Vector3f::new(0.13, 0.6, 0.0),
        Vector3f::new(0.7, 0.6, 0.17),
        Vector3f::new(0.7, 0.0, 0.17),
    ]), matte(white));

    add_instance(&mut scene, quad_shape(vec![
        Vector3f::new(-0.53, 1.2, 0.09),
        Vector3f::new(0.04, 1.2, -0.09),
        Vector3f::new(-0.14, 1.2, -0.67),
        Vector3f::new(-0.71, 1.2, -0.49),
        Vector3f::new(-0.53, 0.0, 0.09),
        Vector3f::new(-0.53, 1.2, 0.09),
        Vector3f::new(-0.71, 1.2, -0.49),
        Vector3f::new(-0.71, 0.0, -0.49),
        Vector3f::new(-0.71, 0.0, -0.49),
        Vector3f::new(-0.71, 1.2, -0.49),
        Vector3f::new(-0.14, 1.2, -0.67),
        Vector3f::new(-0.14, 0.0, -0.67),
        Vector3f::new(-0.14, 0.0, -0.67),
        Vector3f::new(-0.14, 1.2, -0.67),
        Vector3f::new(0.04, 1.2, -0.09),
        Vector3f::new(0.04, 0.0, -0.09),
        Vector3f::new(0.04, 0.0, -0.09),
        Vector3f::new(0.04, 1.2, -0.09),
        Vector3f::new(-0.53, 1.2, 0.09),
        Vector3f::new(-0.53, 0.0, 0.09),
    ]), matte(white));

    let mut light = matte(Vector3f::zeros());
    light.emission = Vector3f::new(17.0, 12.0, 4.0);
    add_instance(&mut scene, quad_shape(vec![
        Vector3f::new(-0.25, 1.99, 0.25),
        Vector3f::new(-0.25, 1.99, -0.25),
        Vector3f::new(0.25, 1.99, -0.25),
        Vector3f::new(0.25, 1.99, 0.25),
    ]), light);

    scene
}

// A diffuse plate inside a uniform white environment; with the furnace
// sampler every sample evaluates to exactly albedo times the environment
// emission.
pub fn make_furnace(albedo: Float) -> Scene {
    let mut scene = Scene::default();

    scene.cameras.push(Camera {
        frame: Transform::from_translation(Vector3f::new(0.0, 0.0, 3.0)),
        orthographic: false,
        lens: 0.05,
        film: 0.036,
        aspect: 1.0,
        focus: 3.0,
        aperture: 0.0,
    });

    add_instance(&mut scene, quad_shape(vec![
        Vector3f::new(-1.0, -1.0, 0.0),
        Vector3f::new(1.0, -1.0, 0.0),
        Vector3f::new(1.0, 1.0, 0.0),
        Vector3f::new(-1.0, 1.0, 0.0),
    ]), matte(Vector3f::new(albedo, albedo, albedo)));

    scene.environments.push(Environment {
        frame: Transform::default(),
        emission: Vector3f::new(1.0, 1.0, 1.0),
        emission_tex: None,
    });

    scene
}

pub fn make_preset(name: &str) -> Result<Scene, TraceError> {
    match name {
        "cornellbox" => Ok(make_cornellbox()),
        "furnace" => Ok(make_furnace(0.75)),
        _ => Err(TraceError::UnknownPreset(name.to_string())),
    }
}
