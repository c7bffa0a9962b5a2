// Copyright @yucwang 2026

use crate::core::bvh::{intersect_instance, SceneBvh};
use crate::core::scene::{
    environment_direction, eval_element_normal, eval_position, Scene,
};
use crate::math::constants::{Float, Vector2f, Vector3f, PI};
use crate::math::ray::Ray3f;
use crate::math::warp::{
    sample_discrete, sample_discrete_pdf, sample_sphere, sample_sphere_pdf,
    sample_triangle, sample_uniform_index, sample_uniform_index_pdf,
};

// Bound on the pdf march below; degenerate geometry cannot loop forever.
const MAX_LIGHT_MARCH: usize = 100;

// One emissive instance or one non-black environment. The cdf runs over
// the record's own elements (shape elements by area, environment texels by
// peak emission times solid angle); records themselves are picked
// uniformly.
pub struct LightRecord {
    pub instance: Option<usize>,
    pub environment: Option<usize>,
    pub elements_cdf: Vec<Float>,
}

pub struct LightTable {
    pub lights: Vec<LightRecord>,
}

impl LightTable {
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

// Collects emitters once per scene; immutable afterwards.
pub fn make_lights(scene: &Scene) -> LightTable {
    let mut lights = Vec::new();

    for (handle, instance) in scene.instances.iter().enumerate() {
        let material = &scene.materials[instance.material];
        if material.emission == Vector3f::zeros() {
            continue;
        }
        let shape = &scene.shapes[instance.shape];
        if shape.num_elements() == 0 {
            continue;
        }
        let mut elements_cdf = Vec::with_capacity(shape.num_elements());
        let mut total = 0.0;
        for element in 0..shape.num_elements() {
            total += shape.element_area(element);
            elements_cdf.push(total);
        }
        lights.push(LightRecord {
            instance: Some(handle),
            environment: None,
            elements_cdf,
        });
    }

    for (handle, environment) in scene.environments.iter().enumerate() {
        if environment.emission == Vector3f::zeros() {
            continue;
        }
        let mut elements_cdf = Vec::new();
        if let Some(tex_idx) = environment.emission_tex {
            let texture = &scene.textures[tex_idx];
            elements_cdf.reserve(texture.width * texture.height);
            let mut total = 0.0;
            for idx in 0..texture.width * texture.height {
                let ij = (idx % texture.width, idx / texture.width);
                let theta = (ij.1 as Float + 0.5) * PI / texture.height as Float;
                let value = texture.lookup_texel(ij.0, ij.1);
                total += value.x.max(value.y).max(value.z) * theta.sin();
                elements_cdf.push(total);
            }
        }
        lights.push(LightRecord {
            instance: None,
            environment: Some(handle),
            elements_cdf,
        });
    }

    log::info!("collected {} light records", lights.len());
    LightTable { lights }
}

// Direction towards a sampled emitter point, solid-angle distributed as
// described by `sample_lights_pdf`.
pub fn sample_lights(
    scene: &Scene, lights: &LightTable, position: &Vector3f,
    rl: Float, rel: Float, ruv: &Vector2f,
) -> Vector3f {
    if lights.is_empty() {
        return Vector3f::zeros();
    }

    let light = &lights.lights[sample_uniform_index(lights.lights.len(), rl)];
    if let Some(instance_idx) = light.instance {
        let instance = &scene.instances[instance_idx];
        let shape = &scene.shapes[instance.shape];
        let element = sample_discrete(&light.elements_cdf, rel);
        let uv = if element < shape.triangles.len() {
            sample_triangle(ruv)
        } else {
            *ruv
        };
        let lposition = eval_position(scene, instance, element, &uv);
        (lposition - position).normalize()
    } else if let Some(env_idx) = light.environment {
        let environment = &scene.environments[env_idx];
        match environment.emission_tex {
            Some(tex_idx) if !light.elements_cdf.is_empty() => {
                let texture = &scene.textures[tex_idx];
                let idx = sample_discrete(&light.elements_cdf, rel);
                environment_direction(environment, texture, idx)
            }
            _ => sample_sphere(ruv),
        }
    } else {
        Vector3f::zeros()
    }
}

// Solid-angle density of `sample_lights` at `position` along `direction`;
// consistent with it by construction so MIS weights stay unbiased.
pub fn sample_lights_pdf(
    scene: &Scene, bvh: &SceneBvh, lights: &LightTable,
    position: &Vector3f, direction: &Vector3f,
) -> Float {
    let mut pdf = 0.0;

    for light in &lights.lights {
        if let Some(instance_idx) = light.instance {
            let instance = &scene.instances[instance_idx];
            let area = light.elements_cdf.last().copied().unwrap_or(0.0);
            if area <= 0.0 {
                continue;
            }

            // March through every surface of this emitter along the ray,
            // converting each hit's area measure to solid angle.
            let mut lpdf = 0.0;
            let mut next_position = *position;
            for _ in 0..MAX_LIGHT_MARCH {
                let ray = Ray3f::new(next_position, *direction);
                let intersection = match intersect_instance(bvh, scene, instance_idx, &ray, false) {
                    Some(intersection) => intersection,
                    None => break,
                };
                let lposition = eval_position(scene, instance, intersection.element, &intersection.uv);
                let lnormal = eval_element_normal(scene, instance, intersection.element);
                let cosine = lnormal.dot(direction).abs();
                if cosine > 1e-6 {
                    lpdf += (lposition - position).norm_squared() / (cosine * area);
                }
                next_position = lposition + direction * 1e-3;
            }
            pdf += lpdf;
        } else if let Some(env_idx) = light.environment {
            let environment = &scene.environments[env_idx];
            match environment.emission_tex {
                Some(tex_idx) if !light.elements_cdf.is_empty() => {
                    let texture = &scene.textures[tex_idx];
                    let wl = environment.frame.inv_apply_vector(*direction);
                    let mut texcoord = Vector2f::new(
                        wl.z.atan2(wl.x) / (2.0 * PI),
                        wl.y.max(-1.0).min(1.0).acos() / PI,
                    );
                    if texcoord.x < 0.0 {
                        texcoord.x += 1.0;
                    }
                    let i = ((texcoord.x * texture.width as Float) as usize)
                        .min(texture.width - 1);
                    let j = ((texcoord.y * texture.height as Float) as usize)
                        .min(texture.height - 1);
                    let total = light.elements_cdf.last().copied().unwrap_or(0.0);
                    if total > 0.0 {
                        let prob = sample_discrete_pdf(&light.elements_cdf, j * texture.width + i)
                            / total;
                        let angle = (2.0 * PI / texture.width as Float)
                            * (PI / texture.height as Float)
                            * (PI * (j as Float + 0.5) / texture.height as Float).sin();
                        if angle > 0.0 {
                            pdf += prob / angle;
                        }
                    }
                }
                _ => {
                    pdf += sample_sphere_pdf();
                }
            }
        }
    }

    pdf * sample_uniform_index_pdf(lights.lights.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bvh::make_scene_bvh;
    use crate::core::rng::StreamRng;
    use crate::core::scene::{Environment, Instance, Material, MaterialType, Shape};
    use crate::math::transform::Transform;

    fn quad_light_scene() -> Scene {
        let mut scene = Scene::default();
        scene.shapes.push(Shape {
            positions: vec![
                Vector3f::new(-0.5, 5.0, -0.5),
                Vector3f::new(0.5, 5.0, -0.5),
                Vector3f::new(0.5, 5.0, 0.5),
                Vector3f::new(-0.5, 5.0, 0.5),
            ],
            normals: Vec::new(),
            texcoords: Vec::new(),
            triangles: Vec::new(),
            quads: vec![[0, 1, 2, 3]],
        });
        scene.materials.push(Material {
            mtype: MaterialType::Matte,
            emission: Vector3f::new(10.0, 10.0, 10.0),
            color: Vector3f::new(0.0, 0.0, 0.0),
            ..Material::default()
        });
        scene.instances.push(Instance {
            frame: Transform::default(),
            shape: 0,
            material: 0,
        });
        scene
    }

    #[test]
    fn test_lights_collects_emissive_instances_only() {
        let mut scene = quad_light_scene();
        scene.materials.push(Material {
            mtype: MaterialType::Matte,
            color: Vector3f::new(0.5, 0.5, 0.5),
            ..Material::default()
        });
        scene.instances.push(Instance {
            frame: Transform::default(),
            shape: 0,
            material: 1,
        });

        let lights = make_lights(&scene);
        assert_eq!(lights.lights.len(), 1);
        assert_eq!(lights.lights[0].instance, Some(0));
        let total = *lights.lights[0].elements_cdf.last().unwrap();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_sample_pdf_consistency_integrates_solid_angle() {
        let scene = quad_light_scene();
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let origin = Vector3f::zeros();

        // E[1 / pdf] over sampled directions equals the subtended solid
        // angle. For a unit quad at height 5 the closed form is
        // 4 atan(s^2 / (4 h sqrt(h^2 + s^2 / 2))) with s = 1, h = 5.
        let expected = 4.0
            * ((1.0 as Float) / (4.0 * 5.0 * (25.0 as Float + 0.5).sqrt())).atan();

        let mut rng = StreamRng::new(91);
        let mut sum = 0.0;
        let count = 10000;
        for _ in 0..count {
            let dir = sample_lights(
                &scene, &lights, &origin, rng.next_f32(), rng.next_f32(), &rng.next_2f());
            let pdf = sample_lights_pdf(&scene, &bvh, &lights, &origin, &dir);
            assert!(pdf > 0.0);
            sum += 1.0 / pdf;
        }
        let estimate = sum / count as Float;
        assert!(
            (estimate - expected).abs() < 0.05 * expected,
            "estimate {} vs expected {}",
            estimate,
            expected
        );
    }

    #[test]
    fn test_uniform_environment_pdf() {
        let mut scene = Scene::default();
        scene.environments.push(Environment {
            frame: Transform::default(),
            emission: Vector3f::new(1.0, 1.0, 1.0),
            emission_tex: None,
        });
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);

        let mut rng = StreamRng::new(5);
        for _ in 0..32 {
            let dir = sample_lights(
                &scene, &lights, &Vector3f::zeros(),
                rng.next_f32(), rng.next_f32(), &rng.next_2f());
            assert!((dir.norm() - 1.0).abs() < 1e-4);
            let pdf = sample_lights_pdf(&scene, &bvh, &lights, &Vector3f::zeros(), &dir);
            assert!((pdf - 1.0 / (4.0 * PI)).abs() < 1e-6);
        }
    }
}
