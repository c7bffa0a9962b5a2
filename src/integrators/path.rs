// Copyright @yucwang 2026
//
// The stochastic transport estimators share one bounce loop; a strategy
// value picks the direct-lighting estimator, the continuation mixture and
// the emission gating, which is all that separates the variants. Delta
// lobes always continue deterministically and never mix with light
// sampling.

use crate::core::bvh::{intersect_scene, SceneBvh};
use crate::core::lights::{sample_lights, sample_lights_pdf, LightTable};
use crate::core::rng::StreamRng;
use crate::core::scene::{
    eval_environment, eval_material, eval_material_at, eval_shading_normal,
    eval_shading_normal_at, eval_shading_position, MaterialPoint, MaterialType, Scene,
    SceneIntersection,
};
use crate::integrators::{TraceParams, TraceResult};
use crate::materials::volume::{
    eval_transmittance, sample_transmittance, sample_transmittance_pdf,
};
use crate::materials::{
    eval_bsdfcos, eval_delta, eval_emission, eval_scattering, is_delta, is_volumetric,
    sample_bsdfcos, sample_bsdfcos_pdf, sample_delta, sample_delta_pdf, sample_scattering,
    sample_scattering_pdf,
};
use crate::math::constants::{Float, Vector3f};
use crate::math::ray::Ray3f;

const MAX_OPACITY_BOUNCES: usize = 128;
const RR_START_BOUNCE: usize = 3;
const RR_MAX_PROB: Float = 0.99;

#[derive(Clone, Copy, PartialEq, Eq)]
enum DirectLight {
    None,
    Single,
    Mis,
}

#[derive(Clone, Copy)]
struct PathStrategy {
    direct: DirectLight,
    // 50/50 light/BSDF continuation weighted by the balance heuristic;
    // false means BSDF sampling alone.
    mixture: bool,
    // suppress emission already accounted for by a direct estimate
    gate_emission: bool,
    volumes: bool,
    opacity: bool,
    clamp_roughness: bool,
    force_matte: bool,
    // reuse the BSDF-sampled MIS intersection as the next bounce's hit
    lookahead: bool,
}

const NAIVE: PathStrategy = PathStrategy {
    direct: DirectLight::None,
    mixture: false,
    gate_emission: false,
    volumes: false,
    opacity: true,
    clamp_roughness: false,
    force_matte: false,
    lookahead: false,
};

const PATH: PathStrategy = PathStrategy {
    direct: DirectLight::None,
    mixture: true,
    gate_emission: false,
    volumes: true,
    opacity: true,
    clamp_roughness: true,
    force_matte: false,
    lookahead: false,
};

const PATHDIRECT: PathStrategy = PathStrategy {
    direct: DirectLight::Single,
    mixture: true,
    gate_emission: true,
    volumes: true,
    opacity: true,
    clamp_roughness: true,
    force_matte: false,
    lookahead: false,
};

const PATHMIS: PathStrategy = PathStrategy {
    direct: DirectLight::Mis,
    mixture: false,
    gate_emission: true,
    volumes: true,
    opacity: true,
    clamp_roughness: true,
    force_matte: false,
    lookahead: true,
};

const PATHTEST: PathStrategy = PathStrategy {
    direct: DirectLight::None,
    mixture: true,
    gate_emission: false,
    volumes: false,
    opacity: false,
    clamp_roughness: false,
    force_matte: true,
    lookahead: false,
};

const LIGHTSAMPLING: PathStrategy = PathStrategy {
    direct: DirectLight::Single,
    mixture: false,
    gate_emission: true,
    volumes: false,
    opacity: true,
    clamp_roughness: false,
    force_matte: false,
    lookahead: false,
};

fn is_finite(v: &Vector3f) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

fn mis_heuristic(this_pdf: Float, other_pdf: Float) -> Float {
    (this_pdf * this_pdf) / (this_pdf * this_pdf + other_pdf * other_pdf)
}

// Emission seen along `incoming` from `hit` (the environment on a miss).
fn emission_along(
    scene: &Scene, hit: &Option<SceneIntersection>, incoming: &Vector3f,
) -> Vector3f {
    match hit {
        None => eval_environment(scene, incoming),
        Some(intersection) => {
            let instance = &scene.instances[intersection.instance];
            let reverse = -incoming;
            let material = eval_material_at(scene, instance, intersection.element, &intersection.uv);
            let normal = eval_shading_normal_at(
                scene, instance, intersection.element, &intersection.uv, &reverse);
            eval_emission(&material, &normal, &reverse)
        }
    }
}

fn trace_path_loop(
    scene: &Scene, bvh: &SceneBvh, lights: &LightTable, ray_in: &Ray3f,
    rng: &mut StreamRng, params: &TraceParams, strategy: &PathStrategy,
) -> TraceResult {
    let mut radiance = Vector3f::zeros();
    let mut weight = Vector3f::new(1.0, 1.0, 1.0);
    let mut ray = *ray_in;
    let mut volume_stack: Vec<MaterialPoint> = Vec::new();
    let mut max_roughness: Float = 0.0;
    let mut hit = false;
    let mut hit_albedo = Vector3f::zeros();
    let mut hit_normal = Vector3f::zeros();
    let mut opbounce = 0;
    let mut next_emission = true;
    let mut cached_intersection: Option<Option<SceneIntersection>> = None;

    let mut bounce = 0;
    while bounce < params.bounces {
        // intersect next point, or reuse the MIS look-ahead hit
        let intersection = match cached_intersection.take() {
            Some(cached) => cached,
            None => intersect_scene(bvh, scene, &ray, false),
        };
        let mut intersection = match intersection {
            Some(intersection) => intersection,
            None => {
                if (bounce > 0 || !params.envhidden)
                    && (!strategy.gate_emission || next_emission)
                {
                    radiance += weight.component_mul(&eval_environment(scene, &ray.dir()));
                }
                break;
            }
        };

        // free-flight transmission while inside a medium
        let mut in_volume = false;
        if strategy.volumes {
            if let Some(vsdf) = volume_stack.last() {
                let distance = sample_transmittance(
                    &vsdf.density, intersection.distance, rng.next_f32(), rng.next_f32());
                let pdf = sample_transmittance_pdf(&vsdf.density, distance, intersection.distance);
                if pdf <= 0.0 {
                    break;
                }
                weight = weight.component_mul(&eval_transmittance(&vsdf.density, distance)) / pdf;
                in_volume = distance < intersection.distance;
                intersection.distance = distance;
            }
        }

        if !in_volume {
            // surface event
            let outgoing = -ray.dir();
            let position = eval_shading_position(scene, &intersection, &outgoing);
            let normal = eval_shading_normal(scene, &intersection, &outgoing);
            let mut material = eval_material(scene, &intersection);
            if strategy.force_matte {
                material.mtype = MaterialType::Matte;
            }

            // clamp roughness monotonically along the path to tame caustics
            if strategy.clamp_roughness && params.nocaustics {
                max_roughness = material.roughness.max(max_roughness);
                material.roughness = max_roughness;
            }

            // stochastic alpha: retry the same bounce through the surface
            if strategy.opacity && material.opacity < 1.0 && rng.next_f32() >= material.opacity {
                opbounce += 1;
                if opbounce > MAX_OPACITY_BOUNCES {
                    break;
                }
                ray = Ray3f::new(ray.at(intersection.distance) + ray.dir() * 1e-2, ray.dir());
                continue;
            }

            if bounce == 0 {
                hit = true;
                hit_albedo = material.color;
                hit_normal = normal;
            }

            if !strategy.gate_emission || next_emission {
                radiance += weight.component_mul(&eval_emission(&material, &normal, &outgoing));
            }

            let delta = is_delta(&material);
            let incoming;
            if !delta {
                // one-sample direct estimate, its own pdf only
                if strategy.direct == DirectLight::Single {
                    let l_incoming = sample_lights(
                        scene, lights, &position, rng.next_f32(), rng.next_f32(), &rng.next_2f());
                    if l_incoming != Vector3f::zeros() {
                        let pdf = sample_lights_pdf(scene, bvh, lights, &position, &l_incoming);
                        let bsdfcos = eval_bsdfcos(&material, &normal, &outgoing, &l_incoming);
                        if bsdfcos != Vector3f::zeros() && pdf > 0.0 {
                            let shadow = intersect_scene(
                                bvh, scene, &Ray3f::new(position, l_incoming), false);
                            let emission = emission_along(scene, &shadow, &l_incoming);
                            radiance += weight
                                .component_mul(&bsdfcos)
                                .component_mul(&emission)
                                / pdf;
                        }
                    }
                    next_emission = false;
                }

                if strategy.direct == DirectLight::Mis {
                    // light-sampled term of the two-strategy estimate
                    let l_incoming = sample_lights(
                        scene, lights, &position, rng.next_f32(), rng.next_f32(), &rng.next_2f());
                    if l_incoming != Vector3f::zeros() {
                        let bsdfcos = eval_bsdfcos(&material, &normal, &outgoing, &l_incoming);
                        let light_pdf = sample_lights_pdf(scene, bvh, lights, &position, &l_incoming);
                        let bsdf_pdf = sample_bsdfcos_pdf(&material, &normal, &outgoing, &l_incoming);
                        if bsdfcos != Vector3f::zeros() && light_pdf > 0.0 {
                            let mis_weight = mis_heuristic(light_pdf, bsdf_pdf) / light_pdf;
                            if mis_weight.is_finite() && mis_weight > 0.0 {
                                let shadow = intersect_scene(
                                    bvh, scene, &Ray3f::new(position, l_incoming), false);
                                let emission = emission_along(scene, &shadow, &l_incoming);
                                radiance += weight
                                    .component_mul(&bsdfcos)
                                    .component_mul(&emission)
                                    * mis_weight;
                            }
                        }
                    }

                    // BSDF-sampled term; its hit doubles as the next bounce
                    let b_incoming = sample_bsdfcos(
                        &material, &normal, &outgoing, rng.next_f32(), &rng.next_2f());
                    if b_incoming == Vector3f::zeros() {
                        break;
                    }
                    let bsdfcos = eval_bsdfcos(&material, &normal, &outgoing, &b_incoming);
                    let bsdf_pdf = sample_bsdfcos_pdf(&material, &normal, &outgoing, &b_incoming);
                    if bsdf_pdf <= 0.0 || bsdfcos == Vector3f::zeros() {
                        break;
                    }
                    let light_pdf = sample_lights_pdf(scene, bvh, lights, &position, &b_incoming);
                    let next = intersect_scene(bvh, scene, &Ray3f::new(position, b_incoming), false);
                    let mis_weight = mis_heuristic(bsdf_pdf, light_pdf) / bsdf_pdf;
                    if mis_weight.is_finite() && mis_weight > 0.0 {
                        let emission = emission_along(scene, &next, &b_incoming);
                        radiance += weight
                            .component_mul(&bsdfcos)
                            .component_mul(&emission)
                            * mis_weight;
                    }
                    weight = weight.component_mul(&bsdfcos) / bsdf_pdf;
                    if strategy.lookahead {
                        cached_intersection = Some(next);
                    }
                    next_emission = false;
                    incoming = b_incoming;
                } else if strategy.mixture {
                    // balance-heuristic mixture of the two strategies
                    let candidate = if rng.next_f32() < 0.5 {
                        sample_bsdfcos(&material, &normal, &outgoing, rng.next_f32(), &rng.next_2f())
                    } else {
                        sample_lights(
                            scene, lights, &position,
                            rng.next_f32(), rng.next_f32(), &rng.next_2f())
                    };
                    if candidate == Vector3f::zeros() {
                        break;
                    }
                    let denom = 0.5
                        * sample_bsdfcos_pdf(&material, &normal, &outgoing, &candidate)
                        + 0.5 * sample_lights_pdf(scene, bvh, lights, &position, &candidate);
                    if denom <= 0.0 {
                        break;
                    }
                    weight = weight
                        .component_mul(&eval_bsdfcos(&material, &normal, &outgoing, &candidate))
                        / denom;
                    incoming = candidate;
                } else {
                    let candidate = sample_bsdfcos(
                        &material, &normal, &outgoing, rng.next_f32(), &rng.next_2f());
                    if candidate == Vector3f::zeros() {
                        break;
                    }
                    let pdf = sample_bsdfcos_pdf(&material, &normal, &outgoing, &candidate);
                    if pdf <= 0.0 {
                        break;
                    }
                    weight = weight
                        .component_mul(&eval_bsdfcos(&material, &normal, &outgoing, &candidate))
                        / pdf;
                    incoming = candidate;
                }
            } else {
                let candidate = sample_delta(&material, &normal, &outgoing, rng.next_f32());
                if candidate == Vector3f::zeros() {
                    break;
                }
                let pdf = sample_delta_pdf(&material, &normal, &outgoing, &candidate);
                if pdf <= 0.0 {
                    break;
                }
                weight = weight
                    .component_mul(&eval_delta(&material, &normal, &outgoing, &candidate))
                    / pdf;
                if strategy.gate_emission {
                    next_emission = true;
                }
                incoming = candidate;
            }

            // crossing a transmissive boundary nests or exits a medium
            if strategy.volumes
                && is_volumetric(&material)
                && normal.dot(&outgoing) * normal.dot(&incoming) < 0.0
            {
                if volume_stack.is_empty() {
                    volume_stack.push(eval_material(scene, &intersection));
                } else {
                    volume_stack.pop();
                }
            }

            ray = Ray3f::new(position, incoming);
        } else {
            // scattering event inside the innermost medium
            let outgoing = -ray.dir();
            let position = ray.at(intersection.distance);
            let vsdf = match volume_stack.last() {
                Some(vsdf) => *vsdf,
                None => break,
            };

            let incoming = if rng.next_f32() < 0.5 {
                sample_scattering(&vsdf, &outgoing, &rng.next_2f())
            } else {
                sample_lights(
                    scene, lights, &position, rng.next_f32(), rng.next_f32(), &rng.next_2f())
            };
            if incoming == Vector3f::zeros() {
                break;
            }
            let denom = 0.5 * sample_scattering_pdf(&vsdf, &outgoing, &incoming)
                + 0.5 * sample_lights_pdf(scene, bvh, lights, &position, &incoming);
            if denom <= 0.0 {
                break;
            }
            weight = weight
                .component_mul(&eval_scattering(&vsdf, &outgoing, &incoming))
                / denom;
            if strategy.direct == DirectLight::Mis {
                next_emission = true;
            }

            ray = Ray3f::new(position, incoming);
        }

        if weight == Vector3f::zeros() || !is_finite(&weight) {
            break;
        }

        // russian roulette
        if bounce > RR_START_BOUNCE {
            let rr_prob = weight.max().min(RR_MAX_PROB);
            if rng.next_f32() >= rr_prob {
                break;
            }
            weight /= rr_prob;
        }

        bounce += 1;
    }

    TraceResult { radiance, hit, albedo: hit_albedo, normal: hit_normal }
}

pub fn trace_naive(
    scene: &Scene, bvh: &SceneBvh, lights: &LightTable, ray: &Ray3f,
    rng: &mut StreamRng, params: &TraceParams,
) -> TraceResult {
    trace_path_loop(scene, bvh, lights, ray, rng, params, &NAIVE)
}

pub fn trace_path(
    scene: &Scene, bvh: &SceneBvh, lights: &LightTable, ray: &Ray3f,
    rng: &mut StreamRng, params: &TraceParams,
) -> TraceResult {
    trace_path_loop(scene, bvh, lights, ray, rng, params, &PATH)
}

pub fn trace_pathdirect(
    scene: &Scene, bvh: &SceneBvh, lights: &LightTable, ray: &Ray3f,
    rng: &mut StreamRng, params: &TraceParams,
) -> TraceResult {
    trace_path_loop(scene, bvh, lights, ray, rng, params, &PATHDIRECT)
}

pub fn trace_pathmis(
    scene: &Scene, bvh: &SceneBvh, lights: &LightTable, ray: &Ray3f,
    rng: &mut StreamRng, params: &TraceParams,
) -> TraceResult {
    trace_path_loop(scene, bvh, lights, ray, rng, params, &PATHMIS)
}

pub fn trace_pathtest(
    scene: &Scene, bvh: &SceneBvh, lights: &LightTable, ray: &Ray3f,
    rng: &mut StreamRng, params: &TraceParams,
) -> TraceResult {
    trace_path_loop(scene, bvh, lights, ray, rng, params, &PATHTEST)
}

pub fn trace_lightsampling(
    scene: &Scene, bvh: &SceneBvh, lights: &LightTable, ray: &Ray3f,
    rng: &mut StreamRng, params: &TraceParams,
) -> TraceResult {
    trace_path_loop(scene, bvh, lights, ray, rng, params, &LIGHTSAMPLING)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bvh::make_scene_bvh;
    use crate::core::lights::make_lights;
    use crate::core::presets::make_cornellbox;
    use crate::core::scene::{camera_resolution, Environment, Instance, Material, Shape};
    use crate::integrators::{sample_camera, SamplerType, TraceParams};
    use crate::math::transform::Transform;

    fn camera_rays(scene: &Scene, count: usize, seed: u64) -> (Vec<Ray3f>, StreamRng) {
        let camera = &scene.cameras[0];
        let resolution = camera_resolution(camera, 16);
        let mut rng = StreamRng::new(seed);
        let mut rays = Vec::new();
        for k in 0..count {
            let ij = (k % resolution.0, (k / resolution.0) % resolution.1);
            let puv = rng.next_2f();
            let luv = rng.next_2f();
            rays.push(sample_camera(camera, ij, resolution, &puv, &luv, false));
        }
        (rays, rng)
    }

    #[test]
    fn test_all_path_samplers_finite_and_nonnegative() {
        let scene = make_cornellbox();
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams { bounces: 6, ..TraceParams::default() };

        let samplers: [fn(&Scene, &SceneBvh, &LightTable, &Ray3f, &mut StreamRng, &TraceParams) -> TraceResult; 6] = [
            trace_naive, trace_path, trace_pathdirect,
            trace_pathmis, trace_pathtest, trace_lightsampling,
        ];
        for sampler in samplers {
            let (rays, mut rng) = camera_rays(&scene, 64, 1301081);
            for ray in &rays {
                let result = sampler(&scene, &bvh, &lights, ray, &mut rng, &params);
                for c in 0..3 {
                    assert!(result.radiance[c].is_finite());
                    assert!(result.radiance[c] >= 0.0);
                }
            }
        }
    }

    #[test]
    fn test_primary_hit_reports_albedo_and_normal() {
        let scene = make_cornellbox();
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams { bounces: 4, ..TraceParams::default() };

        // straight into the back wall, clear of both blocks
        let ray = Ray3f::new(
            Vector3f::new(0.8, 1.6, 3.9), Vector3f::new(0.0, 0.0, -1.0));
        let mut rng = StreamRng::new(3);
        let result = trace_path(&scene, &bvh, &lights, &ray, &mut rng, &params);
        assert!(result.hit);
        assert!((result.albedo - Vector3f::new(0.725, 0.71, 0.68)).norm() < 1e-4);
        assert!((result.normal - Vector3f::new(0.0, 0.0, 1.0)).norm() < 1e-4);
    }

    // In a closed diffuse enclosure whose walls emit L with albedo a, the
    // stationary radiance is L / (1 - a); an estimator limited to n
    // bounces sees the truncated series L * (1 - a^n) / (1 - a).
    #[test]
    fn test_emissive_enclosure_matches_geometric_series() {
        let albedo = 0.5;
        let emission = 1.0;
        let mut scene = Scene::default();
        // inward-facing cube, side 2
        let mut positions = Vec::new();
        let mut quads = Vec::new();
        let faces: [[Vector3f; 4]; 6] = [
            [Vector3f::new(-1.0, -1.0, -1.0), Vector3f::new(1.0, -1.0, -1.0),
             Vector3f::new(1.0, 1.0, -1.0), Vector3f::new(-1.0, 1.0, -1.0)],
            [Vector3f::new(-1.0, -1.0, 1.0), Vector3f::new(-1.0, 1.0, 1.0),
             Vector3f::new(1.0, 1.0, 1.0), Vector3f::new(1.0, -1.0, 1.0)],
            [Vector3f::new(-1.0, -1.0, -1.0), Vector3f::new(-1.0, 1.0, -1.0),
             Vector3f::new(-1.0, 1.0, 1.0), Vector3f::new(-1.0, -1.0, 1.0)],
            [Vector3f::new(1.0, -1.0, -1.0), Vector3f::new(1.0, -1.0, 1.0),
             Vector3f::new(1.0, 1.0, 1.0), Vector3f::new(1.0, 1.0, -1.0)],
            [Vector3f::new(-1.0, -1.0, -1.0), Vector3f::new(-1.0, -1.0, 1.0),
             Vector3f::new(1.0, -1.0, 1.0), Vector3f::new(1.0, -1.0, -1.0)],
            [Vector3f::new(-1.0, 1.0, -1.0), Vector3f::new(1.0, 1.0, -1.0),
             Vector3f::new(1.0, 1.0, 1.0), Vector3f::new(-1.0, 1.0, 1.0)],
        ];
        for face in &faces {
            let base = positions.len();
            positions.extend_from_slice(face);
            quads.push([base, base + 1, base + 2, base + 3]);
        }
        scene.shapes.push(Shape {
            positions, normals: Vec::new(), texcoords: Vec::new(),
            triangles: Vec::new(), quads,
        });
        scene.materials.push(Material {
            mtype: MaterialType::Matte,
            emission: Vector3f::new(emission, emission, emission),
            color: Vector3f::new(albedo, albedo, albedo),
            roughness: 1.0,
            ..Material::default()
        });
        scene.instances.push(Instance {
            frame: Transform::default(), shape: 0, material: 0,
        });

        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let bounces = 12;
        let params = TraceParams {
            sampler: SamplerType::Naive,
            bounces,
            clamp: 100.0,
            ..TraceParams::default()
        };

        let ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.3, 0.2, -1.0));
        let mut rng = StreamRng::new(8771);
        let mut mean = 0.0;
        let count = 4000;
        for _ in 0..count {
            let result = trace_naive(&scene, &bvh, &lights, &ray, &mut rng, &params);
            mean += result.radiance.x / count as Float;
        }
        let a = albedo as Float;
        let expected = emission * (1.0 - a.powi(bounces as i32)) / (1.0 - a);
        assert!(
            (mean - expected).abs() < 0.05 * expected,
            "mean {} vs expected {}",
            mean,
            expected
        );
    }

    // With both a small bright light and rough surfaces, combining both
    // sampling strategies must not increase variance over BSDF sampling
    // alone.
    #[test]
    fn test_mis_variance_not_worse_than_naive() {
        let scene = make_cornellbox();
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams { bounces: 4, ..TraceParams::default() };

        let ray = Ray3f::new(
            Vector3f::new(0.0, 1.0, 3.9), Vector3f::new(0.05, -0.12, -1.0));

        let variance_of = |sampler: fn(&Scene, &SceneBvh, &LightTable, &Ray3f, &mut StreamRng, &TraceParams) -> TraceResult,
                           seed: u64| {
            let runs = 24;
            let per_run = 64;
            let mut rng = StreamRng::new(seed);
            let mut means = Vec::with_capacity(runs);
            for _ in 0..runs {
                let mut sum = 0.0;
                for _ in 0..per_run {
                    let r = sampler(&scene, &bvh, &lights, &ray, &mut rng, &params);
                    let lum = (r.radiance.x + r.radiance.y + r.radiance.z) / 3.0;
                    sum += lum.min(params.clamp);
                }
                means.push(sum / per_run as Float);
            }
            let mean: Float = means.iter().sum::<Float>() / runs as Float;
            means.iter().map(|m| (m - mean) * (m - mean)).sum::<Float>() / runs as Float
        };

        let naive_var = variance_of(trace_naive, 1234);
        let mis_var = variance_of(trace_pathmis, 1234);
        assert!(
            mis_var <= naive_var * 1.25,
            "mis variance {} vs naive {}",
            mis_var,
            naive_var
        );
    }

    #[test]
    fn test_env_hidden_on_primary_rays() {
        let mut scene = Scene::default();
        scene.environments.push(Environment {
            frame: Transform::default(),
            emission: Vector3f::new(2.0, 2.0, 2.0),
            emission_tex: None,
        });
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let ray = Ray3f::new(Vector3f::zeros(), Vector3f::new(0.0, 0.0, -1.0));

        let visible = TraceParams { bounces: 4, ..TraceParams::default() };
        let mut rng = StreamRng::new(1);
        let lit = trace_path(&scene, &bvh, &lights, &ray, &mut rng, &visible);
        assert!(!lit.hit);
        assert!((lit.radiance.x - 2.0).abs() < 1e-5);

        let hidden = TraceParams { envhidden: true, bounces: 4, ..TraceParams::default() };
        let dark = trace_path(&scene, &bvh, &lights, &ray, &mut rng, &hidden);
        assert_eq!(dark.radiance, Vector3f::zeros());
    }

    #[test]
    fn test_volume_stack_depth_stays_physical() {
        // a refractive slab: entering pushes, exiting pops, so a straight
        // path through it terminates with an empty stack and finite power
        let mut scene = Scene::default();
        let slab = |z: Float| -> Vec<Vector3f> {
            vec![
                Vector3f::new(-2.0, -2.0, z),
                Vector3f::new(2.0, -2.0, z),
                Vector3f::new(2.0, 2.0, z),
                Vector3f::new(-2.0, 2.0, z),
            ]
        };
        let mut positions = slab(0.0);
        positions.extend(slab(-0.4));
        scene.shapes.push(Shape {
            positions,
            normals: Vec::new(),
            texcoords: Vec::new(),
            triangles: Vec::new(),
            quads: vec![[0, 1, 2, 3], [4, 5, 6, 7]],
        });
        scene.materials.push(Material {
            mtype: MaterialType::Refractive,
            color: Vector3f::new(0.9, 0.9, 0.9),
            roughness: 0.0,
            ior: 1.0 + 1e-4,
            trdepth: 1.0,
            ..Material::default()
        });
        scene.instances.push(Instance {
            frame: Transform::default(), shape: 0, material: 0,
        });
        scene.environments.push(Environment {
            frame: Transform::default(),
            emission: Vector3f::new(1.0, 1.0, 1.0),
            emission_tex: None,
        });

        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams { bounces: 16, clamp: 100.0, ..TraceParams::default() };
        let ray = Ray3f::new(Vector3f::new(0.0, 0.0, 2.0), Vector3f::new(0.0, 0.0, -1.0));

        let mut rng = StreamRng::new(17);
        for _ in 0..64 {
            let result = trace_path(&scene, &bvh, &lights, &ray, &mut rng, &params);
            for c in 0..3 {
                assert!(result.radiance[c].is_finite());
                assert!(result.radiance[c] >= 0.0);
            }
        }
    }

    #[test]
    fn test_power_heuristic_partitions() {
        let w1 = mis_heuristic(0.7, 0.2);
        let w2 = mis_heuristic(0.2, 0.7);
        assert!((w1 + w2 - 1.0).abs() < 1e-6);
        assert!((mis_heuristic(1.0, 0.0) - 1.0).abs() < 1e-6);
    }
}
