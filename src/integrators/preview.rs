// Copyright @yucwang 2026

use crate::core::bvh::{intersect_scene, SceneBvh};
use crate::core::lights::LightTable;
use crate::core::rng::StreamRng;
use crate::core::scene::{
    eval_environment, eval_material, eval_shading_normal, eval_shading_position, Scene,
};
use crate::integrators::{TraceParams, TraceResult};
use crate::materials::{
    eval_bsdfcos, eval_delta, eval_emission, is_delta, sample_delta, sample_delta_pdf,
};
use crate::math::constants::{Vector3f, PI};
use crate::math::ray::Ray3f;

// Headlight shading for quick previews: emission plus the BSDF evaluated
// against the viewing direction, continued only through delta interfaces.
// Deliberately biased; never use it as a reference.
pub fn trace_eyelight(
    scene: &Scene, bvh: &SceneBvh, _lights: &LightTable, ray_in: &Ray3f,
    rng: &mut StreamRng, params: &TraceParams,
) -> TraceResult {
    let mut radiance = Vector3f::zeros();
    let mut weight = Vector3f::new(1.0, 1.0, 1.0);
    let mut ray = *ray_in;
    let mut hit = false;
    let mut hit_albedo = Vector3f::zeros();
    let mut hit_normal = Vector3f::zeros();
    let mut opbounce = 0;

    let mut bounce = 0;
    while bounce < params.bounces.max(4) {
        let intersection = match intersect_scene(bvh, scene, &ray, false) {
            Some(intersection) => intersection,
            None => {
                if bounce > 0 || !params.envhidden {
                    radiance += weight.component_mul(&eval_environment(scene, &ray.dir()));
                }
                break;
            }
        };

        let outgoing = -ray.dir();
        let position = eval_shading_position(scene, &intersection, &outgoing);
        let normal = eval_shading_normal(scene, &intersection, &outgoing);
        let material = eval_material(scene, &intersection);

        if material.opacity < 1.0 && rng.next_f32() >= material.opacity {
            opbounce += 1;
            if opbounce > 128 {
                break;
            }
            ray = Ray3f::new(position + ray.dir() * 1e-2, ray.dir());
            continue;
        }

        if bounce == 0 {
            hit = true;
            hit_albedo = material.color;
            hit_normal = normal;
        }

        radiance += weight.component_mul(&eval_emission(&material, &normal, &outgoing));
        radiance += weight.component_mul(
            &(eval_bsdfcos(&material, &normal, &outgoing, &outgoing) * PI));

        if !is_delta(&material) {
            break;
        }
        let incoming = sample_delta(&material, &normal, &outgoing, rng.next_f32());
        if incoming == Vector3f::zeros() {
            break;
        }
        let pdf = sample_delta_pdf(&material, &normal, &outgoing, &incoming);
        if pdf <= 0.0 {
            break;
        }
        weight = weight.component_mul(&eval_delta(&material, &normal, &outgoing, &incoming)) / pdf;
        if weight == Vector3f::zeros()
            || !(weight.x.is_finite() && weight.y.is_finite() && weight.z.is_finite())
        {
            break;
        }

        ray = Ray3f::new(position, incoming);
        bounce += 1;
    }

    TraceResult { radiance, hit, albedo: hit_albedo, normal: hit_normal }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bvh::make_scene_bvh;
    use crate::core::lights::make_lights;
    use crate::core::presets::make_furnace;

    #[test]
    fn test_eyelight_shades_head_on_surface() {
        let albedo = 0.75;
        let scene = make_furnace(albedo);
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams::default();

        let ray = Ray3f::new(
            Vector3f::new(0.0, 0.0, 3.0), Vector3f::new(0.0, 0.0, -1.0));
        let mut rng = StreamRng::new(1);
        let result = trace_eyelight(&scene, &bvh, &lights, &ray, &mut rng, &params);
        assert!(result.hit);
        // matte lobe against the view direction collapses to the albedo
        assert!((result.radiance - Vector3f::new(albedo, albedo, albedo)).norm() < 1e-3);
    }
}
