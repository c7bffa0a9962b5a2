// Copyright @yucwang 2026

pub mod lobes;
pub mod microfacet;
pub mod volume;

use crate::core::scene::{MaterialPoint, MaterialType};
use crate::math::constants::{Float, Vector2f, Vector3f};

use self::lobes::*;
use self::volume::{eval_phasefunction, sample_phasefunction, sample_phasefunction_pdf};

// The lobe set is closed, so shading dispatches on the material tag; the
// rough dispatch and the delta dispatch are mutually exclusive on
// `roughness == 0`.

pub fn is_delta(material: &MaterialPoint) -> bool {
    match material.mtype {
        MaterialType::Reflective | MaterialType::Transparent | MaterialType::Refractive => {
            material.roughness == 0.0
        }
        MaterialType::Volumetric => true,
        _ => false,
    }
}

pub fn is_volumetric(material: &MaterialPoint) -> bool {
    matches!(
        material.mtype,
        MaterialType::Refractive | MaterialType::Volumetric | MaterialType::Subsurface
    )
}

pub fn eval_emission(
    material: &MaterialPoint, normal: &Vector3f, outgoing: &Vector3f,
) -> Vector3f {
    if normal.dot(outgoing) >= 0.0 {
        material.emission
    } else {
        Vector3f::zeros()
    }
}

// BSDF times incoming cosine for rough lobes.
pub fn eval_bsdfcos(
    material: &MaterialPoint, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    if material.roughness == 0.0 {
        return Vector3f::zeros();
    }

    match material.mtype {
        MaterialType::Matte => eval_matte(&material.color, normal, outgoing, incoming),
        MaterialType::Glossy => eval_glossy(
            &material.color, material.ior, material.roughness, normal, outgoing, incoming),
        MaterialType::Reflective => eval_reflective(
            &material.color, material.roughness, normal, outgoing, incoming),
        MaterialType::Transparent => eval_transparent(
            &material.color, material.ior, material.roughness, normal, outgoing, incoming),
        MaterialType::Refractive | MaterialType::Subsurface => eval_refractive(
            &material.color, material.ior, material.roughness, normal, outgoing, incoming),
        MaterialType::GltfPbr => eval_gltfpbr(
            &material.color, material.ior, material.roughness, material.metallic,
            normal, outgoing, incoming),
        _ => Vector3f::zeros(),
    }
}

pub fn sample_bsdfcos(
    material: &MaterialPoint, normal: &Vector3f, outgoing: &Vector3f,
    rnl: Float, rn: &Vector2f,
) -> Vector3f {
    if material.roughness == 0.0 {
        return Vector3f::zeros();
    }

    match material.mtype {
        MaterialType::Matte => sample_matte(&material.color, normal, outgoing, rn),
        MaterialType::Glossy => sample_glossy(
            &material.color, material.ior, material.roughness, normal, outgoing, rnl, rn),
        MaterialType::Reflective => sample_reflective(
            &material.color, material.roughness, normal, outgoing, rn),
        MaterialType::Transparent => sample_transparent(
            &material.color, material.ior, material.roughness, normal, outgoing, rnl, rn),
        MaterialType::Refractive | MaterialType::Subsurface => sample_refractive(
            &material.color, material.ior, material.roughness, normal, outgoing, rnl, rn),
        MaterialType::GltfPbr => sample_gltfpbr(
            &material.color, material.ior, material.roughness, material.metallic,
            normal, outgoing, rnl, rn),
        _ => Vector3f::zeros(),
    }
}

pub fn sample_bsdfcos_pdf(
    material: &MaterialPoint, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    if material.roughness == 0.0 {
        return 0.0;
    }

    match material.mtype {
        MaterialType::Matte => sample_matte_pdf(&material.color, normal, outgoing, incoming),
        MaterialType::Glossy => sample_glossy_pdf(
            &material.color, material.ior, material.roughness, normal, outgoing, incoming),
        MaterialType::Reflective => sample_reflective_pdf(
            &material.color, material.roughness, normal, outgoing, incoming),
        MaterialType::Transparent => sample_transparent_pdf(
            &material.color, material.ior, material.roughness, normal, outgoing, incoming),
        MaterialType::Refractive | MaterialType::Subsurface => sample_refractive_pdf(
            &material.color, material.ior, material.roughness, normal, outgoing, incoming),
        MaterialType::GltfPbr => sample_gltfpbr_pdf(
            &material.color, material.ior, material.roughness, material.metallic,
            normal, outgoing, incoming),
        _ => 0.0,
    }
}

pub fn eval_delta(
    material: &MaterialPoint, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    if material.roughness != 0.0 {
        return Vector3f::zeros();
    }

    match material.mtype {
        MaterialType::Reflective => eval_reflective_delta(
            &material.color, normal, outgoing, incoming),
        MaterialType::Transparent => eval_transparent_delta(
            &material.color, material.ior, normal, outgoing, incoming),
        MaterialType::Refractive => eval_refractive_delta(
            &material.color, material.ior, normal, outgoing, incoming),
        MaterialType::Volumetric => eval_passthrough(
            &material.color, normal, outgoing, incoming),
        _ => Vector3f::zeros(),
    }
}

pub fn sample_delta(
    material: &MaterialPoint, normal: &Vector3f, outgoing: &Vector3f, rnl: Float,
) -> Vector3f {
    if material.roughness != 0.0 {
        return Vector3f::zeros();
    }

    match material.mtype {
        MaterialType::Reflective => sample_reflective_delta(&material.color, normal, outgoing),
        MaterialType::Transparent => sample_transparent_delta(
            &material.color, material.ior, normal, outgoing, rnl),
        MaterialType::Refractive => sample_refractive_delta(
            &material.color, material.ior, normal, outgoing, rnl),
        MaterialType::Volumetric => sample_passthrough(&material.color, normal, outgoing),
        _ => Vector3f::zeros(),
    }
}

pub fn sample_delta_pdf(
    material: &MaterialPoint, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    if material.roughness != 0.0 {
        return 0.0;
    }

    match material.mtype {
        MaterialType::Reflective => sample_reflective_delta_pdf(
            &material.color, normal, outgoing, incoming),
        MaterialType::Transparent => sample_transparent_delta_pdf(
            &material.color, material.ior, normal, outgoing, incoming),
        MaterialType::Refractive => sample_refractive_delta_pdf(
            &material.color, material.ior, normal, outgoing, incoming),
        MaterialType::Volumetric => sample_passthrough_pdf(
            &material.color, normal, outgoing, incoming),
        _ => 0.0,
    }
}

// Phase-function dispatch for scattering events inside a medium.
pub fn eval_scattering(
    material: &MaterialPoint, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    if material.density == Vector3f::zeros() {
        return Vector3f::zeros();
    }
    material.scattering.component_mul(&material.density)
        * eval_phasefunction(material.scanisotropy, outgoing, incoming)
}

pub fn sample_scattering(
    material: &MaterialPoint, outgoing: &Vector3f, rn: &Vector2f,
) -> Vector3f {
    if material.density == Vector3f::zeros() {
        return Vector3f::zeros();
    }
    sample_phasefunction(material.scanisotropy, outgoing, rn)
}

pub fn sample_scattering_pdf(
    material: &MaterialPoint, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    if material.density == Vector3f::zeros() {
        return 0.0;
    }
    sample_phasefunction_pdf(material.scanisotropy, outgoing, incoming)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matte_point(color: Vector3f) -> MaterialPoint {
        MaterialPoint {
            mtype: MaterialType::Matte,
            emission: Vector3f::zeros(),
            color,
            opacity: 1.0,
            roughness: 1.0,
            metallic: 0.0,
            ior: 1.5,
            density: Vector3f::zeros(),
            scattering: Vector3f::zeros(),
            scanisotropy: 0.0,
            trdepth: 0.01,
        }
    }

    #[test]
    fn test_delta_classification() {
        let mut point = matte_point(Vector3f::new(0.5, 0.5, 0.5));
        assert!(!is_delta(&point));

        point.mtype = MaterialType::Reflective;
        point.roughness = 0.0;
        assert!(is_delta(&point));

        point.roughness = 0.2;
        assert!(!is_delta(&point));

        point.mtype = MaterialType::Volumetric;
        assert!(is_delta(&point));
        assert!(is_volumetric(&point));
    }

    #[test]
    fn test_emission_only_facing() {
        let mut point = matte_point(Vector3f::zeros());
        point.emission = Vector3f::new(2.0, 2.0, 2.0);
        let normal = Vector3f::new(0.0, 0.0, 1.0);
        let front = eval_emission(&point, &normal, &Vector3f::new(0.0, 0.0, 1.0));
        let back = eval_emission(&point, &normal, &Vector3f::new(0.0, 0.0, -1.0));
        assert_eq!(front, Vector3f::new(2.0, 2.0, 2.0));
        assert_eq!(back, Vector3f::zeros());
    }

    #[test]
    fn test_rough_and_delta_dispatch_exclusive() {
        let normal = Vector3f::new(0.0, 0.0, 1.0);
        let outgoing = Vector3f::new(0.0, 0.0, 1.0);
        let incoming = Vector3f::new(0.0, 0.0, 1.0);

        let rough = matte_point(Vector3f::new(0.5, 0.5, 0.5));
        assert_eq!(eval_delta(&rough, &normal, &outgoing, &incoming), Vector3f::zeros());

        let mut mirror = matte_point(Vector3f::new(0.9, 0.9, 0.9));
        mirror.mtype = MaterialType::Reflective;
        mirror.roughness = 0.0;
        assert_eq!(eval_bsdfcos(&mirror, &normal, &outgoing, &incoming), Vector3f::zeros());
        assert!(eval_delta(&mirror, &normal, &outgoing, &incoming).norm() > 0.0);
    }
}
