// Copyright @yucwang 2026
//
// Scattering lobes evaluated in world space. Every `eval_*` already folds
// in the cosine of the incoming direction; the `sample_*_pdf` functions
// match the corresponding `sample_*` exactly.

use crate::materials::microfacet::{
    eta_to_reflectivity, fresnel_dielectric, fresnel_schlick, microfacet_distribution,
    microfacet_shadowing, reflect, refract, sample_microfacet, sample_microfacet_pdf,
};
use crate::math::constants::{Float, INV_PI, Vector2f, Vector3f};
use crate::math::warp::{sample_hemisphere_cos, sample_hemisphere_cos_pdf};

fn same_hemisphere(normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f) -> bool {
    normal.dot(outgoing) * normal.dot(incoming) > 0.0
}

fn up_normal(normal: &Vector3f, outgoing: &Vector3f) -> Vector3f {
    if normal.dot(outgoing) <= 0.0 { -normal } else { *normal }
}

fn white() -> Vector3f {
    Vector3f::new(1.0, 1.0, 1.0)
}

// ---------------------------------------------------------------------------
// matte
// ---------------------------------------------------------------------------

pub fn eval_matte(
    color: &Vector3f, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    if !same_hemisphere(normal, outgoing, incoming) {
        return Vector3f::zeros();
    }
    color * INV_PI * normal.dot(incoming).abs()
}

pub fn sample_matte(
    _color: &Vector3f, normal: &Vector3f, outgoing: &Vector3f, rn: &Vector2f,
) -> Vector3f {
    let up = up_normal(normal, outgoing);
    sample_hemisphere_cos(&up, rn)
}

pub fn sample_matte_pdf(
    _color: &Vector3f, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    if !same_hemisphere(normal, outgoing, incoming) {
        return 0.0;
    }
    let up = up_normal(normal, outgoing);
    sample_hemisphere_cos_pdf(&up, incoming)
}

// ---------------------------------------------------------------------------
// glossy: dielectric coat over a diffuse base
// ---------------------------------------------------------------------------

pub fn eval_glossy(
    color: &Vector3f, ior: Float, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    if !same_hemisphere(normal, outgoing, incoming) {
        return Vector3f::zeros();
    }
    let up = up_normal(normal, outgoing);
    let f1 = fresnel_dielectric(ior, &up, outgoing);
    let halfway = (incoming + outgoing).normalize();
    let f = fresnel_dielectric(ior, &halfway, incoming);
    let d = microfacet_distribution(roughness, &up, &halfway);
    let g = microfacet_shadowing(roughness, &up, &halfway, outgoing, incoming);
    color * (1.0 - f1) * INV_PI * up.dot(incoming).abs()
        + white() * f * d * g / (4.0 * up.dot(outgoing) * up.dot(incoming))
            * up.dot(incoming).abs()
}

pub fn sample_glossy(
    _color: &Vector3f, ior: Float, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, rnl: Float, rn: &Vector2f,
) -> Vector3f {
    let up = up_normal(normal, outgoing);
    if rnl < fresnel_dielectric(ior, &up, outgoing) {
        let halfway = sample_microfacet(roughness, &up, rn);
        let incoming = reflect(outgoing, &halfway);
        if !same_hemisphere(&up, outgoing, &incoming) {
            return Vector3f::zeros();
        }
        incoming
    } else {
        sample_hemisphere_cos(&up, rn)
    }
}

pub fn sample_glossy_pdf(
    _color: &Vector3f, ior: Float, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    if !same_hemisphere(normal, outgoing, incoming) {
        return 0.0;
    }
    let up = up_normal(normal, outgoing);
    let halfway = (outgoing + incoming).normalize();
    let f = fresnel_dielectric(ior, &up, outgoing);
    f * sample_microfacet_pdf(roughness, &up, &halfway)
        / (4.0 * outgoing.dot(&halfway).abs())
        + (1.0 - f) * sample_hemisphere_cos_pdf(&up, incoming)
}

// ---------------------------------------------------------------------------
// reflective: metals, rough and polished
// ---------------------------------------------------------------------------

pub fn eval_reflective(
    color: &Vector3f, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    if !same_hemisphere(normal, outgoing, incoming) {
        return Vector3f::zeros();
    }
    let up = up_normal(normal, outgoing);
    let halfway = (incoming + outgoing).normalize();
    let f = fresnel_schlick(color, &halfway, incoming);
    let d = microfacet_distribution(roughness, &up, &halfway);
    let g = microfacet_shadowing(roughness, &up, &halfway, outgoing, incoming);
    f * d * g / (4.0 * up.dot(outgoing) * up.dot(incoming)) * up.dot(incoming).abs()
}

pub fn sample_reflective(
    _color: &Vector3f, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, rn: &Vector2f,
) -> Vector3f {
    let up = up_normal(normal, outgoing);
    let halfway = sample_microfacet(roughness, &up, rn);
    let incoming = reflect(outgoing, &halfway);
    if !same_hemisphere(&up, outgoing, &incoming) {
        return Vector3f::zeros();
    }
    incoming
}

pub fn sample_reflective_pdf(
    _color: &Vector3f, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    if !same_hemisphere(normal, outgoing, incoming) {
        return 0.0;
    }
    let up = up_normal(normal, outgoing);
    let halfway = (outgoing + incoming).normalize();
    sample_microfacet_pdf(roughness, &up, &halfway) / (4.0 * outgoing.dot(&halfway).abs())
}

pub fn eval_reflective_delta(
    color: &Vector3f, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    if !same_hemisphere(normal, outgoing, incoming) {
        return Vector3f::zeros();
    }
    let up = up_normal(normal, outgoing);
    fresnel_schlick(color, &up, outgoing)
}

pub fn sample_reflective_delta(
    _color: &Vector3f, normal: &Vector3f, outgoing: &Vector3f,
) -> Vector3f {
    let up = up_normal(normal, outgoing);
    reflect(outgoing, &up)
}

pub fn sample_reflective_delta_pdf(
    _color: &Vector3f, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    if !same_hemisphere(normal, outgoing, incoming) { 0.0 } else { 1.0 }
}

// ---------------------------------------------------------------------------
// transparent: thin sheet that reflects or passes straight through
// ---------------------------------------------------------------------------

pub fn eval_transparent(
    color: &Vector3f, ior: Float, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    let up = up_normal(normal, outgoing);
    if same_hemisphere(normal, outgoing, incoming) {
        let halfway = (incoming + outgoing).normalize();
        let f = fresnel_dielectric(ior, &halfway, outgoing);
        let d = microfacet_distribution(roughness, &up, &halfway);
        let g = microfacet_shadowing(roughness, &up, &halfway, outgoing, incoming);
        white() * f * d * g / (4.0 * up.dot(outgoing) * up.dot(incoming))
            * up.dot(incoming).abs()
    } else {
        let reflected = reflect(&-incoming, &up);
        let halfway = (reflected + outgoing).normalize();
        let f = fresnel_dielectric(ior, &halfway, outgoing);
        let d = microfacet_distribution(roughness, &up, &halfway);
        let g = microfacet_shadowing(roughness, &up, &halfway, outgoing, &reflected);
        color * (1.0 - f) * d * g / (4.0 * up.dot(outgoing) * up.dot(&reflected))
            * up.dot(&reflected).abs()
    }
}

pub fn sample_transparent(
    _color: &Vector3f, ior: Float, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, rnl: Float, rn: &Vector2f,
) -> Vector3f {
    let up = up_normal(normal, outgoing);
    let halfway = sample_microfacet(roughness, &up, rn);
    if rnl < fresnel_dielectric(ior, &halfway, outgoing) {
        let incoming = reflect(outgoing, &halfway);
        if !same_hemisphere(&up, outgoing, &incoming) {
            return Vector3f::zeros();
        }
        incoming
    } else {
        let reflected = reflect(outgoing, &halfway);
        let incoming = -reflect(&reflected, &up);
        if same_hemisphere(&up, outgoing, &incoming) {
            return Vector3f::zeros();
        }
        incoming
    }
}

pub fn sample_transparent_pdf(
    _color: &Vector3f, ior: Float, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    let up = up_normal(normal, outgoing);
    if same_hemisphere(normal, outgoing, incoming) {
        let halfway = (incoming + outgoing).normalize();
        fresnel_dielectric(ior, &halfway, outgoing)
            * sample_microfacet_pdf(roughness, &up, &halfway)
            / (4.0 * outgoing.dot(&halfway).abs())
    } else {
        let reflected = reflect(&-incoming, &up);
        let halfway = (reflected + outgoing).normalize();
        let f = fresnel_dielectric(ior, &halfway, outgoing);
        (1.0 - f) * sample_microfacet_pdf(roughness, &up, &halfway)
            / (4.0 * outgoing.dot(&halfway).abs())
    }
}

pub fn eval_transparent_delta(
    color: &Vector3f, ior: Float, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    let up = up_normal(normal, outgoing);
    if same_hemisphere(normal, outgoing, incoming) {
        white() * fresnel_dielectric(ior, &up, outgoing)
    } else {
        color * (1.0 - fresnel_dielectric(ior, &up, outgoing))
    }
}

pub fn sample_transparent_delta(
    _color: &Vector3f, ior: Float, normal: &Vector3f, outgoing: &Vector3f, rnl: Float,
) -> Vector3f {
    let up = up_normal(normal, outgoing);
    if rnl < fresnel_dielectric(ior, &up, outgoing) {
        reflect(outgoing, &up)
    } else {
        -outgoing
    }
}

pub fn sample_transparent_delta_pdf(
    _color: &Vector3f, ior: Float, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    let up = up_normal(normal, outgoing);
    if same_hemisphere(normal, outgoing, incoming) {
        fresnel_dielectric(ior, &up, outgoing)
    } else {
        1.0 - fresnel_dielectric(ior, &up, outgoing)
    }
}

// ---------------------------------------------------------------------------
// refractive: solid glass; radiance scales by the squared relative ior on
// transmission
// ---------------------------------------------------------------------------

pub fn eval_refractive(
    _color: &Vector3f, ior: Float, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    let entering = normal.dot(outgoing) >= 0.0;
    let up = if entering { *normal } else { -normal };
    let rel_ior = if entering { ior } else { 1.0 / ior };
    if same_hemisphere(normal, outgoing, incoming) {
        let halfway = (incoming + outgoing).normalize();
        let f = fresnel_dielectric(rel_ior, &halfway, outgoing);
        let d = microfacet_distribution(roughness, &up, &halfway);
        let g = microfacet_shadowing(roughness, &up, &halfway, outgoing, incoming);
        white() * f * d * g / (4.0 * up.dot(outgoing) * up.dot(incoming))
            * up.dot(incoming).abs()
    } else {
        let halfway = -(incoming * rel_ior + outgoing).normalize()
            * if entering { 1.0 } else { -1.0 };
        let f = fresnel_dielectric(rel_ior, &halfway, outgoing);
        let d = microfacet_distribution(roughness, &up, &halfway);
        let g = microfacet_shadowing(roughness, &up, &halfway, outgoing, incoming);
        let lo = halfway.dot(outgoing);
        let li = halfway.dot(incoming);
        white()
            * ((lo * li) / (normal.dot(outgoing) * normal.dot(incoming))).abs()
            * (1.0 - f) * d * g
            / (rel_ior * li + lo).powi(2)
            * normal.dot(incoming).abs()
    }
}

pub fn sample_refractive(
    _color: &Vector3f, ior: Float, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, rnl: Float, rn: &Vector2f,
) -> Vector3f {
    let entering = normal.dot(outgoing) >= 0.0;
    let up = if entering { *normal } else { -normal };
    let rel_ior = if entering { ior } else { 1.0 / ior };
    let halfway = sample_microfacet(roughness, &up, rn);
    if rnl < fresnel_dielectric(rel_ior, &halfway, outgoing) {
        let incoming = reflect(outgoing, &halfway);
        if !same_hemisphere(&up, outgoing, &incoming) {
            return Vector3f::zeros();
        }
        incoming
    } else {
        let incoming = refract(outgoing, &halfway, 1.0 / rel_ior);
        if incoming == Vector3f::zeros() || same_hemisphere(&up, outgoing, &incoming) {
            return Vector3f::zeros();
        }
        incoming
    }
}

pub fn sample_refractive_pdf(
    _color: &Vector3f, ior: Float, roughness: Float,
    normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    let entering = normal.dot(outgoing) >= 0.0;
    let up = if entering { *normal } else { -normal };
    let rel_ior = if entering { ior } else { 1.0 / ior };
    if same_hemisphere(normal, outgoing, incoming) {
        let halfway = (incoming + outgoing).normalize();
        fresnel_dielectric(rel_ior, &halfway, outgoing)
            * sample_microfacet_pdf(roughness, &up, &halfway)
            / (4.0 * outgoing.dot(&halfway).abs())
    } else {
        let halfway = -(incoming * rel_ior + outgoing).normalize()
            * if entering { 1.0 } else { -1.0 };
        let f = fresnel_dielectric(rel_ior, &halfway, outgoing);
        let lo = halfway.dot(outgoing);
        let li = halfway.dot(incoming);
        (1.0 - f) * sample_microfacet_pdf(roughness, &up, &halfway)
            * li.abs() / (rel_ior * li + lo).powi(2)
    }
}

pub fn eval_refractive_delta(
    _color: &Vector3f, ior: Float, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    if (ior - 1.0).abs() < 1e-3 {
        return if same_hemisphere(normal, outgoing, incoming) {
            Vector3f::zeros()
        } else {
            white()
        };
    }
    let entering = normal.dot(outgoing) >= 0.0;
    let up = if entering { *normal } else { -normal };
    let rel_ior = if entering { ior } else { 1.0 / ior };
    if same_hemisphere(normal, outgoing, incoming) {
        white() * fresnel_dielectric(rel_ior, &up, outgoing)
    } else {
        white() * (1.0 - fresnel_dielectric(rel_ior, &up, outgoing))
            / (rel_ior * rel_ior)
    }
}

pub fn sample_refractive_delta(
    _color: &Vector3f, ior: Float, normal: &Vector3f, outgoing: &Vector3f, rnl: Float,
) -> Vector3f {
    if (ior - 1.0).abs() < 1e-3 {
        return -outgoing;
    }
    let entering = normal.dot(outgoing) >= 0.0;
    let up = if entering { *normal } else { -normal };
    let rel_ior = if entering { ior } else { 1.0 / ior };
    if rnl < fresnel_dielectric(rel_ior, &up, outgoing) {
        reflect(outgoing, &up)
    } else {
        refract(outgoing, &up, 1.0 / rel_ior)
    }
}

pub fn sample_refractive_delta_pdf(
    _color: &Vector3f, ior: Float, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    if (ior - 1.0).abs() < 1e-3 {
        return if same_hemisphere(normal, outgoing, incoming) { 0.0 } else { 1.0 };
    }
    let entering = normal.dot(outgoing) >= 0.0;
    let up = if entering { *normal } else { -normal };
    let rel_ior = if entering { ior } else { 1.0 / ior };
    if same_hemisphere(normal, outgoing, incoming) {
        fresnel_dielectric(rel_ior, &up, outgoing)
    } else {
        1.0 - fresnel_dielectric(rel_ior, &up, outgoing)
    }
}

// ---------------------------------------------------------------------------
// gltfpbr: metallic-roughness workflow
// ---------------------------------------------------------------------------

pub fn eval_gltfpbr(
    color: &Vector3f, ior: Float, roughness: Float, metallic: Float,
    normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    if !same_hemisphere(normal, outgoing, incoming) {
        return Vector3f::zeros();
    }
    let up = up_normal(normal, outgoing);
    let reflectivity = white() * eta_to_reflectivity(ior) * (1.0 - metallic)
        + color * metallic;
    let f1 = fresnel_schlick(&reflectivity, &up, outgoing);
    let halfway = (incoming + outgoing).normalize();
    let f = fresnel_schlick(&reflectivity, &halfway, incoming);
    let d = microfacet_distribution(roughness, &up, &halfway);
    let g = microfacet_shadowing(roughness, &up, &halfway, outgoing, incoming);
    color.component_mul(&(white() - f1)) * (1.0 - metallic) * INV_PI
        * up.dot(incoming).abs()
        + f * d * g / (4.0 * up.dot(outgoing) * up.dot(incoming))
            * up.dot(incoming).abs()
}

pub fn sample_gltfpbr(
    color: &Vector3f, ior: Float, roughness: Float, metallic: Float,
    normal: &Vector3f, outgoing: &Vector3f, rnl: Float, rn: &Vector2f,
) -> Vector3f {
    let up = up_normal(normal, outgoing);
    let reflectivity = white() * eta_to_reflectivity(ior) * (1.0 - metallic)
        + color * metallic;
    let f = fresnel_schlick(&reflectivity, &up, outgoing);
    if rnl < (f.x + f.y + f.z) / 3.0 {
        let halfway = sample_microfacet(roughness, &up, rn);
        let incoming = reflect(outgoing, &halfway);
        if !same_hemisphere(&up, outgoing, &incoming) {
            return Vector3f::zeros();
        }
        incoming
    } else {
        sample_hemisphere_cos(&up, rn)
    }
}

pub fn sample_gltfpbr_pdf(
    color: &Vector3f, ior: Float, roughness: Float, metallic: Float,
    normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    if !same_hemisphere(normal, outgoing, incoming) {
        return 0.0;
    }
    let up = up_normal(normal, outgoing);
    let halfway = (outgoing + incoming).normalize();
    let reflectivity = white() * eta_to_reflectivity(ior) * (1.0 - metallic)
        + color * metallic;
    let fv = fresnel_schlick(&reflectivity, &up, outgoing);
    let f = (fv.x + fv.y + fv.z) / 3.0;
    f * sample_microfacet_pdf(roughness, &up, &halfway)
        / (4.0 * outgoing.dot(&halfway).abs())
        + (1.0 - f) * sample_hemisphere_cos_pdf(&up, incoming)
}

// ---------------------------------------------------------------------------
// passthrough: the boundary lobe of purely volumetric materials
// ---------------------------------------------------------------------------

pub fn eval_passthrough(
    _color: &Vector3f, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Vector3f {
    if same_hemisphere(normal, outgoing, incoming) {
        Vector3f::zeros()
    } else {
        white()
    }
}

pub fn sample_passthrough(
    _color: &Vector3f, _normal: &Vector3f, outgoing: &Vector3f,
) -> Vector3f {
    -outgoing
}

pub fn sample_passthrough_pdf(
    _color: &Vector3f, normal: &Vector3f, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    if same_hemisphere(normal, outgoing, incoming) { 0.0 } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matte_weight_equals_albedo() {
        // eval / pdf for a cosine-sampled diffuse lobe is exactly the color.
        let color = Vector3f::new(0.6, 0.4, 0.2);
        let normal = Vector3f::new(0.0, 0.0, 1.0);
        let outgoing = Vector3f::new(0.3, -0.1, 0.9).normalize();
        let incoming = sample_matte(&color, &normal, &outgoing, &Vector2f::new(0.4, 0.7));
        let value = eval_matte(&color, &normal, &outgoing, &incoming);
        let pdf = sample_matte_pdf(&color, &normal, &outgoing, &incoming);
        assert!(pdf > 0.0);
        let weight = value / pdf;
        assert!((weight - color).norm() < 1e-4);
    }

    #[test]
    fn test_delta_mirror_reflects() {
        let color = Vector3f::new(0.9, 0.9, 0.9);
        let normal = Vector3f::new(0.0, 0.0, 1.0);
        let outgoing = Vector3f::new(1.0, 0.0, 1.0).normalize();
        let incoming = sample_reflective_delta(&color, &normal, &outgoing);
        assert!((incoming - Vector3f::new(-1.0, 0.0, 1.0).normalize()).norm() < 1e-5);
        assert_eq!(sample_reflective_delta_pdf(&color, &normal, &outgoing, &incoming), 1.0);
    }

    #[test]
    fn test_refractive_delta_bends_ray() {
        let color = white();
        let normal = Vector3f::new(0.0, 0.0, 1.0);
        let outgoing = Vector3f::new(0.4, 0.0, 0.9165).normalize();
        // rnl past the fresnel weight forces transmission
        let incoming = sample_refractive_delta(&color, 1.5, &normal, &outgoing, 0.999);
        assert!(incoming.z < 0.0);
        assert!((incoming.norm() - 1.0).abs() < 1e-4);
        let pdf = sample_refractive_delta_pdf(&color, 1.5, &normal, &outgoing, &incoming);
        assert!(pdf > 0.0 && pdf < 1.0);
    }

    #[test]
    fn test_glossy_pdf_positive_where_eval_positive() {
        let color = Vector3f::new(0.7, 0.2, 0.2);
        let normal = Vector3f::new(0.0, 0.0, 1.0);
        let outgoing = Vector3f::new(0.2, 0.1, 0.97).normalize();
        for (a, b) in [(0.1, 0.3), (0.5, 0.8), (0.9, 0.2)] {
            let incoming = sample_glossy(
                &color, 1.5, 0.1, &normal, &outgoing, a, &Vector2f::new(a, b));
            if incoming == Vector3f::zeros() {
                continue;
            }
            let value = eval_glossy(&color, 1.5, 0.1, &normal, &outgoing, &incoming);
            let pdf = sample_glossy_pdf(&color, 1.5, 0.1, &normal, &outgoing, &incoming);
            assert!(pdf > 0.0);
            assert!(value.x >= 0.0 && value.y >= 0.0 && value.z >= 0.0);
        }
    }
}
