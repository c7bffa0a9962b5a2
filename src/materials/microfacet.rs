// Copyright @yucwang 2026

use crate::core::tangent_frame::{build_tangent_frame, local_to_world};
use crate::math::constants::{Float, PI, Vector2f, Vector3f};

pub fn reflect(w: &Vector3f, n: &Vector3f) -> Vector3f {
    -w + n * (2.0 * n.dot(w))
}

// Returns zero on total internal reflection.
pub fn refract(w: &Vector3f, n: &Vector3f, inv_eta: Float) -> Vector3f {
    let cosine = n.dot(w);
    let k = 1.0 + inv_eta * inv_eta * (cosine * cosine - 1.0);
    if k < 0.0 {
        return Vector3f::zeros();
    }
    -w * inv_eta + n * (inv_eta * cosine - k.sqrt())
}

// Exact unpolarized dielectric Fresnel.
pub fn fresnel_dielectric(eta: Float, normal: &Vector3f, outgoing: &Vector3f) -> Float {
    let mut eta = eta;
    let mut cosw = normal.dot(outgoing);
    if cosw < 0.0 {
        eta = 1.0 / eta;
        cosw = -cosw;
    }

    let sin2 = 1.0 - cosw * cosw;
    let eta2 = eta * eta;
    let cos2t = 1.0 - sin2 / eta2;
    if cos2t < 0.0 {
        return 1.0;
    }

    let t0 = cos2t.sqrt();
    let t1 = eta * t0;
    let t2 = eta * cosw;

    let rs = (cosw - t1) / (cosw + t1);
    let rp = (t0 - t2) / (t0 + t2);

    (rs * rs + rp * rp) / 2.0
}

pub fn fresnel_schlick(specular: &Vector3f, normal: &Vector3f, outgoing: &Vector3f) -> Vector3f {
    if *specular == Vector3f::zeros() {
        return Vector3f::zeros();
    }
    let cosine = normal.dot(outgoing);
    let factor = (1.0 - cosine.abs()).max(0.0).min(1.0).powi(5);
    specular + (Vector3f::new(1.0, 1.0, 1.0) - specular) * factor
}

pub fn eta_to_reflectivity(eta: Float) -> Float {
    ((eta - 1.0) * (eta - 1.0)) / ((eta + 1.0) * (eta + 1.0))
}

// Trowbridge-Reitz distribution; `roughness` is already squared by the
// material evaluation.
pub fn microfacet_distribution(roughness: Float, normal: &Vector3f, halfway: &Vector3f) -> Float {
    let cosine = normal.dot(halfway);
    if cosine <= 0.0 {
        return 0.0;
    }
    let roughness2 = roughness * roughness;
    let cosine2 = cosine * cosine;
    roughness2 / (PI * (cosine2 * roughness2 + 1.0 - cosine2) * (cosine2 * roughness2 + 1.0 - cosine2))
}

fn microfacet_shadowing1(
    roughness: Float, normal: &Vector3f, halfway: &Vector3f, direction: &Vector3f,
) -> Float {
    let cosine = normal.dot(direction);
    let cosineh = halfway.dot(direction);
    if cosine * cosineh <= 0.0 {
        return 0.0;
    }
    let roughness2 = roughness * roughness;
    let cosine2 = cosine * cosine;
    2.0 * cosine.abs() / (cosine.abs() + (cosine2 - roughness2 * cosine2 + roughness2).sqrt())
}

pub fn microfacet_shadowing(
    roughness: Float, normal: &Vector3f, halfway: &Vector3f,
    outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    microfacet_shadowing1(roughness, normal, halfway, outgoing)
        * microfacet_shadowing1(roughness, normal, halfway, incoming)
}

pub fn sample_microfacet(roughness: Float, normal: &Vector3f, rn: &Vector2f) -> Vector3f {
    let phi = 2.0 * PI * rn.x;
    let theta = (roughness * (rn.y / (1.0 - rn.y).max(1e-8)).sqrt()).atan();
    let local = Vector3f::new(
        theta.sin() * phi.cos(),
        theta.sin() * phi.sin(),
        theta.cos(),
    );
    let (tangent, bitangent) = build_tangent_frame(normal);
    local_to_world(&local, &tangent, &bitangent, normal).normalize()
}

pub fn sample_microfacet_pdf(roughness: Float, normal: &Vector3f, halfway: &Vector3f) -> Float {
    let cosine = normal.dot(halfway);
    if cosine < 0.0 {
        return 0.0;
    }
    microfacet_distribution(roughness, normal, halfway) * cosine
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresnel_grows_at_grazing() {
        let n = Vector3f::new(0.0, 0.0, 1.0);
        let head_on = fresnel_dielectric(1.5, &n, &Vector3f::new(0.0, 0.0, 1.0));
        let grazing = fresnel_dielectric(
            1.5, &n, &Vector3f::new(0.995, 0.0, 0.0998).normalize());
        assert!(head_on < 0.06);
        assert!(grazing > 0.5);
    }

    #[test]
    fn test_reflect_mirrors_direction() {
        let n = Vector3f::new(0.0, 0.0, 1.0);
        let w = Vector3f::new(1.0, 0.0, 1.0).normalize();
        let r = reflect(&w, &n);
        assert!((r - Vector3f::new(-1.0, 0.0, 1.0).normalize()).norm() < 1e-5);
    }

    #[test]
    fn test_refract_total_internal_reflection() {
        let n = Vector3f::new(0.0, 0.0, 1.0);
        let w = Vector3f::new(0.999, 0.0, 0.045).normalize();
        // from dense to thin medium at grazing angle
        assert_eq!(refract(&w, &n, 1.5), Vector3f::zeros());
    }

    #[test]
    fn test_microfacet_sample_matches_distribution_peak() {
        let n = Vector3f::new(0.0, 0.0, 1.0);
        let h = sample_microfacet(0.04, &n, &Vector2f::new(0.3, 0.1));
        // Low roughness keeps halfway vectors close to the normal.
        assert!(n.dot(&h) > 0.9);
    }
}
