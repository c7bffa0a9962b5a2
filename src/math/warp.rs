// Copyright @yucwang 2023

use super::constants::{ INV_PI, PI, Float, Vector2f, Vector3f };
use crate::core::tangent_frame::{ build_tangent_frame, local_to_world };

pub fn sample_disk_concentric(u: &Vector2f) -> Vector2f {
    let r1: Float = 2.0 * u.x - 1.0;
    let r2: Float = 2.0 * u.y - 1.0;

    let phi: Float;
    let r:   Float;

    if r1 == 0. && r2 == 0. {
        r = 0.0;
        phi = 0.0;
    } else if r1 * r1 > r2 * r2 {
        r = r1;
        phi = (PI / 4.0) * (r2 / r1);
    } else {
        r = r2;
        phi = (PI / 2.0) - (r1 / r2) * (PI / 4.0);
    }

    let (sin_phi, cos_phi) = phi.sin_cos();

    Vector2f::new(r * cos_phi, r * sin_phi)
}

pub fn sample_sphere(u: &Vector2f) -> Vector3f {
    let z = 2.0 * u.y - 1.0;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u.x;
    Vector3f::new(r * phi.cos(), r * phi.sin(), z)
}

pub fn sample_sphere_pdf() -> Float {
    INV_PI / 4.0
}

// Cosine-weighted hemisphere around an arbitrary normal.
pub fn sample_hemisphere_cos(normal: &Vector3f, u: &Vector2f) -> Vector3f {
    let z = u.y.sqrt();
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u.x;
    let local = Vector3f::new(r * phi.cos(), r * phi.sin(), z);
    let (tangent, bitangent) = build_tangent_frame(normal);
    local_to_world(&local, &tangent, &bitangent, normal)
}

pub fn sample_hemisphere_cos_pdf(normal: &Vector3f, direction: &Vector3f) -> Float {
    let cosine = normal.dot(direction);
    if cosine < 0.0 { 0.0 } else { cosine * INV_PI }
}

// Uniform barycentric coordinates over a triangle.
pub fn sample_triangle(u: &Vector2f) -> Vector2f {
    let root = u.x.sqrt();
    Vector2f::new(1.0 - root, u.y * root)
}

pub fn sample_uniform_index(count: usize, r: Float) -> usize {
    if count == 0 {
        return 0;
    }
    ((r * count as Float) as usize).min(count - 1)
}

pub fn sample_uniform_index_pdf(count: usize) -> Float {
    if count == 0 { 0.0 } else { 1.0 / count as Float }
}

// Draw from a cumulative distribution; `cdf` is monotone and its last
// entry holds the total weight.
pub fn sample_discrete(cdf: &[Float], r: Float) -> usize {
    if cdf.is_empty() {
        return 0;
    }
    let total = cdf[cdf.len() - 1];
    let target = (r * total).min(total - total * 1e-6);
    let idx = cdf.partition_point(|&w| w <= target);
    idx.min(cdf.len() - 1)
}

pub fn sample_discrete_pdf(cdf: &[Float], idx: usize) -> Float {
    if idx >= cdf.len() {
        return 0.0;
    }
    if idx == 0 { cdf[0] } else { cdf[idx] - cdf[idx - 1] }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_discrete_respects_weights() {
        let cdf = vec![1.0, 3.0, 6.0];
        assert_eq!(sample_discrete(&cdf, 0.0), 0);
        assert_eq!(sample_discrete(&cdf, 0.3), 1);
        assert_eq!(sample_discrete(&cdf, 0.9), 2);
        assert!((sample_discrete_pdf(&cdf, 1) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_hemisphere_cos_stays_above_surface() {
        let n = Vector3f::new(0.0, 1.0, 0.0);
        let mut u = 0.05;
        while u < 1.0 {
            let d = sample_hemisphere_cos(&n, &Vector2f::new(u, 1.0 - u));
            assert!(n.dot(&d) >= 0.0);
            assert!((d.norm() - 1.0).abs() < 1e-4);
            u += 0.1;
        }
    }

    #[test]
    fn test_sphere_sample_is_unit(){
        let d = sample_sphere(&Vector2f::new(0.3, 0.8));
        assert!((d.norm() - 1.0).abs() < 1e-5);
    }
}
