// Copyright @yucwang 2026

use crate::core::tangent_frame::{build_tangent_frame, local_to_world};
use crate::math::constants::{Float, PI, Vector2f, Vector3f};

// Henyey-Greenstein phase function. The convention matches the surface
// lobes: `outgoing` points back along the arriving ray.
pub fn eval_phasefunction(anisotropy: Float, outgoing: &Vector3f, incoming: &Vector3f) -> Float {
    let cosine = -outgoing.dot(incoming);
    let denom = 1.0 + anisotropy * anisotropy - 2.0 * anisotropy * cosine;
    if denom <= 0.0 {
        return 0.0;
    }
    (1.0 - anisotropy * anisotropy) / (4.0 * PI * denom * denom.sqrt())
}

pub fn sample_phasefunction(anisotropy: Float, outgoing: &Vector3f, rn: &Vector2f) -> Vector3f {
    let cos_theta = if anisotropy.abs() < 1e-3 {
        1.0 - 2.0 * rn.y
    } else {
        let square = (1.0 - anisotropy * anisotropy)
            / (1.0 + anisotropy - 2.0 * anisotropy * rn.y);
        (1.0 + anisotropy * anisotropy - square * square) / (2.0 * anisotropy)
    };

    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let phi = 2.0 * PI * rn.x;
    let local = Vector3f::new(sin_theta * phi.cos(), sin_theta * phi.sin(), cos_theta);

    let forward = -outgoing;
    let (tangent, bitangent) = build_tangent_frame(&forward);
    local_to_world(&local, &tangent, &bitangent, &forward)
}

pub fn sample_phasefunction_pdf(
    anisotropy: Float, outgoing: &Vector3f, incoming: &Vector3f,
) -> Float {
    eval_phasefunction(anisotropy, outgoing, incoming)
}

pub fn eval_transmittance(density: &Vector3f, distance: Float) -> Vector3f {
    Vector3f::new(
        (-density.x * distance).exp(),
        (-density.y * distance).exp(),
        (-density.z * distance).exp(),
    )
}

// Distance sampling: pick a channel uniformly, then an exponential free
// flight, clamped at the surface hit.
pub fn sample_transmittance(
    density: &Vector3f, max_distance: Float, rl: Float, rd: Float,
) -> Float {
    let channel = ((rl * 3.0) as usize).min(2);
    let channel_density = density[channel];
    let distance = if channel_density == 0.0 {
        Float::MAX
    } else {
        -(1.0 - rd).max(1e-8).ln() / channel_density
    };
    distance.min(max_distance)
}

pub fn sample_transmittance_pdf(
    density: &Vector3f, distance: Float, max_distance: Float,
) -> Float {
    if distance < max_distance {
        let tr = eval_transmittance(density, distance);
        (density.x * tr.x + density.y * tr.y + density.z * tr.z) / 3.0
    } else {
        let tr = eval_transmittance(density, max_distance);
        (tr.x + tr.y + tr.z) / 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isotropic_phase_is_uniform() {
        let outgoing = Vector3f::new(0.0, 0.0, 1.0);
        let a = eval_phasefunction(0.0, &outgoing, &Vector3f::new(0.0, 0.0, -1.0));
        let b = eval_phasefunction(0.0, &outgoing, &Vector3f::new(1.0, 0.0, 0.0));
        assert!((a - 1.0 / (4.0 * PI)).abs() < 1e-6);
        assert!((a - b).abs() < 1e-6);
    }

    #[test]
    fn test_forward_scattering_peaks_forward() {
        let outgoing = Vector3f::new(0.0, 0.0, 1.0);
        // incoming continuing the ray direction scores higher than reversal
        let forward = eval_phasefunction(0.7, &outgoing, &Vector3f::new(0.0, 0.0, -1.0));
        let backward = eval_phasefunction(0.7, &outgoing, &Vector3f::new(0.0, 0.0, 1.0));
        assert!(forward > backward);
    }

    #[test]
    fn test_transmittance_sampling_is_bounded() {
        let density = Vector3f::new(0.5, 1.0, 2.0);
        for (rl, rd) in [(0.1, 0.2), (0.5, 0.99), (0.9, 0.5)] {
            let d = sample_transmittance(&density, 3.0, rl, rd);
            assert!(d > 0.0 && d <= 3.0);
            assert!(sample_transmittance_pdf(&density, d, 3.0) > 0.0);
        }
    }
}
