// Copyright @yucwang 2026

use super::constants::{Float, Vector2f, Vector3f};
use super::ray::Ray3f;

pub fn triangle_area(p0: &Vector3f, p1: &Vector3f, p2: &Vector3f) -> Float {
    0.5 * (p1 - p0).cross(&(p2 - p0)).norm()
}

pub fn quad_area(p0: &Vector3f, p1: &Vector3f, p2: &Vector3f, p3: &Vector3f) -> Float {
    triangle_area(p0, p1, p3) + triangle_area(p2, p3, p1)
}

pub fn triangle_normal(p0: &Vector3f, p1: &Vector3f, p2: &Vector3f) -> Vector3f {
    let n = (p1 - p0).cross(&(p2 - p0));
    let len = n.norm();
    if len > 0.0 { n / len } else { Vector3f::zeros() }
}

pub fn quad_normal(p0: &Vector3f, p1: &Vector3f, p2: &Vector3f, p3: &Vector3f) -> Vector3f {
    let n = triangle_normal(p0, p1, p3) + triangle_normal(p2, p3, p1);
    let len = n.norm();
    if len > 0.0 { n / len } else { Vector3f::zeros() }
}

pub fn interpolate_triangle3(
    p0: &Vector3f, p1: &Vector3f, p2: &Vector3f, uv: &Vector2f,
) -> Vector3f {
    p0 * (1.0 - uv.x - uv.y) + p1 * uv.x + p2 * uv.y
}

pub fn interpolate_triangle2(
    p0: &Vector2f, p1: &Vector2f, p2: &Vector2f, uv: &Vector2f,
) -> Vector2f {
    p0 * (1.0 - uv.x - uv.y) + p1 * uv.x + p2 * uv.y
}

// Quads are interpolated as two triangles sharing the p1-p3 diagonal; the
// second triangle is addressed with flipped uv so the pair covers the
// bilinear domain consistently with `intersect_quad`.
pub fn interpolate_quad3(
    p0: &Vector3f, p1: &Vector3f, p2: &Vector3f, p3: &Vector3f, uv: &Vector2f,
) -> Vector3f {
    if uv.x + uv.y <= 1.0 {
        interpolate_triangle3(p0, p1, p3, uv)
    } else {
        interpolate_triangle3(p2, p3, p1, &Vector2f::new(1.0 - uv.x, 1.0 - uv.y))
    }
}

pub fn interpolate_quad2(
    p0: &Vector2f, p1: &Vector2f, p2: &Vector2f, p3: &Vector2f, uv: &Vector2f,
) -> Vector2f {
    if uv.x + uv.y <= 1.0 {
        interpolate_triangle2(p0, p1, p3, uv)
    } else {
        interpolate_triangle2(p2, p3, p1, &Vector2f::new(1.0 - uv.x, 1.0 - uv.y))
    }
}

// Moller-Trumbore. Returns barycentric uv and the parametric distance.
pub fn intersect_triangle(
    ray: &Ray3f, p0: &Vector3f, p1: &Vector3f, p2: &Vector3f,
) -> Option<(Vector2f, Float)> {
    let edge1 = p1 - p0;
    let edge2 = p2 - p0;
    let pvec = ray.dir().cross(&edge2);
    let det = edge1.dot(&pvec);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = ray.origin() - p0;
    let u = tvec.dot(&pvec) * inv_det;
    if u < 0.0 || u > 1.0 {
        return None;
    }

    let qvec = tvec.cross(&edge1);
    let v = ray.dir().dot(&qvec) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(&qvec) * inv_det;
    if t < ray.min_t || t > ray.max_t {
        return None;
    }

    Some((Vector2f::new(u, v), t))
}

pub fn intersect_quad(
    ray: &Ray3f, p0: &Vector3f, p1: &Vector3f, p2: &Vector3f, p3: &Vector3f,
) -> Option<(Vector2f, Float)> {
    let mut best: Option<(Vector2f, Float)> = None;
    let mut tray = *ray;
    if let Some((uv, t)) = intersect_triangle(&tray, p0, p1, p3) {
        tray.max_t = t;
        best = Some((uv, t));
    }
    if let Some((uv, t)) = intersect_triangle(&tray, p2, p3, p1) {
        best = Some((Vector2f::new(1.0 - uv.x, 1.0 - uv.y), t));
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triangle_hit_and_area() {
        let p0 = Vector3f::new(0.0, 0.0, 0.0);
        let p1 = Vector3f::new(1.0, 0.0, 0.0);
        let p2 = Vector3f::new(0.0, 1.0, 0.0);
        assert!((triangle_area(&p0, &p1, &p2) - 0.5).abs() < 1e-6);

        let ray = Ray3f::new(Vector3f::new(0.25, 0.25, 1.0), Vector3f::new(0.0, 0.0, -1.0));
        let (uv, t) = intersect_triangle(&ray, &p0, &p1, &p2).unwrap();
        assert!((t - 1.0).abs() < 1e-5);
        assert!((uv.x - 0.25).abs() < 1e-5);
        assert!((uv.y - 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_quad_uv_matches_interpolation() {
        let p0 = Vector3f::new(-1.0, -1.0, 0.0);
        let p1 = Vector3f::new(1.0, -1.0, 0.0);
        let p2 = Vector3f::new(1.0, 1.0, 0.0);
        let p3 = Vector3f::new(-1.0, 1.0, 0.0);

        let ray = Ray3f::new(Vector3f::new(0.3, 0.6, 2.0), Vector3f::new(0.0, 0.0, -1.0));
        let (uv, t) = intersect_quad(&ray, &p0, &p1, &p2, &p3).unwrap();
        let hit = interpolate_quad3(&p0, &p1, &p2, &p3, &uv);
        let expected = ray.at(t);
        assert!((hit - expected).norm() < 1e-4);
    }
}
