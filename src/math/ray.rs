// Copyright @yucwang 2026

use super::constants::{Float, Vector3f, FLOAT_MAX};

#[derive(Debug, Clone, Copy)]
pub struct Ray3f {
    origin: Vector3f,
    dir: Vector3f,
    pub min_t: Float,
    pub max_t: Float,
}

impl Ray3f {
    pub fn new(o: Vector3f, d: Vector3f) -> Self {
        Self { origin: o, dir: d.normalize(), min_t: 1e-4, max_t: FLOAT_MAX }
    }

    pub fn with_range(o: Vector3f, d: Vector3f, min_t: Float, max_t: Float) -> Self {
        Self { origin: o, dir: d.normalize(), min_t, max_t }
    }

    pub fn origin(&self) -> Vector3f {
        self.origin
    }

    pub fn dir(&self) -> Vector3f {
        self.dir
    }

    pub fn at(&self, t: Float) -> Vector3f {
        self.origin + self.dir * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray3f_at() {
        let o = Vector3f::new(0.0, 1.0, 0.0);
        let d = Vector3f::new(0.0, 0.0, -2.0);
        let ray = Ray3f::new(o, d);

        let p = ray.at(3.0);
        assert!((p.x - 0.0).abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
        assert!((p.z + 3.0).abs() < 1e-6);
    }
}
