// Copyright 2020 @TwoCookingMice

use super::constants::{ Vector3f, Matrix4f };
use super::ray::Ray3f;

// Rigid object-to-world placement stored with its inverse so rays can be
// mapped into local space without re-inverting per query.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Transform {
    matrix: Matrix4f,
    inv_matrix: Matrix4f
}

impl Default for Transform {
    fn default() -> Self {
        Self { matrix: Matrix4f::identity(),
               inv_matrix: Matrix4f::identity() }
    }
}

impl Transform {
    pub fn new(matrix: Matrix4f) -> Self {
        Self { matrix,
               inv_matrix: matrix.try_inverse().unwrap_or_else(Matrix4f::identity) }
    }

    pub fn from_translation(offset: Vector3f) -> Self {
        let mut matrix = Matrix4f::identity();
        matrix[(0, 3)] = offset.x;
        matrix[(1, 3)] = offset.y;
        matrix[(2, 3)] = offset.z;
        Self::new(matrix)
    }

    // Frame whose z axis points from `center` towards `eye`, the convention
    // the camera evaluator expects (it shoots rays down local -z).
    pub fn look_at(eye: Vector3f, center: Vector3f, up: Vector3f) -> Self {
        let z = (eye - center).normalize();
        let x = up.cross(&z).normalize();
        let y = z.cross(&x);

        let mut matrix = Matrix4f::identity();
        for row in 0..3 {
            matrix[(row, 0)] = x[row];
            matrix[(row, 1)] = y[row];
            matrix[(row, 2)] = z[row];
            matrix[(row, 3)] = eye[row];
        }
        Self::new(matrix)
    }

    pub fn apply_point(&self, p: Vector3f) -> Vector3f {
        let x = p[0] * self.matrix[(0, 0)] + p[1] * self.matrix[(0, 1)] +
            p[2] * self.matrix[(0, 2)] + self.matrix[(0, 3)];
        let y = p[0] * self.matrix[(1, 0)] + p[1] * self.matrix[(1, 1)] +
            p[2] * self.matrix[(1, 2)] + self.matrix[(1, 3)];
        let z = p[0] * self.matrix[(2, 0)] + p[1] * self.matrix[(2, 1)] +
            p[2] * self.matrix[(2, 2)] + self.matrix[(2, 3)];
        let w = p[0] * self.matrix[(3, 0)] + p[1] * self.matrix[(3, 1)] +
            p[2] * self.matrix[(3, 2)] + self.matrix[(3, 3)];

        Vector3f::new(x / w, y / w, z / w)
    }

    pub fn apply_vector(&self, v: Vector3f) -> Vector3f {
        let x = v[0] * self.matrix[(0, 0)] + v[1] * self.matrix[(0, 1)] + v[2] * self.matrix[(0, 2)];
        let y = v[0] * self.matrix[(1, 0)] + v[1] * self.matrix[(1, 1)] + v[2] * self.matrix[(1, 2)];
        let z = v[0] * self.matrix[(2, 0)] + v[1] * self.matrix[(2, 1)] + v[2] * self.matrix[(2, 2)];

        Vector3f::new(x, y, z)
    }

    // Normal transformation is different from point transformation.
    // Before transformation, we have n^Tx = 0
    // After transformation, we have (Sn)^T(Mx) = 0
    // Then, we will get: S = (M^{-1})^T
    pub fn apply_normal(&self, n: Vector3f) -> Vector3f {
        let transpose_inv = self.inv_matrix.transpose();
        let x = n[0] * transpose_inv[(0, 0)] + n[1] * transpose_inv[(0, 1)] + n[2] * transpose_inv[(0, 2)];
        let y = n[0] * transpose_inv[(1, 0)] + n[1] * transpose_inv[(1, 1)] + n[2] * transpose_inv[(1, 2)];
        let z = n[0] * transpose_inv[(2, 0)] + n[1] * transpose_inv[(2, 1)] + n[2] * transpose_inv[(2, 2)];

        Vector3f::new(x, y, z)
    }

    pub fn inv_apply_point(&self, p: Vector3f) -> Vector3f {
        let x = p[0] * self.inv_matrix[(0, 0)] + p[1] * self.inv_matrix[(0, 1)] +
            p[2] * self.inv_matrix[(0, 2)] + self.inv_matrix[(0, 3)];
        let y = p[0] * self.inv_matrix[(1, 0)] + p[1] * self.inv_matrix[(1, 1)] +
            p[2] * self.inv_matrix[(1, 2)] + self.inv_matrix[(1, 3)];
        let z = p[0] * self.inv_matrix[(2, 0)] + p[1] * self.inv_matrix[(2, 1)] +
            p[2] * self.inv_matrix[(2, 2)] + self.inv_matrix[(2, 3)];
        let w = p[0] * self.inv_matrix[(3, 0)] + p[1] * self.inv_matrix[(3, 1)] +
            p[2] * self.inv_matrix[(3, 2)] + self.inv_matrix[(3, 3)];

        Vector3f::new(x / w, y / w, z / w)
    }

    pub fn inv_apply_vector(&self, v: Vector3f) -> Vector3f {
        let x = v[0] * self.inv_matrix[(0, 0)] + v[1] * self.inv_matrix[(0, 1)] + v[2] * self.inv_matrix[(0, 2)];
        let y = v[0] * self.inv_matrix[(1, 0)] + v[1] * self.inv_matrix[(1, 1)] + v[2] * self.inv_matrix[(1, 2)];
        let z = v[0] * self.inv_matrix[(2, 0)] + v[1] * self.inv_matrix[(2, 1)] + v[2] * self.inv_matrix[(2, 2)];

        Vector3f::new(x, y, z)
    }

    pub fn inv_apply_ray(&self, ray: &Ray3f) -> Ray3f {
        let new_p = self.inv_apply_point(ray.origin());
        let new_d = self.inv_apply_vector(ray.dir());

        Ray3f::with_range(new_p, new_d, ray.min_t, ray.max_t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_look_at_roundtrip() {
        let t = Transform::look_at(
            Vector3f::new(0.0, 1.0, 3.9),
            Vector3f::new(0.0, 1.0, 0.0),
            Vector3f::new(0.0, 1.0, 0.0),
        );
        let origin = t.apply_point(Vector3f::new(0.0, 0.0, 0.0));
        assert!((origin - Vector3f::new(0.0, 1.0, 3.9)).norm() < 1e-5);

        let forward = t.apply_vector(Vector3f::new(0.0, 0.0, -1.0));
        assert!((forward - Vector3f::new(0.0, 0.0, -1.0)).norm() < 1e-5);

        let back = t.inv_apply_point(origin);
        assert!(back.norm() < 1e-5);
    }
}
