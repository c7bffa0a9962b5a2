// Copyright @yucwang 2026

use crate::math::constants::{Float, Vector2f, Vector3f, Vector4f, PI};
use crate::math::geometry::{
    interpolate_quad2, interpolate_quad3, interpolate_triangle2, interpolate_triangle3,
    quad_area, quad_normal, triangle_area, triangle_normal,
};
use crate::math::ray::Ray3f;
use crate::math::transform::Transform;

// Roughness below this is treated as a perfect delta lobe.
pub const MIN_ROUGHNESS: Float = 0.03 * 0.03;

pub struct Camera {
    pub frame: Transform,
    pub orthographic: bool,
    pub lens: Float,
    pub film: Float,
    pub aspect: Float,
    pub focus: Float,
    pub aperture: Float,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            frame: Transform::default(),
            orthographic: false,
            lens: 0.050,
            film: 0.036,
            aspect: 1.5,
            focus: 10000.0,
            aperture: 0.0,
        }
    }
}

// Image resolution with `resolution` as the long edge, the short one
// derived from the camera aspect.
pub fn camera_resolution(camera: &Camera, resolution: usize) -> (usize, usize) {
    if camera.aspect >= 1.0 {
        (resolution, ((resolution as Float) / camera.aspect).round() as usize)
    } else {
        (((resolution as Float) * camera.aspect).round() as usize, resolution)
    }
}

// Maps a normalized film coordinate and a lens sample to a primary ray,
// honoring depth of field through the aperture/focus pair.
pub fn eval_camera(camera: &Camera, image_uv: &Vector2f, lens_uv: &Vector2f) -> Ray3f {
    let film = if camera.aspect >= 1.0 {
        Vector2f::new(camera.film, camera.film / camera.aspect)
    } else {
        Vector2f::new(camera.film * camera.aspect, camera.film)
    };

    if !camera.orthographic {
        let q = Vector3f::new(
            film.x * (0.5 - image_uv.x),
            film.y * (image_uv.y - 0.5),
            camera.lens,
        );
        let dc = -q.normalize();
        let e = Vector3f::new(
            lens_uv.x * camera.aperture / 2.0,
            lens_uv.y * camera.aperture / 2.0,
            0.0,
        );
        let p = dc * (camera.focus / dc.z.abs());
        let d = (p - e).normalize();
        Ray3f::new(camera.frame.apply_point(e), camera.frame.apply_vector(d))
    } else {
        let scale = 1.0 / camera.lens;
        let q = Vector3f::new(
            film.x * (0.5 - image_uv.x) * scale,
            film.y * (image_uv.y - 0.5) * scale,
            camera.lens,
        );
        let e = Vector3f::new(-q.x, -q.y, 0.0)
            + Vector3f::new(
                lens_uv.x * camera.aperture / 2.0,
                lens_uv.y * camera.aperture / 2.0,
                0.0,
            );
        let p = Vector3f::new(-q.x, -q.y, -camera.focus);
        let d = (p - e).normalize();
        Ray3f::new(camera.frame.apply_point(e), camera.frame.apply_vector(d))
    }
}

// HDR pixel grid sampled by materials and environments.
pub struct Texture {
    pub width: usize,
    pub height: usize,
    pub pixels: Vec<Vector4f>,
    pub nearest: bool,
    pub clamp: bool,
}

impl Texture {
    pub fn lookup_texel(&self, i: usize, j: usize) -> Vector4f {
        self.pixels[i.min(self.width - 1) + self.width * j.min(self.height - 1)]
    }

    fn wrap(coord: Float, size: usize, clamp: bool) -> usize {
        if clamp {
            (coord.max(0.0) as usize).min(size - 1)
        } else {
            let size_f = size as Float;
            let mut c = coord % size_f;
            if c < 0.0 {
                c += size_f;
            }
            (c as usize).min(size - 1)
        }
    }

    pub fn eval(&self, uv: &Vector2f) -> Vector4f {
        if self.width == 0 || self.height == 0 {
            return Vector4f::new(1.0, 1.0, 1.0, 1.0);
        }

        let s = uv.x * self.width as Float - 0.5;
        let t = uv.y * self.height as Float - 0.5;
        if self.nearest {
            let i = Self::wrap(s.round(), self.width, self.clamp);
            let j = Self::wrap(t.round(), self.height, self.clamp);
            return self.lookup_texel(i, j);
        }

        let i0 = Self::wrap(s.floor(), self.width, self.clamp);
        let j0 = Self::wrap(t.floor(), self.height, self.clamp);
        let i1 = Self::wrap(s.floor() + 1.0, self.width, self.clamp);
        let j1 = Self::wrap(t.floor() + 1.0, self.height, self.clamp);
        let fu = s - s.floor();
        let fv = t - t.floor();

        self.lookup_texel(i0, j0) * (1.0 - fu) * (1.0 - fv)
            + self.lookup_texel(i1, j0) * fu * (1.0 - fv)
            + self.lookup_texel(i0, j1) * (1.0 - fu) * fv
            + self.lookup_texel(i1, j1) * fu * fv
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialType {
    Matte,
    Glossy,
    Reflective,
    Transparent,
    Refractive,
    Subsurface,
    Volumetric,
    GltfPbr,
}

pub struct Material {
    pub mtype: MaterialType,
    pub emission: Vector3f,
    pub color: Vector3f,
    pub roughness: Float,
    pub metallic: Float,
    pub ior: Float,
    pub scattering: Vector3f,
    pub scanisotropy: Float,
    pub trdepth: Float,
    pub opacity: Float,
    pub emission_tex: Option<usize>,
    pub color_tex: Option<usize>,
    pub roughness_tex: Option<usize>,
    pub scattering_tex: Option<usize>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            mtype: MaterialType::Matte,
            emission: Vector3f::zeros(),
            color: Vector3f::zeros(),
            roughness: 0.0,
            metallic: 0.0,
            ior: 1.5,
            scattering: Vector3f::zeros(),
            scanisotropy: 0.0,
            trdepth: 0.01,
            opacity: 1.0,
            emission_tex: None,
            color_tex: None,
            roughness_tex: None,
            scattering_tex: None,
        }
    }
}

// Material with its textures resolved at a shading point. Also the volume
// descriptor pushed on the medium stack when a path enters a transmissive
// instance.
#[derive(Debug, Clone, Copy)]
pub struct MaterialPoint {
    pub mtype: MaterialType,
    pub emission: Vector3f,
    pub color: Vector3f,
    pub opacity: Float,
    pub roughness: Float,
    pub metallic: Float,
    pub ior: Float,
    pub density: Vector3f,
    pub scattering: Vector3f,
    pub scanisotropy: Float,
    pub trdepth: Float,
}

pub struct Shape {
    pub positions: Vec<Vector3f>,
    pub normals: Vec<Vector3f>,
    pub texcoords: Vec<Vector2f>,
    pub triangles: Vec<[usize; 3]>,
    pub quads: Vec<[usize; 4]>,
}

impl Shape {
    // Elements are indexed triangles-first, then quads.
    pub fn num_elements(&self) -> usize {
        self.triangles.len() + self.quads.len()
    }

    pub fn element_area(&self, element: usize) -> Float {
        if element < self.triangles.len() {
            let t = self.triangles[element];
            triangle_area(&self.positions[t[0]], &self.positions[t[1]], &self.positions[t[2]])
        } else {
            let q = self.quads[element - self.triangles.len()];
            quad_area(
                &self.positions[q[0]],
                &self.positions[q[1]],
                &self.positions[q[2]],
                &self.positions[q[3]],
            )
        }
    }
}

pub struct Instance {
    pub frame: Transform,
    pub shape: usize,
    pub material: usize,
}

pub struct Environment {
    pub frame: Transform,
    pub emission: Vector3f,
    pub emission_tex: Option<usize>,
}

#[derive(Default)]
pub struct Scene {
    pub cameras: Vec<Camera>,
    pub instances: Vec<Instance>,
    pub environments: Vec<Environment>,
    pub shapes: Vec<Shape>,
    pub textures: Vec<Texture>,
    pub materials: Vec<Material>,
}

// Nearest-hit record produced by the acceleration structure; `distance`
// is the parametric ray distance.
#[derive(Debug, Clone, Copy)]
pub struct SceneIntersection {
    pub instance: usize,
    pub element: usize,
    pub uv: Vector2f,
    pub distance: Float,
}

pub fn eval_texture(scene: &Scene, texture: Option<usize>, uv: &Vector2f) -> Vector4f {
    match texture {
        Some(idx) => scene.textures[idx].eval(uv),
        None => Vector4f::new(1.0, 1.0, 1.0, 1.0),
    }
}

pub fn eval_position(
    scene: &Scene, instance: &Instance, element: usize, uv: &Vector2f,
) -> Vector3f {
    let shape = &scene.shapes[instance.shape];
    let local = if element < shape.triangles.len() {
        let t = shape.triangles[element];
        interpolate_triangle3(
            &shape.positions[t[0]],
            &shape.positions[t[1]],
            &shape.positions[t[2]],
            uv,
        )
    } else {
        let q = shape.quads[element - shape.triangles.len()];
        interpolate_quad3(
            &shape.positions[q[0]],
            &shape.positions[q[1]],
            &shape.positions[q[2]],
            &shape.positions[q[3]],
            uv,
        )
    };
    instance.frame.apply_point(local)
}

// Geometric normal of the hit element.
pub fn eval_element_normal(scene: &Scene, instance: &Instance, element: usize) -> Vector3f {
    let shape = &scene.shapes[instance.shape];
    let local = if element < shape.triangles.len() {
        let t = shape.triangles[element];
        triangle_normal(&shape.positions[t[0]], &shape.positions[t[1]], &shape.positions[t[2]])
    } else {
        let q = shape.quads[element - shape.triangles.len()];
        quad_normal(
            &shape.positions[q[0]],
            &shape.positions[q[1]],
            &shape.positions[q[2]],
            &shape.positions[q[3]],
        )
    };
    instance.frame.apply_normal(local).normalize()
}

// Interpolated vertex normal, falling back to the element normal for
// shapes without per-vertex normals.
pub fn eval_normal(
    scene: &Scene, instance: &Instance, element: usize, uv: &Vector2f,
) -> Vector3f {
    let shape = &scene.shapes[instance.shape];
    if shape.normals.is_empty() {
        return eval_element_normal(scene, instance, element);
    }
    let local = if element < shape.triangles.len() {
        let t = shape.triangles[element];
        interpolate_triangle3(&shape.normals[t[0]], &shape.normals[t[1]], &shape.normals[t[2]], uv)
    } else {
        let q = shape.quads[element - shape.triangles.len()];
        interpolate_quad3(
            &shape.normals[q[0]],
            &shape.normals[q[1]],
            &shape.normals[q[2]],
            &shape.normals[q[3]],
            uv,
        )
    };
    instance.frame.apply_normal(local).normalize()
}

pub fn eval_texcoord(
    scene: &Scene, instance: &Instance, element: usize, uv: &Vector2f,
) -> Vector2f {
    let shape = &scene.shapes[instance.shape];
    if shape.texcoords.is_empty() {
        return *uv;
    }
    if element < shape.triangles.len() {
        let t = shape.triangles[element];
        interpolate_triangle2(&shape.texcoords[t[0]], &shape.texcoords[t[1]], &shape.texcoords[t[2]], uv)
    } else {
        let q = shape.quads[element - shape.triangles.len()];
        interpolate_quad2(
            &shape.texcoords[q[0]],
            &shape.texcoords[q[1]],
            &shape.texcoords[q[2]],
            &shape.texcoords[q[3]],
            uv,
        )
    }
}

pub fn eval_shading_position(
    scene: &Scene, intersection: &SceneIntersection, _outgoing: &Vector3f,
) -> Vector3f {
    let instance = &scene.instances[intersection.instance];
    eval_position(scene, instance, intersection.element, &intersection.uv)
}

// Shading normal oriented towards the viewer, except for refractive
// materials where the signed normal tells entering from exiting.
pub fn eval_shading_normal(
    scene: &Scene, intersection: &SceneIntersection, outgoing: &Vector3f,
) -> Vector3f {
    let instance = &scene.instances[intersection.instance];
    eval_shading_normal_at(scene, instance, intersection.element, &intersection.uv, outgoing)
}

pub fn eval_shading_normal_at(
    scene: &Scene, instance: &Instance, element: usize, uv: &Vector2f, outgoing: &Vector3f,
) -> Vector3f {
    let material = &scene.materials[instance.material];
    let normal = eval_normal(scene, instance, element, uv);
    if material.mtype == MaterialType::Refractive {
        return normal;
    }
    if normal.dot(outgoing) >= 0.0 { normal } else { -normal }
}

pub fn eval_material(scene: &Scene, intersection: &SceneIntersection) -> MaterialPoint {
    let instance = &scene.instances[intersection.instance];
    eval_material_at(scene, instance, intersection.element, &intersection.uv)
}

pub fn eval_material_at(
    scene: &Scene, instance: &Instance, element: usize, uv: &Vector2f,
) -> MaterialPoint {
    let material = &scene.materials[instance.material];
    let texcoord = eval_texcoord(scene, instance, element, uv);

    let emission_tex = eval_texture(scene, material.emission_tex, &texcoord);
    let color_tex = eval_texture(scene, material.color_tex, &texcoord);
    let roughness_tex = eval_texture(scene, material.roughness_tex, &texcoord);
    let scattering_tex = eval_texture(scene, material.scattering_tex, &texcoord);

    let mut point = MaterialPoint {
        mtype: material.mtype,
        emission: material.emission.component_mul(&emission_tex.xyz()),
        color: material.color.component_mul(&color_tex.xyz()),
        opacity: material.opacity * color_tex.w,
        roughness: material.roughness * roughness_tex.y,
        metallic: material.metallic * roughness_tex.z,
        ior: material.ior,
        density: Vector3f::zeros(),
        scattering: material.scattering.component_mul(&scattering_tex.xyz()),
        scanisotropy: material.scanisotropy,
        trdepth: material.trdepth,
    };

    // Beer-Lambert density derived from the transmission color.
    if matches!(
        point.mtype,
        MaterialType::Refractive | MaterialType::Volumetric | MaterialType::Subsurface
    ) {
        point.density = Vector3f::new(
            -point.color.x.max(1e-4).min(1.0).ln() / point.trdepth,
            -point.color.y.max(1e-4).min(1.0).ln() / point.trdepth,
            -point.color.z.max(1e-4).min(1.0).ln() / point.trdepth,
        );
    }

    // Roughness is authored perceptually and squared for the microfacet
    // lobes; anything below the delta threshold collapses to zero.
    point.roughness = point.roughness * point.roughness;
    if point.roughness < MIN_ROUGHNESS {
        point.roughness = 0.0;
    }

    point
}

// Total emission of all environments along a world direction.
pub fn eval_environment(scene: &Scene, direction: &Vector3f) -> Vector3f {
    let mut emission = Vector3f::zeros();
    for environment in &scene.environments {
        let wl = environment.frame.inv_apply_vector(*direction);
        let mut texcoord = Vector2f::new(
            wl.z.atan2(wl.x) / (2.0 * PI),
            wl.y.max(-1.0).min(1.0).acos() / PI,
        );
        if texcoord.x < 0.0 {
            texcoord.x += 1.0;
        }
        emission += environment
            .emission
            .component_mul(&eval_texture(scene, environment.emission_tex, &texcoord).xyz());
    }
    emission
}

// Environment direction for a texel of an image environment, the inverse
// of the texcoord mapping above.
pub fn environment_direction(
    environment: &Environment, texture: &Texture, idx: usize,
) -> Vector3f {
    let u = ((idx % texture.width) as Float + 0.5) / texture.width as Float;
    let v = ((idx / texture.width) as Float + 0.5) / texture.height as Float;
    let local = Vector3f::new(
        (u * 2.0 * PI).cos() * (v * PI).sin(),
        (v * PI).cos(),
        (u * 2.0 * PI).sin() * (v * PI).sin(),
    );
    environment.frame.apply_vector(local)
}
