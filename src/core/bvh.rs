// Copyright @yucwang 2026

use crate::core::scene::{Scene, SceneIntersection, Shape};
use crate::math::aabb::AABB;
use crate::math::constants::{Float, Vector2f, Vector3f};
use crate::math::geometry::{intersect_quad, intersect_triangle};
use crate::math::ray::Ray3f;

const SAH_BUCKETS: usize = 12;
const MAX_LEAF_SIZE: usize = 4;

#[derive(Clone)]
struct BvhNode {
    bounds: AABB,
    left: Option<usize>,
    right: Option<usize>,
    start: usize,
    count: usize,
}

impl BvhNode {
    fn leaf(bounds: AABB, start: usize, count: usize) -> Self {
        Self { bounds, left: None, right: None, start, count }
    }

    fn interior(bounds: AABB, left: usize, right: usize) -> Self {
        Self { bounds, left: Some(left), right: Some(right), start: 0, count: 0 }
    }

    fn is_leaf(&self) -> bool {
        self.count > 0
    }
}

// SAH-built hierarchy over abstract primitives; intersection is delegated
// to callbacks so the same structure serves shape elements and instances.
pub struct Bvh {
    nodes: Vec<BvhNode>,
    indices: Vec<usize>,
    prim_bounds: Vec<AABB>,
    prim_centroids: Vec<Vector3f>,
}

impl Bvh {
    pub fn new(prim_bounds: Vec<AABB>) -> Self {
        let prim_centroids = prim_bounds.iter().map(|b| b.center()).collect();
        let mut bvh = Self {
            indices: (0..prim_bounds.len()).collect(),
            nodes: Vec::new(),
            prim_bounds,
            prim_centroids,
        };

        if !bvh.indices.is_empty() {
            let (bounds, centroid_bounds) = bvh.compute_bounds(0, bvh.indices.len());
            bvh.build(0, bvh.indices.len(), bounds, centroid_bounds);
        }

        bvh
    }

    // Traversal returns the closest hit reported by the callback; the
    // callback sees the closest distance so far and may cull against it.
    pub fn intersect<T, F>(&self, ray: &Ray3f, mut hit_fn: F) -> Option<(usize, T, Float)>
    where
        F: FnMut(usize, &Ray3f, Float) -> Option<(T, Float)>,
    {
        if self.nodes.is_empty() {
            return None;
        }

        let mut closest: Option<(usize, T, Float)> = None;
        let mut closest_t = ray.max_t;
        let mut stack = vec![0usize];

        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if !node.bounds.ray_intersect(ray, closest_t) {
                continue;
            }

            if node.is_leaf() {
                for i in 0..node.count {
                    let prim_idx = self.indices[node.start + i];
                    if let Some((hit, t)) = hit_fn(prim_idx, ray, closest_t) {
                        if t < closest_t {
                            closest_t = t;
                            closest = Some((prim_idx, hit, t));
                        }
                    }
                }
            } else {
                if let Some(left) = node.left {
                    stack.push(left);
                }
                if let Some(right) = node.right {
                    stack.push(right);
                }
            }
        }

        closest
    }

    // Early-out traversal for shadow rays.
    pub fn intersect_any<F>(&self, ray: &Ray3f, mut hit_fn: F) -> bool
    where
        F: FnMut(usize, &Ray3f) -> bool,
    {
        if self.nodes.is_empty() {
            return false;
        }

        let mut stack = vec![0usize];
        while let Some(node_idx) = stack.pop() {
            let node = &self.nodes[node_idx];
            if !node.bounds.ray_intersect(ray, ray.max_t) {
                continue;
            }
            if node.is_leaf() {
                for i in 0..node.count {
                    let prim_idx = self.indices[node.start + i];
                    if hit_fn(prim_idx, ray) {
                        return true;
                    }
                }
            } else {
                if let Some(left) = node.left {
                    stack.push(left);
                }
                if let Some(right) = node.right {
                    stack.push(right);
                }
            }
        }

        false
    }

    fn build(&mut self, start: usize, end: usize, bounds: AABB, centroid_bounds: AABB) -> usize {
        let count = end - start;
        if count <= MAX_LEAF_SIZE {
            let node_idx = self.nodes.len();
            self.nodes.push(BvhNode::leaf(bounds, start, count));
            return node_idx;
        }

        let axis = centroid_bounds.max_extent() as usize;
        let axis_min = centroid_bounds.p_min[axis];
        let axis_max = centroid_bounds.p_max[axis];
        if (axis_max - axis_min).abs() < 1e-6 {
            let node_idx = self.nodes.len();
            self.nodes.push(BvhNode::leaf(bounds, start, count));
            return node_idx;
        }

        // SAH with fixed buckets along the split axis.
        let mut buckets = vec![(0usize, AABB::default()); SAH_BUCKETS];
        for i in start..end {
            let idx = self.indices[i];
            let b = self.bucket_of(idx, axis, axis_min, axis_max);
            buckets[b].0 += 1;
            let mut bnd = buckets[b].1;
            bnd.expand_by_aabb(&self.prim_bounds[idx]);
            buckets[b].1 = bnd;
        }

        let mut cost = [0.0f32; SAH_BUCKETS - 1];
        for i in 0..(SAH_BUCKETS - 1) {
            let mut b0 = AABB::default();
            let mut b1 = AABB::default();
            let mut count0 = 0usize;
            let mut count1 = 0usize;
            for b in 0..=i {
                count0 += buckets[b].0;
                b0.expand_by_aabb(&buckets[b].1);
            }
            for b in (i + 1)..SAH_BUCKETS {
                count1 += buckets[b].0;
                b1.expand_by_aabb(&buckets[b].1);
            }
            let area = bounds.surface_area().max(1e-6);
            let cost0 = if count0 > 0 { (count0 as Float) * b0.surface_area() } else { 0.0 };
            let cost1 = if count1 > 0 { (count1 as Float) * b1.surface_area() } else { 0.0 };
            cost[i] = 1.0 + (cost0 + cost1) / area;
        }

        let mut min_cost = cost[0];
        let mut min_split = 0usize;
        for i in 1..cost.len() {
            if cost[i] < min_cost {
                min_cost = cost[i];
                min_split = i;
            }
        }

        if min_cost >= count as Float {
            let node_idx = self.nodes.len();
            self.nodes.push(BvhNode::leaf(bounds, start, count));
            return node_idx;
        }

        // Partition indices in-place by bucket.
        let mut mid = start;
        for i in start..end {
            let idx = self.indices[i];
            if self.bucket_of(idx, axis, axis_min, axis_max) <= min_split {
                self.indices.swap(i, mid);
                mid += 1;
            }
        }

        if mid == start || mid == end {
            let node_idx = self.nodes.len();
            self.nodes.push(BvhNode::leaf(bounds, start, count));
            return node_idx;
        }

        let (left_bounds, left_centroids) = self.compute_bounds(start, mid);
        let (right_bounds, right_centroids) = self.compute_bounds(mid, end);
        let node_idx = self.nodes.len();
        self.nodes.push(BvhNode::leaf(bounds, 0, 0));
        let left = self.build(start, mid, left_bounds, left_centroids);
        let right = self.build(mid, end, right_bounds, right_centroids);
        self.nodes[node_idx] = BvhNode::interior(bounds, left, right);
        node_idx
    }

    fn bucket_of(&self, idx: usize, axis: usize, axis_min: Float, axis_max: Float) -> usize {
        let c = self.prim_centroids[idx][axis];
        let b = ((c - axis_min) / (axis_max - axis_min) * SAH_BUCKETS as Float) as usize;
        b.min(SAH_BUCKETS - 1)
    }

    fn compute_bounds(&self, start: usize, end: usize) -> (AABB, AABB) {
        let mut bounds = AABB::default();
        let mut centroid_bounds = AABB::default();
        for i in start..end {
            let idx = self.indices[i];
            bounds.expand_by_aabb(&self.prim_bounds[idx]);
            centroid_bounds.expand_by_point(&self.prim_centroids[idx]);
        }
        (bounds, centroid_bounds)
    }
}

// Two-level structure: one element hierarchy per shape, one hierarchy over
// instances. Instance frames are rigid, so parametric distances survive
// the local-space traversal unchanged.
pub struct SceneBvh {
    shape_bvhs: Vec<Bvh>,
    instance_bvh: Bvh,
}

fn element_bounds(shape: &Shape, element: usize) -> AABB {
    let mut bounds = AABB::default();
    if element < shape.triangles.len() {
        for &v in &shape.triangles[element] {
            bounds.expand_by_point(&shape.positions[v]);
        }
    } else {
        for &v in &shape.quads[element - shape.triangles.len()] {
            bounds.expand_by_point(&shape.positions[v]);
        }
    }
    bounds
}

fn shape_bounds(shape: &Shape) -> AABB {
    let mut bounds = AABB::default();
    for p in &shape.positions {
        bounds.expand_by_point(p);
    }
    bounds
}

pub fn make_scene_bvh(scene: &Scene) -> SceneBvh {
    let shape_bvhs: Vec<Bvh> = scene
        .shapes
        .iter()
        .map(|shape| {
            let bounds = (0..shape.num_elements())
                .map(|e| element_bounds(shape, e))
                .collect();
            Bvh::new(bounds)
        })
        .collect();

    let instance_bounds = scene
        .instances
        .iter()
        .map(|instance| {
            let local = shape_bounds(&scene.shapes[instance.shape]);
            let mut bounds = AABB::default();
            if local.is_valid() {
                for corner in 0..8 {
                    let p = Vector3f::new(
                        if corner & 1 == 0 { local.p_min.x } else { local.p_max.x },
                        if corner & 2 == 0 { local.p_min.y } else { local.p_max.y },
                        if corner & 4 == 0 { local.p_min.z } else { local.p_max.z },
                    );
                    bounds.expand_by_point(&instance.frame.apply_point(p));
                }
            }
            bounds
        })
        .collect();

    SceneBvh { shape_bvhs, instance_bvh: Bvh::new(instance_bounds) }
}

fn intersect_element(
    shape: &Shape, element: usize, ray: &Ray3f,
) -> Option<(Vector2f, Float)> {
    if element < shape.triangles.len() {
        let t = shape.triangles[element];
        intersect_triangle(
            ray,
            &shape.positions[t[0]],
            &shape.positions[t[1]],
            &shape.positions[t[2]],
        )
    } else {
        let q = shape.quads[element - shape.triangles.len()];
        intersect_quad(
            ray,
            &shape.positions[q[0]],
            &shape.positions[q[1]],
            &shape.positions[q[2]],
            &shape.positions[q[3]],
        )
    }
}

// Nearest hit of the whole scene, or any hit when `find_any` is set.
pub fn intersect_scene(
    bvh: &SceneBvh, scene: &Scene, ray: &Ray3f, find_any: bool,
) -> Option<SceneIntersection> {
    if find_any {
        let mut found = None;
        bvh.instance_bvh.intersect_any(ray, |instance_idx, world_ray| {
            if let Some(hit) = intersect_instance(bvh, scene, instance_idx, world_ray, true) {
                found = Some(hit);
                true
            } else {
                false
            }
        });
        return found;
    }

    bvh.instance_bvh
        .intersect(ray, |instance_idx, world_ray, closest_t| {
            let instance = &scene.instances[instance_idx];
            let shape = &scene.shapes[instance.shape];
            let local_ray = instance.frame.inv_apply_ray(&Ray3f::with_range(
                world_ray.origin(),
                world_ray.dir(),
                world_ray.min_t,
                closest_t,
            ));
            bvh.shape_bvhs[instance.shape]
                .intersect(&local_ray, |element, lray, element_closest| {
                    let culled = Ray3f::with_range(
                        lray.origin(), lray.dir(), lray.min_t, element_closest);
                    intersect_element(shape, element, &culled)
                })
                .map(|(element, uv, t)| ((element, uv), t))
        })
        .map(|(instance, (element, uv), distance)| SceneIntersection {
            instance,
            element,
            uv,
            distance,
        })
}

// Restricted to a single instance; used by the light pdf march.
pub fn intersect_instance(
    bvh: &SceneBvh, scene: &Scene, instance_idx: usize, ray: &Ray3f, find_any: bool,
) -> Option<SceneIntersection> {
    let instance = &scene.instances[instance_idx];
    let shape = &scene.shapes[instance.shape];
    let local_ray = instance.frame.inv_apply_ray(ray);

    if find_any {
        let mut found = None;
        bvh.shape_bvhs[instance.shape].intersect_any(&local_ray, |element, lray| {
            if let Some((uv, t)) = intersect_element(shape, element, lray) {
                found = Some(SceneIntersection { instance: instance_idx, element, uv, distance: t });
                true
            } else {
                false
            }
        });
        return found;
    }

    bvh.shape_bvhs[instance.shape]
        .intersect(&local_ray, |element, lray, closest_t| {
            let culled = Ray3f::with_range(lray.origin(), lray.dir(), lray.min_t, closest_t);
            intersect_element(shape, element, &culled)
        })
        .map(|(element, uv, distance)| SceneIntersection {
            instance: instance_idx,
            element,
            uv,
            distance,
        })
}
