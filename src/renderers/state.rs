// Copyright @yucwang 2026

use crate::core::bvh::SceneBvh;
use crate::core::lights::LightTable;
use crate::core::rng::StreamRng;
use crate::core::scene::{camera_resolution, Scene};
use crate::integrators::{sample_camera, trace_sampler, TraceParams};
use crate::math::bitmap::Bitmap;
use crate::math::constants::{Float, Vector3f, Vector4f};

// Seed for the stream-id generator, not for the streams themselves; the
// user seed goes into every pixel generator.
const STATE_SEED: u64 = 1301081;

// One accumulation slot. Owned by exactly one worker at a time, so the
// scheduler never locks around pixel updates.
#[derive(Debug, Clone)]
pub struct PixelState {
    pub render: Vector4f,
    pub albedo: Vector3f,
    pub normal: Vector3f,
    pub hits: u32,
    pub rng: StreamRng,
}

// Progressive per-pixel means, kept across batches. The sample counter is
// one scalar shared by all pixels.
pub struct RenderState {
    width: usize,
    height: usize,
    samples: usize,
    pixels: Vec<PixelState>,
    denoised: Option<Vec<Vector4f>>,
}

impl RenderState {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn pixel(&self, i: usize, j: usize) -> &PixelState {
        &self.pixels[i + self.width * j]
    }

    pub(crate) fn pixel_mut(&mut self, i: usize, j: usize) -> &mut PixelState {
        &mut self.pixels[i + self.width * j]
    }

    pub(crate) fn rows_mut(&mut self) -> std::slice::ChunksMut<PixelState> {
        self.pixels.chunks_mut(self.width)
    }

    pub(crate) fn advance_samples(&mut self, batch: usize) {
        self.samples += batch;
    }
}

// Buffers sized from the active camera aspect; every pixel gets its own
// decorrelated generator so results do not depend on scheduling.
pub fn make_render_state(scene: &Scene, params: &TraceParams) -> RenderState {
    let camera = &scene.cameras[params.camera];
    let (width, height) = camera_resolution(camera, params.resolution);

    let mut streams = StreamRng::new(STATE_SEED);
    let pixels = (0..width * height)
        .map(|_| PixelState {
            render: Vector4f::zeros(),
            albedo: Vector3f::zeros(),
            normal: Vector3f::zeros(),
            hits: 0,
            rng: StreamRng::with_stream(params.seed, ((streams.next_u32() >> 1) + 1) as u64),
        })
        .collect();

    RenderState {
        width,
        height,
        samples: 0,
        pixels,
        denoised: if params.denoise {
            Some(vec![Vector4f::zeros(); width * height])
        } else {
            None
        },
    }
}

fn lerp3(a: &Vector3f, b: &Vector3f, t: Float) -> Vector3f {
    a * (1.0 - t) + b * t
}

fn lerp4(a: &Vector4f, b: &Vector4f, t: Float) -> Vector4f {
    a * (1.0 - t) + b * t
}

// One sample for one pixel, folded into the running means with weight
// 1 / (sample + 1). Callers must feed strictly increasing sample indices.
pub(crate) fn trace_pixel_sample(
    pixel: &mut PixelState, scene: &Scene, bvh: &SceneBvh, lights: &LightTable,
    ij: (usize, usize), resolution: (usize, usize), sample: usize, params: &TraceParams,
) {
    let camera = &scene.cameras[params.camera];
    let puv = pixel.rng.next_2f();
    let luv = pixel.rng.next_2f();
    let ray = sample_camera(camera, ij, resolution, &puv, &luv, params.tentfilter);

    let result = trace_sampler(scene, bvh, lights, &ray, &mut pixel.rng, params);

    let mut radiance = result.radiance;
    if !(radiance.x.is_finite() && radiance.y.is_finite() && radiance.z.is_finite()) {
        radiance = Vector3f::zeros();
    }
    if radiance.max() > params.clamp {
        radiance *= params.clamp / radiance.max();
    }

    let weight = 1.0 / (sample as Float + 1.0);
    if result.hit {
        pixel.render = lerp4(
            &pixel.render,
            &Vector4f::new(radiance.x, radiance.y, radiance.z, 1.0),
            weight,
        );
        pixel.albedo = lerp3(&pixel.albedo, &result.albedo, weight);
        pixel.normal = lerp3(&pixel.normal, &result.normal, weight);
        pixel.hits += 1;
    } else if !params.envhidden && !scene.environments.is_empty() {
        pixel.render = lerp4(
            &pixel.render,
            &Vector4f::new(radiance.x, radiance.y, radiance.z, 1.0),
            weight,
        );
        pixel.albedo = lerp3(&pixel.albedo, &Vector3f::new(1.0, 1.0, 1.0), weight);
        pixel.normal = lerp3(&pixel.normal, &(-ray.dir()), weight);
        pixel.hits += 1;
    } else {
        pixel.render = lerp4(&pixel.render, &Vector4f::zeros(), weight);
        pixel.albedo = lerp3(&pixel.albedo, &Vector3f::zeros(), weight);
        pixel.normal = lerp3(&pixel.normal, &(-ray.dir()), weight);
    }
}

// Single-pixel entry point used by the serial scheduler and by tests.
pub fn trace_sample(
    state: &mut RenderState, scene: &Scene, bvh: &SceneBvh, lights: &LightTable,
    ij: (usize, usize), sample: usize, params: &TraceParams,
) {
    let resolution = (state.width, state.height);
    let pixel = state.pixel_mut(ij.0, ij.1);
    trace_pixel_sample(pixel, scene, bvh, lights, ij, resolution, sample, params);
}

// Final image: the denoised buffer when denoising ran, the raw means
// otherwise.
pub fn get_image(state: &RenderState) -> Bitmap<Vector4f> {
    match &state.denoised {
        Some(denoised) => Bitmap::from_vec(state.width, state.height, denoised.clone()),
        None => get_rendered_image(state),
    }
}

pub fn get_rendered_image(state: &RenderState) -> Bitmap<Vector4f> {
    Bitmap::from_vec(
        state.width,
        state.height,
        state.pixels.iter().map(|p| p.render).collect(),
    )
}

pub fn get_albedo_image(state: &RenderState) -> Bitmap<Vector3f> {
    Bitmap::from_vec(
        state.width,
        state.height,
        state.pixels.iter().map(|p| p.albedo).collect(),
    )
}

pub fn get_normal_image(state: &RenderState) -> Bitmap<Vector3f> {
    Bitmap::from_vec(
        state.width,
        state.height,
        state.pixels.iter().map(|p| p.normal).collect(),
    )
}

pub fn get_denoised_image(state: &RenderState) -> Bitmap<Vector4f> {
    let render = get_rendered_image(state);
    let albedo = get_albedo_image(state);
    let normal = get_normal_image(state);
    let mut denoised = render.clone();
    denoise_image(&mut denoised, &render, &albedo, &normal);
    denoised
}

// Edge-stopping 5x5 smoothing guided by the auxiliary buffers. Callers
// may substitute a passthrough; this one trades a little blur for less
// sample noise.
pub fn denoise_image(
    denoised: &mut Bitmap<Vector4f>,
    render: &Bitmap<Vector4f>,
    albedo: &Bitmap<Vector3f>,
    normal: &Bitmap<Vector3f>,
) {
    assert_eq!(denoised.width(), render.width());
    assert_eq!(denoised.height(), render.height());
    assert_eq!(albedo.width(), render.width());
    assert_eq!(normal.width(), render.width());

    let width = render.width() as isize;
    let height = render.height() as isize;
    const KERNEL: [Float; 5] = [1.0 / 16.0, 1.0 / 4.0, 3.0 / 8.0, 1.0 / 4.0, 1.0 / 16.0];
    const SIGMA_ALBEDO: Float = 0.1;
    const SIGMA_NORMAL: Float = 0.3;

    for j in 0..height {
        for i in 0..width {
            let center = (i as usize, j as usize);
            let center_albedo = albedo[center];
            let center_normal = normal[center];

            let mut sum = Vector4f::zeros();
            let mut total = 0.0;
            for dj in -2..=2 as isize {
                for di in -2..=2 as isize {
                    let x = i + di;
                    let y = j + dj;
                    if x < 0 || x >= width || y < 0 || y >= height {
                        continue;
                    }
                    let tap = (x as usize, y as usize);
                    let albedo_dist = (albedo[tap] - center_albedo).norm_squared();
                    let normal_dist = (normal[tap] - center_normal).norm_squared();
                    let edge_weight = (-albedo_dist / (SIGMA_ALBEDO * SIGMA_ALBEDO)).exp()
                        * (-normal_dist / (SIGMA_NORMAL * SIGMA_NORMAL)).exp();
                    let weight = KERNEL[(di + 2) as usize] * KERNEL[(dj + 2) as usize]
                        * edge_weight;
                    sum += render[tap] * weight;
                    total += weight;
                }
            }
            denoised[center] = if total > 0.0 { sum / total } else { render[center] };
        }
    }
}

// Refreshes the denoised buffer; the scheduler calls this after a batch.
pub(crate) fn denoise_state(state: &mut RenderState) {
    if state.denoised.is_none() {
        return;
    }
    let denoised = get_denoised_image(state);
    state.denoised = Some(denoised.raw().to_vec());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bvh::make_scene_bvh;
    use crate::core::lights::make_lights;
    use crate::core::presets::{make_cornellbox, make_furnace};
    use crate::integrators::SamplerType;

    #[test]
    fn test_incremental_mean_matches_arithmetic_mean() {
        // the exact update rule used by trace_sample
        let values = [0.25, 3.0, 1.5, 0.0, 2.25, 0.75, 10.0];
        let mut mean = Vector4f::zeros();
        for (sample, v) in values.iter().enumerate() {
            let weight = 1.0 / (sample as Float + 1.0);
            mean = lerp4(&mean, &Vector4f::new(*v, *v, *v, 1.0), weight);
        }
        let expected: Float = values.iter().sum::<Float>() / values.len() as Float;
        assert!((mean.x - expected).abs() < 1e-5);
        assert!((mean.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_state_resolution_follows_camera() {
        let scene = make_cornellbox();
        let params = TraceParams { resolution: 64, ..TraceParams::default() };
        let state = make_render_state(&scene, &params);
        assert_eq!(state.width(), 64);
        assert_eq!(state.height(), 64);
        assert_eq!(state.samples(), 0);
    }

    #[test]
    fn test_constant_estimator_accumulates_exactly() {
        // the furnace sampler is deterministic on this scene, so the
        // running mean must match it bit for bit after any sample count
        let albedo = 0.75;
        let scene = make_furnace(albedo);
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams {
            sampler: SamplerType::Furnace,
            resolution: 8,
            ..TraceParams::default()
        };
        let mut state = make_render_state(&scene, &params);

        let ij = (4, 4);
        for sample in 0..10 {
            trace_sample(&mut state, &scene, &bvh, &lights, ij, sample, &params);
        }
        let pixel = state.pixel(ij.0, ij.1);
        assert_eq!(pixel.hits, 10);
        assert!((pixel.render.x - albedo).abs() < 1e-4);
        assert!((pixel.render.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_denoise_preserves_flat_regions() {
        let width = 8;
        let height = 8;
        let render = Bitmap::from_vec(
            width, height, vec![Vector4f::new(0.5, 0.5, 0.5, 1.0); width * height]);
        let albedo = Bitmap::from_vec(
            width, height, vec![Vector3f::new(0.5, 0.5, 0.5); width * height]);
        let normal = Bitmap::from_vec(
            width, height, vec![Vector3f::new(0.0, 0.0, 1.0); width * height]);
        let mut denoised = render.clone();
        denoise_image(&mut denoised, &render, &albedo, &normal);
        for j in 0..height {
            for i in 0..width {
                assert!((denoised[(i, j)].x - 0.5).abs() < 1e-5);
            }
        }
    }
}
