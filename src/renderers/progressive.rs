// Copyright @yucwang 2026

use std::panic;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use crate::core::bvh::{make_scene_bvh, SceneBvh};
use crate::core::lights::{make_lights, LightTable};
use crate::core::scene::{camera_resolution, Scene};
use crate::integrators::TraceParams;
use crate::math::bitmap::Bitmap;
use crate::math::constants::Vector4f;
use crate::renderers::state::{
    denoise_state, get_image, make_render_state, trace_pixel_sample, PixelState, RenderState,
};

// One batch over the whole grid. Workers claim rows through a shared
// cursor; a claimed row hands its pixel slots to that worker exclusively,
// so accumulation itself runs without locks. Returns false when the stop
// flag cut the batch short; the sample counter is then left untouched so
// callers can tell a finished batch from an aborted one.
fn trace_batch(
    state: &mut RenderState, scene: &Scene, bvh: &SceneBvh, lights: &LightTable,
    params: &TraceParams, stop: Option<&AtomicBool>,
) -> bool {
    let batch = params.batch.min(params.samples.saturating_sub(state.samples()));
    if batch == 0 {
        return true;
    }

    let resolution = (state.width(), state.height());
    let first_sample = state.samples();

    if params.noparallel {
        for j in 0..resolution.1 {
            for i in 0..resolution.0 {
                for sample in first_sample..first_sample + batch {
                    if let Some(flag) = stop {
                        if flag.load(Ordering::Relaxed) {
                            return false;
                        }
                    }
                    let pixel = state.pixel_mut(i, j);
                    trace_pixel_sample(
                        pixel, scene, bvh, lights, (i, j), resolution, sample, params);
                }
            }
        }
    } else {
        let nthreads = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        let next_row = AtomicUsize::new(0);
        let cancelled = AtomicBool::new(false);
        let rows: Vec<Mutex<&mut [PixelState]>> =
            state.rows_mut().map(Mutex::new).collect();

        thread::scope(|scope| {
            for _ in 0..nthreads {
                let rows = &rows;
                let next_row = &next_row;
                let cancelled = &cancelled;
                scope.spawn(move || loop {
                    let j = next_row.fetch_add(1, Ordering::Relaxed);
                    if j >= rows.len() {
                        break;
                    }
                    let mut row = match rows[j].lock() {
                        Ok(row) => row,
                        Err(_) => break,
                    };
                    for (i, pixel) in row.iter_mut().enumerate() {
                        for sample in first_sample..first_sample + batch {
                            if let Some(flag) = stop {
                                if flag.load(Ordering::Relaxed) {
                                    cancelled.store(true, Ordering::Relaxed);
                                    return;
                                }
                            }
                            trace_pixel_sample(
                                pixel, scene, bvh, lights, (i, j), resolution, sample, params);
                        }
                    }
                });
            }
        });

        if cancelled.load(Ordering::Relaxed) {
            return false;
        }
    }

    state.advance_samples(batch);
    if params.denoise {
        denoise_state(state);
    }
    true
}

// Advances every pixel by one batch; no-op once the sample budget is
// reached. Must not run concurrently with itself on one state.
pub fn trace_samples(
    state: &mut RenderState, scene: &Scene, bvh: &SceneBvh, lights: &LightTable,
    params: &TraceParams,
) {
    trace_batch(state, scene, bvh, lights, params, None);
}

// Cancellable background rendering. The state moves into the worker and
// comes back at the join; the flags are the only state shared with it.
pub struct TraceContext {
    stop: Arc<AtomicBool>,
    done: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<RenderState>>,
}

pub fn make_trace_context() -> TraceContext {
    TraceContext {
        stop: Arc::new(AtomicBool::new(false)),
        done: Arc::new(AtomicBool::new(false)),
        worker: None,
    }
}

// Launches one batch on a background thread. The stop flag is polled
// between samples, so cancellation latency is bounded by a single
// sample, not a batch.
pub fn trace_start(
    context: &mut TraceContext, state: RenderState,
    scene: &Arc<Scene>, bvh: &Arc<SceneBvh>, lights: &Arc<LightTable>,
    params: &TraceParams,
) {
    if context.worker.is_some() {
        log::warn!("a batch is already in flight; cancel it first");
        return;
    }

    context.stop.store(false, Ordering::SeqCst);
    context.done.store(false, Ordering::SeqCst);

    let stop = Arc::clone(&context.stop);
    let done = Arc::clone(&context.done);
    let scene = Arc::clone(scene);
    let bvh = Arc::clone(bvh);
    let lights = Arc::clone(lights);
    let params = params.clone();

    context.worker = Some(thread::spawn(move || {
        let mut state = state;
        let completed = trace_batch(&mut state, &scene, &bvh, &lights, &params, Some(&stop));
        if completed {
            done.store(true, Ordering::SeqCst);
        }
        state
    }));
}

// Requests cancellation and blocks until the worker observes it, then
// returns the state. A panic inside the worker resurfaces here instead of
// being swallowed.
pub fn trace_cancel(context: &mut TraceContext) -> Option<RenderState> {
    context.stop.store(true, Ordering::SeqCst);
    let worker = context.worker.take()?;
    match worker.join() {
        Ok(state) => {
            context.stop.store(false, Ordering::SeqCst);
            Some(state)
        }
        Err(payload) => panic::resume_unwind(payload),
    }
}

// Whether the most recently started batch ran to completion.
pub fn trace_done(context: &TraceContext) -> bool {
    context.done.load(Ordering::SeqCst)
}

// Convenience: build everything and refine until the sample budget is
// spent.
pub fn trace_image(scene: &Scene, params: &TraceParams) -> Bitmap<Vector4f> {
    let bvh = make_scene_bvh(scene);
    let lights = make_lights(scene);
    let mut state = make_render_state(scene, params);
    while state.samples() < params.samples {
        trace_samples(&mut state, scene, &bvh, &lights, params);
    }
    get_image(&state)
}

// One-sample render at reduced resolution, expanded to full size for
// interactive feedback.
pub fn trace_preview(
    scene: &Scene, bvh: &SceneBvh, lights: &LightTable, params: &TraceParams,
) -> Bitmap<Vector4f> {
    let mut pparams = params.clone();
    pparams.resolution = (params.resolution / params.pratio.max(1)).max(1);
    pparams.samples = 1;
    pparams.batch = 1;
    pparams.denoise = false;

    let mut pstate = make_render_state(scene, &pparams);
    trace_samples(&mut pstate, scene, bvh, lights, &pparams);
    let preview = get_image(&pstate);

    let camera = &scene.cameras[params.camera];
    let (width, height) = camera_resolution(camera, params.resolution);
    let mut image: Bitmap<Vector4f> = Bitmap::filled(width, height, Vector4f::zeros());
    for j in 0..image.height() {
        for i in 0..image.width() {
            let pi = (i * preview.width() / image.width()).min(preview.width() - 1);
            let pj = (j * preview.height() / image.height()).min(preview.height() - 1);
            image[(i, j)] = preview[(pi, pj)];
        }
    }
    image
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::presets::make_cornellbox;
    use crate::renderers::state::get_rendered_image;

    fn small_params() -> TraceParams {
        TraceParams {
            resolution: 16,
            samples: 2,
            batch: 2,
            bounces: 4,
            ..TraceParams::default()
        }
    }

    #[test]
    fn test_parallel_matches_serial_bitwise() {
        let scene = make_cornellbox();
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);

        let mut serial_params = small_params();
        serial_params.noparallel = true;
        let mut serial = make_render_state(&scene, &serial_params);
        trace_samples(&mut serial, &scene, &bvh, &lights, &serial_params);

        let parallel_params = small_params();
        let mut parallel = make_render_state(&scene, &parallel_params);
        trace_samples(&mut parallel, &scene, &bvh, &lights, &parallel_params);

        assert_eq!(serial.samples(), parallel.samples());
        let a = get_rendered_image(&serial);
        let b = get_rendered_image(&parallel);
        for j in 0..a.height() {
            for i in 0..a.width() {
                assert_eq!(a[(i, j)], b[(i, j)], "pixel ({}, {})", i, j);
            }
        }
    }

    #[test]
    fn test_batches_stop_at_sample_budget() {
        let scene = make_cornellbox();
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams {
            resolution: 8,
            samples: 3,
            batch: 2,
            bounces: 2,
            noparallel: true,
            ..TraceParams::default()
        };
        let mut state = make_render_state(&scene, &params);

        trace_samples(&mut state, &scene, &bvh, &lights, &params);
        assert_eq!(state.samples(), 2);
        trace_samples(&mut state, &scene, &bvh, &lights, &params);
        assert_eq!(state.samples(), 3);
        trace_samples(&mut state, &scene, &bvh, &lights, &params);
        assert_eq!(state.samples(), 3);
    }

    #[test]
    fn test_cancellation_keeps_state_consistent() {
        let scene = Arc::new(make_cornellbox());
        let bvh = Arc::new(make_scene_bvh(&scene));
        let lights = Arc::new(make_lights(&scene));
        let params = TraceParams {
            resolution: 64,
            samples: 4096,
            batch: 4096,
            bounces: 8,
            ..TraceParams::default()
        };
        let state = make_render_state(&scene, &params);

        let mut context = make_trace_context();
        trace_start(&mut context, state, &scene, &bvh, &lights, &params);
        let state = trace_cancel(&mut context).expect("worker returns the state");
        assert!(!trace_done(&context));
        // a cancelled batch leaves the sample counter untouched
        assert_eq!(state.samples(), 0);
    }

    #[test]
    fn test_async_completion_reports_done() {
        let scene = Arc::new(make_cornellbox());
        let bvh = Arc::new(make_scene_bvh(&scene));
        let lights = Arc::new(make_lights(&scene));
        let params = TraceParams {
            resolution: 8,
            samples: 1,
            batch: 1,
            bounces: 2,
            ..TraceParams::default()
        };
        let state = make_render_state(&scene, &params);

        let mut context = make_trace_context();
        trace_start(&mut context, state, &scene, &bvh, &lights, &params);
        while context.worker.as_ref().map(|w| !w.is_finished()).unwrap_or(false) {
            thread::yield_now();
        }
        let state = trace_cancel(&mut context).expect("worker returns the state");
        assert!(trace_done(&context));
        assert_eq!(state.samples(), 1);
    }

    #[test]
    fn test_trace_image_convenience() {
        let scene = crate::core::presets::make_furnace(0.5);
        let params = TraceParams {
            resolution: 4,
            samples: 2,
            batch: 2,
            bounces: 2,
            noparallel: true,
            ..TraceParams::default()
        };
        let image = trace_image(&scene, &params);
        assert_eq!(image.width(), 4);
        assert_eq!(image.height(), 4);
        for pixel in image.raw() {
            assert!(pixel.x.is_finite() && pixel.x >= 0.0);
        }
    }

    #[test]
    fn test_preview_covers_full_resolution() {
        let scene = make_cornellbox();
        let bvh = make_scene_bvh(&scene);
        let lights = make_lights(&scene);
        let params = TraceParams {
            resolution: 32,
            samples: 16,
            bounces: 2,
            pratio: 8,
            ..TraceParams::default()
        };
        let preview = trace_preview(&scene, &bvh, &lights, &params);
        assert_eq!(preview.width(), 32);
        assert_eq!(preview.height(), 32);
    }
}
