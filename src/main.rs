// Copyright 2020 TwoCookingMice

use genoise::core::bvh::make_scene_bvh;
use genoise::core::lights::make_lights;
use genoise::core::presets::make_preset;
use genoise::core::scene::Environment;
use genoise::integrators::{FalsecolorType, SamplerType, TraceParams};
use genoise::io::exr_utils;
use genoise::io::texture_utils::load_texture;
use genoise::math::constants::Vector3f;
use genoise::math::transform::Transform;
use genoise::renderers::progressive::trace_samples;
use genoise::renderers::state::{get_image, make_render_state};

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::str::FromStr;

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} <preset> <output.exr> [--sampler NAME] [--falsecolor MODE] \
         [--resolution N] [--samples N] [--bounces N] [--batch N] [--seed N] \
         [--clamp X] [--camera N] [--envmap FILE] [--tent] [--envhidden] \
         [--nocaustics] [--denoise] [--noparallel]",
        program
    );
    std::process::exit(1);
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("error:").red().bold(), message);
    std::process::exit(1);
}

fn main() {
    env::set_var("RUST_LOG", "info");
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage(&args[0]);
    }

    let preset = &args[1];
    let output_path = &args[2];
    let mut params = TraceParams::default();
    let mut envmap_path: Option<String> = None;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--sampler" => {
                i += 1;
                let name = args.get(i).map(String::as_str).unwrap_or("");
                params.sampler = SamplerType::from_str(name).unwrap_or_else(|e| fail(e));
            }
            "--falsecolor" => {
                i += 1;
                let name = args.get(i).map(String::as_str).unwrap_or("");
                params.falsecolor = FalsecolorType::from_str(name).unwrap_or_else(|e| fail(e));
            }
            "--resolution" => {
                i += 1;
                params.resolution = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(params.resolution);
            }
            "--samples" => {
                i += 1;
                params.samples = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(params.samples);
            }
            "--bounces" => {
                i += 1;
                params.bounces = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(params.bounces);
            }
            "--batch" => {
                i += 1;
                params.batch = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(params.batch);
            }
            "--seed" => {
                i += 1;
                params.seed = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(params.seed);
            }
            "--clamp" => {
                i += 1;
                params.clamp = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(params.clamp);
            }
            "--camera" => {
                i += 1;
                params.camera = args.get(i).and_then(|v| v.parse().ok()).unwrap_or(params.camera);
            }
            "--envmap" => {
                i += 1;
                envmap_path = args.get(i).cloned();
            }
            "--tent" => params.tentfilter = true,
            "--envhidden" => params.envhidden = true,
            "--nocaustics" => params.nocaustics = true,
            "--denoise" => params.denoise = true,
            "--noparallel" => params.noparallel = true,
            other => {
                eprintln!("unrecognized option: {}", other);
                usage(&args[0]);
            }
        }
        i += 1;
    }

    let mut scene = make_preset(preset).unwrap_or_else(|e| fail(e));
    if let Some(path) = envmap_path {
        let texture = load_texture(&path).unwrap_or_else(|e| fail(e));
        scene.textures.push(texture);
        scene.environments.push(Environment {
            frame: Transform::default(),
            emission: Vector3f::new(1.0, 1.0, 1.0),
            emission_tex: Some(scene.textures.len() - 1),
        });
    }

    if params.camera >= scene.cameras.len() {
        fail(format!("camera {} does not exist in this scene", params.camera));
    }

    log::info!("building acceleration structure");
    let bvh = make_scene_bvh(&scene);
    let lights = make_lights(&scene);
    if lights.is_empty() && params.sampler.is_lit() {
        log::warn!("the scene has no lights; expect a black render");
    }

    let mut state = make_render_state(&scene, &params);
    log::info!(
        "rendering {}x{} at {} samples per pixel",
        state.width(),
        state.height(),
        params.samples
    );

    let progress = ProgressBar::new(params.samples as u64);
    progress.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} samples")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    while state.samples() < params.samples {
        let before = state.samples();
        trace_samples(&mut state, &scene, &bvh, &lights, &params);
        progress.inc((state.samples() - before) as u64);
    }
    progress.finish_and_clear();

    let image = get_image(&state);
    exr_utils::write_exr_to_file(&image, output_path);
    println!(
        "{} {} ({}x{}, {} spp)",
        style("done").green().bold(),
        output_path,
        image.width(),
        image.height(),
        state.samples()
    );
}
