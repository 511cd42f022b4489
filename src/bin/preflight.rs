// src/bin/preflight.rs - Checks that everything `gesture-mate run` needs is in place
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use gesture_mate::video;
use gesture_mate::{Command, Config, LabelSet, MlpClassifier};

#[derive(Parser, Debug)]
#[command(name = "preflight", about = "Verify labels, model, detector and camera")]
struct Args {
    /// Config file path (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip opening the camera
    #[arg(long)]
    no_camera: bool,
}

fn pass(message: impl AsRef<str>) -> bool {
    println!("✓ {}", message.as_ref());
    true
}

fn fail(message: impl AsRef<str>) -> bool {
    println!("✗ {}", message.as_ref());
    false
}

fn check_labels(config: &Config) -> bool {
    let path = &config.labels_path;
    if !path.exists() {
        return fail(format!("Labels file NOT FOUND: {} (defaults will be used)", path.display()));
    }
    match LabelSet::load(path) {
        Ok(labels) if labels.is_empty() => fail(format!("Labels file has no labels: {}", path.display())),
        Ok(labels) => {
            pass(format!("Labels file: {} ({} labels)", path.display(), labels.len()));
            [Command::Next, Command::Space]
                .iter()
                .map(|command| {
                    if labels.iter().any(|l| l == command.as_str()) {
                        pass(format!("Reserved label {}", command.as_str()))
                    } else {
                        fail(format!("Reserved label {} missing", command.as_str()))
                    }
                })
                .fold(true, |ok, found| ok && found)
        }
        Err(e) => fail(format!("Labels file unreadable: {}: {}", path.display(), e)),
    }
}

fn check_model(config: &Config) -> bool {
    match MlpClassifier::load(&config.model_path) {
        Ok(model) => pass(format!(
            "Model: {} ({} outputs)",
            config.model_path.display(),
            model.output_len()
        )),
        Err(e) => fail(format!("Model: {}", e)),
    }
}

fn check_detector(config: &Config) -> bool {
    let Some(program) = config.detector.command.first() else {
        return fail("No hand detector command configured (detector.command)");
    };
    let program = PathBuf::from(program);
    let found = program.is_file()
        || std::env::var_os("PATH")
            .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(&program).is_file()))
            .unwrap_or(false);
    if found {
        pass(format!("Hand detector: {}", config.detector.command.join(" ")))
    } else {
        fail(format!("Hand detector NOT FOUND: {}", program.display()))
    }
}

fn check_camera(config: &Config) -> bool {
    match video::list_cameras() {
        Ok(cameras) if cameras.is_empty() => return fail("No cameras found"),
        Ok(cameras) => {
            pass(format!("Found {} camera(s)", cameras.len()));
        }
        Err(e) => return fail(format!("{}", e)),
    }

    match video::probe_camera(&config.camera) {
        Ok(()) => pass(format!("Camera {} opened and captured a frame", config.camera.index)),
        Err(e) => {
            fail(format!("Camera {}: {}", config.camera.index, e));
            println!("\nPossible causes:");
            println!("1. Camera is being used by another app");
            println!("2. Camera permissions not granted");
            println!("3. No camera connected");
            false
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    println!("{}", "=".repeat(60));
    println!("GestureMate Setup Check");
    println!("{}", "=".repeat(60));

    let config = match &args.config {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    };
    let config = match config {
        Ok(config) => {
            pass("Configuration valid");
            config
        }
        Err(e) => {
            fail(format!("Configuration: {}", e));
            return ExitCode::FAILURE;
        }
    };

    println!("\n--- Checking Required Files ---");
    let mut all_ok = check_labels(&config);
    all_ok &= check_model(&config);

    println!("\n--- Checking Hand Detector ---");
    all_ok &= check_detector(&config);

    if !args.no_camera {
        println!("\n--- Checking Camera ---");
        all_ok &= check_camera(&config);
    }

    println!("\n{}", "=".repeat(60));
    if all_ok {
        println!("✓ All checks passed! Start with: gesture-mate run");
        ExitCode::SUCCESS
    } else {
        println!("✗ Some checks failed. Please fix the issues above.");
        ExitCode::FAILURE
    }
}
