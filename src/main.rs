// src/main.rs - gesture-mate command line
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gesture_mate::config::CameraConfig;
use gesture_mate::video::{self, MjpegWriter, VideoSource};
use gesture_mate::{Config, Error, MlpClassifier, Pipeline, ReplayDetector, Session};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

type FrameSink = MjpegWriter<BufWriter<File>>;

/// GestureMate - sign-language spelling from hand poses
#[derive(Parser, Debug)]
#[command(name = "gesture-mate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Recognize from the camera; type status, reset, health or quit on stdin.
    ///
    /// Runs until `quit`, Ctrl-C or the camera stream ending. A closed or
    /// redirected stdin leaves the console idle and recognition running.
    Run {
        /// Camera index, overrides the config file
        #[arg(long)]
        camera: Option<u32>,

        /// Write annotated frames as an MJPEG stream to this file
        #[arg(long)]
        mjpeg: Option<PathBuf>,
    },

    /// Run recorded landmarks through the pipeline and print the result
    Replay {
        /// CSV with 42 values per row, or `-` for a frame without a hand
        #[arg(short, long)]
        landmarks: PathBuf,

        /// Write annotated frames as an MJPEG stream to this file
        #[arg(long)]
        mjpeg: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_default().context("Failed to load default config")?,
    };

    match cli.command {
        Commands::Run { camera, mjpeg } => run_camera(config, camera, mjpeg).await,
        Commands::Replay { landmarks, mjpeg } => run_replay(config, &landmarks, mjpeg),
    }
}

fn open_sink(path: Option<&Path>, quality: u8) -> Result<Option<FrameSink>> {
    path.map(|path| {
        let file = File::create(path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        info!("Writing MJPEG stream to {}", path.display());
        Ok(MjpegWriter::new(BufWriter::new(file), quality))
    })
    .transpose()
}

async fn run_camera(mut config: Config, camera: Option<u32>, mjpeg: Option<PathBuf>) -> Result<()> {
    if let Some(index) = camera {
        config.camera.index = index;
    }

    match video::list_cameras() {
        Ok(cameras) => {
            info!("Found {} camera(s)", cameras.len());
            for (i, name) in cameras.iter().enumerate() {
                info!("  [{}] {}", i, name);
            }
        }
        Err(e) => warn!("{}", e),
    }

    let sink = open_sink(mjpeg.as_deref(), config.stream.jpeg_quality)?;
    let session = Arc::new(Session::from_config(config.clone()));
    session
        .initialize()
        .context("Failed to initialize recognition pipeline")?;

    let loop_session = Arc::clone(&session);
    let camera_config = config.camera.clone();
    let mut frame_loop =
        tokio::task::spawn_blocking(move || camera_loop(&loop_session, &camera_config, sink));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("Interrupted, stopping"),
        _ = console(Arc::clone(&session), stdin_lines()) => info!("Quit requested, stopping"),
        result = &mut frame_loop => {
            session.shutdown();
            return result.context("Frame loop panicked")?;
        }
    }

    session.shutdown();
    frame_loop.await.context("Frame loop panicked")??;
    println!("{}", serde_json::to_string_pretty(&session.status())?);
    Ok(())
}

fn camera_loop(session: &Session, camera: &CameraConfig, mut sink: Option<FrameSink>) -> Result<()> {
    let mut source = VideoSource::new_camera(camera).context("Failed to open camera")?;
    info!("Camera initialized, starting frame loop");

    while !session.is_shut_down() {
        let frame = match source.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(e) => {
                warn!("{}", e);
                std::thread::sleep(Duration::from_millis(100));
                continue;
            }
        };

        let output = match session.process(frame) {
            Ok(output) => output,
            Err(Error::ShutDown) => break,
            Err(e) => return Err(e.into()),
        };
        debug!(
            "char={} sentence={:?} confidence={:.2}",
            output.character, output.sentence, output.confidence
        );

        if let Some(writer) = sink.as_mut() {
            if let Err(e) = writer.write_frame(&output.frame) {
                warn!("Failed to encode frame: {}", e);
            }
        }
    }

    info!("Camera released");
    Ok(())
}

/// Forwards trimmed stdin lines. The channel closes at end of input.
fn stdin_lines() -> UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    // stdin stays on its own thread so shutdown never waits on a read
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();
        while stdin.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
            if tx.send(line.trim().to_string()).is_err() {
                break;
            }
            line.clear();
        }
    });

    rx
}

/// Reads console commands until `quit`. At end of input the console goes
/// idle and never completes.
async fn console(session: Arc<Session>, mut lines: UnboundedReceiver<String>) {
    while let Some(command) = lines.recv().await {
        let reply = match command.as_str() {
            "" => continue,
            "status" => serde_json::to_string_pretty(&session.status()),
            "reset" => serde_json::to_string_pretty(&serde_json::json!({
                "status": "reset",
                "state": session.reset(),
            })),
            "health" => serde_json::to_string_pretty(&session.health()),
            "quit" | "exit" => return,
            other => {
                println!("unknown command '{}', expected status, reset, health or quit", other);
                continue;
            }
        };
        match reply {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize reply: {}", e),
        }
    }

    debug!("stdin closed, console idle");
    std::future::pending::<()>().await
}

fn run_replay(config: Config, landmarks: &Path, mjpeg: Option<PathBuf>) -> Result<()> {
    let detector = ReplayDetector::load(landmarks)
        .with_context(|| format!("Failed to load landmarks from {}", landmarks.display()))?;
    let frame_count = detector.len();
    let detector = Mutex::new(Some(detector));

    let session = Session::new(
        config.clone(),
        Box::new(move |config: &Config| -> gesture_mate::Result<Pipeline> {
            let classifier = MlpClassifier::load(&config.model_path)?;
            let detector = detector
                .lock()
                .map_err(|_| Error::Detector("replay detector lock poisoned".to_string()))?
                .take()
                .ok_or_else(|| Error::Detector("replay already consumed".to_string()))?;
            Ok(Pipeline::new(detector, classifier))
        }),
    );
    session
        .initialize()
        .context("Failed to initialize recognition pipeline")?;

    let mut sink = open_sink(mjpeg.as_deref(), config.stream.jpeg_quality)?;
    let mut source = VideoSource::new_still(config.camera.width, config.camera.height, frame_count);
    let mut skipped = 0usize;

    while let Some(frame) = source.read_frame()? {
        let output = session.process(frame)?;
        if output.skipped {
            skipped += 1;
        }
        if let Some(writer) = sink.as_mut() {
            if let Err(e) = writer.write_frame(&output.frame) {
                warn!("Failed to encode frame: {}", e);
            }
        }
    }

    info!("Replayed {} frames ({} skipped)", frame_count, skipped);
    println!("{}", serde_json::to_string_pretty(&session.status())?);
    session.shutdown();
    Ok(())
}
