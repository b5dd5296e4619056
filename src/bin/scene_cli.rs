use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scene_player::protocol;
use scene_player::remote::{StubBinder, StubEngine};
use scene_player::{
    AppConfig, Atom, ConnectionParts, HostControl, LogFeed, Overlay, RemoteConnection,
    RenderSurface,
};
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "scene_cli",
    about = "Overlay protocol harness for the scene player"
)]
struct Cli {
    /// Configuration file (defaults to assets/scene_config.json)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print library logs to stderr
    #[arg(long)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode one message given as a JSON array, e.g. '["k","move",10,20]'
    Decode { message: String },
    /// Replay a JSON-lines overlay script against the stub engine
    Replay {
        #[arg(long)]
        script: PathBuf,
        /// Scene folder (defaults to the configured scene)
        #[arg(long)]
        scene: Option<PathBuf>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    if cli.verbose {
        scene_player::init_logging();
    }
    let config = cli
        .config
        .map(AppConfig::load_from_file)
        .unwrap_or_else(AppConfig::load);

    match cli.command {
        Commands::Decode { message } => run_decode(&message),
        Commands::Replay {
            script,
            scene,
            output,
        } => run_replay(config, script, scene, output),
    }
}

fn run_decode(message: &str) -> Result<ExitCode> {
    let args: Vec<Atom> = serde_json::from_str(message).context("parsing message")?;
    match protocol::decode(&args) {
        Some(decoded) => {
            println!("{}", serde_json::to_string_pretty(&decoded)?);
            Ok(ExitCode::from(0))
        }
        None => {
            eprintln!("message dropped: not a valid overlay command");
            Ok(ExitCode::from(2))
        }
    }
}

/// One script line: either a bare message or one routed to a topic.
#[derive(Deserialize)]
#[serde(untagged)]
enum ScriptLine {
    Routed { topic: String, args: Vec<Atom> },
    Bare(Vec<Atom>),
}

struct HeadlessSurface;

impl RenderSurface for HeadlessSurface {
    fn add_overlay(&self, key: &str, overlay: &Overlay) {
        log::debug!("[scene_cli] add {} ({:?})", key, overlay.kind());
    }

    fn dimensions(&self) -> (f32, f32) {
        (1280.0, 720.0)
    }
}

struct ReportingHost;

impl HostControl for ReportingHost {
    fn finish(&self) {
        eprintln!("host finished");
    }
}

fn run_replay(
    config: AppConfig,
    script: PathBuf,
    scene: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let contents =
        fs::read_to_string(&script).with_context(|| format!("reading {}", script.display()))?;
    let image_topic = config.topics.image.clone();
    let scene = config.scene(scene.as_deref());

    let engine = Arc::new(StubEngine::new());
    let binder = Arc::new(StubBinder::new(Arc::clone(&engine)));
    let feed = Arc::new(LogFeed::new(config.log_history));
    let connection = RemoteConnection::new(ConnectionParts {
        config,
        scene,
        binder: binder.clone(),
        host: Arc::new(ReportingHost),
        surface: Arc::new(HeadlessSurface),
        log_sink: feed.clone(),
    });
    binder.attach(&connection);

    connection.connect().context("binding to stub engine")?;
    binder.deliver_connected();
    if !connection.is_connected() {
        bail!("stub engine did not finish connecting");
    }

    let mut delivered = 0;
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed: ScriptLine = serde_json::from_str(line)
            .with_context(|| format!("{}:{}", script.display(), index + 1))?;
        let (topic, args) = match parsed {
            ScriptLine::Routed { topic, args } => (topic, args),
            ScriptLine::Bare(args) => (image_topic.clone(), args),
        };
        delivered += engine.deliver(&topic, &args);
    }

    let overlays = connection
        .registry()
        .snapshot()
        .into_iter()
        .map(|(key, overlay)| OverlayEntry { key, overlay })
        .collect();
    connection.teardown();

    let report = ReplayReport {
        scene: connection.scene().name(),
        base_image: connection.scene().image_path(),
        delivered,
        overlays,
        log: feed.lines(),
    };
    let json = serde_json::to_string_pretty(&report)?;
    if let Some(path) = output {
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    } else {
        println!("{json}");
    }

    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct OverlayEntry {
    key: String,
    #[serde(flatten)]
    overlay: Overlay,
}

#[derive(Serialize)]
struct ReplayReport {
    scene: String,
    base_image: PathBuf,
    delivered: usize,
    overlays: Vec<OverlayEntry>,
    log: Vec<String>,
}
