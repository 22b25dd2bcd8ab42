//! looptrack - load and loop one background track three different ways

use clap::Parser;
use looptrack_core::{AudioError, DemoConfig, Result};
use looptrack_demo::command::{parse_script, HELP};
use looptrack_demo::{Command, Demo, Pressed};
use looptrack_graph::AudioSpec;
use looptrack_session::{DevicePlatform, OfflinePlatform, Platform};
use looptrack_transport_http::AssetFetcher;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const LOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(version, about = "Compare three ways to load and loop a background track")]
struct Args {
    /// JSON config file
    #[arg(long, env = "LOOPTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Asset to load; overrides the config file and LOOPTRACK_ASSET
    #[arg(long)]
    asset: Option<String>,

    /// Base URL or directory the asset is resolved against
    #[arg(long)]
    origin: Option<String>,

    /// Render without an audio device
    #[arg(long)]
    offline: bool,

    /// Run `;`-separated commands, then exit
    #[arg(long)]
    script: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = load_config(&args)?;
    log::info!("looptrack starting");
    log::info!("  asset: {}", config.resolve_asset());
    log::info!(
        "  output: {} Hz, {} ch{}",
        config.sample_rate,
        config.channels,
        if args.offline { " (offline)" } else { "" }
    );

    let fetcher = Arc::new(AssetFetcher::new(config.http_retries));
    let spec = AudioSpec::new(config.sample_rate, config.channels);
    let platform: Arc<dyn Platform> = if args.offline {
        let platform = Arc::new(OfflinePlatform::new(spec, fetcher));
        start_offline_clock(platform.clone(), spec)?;
        platform
    } else {
        Arc::new(DevicePlatform::new(spec, fetcher))
    };

    let mut demo = Demo::new(platform, &config);
    match &args.script {
        Some(script) => {
            let commands =
                parse_script(script).map_err(|e| AudioError::ConfigError(e.to_string()))?;
            for command in commands {
                if !execute(&mut demo, command) {
                    break;
                }
            }
        }
        None => run_prompt(&mut demo)?,
    }

    log::info!("looptrack exiting");
    Ok(())
}

fn load_config(args: &Args) -> Result<DemoConfig> {
    let config = match &args.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };
    let mut config = config.with_env_overrides();
    if let Some(asset) = &args.asset {
        config.asset = asset.clone();
    }
    if let Some(origin) = &args.origin {
        config.origin = Some(origin.clone());
    }
    config.validated()
}

/// Drive offline contexts in real time so positions advance
fn start_offline_clock(platform: Arc<OfflinePlatform>, spec: AudioSpec) -> Result<()> {
    let frames = spec.buffer_size;
    let period = Duration::from_secs_f64(frames as f64 / spec.sample_rate as f64);
    thread::Builder::new()
        .name("looptrack-offline-clock".to_string())
        .spawn(move || loop {
            platform.pump(frames);
            thread::sleep(period);
        })
        .map_err(|e| AudioError::InitializationError(format!("offline clock: {}", e)))?;
    Ok(())
}

fn run_prompt(demo: &mut Demo) -> Result<()> {
    println!("{}", demo.render());
    println!("{}", HELP);

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                if !execute(demo, command) {
                    break;
                }
            }
            Err(e) => println!("{} (try `help`)", e),
        }
    }
    Ok(())
}

/// Run one command; false means quit
fn execute(demo: &mut Demo, command: Command) -> bool {
    match command {
        Command::Press { panel, control } => {
            match demo.press(panel, control) {
                Ok(Pressed::Applied) => {}
                Ok(Pressed::Disabled) => {
                    println!("{} is disabled on panel {}", control, panel + 1)
                }
                Err(e) => println!("panel {}: {}", panel + 1, e),
            }
            report_loads(demo.poll_loads());
            println!("{}", demo.render());
        }
        Command::Status => {
            report_loads(demo.poll_loads());
            println!("{}", demo.render());
        }
        Command::Wait => {
            report_loads(demo.wait_loads(LOAD_TIMEOUT));
            println!("{}", demo.render());
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => return false,
    }
    true
}

fn report_loads(finished: Vec<(String, Result<()>)>) {
    for (title, result) in finished {
        match result {
            Ok(()) => println!("{}: loaded", title),
            Err(e) => println!("{}: load failed: {}", title, e),
        }
    }
}
