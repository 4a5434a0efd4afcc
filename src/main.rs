use anyhow::Result;
use clap::Parser;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use videowall::{
    command::{self, Command},
    config::Config,
    wall::VideoWall,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the URL configuration file
    #[arg(short, long, default_value = "videowall.conf")]
    config: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Output canvas width in pixels (must be even)
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Output canvas height in pixels (must be even)
    #[arg(long, default_value_t = 720)]
    height: u32,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting videowall v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {:?}", args.config);

    let config = Config::with_canvas(args.width, args.height)?;
    let wall = start_wall(config)?;

    // Apply the config file once at startup, if present.
    if args.config.exists() {
        match command::read_config(&args.config) {
            Ok(commands) => wall.apply_url_commands(commands),
            Err(e) => warn!("Failed to read {:?}: {}", args.config, e),
        }
    } else {
        info!("{:?} not found, all slots start idle", args.config);
    }

    println!("{}", command::HELP_TEXT);

    // Interactive command loop. Bad input is reported and changes nothing;
    // quit (or EOF, or a fatal compositor error) ends the loop.
    let stdin = std::io::stdin();
    let mut line = String::new();
    loop {
        if wall.is_done() {
            error!("Compositor stopped, exiting");
            break;
        }

        print!("> ");
        std::io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            info!("End of input, exiting");
            break;
        }

        match command::parse_line(&line) {
            Ok(None) => {}
            Ok(Some(Command::SetUrl { slot, url })) => wall.set_url(slot, &url),
            Ok(Some(Command::Reload)) => match command::read_config(&args.config) {
                Ok(commands) => wall.apply_url_commands(commands),
                Err(e) => warn!("Failed to read {:?}: {}", args.config, e),
            },
            Ok(Some(Command::Help)) => println!("{}", command::HELP_TEXT),
            Ok(Some(Command::Quit)) => break,
            Err(e) => {
                warn!("{}", e);
                println!("{}", command::HELP_TEXT);
            }
        }
    }

    wall.shutdown();
    Ok(())
}

#[cfg(feature = "gstreamer")]
fn start_wall(config: Config) -> Result<VideoWall> {
    use std::sync::Arc;

    videowall::gst_backend::initialize()?;
    let source_factory = Arc::new(videowall::gst_backend::GstSourceFactory::new(&config));
    let display_factory = Box::new(videowall::gst_backend::GstDisplayFactory::new(&config));
    Ok(VideoWall::start(config, source_factory, display_factory)?)
}

#[cfg(not(feature = "gstreamer"))]
fn start_wall(_config: Config) -> Result<VideoWall> {
    anyhow::bail!(
        "videowall was built without the `gstreamer` feature; \
         rebuild with `--features gstreamer` to decode and display video"
    )
}
