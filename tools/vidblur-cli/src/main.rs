//! vidblur CLI: command-line interface for the blur-mask pipeline.
//!
//! Usage:
//!   vidblur init                       Create the library and config file
//!   vidblur import <FILE>              Add a source video to the library
//!   vidblur list                       List library videos
//!   vidblur info <ID>                  Show a video record
//!   vidblur map <MASKS> --container WxH --video WxH
//!                                      Map display-space masks to video space
//!   vidblur graph <MASKS>              Print the ffmpeg filter graph for masks
//!   vidblur process <ID> [--masks F]   Blur a video and store the output
//!   vidblur status <ID>                Show processing status
//!   vidblur check                      Check ffmpeg/ffprobe availability

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vidblur_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "vidblur",
    about = "Time-boxed blur masks for video privacy",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Library directory (overrides the config file)
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the library directories and write the config file
    Init,

    /// Import a source video into the library
    Import {
        /// Path to the video file
        file: PathBuf,
    },

    /// List videos in the library
    List,

    /// Show a video record
    Info {
        /// Video id
        id: String,
    },

    /// Map display-space masks (JSON array) into video pixel space
    Map {
        /// JSON file of display-space masks
        masks: PathBuf,

        /// Display container size, e.g. 800x450
        #[arg(long, value_parser = commands::map::parse_container)]
        container: (f64, f64),

        /// Native video size, e.g. 1920x1080
        #[arg(long, value_parser = commands::map::parse_frame)]
        video: (u32, u32),

        /// Video duration used to cap mask windows (seconds)
        #[arg(long, default_value = "0")]
        duration: f64,

        /// Write mapped masks here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the ffmpeg filter graph for video-space masks (JSON array)
    Graph {
        /// JSON file of video-space masks
        masks: PathBuf,
    },

    /// Blur a library video and store the edited output
    Process {
        /// Video id
        id: String,

        /// JSON file of video-space masks (omit for a stream copy)
        #[arg(short, long)]
        masks: Option<PathBuf>,
    },

    /// Show processing status of a video
    Status {
        /// Video id
        id: String,
    },

    /// Check transcoder availability and configuration
    Check,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    vidblur_common::logging::init_logging(&vidblur_common::logging::verbose_config(cli.verbose));

    let mut config = AppConfig::load();
    if let Some(library) = cli.library {
        config.library_dir = library;
    }

    match cli.command {
        Commands::Init => commands::init::run(&config),
        Commands::Import { file } => commands::import::run(&config, file),
        Commands::List => commands::list::run(&config),
        Commands::Info { id } => commands::info::run(&config, &id),
        Commands::Map {
            masks,
            container,
            video,
            duration,
            output,
        } => commands::map::run(&config, masks, container, video, duration, output),
        Commands::Graph { masks } => commands::graph::run(&config, masks),
        Commands::Process { id, masks } => commands::process::run(&config, &id, masks),
        Commands::Status { id } => commands::status::run(&config, &id),
        Commands::Check => commands::check::run(&config),
    }
}
