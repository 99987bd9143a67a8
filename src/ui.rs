// UI layer: command-line commands and what they print.
// Each command is a small function taking the `ApiClient`; the library does
// the work and this module formats the results for the terminal.

use crate::api::ApiClient;
use crate::config::{Config, DEFAULT_API_URL};
use crate::credentials::TokenStore;
use crate::models::{Connection, UserInfo, Video, VideoId, VideoList};
use crate::picture::PictureSource;
use crate::progress::{ConsoleProgress, ProgressObserver};
use crate::watch::FolderWatcher;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Parser, Debug)]
#[command(name = "vimeo-uploader", version, about = "Upload and manage videos on Vimeo")]
pub struct Cli {
    /// Bearer token; falls back to the token saved with `save-token`
    #[arg(long, short = 't', env = "VIMEO_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Base URL of the API
    #[arg(long, env = "VIMEO_API_URL", default_value = DEFAULT_API_URL, global = true)]
    pub api_url: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List uploaded videos
    List,
    /// Show the upload quota
    Quota,
    /// Show account information
    UserInfo,
    /// Show details of a video
    VideoInfo {
        #[arg(long)]
        video: String,
    },
    /// Show the processing status of a video
    Status {
        #[arg(long)]
        video: String,
    },
    /// Upload a video file
    Upload {
        #[arg(long, short = 'f')]
        file: PathBuf,
        #[arg(long, short = 'n', default_value = "")]
        name: String,
        #[arg(long, short = 'd', default_value = "")]
        description: String,
    },
    /// Delete a video
    Delete {
        #[arg(long)]
        video: String,
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Set name and description of a video
    Edit {
        #[arg(long)]
        video: String,
        #[arg(long, short = 'n', default_value = "")]
        name: String,
        #[arg(long, short = 'd', default_value = "")]
        description: String,
    },
    /// Set the thumbnail from an image file or a time offset in seconds
    SetPicture {
        #[arg(long)]
        video: String,
        #[arg(long, conflicts_with = "time", required_unless_present = "time")]
        file: Option<PathBuf>,
        #[arg(long)]
        time: Option<u32>,
    },
    /// Save the given token for later runs
    SaveToken,
    /// Upload every video dropped into a folder, then move it away
    Watch {
        #[arg(long)]
        source: PathBuf,
        #[arg(long)]
        dest: PathBuf,
        /// Pause between two scans
        #[arg(long, default_value_t = 5000)]
        interval_ms: u64,
    },
}

/// Resolve configuration and run one command.
pub fn run(cli: Cli) -> Result<()> {
    let store = TokenStore::in_home();
    let config = Config::resolve(&cli.api_url, cli.token.as_deref(), &store)
        .context("Failed to resolve credentials")?;

    if let Command::SaveToken = cli.command {
        store
            .save(&config.credential)
            .context("Failed to save token")?;
        println!("Token saved to {}", store.path().display());
        return Ok(());
    }

    let api = ApiClient::from_config(&config).context("Failed to build HTTP client")?;

    match cli.command {
        Command::List => {
            println!("Getting list of uploaded videos");
            display_videos(&api.list_videos()?);
        }
        Command::Quota => {
            println!("Getting quota information");
            display_user_info(&api.quota()?, true);
        }
        Command::UserInfo => {
            println!("Getting user information");
            display_user_info(&api.user_info()?, false);
        }
        Command::VideoInfo { video } => {
            println!("Getting information of video {}", video);
            display_video(&api.video_details(&VideoId::new(video))?);
        }
        Command::Status { video } => {
            println!("Getting status of video {}", video);
            let status = api.video_status(&VideoId::new(video))?;
            println!("{}", status.as_deref().unwrap_or("unknown"));
        }
        Command::Upload {
            file,
            name,
            description,
        } => {
            upload_with_progress(&api, &file, &name, &description)?;
            println!("Done");
        }
        Command::Delete { video, yes } => handle_delete(&api, &VideoId::new(video), yes)?,
        Command::Edit {
            video,
            name,
            description,
        } => {
            println!("Setting information for video {}", video);
            api.set_video_metadata(&VideoId::new(video), &name, &description)?;
            println!("Done");
        }
        Command::SetPicture { video, file, time } => {
            println!("Setting picture for video {}", video);
            let id = VideoId::new(video);
            let source = match (&file, time) {
                (Some(path), _) => PictureSource::File(path),
                (None, Some(seconds)) => PictureSource::Time(seconds),
                (None, None) => anyhow::bail!("either --file or --time is required"),
            };
            api.attach_picture(&id, source)?;
            println!("Done");
        }
        Command::Watch {
            source,
            dest,
            interval_ms,
        } => watch_folder(&api, FolderWatcher::new(source, dest), Duration::from_millis(interval_ms)),
        Command::SaveToken => {}
    }
    Ok(())
}

/// Upload one file with a console progress bar and print a summary.
fn upload_with_progress(api: &ApiClient, file: &Path, name: &str, description: &str) -> Result<VideoId> {
    println!("Uploading {}", file.display());
    let size = std::fs::metadata(file)
        .with_context(|| format!("Failed to read {}", file.display()))?
        .len();
    let started = Instant::now();
    let progress = Arc::new(ConsoleProgress::new(size));
    let observer: Arc<dyn ProgressObserver> = progress.clone();

    let result = api.upload_video(file, name, description, observer);
    progress.finished();
    let id = result.with_context(|| format!("Upload of {} failed", file.display()))?;

    let secs = started.elapsed().as_secs_f64();
    println!(
        "Upload of {:.1}MB completed in {:.0}s ({:.2}MB/s)",
        size as f64 / MIB,
        secs,
        size as f64 / MIB / secs.max(0.001)
    );
    println!("Video uploaded: {}", id);
    Ok(id)
}

/// Ask for confirmation, then delete.
fn handle_delete(api: &ApiClient, id: &VideoId, yes: bool) -> Result<()> {
    let confirmed = yes
        || Confirm::new()
            .with_prompt(format!("Are you sure to delete video {}?", id))
            .default(false)
            .interact()?;
    if confirmed {
        println!("Deleting video {}", id);
        api.delete_video(id)?;
        println!("Done");
    }
    Ok(())
}

/// Scan the folder forever, sleeping `interval` between passes.
fn watch_folder(api: &ApiClient, watcher: FolderWatcher, interval: Duration) -> ! {
    println!(
        "Monitor folder: {} - Destination folder: {}",
        watcher.source().display(),
        watcher.destination().display()
    );
    loop {
        match watcher.scan_once(api, |_, size| {
            Arc::new(ConsoleProgress::new(size)) as Arc<dyn ProgressObserver>
        }) {
            Ok(report) => {
                for (file, id) in &report.uploaded {
                    println!("Uploaded {} as video {}", file.display(), id);
                }
                for (file, reason) in &report.failed {
                    println!("Failed {}: {}", file.display(), reason);
                }
            }
            Err(err) => warn!(error = %err, "could not scan watch folder"),
        }
        thread::sleep(interval);
    }
}

fn show<T: Display>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(|v| v.to_string())
        .unwrap_or_default()
}

fn display_videos(videos: &VideoList) {
    println!("uri\tname\tcreated_time");
    for v in &videos.data {
        println!("{}\t{}\t{}", show(&v.uri), show(&v.name), show(&v.created_time));
    }
    println!("\n\t {} videos", show(&videos.total));
}

fn display_video(video: &Video) {
    println!("Uri: {}", show(&video.uri));
    println!("Name: {}", show(&video.name));
    println!("Description: {}", show(&video.description));
    println!("Link: {}", show(&video.link));
    println!("Duration: {}", show(&video.duration));
    println!("Width: {}", show(&video.width));
    println!("Height: {}", show(&video.height));
    println!("Language: {}", show(&video.language));
    println!("Created time: {}", show(&video.created_time));
    println!("Modified time: {}", show(&video.modified_time));
    println!("Status: {}", show(&video.status));
    println!("License: {}", show(&video.license));
    if let Some(privacy) = &video.privacy {
        println!("Privacy");
        println!("\tView: {}", show(&privacy.view));
        println!("\tEmbed: {}", show(&privacy.embed));
        println!("\tDownload: {}", show(&privacy.download));
        println!("\tAdd: {}", show(&privacy.add));
        println!("\tComments: {}", show(&privacy.comments));
    }
    if let Some(stats) = &video.stats {
        println!("Stats");
        println!("\tPlays: {}", show(&stats.plays));
    }
}

fn display_connection(name: &str, connection: &Connection) {
    println!("{}\tTotal: {}", name, show(&connection.total));
}

fn display_user_info(user: &UserInfo, just_quota: bool) {
    println!("User: {}", show(&user.name));
    if !just_quota {
        println!("Uri: {}", show(&user.uri));
        println!("Link: {}", show(&user.link));
        println!("Created time: {}", show(&user.created_time));
        println!("Account: {}", show(&user.account));
        if let Some(metadata) = &user.metadata {
            for (name, connection) in &metadata.connections {
                if let Some(connection) = connection {
                    display_connection(name, connection);
                }
            }
        }
    }
    if let Some(quota) = &user.upload_quota {
        println!("Upload quota");
        if let Some(space) = &quota.space {
            println!("\tSpace");
            println!("\t\tFree: {}", show(&space.free));
            println!("\t\tMax: {}", show(&space.max));
            println!("\t\tUsed: {}", show(&space.used));
        }
        if let Some(kinds) = &quota.quota {
            println!("\tQuota");
            println!("\t\tHd: {}", show(&kinds.hd));
            println!("\t\tSd: {}", show(&kinds.sd));
        }
    }
}
