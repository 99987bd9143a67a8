// Folder watcher: one pass over a drop folder.
// Videos are uploaded (named after the file stem), a same-stem JPEG becomes
// the thumbnail, and both files are moved out of the way. The caller decides
// how often to run a pass; nothing is remembered between passes.

use crate::api::ApiClient;
use crate::error::{Error, Result};
use crate::models::VideoId;
use crate::picture::PictureSource;
use crate::progress::ProgressObserver;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

const VIDEO_EXTENSIONS: &[&str] = &["avi", "wmv", "mov", "mp4"];
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg"];

/// A video found in the folder and its optional thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingUpload {
    pub video: PathBuf,
    pub picture: Option<PathBuf>,
}

/// Outcome of one pass.
#[derive(Debug, Default)]
pub struct WatchReport {
    pub uploaded: Vec<(PathBuf, VideoId)>,
    pub failed: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone)]
pub struct FolderWatcher {
    source: PathBuf,
    destination: PathBuf,
    picture_delay: Duration,
}

impl FolderWatcher {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        FolderWatcher {
            source: source.into(),
            destination: destination.into(),
            picture_delay: Duration::from_secs(1),
        }
    }

    /// Pause between finishing an upload and attaching its picture.
    pub fn with_picture_delay(mut self, delay: Duration) -> Self {
        self.picture_delay = delay;
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Upload everything currently in the source folder. A file that fails
    /// stays where it is and does not stop the pass.
    pub fn scan_once(
        &self,
        client: &ApiClient,
        make_observer: impl Fn(&Path, u64) -> Arc<dyn ProgressObserver>,
    ) -> Result<WatchReport> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.source).map_err(|e| Error::io(&self.source, e))? {
            let path = entry.map_err(|e| Error::io(&self.source, e))?.path();
            if path.is_file() {
                files.push(path);
            }
        }

        let mut report = WatchReport::default();
        for pending in pair_files(&files) {
            match self.process(client, &pending, &make_observer) {
                Ok(id) => report.uploaded.push((pending.video, id)),
                Err(err) => {
                    error!(file = %pending.video.display(), error = %err, "upload from watch folder failed");
                    report.failed.push((pending.video, err.to_string()));
                }
            }
        }
        Ok(report)
    }

    fn process(
        &self,
        client: &ApiClient,
        pending: &PendingUpload,
        make_observer: &impl Fn(&Path, u64) -> Arc<dyn ProgressObserver>,
    ) -> Result<VideoId> {
        let video = &pending.video;
        let name = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let size = fs::metadata(video).map_err(|e| Error::io(video, e))?.len();
        info!(file = %video.display(), bytes = size, "uploading from watch folder");

        let observer = make_observer(video, size);
        let uploaded = client.upload_video(video, &name, "", Arc::clone(&observer));
        observer.finished();
        let id = uploaded?;

        if let Some(picture) = &pending.picture {
            thread::sleep(self.picture_delay);
            // Picture failures leave the upload in place.
            if let Err(err) = client.attach_picture(&id, PictureSource::File(picture)) {
                warn!(video = %id, picture = %picture.display(), error = %err, "could not set picture");
            }
        }

        self.move_to_destination(video)?;
        if let Some(picture) = &pending.picture {
            self.move_to_destination(picture)?;
        }
        Ok(id)
    }

    fn move_to_destination(&self, path: &Path) -> Result<()> {
        let file_name = path
            .file_name()
            .ok_or_else(|| Error::io(path, std::io::ErrorKind::InvalidInput.into()))?;
        let target = self.destination.join(file_name);
        fs::rename(path, &target).map_err(|e| Error::io(&target, e))?;
        info!(from = %path.display(), to = %target.display(), "moved");
        Ok(())
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Videos among `files`, each with the image sharing its stem, if any.
/// Output is sorted by video path.
pub fn pair_files(files: &[PathBuf]) -> Vec<PendingUpload> {
    let mut pending: Vec<PendingUpload> = files
        .iter()
        .filter(|f| has_extension(f, VIDEO_EXTENSIONS))
        .map(|video| {
            let picture = files
                .iter()
                .find(|f| {
                    *f != video
                        && f.file_stem() == video.file_stem()
                        && has_extension(f, IMAGE_EXTENSIONS)
                })
                .cloned();
            PendingUpload {
                video: video.clone(),
                picture,
            }
        })
        .collect();
    pending.sort_by(|a, b| a.video.cmp(&b.video));
    pending
}
