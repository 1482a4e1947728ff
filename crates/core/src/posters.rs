//! Poster frame extraction for video previews.
//!
//! Extraction is an external collaborator: the builder only needs "turn this video into a
//! still at that path". The default implementation shells out to `ffmpeg`; tests substitute
//! their own extractor.

use crate::constants::{DEFAULT_FFMPEG_BINARY, POSTER_SEEK_SECONDS};
use crate::{FolioError, FolioResult};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Produces a still image from a video file.
pub trait PosterExtractor: Send + Sync {
    /// Writes a JPEG frame of `video` to `output`.
    ///
    /// # Errors
    ///
    /// Returns `FolioError::PosterExtraction` when no frame could be produced. Implementations
    /// must not leave a partial file at `output` on failure.
    fn extract(&self, video: &Path, output: &Path) -> FolioResult<()>;
}

/// Extracts posters with an `ffmpeg` binary.
#[derive(Debug, Clone)]
pub struct FfmpegPosterExtractor {
    binary: PathBuf,
    seek_seconds: f32,
}

impl Default for FfmpegPosterExtractor {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_FFMPEG_BINARY),
            seek_seconds: POSTER_SEEK_SECONDS,
        }
    }
}

impl FfmpegPosterExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a specific `ffmpeg` binary instead of the one on `PATH`.
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_seek_seconds(mut self, seconds: f32) -> Self {
        self.seek_seconds = seconds.max(0.0);
        self
    }
}

impl PosterExtractor for FfmpegPosterExtractor {
    fn extract(&self, video: &Path, output: &Path) -> FolioResult<()> {
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent).map_err(FolioError::DirCreation)?;
        }

        let status = Command::new(&self.binary)
            .arg("-hide_banner")
            .arg("-loglevel")
            .arg("error")
            .arg("-y")
            .arg("-ss")
            .arg(format!("{}", self.seek_seconds))
            .arg("-i")
            .arg(video)
            .arg("-frames:v")
            .arg("1")
            .arg("-q:v")
            .arg("3")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| FolioError::PosterExtraction {
                path: video.to_path_buf(),
                reason: format!("failed to run {}: {e}", self.binary.display()),
            })?;

        let produced = output.metadata().map(|m| m.len() > 0).unwrap_or(false);
        if status.success() && produced {
            return Ok(());
        }

        // Best effort; the original error is what matters to the caller.
        let _ = std::fs::remove_file(output);
        Err(FolioError::PosterExtraction {
            path: video.to_path_buf(),
            reason: match status.code() {
                Some(code) if !status.success() => format!("ffmpeg exited with status {code}"),
                None => "ffmpeg terminated by signal".into(),
                Some(_) => "ffmpeg produced no output".into(),
            },
        })
    }
}
