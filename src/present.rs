//! Result presentation and export actions.

use crate::error::{EditError, Result};
use crate::image::{EditedImage, UploadedImage};
use crate::session::{EditSession, RequestStatus};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Notice shown when no share capability is available.
pub const SHARE_UNSUPPORTED_MESSAGE: &str = "Sharing is not supported in this environment.";

/// Exit status a share program uses when the user backs out.
const SHARE_CANCELLED_EXIT_CODE: i32 = 130;

/// Suffixes tried before a download gives up on finding a free name.
const MAX_DOWNLOAD_ATTEMPTS: u32 = 1000;

/// What the result area shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View<'a> {
    /// Placeholder: nothing generated yet.
    Empty,
    /// A request is in progress.
    Loading,
    /// The last request failed.
    Error {
        /// Message for the user.
        message: &'a str,
    },
    /// Original and edited images side by side.
    Comparison {
        /// The selected source image.
        original: &'a UploadedImage,
        /// The model's result.
        edited: &'a EditedImage,
    },
}

/// Derives the view from the session.
pub fn render(session: &EditSession) -> View<'_> {
    match (session.status(), session.image()) {
        (RequestStatus::Loading, _) => View::Loading,
        (RequestStatus::Error(message), _) => View::Error { message },
        (RequestStatus::Success(edited), Some(original)) => View::Comparison { original, edited },
        (RequestStatus::Success(_), None) | (RequestStatus::Idle, _) => View::Empty,
    }
}

impl std::fmt::Display for View<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Your generated image will appear here"),
            Self::Loading => write!(f, "Generating..."),
            Self::Error { message } => write!(f, "An Error Occurred\n{message}"),
            Self::Comparison { original, edited } => {
                writeln!(
                    f,
                    "Original: {} ({}, {} bytes)",
                    original.name().unwrap_or("uploaded image"),
                    original.media_type(),
                    original.size()
                )?;
                write!(
                    f,
                    "Edited:   {} bytes ({})",
                    edited.size(),
                    edited.media_type()
                )
            }
        }
    }
}

/// File name for an exported result: `edited-image-<timestamp>.<ext>`.
pub fn export_file_name(image: &EditedImage, timestamp_ms: u128) -> String {
    format!("edited-image-{timestamp_ms}.{}", image.extension())
}

fn now_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default()
}

/// Saves the result into `dir` and returns the written path.
///
/// Existing files are never overwritten: when the name is taken, a `-1`,
/// `-2`, ... suffix is tried before the extension.
pub fn download(image: &EditedImage, dir: impl AsRef<Path>) -> Result<PathBuf> {
    download_at(image, dir.as_ref(), now_ms())
}

fn download_at(image: &EditedImage, dir: &Path, timestamp_ms: u128) -> Result<PathBuf> {
    for attempt in 0..MAX_DOWNLOAD_ATTEMPTS {
        let name = match attempt {
            0 => export_file_name(image, timestamp_ms),
            n => format!("edited-image-{timestamp_ms}-{n}.{}", image.extension()),
        };
        let path = dir.join(name);
        match image.save(&path) {
            Ok(()) => {
                tracing::info!(path = %path.display(), size = image.size(), "edited image downloaded");
                return Ok(path);
            }
            Err(EditError::Io(e)) if e.kind() == io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "export name taken");
            }
            Err(e) => return Err(e),
        }
    }
    Err(EditError::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free export name in {}", dir.display()),
    )))
}

/// A result packaged for sharing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareFile {
    /// Suggested file name.
    pub name: String,
    /// Media type of the data.
    pub media_type: String,
    /// Image bytes.
    pub data: Vec<u8>,
}

impl ShareFile {
    /// Packages `image` under the export file name.
    pub fn from_image(image: &EditedImage) -> Self {
        Self {
            name: export_file_name(image, now_ms()),
            media_type: image.media_type().to_string(),
            data: image.data().to_vec(),
        }
    }
}

/// Why a share target did not share.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShareError {
    /// The user backed out.
    #[error("share cancelled")]
    Cancelled,
    /// No share capability on this host.
    #[error("{}", SHARE_UNSUPPORTED_MESSAGE)]
    Unsupported,
    /// Sharing failed.
    #[error("sharing failed: {0}")]
    Failed(String),
}

/// A host share capability.
pub trait ShareTarget {
    /// Hands `file` to the host.
    fn share(&self, file: &ShareFile) -> std::result::Result<(), ShareError>;
}

/// Result of the share action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    /// The file was handed over.
    Shared,
    /// The user cancelled; nothing to report.
    Cancelled,
    /// No share capability; report [`SHARE_UNSUPPORTED_MESSAGE`].
    Unsupported,
    /// Sharing failed with the given message.
    Failed(String),
}

impl ShareOutcome {
    /// Notice to show the user, if any.
    pub fn notice(&self) -> Option<String> {
        match self {
            Self::Shared | Self::Cancelled => None,
            Self::Unsupported => Some(SHARE_UNSUPPORTED_MESSAGE.to_string()),
            Self::Failed(message) => Some(format!("Sharing failed: {message}")),
        }
    }
}

/// Shares the result through `target`, if the host has one.
pub fn share(image: &EditedImage, target: Option<&dyn ShareTarget>) -> ShareOutcome {
    let Some(target) = target else {
        return ShareOutcome::Unsupported;
    };

    let file = ShareFile::from_image(image);
    match target.share(&file) {
        Ok(()) => {
            tracing::info!(name = %file.name, "edited image shared");
            ShareOutcome::Shared
        }
        Err(ShareError::Cancelled) => {
            tracing::debug!("share cancelled by user");
            ShareOutcome::Cancelled
        }
        Err(ShareError::Unsupported) => ShareOutcome::Unsupported,
        Err(ShareError::Failed(message)) => {
            tracing::warn!(error = %message, "share failed");
            ShareOutcome::Failed(message)
        }
    }
}

/// Shares by running a program with the exported file's path as last argument.
///
/// The command line is split on whitespace. The file is written to `dir`
/// (the system temp dir by default) and left there for the program to read.
#[derive(Debug, Clone)]
pub struct CommandShare {
    program: String,
    args: Vec<String>,
    dir: PathBuf,
}

impl CommandShare {
    /// Parses a command line such as `xdg-open` or `wl-copy --type image/png`.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
            dir: std::env::temp_dir(),
        })
    }

    /// Writes shared files into `dir` instead of the temp dir.
    pub fn with_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = dir.into();
        self
    }
}

impl ShareTarget for CommandShare {
    fn share(&self, file: &ShareFile) -> std::result::Result<(), ShareError> {
        let path = self.dir.join(&file.name);
        std::fs::write(&path, &file.data).map_err(|e| ShareError::Failed(e.to_string()))?;

        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(&path)
            .status()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ShareError::Unsupported,
                _ => ShareError::Failed(e.to_string()),
            })?;

        match status.code() {
            Some(0) => Ok(()),
            Some(SHARE_CANCELLED_EXIT_CODE) => Err(ShareError::Cancelled),
            Some(code) => Err(ShareError::Failed(format!(
                "{} exited with status {code}",
                self.program
            ))),
            // Killed by a signal, e.g. the user interrupting the share sheet.
            None => Err(ShareError::Cancelled),
        }
    }
}
