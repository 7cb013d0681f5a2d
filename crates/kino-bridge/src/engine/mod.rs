//! Native engine seam
//!
//! The bridge never decodes anything itself. A [`MediaEngine`] hands out
//! [`NativePlayer`]s, and each native player reports back through an
//! [`EngineListener`] from whatever threads the engine runs on.

pub mod simulated;

use crate::{surface::Surface, types::MediaInfo, Error, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use url::Url;

pub use simulated::{SimulatedConfig, SimulatedEngine};

/// Engine error: unspecified failure
pub const MEDIA_ERROR_UNKNOWN: i32 = 1;
/// Engine error detail: file or network I/O failure
pub const MEDIA_ERROR_IO: i32 = -1004;
/// Engine error detail: bitstream does not conform to its format
pub const MEDIA_ERROR_MALFORMED: i32 = -1007;
/// Engine error detail: format or scheme not supported
pub const MEDIA_ERROR_UNSUPPORTED: i32 = -1010;

/// Callbacks from a native player. May be invoked from engine threads.
pub trait EngineListener: Send + Sync {
    fn on_prepared(&self, info: MediaInfo);
    fn on_completion(&self);
    fn on_error(&self, what: i32, extra: i32);
    fn on_buffering_update(&self, percent: i32);
}

/// One native player object.
///
/// Commands must not block on asynchronous engine work; outcomes are reported
/// through the listener.
#[cfg_attr(test, mockall::automock)]
pub trait NativePlayer: Send + Sync {
    fn set_listener(&self, listener: Arc<dyn EngineListener>);
    fn set_surface(&self, surface: Surface);
    fn set_data_source(&self, source: DataSource) -> Result<()>;
    fn prepare_async(&self) -> Result<()>;
    fn start(&self);
    fn pause(&self);
    fn stop(&self);
    /// Return to the idle state, dropping the current source
    fn reset(&self);
    fn is_playing(&self) -> bool;
    fn set_looping(&self, looping: bool);
    fn set_volume(&self, left: f32, right: f32);
    fn seek_to(&self, position_ms: i64);
    /// Last known playback position in milliseconds
    fn current_position(&self) -> i64;
    fn release(&self);
}

/// Factory for native players
pub trait MediaEngine: Send + Sync {
    fn name(&self) -> &str;
    fn create_player(&self) -> Result<Box<dyn NativePlayer>>;
}

/// Where a player reads its media from
#[derive(Debug)]
pub enum DataSource {
    /// Local file, read through a seekable data source
    File(FileDataSource),
    /// Anything else, resolved by the engine
    Uri(Url),
}

impl DataSource {
    /// Interpret a host-supplied URI. Strings without a scheme and `file:`
    /// URLs open a local file; every other scheme is left to the engine.
    /// Plain paths are opened exactly as given, surrounding whitespace included.
    pub fn parse(uri: &str) -> Result<Self> {
        if uri.trim().is_empty() {
            return Err(Error::InvalidDataSource("empty uri".to_string()));
        }

        match Url::parse(uri) {
            Ok(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| Error::InvalidDataSource(format!("not a local path: {uri}")))?;
                Ok(DataSource::File(FileDataSource::open(path)?))
            }
            Ok(url) => Ok(DataSource::Uri(url)),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(DataSource::File(FileDataSource::open(uri)?))
            }
            Err(e) => Err(Error::InvalidDataSource(format!("{uri}: {e}"))),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, DataSource::File(_))
    }

    pub fn scheme(&self) -> &str {
        match self {
            DataSource::File(_) => "file",
            DataSource::Uri(url) => url.scheme(),
        }
    }
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::File(file) => write!(f, "{}", file.path().display()),
            DataSource::Uri(url) => write!(f, "{url}"),
        }
    }
}

/// Seekable, random-access reader over a local media file
#[derive(Debug)]
pub struct FileDataSource {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
}

impl FileDataSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            path,
            file: Mutex::new(file),
            size,
        })
    }

    /// Read up to `buf.len()` bytes starting at `position`.
    /// Returns 0 at or past the end of the file.
    pub fn read_at(&self, position: u64, buf: &mut [u8]) -> Result<usize> {
        if position >= self.size || buf.is_empty() {
            return Ok(0);
        }
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.seek(SeekFrom::Start(position))?;
        let mut read = 0;
        while read < buf.len() {
            match file.read(&mut buf[read..])? {
                0 => break,
                n => read += n,
            }
        }
        Ok(read)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
