//! Firmware image files and their staleness sidecars
//!
//! A chip only needs its firmware transferred again when the file on disk has
//! changed since the last successful transfer. The time of that transfer is
//! kept in a `.stat` sidecar under the configuration store's managed
//! directory, as decimal epoch seconds. The sidecar name encodes the image's
//! full path (see [`sidecar_name`]).

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, info, trace, warn};
use tuner_core::{ConfigExt, ConfigStore, Result, TunerError};

/// Suffix appended to the encoded image path to form its sidecar name
pub const SIDECAR_SUFFIX: &str = ".stat";

/// Sidecar file name for the image at `path`
///
/// Bytes outside `[A-Za-z0-9._-]` of the canonical path are percent-encoded,
/// so same-named images in different directories get different sidecars.
pub fn sidecar_name(path: &Path) -> String {
    let full = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let mut name = String::new();
    for b in full.to_string_lossy().bytes() {
        match b {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'.' | b'-' | b'_' => {
                name.push(char::from(b))
            }
            _ => name.push_str(&format!("%{b:02X}")),
        }
    }
    name.push_str(SIDECAR_SUFFIX);
    name
}

/// A firmware file loaded into memory
#[derive(Debug, Clone)]
pub struct FirmwareImage {
    path: PathBuf,
    bytes: Vec<u8>,
    modified_secs: u64,
    sidecar: Option<PathBuf>,
    up_to_date: bool,
}

impl FirmwareImage {
    /// Load the image named by configuration key `key`
    pub fn from_config<C: ConfigStore + ?Sized>(config: &C, key: &str) -> Result<Self> {
        let path = config.require_string(key)?;
        Self::open(config, path)
    }

    /// Load the image at `path`, tracking staleness under `config`'s managed directory
    pub fn open<C: ConfigStore + ?Sized>(config: &C, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                TunerError::NotFound(format!("firmware file {}", path.display()))
            }
            _ => TunerError::Io(e),
        })?;
        let modified_secs = fs::metadata(path)?
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let sidecar = match config.get_file(&sidecar_name(path)) {
            Ok(sidecar) => Some(sidecar),
            Err(e) => {
                warn!(
                    "no sidecar for {}: {}; firmware will always be reloaded",
                    path.display(),
                    e
                );
                None
            }
        };

        let stored = match &sidecar {
            Some(sidecar) => read_stamp(sidecar)?,
            None => None,
        };
        let up_to_date = stored.is_some_and(|stamp| modified_secs <= stamp);
        debug!(
            "firmware {} ({} bytes, mtime {}, last applied {:?}): {}",
            path.display(),
            bytes.len(),
            modified_secs,
            stored,
            if up_to_date { "up to date" } else { "stale" }
        );

        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            modified_secs,
            sidecar,
            up_to_date,
        })
    }

    /// Wrap bytes that did not come from a tracked file; never up to date
    pub fn from_bytes(name: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: name.into(),
            bytes,
            modified_secs: 0,
            sidecar: None,
            up_to_date: false,
        }
    }

    /// True when the file has not changed since the last recorded transfer
    pub fn up_to_date(&self) -> bool {
        self.up_to_date
    }

    /// Record a successful transfer
    pub fn update(&mut self) -> Result<()> {
        self.up_to_date = true;
        if let Some(sidecar) = &self.sidecar {
            write_stamp(sidecar, self.modified_secs)?;
            info!("firmware {} applied", self.path.display());
        }
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar location, when a managed directory was available
    pub fn sidecar_path(&self) -> Option<&Path> {
        self.sidecar.as_deref()
    }
}

// Advisory locks are best effort; hosts without them still read and write.
fn read_stamp(path: &Path) -> Result<Option<u64>> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if let Err(e) = file.lock_shared() {
        trace!("reading {} unlocked: {}", path.display(), e);
    }
    let mut text = String::new();
    file.read_to_string(&mut text)?;
    if let Err(e) = file.unlock() {
        trace!("unlock {}: {}", path.display(), e);
    }

    match text.trim().parse::<u64>() {
        Ok(stamp) => Ok(Some(stamp)),
        Err(_) => {
            warn!("ignoring malformed sidecar {}: {:?}", path.display(), text);
            Ok(None)
        }
    }
}

fn write_stamp(path: &Path, stamp: u64) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    if let Err(e) = file.lock() {
        trace!("writing {} unlocked: {}", path.display(), e);
    }
    file.set_len(0)?;
    writeln!(file, "{stamp}")?;
    if let Err(e) = file.unlock() {
        trace!("unlock {}: {}", path.display(), e);
    }
    Ok(())
}
