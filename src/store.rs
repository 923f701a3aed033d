//! ==============================================================================
//! store.rs - per-sensor append-only logs
//! ==============================================================================
//!
//! purpose:
//!     maps a sensor id to one text file and exposes the only two things we
//!     ever do with it: append a batch of lines, and scan the whole file.
//!
//! on-disk layout:
//!     the file name is the configured data directory string with the
//!     decimal sensor id glued on, no separator:
//!
//!         data_dir = "./data/"   sensor 7  ->  ./data/7
//!         data_dir = "./data/s"  sensor 7  ->  ./data/s7
//!
//!     files are created on first append, never truncated, never rewritten,
//!     never deleted.
//!
//! concurrency:
//!     nothing in here locks. the store is owned by the coordinator worker
//!     (coordinator.rs), which is the only code that ever calls it.
//!
//! ==============================================================================

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use tracing::{debug, warn};

use crate::codec::{self, MalformedLinePolicy};
use crate::domain::Reading;
use crate::error::StoreError;

pub struct LogStore {
    /// prefix every log path starts with
    data_dir: PathBuf,
    /// sync file data after each appended batch
    fsync: bool,
    malformed_lines: MalformedLinePolicy,
}

impl LogStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            fsync: false,
            malformed_lines: MalformedLinePolicy::default(),
        }
    }

    pub fn with_fsync(mut self, fsync: bool) -> Self {
        self.fsync = fsync;
        self
    }

    pub fn with_malformed_lines(mut self, policy: MalformedLinePolicy) -> Self {
        self.malformed_lines = policy;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// location of a sensor's log: data dir and sensor id concatenated
    pub fn log_path(&self, sensor_id: u32) -> PathBuf {
        let mut name = OsString::from(self.data_dir.as_os_str());
        name.push(sensor_id.to_string());
        PathBuf::from(name)
    }

    /// create the directory that log files will land in, if missing
    ///
    /// a data dir ending in a separator is itself the directory; otherwise
    /// it is a file name prefix and its parent is created.
    pub fn ensure_dir(&self) -> io::Result<()> {
        let raw = self.data_dir.as_os_str().to_string_lossy();
        let dir = if raw.ends_with(MAIN_SEPARATOR) || raw.ends_with('/') {
            Some(self.data_dir.as_path())
        } else {
            self.data_dir.parent()
        };

        match dir {
            Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
            _ => Ok(()),
        }
    }

    /// append readings to a sensor's log, in the order given
    ///
    /// the file is opened in append mode (created if absent) and every line
    /// is flushed before returning. on error the file keeps whatever the OS
    /// already accepted.
    pub fn append(&self, sensor_id: u32, readings: &[Reading]) -> Result<(), StoreError> {
        let path = self.log_path(sensor_id);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Open {
                path: path.clone(),
                source,
            })?;

        let write_err = |source: io::Error| StoreError::Write {
            path: path.clone(),
            source,
        };

        let mut writer = BufWriter::new(file);
        for reading in readings {
            writeln!(writer, "{}", codec::encode(reading)).map_err(write_err)?;
        }
        writer.flush().map_err(write_err)?;

        if self.fsync {
            writer.get_ref().sync_data().map_err(write_err)?;
        }

        debug!(
            sensor_id,
            count = readings.len(),
            path = %path.display(),
            "appended readings"
        );
        Ok(())
    }

    /// every reading in a sensor's log, sorted by timestamp
    ///
    /// a sensor with no log file yields an empty vec.
    pub fn read_all(&self, sensor_id: u32) -> Result<Vec<Reading>, StoreError> {
        let path = self.log_path(sensor_id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(sensor_id, path = %path.display(), "no log for sensor");
                return Ok(Vec::new());
            }
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let mut readings = Vec::new();
        for (index, chunk) in BufReader::new(file).split(b'\n').enumerate() {
            let bytes = chunk.map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            let text = String::from_utf8_lossy(&bytes);
            let line = text.strip_suffix('\r').unwrap_or(&*text);
            if line.is_empty() {
                continue;
            }

            match codec::decode(line) {
                Ok(reading) => readings.push(reading),
                Err(err) => {
                    warn!(
                        sensor_id,
                        line = index + 1,
                        error = %err,
                        policy = ?self.malformed_lines,
                        "malformed log line"
                    );
                    readings.extend(self.malformed_lines.recover(line));
                }
            }
        }

        codec::sort_readings(&mut readings);
        debug!(sensor_id, count = readings.len(), "read sensor log");
        Ok(readings)
    }
}
