mod config;
pub use config::Config;

mod generations;
pub use generations::{Generation, generation_path, parse_generation};
use generations::RotationPlan;

use crate::{Result, WriterError};
use parking_lot::Mutex;
use std::cell::Cell;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::MakeWriter;

#[allow(unused_imports)]
use tracing::{debug, error, info, warn};

/// The open active file and the number of bytes it holds
#[derive(Debug)]
struct ActiveFile {
    file: File,
    size: u64,
}

impl ActiveFile {
    /// Opens (or creates) the active file for appending, resuming from
    /// whatever is already on disk.
    fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|source| WriterError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        let size = file
            .metadata()
            .map_err(|source| WriterError::Stat {
                path: path.to_path_buf(),
                source,
            })?
            .len();

        Ok(Self { file, size })
    }

    /// Appends the whole payload. `size` tracks every byte the OS accepted,
    /// including the ones written before a failure.
    fn append(&mut self, path: &Path, payload: &[u8]) -> Result<usize> {
        let mut written = 0;

        while written < payload.len() {
            match self.file.write(&payload[written..]) {
                Ok(0) => {
                    return Err(WriterError::Write {
                        path: path.to_path_buf(),
                        written,
                        source: io::ErrorKind::WriteZero.into(),
                    });
                }
                Ok(n) => {
                    written += n;
                    self.size += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(WriterError::Write {
                        path: path.to_path_buf(),
                        written,
                        source,
                    });
                }
            }
        }

        Ok(written)
    }
}

thread_local! {
    /// Set while this thread is emitting a report. A writer acting as the
    /// tracing backend writes its own report lines, which must not be
    /// reported on in turn.
    static REPORTING: Cell<bool> = const { Cell::new(false) };
}

/// What happened under the lock, logged once the lock is released so that a
/// writer used as the tracing backend never re-enters itself.
#[derive(Debug, Default)]
struct Report {
    opened_with: Option<u64>,
    rotated_at: Option<u64>,
    plan: Option<RotationPlan>,
}

impl Report {
    fn emit(&self, path: &Path, result: std::result::Result<(), &WriterError>) {
        if REPORTING.with(|reporting| reporting.replace(true)) {
            return;
        }
        self.emit_events(path, result);
        REPORTING.with(|reporting| reporting.set(false));
    }

    fn emit_events(&self, path: &Path, result: std::result::Result<(), &WriterError>) {
        if let Some(size) = self.opened_with {
            debug!(size, "opened {}", path.display());
        }

        let Some(size) = self.rotated_at else {
            return;
        };

        match (result, &self.plan) {
            (Ok(()), Some(plan)) => {
                for dropped in &plan.drop {
                    info!("deleted {}", dropped.display());
                }
                info!(
                    size,
                    shifted = plan.shift.len(),
                    "rotated {} to {}",
                    path.display(),
                    plan.active.1.display()
                );
            }
            (Ok(()), None) => {}
            (Err(err), _) => {
                warn!(size, "rotation of {} failed: {}", path.display(), err);
            }
        }
    }
}

/// An append-only byte sink that rotates its file by size.
///
/// Bytes are appended to the active file at `path`. Once a write brings the
/// file to `max_size` bytes or more, the file is closed and renamed to
/// `path.0`, after older generations moved up by one index (`path.0` to
/// `path.1`, and so on). At most `keep_generations` rotated files are kept;
/// older ones are deleted. The next write creates a fresh active file.
///
/// All operations take `&self` and run under a single lock, so a writer can be
/// shared across threads and every write, including the rotation it triggers,
/// is observed as one step.
#[derive(Debug)]
pub struct RotatingWriter {
    path: PathBuf,
    config: Config,
    active_file: Mutex<Option<ActiveFile>>,
    /// Failure behind a short `io::Write` write, returned by the next call
    deferred: Mutex<Option<WriterError>>,
}

impl RotatingWriter {
    /// Creates a writer for `path`. No file is touched until the first write.
    pub fn new(path: impl Into<PathBuf>, max_size: u64, keep_generations: usize) -> Result<Self> {
        Self::with_config(path, Config::new(max_size, keep_generations))
    }

    /// Creates a writer for `path` from a [`Config`].
    pub fn with_config(path: impl Into<PathBuf>, config: Config) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            path: path.into(),
            config,
            active_file: Mutex::new(None),
            deferred: Mutex::new(None),
        })
    }

    /// Path of the active file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rotation and retention limits this writer was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Size of the active file, or `None` while no file is open.
    pub fn current_size(&self) -> Option<u64> {
        self.active_file.lock().as_ref().map(|active_file| active_file.size)
    }

    /// Lists the rotated files currently on disk, newest first.
    pub fn generations(&self) -> Result<Vec<Generation>> {
        generations::discover(&self.path)
    }

    /// Appends `payload` to the active file, rotating afterwards if the file
    /// reached the size limit.
    ///
    /// The active file is opened on demand. A write may push the file past the
    /// limit by up to its own length; it then triggers exactly one rotation.
    /// Errors abort the write at the point of failure, nothing is rolled back.
    /// [`WriterError::bytes_written`] tells how much of the payload landed in
    /// the file before the failure; a failed rotation comes back as
    /// [`WriterError::Rotate`] with the full payload length.
    pub fn write(&self, payload: &[u8]) -> Result<usize> {
        if payload.is_empty() {
            return Ok(0);
        }

        let mut report = Report::default();
        let result = self.write_locked(payload, &mut report);
        report.emit(&self.path, result.as_ref().map(|_| ()));
        result
    }

    fn write_locked(&self, payload: &[u8], report: &mut Report) -> Result<usize> {
        let mut slot = self.active_file.lock();

        let active_file = match slot.take() {
            Some(active_file) => active_file,
            None => {
                let active_file = ActiveFile::open(&self.path)?;
                report.opened_with = Some(active_file.size);
                active_file
            }
        };
        let active_file = slot.insert(active_file);

        let written = active_file.append(&self.path, payload)?;

        if active_file.size >= self.config.max_size_bytes() {
            report.rotated_at = Some(active_file.size);
            self.rotate(&mut slot, report)
                .map_err(|source| WriterError::Rotate {
                    written,
                    source: Box::new(source),
                })?;
        }

        Ok(written)
    }

    /// Closes the active file and moves it into generation 0.
    ///
    /// The slot is cleared first, so after a failed rotation the next write
    /// starts a new active file.
    fn rotate(&self, slot: &mut Option<ActiveFile>, report: &mut Report) -> Result<()> {
        drop(slot.take());

        let generations = generations::discover(&self.path)?;
        let plan = RotationPlan::new(&self.path, generations, self.config.keep_generations);
        let result = plan.execute();
        report.plan = Some(plan);
        result
    }

    /// `write` for `io::Write`, where `Err` means nothing was written.
    ///
    /// Bytes that landed before a failure are reported as a short write and
    /// the failure is kept for the next call.
    fn io_write(&self, buf: &[u8]) -> io::Result<usize> {
        if let Some(err) = self.deferred.lock().take() {
            return Err(err.into());
        }

        match RotatingWriter::write(self, buf) {
            Ok(written) => Ok(written),
            Err(err) if err.bytes_written() > 0 => {
                let written = err.bytes_written();
                *self.deferred.lock() = Some(err);
                Ok(written)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Writes go straight to the file, so flushing only reports a failure
    /// left behind by a short write.
    fn io_flush(&self) -> io::Result<()> {
        match self.deferred.lock().take() {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Flushes the active file's data to stable storage.
    pub fn sync(&self) -> Result<()> {
        if let Some(active_file) = self.active_file.lock().as_ref() {
            active_file
                .file
                .sync_data()
                .map_err(|source| WriterError::Sync {
                    path: self.path.clone(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Releases the active file. Closing an already closed writer is a no-op,
    /// and a later write reopens the file.
    pub fn close(&self) -> Result<()> {
        let closed = self.active_file.lock().take();

        if let Some(active_file) = closed {
            debug!(size = active_file.size, "closed {}", self.path.display());
        }
        Ok(())
    }
}

impl Write for &RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.io_write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.io_flush()
    }
}

impl Write for RotatingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.io_write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.io_flush()
    }
}

impl<'a> MakeWriter<'a> for RotatingWriter {
    type Writer = &'a RotatingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self
    }
}
