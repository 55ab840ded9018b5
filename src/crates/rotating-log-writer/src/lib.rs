//! Size-based rotating log file writer
//!
//! This crate provides an append-only byte sink that rotates its file into
//! numbered generations once it grows past a size limit, keeping a bounded
//! number of rotated files on disk.
//!
//! ## On-disk layout
//!
//! - `path`: the active file, plain appended bytes.
//! - `path.0`, `path.1`, ...: rotated files, `0` being the most recent. At most
//!   `keep_generations` of them exist.
//!
//! ## Usage
//!
//! ```no_run
//! use rotating_log_writer::{Config, RotatingWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default()
//!     .with_max_size(10 * 1024 * 1024) // 10 MiB per file
//!     .with_keep_generations(5); // keep app.log.0 .. app.log.4
//!
//! let writer = RotatingWriter::with_config("/var/log/myapp/app.log", config)?;
//!
//! writer.write(b"service started\n")?;
//! writer.sync()?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! The writer also works as a `tracing` backend:
//!
//! ```no_run
//! use rotating_log_writer::RotatingWriter;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let writer = RotatingWriter::new("/var/log/myapp/trace.log", 1 << 20, 3)?;
//!
//! tracing_subscriber::fmt()
//!     .with_writer(writer)
//!     .with_ansi(false)
//!     .init();
//!
//! tracing::info!("hello");
//! # Ok(())
//! # }
//! ```

mod error;
mod writer;

pub use error::{Result, WriterError};
pub use writer::{Config, Generation, RotatingWriter, generation_path, parse_generation};
