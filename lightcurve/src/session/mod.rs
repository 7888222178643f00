//! Resumable reduction sessions.
//!
//! A session is defined by its log file. [`ReductionSession::create`] writes
//! the header; [`ReductionSession::open`] replays the log to learn which
//! frames are done, and [`ReductionSession::run`] appends one record per new
//! frame. Stopping at any point and running again picks up where the log
//! ends.

mod error;
pub mod log;

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

pub use error::SessionError;
pub use log::{FrameRecord, SessionLog, SessionSetup, parse_log};

use crate::Image;
use crate::frame::timestamp::seconds_since;
use crate::frame::{Frame, FrameError, FrameSource};
use crate::photometry::{CentroidConfig, FrameProcessor};

/// Which instant of an exposure the relative time refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeAnchor {
    #[default]
    ExposureStart,
    MidExposure,
}

/// Per-run settings. These are not persisted in the log.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionConfig {
    pub time_anchor: TimeAnchor,
    pub centroid: CentroidConfig,
}

/// What one call to [`ReductionSession::run`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames matching the session pattern.
    pub matched: usize,
    /// Matching frames already in the log.
    pub skipped: usize,
    /// Frames appended by this run.
    pub processed: usize,
    /// Region measurements written as `0 0`.
    pub region_failures: usize,
}

#[derive(Debug)]
pub struct ReductionSession {
    log_path: PathBuf,
    setup: SessionSetup,
    dark: Option<Image>,
    processed: HashSet<String>,
}

impl ReductionSession {
    /// Write a new log containing only the header. Never overwrites.
    pub fn create(log_path: impl AsRef<Path>, setup: &SessionSetup) -> Result<(), SessionError> {
        let log_path = log_path.as_ref();
        let io_err = |source| SessionError::Io {
            path: log_path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(log_path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => SessionError::LogExists(log_path.to_path_buf()),
                _ => io_err(e),
            })?;
        file.write_all(setup.render().as_bytes()).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;

        tracing::info!(
            log = %log_path.display(),
            pattern = %setup.pattern,
            regions = setup.regions.len(),
            "Created session log"
        );
        Ok(())
    }

    /// Replay an existing log, cutting off a torn final record. The dark
    /// template, if any, is loaded through `source`.
    pub fn open(
        log_path: impl AsRef<Path>,
        source: &impl FrameSource,
    ) -> Result<Self, SessionError> {
        let log_path = log_path.as_ref().to_path_buf();
        let log = replay_repairing_tail(&log_path)?;

        let dark = match &log.setup.dark_template {
            Some(name) => {
                let frame = source
                    .load(name)
                    .map_err(|e| SessionError::from_frame(name, e))?;
                tracing::info!("Loaded dark template {name}");
                Some(frame.image)
            }
            None => None,
        };

        let processed: HashSet<String> = log.records.into_iter().map(|r| r.filename).collect();
        tracing::info!(
            log = %log_path.display(),
            frames = processed.len(),
            regions = log.setup.regions.len(),
            "Replayed session log"
        );

        Ok(Self {
            log_path,
            setup: log.setup,
            dark,
            processed,
        })
    }

    pub fn setup(&self) -> &SessionSetup {
        &self.setup
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn dark(&self) -> Option<&Image> {
        self.dark.as_ref()
    }

    pub fn is_processed(&self, name: &str) -> bool {
        self.processed.contains(name)
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Reduce every matching frame not yet in the log, in name order.
    ///
    /// Each record is flushed to disk before the next frame is loaded. A
    /// fatal error leaves the log valid up to the last record written.
    pub fn run(
        &mut self,
        source: &impl FrameSource,
        config: &SessionConfig,
    ) -> Result<RunSummary, SessionError> {
        let names = source
            .list(&self.setup.pattern)
            .map_err(|e| SessionError::from_frame(&self.setup.pattern, e))?;
        let total = names.len();
        let processor = FrameProcessor::new(config.centroid);
        let mut writer = LogWriter::open(&self.log_path)?;

        let mut summary = RunSummary {
            matched: total,
            ..Default::default()
        };

        for (index, name) in names.into_iter().enumerate() {
            if self.processed.contains(&name) {
                summary.skipped += 1;
                continue;
            }
            if name.chars().any(char::is_whitespace) {
                return Err(SessionError::InvalidFrameName(name));
            }

            tracing::info!("{} / {}: {}", index + 1, total, name);

            let frame = source
                .load(&name)
                .map_err(|e| SessionError::from_frame(&name, e))?;
            let record = self.reduce_frame(&name, frame, &processor, config, &mut summary)?;

            writer.append(&record)?;
            self.processed.insert(name);
            summary.processed += 1;
        }

        tracing::info!(
            matched = summary.matched,
            skipped = summary.skipped,
            processed = summary.processed,
            region_failures = summary.region_failures,
            "Run complete"
        );
        Ok(summary)
    }

    fn reduce_frame(
        &self,
        name: &str,
        frame: Frame,
        processor: &FrameProcessor,
        config: &SessionConfig,
        summary: &mut RunSummary,
    ) -> Result<FrameRecord, SessionError> {
        let Frame { mut image, header } = frame;

        let exposure = header.exptime.ok_or_else(|| SessionError::MissingExposure {
            name: name.to_string(),
        })?;
        let time = match config.time_anchor {
            TimeAnchor::ExposureStart => header.start_time(),
            TimeAnchor::MidExposure => header.mid_time(exposure),
        }
        .map_err(|e| SessionError::from_frame(name, e))?;

        if let Some(dark) = &self.dark {
            if !dark.same_size(&image) {
                return Err(SessionError::DarkMismatch {
                    name: name.to_string(),
                    frame: image.size(),
                    dark: dark.size(),
                });
            }
            image.zip_apply(dark, |p, d| *p -= d);
        }

        let regions = self
            .setup
            .regions
            .iter()
            .enumerate()
            .map(|(idx, aperture)| match processor.process(aperture, exposure, &image) {
                Ok(flux) => Some(flux),
                Err(e) => {
                    tracing::warn!(
                        frame = name,
                        region = idx + 1,
                        "Region measurement failed: {e}"
                    );
                    summary.region_failures += 1;
                    None
                }
            })
            .collect();

        Ok(FrameRecord {
            relative_time: self.relative_time(&time),
            regions,
            filename: name.to_string(),
        })
    }

    fn relative_time(&self, time: &NaiveDateTime) -> f64 {
        seconds_since(&self.setup.start, time)
    }
}

/// Start time of the first frame matching `pattern`, for sessions created
/// without an explicit reference time.
pub fn first_frame_start(
    source: &impl FrameSource,
    pattern: &str,
) -> Result<NaiveDateTime, SessionError> {
    let names = source
        .list(pattern)
        .map_err(|e| SessionError::from_frame(pattern, e))?;
    let Some(first) = names.first() else {
        return Err(SessionError::from_frame(
            pattern,
            FrameError::NotFound {
                name: pattern.to_string(),
            },
        ));
    };
    let frame = source
        .load(first)
        .map_err(|e| SessionError::from_frame(first, e))?;
    frame
        .header
        .start_time()
        .map_err(|e| SessionError::from_frame(first, e))
}

/// Read and replay the log, repairing a final line that lacks its newline.
///
/// A complete final line is re-terminated. A record line that no longer parses
/// is a torn append and is cut off. Anything else is left on disk untouched
/// and reported.
fn replay_repairing_tail(path: &Path) -> Result<SessionLog, SessionError> {
    let io_err = |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    };

    let text = fs::read_to_string(path).map_err(io_err)?;
    if text.is_empty() || text.ends_with('\n') {
        return parse_log(&text);
    }

    let keep = text.rfind('\n').map_or(0, |i| i + 1);
    let tail = text[keep..].trim();
    let tail_line = text.lines().count();

    match parse_log(&text) {
        Ok(log) => {
            tracing::warn!(
                log = %path.display(),
                "Session log lacks a final newline; adding it"
            );
            let mut file = OpenOptions::new().append(true).open(path).map_err(io_err)?;
            write_durably(&mut file, "\n").map_err(io_err)?;
            Ok(log)
        }
        Err(SessionError::CorruptLog { line, .. })
            if line == tail_line && !tail.starts_with('#') =>
        {
            tracing::warn!(
                log = %path.display(),
                dropped = %tail,
                "Session log ends with a torn record; truncating it"
            );
            let file = OpenOptions::new().write(true).open(path).map_err(io_err)?;
            file.set_len(keep as u64).map_err(io_err)?;
            file.sync_all().map_err(io_err)?;
            parse_log(&text[..keep])
        }
        Err(e) => Err(e),
    }
}

/// Append-only handle on the log.
struct LogWriter {
    path: PathBuf,
    file: File,
}

impl LogWriter {
    fn open(path: &Path) -> Result<Self, SessionError> {
        let file = OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|source| SessionError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// One write per record, then flush to disk.
    fn append(&mut self, record: &FrameRecord) -> Result<(), SessionError> {
        write_durably(&mut self.file, &record.render()).map_err(|source| SessionError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

fn write_durably(file: &mut File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes())?;
    file.flush()?;
    file.sync_data()
}
