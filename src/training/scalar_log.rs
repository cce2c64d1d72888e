//! Scalar training logs.
//!
//! - `ScalarSink`: trait used by the trainer
//! - `NoopScalarSink`: discards all scalars
//! - `JsonlScalarWriter`: appends one JSON object per scalar to
//!   `<log_dir>/scalars.jsonl`

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub const LOSS_TAG: &str = "loss";
/// Mean target soft value of the sampled next states, per learn step.
pub const SOFT_VALUE_TAG: &str = "soft value";
pub const EPISODE_REWARD_TAG: &str = "episode reward";
pub const EVAL_REWARD_TAG: &str = "eval reward";

/// One logged scalar value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarRecord {
    pub tag: String,
    pub step: u64,
    pub value: f64,
    /// Seconds since the Unix epoch.
    pub wall_time: f64,
}

/// Abstract sink for tagged scalar series.
pub trait ScalarSink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that discards all scalars.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopScalarSink;

impl ScalarSink for NoopScalarSink {
    fn add_scalar(&mut self, _tag: &str, _value: f64, _step: u64) -> io::Result<()> {
        Ok(())
    }
}

/// JSONL scalar writer. Appends to an existing log so resumed runs extend it.
pub struct JsonlScalarWriter {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl JsonlScalarWriter {
    pub const FILE_NAME: &'static str = "scalars.jsonl";

    /// Create the log directory if needed and open `scalars.jsonl` inside it.
    pub fn create(log_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;
        let path = log_dir.join(Self::FILE_NAME);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(JsonlScalarWriter {
            path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ScalarSink for JsonlScalarWriter {
    fn add_scalar(&mut self, tag: &str, value: f64, step: u64) -> io::Result<()> {
        let wall_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        let record = ScalarRecord {
            tag: tag.to_string(),
            step,
            value,
            wall_time,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl Drop for JsonlScalarWriter {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}

/// Read every record from a scalar log file.
pub fn read_scalars(path: &Path) -> io::Result<Vec<ScalarRecord>> {
    let content = fs::read_to_string(path)?;
    content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(io::Error::from))
        .collect()
}
