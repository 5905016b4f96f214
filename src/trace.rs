// Append-only gaze trace. Each line is `<elapsed-seconds>,<left>, <right>`
// with the raw {-1, 0, 1} direction values; the upload side parses this
// shape verbatim, so the format must not change.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::Result;
use crate::shared::GazePair;

pub struct GazeTrace {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    dropped: u64,
}

impl GazeTrace {
    /// Creates a fresh trace file with a randomized `gazeNNNNNN.csv` name
    /// inside `dir`.
    pub fn create_in(dir: &Path) -> Result<Self> {
        let name = format!("gaze{:06}.csv", rand::thread_rng().gen_range(1..=999_999));
        let path = dir.join(name);
        let file = File::create(&path)?;
        log::info!("gaze trace opened at {}", path.display());
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            dropped: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one trace line. Best-effort: a failed append is counted and
    /// dropped so the controller cadence never stalls on disk I/O.
    pub fn record(&mut self, elapsed: f64, pair: GazePair) {
        match self.writer.as_mut() {
            Some(writer) => {
                if writeln!(writer, "{},{}, {}", elapsed, pair.left, pair.right).is_err() {
                    self.dropped += 1;
                }
            }
            None => self.dropped += 1,
        }
    }

    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            if let Err(e) = writer.flush() {
                log::debug!("trace flush failed: {}", e);
            }
        }
    }

    pub fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                log::debug!("trace flush failed: {}", e);
            }
            if self.dropped > 0 {
                log::warn!("{} gaze trace lines were dropped", self.dropped);
            }
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl Drop for GazeTrace {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::EyeballPosition::{Center, Left, Right};

    #[test]
    fn file_name_is_randomized_with_six_digits() {
        let dir = tempfile::tempdir().unwrap();
        let trace = GazeTrace::create_in(dir.path()).unwrap();
        let name = trace.path().file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), "gaze000000.csv".len());
        assert!(name.starts_with("gaze"));
        assert!(name.ends_with(".csv"));
        assert!(name[4..10].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn lines_follow_the_trace_contract() {
        let dir = tempfile::tempdir().unwrap();
        let mut trace = GazeTrace::create_in(dir.path()).unwrap();
        trace.record(0.5, GazePair::new(Center, Right));
        trace.record(1.25, GazePair::new(Left, Left));
        trace.flush();

        let text = std::fs::read_to_string(trace.path()).unwrap();
        assert_eq!(text, "0.5,0, 1\n1.25,-1, -1\n");
        assert_eq!(trace.dropped(), 0);
    }

    #[test]
    fn records_after_close_are_counted_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut trace = GazeTrace::create_in(dir.path()).unwrap();
        trace.record(0.1, GazePair::default());
        trace.close();
        trace.record(0.2, GazePair::default());
        assert_eq!(trace.dropped(), 1);

        let text = std::fs::read_to_string(trace.path()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }
}
