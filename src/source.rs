// Gaze source selection and lifecycle. The controller consumes the
// `GazeSource` trait only; whether the pair stream comes from the
// in-process camera pipeline or a vendor helper process is decided once,
// at session start.
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::capture::{run_capture_loop, CameraSource, FrameSource};
use crate::config::{ClassifierConfig, TrackerConfig};
use crate::error::{Error, Result};
use crate::shared::{GazePair, SharedGaze, StopToken};
use crate::vision::{EyeballPosition, FaceLandmarker};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GazeSourceKind {
    VisionPipeline,
    VendorProcess,
}

/// A background producer of classified gaze pairs. `latest` never blocks;
/// it returns whatever the producer last published.
pub trait GazeSource: Send {
    fn start(&mut self) -> Result<()>;
    fn latest(&self) -> GazePair;
    fn stop(&mut self);
    fn kind(&self) -> GazeSourceKind;
}

/// Camera + face mesh + pupil pipeline running on its own thread.
pub struct VisionPipelineSource {
    camera_index: u32,
    classifier: ClassifierConfig,
    landmarker: Option<Box<dyn FaceLandmarker>>,
    shared: Arc<SharedGaze>,
    stop: StopToken,
    worker: Option<JoinHandle<()>>,
}

impl VisionPipelineSource {
    pub fn new(
        camera_index: u32,
        classifier: ClassifierConfig,
        landmarker: Box<dyn FaceLandmarker>,
        shared: Arc<SharedGaze>,
        stop: StopToken,
    ) -> Self {
        Self {
            camera_index,
            classifier,
            landmarker: Some(landmarker),
            shared,
            stop,
            worker: None,
        }
    }
}

impl GazeSource for VisionPipelineSource {
    fn start(&mut self) -> Result<()> {
        let landmarker = self
            .landmarker
            .take()
            .ok_or_else(|| Error::Config("vision pipeline already started".to_string()))?;
        let frames: Box<dyn FrameSource> = Box::new(CameraSource::open(self.camera_index)?);
        let classifier = self.classifier;
        let shared = self.shared.clone();
        let stop = self.stop.clone();
        self.worker = Some(std::thread::spawn(move || {
            run_capture_loop(frames, landmarker, classifier, shared, stop);
        }));
        Ok(())
    }

    fn latest(&self) -> GazePair {
        self.shared.load()
    }

    fn stop(&mut self) {
        self.stop.trigger();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("capture thread panicked");
            }
        }
    }

    fn kind(&self) -> GazeSourceKind {
        GazeSourceKind::VisionPipeline
    }
}

/// External tracker helper spawned in streaming mode. Its stdout carries
/// the same `elapsed,left, right` lines the trace file uses; a reader
/// thread parses them into the shared cell.
pub struct VendorProcessSource {
    exe: PathBuf,
    shared: Arc<SharedGaze>,
    stop: StopToken,
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
}

impl VendorProcessSource {
    pub fn new(exe: PathBuf, shared: Arc<SharedGaze>, stop: StopToken) -> Self {
        Self {
            exe,
            shared,
            stop,
            child: None,
            reader: None,
        }
    }
}

impl GazeSource for VendorProcessSource {
    fn start(&mut self) -> Result<()> {
        if self.child.is_some() {
            return Err(Error::Vendor("vendor stream already started".to_string()));
        }
        let mut child = Command::new(&self.exe)
            .arg("-l")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::Vendor(format!("failed to launch {}: {}", self.exe.display(), e)))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Vendor("vendor process has no stdout".to_string()))?;
        log::info!("vendor gaze stream launched: {}", self.exe.display());

        let shared = self.shared.clone();
        let stop = self.stop.clone();
        self.reader = Some(std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines() {
                if stop.is_set() {
                    break;
                }
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        log::debug!("vendor stream read ended: {}", e);
                        break;
                    }
                };
                match parse_gaze_line(&line) {
                    Some(pair) => shared.store(pair),
                    None => log::debug!("unparsable vendor line: {:?}", line),
                }
            }
            log::info!("vendor stream reader stopped");
        }));
        self.child = Some(child);
        Ok(())
    }

    fn latest(&self) -> GazePair {
        self.shared.load()
    }

    fn stop(&mut self) {
        self.stop.trigger();
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                log::debug!("vendor process already gone: {}", e);
            }
            let _ = child.wait();
        }
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                log::warn!("vendor reader thread panicked");
            }
        }
    }

    fn kind(&self) -> GazeSourceKind {
        GazeSourceKind::VendorProcess
    }
}

/// Parses one `elapsed,left, right` stream line. Lines that do not carry
/// two valid direction values are skipped by the caller.
pub fn parse_gaze_line(line: &str) -> Option<GazePair> {
    let mut fields = line.split(',');
    let _elapsed = fields.next()?;
    let left = fields.next()?.trim().parse::<i8>().ok()?;
    let right = fields.next()?.trim().parse::<i8>().ok()?;
    Some(GazePair::new(
        EyeballPosition::from_i8(left)?,
        EyeballPosition::from_i8(right)?,
    ))
}

/// True when the configured vendor helper should drive this session: the
/// host is Windows and the executable is actually there.
pub fn vendor_available(config: &TrackerConfig) -> bool {
    cfg!(windows)
        && config
            .vendor_exe
            .as_ref()
            .map_or(false, |exe| exe.exists())
}

/// Picks the gaze source for a session. The vendor helper wins only on a
/// Windows host where the configured executable actually exists; otherwise
/// the camera pipeline runs, provided a landmark backend was registered.
pub fn select_gaze_source(
    config: &TrackerConfig,
    landmarker: Option<Box<dyn FaceLandmarker>>,
    shared: Arc<SharedGaze>,
    stop: StopToken,
) -> Result<Box<dyn GazeSource>> {
    if let Some(exe) = &config.vendor_exe {
        if vendor_available(config) {
            log::info!("using vendor gaze stream: {}", exe.display());
            return Ok(Box::new(VendorProcessSource::new(exe.clone(), shared, stop)));
        }
        if cfg!(windows) {
            log::warn!(
                "vendor helper not found at {}, falling back to the camera pipeline",
                exe.display()
            );
        }
    }

    match landmarker {
        Some(landmarker) => Ok(Box::new(VisionPipelineSource::new(
            config.camera_index,
            config.classifier,
            landmarker,
            shared,
            stop,
        ))),
        None => Err(Error::Config(
            "no gaze source available: configure vendor_exe or register a landmark backend"
                .to_string(),
        )),
    }
}
