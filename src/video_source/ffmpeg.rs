//! ffmpeg-backed source: decodes any ffmpeg-readable URI to raw RGB24

use super::{Frame, SourceError, SourceRelease, SourceSpec, VideoSource};
use image::{DynamicImage, RgbImage};
use std::io::Read;
use std::process::{Child, ChildStdout, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Kill and wait so the process does not linger as a zombie
fn reap(mut child: Child) -> Option<ExitStatus> {
    let _ = child.kill();
    child.wait().ok()
}

struct ChildSlot {
    child: Mutex<Option<Child>>,
    released: AtomicBool,
}

impl ChildSlot {
    fn kill(&self) {
        let mut slot = match self.child.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(child) = slot.take() {
            reap(child);
        }
    }
}

impl SourceRelease for ChildSlot {
    fn force_release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.kill();
    }
}

/// ffmpeg child process source. A dead process is respawned on the next read.
pub struct FfmpegSource {
    ffmpeg_path: String,
    spec: SourceSpec,
    slot: Arc<ChildSlot>,
    stdout: Option<ChildStdout>,
    buffer: Vec<u8>,
    sequence: u64,
}

impl FfmpegSource {
    pub fn open(ffmpeg_path: &str, spec: &SourceSpec) -> Result<Self, SourceError> {
        let frame_bytes = spec.width as usize * spec.height as usize * 3;
        let mut source = Self {
            ffmpeg_path: ffmpeg_path.to_string(),
            spec: spec.clone(),
            slot: Arc::new(ChildSlot {
                child: Mutex::new(None),
                released: AtomicBool::new(false),
            }),
            stdout: None,
            buffer: vec![0u8; frame_bytes],
            sequence: 0,
        };
        source.spawn()?;
        Ok(source)
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-hide_banner").arg("-loglevel").arg("error");

        if self.spec.uri.starts_with("rtsp://") {
            cmd.arg("-rtsp_transport").arg("tcp");
        }

        cmd.arg("-i")
            .arg(&self.spec.uri)
            .arg("-an")
            .arg("-vf")
            .arg(format!("scale={}:{}", self.spec.width, self.spec.height))
            .arg("-r")
            .arg(self.spec.frame_rate.max(1).to_string())
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-f")
            .arg("rawvideo")
            .arg("-");

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd
    }

    fn spawn(&mut self) -> Result<(), SourceError> {
        let open_err = |reason: String| SourceError::Open {
            uri: self.spec.uri.clone(),
            reason,
        };

        let mut child = self
            .command()
            .spawn()
            .map_err(|e| open_err(format!("spawn {}: {}", self.ffmpeg_path, e)))?;
        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                reap(child);
                return Err(open_err("ffmpeg stdout not captured".to_string()));
            }
        };

        let mut slot = match self.slot.child.lock() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = Some(child);
        drop(slot);
        self.stdout = Some(stdout);

        tracing::debug!(uri = %self.spec.uri, "ffmpeg decoder started");
        Ok(())
    }
}

impl VideoSource for FfmpegSource {
    fn read_frame(&mut self) -> Result<Frame, SourceError> {
        if self.slot.released.load(Ordering::SeqCst) {
            return Err(SourceError::Released);
        }
        if self.stdout.is_none() {
            self.spawn()?;
        }
        let Some(stdout) = self.stdout.as_mut() else {
            return Err(SourceError::Read("decoder not running".to_string()));
        };

        if let Err(e) = stdout.read_exact(&mut self.buffer) {
            // decoder exited or stream ended; respawn on the next read
            self.stdout = None;
            self.slot.kill();
            if self.slot.released.load(Ordering::SeqCst) {
                return Err(SourceError::Released);
            }
            return Err(SourceError::Read(e.to_string()));
        }

        let image = RgbImage::from_raw(self.spec.width, self.spec.height, self.buffer.clone())
            .ok_or_else(|| SourceError::Read("short frame buffer".to_string()))?;
        self.sequence += 1;
        Ok(Frame::new(DynamicImage::ImageRgb8(image), self.sequence))
    }

    fn release_handle(&self) -> Arc<dyn SourceRelease> {
        self.slot.clone()
    }

    fn release(&mut self) {
        self.stdout = None;
        self.slot.force_release();
        tracing::debug!(uri = %self.spec.uri, "ffmpeg decoder released");
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_reap_collects_exit_status() {
        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let status = reap(child).unwrap();
        assert!(!status.success());
    }

    #[test]
    fn test_missing_binary_fails_open() {
        let spec = SourceSpec {
            uri: "rtsp://127.0.0.1:9/none".to_string(),
            width: 32,
            height: 24,
            frame_rate: 5,
        };
        assert!(matches!(
            FfmpegSource::open("/nonexistent/ffmpeg", &spec),
            Err(SourceError::Open { .. })
        ));
    }
}
