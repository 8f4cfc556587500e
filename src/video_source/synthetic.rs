//! Generated test-pattern source (`synthetic://<pattern>`)
//!
//! Patterns: `bars` (static colour bars), `moving` (a square sweeping across a
//! dark background), `flaky` (moving, every third read fails), `stall` (a
//! read blocks until the source is force-released) and `fail` (open always
//! fails).

use super::{Frame, SourceError, SourceRelease, SourceSpec, VideoSource};
use image::{DynamicImage, Rgb, RgbImage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub(super) const SCHEME: &str = "synthetic://";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Bars,
    Moving,
    Flaky,
    Stall,
}

struct ReleaseFlag(AtomicBool);

impl SourceRelease for ReleaseFlag {
    fn force_release(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Synthetic frame source paced at the configured frame rate
pub struct SyntheticSource {
    pattern: Pattern,
    width: u32,
    height: u32,
    interval: Duration,
    next_due: Instant,
    sequence: u64,
    released: Arc<ReleaseFlag>,
}

impl SyntheticSource {
    pub fn open(pattern: &str, spec: &SourceSpec) -> Result<Self, SourceError> {
        let pattern = match pattern.trim_end_matches('/') {
            "" | "moving" => Pattern::Moving,
            "bars" => Pattern::Bars,
            "flaky" => Pattern::Flaky,
            "stall" => Pattern::Stall,
            other => {
                return Err(SourceError::Open {
                    uri: spec.uri.clone(),
                    reason: format!("unknown synthetic pattern '{}'", other),
                })
            }
        };

        let fps = spec.frame_rate.max(1);
        Ok(Self {
            pattern,
            width: spec.width.max(1),
            height: spec.height.max(1),
            interval: Duration::from_secs(1) / fps,
            next_due: Instant::now(),
            sequence: 0,
            released: Arc::new(ReleaseFlag(AtomicBool::new(false))),
        })
    }

    fn render(&self) -> RgbImage {
        match self.pattern {
            Pattern::Bars => {
                const BARS: [[u8; 3]; 6] = [
                    [255, 255, 255],
                    [255, 255, 0],
                    [0, 255, 255],
                    [0, 255, 0],
                    [255, 0, 255],
                    [0, 0, 255],
                ];
                let bar_width = (self.width / BARS.len() as u32).max(1);
                RgbImage::from_fn(self.width, self.height, |x, _| {
                    let idx = ((x / bar_width) as usize).min(BARS.len() - 1);
                    Rgb(BARS[idx])
                })
            }
            Pattern::Moving | Pattern::Flaky | Pattern::Stall => {
                let side = (self.width.min(self.height) / 4).max(1);
                let span = self.width.saturating_sub(side).max(1);
                let left = ((self.sequence * 4) % span as u64) as u32;
                let top = (self.height - side.min(self.height)) / 2;
                RgbImage::from_fn(self.width, self.height, |x, y| {
                    if x >= left && x < left + side && y >= top && y < top + side {
                        Rgb([230, 230, 230])
                    } else {
                        Rgb([20, 24, 32])
                    }
                })
            }
        }
    }
}

impl VideoSource for SyntheticSource {
    fn read_frame(&mut self) -> Result<Frame, SourceError> {
        if self.released.0.load(Ordering::SeqCst) {
            return Err(SourceError::Released);
        }

        if self.pattern == Pattern::Stall {
            while !self.released.0.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            return Err(SourceError::Released);
        }

        let now = Instant::now();
        if self.next_due > now {
            std::thread::sleep(self.next_due - now);
        }
        self.next_due = Instant::now() + self.interval;
        self.sequence += 1;

        if self.pattern == Pattern::Flaky && self.sequence % 3 == 0 {
            return Err(SourceError::Read(format!(
                "synthetic dropout at frame {}",
                self.sequence
            )));
        }

        let image = DynamicImage::ImageRgb8(self.render());
        Ok(Frame::new(image, self.sequence))
    }

    fn release_handle(&self) -> Arc<dyn SourceRelease> {
        self.released.clone()
    }

    fn release(&mut self) {
        self.released.force_release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(fps: u32) -> SourceSpec {
        SourceSpec {
            uri: "synthetic://moving".to_string(),
            width: 80,
            height: 60,
            frame_rate: fps,
        }
    }

    #[test]
    fn test_unknown_pattern_fails_open() {
        assert!(matches!(
            SyntheticSource::open("fail", &spec(10)),
            Err(SourceError::Open { .. })
        ));
    }

    #[test]
    fn test_moving_pattern_changes_between_frames() {
        let mut source = SyntheticSource::open("moving", &spec(500)).unwrap();
        let a = source.read_frame().unwrap();
        let b = source.read_frame().unwrap();
        assert_eq!(b.sequence, a.sequence + 1);
        assert_ne!(a.image.as_bytes(), b.image.as_bytes());
    }

    #[test]
    fn test_flaky_pattern_fails_every_third_read() {
        let mut source = SyntheticSource::open("flaky", &spec(500)).unwrap();
        assert!(source.read_frame().is_ok());
        assert!(source.read_frame().is_ok());
        assert!(matches!(source.read_frame(), Err(SourceError::Read(_))));
        assert!(source.read_frame().is_ok());
    }

    #[test]
    fn test_stall_blocks_until_released() {
        let mut source = SyntheticSource::open("stall", &spec(500)).unwrap();
        let handle = source.release_handle();
        let releaser = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            handle.force_release();
        });

        let started = Instant::now();
        assert!(matches!(source.read_frame(), Err(SourceError::Released)));
        assert!(started.elapsed() >= Duration::from_millis(40));
        releaser.join().unwrap();
    }

    #[test]
    fn test_release_stops_reads() {
        let mut source = SyntheticSource::open("bars", &spec(500)).unwrap();
        source.release_handle().force_release();
        assert!(matches!(source.read_frame(), Err(SourceError::Released)));
    }
}
