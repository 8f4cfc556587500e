//! Frame analytics: channel statistics, edge density, movement, brightness

use super::types::{AnalyticsOptions, AnalyticsReport};
use crate::error::{Error, Result};
use crate::video_source::{ColorSpace, Frame};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::edges::canny;

/// Previous frame kept for movement analysis. Session scoped.
#[derive(Default)]
pub(crate) struct MovementState {
    previous: Option<(ColorSpace, DynamicImage)>,
}

fn mean_std(values: impl Iterator<Item = u8>) -> (f64, f64) {
    let (mut n, mut sum, mut sum_sq) = (0u64, 0f64, 0f64);
    for v in values {
        let v = v as f64;
        n += 1;
        sum += v;
        sum_sq += v * v;
    }
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    (mean, var.sqrt())
}

/// Single-channel view used by edge and brightness analysis
fn gray_view(frame: &Frame) -> Result<GrayImage> {
    match (&frame.image, frame.color) {
        (DynamicImage::ImageLuma8(gray), _) => Ok(gray.clone()),
        (DynamicImage::ImageRgb8(hsv), ColorSpace::Hsv) => Ok(GrayImage::from_fn(
            hsv.width(),
            hsv.height(),
            |x, y| Luma([hsv.get_pixel(x, y)[2]]),
        )),
        (DynamicImage::ImageRgb8(_), _) => Ok(frame.image.to_luma8()),
        (other, _) => Err(Error::stage(
            "analytics",
            format!("unsupported pixel layout {:?}", other.color()),
        )),
    }
}

pub(crate) fn basic_stats(frame: &Frame, report: &mut AnalyticsReport) -> Result<()> {
    match (&frame.image, frame.color) {
        (DynamicImage::ImageLuma8(gray), _) => {
            let (mean, std) = mean_std(gray.as_raw().iter().copied());
            report.insert("mean".to_string(), mean);
            report.insert("std".to_string(), std);
        }
        (DynamicImage::ImageRgb8(img), color) => {
            let names = match color {
                ColorSpace::Hsv => ["hue", "saturation", "value"],
                _ => ["red", "green", "blue"],
            };
            let raw = img.as_raw();
            for (channel, name) in names.iter().enumerate() {
                let (mean, std) = mean_std(raw.iter().skip(channel).step_by(3).copied());
                report.insert(format!("{}_mean", name), mean);
                report.insert(format!("{}_std", name), std);
            }
        }
        (other, _) => {
            return Err(Error::stage(
                "basic_stats",
                format!("unsupported pixel layout {:?}", other.color()),
            ))
        }
    }
    Ok(())
}

pub(crate) fn edge_density(frame: &Frame, report: &mut AnalyticsReport) -> Result<()> {
    let gray = gray_view(frame)?;
    let edges = canny(&gray, 100.0, 200.0);
    let total = edges.as_raw().len();
    let on = edges.as_raw().iter().filter(|v| **v > 0).count();
    let density = if total == 0 { 0.0 } else { on as f64 / total as f64 };
    report.insert("edge_density".to_string(), density);
    Ok(())
}

/// Mean absolute difference against the previous frame. The first frame
/// after a (re)start only primes the state.
pub(crate) fn movement(
    frame: &Frame,
    state: &mut MovementState,
    report: &mut AnalyticsReport,
) -> Result<()> {
    let current = (frame.color, frame.image.clone());
    let Some((prev_color, prev)) = state.previous.replace(current) else {
        return Ok(());
    };

    let same_geometry = prev.width() == frame.width()
        && prev.height() == frame.height()
        && prev.as_bytes().len() == frame.image.as_bytes().len();
    if prev_color != frame.color || !same_geometry {
        tracing::debug!(
            sequence = frame.sequence,
            "Frame geometry changed, movement baseline reset"
        );
        return Ok(());
    }

    let a = prev.as_bytes();
    let b = frame.image.as_bytes();
    let total: u64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| x.abs_diff(*y) as u64)
        .sum();
    let intensity = if a.is_empty() { 0.0 } else { total as f64 / a.len() as f64 };
    report.insert("movement_intensity".to_string(), intensity);
    Ok(())
}

pub(crate) fn brightness(frame: &Frame, report: &mut AnalyticsReport) -> Result<()> {
    let gray = gray_view(frame)?;
    let (mean, std) = mean_std(gray.as_raw().iter().copied());
    report.insert("brightness".to_string(), mean);
    report.insert("contrast".to_string(), std);
    Ok(())
}

/// Run the enabled analytics. Failed analytics are reported and skipped.
pub(crate) fn analyze(
    frame: &Frame,
    options: &AnalyticsOptions,
    movement_state: &mut MovementState,
    failed: &mut Vec<&'static str>,
) -> AnalyticsReport {
    let mut report = AnalyticsReport::new();

    let mut run = |name: &'static str, result: Result<()>| {
        if let Err(e) = result {
            tracing::warn!(
                stage = name,
                sequence = frame.sequence,
                error = %e,
                "Analytics stage failed"
            );
            failed.push(name);
        }
    };

    if options.basic_stats {
        run("basic_stats", basic_stats(frame, &mut report));
    }
    if options.edge_detection {
        run("edge_detection", edge_density(frame, &mut report));
    }
    if options.movement_analysis {
        run("movement_analysis", movement(frame, movement_state, &mut report));
    }
    if options.brightness_analysis {
        run("brightness_analysis", brightness(frame, &mut report));
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn rgb_frame(seq: u64, f: impl Fn(u32, u32) -> [u8; 3]) -> Frame {
        let img = RgbImage::from_fn(20, 10, |x, y| Rgb(f(x, y)));
        Frame::new(DynamicImage::ImageRgb8(img), seq)
    }

    #[test]
    fn test_basic_stats_names_channels() {
        let frame = rgb_frame(1, |x, _| if x < 10 { [0, 100, 200] } else { [100, 100, 200] });
        let mut report = AnalyticsReport::new();
        basic_stats(&frame, &mut report).unwrap();
        assert_eq!(report["red_mean"], 50.0);
        assert_eq!(report["red_std"], 50.0);
        assert_eq!(report["green_mean"], 100.0);
        assert_eq!(report["green_std"], 0.0);
        assert_eq!(report["blue_mean"], 200.0);
    }

    #[test]
    fn test_movement_primes_then_measures() {
        let mut state = MovementState::default();
        let mut report = AnalyticsReport::new();

        movement(&rgb_frame(1, |_, _| [10, 10, 10]), &mut state, &mut report).unwrap();
        assert!(report.get("movement_intensity").is_none());
        assert!(state.previous.is_some());

        movement(&rgb_frame(2, |_, _| [14, 10, 10]), &mut state, &mut report).unwrap();
        let intensity = report["movement_intensity"];
        assert!((intensity - 4.0 / 3.0).abs() < 1e-9);

        state.previous = None;
        let mut fresh = AnalyticsReport::new();
        movement(&rgb_frame(3, |_, _| [0, 0, 0]), &mut state, &mut fresh).unwrap();
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_movement_resets_on_size_change() {
        let mut state = MovementState::default();
        let mut report = AnalyticsReport::new();
        movement(&rgb_frame(1, |_, _| [10, 10, 10]), &mut state, &mut report).unwrap();

        let small = Frame::new(DynamicImage::ImageRgb8(RgbImage::new(4, 4)), 2);
        movement(&small, &mut state, &mut report).unwrap();
        assert!(report.is_empty());
        assert!(state.previous.is_some());
    }

    #[test]
    fn test_flat_frame_has_no_edges() {
        let mut report = AnalyticsReport::new();
        edge_density(&rgb_frame(1, |_, _| [50, 50, 50]), &mut report).unwrap();
        assert_eq!(report["edge_density"], 0.0);

        let mut striped = AnalyticsReport::new();
        edge_density(&rgb_frame(1, |x, _| if x % 4 < 2 { [0, 0, 0] } else { [255, 255, 255] }), &mut striped).unwrap();
        assert!(striped["edge_density"] > 0.0);
    }

    #[test]
    fn test_brightness_and_contrast() {
        let mut report = AnalyticsReport::new();
        brightness(&rgb_frame(1, |_, _| [80, 80, 80]), &mut report).unwrap();
        assert!((report["brightness"] - 80.0).abs() < 1.0);
        assert!(report["contrast"] < 1e-9);
    }
}
