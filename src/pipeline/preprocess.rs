//! Preprocessing stages: resize, colorspace, denoise, blur, equalize

use crate::error::{Error, Result};
use crate::video_source::{ColorSpace, Frame};
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::median_filter;

pub(crate) fn resize(frame: &Frame, width: u32, height: u32) -> Result<Frame> {
    if width == 0 || height == 0 {
        return Err(Error::stage("resize", format!("invalid target {}x{}", width, height)));
    }
    if frame.width() == width && frame.height() == height {
        return Ok(frame.clone());
    }
    let resized = frame.image.resize_exact(width, height, FilterType::Triangle);
    Ok(frame.with_image(resized, frame.color))
}

pub(crate) fn convert_color(frame: &Frame, target: ColorSpace) -> Result<Frame> {
    match (frame.color, target) {
        (from, to) if from == to => Ok(frame.clone()),
        (ColorSpace::Rgb, ColorSpace::Grayscale) => Ok(frame.with_image(
            DynamicImage::ImageLuma8(frame.image.to_luma8()),
            ColorSpace::Grayscale,
        )),
        (ColorSpace::Rgb, ColorSpace::Hsv) => Ok(frame.with_image(
            DynamicImage::ImageRgb8(rgb_to_hsv(&frame.image.to_rgb8())),
            ColorSpace::Hsv,
        )),
        (ColorSpace::Grayscale, ColorSpace::Rgb) => Ok(frame.with_image(
            DynamicImage::ImageRgb8(frame.image.to_rgb8()),
            ColorSpace::Rgb,
        )),
        (from, to) => Err(Error::stage(
            "colorspace",
            format!("cannot convert {:?} frame to {:?}", from, to),
        )),
    }
}

pub(crate) fn denoise(frame: &Frame) -> Result<Frame> {
    let filtered = match &frame.image {
        DynamicImage::ImageLuma8(gray) => DynamicImage::ImageLuma8(median_filter(gray, 1, 1)),
        DynamicImage::ImageRgb8(rgb) => DynamicImage::ImageRgb8(median_filter(rgb, 1, 1)),
        other => {
            return Err(Error::stage(
                "denoise",
                format!("unsupported pixel layout {:?}", other.color()),
            ))
        }
    };
    Ok(frame.with_image(filtered, frame.color))
}

/// Sigma derived from the kernel size the same way OpenCV does for sigma=0
pub(crate) fn kernel_sigma(kernel: u32) -> f32 {
    0.3 * ((kernel as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

pub(crate) fn blur(frame: &Frame, kernel: u32) -> Result<Frame> {
    if kernel == 0 || kernel % 2 == 0 {
        return Err(Error::stage(
            "blur",
            format!("kernel size must be positive and odd, got {}", kernel),
        ));
    }
    if kernel == 1 {
        return Ok(frame.clone());
    }
    let blurred = frame.image.blur(kernel_sigma(kernel));
    Ok(frame.with_image(blurred, frame.color))
}

pub(crate) fn equalize(frame: &Frame) -> Result<Frame> {
    match (&frame.image, frame.color) {
        (DynamicImage::ImageLuma8(gray), _) => Ok(frame.with_image(
            DynamicImage::ImageLuma8(equalize_histogram(gray)),
            frame.color,
        )),
        (DynamicImage::ImageRgb8(hsv), ColorSpace::Hsv) => {
            let value = GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| {
                Luma([hsv.get_pixel(x, y)[2]])
            });
            let value = equalize_histogram(&value);
            let out = RgbImage::from_fn(hsv.width(), hsv.height(), |x, y| {
                let p = hsv.get_pixel(x, y);
                Rgb([p[0], p[1], value.get_pixel(x, y)[0]])
            });
            Ok(frame.with_image(DynamicImage::ImageRgb8(out), ColorSpace::Hsv))
        }
        (DynamicImage::ImageRgb8(rgb), _) => {
            // equalize luma, shift every channel by the luma delta
            let luma = frame.image.to_luma8();
            let equalized = equalize_histogram(&luma);
            let out = RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
                let p = rgb.get_pixel(x, y);
                let delta = equalized.get_pixel(x, y)[0] as i16 - luma.get_pixel(x, y)[0] as i16;
                Rgb([
                    (p[0] as i16 + delta).clamp(0, 255) as u8,
                    (p[1] as i16 + delta).clamp(0, 255) as u8,
                    (p[2] as i16 + delta).clamp(0, 255) as u8,
                ])
            });
            Ok(frame.with_image(DynamicImage::ImageRgb8(out), frame.color))
        }
        (other, _) => Err(Error::stage(
            "equalize_hist",
            format!("unsupported pixel layout {:?}", other.color()),
        )),
    }
}

/// 8-bit HSV with H in [0, 180), S and V in [0, 255]
pub(crate) fn rgb_to_hsv(rgb: &RgbImage) -> RgbImage {
    RgbImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        let (rf, gf, bf) = (r as f32, g as f32, b as f32);
        let max = rf.max(gf).max(bf);
        let min = rf.min(gf).min(bf);
        let delta = max - min;

        let s = if max > 0.0 { delta * 255.0 / max } else { 0.0 };
        let mut h = if delta == 0.0 {
            0.0
        } else if max == rf {
            60.0 * (gf - bf) / delta
        } else if max == gf {
            120.0 + 60.0 * (bf - rf) / delta
        } else {
            240.0 + 60.0 * (rf - gf) / delta
        };
        if h < 0.0 {
            h += 360.0;
        }

        Rgb([
            ((h / 2.0).round() as u32 % 180) as u8,
            s.round().min(255.0) as u8,
            max as u8,
        ])
    })
}
