use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use palette::{FromColor, Hsv, Srgb};

use super::{make_candidate, mask_regions, Candidate};
use crate::config::{Config, DetectorKind, PlateColor};

// washed out or dark pixels carry no reliable hue
const MIN_SATURATION: f32 = 0.35;
const MIN_VALUE: f32 = 0.25;
// white plate background: bright and nearly grey
const MAX_WHITE_SATURATION: f32 = 0.15;
const MIN_WHITE_VALUE: f32 = 0.75;
// smallest share of pixels for a colour to name the plate
const MIN_COLOR_SHARE: f32 = 0.3;

/// Finds blobs of known plate background hues.
pub fn detect(img: &RgbImage, config: &Config) -> Vec<Candidate> {
    let mut colors: Vec<PlateColor> = Vec::new();
    for format in config.supported_plate_formats.iter() {
        if format.color.hue_range().is_some() && !colors.contains(&format.color) {
            colors.push(format.color);
        }
    }

    let mut candidates = Vec::new();
    for color in colors {
        let mask = color_mask(img, color);
        let closed = morphology::close(&mask, Norm::LInf, 2);
        for (region, fill) in mask_regions(&closed) {
            if let Some(candidate) = make_candidate(img, region, DetectorKind::Color, fill, color, config) {
                candidates.push(candidate);
            }
        }
    }
    candidates
}

/// Background colour of a cropped plate image: the colour most pixels vote
/// for, `Unknown` when none reaches a useful share.
pub fn plate_color(img: &RgbImage) -> PlateColor {
    let candidates = [PlateColor::Blue, PlateColor::Yellow, PlateColor::White];
    let mut votes = [0usize; 3];
    for p in img.pixels() {
        let hsv = to_hsv(p);
        if hsv.saturation <= MAX_WHITE_SATURATION && hsv.value >= MIN_WHITE_VALUE {
            votes[2] += 1;
            continue;
        }
        if let Some(i) = candidates[..2].iter().position(|c| in_hue_band(&hsv, *c)) {
            votes[i] += 1;
        }
    }

    let total = img.width() as usize * img.height() as usize;
    let mut best = PlateColor::Unknown;
    let mut best_votes = 0;
    for (color, count) in candidates.iter().zip(votes.iter()) {
        if *count > best_votes {
            best = *color;
            best_votes = *count;
        }
    }
    if total == 0 || (best_votes as f32) < MIN_COLOR_SHARE * total as f32 {
        return PlateColor::Unknown;
    }
    best
}

fn to_hsv(p: &Rgb<u8>) -> Hsv {
    Hsv::from_color(Srgb::new(p[0], p[1], p[2]).into_format::<f32>())
}

fn in_hue_band(hsv: &Hsv, color: PlateColor) -> bool {
    let (lo, hi) = match color.hue_range() {
        Some(range) => range,
        None => return false,
    };
    if hsv.saturation < MIN_SATURATION || hsv.value < MIN_VALUE {
        return false;
    }
    let hue = hsv.hue.into_positive_degrees();
    hue >= lo && hue <= hi
}

/// 255 where the pixel falls in the hue band of `color`.
pub fn color_mask(img: &RgbImage, color: PlateColor) -> GrayImage {
    let mut mask = GrayImage::new(img.width(), img.height());
    if color.hue_range().is_none() {
        return mask;
    }
    for (x, y, p) in img.enumerate_pixels() {
        if in_hue_band(&to_hsv(p), color) {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}
