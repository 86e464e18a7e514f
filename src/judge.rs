//! Plate / non-plate judging.

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};
use imageproc::gradients;
use serde::Serialize;
use tracing::trace;

use std::f32::consts::PI;

use crate::config::Polarity;
use crate::locate::Candidate;
use crate::model::SvmModel;
use crate::utils;

/// Feature resolution the patch is rescaled to.
pub const JUDGE_WIDTH: u32 = 136;
pub const JUDGE_HEIGHT: u32 = 36;
const ORIENTATION_BINS: usize = 8;
/// column profile, row profile and gradient orientation histogram
pub const JUDGE_FEATURE_LEN: usize = JUDGE_WIDTH as usize + JUDGE_HEIGHT as usize + ORIENTATION_BINS;

#[derive(Debug, Clone)]
pub struct JudgedPlate {
    pub candidate: Candidate,
    pub score: f32,
    pub accepted: bool,
}

/// Judge outcome for a single patch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub score: f32,
    pub accepted: bool,
}

/// Stateless wrapper around the judge model.
pub struct PlateJudge<'a> {
    model: &'a SvmModel,
    threshold: f32,
}

impl<'a> PlateJudge<'a> {
    pub fn new(model: &'a SvmModel, threshold: f32) -> Self {
        Self { model, threshold }
    }

    /// Scores a candidate, `None` for degenerate ones (empty patch or area).
    pub fn judge(&self, candidate: Candidate) -> Option<JudgedPlate> {
        if candidate.region.area() <= 0.0 {
            trace!(detector = ?candidate.detector, "degenerate candidate dropped");
            return None;
        }
        let Verdict { score, accepted } = self.judge_patch(&candidate.patch)?;
        trace!(detector = ?candidate.detector, score, accepted, "candidate judged");
        Some(JudgedPlate { candidate, score, accepted })
    }

    /// Scores an already cropped plate image. `None` for an empty patch or
    /// a non-finite score.
    pub fn judge_patch(&self, patch: &RgbImage) -> Option<Verdict> {
        if patch.width() == 0 || patch.height() == 0 {
            trace!("empty patch");
            return None;
        }
        let features = plate_features(&imageops::grayscale(patch));
        let score = self.model.decision(&features);
        if !score.is_finite() {
            return None;
        }
        Some(Verdict { score, accepted: score > self.threshold })
    }
}

/// Stroke density profiles and edge orientation statistics of a plate patch.
pub fn plate_features(patch: &GrayImage) -> Vec<f32> {
    let resized = imageops::resize(patch, JUDGE_WIDTH, JUDGE_HEIGHT, FilterType::Triangle);
    let equalized = utils::equalize_hist(&resized);
    let binary = utils::binarize(&equalized, Polarity::LightOnDark);

    let mut features = Vec::with_capacity(JUDGE_FEATURE_LEN);
    for x in 0..JUDGE_WIDTH {
        let ink = (0..JUDGE_HEIGHT).filter(|y| binary.get_pixel(x, *y)[0] > 0).count();
        features.push(ink as f32 / JUDGE_HEIGHT as f32);
    }
    for y in 0..JUDGE_HEIGHT {
        let ink = (0..JUDGE_WIDTH).filter(|x| binary.get_pixel(*x, y)[0] > 0).count();
        features.push(ink as f32 / JUDGE_WIDTH as f32);
    }
    features.extend_from_slice(&orientation_histogram(&resized));
    features
}

/// Magnitude weighted histogram of unsigned gradient directions, bin 0 is
/// a horizontal gradient (vertical stroke). Sums to 1 unless flat.
fn orientation_histogram(gray: &GrayImage) -> [f32; ORIENTATION_BINS] {
    let gx = gradients::horizontal_sobel(gray);
    let gy = gradients::vertical_sobel(gray);
    let mut hist = [0f32; ORIENTATION_BINS];
    for (x, y, px) in gx.enumerate_pixels() {
        let (dx, dy) = (px[0] as f32, gy.get_pixel(x, y)[0] as f32);
        let magnitude = (dx * dx + dy * dy).sqrt();
        if magnitude == 0.0 {
            continue;
        }
        let theta = dy.atan2(dx).rem_euclid(PI);
        let bin = ((theta / PI * ORIENTATION_BINS as f32) as usize).min(ORIENTATION_BINS - 1);
        hist[bin] += magnitude;
    }
    let total: f32 = hist.iter().sum();
    if total > 0.0 {
        hist.iter_mut().for_each(|v| *v /= total);
    }
    hist
}
