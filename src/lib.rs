use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

use std::sync::Arc;
use std::time::Instant;

use identify::CharsIdentify;
use judge::{JudgedPlate, PlateJudge, Verdict};
use normalize::Normalizer;
use segment::CharsSegmenter;

pub mod alphabet;
pub mod config;
pub mod error;
pub mod geometry;
pub mod identify;
pub mod judge;
pub mod locate;
pub mod model;
pub mod normalize;
pub mod segment;
pub mod utils;

pub use config::{Config, DetectorKind, PlateColor, PlateFormat, Polarity};
pub use error::{LprError, LprErrorKind};
pub use geometry::{Point, RotatedRegion};
pub use model::Models;

/// One recognized plate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateResult {
    pub region: RotatedRegion,
    pub text: String,
    /// judge score of the region, results are ordered by it
    pub score: f32,
    /// mean character confidence
    pub confidence: f32,
    pub color: PlateColor,
    /// name of the plate format the characters were read with
    pub format: String,
}

impl PlateResult {
    /// Region corners, bottom-left, top-left, top-right, bottom-right.
    pub fn corners(&self) -> [Point; 4] {
        self.region.corners()
    }
}

/// A judged plate region without its text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlateDetection {
    pub region: RotatedRegion,
    pub score: f32,
    pub detector: DetectorKind,
    pub color: PlateColor,
}

pub struct Lpr {
    config: Config,
    models: Arc<Models>,
    pool: rayon::ThreadPool,
}

impl Lpr {
    pub fn new(config: Config, models: Arc<Models>) -> Result<Self, LprError> {
        config.validate()?;
        let workers = config.workers.unwrap_or_else(num_cpus::get);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("platescan-{}", i))
            .build()?;
        Ok(Lpr { config, models, pool })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Recognize one image
    pub fn recognize(&self, img: &DynamicImage) -> Result<Vec<PlateResult>, LprError> {
        let rgb = to_rgb(img)?;
        let start = Instant::now();
        let results = self.pool.install(|| {
            let plates = self.accepted_plates(&rgb);
            plates
                .par_iter()
                .filter_map(|plate| self.read_plate(&rgb, plate))
                .collect::<Vec<_>>()
        });
        debug!(plates = results.len(), elapsed_ms = start.elapsed().as_millis() as u64, "image recognized");
        Ok(results)
    }

    /// Recognize an interleaved 8 bit buffer with 1 (gray), 3 (RGB) or 4 (RGBA) channels.
    pub fn recognize_raw(&self, pixels: &[u8], width: u32, height: u32, channels: u8) -> Result<Vec<PlateResult>, LprError> {
        self.recognize(&from_raw(pixels, width, height, channels)?)
    }

    /// Plate regions only, judged, merged and capped like `recognize` does
    /// before reading characters.
    pub fn detect(&self, img: &DynamicImage) -> Result<Vec<PlateDetection>, LprError> {
        let rgb = to_rgb(img)?;
        let plates = self.pool.install(|| self.accepted_plates(&rgb));
        Ok(plates
            .into_iter()
            .map(|p| PlateDetection {
                region: p.candidate.region,
                score: p.score,
                detector: p.candidate.detector,
                color: p.candidate.color,
            })
            .collect())
    }

    /// Judges an image that is already cropped to a single plate candidate.
    /// `None` when the judge cannot score it.
    pub fn judge_plate(&self, img: &DynamicImage) -> Result<Option<Verdict>, LprError> {
        let rgb = to_rgb(img)?;
        Ok(PlateJudge::new(self.models.judge(), self.config.judge_threshold).judge_patch(&rgb))
    }

    /// Background colour of an image cropped to a single plate.
    pub fn plate_color(&self, img: &DynamicImage) -> Result<PlateColor, LprError> {
        Ok(locate::color::plate_color(&to_rgb(img)?))
    }

    fn accepted_plates(&self, rgb: &RgbImage) -> Vec<JudgedPlate> {
        let candidates = locate::propose(rgb, &self.config);
        let proposed = candidates.len();
        let judge = PlateJudge::new(self.models.judge(), self.config.judge_threshold);
        let accepted: Vec<JudgedPlate> = candidates
            .into_par_iter()
            .filter_map(|c| judge.judge(c))
            .filter(|p| p.accepted)
            .collect();
        debug!(proposed, accepted = accepted.len(), "candidates judged");
        select_candidates(accepted, self.config.max_results, self.config.overlap_threshold)
    }

    fn read_plate(&self, rgb: &RgbImage, plate: &JudgedPlate) -> Option<PlateResult> {
        let region = plate.candidate.region;
        let canonical = Normalizer::new(&self.config.normalize).normalize(rgb, &region)?;
        let segmented = CharsSegmenter::new(&self.config.segment, &self.config.supported_plate_formats)
            .segment(&canonical, plate.candidate.color)?;
        let chars = CharsIdentify::new(self.models.classifier()).classify_plate(&segmented)?;

        let text: String = chars.iter().map(|c| c.symbol).collect();
        let confidence = chars.iter().map(|c| c.confidence).sum::<f32>() / chars.len() as f32;
        debug!(%text, score = plate.score, format = %segmented.format.name, "plate read");
        Some(PlateResult {
            region,
            text,
            score: plate.score,
            confidence,
            color: plate.candidate.color,
            format: segmented.format.name.clone(),
        })
    }
}

/// Orders plates by descending score, drops any plate overlapping a better
/// one by more than `overlap_threshold` and keeps at most `max_results`.
/// Equal scores keep their proposal order.
pub fn select_candidates(mut plates: Vec<JudgedPlate>, max_results: usize, overlap_threshold: f32) -> Vec<JudgedPlate> {
    plates.sort_by(|a, b| b.score.total_cmp(&a.score));
    let mut kept: Vec<JudgedPlate> = Vec::with_capacity(max_results.min(plates.len()));
    for plate in plates {
        if kept.len() >= max_results {
            break;
        }
        let duplicate = kept
            .iter()
            .any(|k| k.candidate.region.overlap_ratio(&plate.candidate.region) > overlap_threshold);
        if !duplicate {
            kept.push(plate);
        }
    }
    kept
}

fn to_rgb(img: &DynamicImage) -> Result<RgbImage, LprError> {
    if img.width() == 0 || img.height() == 0 {
        return Err(LprError::input(format!("image is {}x{}", img.width(), img.height())));
    }
    Ok(img.to_rgb8())
}

fn from_raw(pixels: &[u8], width: u32, height: u32, channels: u8) -> Result<DynamicImage, LprError> {
    let expected = width as usize * height as usize * channels as usize;
    if pixels.len() != expected {
        return Err(LprError::input(format!(
            "{} bytes for a {}x{}x{} image",
            pixels.len(),
            width,
            height,
            channels
        )));
    }
    let img = match channels {
        1 => GrayImage::from_raw(width, height, pixels.to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(width, height, pixels.to_vec()).map(DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(width, height, pixels.to_vec()).map(DynamicImage::ImageRgba8),
        _ => return Err(LprError::input(format!("unsupported channel count {}", channels))),
    };
    img.ok_or_else(|| LprError::input("pixel buffer does not match its dimensions"))
}

#[cfg(test)]
mod test {
    use image::{DynamicImage, Rgb, RgbImage};

    use std::sync::Arc;

    use super::{select_candidates, Lpr};
    use crate::config::{Config, DetectorKind, PlateColor};
    use crate::geometry::{Point, RotatedRegion};
    use crate::identify::CHAR_FEATURE_LEN;
    use crate::judge::{JudgedPlate, JUDGE_FEATURE_LEN};
    use crate::locate::Candidate;
    use crate::model::{Activation, Kernel, Layer, MlpModel, Models, SvmModel};

    fn models(bias: f32) -> Arc<Models> {
        let judge = SvmModel {
            feature_len: JUDGE_FEATURE_LEN,
            bias,
            kernel: Kernel::Linear { weights: vec![0.0; JUDGE_FEATURE_LEN] },
        };
        let classifier = MlpModel {
            feature_len: CHAR_FEATURE_LEN,
            classes: vec!['0'],
            layers: vec![Layer {
                weights: vec![vec![0.0; CHAR_FEATURE_LEN]],
                biases: vec![0.0],
                activation: Activation::Sigmoid,
            }],
        };
        Arc::new(Models::new(judge, classifier).unwrap())
    }

    fn plate(cx: f32, score: f32, detector: DetectorKind) -> JudgedPlate {
        JudgedPlate {
            candidate: Candidate {
                region: RotatedRegion::new(Point::new(cx, 100.0), 90.0, 30.0, 0.0).unwrap(),
                patch: RgbImage::new(90, 30),
                detector,
                detector_score: 1.0,
                color: PlateColor::Unknown,
            },
            score,
            accepted: true,
        }
    }

    #[test]
    fn overlapping_plates_keep_best() {
        let plates = vec![
            plate(100.0, 0.5, DetectorKind::Color),
            plate(105.0, 0.9, DetectorKind::Edge),
            plate(400.0, 0.2, DetectorKind::Blob),
        ];
        let kept = select_candidates(plates, 4, 0.5);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].candidate.detector, DetectorKind::Edge);
        assert_eq!(kept[1].candidate.detector, DetectorKind::Blob);
    }

    #[test]
    fn equal_scores_keep_proposal_order() {
        let plates = vec![plate(100.0, 1.0, DetectorKind::Color), plate(102.0, 1.0, DetectorKind::Edge)];
        let kept = select_candidates(plates, 4, 0.5);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].candidate.detector, DetectorKind::Color);
    }

    #[test]
    fn invalid_config_is_refused() {
        let mut config = Config::default();
        config.workers = Some(0);
        assert!(Lpr::new(config, models(1.0)).is_err());
    }

    #[test]
    fn empty_image_is_input_error() {
        let lpr = Lpr::new(Config::default(), models(1.0)).unwrap();
        let err = lpr.recognize(&DynamicImage::new_rgb8(0, 10)).unwrap_err();
        assert!(err.is_input());
        assert!(lpr.recognize_raw(&[0; 12], 2, 2, 2).unwrap_err().is_input());
        assert!(lpr.recognize_raw(&[0; 11], 2, 2, 3).unwrap_err().is_input());
    }

    #[test]
    fn plain_image_has_no_plates() {
        let lpr = Lpr::new(Config::default(), models(1.0)).unwrap();
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(320, 240, Rgb([128, 128, 128])));
        assert!(lpr.recognize(&img).unwrap().is_empty());
        assert!(lpr.detect(&img).unwrap().is_empty());
        assert!(lpr.recognize_raw(&[128; 64 * 48], 64, 48, 1).unwrap().is_empty());
    }

    #[test]
    fn single_plate_entry_points() {
        let crop = DynamicImage::ImageRgb8(RgbImage::from_pixel(136, 36, Rgb([20, 60, 200])));
        let accepting = Lpr::new(Config::default(), models(1.0)).unwrap();
        let verdict = accepting.judge_plate(&crop).unwrap().unwrap();
        assert!(verdict.accepted);
        assert_eq!(verdict.score, 1.0);
        assert_eq!(accepting.plate_color(&crop).unwrap(), PlateColor::Blue);

        let rejecting = Lpr::new(Config::default(), models(-1.0)).unwrap();
        assert!(!rejecting.judge_plate(&crop).unwrap().unwrap().accepted);

        let empty = DynamicImage::new_rgb8(0, 0);
        assert!(accepting.judge_plate(&empty).unwrap_err().is_input());
        assert!(accepting.plate_color(&empty).unwrap_err().is_input());
    }

    #[test]
    fn rejecting_judge_detects_nothing() {
        let lpr = Lpr::new(Config::default(), models(-1.0)).unwrap();
        let mut img = RgbImage::from_pixel(640, 480, Rgb([150, 150, 150]));
        for y in 200..260 {
            for x in 200..400 {
                img.put_pixel(x, y, Rgb([20, 60, 200]));
            }
        }
        let img = DynamicImage::ImageRgb8(img);
        assert!(lpr.detect(&img).unwrap().is_empty());

        let accepting = Lpr::new(Config::default(), models(1.0)).unwrap();
        let found = accepting.detect(&img).unwrap();
        assert!(!found.is_empty());
        assert_eq!(found[0].detector, DetectorKind::Color);
        assert_eq!(found[0].color, PlateColor::Blue);
    }
}
