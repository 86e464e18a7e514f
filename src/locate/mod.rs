//! Region proposal.
//!
//! Each detector is a pure function of the image and the configuration that
//! returns plate shaped candidates. Detectors are independent, their outputs
//! are concatenated in `detector_mask` order without deduplication, near
//! duplicates are resolved after judging.

use image::{GrayImage, RgbImage};
use imageproc::contours::{find_contours, BorderType};
use rayon::prelude::*;
use tracing::debug;

use crate::config::{Config, DetectorKind, PlateColor};
use crate::geometry::{Point, RotatedRegion};
use crate::utils;

pub mod blob;
pub mod color;
pub mod edge;

/// A proposed plate region prior to judging.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub region: RotatedRegion,
    /// axis aligned crop around the region, may be empty
    pub patch: RgbImage,
    pub detector: DetectorKind,
    pub detector_score: f32,
    pub color: PlateColor,
}

pub fn propose(img: &RgbImage, config: &Config) -> Vec<Candidate> {
    let mut kinds: Vec<DetectorKind> = Vec::with_capacity(3);
    for kind in config.detector_mask.iter() {
        if !kinds.contains(kind) {
            kinds.push(*kind);
        }
    }

    let per_detector: Vec<Vec<Candidate>> = kinds
        .par_iter()
        .map(|kind| {
            let found = run_detector(*kind, img, config);
            debug!(detector = ?kind, candidates = found.len(), "detector finished");
            found
        })
        .collect();
    per_detector.into_iter().flatten().collect()
}

pub fn run_detector(kind: DetectorKind, img: &RgbImage, config: &Config) -> Vec<Candidate> {
    match kind {
        DetectorKind::Color => color::detect(img, config),
        DetectorKind::Edge => edge::detect(img, config),
        DetectorKind::Blob => blob::detect(img, config),
    }
}

/// The shared geometric filter: long/short ratio within the configured
/// aspect range and an area above the resolution scaled minimum.
pub fn passes_geometry(region: &RotatedRegion, config: &Config, img_width: u32, img_height: u32) -> bool {
    let aspect = region.aspect();
    aspect >= config.min_candidate_aspect
        && aspect <= config.max_candidate_aspect
        && region.area() >= config.scaled_min_area(img_width, img_height)
}

/// Filters `region` and cuts its patch out of `img`. The candidate region
/// always has its width on the long side.
pub(crate) fn make_candidate(
    img: &RgbImage,
    region: RotatedRegion,
    detector: DetectorKind,
    detector_score: f32,
    color: PlateColor,
    config: &Config,
) -> Option<Candidate> {
    let region = region.long_axis();
    if !passes_geometry(&region, config, img.width(), img.height()) {
        return None;
    }
    let patch = utils::crop_rgb(img, &region.bounding_rect()).unwrap_or_else(|| RgbImage::new(0, 0));
    Some(Candidate { region, patch, detector, detector_score, color })
}

/// Minimal rotated rectangles of the outer contours of `mask`, with the share
/// of each rectangle covered by its contour polygon.
pub(crate) fn mask_regions(mask: &GrayImage) -> Vec<(RotatedRegion, f32)> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|contour| contour.border_type == BorderType::Outer && contour.points.len() >= 3)
        .filter_map(|contour| {
            let points: Vec<Point> = contour.points.iter().map(|p| Point::new(p.x as f32, p.y as f32)).collect();
            let region = RotatedRegion::from_points(&points)?;
            let fill = (polygon_area(&points) / region.area()).min(1.0);
            Some((region, fill))
        })
        .collect()
}

// shoelace formula
fn polygon_area(points: &[Point]) -> f32 {
    let n = points.len();
    let twice: f32 = (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum();
    twice.abs() / 2.0
}

#[cfg(test)]
mod test {
    use image::{GrayImage, Luma, Rgb, RgbImage};

    use super::{make_candidate, mask_regions, passes_geometry, propose};
    use crate::config::{Config, DetectorKind, PlateColor};
    use crate::geometry::{Point, RotatedRegion};

    fn region(w: f32, h: f32, angle: f32) -> RotatedRegion {
        RotatedRegion::new(Point::new(320.0, 240.0), w, h, angle).unwrap()
    }

    #[test]
    fn aspect_filter() {
        let config = Config::default();
        assert!(passes_geometry(&region(150.0, 50.0, 0.0), &config, 640, 480));
        assert!(passes_geometry(&region(50.0, 150.0, 80.0), &config, 640, 480));
        assert!(!passes_geometry(&region(80.0, 80.0, 0.0), &config, 640, 480));
        assert!(!passes_geometry(&region(240.0, 30.0, 0.0), &config, 640, 480));
    }

    #[test]
    fn candidates_are_long_side_first() {
        let img = RgbImage::from_pixel(640, 480, Rgb([90, 90, 90]));
        let upright = region(76.0, 290.0, 80.0);
        let candidate = make_candidate(&img, upright, DetectorKind::Color, 1.0, PlateColor::Blue, &Config::default()).unwrap();
        assert!((candidate.region.width() - 290.0).abs() < 1e-3);
        assert!((candidate.region.height() - 76.0).abs() < 1e-3);
        assert!((candidate.region.angle() + 10.0).abs() < 1e-3);
        assert!(candidate.region.approx_eq(&upright, 1e-2));

        let [bl, tl, tr, br] = candidate.region.corners();
        assert!(tl.x < tr.x && bl.x < br.x);
        assert!(tl.y < bl.y && tr.y < br.y);
    }

    #[test]
    fn area_filter_scales() {
        let config = Config::default();
        let small = region(30.0, 10.0, 0.0);
        assert!(!passes_geometry(&small, &config, 640, 480));
        assert!(passes_geometry(&small, &config, 160, 120));
    }

    #[test]
    fn regions_of_filled_rectangle() {
        let mut mask = GrayImage::new(100, 60);
        for y in 20..40 {
            for x in 10..70 {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
        let regions = mask_regions(&mask);
        assert_eq!(regions.len(), 1);
        let (r, fill) = regions[0];
        let r = r.long_axis();
        assert!((r.center().x - 39.5).abs() < 0.5 && (r.center().y - 29.5).abs() < 0.5);
        assert!((r.width() - 59.0).abs() < 0.5 && (r.height() - 19.0).abs() < 0.5);
        assert!(fill > 0.95);
    }

    #[test]
    fn blank_image_has_no_candidates() {
        let img = RgbImage::from_pixel(320, 240, Rgb([128, 128, 128]));
        assert!(propose(&img, &Config::default()).is_empty());
    }

    #[test]
    fn detectors_keep_mask_order() {
        let mut img = RgbImage::from_pixel(640, 480, Rgb([150, 150, 150]));
        for y in 200..260 {
            for x in 200..400 {
                img.put_pixel(x, y, Rgb([20, 60, 200]));
            }
        }
        let config = Config { detector_mask: vec![DetectorKind::Blob, DetectorKind::Color], ..Config::default() };
        let candidates = propose(&img, &config);
        assert!(!candidates.is_empty());
        let first_color = candidates.iter().position(|c| c.detector == DetectorKind::Color).unwrap();
        assert!(candidates[..first_color].iter().all(|c| c.detector == DetectorKind::Blob));
        assert!(candidates.iter().all(|c| c.detector != DetectorKind::Edge));
    }
}
