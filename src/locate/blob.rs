use image::{GrayImage, Luma, RgbImage};

use super::{make_candidate, mask_regions, passes_geometry, Candidate};
use crate::config::{Config, DetectorKind, PlateColor};
use crate::geometry::RotatedRegion;

const LEVEL_STEP: u8 = 24;
// a region is stable when the next level keeps its area within this share
const MAX_VARIATION: f32 = 0.25;
const MATCH_OVERLAP: f32 = 0.8;

#[derive(Debug, Clone, Copy)]
struct Stable {
    region: RotatedRegion,
    variation: f32,
}

/// Regions that survive consecutive threshold levels with little change,
/// for dark and for light blobs.
pub fn detect(img: &RgbImage, config: &Config) -> Vec<Candidate> {
    let gray = image::imageops::grayscale(img);
    let (width, height) = gray.dimensions();

    let mut stable: Vec<Stable> = Vec::new();
    for dark in [true, false] {
        let mut previous: Option<Vec<RotatedRegion>> = None;
        for level in (LEVEL_STEP..=u8::MAX - LEVEL_STEP / 2).step_by(LEVEL_STEP as usize) {
            let regions: Vec<RotatedRegion> = mask_regions(&level_mask(&gray, level, dark))
                .into_iter()
                .map(|(region, _)| region)
                .filter(|region| passes_geometry(region, config, width, height))
                .collect();
            if let Some(previous) = previous.as_ref() {
                for region in previous.iter() {
                    if let Some(variation) = best_variation(region, &regions) {
                        stable.push(Stable { region: *region, variation });
                    }
                }
            }
            previous = Some(regions);
        }
    }

    merge_nested(stable)
        .into_iter()
        .filter_map(|s| {
            make_candidate(img, s.region, DetectorKind::Blob, 1.0 - s.variation, PlateColor::Unknown, config)
        })
        .collect()
}

/// Dark blobs are pixels below `level`, light blobs pixels above it.
fn level_mask(gray: &GrayImage, level: u8, dark: bool) -> GrayImage {
    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (x, y, p) in gray.enumerate_pixels() {
        if (dark && p[0] < level) || (!dark && p[0] > level) {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}

fn best_variation(region: &RotatedRegion, next: &[RotatedRegion]) -> Option<f32> {
    next.iter()
        .filter(|other| region.overlap_ratio(other) >= MATCH_OVERLAP)
        .map(|other| (other.area() - region.area()).abs() / region.area())
        .filter(|variation| *variation <= MAX_VARIATION)
        .min_by(|a, b| a.total_cmp(b))
}

/// Keeps the outermost of nested or overlapping detections. Among near
/// equal regions the most stable one wins.
fn merge_nested(mut stable: Vec<Stable>) -> Vec<Stable> {
    stable.sort_by(|a, b| {
        b.region
            .area()
            .total_cmp(&a.region.area())
            .then(a.variation.total_cmp(&b.variation))
    });
    let mut kept: Vec<Stable> = Vec::new();
    for s in stable {
        let inner = s.region.bounding_rect();
        let swallowed = kept.iter().any(|k| {
            let mut outer = k.region.bounding_rect();
            // one pixel slack, refits differ at the border
            outer.x -= 1.0;
            outer.y -= 1.0;
            outer.width += 2.0;
            outer.height += 2.0;
            outer.contains(&inner) || k.region.overlap_ratio(&s.region) >= MATCH_OVERLAP
        });
        if !swallowed {
            kept.push(s);
        }
    }
    kept
}

#[cfg(test)]
mod test {
    use image::{Rgb, RgbImage};

    use super::{detect, merge_nested, Stable};
    use crate::config::{Config, DetectorKind};
    use crate::geometry::{Point, RotatedRegion};

    fn stable(cx: f32, cy: f32, w: f32, h: f32, variation: f32) -> Stable {
        Stable { region: RotatedRegion::new(Point::new(cx, cy), w, h, 0.0).unwrap(), variation }
    }

    #[test]
    fn nested_detections_merge_to_outer() {
        let merged = merge_nested(vec![
            stable(100.0, 100.0, 60.0, 20.0, 0.1),
            stable(100.0, 100.0, 90.0, 30.0, 0.2),
            stable(300.0, 100.0, 60.0, 20.0, 0.0),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].region.width(), 90.0);
        assert_eq!(merged[1].region.center().x, 300.0);
    }

    #[test]
    fn dark_plate_is_stable() {
        let mut img = RgbImage::from_pixel(640, 480, Rgb([170, 170, 170]));
        for y in 100..160 {
            for x in 300..500 {
                img.put_pixel(x, y, Rgb([40, 40, 40]));
            }
        }
        let candidates = detect(&img, &Config::default());
        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.detector, DetectorKind::Blob);
        assert!((c.region.center().x - 399.5).abs() < 1.0);
        assert!((c.region.center().y - 129.5).abs() < 1.0);
        assert!(c.detector_score > 0.9);
    }
}
