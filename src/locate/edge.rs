use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::{self, Mask};
use imageproc::{contrast, filter, gradients};

use super::{make_candidate, mask_regions, Candidate};
use crate::config::{Config, DetectorKind, PlateColor};
use crate::geometry::RotatedRegion;

const BLUR_SIGMA: f32 = 1.5;
// flat closing element, bridges the gaps between characters without
// joining text rows above and below
const CLOSE_WIDTH: u32 = 21;
const CLOSE_HEIGHT: u32 = 3;
// characters cover about two thirds of the plate height
const BAND_GROWTH: f32 = 1.5;

/// Plates are dense in vertical strokes: threshold the horizontal gradient,
/// close the gaps between strokes and keep plate shaped blobs.
pub fn detect(img: &RgbImage, config: &Config) -> Vec<Candidate> {
    let mask = vertical_edges(img);
    let closed = morphology::grayscale_close(&mask, &closing_mask());
    let opened = morphology::open(&closed, Norm::LInf, 1);
    mask_regions(&opened)
        .into_iter()
        .filter_map(|(band, fill)| {
            let region = plate_around(&band)?;
            make_candidate(img, region, DetectorKind::Edge, fill, PlateColor::Unknown, config)
        })
        .collect()
}

fn closing_mask() -> Mask {
    let element = GrayImage::from_pixel(CLOSE_WIDTH, CLOSE_HEIGHT, Luma([255]));
    Mask::from_image(&element, (CLOSE_WIDTH / 2) as u8, (CLOSE_HEIGHT / 2) as u8)
}

/// Plate region around a band of character strokes.
pub fn plate_around(band: &RotatedRegion) -> Option<RotatedRegion> {
    let band = band.long_axis();
    RotatedRegion::new(band.center(), band.width(), band.height() * BAND_GROWTH, band.angle())
}

/// Binary map of strong vertical strokes.
pub fn vertical_edges(img: &RgbImage) -> GrayImage {
    let gray = image::imageops::grayscale(img);
    let blurred = filter::gaussian_blur_f32(&gray, BLUR_SIGMA);
    let sobel = gradients::horizontal_sobel(&blurred);

    let mut magnitude = GrayImage::new(gray.width(), gray.height());
    for (x, y, g) in sobel.enumerate_pixels() {
        let v = (g[0] as i32).abs() / 4;
        magnitude.put_pixel(x, y, Luma([v.min(255) as u8]));
    }

    let level = contrast::otsu_level(&magnitude);
    let mut mask = GrayImage::new(gray.width(), gray.height());
    for (x, y, p) in magnitude.enumerate_pixels() {
        if p[0] > level {
            mask.put_pixel(x, y, Luma([255]));
        }
    }
    mask
}
