//! Rectification of accepted regions into the canonical plate frame.

use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use tracing::trace;

use crate::config::NormalizeParams;
use crate::geometry::RotatedRegion;

/// Fixed resolution, upright plate image.
#[derive(Debug, Clone)]
pub struct CanonicalPlate {
    pub image: RgbImage,
    pub source: RotatedRegion,
}

pub struct Normalizer<'a> {
    params: &'a NormalizeParams,
}

impl<'a> Normalizer<'a> {
    pub fn new(params: &'a NormalizeParams) -> Self {
        Self { params }
    }

    /// Maps the region corners onto the canonical frame and resamples
    /// bilinearly. Degenerate, over-tilted or singular regions give `None`.
    pub fn normalize(&self, img: &RgbImage, region: &RotatedRegion) -> Option<CanonicalPlate> {
        let oriented = region.long_axis();
        if oriented.height() < self.params.min_side || oriented.width() < self.params.min_side {
            trace!(?region, "region too thin to rectify");
            return None;
        }
        if oriented.angle().abs() > self.params.max_tilt {
            trace!(angle = oriented.angle(), "region tilted too far");
            return None;
        }
        if let Some((min, max)) = self.params.tight_aspect {
            let aspect = oriented.width() / oriented.height();
            if aspect < min || aspect > max {
                trace!(aspect, "aspect outside tight range");
                return None;
            }
        }

        let (w, h) = (self.params.width as f32, self.params.height as f32);
        let [bl, tl, tr, br] = oriented.corners();
        let from = [(tl.x, tl.y), (tr.x, tr.y), (br.x, br.y), (bl.x, bl.y)];
        let to = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];
        let projection = Projection::from_control_points(from, to)?;

        let mut image = RgbImage::new(self.params.width, self.params.height);
        warp_into(img, &projection, Interpolation::Bilinear, Rgb([0, 0, 0]), &mut image);
        Some(CanonicalPlate { image, source: *region })
    }
}
