//! Character classification.

use image::imageops::{self, FilterType};
use image::GrayImage;
use tracing::trace;

use crate::alphabet::{self, SymbolClass};
use crate::model::MlpModel;
use crate::segment::{CharacterImage, Segmentation};
use crate::utils;

/// Side of the square a character is rescaled to.
pub const CHAR_SIZE: u32 = 20;
const LOW_RES: u32 = 10;
/// vertical and horizontal projections plus a low resolution copy
pub const CHAR_FEATURE_LEN: usize = 2 * CHAR_SIZE as usize + (LOW_RES * LOW_RES) as usize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassifiedChar {
    pub symbol: char,
    /// softmax share of the winning class among the allowed ones
    pub confidence: f32,
}

pub struct CharsIdentify<'a> {
    model: &'a MlpModel,
}

impl<'a> CharsIdentify<'a> {
    pub fn new(model: &'a MlpModel) -> Self {
        Self { model }
    }

    /// Best class among `allowed`, `None` when the model knows none of them.
    pub fn classify(&self, image: &GrayImage, allowed: &[SymbolClass]) -> Option<ClassifiedChar> {
        let outputs = self.model.forward(&char_features(image));
        let (indices, scores): (Vec<usize>, Vec<f32>) = self
            .model
            .classes
            .iter()
            .zip(outputs)
            .enumerate()
            .filter(|(_, (c, _))| SymbolClass::of(**c).map_or(false, |class| allowed.contains(&class)))
            .map(|(i, (_, score))| (i, score))
            .unzip();

        let (best, _) = utils::argmax(&scores)?;
        let max = scores[best];
        let total: f32 = scores.iter().map(|s| (s - max).exp()).sum();
        Some(ClassifiedChar { symbol: self.model.classes[indices[best]], confidence: 1.0 / total })
    }

    /// Classifies every character of a segmented plate, restricting each
    /// position to the classes its format allows.
    pub fn classify_plate(&self, segmentation: &Segmentation) -> Option<Vec<ClassifiedChar>> {
        let format = segmentation.format;
        let body_offset = usize::from(format.region_char);
        segmentation
            .chars
            .iter()
            .map(|ch: &CharacterImage| {
                let body_index = ch.index.saturating_sub(body_offset);
                let allowed = alphabet::allowed_classes(ch.is_region_char, body_index, &format.letter_positions);
                let result = self.classify(&ch.image, allowed);
                if result.is_none() {
                    trace!(index = ch.index, "no admissible class for position");
                }
                result
            })
            .collect()
    }
}

/// Descriptor of a binary character image: the ink is centred in a square,
/// rescaled to `CHAR_SIZE` and summarised by its normalized projections and a
/// low resolution copy.
pub fn char_features(image: &GrayImage) -> Vec<f32> {
    let mut features = Vec::with_capacity(CHAR_FEATURE_LEN);
    let (x, y, w, h) = match utils::ink_bounds(image) {
        Some(bounds) => bounds,
        None => {
            features.resize(CHAR_FEATURE_LEN, 0.0);
            return features;
        }
    };

    let ink = imageops::crop_imm(image, x, y, w, h).to_image();
    let side = w.max(h);
    let mut square = GrayImage::new(side, side);
    imageops::overlay(&mut square, &ink, ((side - w) / 2) as i64, ((side - h) / 2) as i64);
    let resized = imageops::resize(&square, CHAR_SIZE, CHAR_SIZE, FilterType::Triangle);

    let columns: Vec<f32> = (0..CHAR_SIZE)
        .map(|x| (0..CHAR_SIZE).map(|y| resized.get_pixel(x, y)[0] as f32).sum())
        .collect();
    let rows: Vec<f32> = (0..CHAR_SIZE)
        .map(|y| (0..CHAR_SIZE).map(|x| resized.get_pixel(x, y)[0] as f32).sum())
        .collect();
    for profile in [columns, rows] {
        let max = profile.iter().copied().fold(0.0, f32::max);
        features.extend(profile.iter().map(|v| if max > 0.0 { v / max } else { 0.0 }));
    }

    let low = imageops::resize(&resized, LOW_RES, LOW_RES, FilterType::Triangle);
    features.extend(low.pixels().map(|p| p[0] as f32 / 255.0));
    features
}
