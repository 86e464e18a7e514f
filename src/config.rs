use serde::{Deserialize, Serialize};

use std::fs;
use std::path::Path;

use crate::error::LprError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    Color,
    Edge,
    Blob,
}

/// Plate background colour, as searched by the colour detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateColor {
    Blue,
    Yellow,
    White,
    Unknown,
}

impl PlateColor {
    /// hue range in degrees, inclusive
    pub fn hue_range(&self) -> Option<(f32, f32)> {
        match self {
            PlateColor::Blue => Some((200.0, 255.0)),
            PlateColor::Yellow => Some((30.0, 70.0)),
            PlateColor::White | PlateColor::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// light characters on a dark background
    LightOnDark,
    /// dark characters on a light background
    DarkOnLight,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateFormat {
    pub name: String,
    pub char_count: usize,
    /// leftmost character is a region glyph
    pub region_char: bool,
    pub color: PlateColor,
    pub polarity: Polarity,
    /// body positions restricted to letters
    #[serde(default)]
    pub letter_positions: Vec<usize>,
}

impl PlateFormat {
    pub fn blue() -> Self {
        Self {
            name: "blue".to_string(),
            char_count: 7,
            region_char: true,
            color: PlateColor::Blue,
            polarity: Polarity::LightOnDark,
            letter_positions: vec![0],
        }
    }

    pub fn yellow() -> Self {
        Self {
            name: "yellow".to_string(),
            char_count: 7,
            region_char: true,
            color: PlateColor::Yellow,
            polarity: Polarity::DarkOnLight,
            letter_positions: vec![0],
        }
    }

    pub fn latin() -> Self {
        Self {
            name: "latin".to_string(),
            char_count: 6,
            region_char: false,
            color: PlateColor::Blue,
            polarity: Polarity::LightOnDark,
            letter_positions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeParams {
    /// canonical plate size
    pub width: u32,
    pub height: u32,
    /// regions tilted further than this (degrees) are dropped
    pub max_tilt: f32,
    /// shortest side accepted, in source pixels
    pub min_side: f32,
    /// optional tighter aspect range checked after orientation
    pub tight_aspect: Option<(f32, f32)>,
}

impl Default for NormalizeParams {
    fn default() -> Self {
        Self { width: 136, height: 36, max_tilt: 60.0, min_side: 4.0, tight_aspect: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    /// outer margin cleared on each side, relative to the plate size
    pub margin_x_ratio: f32,
    pub margin_y_ratio: f32,
    /// rows with fewer background/ink transitions are rivets or borders
    pub min_row_jumps: usize,
    /// columns at or below this share of the tallest column count as gaps
    pub noise_floor_ratio: f32,
    pub min_char_width_ratio: f32,
    pub max_char_width_ratio: f32,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            margin_x_ratio: 0.03,
            margin_y_ratio: 0.05,
            min_row_jumps: 5,
            noise_floor_ratio: 0.1,
            min_char_width_ratio: 0.03,
            max_char_width_ratio: 0.16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub max_results: usize,
    pub detector_mask: Vec<DetectorKind>,
    /// minimal candidate area in pixels for a 640x480 image, scaled by image area
    pub min_candidate_area: f32,
    pub min_candidate_aspect: f32,
    pub max_candidate_aspect: f32,
    pub judge_threshold: f32,
    /// candidates overlapping more than this are merged, keeping the higher score
    pub overlap_threshold: f32,
    /// worker threads, number of cores when unset
    pub workers: Option<usize>,
    pub supported_plate_formats: Vec<PlateFormat>,
    pub normalize: NormalizeParams,
    pub segment: SegmentParams,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_results: 4,
            detector_mask: vec![DetectorKind::Color, DetectorKind::Edge, DetectorKind::Blob],
            min_candidate_area: 400.0,
            min_candidate_aspect: 2.0,
            max_candidate_aspect: 5.5,
            judge_threshold: 0.0,
            overlap_threshold: 0.5,
            workers: None,
            supported_plate_formats: vec![PlateFormat::blue(), PlateFormat::yellow(), PlateFormat::latin()],
            normalize: NormalizeParams::default(),
            segment: SegmentParams::default(),
        }
    }
}

impl Config {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, LprError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, LprError> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LprError> {
        if self.detector_mask.is_empty() {
            return Err(LprError::config("detector_mask enables no detector"));
        }
        if !(self.min_candidate_aspect > 0.0 && self.min_candidate_aspect < self.max_candidate_aspect) {
            return Err(LprError::config(format!(
                "candidate aspect range [{}, {}] is empty",
                self.min_candidate_aspect, self.max_candidate_aspect
            )));
        }
        if self.supported_plate_formats.is_empty() {
            return Err(LprError::config("no plate format configured"));
        }
        if let Some(format) = self.supported_plate_formats.iter().find(|f| f.char_count == 0) {
            return Err(LprError::config(format!("plate format {} expects no characters", format.name)));
        }
        if self.normalize.width == 0 || self.normalize.height == 0 {
            return Err(LprError::config("canonical plate size must be non zero"));
        }
        let seg = &self.segment;
        if seg.min_char_width_ratio >= seg.max_char_width_ratio {
            return Err(LprError::config("character width range is empty"));
        }
        if self.workers == Some(0) {
            return Err(LprError::config("workers must be at least 1"));
        }
        Ok(())
    }

    /// Minimal area for an image of the given size.
    pub fn scaled_min_area(&self, width: u32, height: u32) -> f32 {
        self.min_candidate_area * (width as f32 * height as f32) / (640.0 * 480.0)
    }
}
