#![allow(dead_code)]

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use platescan::config::{Config, PlateColor, PlateFormat, Polarity};
use platescan::identify::{char_features, CHAR_FEATURE_LEN};
use platescan::judge::JUDGE_FEATURE_LEN;
use platescan::model::{Activation, Kernel, Layer, MlpModel, Models, SvmModel};

use std::sync::Arc;

pub const BACKGROUND: Rgb<u8> = Rgb([150, 150, 150]);
pub const PLATE_BLUE: Rgb<u8> = Rgb([20, 60, 200]);
pub const INK: Rgb<u8> = Rgb([250, 250, 250]);

/// pixels per font cell
pub const SCALE: u32 = 6;
pub const GLYPH_WIDTH: u32 = 5 * SCALE;
pub const GLYPH_HEIGHT: u32 = 7 * SCALE;
pub const GLYPH_GAP: u32 = 10;
pub const PLATE_WIDTH: u32 = 290;
pub const PLATE_HEIGHT: u32 = 76;

// 5x7 font, every row of every glyph carries ink
const FONT: [(char, [&str; 7]); 17] = [
    ('0', [".###.", "#...#", "#..##", "#.#.#", "##..#", "#...#", ".###."]),
    ('1', ["..#..", ".##..", "..#..", "..#..", "..#..", "..#..", ".###."]),
    ('2', [".###.", "#...#", "....#", "...#.", "..#..", ".#...", "#####"]),
    ('3', ["####.", "....#", "....#", ".###.", "....#", "....#", "####."]),
    ('4', ["...#.", "..##.", ".#.#.", "#..#.", "#####", "...#.", "...#."]),
    ('5', ["#####", "#....", "####.", "....#", "....#", "#...#", ".###."]),
    ('6', ["..##.", ".#...", "#....", "####.", "#...#", "#...#", ".###."]),
    ('7', ["#####", "....#", "...#.", "..#..", ".#...", ".#...", ".#..."]),
    ('8', [".###.", "#...#", "#...#", ".###.", "#...#", "#...#", ".###."]),
    ('9', [".###.", "#...#", "#...#", ".####", "....#", "...#.", ".##.."]),
    ('A', [".###.", "#...#", "#...#", "#####", "#...#", "#...#", "#...#"]),
    ('B', ["####.", "#...#", "#...#", "####.", "#...#", "#...#", "####."]),
    ('C', [".###.", "#...#", "#....", "#....", "#....", "#...#", ".###."]),
    ('D', ["###..", "#..#.", "#...#", "#...#", "#...#", "#..#.", "###.."]),
    ('E', ["#####", "#....", "#....", "####.", "#....", "#....", "#####"]),
    ('F', ["#####", "#....", "#....", "####.", "#....", "#....", "#...."]),
    ('H', ["#...#", "#...#", "#...#", "#####", "#...#", "#...#", "#...#"]),
];

fn glyph(symbol: char) -> &'static [&'static str; 7] {
    &FONT
        .iter()
        .find(|(c, _)| *c == symbol)
        .unwrap_or_else(|| panic!("no glyph for {:?}", symbol))
        .1
}

fn glyph_ink(symbol: char, x: u32, y: u32) -> bool {
    glyph(symbol)[(y / SCALE) as usize].as_bytes()[(x / SCALE) as usize] == b'#'
}

/// Binary rendering of a single glyph, ink is 255.
pub fn glyph_image(symbol: char) -> GrayImage {
    GrayImage::from_fn(GLYPH_WIDTH, GLYPH_HEIGHT, |x, y| {
        if glyph_ink(symbol, x, y) { Luma([255]) } else { Luma([0]) }
    })
}

/// Draws an upright blue plate with `text` whose top left corner is at
/// `origin`. Returns the plate center.
pub fn draw_plate(img: &mut RgbImage, origin: (u32, u32), text: &str) -> (f32, f32) {
    let (x0, y0) = origin;
    for y in y0..y0 + PLATE_HEIGHT {
        for x in x0..x0 + PLATE_WIDTH {
            img.put_pixel(x, y, PLATE_BLUE);
        }
    }

    let count = text.chars().count() as u32;
    let text_width = count * GLYPH_WIDTH + count.saturating_sub(1) * GLYPH_GAP;
    let left = x0 + (PLATE_WIDTH - text_width) / 2;
    let top = y0 + (PLATE_HEIGHT - GLYPH_HEIGHT) / 2;
    for (i, symbol) in text.chars().enumerate() {
        let gx = left + i as u32 * (GLYPH_WIDTH + GLYPH_GAP);
        for y in 0..GLYPH_HEIGHT {
            for x in 0..GLYPH_WIDTH {
                if glyph_ink(symbol, x, y) {
                    img.put_pixel(gx + x, top + y, INK);
                }
            }
        }
    }
    (x0 as f32 + (PLATE_WIDTH - 1) as f32 / 2.0, y0 as f32 + (PLATE_HEIGHT - 1) as f32 / 2.0)
}

/// 640x480 scene with a single plate, and the plate center.
pub fn scene(text: &str) -> (RgbImage, (f32, f32)) {
    let mut img = RgbImage::from_pixel(640, 480, BACKGROUND);
    let center = draw_plate(&mut img, (175, 202), text);
    (img, center)
}

/// `scene` turned by `degrees` about the image center.
pub fn rotated_scene(text: &str, degrees: f32) -> RgbImage {
    let (img, _) = scene(text);
    rotate_about_center(&img, degrees.to_radians(), Interpolation::Bilinear, BACKGROUND)
}

/// Judge accepting every candidate with the same score.
pub fn accepting_judge() -> SvmModel {
    SvmModel { feature_len: JUDGE_FEATURE_LEN, bias: 1.0, kernel: Kernel::Linear { weights: vec![0.0; JUDGE_FEATURE_LEN] } }
}

/// Nearest template classifier over the font: one output per glyph, the
/// cosine between the descriptor and the glyph's own descriptor.
pub fn template_classifier() -> MlpModel {
    let weights: Vec<Vec<f32>> = FONT
        .iter()
        .map(|(symbol, _)| {
            let f = char_features(&glyph_image(*symbol));
            let norm = f.iter().map(|v| v * v).sum::<f32>().sqrt();
            f.iter().map(|v| v / norm).collect()
        })
        .collect();
    MlpModel {
        feature_len: CHAR_FEATURE_LEN,
        classes: FONT.iter().map(|(c, _)| *c).collect(),
        layers: vec![Layer { biases: vec![0.0; weights.len()], weights, activation: Activation::Identity }],
    }
}

pub fn models() -> Arc<Models> {
    Arc::new(Models::new(accepting_judge(), template_classifier()).expect("test models are valid"))
}

/// Two letters followed by four digits.
pub fn latin_config() -> Config {
    let mut config = Config::default();
    config.max_results = 10;
    config.supported_plate_formats = vec![PlateFormat {
        name: "latin".to_string(),
        char_count: 6,
        region_char: false,
        color: PlateColor::Blue,
        polarity: Polarity::LightOnDark,
        letter_positions: vec![0, 1],
    }];
    config
}
