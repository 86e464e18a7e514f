//! Character segmentation of canonical plates.
//!
//! The plate is binarized for the polarity of a format, margins and rivet
//! rows are cleared, then characters are cut at the valleys of the column
//! ink projection. Fragments are merged and touching characters split until
//! the span count matches a supported format.

use image::{imageops, GrayImage, Luma};
use tracing::trace;

use std::collections::HashMap;

use crate::config::{PlateColor, PlateFormat, Polarity, SegmentParams};
use crate::normalize::CanonicalPlate;
use crate::utils;

/// Pixel box inside the canonical plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct CharacterImage {
    /// binary crop, ink is 255
    pub image: GrayImage,
    pub bbox: CharBox,
    /// left to right position
    pub index: usize,
    pub is_region_char: bool,
}

#[derive(Debug, Clone)]
pub struct Segmentation<'f> {
    pub format: &'f PlateFormat,
    pub chars: Vec<CharacterImage>,
}

/// Column range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    fn width(&self) -> u32 {
        self.end - self.start
    }
}

pub struct CharsSegmenter<'a> {
    params: &'a SegmentParams,
    formats: &'a [PlateFormat],
}

impl<'a> CharsSegmenter<'a> {
    pub fn new(params: &'a SegmentParams, formats: &'a [PlateFormat]) -> Self {
        Self { params, formats }
    }

    /// Tries formats matching the detected plate colour first. `None` when no
    /// format yields its expected character count.
    pub fn segment(&self, plate: &CanonicalPlate, color: PlateColor) -> Option<Segmentation<'a>> {
        let gray = imageops::grayscale(&plate.image);
        let mut ordered: Vec<&'a PlateFormat> = self.formats.iter().filter(|f| f.color == color).collect();
        ordered.extend(self.formats.iter().filter(|f| f.color != color));

        let mut cleaned: HashMap<Polarity, GrayImage> = HashMap::new();
        for format in ordered {
            let binary = cleaned
                .entry(format.polarity)
                .or_insert_with(|| self.clean(&gray, format.polarity));
            let spans = self.find_spans(binary, format.char_count);
            if spans.len() != format.char_count {
                trace!(format = %format.name, found = spans.len(), "span count mismatch");
                continue;
            }
            let chars = spans
                .iter()
                .enumerate()
                .filter_map(|(index, span)| {
                    let (image, bbox) = cut(binary, span)?;
                    Some(CharacterImage { image, bbox, index, is_region_char: format.region_char && index == 0 })
                })
                .collect::<Vec<_>>();
            if chars.len() == format.char_count {
                return Some(Segmentation { format, chars });
            }
        }
        None
    }

    /// Binarizes for `polarity`, clears the outer margin and rows crossed by
    /// too few strokes (borders, rivets, seams).
    pub fn clean(&self, gray: &GrayImage, polarity: Polarity) -> GrayImage {
        let mut binary = utils::binarize(gray, polarity);
        let (width, height) = binary.dimensions();
        let mx = (self.params.margin_x_ratio * width as f32).round() as u32;
        let my = (self.params.margin_y_ratio * height as f32).round() as u32;

        for y in 0..height {
            let mut jumps = 0;
            let mut previous = 0u8;
            for x in 0..width {
                if x < mx || x >= width.saturating_sub(mx) || y < my || y >= height.saturating_sub(my) {
                    binary.put_pixel(x, y, Luma([0]));
                }
                let v = binary.get_pixel(x, y)[0];
                if v > 0 && previous == 0 {
                    jumps += 1;
                }
                previous = v;
            }
            if jumps < self.params.min_row_jumps {
                for x in 0..width {
                    binary.put_pixel(x, y, Luma([0]));
                }
            }
        }
        binary
    }

    /// Column spans of the characters, after merge, split and trimming of
    /// weak edge spans down to `expected`.
    pub fn find_spans(&self, binary: &GrayImage, expected: usize) -> Vec<Span> {
        let width = binary.width();
        let projection = column_projection(binary);
        let max = projection.iter().copied().max().unwrap_or(0);
        if max == 0 {
            return Vec::new();
        }
        let floor = (self.params.noise_floor_ratio * max as f32) as u32;

        let mut spans = Vec::new();
        let mut start: Option<u32> = None;
        for x in 0..width {
            let ink = projection[x as usize] > floor;
            match (ink, start) {
                (true, None) => start = Some(x),
                (false, Some(s)) => {
                    spans.push(Span { start: s, end: x });
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            spans.push(Span { start: s, end: width });
        }

        let min_width = (self.params.min_char_width_ratio * width as f32).ceil() as u32;
        let max_width = (self.params.max_char_width_ratio * width as f32).floor() as u32;
        let spans = merge_narrow(spans, min_width, max_width);
        let spans = split_wide(spans, &projection, min_width, max_width);
        trim_weak_edges(spans, &projection, expected)
    }
}

fn column_projection(binary: &GrayImage) -> Vec<u32> {
    let (width, height) = binary.dimensions();
    (0..width)
        .map(|x| (0..height).filter(|y| binary.get_pixel(x, *y)[0] > 0).count() as u32)
        .collect()
}

/// Joins spans narrower than `min_width` with the closer neighbour when the
/// union still fits `max_width`, otherwise drops them as noise.
fn merge_narrow(mut spans: Vec<Span>, min_width: u32, max_width: u32) -> Vec<Span> {
    loop {
        let narrowest = spans
            .iter()
            .enumerate()
            .filter(|(_, s)| s.width() < min_width)
            .min_by_key(|(_, s)| s.width())
            .map(|(i, _)| i);
        let i = match narrowest {
            Some(i) => i,
            None => return spans,
        };

        let span = spans[i];
        let left = if i > 0 { Some((i - 1, span.start - spans[i - 1].end)) } else { None };
        let right = spans.get(i + 1).map(|r| (i + 1, r.start - span.end));
        let mut options: Vec<(usize, u32)> = left.into_iter().chain(right).collect();
        options.sort_by_key(|(_, gap)| *gap);

        let target = options.into_iter().map(|(j, _)| j).find(|j| {
            let other = spans[*j];
            other.end.max(span.end) - other.start.min(span.start) <= max_width
        });
        match target {
            Some(j) => {
                let other = spans[j];
                spans[j] = Span { start: other.start.min(span.start), end: other.end.max(span.end) };
                spans.remove(i);
            }
            None => {
                spans.remove(i);
            }
        }
    }
}

/// Splits spans wider than `max_width` at their deepest interior valley.
fn split_wide(spans: Vec<Span>, projection: &[u32], min_width: u32, max_width: u32) -> Vec<Span> {
    let mut out = Vec::with_capacity(spans.len());
    let mut work: Vec<Span> = spans.into_iter().rev().collect();
    while let Some(span) = work.pop() {
        if span.width() <= max_width || span.width() < 2 * min_width + 1 {
            out.push(span);
            continue;
        }
        let middle = (span.start + span.end) as f32 / 2.0;
        let cut = (span.start + min_width..span.end - min_width).min_by(|a, b| {
            projection[*a as usize]
                .cmp(&projection[*b as usize])
                .then(((*a as f32 - middle).abs()).total_cmp(&(*b as f32 - middle).abs()))
        });
        match cut {
            Some(cut) => {
                // right half first so the left one is processed next
                work.push(Span { start: cut + 1, end: span.end });
                work.push(Span { start: span.start, end: cut });
            }
            None => out.push(span),
        }
    }
    out
}

/// Drops outermost spans carrying much less ink than the median span while
/// there are more spans than `expected`.
fn trim_weak_edges(mut spans: Vec<Span>, projection: &[u32], expected: usize) -> Vec<Span> {
    let mass = |s: &Span| projection[s.start as usize..s.end as usize].iter().sum::<u32>();
    while spans.len() > expected {
        let mut masses: Vec<u32> = spans.iter().map(mass).collect();
        masses.sort_unstable();
        let median = masses[masses.len() / 2] as f32;
        let first = mass(&spans[0]) as f32;
        let last = mass(&spans[spans.len() - 1]) as f32;
        if first.min(last) >= 0.5 * median {
            break;
        }
        if first <= last {
            spans.remove(0);
        } else {
            spans.pop();
        }
    }
    spans
}

/// Crops the span, tightened to the rows holding ink.
fn cut(binary: &GrayImage, span: &Span) -> Option<(GrayImage, CharBox)> {
    let column = imageops::crop_imm(binary, span.start, 0, span.width(), binary.height()).to_image();
    let (_, y, _, height) = utils::ink_bounds(&column)?;
    let image = imageops::crop_imm(&column, 0, y, span.width(), height).to_image();
    Some((image, CharBox { x: span.start, y, width: span.width(), height }))
}
