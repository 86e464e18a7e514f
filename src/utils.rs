use image::{GrayImage, Luma, RgbImage};
use imageproc::contrast;

use crate::config::Polarity;
use crate::geometry::Rect;

/// Index and value of the largest element, first one on ties.
pub fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values.iter().copied().enumerate().fold(None, |best, (i, v)| match best {
        Some((_, max)) if v <= max => best,
        _ => Some((i, v)),
    })
}

/// Histogram equalization of a gray image.
pub fn equalize_hist(img: &GrayImage) -> GrayImage {
    let len = img.as_raw().len();
    if len == 0 {
        return img.clone();
    }
    // 分布函数
    let mut df = [0usize; 256];
    for v in img.as_raw() {
        df[*v as usize] += 1;
    }
    // cdf
    let mut temp = df[0];
    df.iter_mut().skip(1).for_each(|v| {
        *v += temp;
        temp = *v;
    });
    let cdf_min = df.iter().copied().find(|v| *v != 0).unwrap_or(0);
    if len == cdf_min {
        return img.clone();
    }
    let mut out = img.clone();
    out.iter_mut().for_each(|v| {
        let x = df[*v as usize] - cdf_min;
        let y = len - cdf_min;
        *v = ((x as f32 / y as f32) * 255.0).round() as u8;
    });
    out
}

/// Otsu binarization, ink pixels become 255.
pub fn binarize(gray: &GrayImage, polarity: Polarity) -> GrayImage {
    let level = contrast::otsu_level(gray);
    let mut out = GrayImage::new(gray.width(), gray.height());
    for (x, y, p) in gray.enumerate_pixels() {
        let ink = match polarity {
            Polarity::LightOnDark => p[0] > level,
            Polarity::DarkOnLight => p[0] <= level,
        };
        if ink {
            out.put_pixel(x, y, Luma([255]));
        }
    }
    out
}

/// Crops `rect` out of `img`, clamped to the image. `None` when nothing is left.
pub fn crop_rgb(img: &RgbImage, rect: &Rect) -> Option<RgbImage> {
    let x0 = rect.x.floor().max(0.0) as u32;
    let y0 = rect.y.floor().max(0.0) as u32;
    let x1 = ((rect.x + rect.width).ceil().max(0.0) as u32).min(img.width());
    let y1 = ((rect.y + rect.height).ceil().max(0.0) as u32).min(img.height());
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(image::imageops::crop_imm(img, x0, y0, x1 - x0, y1 - y0).to_image())
}

/// Bounding box (x, y, width, height) of the non zero pixels.
pub fn ink_bounds(img: &GrayImage) -> Option<(u32, u32, u32, u32)> {
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0, 0);
    for (x, y, p) in img.enumerate_pixels() {
        if p[0] > 0 {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }
    if min_x == u32::MAX {
        return None;
    }
    Some((min_x, min_y, max_x - min_x + 1, max_y - min_y + 1))
}
