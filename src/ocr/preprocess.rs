use image::{GrayImage, Luma, RgbaImage};
use imageproc::contrast::otsu_level;
use imageproc::filter::gaussian_blur_f32;

use crate::config::{HsvRange, RelativeRect};

/// An absolute pixel rectangle inside an image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    /// Converts a relative rect (0.0–1.0) to pixels, clamped to `width`×`height`.
    pub fn from_relative(width: u32, height: u32, region: &RelativeRect) -> Self {
        let x = ((region.x * width as f32) as u32).min(width);
        let y = ((region.y * height as f32) as u32).min(height);
        let rw = ((region.width * width as f32) as u32).min(width - x);
        let rh = ((region.height * height as f32) as u32).min(height - y);
        Self { x, y, width: rw, height: rh }
    }

    /// Moves the rect by `(dx, dy)`.
    pub fn offset(self, dx: u32, dy: u32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..self }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Grows an empty rect to at least 1×1 while staying inside `width`×`height`.
    ///
    /// Images with a zero dimension are returned unchanged.
    pub fn non_empty(self, width: u32, height: u32) -> Self {
        if width == 0 || height == 0 {
            return self;
        }
        let x = self.x.min(width - 1);
        let y = self.y.min(height - 1);
        Self {
            x,
            y,
            width: self.width.clamp(1, width - x),
            height: self.height.clamp(1, height - y),
        }
    }
}

/// Crops an absolute rect, clamped to the image bounds.
///
/// Relative regions go through [`Roi::from_relative`] first.
pub fn crop_roi(img: &RgbaImage, roi: Roi) -> RgbaImage {
    image::imageops::crop_imm(img, roi.x, roi.y, roi.width, roi.height).to_image()
}

/// Multiplies every color channel by `gain`, saturating at 255. Alpha is kept.
pub fn scale_contrast(img: &RgbaImage, gain: f32) -> RgbaImage {
    let mut output = img.clone();
    for pixel in output.pixels_mut() {
        for channel in pixel.0.iter_mut().take(3) {
            *channel = (*channel as f32 * gain).round().clamp(0.0, 255.0) as u8;
        }
    }
    output
}

/// Converts to grayscale with the ITU-R BT.601 luma weights.
pub fn to_grayscale(img: &RgbaImage) -> GrayImage {
    let (width, height) = img.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let p = img.get_pixel(x, y);
        let luma = 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32;
        Luma([luma.round().clamp(0.0, 255.0) as u8])
    })
}

/// Gaussian sigma matching a square neighbourhood of `block_size` pixels.
fn block_sigma(block_size: u32) -> f32 {
    let sigma = 0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8;
    sigma.max(0.5)
}

/// Binarizes against a Gaussian-weighted local mean.
///
/// A pixel becomes white (255) when it is brighter than its neighbourhood
/// mean minus `offset`, black (0) otherwise. Dark text on a light card
/// comes out black.
pub fn adaptive_binarize(gray: &GrayImage, block_size: u32, offset: i16) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, block_sigma(block_size));
    let (width, height) = gray.dimensions();

    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y)[0] as i16;
        let threshold = local_mean.get_pixel(x, y)[0] as i16 - offset;
        if value > threshold { Luma([255]) } else { Luma([0]) }
    })
}

/// Binarizes with a single global threshold chosen by Otsu's method.
pub fn otsu_binarize(gray: &GrayImage) -> GrayImage {
    let level = otsu_level(gray);
    let (width, height) = gray.dimensions();

    GrayImage::from_fn(width, height, |x, y| {
        if gray.get_pixel(x, y)[0] > level {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Converts RGB to HSV on the OpenCV 8-bit scale (H 0..180, S and V 0..255).
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let s = if max == 0.0 { 0.0 } else { delta / max * 255.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h / 2.0).round().min(179.0) as u8,
        s.round() as u8,
        max as u8,
    ]
}

/// Produces a mask that is 255 where the pixel's HSV value lies in `range`.
pub fn hue_mask(img: &RgbaImage, range: &HsvRange) -> GrayImage {
    let (width, height) = img.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let p = img.get_pixel(x, y);
        if range.contains(rgb_to_hsv(p[0], p[1], p[2])) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}
