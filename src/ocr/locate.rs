//! Card panel localization.
//!
//! The card renders somewhere in the right-hand part of the page with a
//! distinct background color. We crop a search band, mask the card color,
//! and keep the largest outer contour. When nothing large enough shows up
//! we fall back to a fixed crop of the band.

use image::RgbaImage;
use imageproc::contours::find_contours;
use imageproc::point::Point;

use super::preprocess::{Roi, crop_roi, hue_mask};
use crate::config::ExtractorConfig;
use crate::log;

/// How the final region was chosen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RoiSource {
    /// Card-colored contour with this area (px²).
    Detected { area: f64 },
    /// No contour cleared the area threshold.
    Fallback,
}

/// Result of localization. `roi` is in the coordinates of the input image.
#[derive(Clone, Debug)]
pub struct Located {
    pub image: RgbaImage,
    pub roi: Roi,
    pub source: RoiSource,
}

/// Polygon area of a closed contour (shoelace formula).
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(a, b)| a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64)
        .sum();
    (twice as f64 / 2.0).abs()
}

/// Axis-aligned bounding box of a contour.
fn bounding_rect(points: &[Point<i32>]) -> Option<Roi> {
    let min_x = points.iter().map(|p| p.x).min()?;
    let max_x = points.iter().map(|p| p.x).max()?;
    let min_y = points.iter().map(|p| p.y).min()?;
    let max_y = points.iter().map(|p| p.y).max()?;
    Some(Roi {
        x: min_x.max(0) as u32,
        y: min_y.max(0) as u32,
        width: (max_x - min_x + 1) as u32,
        height: (max_y - min_y + 1) as u32,
    })
}

/// Finds the largest card-colored region in `band`, in band coordinates.
pub fn find_card_region(band: &RgbaImage, config: &ExtractorConfig) -> Option<(Roi, f64)> {
    let mask = hue_mask(band, &config.card_hue);

    let mut best: Option<(Roi, f64)> = None;
    // Top-level borders only. A region touching the band's left edge comes
    // back as a parentless `Hole`, so the border type is not checked.
    for contour in find_contours::<i32>(&mask) {
        if contour.parent.is_some() {
            continue;
        }
        let area = contour_area(&contour.points);
        let best_area = best.map(|(_, a)| a).unwrap_or(0.0);
        if area > best_area && area > config.min_region_area {
            if let Some(rect) = bounding_rect(&contour.points) {
                best = Some((rect, area));
            }
        }
    }

    best
}

/// Grows `rect` by `margin` on every side without leaving a `width`×`height` area.
fn expand(rect: Roi, margin: u32, width: u32, height: u32) -> Roi {
    let x = rect.x.saturating_sub(margin);
    let y = rect.y.saturating_sub(margin);
    Roi {
        x,
        y,
        width: (rect.width + 2 * margin).min(width - x),
        height: (rect.height + 2 * margin).min(height - y),
    }
}

/// Selects the card panel. Always returns a non-empty region for a non-empty image.
pub fn locate_card(img: &RgbaImage, config: &ExtractorConfig) -> Located {
    let (width, height) = img.dimensions();
    let band_roi = Roi::from_relative(width, height, &config.search_band).non_empty(width, height);
    let band = crop_roi(img, band_roi);
    let (band_w, band_h) = band.dimensions();

    let (local, source) = match find_card_region(&band, config) {
        Some((rect, area)) => {
            log(&format!(
                "Card region found at ({}, {}) {}x{}, area {:.0}",
                rect.x, rect.y, rect.width, rect.height, area
            ));
            (
                expand(rect, config.region_margin, band_w, band_h),
                RoiSource::Detected { area },
            )
        }
        None => {
            log("No card-colored region found, using fallback crop");
            let fallback = Roi::from_relative(band_w, band_h, &config.fallback_crop);
            let fallback = if fallback.is_empty() {
                Roi { x: 0, y: 0, width: band_w, height: band_h }
            } else {
                fallback
            };
            (fallback, RoiSource::Fallback)
        }
    };

    let roi = local
        .non_empty(band_w, band_h)
        .offset(band_roi.x, band_roi.y);

    Located {
        image: crop_roi(img, roi),
        roi,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelativeRect;
    use image::Rgba;

    const PAGE: Rgba<u8> = Rgba([245, 245, 245, 255]);
    const CARD: Rgba<u8> = Rgba([30, 160, 80, 255]);

    /// Band x 500..1000, y 0..200 on a 1000x400 page; fallback is the
    /// middle half of the band starting 1/8 down.
    fn test_config() -> ExtractorConfig {
        ExtractorConfig {
            search_band: RelativeRect { x: 0.5, y: 0.0, width: 0.5, height: 0.5 },
            fallback_crop: RelativeRect { x: 0.25, y: 0.125, width: 0.5, height: 0.5 },
            ..ExtractorConfig::default()
        }
    }

    /// 1000x400 page with a green card drawn at the given absolute rect.
    fn page_with_card(x: u32, y: u32, w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(1000, 400, |px, py| {
            if px >= x && px < x + w && py >= y && py < y + h {
                CARD
            } else {
                PAGE
            }
        })
    }

    #[test]
    fn test_contour_area_square() {
        let square = [
            Point::new(0, 0),
            Point::new(10, 0),
            Point::new(10, 10),
            Point::new(0, 10),
        ];
        assert_eq!(contour_area(&square), 100.0);
        assert_eq!(contour_area(&square[..2]), 0.0);
    }

    #[test]
    fn test_locate_detects_card_with_margin() {
        let img = page_with_card(700, 40, 200, 100);
        let located = locate_card(&img, &test_config());

        assert!(matches!(located.source, RoiSource::Detected { .. }));
        assert_eq!(located.roi, Roi { x: 690, y: 30, width: 220, height: 120 });
        assert_eq!(located.image.dimensions(), (220, 120));
        assert_eq!(*located.image.get_pixel(110, 60), CARD);
    }

    #[test]
    fn test_locate_margin_clamped_at_band_edge() {
        let img = page_with_card(500, 0, 100, 50);
        let located = locate_card(&img, &test_config());

        assert!(matches!(located.source, RoiSource::Detected { .. }));
        assert_eq!(located.roi.x, 500);
        assert_eq!(located.roi.y, 0);
        assert_eq!(located.roi.width, 120);
        assert_eq!(located.roi.height, 70);
    }

    #[test]
    fn test_locate_card_straddling_band_edge() {
        // Default band starts at x=600; the card spans 550..800
        let img = page_with_card(550, 20, 250, 100);
        let located = locate_card(&img, &ExtractorConfig::default());

        assert!(matches!(located.source, RoiSource::Detected { .. }));
        assert_eq!(located.roi, Roi { x: 600, y: 10, width: 220, height: 120 });
        assert_eq!(*located.image.get_pixel(0, 10), CARD);
    }

    #[test]
    fn test_locate_ignores_small_noise() {
        // 20x20 speck is below the 1000 px² threshold
        let img = page_with_card(700, 40, 20, 20);
        let located = locate_card(&img, &test_config());

        assert_eq!(located.source, RoiSource::Fallback);
    }

    #[test]
    fn test_locate_fallback_crop() {
        let img = RgbaImage::from_pixel(1000, 400, PAGE);
        let located = locate_card(&img, &test_config());

        assert_eq!(located.source, RoiSource::Fallback);
        assert_eq!(located.roi, Roi { x: 625, y: 25, width: 250, height: 100 });
    }

    #[test]
    fn test_locate_picks_largest_region() {
        let mut img = page_with_card(620, 10, 60, 40);
        for y in 60..160 {
            for x in 750..950 {
                img.put_pixel(x, y, CARD);
            }
        }
        let located = locate_card(&img, &test_config());

        assert_eq!(located.roi, Roi { x: 740, y: 50, width: 220, height: 120 });
    }

    #[test]
    fn test_locate_tiny_image_never_empty() {
        let img = RgbaImage::from_pixel(1, 1, PAGE);
        let located = locate_card(&img, &ExtractorConfig::default());

        assert!(!located.roi.is_empty());
        assert_eq!(located.image.dimensions(), (1, 1));
    }
}
