//! Color/tone adjustment pipeline.
//!
//! Stages always run in this order, each one reading the previous stage's
//! output:
//!
//! 1. contrast then brightness (multiplicative)
//! 2. warmth (red/blue balance)
//! 3. hue rotation and saturation, in HSV with a halved hue circle
//! 4. tint overlay (magenta or green)
//! 5. black point lift
//!
//! Channel values are clipped to [0, 255] at every stage boundary. Stages 1-2
//! and 4 compute in single precision and truncate back to 8 bits.

use image::{Rgb, RgbImage};

use crate::models::settings::EditSettings;
use crate::services::hsv::{self, HUE_RANGE};

const RED: usize = 0;
const BLUE: usize = 2;

const MAGENTA: [f32; 3] = [255.0, 0.0, 255.0];
const GREEN: [f32; 3] = [0.0, 255.0, 0.0];

/// Apply resolved edit settings to an image, returning a new image of the same size.
pub fn apply_settings(image: &RgbImage, settings: &EditSettings) -> RgbImage {
    let mut out = image.clone();

    scale_and_warm(&mut out, settings.contrast, settings.brightness, settings.warmth);

    if settings.saturation != 1.0 || settings.hue != 0.0 {
        shift_hue_saturation(&mut out, settings.hue, settings.saturation);
    }

    if settings.tint != 0.0 {
        apply_tint(&mut out, settings.tint);
    }

    if settings.black_point > 0.0 {
        lift_black_point(&mut out, settings.black_point);
    }

    out
}

/// Stages 1 and 2. Both work on float channels and share one truncation.
fn scale_and_warm(image: &mut RgbImage, contrast: f64, brightness: f64, warmth: f64) {
    let contrast = contrast as f32;
    let brightness = brightness as f32;
    let warm_scales = warmth_scales(warmth);

    for Rgb(px) in image.pixels_mut() {
        let mut channels = px.map(|c| clip(c as f32 * contrast * brightness));

        if let Some((red_scale, blue_scale)) = warm_scales {
            channels[RED] = clip(channels[RED] * red_scale);
            channels[BLUE] = clip(channels[BLUE] * blue_scale);
        }

        *px = channels.map(|c| c as u8);
    }
}

/// Red and blue multipliers for a warmth value, or `None` when warmth is off.
///
/// Positive warmth boosts red by 30% of the factor and cuts blue by 20%;
/// negative warmth mirrors that onto blue/red.
fn warmth_scales(warmth: f64) -> Option<(f32, f32)> {
    if warmth == 0.0 {
        return None;
    }

    let factor = warmth / 100.0;
    let boost = (1.0 + factor.abs() * 0.3) as f32;
    let cut = (1.0 - factor.abs() * 0.2) as f32;

    if factor > 0.0 {
        Some((boost, cut))
    } else {
        Some((cut, boost))
    }
}

/// Stage 3. `hue_degrees` is on the usual 360° circle and halved here.
fn shift_hue_saturation(image: &mut RgbImage, hue_degrees: f64, saturation: f64) {
    let hue_shift = (hue_degrees / 2.0) as f32;
    let saturation = saturation as f32;

    for Rgb(px) in image.pixels_mut() {
        let [h, s, v] = hsv::rgb_to_hsv(*px);
        let mut h = h as f32;
        let mut s = s as f32;

        if hue_degrees != 0.0 {
            h = (h + hue_shift).rem_euclid(HUE_RANGE);
        }
        if saturation != 1.0 {
            s = clip(s * saturation);
        }

        *px = hsv::hsv_to_rgb([clip(h) as u8, clip(s) as u8, v]);
    }
}

/// Stage 4. Blend towards magenta for positive tint, green for negative.
fn apply_tint(image: &mut RgbImage, tint: f64) {
    let alpha = (tint.abs() / 180.0) * 0.25;
    let keep = (1.0 - alpha) as f32;
    let alpha = alpha as f32;
    let overlay = if tint > 0.0 { MAGENTA } else { GREEN };

    for Rgb(px) in image.pixels_mut() {
        for (c, o) in px.iter_mut().zip(overlay) {
            *c = clip(*c as f32 * keep + o * alpha) as u8;
        }
    }
}

/// Stage 5. Every channel below the threshold is raised to it.
fn lift_black_point(image: &mut RgbImage, black_point: f64) {
    let lut = black_point_lut(black_point);
    for Rgb(px) in image.pixels_mut() {
        *px = px.map(|c| lut[c as usize]);
    }
}

/// Threshold for a 0-100 black point, capped at 255.
pub fn black_point_threshold(black_point: f64) -> u8 {
    (black_point * 2.55).clamp(0.0, 255.0) as u8
}

fn black_point_lut(black_point: f64) -> [u8; 256] {
    let threshold = black_point_threshold(black_point);
    std::array::from_fn(|i| (i as u8).max(threshold))
}

fn clip(value: f32) -> f32 {
    value.clamp(0.0, 255.0)
}
