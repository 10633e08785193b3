//! Audit band burned into the bottom of evidence photos.

use ab_glyph::{FontArc, PxScale};
use chrono::NaiveDateTime;
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};

const REFERENCE_HEIGHT: f32 = 1200.0;
const BAND_ALPHA: u32 = 200;
const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

pub struct OverlayInfo<'a> {
    pub employee_name: &'a str,
    pub timestamp: NaiveDateTime,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<&'a str>,
    pub device: &'a str,
}

/// Pixel metrics for one image, scaled from a 1200px-tall reference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayLayout {
    pub font_px: f32,
    pub line_gap: u32,
    pub padding_y: u32,
    pub padding_x: u32,
    pub value_x: u32,
}

impl OverlayLayout {
    pub fn for_height(height: u32) -> Self {
        let scale = (height as f32 / REFERENCE_HEIGHT).clamp(0.9, 1.4);
        let padding_x = (16.0 * scale).round() as u32;
        Self {
            font_px: 15.0 * scale,
            line_gap: (30.0 * scale).round() as u32,
            padding_y: (16.0 * scale).round() as u32,
            padding_x,
            value_x: padding_x + (120.0 * scale).round() as u32,
        }
    }
}

/// Greedy word wrap. A single word wider than `max_width` keeps its own line.
pub fn wrap_words(text: &str, max_width: u32, measure: impl Fn(&str) -> u32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if line.is_empty() {
            line.push_str(word);
            continue;
        }
        let candidate = format!("{line} {word}");
        if measure(&candidate) > max_width {
            lines.push(std::mem::replace(&mut line, word.to_string()));
        } else {
            line = candidate;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

/// Darkens the bottom `band_height` rows with a translucent black band.
pub fn shade_band(image: &mut RgbaImage, band_height: u32) {
    let height = image.height();
    let top = height.saturating_sub(band_height);
    let keep = 255 - BAND_ALPHA;

    for y in top..height {
        for x in 0..image.width() {
            let px = image.get_pixel_mut(x, y);
            for c in 0..3 {
                px[c] = (u32::from(px[c]) * keep / 255) as u8;
            }
            px[3] = (255 - (255 - u32::from(px[3])) * keep / 255) as u8;
        }
    }
}

pub fn burn_in(image: &mut RgbaImage, font: &FontArc, info: &OverlayInfo<'_>) {
    let layout = OverlayLayout::for_height(image.height());
    let scale = PxScale::from(layout.font_px);
    let max_width = image
        .width()
        .saturating_sub(layout.value_x + layout.padding_x)
        .max(1);
    let measure = |s: &str| text_size(scale, font, s).0;

    let mut rows: Vec<(&str, Vec<String>)> = vec![
        ("EMPLOYEE", wrap_words(info.employee_name, max_width, measure)),
        (
            "TIME",
            vec![info.timestamp.format("%d/%m/%Y %H:%M:%S").to_string()],
        ),
        (
            "LOCATION",
            vec![format!("{:.6}, {:.6}", info.latitude, info.longitude)],
        ),
    ];
    if let Some(address) = info.address.filter(|a| !a.trim().is_empty()) {
        rows.push(("ADDRESS", wrap_words(address, max_width, measure)));
    }
    rows.push(("DEVICE", wrap_words(info.device, max_width, measure)));

    let line_count: u32 = rows.iter().map(|(_, lines)| lines.len().max(1) as u32).sum();
    let band_height =
        (2 * layout.padding_y + line_count * layout.line_gap).min(image.height());
    shade_band(image, band_height);

    let mut y = (image.height() - band_height + layout.padding_y) as i32;
    for (label, lines) in rows {
        draw_text_mut(image, TEXT_COLOR, layout.padding_x as i32, y, scale, font, label);
        if lines.is_empty() {
            y += layout.line_gap as i32;
        }
        for line in lines {
            draw_text_mut(image, TEXT_COLOR, layout.value_x as i32, y, scale, font, &line);
            y += layout.line_gap as i32;
        }
    }
}
