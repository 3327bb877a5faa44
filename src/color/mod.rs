//! Color helpers: random swatches, text contrast and gradient descriptions.

use rand::Rng;

use crate::model::Item;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Perceived brightness, 0..=255
    pub fn luma(self) -> u32 {
        (299 * self.r as u32 + 587 * self.g as u32 + 114 * self.b as u32) / 1000
    }

    /// `#RRGGBB`, uppercase
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

/// Text color that stays readable on a given background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Contrast {
    Black,
    White,
}

impl Contrast {
    pub fn as_str(self) -> &'static str {
        match self {
            Contrast::Black => "black",
            Contrast::White => "white",
        }
    }
}

impl std::fmt::Display for Contrast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub fn random_color() -> String {
    random_color_with(&mut rand::rng())
}

/// `#` followed by six uppercase hex digits, each drawn independently.
pub fn random_color_with<R: Rng>(rng: &mut R) -> String {
    let mut out = String::with_capacity(7);
    out.push('#');
    for _ in 0..6 {
        out.push(HEX_DIGITS[rng.random_range(0..HEX_DIGITS.len())] as char);
    }
    out
}

pub fn random_palette(count: usize) -> Vec<String> {
    let mut rng = rand::rng();
    (0..count).map(|_| random_color_with(&mut rng)).collect()
}

/// Parse `#RGB` or `#RRGGBB` (the `#` is optional).
pub fn parse_hex(color: &str) -> Option<Rgb> {
    let hex = color.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    if !hex.is_ascii() {
        return None;
    }

    let expanded: String = match hex.len() {
        3 => hex.chars().flat_map(|c| [c, c]).collect(),
        6 => hex.to_string(),
        _ => return None,
    };

    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    Some(Rgb {
        r: channel(&expanded[0..2])?,
        g: channel(&expanded[2..4])?,
        b: channel(&expanded[4..6])?,
    })
}

/// Canonical `#RRGGBB` form, so `fff`, `#FFF` and `#ffffff` compare equal.
pub fn normalize_hex(color: &str) -> Option<String> {
    parse_hex(color).map(Rgb::to_hex)
}

/// Black on light backgrounds, white on dark ones. Unparseable input is
/// treated as dark.
pub fn contrast_of(color: &str) -> Contrast {
    match parse_hex(color) {
        Some(rgb) if rgb.luma() >= 128 => Contrast::Black,
        _ => Contrast::White,
    }
}

/// CSS `linear-gradient(...)` across the items' colors. Items with an
/// explicit `position` use it as their stop, the rest are spread evenly.
pub fn linear_gradient(items: &[Item], angle_deg: u16) -> String {
    let last = items.len().saturating_sub(1).max(1) as f64;
    let stops: Vec<String> = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let pos = item.position.unwrap_or(i as f64 * 100.0 / last);
            format!("{} {}%", item.color, trim_float(pos))
        })
        .collect();
    format!("linear-gradient({}deg, {})", angle_deg % 360, stops.join(", "))
}

fn trim_float(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{:.2}", v)
    }
}
