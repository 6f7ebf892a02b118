//! Colours used to paint the bar.

use cairo::Context;
use colors_transform::{Color as ColorTransform, Rgb};

#[derive(Clone, Debug, PartialEq)]
pub struct Color {
    red: f64,
    green: f64,
    blue: f64,
}

impl Color {
    pub fn apply_to_context(&self, cr: &Context) {
        cr.set_source_rgb(self.red, self.green, self.blue);
    }

    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            red: r as f64 / 255.0,
            green: g as f64 / 255.0,
            blue: b as f64 / 255.0,
        }
    }

    /// Parse string as a `#rgb` or `#rrggbb` hex color, returning `None` if
    /// it isn't one.
    ///
    /// # Example
    /// ```
    /// use xbbar::Color;
    ///
    /// assert_eq!(Color::parse("#1a1a1a"), Some(Color::from_rgb(26, 26, 26)));
    /// assert_eq!(Color::parse("not hex"), None);
    /// ```
    pub fn parse(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#')?;
        if !matches!(digits.len(), 3 | 6) || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let long: String = if digits.len() == 3 {
            digits.chars().flat_map(|c| [c, c]).collect()
        } else {
            digits.to_owned()
        };
        let rgb = Rgb::from_hex_str(&format!("#{long}")).ok()?;
        Some(Self {
            red: rgb.get_red() as f64 / 255.0,
            green: rgb.get_green() as f64 / 255.0,
            blue: rgb.get_blue() as f64 / 255.0,
        })
    }

    /// Builds a color from the 16-bit channels the X server reports.
    pub fn from_rgb16(r: u16, g: u16, b: u16) -> Self {
        Self {
            red: f64::from(r) / 65535.0,
            green: f64::from(g) / 65535.0,
            blue: f64::from(b) / 65535.0,
        }
    }

    pub fn to_hex(&self) -> String {
        let channel = |c: f64| {
            if c >= 1.0 {
                255
            } else {
                (c * 255.0).round() as i32
            }
        };
        format!(
            "#{:0width$X}{:0width$X}{:0width$X}",
            channel(self.red),
            channel(self.green),
            channel(self.blue),
            width = 2
        )
    }
}
