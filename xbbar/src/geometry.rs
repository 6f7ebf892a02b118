//! Bar attributes and the arithmetic that turns them into rectangles.
//!
//! Nothing in here talks to the X server, so the whole layout can be checked
//! without a display. The bar window resolves a [`Geometry`] against the size
//! of the screen and then paints whatever [`Geometry::layout()`] returns.

use bitflags::bitflags;

use crate::color::Color;
use crate::errors::BarError;

pub const DEFAULT_NRECT: i32 = 20;
pub const DEFAULT_PADDING: i32 = 2;
pub const DEFAULT_RECT_XSZ: i32 = 12;
pub const DEFAULT_RECT_YSZ: i32 = 20;

pub const DEFAULT_FG: &str = "#3475aa";
pub const DEFAULT_BG: &str = "#1a1a1a";

// The inner fill area of a segment is inset by 2px on every side.
const MIN_RECT_SZ: i32 = 5;

bitflags! {
    /// Selects which fields of [`BarAttributes`] were set by the caller.
    ///
    /// Fields whose bit is clear are ignored and replaced by their default.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AttrMask: u32 {
        const NRECT = 0x0001;
        const PADDING = 0x0002;
        const RECT_XSZ = 0x0004;
        const RECT_YSZ = 0x0008;
        const FG = 0x0010;
        const BG = 0x0040;
        const XPOS = 0x0100;
        const YPOS = 0x0200;
    }
}

/// Caller-supplied appearance of the bar. Only the fields selected by an
/// [`AttrMask`] are read.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BarAttributes {
    pub nrect: i32,
    pub padding: i32,
    pub rect_xsz: i32,
    pub rect_ysz: i32,
    pub xpos: i32,
    pub ypos: i32,
    pub fg: String,
    pub bg: String,
}

/// Which of the bar's colours a [`Shape`] is painted with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Foreground,
    Background,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShapeKind {
    /// Follows X11 core semantics: covers `x..=x + width` and `y..=y + height`.
    Outline,
    Fill,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Shape {
    pub kind: ShapeKind,
    pub role: Role,
    pub rect: Rect,
}

/// A validated bar, positioned on a particular screen.
#[derive(Clone, Debug, PartialEq)]
pub struct Geometry {
    pub nrect: i32,
    pub padding: i32,
    pub rect_xsz: i32,
    pub rect_ysz: i32,

    pub x: i16,
    pub y: i16,
    pub width: u16,
    pub height: u16,

    pub fg: Color,
    pub bg: Color,
}

fn calc_xsize(rect_xsz: i64, padding: i64, nrect: i64) -> i64 {
    rect_xsz * nrect + padding * (nrect + 1) + 2
}

fn calc_ysize(rect_ysz: i64, padding: i64) -> i64 {
    rect_ysz + 2 * padding + 2
}

impl Geometry {
    /// Resolves `attr` (masked by `mask`) against the defaults and a screen
    /// of `screen_width` x `screen_height` pixels. Only hex colours are
    /// understood; see [`Geometry::resolve_with()`] for colour names.
    pub fn resolve(
        mask: AttrMask,
        attr: &BarAttributes,
        screen_width: u16,
        screen_height: u16,
    ) -> Result<Geometry, BarError> {
        Geometry::resolve_with(mask, attr, screen_width, screen_height, |_| None)
    }

    /// Like [`Geometry::resolve()`], but colours that aren't hex are passed
    /// to `lookup_color` (the X server's colour database, for the bar).
    pub fn resolve_with<F>(
        mask: AttrMask,
        attr: &BarAttributes,
        screen_width: u16,
        screen_height: u16,
        lookup_color: F,
    ) -> Result<Geometry, BarError>
    where
        F: Fn(&str) -> Option<Color>,
    {
        let pick = |bit: AttrMask, value: i32, default: i32| {
            if mask.contains(bit) {
                value
            } else {
                default
            }
        };

        let nrect = pick(AttrMask::NRECT, attr.nrect, DEFAULT_NRECT);
        if nrect < 1 {
            return Err(BarError::BadNrect(nrect));
        }
        let padding = pick(AttrMask::PADDING, attr.padding, DEFAULT_PADDING);
        if padding < 0 {
            return Err(BarError::BadPadding(padding));
        }
        let rect_xsz = pick(AttrMask::RECT_XSZ, attr.rect_xsz, DEFAULT_RECT_XSZ);
        if rect_xsz < MIN_RECT_SZ {
            return Err(BarError::BadRectWidth(rect_xsz));
        }
        let rect_ysz = pick(AttrMask::RECT_YSZ, attr.rect_ysz, DEFAULT_RECT_YSZ);
        if rect_ysz < MIN_RECT_SZ {
            return Err(BarError::BadRectHeight(rect_ysz));
        }

        let fg = if mask.contains(AttrMask::FG) {
            attr.fg.as_str()
        } else {
            DEFAULT_FG
        };
        let color = |name: &str| Color::parse(name).or_else(|| lookup_color(name));
        let fg = color(fg).ok_or_else(|| BarError::BadFg(fg.to_owned()))?;
        let bg = if mask.contains(AttrMask::BG) {
            attr.bg.as_str()
        } else {
            DEFAULT_BG
        };
        let bg = color(bg).ok_or_else(|| BarError::BadBg(bg.to_owned()))?;

        // i64 can't overflow here: every input is a non-negative i32.
        let width = calc_xsize(rect_xsz.into(), padding.into(), nrect.into());
        let height = calc_ysize(rect_ysz.into(), padding.into());
        let too_large = || BarError::TooLarge {
            width,
            height,
            screen_width,
            screen_height,
        };
        if width > i64::from(screen_width) || height > i64::from(screen_height) {
            return Err(too_large());
        }

        let x = if mask.contains(AttrMask::XPOS) {
            i64::from(attr.xpos)
        } else {
            i64::from(screen_width) / 2 - width / 2
        };
        let y = if mask.contains(AttrMask::YPOS) {
            i64::from(attr.ypos)
        } else {
            i64::from(screen_height) * 15 / 16 - height / 2
        };

        Ok(Geometry {
            nrect,
            padding,
            rect_xsz,
            rect_ysz,
            x: i16::try_from(x).map_err(|_| too_large())?,
            y: i16::try_from(y).map_err(|_| too_large())?,
            width: u16::try_from(width).map_err(|_| too_large())?,
            height: u16::try_from(height).map_err(|_| too_large())?,
            fg,
            bg,
        })
    }

    pub fn color(&self, role: Role) -> &Color {
        match role {
            Role::Foreground => &self.fg,
            Role::Background => &self.bg,
        }
    }

    /// Returns the shapes that make up the bar for `current` out of `max`,
    /// in the order they must be painted.
    pub fn layout(&self, current: u32, max: u32) -> Vec<Shape> {
        let width = i32::from(self.width);
        let height = i32::from(self.height);
        let percent = brightness_percent(current, max);

        let mut shapes = Vec::with_capacity(2 + 2 * self.nrect as usize);
        shapes.push(Shape {
            kind: ShapeKind::Outline,
            role: Role::Foreground,
            rect: Rect::new(0, 0, width - 1, height - 1),
        });
        shapes.push(Shape {
            kind: ShapeKind::Fill,
            role: Role::Background,
            rect: Rect::new(1, 1, width - 2, height - 2),
        });

        let base_offset = 1 + self.padding;
        // Segment bounds are fractional, but `percent` has already been
        // truncated to a whole number.
        let span = 100.0 / f64::from(self.nrect);
        let inner_width = f64::from(self.rect_xsz - 4);

        for i in 0..self.nrect {
            let x = base_offset + i * (self.rect_xsz + self.padding);
            let y = base_offset;

            shapes.push(Shape {
                kind: ShapeKind::Outline,
                role: Role::Foreground,
                rect: Rect::new(x, y, self.rect_xsz - 1, self.rect_ysz - 1),
            });

            let fill = fill_fraction(percent, f64::from(i) * span, f64::from(i + 1) * span);
            let fill_width = (inner_width * fill).floor() as i32;
            if fill_width > 0 {
                shapes.push(Shape {
                    kind: ShapeKind::Fill,
                    role: Role::Foreground,
                    rect: Rect::new(x + 2, y + 2, fill_width, self.rect_ysz - 4),
                });
            }
        }

        shapes
    }
}

/// `current` as a whole percentage of `max`, truncated towards zero.
pub fn brightness_percent(current: u32, max: u32) -> u32 {
    if max == 0 {
        return 0;
    }
    let percent = u64::from(current) * 100 / u64::from(max);
    u32::try_from(percent).unwrap_or(u32::MAX)
}

/// How much of the segment spanning `lower..upper` percent is lit.
pub fn fill_fraction(percent: u32, lower: f64, upper: f64) -> f64 {
    let percent = f64::from(percent);
    if percent >= upper {
        1.0
    } else if percent <= lower {
        0.0
    } else {
        (percent - lower) / (upper - lower)
    }
}
