use thiserror::Error;

/// Reasons a bar can't be built from the attributes it was given.
///
/// Each variant has a stable numeric [`status`](BarError::status), which the
/// `xbbar` binary uses as its exit code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BarError {
    #[error("invalid number of rectangles: {0} (must be at least 1)")]
    BadNrect(i32),
    #[error("invalid padding: {0} (must not be negative)")]
    BadPadding(i32),
    #[error("invalid rectangle width: {0} (must be at least 5)")]
    BadRectWidth(i32),
    #[error("invalid rectangle height: {0} (must be at least 5)")]
    BadRectHeight(i32),
    #[error("invalid foreground colour: {0:?}")]
    BadFg(String),
    #[error("invalid background colour: {0:?}")]
    BadBg(String),
    #[error("bar of {width}x{height} does not fit on a {screen_width}x{screen_height} screen")]
    TooLarge {
        width: i64,
        height: i64,
        screen_width: u16,
        screen_height: u16,
    },
}

impl BarError {
    pub fn status(&self) -> i32 {
        match self {
            BarError::BadNrect(_) => 1,
            BarError::BadPadding(_) => 2,
            BarError::BadRectWidth(_) => 3,
            BarError::BadRectHeight(_) => 4,
            BarError::BadFg(_) => 5,
            BarError::BadBg(_) => 7,
            BarError::TooLarge { .. } => 9,
        }
    }
}
