//! A minimal on-screen brightness bar for X11.
//!
//! Xbbar pops up a small borderless window near the bottom of the screen,
//! showing the display's backlight level as a row of segments that fill up
//! in proportion to the current brightness. While it's visible the arrow keys
//! (and the `XF86MonBrightnessUp`/`XF86MonBrightnessDown` keys) change the
//! brightness. It goes away on its own once no key has been pressed for a
//! short while.
//!
//! The brightness itself is read from and written to the kernel's sysfs
//! backlight interface (`/sys/class/backlight/<device>/brightness` and
//! `max_brightness`), so the user running it needs write access to those
//! files.
//!
//! # How to use
//!
//! Most people will run the `xbbar` binary from a hotkey daemon. The library
//! can also be driven directly:
//!
//! ```no_run
//! use anyhow::Result;
//! use xbbar::{Adjustment, AttrMask, Backlight, BarAttributes, Xbbar, BACKLIGHT_ROOT};
//!
//! fn main() -> Result<()> {
//!     let backlight = Backlight::find_first(BACKLIGHT_ROOT)?;
//!     let attr = BarAttributes {
//!         nrect: 10,
//!         fg: "#a0c040".to_owned(),
//!         ..BarAttributes::default()
//!     };
//!
//!     Xbbar::new(backlight, AttrMask::NRECT | AttrMask::FG, attr)
//!         .with_adjustment(Some(Adjustment::Up(5)))
//!         .run()
//! }
//! ```
//!
//! # Dependencies
//!
//! In addition to the Rust dependencies in `Cargo.toml`, Xbbar also depends on
//! these system libraries:
//!
//!  - `xcb-util`: `xcb-ewmh` / `xcb-keysyms`
//!  - `x11-xcb`
//!  - `cairo`

#[macro_use]
extern crate log;

mod backlight;
mod bar;
mod color;
mod errors;
pub mod geometry;
mod keys;
mod xcb;

use std::time::Duration;

use anyhow::Result;
use tokio::runtime;
use tokio::time::{self, Instant};
use tokio_stream::StreamExt;

use crate::bar::Bar;
use crate::keys::Action;
use crate::xcb::{Keymap, XcbEventStream};

pub use backlight::{Backlight, BACKLIGHT_ROOT};
pub use color::Color;
pub use errors::BarError;
pub use geometry::{AttrMask, BarAttributes};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);
pub const DEFAULT_STEP: u32 = 5;

/// A change to make to the brightness before the bar is first shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Adjustment {
    /// Raise by this many percent of the device's range.
    Up(u32),
    /// Lower by this many percent of the device's range.
    Down(u32),
    /// Set to this percentage of the device's range.
    Set(u32),
}

impl Adjustment {
    /// The raw brightness this adjustment leads to from `current`.
    pub fn target(self, backlight: &Backlight, current: u32) -> u32 {
        let percent = |p: u32| i32::try_from(p).unwrap_or(i32::MAX);
        match self {
            Adjustment::Up(p) => backlight.adjust(current, percent(p)),
            Adjustment::Down(p) => backlight.adjust(current, -percent(p)),
            Adjustment::Set(p) => backlight.percent_to_raw(p),
        }
    }
}

// Writes `target` unless it's what the device is already at. Returns the new
// current brightness.
fn change_brightness(backlight: &Backlight, current: u32, target: u32) -> Result<u32> {
    if target == current {
        return Ok(current);
    }
    let written = backlight.set(target)?;
    info!("Brightness {} -> {} (of {})", current, written, backlight.max());
    Ok(written)
}

/// What a key press did while the bar was up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum KeyOutcome {
    /// Not one of ours.
    Ignore,
    Dismiss,
    /// A brightness key; the device is now at this raw value.
    Step(u32),
}

// Applies the key `keysym` to the device at `current`, stepping by `step`
// percent.
fn on_key(backlight: &Backlight, current: u32, step: u32, keysym: u32) -> Result<KeyOutcome> {
    let delta = match Action::from_keysym(keysym) {
        None => return Ok(KeyOutcome::Ignore),
        Some(Action::Dismiss) => return Ok(KeyOutcome::Dismiss),
        Some(action) => action.delta(step),
    };
    let Some(delta) = delta else {
        return Ok(KeyOutcome::Ignore);
    };
    let target = backlight.adjust(current, delta);
    Ok(KeyOutcome::Step(change_brightness(backlight, current, target)?))
}

/// The main object, used to show the bar for a backlight.
///
/// Options are set with the `with_*()` methods. The [`run()`] method then
/// takes ownership of the instance, shows the bar and returns once it has
/// been dismissed or timed out.
///
/// [`run()`]: #method.run
pub struct Xbbar {
    backlight: Backlight,
    mask: AttrMask,
    attr: BarAttributes,
    /// How long the bar stays up without a key press.
    timeout: Duration,
    /// Percentage of the range moved by each key press.
    step: u32,
    adjustment: Option<Adjustment>,
    grab: bool,
}

impl Xbbar {
    /// Creates a new `Xbbar` instance.
    ///
    /// Only the fields of `attr` selected by `mask` are used; the rest take
    /// their defaults (see [`geometry`]).
    pub fn new(backlight: Backlight, mask: AttrMask, attr: BarAttributes) -> Self {
        Self {
            backlight,
            mask,
            attr,
            timeout: DEFAULT_TIMEOUT,
            step: DEFAULT_STEP,
            adjustment: None,
            grab: true,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn with_step(self, step: u32) -> Self {
        Self { step, ..self }
    }

    pub fn with_adjustment(self, adjustment: Option<Adjustment>) -> Self {
        Self { adjustment, ..self }
    }

    /// Whether to grab the keyboard while the bar is shown. Without the grab
    /// the bar only sees keys if something gives it focus.
    pub fn with_keyboard_grab(self, grab: bool) -> Self {
        Self { grab, ..self }
    }

    /// Runs the Xbbar instance.
    ///
    /// This method takes ownership of the instance, shows the bar and handles
    /// key presses until the bar is dismissed or the timeout expires.
    pub fn run(self) -> Result<()> {
        // Everything happens on this thread: the X connection isn't `Send`.
        let rt = runtime::Builder::new_current_thread().enable_all().build()?;
        rt.block_on(self.run_inner())
    }

    async fn run_inner(self) -> Result<()> {
        let max = self.backlight.max();
        let mut current = self.backlight.current()?;
        if let Some(adjustment) = self.adjustment {
            let target = adjustment.target(&self.backlight, current);
            current = change_brightness(&self.backlight, current, target)?;
        }

        let mut bar = Bar::new(self.mask, &self.attr)?;
        bar.draw(current, max)?;
        if self.grab {
            // Still worth showing the level even if the keys won't work.
            if let Err(err) = bar.grab_keyboard().await {
                warn!("{err:#}");
            }
        }

        let conn = bar.connection().clone();
        let keymap = Keymap::new(&conn);
        let mut event_stream = XcbEventStream::new(conn.clone())?;
        let idle = time::sleep(self.timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                () = &mut idle => {
                    debug!("No key pressed for {:?}, exiting", self.timeout);
                    break;
                }

                event = event_stream.next() => {
                    let Some(event) = event else {
                        warn!("Lost connection to the X server");
                        break;
                    };
                    let keysym = match bar.process_event(event, &keymap) {
                        Ok(Some(keysym)) => keysym,
                        Ok(None) => continue,
                        Err(err) => {
                            error!("Error processing XCB event: {err:#}");
                            continue;
                        }
                    };
                    match on_key(&self.backlight, current, self.step, keysym)? {
                        KeyOutcome::Ignore => {}
                        KeyOutcome::Dismiss => break,
                        KeyOutcome::Step(new) => {
                            current = new;
                            bar.draw(current, max)?;
                            idle.as_mut().reset(Instant::now() + self.timeout);
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::{change_brightness, on_key, Adjustment, Backlight, KeyOutcome};
    use std::fs;
    use tempfile::TempDir;

    fn device(current: &str, max: &str) -> (TempDir, Backlight) {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("brightness"), current).unwrap();
        fs::write(root.path().join("max_brightness"), max).unwrap();
        let backlight = Backlight::open(root.path()).unwrap();
        (root, backlight)
    }

    #[test]
    fn adjustments() {
        let (_root, backlight) = device("400", "1000");
        assert_eq!(Adjustment::Up(5).target(&backlight, 400), 450);
        assert_eq!(Adjustment::Down(50).target(&backlight, 400), 0);
        assert_eq!(Adjustment::Set(75).target(&backlight, 400), 750);
        assert_eq!(Adjustment::Up(u32::MAX).target(&backlight, 400), 1000);
    }

    #[test]
    fn unchanged_brightness_is_not_written() {
        let (root, backlight) = device("sentinel", "1000");
        assert_eq!(change_brightness(&backlight, 400, 400).unwrap(), 400);
        let raw = fs::read_to_string(root.path().join("brightness")).unwrap();
        assert_eq!(raw, "sentinel");

        assert_eq!(change_brightness(&backlight, 400, 1200).unwrap(), 1000);
        assert_eq!(backlight.current().unwrap(), 1000);
    }

    const XK_ESCAPE: u32 = 0xff1b;
    const XK_UP: u32 = 0xff52;
    const XK_DOWN: u32 = 0xff54;
    const XK_A: u32 = 0x0061;

    #[test]
    fn unbound_keys_are_ignored() {
        let (root, backlight) = device("sentinel", "1000");
        assert_eq!(on_key(&backlight, 400, 5, XK_A).unwrap(), KeyOutcome::Ignore);
        let raw = fs::read_to_string(root.path().join("brightness")).unwrap();
        assert_eq!(raw, "sentinel");
    }

    #[test]
    fn escape_dismisses() {
        let (root, backlight) = device("sentinel", "1000");
        assert_eq!(on_key(&backlight, 400, 5, XK_ESCAPE).unwrap(), KeyOutcome::Dismiss);
        let raw = fs::read_to_string(root.path().join("brightness")).unwrap();
        assert_eq!(raw, "sentinel");
    }

    #[test]
    fn arrow_keys_step_and_write() {
        let (_root, backlight) = device("400", "1000");
        assert_eq!(on_key(&backlight, 400, 5, XK_UP).unwrap(), KeyOutcome::Step(450));
        assert_eq!(backlight.current().unwrap(), 450);
        assert_eq!(on_key(&backlight, 450, 10, XK_DOWN).unwrap(), KeyOutcome::Step(350));
        assert_eq!(backlight.current().unwrap(), 350);
    }

    #[test]
    fn step_at_the_limit_writes_nothing() {
        let (root, backlight) = device("sentinel", "1000");
        assert_eq!(on_key(&backlight, 1000, 5, XK_UP).unwrap(), KeyOutcome::Step(1000));
        assert_eq!(on_key(&backlight, 0, 5, XK_DOWN).unwrap(), KeyOutcome::Step(0));
        let raw = fs::read_to_string(root.path().join("brightness")).unwrap();
        assert_eq!(raw, "sentinel");
    }
}
