use std::env;
use std::path::PathBuf;
use std::process::exit;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use xbbar::{Adjustment, AttrMask, Backlight, BarAttributes, BarError, Xbbar, BACKLIGHT_ROOT};

/// Show a brightness bar on X11 and adjust the backlight with the arrow keys.
///
/// Up/Right/k/l raise the brightness, Down/Left/j/h lower it, and
/// Escape/q/Return close the bar. It also closes after --timeout milliseconds
/// without a key press.
#[derive(Parser, Debug)]
#[clap(name = "xbbar", version)]
struct Args {
    /// Number of segments in the bar.
    #[clap(short, long)]
    nrect: Option<i32>,

    /// Gap in pixels between segments and around the edge of the bar.
    #[clap(short, long)]
    padding: Option<i32>,

    /// Width of each segment in pixels.
    #[clap(long, value_name = "PX")]
    rect_width: Option<i32>,

    /// Height of each segment in pixels.
    #[clap(long, value_name = "PX")]
    rect_height: Option<i32>,

    /// Horizontal position of the bar. Centred on the screen by default.
    #[clap(short, allow_negative_numbers = true)]
    x: Option<i32>,

    /// Vertical position of the bar. Near the bottom of the screen by default.
    #[clap(short, allow_negative_numbers = true)]
    y: Option<i32>,

    /// Colour of the frame and lit segments, as #rgb, #rrggbb or an X colour name.
    #[clap(long, value_name = "COLOR")]
    fg: Option<String>,

    /// Background colour, as #rgb, #rrggbb or an X colour name.
    #[clap(long, value_name = "COLOR")]
    bg: Option<String>,

    /// Name of the backlight device to use. Defaults to the first one found.
    #[clap(short, long)]
    device: Option<String>,

    /// Directory containing backlight devices.
    #[clap(long, value_name = "DIR", default_value = BACKLIGHT_ROOT)]
    backlight_dir: PathBuf,

    /// Milliseconds without a key press before the bar closes.
    #[clap(short, long, value_name = "MS", default_value_t = xbbar::DEFAULT_TIMEOUT.as_millis() as u64)]
    timeout: u64,

    /// Percentage of the range each key press moves the brightness by.
    #[clap(short, long, value_name = "PCT", default_value_t = xbbar::DEFAULT_STEP)]
    step: u32,

    /// Raise the brightness by this percentage before showing the bar.
    #[clap(long, value_name = "PCT", conflicts_with_all = ["down", "set"])]
    up: Option<u32>,

    /// Lower the brightness by this percentage before showing the bar.
    #[clap(long, value_name = "PCT", conflicts_with = "set")]
    down: Option<u32>,

    /// Set the brightness to this percentage before showing the bar.
    #[clap(long, value_name = "PCT", value_parser = clap::value_parser!(u32).range(0..=100))]
    set: Option<u32>,

    /// Don't grab the keyboard; the bar will only show the level.
    #[clap(long)]
    no_grab: bool,
}

impl Args {
    fn attributes(&self) -> (AttrMask, BarAttributes) {
        let mut mask = AttrMask::empty();
        let mut attr = BarAttributes::default();

        let mut set = |bit: AttrMask, value: Option<i32>, field: &mut i32| {
            if let Some(value) = value {
                mask |= bit;
                *field = value;
            }
        };
        set(AttrMask::NRECT, self.nrect, &mut attr.nrect);
        set(AttrMask::PADDING, self.padding, &mut attr.padding);
        set(AttrMask::RECT_XSZ, self.rect_width, &mut attr.rect_xsz);
        set(AttrMask::RECT_YSZ, self.rect_height, &mut attr.rect_ysz);
        set(AttrMask::XPOS, self.x, &mut attr.xpos);
        set(AttrMask::YPOS, self.y, &mut attr.ypos);

        if let Some(fg) = &self.fg {
            mask |= AttrMask::FG;
            attr.fg = fg.clone();
        }
        if let Some(bg) = &self.bg {
            mask |= AttrMask::BG;
            attr.bg = bg.clone();
        }

        (mask, attr)
    }

    fn adjustment(&self) -> Option<Adjustment> {
        self.up
            .map(Adjustment::Up)
            .or(self.down.map(Adjustment::Down))
            .or(self.set.map(Adjustment::Set))
    }
}

fn init_log() -> Result<()> {
    let mut builder = env_logger::Builder::new();
    builder.filter(Some("xbbar"), LevelFilter::Info);
    if let Ok(rust_log) = env::var("RUST_LOG") {
        builder.parse_filters(&rust_log);
    }
    Ok(builder.try_init()?)
}

fn run(args: Args) -> Result<()> {
    let backlight = match &args.device {
        Some(name) => Backlight::named(&args.backlight_dir, name)?,
        None => Backlight::find_first(&args.backlight_dir)?,
    };
    let (mask, attr) = args.attributes();

    Xbbar::new(backlight, mask, attr)
        .with_timeout(Duration::from_millis(args.timeout))
        .with_step(args.step)
        .with_adjustment(args.adjustment())
        .with_keyboard_grab(!args.no_grab)
        .run()
}

fn main() {
    let args = Args::parse();
    if let Err(err) = init_log() {
        eprintln!("xbbar: {err}");
    }

    if let Err(err) = run(args) {
        log::error!("{err:#}");
        let status = err.downcast_ref::<BarError>().map_or(1, BarError::status);
        exit(status);
    }
}

#[cfg(test)]
mod test {
    use super::Args;
    use clap::{CommandFactory, Parser};
    use xbbar::{Adjustment, AttrMask};

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn only_given_options_are_masked() {
        let args = Args::parse_from(["xbbar", "-n", "10", "--fg", "#ffffff", "-y", "-5"]);
        let (mask, attr) = args.attributes();
        assert_eq!(mask, AttrMask::NRECT | AttrMask::FG | AttrMask::YPOS);
        assert_eq!(attr.nrect, 10);
        assert_eq!(attr.fg, "#ffffff");
        assert_eq!(attr.ypos, -5);

        let (mask, _) = Args::parse_from(["xbbar"]).attributes();
        assert!(mask.is_empty());
    }

    #[test]
    fn initial_adjustment() {
        let args = Args::parse_from(["xbbar", "--down", "10"]);
        assert_eq!(args.adjustment(), Some(Adjustment::Down(10)));
        assert_eq!(Args::parse_from(["xbbar"]).adjustment(), None);

        assert!(Args::try_parse_from(["xbbar", "--up", "5", "--set", "50"]).is_err());
        assert!(Args::try_parse_from(["xbbar", "--set", "101"]).is_err());
    }
}
