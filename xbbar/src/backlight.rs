//! Reading and writing the kernel's sysfs backlight interface.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Where the kernel exposes backlight devices.
pub const BACKLIGHT_ROOT: &str = "/sys/class/backlight";

/// A backlight device directory containing `brightness` and `max_brightness`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Backlight {
    path: PathBuf,
    max: u32,
}

fn read_value(path: &Path) -> Result<u32> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading backlight file {}", path.display()))?;
    let value = contents.trim().parse::<u32>().with_context(|| {
        format!(
            "parsing brightness value from file {}: {contents:?}",
            path.display()
        )
    })?;
    Ok(value)
}

impl Backlight {
    /// Opens the backlight device at `path`, reading its maximum brightness.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Backlight> {
        let path = path.into();
        let max = read_value(&path.join("max_brightness"))?;
        if max == 0 {
            bail!("backlight {} reports a maximum brightness of 0", path.display());
        }
        Ok(Backlight { path, max })
    }

    /// Opens the first usable device under `root`.
    ///
    /// Most machines have one backlight at most, so this covers the common
    /// case. Devices whose files can't be read are skipped.
    pub fn find_first<P: AsRef<Path>>(root: P) -> Result<Backlight> {
        let root = root.as_ref();
        let mut paths = fs::read_dir(root)
            .with_context(|| format!("can't access directory {}", root.display()))?
            .map(|dirent| dirent.map(|d| d.path()))
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("listing {}", root.display()))?;
        // read_dir order is unspecified; keep the choice stable between runs.
        paths.sort();

        for path in paths {
            match Backlight::open(&path).and_then(|b| b.current().map(|_| b)) {
                Ok(backlight) => {
                    debug!("Using backlight {}", path.display());
                    return Ok(backlight);
                }
                Err(err) => {
                    warn!("Skipping backlight-like device at {}: {err:#}", path.display());
                }
            }
        }

        bail!("cannot find any valid backlight devices in {}", root.display())
    }

    /// Opens the device called `name` under `root`.
    pub fn named<P: AsRef<Path>>(root: P, name: &str) -> Result<Backlight> {
        let path = root.as_ref().join(name);
        Backlight::open(&path)
            .with_context(|| format!("can't use explicitly requested backlight device {name:?}"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Reads the current raw brightness.
    pub fn current(&self) -> Result<u32> {
        read_value(&self.path.join("brightness"))
    }

    /// Writes a raw brightness, clamped to the device's range. Returns the
    /// value actually written.
    pub fn set(&self, value: u32) -> Result<u32> {
        let value = value.min(self.max);
        let path = self.path.join("brightness");
        fs::write(&path, value.to_string())
            .with_context(|| format!("can't write {value} to {}", path.display()))?;
        Ok(value)
    }

    /// The raw value `delta_percent` percent of the range away from `current`,
    /// saturating at both ends. A non-zero step always moves at least one raw
    /// unit, even when the percentage rounds to nothing on a small range.
    pub fn adjust(&self, current: u32, delta_percent: i32) -> u32 {
        let mut delta = i64::from(delta_percent) * i64::from(self.max) / 100;
        if delta == 0 {
            delta = i64::from(delta_percent.signum());
        }
        (i64::from(current) + delta).clamp(0, i64::from(self.max)) as u32
    }

    /// The raw value for `percent` percent of the range.
    pub fn percent_to_raw(&self, percent: u32) -> u32 {
        let raw = u64::from(percent.min(100)) * u64::from(self.max) / 100;
        raw as u32
    }
}

#[cfg(test)]
mod test {
    use super::Backlight;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn fake_device(root: &Path, name: &str, current: &str, max: &str) {
        let dir = root.join(name);
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("brightness"), current).unwrap();
        fs::write(dir.join("max_brightness"), max).unwrap();
    }

    #[test]
    fn reads_and_writes() {
        let root = TempDir::new().unwrap();
        fake_device(root.path(), "intel_backlight", "450\n", "937\n");

        let backlight = Backlight::named(root.path(), "intel_backlight").unwrap();
        assert_eq!(backlight.max(), 937);
        assert_eq!(backlight.current().unwrap(), 450);

        assert_eq!(backlight.set(500).unwrap(), 500);
        assert_eq!(backlight.current().unwrap(), 500);

        // Clamped to the device's range.
        assert_eq!(backlight.set(5000).unwrap(), 937);
        let raw = fs::read_to_string(backlight.path().join("brightness")).unwrap();
        assert_eq!(raw, "937");
    }

    #[test]
    fn find_first_skips_broken_devices() {
        let root = TempDir::new().unwrap();
        fake_device(root.path(), "acpi_video0", "3", "not a number");
        fake_device(root.path(), "b_dead", "1", "0");
        fake_device(root.path(), "c_good", "12", "15");

        let backlight = Backlight::find_first(root.path()).unwrap();
        assert!(backlight.path().ends_with("c_good"));
        assert_eq!(backlight.current().unwrap(), 12);
    }

    #[test]
    fn find_first_fails_when_nothing_is_usable() {
        let root = TempDir::new().unwrap();
        assert!(Backlight::find_first(root.path()).is_err());
        assert!(Backlight::find_first(root.path().join("missing")).is_err());
    }

    #[test]
    fn missing_named_device_mentions_its_name() {
        let root = TempDir::new().unwrap();
        let err = Backlight::named(root.path(), "nope").unwrap_err();
        assert!(format!("{err}").contains("nope"));
    }

    #[test]
    fn adjust_saturates() {
        let root = TempDir::new().unwrap();
        fake_device(root.path(), "bl", "50", "200");
        let backlight = Backlight::named(root.path(), "bl").unwrap();

        assert_eq!(backlight.adjust(50, 5), 60);
        assert_eq!(backlight.adjust(50, -5), 40);
        assert_eq!(backlight.adjust(5, -5), 0);
        assert_eq!(backlight.adjust(195, 5), 200);
        assert_eq!(backlight.adjust(200, 100), 200);

        assert_eq!(backlight.percent_to_raw(50), 100);
        assert_eq!(backlight.percent_to_raw(150), 200);
    }

    #[test]
    fn small_ranges_still_step() {
        let root = TempDir::new().unwrap();
        fake_device(root.path(), "acpi_video0", "7", "15");
        let backlight = Backlight::named(root.path(), "acpi_video0").unwrap();

        assert_eq!(backlight.adjust(7, 5), 8);
        assert_eq!(backlight.adjust(7, -5), 6);
        assert_eq!(backlight.adjust(7, 0), 7);
        assert_eq!(backlight.adjust(15, 5), 15);
        assert_eq!(backlight.adjust(0, -5), 0);
        // Larger steps are still proportional.
        assert_eq!(backlight.adjust(7, 20), 10);
    }
}
