//! What the popup does with each key it receives.

// Values from X11/keysymdef.h and X11/XF86keysym.h.
const XK_RETURN: u32 = 0xff0d;
const XK_ESCAPE: u32 = 0xff1b;
const XK_LEFT: u32 = 0xff51;
const XK_UP: u32 = 0xff52;
const XK_RIGHT: u32 = 0xff53;
const XK_DOWN: u32 = 0xff54;
const XK_H: u32 = 0x0068;
const XK_J: u32 = 0x006a;
const XK_K: u32 = 0x006b;
const XK_L: u32 = 0x006c;
const XK_Q: u32 = 0x0071;
const XF86XK_MON_BRIGHTNESS_UP: u32 = 0x1008_ff02;
const XF86XK_MON_BRIGHTNESS_DOWN: u32 = 0x1008_ff03;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Increase,
    Decrease,
    Dismiss,
}

impl Action {
    /// Maps an unshifted keysym to an action. Unbound keys give `None`.
    pub fn from_keysym(keysym: u32) -> Option<Action> {
        match keysym {
            XK_UP | XK_RIGHT | XK_K | XK_L | XF86XK_MON_BRIGHTNESS_UP => Some(Action::Increase),
            XK_DOWN | XK_LEFT | XK_J | XK_H | XF86XK_MON_BRIGHTNESS_DOWN => {
                Some(Action::Decrease)
            }
            XK_ESCAPE | XK_Q | XK_RETURN => Some(Action::Dismiss),
            _ => None,
        }
    }

    /// The signed change, in percent, for a step of `step` percent.
    pub fn delta(self, step: u32) -> Option<i32> {
        let step = i32::try_from(step).unwrap_or(i32::MAX);
        match self {
            Action::Increase => Some(step),
            Action::Decrease => Some(-step),
            Action::Dismiss => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::Action;

    #[test]
    fn maps_keys() {
        assert_eq!(Action::from_keysym(0xff52), Some(Action::Increase));
        assert_eq!(Action::from_keysym(0x1008ff02), Some(Action::Increase));
        assert_eq!(Action::from_keysym(0x006a), Some(Action::Decrease));
        assert_eq!(Action::from_keysym(0x1008ff03), Some(Action::Decrease));
        assert_eq!(Action::from_keysym(0xff1b), Some(Action::Dismiss));
        assert_eq!(Action::from_keysym(0x0061), None);
    }

    #[test]
    fn deltas() {
        assert_eq!(Action::Increase.delta(5), Some(5));
        assert_eq!(Action::Decrease.delta(5), Some(-5));
        assert_eq!(Action::Dismiss.delta(5), None);
    }
}
