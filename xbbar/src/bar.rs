use std::rc::Rc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tokio::time;
use xcb_util::ewmh;

use crate::geometry::{AttrMask, BarAttributes, Geometry, ShapeKind};
use crate::color::Color;
use crate::xcb::Keymap;

// Another client (usually the hotkey daemon that launched us) may still hold
// the keyboard for a moment after starting us.
const GRAB_ATTEMPTS: usize = 1000;
const GRAB_RETRY_DELAY: Duration = Duration::from_millis(1);

// Calls `attempt` until it returns true, at most `attempts` times, sleeping
// `delay` between calls. Returns whether it ever succeeded.
async fn retry<F>(attempts: usize, delay: Duration, mut attempt: F) -> Result<bool>
where
    F: FnMut() -> Result<bool>,
{
    for _ in 0..attempts {
        if attempt()? {
            return Ok(true);
        }
        time::sleep(delay).await;
    }
    Ok(false)
}

fn get_root_visual_type(
    conn: &xcb::Connection,
    screen: &xcb::Screen<'_>,
) -> Result<xcb::Visualtype> {
    for root in conn.get_setup().roots() {
        for allowed_depth in root.allowed_depths() {
            for visual in allowed_depth.visuals() {
                if visual.visual_id() == screen.root_visual() {
                    return Ok(visual);
                }
            }
        }
    }
    Err(anyhow!("No visual type found"))
}

/// Creates a `cairo::Surface` for the XCB window with the given `id`.
fn cairo_surface_for_xcb_window(
    conn: &xcb::Connection,
    screen: &xcb::Screen<'_>,
    id: u32,
    width: i32,
    height: i32,
) -> Result<cairo::XCBSurface> {
    let cairo_conn = unsafe {
        cairo::XCBConnection::from_raw_none(conn.get_raw_conn() as *mut cairo_sys::xcb_connection_t)
    };
    let visual = unsafe {
        cairo::XCBVisualType::from_raw_none(
            &mut get_root_visual_type(conn, screen)?.base as *mut xcb::ffi::xcb_visualtype_t
                as *mut cairo_sys::xcb_visualtype_t,
        )
    };
    let drawable = cairo::XCBDrawable(id);
    let surface = cairo::XCBSurface::create(&cairo_conn, &drawable, &visual, width, height)
        .map_err(|status| anyhow!("XCBSurface::create: {}", status))?;
    Ok(surface)
}

fn create_window(
    conn: &xcb::Connection,
    screen: &xcb::Screen<'_>,
    window_id: u32,
    geometry: &Geometry,
) -> Result<cairo::XCBSurface> {
    // Override-redirect keeps the window manager from decorating or moving
    // the popup. Values must be listed in ascending bit order.
    let values = [
        (xcb::CW_BACK_PIXEL, screen.black_pixel()),
        (xcb::CW_OVERRIDE_REDIRECT, 1),
        (
            xcb::CW_EVENT_MASK,
            xcb::EVENT_MASK_EXPOSURE
                | xcb::EVENT_MASK_KEY_PRESS
                | xcb::EVENT_MASK_VISIBILITY_CHANGE,
        ),
    ];

    xcb::create_window_checked(
        conn,
        xcb::COPY_FROM_PARENT as u8,
        window_id,
        screen.root(),
        geometry.x,
        geometry.y,
        geometry.width,
        geometry.height,
        0,
        xcb::WINDOW_CLASS_INPUT_OUTPUT as u16,
        screen.root_visual(),
        &values,
    )
    .request_check()
    .context("Failed to create the bar window")?;

    cairo_surface_for_xcb_window(
        conn,
        screen,
        window_id,
        i32::from(geometry.width),
        i32::from(geometry.height),
    )
}

/// The popup window and what it last showed.
pub struct Bar {
    // Dropped before `conn`, which it borrows a raw pointer from.
    surface: cairo::XCBSurface,

    conn: Rc<ewmh::Connection>,
    window_id: u32,
    geometry: Geometry,
    grabbed: bool,

    current: u32,
    max: u32,
}

impl Bar {
    /// Connects to the X server and shows an empty bar.
    ///
    /// Attributes whose bit in `mask` is clear take their default. An
    /// invalid attribute fails with a [`crate::BarError`].
    pub fn new(mask: AttrMask, attr: &BarAttributes) -> Result<Bar> {
        let (conn, screen_idx) =
            xcb::Connection::connect(None).context("Failed to connect to X server")?;
        let window_id = conn.generate_id();

        let (geometry, surface) = {
            let screen = conn
                .get_setup()
                .roots()
                .nth(screen_idx as usize)
                .ok_or_else(|| anyhow!("Invalid screen"))?;
            // Anything that isn't hex is looked up in the server's colour
            // database.
            let colormap = screen.default_colormap();
            let lookup = |name: &str| {
                let reply = xcb::lookup_color(&conn, colormap, name).get_reply().ok()?;
                Some(Color::from_rgb16(
                    reply.exact_red(),
                    reply.exact_green(),
                    reply.exact_blue(),
                ))
            };
            let geometry = Geometry::resolve_with(
                mask,
                attr,
                screen.width_in_pixels(),
                screen.height_in_pixels(),
                lookup,
            )?;
            debug!(
                "Bar geometry: {}x{}+{}+{}",
                geometry.width, geometry.height, geometry.x, geometry.y
            );
            let surface = create_window(&conn, &screen, window_id, &geometry)?;
            (geometry, surface)
        };

        let ewmh_conn = ewmh::Connection::connect(conn)
            .map_err(|(e, _)| e)
            .context("Failed to wrap xcb::Connection in ewmh::Connection")?;

        let bar = Bar {
            surface,
            conn: Rc::new(ewmh_conn),
            window_id,
            geometry,
            grabbed: false,
            current: 0,
            max: 0,
        };
        bar.set_ewmh_properties();
        bar.map_raised();
        bar.flush();

        Ok(bar)
    }

    fn flush(&self) {
        self.conn.flush();
    }

    fn set_ewmh_properties(&self) {
        ewmh::set_wm_name(&self.conn, self.window_id, "xbbar");
        ewmh::set_wm_window_type(
            &self.conn,
            self.window_id,
            &[self.conn.WM_WINDOW_TYPE_NOTIFICATION()],
        );
    }

    fn raise(&self) {
        let values = [(xcb::CONFIG_WINDOW_STACK_MODE as u16, xcb::STACK_MODE_ABOVE)];
        xcb::configure_window(&self.conn, self.window_id, &values);
    }

    fn map_raised(&self) {
        xcb::map_window(&self.conn, self.window_id);
        self.raise();
    }

    // Returns the connection to the X server.
    //
    // The owner of the `Bar` is responsible for polling this for events,
    // passing each to `Bar::process_event()`.
    pub fn connection(&self) -> &Rc<ewmh::Connection> {
        &self.conn
    }

    /// Takes over the keyboard so that key presses reach the bar even though
    /// the window manager never focuses it.
    ///
    /// Retries for about a second while another client holds the keyboard,
    /// yielding to the runtime between attempts.
    pub async fn grab_keyboard(&mut self) -> Result<()> {
        let conn = &self.conn;
        let window_id = self.window_id;
        let grabbed = retry(GRAB_ATTEMPTS, GRAB_RETRY_DELAY, || {
            let reply = xcb::grab_keyboard(
                conn,
                true,
                window_id,
                xcb::CURRENT_TIME,
                xcb::GRAB_MODE_ASYNC as u8,
                xcb::GRAB_MODE_ASYNC as u8,
            )
            .get_reply()
            .context("Failed to grab the keyboard")?;
            Ok(reply.status() == xcb::GRAB_STATUS_SUCCESS as u8)
        })
        .await?;
        if !grabbed {
            bail!("Cannot grab keyboard: another client is holding it");
        }
        self.grabbed = true;
        Ok(())
    }

    /// Shows `current` out of `max`.
    pub fn draw(&mut self, current: u32, max: u32) -> Result<()> {
        self.current = current;
        self.max = max;
        self.redraw()
    }

    pub fn redraw(&self) -> Result<()> {
        let context = cairo::Context::new(&self.surface)?;
        context.set_line_width(1.0);

        for shape in self.geometry.layout(self.current, self.max) {
            self.geometry.color(shape.role).apply_to_context(&context);
            let rect = shape.rect;
            let (x, y) = (f64::from(rect.x), f64::from(rect.y));
            let (width, height) = (f64::from(rect.width), f64::from(rect.height));
            match shape.kind {
                // Stroke through pixel centres to hit the same pixels an X
                // core rectangle would.
                ShapeKind::Outline => {
                    context.rectangle(x + 0.5, y + 0.5, width, height);
                    context.stroke()?;
                }
                ShapeKind::Fill => {
                    context.rectangle(x, y, width, height);
                    context.fill()?;
                }
            }
        }

        self.surface.flush();
        self.flush();
        Ok(())
    }

    // Process an X event received from the `Bar::connection()`.
    //
    // Returns the keysym of any key that was pressed, looked up in `keymap`.
    pub fn process_event(
        &mut self,
        event: xcb::GenericEvent,
        keymap: &Keymap<'_>,
    ) -> Result<Option<u32>> {
        match event.response_type() & !0x80 {
            xcb::EXPOSE => {
                let expose: &xcb::ExposeEvent = unsafe { xcb::cast_event(&event) };
                if expose.count() == 0 {
                    trace!("Redrawing bar - expose event.");
                    self.redraw()?;
                }
            }
            xcb::KEY_PRESS => {
                let press: &xcb::KeyPressEvent = unsafe { xcb::cast_event(&event) };
                let keysym = keymap.press_keysym(press);
                trace!("Key press: keycode {} keysym {:#x}", press.detail(), keysym);
                return Ok(Some(keysym));
            }
            xcb::VISIBILITY_NOTIFY => {
                // Stay on top of anything that gets mapped over us.
                self.raise();
                self.flush();
            }
            _ => {}
        }
        Ok(None)
    }
}

impl Drop for Bar {
    fn drop(&mut self) {
        self.surface.finish();
        if self.grabbed {
            xcb::ungrab_keyboard(&self.conn, xcb::CURRENT_TIME);
        }
        xcb::destroy_window(&self.conn, self.window_id);
        self.flush();
    }
}
