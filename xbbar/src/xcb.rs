use anyhow::Result;
use std::os::unix::io::AsRawFd;
use std::os::unix::io::RawFd;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use tokio::io::unix::AsyncFd;
use tokio_stream::Stream;
use xcb_util::{ewmh, keysyms};

// A wrapper around `ewmh::Connection` that exposes the underlying socket, so
// that tokio can tell us when the X server has sent something.
struct XcbEvented(Rc<ewmh::Connection>);

impl AsRawFd for XcbEvented {
    fn as_raw_fd(&self) -> RawFd {
        let conn: &xcb::Connection = &self.0;
        conn.as_raw_fd()
    }
}

// A `Stream` of `xcb::GenericEvent` for the provided connection.
//
// The stream ends if the socket can no longer be polled, which happens when
// the X server goes away.
pub struct XcbEventStream {
    conn: Rc<ewmh::Connection>,
    poll: AsyncFd<XcbEvented>,
    would_block: bool,
}

impl XcbEventStream {
    pub fn new(conn: Rc<ewmh::Connection>) -> Result<XcbEventStream> {
        let evented = XcbEvented(conn.clone());
        let poll = AsyncFd::with_interest(evented, tokio::io::Interest::READABLE)?;

        Ok(XcbEventStream {
            conn,
            poll,
            would_block: true,
        })
    }
}

impl Stream for XcbEventStream {
    type Item = xcb::GenericEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context) -> Poll<Option<Self::Item>> {
        let self_ = &mut *self;
        let mut ready = None;
        if self_.would_block {
            match self_.poll.poll_read_ready(cx) {
                Poll::Ready(Ok(r)) => {
                    ready = Some(r);
                    self_.would_block = false;
                }
                Poll::Ready(Err(e)) => {
                    error!("Error polling X connection: {e}");
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
        match self_.conn.poll_for_event() {
            Some(event) => Poll::Ready(Some(event)),
            None => {
                if let Err(e) = self_.conn.has_error() {
                    error!("X connection closed: {e:?}");
                    return Poll::Ready(None);
                }
                self_.would_block = true;
                if let Some(mut r) = ready {
                    r.clear_ready();
                }
                self.poll_next(cx)
            }
        }
    }
}

/// The server's keycode to keysym table, fetched once per connection.
pub struct Keymap<'a>(keysyms::KeySymbols<'a>);

impl<'a> Keymap<'a> {
    pub fn new(conn: &'a xcb::Connection) -> Self {
        Keymap(keysyms::KeySymbols::new(conn))
    }

    // Looks up the unshifted keysym for a key press.
    pub fn press_keysym(&self, event: &xcb::KeyPressEvent) -> u32 {
        self.0.press_lookup_keysym(event, 0)
    }
}
