//! Typed observable sinks for terminal events.
//!
//! Each terminal event kind gets its own [`EventEmitter`]. Handlers run on
//! the caller's stack; firing iterates over a snapshot of the subscriber
//! list, so a handler may cancel its own (or any other) subscription during
//! delivery without invalidating the iteration. Handler panics propagate to
//! the caller.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::terminal::cursor::CursorStyle;

type Handler<T> = Rc<RefCell<dyn FnMut(&T)>>;
type HandlerList<T> = Rc<RefCell<Vec<(u64, Handler<T>)>>>;

/// A multi-subscriber event sink.
pub struct EventEmitter<T> {
    handlers: HandlerList<T>,
    next_id: Cell<u64>,
}

impl<T> Default for EventEmitter<T> {
    fn default() -> Self {
        Self {
            handlers: Rc::new(RefCell::new(Vec::new())),
            next_id: Cell::new(0),
        }
    }
}

impl<T: 'static> EventEmitter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; the returned handle cancels it.
    pub fn subscribe(&self, handler: impl FnMut(&T) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.handlers
            .borrow_mut()
            .push((id, Rc::new(RefCell::new(handler))));

        let weak: Weak<RefCell<Vec<(u64, Handler<T>)>>> = Rc::downgrade(&self.handlers);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(handlers) = weak.upgrade() {
                    handlers.borrow_mut().retain(|(hid, _)| *hid != id);
                }
            })),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Deliver `payload` to every subscriber registered at the time of the
    /// call.
    pub fn fire(&self, payload: &T) {
        let snapshot: Vec<Handler<T>> = self
            .handlers
            .borrow()
            .iter()
            .map(|(_, h)| Rc::clone(h))
            .collect();
        for handler in snapshot {
            (handler.borrow_mut())(payload);
        }
    }
}

/// Cancellation handle returned by [`EventEmitter::subscribe`]. Dropping the
/// handle leaves the subscription active; call [`Subscription::cancel`] to
/// remove it.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Which screen buffer is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveBuffer {
    Normal,
    Alternate,
}

/// Window manipulations requested via CSI t.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOp {
    /// Move the window to pixel coordinates.
    Moved { x: i32, y: i32 },
    /// Resize the window to a pixel size.
    Resized { width: u32, height: u32 },
    Minimized,
    Maximized,
    Restored,
}

/// Information requested from the host via the CSI t report variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowInfoKind {
    /// CSI 11 t: is the window iconified?
    State,
    /// CSI 13 t: window position in pixels.
    Position,
    /// CSI 14 t: text area size in pixels.
    SizePixels,
    /// CSI 20 t: icon label.
    IconLabel,
    /// CSI 21 t: window title.
    Title,
}

/// Host-supplied answer to a [`WindowInfoRequest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowInfoReply {
    State { minimized: bool },
    Position { x: u32, y: u32 },
    SizePixels { width: u32, height: u32 },
    Text(String),
}

/// Payload of the `window_info_requested` sink. A subscriber answers by
/// calling [`WindowInfoRequest::respond`]; the terminal reads the reply
/// synchronously after delivery and encodes the device report. Without a
/// reply a conservative default is reported.
pub struct WindowInfoRequest {
    pub kind: WindowInfoKind,
    reply: Cell<Option<WindowInfoReply>>,
}

impl WindowInfoRequest {
    pub fn new(kind: WindowInfoKind) -> Self {
        Self {
            kind,
            reply: Cell::new(None),
        }
    }

    pub fn respond(&self, reply: WindowInfoReply) {
        self.reply.set(Some(reply));
    }

    pub(crate) fn take_reply(&self) -> Option<WindowInfoReply> {
        self.reply.take()
    }
}

/// Palette manipulations announced via OSC 4 / 104 / 110 / 111 / 112. The
/// core keeps no palette of its own; these are advisory for the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaletteChange {
    /// OSC 4: set palette entry `index` to an X11 color spec.
    Set { index: u8, spec: String },
    /// OSC 104 with an index: reset one entry; without: reset all.
    Reset { index: Option<u8> },
    /// OSC 110/111/112: reset default foreground / background / cursor color.
    ResetDefaultForeground,
    ResetDefaultBackground,
    ResetCursorColor,
}

/// Clipboard traffic from OSC 52. Payloads arrive already base64-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardEvent {
    Set { selection: String, text: String },
    Clear { selection: String },
    Query { selection: String },
}

/// The cursor style announced by DECSCUSR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorStyleChange {
    pub style: CursorStyle,
    pub blink: bool,
}

/// All event sinks exposed by a terminal instance.
#[derive(Default)]
pub struct TerminalEvents {
    /// Bytes to forward to the program (device reports, key/mouse input).
    pub data_out: EventEmitter<Vec<u8>>,
    /// Window or icon title changed (OSC 0/1/2).
    pub title_changed: EventEmitter<String>,
    /// BEL received.
    pub bell: EventEmitter<()>,
    /// Grid dimensions changed; payload is (cols, rows).
    pub resized: EventEmitter<(u16, u16)>,
    /// A line feed was performed.
    pub line_fed: EventEmitter<()>,
    /// DECSCUSR changed the cursor style.
    pub cursor_style_changed: EventEmitter<CursorStyleChange>,
    /// The active screen buffer switched.
    pub buffer_changed: EventEmitter<ActiveBuffer>,
    /// CSI t window manipulation.
    pub window_op: EventEmitter<WindowOp>,
    /// CSI t information request awaiting a host reply.
    pub window_info_requested: EventEmitter<WindowInfoRequest>,
    /// Rows touched since the previous write/resize completed.
    pub damage: EventEmitter<crate::terminal::buffer::Damage>,
    /// Advisory palette changes (OSC 4/104/110/111/112).
    pub palette_changed: EventEmitter<PaletteChange>,
    /// Hyperlink opened (Some) or closed (None) via OSC 8.
    pub hyperlink: EventEmitter<Option<String>>,
    /// Clipboard traffic via OSC 52.
    pub clipboard: EventEmitter<ClipboardEvent>,
    /// Working directory reported via OSC 7.
    pub cwd_changed: EventEmitter<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn fire_reaches_all_subscribers() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let a = Rc::clone(&seen);
        let _sub_a = emitter.subscribe(move |v| a.borrow_mut().push(*v));
        let b = Rc::clone(&seen);
        let _sub_b = emitter.subscribe(move |v| b.borrow_mut().push(*v * 10));

        emitter.fire(&7);
        assert_eq!(*seen.borrow(), vec![7, 70]);
    }

    #[test]
    fn cancel_removes_subscription() {
        let emitter: EventEmitter<u32> = EventEmitter::new();
        let seen = Rc::new(RefCell::new(0u32));

        let s = Rc::clone(&seen);
        let sub = emitter.subscribe(move |v| *s.borrow_mut() += *v);
        emitter.fire(&1);
        sub.cancel();
        emitter.fire(&1);
        assert_eq!(*seen.borrow(), 1);
        assert_eq!(emitter.subscriber_count(), 0);
    }

    #[test]
    fn cancel_during_delivery_is_safe() {
        let emitter: Rc<EventEmitter<()>> = Rc::new(EventEmitter::new());
        let seen = Rc::new(RefCell::new(0u32));

        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let slot_clone = Rc::clone(&slot);
        let s = Rc::clone(&seen);
        let sub = emitter.subscribe(move |_| {
            *s.borrow_mut() += 1;
            // cancel self mid-delivery
            if let Some(sub) = slot_clone.borrow_mut().take() {
                sub.cancel();
            }
        });
        *slot.borrow_mut() = Some(sub);

        emitter.fire(&());
        emitter.fire(&());
        assert_eq!(*seen.borrow(), 1);
    }

    #[test]
    fn window_info_request_round_trip() {
        let request = WindowInfoRequest::new(WindowInfoKind::SizePixels);
        assert!(request.take_reply().is_none());
        request.respond(WindowInfoReply::SizePixels {
            width: 640,
            height: 480,
        });
        assert_eq!(
            request.take_reply(),
            Some(WindowInfoReply::SizePixels {
                width: 640,
                height: 480
            })
        );
    }
}
