//! Wall clock and interval scheduling over the browser timer APIs.

use starpath_game::Clock;
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

use crate::dom::window;

/// Cancellation handle for a scheduled interval.
///
/// Keeps the backing closure alive for as long as the interval may fire.
pub struct IntervalHandle {
    id: i32,
    _callback: Closure<dyn FnMut()>,
}

/// Clock collaborator over `Date.now` and `setInterval`.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebClock;

impl WebClock {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Clock for WebClock {
    type Handle = IntervalHandle;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn now_millis(&self) -> u64 {
        js_sys::Date::now() as u64
    }

    /// # Panics
    /// Panics if no browser `window` is available to schedule the interval.
    fn schedule_repeating(&self, interval_ms: u64, callback: Box<dyn FnMut()>) -> Self::Handle {
        let callback = Closure::wrap(callback);
        let interval = i32::try_from(interval_ms).unwrap_or(i32::MAX);
        let id = window()
            .set_interval_with_callback_and_timeout_and_arguments_0(
                callback.as_ref().unchecked_ref(),
                interval,
            )
            .expect("`setInterval` should be schedulable in web context");
        IntervalHandle {
            id,
            _callback: callback,
        }
    }

    fn cancel(&self, handle: &Self::Handle) {
        window().clear_interval_with_handle(handle.id);
    }
}
