//! Cancellation-handle wrappers over the browser's timer primitives. The
//! runtime holds one handle per registration and drops them all before
//! installing a fresh session, so no stale callback can outlive a restart.
//! Handles clear their underlying timer on drop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::window;

/// A running `setInterval` registration.
pub struct IntervalHandle {
    id: i32,
    _closure: Closure<dyn FnMut()>,
}

impl Drop for IntervalHandle {
    fn drop(&mut self) {
        if let Some(w) = window() {
            w.clear_interval_with_handle(self.id);
        }
    }
}

/// Registers a periodic callback. The handle keeps the closure alive.
pub fn interval(period_ms: i32, f: impl FnMut() + 'static) -> Result<IntervalHandle, JsValue> {
    let closure = Closure::wrap(Box::new(f) as Box<dyn FnMut()>);
    let w = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let id = w.set_interval_with_callback_and_timeout_and_arguments_0(
        closure.as_ref().unchecked_ref(),
        period_ms,
    )?;
    Ok(IntervalHandle {
        id,
        _closure: closure,
    })
}

/// A pending `setTimeout` registration.
pub struct TimeoutHandle {
    id: i32,
    _closure: Closure<dyn FnMut()>,
}

impl Drop for TimeoutHandle {
    fn drop(&mut self) {
        if let Some(w) = window() {
            w.clear_timeout_with_handle(self.id);
        }
    }
}

/// Registers a one-shot callback.
pub fn once(delay_ms: i32, f: impl FnOnce() + 'static) -> Result<TimeoutHandle, JsValue> {
    // setTimeout wants an FnMut slot; the Option makes the FnOnce callable.
    let mut f = Some(f);
    let closure = Closure::wrap(Box::new(move || {
        if let Some(f) = f.take() {
            f();
        }
    }) as Box<dyn FnMut()>);
    let w = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let id = w.set_timeout_with_callback_and_timeout_and_arguments_0(
        closure.as_ref().unchecked_ref(),
        delay_ms,
    )?;
    Ok(TimeoutHandle {
        id,
        _closure: closure,
    })
}

type FrameClosure = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// A self-rescheduling `requestAnimationFrame` loop.
pub struct FrameLoopHandle {
    active: Rc<Cell<bool>>,
    pending: Rc<Cell<i32>>,
    slot: FrameClosure,
}

impl FrameLoopHandle {
    pub fn cancel(&self) {
        self.active.set(false);
        if let Some(w) = window() {
            let _ = w.cancel_animation_frame(self.pending.get());
        }
    }
}

impl Drop for FrameLoopHandle {
    fn drop(&mut self) {
        self.cancel();
        // Break the closure's self-reference so it can actually free.
        if let Ok(mut slot) = self.slot.try_borrow_mut() {
            let _ = slot.take();
        }
    }
}

/// Starts a frame loop delivering `performance.now()`-based timestamps every
/// animation frame until the handle is cancelled or dropped.
pub fn frames(mut f: impl FnMut(f64) + 'static) -> Result<FrameLoopHandle, JsValue> {
    let active = Rc::new(Cell::new(true));
    let pending = Rc::new(Cell::new(0));
    let slot: FrameClosure = Rc::new(RefCell::new(None));

    let a = active.clone();
    let p = pending.clone();
    let s = slot.clone();
    *slot.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
        if !a.get() {
            return;
        }
        f(ts);
        // The callback itself may have cancelled the loop.
        if !a.get() {
            return;
        }
        if let Some(w) = window() {
            if let Some(cb) = s.borrow().as_ref() {
                if let Ok(id) = w.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    p.set(id);
                }
            }
        }
    }) as Box<dyn FnMut(f64)>));

    let w = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let id = w.request_animation_frame(
        slot.borrow().as_ref().unwrap().as_ref().unchecked_ref(),
    )?;
    pending.set(id);
    Ok(FrameLoopHandle {
        active,
        pending,
        slot,
    })
}
