//! Zombie Lanes core crate.
//!
//! A timed reaction minigame: zombies spawn in one of three lanes and travel
//! down a 600-unit track; the player shoots a lane (click or `a`/`s`/`d`) to
//! kill a zombie inside the hit band before the countdown expires, with a
//! late-game speed-up. The gameplay core in [`session`] is pure and natively
//! testable; `game` wires it to the browser via wasm-bindgen.

use wasm_bindgen::prelude::*;

mod game;
mod scheduler;
pub mod session;

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Builds the playfield DOM, wires input listeners, and starts a playthrough.
#[wasm_bindgen]
pub fn start_game() -> Result<(), JsValue> {
    game::start()
}

/// Discards the current playthrough, cancelling all of its timers, and
/// starts a fresh one with default score, countdown, and an empty track.
#[wasm_bindgen]
pub fn restart_game() -> Result<(), JsValue> {
    game::restart()
}
