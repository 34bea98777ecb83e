//! Browser runtime: wires the pure session reducers to DOM events, browser
//! timers, and a canvas renderer. All mutable state lives in a thread-local
//! `RefCell` and every callback goes through it, so the whole game runs on
//! the single JS event-loop thread.

use std::cell::RefCell;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{window, CanvasRenderingContext2d, Document, HtmlCanvasElement};

use crate::scheduler::{self, FrameLoopHandle, IntervalHandle, TimeoutHandle};
use crate::session::{
    lane_x, CountdownEvent, GameSession, Hooks, Lane, LcgLanes, Phase, Snapshot, SpeedTier,
    BUTTON_WIDTH, HIT_BAND, INITIAL_TIME_SECS, SPAWN_INTERVAL_MS, SPEED_UP_DELAY_MS, TRACK_LENGTH,
};

const CANVAS_WIDTH: u32 = 640;

/// Scheduler registrations for one playthrough. Dropping this cancels every
/// timer, which is exactly what restart does before building a new session.
#[derive(Default)]
struct Handles {
    spawn: Option<IntervalHandle>,
    countdown: Option<IntervalHandle>,
    speed_up: Option<TimeoutHandle>,
    frames: Option<FrameLoopHandle>,
}

struct GameRuntime {
    session: GameSession,
    lanes: LcgLanes,
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    last_frame_ms: Option<f64>,
    handles: Handles,
}

thread_local! {
    static GAME: RefCell<Option<GameRuntime>> = RefCell::new(None);
    static LISTENERS_WIRED: std::cell::Cell<bool> = std::cell::Cell::new(false);
}

// --- Entry points ------------------------------------------------------------

pub fn start() -> Result<(), JsValue> {
    let win = window().ok_or_else(|| JsValue::from_str("no window"))?;
    let doc = win
        .document()
        .ok_or_else(|| JsValue::from_str("no document"))?;

    let canvas = ensure_canvas(&doc)?;
    ensure_overlay(&doc, "zl-score", "Score: 0", "top:10px; left:10px;")?;
    ensure_overlay(
        &doc,
        "zl-timer",
        &format!("Time: {}", INITIAL_TIME_SECS),
        "top:10px; left:130px;",
    )?;
    ensure_game_over_overlay(&doc)?;
    wire_listeners(&doc, &canvas)?;

    build_runtime(canvas)
}

pub fn restart() -> Result<(), JsValue> {
    // Drop the old runtime first: its handles cancel on drop, so no timer
    // from the previous playthrough can reach the new session.
    GAME.with(|cell| {
        let _ = cell.borrow_mut().take();
    });

    let doc = window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))?;
    if let Some(el) = doc.get_element_by_id("zl-score") {
        el.set_text_content(Some("Score: 0"));
    }
    if let Some(el) = doc.get_element_by_id("zl-over") {
        el.set_attribute("style", &game_over_style("none"))?;
    }
    let canvas: HtmlCanvasElement = doc
        .get_element_by_id("zl-canvas")
        .ok_or_else(|| JsValue::from_str("no canvas"))?
        .dyn_into()?;
    build_runtime(canvas)
}

fn build_runtime(canvas: HtmlCanvasElement) -> Result<(), JsValue> {
    let ctx: CanvasRenderingContext2d = canvas.get_context("2d")?.unwrap().dyn_into()?;
    ctx.set_font("40px 'Fira Code', monospace");
    ctx.set_text_align("center");

    let mut session = GameSession::with_hooks(Hooks {
        on_score_change: Box::new(|score| {
            if let Some(doc) = window().and_then(|w| w.document()) {
                if let Some(el) = doc.get_element_by_id("zl-score") {
                    el.set_text_content(Some(&format!("Score: {}", score)));
                }
            }
        }),
        on_game_over: Box::new(|| {
            if let Some(doc) = window().and_then(|w| w.document()) {
                if let Some(el) = doc.get_element_by_id("zl-over") {
                    let _ = el.set_attribute("style", &game_over_style("block"));
                }
            }
        }),
    });
    session.set_container_width(canvas.client_width() as f64);

    let runtime = GameRuntime {
        session,
        lanes: LcgLanes::new(lane_seed()),
        canvas,
        ctx,
        last_frame_ms: None,
        handles: Handles::default(),
    };
    GAME.with(|cell| cell.replace(Some(runtime)));

    // Spawn and countdown run on their own 1 s cadences, the frame loop on
    // the display refresh. Handles land in the runtime so restart can revoke
    // them as a unit.
    let spawn = scheduler::interval(SPAWN_INTERVAL_MS, || {
        GAME.with(|cell| {
            if let Some(rt) = cell.borrow_mut().as_mut() {
                let GameRuntime { session, lanes, .. } = rt;
                session.spawn_tick(lanes);
            }
        });
    })?;
    let countdown = scheduler::interval(1000, || {
        let event = GAME.with(|cell| {
            cell.borrow_mut()
                .as_mut()
                .and_then(|rt| rt.session.countdown_tick())
        });
        if event == Some(CountdownEvent::WarningEntered) {
            schedule_speed_up();
        }
        // Finished: spawn/countdown teardown happens on the next frame so we
        // never drop the interval closure that is currently executing.
    })?;
    let frames = scheduler::frames(|now| {
        GAME.with(|cell| {
            if let Some(rt) = cell.borrow_mut().as_mut() {
                frame(rt, now);
            }
        });
    })?;

    GAME.with(|cell| {
        if let Some(rt) = cell.borrow_mut().as_mut() {
            rt.handles.spawn = Some(spawn);
            rt.handles.countdown = Some(countdown);
            rt.handles.frames = Some(frames);
        }
    });
    Ok(())
}

fn schedule_speed_up() {
    let handle = scheduler::once(SPEED_UP_DELAY_MS, || {
        GAME.with(|cell| {
            if let Some(rt) = cell.borrow_mut().as_mut() {
                rt.session.enter_sped_up();
            }
        });
    });
    if let Ok(handle) = handle {
        GAME.with(|cell| {
            if let Some(rt) = cell.borrow_mut().as_mut() {
                rt.handles.speed_up = Some(handle);
            }
        });
    }
}

// --- Per-frame work ----------------------------------------------------------

fn frame(rt: &mut GameRuntime, now: f64) {
    let delta = match rt.last_frame_ms {
        Some(prev) => now - prev,
        None => 0.0,
    };
    rt.last_frame_ms = Some(now);
    rt.session.frame_tick(delta);

    // Countdown hit zero: revoke the periodic timers. Doing it here (from the
    // frame closure) never drops a closure mid-call.
    if rt.session.phase() == Phase::Over {
        rt.handles.spawn = None;
        rt.handles.countdown = None;
        rt.handles.speed_up = None;
    }

    let snap = rt.session.snapshot();
    if let Some(doc) = window().and_then(|w| w.document()) {
        if let Some(el) = doc.get_element_by_id("zl-timer") {
            el.set_text_content(Some(&format!("Time: {}", snap.time_remaining)));
        }
    }
    render(rt, &snap);
}

fn render(rt: &GameRuntime, snap: &Snapshot) {
    let ctx = &rt.ctx;
    let w = rt.canvas.width() as f64;
    let h = rt.canvas.height() as f64;

    ctx.set_fill_style(&JsValue::from_str("#1f2430"));
    ctx.fill_rect(0.0, 0.0, w, h);

    // Lane guides and the hit-band marker.
    ctx.set_stroke_style(&JsValue::from_str("#2e3545"));
    ctx.set_line_width(2.0);
    for lane in Lane::ALL {
        let x = lane_x(lane, w);
        line(ctx, x, 0.0, x, h);
    }
    ctx.set_stroke_style(&JsValue::from_str("#4a5568"));
    line(ctx, 0.0, HIT_BAND.0, w, HIT_BAND.0);

    // Lane hit zones along the bottom; the active one lights up briefly.
    for lane in Lane::ALL {
        let x = lane_x(lane, w);
        let color = if snap.active_lane == Some(lane) {
            "#3b82f6"
        } else {
            "#303a4e"
        };
        ctx.set_fill_style(&JsValue::from_str(color));
        ctx.fill_rect(x - BUTTON_WIDTH / 2.0, h - 48.0, BUTTON_WIDTH, 40.0);
    }

    // Zombies travel top to bottom; fast ones tint red.
    for z in &snap.zombies {
        let color = match z.tier {
            SpeedTier::Normal => "#9ae66e",
            SpeedTier::Fast => "#ff6b6b",
        };
        ctx.set_fill_style(&JsValue::from_str(color));
        ctx.set_stroke_style(&JsValue::from_str("#000"));
        ctx.set_line_width(5.0);
        let _ = ctx.stroke_text("🧟", z.x, z.position);
        let _ = ctx.fill_text("🧟", z.x, z.position);
    }

    if snap.phase == Phase::Warning {
        ctx.set_fill_style(&JsValue::from_str("#facc15"));
        let _ = ctx.fill_text("Hurry!", w / 2.0, 60.0);
    }
}

fn line(ctx: &CanvasRenderingContext2d, x1: f64, y1: f64, x2: f64, y2: f64) {
    ctx.begin_path();
    ctx.move_to(x1, y1);
    ctx.line_to(x2, y2);
    ctx.stroke();
}

// --- DOM setup & input -------------------------------------------------------

fn ensure_canvas(doc: &Document) -> Result<HtmlCanvasElement, JsValue> {
    if let Some(el) = doc.get_element_by_id("zl-canvas") {
        return Ok(el.dyn_into()?);
    }
    let c: HtmlCanvasElement = doc.create_element("canvas")?.dyn_into()?;
    c.set_id("zl-canvas");
    c.set_width(CANVAS_WIDTH);
    c.set_height(TRACK_LENGTH as u32);
    c.set_attribute(
        "style",
        "position:fixed; left:50%; top:50%; transform:translate(-50%,-50%); \
         border:2px solid #222; border-radius:12px; background:#181818; z-index:20;",
    )?;
    doc.body().unwrap().append_child(&c)?;
    Ok(c)
}

fn overlay_style(extra: &str) -> String {
    format!(
        "position:fixed; font-family:'Fira Code', monospace; font-size:15px; \
         padding:4px 8px; background:rgba(0,0,0,0.42); border:1px solid #333; \
         border-radius:6px; z-index:44; {}",
        extra
    )
}

fn ensure_overlay(doc: &Document, id: &str, text: &str, pos: &str) -> Result<(), JsValue> {
    if doc.get_element_by_id(id).is_none() {
        if let Some(body) = doc.body() {
            let div = doc.create_element("div")?;
            div.set_id(id);
            div.set_text_content(Some(text));
            div.set_attribute("style", &overlay_style(pos))?;
            body.append_child(&div)?;
        }
    }
    Ok(())
}

fn game_over_style(display: &str) -> String {
    overlay_style(&format!(
        "display:{}; left:50%; top:30%; transform:translate(-50%,-50%); font-size:32px;",
        display
    ))
}

fn ensure_game_over_overlay(doc: &Document) -> Result<(), JsValue> {
    if doc.get_element_by_id("zl-over").is_none() {
        if let Some(body) = doc.body() {
            let div = doc.create_element("div")?;
            div.set_id("zl-over");
            div.set_text_content(Some("Game over"));
            div.set_attribute("style", &game_over_style("none"))?;
            body.append_child(&div)?;
        }
    }
    Ok(())
}

/// Installs the keydown / click / resize listeners once. Listener closures go
/// through the thread-local, so they survive restarts without rewiring; they
/// are intentionally leaked for the page's lifetime.
fn wire_listeners(doc: &Document, canvas: &HtmlCanvasElement) -> Result<(), JsValue> {
    if LISTENERS_WIRED.with(|w| w.get()) {
        return Ok(());
    }

    // a / s / d map to the three lanes; anything else is ignored.
    let keydown = Closure::wrap(Box::new(move |evt: web_sys::KeyboardEvent| {
        let lane = match evt.key().to_ascii_lowercase().as_str() {
            "a" => Lane::Left,
            "s" => Lane::Middle,
            "d" => Lane::Right,
            _ => return,
        };
        GAME.with(|cell| {
            if let Some(rt) = cell.borrow_mut().as_mut() {
                let _ = rt.session.select_lane(lane);
            }
        });
    }) as Box<dyn FnMut(_)>);
    doc.add_event_listener_with_callback("keydown", keydown.as_ref().unchecked_ref())?;
    keydown.forget();

    // Clicking a lane's hit zone shoots that lane.
    let click_canvas = canvas.clone();
    let click = Closure::wrap(Box::new(move |evt: web_sys::MouseEvent| {
        let x = evt.offset_x() as f64;
        let w = click_canvas.width() as f64;
        let lane = Lane::ALL
            .into_iter()
            .find(|&lane| (x - lane_x(lane, w)).abs() <= BUTTON_WIDTH / 2.0);
        if let Some(lane) = lane {
            GAME.with(|cell| {
                if let Some(rt) = cell.borrow_mut().as_mut() {
                    let _ = rt.session.select_lane(lane);
                }
            });
        }
    }) as Box<dyn FnMut(_)>);
    canvas.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())?;
    click.forget();

    // Resize refreshes the lane-geometry basis; the reducers never recompute
    // it on their own.
    let resize_canvas = canvas.clone();
    let resize = Closure::wrap(Box::new(move |_evt: web_sys::Event| {
        let width = resize_canvas.client_width() as f64;
        GAME.with(|cell| {
            if let Some(rt) = cell.borrow_mut().as_mut() {
                rt.session.set_container_width(width);
            }
        });
    }) as Box<dyn FnMut(_)>);
    window()
        .ok_or_else(|| JsValue::from_str("no window"))?
        .add_event_listener_with_callback("resize", resize.as_ref().unchecked_ref())?;
    resize.forget();

    LISTENERS_WIRED.with(|w| w.set(true));
    Ok(())
}

// --- Seeding -----------------------------------------------------------------

fn lane_seed() -> u64 {
    #[cfg(feature = "rng")]
    {
        let mut buf = [0u8; 8];
        if getrandom::getrandom(&mut buf).is_ok() {
            return u64::from_le_bytes(buf);
        }
    }
    window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or(0.0)
        .to_bits()
}
