//! Pure gameplay core: lanes, zombies, and the per-playthrough session state
//! machine. Nothing in here touches the DOM or timers; the wasm runtime in
//! `game.rs` drives these reducers from browser callbacks, and the native
//! tests drive them directly.

// --- Tunables ----------------------------------------------------------------

/// Track units a normal-tier zombie travels per reference frame.
pub const ZOMBIE_SPEED: f64 = 4.0;
/// Frame duration the speed constant is normalized against (ms).
pub const REFERENCE_FRAME_MS: f64 = 16.0;
/// Spawn cadence (ms).
pub const SPAWN_INTERVAL_MS: i32 = 1000;
/// A zombie at or past this travel distance has left the track.
pub const TRACK_LENGTH: f64 = 600.0;
/// Open interval of travel positions in which a zombie can be hit.
pub const HIT_BAND: (f64, f64) = (300.0, 600.0);
/// Lane slot width and gap (px), used to center the three lanes.
pub const BUTTON_WIDTH: f64 = 160.0;
pub const BUTTON_GAP: f64 = 8.0;
/// Countdown start and the remaining-seconds mark that begins the warning.
pub const INITIAL_TIME_SECS: u32 = 20;
pub const WARNING_AT_SECS: u32 = 10;
/// Delay between entering the warning phase and the speed-up (ms).
pub const SPEED_UP_DELAY_MS: i32 = 2000;
/// Lifetime of the transient active-lane highlight (ms of frame time).
pub const FEEDBACK_MS: f64 = 100.0;
/// Travel-speed multiplier for fast-tier zombies.
pub const FAST_MULTIPLIER: f64 = 2.0;

// --- Lanes & geometry --------------------------------------------------------

/// One of the three fixed tracks zombies travel along.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lane {
    Left,
    Middle,
    Right,
}

impl Lane {
    pub const ALL: [Lane; 3] = [Lane::Left, Lane::Middle, Lane::Right];

    fn slot(self) -> f64 {
        match self {
            Lane::Left => 0.0,
            Lane::Middle => 1.0,
            Lane::Right => 2.0,
        }
    }
}

/// Horizontal center of a lane's slot, given the container width. Three
/// fixed-width slots with fixed gaps, centered as a group. A zero or negative
/// width degrades to a zero left offset rather than failing.
pub fn lane_x(lane: Lane, container_width: f64) -> f64 {
    let group = BUTTON_WIDTH * 3.0 + BUTTON_GAP * 2.0;
    let start = if container_width > group {
        (container_width - group) / 2.0
    } else {
        0.0
    };
    start + lane.slot() * (BUTTON_WIDTH + BUTTON_GAP) + BUTTON_WIDTH / 2.0
}

// --- Lane randomness ---------------------------------------------------------

/// Source of spawn lanes. Production uses [`LcgLanes`]; tests script the
/// sequence to make spawns deterministic.
pub trait LaneSource {
    fn next_lane(&mut self) -> Lane;
}

/// Linear congruential lane picker. Not crypto secure; good enough to spread
/// spawns across lanes.
pub struct LcgLanes {
    state: u64,
}

impl LcgLanes {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }
}

impl LaneSource for LcgLanes {
    fn next_lane(&mut self) -> Lane {
        self.state = self.state.wrapping_mul(1664525).wrapping_add(1013904223);
        // Low bits of an LCG are weak; index off the upper half.
        Lane::ALL[((self.state >> 16) % 3) as usize]
    }
}

// --- Entities & phases -------------------------------------------------------

/// Travel-speed tier. Everything alive or spawned during the sped-up phase is
/// `Fast`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpeedTier {
    Normal,
    Fast,
}

impl SpeedTier {
    fn multiplier(self) -> f64 {
        match self {
            SpeedTier::Normal => 1.0,
            SpeedTier::Fast => FAST_MULTIPLIER,
        }
    }
}

/// Countdown stage. Transitions are strictly one-directional:
/// `Running -> Warning -> SpedUp -> Over`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Running,
    Warning,
    SpedUp,
    Over,
}

/// A live zombie. `position` is distance traveled along the track, 0 at
/// spawn; it only ever grows. `lane` never changes after spawn.
#[derive(Clone, Debug)]
pub struct Zombie {
    pub id: u64,
    pub lane: Lane,
    pub position: f64,
    pub tier: SpeedTier,
}

// --- Host callbacks ----------------------------------------------------------

/// Outbound callbacks to the host. `on_score_change` fires once per
/// successful hit with the new score; `on_game_over` fires exactly once per
/// playthrough.
pub struct Hooks {
    pub on_score_change: Box<dyn FnMut(u32)>,
    pub on_game_over: Box<dyn FnMut()>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            on_score_change: Box::new(|_| {}),
            on_game_over: Box::new(|| {}),
        }
    }
}

// --- Snapshot ----------------------------------------------------------------

/// Per-zombie render state: lane center x comes from the session's current
/// container width.
#[derive(Clone, Debug)]
pub struct ZombieView {
    pub id: u64,
    pub lane: Lane,
    pub x: f64,
    pub position: f64,
    pub tier: SpeedTier,
}

/// Read-only render state taken once per frame.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub score: u32,
    pub time_remaining: u32,
    pub phase: Phase,
    pub active_lane: Option<Lane>,
    pub zombies: Vec<ZombieView>,
}

/// Signal returned by [`GameSession::countdown_tick`] when the tick crossed a
/// phase boundary the runtime must act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CountdownEvent {
    /// Warning phase entered; schedule the speed-up one-shot.
    WarningEntered,
    /// Countdown hit zero; cancel spawn/countdown timers.
    Finished,
}

// --- Session -----------------------------------------------------------------

/// All mutable state for one playthrough. Each external event source (spawn
/// timer, frame callback, countdown timer, lane input) has exactly one
/// reducer; every reducer is a no-op once the phase is `Over`, so a timer
/// misfire after teardown cannot corrupt anything.
pub struct GameSession {
    score: u32,
    time_remaining: u32,
    phase: Phase,
    zombies: Vec<Zombie>,
    next_id: u64,
    container_width: f64,
    active_lane: Option<Lane>,
    feedback_ms_left: f64,
    hooks: Hooks,
}

impl GameSession {
    pub fn new() -> Self {
        Self::with_hooks(Hooks::default())
    }

    pub fn with_hooks(hooks: Hooks) -> Self {
        Self {
            score: 0,
            time_remaining: INITIAL_TIME_SECS,
            phase: Phase::Running,
            zombies: Vec::new(),
            next_id: 0,
            container_width: 0.0,
            active_lane: None,
            feedback_ms_left: 0.0,
            hooks,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn zombies(&self) -> &[Zombie] {
        &self.zombies
    }

    pub fn active_lane(&self) -> Option<Lane> {
        self.active_lane
    }

    /// Tier applied to newly spawned zombies under the current phase.
    pub fn current_tier(&self) -> SpeedTier {
        if self.phase == Phase::SpedUp {
            SpeedTier::Fast
        } else {
            SpeedTier::Normal
        }
    }

    /// Updates the geometry basis. Non-positive widths are kept as-is and
    /// degrade to a zero lane offset in `lane_x`.
    pub fn set_container_width(&mut self, px: f64) {
        self.container_width = px;
    }

    /// Spawn-timer reducer: appends one zombie in a random lane at the track
    /// start, tagged with the session's current tier.
    pub fn spawn_tick(&mut self, lanes: &mut dyn LaneSource) {
        if self.phase == Phase::Over {
            return;
        }
        let zombie = Zombie {
            id: self.next_id,
            lane: lanes.next_lane(),
            position: 0.0,
            tier: self.current_tier(),
        };
        self.next_id += 1;
        self.zombies.push(zombie);
    }

    /// Frame reducer: advances every zombie by elapsed time normalized to the
    /// reference frame, drops the ones that left the track (silently; a
    /// missed zombie costs nothing), and decays the active-lane highlight.
    pub fn frame_tick(&mut self, delta_ms: f64) {
        if self.phase == Phase::Over {
            return;
        }
        let delta_ms = delta_ms.max(0.0);
        let step = ZOMBIE_SPEED * delta_ms / REFERENCE_FRAME_MS;
        for z in &mut self.zombies {
            z.position += step * z.tier.multiplier();
        }
        self.zombies.retain(|z| z.position < TRACK_LENGTH);

        if self.active_lane.is_some() {
            self.feedback_ms_left -= delta_ms;
            if self.feedback_ms_left <= 0.0 {
                self.active_lane = None;
                self.feedback_ms_left = 0.0;
            }
        }
    }

    /// Input reducer: attempts to hit a zombie in the given lane. The lane
    /// highlight is shown for hit and miss alike; only a hit inside the open
    /// hit band removes a zombie and scores. Returns whether a zombie was
    /// hit.
    pub fn select_lane(&mut self, lane: Lane) -> bool {
        if self.phase == Phase::Over {
            return false;
        }
        self.active_lane = Some(lane);
        self.feedback_ms_left = FEEDBACK_MS;

        let hit = self
            .zombies
            .iter()
            .position(|z| z.lane == lane && z.position > HIT_BAND.0 && z.position < HIT_BAND.1);
        match hit {
            Some(idx) => {
                let _ = self.zombies.remove(idx);
                self.score += 1;
                (self.hooks.on_score_change)(self.score);
                true
            }
            None => false,
        }
    }

    /// Countdown reducer: one second elapsed. Drives the phase machine and
    /// reports boundary crossings the runtime must react to.
    pub fn countdown_tick(&mut self) -> Option<CountdownEvent> {
        if self.phase == Phase::Over {
            return None;
        }
        self.time_remaining = self.time_remaining.saturating_sub(1);

        if self.time_remaining == 0 {
            self.phase = Phase::Over;
            self.zombies.clear();
            self.active_lane = None;
            (self.hooks.on_game_over)();
            return Some(CountdownEvent::Finished);
        }
        if self.time_remaining == WARNING_AT_SECS && self.phase == Phase::Running {
            self.phase = Phase::Warning;
            return Some(CountdownEvent::WarningEntered);
        }
        None
    }

    /// One-shot reducer fired `SPEED_UP_DELAY_MS` after the warning began.
    /// Everything alive speeds up; later spawns pick the fast tier up from
    /// `current_tier`.
    pub fn enter_sped_up(&mut self) {
        if self.phase != Phase::Warning {
            return;
        }
        self.phase = Phase::SpedUp;
        for z in &mut self.zombies {
            z.tier = SpeedTier::Fast;
        }
    }

    /// Read-only render state for the current frame.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            score: self.score,
            time_remaining: self.time_remaining,
            phase: self.phase,
            active_lane: self.active_lane,
            zombies: self
                .zombies
                .iter()
                .map(|z| ZombieView {
                    id: z.id,
                    lane: z.lane,
                    x: lane_x(z.lane, self.container_width),
                    position: z.position,
                    tier: z.tier,
                })
                .collect(),
        }
    }
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Scripted lane source cycling through a fixed sequence.
    struct Script(Vec<Lane>, usize);

    impl LaneSource for Script {
        fn next_lane(&mut self) -> Lane {
            let lane = self.0[self.1 % self.0.len()];
            self.1 += 1;
            lane
        }
    }

    #[test]
    fn lane_x_centers_slots_for_known_width() {
        // 640 wide: group = 3*160 + 2*8 = 496, start = 72.
        assert_eq!(lane_x(Lane::Left, 640.0), 152.0);
        assert_eq!(lane_x(Lane::Middle, 640.0), 320.0);
        assert_eq!(lane_x(Lane::Right, 640.0), 488.0);
    }

    #[test]
    fn lane_x_degrades_to_zero_offset_on_bad_width() {
        assert_eq!(lane_x(Lane::Left, 0.0), 80.0);
        assert_eq!(lane_x(Lane::Left, -20.0), 80.0);
        // Width smaller than the slot group also clamps to a zero offset.
        assert_eq!(lane_x(Lane::Middle, 100.0), 248.0);
    }

    #[test]
    fn lcg_lanes_covers_all_lanes() {
        let mut rng = LcgLanes::new(7);
        let mut seen = [false; 3];
        for _ in 0..64 {
            match rng.next_lane() {
                Lane::Left => seen[0] = true,
                Lane::Middle => seen[1] = true,
                Lane::Right => seen[2] = true,
            }
        }
        assert!(seen.iter().all(|&s| s), "64 draws should touch every lane");
    }

    #[test]
    fn spawn_uses_scripted_lane_and_fresh_id() {
        let mut s = GameSession::new();
        let mut lanes = Script(vec![Lane::Right, Lane::Left], 0);
        s.spawn_tick(&mut lanes);
        s.spawn_tick(&mut lanes);
        assert_eq!(s.zombies().len(), 2);
        assert_eq!(s.zombies()[0].lane, Lane::Right);
        assert_eq!(s.zombies()[1].lane, Lane::Left);
        assert_ne!(s.zombies()[0].id, s.zombies()[1].id);
        assert_eq!(s.zombies()[0].position, 0.0);
        assert_eq!(s.zombies()[0].tier, SpeedTier::Normal);
    }

    #[test]
    fn frame_tick_advances_by_reference_frames() {
        let mut s = GameSession::new();
        let mut lanes = Script(vec![Lane::Middle], 0);
        s.spawn_tick(&mut lanes);
        s.frame_tick(16.0);
        assert_eq!(s.zombies()[0].position, ZOMBIE_SPEED);
        s.frame_tick(32.0);
        assert_eq!(s.zombies()[0].position, ZOMBIE_SPEED * 3.0);
    }

    #[test]
    fn negative_delta_never_moves_zombies_backwards() {
        let mut s = GameSession::new();
        let mut lanes = Script(vec![Lane::Middle], 0);
        s.spawn_tick(&mut lanes);
        s.frame_tick(160.0);
        let before = s.zombies()[0].position;
        s.frame_tick(-50.0);
        assert_eq!(s.zombies()[0].position, before);
    }

    #[test]
    fn hit_band_bounds_are_strict() {
        let mut s = GameSession::new();
        let mut lanes = Script(vec![Lane::Left], 0);
        s.spawn_tick(&mut lanes);
        // Exactly on the low bound: miss.
        s.frame_tick(HIT_BAND.0 / ZOMBIE_SPEED * REFERENCE_FRAME_MS);
        assert_eq!(s.zombies()[0].position, HIT_BAND.0);
        assert!(!s.select_lane(Lane::Left));
        assert_eq!(s.score(), 0);
        // Just inside: hit.
        s.frame_tick(REFERENCE_FRAME_MS);
        assert!(s.select_lane(Lane::Left));
        assert_eq!(s.score(), 1);
    }

    #[test]
    fn feedback_clears_after_its_lifetime() {
        let mut s = GameSession::new();
        assert!(!s.select_lane(Lane::Middle));
        assert_eq!(s.active_lane(), Some(Lane::Middle));
        s.frame_tick(FEEDBACK_MS / 2.0);
        assert_eq!(s.active_lane(), Some(Lane::Middle));
        s.frame_tick(FEEDBACK_MS / 2.0);
        assert_eq!(s.active_lane(), None);
    }

    #[test]
    fn snapshot_reflects_geometry_basis() {
        let mut s = GameSession::new();
        s.set_container_width(640.0);
        let mut lanes = Script(vec![Lane::Middle], 0);
        s.spawn_tick(&mut lanes);
        let snap = s.snapshot();
        assert_eq!(snap.zombies.len(), 1);
        assert_eq!(snap.zombies[0].x, 320.0);
        assert_eq!(snap.phase, Phase::Running);
        assert_eq!(snap.time_remaining, INITIAL_TIME_SECS);
    }
}
