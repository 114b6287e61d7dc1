//! Momentum Scroll Tracking
//!
//! Converts raw pointer events into a 2D scroll offset:
//! - Press: grab, cancel any coasting
//! - Drag: damped delta added to the offset, velocity smoothed by EMA
//! - Release: coast, decaying velocity each frame until it settles
//! - Wheel: immediate delta plus the same coasting
//!
//! Mouse and single-touch input share one code path. A second finger is
//! ignored until the first one lifts.

/// Share of each pointer delta applied to the offset
const DRAG_DAMPING: f32 = 0.5;
/// EMA weights (previous, target) while dragging
const DRAG_SMOOTHING: (f32, f32) = (0.2, 0.8);
/// EMA weights (previous, target) for wheel ticks
const WHEEL_SMOOTHING: (f32, f32) = (0.3, 0.7);
/// Velocity retained per coasting frame
const DECAY: f32 = 0.98;
/// Coasting stops once |velocity| drops to this
const STOP_SPEED: f32 = 0.1;

pub struct MomentumTracker {
    /// Accumulated scroll offset (x, y)
    offset: (f32, f32),
    /// Smoothed velocity, offset units per frame
    velocity: (f32, f32),
    /// Pointer currently held down
    pressed: bool,
    /// Last pointer position while pressed
    last_pos: Option<(f32, f32)>,
    /// Where the current press started
    press_origin: Option<(f32, f32)>,
    /// Decay loop running
    coasting: bool,
    /// Touch id owning the gesture, if it is a touch gesture
    touch_id: Option<u64>,
    disposed: bool,
}

impl Default for MomentumTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn magnitude(v: (f32, f32)) -> f32 {
    v.0.hypot(v.1)
}

impl MomentumTracker {
    pub fn new() -> Self {
        Self {
            offset: (0.0, 0.0),
            velocity: (0.0, 0.0),
            pressed: false,
            last_pos: None,
            press_origin: None,
            coasting: false,
            touch_id: None,
            disposed: false,
        }
    }

    /// Current offset. Never blocks.
    pub fn offset(&self) -> (f32, f32) {
        self.offset
    }

    pub fn velocity(&self) -> (f32, f32) {
        self.velocity
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// True while the decay loop is running.
    pub fn is_coasting(&self) -> bool {
        self.coasting
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// True while a touch gesture owns the tracker.
    pub fn touch_active(&self) -> bool {
        self.touch_id.is_some()
    }

    pub fn press_origin(&self) -> Option<(f32, f32)> {
        self.press_origin
    }

    pub fn press(&mut self, x: f32, y: f32) {
        if self.disposed {
            return;
        }
        self.pressed = true;
        self.last_pos = Some((x, y));
        self.press_origin = Some((x, y));
        self.coasting = false;
        self.velocity = (0.0, 0.0);
    }

    pub fn drag(&mut self, x: f32, y: f32) {
        if self.disposed || !self.pressed {
            return;
        }
        let Some((lx, ly)) = self.last_pos.replace((x, y)) else {
            return;
        };
        let delta = ((x - lx) * DRAG_DAMPING, (y - ly) * DRAG_DAMPING);
        self.offset.0 += delta.0;
        self.offset.1 += delta.1;
        self.smooth(delta, DRAG_SMOOTHING);
    }

    pub fn release(&mut self) {
        if self.disposed || !self.pressed {
            return;
        }
        self.pressed = false;
        self.last_pos = None;
        self.start_coasting();
    }

    /// Wheel tick in pixels.
    pub fn wheel(&mut self, dx: f32, dy: f32) {
        if self.disposed {
            return;
        }
        let delta = (dx * DRAG_DAMPING, dy * DRAG_DAMPING);
        self.offset.0 += delta.0;
        self.offset.1 += delta.1;
        self.smooth(delta, WHEEL_SMOOTHING);
        if !self.pressed {
            self.start_coasting();
        }
    }

    /// First touch starts a gesture; extra fingers are ignored.
    pub fn touch_start(&mut self, x: f32, y: f32, id: u64) {
        if self.touch_id.is_some() || self.disposed {
            return;
        }
        self.touch_id = Some(id);
        self.press(x, y);
    }

    pub fn touch_move(&mut self, x: f32, y: f32, id: u64) {
        if self.touch_id == Some(id) {
            self.drag(x, y);
        }
    }

    pub fn touch_end(&mut self, id: u64) {
        if self.touch_id == Some(id) {
            self.touch_id = None;
            self.release();
        }
    }

    /// One coasting frame. Returns true while momentum is still running.
    pub fn step(&mut self) -> bool {
        if !self.coasting || self.disposed {
            return false;
        }
        self.offset.0 += self.velocity.0;
        self.offset.1 += self.velocity.1;
        self.velocity.0 *= DECAY;
        self.velocity.1 *= DECAY;
        if magnitude(self.velocity) <= STOP_SPEED {
            self.coasting = false;
            self.velocity = (0.0, 0.0);
        }
        self.coasting
    }

    /// Stop coasting and ignore every later event. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.coasting = false;
        self.pressed = false;
        self.last_pos = None;
        self.touch_id = None;
        self.velocity = (0.0, 0.0);
        self.disposed = true;
    }

    fn smooth(&mut self, target: (f32, f32), (keep, take): (f32, f32)) {
        self.velocity.0 = self.velocity.0 * keep + target.0 * take;
        self.velocity.1 = self.velocity.1 * keep + target.1 * take;
    }

    fn start_coasting(&mut self) {
        self.coasting = magnitude(self.velocity) > STOP_SPEED;
        if !self.coasting {
            self.velocity = (0.0, 0.0);
        }
    }
}
