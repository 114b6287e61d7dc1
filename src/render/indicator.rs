//! Floating indicator: a small arrow drifting upward between two tiles.
//!
//! The drift accumulates in `total_offset`, pushed by a constant baseline
//! plus a smoothed scroll speed. When the offset passes the reset threshold
//! it wraps to a small offset on the other side, so the motion looks endless
//! while the coordinate stays bounded.

use crate::render::tween::{Oscillator, Wave};

/// Offset magnitude that triggers a wrap
pub const RESET_THRESHOLD: f32 = 0.4;
/// Wrapped offset, as a fraction of the threshold, on the opposite side
const WRAP_FRACTION: f32 = 0.2;
/// Per-frame drift with no scrolling
const BASELINE_DRIFT: f32 = 0.002;
/// Retained share of `current_speed` each frame
const SPEED_DECAY: f32 = 0.9;
/// Scroll speed to offset gain
const SPEED_GAIN: f32 = 0.02;
/// Cap on a single frame's step, keeps a wrap inside the threshold
const MAX_STEP: f32 = RESET_THRESHOLD * 0.5;

const BOB_HZ: f32 = 0.6;
const BOB_AMPLITUDE: f32 = 0.015;
const SPIN_HZ: f32 = 0.15;

#[derive(Debug, Clone)]
pub struct FloatingIndicator {
    /// Ring-local position: (angle in radians, height above the ring)
    angle: f32,
    base_y: f32,
    total_offset: f32,
    current_speed: f32,
    bob: Oscillator,
    spin: Oscillator,
    resetting: bool,
    frozen: bool,
}

impl FloatingIndicator {
    /// `seed` desynchronises bobbing between indicators.
    pub fn new(angle: f32, base_y: f32, seed: usize) -> Self {
        let phase = (seed as f32 * 0.618_034).fract();
        Self {
            angle,
            base_y,
            total_offset: 0.0,
            current_speed: 0.0,
            bob: Oscillator::new(BOB_HZ, BOB_AMPLITUDE, Wave::Sine).with_phase(phase),
            spin: Oscillator::new(SPIN_HZ, std::f32::consts::TAU, Wave::Ramp).with_phase(phase),
            resetting: false,
            frozen: false,
        }
    }

    pub fn angle(&self) -> f32 {
        self.angle
    }

    pub fn total_offset(&self) -> f32 {
        self.total_offset
    }

    /// True on the frame a wrap happened.
    pub fn is_resetting(&self) -> bool {
        self.resetting
    }

    /// Height above the ring: base + bobbing + accumulated drift.
    pub fn local_y(&self) -> f32 {
        self.base_y + self.bob.value() + self.total_offset
    }

    /// Spin angle around the vertical axis.
    pub fn rotation(&self) -> f32 {
        self.spin.value()
    }

    /// Advance one frame. Must be called every frame, even at zero speed.
    pub fn update(&mut self, scroll_speed: f32, dt: f32) {
        if self.frozen {
            return;
        }
        self.current_speed = self.current_speed * SPEED_DECAY + scroll_speed * (1.0 - SPEED_DECAY);
        let step = (BASELINE_DRIFT + self.current_speed * SPEED_GAIN).clamp(-MAX_STEP, MAX_STEP);
        self.total_offset += step;

        // The frame after a wrap never wraps again; MAX_STEP keeps it in range.
        if self.resetting {
            self.resetting = false;
        } else if self.total_offset.abs() > RESET_THRESHOLD {
            self.resetting = true;
            self.total_offset = -self.total_offset.signum() * RESET_THRESHOLD * WRAP_FRACTION;
        }

        self.bob.advance(dt);
        self.spin.advance(dt);
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Forget accumulated motion (pooled ring revival).
    pub fn reset(&mut self) {
        self.total_offset = 0.0;
        self.current_speed = 0.0;
        self.resetting = false;
        self.frozen = false;
    }
}
