//! Tweens and oscillators.
//!
//! `Tween` is a one-shot interpolation between two scalars with a pluggable
//! easing curve and a direction flag, used for hover scaling. Continuous
//! motion (bobbing, spinning) uses `Oscillator`, a phase accumulator fed with
//! the frame delta.

use std::time::{Duration, Instant};

/// Penner-style easing: `(elapsed, begin, change, duration) -> value`.
pub type Easing = fn(f32, f32, f32, f32) -> f32;

pub mod easing {
    use std::f32::consts::PI;

    pub fn linear(t: f32, b: f32, c: f32, d: f32) -> f32 {
        c * t / d + b
    }

    pub fn ease_in_out_sine(t: f32, b: f32, c: f32, d: f32) -> f32 {
        -c / 2.0 * ((PI * t / d).cos() - 1.0) + b
    }

    pub fn ease_out_expo(t: f32, b: f32, c: f32, d: f32) -> f32 {
        if t >= d {
            b + c
        } else {
            c * (1.0 - 2.0_f32.powf(-10.0 * t / d)) + b
        }
    }

    pub fn ease_out_quad(t: f32, b: f32, c: f32, d: f32) -> f32 {
        let t = t / d;
        -c * t * (t - 2.0) + b
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TweenDirection {
    /// start_value -> end_value
    Forwards,
    /// end_value -> start_value
    Backwards,
}

#[derive(Debug, Clone)]
pub struct Tween {
    pub start_value: f32,
    pub end_value: f32,
    duration: Duration,
    easing: Easing,
    direction: TweenDirection,
    started_at: Option<Instant>,
    running: bool,
    /// Value the current run starts from, when not the direction's origin
    origin: Option<f32>,
    /// Length of the current run
    run_duration: Duration,
}

impl Tween {
    pub fn new(start_value: f32, end_value: f32, duration: Duration) -> Self {
        Self {
            start_value,
            end_value,
            duration,
            easing: easing::linear,
            direction: TweenDirection::Forwards,
            started_at: None,
            running: false,
            origin: None,
            run_duration: duration,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn set_direction(&mut self, direction: TweenDirection) {
        self.direction = direction;
    }

    pub fn direction(&self) -> TweenDirection {
        self.direction
    }

    pub fn is_animating(&self) -> bool {
        self.running
    }

    /// Capture `now` as t0 and mark running. Restarting mid-flight is allowed.
    pub fn start(&mut self, now: Instant) {
        self.started_at = Some(now);
        self.running = true;
        self.origin = None;
        self.run_duration = self.duration;
    }

    /// Like `start`, but the run begins at `value` (usually the value last
    /// reported by an interrupted run). The run is shortened to the share of
    /// the full distance still left to cover.
    pub fn start_from(&mut self, now: Instant, value: f32) {
        let (_, to) = self.endpoints();
        let span = (self.end_value - self.start_value).abs();
        let share = if span > f32::EPSILON {
            ((to - value).abs() / span).min(1.0)
        } else {
            0.0
        };
        self.started_at = Some(now);
        self.running = true;
        self.origin = Some(value);
        self.run_duration = self.duration.mul_f32(share);
    }

    /// Stop without reporting a final value.
    pub fn stop(&mut self) {
        self.running = false;
        self.started_at = None;
        self.origin = None;
    }

    fn endpoints(&self) -> (f32, f32) {
        match self.direction {
            TweenDirection::Forwards => (self.start_value, self.end_value),
            TweenDirection::Backwards => (self.end_value, self.start_value),
        }
    }

    /// Report the value at `now`. Finishes (and reports the endpoint) once
    /// the duration has elapsed. No-op when not running.
    pub fn update(&mut self, now: Instant, mut apply: impl FnMut(f32)) {
        if !self.running {
            return;
        }
        let Some(t0) = self.started_at else {
            return;
        };
        let (from, to) = self.endpoints();
        let from = self.origin.unwrap_or(from);
        let elapsed = now.saturating_duration_since(t0);

        if elapsed >= self.run_duration {
            self.running = false;
            self.origin = None;
            apply(to);
            return;
        }

        let t = elapsed.as_secs_f32();
        let d = self.run_duration.as_secs_f32();
        apply((self.easing)(t, from, to - from, d));
    }
}

/// Shape of an oscillator's cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wave {
    /// sin(2π·phase), in [-1, 1]
    Sine,
    /// phase itself, in [0, 1); for continuous spin
    Ramp,
}

/// Phase accumulator with a periodic output.
#[derive(Debug, Clone)]
pub struct Oscillator {
    /// Position within the cycle, in [0, 1)
    phase: f32,
    /// Cycles per second
    pub frequency: f32,
    pub amplitude: f32,
    pub wave: Wave,
}

impl Oscillator {
    pub fn new(frequency: f32, amplitude: f32, wave: Wave) -> Self {
        Self {
            phase: 0.0,
            frequency,
            amplitude,
            wave,
        }
    }

    /// Start at a given phase (wrapped into [0, 1)).
    pub fn with_phase(mut self, phase: f32) -> Self {
        self.phase = phase.rem_euclid(1.0);
        self
    }

    pub fn advance(&mut self, dt: f32) {
        self.phase = (self.phase + self.frequency * dt).rem_euclid(1.0);
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    pub fn reset(&mut self, phase: f32) {
        self.phase = phase.rem_euclid(1.0);
    }

    pub fn value(&self) -> f32 {
        match self.wave {
            Wave::Sine => self.amplitude * (self.phase * std::f32::consts::TAU).sin(),
            Wave::Ramp => self.amplitude * self.phase,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn linear_midpoint_and_finish() {
        let t0 = Instant::now();
        let mut tw = Tween::new(1.0, 1.2, ms(200));
        tw.start(t0);

        let mut v = 0.0;
        tw.update(t0 + ms(100), |x| v = x);
        assert!((v - 1.1).abs() < 1e-3, "midpoint = {}", v);
        assert!(tw.is_animating());

        tw.update(t0 + ms(250), |x| v = x);
        assert!((v - 1.2).abs() < 1e-6);
        assert!(!tw.is_animating());
    }

    #[test]
    fn backwards_swaps_endpoints() {
        let t0 = Instant::now();
        let mut tw = Tween::new(1.0, 1.2, ms(200));
        tw.set_direction(TweenDirection::Backwards);
        tw.start(t0);

        let mut v = 0.0;
        tw.update(t0, |x| v = x);
        assert!((v - 1.2).abs() < 1e-6);
        tw.update(t0 + ms(500), |x| v = x);
        assert!((v - 1.0).abs() < 1e-6);
    }

    #[test]
    fn start_from_resumes_at_given_value() {
        let t0 = Instant::now();
        let mut tw = Tween::new(1.0, 1.2, ms(200));
        tw.set_direction(TweenDirection::Backwards);
        tw.start_from(t0, 1.1);

        let mut v = 0.0;
        tw.update(t0, |x| v = x);
        assert!((v - 1.1).abs() < 1e-6);

        // Half the distance left, so half the duration
        tw.update(t0 + ms(50), |x| v = x);
        assert!((v - 1.05).abs() < 1e-3, "v = {}", v);
        assert!(tw.is_animating());
        tw.update(t0 + ms(101), |x| v = x);
        assert!((v - 1.0).abs() < 1e-6);
        assert!(!tw.is_animating());

        // A plain start goes back to the full run
        tw.start(t0 + ms(200));
        tw.update(t0 + ms(200), |x| v = x);
        assert!((v - 1.2).abs() < 1e-6);
    }

    #[test]
    fn start_from_endpoint_finishes_at_once() {
        let t0 = Instant::now();
        let mut tw = Tween::new(0.0, 1.0, ms(100));
        tw.start_from(t0, 1.0);
        let mut v = -1.0;
        tw.update(t0, |x| v = x);
        assert_eq!(v, 1.0);
        assert!(!tw.is_animating());
    }

    #[test]
    fn idle_update_is_noop() {
        let mut tw = Tween::new(0.0, 1.0, ms(10));
        let mut called = false;
        tw.update(Instant::now(), |_| called = true);
        assert!(!called);
    }

    #[test]
    fn restart_after_finish() {
        let t0 = Instant::now();
        let mut tw = Tween::new(0.0, 1.0, ms(10));
        tw.start(t0);
        tw.update(t0 + ms(20), |_| {});
        assert!(!tw.is_animating());
        tw.start(t0 + ms(30));
        assert!(tw.is_animating());
    }

    #[test]
    fn easings_hit_endpoints() {
        for f in [
            easing::linear as Easing,
            easing::ease_in_out_sine,
            easing::ease_out_expo,
            easing::ease_out_quad,
        ] {
            assert!((f(0.0, 2.0, 3.0, 1.0) - 2.0).abs() < 1e-3);
            assert!((f(1.0, 2.0, 3.0, 1.0) - 5.0).abs() < 1e-3);
        }
    }

    #[test]
    fn oscillator_wraps_phase() {
        let mut osc = Oscillator::new(0.5, 2.0, Wave::Sine);
        osc.advance(0.5); // quarter cycle
        assert!((osc.value() - 2.0).abs() < 1e-4);
        osc.advance(1.5); // +0.75 cycle -> back to 0
        assert!(osc.phase() < 1e-4 || osc.phase() > 1.0 - 1e-4);

        let mut spin = Oscillator::new(1.0, std::f32::consts::TAU, Wave::Ramp);
        spin.advance(10.25);
        assert!((spin.phase() - 0.25).abs() < 1e-3);
    }
}
