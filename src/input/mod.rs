//! Pointer input: press/drag/release, wheel and single-touch gestures
//! turned into a momentum-preserving scroll offset.

pub mod momentum;

pub use momentum::MomentumTracker;
