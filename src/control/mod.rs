//! Closed-loop charge control primitives.
//!
//! [`regulator::DutyRegulator`] turns stage setpoints into a PWM duty
//! value; [`soc::estimate_soc`] maps battery voltage to a state-of-charge
//! percentage.  Both are pure host-testable logic with no hardware
//! dependencies.

pub mod regulator;
pub mod soc;
