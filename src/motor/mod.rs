//! Motor driver interface for the focus, zoom and iris motors and the IR-cut
//! filter.
//!
//! The conversions in [`crate::lens`] only produce target step numbers;
//! moving the lens is left to an implementation of [`MotorDriver`], usually a
//! wrapper around the controller board's serial protocol.

use serde::{Deserialize, Serialize};

use crate::lens::LensStatus;

pub mod controller;

pub use controller::{AppliedSteps, MotorController, MotorLimits, Move};

/// Focus and zoom motor speed.
pub const DEFAULT_SPEED: u32 = 1000;
/// Focus and zoom relative move.
pub const DEFAULT_REL_STEP: i32 = 1000;
pub const DEFAULT_SPEED_IRIS: u32 = 100;
pub const DEFAULT_IRIS_STEP: i32 = 10;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum MotorError {
    #[error("Motor is not initialized")]
    NotInitialized,
    #[error("Unsupported acceleration: {0}")]
    InvalidAcceleration(u8),
    #[error("Motor steps are unusable: {0}")]
    UnusableSteps(LensStatus),
    #[error("Driver error: {0}")]
    Driver(String),
}

/// IR-cut filter position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IrcState {
    /// Clear glass, passes visible and IR.
    #[default]
    Clear,
    /// Visible bandpass.
    Bandpass,
}

impl From<IrcState> for u8 {
    fn from(state: IrcState) -> Self {
        match state {
            IrcState::Clear => 0,
            IrcState::Bandpass => 1,
        }
    }
}

impl TryFrom<u8> for IrcState {
    type Error = MotorError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(IrcState::Clear),
            1 => Ok(IrcState::Bandpass),
            other => Err(MotorError::Driver(format!("Unknown IRC state {other}"))),
        }
    }
}

/// Capability surface of a lens motor controller.
///
/// Step-returning methods report the motor position after the command.
pub trait MotorDriver {
    /// Initialize the focus motor with its step count and reference (park)
    /// position, optionally moving to the reference.
    fn init_focus(
        &mut self,
        steps: i32,
        reference: i32,
        move_to_reference: bool,
        accel: u8,
    ) -> Result<i32, MotorError>;

    fn init_zoom(
        &mut self,
        steps: i32,
        reference: i32,
        move_to_reference: bool,
        accel: u8,
    ) -> Result<i32, MotorError>;

    fn init_iris(
        &mut self,
        steps: i32,
        reference: i32,
        move_to_reference: bool,
        accel: u8,
    ) -> Result<i32, MotorError>;

    fn init_irc(&mut self) -> Result<(), MotorError>;

    /// Move focus to `step`. `backlash` corrects for backlash when moving
    /// towards the reference position.
    fn focus_abs(&mut self, step: i32, speed: u32, backlash: bool) -> Result<i32, MotorError>;

    fn focus_rel(&mut self, delta: i32, speed: u32, backlash: bool) -> Result<i32, MotorError>;

    fn zoom_abs(&mut self, step: i32, speed: u32, backlash: bool) -> Result<i32, MotorError>;

    fn zoom_rel(&mut self, delta: i32, speed: u32, backlash: bool) -> Result<i32, MotorError>;

    fn iris_abs(&mut self, step: i32, speed: u32) -> Result<i32, MotorError>;

    fn iris_rel(&mut self, delta: i32, speed: u32) -> Result<i32, MotorError>;

    fn set_irc_state(&mut self, state: IrcState) -> Result<(), MotorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_irc_state_codes() {
        assert_eq!(u8::from(IrcState::Clear), 0);
        assert_eq!(u8::from(IrcState::Bandpass), 1);
        assert_eq!(IrcState::try_from(1), Ok(IrcState::Bandpass));
        assert!(matches!(IrcState::try_from(2), Err(MotorError::Driver(_))));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            MotorError::InvalidAcceleration(4).to_string(),
            "Unsupported acceleration: 4"
        );
        assert_eq!(
            MotorError::UnusableSteps(LensStatus::NoCalibration).to_string(),
            "Motor steps are unusable: no cal data"
        );
    }
}
