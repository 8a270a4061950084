use log::{debug, info};

use super::{IrcState, MotorDriver, MotorError, DEFAULT_SPEED, DEFAULT_SPEED_IRIS};
use crate::lens::{LensStatus, MotorSteps};

/// Step counts and reference positions recorded as motors are initialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorLimits {
    pub focus_steps: Option<i32>,
    pub focus_reference: Option<i32>,
    pub zoom_steps: Option<i32>,
    pub zoom_reference: Option<i32>,
    pub iris_steps: Option<i32>,
}

/// Target of a motor move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Absolute(i32),
    Relative(i32),
}

/// Final motor positions after [`MotorController::apply_motor_steps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedSteps {
    pub zoom_step: i32,
    /// `None` when focus was not moved.
    pub focus_step: Option<i32>,
}

/// Motor driver wrapper that tracks initialization and fills in the default
/// speeds.
#[derive(Debug)]
pub struct MotorController<D> {
    driver: D,
    limits: MotorLimits,
}

impl<D: MotorDriver> MotorController<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            limits: MotorLimits::default(),
        }
    }

    pub fn limits(&self) -> &MotorLimits {
        &self.limits
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Only an acceleration of 0 is accepted.
    // TODO: accept 1..=32 once the controller firmware revision is queried
    pub fn validate_accel(accel: u8) -> bool {
        accel == 0
    }

    /// Initialize the focus motor. Returns the step it ended on.
    pub fn init_focus(
        &mut self,
        steps: i32,
        reference: i32,
        move_to_reference: bool,
        accel: u8,
    ) -> Result<i32, MotorError> {
        if !Self::validate_accel(accel) {
            return Err(MotorError::InvalidAcceleration(accel));
        }
        let position = self
            .driver
            .init_focus(steps, reference, move_to_reference, accel)?;
        self.limits.focus_steps = Some(steps);
        self.limits.focus_reference = Some(reference);
        info!("Focus initialized: {steps} steps, reference {reference}, at {position}");
        Ok(position)
    }

    pub fn init_zoom(
        &mut self,
        steps: i32,
        reference: i32,
        move_to_reference: bool,
        accel: u8,
    ) -> Result<i32, MotorError> {
        if !Self::validate_accel(accel) {
            return Err(MotorError::InvalidAcceleration(accel));
        }
        let position = self
            .driver
            .init_zoom(steps, reference, move_to_reference, accel)?;
        self.limits.zoom_steps = Some(steps);
        self.limits.zoom_reference = Some(reference);
        info!("Zoom initialized: {steps} steps, reference {reference}, at {position}");
        Ok(position)
    }

    /// The iris motor references at step 0 and has no acceleration setting.
    pub fn init_iris(&mut self, steps: i32, move_to_reference: bool) -> Result<i32, MotorError> {
        let position = self.driver.init_iris(steps, 0, move_to_reference, 0)?;
        self.limits.iris_steps = Some(steps);
        info!("Iris initialized: {steps} steps, at {position}");
        Ok(position)
    }

    pub fn init_irc(&mut self) -> Result<(), MotorError> {
        self.driver.init_irc()
    }

    pub fn set_irc_state(&mut self, state: IrcState) -> Result<(), MotorError> {
        debug!("IRC filter -> {state:?}");
        self.driver.set_irc_state(state)
    }

    /// Move focus at the default speed with backlash correction.
    pub fn move_focus(&mut self, target: Move) -> Result<i32, MotorError> {
        self.move_focus_at(target, DEFAULT_SPEED, true)
    }

    pub fn move_focus_at(
        &mut self,
        target: Move,
        speed: u32,
        backlash: bool,
    ) -> Result<i32, MotorError> {
        if self.limits.focus_steps.is_none() {
            return Err(MotorError::NotInitialized);
        }
        debug!("Focus {target:?} at speed {speed}");
        match target {
            Move::Absolute(step) => self.driver.focus_abs(step, speed, backlash),
            Move::Relative(delta) => self.driver.focus_rel(delta, speed, backlash),
        }
    }

    /// Move zoom at the default speed with backlash correction.
    pub fn move_zoom(&mut self, target: Move) -> Result<i32, MotorError> {
        self.move_zoom_at(target, DEFAULT_SPEED, true)
    }

    pub fn move_zoom_at(
        &mut self,
        target: Move,
        speed: u32,
        backlash: bool,
    ) -> Result<i32, MotorError> {
        if self.limits.zoom_steps.is_none() {
            return Err(MotorError::NotInitialized);
        }
        debug!("Zoom {target:?} at speed {speed}");
        match target {
            Move::Absolute(step) => self.driver.zoom_abs(step, speed, backlash),
            Move::Relative(delta) => self.driver.zoom_rel(delta, speed, backlash),
        }
    }

    pub fn move_iris(&mut self, target: Move) -> Result<i32, MotorError> {
        self.move_iris_at(target, DEFAULT_SPEED_IRIS)
    }

    pub fn move_iris_at(&mut self, target: Move, speed: u32) -> Result<i32, MotorError> {
        if self.limits.iris_steps.is_none() {
            return Err(MotorError::NotInitialized);
        }
        debug!("Iris {target:?} at speed {speed}");
        match target {
            Move::Absolute(step) => self.driver.iris_abs(step, speed),
            Move::Relative(delta) => self.driver.iris_rel(delta, speed),
        }
    }

    /// Moves zoom, then focus, to the solver's targets.
    ///
    /// Range statuses still move the motors since the zoom step is already
    /// clamped. Focus is left alone when no object distance was given
    /// ([`LensStatus::OdValue`]).
    ///
    /// # Errors
    ///
    /// [`MotorError::UnusableSteps`] when the solver produced no steps
    /// ([`LensStatus::NoCalibration`] or [`LensStatus::Calculation`]), before
    /// any motor moves.
    pub fn apply_motor_steps(&mut self, steps: &MotorSteps) -> Result<AppliedSteps, MotorError> {
        if matches!(
            steps.status,
            LensStatus::NoCalibration | LensStatus::Calculation
        ) {
            return Err(MotorError::UnusableSteps(steps.status));
        }

        let zoom_step = self.move_zoom(Move::Absolute(steps.zoom_step))?;
        let focus_step = if steps.status == LensStatus::OdValue {
            None
        } else {
            Some(self.move_focus(Move::Absolute(steps.focus_step))?)
        };
        Ok(AppliedSteps {
            zoom_step,
            focus_step,
        })
    }
}
