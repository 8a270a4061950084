//! Lens IQ Library
//!
//! Calibration-driven conversions for motorized zoom lenses. Given a lens
//! calibration dataset, this library converts between motor steps and
//! engineering units:
//! - Zoom step <-> focal length
//! - Focus step <-> object distance (with back focal length correction)
//! - Iris step <-> numerical aperture / F-number
//! - Angle of view, field of view and depth of field
//! - Angle / field of view -> zoom and focus steps
//!
//! Moving the motors is left to a [`motor::MotorDriver`] implementation.

pub mod calibration;
pub mod lens;
pub mod motor;
pub mod numeric;

// Re-export commonly used types
pub use calibration::{CalibrationContext, CalibrationData, CalibrationError, CurveSet};

pub use lens::{
    fnum_to_na, fov_to_aov, na_to_fnum, BflCorrection, BflSample, Bounded, Checked,
    LensConfiguration, LensStatus, MotorSteps,
};

pub use motor::{IrcState, MotorController, MotorDriver, MotorError};
