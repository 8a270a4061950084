//! Conversions between lens motor steps and optical engineering units.
//!
//! Every conversion is a method on [`CalibrationContext`] and returns its
//! best-effort value together with a [`LensStatus`]. Out-of-range results are
//! still returned; the status tells the caller whether to clamp, reject or
//! warn. Only a missing calibration section suppresses the computation, in
//! which case all numeric fields are zero.
//!
//! [`CalibrationContext`]: crate::calibration::CalibrationContext

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod bfl;
pub mod conversion;
pub mod optics;
pub mod solver;
pub mod state;

pub use bfl::{BflCorrection, BflSample};
pub use state::{LensConfiguration, TrackedValue};

/// Outcome of a lens conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LensStatus {
    Ok,
    /// The calibration section needed by the conversion is absent.
    NoCalibration,
    FlMin,
    FlMax,
    OdMin,
    /// Beyond infinity focus.
    OdMax,
    /// Object distance missing or negative; focus was not calculated.
    OdValue,
    NaMin,
    NaMax,
    RangeMin,
    RangeMax,
    /// Division by zero, infinity or an otherwise unusable input.
    Calculation,
    /// Value accepted but implausible, usually a unit mix-up.
    ValueWarning,
}

impl LensStatus {
    pub fn is_ok(self) -> bool {
        self == LensStatus::Ok
    }

    pub fn is_warning(self) -> bool {
        self == LensStatus::ValueWarning
    }

    pub fn is_error(self) -> bool {
        !self.is_ok() && !self.is_warning()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LensStatus::Ok => "OK",
            LensStatus::NoCalibration => "no cal data",
            LensStatus::FlMin => "FL min",
            LensStatus::FlMax => "FL max",
            LensStatus::OdMin => "OD min",
            LensStatus::OdMax => "OD max",
            LensStatus::OdValue => "OD value",
            LensStatus::NaMin => "NA min",
            LensStatus::NaMax => "NA max",
            LensStatus::RangeMin => "out of range-min",
            LensStatus::RangeMax => "out of range-max",
            LensStatus::Calculation => "calculation error",
            LensStatus::ValueWarning => "value warning",
        }
    }
}

impl fmt::Display for LensStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value with its status and the valid range it was checked against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounded<T> {
    pub value: T,
    pub status: LensStatus,
    pub min: T,
    pub max: T,
}

impl<T: Default> Bounded<T> {
    pub(crate) fn no_calibration() -> Self {
        Self {
            value: T::default(),
            status: LensStatus::NoCalibration,
            min: T::default(),
            max: T::default(),
        }
    }
}

/// A value with its status, for conversions without natural bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Checked<T> {
    pub value: T,
    pub status: LensStatus,
}

impl<T> Checked<T> {
    pub fn new(value: T, status: LensStatus) -> Self {
        Self { value, status }
    }
}

impl<T: Default> Checked<T> {
    pub(crate) fn no_calibration() -> Self {
        Self::new(T::default(), LensStatus::NoCalibration)
    }
}

/// Motor targets produced by the angle/field of view solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorSteps {
    pub focus_step: i32,
    pub zoom_step: i32,
    /// Focal length the zoom step was derived from, in mm.
    pub focal_length: f64,
    pub status: LensStatus,
}

impl MotorSteps {
    pub(crate) fn failed(status: LensStatus) -> Self {
        Self {
            focus_step: 0,
            zoom_step: 0,
            focal_length: 0.0,
            status,
        }
    }
}

/// F-number from numerical aperture: `F# = 1 / (2 NA)`.
pub fn na_to_fnum(na: f64) -> f64 {
    1.0 / (2.0 * na)
}

/// Numerical aperture from F-number: `NA = 1 / (2 F#)`.
pub fn fnum_to_na(fnum: f64) -> f64 {
    1.0 / (2.0 * fnum)
}

/// Full angle of view in degrees covering `fov` meters at `od` meters.
///
/// Returns 0 when either value is zero, non-finite, or the distance is
/// missing; callers treat 0 as "cannot compute".
pub fn fov_to_aov(fov: f64, od: Option<f64>) -> f64 {
    let Some(od) = od else { return 0.0 };
    if fov == 0.0 || od == 0.0 || !fov.is_finite() || !od.is_finite() {
        return 0.0;
    }
    (2.0 * ((fov / 2.0) / od).atan()).to_degrees()
}
