//! Per-lens calibration data and the read-only context every conversion uses.
//!
//! The dataset is a set of optional curve sections plus a handful of scalar
//! limits. Sections are never checked up front: each conversion looks for the
//! section it needs and reports [`LensStatus::NoCalibration`] when it is
//! missing.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::lens::LensStatus;
use crate::numeric;

/// Object distance treated as infinity, in meters. Values `>=` this are infinite.
pub const INFINITY: f64 = 1e6;
/// Minimum object distance (m) when the calibration data does not specify one.
pub const OD_MIN_DEFAULT: f64 = 2.0;
/// Default circle of confusion in mm.
pub const DEFAULT_CIRCLE_OF_CONFUSION: f64 = 0.020;
/// Plausible circle of confusion range in mm; values outside only warn.
pub const CIRCLE_OF_CONFUSION_RANGE: (f64, f64) = (0.005, 0.100);

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("Invalid calibration data: {0}")]
    InvalidParams(String),
    #[error("Failed to parse YAML: {0}")]
    YamlError(String),
    #[error("Failed to parse JSON: {0}")]
    JsonError(String),
    #[error("IO Error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for CalibrationError {
    fn from(err: std::io::Error) -> Self {
        CalibrationError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CalibrationError {
    fn from(err: serde_yaml::Error) -> Self {
        CalibrationError::YamlError(err.to_string())
    }
}

impl From<serde_json::Error> for CalibrationError {
    fn from(err: serde_json::Error) -> Self {
        CalibrationError::JsonError(err.to_string())
    }
}

/// A family of polynomial curves, one per control point.
///
/// `coef[i]` is the curve calibrated at `cp1[i]`. Control points need not be
/// sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurveSet {
    #[serde(default)]
    pub cp1: Vec<f64>,
    #[serde(default)]
    pub coef: Vec<Vec<f64>>,
}

impl CurveSet {
    pub fn new(cp1: Vec<f64>, coef: Vec<Vec<f64>>) -> Self {
        Self { cp1, coef }
    }

    /// Number of usable (control point, curve) pairs.
    pub fn len(&self) -> usize {
        self.cp1.len().min(self.coef.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Curve calibrated at the first occurrence of `control_point`.
    pub fn curve_at(&self, control_point: f64) -> Option<&[f64]> {
        self.cp1
            .iter()
            .position(|&cp| cp == control_point)
            .and_then(|idx| self.coef.get(idx))
            .map(Vec::as_slice)
    }

    /// Evaluates every curve at `x`, in control point order.
    pub fn evaluate_all(&self, x: f64) -> Vec<f64> {
        self.coef
            .iter()
            .take(self.len())
            .map(|c| numeric::polyval(c, x))
            .collect()
    }

    /// Interpolates the curve family at control point `target`, evaluated at `x`.
    pub fn interpolate(&self, target: f64, x: f64) -> f64 {
        numeric::interpolate(&self.coef, &self.cp1, target, x)
    }
}

/// Focal length curves: zoom step -> FL (`coefInv`) and FL -> zoom step (`coef`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FocalLengthCurves {
    #[serde(default)]
    pub coef: Vec<Vec<f64>>,
    #[serde(default, rename = "coefInv")]
    pub coef_inv: Vec<Vec<f64>>,
}

impl FocalLengthCurves {
    /// Polynomial mapping focal length to zoom step.
    pub fn forward(&self) -> Option<&[f64]> {
        self.coef.first().map(Vec::as_slice)
    }

    /// Polynomial mapping zoom step to focal length.
    pub fn inverse(&self) -> Option<&[f64]> {
        self.coef_inv.first().map(Vec::as_slice)
    }
}

/// Calibration dataset as consumed by the conversions.
///
/// Field names follow the calibration file (`zoomSteps`, `flMin`, `FL`, `AP`...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CalibrationData {
    pub zoom_steps: i32,
    pub focus_steps: i32,
    pub iris_steps: i32,
    pub fl_min: f64,
    pub fl_max: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub od_min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub od_max: Option<f64>,
    /// Design maximum aperture as an F-number.
    pub fnum: f64,
    #[serde(rename = "FL", skip_serializing_if = "Option::is_none")]
    pub fl: Option<FocalLengthCurves>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking: Option<CurveSet>,
    #[serde(rename = "AP", skip_serializing_if = "Option::is_none")]
    pub ap: Option<CurveSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dist: Option<CurveSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iris: Option<CurveSet>,
}

impl CalibrationData {
    pub fn from_yaml_str(contents: &str) -> Result<Self, CalibrationError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, CalibrationError> {
        Ok(serde_json::from_str(contents)?)
    }

    /// `true` when nothing at all was loaded.
    pub fn is_empty(&self) -> bool {
        *self == CalibrationData::default()
    }

    /// Structural check of the curve sections.
    ///
    /// Never run implicitly; conversions tolerate mismatched lists.
    pub fn validate(&self) -> Result<(), CalibrationError> {
        if let Some(fl) = &self.fl {
            if fl.forward().map_or(true, <[f64]>::is_empty)
                || fl.inverse().map_or(true, <[f64]>::is_empty)
            {
                return Err(CalibrationError::InvalidParams(
                    "FL requires non-empty 'coef' and 'coefInv'".to_string(),
                ));
            }
        }

        let sections = [
            ("tracking", &self.tracking),
            ("AP", &self.ap),
            ("dist", &self.dist),
            ("iris", &self.iris),
        ];
        for (name, section) in sections {
            let Some(curves) = section else { continue };
            if curves.cp1.len() != curves.coef.len() {
                return Err(CalibrationError::InvalidParams(format!(
                    "{name}: {} control points but {} curves",
                    curves.cp1.len(),
                    curves.coef.len()
                )));
            }
            if curves.coef.iter().any(Vec::is_empty) {
                return Err(CalibrationError::InvalidParams(format!(
                    "{name}: empty coefficient row"
                )));
            }
            if curves.cp1.iter().any(|cp| !cp.is_finite()) {
                return Err(CalibrationError::InvalidParams(format!(
                    "{name}: control points must be finite"
                )));
            }
        }
        Ok(())
    }
}

/// Read-only view of a lens calibration plus the circle of confusion.
///
/// Once loaded it is only read, so a shared reference can be handed to any
/// number of callers.
#[derive(Debug, Clone)]
pub struct CalibrationContext {
    data: CalibrationData,
    circle_of_confusion: f64,
}

impl Default for CalibrationContext {
    fn default() -> Self {
        Self {
            data: CalibrationData::default(),
            circle_of_confusion: DEFAULT_CIRCLE_OF_CONFUSION,
        }
    }
}

impl CalibrationContext {
    /// An empty context; every conversion reports [`LensStatus::NoCalibration`].
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_data(data: CalibrationData) -> Self {
        let mut context = Self::default();
        context.load(data);
        context
    }

    /// Installs the calibration data.
    ///
    /// # Returns
    ///
    /// [`LensStatus::Ok`], or [`LensStatus::NoCalibration`] if `data` is empty.
    pub fn load(&mut self, data: CalibrationData) -> LensStatus {
        self.data = data;
        if self.data.is_empty() {
            warn!("Calibration data is empty");
            return LensStatus::NoCalibration;
        }
        info!(
            "Loaded calibration: FL {}-{}mm, {} zoom / {} focus / {} iris steps",
            self.data.fl_min,
            self.data.fl_max,
            self.data.zoom_steps,
            self.data.focus_steps,
            self.data.iris_steps
        );
        LensStatus::Ok
    }

    /// Sets the circle of confusion in mm.
    ///
    /// The value is always applied; one outside [`CIRCLE_OF_CONFUSION_RANGE`]
    /// returns [`LensStatus::ValueWarning`].
    pub fn load_circle_of_confusion(&mut self, coc: f64) -> LensStatus {
        self.circle_of_confusion = coc;
        let (min, max) = CIRCLE_OF_CONFUSION_RANGE;
        if !(min..=max).contains(&coc) {
            warn!("Circle of confusion {coc}mm is outside {min}-{max}mm, check units");
            return LensStatus::ValueWarning;
        }
        LensStatus::Ok
    }

    pub fn load_from_yaml(path: &str) -> Result<Self, CalibrationError> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::from_data(CalibrationData::from_yaml_str(&contents)?))
    }

    pub fn load_from_json(path: &str) -> Result<Self, CalibrationError> {
        let contents = fs::read_to_string(path)?;
        Ok(Self::from_data(CalibrationData::from_json_str(&contents)?))
    }

    pub fn is_loaded(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn data(&self) -> &CalibrationData {
        &self.data
    }

    pub fn circle_of_confusion(&self) -> f64 {
        self.circle_of_confusion
    }

    pub fn od_min(&self) -> f64 {
        self.data.od_min.unwrap_or(OD_MIN_DEFAULT)
    }

    pub fn od_max(&self) -> f64 {
        self.data.od_max.unwrap_or(INFINITY)
    }

    pub(crate) fn fl_curves(&self) -> Option<&FocalLengthCurves> {
        self.data.fl.as_ref()
    }

    pub(crate) fn tracking(&self) -> Option<&CurveSet> {
        non_empty(&self.data.tracking)
    }

    pub(crate) fn aperture(&self) -> Option<&CurveSet> {
        non_empty(&self.data.ap)
    }

    pub(crate) fn distortion(&self) -> Option<&CurveSet> {
        non_empty(&self.data.dist)
    }

    pub(crate) fn iris(&self) -> Option<&CurveSet> {
        non_empty(&self.data.iris)
    }
}

fn non_empty(section: &Option<CurveSet>) -> Option<&CurveSet> {
    section.as_ref().filter(|curves| !curves.is_empty())
}

/// The synthetic lens in `samples/test_lens.yaml`.
#[cfg(test)]
pub(crate) fn test_lens() -> CalibrationContext {
    CalibrationContext::load_from_yaml("samples/test_lens.yaml").unwrap()
}
