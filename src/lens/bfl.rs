//! Back focal length (BFL) correction.
//!
//! Mechanical tolerance between the lens and the sensor shifts best focus by
//! a few focus steps. The shift is sampled by the user at best focus for a
//! few focal lengths and fit as a low-order polynomial in focal length:
//!
//! | samples | fit |
//! |---------|-----|
//! | 0       | no correction |
//! | 1       | constant |
//! | 2-3     | linear |
//! | 4+      | quadratic |

use log::debug;
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationContext, INFINITY};
use crate::numeric;

/// One best-focus measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BflSample {
    /// Focal length in mm.
    pub focal_length: f64,
    /// Measured best focus step minus the calibrated focus step.
    pub step_offset: i32,
    /// Object distance in meters the sample was taken at.
    pub object_distance: f64,
}

/// Accumulated BFL samples and the correction fitted to them.
///
/// The fit is recomputed synchronously on every mutation and swapped in
/// whole, so [`BflCorrection::correction`] never sees a partial fit. Share it
/// behind a lock if several threads mutate it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BflCorrection {
    samples: Vec<BflSample>,
    coefficients: Vec<f64>,
}

impl BflCorrection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a correction from previously stored samples.
    pub fn from_samples(samples: Vec<BflSample>) -> Self {
        let mut correction = Self {
            samples,
            coefficients: Vec::new(),
        };
        correction.refit();
        correction
    }

    pub fn samples(&self) -> &[BflSample] {
        &self.samples
    }

    /// Fitted polynomial (focal length -> focus step offset), low-degree-first.
    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Focus step correction at a focal length; 0 without samples.
    ///
    /// All object distances share one fit for now.
    pub fn correction(&self, fl: f64) -> i32 {
        if self.coefficients.is_empty() {
            return 0;
        }
        numeric::polyval(&self.coefficients, fl) as i32
    }

    /// Records the best-focus step found at `fl` (mm) and `od` (m).
    ///
    /// The offset is taken against the uncorrected focus step the calibration
    /// predicts for the same object distance and focal length.
    ///
    /// # Returns
    ///
    /// All samples recorded so far.
    pub fn add_sample(
        &mut self,
        context: &CalibrationContext,
        focus_step: i32,
        fl: f64,
        od: f64,
    ) -> &[BflSample] {
        let design_focus_step = context.od_fl_to_focus_step(od, fl, 0).value;
        self.samples.push(BflSample {
            focal_length: fl,
            step_offset: focus_step - design_focus_step,
            object_distance: od,
        });
        self.refit();
        &self.samples
    }

    /// Records a best-focus step at infinity.
    pub fn add_sample_at_infinity(
        &mut self,
        context: &CalibrationContext,
        focus_step: i32,
        fl: f64,
    ) -> &[BflSample] {
        self.add_sample(context, focus_step, fl, INFINITY)
    }

    /// Removes the sample at `index`; out-of-range indices are ignored.
    pub fn remove_by_index(&mut self, index: usize) -> &[BflSample] {
        if index < self.samples.len() {
            self.samples.remove(index);
            self.refit();
        }
        &self.samples
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.coefficients.clear();
    }

    fn refit(&mut self) {
        let coefficients = match self.samples.len() {
            0 => Vec::new(),
            1 => vec![self.samples[0].step_offset as f64],
            n => {
                let degree = if n <= 3 { 1 } else { 2 };
                let (fls, offsets): (Vec<f64>, Vec<f64>) = self
                    .samples
                    .iter()
                    .map(|s| (s.focal_length, s.step_offset as f64))
                    .unzip();
                numeric::polyfit(&fls, &offsets, degree)
            }
        };
        debug!(
            "BFL correction refit over {} samples: {coefficients:?}",
            self.samples.len()
        );
        self.coefficients = coefficients;
    }
}
