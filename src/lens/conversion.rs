//! Step <-> unit conversions for focal length, object distance, numerical
//! aperture and F-number.

use log::{debug, warn};

use crate::calibration::{CalibrationContext, FocalLengthCurves};
use crate::lens::{fnum_to_na, na_to_fnum, Bounded, Checked, LensStatus};
use crate::numeric::{self, polyval};

/// Focus steps tolerated past the infinity end of the tracking curves before
/// the object distance is not calculated at all. Guards against polynomial
/// wrap-around.
pub const INFINITY_END_MARGIN: f64 = 100.0;
/// Focus steps tolerated past the near end of the tracking curves.
pub const NEAR_END_MARGIN: f64 = 400.0;
/// Degree of the local focus step -> inverse distance refit.
const TRACKING_REFIT_DEGREE: usize = 3;
/// Starting iris step for the NA root search.
pub const IRIS_ROOT_SEED: f64 = 20.0;
/// Smallest numerical aperture ever reported as the lower bound.
pub const NA_FLOOR: f64 = 0.01;

impl CalibrationContext {
    /// Focal length (mm) at a zoom step.
    ///
    /// The value is returned even outside `[flMin, flMax]`, where it comes from
    /// curve extrapolation; the status then reports [`LensStatus::FlMin`] or
    /// [`LensStatus::FlMax`]. The bounds are the calibrated limits.
    pub fn zoom_step_to_fl(&self, zoom_step: i32) -> Bounded<f64> {
        let Some(coef) = self.fl_curves().and_then(FocalLengthCurves::inverse) else {
            return Bounded::no_calibration();
        };

        let fl = polyval(coef, zoom_step as f64);
        let (fl_min, fl_max) = (self.data().fl_min, self.data().fl_max);
        let status = if fl < fl_min {
            LensStatus::FlMin
        } else if fl > fl_max {
            LensStatus::FlMax
        } else {
            LensStatus::Ok
        };

        Bounded {
            value: fl,
            status,
            min: fl_min,
            max: fl_max,
        }
    }

    /// Zoom step for a focal length, clamped to `[0, zoomSteps]`. A non-finite
    /// result is [`LensStatus::Calculation`].
    pub fn fl_to_zoom_step(&self, fl: f64) -> Checked<i32> {
        let Some(coef) = self.fl_curves().and_then(FocalLengthCurves::forward) else {
            return Checked::no_calibration();
        };

        let zoom_step = polyval(coef, fl);
        if !zoom_step.is_finite() {
            return Checked::new(0, LensStatus::Calculation);
        }
        clamp_step(zoom_step as i32, self.data().zoom_steps)
    }

    /// Object distance (m) at a focus step for the given zoom step.
    ///
    /// The tracking curves are evaluated at `zoom_step` (shifted by `bfl`
    /// focus steps) and a cubic is refit locally from focus step to inverse
    /// distance. Focus steps far past either end of the tracking range are not
    /// calculated (value 0) since the refit wraps around there. The bounds are
    /// the calibrated `[odMin, odMax]`.
    pub fn focus_step_to_od(&self, focus_step: i32, zoom_step: i32, bfl: i32) -> Bounded<f64> {
        let Some(tracking) = self.tracking() else {
            return Bounded::no_calibration();
        };

        let focus_steps: Vec<f64> = tracking
            .evaluate_all(zoom_step as f64)
            .into_iter()
            .map(|step| step + bfl as f64)
            .collect();
        let (od_min, od_max) = (self.od_min(), self.od_max());
        let bounded = |value, status| Bounded {
            value,
            status,
            min: od_min,
            max: od_max,
        };

        // index 0 is infinity focus, the last index is the closest focus
        let infinity_end = focus_steps[0];
        let near_end = focus_steps[focus_steps.len() - 1];
        let focus = focus_step as f64;
        if focus > infinity_end + INFINITY_END_MARGIN {
            debug!("Focus step {focus_step} is past infinity ({infinity_end:.1}), not calculated");
            return bounded(0.0, LensStatus::OdMax);
        }
        if focus < near_end - NEAR_END_MARGIN {
            debug!("Focus step {focus_step} is past close focus ({near_end:.1}), not calculated");
            return bounded(0.0, LensStatus::OdMin);
        }

        let coef = numeric::polyfit(
            &focus_steps,
            &tracking.cp1[..tracking.len()],
            TRACKING_REFIT_DEGREE,
        );
        let od = 1000.0 / polyval(&coef, focus);

        // focus beyond infinity comes out negative
        let status = if od < 0.0 {
            LensStatus::OdMax
        } else if od < od_min {
            LensStatus::OdMin
        } else {
            LensStatus::Ok
        };
        bounded(od, status)
    }

    /// Focus step for an object distance (m) at the given zoom step.
    ///
    /// `bfl` is added after interpolation; the result is clamped to
    /// `[0, focusSteps]`.
    pub fn od_to_focus_step(&self, od: f64, zoom_step: i32, bfl: i32) -> Checked<i32> {
        let Some(tracking) = self.tracking() else {
            return Checked::no_calibration();
        };
        if od == 0.0 || od.is_nan() {
            return Checked::new(0, LensStatus::Calculation);
        }

        let inverse_od = 1000.0 / od;
        let focus_step = tracking.interpolate(inverse_od, zoom_step as f64);
        if !focus_step.is_finite() {
            return Checked::new(0, LensStatus::Calculation);
        }
        clamp_step((focus_step as i32).saturating_add(bfl), self.data().focus_steps)
    }

    /// Focus step for an object distance (m) at a focal length (mm).
    pub fn od_fl_to_focus_step(&self, od: f64, fl: f64, bfl: i32) -> Checked<i32> {
        if !self.is_loaded() {
            return Checked::no_calibration();
        }
        let zoom = self.fl_to_zoom_step(fl);
        if zoom.status == LensStatus::Calculation {
            return zoom;
        }
        self.od_to_focus_step(od, zoom.value, bfl)
    }

    /// Numerical aperture at an iris step and focal length.
    ///
    /// `NAMax` is the smaller of the fully open curve value and the design
    /// `1 / (2 fnum)`; `NAMin` is the curve at `irisSteps`, floored at
    /// [`NA_FLOOR`]. With `range_limit` an out-of-range value is clamped to the
    /// violated bound, otherwise the raw value is returned with the error status.
    pub fn iris_step_to_na(&self, iris_step: i32, fl: f64, range_limit: bool) -> Bounded<f64> {
        let Some(ap) = self.aperture() else {
            return Bounded::no_calibration();
        };

        let mut na = ap.interpolate(fl, iris_step as f64);
        let na_min = ap
            .interpolate(fl, self.data().iris_steps as f64)
            .max(NA_FLOOR);
        let na_max = ap.interpolate(fl, 0.0).min(fnum_to_na(self.data().fnum));

        let mut status = LensStatus::Ok;
        if na > na_max {
            status = LensStatus::NaMax;
            if range_limit {
                na = na_max;
            }
        } else if na < na_min {
            status = LensStatus::NaMin;
            if range_limit {
                na = na_min;
            }
        }

        Bounded {
            value: na,
            status,
            min: na_min,
            max: na_max,
        }
    }

    /// F-number at an iris step and focal length.
    ///
    /// Computed through [`Self::iris_step_to_na`] (range limited) and inverted,
    /// so `min` is the F-number at the minimum NA (the largest F-number) and
    /// `max` the F-number at the maximum NA.
    pub fn iris_step_to_fnum(&self, iris_step: i32, fl: f64) -> Bounded<f64> {
        if self.aperture().is_none() {
            return Bounded::no_calibration();
        }
        let na = self.iris_step_to_na(iris_step, fl, true);
        Bounded {
            value: na_to_fnum(na.value),
            status: na.status,
            min: na_to_fnum(na.min),
            max: na_to_fnum(na.max),
        }
    }

    /// Iris step giving a numerical aperture at a focal length.
    ///
    /// The iris step is solved on the aperture curves of the two calibrated
    /// focal lengths nearest to `fl` and interpolated between them. A curve
    /// that never opens as wide as `na` contributes step 0
    /// ([`LensStatus::NaMax`]); one with no root contributes `irisSteps`
    /// ([`LensStatus::NaMin`]).
    pub fn na_to_iris_step(&self, na: f64, fl: f64) -> Checked<i32> {
        let Some(ap) = self.aperture() else {
            return Checked::no_calibration();
        };
        if na.is_nan() || !fl.is_finite() {
            return Checked::new(0, LensStatus::Calculation);
        }

        let control_points = &ap.cp1[..ap.len()];
        let indices = match numeric::nearest_pair(control_points, fl) {
            Some((a, b)) => vec![a.min(b), a.max(b)],
            None => vec![0],
        };

        let mut status = LensStatus::Ok;
        let mut steps = Vec::with_capacity(indices.len());
        for &idx in &indices {
            let coef = &ap.coef[idx];
            let step = if na < polyval(coef, 0.0) {
                match numeric::polynomial_root(coef, na, IRIS_ROOT_SEED) {
                    Ok(step) => step,
                    Err(err) => {
                        warn!(
                            "No iris step for NA {na} at FL {}: {err}, using the closed iris",
                            control_points[idx]
                        );
                        status = LensStatus::NaMin;
                        self.data().iris_steps as f64
                    }
                }
            } else {
                status = LensStatus::NaMax;
                0.0
            };
            steps.push(step);
        }

        let iris_step = match (indices.as_slice(), steps.as_slice()) {
            ([lower, upper], [lower_step, upper_step]) => {
                let factor = numeric::interpolation_factor(
                    fl,
                    control_points[*lower],
                    control_points[*upper],
                );
                lower_step + factor * (upper_step - lower_step)
            }
            (_, [step, ..]) => *step,
            _ => 0.0,
        };
        debug!("NA {na} at FL {fl}: iris steps {steps:?} -> {iris_step:.2}");
        if !iris_step.is_finite() {
            return Checked::new(0, LensStatus::Calculation);
        }

        Checked::new(iris_step as i32, status)
    }

    /// Iris step giving an F-number at a focal length.
    pub fn fnum_to_iris_step(&self, fnum: f64, fl: f64) -> Checked<i32> {
        if self.aperture().is_none() {
            return Checked::no_calibration();
        }
        self.na_to_iris_step(fnum_to_na(fnum), fl)
    }
}

fn clamp_step(step: i32, max_step: i32) -> Checked<i32> {
    if step < 0 {
        Checked::new(0, LensStatus::RangeMin)
    } else if step > max_step {
        Checked::new(max_step, LensStatus::RangeMax)
    } else {
        Checked::new(step, LensStatus::Ok)
    }
}
