//! Inverse of the angle/field of view: the zoom (and focus) steps that frame
//! a requested view.

use log::{debug, warn};

use crate::calibration::CalibrationContext;
use crate::lens::{fov_to_aov, LensStatus, MotorSteps};
use crate::numeric;

/// A calibrated focal length and its full angle of view.
#[derive(Debug, Clone, Copy)]
struct ViewPoint {
    fl: f64,
    aov: f64,
}

impl CalibrationContext {
    /// Zoom and focus steps for a full angle of view (degrees).
    ///
    /// The focal length is interpolated between the calibrated focal lengths
    /// whose angles of view bracket `aov`, or extrapolated from the two widest
    /// (narrowest) ones when `aov` is wider (narrower) than the lens covers. A
    /// focal length outside `[flMin, flMax]` is reported as
    /// [`LensStatus::RangeMin`] / [`LensStatus::RangeMax`] but not clamped; the
    /// zoom step itself is always clamped to the motor range.
    ///
    /// # Arguments
    ///
    /// * `aov` - Target full angle of view in degrees
    /// * `sensor_width` - Sensor width in mm
    /// * `od` - Object distance in meters to focus at. `None` or a negative
    ///   distance skips the focus calculation and reports [`LensStatus::OdValue`]
    /// * `bfl` - Back focal length correction in focus steps
    pub fn aov_to_motor_steps(
        &self,
        aov: f64,
        sensor_width: f64,
        od: Option<f64>,
        bfl: i32,
    ) -> MotorSteps {
        let Some(dist) = self.distortion() else {
            return MotorSteps::failed(LensStatus::NoCalibration);
        };

        let mut fl_list = dist.cp1[..dist.len()].to_vec();
        if fl_list.len() < 2 {
            warn!("Angle of view needs at least two calibrated focal lengths");
            return MotorSteps::failed(LensStatus::Calculation);
        }
        fl_list.sort_by(|a, b| a.total_cmp(b));

        let view_at = |fl: f64| ViewPoint {
            fl,
            aov: self.calc_aov(sensor_width, fl).value,
        };

        // widest FL still wider than the target, and the first one that is not
        let mut lower: Option<ViewPoint> = None;
        let mut upper: Option<ViewPoint> = None;
        for &fl in &fl_list {
            let view = view_at(fl);
            if view.aov > aov {
                lower = Some(view);
            } else if upper.is_none() {
                upper = Some(view);
            }
        }

        let (lower, upper) = match (lower, upper) {
            (Some(lower), Some(upper)) => (lower, upper),
            // wider than the lens: extrapolate from the two widest
            (None, Some(upper)) => (upper, view_at(fl_list[1])),
            // narrower than the lens: extrapolate from the two narrowest
            (Some(lower), None) => (view_at(fl_list[fl_list.len() - 2]), lower),
            (None, None) => return MotorSteps::failed(LensStatus::Calculation),
        };

        let factor = numeric::interpolation_factor(aov, lower.aov, upper.aov);
        let fl = lower.fl + factor * (upper.fl - lower.fl);
        if !fl.is_finite() {
            warn!("AOV {aov}deg gives no usable focal length");
            return MotorSteps::failed(LensStatus::Calculation);
        }
        debug!(
            "AOV {aov:.3}deg between {:.2}mm ({:.3}deg) and {:.2}mm ({:.3}deg): FL {fl:.3}mm",
            lower.fl, lower.aov, upper.fl, upper.aov
        );

        let status = if fl < self.data().fl_min {
            LensStatus::RangeMin
        } else if fl > self.data().fl_max {
            LensStatus::RangeMax
        } else {
            LensStatus::Ok
        };

        let zoom_step = self.fl_to_zoom_step(fl).value;

        let od = match od {
            Some(od) if od >= 0.0 => od,
            _ => {
                return MotorSteps {
                    focus_step: 0,
                    zoom_step,
                    focal_length: fl,
                    status: LensStatus::OdValue,
                }
            }
        };

        let focus_step = self.od_to_focus_step(od, zoom_step, bfl).value;
        MotorSteps {
            focus_step,
            zoom_step,
            focal_length: fl,
            status,
        }
    }

    /// Zoom and focus steps for a full field of view `fov` (m) at `od` (m).
    ///
    /// The field of view is turned into an angle of view first; a zero or
    /// missing `fov`/`od` cannot be converted and reports
    /// [`LensStatus::Calculation`].
    pub fn fov_to_motor_steps(
        &self,
        fov: f64,
        sensor_width: f64,
        od: Option<f64>,
        bfl: i32,
    ) -> MotorSteps {
        if self.distortion().is_none() {
            return MotorSteps::failed(LensStatus::NoCalibration);
        }
        let aov = fov_to_aov(fov, od);
        if aov == 0.0 {
            return MotorSteps::failed(LensStatus::Calculation);
        }
        self.aov_to_motor_steps(aov, sensor_width, od, bfl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::{test_lens, CalibrationData, CurveSet};
    use approx::assert_relative_eq;

    // test lens with a 6.4mm sensor: 32deg at 10mm, 16deg at 20mm, 9.6deg at 30mm
    const SENSOR_WIDTH: f64 = 6.4;

    #[test]
    fn test_no_calibration() {
        let context = CalibrationContext::new();
        assert_eq!(
            context.aov_to_motor_steps(16.0, SENSOR_WIDTH, Some(10.0), 0),
            MotorSteps::failed(LensStatus::NoCalibration)
        );
        assert_eq!(
            context.fov_to_motor_steps(2.0, SENSOR_WIDTH, Some(10.0), 0).status,
            LensStatus::NoCalibration
        );
    }

    #[test]
    fn test_aov_on_control_point() {
        let context = test_lens();
        let steps = context.aov_to_motor_steps(16.0, SENSOR_WIDTH, Some(10.0), 0);
        assert_eq!(steps.status, LensStatus::Ok);
        assert_relative_eq!(steps.focal_length, 20.0, epsilon = 1e-9);
        assert!((steps.zoom_step - 1000).abs() <= 1);
        assert!((steps.focus_step - 5100).abs() <= 1);
    }

    #[test]
    fn test_aov_between_control_points() {
        let context = test_lens();
        // 24deg is halfway between 32deg (10mm) and 16deg (20mm)
        let steps = context.aov_to_motor_steps(24.0, SENSOR_WIDTH, None, 0);
        assert_relative_eq!(steps.focal_length, 15.0, epsilon = 1e-9);
        assert!((steps.zoom_step - 500).abs() <= 1);
        assert_eq!(steps.focus_step, 0);
        assert_eq!(steps.status, LensStatus::OdValue);
    }

    #[test]
    fn test_aov_wider_than_lens_extrapolates() {
        let context = test_lens();
        let steps = context.aov_to_motor_steps(40.0, SENSOR_WIDTH, Some(10.0), 0);
        // from (10mm, 32deg) and (20mm, 16deg)
        assert_relative_eq!(steps.focal_length, 5.0, epsilon = 1e-9);
        assert_eq!(steps.status, LensStatus::RangeMin);
        assert_eq!(steps.zoom_step, 0);
    }

    #[test]
    fn test_aov_narrower_than_lens_extrapolates() {
        let context = test_lens();
        let steps = context.aov_to_motor_steps(5.0, SENSOR_WIDTH, Some(10.0), 0);
        // from (20mm, 16deg) and (30mm, 9.6deg)
        assert_relative_eq!(steps.focal_length, 20.0 + 10.0 * 11.0 / 6.4, epsilon = 1e-9);
        assert_eq!(steps.status, LensStatus::RangeMax);
        assert!((steps.zoom_step - 2718).abs() <= 1);
    }

    #[test]
    fn test_non_finite_aov_is_calc_error() {
        let context = test_lens();
        for aov in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert_eq!(
                context.aov_to_motor_steps(aov, SENSOR_WIDTH, Some(10.0), 0),
                MotorSteps::failed(LensStatus::Calculation)
            );
        }
        assert_eq!(
            context.aov_to_motor_steps(16.0, f64::NAN, None, 0),
            MotorSteps::failed(LensStatus::Calculation)
        );
        assert_eq!(
            context.fov_to_motor_steps(f64::NAN, SENSOR_WIDTH, Some(10.0), 0).status,
            LensStatus::Calculation
        );
    }

    #[test]
    fn test_negative_od_skips_focus() {
        let context = test_lens();
        let steps = context.aov_to_motor_steps(16.0, SENSOR_WIDTH, Some(-1.0), 0);
        assert_eq!(steps.status, LensStatus::OdValue);
        assert_eq!(steps.focus_step, 0);
        assert!((steps.zoom_step - 1000).abs() <= 1);
    }

    #[test]
    fn test_bfl_applied_to_focus() {
        let context = test_lens();
        let plain = context.aov_to_motor_steps(16.0, SENSOR_WIDTH, Some(4.0), 0);
        let shifted = context.aov_to_motor_steps(16.0, SENSOR_WIDTH, Some(4.0), 25);
        assert_eq!(shifted.focus_step - plain.focus_step, 25);
    }

    #[test]
    fn test_single_control_point_cannot_bracket() {
        let data = CalibrationData {
            fl_min: 10.0,
            fl_max: 10.0,
            dist: Some(CurveSet::new(vec![10.0], vec![vec![0.0, 5.0]])),
            ..Default::default()
        };
        let context = CalibrationContext::from_data(data);
        assert_eq!(
            context.aov_to_motor_steps(16.0, SENSOR_WIDTH, None, 0).status,
            LensStatus::Calculation
        );
    }

    #[test]
    fn test_fov_to_motor_steps() {
        let context = test_lens();
        let fov = 2.0 * 10.0 * 8f64.to_radians().tan();
        let steps = context.fov_to_motor_steps(fov, SENSOR_WIDTH, Some(10.0), 0);
        assert_eq!(steps.status, LensStatus::Ok);
        assert_relative_eq!(steps.focal_length, 20.0, epsilon = 1e-6);
        assert!((steps.zoom_step - 1000).abs() <= 1);
        assert!((steps.focus_step - 5100).abs() <= 1);
    }

    #[test]
    fn test_fov_without_distance_is_calc_error() {
        let context = test_lens();
        assert_eq!(
            context.fov_to_motor_steps(2.0, SENSOR_WIDTH, None, 0),
            MotorSteps::failed(LensStatus::Calculation)
        );
        assert_eq!(
            context.fov_to_motor_steps(0.0, SENSOR_WIDTH, Some(10.0), 0).status,
            LensStatus::Calculation
        );
    }
}
