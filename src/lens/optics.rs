//! Angle of view, field of view and depth of field.

use log::debug;

use crate::calibration::{CalibrationContext, INFINITY};
use crate::lens::{Bounded, Checked, LensStatus};

impl CalibrationContext {
    /// Full angle of view in degrees for a sensor width (mm) at a focal length (mm).
    pub fn calc_aov(&self, sensor_width: f64, fl: f64) -> Checked<f64> {
        let Some(dist) = self.distortion() else {
            return Checked::no_calibration();
        };
        let semi_aov = dist.interpolate(fl, sensor_width / 2.0).abs();
        Checked::new(2.0 * semi_aov, LensStatus::Ok)
    }

    /// Full field of view in meters at object distance `od` (m).
    pub fn calc_fov(&self, sensor_width: f64, fl: f64, od: f64) -> Checked<f64> {
        if self.distortion().is_none() {
            return Checked::no_calibration();
        }
        let aov = self.calc_aov(sensor_width, fl).value;
        let fov = 2.0 * od * (aov / 2.0).to_radians().tan();
        Checked::new(fov, LensStatus::Ok)
    }

    /// Depth of field at an iris step, focal length (mm) and object distance (m).
    ///
    /// `min`/`max` are the nearest and farthest object distances in acceptable
    /// focus for the loaded circle of confusion. Anything at or past
    /// [`INFINITY`] is reported as [`INFINITY`], and so is the depth of field
    /// whenever the far limit reaches it.
    pub fn calc_dof(&self, iris_step: i32, fl: f64, od: f64) -> Bounded<f64> {
        let Some(iris) = self.iris() else {
            return Bounded::no_calibration();
        };
        if od >= INFINITY {
            return Bounded {
                value: INFINITY,
                status: LensStatus::Ok,
                min: INFINITY,
                max: INFINITY,
            };
        }

        let diameter = iris.interpolate(fl, iris_step as f64);
        let magnification = (fl / 1000.0) / od;
        let blur_ratio = self.circle_of_confusion() / (diameter * magnification);

        let od_min = (od / (1.0 + blur_ratio)).min(INFINITY);
        let mut od_max = (od / (1.0 - blur_ratio)).min(INFINITY);
        // past the hyperfocal distance the far limit flips sign
        if od_max < 0.0 {
            od_max = INFINITY;
        }
        let dof = if od_max == INFINITY {
            INFINITY
        } else {
            od_max - od_min
        };
        debug!("DOF at {od}m: aperture {diameter:.3}mm, near {od_min:.3}m, far {od_max:.3}m");

        Bounded {
            value: dof,
            status: LensStatus::Ok,
            min: od_min,
            max: od_max,
        }
    }

    /// Closed-form full depth of field in meters.
    ///
    /// `2 OD^2 COC / (FL D)` with distances in mm. Less accurate than
    /// [`Self::calc_dof`], which should be preferred.
    pub fn calc_full_dof(&self, iris_step: i32, fl: f64, od: f64) -> Checked<f64> {
        let Some(iris) = self.iris() else {
            return Checked::no_calibration();
        };
        let diameter = iris.interpolate(fl, iris_step as f64);
        let od_mm = od * 1000.0;
        let dof_mm = (2.0 * od_mm * od_mm * self.circle_of_confusion()) / (fl * diameter);
        Checked::new(dof_mm / 1000.0, LensStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::test_lens;
    use approx::assert_relative_eq;

    #[test]
    fn test_no_calibration() {
        let context = CalibrationContext::new();
        assert_eq!(context.calc_aov(6.4, 20.0), Checked::new(0.0, LensStatus::NoCalibration));
        assert_eq!(context.calc_fov(6.4, 20.0, 10.0).status, LensStatus::NoCalibration);
        let dof = context.calc_dof(0, 20.0, 5.0);
        assert_eq!((dof.value, dof.status, dof.min, dof.max), (0.0, LensStatus::NoCalibration, 0.0, 0.0));
        assert_eq!(context.calc_full_dof(0, 20.0, 5.0).status, LensStatus::NoCalibration);
    }

    #[test]
    fn test_calc_aov() {
        let context = test_lens();
        assert_relative_eq!(context.calc_aov(6.4, 20.0).value, 16.0, epsilon = 1e-12);
        assert_relative_eq!(context.calc_aov(6.4, 10.0).value, 32.0, epsilon = 1e-12);
        // halfway between 10mm and 20mm
        assert_relative_eq!(context.calc_aov(6.4, 15.0).value, 24.0, epsilon = 1e-12);
    }

    #[test]
    fn test_calc_fov() {
        let context = test_lens();
        let fov = context.calc_fov(6.4, 20.0, 10.0);
        assert_eq!(fov.status, LensStatus::Ok);
        assert_relative_eq!(fov.value, 20.0 * 8f64.to_radians().tan(), epsilon = 1e-12);
    }

    #[test]
    fn test_calc_dof() {
        let context = test_lens();
        // 10mm aperture at 20mm, 5m: blur ratio 0.5
        let dof = context.calc_dof(0, 20.0, 5.0);
        assert_eq!(dof.status, LensStatus::Ok);
        assert_relative_eq!(dof.min, 5.0 / 1.5, epsilon = 1e-9);
        assert_relative_eq!(dof.max, 10.0, epsilon = 1e-9);
        assert_relative_eq!(dof.value, 10.0 - 5.0 / 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_calc_dof_past_hyperfocal() {
        let context = test_lens();
        let dof = context.calc_dof(0, 20.0, 20.0);
        assert_eq!(dof.value, INFINITY);
        assert_eq!(dof.max, INFINITY);
        assert_relative_eq!(dof.min, 20.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_calc_dof_infinite_distance() {
        let context = test_lens();
        for (iris_step, fl) in [(0, 10.0), (30, 20.0), (75, 30.0), (-5, 12.5)] {
            for od in [INFINITY, 2.0 * INFINITY] {
                let dof = context.calc_dof(iris_step, fl, od);
                assert_eq!((dof.value, dof.min, dof.max), (INFINITY, INFINITY, INFINITY));
            }
        }
    }

    #[test]
    fn test_calc_dof_uses_loaded_circle_of_confusion() {
        let mut context = test_lens();
        assert_eq!(context.load_circle_of_confusion(0.15), LensStatus::ValueWarning);
        // blur ratio 3.75: far limit is infinite
        let dof = context.calc_dof(0, 20.0, 5.0);
        assert_eq!(dof.value, INFINITY);
        assert_relative_eq!(dof.min, 5.0 / 4.75, epsilon = 1e-9);
    }

    #[test]
    fn test_calc_full_dof() {
        let mut context = test_lens();
        assert_relative_eq!(context.calc_full_dof(0, 20.0, 5.0).value, 5.0, epsilon = 1e-9);
        context.load_circle_of_confusion(0.15);
        assert_relative_eq!(context.calc_full_dof(0, 20.0, 5.0).value, 37.5, epsilon = 1e-9);
    }
}
