//! Current optical state of a lens, kept in step with its motors.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationContext, INFINITY};
use crate::lens::LensStatus;

/// A value with the status of its last computation and when that happened.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedValue<T> {
    pub value: T,
    pub status: LensStatus,
    pub updated: DateTime<Utc>,
}

impl<T> TrackedValue<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            status: LensStatus::Ok,
            updated: Utc::now(),
        }
    }

    fn set(&mut self, value: T, status: LensStatus) {
        self.value = value;
        self.status = status;
        self.updated = Utc::now();
    }
}

/// Motor positions and the optical values derived from them.
///
/// After moving a motor, call the matching `update_after_*` method; it
/// recomputes only what depends on that motor. Until a focus step has been
/// recorded the lens is assumed focused at [`INFINITY`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LensConfiguration {
    /// Sensor width in mm used for the angle and field of view.
    pub sensor_width: f64,
    /// Back focal length correction applied to focus steps.
    pub bfl: i32,

    pub zoom_step: TrackedValue<i32>,
    pub focus_step: Option<TrackedValue<i32>>,
    pub iris_step: TrackedValue<i32>,

    /// Focal length, mm.
    pub fl: TrackedValue<f64>,
    /// Object distance, m.
    pub od: TrackedValue<f64>,
    pub na: TrackedValue<f64>,
    pub fnum: TrackedValue<f64>,
    /// Full angle of view, degrees.
    pub aov: TrackedValue<f64>,
    /// Full field of view at the current object distance, m.
    pub fov: TrackedValue<f64>,
    /// Depth of field, m.
    pub dof: TrackedValue<f64>,
}

impl LensConfiguration {
    pub fn new(sensor_width: f64) -> Self {
        Self {
            sensor_width,
            bfl: 0,
            zoom_step: TrackedValue::new(0),
            focus_step: None,
            iris_step: TrackedValue::new(0),
            fl: TrackedValue::new(0.0),
            od: TrackedValue::new(INFINITY),
            na: TrackedValue::new(0.0),
            fnum: TrackedValue::new(0.0),
            aov: TrackedValue::new(0.0),
            fov: TrackedValue::new(0.0),
            dof: TrackedValue::new(0.0),
        }
    }

    /// Object distance used for field and depth of field; distances that
    /// could not be calculated count as infinity.
    pub fn working_od(&self) -> f64 {
        if self.od.value > 0.0 {
            self.od.value
        } else {
            INFINITY
        }
    }

    /// Zoom moved: everything depends on the focal length.
    pub fn update_after_zoom(&mut self, context: &CalibrationContext, zoom_step: i32) {
        self.zoom_step.set(zoom_step, LensStatus::Ok);
        let fl = context.zoom_step_to_fl(zoom_step);
        self.fl.set(fl.value, fl.status);
        debug!("Zoom step {zoom_step}: FL {:.2}mm ({})", fl.value, fl.status);

        self.update_od(context);
        self.update_aperture(context);
        self.update_view(context);
        self.update_dof(context);
    }

    pub fn update_after_focus(&mut self, context: &CalibrationContext, focus_step: i32) {
        match &mut self.focus_step {
            Some(tracked) => tracked.set(focus_step, LensStatus::Ok),
            None => self.focus_step = Some(TrackedValue::new(focus_step)),
        }
        self.update_od(context);
        self.update_view(context);
        self.update_dof(context);
    }

    pub fn update_after_iris(&mut self, context: &CalibrationContext, iris_step: i32) {
        self.iris_step.set(iris_step, LensStatus::Ok);
        self.update_aperture(context);
        self.update_dof(context);
    }

    fn update_od(&mut self, context: &CalibrationContext) {
        let Some(focus_step) = self.focus_step.map(|tracked| tracked.value) else {
            return;
        };
        let od = context.focus_step_to_od(focus_step, self.zoom_step.value, self.bfl);
        self.od.set(od.value, od.status);
    }

    fn update_aperture(&mut self, context: &CalibrationContext) {
        let na = context.iris_step_to_na(self.iris_step.value, self.fl.value, true);
        self.na.set(na.value, na.status);
        let fnum = context.iris_step_to_fnum(self.iris_step.value, self.fl.value);
        self.fnum.set(fnum.value, fnum.status);
    }

    fn update_view(&mut self, context: &CalibrationContext) {
        let aov = context.calc_aov(self.sensor_width, self.fl.value);
        self.aov.set(aov.value, aov.status);
        let fov = context.calc_fov(self.sensor_width, self.fl.value, self.working_od());
        self.fov.set(fov.value, fov.status);
    }

    fn update_dof(&mut self, context: &CalibrationContext) {
        let dof = context.calc_dof(self.iris_step.value, self.fl.value, self.working_od());
        self.dof.set(dof.value, dof.status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::test_lens;
    use approx::assert_relative_eq;

    #[test]
    fn test_zoom_updates_focal_length_and_view() {
        let context = test_lens();
        let mut lens = LensConfiguration::new(6.4);
        lens.update_after_zoom(&context, 1000);

        assert_relative_eq!(lens.fl.value, 20.0, epsilon = 1e-9);
        assert_eq!(lens.fl.status, LensStatus::Ok);
        assert_relative_eq!(lens.aov.value, 16.0, epsilon = 1e-9);
        assert_relative_eq!(lens.na.value, 0.28, epsilon = 1e-9);
        assert_relative_eq!(lens.fnum.value, 1.0 / 0.56, epsilon = 1e-9);
        // no focus step yet: focused at infinity
        assert!(lens.focus_step.is_none());
        assert_eq!(lens.od.value, INFINITY);
        assert_eq!(lens.dof.value, INFINITY);
    }

    #[test]
    fn test_focus_then_iris() {
        let context = test_lens();
        let mut lens = LensConfiguration::new(6.4);
        lens.update_after_zoom(&context, 1000);
        lens.update_after_focus(&context, 4500);

        assert_relative_eq!(lens.od.value, 4.0, epsilon = 1e-4);
        assert_relative_eq!(lens.fov.value, 8.0 * 8f64.to_radians().tan(), epsilon = 1e-4);
        // 10mm aperture, magnification 0.005: near 4/1.4, far 4/0.6
        assert_relative_eq!(lens.dof.value, 4.0 / 0.6 - 4.0 / 1.4, epsilon = 1e-3);

        let fl_updated = lens.fl.updated;
        let dof_open = lens.dof.value;
        lens.update_after_iris(&context, 50);
        assert_relative_eq!(lens.na.value, 0.13, epsilon = 1e-9);
        assert!(lens.dof.value > dof_open);
        // the focal length does not depend on the iris
        assert_eq!(lens.fl.updated, fl_updated);
    }

    #[test]
    fn test_zoom_refreshes_object_distance() {
        let context = test_lens();
        let mut lens = LensConfiguration::new(6.4);
        lens.update_after_zoom(&context, 1000);
        lens.update_after_focus(&context, 4700);
        assert_relative_eq!(lens.od.value, 5.0, epsilon = 1e-4);

        // the same focus step at the wide end reads on other tracking curves
        lens.update_after_zoom(&context, 0);
        assert_relative_eq!(lens.od.value, 1000.0 / 75.0, epsilon = 1e-3);
    }

    #[test]
    fn test_uncalibrated_lens_reports_status() {
        let context = CalibrationContext::new();
        let mut lens = LensConfiguration::new(6.4);
        lens.update_after_zoom(&context, 1000);
        assert_eq!(lens.fl.status, LensStatus::NoCalibration);
        assert_eq!(lens.aov.status, LensStatus::NoCalibration);
        assert_eq!(lens.dof.status, LensStatus::NoCalibration);
    }
}
