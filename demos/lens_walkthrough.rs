//! Lens Walkthrough Example
//!
//! This example steps a lens through zoom, focus and iris changes the way an
//! application would, printing the derived optical values after every move:
//! - Zoom to a focal length, object distance still unknown
//! - Focus at an object distance
//! - Stop down to an F-number
//! - Frame an angle of view with the solver
//!
//! The motors are simulated, so no controller board is needed.
//!
//! Usage:
//! ```bash
//! cargo run --example lens_walkthrough -- \
//!   --calibration samples/test_lens.yaml \
//!   --focal-length 15 --object-distance 10 --fnum 4
//! ```

use clap::Parser;
use flexi_logger::{colored_detailed_format, detailed_format, Duplicate, FileSpec, Logger};
use lens_iq::motor::Move;
use lens_iq::{
    BflCorrection, CalibrationContext, IrcState, LensConfiguration, MotorController, MotorDriver,
    MotorError,
};
use log::{info, warn};
use std::path::PathBuf;

/// Lens walkthrough on a simulated motor controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the lens calibration file (YAML)
    #[arg(short = 'c', long, default_value = "samples/test_lens.yaml")]
    calibration: PathBuf,

    /// Sensor width in mm
    #[arg(short = 's', long, default_value_t = 6.4)]
    sensor_width: f64,

    /// Target focal length in mm
    #[arg(short = 'f', long, default_value_t = 15.0)]
    focal_length: f64,

    /// Target object distance in m
    #[arg(short = 'd', long, default_value_t = 10.0)]
    object_distance: f64,

    /// Target F-number
    #[arg(short = 'n', long, default_value_t = 4.0)]
    fnum: f64,

    /// Full angle of view to frame at the end, in degrees
    #[arg(short = 'a', long, default_value_t = 20.0)]
    aov: f64,

    /// Circle of confusion in mm
    #[arg(long)]
    circle_of_confusion: Option<f64>,
}

/// Motor driver that moves instantly and never fails.
#[derive(Debug, Default)]
struct SimulatedDriver {
    focus: i32,
    zoom: i32,
    iris: i32,
    irc: IrcState,
}

impl MotorDriver for SimulatedDriver {
    fn init_focus(
        &mut self,
        _steps: i32,
        reference: i32,
        move_to_reference: bool,
        _accel: u8,
    ) -> Result<i32, MotorError> {
        if move_to_reference {
            self.focus = reference;
        }
        Ok(self.focus)
    }

    fn init_zoom(
        &mut self,
        _steps: i32,
        reference: i32,
        move_to_reference: bool,
        _accel: u8,
    ) -> Result<i32, MotorError> {
        if move_to_reference {
            self.zoom = reference;
        }
        Ok(self.zoom)
    }

    fn init_iris(
        &mut self,
        _steps: i32,
        reference: i32,
        move_to_reference: bool,
        _accel: u8,
    ) -> Result<i32, MotorError> {
        if move_to_reference {
            self.iris = reference;
        }
        Ok(self.iris)
    }

    fn init_irc(&mut self) -> Result<(), MotorError> {
        self.irc = IrcState::Clear;
        Ok(())
    }

    fn focus_abs(&mut self, step: i32, _speed: u32, _backlash: bool) -> Result<i32, MotorError> {
        self.focus = step;
        Ok(self.focus)
    }

    fn focus_rel(&mut self, delta: i32, _speed: u32, _backlash: bool) -> Result<i32, MotorError> {
        self.focus += delta;
        Ok(self.focus)
    }

    fn zoom_abs(&mut self, step: i32, _speed: u32, _backlash: bool) -> Result<i32, MotorError> {
        self.zoom = step;
        Ok(self.zoom)
    }

    fn zoom_rel(&mut self, delta: i32, _speed: u32, _backlash: bool) -> Result<i32, MotorError> {
        self.zoom += delta;
        Ok(self.zoom)
    }

    fn iris_abs(&mut self, step: i32, _speed: u32) -> Result<i32, MotorError> {
        self.iris = step;
        Ok(self.iris)
    }

    fn iris_rel(&mut self, delta: i32, _speed: u32) -> Result<i32, MotorError> {
        self.iris += delta;
        Ok(self.iris)
    }

    fn set_irc_state(&mut self, state: IrcState) -> Result<(), MotorError> {
        self.irc = state;
        Ok(())
    }
}

fn print_config(lens: &LensConfiguration) {
    let values = [
        ("AOV", &lens.aov),
        ("FOV", &lens.fov),
        ("DOF", &lens.dof),
        ("FL", &lens.fl),
        ("OD", &lens.od),
        ("FNum", &lens.fnum),
        ("NA", &lens.na),
    ];
    for (name, tracked) in values {
        info!(
            "  {name} = {:.2} [{}] (ts {})",
            tracked.value, tracked.status, tracked.updated
        );
    }
    for (name, tracked) in [("zoomStep", &lens.zoom_step), ("irisStep", &lens.iris_step)] {
        info!("  {name} = {} (ts {})", tracked.value, tracked.updated);
    }
    match &lens.focus_step {
        Some(tracked) => info!("  focusStep = {} (ts {})", tracked.value, tracked.updated),
        None => info!("  focusStep = unknown"),
    }
    info!("---");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    Logger::try_with_str("debug")?
        .log_to_file(
            FileSpec::default()
                .directory("logs")
                .suppress_timestamp()
                .suffix("log"),
        )
        .duplicate_to_stdout(Duplicate::Info)
        .format_for_files(detailed_format)
        .format_for_stdout(colored_detailed_format)
        .set_palette("196;208;76;39;178".to_string())
        .start()?;

    let cli = Cli::parse();

    let calibration_path = cli.calibration.to_str().ok_or("Invalid calibration path")?;
    let mut context = CalibrationContext::load_from_yaml(calibration_path)?;
    if let Err(err) = context.data().validate() {
        warn!("Calibration data looks inconsistent: {err}");
    }
    if let Some(coc) = cli.circle_of_confusion {
        let status = context.load_circle_of_confusion(coc);
        info!("Circle of confusion {coc}mm ({status})");
    }

    let data = context.data().clone();
    let mut motors = MotorController::new(SimulatedDriver::default());
    motors.init_zoom(data.zoom_steps, 0, true, 0)?;
    motors.init_focus(data.focus_steps, data.focus_steps, true, 0)?;
    motors.init_iris(data.iris_steps, true)?;
    motors.init_irc()?;
    motors.set_irc_state(IrcState::Bandpass)?;
    info!("IR-cut filter: {:?}", motors.driver().irc);

    let mut lens = LensConfiguration::new(cli.sensor_width);

    // zoom step for the focal length; the motor step size may not hit it exactly
    let fl = cli.focal_length;
    let zoom = context.fl_to_zoom_step(fl);
    info!("Zoom step {} for {fl}mm focal length ({})", zoom.value, zoom.status);
    let zoom_step = motors.move_zoom(Move::Absolute(zoom.value))?;
    lens.update_after_zoom(&context, zoom_step);
    info!("Updated parameters for FL {fl}mm, unknown object distance");
    print_config(&lens);

    let od = cli.object_distance;
    let focus = context.od_to_focus_step(od, zoom_step, lens.bfl);
    info!("Focus step {} for {od}m at {fl}mm ({})", focus.value, focus.status);
    let focus_step = motors.move_focus(Move::Absolute(focus.value))?;
    lens.update_after_focus(&context, focus_step);
    info!("Updated parameters at object distance {od}m");
    print_config(&lens);

    let fnum = cli.fnum;
    let iris = context.fnum_to_iris_step(fnum, lens.fl.value);
    info!("Iris step {} for F/{fnum} ({})", iris.value, iris.status);
    let iris_step = motors.move_iris(Move::Absolute(iris.value))?;
    lens.update_after_iris(&context, iris_step);
    info!("Updated parameters for F/{fnum}");
    print_config(&lens);

    // pretend best focus turned out to be 20 steps past the calibrated one
    let mut bfl = BflCorrection::new();
    let best_focus = motors.move_focus(Move::Relative(20))?;
    bfl.add_sample(&context, best_focus, lens.fl.value, od);
    lens.bfl = bfl.correction(lens.fl.value);
    info!("BFL correction {} steps from {} sample(s)", lens.bfl, bfl.samples().len());

    let steps = context.aov_to_motor_steps(cli.aov, cli.sensor_width, Some(od), lens.bfl);
    info!(
        "AOV {}deg: FL {:.2}mm, zoom {}, focus {} ({})",
        cli.aov, steps.focal_length, steps.zoom_step, steps.focus_step, steps.status
    );
    match motors.apply_motor_steps(&steps) {
        Ok(applied) => {
            lens.update_after_zoom(&context, applied.zoom_step);
            if let Some(focus_step) = applied.focus_step {
                lens.update_after_focus(&context, focus_step);
            }
            info!("Updated parameters for {}deg angle of view", cli.aov);
            print_config(&lens);
        }
        Err(err) => warn!("Could not frame {}deg: {err}", cli.aov),
    }

    info!("Lens configuration:\n{}", serde_json::to_string_pretty(&lens)?);
    Ok(())
}
