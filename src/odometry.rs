//! Wheel odometry
//!
//! Integrates per-wheel distance increments (Odom messages) into a 2D pose.
//! Each wheel is mounted at a fixed angle relative to the robot's forward
//! axis; its motion is projected through that angle plus the current heading.
//!
//! Per-wheel accumulators are cumulative: [`OdometryEstimator::update`] reads
//! them but never clears them, so repeated updates without new input keep
//! moving the pose. Call [`OdometryEstimator::clear_accumulators`] explicitly
//! for per-cycle deltas.

use crate::protocol::{ConfigMotor, Odom};
use serde::{Deserialize, Serialize};

/// Scale from firmware Odom units to accumulator units
const DELTA_SCALE: f64 = 1000.0;

/// Geometry of one wheel, derived from its ConfigMotor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelConfig {
    /// Motor number as configured on the controller
    pub index: u8,
    /// Mount angle in radians
    pub mount_angle: f64,
    /// Wheel radius
    pub radius: f32,
    pub ticks_per_rotation: i32,
}

impl From<&ConfigMotor> for WheelConfig {
    fn from(motor: &ConfigMotor) -> Self {
        Self {
            index: motor.num,
            mount_angle: f64::from(motor.angle_degrees).to_radians(),
            radius: motor.radius,
            ticks_per_rotation: motor.ticks_per_rotation,
        }
    }
}

/// Calibration gains for pose integration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometryGains {
    pub theta_coeff: f64,
    pub x_coeff: f64,
    pub y_coeff: f64,
    /// Distance from the robot centre to the wheels
    pub base_radius: f64,
}

impl Default for OdometryGains {
    fn default() -> Self {
        Self {
            theta_coeff: 1.0,
            x_coeff: 1.0,
            y_coeff: 1.0,
            base_radius: 0.15,
        }
    }
}

/// Estimated robot pose
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    /// Heading in radians, unwrapped
    pub heading: f64,
}

/// Fuses wheel deltas into a running pose
#[derive(Debug, Clone)]
pub struct OdometryEstimator {
    wheels: Vec<WheelConfig>,
    gains: OdometryGains,
    accumulated: Vec<f64>,
    pose: Pose,
    hits: u64,
}

impl OdometryEstimator {
    /// Wheels are addressed by their position in `wheels`
    pub fn new(wheels: Vec<WheelConfig>, gains: OdometryGains) -> Self {
        log::debug!(
            "OdometryEstimator: {} wheels, base_radius={:.3}",
            wheels.len(),
            gains.base_radius
        );

        let accumulated = vec![0.0; wheels.len()];
        Self {
            wheels,
            gains,
            accumulated,
            pose: Pose::default(),
            hits: 0,
        }
    }

    pub fn from_motor_configs(motors: &[ConfigMotor], gains: OdometryGains) -> Self {
        Self::new(motors.iter().map(WheelConfig::from).collect(), gains)
    }

    /// Accumulate one wheel delta
    ///
    /// Returns `false` without touching any state when `num` does not name a
    /// configured wheel.
    pub fn handle(&mut self, msg: &Odom) -> bool {
        let Some(acc) = usize::try_from(msg.num)
            .ok()
            .and_then(|i| self.accumulated.get_mut(i))
        else {
            return false;
        };

        *acc += f64::from(msg.ddist_mm) * DELTA_SCALE;
        self.hits += 1;
        true
    }

    /// Integrate accumulated distances into the pose
    ///
    /// Heading is advanced over all wheels first; position is then projected
    /// with the new heading.
    pub fn update(&mut self) -> Pose {
        let n = self.wheels.len() as f64;
        let g = self.gains;

        for acc in &self.accumulated {
            self.pose.heading += acc / n / g.base_radius * g.theta_coeff;
        }

        let heading = self.pose.heading;
        for (wheel, acc) in self.wheels.iter().zip(&self.accumulated) {
            let angle = heading + wheel.mount_angle;
            self.pose.x += acc * angle.cos() / n * 2.0 * g.x_coeff;
            self.pose.y += acc * angle.sin() / n * 2.0 * g.y_coeff;
        }

        self.pose
    }

    /// Zero every wheel accumulator; the pose is kept
    pub fn clear_accumulators(&mut self) {
        self.accumulated.iter_mut().for_each(|a| *a = 0.0);
    }

    /// Last computed pose
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Number of accepted Odom messages
    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn accumulated(&self, index: usize) -> Option<f64> {
        self.accumulated.get(index).copied()
    }

    pub fn wheel_count(&self) -> usize {
        self.wheels.len()
    }

    pub fn wheels(&self) -> &[WheelConfig] {
        &self.wheels
    }

    pub fn gains(&self) -> OdometryGains {
        self.gains
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    fn wheel(index: u8, mount_angle: f64) -> WheelConfig {
        WheelConfig {
            index,
            mount_angle,
            radius: 0.03,
            ticks_per_rotation: 360,
        }
    }

    fn odom(num: i8, ddist_mm: i16) -> Odom {
        Odom {
            num,
            aux: 0,
            ddist_mm,
        }
    }

    #[test]
    fn test_handle_scales_delta() {
        let mut est = OdometryEstimator::new(vec![wheel(0, 0.0)], OdometryGains::default());
        assert!(est.handle(&odom(0, 3)));
        assert!(est.handle(&odom(0, -1)));
        assert_eq!(est.accumulated(0), Some(2000.0));
        assert_eq!(est.hits(), 2);
    }

    #[test]
    fn test_out_of_range_wheel_rejected() {
        let mut est = OdometryEstimator::new(
            vec![wheel(0, 0.0), wheel(1, PI)],
            OdometryGains::default(),
        );
        assert!(!est.handle(&odom(5, 10)));
        assert!(!est.handle(&odom(2, 10)));
        assert!(!est.handle(&odom(-1, 10)));

        assert_eq!(est.hits(), 0);
        assert_eq!(est.accumulated(0), Some(0.0));
        assert_eq!(est.accumulated(1), Some(0.0));
    }

    #[test]
    fn test_update_without_wheels_is_noop() {
        let mut est = OdometryEstimator::new(Vec::new(), OdometryGains::default());
        assert_eq!(est.update(), Pose::default());
    }

    #[test]
    fn test_gains_scale_each_axis() {
        let gains = OdometryGains {
            theta_coeff: 0.0,
            x_coeff: 0.5,
            y_coeff: 2.0,
            base_radius: 0.15,
        };
        let mut est = OdometryEstimator::new(vec![wheel(0, PI / 4.0)], gains);
        est.handle(&odom(0, 1));

        let pose = est.update();
        assert_abs_diff_eq!(pose.heading, 0.0);
        assert_abs_diff_eq!(pose.x, 1000.0 * (PI / 4.0).cos() * 2.0 * 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.y, 1000.0 * (PI / 4.0).sin() * 2.0 * 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_clear_accumulators_keeps_pose() {
        let mut est = OdometryEstimator::new(vec![wheel(0, 0.0)], OdometryGains::default());
        est.handle(&odom(0, 1));
        let before = est.update();

        est.clear_accumulators();
        assert_eq!(est.accumulated(0), Some(0.0));
        assert_eq!(est.update(), before);
    }

    #[test]
    fn test_from_motor_configs_converts_degrees() {
        let motor = ConfigMotor {
            num: 3,
            radius: 0.04,
            angle_degrees: 90,
            inter_coeff: 0.0,
            prop_coeff: 1.0,
            diff_coeff: 0.0,
            coeff: 1.0,
            turn_max_speed: 1.0,
            max_speed: 1.0,
            ticks_per_rotation: 720,
            pinout: None,
        };
        let est = OdometryEstimator::from_motor_configs(&[motor], OdometryGains::default());
        assert_eq!(est.wheel_count(), 1);
        assert_eq!(est.wheels()[0].index, 3);
        assert_abs_diff_eq!(est.wheels()[0].mount_angle, PI / 2.0, epsilon = 1e-12);
    }
}
