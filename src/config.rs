//! Configuration loading and validation for the planner.

use std::path::Path;

use log::warn;
use serde::Deserialize;

use crate::error::{PlannerError, Result};
use crate::search::MotionModel;

/// Main planner configuration.
///
/// Every field has a default, so an empty TOML document is a valid
/// configuration. Angles are radians, distances are meters.
#[derive(Clone, Debug, Deserialize)]
pub struct PlannerConfig {
    /// Goal tolerance in meters (0 = exact goal cell required)
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,

    /// Plan on a downsampled costmap when the factor is > 1
    #[serde(default = "default_true")]
    pub downsample_costmap: bool,

    /// Costmap downsampling factor (>= 1)
    #[serde(default = "default_downsampling_factor")]
    pub downsampling_factor: u32,

    /// Number of heading bins for SE(2) search (>= 1; >= 16 to be
    /// meaningful for the kinematic models)
    #[serde(default = "default_angle_bins")]
    pub angle_quantization_bins: u32,

    /// Whether unknown cells may be traversed
    #[serde(default = "default_true")]
    pub allow_unknown: bool,

    /// Search expansion budget; <= 0 means unlimited
    #[serde(default = "default_max_iterations")]
    pub max_iterations: i32,

    /// Expansions allowed after the first within-tolerance node;
    /// <= 0 disables tolerance-based early exit
    #[serde(default = "default_max_on_approach")]
    pub max_on_approach_iterations: i32,

    /// Blend between cell cost and travel distance in [0, 1]
    #[serde(default = "default_travel_cost_scale")]
    pub travel_cost_scale: f32,

    /// Run the smoother on the raw search path
    #[serde(default = "default_true")]
    pub smooth_path: bool,

    /// Run the upsampler on the smoothed path
    #[serde(default = "default_false")]
    pub upsample_path: bool,

    /// Minimum turning radius in meters (Ackermann models)
    #[serde(default = "default_turning_radius")]
    pub minimum_turning_radius: f32,

    /// Motion model: MOORE, VON_NEUMANN, DUBIN, REEDS_SHEPP, BALKCOM_MASON
    #[serde(default = "default_motion_model")]
    pub motion_model_for_search: MotionModel,

    /// Soft wall-clock budget in seconds; <= 0 disables it. When the
    /// search alone exhausts the budget, smoothing is skipped with a
    /// warning and the raw path returned. Enabling this makes plan output
    /// depend on machine speed.
    #[serde(default = "default_max_planning_time")]
    pub max_planning_time: f32,

    /// Smoother and upsampler settings
    #[serde(default)]
    pub smoother: SmootherConfig,
}

/// Smoother weights and upsampling settings.
#[derive(Clone, Debug, Deserialize)]
pub struct SmootherConfig {
    /// Waypoints inserted per segment when upsampling (2 or 4)
    #[serde(default = "default_upsampling_ratio")]
    pub upsampling_ratio: u32,

    /// Weight of the discrete-curvature smoothness term
    #[serde(default = "default_w_smooth")]
    pub w_smooth: f32,

    /// Weight of the costmap proximity term
    #[serde(default = "default_w_cost")]
    pub w_cost: f32,

    /// Weight of the waypoint-spacing preservation term
    #[serde(default = "default_w_distance")]
    pub w_distance: f32,

    /// Weight of the curvature-bound penalty term
    #[serde(default = "default_w_curvature")]
    pub w_curvature: f32,

    /// Maximum allowed discrete curvature (1/meters)
    #[serde(default = "default_kappa_max")]
    pub kappa_max: f32,

    /// Trust-region solver settings
    #[serde(default)]
    pub optimizer: OptimizerConfig,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            upsampling_ratio: default_upsampling_ratio(),
            w_smooth: default_w_smooth(),
            w_cost: default_w_cost(),
            w_distance: default_w_distance(),
            w_curvature: default_w_curvature(),
            kappa_max: default_kappa_max(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

/// Levenberg-Marquardt solver settings.
///
/// Lambda blends between Gauss-Newton (small values, fast near the
/// solution) and gradient descent (large values, robust far from it).
#[derive(Clone, Debug, Deserialize)]
pub struct OptimizerConfig {
    /// Maximum number of accepted steps
    #[serde(default = "default_opt_iterations")]
    pub max_iterations: usize,

    /// Initial damping factor
    #[serde(default = "default_initial_lambda")]
    pub initial_lambda: f32,

    /// Factor to scale lambda up (bad step) or down (good step)
    #[serde(default = "default_lambda_factor")]
    pub lambda_factor: f32,

    /// Lambda floor after successful steps
    #[serde(default = "default_min_lambda")]
    pub min_lambda: f32,

    /// Lambda ceiling; exceeding it fails the solve
    #[serde(default = "default_max_lambda")]
    pub max_lambda: f32,

    /// Stop once one accepted step improves the cost by less than this
    #[serde(default = "default_cost_tolerance")]
    pub cost_tolerance: f32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_opt_iterations(),
            initial_lambda: default_initial_lambda(),
            lambda_factor: default_lambda_factor(),
            min_lambda: default_min_lambda(),
            max_lambda: default_max_lambda(),
            cost_tolerance: default_cost_tolerance(),
        }
    }
}

// Default value functions
fn default_tolerance() -> f32 {
    0.125
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_downsampling_factor() -> u32 {
    1
}
fn default_angle_bins() -> u32 {
    1
}
fn default_max_iterations() -> i32 {
    -1
}
fn default_max_on_approach() -> i32 {
    1000
}
fn default_travel_cost_scale() -> f32 {
    0.8
}
fn default_turning_radius() -> f32 {
    1.0
}
fn default_motion_model() -> MotionModel {
    MotionModel::Moore
}
fn default_max_planning_time() -> f32 {
    0.0
}
fn default_upsampling_ratio() -> u32 {
    2
}
fn default_w_smooth() -> f32 {
    10.0
}
fn default_w_cost() -> f32 {
    1.0
}
fn default_w_distance() -> f32 {
    0.05
}
fn default_w_curvature() -> f32 {
    0.2
}
fn default_kappa_max() -> f32 {
    1.0
}
fn default_opt_iterations() -> usize {
    100
}
fn default_initial_lambda() -> f32 {
    1e-3
}
fn default_lambda_factor() -> f32 {
    10.0
}
fn default_min_lambda() -> f32 {
    1e-9
}
fn default_max_lambda() -> f32 {
    1e9
}
fn default_cost_tolerance() -> f32 {
    1e-10
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            downsample_costmap: default_true(),
            downsampling_factor: default_downsampling_factor(),
            angle_quantization_bins: default_angle_bins(),
            allow_unknown: default_true(),
            max_iterations: default_max_iterations(),
            max_on_approach_iterations: default_max_on_approach(),
            travel_cost_scale: default_travel_cost_scale(),
            smooth_path: default_true(),
            upsample_path: default_false(),
            minimum_turning_radius: default_turning_radius(),
            motion_model_for_search: default_motion_model(),
            max_planning_time: default_max_planning_time(),
            smoother: SmootherConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlannerError::Config(format!("Failed to read config file: {}", e)))?;
        let config: PlannerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Check fatal constraints and coerce recoverable ones.
    ///
    /// Out-of-range `travel_cost_scale`, a zero downsampling factor, and
    /// zero angle bins are rejected; an unsupported upsampling ratio is
    /// coerced to 2 with a warning.
    pub fn validate(&mut self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.travel_cost_scale) {
            return Err(PlannerError::Config(format!(
                "travel_cost_scale must be between 0 and 1, got {}",
                self.travel_cost_scale
            )));
        }
        if self.downsampling_factor < 1 {
            return Err(PlannerError::Config(
                "downsampling_factor must be >= 1".to_string(),
            ));
        }
        if self.angle_quantization_bins < 1 {
            return Err(PlannerError::Config(
                "angle_quantization_bins must be >= 1".to_string(),
            ));
        }
        if self.minimum_turning_radius <= 0.0
            && self.motion_model_for_search.is_se2()
            && self.motion_model_for_search != MotionModel::BalkcomMason
        {
            return Err(PlannerError::Config(format!(
                "minimum_turning_radius must be positive for {}",
                self.motion_model_for_search
            )));
        }

        if self.motion_model_for_search.is_se2() && self.angle_quantization_bins < 16 {
            warn!(
                "{} bins is coarse for {}; 16 or more angle bins are recommended",
                self.angle_quantization_bins, self.motion_model_for_search
            );
        }

        let ratio = self.smoother.upsampling_ratio;
        if ratio != 2 && ratio != 4 {
            warn!("Upsampling ratio set to {}, only 2 and 4 are valid. Defaulting to 2.", ratio);
            self.smoother.upsampling_ratio = 2;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.tolerance, 0.125);
        assert!(config.downsample_costmap);
        assert_eq!(config.downsampling_factor, 1);
        assert_eq!(config.angle_quantization_bins, 1);
        assert!(config.allow_unknown);
        assert_eq!(config.max_iterations, -1);
        assert_eq!(config.travel_cost_scale, 0.8);
        assert!(config.smooth_path);
        assert!(!config.upsample_path);
        assert_eq!(config.motion_model_for_search, MotionModel::Moore);
        assert_eq!(config.smoother.upsampling_ratio, 2);
    }

    #[test]
    fn test_empty_toml_is_valid() {
        let config: PlannerConfig = toml::from_str("").unwrap();
        assert_eq!(config.tolerance, 0.125);
        assert_eq!(config.smoother.optimizer.max_iterations, 100);
    }

    #[test]
    fn test_parse_motion_model_and_sections() {
        let config: PlannerConfig = toml::from_str(
            r#"
            motion_model_for_search = "REEDS_SHEPP"
            angle_quantization_bins = 72
            minimum_turning_radius = 0.4

            [smoother]
            upsampling_ratio = 4
            w_smooth = 20.0
            "#,
        )
        .unwrap();
        assert_eq!(config.motion_model_for_search, MotionModel::ReedsShepp);
        assert_eq!(config.angle_quantization_bins, 72);
        assert_eq!(config.smoother.upsampling_ratio, 4);
        assert_eq!(config.smoother.w_smooth, 20.0);
        // Unset smoother fields keep their defaults
        assert_eq!(config.smoother.w_cost, 1.0);
    }

    #[test]
    fn test_unknown_motion_model_rejected() {
        let result: std::result::Result<PlannerConfig, _> =
            toml::from_str(r#"motion_model_for_search = "HOLONOMIC""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_travel_cost_scale_range_fatal() {
        let mut config = PlannerConfig {
            travel_cost_scale: 1.2,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.travel_cost_scale = -0.1;
        assert!(config.validate().is_err());

        config.travel_cost_scale = 1.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_upsampling_ratio_coerced() {
        let mut config = PlannerConfig::default();
        config.smoother.upsampling_ratio = 3;
        config.validate().unwrap();
        assert_eq!(config.smoother.upsampling_ratio, 2);

        config.smoother.upsampling_ratio = 4;
        config.validate().unwrap();
        assert_eq!(config.smoother.upsampling_ratio, 4);
    }

    #[test]
    fn test_zero_bins_fatal() {
        let mut config = PlannerConfig {
            angle_quantization_bins: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
