//! Kinematic motion models and their precomputed primitive tables.
//!
//! Each lattice expansion applies one primitive from the active table. The
//! primitives are built so that every application leaves the originating
//! cell (planar chord >= sqrt(2) cells, pure rotations excepted) and lands
//! on an exact angular bin.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::{normalize_angle, GridPose};

const SQRT_2: f32 = std::f32::consts::SQRT_2;

/// Search-space motion model.
///
/// `Moore` and `VonNeumann` select plain 8- / 4-connected 2D search;
/// the remaining models search the SE(2) lattice with motion primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotionModel {
    /// 8-connected 2D grid
    Moore,
    /// 4-connected 2D grid
    VonNeumann,
    /// Forward-only Ackermann (minimum turning radius)
    Dubin,
    /// Forward/reverse Ackermann (minimum turning radius)
    ReedsShepp,
    /// Differential drive / omnidirectional (spin in place allowed)
    BalkcomMason,
}

impl MotionModel {
    /// Whether this model searches the SE(2) lattice
    #[inline]
    pub fn is_se2(&self) -> bool {
        matches!(
            self,
            MotionModel::Dubin | MotionModel::ReedsShepp | MotionModel::BalkcomMason
        )
    }
}

impl FromStr for MotionModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MOORE" => Ok(MotionModel::Moore),
            "VON_NEUMANN" => Ok(MotionModel::VonNeumann),
            "DUBIN" => Ok(MotionModel::Dubin),
            "REEDS_SHEPP" => Ok(MotionModel::ReedsShepp),
            "BALKCOM_MASON" => Ok(MotionModel::BalkcomMason),
            other => Err(format!(
                "unknown motion model '{}', valid options are \
                 MOORE, VON_NEUMANN, DUBIN, REEDS_SHEPP, BALKCOM_MASON",
                other
            )),
        }
    }
}

impl fmt::Display for MotionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MotionModel::Moore => "MOORE",
            MotionModel::VonNeumann => "VON_NEUMANN",
            MotionModel::Dubin => "DUBIN",
            MotionModel::ReedsShepp => "REEDS_SHEPP",
            MotionModel::BalkcomMason => "BALKCOM_MASON",
        };
        f.write_str(s)
    }
}

/// One pose delta in the robot frame: (dx, dy) cells, dtheta radians.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionPrimitive {
    pub dx: f32,
    pub dy: f32,
    pub dtheta: f32,
}

impl MotionPrimitive {
    #[inline]
    fn new(dx: f32, dy: f32, dtheta: f32) -> Self {
        Self { dx, dy, dtheta }
    }

    /// Planar chord length of this primitive, in cells
    #[inline]
    pub fn chord_length(&self) -> f32 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

/// Precomputed primitive set plus the grid parameters needed for indexing.
///
/// One table is built per plan from the active configuration and owned by
/// the search engine; expansion borrows it.
#[derive(Clone, Debug)]
pub struct MotionTable {
    model: MotionModel,
    size_x: u32,
    size_y: u32,
    num_angle_quantization: u32,
    bin_size: f32,
    projections: Vec<MotionPrimitive>,
}

impl MotionTable {
    /// Build the table for `model` on a `size_x` x `size_y` grid with
    /// `num_angle_quantization` heading bins. `min_turning_radius` is in
    /// cells and only meaningful for the Ackermann models.
    pub fn new(
        model: MotionModel,
        size_x: u32,
        size_y: u32,
        num_angle_quantization: u32,
        min_turning_radius: f32,
    ) -> Self {
        let n = num_angle_quantization.max(1);
        let bin_size = 2.0 * std::f32::consts::PI / n as f32;

        let projections = match model {
            MotionModel::Moore | MotionModel::VonNeumann => Vec::new(),
            MotionModel::Dubin => Self::init_dubin(n, min_turning_radius),
            MotionModel::ReedsShepp => Self::init_reeds_shepp(n, min_turning_radius),
            MotionModel::BalkcomMason => Self::init_balkcom_mason(bin_size),
        };

        Self {
            model,
            size_x,
            size_y,
            num_angle_quantization: n,
            bin_size,
            projections,
        }
    }

    /// The minimum turning angle whose chord still leaves the current cell,
    /// snapped up to the angular bin grid.
    ///
    /// chord = 2 * R * sin(angle / 2) >= sqrt(2), so
    /// angle <= 2 * asin(sqrt(2) / (2 * R)); the bin snap always rounds up
    /// because the raw angle is the minimum admissible one.
    fn turning_angle(num_angle_quantization: u32, min_turning_radius: f32) -> f32 {
        let raw = 2.0 * (SQRT_2 / (2.0 * min_turning_radius)).asin();
        let bin = 2.0 * std::f32::consts::PI / num_angle_quantization as f32;
        if raw < bin {
            bin
        } else {
            (raw / bin).ceil() * bin
        }
    }

    fn init_dubin(num_angle_quantization: u32, min_turning_radius: f32) -> Vec<MotionPrimitive> {
        let angle = Self::turning_angle(num_angle_quantization, min_turning_radius);
        // Right triangle on the turning circle: the chord endpoint sits at
        // (R sin a, R - R cos a) in the robot frame for a left turn.
        let delta_x = min_turning_radius * angle.sin();
        let delta_y = min_turning_radius - min_turning_radius * angle.cos();

        vec![
            MotionPrimitive::new(SQRT_2, 0.0, 0.0),            // Forward
            MotionPrimitive::new(delta_x, delta_y, angle),     // Left
            MotionPrimitive::new(delta_x, -delta_y, -angle),   // Right
        ]
    }

    fn init_reeds_shepp(
        num_angle_quantization: u32,
        min_turning_radius: f32,
    ) -> Vec<MotionPrimitive> {
        let mut projections = Self::init_dubin(num_angle_quantization, min_turning_radius);
        let forward: Vec<MotionPrimitive> = projections.clone();
        for p in forward {
            projections.push(MotionPrimitive::new(-p.dx, p.dy, p.dtheta));
        }
        projections
    }

    fn init_balkcom_mason(bin_size: f32) -> Vec<MotionPrimitive> {
        vec![
            MotionPrimitive::new(SQRT_2, 0.0, 0.0),           // Forward
            MotionPrimitive::new(-SQRT_2, 0.0, 0.0),          // Backward
            MotionPrimitive::new(0.0, 0.0, bin_size),         // Spin left
            MotionPrimitive::new(0.0, 0.0, -bin_size),        // Spin right
            MotionPrimitive::new(SQRT_2, 0.0, bin_size),      // Spin left + Forward
            MotionPrimitive::new(-SQRT_2, 0.0, bin_size),     // Spin left + Backward
            MotionPrimitive::new(SQRT_2, 0.0, -bin_size),     // Spin right + Forward
            MotionPrimitive::new(-SQRT_2, 0.0, -bin_size),    // Spin right + Backward
        ]
    }

    /// The active motion model
    #[inline]
    pub fn model(&self) -> MotionModel {
        self.model
    }

    /// Grid width in cells
    #[inline]
    pub fn size_x(&self) -> u32 {
        self.size_x
    }

    /// Grid height in cells
    #[inline]
    pub fn size_y(&self) -> u32 {
        self.size_y
    }

    /// Number of heading bins
    #[inline]
    pub fn num_angle_quantization(&self) -> u32 {
        self.num_angle_quantization
    }

    /// Width of one heading bin in radians
    #[inline]
    pub fn bin_size(&self) -> f32 {
        self.bin_size
    }

    /// The primitive set
    #[inline]
    pub fn projections(&self) -> &[MotionPrimitive] {
        &self.projections
    }

    /// Apply primitive `i` to `pose`.
    ///
    /// The planar delta is expressed in the robot frame and rotated into
    /// the grid frame by the pose heading; the heading advances by the
    /// primitive's angular step.
    pub fn project(&self, pose: &GridPose, i: usize) -> GridPose {
        let p = &self.projections[i];
        let (sin, cos) = pose.theta.sin_cos();
        GridPose::new(
            pose.x + p.dx * cos - p.dy * sin,
            pose.y + p.dx * sin + p.dy * cos,
            normalize_angle(pose.theta + p.dtheta),
        )
    }

    /// Heading bin for an angle in radians
    #[inline]
    pub fn bin_of(&self, theta: f32) -> u32 {
        let b = (theta / self.bin_size).round() as i64;
        b.rem_euclid(self.num_angle_quantization as i64) as u32
    }

    /// Linear index of (x, y, bin)
    #[inline]
    pub fn index(&self, x: u32, y: u32, bin: u32) -> usize {
        ((y as usize) * (self.size_x as usize) + (x as usize))
            * (self.num_angle_quantization as usize)
            + (bin as usize)
    }

    /// Costmap cell index underlying a lattice index
    #[inline]
    pub fn cell_index(&self, index: usize) -> usize {
        index / (self.num_angle_quantization as usize)
    }

    /// Total number of lattice indices
    #[inline]
    pub fn num_indices(&self) -> usize {
        (self.size_x as usize) * (self.size_y as usize) * (self.num_angle_quantization as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::PI;

    #[test]
    fn test_model_parsing() {
        assert_eq!("MOORE".parse::<MotionModel>().unwrap(), MotionModel::Moore);
        assert_eq!(
            "REEDS_SHEPP".parse::<MotionModel>().unwrap(),
            MotionModel::ReedsShepp
        );
        assert!("HOLONOMIC".parse::<MotionModel>().is_err());
        assert_eq!(MotionModel::BalkcomMason.to_string(), "BALKCOM_MASON");
    }

    #[test]
    fn test_primitive_counts() {
        let dubin = MotionTable::new(MotionModel::Dubin, 50, 50, 72, 5.0);
        assert_eq!(dubin.projections().len(), 3);

        let rs = MotionTable::new(MotionModel::ReedsShepp, 50, 50, 72, 5.0);
        assert_eq!(rs.projections().len(), 6);

        let bm = MotionTable::new(MotionModel::BalkcomMason, 50, 50, 72, 0.0);
        assert_eq!(bm.projections().len(), 8);
    }

    #[test]
    fn test_primitives_escape_cell() {
        // Every primitive with planar motion must have chord >= sqrt(2)
        for model in [
            MotionModel::Dubin,
            MotionModel::ReedsShepp,
            MotionModel::BalkcomMason,
        ] {
            let table = MotionTable::new(model, 50, 50, 72, 5.0);
            for p in table.projections() {
                let chord = p.chord_length();
                if chord > 0.0 {
                    assert!(
                        chord >= std::f32::consts::SQRT_2 - 1e-5,
                        "{:?} chord {} too short for {:?}",
                        p,
                        chord,
                        model
                    );
                } else {
                    // Pure rotations only exist in Balkcom-Mason
                    assert_eq!(model, MotionModel::BalkcomMason);
                    assert!(p.dtheta != 0.0);
                }
            }
        }
    }

    #[test]
    fn test_primitives_are_bin_aligned() {
        for n in [16u32, 36, 72] {
            let bin = 2.0 * PI / n as f32;
            for model in [
                MotionModel::Dubin,
                MotionModel::ReedsShepp,
                MotionModel::BalkcomMason,
            ] {
                let table = MotionTable::new(model, 50, 50, n, 4.0);
                for p in table.projections() {
                    let increments = p.dtheta / bin;
                    assert_relative_eq!(increments, increments.round(), epsilon = 1e-4);
                }
            }
        }
    }

    #[test]
    fn test_turning_angle_uses_bin_when_radius_tight() {
        // A very tight radius makes the raw angle huge; a very large radius
        // makes it smaller than a bin, which snaps up to one bin.
        let n = 72;
        let bin = 2.0 * PI / n as f32;
        let loose = MotionTable::turning_angle(n, 1000.0);
        assert_relative_eq!(loose, bin, epsilon = 1e-6);

        let tight = MotionTable::turning_angle(n, 2.0);
        let raw = 2.0 * (std::f32::consts::SQRT_2 / 4.0).asin();
        assert!(tight >= raw);
        assert_relative_eq!((tight / bin).round() * bin, tight, epsilon = 1e-5);
    }

    #[test]
    fn test_reeds_shepp_has_reverse() {
        let table = MotionTable::new(MotionModel::ReedsShepp, 50, 50, 72, 5.0);
        assert!(table.projections().iter().any(|p| p.dx < 0.0));
    }

    #[test]
    fn test_projection_follows_heading() {
        let table = MotionTable::new(MotionModel::Dubin, 50, 50, 72, 5.0);
        // Straight primitive from a pose heading +Y moves in +Y
        let pose = GridPose::new(10.0, 10.0, PI / 2.0);
        let next = table.project(&pose, 0);
        assert_relative_eq!(next.x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(next.y, 10.0 + std::f32::consts::SQRT_2, epsilon = 1e-5);
        assert_relative_eq!(next.theta, PI / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_left_turn_curves_left() {
        let table = MotionTable::new(MotionModel::Dubin, 50, 50, 72, 5.0);
        let pose = GridPose::new(0.0, 0.0, 0.0);
        let next = table.project(&pose, 1);
        assert!(next.y > 0.0, "left turn from theta=0 must displace +y");
        assert!(next.theta > 0.0);
    }

    #[test]
    fn test_index_roundtrip() {
        let table = MotionTable::new(MotionModel::Dubin, 40, 30, 16, 5.0);
        let idx = table.index(7, 3, 5);
        assert_eq!(idx, (3 * 40 + 7) * 16 + 5);
        assert_eq!(table.cell_index(idx), 3 * 40 + 7);
    }

    #[test]
    fn test_bin_of_wraps() {
        let table = MotionTable::new(MotionModel::Dubin, 10, 10, 16, 5.0);
        assert_eq!(table.bin_of(0.0), 0);
        assert_eq!(table.bin_of(2.0 * PI), 0);
        assert_eq!(table.bin_of(-table.bin_size()), 15);
        assert_eq!(table.bin_of(PI), 8);
    }
}
