//! # Exterior Ballistics
//!
//! Point-mass exterior ballistics: trajectory integration under gravity,
//! aerodynamic drag, wind, spin drift, and optional Coriolis acceleration,
//! plus the inverse searches built on top of it (zero angle, maximum range).
//!
//! Everything works in the shooter-local frame: x downrange, y up, z to the
//! shooter's right, in feet, feet per second, radians, and grains. Unit
//! conversion, profile files, and presentation belong to the caller.

// Re-export the main types and functions
pub use atmosphere::Atmosphere;
pub use config::EngineConfig;
pub use coriolis::Coriolis;
pub use drag::DragCurve;
pub use drag_tables::{g1_curve, g7_curve, TABLE_G1, TABLE_G7};
pub use engine::{IntegrationMethod, TrajectoryEngine};
pub use error::{
    Error, OutOfRangeError, RangeError, RangeErrorReason, ZeroFindingError, ZeroFindingReason,
};
pub use hit_result::{DangerSpace, HitResult};
pub use shot::{Ammo, DragModel, Shot, ShotProps, Weapon};
pub use trajectory_data::{TrajFlag, TrajectoryData};
pub use wind::{Wind, WindSock};

// Module declarations
mod adaptive;
mod atmosphere;
mod config;
mod constants;
mod coriolis;
mod drag;
mod drag_tables;
mod engine;
mod error;
mod hit_result;
mod interpolation;
mod recording;
mod shot;
mod stability;
mod trajectory_data;
mod wind;
mod zero_finding;
