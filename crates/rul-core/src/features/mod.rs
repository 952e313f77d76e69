//! Feature-vector preparation
//!
//! Turns raw named records into fixed-length numeric vectors in the order
//! each subsystem's model was trained on: defaulting and clamping during
//! imputation, then padding or truncation to the width a model declares.

mod adapter;
mod defaults;
mod imputer;

pub use adapter::adapt;
pub use defaults::{FeatureDefaults, FEATURE_DEFAULTS_FILE};
pub use imputer::{clamp_non_finite, coerce_numeric, impute, NEG_INF_CLAMP, POS_INF_CLAMP};

/// Engine features: 3 operating settings followed by sensors 1..=22
pub const ENGINE_FEATURES: [&str; 25] = [
    "op_setting_1",
    "op_setting_2",
    "op_setting_3",
    "sensor_1",
    "sensor_2",
    "sensor_3",
    "sensor_4",
    "sensor_5",
    "sensor_6",
    "sensor_7",
    "sensor_8",
    "sensor_9",
    "sensor_10",
    "sensor_11",
    "sensor_12",
    "sensor_13",
    "sensor_14",
    "sensor_15",
    "sensor_16",
    "sensor_17",
    "sensor_18",
    "sensor_19",
    "sensor_20",
    "sensor_21",
    "sensor_22",
];

/// Aggregated hydraulic cycle means
pub const HYDRAULICS_FEATURES: [&str; 8] = [
    "PS6_mean", "PS5_mean", "CE_mean", "TS4_mean", "TS2_mean", "TS1_mean", "CP_mean", "TS3_mean",
];

pub const LANDING_GEAR_FEATURES: [&str; 3] = [
    "load_during_landing",
    "tire_pressure",
    "speed_during_landing",
];
