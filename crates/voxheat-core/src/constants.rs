//! Single source of truth for shared constants.
//! The material property layout values are injected into WGSL kernel
//! preambles so host and device read the lookup table identically.

/// Default simulation time step in seconds (30 steps per second).
pub const DEFAULT_TIME_STEP: f32 = 1.0 / 30.0;

/// Voxel edge length used by the default catalog, in meters (one decimeter).
pub const DECIMETER: f32 = 0.1;

/// Room temperature in Kelvin (20 °C).
pub const ROOM_TEMPERATURE_K: f32 = 293.15;

/// Absolute zero in Kelvin.
pub const ABSOLUTE_ZERO_K: f32 = 0.0;

/// Number of f32 properties stored per material in the lookup table.
pub const MATERIAL_PROPERTY_COUNT: u32 = 3;

/// Offset of the voxel mass (kg) within one material's properties.
pub const PROPERTY_MASS: u32 = 0;

/// Offset of the half-voxel thermal resistance (K/W).
pub const PROPERTY_THERMAL_RESISTANCE: u32 = 1;

/// Offset of the voxel heat capacity (J/K).
pub const PROPERTY_HEAT_CAPACITY: u32 = 2;

/// Channel holding per-voxel material ids.
pub const CHANNEL_MATERIAL: &str = "material";

/// Channel holding per-voxel temperature in Kelvin.
pub const CHANNEL_TEMPERATURE: &str = "temperature";

/// Channel holding per-voxel net incoming heat flow in Watts.
pub const CHANNEL_HEAT: &str = "heat";

/// Single channel of a material property table.
pub const CHANNEL_LOOKUP: &str = "lookup";
