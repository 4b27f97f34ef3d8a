//! Built-in material catalog shipped with the crate.

use voxheat_core::material::MaterialCatalog;

use crate::loader::{load_materials_from_str, LoadError};

/// RON source of the default catalog.
pub const DEFAULT_MATERIALS_RON: &str = include_str!("../../../data/materials.ron");

/// Parse the built-in catalog (air, water, ice, iron, stone, dirt, wood).
pub fn default_catalog() -> Result<MaterialCatalog, LoadError> {
    load_materials_from_str(DEFAULT_MATERIALS_RON)
}
