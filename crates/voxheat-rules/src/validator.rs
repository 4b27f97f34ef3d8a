use std::collections::HashSet;

use thiserror::Error;
use voxheat_core::material::MaterialCatalog;

#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate material name '{0}'")]
    DuplicateName(String),
    #[error("Material '{0}' is not a gas and has no density")]
    MissingDensity(String),
    #[error("Material '{name}' has non-positive density {value}")]
    NonPositiveDensity { name: String, value: f32 },
    #[error("Material '{name}' has non-positive thermal conductivity {value}")]
    NonPositiveConductivity { name: String, value: f32 },
    #[error("Material '{name}' has non-positive specific heat capacity {value}")]
    NonPositiveHeatCapacity { name: String, value: f32 },
}

/// Validate a material catalog. Every problem is collected, not just the first.
///
/// Plausibility of the physical values is not checked beyond their sign.
pub fn validate_materials(catalog: &MaterialCatalog) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut seen_names = HashSet::new();
    for mat in &catalog.materials {
        if !seen_names.insert(mat.name.as_str()) {
            errors.push(ValidationError::DuplicateName(mat.name.clone()));
        }
    }

    for mat in &catalog.materials {
        if !mat.phase.participates() {
            continue;
        }
        match mat.density {
            None => errors.push(ValidationError::MissingDensity(mat.name.clone())),
            Some(value) if value <= 0.0 => errors.push(ValidationError::NonPositiveDensity {
                name: mat.name.clone(),
                value,
            }),
            Some(_) => {}
        }
        if mat.thermal_conductivity <= 0.0 {
            errors.push(ValidationError::NonPositiveConductivity {
                name: mat.name.clone(),
                value: mat.thermal_conductivity,
            });
        }
        if mat.specific_heat_capacity <= 0.0 {
            errors.push(ValidationError::NonPositiveHeatCapacity {
                name: mat.name.clone(),
                value: mat.specific_heat_capacity,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
