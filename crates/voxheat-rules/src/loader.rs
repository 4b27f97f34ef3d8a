use thiserror::Error;
use voxheat_core::material::{MaterialCatalog, MaterialDef};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to parse materials RON: {0}")]
    MaterialParseError(String),
}

/// Parse a single materials RON string into a catalog.
pub fn load_materials_from_str(ron_str: &str) -> Result<MaterialCatalog, LoadError> {
    let options = ron::Options::default();
    let materials: Vec<MaterialDef> = options
        .from_str(ron_str)
        .map_err(|e| LoadError::MaterialParseError(e.to_string()))?;
    Ok(MaterialCatalog { materials })
}

/// Load and concatenate several material sources. Ids follow source order.
pub fn load_all_materials(sources: &[&str]) -> Result<MaterialCatalog, LoadError> {
    let mut all_materials = Vec::new();
    for source in sources {
        let catalog = load_materials_from_str(source)?;
        all_materials.extend(catalog.materials);
    }
    log::debug!(
        "Loaded {} materials from {} sources",
        all_materials.len(),
        sources.len()
    );
    Ok(MaterialCatalog {
        materials: all_materials,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxheat_core::material::Phase;

    #[test]
    fn test_parse_gas_without_density() {
        let ron = r#"[(name: "steam", phase: Gas, thermal_conductivity: 0.02, specific_heat_capacity: 2.0)]"#;
        let catalog = load_materials_from_str(ron).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.materials[0].phase, Phase::Gas);
        assert_eq!(catalog.materials[0].density, None);
    }

    #[test]
    fn test_parse_error_is_reported() {
        let result = load_materials_from_str("[(name: \"broken\", phase: Plasma)]");
        assert!(matches!(result, Err(LoadError::MaterialParseError(_))));
    }

    #[test]
    fn test_load_all_preserves_order() {
        let a = r#"[(name: "a", phase: Solid, density: Some(2.0), thermal_conductivity: 1.0, specific_heat_capacity: 1.0)]"#;
        let b = r#"[(name: "b", phase: Liquid, density: Some(1.0), thermal_conductivity: 0.5, specific_heat_capacity: 4.0)]"#;
        let catalog = load_all_materials(&[a, b]).unwrap();
        assert_eq!(catalog.id_of("a"), Some(0));
        assert_eq!(catalog.id_of("b"), Some(1));
    }
}
