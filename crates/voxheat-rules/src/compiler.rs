use glam::UVec3;
use voxheat_core::constants::{
    CHANNEL_LOOKUP, MATERIAL_PROPERTY_COUNT, PROPERTY_HEAT_CAPACITY, PROPERTY_MASS,
    PROPERTY_THERMAL_RESISTANCE,
};
use voxheat_core::material::{MaterialCatalog, MaterialDef, MaterialRecord};
use voxheat_core::{ChannelData, ChannelLayout, ScalarKind, Volume, VoxelError};

/// Offset of one property within a material's slice of the lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialProperty {
    Mass,
    ThermalResistance,
    HeatCapacity,
}

impl MaterialProperty {
    pub fn offset(self) -> usize {
        let offset = match self {
            MaterialProperty::Mass => PROPERTY_MASS,
            MaterialProperty::ThermalResistance => PROPERTY_THERMAL_RESISTANCE,
            MaterialProperty::HeatCapacity => PROPERTY_HEAT_CAPACITY,
        };
        offset as usize
    }
}

/// Flattened per-material constants, built once and read by host and device solvers.
///
/// Layout (f32, one channel named `lookup` of a `count*3 × 1 × 1` volume):
///
/// ```text
/// [mass₀, resistance₀, capacity₀, mass₁, resistance₁, capacity₁, …]
/// ```
///
/// Resistances assume every voxel stepped against this table has the edge length
/// it was built with; mixing edge lengths across volumes is unsupported.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialPropertyTable {
    lookup: Volume,
    material_count: usize,
    voxel_edge_length: Option<f32>,
}

/// Derive one material's voxel constants for edge length `length` (meters).
///
/// `mass = ρ·L³`, `resistance = 1 / (2·k·L)` (half-voxel path of length L/2 over area L²),
/// `heat_capacity = mass·c`. Gas is all zero.
pub fn derive_record(
    index: usize,
    material: &MaterialDef,
    length: f32,
) -> Result<MaterialRecord, VoxelError> {
    if !material.phase.participates() {
        return Ok(MaterialRecord::NON_PARTICIPATING);
    }
    let density = material.density.ok_or_else(|| VoxelError::InvalidMaterial {
        index,
        name: material.name.clone(),
        reason: format!("{:?} phase requires a density", material.phase),
    })?;
    let volume = length * length * length;
    let mass = density * volume;
    Ok(MaterialRecord {
        mass,
        thermal_resistance: 1.0 / (2.0 * material.thermal_conductivity * length),
        heat_capacity: mass * material.specific_heat_capacity,
    })
}

impl MaterialPropertyTable {
    /// Compile a catalog for voxels of edge length `voxel_edge_length` meters.
    /// Material ids are catalog positions.
    pub fn build(catalog: &MaterialCatalog, voxel_edge_length: f32) -> Result<Self, VoxelError> {
        let records = catalog
            .materials
            .iter()
            .enumerate()
            .map(|(index, material)| derive_record(index, material, voxel_edge_length))
            .collect::<Result<Vec<_>, _>>()?;
        let mut table = Self::from_records(&records)?;
        table.voxel_edge_length = Some(voxel_edge_length);
        log::info!(
            "Compiled material property table: {} materials, {} m voxels",
            table.material_count,
            voxel_edge_length
        );
        Ok(table)
    }

    /// Build a table from already-derived records, id = position.
    pub fn from_records(records: &[MaterialRecord]) -> Result<Self, VoxelError> {
        let stride = MATERIAL_PROPERTY_COUNT as usize;
        let mut values = vec![0.0f32; records.len() * stride];
        for (id, record) in records.iter().enumerate() {
            let base = id * stride;
            values[base + PROPERTY_MASS as usize] = record.mass;
            values[base + PROPERTY_THERMAL_RESISTANCE as usize] = record.thermal_resistance;
            values[base + PROPERTY_HEAT_CAPACITY as usize] = record.heat_capacity;
        }
        let size = UVec3::new(values.len() as u32, 1, 1);
        let lookup = Volume::with_data(size, &lookup_layout(), vec![ChannelData::F32(values)])?;
        Ok(Self {
            lookup,
            material_count: records.len(),
            voxel_edge_length: None,
        })
    }

    /// Direct lookup. `material_id` must be below `material_count()`.
    pub fn property(&self, material_id: usize, property: MaterialProperty) -> f32 {
        self.values()[material_id * MATERIAL_PROPERTY_COUNT as usize + property.offset()]
    }

    pub fn mass(&self, material_id: usize) -> f32 {
        self.property(material_id, MaterialProperty::Mass)
    }

    pub fn thermal_resistance(&self, material_id: usize) -> f32 {
        self.property(material_id, MaterialProperty::ThermalResistance)
    }

    pub fn heat_capacity(&self, material_id: usize) -> f32 {
        self.property(material_id, MaterialProperty::HeatCapacity)
    }

    pub fn record(&self, material_id: usize) -> MaterialRecord {
        MaterialRecord {
            mass: self.mass(material_id),
            thermal_resistance: self.thermal_resistance(material_id),
            heat_capacity: self.heat_capacity(material_id),
        }
    }

    /// The flattened property values.
    pub fn values(&self) -> &[f32] {
        self.lookup.typed::<f32>(CHANNEL_LOOKUP).unwrap_or(&[])
    }

    /// The table as a one-channel volume, for upload to a device.
    pub fn volume(&self) -> &Volume {
        &self.lookup
    }

    pub fn material_count(&self) -> usize {
        self.material_count
    }

    /// Edge length the table was compiled for, if built from a catalog.
    pub fn voxel_edge_length(&self) -> Option<f32> {
        self.voxel_edge_length
    }
}

/// Channel layout of a material property table.
pub fn lookup_layout() -> ChannelLayout {
    let mut layout = ChannelLayout::new();
    // A single entry cannot collide.
    let _ = layout.push(CHANNEL_LOOKUP, ScalarKind::F32);
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxheat_core::material::Phase;

    fn material(phase: Phase, density: Option<f32>, k: f32, c: f32) -> MaterialDef {
        MaterialDef {
            name: format!("{phase:?}"),
            phase,
            density,
            thermal_conductivity: k,
            specific_heat_capacity: c,
            viscosity: None,
        }
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-6 * b.abs().max(1.0)
    }

    #[test]
    fn test_derivation_law() {
        let iron = material(Phase::Solid, Some(7.874), 2.0, 0.44);
        let record = derive_record(0, &iron, 0.1).unwrap();
        let volume = 0.1f32 * 0.1 * 0.1;
        assert!(approx(record.mass, 7.874 * volume));
        assert!(approx(record.thermal_resistance, 1.0 / (2.0 * 2.0 * 0.1)));
        assert!(approx(record.heat_capacity, 7.874 * volume * 0.44));
    }

    #[test]
    fn test_gas_is_all_zero() {
        let air = material(Phase::Gas, None, 1.0, 1.0);
        assert_eq!(
            derive_record(3, &air, 0.1).unwrap(),
            MaterialRecord::NON_PARTICIPATING
        );
    }

    #[test]
    fn test_missing_density_is_invalid() {
        let catalog = MaterialCatalog {
            materials: vec![
                material(Phase::Gas, None, 1.0, 1.0),
                material(Phase::Liquid, None, 1.0, 1.0),
            ],
        };
        let err = MaterialPropertyTable::build(&catalog, 0.1).unwrap_err();
        assert!(matches!(err, VoxelError::InvalidMaterial { index: 1, .. }));
    }

    #[test]
    fn test_flattened_layout() {
        let table = MaterialPropertyTable::from_records(&[
            MaterialRecord::NON_PARTICIPATING,
            MaterialRecord::new(1.0, 2.0, 3.0),
        ])
        .unwrap();
        assert_eq!(table.material_count(), 2);
        assert_eq!(table.values(), &[0.0, 0.0, 0.0, 1.0, 2.0, 3.0]);
        assert_eq!(table.volume().size(), UVec3::new(6, 1, 1));
        assert_eq!(table.property(1, MaterialProperty::ThermalResistance), 2.0);
        assert_eq!(table.record(1), MaterialRecord::new(1.0, 2.0, 3.0));
        assert_eq!(table.voxel_edge_length(), None);
    }

    #[test]
    fn test_build_default_catalog() {
        let catalog = crate::defaults::default_catalog().unwrap();
        let table = MaterialPropertyTable::build(&catalog, 0.1).unwrap();
        assert_eq!(table.material_count(), catalog.len());
        assert_eq!(table.voxel_edge_length(), Some(0.1));

        let air = catalog.id_of("air").unwrap();
        assert_eq!(table.record(air), MaterialRecord::NON_PARTICIPATING);

        let stone = catalog.id_of("stone").unwrap();
        assert!(approx(table.mass(stone), 0.001));
        assert!(approx(table.thermal_resistance(stone), 5.0));
        assert!(approx(table.heat_capacity(stone), 0.001));
    }
}
