use serde::{Deserialize, Serialize};

/// Physical phase of a material.
/// Gas is non-participating in conduction: no mass, no heat capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Phase {
    Solid = 0,
    Grain = 1,
    Liquid = 2,
    Gas = 3,
}

impl Phase {
    /// Whether voxels of this phase carry thermal mass.
    pub fn participates(self) -> bool {
        !matches!(self, Phase::Gas)
    }
}

/// A single material definition loaded from RON data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialDef {
    /// Human-readable name for logs and debug output.
    pub name: String,
    pub phase: Phase,
    /// Density in g/cm³. Required for every phase except gas.
    #[serde(default)]
    pub density: Option<f32>,
    /// Thermal conductivity in W/(m·K).
    pub thermal_conductivity: f32,
    /// Specific heat capacity in J/(g·K).
    pub specific_heat_capacity: f32,
    /// Only meaningful for liquids.
    #[serde(default)]
    pub viscosity: Option<f32>,
}

/// Ordered material catalog. A material's id is its position in the list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaterialCatalog {
    pub materials: Vec<MaterialDef>,
}

impl MaterialCatalog {
    /// Look up a material by id.
    pub fn get(&self, id: usize) -> Option<&MaterialDef> {
        self.materials.get(id)
    }

    /// Id of the first material with the given name.
    pub fn id_of(&self, name: &str) -> Option<usize> {
        self.materials.iter().position(|m| m.name == name)
    }

    pub fn len(&self) -> usize {
        self.materials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }
}

/// Per-voxel physical constants derived from a material and a voxel edge length.
///
/// All zero marks a non-participating (gas) material.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaterialRecord {
    /// kg
    pub mass: f32,
    /// K/W across half a voxel.
    pub thermal_resistance: f32,
    /// J/K
    pub heat_capacity: f32,
}

impl MaterialRecord {
    pub const NON_PARTICIPATING: MaterialRecord = MaterialRecord {
        mass: 0.0,
        thermal_resistance: 0.0,
        heat_capacity: 0.0,
    };

    pub fn new(mass: f32, thermal_resistance: f32, heat_capacity: f32) -> Self {
        Self {
            mass,
            thermal_resistance,
            heat_capacity,
        }
    }

    pub fn participates(&self) -> bool {
        self.mass != 0.0
    }
}
