use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VoxelError;

/// Closed set of scalar element types a volume channel may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F16,
    F32,
    F64,
}

/// Immutable description of one scalar type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScalarType {
    pub kind: ScalarKind,
    pub bit_width: u32,
    /// Lowest representable finite value.
    pub min: f64,
    /// Highest representable finite value.
    pub max: f64,
    /// Rust element type backing host channel memory, if any.
    pub host_type: Option<&'static str>,
    /// WGSL scalar used in storage declarations, if the type can live in one.
    pub device_type: Option<&'static str>,
}

impl ScalarType {
    /// Bytes occupied by one element.
    pub fn bytes_per_element(&self) -> usize {
        bits_to_bytes(self.bit_width)
    }

    pub fn has_host_type(&self) -> bool {
        self.host_type.is_some()
    }
}

const SCALAR_TYPES: [ScalarType; 9] = [
    ScalarType {
        kind: ScalarKind::U8,
        bit_width: 8,
        min: 0.0,
        max: u8::MAX as f64,
        host_type: Some("u8"),
        device_type: None,
    },
    ScalarType {
        kind: ScalarKind::U16,
        bit_width: 16,
        min: 0.0,
        max: u16::MAX as f64,
        host_type: Some("u16"),
        device_type: None,
    },
    ScalarType {
        kind: ScalarKind::U32,
        bit_width: 32,
        min: 0.0,
        max: u32::MAX as f64,
        host_type: Some("u32"),
        device_type: Some("u32"),
    },
    ScalarType {
        kind: ScalarKind::I8,
        bit_width: 8,
        min: i8::MIN as f64,
        max: i8::MAX as f64,
        host_type: Some("i8"),
        device_type: None,
    },
    ScalarType {
        kind: ScalarKind::I16,
        bit_width: 16,
        min: i16::MIN as f64,
        max: i16::MAX as f64,
        host_type: Some("i16"),
        device_type: None,
    },
    ScalarType {
        kind: ScalarKind::I32,
        bit_width: 32,
        min: i32::MIN as f64,
        max: i32::MAX as f64,
        host_type: Some("i32"),
        device_type: Some("i32"),
    },
    // Half floats exist on the device (with SHADER_F16) but have no host element type.
    ScalarType {
        kind: ScalarKind::F16,
        bit_width: 16,
        min: -65504.0,
        max: 65504.0,
        host_type: None,
        device_type: Some("f16"),
    },
    ScalarType {
        kind: ScalarKind::F32,
        bit_width: 32,
        min: f32::MIN as f64,
        max: f32::MAX as f64,
        host_type: Some("f32"),
        device_type: Some("f32"),
    },
    ScalarType {
        kind: ScalarKind::F64,
        bit_width: 64,
        min: f64::MIN,
        max: f64::MAX,
        host_type: Some("f64"),
        device_type: None,
    },
];

impl ScalarKind {
    pub const ALL: [ScalarKind; 9] = [
        ScalarKind::U8,
        ScalarKind::U16,
        ScalarKind::U32,
        ScalarKind::I8,
        ScalarKind::I16,
        ScalarKind::I32,
        ScalarKind::F16,
        ScalarKind::F32,
        ScalarKind::F64,
    ];

    /// Registry entry for this kind.
    pub fn describe(self) -> &'static ScalarType {
        &SCALAR_TYPES[self as usize]
    }

    /// Lowercase identifier, e.g. `"f32"`.
    pub fn id(self) -> &'static str {
        match self {
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::F16 => "f16",
            ScalarKind::F32 => "f32",
            ScalarKind::F64 => "f64",
        }
    }

    pub fn bytes_per_element(self) -> usize {
        self.describe().bytes_per_element()
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ScalarKind {
    type Err = VoxelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScalarKind::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| VoxelError::UnknownType(s.to_string()))
    }
}

/// Look up a scalar type by its string id. Fails with `UnknownType` outside the fixed set.
pub fn describe(id: &str) -> Result<&'static ScalarType, VoxelError> {
    id.parse::<ScalarKind>().map(ScalarKind::describe)
}

/// Bytes needed to hold `bits` bits, rounded up.
pub fn bits_to_bytes(bits: u32) -> usize {
    bits.div_ceil(8) as usize
}
