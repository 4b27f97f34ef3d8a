use crate::error::VoxelError;
use crate::scalar::ScalarKind;

/// Host memory of one channel: a typed buffer selected once from the channel's scalar kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! each_variant {
    ($data:expr, $buf:ident => $body:expr) => {
        match $data {
            ChannelData::U8($buf) => $body,
            ChannelData::U16($buf) => $body,
            ChannelData::U32($buf) => $body,
            ChannelData::I8($buf) => $body,
            ChannelData::I16($buf) => $body,
            ChannelData::I32($buf) => $body,
            ChannelData::F32($buf) => $body,
            ChannelData::F64($buf) => $body,
        }
    };
}

impl ChannelData {
    /// Allocate a zeroed buffer of `len` elements for `kind`.
    ///
    /// Returns `None` for kinds without a host element type.
    pub fn zeroed(kind: ScalarKind, len: usize) -> Option<Self> {
        let data = match kind {
            ScalarKind::U8 => ChannelData::U8(vec![0; len]),
            ScalarKind::U16 => ChannelData::U16(vec![0; len]),
            ScalarKind::U32 => ChannelData::U32(vec![0; len]),
            ScalarKind::I8 => ChannelData::I8(vec![0; len]),
            ScalarKind::I16 => ChannelData::I16(vec![0; len]),
            ScalarKind::I32 => ChannelData::I32(vec![0; len]),
            ScalarKind::F32 => ChannelData::F32(vec![0.0; len]),
            ScalarKind::F64 => ChannelData::F64(vec![0.0; len]),
            ScalarKind::F16 => return None,
        };
        Some(data)
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            ChannelData::U8(_) => ScalarKind::U8,
            ChannelData::U16(_) => ScalarKind::U16,
            ChannelData::U32(_) => ScalarKind::U32,
            ChannelData::I8(_) => ScalarKind::I8,
            ChannelData::I16(_) => ScalarKind::I16,
            ChannelData::I32(_) => ScalarKind::I32,
            ChannelData::F32(_) => ScalarKind::F32,
            ChannelData::F64(_) => ScalarKind::F64,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        each_variant!(self, buf => buf.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size in bytes of the element data.
    pub fn byte_len(&self) -> usize {
        self.len() * self.kind().bytes_per_element()
    }

    /// Element `i` widened to f64. Used by diagnostics, not by the solver.
    pub fn element_at(&self, i: usize) -> Option<f64> {
        each_variant!(self, buf => buf.get(i).map(|v| *v as f64))
    }

    /// Raw little-endian bytes of the buffer.
    pub fn as_bytes(&self) -> &[u8] {
        each_variant!(self, buf => bytemuck::cast_slice(buf.as_slice()))
    }

    /// Mutable raw bytes of the buffer.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        each_variant!(self, buf => bytemuck::cast_slice_mut(buf.as_mut_slice()))
    }

    /// Overwrite the buffer from raw bytes. `bytes` must hold exactly `byte_len()` bytes.
    pub fn copy_from_bytes(&mut self, bytes: &[u8]) -> Result<(), VoxelError> {
        let target = self.as_bytes_mut();
        if target.len() != bytes.len() {
            return Err(VoxelError::LengthMismatch {
                channel: String::from("<bytes>"),
                expected: target.len(),
                actual: bytes.len(),
            });
        }
        target.copy_from_slice(bytes);
        Ok(())
    }

    /// Typed view, if `T` matches this buffer's kind.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    /// Typed mutable view, if `T` matches this buffer's kind.
    pub fn as_mut_slice<T: Element>(&mut self) -> Option<&mut [T]> {
        T::slice_mut(self)
    }
}

/// A host element type that can back a channel.
pub trait Element: bytemuck::Pod + Default + PartialEq + std::fmt::Debug {
    const KIND: ScalarKind;

    fn slice(data: &ChannelData) -> Option<&[Self]>;
    fn slice_mut(data: &mut ChannelData) -> Option<&mut [Self]>;
    fn wrap(values: Vec<Self>) -> ChannelData;
}

macro_rules! impl_element {
    ($ty:ty, $variant:ident) => {
        impl Element for $ty {
            const KIND: ScalarKind = ScalarKind::$variant;

            fn slice(data: &ChannelData) -> Option<&[Self]> {
                match data {
                    ChannelData::$variant(buf) => Some(buf.as_slice()),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut ChannelData) -> Option<&mut [Self]> {
                match data {
                    ChannelData::$variant(buf) => Some(buf.as_mut_slice()),
                    _ => None,
                }
            }

            fn wrap(values: Vec<Self>) -> ChannelData {
                ChannelData::$variant(values)
            }
        }
    };
}

impl_element!(u8, U8);
impl_element!(u16, U16);
impl_element!(u32, U32);
impl_element!(i8, I8);
impl_element!(i16, I16);
impl_element!(i32, I32);
impl_element!(f32, F32);
impl_element!(f64, F64);

/// Ordered set of uniquely named, typed channels.
///
/// Order is significant: it is the order of host buffers in a volume and the
/// binding index order of generated kernel declarations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelLayout {
    entries: Vec<(String, ScalarKind)>,
}

impl ChannelLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a layout from `(name, kind)` pairs, rejecting repeated names.
    pub fn from_pairs<'a>(
        pairs: impl IntoIterator<Item = (&'a str, ScalarKind)>,
    ) -> Result<Self, VoxelError> {
        let mut layout = Self::new();
        for (name, kind) in pairs {
            layout.push(name, kind)?;
        }
        Ok(layout)
    }

    /// Append a channel. Fails with `DuplicateChannel` if the name is taken.
    pub fn push(&mut self, name: &str, kind: ScalarKind) -> Result<(), VoxelError> {
        if self.contains(name) {
            return Err(VoxelError::DuplicateChannel(name.to_string()));
        }
        self.entries.push((name.to_string(), kind));
        Ok(())
    }

    pub fn with(mut self, name: &str, kind: ScalarKind) -> Result<Self, VoxelError> {
        self.push(name, kind)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<ScalarKind> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, kind)| *kind)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| n == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ScalarKind)> {
        self.entries.iter().map(|(n, kind)| (n.as_str(), *kind))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
