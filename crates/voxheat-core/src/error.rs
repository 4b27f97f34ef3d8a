use thiserror::Error;

use crate::scalar::ScalarKind;

/// Errors raised by volume construction, material compilation and the device path.
///
/// Shape and configuration errors indicate programmer error and are never retried.
/// `DeviceUnavailable` is the one expected condition: callers fall back to the host
/// solver.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VoxelError {
    #[error("unknown scalar type id '{0}'")]
    UnknownType(String),

    #[error("channel '{channel}' has type {kind} which has no {side} representation")]
    UnsupportedChannelType {
        channel: String,
        kind: ScalarKind,
        side: &'static str,
    },

    #[error("channel '{channel}' has {actual} elements, expected {expected}")]
    LengthMismatch {
        channel: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid material #{index} '{name}': {reason}")]
    InvalidMaterial {
        index: usize,
        name: String,
        reason: String,
    },

    #[error("compute device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("binding '{0}' is declared more than once")]
    DuplicateBindingName(String),

    #[error("no buffer supplied for binding '{0}'")]
    MissingBinding(String),

    #[error("device execution failed: {0}")]
    DeviceExecutionFailure(String),

    #[error("volume has no channel named '{0}'")]
    MissingChannel(String),

    #[error("channel '{0}' is declared more than once")]
    DuplicateChannel(String),

    #[error("channel '{channel}' has type {actual}, expected {expected}")]
    ChannelTypeMismatch {
        channel: String,
        expected: ScalarKind,
        actual: ScalarKind,
    },

    #[error("expected data for {expected} channels, got {actual}")]
    ChannelCountMismatch { expected: usize, actual: usize },

    #[error("device buffer for '{channel}' was not created with {usage} usage")]
    MissingUsage {
        channel: String,
        usage: &'static str,
    },

    #[error("shader compilation failed: {0}")]
    ShaderCompilationFailed(String),

    #[error("channel '{channel}' needs a {size}-byte device buffer, device limit is {limit}")]
    BufferTooLarge {
        channel: String,
        size: u64,
        limit: u64,
    },

    #[error("material id {id} is out of range for a table of {count} materials")]
    UnknownMaterialId { id: usize, count: usize },

    #[error("dispatch of {requested} workgroups on one axis exceeds device limit {limit}")]
    DispatchTooLarge { requested: u32, limit: u32 },
}
