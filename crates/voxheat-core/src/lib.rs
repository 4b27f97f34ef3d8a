pub mod channel;
pub mod constants;
pub mod error;
pub mod material;
pub mod scalar;
pub mod volume;

pub use channel::{ChannelData, ChannelLayout, Element};
pub use error::VoxelError;
pub use scalar::{ScalarKind, ScalarType};
pub use volume::Volume;
