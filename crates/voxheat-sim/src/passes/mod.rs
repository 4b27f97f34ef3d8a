pub mod heat;
pub mod probe;
