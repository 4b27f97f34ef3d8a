pub mod compiler;
pub mod defaults;
pub mod loader;
pub mod validator;

pub use compiler::{MaterialProperty, MaterialPropertyTable};
