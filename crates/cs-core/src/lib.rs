pub mod error;
pub mod types;
pub mod value;

pub use error::{ErrorKind, ScriptError};
pub use types::*;
pub use value::*;
