pub mod error;
pub mod types;
pub mod value;

pub use error::{MapperError, Result};
pub use types::Row;
pub use value::Value;
