pub mod bound;
pub mod parameter;
pub mod statement;

pub use bound::{BoundCommand, RowBounds};
pub use parameter::{ParameterMapping, ParameterMode};
pub use statement::{CommandKind, KeyGeneration, MappedStatement, StatementType};
