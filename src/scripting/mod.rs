//! Dynamic SQL templating: markup is compiled into an immutable node tree
//! which is evaluated per call into a [`BoundCommand`](crate::mapping::BoundCommand).

pub mod binding;
pub mod compiler;
pub mod context;
pub mod markup;
pub mod node;
pub mod scope;
pub mod source;
pub mod token;

pub use compiler::{CompileOptions, ScriptCompiler};
pub use context::DynamicContext;
pub use node::SqlNode;
pub use scope::{
    DATABASE_ID_KEY, ExpressionScope, PARAMETER_OBJECT_KEY, Parameter, ParameterSource,
    SCALAR_VALUE_KEY,
};
pub use source::SqlSource;
