//! The compiled selection model consumed by the execution engine.
//!
//! Operations and fragments are described once, ahead of time, and are read-only afterwards.

mod field_type;
mod input_value;
mod operation;
mod schema;
mod selection;

pub use field_type::FieldType;
pub use input_value::InputValue;
pub use operation::Operation;
pub use operation::OperationKind;
pub use schema::CacheKeyInfo;
pub use schema::CacheKeyResolver;
pub use schema::Schema;
pub use selection::Condition;
pub use selection::DeferredFragment;
pub use selection::Field;
pub use selection::Fragment;
pub use selection::IncludeSkip;
pub use selection::InlineFragment;
pub use selection::Selection;
pub use selection::SelectionSet;

pub const TYPENAME: &str = "__typename";
