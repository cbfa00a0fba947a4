//! Field registry: the static description of every filterable and sortable
//! attribute of a record kind.
//!
//! Both the filter and sort compilers consult the registry before parsing
//! any value, which gives validation a fixed precedence:
//!
//! 1. unknown field
//! 2. operator not allowed for the field
//! 3. value that does not coerce to the field's type

mod registry;

pub use registry::{Arity, FieldDescriptor, FieldRegistry, OperatorKind, ValueType};
