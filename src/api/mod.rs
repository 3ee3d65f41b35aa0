//! Purpose: Define the public Rust API boundary for mapconv.
//! Exports: Typed conversions, mapping documents, schema declaration types and errors.
//! Role: Public, additive-only surface; the engine modules stay crate-internal.
//! Invariants: Every conversion entry point commits its destination only on success.
//! Invariants: Schemas are compiled once per type and shared by every entry point.

mod mapping;
mod typed;

pub use crate::core::convert::Direction;
#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::path::{Dest, FieldPath, Segment, parse_tag};
pub use crate::core::schema::{FieldPlan, FieldTag, Schema, SchemaBuilder, Tagged};
pub use mapping::Mapping;
pub use typed::{TaggedExt, convert_from, convert_to};

pub type ApiResult<T> = Result<T, Error>;
