// Core modules implementing tag parsing, tree navigation, conversion, and error modeling.
pub mod convert;
mod delegate;
pub mod error;
mod flatten;
mod literal;
mod navigate;
pub mod path;
pub mod schema;
