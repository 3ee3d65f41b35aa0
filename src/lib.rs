//! Purpose: Tag-driven bidirectional mapping between tagged (ergonomic) and naked (wire) shapes.
//! Exports: `api` (typed conversions, mapping documents), `core` (tag parser, schema, errors).
//! Role: Library backing the `mapconv` CLI; callers normally go through `api`.
//! Invariants: Conversion is pure and synchronous; the only shared state is the schema cache.
//! Invariants: The library emits `tracing` events but never installs a subscriber.
pub mod api;
pub mod core;
