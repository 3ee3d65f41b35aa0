//! Purpose: Convert between concrete Rust types through their serde trees.
//! Exports: `convert_to`, `convert_from`, `TaggedExt`.
//! Role: Typed surface over the engine; one call per model pair, no generated glue.
//! Invariants: The destination is written only when the whole conversion succeeds.
//! Invariants: Fields serde skips on either side are never read and keep their current value.
use std::any::type_name;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ApiResult;
use crate::core::convert::{Direction, convert};
use crate::core::error::{Error, ErrorKind};
use crate::core::schema::{Schema, Tagged};

/// Projects `tagged` onto `naked`, keeping whatever `naked` already holds outside mapped paths.
pub fn convert_to<T, N>(tagged: &T, naked: &mut N) -> ApiResult<()>
where
    T: Tagged,
    N: Serialize + DeserializeOwned,
{
    let schema = Schema::of::<T>()?;
    let source = encode(tagged)?;
    let mut dest = encode(&*naked)?;
    convert(Direction::ToNaked, &schema, &source, &mut dest)?;
    decode_into(dest, naked)?;
    Ok(())
}

/// Projects `naked` back onto `tagged`.
pub fn convert_from<N, T>(naked: &N, tagged: &mut T) -> ApiResult<()>
where
    N: Serialize,
    T: Tagged,
{
    let schema = Schema::of::<T>()?;
    let source = encode(naked)?;
    let mut dest = encode(&*tagged)?;
    convert(Direction::FromNaked, &schema, &source, &mut dest)?;
    decode_into(dest, tagged)?;
    Ok(())
}

/// Per-model conversion methods for every [`Tagged`] type.
pub trait TaggedExt: Tagged {
    /// Builds a fresh naked value from `self`.
    fn to_naked<N>(&self) -> ApiResult<N>
    where
        N: Serialize + DeserializeOwned + Default;

    /// Builds a fresh tagged value from `naked`.
    fn from_naked<N>(naked: &N) -> ApiResult<Self>
    where
        N: Serialize;
}

impl<T: Tagged> TaggedExt for T {
    fn to_naked<N>(&self) -> ApiResult<N>
    where
        N: Serialize + DeserializeOwned + Default,
    {
        let mut naked = N::default();
        convert_to(self, &mut naked)?;
        Ok(naked)
    }

    fn from_naked<N>(naked: &N) -> ApiResult<Self>
    where
        N: Serialize,
    {
        let mut tagged = T::default();
        convert_from(naked, &mut tagged)?;
        Ok(tagged)
    }
}

fn encode<V: Serialize + ?Sized>(value: &V) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|err| {
        Error::new(ErrorKind::Encode)
            .with_message(format!("cannot serialize `{}`", type_name::<V>()))
            .with_source(err)
    })
}

/// Decodes `tree` over `place` field by field, so fields serde skips keep their value.
/// A trial decode runs first; `place` is only touched once the tree is known to fit.
fn decode_into<V: DeserializeOwned>(tree: Value, place: &mut V) -> ApiResult<()> {
    serde_json::from_value::<V>(tree.clone()).map_err(decode_error::<V>)?;
    V::deserialize_in_place(tree, place).map_err(decode_error::<V>)
}

fn decode_error<V>(err: serde_json::Error) -> Error {
    Error::new(ErrorKind::TypeMismatch)
        .with_message(format!("converted value does not fit `{}`", type_name::<V>()))
        .with_source(err)
}
