//! Bindings to the wire formats the container speaks.
//!
//! Both codecs expose the same primitives: encode a value, decode bytes into a
//! fresh value, and decode bytes over an existing [`Payload`]. Failures are
//! the codec's own error values, position included, wrapped transparently in
//! [`Error`](crate::Error).

use std::collections::BTreeMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::payload::Payload;

/// A structured encoding usable by [`Decodable`](crate::Decodable).
pub trait Codec {
	/// Short name, used in diagnostics.
	const NAME: &'static str;

	/// Encodes `value`.
	fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>>;

	/// Decodes `bytes` into a new `T`.
	fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T>;

	/// Decodes `bytes` into the existing `target`.
	fn populate(bytes: &[u8], target: &mut dyn Payload) -> Result<()>;

	/// Returns true if `bytes` is exactly the format's "no value" representation.
	fn is_nil(bytes: &[u8]) -> bool;

	/// Canonical "no value" representation.
	fn encode_nil() -> Result<Vec<u8>> {
		Self::encode(&Option::<()>::None)
	}

	/// Shallow-decodes a payload into a string-keyed map of `X` values.
	fn decode_map<X: DeserializeOwned>(bytes: &[u8]) -> Result<BTreeMap<String, X>> {
		Self::decode(bytes)
	}
}

/// JSON via `serde_json`. "No value" is the `null` literal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Codec for Json {
	const NAME: &'static str = "json";

	fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
		Ok(serde_json::to_vec(value)?)
	}

	fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
		Ok(serde_json::from_slice(bytes)?)
	}

	fn populate(bytes: &[u8], target: &mut dyn Payload) -> Result<()> {
		Ok(target.populate_json(bytes)?)
	}

	fn is_nil(bytes: &[u8]) -> bool {
		bytes.trim_ascii() == b"null"
	}
}

/// MessagePack via `rmp-serde`, with structs written as maps keyed by field
/// name. "No value" is the single nil byte `0xc0`.
#[cfg(feature = "msgpack")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPack;

#[cfg(feature = "msgpack")]
impl MsgPack {
	/// The nil marker.
	pub const NIL: u8 = 0xc0;
}

#[cfg(feature = "msgpack")]
impl Codec for MsgPack {
	const NAME: &'static str = "msgpack";

	fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
		Ok(rmp_serde::to_vec_named(value)?)
	}

	fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
		Ok(rmp_serde::from_slice(bytes)?)
	}

	fn populate(bytes: &[u8], target: &mut dyn Payload) -> Result<()> {
		Ok(target.populate_msgpack(bytes)?)
	}

	fn is_nil(bytes: &[u8]) -> bool {
		matches!(bytes, [Self::NIL])
	}
}
