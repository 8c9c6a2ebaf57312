//! Deserialization onto a value that already holds data.
//!
//! Struct fields present in the input replace the held ones, fields the input
//! leaves out keep their held value, and nested structs merge the same way.
//! Maps, sequences, enums and scalars are replaced as a whole.
//!
//! The input is streamed through the caller's deserializer, so its errors keep
//! their original type. Only the held side is buffered, as a [`Value`].

use std::collections::BTreeMap;
use std::fmt;

use serde::de::{DeserializeSeed, Deserializer, Error as _, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use serde_value::{Value, ValueDeserializer};

/// Deserializes a `T` from `de` over the current contents of `target`.
pub(crate) fn apply<'de, T, D>(target: &mut T, de: D) -> Result<(), D::Error>
where
	T: Serialize + Deserialize<'de>,
	D: Deserializer<'de>,
{
	let held = serde_value::to_value(&*target).map_err(D::Error::custom)?;
	*target = T::deserialize(Overlay { inner: de, held: Some(held) })?;
	Ok(())
}

struct Overlay<D> {
	inner: D,
	held: Option<Value>,
}

macro_rules! forward {
	($($method:ident($($arg:ident: $ty:ty),*)),* $(,)?) => {
		$(
			fn $method<V: Visitor<'de>>(self, $($arg: $ty,)* visitor: V) -> Result<V::Value, Self::Error> {
				self.inner.$method($($arg,)* visitor)
			}
		)*
	};
}

impl<'de, D: Deserializer<'de>> Deserializer<'de> for Overlay<D> {
	type Error = D::Error;

	forward! {
		deserialize_any(),
		deserialize_bool(),
		deserialize_i8(),
		deserialize_i16(),
		deserialize_i32(),
		deserialize_i64(),
		deserialize_i128(),
		deserialize_u8(),
		deserialize_u16(),
		deserialize_u32(),
		deserialize_u64(),
		deserialize_u128(),
		deserialize_f32(),
		deserialize_f64(),
		deserialize_char(),
		deserialize_str(),
		deserialize_string(),
		deserialize_bytes(),
		deserialize_byte_buf(),
		deserialize_option(),
		deserialize_unit(),
		deserialize_unit_struct(name: &'static str),
		deserialize_newtype_struct(name: &'static str),
		deserialize_seq(),
		deserialize_tuple(len: usize),
		deserialize_tuple_struct(name: &'static str, len: usize),
		deserialize_map(),
		deserialize_enum(name: &'static str, variants: &'static [&'static str]),
		deserialize_identifier(),
		deserialize_ignored_any(),
	}

	fn deserialize_struct<V: Visitor<'de>>(self, name: &'static str, fields: &'static [&'static str], visitor: V) -> Result<V::Value, Self::Error> {
		let held = match self.held {
			Some(Value::Map(map)) => map
				.into_iter()
				.filter_map(|(key, value)| match key {
					Value::String(key) => Some((key, value)),
					_ => None,
				})
				.collect(),
			_ => BTreeMap::new(),
		};
		self.inner.deserialize_struct(name, fields, OverlayVisitor { visitor, held })
	}

	fn is_human_readable(&self) -> bool {
		self.inner.is_human_readable()
	}
}

struct OverlayVisitor<V> {
	visitor: V,
	held: BTreeMap<String, Value>,
}

impl<'de, V: Visitor<'de>> Visitor<'de> for OverlayVisitor<V> {
	type Value = V::Value;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.visitor.expecting(f)
	}

	fn visit_map<A: MapAccess<'de>>(self, map: A) -> Result<V::Value, A::Error> {
		self.visitor.visit_map(OverlayMap {
			input: Some(map),
			held: self.held,
			current: None,
			pending: None,
		})
	}

	fn visit_seq<A: SeqAccess<'de>>(self, seq: A) -> Result<V::Value, A::Error> {
		self.visitor.visit_seq(seq)
	}
}

/// Yields the input's entries, then the held fields the input never named.
struct OverlayMap<A> {
	input: Option<A>,
	held: BTreeMap<String, Value>,
	/// Held value of the field whose key was just read from the input.
	current: Option<Value>,
	/// Held value of the field whose key was just replayed from `held`.
	pending: Option<Value>,
}

impl<'de, A: MapAccess<'de>> MapAccess<'de> for OverlayMap<A> {
	type Error = A::Error;

	fn next_key_seed<K: DeserializeSeed<'de>>(&mut self, seed: K) -> Result<Option<K::Value>, A::Error> {
		let next = match self.input.as_mut() {
			Some(input) => input.next_key::<Value>()?,
			None => None,
		};
		if let Some(key) = next {
			self.current = match &key {
				Value::String(name) => self.held.remove(name),
				_ => None,
			};
			return seed.deserialize(ValueDeserializer::<A::Error>::new(key)).map(Some);
		}

		self.input = None;
		let Some((name, value)) = self.held.pop_first() else {
			return Ok(None);
		};
		self.pending = Some(value);
		seed.deserialize(ValueDeserializer::<A::Error>::new(Value::String(name))).map(Some)
	}

	fn next_value_seed<S: DeserializeSeed<'de>>(&mut self, seed: S) -> Result<S::Value, A::Error> {
		if let Some(value) = self.pending.take() {
			return seed.deserialize(ValueDeserializer::<A::Error>::new(value));
		}
		match self.input.as_mut() {
			Some(input) => input.next_value_seed(Merge {
				seed,
				held: self.current.take(),
			}),
			None => Err(A::Error::custom("map value requested before its key")),
		}
	}
}

/// Seed deserializing one field of the input over its held value.
struct Merge<S> {
	seed: S,
	held: Option<Value>,
}

impl<'de, S: DeserializeSeed<'de>> DeserializeSeed<'de> for Merge<S> {
	type Value = S::Value;

	fn deserialize<D: Deserializer<'de>>(self, deserializer: D) -> Result<S::Value, D::Error> {
		self.seed.deserialize(Overlay {
			inner: deserializer,
			held: self.held,
		})
	}
}
