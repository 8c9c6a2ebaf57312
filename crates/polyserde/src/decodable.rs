//! Container for a polymorphic value and its decode protocol.
//!
//! Decoding runs in three phases against the same raw bytes:
//!
//! 1. **Discriminate**: shallow-decode into the decider's input shape.
//! 2. **Resolve**: hand that input to the [`Decider`] for a fresh instance.
//! 3. **Populate**: decode the full payload again, over that instance. Fields
//!    the payload omits keep whatever the factory or decider put there.
//!
//! A nil payload still goes through phase 1: if the discriminator shape accepts
//! it the container ends up empty, otherwise the decode error is returned.
//!
//! Errors from phases 1 and 2 leave the container empty. An error from phase 3
//! leaves the resolved instance in place, partially populated; callers
//! must discard the container on any error.
//!
//! Encoding skips the registry entirely and writes the concrete value as is.

use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::trace;

#[cfg(feature = "msgpack")]
use crate::codec::MsgPack;
use crate::codec::{Codec, Json};
use crate::decider::{Decider, FieldDecider, RegistryDecider, SelfDecider};
use crate::error::Result;
use crate::payload::{Interface, Payload, Upcast};
use crate::registry::Registry;

/// Holder of at most one value of interface `I`, decoded through decider `D`.
pub struct Decodable<I: ?Sized, D> {
	value: Option<Box<I>>,
	decider: PhantomData<fn() -> D>,
}

/// Container dispatching on a decoded discriminator value of `X`.
pub type RegistryDecodable<I, X> = Decodable<I, RegistryDecider<X>>;

/// Container dispatching on the map field named by `F`.
pub type FieldDecodable<I, F, X> = Decodable<I, FieldDecider<F, X>>;

/// Container whose discriminator shape `X` decides for itself.
pub type SelfDecodable<I, X> = Decodable<I, SelfDecider<X>>;

impl<I: ?Sized, D> Decodable<I, D> {
	/// An empty container.
	pub const fn empty() -> Self {
		Self {
			value: None,
			decider: PhantomData,
		}
	}

	/// Wraps an already boxed value.
	pub fn new(value: Box<I>) -> Self {
		Self {
			value: Some(value),
			decider: PhantomData,
		}
	}

	/// Wraps a concrete value behind the interface.
	pub fn from_value<T>(value: T) -> Self
	where
		I: Upcast<T>,
	{
		Self::new(I::upcast(Box::new(value)))
	}

	/// Borrows the held value.
	pub fn get(&self) -> Option<&I> {
		self.value.as_deref()
	}

	/// Mutably borrows the held value.
	pub fn get_mut(&mut self) -> Option<&mut I> {
		self.value.as_deref_mut()
	}

	/// Removes and returns the held value, leaving the container empty.
	pub fn take(&mut self) -> Option<Box<I>> {
		self.value.take()
	}

	/// Consumes the container.
	pub fn into_inner(self) -> Option<Box<I>> {
		self.value
	}

	/// Returns true if no value is held.
	pub fn is_empty(&self) -> bool {
		self.value.is_none()
	}
}

impl<I: ?Sized + Interface, D> Decodable<I, D> {
	/// Borrows the held value as its concrete type.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		self.get()?.as_payload().downcast_ref()
	}

	/// Mutably borrows the held value as its concrete type.
	pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
		self.get_mut()?.as_payload_mut().downcast_mut()
	}

	/// Encodes the held value's concrete type, or the format's nil if empty.
	pub fn encode<C: Codec>(&self) -> Result<Vec<u8>> {
		C::encode(self)
	}

	/// Encodes as JSON.
	pub fn to_json(&self) -> Result<Vec<u8>> {
		self.encode::<Json>()
	}

	/// Encodes as MessagePack.
	#[cfg(feature = "msgpack")]
	pub fn to_msgpack(&self) -> Result<Vec<u8>> {
		self.encode::<MsgPack>()
	}
}

impl<I, D> Decodable<I, D>
where
	I: ?Sized + Interface,
	D: Decider<I>,
{
	/// Decodes `bytes` against the global registry.
	pub fn decode<C: Codec>(bytes: &[u8]) -> Result<Self> {
		Self::decode_with::<C>(Registry::global(), bytes)
	}

	/// Decodes `bytes` against `registry`.
	pub fn decode_with<C: Codec>(registry: &Registry, bytes: &[u8]) -> Result<Self> {
		let mut decodable = Self::empty();
		decodable.decode_in_place::<C>(registry, bytes)?;
		Ok(decodable)
	}

	/// Decodes `bytes` into this container, replacing any held value.
	///
	/// A nil payload yields an empty container only if the discriminator shape
	/// decodes from it; otherwise that decode error is returned.
	pub fn decode_in_place<C: Codec>(&mut self, registry: &Registry, bytes: &[u8]) -> Result<()> {
		self.value = None;
		let input: D::Input = C::decode(bytes)?;
		if C::is_nil(bytes) {
			trace!(codec = C::NAME, "nil payload");
			return Ok(());
		}

		let instance = D::decide(registry, input)?;
		let instance = self.value.insert(instance);
		trace!(codec = C::NAME, concrete = instance.as_payload().type_name(), "populating");
		C::populate(bytes, instance.as_payload_mut())
	}

	/// Decodes JSON against the global registry.
	pub fn from_json(bytes: &[u8]) -> Result<Self> {
		Self::decode::<Json>(bytes)
	}

	/// Decodes MessagePack against the global registry.
	#[cfg(feature = "msgpack")]
	pub fn from_msgpack(bytes: &[u8]) -> Result<Self> {
		Self::decode::<MsgPack>(bytes)
	}

	/// Runs the three phases against an already buffered value.
	fn from_buffered<'de, B>(registry: &Registry, buffered: B, nil: bool) -> std::result::Result<Self, B::Error>
	where
		B: Deserializer<'de> + Clone,
	{
		let input = <D::Input as Deserialize>::deserialize(buffered.clone())?;
		if nil {
			return Ok(Self::empty());
		}

		let mut instance = D::decide(registry, input).map_err(B::Error::custom)?;
		let mut erased = <dyn erased_serde::Deserializer>::erase(buffered);
		instance.as_payload_mut().populate(&mut erased).map_err(B::Error::custom)?;
		Ok(Self::new(instance))
	}
}

impl<I: ?Sized, D> Default for Decodable<I, D> {
	fn default() -> Self {
		Self::empty()
	}
}

impl<I: ?Sized, D> From<Box<I>> for Decodable<I, D> {
	fn from(value: Box<I>) -> Self {
		Self::new(value)
	}
}

impl<I: ?Sized + Interface, D> fmt::Debug for Decodable<I, D> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Decodable")
			.field("interface", &std::any::type_name::<I>())
			.field("concrete", &self.get().map(|value| value.as_payload().type_name()))
			.finish()
	}
}

impl<I: ?Sized + Interface, D> Serialize for Decodable<I, D> {
	fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
		match self.get() {
			Some(value) => value.as_payload().serialize(serializer),
			None => serializer.serialize_none(),
		}
	}
}

/// Embedded containers buffer their field and resolve against
/// [`Registry::global`]. Human-readable formats buffer as JSON values, binary
/// ones as format-neutral values so non-string keys and bytes survive.
impl<'de, I, D> Deserialize<'de> for Decodable<I, D>
where
	I: ?Sized + Interface,
	D: Decider<I>,
{
	fn deserialize<De: Deserializer<'de>>(deserializer: De) -> std::result::Result<Self, De::Error> {
		let registry = Registry::global();
		if deserializer.is_human_readable() {
			let buffered = serde_json::Value::deserialize(deserializer)?;
			Self::from_buffered(registry, &buffered, buffered.is_null()).map_err(De::Error::custom)
		} else {
			let buffered = serde_value::Value::deserialize(deserializer)?;
			let nil = matches!(buffered, serde_value::Value::Unit | serde_value::Value::Option(None));
			Self::from_buffered(registry, buffered, nil).map_err(De::Error::custom)
		}
	}
}
