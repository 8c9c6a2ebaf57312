//! Type-erased payloads and interface objects.
//!
//! A [`Payload`] is any serde round-trippable value; it can be serialized and
//! populated through trait objects, which is what lets the container drive a
//! concrete type it only knows as `dyn Trait`.
//!
//! An interface is a user trait that extends [`Payload`]. Invoking
//! [`interface!`](crate::interface) on it implements [`Interface`] for the
//! trait object and [`Upcast`] for every implementor:
//!
//! ```rust
//! use polyserde::{Payload, interface};
//!
//! trait Shape: Payload {
//! 	fn area(&self) -> f64;
//! }
//! interface!(Shape);
//! ```

use std::any::Any;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::overlay;

/// Object-safe view of a serializable, populatable value.
///
/// Blanket-implemented for every `T: Serialize + DeserializeOwned + Send + Sync + 'static`.
/// Every `populate*` method overlays its input onto the current value: fields
/// the input names are replaced, fields it leaves out keep what the value
/// already held (whatever a factory or decider seeded).
pub trait Payload: Any + Send + Sync + erased_serde::Serialize {
	/// Overlays the value read from `de` onto `self`.
	fn populate(&mut self, de: &mut dyn erased_serde::Deserializer<'_>) -> Result<(), erased_serde::Error>;

	/// Overlays a complete JSON document onto `self`.
	fn populate_json(&mut self, bytes: &[u8]) -> serde_json::Result<()>;

	/// Overlays a MessagePack value onto `self`.
	#[cfg(feature = "msgpack")]
	fn populate_msgpack(&mut self, bytes: &[u8]) -> Result<(), rmp_serde::decode::Error>;

	/// Name of the concrete type behind the trait object.
	fn type_name(&self) -> &'static str;
}

erased_serde::serialize_trait_object!(Payload);

impl<T> Payload for T
where
	T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
	fn populate(&mut self, de: &mut dyn erased_serde::Deserializer<'_>) -> Result<(), erased_serde::Error> {
		overlay::apply(self, de)
	}

	fn populate_json(&mut self, bytes: &[u8]) -> serde_json::Result<()> {
		let mut de = serde_json::Deserializer::from_slice(bytes);
		overlay::apply(self, &mut de)?;
		de.end()
	}

	#[cfg(feature = "msgpack")]
	fn populate_msgpack(&mut self, bytes: &[u8]) -> Result<(), rmp_serde::decode::Error> {
		overlay::apply(self, &mut rmp_serde::Deserializer::new(bytes))
	}

	fn type_name(&self) -> &'static str {
		std::any::type_name::<T>()
	}
}

impl dyn Payload {
	/// Returns true if the concrete type is `T`.
	pub fn is<T: Any>(&self) -> bool {
		(self as &dyn Any).is::<T>()
	}

	/// Borrows the concrete value as `T`.
	pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
		(self as &dyn Any).downcast_ref()
	}

	/// Mutably borrows the concrete value as `T`.
	pub fn downcast_mut<T: Any>(&mut self) -> Option<&mut T> {
		(self as &mut dyn Any).downcast_mut()
	}
}

/// A trait object type usable as the interface of a polymorphic value.
pub trait Interface: 'static {
	/// Views the object as its underlying payload.
	fn as_payload(&self) -> &dyn Payload;

	/// Mutably views the object as its underlying payload.
	fn as_payload_mut(&mut self) -> &mut dyn Payload;
}

/// Conversion of an owned concrete value into the interface object `Self`.
///
/// Only implemented when `T` implements the interface trait, so registering a
/// type against an interface it does not implement is rejected at compile time.
pub trait Upcast<T>: Interface {
	/// Boxes `value` behind the interface.
	fn upcast(value: Box<T>) -> Box<Self>;
}

impl Interface for dyn Payload {
	fn as_payload(&self) -> &dyn Payload {
		self
	}

	fn as_payload_mut(&mut self) -> &mut dyn Payload {
		self
	}
}

impl<T: Payload> Upcast<T> for dyn Payload {
	fn upcast(value: Box<T>) -> Box<Self> {
		value
	}
}

/// Declares one or more traits as polymorphic interfaces.
///
/// Each trait must have [`Payload`] as a supertrait.
#[macro_export]
macro_rules! interface {
	($($name:ident),+ $(,)?) => {
		$(
			impl $crate::Interface for dyn $name {
				fn as_payload(&self) -> &dyn $crate::Payload {
					self
				}

				fn as_payload_mut(&mut self) -> &mut dyn $crate::Payload {
					self
				}
			}

			impl<T: $name> $crate::Upcast<T> for dyn $name {
				fn upcast(value: ::std::boxed::Box<T>) -> ::std::boxed::Box<Self> {
					value
				}
			}
		)+
	};
}
