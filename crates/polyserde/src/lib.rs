//! Discriminator-driven polymorphic decoding for JSON and MessagePack.
//!
//! A value declared only by its interface (`Box<dyn Trait>`) is decoded by
//! first reading a discriminator out of the payload, resolving it to a fresh
//! concrete instance, then decoding the whole payload into that instance.
//! Encoding writes the concrete value directly.
//!
//! * [`Registry`]: keyed store of discriminator value to factory.
//! * [`Decider`]: strategy turning a discriminator into an instance
//!   ([`RegistryDecider`], [`FieldDecider`], [`SelfDecider`], or your own).
//! * [`Decodable`]: the container implementing the decode protocol, usable
//!   standalone or as a field of derived types.
//! * [`Codec`]: the [`Json`] and [`MsgPack`] bindings.
//!
//! ```rust
//! use polyserde::{Payload, Registry, RegistryDecodable, interface};
//! use serde::{Deserialize, Serialize};
//!
//! trait Animal: Payload {
//! 	fn speak(&self) -> String;
//! }
//! interface!(Animal);
//!
//! #[derive(Default, Serialize, Deserialize)]
//! #[serde(rename_all = "PascalCase")]
//! struct Dog {
//! 	name: String,
//! }
//!
//! impl Animal for Dog {
//! 	fn speak(&self) -> String {
//! 		format!("{} says woof", self.name)
//! 	}
//! }
//!
//! #[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
//! struct Kind {
//! 	#[serde(rename = "Type")]
//! 	kind: String,
//! }
//!
//! let registry = Registry::new();
//! registry
//! 	.register_type::<Dog, dyn Animal, _>(Kind { kind: "dog".into() })
//! 	.unwrap();
//!
//! let payload = br#"{"Name":"Fido","Type":"dog"}"#;
//! let decoded = RegistryDecodable::<dyn Animal, Kind>::decode_with::<polyserde::Json>(&registry, payload).unwrap();
//! assert_eq!(decoded.get().unwrap().speak(), "Fido says woof");
//! ```

#![warn(missing_docs)]

pub mod codec;
pub mod decider;
pub mod decodable;
pub mod error;
mod overlay;
pub mod payload;
pub mod registry;

#[cfg(feature = "msgpack")]
pub use codec::MsgPack;
pub use codec::{Codec, Json};
pub use decider::{Decider, FieldDecider, RegistryDecider, SelfDecide, SelfDecider};
pub use decodable::{Decodable, FieldDecodable, RegistryDecodable, SelfDecodable};
pub use error::{BoxError, Error, Result};
pub use payload::{Interface, Payload, Upcast};
pub use registry::{Discriminator, Factory, FieldSelector, Registry, Slot, TypeTag};
