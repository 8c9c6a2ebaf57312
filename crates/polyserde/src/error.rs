//! Error taxonomy for registration and polymorphic decoding.
//!
//! Registration failures leave the registry untouched. Decode failures leave
//! the container empty (discriminate/resolve) or holding an untrusted instance
//! (populate); in both cases the container must be discarded.

use thiserror::Error;

use crate::registry::Slot;

/// Boxed error produced by a self-deciding payload.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by the registry, the deciders, and the codec bindings.
#[derive(Debug, Error)]
pub enum Error {
	/// A factory is already registered for this slot and discriminator value.
	#[error("value {value} already registered for registry[{slot}]")]
	DuplicateKey {
		/// Registry slot the value was registered against.
		slot: Slot,
		/// `Debug` rendering of the discriminator value.
		value: String,
	},

	/// No factory is registered for the resolved discriminator value.
	#[error("no factory found in registry[{slot}] and X value {value}")]
	NoFactoryFound {
		/// Registry slot that was searched.
		slot: Slot,
		/// `Debug` rendering of the discriminator value.
		value: String,
	},

	/// A stored entry is not a factory for the slot's interface.
	#[error("registry[{slot}] entry should be a factory of {} but is: {found} for X value {value}", .slot.interface())]
	RegistryCorruption {
		/// Registry slot holding the entry.
		slot: Slot,
		/// Description of the stored shape.
		found: &'static str,
		/// `Debug` rendering of the discriminator value.
		value: String,
	},

	/// The field-based decider could not find its field in the decoded map.
	#[error("discriminator field {field} not found in map {contents}")]
	DiscriminatorFieldMissing {
		/// Field name named by the selector.
		field: &'static str,
		/// `Debug` rendering of the decoded map.
		contents: String,
	},

	/// A self-deciding payload refused to produce an instance.
	#[error("{0}")]
	Decider(BoxError),

	/// Textual codec failure, passed through unchanged.
	#[error(transparent)]
	Json(#[from] serde_json::Error),

	/// Binary codec failure while encoding, passed through unchanged.
	#[cfg(feature = "msgpack")]
	#[error(transparent)]
	MsgPackEncode(#[from] rmp_serde::encode::Error),

	/// Binary codec failure while decoding, passed through unchanged.
	#[cfg(feature = "msgpack")]
	#[error(transparent)]
	MsgPackDecode(#[from] rmp_serde::decode::Error),
}

impl Error {
	/// Returns the error produced by a self-deciding payload, if any.
	pub fn decider_error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
		match self {
			Self::Decider(err) => Some(err.as_ref()),
			_ => None,
		}
	}

	/// Returns true for failures raised by the codec rather than by dispatch.
	pub fn is_codec(&self) -> bool {
		match self {
			Self::Json(_) => true,
			#[cfg(feature = "msgpack")]
			Self::MsgPackEncode(_) | Self::MsgPackDecode(_) => true,
			_ => false,
		}
	}
}

/// Result type for registry and decode operations.
pub type Result<T> = std::result::Result<T, Error>;
