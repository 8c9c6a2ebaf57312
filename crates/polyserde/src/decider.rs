//! Strategies mapping a decoded discriminator to a fresh concrete instance.
//!
//! A [`Decider`] is chosen at the type level on the container and never
//! instantiated. Three strategies ship with the crate:
//!
//! * [`RegistryDecider`]: looks the discriminator value up in the [`Registry`].
//! * [`FieldDecider`]: reads the value out of a string-keyed map, then looks it
//!   up in the slot partitioned by the [`FieldSelector`].
//! * [`SelfDecider`]: lets the discriminator type decide on its own through
//!   [`SelfDecide`], bypassing the registry.
//!
//! Any other type implementing [`Decider`] plugs in the same way.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use tracing::trace;

use crate::error::{BoxError, Error, Result};
use crate::registry::{Discriminator, FieldSelector, Registry};

/// Resolves a discriminator input into a fresh instance of `I`.
pub trait Decider<I: ?Sized> {
	/// Shape decoded from the raw payload before deciding.
	type Input: DeserializeOwned;

	/// Produces the instance the full payload will be decoded into.
	fn decide(registry: &Registry, input: Self::Input) -> Result<Box<I>>;
}

/// Registry lookup keyed by a decoded value of `X`.
pub struct RegistryDecider<X>(PhantomData<fn() -> X>);

impl<I, X> Decider<I> for RegistryDecider<X>
where
	I: ?Sized + 'static,
	X: Discriminator + DeserializeOwned,
{
	type Input = X;

	fn decide(registry: &Registry, input: X) -> Result<Box<I>> {
		trace!(discriminator = ?input, "deciding through registry");
		registry.instantiate::<I, X>(&input)
	}
}

/// Registry lookup keyed by the map field named by `F`.
pub struct FieldDecider<F, X>(PhantomData<fn() -> (F, X)>);

impl<I, F, X> Decider<I> for FieldDecider<F, X>
where
	I: ?Sized + 'static,
	F: FieldSelector,
	X: Discriminator + DeserializeOwned,
{
	type Input = BTreeMap<String, X>;

	fn decide(registry: &Registry, mut input: BTreeMap<String, X>) -> Result<Box<I>> {
		let Some(value) = input.remove(F::FIELD) else {
			return Err(Error::DiscriminatorFieldMissing {
				field: F::FIELD,
				contents: format!("{input:?}"),
			});
		};
		trace!(field = F::FIELD, discriminator = ?value, "deciding through field");
		registry.instantiate_with_selector::<I, F, X>(&value)
	}
}

/// Capability of a payload shape that knows which concrete type it describes.
///
/// The error returned by [`decide`](Self::decide) reaches the caller as
/// [`Error::Decider`] without modification.
pub trait SelfDecide<I: ?Sized> {
	/// Returns a fresh instance to decode the full payload into.
	fn decide(self) -> std::result::Result<Box<I>, BoxError>;
}

/// Adapter that delegates to the input's own [`SelfDecide`] impl.
pub struct SelfDecider<X>(PhantomData<fn() -> X>);

impl<I, X> Decider<I> for SelfDecider<X>
where
	I: ?Sized,
	X: SelfDecide<I> + DeserializeOwned,
{
	type Input = X;

	fn decide(_registry: &Registry, input: X) -> Result<Box<I>> {
		trace!(shape = std::any::type_name::<X>(), "self-deciding");
		<X as SelfDecide<I>>::decide(input).map_err(Error::Decider)
	}
}
