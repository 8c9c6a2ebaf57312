//! Keyed factory store backing registry-based dispatch.
//!
//! Entries are keyed by a [`Slot`] (interface, discriminator type, optional
//! field selector) plus the full discriminator value. Registration happens
//! during initialization; lookups are expected to dominate afterwards, so the
//! store sits behind a single reader/writer lock and factories are cloned out
//! and invoked after the guard is released.
//!
//! ```rust
//! use polyserde::{Payload, Registry, interface};
//! use serde::{Deserialize, Serialize};
//!
//! trait Animal: Payload {
//! 	fn name(&self) -> &str;
//! }
//! interface!(Animal);
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Dog {
//! 	name: String,
//! }
//!
//! impl Animal for Dog {
//! 	fn name(&self) -> &str {
//! 		&self.name
//! 	}
//! }
//!
//! let registry = Registry::new();
//! registry.register_type::<Dog, dyn Animal, _>("dog".to_string()).unwrap();
//! let animal = registry.instantiate::<dyn Animal, _>(&"dog".to_string()).unwrap();
//! assert_eq!(animal.name(), "");
//! ```
//!
//! Eligibility of a concrete type is checked by the type system. A type that
//! does not implement the interface cannot be registered against it:
//!
//! ```rust,compile_fail
//! use polyserde::{Payload, Registry, interface};
//! use serde::{Deserialize, Serialize};
//!
//! trait Animal: Payload {}
//! interface!(Animal);
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Rock;
//!
//! Registry::new().register_type::<Rock, dyn Animal, _>(1u8).unwrap();
//! ```
//!
//! Naming a reference instead of the value type is rejected the same way:
//!
//! ```rust,compile_fail
//! use polyserde::{Payload, Registry, interface};
//! use serde::{Deserialize, Serialize};
//!
//! trait Animal: Payload {}
//! interface!(Animal);
//!
//! #[derive(Default, Serialize, Deserialize)]
//! struct Dog;
//! impl Animal for Dog {}
//!
//! Registry::new().register_type::<&'static Dog, dyn Animal, _>(1u8).unwrap();
//! ```
//!
//! And factories must hand out a fresh owned instance, not a plain value:
//!
//! ```rust,compile_fail
//! use polyserde::{Payload, Registry, interface};
//!
//! trait Animal: Payload {}
//! interface!(Animal);
//!
//! Registry::new().register::<dyn Animal, _>(1u8, || 42).unwrap();
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::payload::Upcast;

/// Producer of fresh, independently owned instances of `I`.
pub type Factory<I> = Arc<dyn Fn() -> Box<I> + Send + Sync>;

/// Requirements on discriminator values.
///
/// Two values address the same registration iff they compare equal.
pub trait Discriminator: Eq + Hash + fmt::Debug + Send + Sync + 'static {}

impl<T> Discriminator for T where T: Eq + Hash + fmt::Debug + Send + Sync + 'static {}

/// Names the map field holding the discriminator for field-based dispatch.
///
/// Selectors also partition the registry: the same value registered under two
/// selectors occupies two distinct entries.
pub trait FieldSelector: 'static {
	/// Field to read from the decoded map.
	const FIELD: &'static str;
}

/// Stable identifier of a type taking part in a registry key.
#[derive(Clone, Copy, Debug)]
pub struct TypeTag {
	id: TypeId,
	name: &'static str,
}

impl TypeTag {
	/// Returns the tag for `T`.
	pub fn of<T: ?Sized + 'static>() -> Self {
		Self {
			id: TypeId::of::<T>(),
			name: std::any::type_name::<T>(),
		}
	}

	/// Runtime identity of the type.
	pub fn id(&self) -> TypeId {
		self.id
	}

	/// Human-readable type name, for diagnostics only.
	pub fn name(&self) -> &'static str {
		self.name
	}
}

impl PartialEq for TypeTag {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.id.hash(state);
	}
}

impl fmt::Display for TypeTag {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name)
	}
}

/// Type part of a registry key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slot {
	interface: TypeTag,
	discriminator: TypeTag,
	selector: Option<TypeTag>,
}

impl Slot {
	/// Slot for interface `I` keyed by discriminator type `X`.
	pub fn new<I: ?Sized + 'static, X: 'static>() -> Self {
		Self {
			interface: TypeTag::of::<I>(),
			discriminator: TypeTag::of::<X>(),
			selector: None,
		}
	}

	/// Slot for interface `I` keyed by values of `X` read through selector `F`.
	pub fn with_selector<I: ?Sized + 'static, F: FieldSelector, X: 'static>() -> Self {
		Self {
			selector: Some(TypeTag::of::<F>()),
			..Self::new::<I, X>()
		}
	}

	/// Interface type.
	pub fn interface(&self) -> TypeTag {
		self.interface
	}

	/// Discriminator type.
	pub fn discriminator(&self) -> TypeTag {
		self.discriminator
	}

	/// Field selector type, if the slot belongs to field-based dispatch.
	pub fn selector(&self) -> Option<TypeTag> {
		self.selector
	}
}

impl fmt::Display for Slot {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.selector {
			Some(selector) => write!(f, "I: {}, F: {}, X: {}", self.interface, selector, self.discriminator),
			None => write!(f, "I: {}, X: {}", self.interface, self.discriminator),
		}
	}
}

/// Type-erased factory plus the name of its stored shape.
struct StoredFactory {
	factory: Arc<dyn Any + Send + Sync>,
	shape: &'static str,
}

impl StoredFactory {
	fn new<T: Any + Send + Sync>(factory: T) -> Self {
		Self {
			factory: Arc::new(factory),
			shape: std::any::type_name::<T>(),
		}
	}
}

type Table<X> = HashMap<X, StoredFactory>;

/// Per-slot table with its discriminator type erased.
trait ErasedTable: Any + Send + Sync {
	fn len(&self) -> usize;
}

impl<X: Discriminator> ErasedTable for Table<X> {
	fn len(&self) -> usize {
		HashMap::len(self)
	}
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Keyed store of discriminator value to factory mappings.
///
/// Thread-safe; registration takes the write lock, lookups the read lock.
#[derive(Default)]
pub struct Registry {
	slots: RwLock<HashMap<Slot, Box<dyn ErasedTable>>>,
}

impl Registry {
	/// Creates an empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Process-wide registry used by the convenience decode paths and by
	/// containers embedded in derived types.
	pub fn global() -> &'static Registry {
		&GLOBAL
	}

	/// Registers `factory` for interface `I` under discriminator `value`.
	///
	/// Fails with [`Error::DuplicateKey`] if the value is already registered
	/// for this interface and discriminator type; the existing entry is kept.
	pub fn register<I, X>(&self, value: X, factory: impl Fn() -> Box<I> + Send + Sync + 'static) -> Result<()>
	where
		I: ?Sized + 'static,
		X: Discriminator,
	{
		let factory: Factory<I> = Arc::new(factory);
		self.insert(Slot::new::<I, X>(), value, StoredFactory::new(factory))
	}

	/// Registers `factory` for field-based dispatch through selector `F`.
	pub fn register_with_selector<I, F, X>(&self, value: X, factory: impl Fn() -> Box<I> + Send + Sync + 'static) -> Result<()>
	where
		I: ?Sized + 'static,
		F: FieldSelector,
		X: Discriminator,
	{
		let factory: Factory<I> = Arc::new(factory);
		self.insert(Slot::with_selector::<I, F, X>(), value, StoredFactory::new(factory))
	}

	/// Registers concrete type `T` for interface `I` under `value`.
	///
	/// Each resolution allocates a fresh `T::default()` and hands it out
	/// behind the interface.
	pub fn register_type<T, I, X>(&self, value: X) -> Result<()>
	where
		T: Default + 'static,
		I: ?Sized + Upcast<T>,
		X: Discriminator,
	{
		trace!(concrete = std::any::type_name::<T>(), "registering concrete type");
		self.register::<I, X>(value, || I::upcast(Box::<T>::default()))
	}

	/// Registers concrete type `T` for field-based dispatch through selector `F`.
	pub fn register_type_with_selector<T, I, F, X>(&self, value: X) -> Result<()>
	where
		T: Default + 'static,
		I: ?Sized + Upcast<T>,
		F: FieldSelector,
		X: Discriminator,
	{
		trace!(concrete = std::any::type_name::<T>(), "registering concrete type");
		self.register_with_selector::<I, F, X>(value, || I::upcast(Box::<T>::default()))
	}

	/// Looks up the factory registered for `value`.
	pub fn factory<I, X>(&self, value: &X) -> Result<Factory<I>>
	where
		I: ?Sized + 'static,
		X: Discriminator,
	{
		self.resolve(Slot::new::<I, X>(), value)
	}

	/// Looks up the factory registered for `value` through selector `F`.
	pub fn factory_with_selector<I, F, X>(&self, value: &X) -> Result<Factory<I>>
	where
		I: ?Sized + 'static,
		F: FieldSelector,
		X: Discriminator,
	{
		self.resolve(Slot::with_selector::<I, F, X>(), value)
	}

	/// Produces a fresh instance for `value`.
	pub fn instantiate<I, X>(&self, value: &X) -> Result<Box<I>>
	where
		I: ?Sized + 'static,
		X: Discriminator,
	{
		let factory = self.factory::<I, X>(value)?;
		Ok(factory())
	}

	/// Produces a fresh instance for `value` through selector `F`.
	pub fn instantiate_with_selector<I, F, X>(&self, value: &X) -> Result<Box<I>>
	where
		I: ?Sized + 'static,
		F: FieldSelector,
		X: Discriminator,
	{
		let factory = self.factory_with_selector::<I, F, X>(value)?;
		Ok(factory())
	}

	/// Returns true if a factory is registered for `value`.
	pub fn contains<I, X>(&self, value: &X) -> bool
	where
		I: ?Sized + 'static,
		X: Discriminator,
	{
		let slots = self.slots.read();
		slots
			.get(&Slot::new::<I, X>())
			.and_then(|table| (&**table as &dyn Any).downcast_ref::<Table<X>>())
			.is_some_and(|table| table.contains_key(value))
	}

	/// Total number of registered discriminator values across all slots.
	pub fn len(&self) -> usize {
		self.slots.read().values().map(|table| table.len()).sum()
	}

	/// Returns true if nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Removes every registration.
	///
	/// Meant for test isolation and re-initialization; lookups racing with a
	/// reset may observe either state.
	pub fn reset(&self) {
		let mut slots = self.slots.write();
		debug!(slots = slots.len(), "resetting registry");
		slots.clear();
	}

	fn insert<X: Discriminator>(&self, slot: Slot, value: X, stored: StoredFactory) -> Result<()> {
		let mut slots = self.slots.write();
		let table = slots.entry(slot).or_insert_with(|| Box::new(Table::<X>::new()) as Box<dyn ErasedTable>);
		let Some(table) = (&mut **table as &mut dyn Any).downcast_mut::<Table<X>>() else {
			return Err(Error::RegistryCorruption {
				slot,
				found: "a table keyed by another discriminator type",
				value: format!("{value:?}"),
			});
		};

		match table.entry(value) {
			Entry::Occupied(occupied) => Err(Error::DuplicateKey {
				slot,
				value: format!("{:?}", occupied.key()),
			}),
			Entry::Vacant(vacant) => {
				debug!(%slot, value = ?vacant.key(), "registered factory");
				vacant.insert(stored);
				Ok(())
			}
		}
	}

	fn resolve<I: ?Sized + 'static, X: Discriminator>(&self, slot: Slot, value: &X) -> Result<Factory<I>> {
		let slots = self.slots.read();
		let not_found = || Error::NoFactoryFound {
			slot,
			value: format!("{value:?}"),
		};

		let Some(table) = slots.get(&slot) else {
			return Err(not_found());
		};
		let Some(table) = (&**table as &dyn Any).downcast_ref::<Table<X>>() else {
			return Err(Error::RegistryCorruption {
				slot,
				found: "a table keyed by another discriminator type",
				value: format!("{value:?}"),
			});
		};
		let Some(stored) = table.get(value) else {
			return Err(not_found());
		};

		trace!(%slot, ?value, "resolved factory");
		(*stored.factory)
			.downcast_ref::<Factory<I>>()
			.cloned()
			.ok_or_else(|| Error::RegistryCorruption {
				slot,
				found: stored.shape,
				value: format!("{value:?}"),
			})
	}

	/// Stores an arbitrary value where a factory is expected.
	#[cfg(test)]
	pub(crate) fn insert_raw<X: Discriminator, T: Any + Send + Sync>(&self, slot: Slot, value: X, raw: T) -> Result<()> {
		self.insert(slot, value, StoredFactory::new(raw))
	}
}

impl fmt::Debug for Registry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let slots = self.slots.read();
		f.debug_struct("Registry")
			.field("slots", &slots.keys().collect::<Vec<_>>())
			.field("len", &slots.values().map(|table| table.len()).sum::<usize>())
			.finish()
	}
}

#[cfg(test)]
mod tests;
