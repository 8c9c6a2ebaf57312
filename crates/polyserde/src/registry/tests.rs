use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};

use super::*;
use crate::{Interface, Payload};

trait Greeter: Payload {
	fn greet(&self) -> String;
}
crate::interface!(Greeter);

#[derive(Debug, Default, Serialize, Deserialize)]
struct English {
	name: String,
}

impl Greeter for English {
	fn greet(&self) -> String {
		format!("hello {}", self.name)
	}
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct French;

impl Greeter for French {
	fn greet(&self) -> String {
		"bonjour".to_string()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Lang {
	En,
	Fr,
}

struct KindField;

impl FieldSelector for KindField {
	const FIELD: &'static str = "kind";
}

struct TagField;

impl FieldSelector for TagField {
	const FIELD: &'static str = "tag";
}

#[test]
fn register_type_then_instantiate() {
	let registry = Registry::new();
	registry.register_type::<English, dyn Greeter, _>(Lang::En).expect("register");
	registry.register_type::<French, dyn Greeter, _>(Lang::Fr).expect("register");

	assert_eq!(registry.instantiate::<dyn Greeter, _>(&Lang::En).unwrap().greet(), "hello ");
	assert_eq!(registry.instantiate::<dyn Greeter, _>(&Lang::Fr).unwrap().greet(), "bonjour");
	assert_eq!(registry.len(), 2);
}

#[test]
fn factory_hands_out_fresh_instances() {
	let registry = Registry::new();
	registry
		.register::<dyn Greeter, _>(Lang::En, || Box::new(English { name: "seed".into() }))
		.expect("register");

	let mut first = registry.instantiate::<dyn Greeter, _>(&Lang::En).unwrap();
	first.as_payload_mut().downcast_mut::<English>().unwrap().name = "changed".into();
	let second = registry.instantiate::<dyn Greeter, _>(&Lang::En).unwrap();

	assert_eq!(second.greet(), "hello seed");
	assert_eq!(first.greet(), "hello changed");
}

#[test]
fn duplicate_registration_is_rejected_and_keeps_first() {
	let registry = Registry::new();
	registry.register_type::<English, dyn Greeter, _>(Lang::En).expect("first");

	let err = registry
		.register::<dyn Greeter, _>(Lang::En, || Box::new(French))
		.expect_err("duplicate");
	assert!(matches!(err, Error::DuplicateKey { ref value, .. } if value == "En"), "got: {err:?}");
	let msg = err.to_string();
	assert!(msg.starts_with("value En already registered for registry[I: dyn "), "got: {msg}");
	assert!(msg.contains("Greeter, X: "), "got: {msg}");
	assert!(msg.ends_with("Lang]"), "got: {msg}");

	assert!(registry.instantiate::<dyn Greeter, _>(&Lang::En).unwrap().as_payload().is::<English>());
	assert_eq!(registry.len(), 1);
}

#[test]
fn lookup_miss_names_slot_and_value() {
	let registry = Registry::new();
	registry.register_type::<English, dyn Greeter, _>(Lang::En).expect("register");

	let err = registry.factory::<dyn Greeter, _>(&Lang::Fr).err().expect("miss");
	let Error::NoFactoryFound { slot, value } = &err else {
		panic!("unexpected error: {err:?}");
	};
	assert_eq!(value, "Fr");
	assert_eq!(slot.interface(), TypeTag::of::<dyn Greeter>());
	assert_eq!(slot.discriminator(), TypeTag::of::<Lang>());
	assert_eq!(slot.selector(), None);
	assert!(err.to_string().ends_with("Lang] and X value Fr"), "got: {err}");
}

#[test]
fn discriminator_types_are_separate_slots() {
	let registry = Registry::new();
	registry.register_type::<English, dyn Greeter, _>(1u8).expect("u8");
	registry.register_type::<French, dyn Greeter, _>(1u16).expect("u16");

	assert!(registry.instantiate::<dyn Greeter, _>(&1u8).unwrap().as_payload().is::<English>());
	assert!(registry.instantiate::<dyn Greeter, _>(&1u16).unwrap().as_payload().is::<French>());
	assert!(registry.factory::<dyn Greeter, _>(&1u32).is_err());
}

#[test]
fn selectors_partition_the_value_space() {
	let registry = Registry::new();
	registry
		.register_type_with_selector::<English, dyn Greeter, KindField, _>("a".to_string())
		.expect("kind");
	registry
		.register_type_with_selector::<French, dyn Greeter, TagField, _>("a".to_string())
		.expect("tag");
	registry.register_type::<French, dyn Greeter, _>("a".to_string()).expect("plain");

	let kind = registry
		.instantiate_with_selector::<dyn Greeter, KindField, _>(&"a".to_string())
		.unwrap();
	let tag = registry
		.instantiate_with_selector::<dyn Greeter, TagField, _>(&"a".to_string())
		.unwrap();
	assert!(kind.as_payload().is::<English>());
	assert!(tag.as_payload().is::<French>());
	assert_eq!(registry.len(), 3);

	let err = registry
		.register_with_selector::<dyn Greeter, KindField, _>("a".to_string(), || Box::new(French))
		.expect_err("duplicate");
	let msg = err.to_string();
	assert!(msg.contains(", F: "), "got: {msg}");
	assert!(msg.contains("KindField, X: alloc::string::String]"), "got: {msg}");
}

#[test]
fn reset_clears_every_slot() {
	let registry = Registry::new();
	registry.register_type::<English, dyn Greeter, _>(Lang::En).expect("register");
	registry
		.register_type_with_selector::<English, dyn Greeter, KindField, _>(Lang::En)
		.expect("register");
	assert!(!registry.is_empty());

	registry.reset();

	assert!(registry.is_empty());
	assert!(!registry.contains::<dyn Greeter, _>(&Lang::En));
	registry.register_type::<English, dyn Greeter, _>(Lang::En).expect("re-register after reset");
}

#[test]
fn corrupted_entry_is_reported() {
	let registry = Registry::new();
	registry
		.insert_raw(Slot::new::<dyn Greeter, Lang>(), Lang::En, "invalid_registry_type")
		.expect("raw insert");

	let err = registry.factory::<dyn Greeter, _>(&Lang::En).err().expect("corrupt");
	assert!(matches!(err, Error::RegistryCorruption { found: "&str", .. }), "got: {err:?}");
	assert!(err.to_string().contains("but is: &str for X value En"), "got: {err}");
}

#[test]
fn corrupted_selector_entry_is_reported() {
	let registry = Registry::new();
	registry
		.insert_raw(Slot::with_selector::<dyn Greeter, KindField, Lang>(), Lang::En, 7u32)
		.expect("raw insert");

	let err = registry
		.factory_with_selector::<dyn Greeter, KindField, _>(&Lang::En)
		.err()
		.expect("corrupt");
	assert!(matches!(err, Error::RegistryCorruption { found: "u32", .. }), "got: {err:?}");
}

#[test]
fn concurrent_registration_on_disjoint_keys() {
	let registry = Arc::new(Registry::new());
	let handles: Vec<_> = (0..16u32)
		.map(|i| {
			let registry = Arc::clone(&registry);
			thread::spawn(move || registry.register_type::<English, dyn Greeter, _>(i))
		})
		.collect();

	for handle in handles {
		handle.join().expect("thread").expect("disjoint keys register");
	}
	assert_eq!(registry.len(), 16);
}

#[test]
fn concurrent_lookups_resolve_the_right_type() {
	let registry = Arc::new(Registry::new());
	registry.register_type::<English, dyn Greeter, _>(Lang::En).expect("en");
	registry.register_type::<French, dyn Greeter, _>(Lang::Fr).expect("fr");

	let handles: Vec<_> = (0..8)
		.map(|i| {
			let registry = Arc::clone(&registry);
			thread::spawn(move || {
				for _ in 0..200 {
					let lang = if i % 2 == 0 { Lang::En } else { Lang::Fr };
					let value = registry.instantiate::<dyn Greeter, _>(&lang).expect("lookup");
					match lang {
						Lang::En => assert!(value.as_payload().is::<English>()),
						Lang::Fr => assert!(value.as_payload().is::<French>()),
					}
				}
			})
		})
		.collect();

	for handle in handles {
		handle.join().expect("thread");
	}
}

#[test]
fn slot_display_includes_selector_only_when_present() {
	let plain = Slot::new::<dyn Greeter, Lang>().to_string();
	let selected = Slot::with_selector::<dyn Greeter, KindField, Lang>().to_string();

	assert!(plain.starts_with("I: dyn "));
	assert!(!plain.contains("F: "));
	assert!(selected.contains("KindField"));
	assert_ne!(Slot::new::<dyn Greeter, Lang>(), Slot::with_selector::<dyn Greeter, KindField, Lang>());
}
