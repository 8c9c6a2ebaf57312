use polyserde::{Error, Json, Payload, Registry, RegistryDecodable, interface};
use proptest::prelude::*;
use serde::{Deserialize, Serialize};

trait Record: Payload {}
interface!(Record);

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
	tag: u16,
	name: String,
	count: i64,
	flags: Vec<bool>,
}

impl Record for Entry {}

#[derive(Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
struct Tag {
	tag: u16,
}

type AnyRecord = RegistryDecodable<dyn Record, Tag>;

fn arb_entry() -> impl Strategy<Value = Entry> {
	(any::<u16>(), ".{0,16}", any::<i64>(), prop::collection::vec(any::<bool>(), 0..8)).prop_map(|(tag, name, count, flags)| Entry {
		tag,
		name,
		count,
		flags,
	})
}

proptest! {
	/// decode(encode(v)) == v for JSON.
	#[test]
	fn json_round_trip(entry in arb_entry()) {
		let registry = Registry::new();
		registry.register_type::<Entry, dyn Record, _>(Tag { tag: entry.tag }).unwrap();

		let bytes = AnyRecord::from_value(entry.clone()).to_json().unwrap();
		let decoded = AnyRecord::decode_with::<Json>(&registry, &bytes).unwrap();
		prop_assert_eq!(decoded.downcast_ref::<Entry>(), Some(&entry));
	}

	/// decode(encode(v)) == v for MessagePack.
	#[cfg(feature = "msgpack")]
	#[test]
	fn msgpack_round_trip(entry in arb_entry()) {
		let registry = Registry::new();
		registry.register_type::<Entry, dyn Record, _>(Tag { tag: entry.tag }).unwrap();

		let bytes = AnyRecord::from_value(entry.clone()).to_msgpack().unwrap();
		let decoded = AnyRecord::decode_with::<polyserde::MsgPack>(&registry, &bytes).unwrap();
		prop_assert_eq!(decoded.downcast_ref::<Entry>(), Some(&entry));
	}

	/// A second registration of the same value always fails, whatever its factory.
	#[test]
	fn second_registration_is_duplicate(values in prop::collection::hash_set(any::<u16>(), 1..32)) {
		let registry = Registry::new();
		for value in &values {
			registry.register_type::<Entry, dyn Record, _>(Tag { tag: *value }).unwrap();
		}
		for value in &values {
			let err = registry
				.register::<dyn Record, _>(Tag { tag: *value }, || Box::new(Entry { count: 1, ..Entry::default() }))
				.unwrap_err();
			let is_duplicate = matches!(err, Error::DuplicateKey { .. });
			prop_assert!(is_duplicate, "got: {:?}", err);
		}
		prop_assert_eq!(registry.len(), values.len());
	}
}
