//! The hash builtin.
//!
//! Insertion-order-preserving map. Key lookup hashes a canonical
//! representation derived from the key's format and content; key equality is
//! the language's `==` on that representation. Overwriting a present key
//! keeps its original position.
//!
//! Keys of kinds with no content equality (user objects, functions,
//! packages) compare by identity: the key representation captures the
//! allocation id, which is stable for the value's lifetime.

use crate::ast::cursor::Cursor;
use crate::ast::runtime::Runtime;
use crate::error::MintResult;
use crate::memory::class::Metatype;
use crate::memory::data::{Data, DataId, Object, Payload};
use crate::memory::function_tool::create_builtin_member;
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::GlobalData;
use crate::memory::reference::{InfoId, ReferenceFlags, WeakReference};
use indexmap::IndexMap;
use rustc_hash::FxHasher;
use std::cmp::Ordering;
use std::hash::BuildHasherDefault;

/// Canonical key representation: format tag plus content, with identity as
/// the fallback for reference kinds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum KeyRepr {
    None,
    Null,
    /// Normalized IEEE bits: -0.0 folds onto 0.0, NaN onto one canonical
    /// pattern.
    Number(u64),
    Boolean(bool),
    Str(Box<str>),
    /// Element-wise representation of an array key.
    Seq(Box<[KeyRepr]>),
    /// Identity of a value without content equality.
    Identity(DataId),
}

/// The hash payload.
pub struct HashPayload {
    entries: IndexMap<KeyRepr, (WeakReference, WeakReference), BuildHasherDefault<FxHasher>>,
}

impl HashPayload {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::default(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key/value pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&WeakReference, &WeakReference)> {
        self.entries.values().map(|(key, value)| (key, value))
    }

    /// Compute the canonical representation of a key value.
    pub fn key_repr(gc: &GarbageCollector, key: &WeakReference) -> KeyRepr {
        Self::data_repr(gc, gc.data_id(key))
    }

    fn data_repr(gc: &GarbageCollector, id: DataId) -> KeyRepr {
        match gc.data(id) {
            Data::None => KeyRepr::None,
            Data::Null => KeyRepr::Null,
            Data::Number(value) => KeyRepr::Number(normalize_number(*value)),
            Data::Boolean(value) => KeyRepr::Boolean(*value),
            Data::Object(object) => match &object.payload {
                Payload::Str(text) => KeyRepr::Str(text.clone().into_boxed_str()),
                Payload::Array(elements) => KeyRepr::Seq(
                    elements
                        .iter()
                        .map(|element| Self::data_repr(gc, gc.data_id(element)))
                        .collect(),
                ),
                _ => KeyRepr::Identity(id),
            },
            Data::Package(_) | Data::Function(_) => KeyRepr::Identity(id),
        }
    }

    /// Insert under a precomputed representation, returning the displaced
    /// pair for disposal. Present keys keep their position.
    #[must_use = "displaced references must be discarded"]
    pub fn insert_raw(
        &mut self,
        repr: KeyRepr,
        key: WeakReference,
        value: WeakReference,
    ) -> Option<(WeakReference, WeakReference)> {
        self.entries.insert(repr, (key, value))
    }

    pub fn get_raw(&self, repr: &KeyRepr) -> Option<&WeakReference> {
        self.entries.get(repr).map(|(_, value)| value)
    }

    pub fn contains_raw(&self, repr: &KeyRepr) -> bool {
        self.entries.contains_key(repr)
    }

    /// Remove an entry, preserving the order of the remainder.
    #[must_use = "removed references must be discarded"]
    pub fn remove_raw(&mut self, repr: &KeyRepr) -> Option<(WeakReference, WeakReference)> {
        self.entries.shift_remove(repr)
    }

    /// Tear down, yielding every held reference for disposal.
    pub fn drain(&mut self) -> Vec<WeakReference> {
        self.entries
            .drain(..)
            .flat_map(|(_, (key, value))| [key, value])
            .collect()
    }

    pub fn visit_children(&self, visit: &mut dyn FnMut(InfoId)) {
        for (key, value) in self.entries.values() {
            visit(key.info());
            visit(value.info());
        }
    }
}

impl Default for HashPayload {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize_number(value: f64) -> u64 {
    if value == 0.0 {
        return 0.0f64.to_bits();
    }
    if value.is_nan() {
        return f64::NAN.to_bits();
    }
    value.to_bits()
}

/// Total order across mixed-type values, for comparable hash keys.
///
/// Format tags order first; within a format, content compares (numeric,
/// lexicographic, element-wise); values without content order fall back to
/// allocation id, which is stable for their lifetime.
pub fn compare_to(gc: &GarbageCollector, lhs: &WeakReference, rhs: &WeakReference) -> Ordering {
    compare_data(gc, gc.data_id(lhs), gc.data_id(rhs))
}

fn compare_data(gc: &GarbageCollector, lhs: DataId, rhs: DataId) -> Ordering {
    let (left, right) = (gc.data(lhs), gc.data(rhs));
    let by_format = left.format().cmp(&right.format());
    if by_format != Ordering::Equal {
        return by_format;
    }
    match (left, right) {
        (Data::Number(a), Data::Number(b)) => a.partial_cmp(b).unwrap_or_else(|| {
            // NaN sorts after every ordered number.
            match (a.is_nan(), b.is_nan()) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => Ordering::Equal,
            }
        }),
        (Data::Boolean(a), Data::Boolean(b)) => a.cmp(b),
        (Data::Object(a), Data::Object(b)) => match (&a.payload, &b.payload) {
            (Payload::Str(x), Payload::Str(y)) => x.cmp(y),
            (Payload::Array(x), Payload::Array(y)) => {
                for (ex, ey) in x.iter().zip(y.iter()) {
                    let ordering = compare_data(gc, gc.data_id(ex), gc.data_id(ey));
                    if ordering != Ordering::Equal {
                        return ordering;
                    }
                }
                x.len().cmp(&y.len())
            }
            _ => lhs.cmp(&rhs),
        },
        _ => lhs.cmp(&rhs),
    }
}

/// Allocate an empty hash object.
pub fn create_hash(global: &GlobalData, gc: &mut GarbageCollector) -> WeakReference {
    let class = global.builtin_class(Metatype::Hash);
    let data = gc.alloc(Data::Object(Object {
        class,
        slots: Some(Box::new([])),
        payload: Payload::Hash(HashPayload::new()),
        finalize: false,
    }));
    gc.new_reference(ReferenceFlags::CONST_TEMPORARY, data)
}

/// Insert a key/value pair, taking ownership of both references.
pub fn hash_insert(
    gc: &mut GarbageCollector,
    hash: &WeakReference,
    key: WeakReference,
    value: WeakReference,
) -> MintResult<()> {
    let repr = HashPayload::key_repr(gc, &key);
    let inserted = match gc.data_of_mut(hash) {
        Data::Object(Object {
            payload: Payload::Hash(payload),
            ..
        }) => Ok(payload.insert_raw(repr, key, value)),
        other => Err((format!("expected hash, found {}", other.format().name()), key, value)),
    };
    match inserted {
        Ok(Some((stale_key, stale_value))) => {
            gc.discard(stale_key);
            gc.discard(stale_value);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err((message, key, value)) => {
            gc.discard(key);
            gc.discard(value);
            Err(crate::error::MintError::Internal(message))
        }
    }
}

/// Look up a key, sharing the stored value.
pub fn hash_get(
    gc: &mut GarbageCollector,
    hash: &WeakReference,
    key: &WeakReference,
) -> Option<WeakReference> {
    let repr = HashPayload::key_repr(gc, key);
    let info = match gc.data_of(hash) {
        Data::Object(Object {
            payload: Payload::Hash(payload),
            ..
        }) => payload.get_raw(&repr).map(|value| value.info()),
        _ => None,
    };
    info.map(|info| gc.share_raw(info))
}

/// Payload view of a hash reference.
pub fn payload_of<'a>(
    gc: &'a GarbageCollector,
    reference: &WeakReference,
) -> Option<&'a HashPayload> {
    match gc.data_of(reference) {
        Data::Object(Object {
            payload: Payload::Hash(payload),
            ..
        }) => Some(payload),
        _ => None,
    }
}

// ----------------------------------------------------------------------
// Builtin methods

pub(crate) fn register(runtime: &mut Runtime) {
    let class = runtime.global.builtin_class(Metatype::Hash);
    create_builtin_member(runtime, class, "size", 1, hash_size_method);
    create_builtin_member(runtime, class, "isEmpty", 1, hash_is_empty_method);
    create_builtin_member(runtime, class, "get", 2, hash_get_method);
    create_builtin_member(runtime, class, "insert", 3, hash_insert_method);
    create_builtin_member(runtime, class, "remove", 2, hash_remove_method);
    create_builtin_member(runtime, class, "contains", 2, hash_contains_method);
    create_builtin_member(runtime, class, "clear", 1, hash_clear_method);
}

fn hash_size_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("size() without receiver");
    let size = payload_of(&runtime.gc, &self_ref).map(|h| h.len()).unwrap_or(0);
    let result = runtime.gc.create(Data::Number(size as f64));
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn hash_is_empty_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("isEmpty() without receiver");
    let empty = payload_of(&runtime.gc, &self_ref)
        .map(|h| h.is_empty())
        .unwrap_or(true);
    let result = runtime.gc.create(Data::Boolean(empty));
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn hash_get_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let key = cursor.pop().expect("get() without key");
    let self_ref = cursor.pop().expect("get() without receiver");
    let result = hash_get(&mut runtime.gc, &self_ref, &key)
        .unwrap_or_else(|| runtime.gc.none_reference());
    cursor.push(result);
    runtime.gc.discard(key);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn hash_insert_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let value = cursor.pop().expect("insert() without value");
    let key = cursor.pop().expect("insert() without key");
    let self_ref = cursor.pop().expect("insert() without receiver");
    hash_insert(&mut runtime.gc, &self_ref, key, value)?;
    let result = runtime.gc.none_reference();
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn hash_remove_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let key = cursor.pop().expect("remove() without key");
    let self_ref = cursor.pop().expect("remove() without receiver");

    let repr = HashPayload::key_repr(&runtime.gc, &key);
    let removed = match runtime.gc.data_of_mut(&self_ref) {
        Data::Object(Object {
            payload: Payload::Hash(payload),
            ..
        }) => payload.remove_raw(&repr),
        _ => None,
    };
    let found = removed.is_some();
    if let Some((stale_key, stale_value)) = removed {
        runtime.gc.discard(stale_key);
        runtime.gc.discard(stale_value);
    }
    let result = runtime.gc.create(Data::Boolean(found));
    cursor.push(result);
    runtime.gc.discard(key);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn hash_contains_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let key = cursor.pop().expect("contains() without key");
    let self_ref = cursor.pop().expect("contains() without receiver");
    let repr = HashPayload::key_repr(&runtime.gc, &key);
    let contains = payload_of(&runtime.gc, &self_ref)
        .map(|h| h.contains_raw(&repr))
        .unwrap_or(false);
    let result = runtime.gc.create(Data::Boolean(contains));
    cursor.push(result);
    runtime.gc.discard(key);
    runtime.gc.discard(self_ref);
    Ok(())
}

fn hash_clear_method(runtime: &mut Runtime, cursor: &mut Cursor) -> MintResult<()> {
    let self_ref = cursor.pop().expect("clear() without receiver");
    let drained = match runtime.gc.data_of_mut(&self_ref) {
        Data::Object(Object {
            payload: Payload::Hash(payload),
            ..
        }) => payload.drain(),
        _ => Vec::new(),
    };
    for reference in drained {
        runtime.gc.discard(reference);
    }
    let result = runtime.gc.none_reference();
    cursor.push(result);
    runtime.gc.discard(self_ref);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string_key(gc: &mut GarbageCollector, global: &GlobalData, text: &str) -> WeakReference {
        crate::memory::builtin::string::create_string(global, gc, text)
    }

    #[test]
    fn insertion_order_is_preserved_across_overwrite() {
        let mut gc = GarbageCollector::new();
        let global = GlobalData::new();
        let hash = create_hash(&global, &mut gc);

        let a1 = string_key(&mut gc, &global, "a");
        let v1 = gc.create(Data::Number(1.0));
        hash_insert(&mut gc, &hash, a1, v1).unwrap();

        let b = string_key(&mut gc, &global, "b");
        let v2 = gc.create(Data::Number(2.0));
        hash_insert(&mut gc, &hash, b, v2).unwrap();

        // Overwrite "a": position must not move.
        let a2 = string_key(&mut gc, &global, "a");
        let v3 = gc.create(Data::Number(3.0));
        hash_insert(&mut gc, &hash, a2, v3).unwrap();

        let snapshot: Vec<(String, f64)> = payload_of(&gc, &hash)
            .unwrap()
            .entries()
            .map(|(key, value)| {
                let key = match gc.data_of(key) {
                    Data::Object(Object {
                        payload: Payload::Str(text),
                        ..
                    }) => text.clone(),
                    _ => panic!("string key expected"),
                };
                let value = match gc.data_of(value) {
                    Data::Number(n) => *n,
                    _ => panic!("number value expected"),
                };
                (key, value)
            })
            .collect();
        assert_eq!(snapshot, vec![("a".to_string(), 3.0), ("b".to_string(), 2.0)]);

        gc.discard(hash);
    }

    #[test]
    fn equal_keys_share_one_entry() {
        let mut gc = GarbageCollector::new();
        let global = GlobalData::new();

        let first = string_key(&mut gc, &global, "key");
        let second = string_key(&mut gc, &global, "key");
        assert_eq!(
            HashPayload::key_repr(&gc, &first),
            HashPayload::key_repr(&gc, &second)
        );
        gc.discard(first);
        gc.discard(second);
    }

    #[test]
    fn boolean_and_number_keys_stay_distinct() {
        let mut gc = GarbageCollector::new();
        let one = gc.create(Data::Number(1.0));
        let truth = gc.create(Data::Boolean(true));
        assert_ne!(
            HashPayload::key_repr(&gc, &one),
            HashPayload::key_repr(&gc, &truth)
        );
        gc.discard(one);
        gc.discard(truth);
    }

    #[test]
    fn negative_zero_folds_onto_zero() {
        let mut gc = GarbageCollector::new();
        let positive = gc.create(Data::Number(0.0));
        let negative = gc.create(Data::Number(-0.0));
        assert_eq!(
            HashPayload::key_repr(&gc, &positive),
            HashPayload::key_repr(&gc, &negative)
        );
        gc.discard(positive);
        gc.discard(negative);
    }

    #[test]
    fn compare_to_orders_across_formats() {
        let mut gc = GarbageCollector::new();
        let global = GlobalData::new();
        let number = gc.create(Data::Number(99.0));
        let none = gc.none_reference();
        let text = string_key(&mut gc, &global, "zzz");

        assert_eq!(compare_to(&gc, &none, &number), Ordering::Less);
        assert_eq!(compare_to(&gc, &number, &text), Ordering::Less);
        assert_eq!(compare_to(&gc, &text, &text), Ordering::Equal);

        gc.discard(number);
        gc.discard(none);
        gc.discard(text);
    }

    #[test]
    fn compare_to_orders_numbers_with_nan_last() {
        let mut gc = GarbageCollector::new();
        let small = gc.create(Data::Number(1.0));
        let large = gc.create(Data::Number(2.0));
        let nan = gc.create(Data::Number(f64::NAN));

        assert_eq!(compare_to(&gc, &small, &large), Ordering::Less);
        assert_eq!(compare_to(&gc, &nan, &large), Ordering::Greater);

        gc.discard(small);
        gc.discard(large);
        gc.discard(nan);
    }
}
