//! Tagged data payloads.
//!
//! Every language value is a [`Data`] stored in a collector cell and
//! addressed by [`DataId`]. Built-in containers (string, regex, array, hash,
//! iterator, library, libobject) are objects whose class metatype selects
//! the [`Payload`] representation.

use crate::ast::module::HandleId;
use crate::memory::builtin::hash::HashPayload;
use crate::memory::builtin::iterator::IteratorPayload;
use crate::memory::builtin::lib_object::LibObjectPayload;
use crate::memory::builtin::regex::RegexPayload;
use crate::memory::class::ClassId;
use crate::memory::global_data::PackageId;
use crate::memory::reference::{InfoId, WeakReference};
use crate::memory::symbol_table::SymbolMapping;
use crate::system::plugin::Plugin;
use mint_util::define_index_type;
use std::collections::BTreeMap;
use std::sync::Arc;

define_index_type! {
    /// Index of a data cell in the collector's slab.
    pub struct DataId;
}

/// Value format tag.
///
/// The tag order is load-bearing: the hash builtin's cross-type total order
/// compares format tags first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Format {
    None,
    Null,
    Number,
    Boolean,
    Object,
    Package,
    Function,
}

impl Format {
    /// Human-readable name used in diagnostics and `typeof`.
    pub fn name(self) -> &'static str {
        match self {
            Format::None => "none",
            Format::Null => "null",
            Format::Number => "number",
            Format::Boolean => "boolean",
            Format::Object => "object",
            Format::Package => "package",
            Format::Function => "function",
        }
    }
}

/// A language value.
pub enum Data {
    None,
    Null,
    Number(f64),
    Boolean(bool),
    Object(Object),
    Package(PackageId),
    Function(Function),
}

impl Data {
    #[inline]
    pub fn format(&self) -> Format {
        match self {
            Data::None => Format::None,
            Data::Null => Format::Null,
            Data::Number(_) => Format::Number,
            Data::Boolean(_) => Format::Boolean,
            Data::Object(_) => Format::Object,
            Data::Package(_) => Format::Package,
            Data::Function(_) => Format::Function,
        }
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Data::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut Object> {
        match self {
            Data::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&Function> {
        match self {
            Data::Function(function) => Some(function),
            _ => None,
        }
    }

    pub fn as_function_mut(&mut self) -> Option<&mut Function> {
        match self {
            Data::Function(function) => Some(function),
            _ => None,
        }
    }

    /// Visit the info blocks this value holds alive.
    ///
    /// Drives both mark traversal and the release cascade when the value is
    /// freed.
    pub fn visit_children(&self, visit: &mut dyn FnMut(InfoId)) {
        match self {
            Data::Object(object) => object.visit_children(visit),
            Data::Function(function) => function.visit_children(visit),
            _ => {}
        }
    }
}

/// An object instance, or a class object when `slots` is `None`.
pub struct Object {
    /// Defining class. Immutable for the object's lifetime.
    pub class: ClassId,

    /// Per-instance member storage, indexed by slot offset.
    ///
    /// `None` marks the class object itself (the metaclass handle).
    pub slots: Option<Box<[WeakReference]>>,

    /// Built-in representation selected by the class metatype.
    pub payload: Payload,

    /// The class declares a `delete` operator; reclamation must dispatch a
    /// destructor process before the memory is released.
    ///
    /// Cached here so the collector never consults class metadata.
    pub finalize: bool,
}

impl Object {
    /// A class object: metaclass handle with no instance storage.
    pub fn class_object(class: ClassId) -> Self {
        Self {
            class,
            slots: None,
            payload: Payload::Plain,
            finalize: false,
        }
    }

    /// Whether this is the class object rather than an instance.
    #[inline]
    pub fn is_class(&self) -> bool {
        self.slots.is_none()
    }

    pub fn visit_children(&self, visit: &mut dyn FnMut(InfoId)) {
        if let Some(slots) = &self.slots {
            for slot in slots.iter() {
                visit(slot.info());
            }
        }
        self.payload.visit_children(visit);
    }
}

/// Built-in representation carried by an object.
pub enum Payload {
    /// User-defined object; state lives entirely in the slots.
    Plain,
    /// UTF-8 text. Indexing and iteration are code-point based.
    Str(String),
    /// Compiled pattern plus its original source text.
    Regex(RegexPayload),
    /// Growable element vector. Indices may be negative.
    Array(Vec<WeakReference>),
    /// Insertion-order-preserving key/value map.
    Hash(HashPayload),
    /// One of the three iteration backends.
    Iterator(IteratorPayload),
    /// Opaque plugin handle. Shared, never copied per-object.
    Library(Option<Arc<Plugin>>),
    /// Plugin-allocated raw data; the plugin owns it, the collector must not.
    LibObject(LibObjectPayload),
}

impl Payload {
    pub fn visit_children(&self, visit: &mut dyn FnMut(InfoId)) {
        match self {
            Payload::Array(elements) => {
                for element in elements {
                    visit(element.info());
                }
            }
            Payload::Hash(hash) => hash.visit_children(visit),
            Payload::Iterator(iterator) => iterator.visit_children(visit),
            _ => {}
        }
    }
}

/// Captured enclosing symbols seeded into a call frame.
pub type Capture = SymbolMapping<WeakReference>;

/// One resolved entry point of a function.
pub struct Signature {
    pub handle: HandleId,
    pub capture: Option<Capture>,
}

impl Signature {
    pub fn new(handle: HandleId) -> Self {
        Self {
            handle,
            capture: None,
        }
    }
}

/// A callable value: ordered map from signature to entry point.
///
/// Positive keys are exact arities; a negative key `~n` accepts any call
/// providing at least `n - 1` fixed arguments, with the tail materialized by
/// `LOAD_EXTRA_ARGUMENTS`.
pub struct Function {
    pub mapping: BTreeMap<i32, Signature>,
}

impl Function {
    pub fn new() -> Self {
        Self {
            mapping: BTreeMap::new(),
        }
    }

    /// Find the entry point compatible with a call of `signature` arguments.
    ///
    /// Exact arity wins; otherwise the variadic entry accepting the largest
    /// fixed prefix not exceeding `signature` is chosen.
    pub fn resolve(&self, signature: i32) -> Option<(i32, &Signature)> {
        if let Some(found) = self.mapping.get(&signature) {
            return Some((signature, found));
        }
        // Variadic keys are ~n (negative); ascending key order is descending
        // fixed-prefix order, so the first compatible entry is the most
        // specific one.
        self.mapping
            .range(..0)
            .map(|(key, entry)| (!*key, *key, entry))
            .find(|(fixed, _, _)| *fixed <= signature)
            .map(|(_, key, entry)| (key, entry))
    }

    pub fn visit_children(&self, visit: &mut dyn FnMut(InfoId)) {
        for signature in self.mapping.values() {
            if let Some(capture) = &signature.capture {
                for reference in capture.values() {
                    visit(reference.info());
                }
            }
        }
    }
}

impl Default for Function {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::module::{HandleId, ModuleId};

    fn handle(index: u32) -> HandleId {
        HandleId {
            module: ModuleId(0),
            index,
        }
    }

    #[test]
    fn format_tag_order_is_total() {
        assert!(Format::None < Format::Null);
        assert!(Format::Null < Format::Number);
        assert!(Format::Number < Format::Boolean);
        assert!(Format::Boolean < Format::Object);
        assert!(Format::Object < Format::Package);
        assert!(Format::Package < Format::Function);
    }

    #[test]
    fn resolve_prefers_exact_arity() {
        let mut function = Function::new();
        function.mapping.insert(2, Signature::new(handle(0)));
        function.mapping.insert(!1, Signature::new(handle(1)));

        let (key, signature) = function.resolve(2).unwrap();
        assert_eq!(key, 2);
        assert_eq!(signature.handle, handle(0));
    }

    #[test]
    fn resolve_falls_back_to_variadic() {
        let mut function = Function::new();
        function.mapping.insert(!2, Signature::new(handle(3)));

        // Two fixed arguments plus any tail.
        assert_eq!(function.resolve(2).unwrap().0, !2);
        assert_eq!(function.resolve(5).unwrap().0, !2);
        assert!(function.resolve(1).is_none());
    }

    #[test]
    fn resolve_picks_most_specific_variadic() {
        let mut function = Function::new();
        function.mapping.insert(!1, Signature::new(handle(1)));
        function.mapping.insert(!3, Signature::new(handle(2)));

        assert_eq!(function.resolve(4).unwrap().0, !3);
        assert_eq!(function.resolve(2).unwrap().0, !1);
    }
}
