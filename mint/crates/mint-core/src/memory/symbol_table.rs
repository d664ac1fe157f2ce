//! Symbol tables.
//!
//! One table per call frame (unless the callee shares its caller's), one per
//! package. Locals resolve through the symbol map; compiler-known locals
//! additionally get a fast slot, a dense index that skips the map entirely.

use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::PackageId;
use crate::memory::reference::{InfoId, ReferenceFlags, WeakReference};
use crate::memory::class::ClassId;
use mint_util::Symbol;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

/// Insertion-ordered symbol map used throughout the metadata world.
pub type SymbolMapping<T> = indexmap::IndexMap<Symbol, T, BuildHasherDefault<FxHasher>>;

/// Locals of one frame, or the symbols of one package.
pub struct SymbolTable {
    /// Defining class when the frame is a method body; drives visibility
    /// checks.
    metadata: Option<ClassId>,

    /// `OPEN_PACKAGE` / `CLOSE_PACKAGE` nesting.
    packages: Vec<PackageId>,

    /// Fast-slot array, sized by the handle's fast-slot count.
    fasts: Vec<Option<WeakReference>>,

    symbols: SymbolMapping<WeakReference>,
}

impl SymbolTable {
    pub fn new(metadata: Option<ClassId>) -> Self {
        Self {
            metadata,
            packages: Vec::new(),
            fasts: Vec::new(),
            symbols: SymbolMapping::default(),
        }
    }

    #[inline]
    pub fn metadata(&self) -> Option<ClassId> {
        self.metadata
    }

    pub(crate) fn set_metadata(&mut self, metadata: Option<ClassId>) {
        self.metadata = metadata;
    }

    /// Innermost open package, if any.
    #[inline]
    pub fn package(&self) -> Option<PackageId> {
        self.packages.last().copied()
    }

    pub fn open_package(&mut self, package: PackageId) {
        self.packages.push(package);
    }

    pub fn close_package(&mut self) {
        debug_assert!(!self.packages.is_empty());
        self.packages.pop();
    }

    // ------------------------------------------------------------------
    // Fast slots

    pub fn reserve_fast(&mut self, count: usize) {
        self.fasts.resize_with(count.max(self.fasts.len()), || None);
    }

    /// Reference for a fast slot, creating the cell on first touch.
    ///
    /// The cell is also entered into the symbol map so reflective lookups
    /// observe it.
    pub fn get_fast(
        &mut self,
        gc: &mut GarbageCollector,
        symbol: Symbol,
        index: usize,
    ) -> WeakReference {
        if let Some(Some(reference)) = self.fasts.get(index) {
            return gc.share(reference);
        }
        self.create_fast(gc, ReferenceFlags::DEFAULT, symbol, index)
    }

    /// (Re)declare a fast slot with explicit flags.
    pub fn setup_fast(
        &mut self,
        gc: &mut GarbageCollector,
        symbol: Symbol,
        index: usize,
        flags: ReferenceFlags,
    ) -> WeakReference {
        self.create_fast(gc, flags, symbol, index)
    }

    fn create_fast(
        &mut self,
        gc: &mut GarbageCollector,
        flags: ReferenceFlags,
        symbol: Symbol,
        index: usize,
    ) -> WeakReference {
        if index >= self.fasts.len() {
            self.fasts.resize_with(index + 1, || None);
        }
        let none = gc.none();
        let reference = gc.new_reference(flags, none);
        let shared = gc.share(&reference);
        if let Some(previous) = self.fasts[index].replace(gc.share(&reference)) {
            gc.discard(previous);
        }
        if let Some(previous) = self.symbols.insert(symbol, reference) {
            gc.discard(previous);
        }
        shared
    }

    /// Drop a fast slot and its symbol entry.
    pub fn erase_fast(&mut self, gc: &mut GarbageCollector, symbol: Symbol, index: usize) {
        if let Some(slot) = self.fasts.get_mut(index) {
            if let Some(reference) = slot.take() {
                gc.discard(reference);
            }
        }
        if let Some(reference) = self.symbols.shift_remove(&symbol) {
            gc.discard(reference);
        }
    }

    // ------------------------------------------------------------------
    // Symbol map

    #[inline]
    pub fn contains(&self, symbol: Symbol) -> bool {
        self.symbols.contains_key(&symbol)
    }

    #[inline]
    pub fn get(&self, symbol: Symbol) -> Option<&WeakReference> {
        self.symbols.get(&symbol)
    }

    /// Insert a binding, returning the displaced one for disposal.
    #[must_use = "the displaced reference must be discarded"]
    pub fn insert(&mut self, symbol: Symbol, reference: WeakReference) -> Option<WeakReference> {
        self.symbols.insert(symbol, reference)
    }

    /// Remove a binding, returning it for disposal.
    #[must_use = "the removed reference must be discarded"]
    pub fn remove(&mut self, symbol: Symbol) -> Option<WeakReference> {
        self.symbols.shift_remove(&symbol)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symbol, &WeakReference)> {
        self.symbols.iter().map(|(symbol, reference)| (*symbol, reference))
    }

    /// Tear the table down, yielding every held reference for disposal.
    pub fn drain(&mut self) -> Vec<WeakReference> {
        let mut references: Vec<WeakReference> =
            self.symbols.drain(..).map(|(_, reference)| reference).collect();
        for slot in self.fasts.iter_mut() {
            if let Some(reference) = slot.take() {
                references.push(reference);
            }
        }
        references
    }

    /// Feed every held cell to the mark phase.
    pub fn visit_children(&self, visit: &mut dyn FnMut(InfoId)) {
        for reference in self.symbols.values() {
            visit(reference.info());
        }
        for slot in self.fasts.iter().flatten() {
            visit(slot.info());
        }
    }
}
