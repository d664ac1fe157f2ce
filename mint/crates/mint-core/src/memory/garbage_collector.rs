//! Garbage Collector - hybrid reference counting + mark-sweep.
//!
//! The collector owns two slabs:
//!
//! - the *data slab*: every live [`Data`] allocation, with per-cell
//!   `{reachable, collected, refcount}` bookkeeping;
//! - the *info slab*: the reference cells `{flags, data, refcount}` that
//!   every language-level binding designates.
//!
//! Reference counting is the primary reclaimer: a data cell whose count
//! drops to zero is freed before the next instruction dispatch. The
//! mark-sweep pass only exists to reclaim reference cycles; it runs
//! stop-the-world between instructions, under the processor lock, marking
//! from the registered roots plus whatever the runtime feeds in (package
//! tree, module constants, every process cursor).
//!
//! Freed cells go on free lists and are reused by later allocations, which
//! is the slab rendition of the original design's per-type pools.
//!
//! # The `collected` bit
//!
//! When a cycle is swept, cells inside the cycle reference each other. The
//! first cell freed marks itself `collected`; the release cascade reaching
//! it again through a sibling's children sees the bit and skips the cell,
//! preventing a double free.

use crate::error::{MintError, MintResult};
use crate::memory::builtin::hash::HashPayload;
use crate::memory::builtin::iterator::IteratorPayload;
use crate::memory::data::{Data, DataId, Format, Function, Object, Payload, Signature};
use crate::memory::reference::{
    InfoId, ReferenceFlags, RootId, StrongReference, WeakReference,
};
use log::{debug, trace};
use mint_util::IndexVec;
use rustc_hash::FxHashMap;
use std::mem;

/// One slot of the data slab.
struct DataCell {
    data: Data,
    reachable: bool,
    collected: bool,
    /// Queued for a destructor process; kept alive until [`GarbageCollector::destroy`].
    finalized: bool,
    refcount: usize,
    occupied: bool,
}

/// One slot of the info slab: a reference cell.
struct InfoCell {
    flags: ReferenceFlags,
    data: DataId,
    refcount: usize,
    occupied: bool,
}

/// The process-wide collector. One per [`crate::Runtime`].
pub struct GarbageCollector {
    cells: IndexVec<DataId, DataCell>,
    free_cells: Vec<DataId>,
    infos: IndexVec<InfoId, InfoCell>,
    free_infos: Vec<InfoId>,

    /// Strong-reference root registry.
    roots: IndexVec<RootId, Option<InfoId>>,
    free_roots: Vec<RootId>,

    none_data: DataId,
    null_data: DataId,

    /// Objects awaiting a destructor process before release.
    pending_destructors: Vec<DataId>,

    /// Release cascade worklist; iterative so deep structures cannot blow
    /// the native stack.
    free_queue: Vec<DataId>,
    /// Mark-phase worklist.
    mark_queue: Vec<DataId>,

    live_cells: usize,
}

impl GarbageCollector {
    pub fn new() -> Self {
        let mut collector = Self {
            cells: IndexVec::new(),
            free_cells: Vec::new(),
            infos: IndexVec::new(),
            free_infos: Vec::new(),
            roots: IndexVec::new(),
            free_roots: Vec::new(),
            none_data: DataId(0),
            null_data: DataId(0),
            pending_destructors: Vec::new(),
            free_queue: Vec::new(),
            mark_queue: Vec::new(),
            live_cells: 0,
        };
        // The singletons carry a pinned count so no release path can ever
        // free them.
        collector.none_data = collector.alloc(Data::None);
        collector.cells[collector.none_data].refcount = 1;
        collector.null_data = collector.alloc(Data::Null);
        collector.cells[collector.null_data].refcount = 1;
        collector
    }

    // ------------------------------------------------------------------
    // Data cells

    /// The shared None singleton.
    #[inline]
    pub fn none(&self) -> DataId {
        self.none_data
    }

    /// The shared Null singleton.
    #[inline]
    pub fn null(&self) -> DataId {
        self.null_data
    }

    /// Allocate a data cell with refcount zero.
    ///
    /// The caller is expected to wrap the id into a reference before the
    /// next suspension point; until then the cell is only kept alive by not
    /// being released.
    pub fn alloc(&mut self, data: Data) -> DataId {
        self.live_cells += 1;
        match self.free_cells.pop() {
            Some(id) => {
                let cell = &mut self.cells[id];
                cell.data = data;
                cell.reachable = true;
                cell.collected = false;
                cell.finalized = false;
                cell.refcount = 0;
                cell.occupied = true;
                id
            }
            None => self.cells.push(DataCell {
                data,
                reachable: true,
                collected: false,
                finalized: false,
                refcount: 0,
                occupied: true,
            }),
        }
    }

    #[inline]
    pub fn data(&self, id: DataId) -> &Data {
        debug_assert!(self.cells[id].occupied, "access to freed data cell");
        &self.cells[id].data
    }

    #[inline]
    pub fn data_mut(&mut self, id: DataId) -> &mut Data {
        debug_assert!(self.cells[id].occupied, "access to freed data cell");
        &mut self.cells[id].data
    }

    #[inline]
    pub fn format(&self, id: DataId) -> Format {
        self.data(id).format()
    }

    /// Whether the cell is currently allocated.
    #[inline]
    pub fn is_live(&self, id: DataId) -> bool {
        let cell = &self.cells[id];
        cell.occupied && !cell.collected
    }

    /// Number of live data cells, singletons included.
    #[inline]
    pub fn live_cells(&self) -> usize {
        self.live_cells
    }

    #[inline]
    pub fn refcount(&self, id: DataId) -> usize {
        self.cells[id].refcount
    }

    pub(crate) fn use_data(&mut self, id: DataId) {
        debug_assert!(self.is_live(id), "use of freed data cell");
        self.cells[id].refcount += 1;
    }

    pub(crate) fn release_data(&mut self, id: DataId) {
        let cell = &mut self.cells[id];
        if cell.collected {
            // Mid-sweep sibling; the sweep owns this cell.
            return;
        }
        debug_assert!(cell.refcount > 0, "release of unreferenced data cell");
        cell.refcount -= 1;
        if cell.refcount == 0 {
            self.reclaim(id);
            self.drain_free_queue();
        }
    }

    /// Route a dead cell either to the destructor queue or the free queue.
    fn reclaim(&mut self, id: DataId) {
        if self.needs_finalizer(id) {
            self.cells[id].finalized = true;
            self.pending_destructors.push(id);
            trace!("data {:?} queued for destructor", id);
        } else {
            self.cells[id].collected = true;
            self.free_queue.push(id);
        }
    }

    fn needs_finalizer(&self, id: DataId) -> bool {
        let cell = &self.cells[id];
        if cell.finalized {
            return false;
        }
        matches!(&cell.data, Data::Object(object) if object.finalize && !object.is_class())
    }

    fn drain_free_queue(&mut self) {
        while let Some(id) = self.free_queue.pop() {
            let data = mem::replace(&mut self.cells[id].data, Data::None);
            let mut children = Vec::new();
            data.visit_children(&mut |info| children.push(info));
            drop(data);

            self.cells[id].occupied = false;
            self.free_cells.push(id);
            self.live_cells -= 1;

            for info in children {
                self.release_info(info);
            }
        }
    }

    // ------------------------------------------------------------------
    // Info cells / references

    fn alloc_info(&mut self, flags: ReferenceFlags, data: DataId) -> InfoId {
        match self.free_infos.pop() {
            Some(id) => {
                let info = &mut self.infos[id];
                info.flags = flags;
                info.data = data;
                info.refcount = 1;
                info.occupied = true;
                id
            }
            None => self.infos.push(InfoCell {
                flags,
                data,
                refcount: 1,
                occupied: true,
            }),
        }
    }

    fn release_info(&mut self, id: InfoId) {
        let info = &mut self.infos[id];
        debug_assert!(info.occupied, "release of freed info cell");
        debug_assert!(info.refcount > 0);
        info.refcount -= 1;
        if info.refcount == 0 {
            info.occupied = false;
            let data = info.data;
            self.free_infos.push(id);
            self.release_data(data);
        }
    }

    /// New reference cell designating `data`.
    pub fn new_reference(&mut self, flags: ReferenceFlags, data: DataId) -> WeakReference {
        self.use_data(data);
        WeakReference::from_raw(self.alloc_info(flags, data))
    }

    /// Allocate a value and wrap it as a fresh temporary.
    pub fn create(&mut self, data: Data) -> WeakReference {
        let id = self.alloc(data);
        self.new_reference(ReferenceFlags::CONST_TEMPORARY, id)
    }

    /// A DEFAULT-flagged reference to the None singleton.
    pub fn none_reference(&mut self) -> WeakReference {
        let none = self.none_data;
        self.new_reference(ReferenceFlags::DEFAULT, none)
    }

    /// Alias an existing info block; flag mutations stay shared.
    pub fn share(&mut self, reference: &WeakReference) -> WeakReference {
        self.share_raw(reference.info())
    }

    pub(crate) fn share_raw(&mut self, info: InfoId) -> WeakReference {
        let cell = &mut self.infos[info];
        debug_assert!(cell.occupied, "share of freed info cell");
        cell.refcount += 1;
        WeakReference::from_raw(info)
    }

    /// New info block with the same flags sharing the same datum.
    pub fn copy(&mut self, reference: &WeakReference) -> WeakReference {
        let info = &self.infos[reference.info()];
        let (flags, data) = (info.flags, info.data);
        self.new_reference(flags, data)
    }

    /// New info block with the same flags and a deep-copied datum.
    pub fn clone_reference(&mut self, reference: &WeakReference) -> WeakReference {
        let info = &self.infos[reference.info()];
        let (flags, data) = (info.flags, info.data);
        let copied = self.deep_copy(data);
        self.new_reference(flags, copied)
    }

    /// Dispose of a reference, releasing its share of the info block.
    pub fn discard(&mut self, reference: WeakReference) {
        self.release_info(reference.info());
    }

    #[inline]
    pub fn flags(&self, reference: &WeakReference) -> ReferenceFlags {
        self.infos[reference.info()].flags
    }

    pub fn set_flags(&mut self, reference: &WeakReference, flags: ReferenceFlags) {
        self.infos[reference.info()].flags = flags;
    }

    #[inline]
    pub fn data_id(&self, reference: &WeakReference) -> DataId {
        self.infos[reference.info()].data
    }

    #[inline]
    pub fn data_of(&self, reference: &WeakReference) -> &Data {
        self.data(self.data_id(reference))
    }

    #[inline]
    pub fn data_of_mut(&mut self, reference: &WeakReference) -> &mut Data {
        let id = self.data_id(reference);
        self.data_mut(id)
    }

    #[inline]
    pub fn format_of(&self, reference: &WeakReference) -> Format {
        self.format(self.data_id(reference))
    }

    // ------------------------------------------------------------------
    // Reference data operations

    /// Replace the cell's datum with a deep clone of `source`.
    ///
    /// Fails with INVALID_MODIFICATION on a CONST_VALUE reference.
    pub fn copy_data(&mut self, destination: &WeakReference, source: DataId) -> MintResult<()> {
        if self
            .flags(destination)
            .contains(ReferenceFlags::CONST_VALUE)
        {
            return Err(MintError::InvalidModification);
        }
        let copied = self.deep_copy(source);
        self.rebind(destination, copied);
        Ok(())
    }

    /// Rebind the cell's datum pointer to `source`.
    ///
    /// Constness is the caller's contract: the move operator validates
    /// flags before reaching for this primitive.
    pub fn move_data(&mut self, destination: &WeakReference, source: DataId) {
        self.rebind(destination, source);
    }

    fn rebind(&mut self, destination: &WeakReference, data: DataId) {
        self.use_data(data);
        let info = &mut self.infos[destination.info()];
        let previous = mem::replace(&mut info.data, data);
        self.release_data(previous);
    }

    // ------------------------------------------------------------------
    // Deep copy

    /// Type-specific deep copy of a value graph.
    ///
    /// Sharing and cycles inside the source graph are preserved through a
    /// translation map. Singletons copy to themselves. Function captures are
    /// shared, not duplicated: a copied closure observes the same enclosing
    /// cells.
    pub fn deep_copy(&mut self, source: DataId) -> DataId {
        let mut translated = FxHashMap::default();
        self.deep_copy_inner(source, &mut translated)
    }

    fn deep_copy_inner(
        &mut self,
        source: DataId,
        translated: &mut FxHashMap<DataId, DataId>,
    ) -> DataId {
        if source == self.none_data || source == self.null_data {
            return source;
        }
        if let Some(&copied) = translated.get(&source) {
            return copied;
        }

        match &self.cells[source].data {
            Data::None => self.none_data,
            Data::Null => self.null_data,
            Data::Number(value) => {
                let value = *value;
                let copied = self.alloc(Data::Number(value));
                translated.insert(source, copied);
                copied
            }
            Data::Boolean(value) => {
                let value = *value;
                let copied = self.alloc(Data::Boolean(value));
                translated.insert(source, copied);
                copied
            }
            Data::Package(package) => {
                let package = *package;
                let copied = self.alloc(Data::Package(package));
                translated.insert(source, copied);
                copied
            }
            Data::Function(function) => {
                let entries: Vec<(i32, _, Option<Vec<(mint_util::Symbol, InfoId)>>)> = function
                    .mapping
                    .iter()
                    .map(|(signature, entry)| {
                        let capture = entry.capture.as_ref().map(|capture| {
                            capture
                                .iter()
                                .map(|(symbol, reference)| (*symbol, reference.info()))
                                .collect()
                        });
                        (*signature, entry.handle, capture)
                    })
                    .collect();

                let mut copied = Function::new();
                for (signature, handle, capture) in entries {
                    let mut entry = Signature::new(handle);
                    if let Some(capture) = capture {
                        let mut map = crate::memory::symbol_table::SymbolMapping::default();
                        for (symbol, info) in capture {
                            map.insert(symbol, self.share_raw(info));
                        }
                        entry.capture = Some(map);
                    }
                    copied.mapping.insert(signature, entry);
                }
                let id = self.alloc(Data::Function(copied));
                translated.insert(source, id);
                id
            }
            Data::Object(object) => {
                let class = object.class;
                let finalize = object.finalize;
                let slot_infos: Option<Vec<InfoId>> = object
                    .slots
                    .as_ref()
                    .map(|slots| slots.iter().map(|slot| slot.info()).collect());

                // Placeholder first so cycles through this object resolve.
                let copied = self.alloc(Data::Object(Object::class_object(class)));
                translated.insert(source, copied);

                let slots = slot_infos.map(|infos| {
                    infos
                        .into_iter()
                        .map(|info| self.deep_copy_cell(info, translated))
                        .collect::<Vec<_>>()
                        .into_boxed_slice()
                });
                let payload = self.deep_copy_payload(source, translated);

                if let Data::Object(object) = &mut self.cells[copied].data {
                    object.slots = slots;
                    object.payload = payload;
                    object.finalize = finalize;
                }
                copied
            }
        }
    }

    /// Copy a reference cell: same flags, deep-copied datum.
    fn deep_copy_cell(
        &mut self,
        info: InfoId,
        translated: &mut FxHashMap<DataId, DataId>,
    ) -> WeakReference {
        let cell = &self.infos[info];
        let (flags, data) = (cell.flags, cell.data);
        let copied = self.deep_copy_inner(data, translated);
        self.new_reference(flags, copied)
    }

    fn deep_copy_payload(
        &mut self,
        source: DataId,
        translated: &mut FxHashMap<DataId, DataId>,
    ) -> Payload {
        enum Plan {
            Plain,
            Str(String),
            Regex(crate::memory::builtin::regex::RegexPayload),
            Array(Vec<InfoId>),
            Hash(Vec<(InfoId, InfoId)>),
            IteratorItems(Vec<InfoId>),
            IteratorRange(f64, f64, bool),
            Library(Option<std::sync::Arc<crate::system::plugin::Plugin>>),
            LibObject(crate::memory::builtin::lib_object::LibObjectPayload),
        }

        let plan = match &self.cells[source].data {
            Data::Object(object) => match &object.payload {
                Payload::Plain => Plan::Plain,
                Payload::Str(text) => Plan::Str(text.clone()),
                Payload::Regex(regex) => Plan::Regex(regex.clone()),
                Payload::Array(elements) => {
                    Plan::Array(elements.iter().map(|element| element.info()).collect())
                }
                Payload::Hash(hash) => Plan::Hash(
                    hash.entries()
                        .map(|(key, value)| (key.info(), value.info()))
                        .collect(),
                ),
                Payload::Iterator(iterator) => match iterator {
                    IteratorPayload::Items(items) => {
                        Plan::IteratorItems(items.iter().map(|item| item.info()).collect())
                    }
                    IteratorPayload::Range(range) => {
                        Plan::IteratorRange(range.begin, range.end, range.ascending)
                    }
                    // A copied generator keeps only what it already
                    // materialized; the saved state stays with the original.
                    IteratorPayload::Generator(generator) => Plan::IteratorItems(
                        generator.items.iter().map(|item| item.info()).collect(),
                    ),
                },
                Payload::Library(plugin) => Plan::Library(plugin.clone()),
                Payload::LibObject(payload) => Plan::LibObject(*payload),
            },
            _ => Plan::Plain,
        };

        match plan {
            Plan::Plain => Payload::Plain,
            Plan::Str(text) => Payload::Str(text),
            Plan::Regex(regex) => Payload::Regex(regex),
            Plan::Array(elements) => Payload::Array(
                elements
                    .into_iter()
                    .map(|info| self.deep_copy_cell(info, translated))
                    .collect(),
            ),
            Plan::Hash(entries) => {
                let mut hash = HashPayload::new();
                for (key, value) in entries {
                    let key = self.deep_copy_cell(key, translated);
                    let value = self.deep_copy_cell(value, translated);
                    let repr = HashPayload::key_repr(self, &key);
                    if let Some((stale_key, stale_value)) = hash.insert_raw(repr, key, value) {
                        self.discard(stale_key);
                        self.discard(stale_value);
                    }
                }
                Payload::Hash(hash)
            }
            Plan::IteratorItems(items) => Payload::Iterator(IteratorPayload::items(
                items
                    .into_iter()
                    .map(|info| self.deep_copy_cell(info, translated))
                    .collect(),
            )),
            Plan::IteratorRange(begin, end, ascending) => {
                Payload::Iterator(IteratorPayload::range_raw(begin, end, ascending))
            }
            Plan::Library(plugin) => Payload::Library(plugin),
            Plan::LibObject(payload) => Payload::LibObject(payload),
        }
    }

    // ------------------------------------------------------------------
    // Roots

    /// Promote a reference to a collection root.
    pub fn create_root(&mut self, reference: WeakReference) -> StrongReference {
        let info = reference.info();
        let root = match self.free_roots.pop() {
            Some(root) => {
                self.roots[root] = Some(info);
                root
            }
            None => self.roots.push(Some(info)),
        };
        StrongReference { reference, root }
    }

    /// Drop a root registration and its reference.
    pub fn release_root(&mut self, strong: StrongReference) {
        self.roots[strong.root] = None;
        self.free_roots.push(strong.root);
        self.discard(strong.reference);
    }

    /// Re-point a root at its reference's current info block.
    ///
    /// Needed after the strong reference is rebound through `move_data`
    /// paths that swap info blocks; cheap to call unconditionally.
    pub fn refresh_root(&mut self, strong: &StrongReference) {
        self.roots[strong.root] = Some(strong.reference.info());
    }

    // ------------------------------------------------------------------
    // Destructors

    /// Drain the queue of objects waiting for their `delete` operator.
    pub fn take_pending_destructors(&mut self) -> Vec<DataId> {
        mem::take(&mut self.pending_destructors)
    }

    /// Final release of a destructor-pending object.
    ///
    /// Called after the destructor process completed (or was skipped at
    /// shutdown). Frees immediately if nothing else resurrected the object.
    pub fn destroy(&mut self, id: DataId) {
        let cell = &mut self.cells[id];
        debug_assert!(cell.finalized, "destroy of non-finalized data cell");
        if cell.occupied && !cell.collected && cell.refcount == 0 {
            cell.collected = true;
            self.free_queue.push(id);
            self.drain_free_queue();
        }
    }

    // ------------------------------------------------------------------
    // Mark-sweep

    /// Whether the live-cell population warrants a cycle collection.
    #[inline]
    pub fn should_collect(&self, threshold: usize) -> bool {
        self.live_cells >= threshold
    }

    /// Phase 1: clear every reachable bit, then mark the singletons and the
    /// registered roots.
    pub fn begin_collect(&mut self) {
        for cell in self.cells.iter_mut() {
            cell.reachable = false;
        }
        self.mark_data(self.none_data);
        self.mark_data(self.null_data);
        // Destructor-pending objects stay alive until their process ran.
        let pending: Vec<DataId> = self.pending_destructors.clone();
        for data in pending {
            self.mark_data(data);
        }
        let root_infos: Vec<InfoId> = self.roots.iter().flatten().copied().collect();
        for info in root_infos {
            self.mark_info(info);
        }
    }

    /// Mark the datum behind a reference cell.
    #[inline]
    pub fn mark_info(&mut self, info: InfoId) {
        let data = self.infos[info].data;
        self.mark_data(data);
    }

    /// Mark a datum and queue its children.
    pub fn mark_data(&mut self, id: DataId) {
        let cell = &mut self.cells[id];
        if cell.occupied && !cell.reachable {
            cell.reachable = true;
            self.mark_queue.push(id);
        }
    }

    /// Phase 2 + 3: propagate marks, then sweep unreachable cells.
    ///
    /// Returns the number of cells reclaimed.
    pub fn end_collect(&mut self) -> usize {
        self.propagate();

        // Unreachable objects that need a destructor are resurrected along
        // with everything they reference; the destructor process frees them
        // through `destroy` afterwards.
        let doomed_finalizable: Vec<DataId> = self
            .cells
            .iter_enumerated()
            .filter(|(_, cell)| cell.occupied && !cell.reachable && !cell.collected)
            .filter(|(id, _)| self.needs_finalizer(*id))
            .map(|(id, _)| id)
            .collect();
        for id in doomed_finalizable {
            self.cells[id].finalized = true;
            self.pending_destructors.push(id);
            self.mark_data(id);
        }
        self.propagate();

        let doomed: Vec<DataId> = self
            .cells
            .iter_enumerated()
            .filter(|(_, cell)| cell.occupied && !cell.reachable && !cell.collected)
            .map(|(id, _)| id)
            .collect();
        let reclaimed = doomed.len();
        for id in &doomed {
            self.cells[*id].collected = true;
        }
        for id in doomed {
            self.free_queue.push(id);
        }
        self.drain_free_queue();

        if reclaimed > 0 {
            debug!("collect: reclaimed {reclaimed} cells, {} live", self.live_cells);
        }
        reclaimed
    }

    fn propagate(&mut self) {
        while let Some(id) = self.mark_queue.pop() {
            let mut children = Vec::new();
            self.cells[id].data.visit_children(&mut |info| children.push(info));
            for info in children {
                let data = self.infos[info].data;
                self.mark_data(data);
            }
        }
    }
}

impl Default for GarbageCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refcount_frees_on_last_discard() {
        let mut gc = GarbageCollector::new();
        let live_before = gc.live_cells();

        let reference = gc.create(Data::Number(42.0));
        let id = gc.data_id(&reference);
        assert!(gc.is_live(id));
        assert_eq!(gc.live_cells(), live_before + 1);

        gc.discard(reference);
        assert_eq!(gc.live_cells(), live_before);
    }

    #[test]
    fn share_keeps_data_alive() {
        let mut gc = GarbageCollector::new();
        let reference = gc.create(Data::Number(1.0));
        let alias = gc.share(&reference);
        let id = gc.data_id(&reference);

        gc.discard(reference);
        assert!(gc.is_live(id));
        gc.discard(alias);
        assert!(!gc.is_live(id));
    }

    #[test]
    fn copy_shares_datum_with_new_cell() {
        let mut gc = GarbageCollector::new();
        let reference = gc.create(Data::Number(1.0));
        let copied = gc.copy(&reference);

        assert_ne!(reference.info(), copied.info());
        assert_eq!(gc.data_id(&reference), gc.data_id(&copied));

        gc.discard(reference);
        gc.discard(copied);
    }

    #[test]
    fn clone_duplicates_datum() {
        let mut gc = GarbageCollector::new();
        let reference = gc.create(Data::Number(1.0));
        let cloned = gc.clone_reference(&reference);

        assert_ne!(gc.data_id(&reference), gc.data_id(&cloned));

        gc.discard(reference);
        gc.discard(cloned);
    }

    #[test]
    fn singletons_survive_everything() {
        let mut gc = GarbageCollector::new();
        let none = gc.none_reference();
        gc.discard(none);
        assert!(gc.is_live(gc.none()));

        gc.begin_collect();
        gc.end_collect();
        assert!(gc.is_live(gc.none()));
        assert!(gc.is_live(gc.null()));
    }

    #[test]
    fn copy_data_rejects_const_value() {
        let mut gc = GarbageCollector::new();
        let constant = gc.create(Data::Number(1.0));
        let source = gc.alloc(Data::Number(2.0));
        gc.use_data(source);

        let result = gc.copy_data(&constant, source);
        assert!(matches!(result, Err(MintError::InvalidModification)));

        gc.release_data(source);
        gc.discard(constant);
    }

    #[test]
    fn collect_reclaims_unrooted_cells() {
        let mut gc = GarbageCollector::new();
        let live_before = gc.live_cells();

        // Simulate a leaked count, as a cycle would produce.
        let id = gc.alloc(Data::Number(7.0));
        gc.use_data(id);
        assert_eq!(gc.live_cells(), live_before + 1);

        gc.begin_collect();
        let reclaimed = gc.end_collect();
        assert!(reclaimed >= 1);
        assert_eq!(gc.live_cells(), live_before);
    }

    #[test]
    fn collect_spares_rooted_cells() {
        let mut gc = GarbageCollector::new();
        let reference = gc.create(Data::Number(3.0));
        let id = gc.data_id(&reference);
        let root = gc.create_root(reference);

        gc.begin_collect();
        gc.end_collect();
        assert!(gc.is_live(id));

        gc.release_root(root);
        assert!(!gc.is_live(id));
    }

    #[test]
    fn deep_copy_preserves_shared_structure() {
        let mut gc = GarbageCollector::new();

        let shared = gc.create(Data::Number(5.0));
        let alias = gc.copy(&shared);
        let array = gc.create(Data::Object(Object {
            class: ClassId(0),
            slots: Some(Box::new([])),
            payload: Payload::Array(vec![shared, alias]),
            finalize: false,
        }));

        let source = gc.data_id(&array);
        let copied = gc.deep_copy(source);
        gc.use_data(copied);

        let (first, second) = match gc.data(copied) {
            Data::Object(object) => match &object.payload {
                Payload::Array(elements) => {
                    (gc.data_id(&elements[0]), gc.data_id(&elements[1]))
                }
                _ => panic!("expected array payload"),
            },
            _ => panic!("expected object"),
        };
        // Both elements still alias one datum, distinct from the source's.
        assert_eq!(first, second);
        assert_ne!(first, gc.data_id(&array));

        gc.release_data(copied);
        gc.discard(array);
    }

    use crate::memory::class::ClassId;
}
