//! Modules: bytecode containers and the module registry.
//!
//! A [`Module`] is append-only during compilation: the compiler pushes
//! nodes, patches forward jumps through [`Module::replace_node`], and
//! interns constants and symbols. Handles are stable entry points into the
//! stream. After loading, the tree is immutable.

use crate::ast::node::Node;
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::PackageId;
use crate::memory::reference::WeakReference;
use mint_util::{define_index_type, IndexVec, Symbol};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};

define_index_type! {
    /// Index of a module in the registry.
    pub struct ModuleId;
}

define_index_type! {
    /// Index into a module's constant pool.
    pub struct ConstantId;
}

/// The main module's id. The registry creates it eagerly.
pub const MAIN_ID: ModuleId = ModuleId(0);

/// The main module's registry name.
pub const MAIN_NAME: &str = "main";

/// File extension of module sources.
pub const SOURCE_EXTENSION: &str = "mn";

/// Stable identifier of a handle: owning module plus handle index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandleId {
    pub module: ModuleId,
    pub index: u32,
}

/// A resolved entry point into a function body.
#[derive(Clone, Copy, Debug)]
pub struct Handle {
    pub module: ModuleId,
    pub offset: usize,
    pub package: PackageId,
    /// Fast-slot array size for the frame.
    pub fast_count: usize,
    /// The body is a generator: calling it builds an iterator.
    pub generator: bool,
    /// The body opens its own symbol table; `false` shares the caller's.
    pub symbols: bool,
}

/// Compilation state of a registered module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModuleState {
    NotCompiled,
    NotLoaded,
    Ready,
}

/// One bytecode container.
pub struct Module {
    id: ModuleId,
    tree: Vec<Node>,
    handles: Vec<Handle>,
    constants: Vec<WeakReference>,
    symbols: FxHashMap<&'static str, Symbol>,
}

impl Module {
    fn new(id: ModuleId) -> Self {
        Self {
            id,
            tree: Vec::new(),
            handles: Vec::new(),
            constants: Vec::new(),
            symbols: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Node at an offset.
    #[inline]
    pub fn at(&self, offset: usize) -> Node {
        self.tree[offset]
    }

    /// Last valid instruction offset.
    #[inline]
    pub fn end(&self) -> usize {
        self.tree.len().saturating_sub(1)
    }

    /// Offset the next pushed node will occupy.
    #[inline]
    pub fn next_node_offset(&self) -> usize {
        self.tree.len()
    }

    pub fn push_node(&mut self, node: Node) {
        self.tree.push(node);
    }

    pub fn push_nodes(&mut self, nodes: impl IntoIterator<Item = Node>) {
        self.tree.extend(nodes);
    }

    /// Patch a forward-jump placeholder.
    pub fn replace_node(&mut self, offset: usize, node: Node) {
        self.tree[offset] = node;
    }

    /// Intern a constant reference into the pool.
    pub fn make_constant(&mut self, reference: WeakReference) -> ConstantId {
        let id = ConstantId(self.constants.len() as u32);
        self.constants.push(reference);
        id
    }

    #[inline]
    pub fn constant(&self, id: ConstantId) -> &WeakReference {
        &self.constants[id.0 as usize]
    }

    /// Intern a symbol. Same text yields the same symbol.
    pub fn make_symbol(&mut self, name: &str) -> Symbol {
        if let Some(existing) = self.symbols.get(name) {
            return *existing;
        }
        let symbol = Symbol::intern(name);
        self.symbols.insert(symbol.as_str(), symbol);
        symbol
    }

    /// Create a handle into this module.
    pub fn make_handle(
        &mut self,
        package: PackageId,
        offset: usize,
        fast_count: usize,
        generator: bool,
        symbols: bool,
    ) -> HandleId {
        let index = self.handles.len() as u32;
        self.handles.push(Handle {
            module: self.id,
            offset,
            package,
            fast_count,
            generator,
            symbols,
        });
        HandleId {
            module: self.id,
            index,
        }
    }

    #[inline]
    pub fn handle(&self, index: u32) -> &Handle {
        &self.handles[index as usize]
    }

    pub(crate) fn visit_constants(&self, visit: &mut dyn FnMut(&WeakReference)) {
        for constant in &self.constants {
            visit(constant);
        }
    }
}

/// Per-module source line table, append-only and ordered by offset.
#[derive(Default)]
pub struct DebugInfo {
    lines: Vec<(usize, usize)>,
}

impl DebugInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that nodes from `offset` on belong to `line`.
    pub fn new_line(&mut self, offset: usize, line: usize) {
        debug_assert!(self
            .lines
            .last()
            .map(|(last, _)| *last <= offset)
            .unwrap_or(true));
        self.lines.push((offset, line));
    }

    /// Source line of the instruction at `offset`, when known.
    pub fn line_at(&self, offset: usize) -> Option<usize> {
        match self.lines.binary_search_by_key(&offset, |(o, _)| *o) {
            Ok(index) => Some(self.lines[index].1),
            Err(0) => None,
            Err(index) => Some(self.lines[index - 1].1),
        }
    }
}

/// One frame of a call-stack dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineInfo {
    pub module: String,
    pub line: Option<usize>,
}

pub type LineInfoList = Vec<LineInfo>;

/// The registry: every loaded module, plus the path cache.
pub struct ModuleRegistry {
    entries: IndexVec<ModuleId, ModuleEntry>,
    cache: FxHashMap<PathBuf, ModuleId>,
}

pub struct ModuleEntry {
    pub name: String,
    pub module: Module,
    pub debug: DebugInfo,
    pub state: ModuleState,
}

impl ModuleRegistry {
    /// A fresh registry containing the (empty) main module.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: IndexVec::new(),
            cache: FxHashMap::default(),
        };
        let main = registry.create_module(MAIN_NAME, ModuleState::NotCompiled);
        debug_assert_eq!(main, MAIN_ID);
        registry
    }

    pub fn create_module(&mut self, name: &str, state: ModuleState) -> ModuleId {
        let id = self.entries.next_index();
        self.entries.push(ModuleEntry {
            name: name.to_string(),
            module: Module::new(id),
            debug: DebugInfo::new(),
            state,
        });
        id
    }

    /// Register a module backed by a source file, reusing the cache entry
    /// for an already-known normalized path.
    pub fn create_module_for_path(&mut self, path: &Path, name: &str) -> ModuleId {
        let normalized = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(existing) = self.cache.get(&normalized) {
            return *existing;
        }
        let id = self.create_module(name, ModuleState::NotCompiled);
        self.cache.insert(normalized, id);
        id
    }

    pub fn find_by_path(&self, path: &Path) -> Option<ModuleId> {
        let normalized = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        self.cache.get(&normalized).copied()
    }

    #[inline]
    pub fn entry(&self, id: ModuleId) -> &ModuleEntry {
        &self.entries[id]
    }

    #[inline]
    pub fn entry_mut(&mut self, id: ModuleId) -> &mut ModuleEntry {
        &mut self.entries[id]
    }

    #[inline]
    pub fn module(&self, id: ModuleId) -> &Module {
        &self.entries[id].module
    }

    #[inline]
    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.entries[id].module
    }

    pub fn name(&self, id: ModuleId) -> &str {
        &self.entries[id].name
    }

    /// Resolve a handle id across modules.
    pub fn handle(&self, id: HandleId) -> &Handle {
        self.entries[id.module].module.handle(id.index)
    }

    /// Find a module by its registry name.
    pub fn find_by_name(&self, name: &str) -> Option<ModuleId> {
        self.entries
            .iter_enumerated()
            .find(|(_, entry)| entry.name == name)
            .map(|(id, _)| id)
    }

    /// Mark every constant pool for the collector.
    pub fn mark(&self, gc: &mut GarbageCollector) {
        for entry in self.entries.iter() {
            entry.module.visit_constants(&mut |constant| {
                gc.mark_info(constant.info());
            });
        }
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate a module source file on the search path list.
///
/// `network.tcp` resolves to `network/tcp.mn` relative to each search root,
/// with the current directory searched first; a literal `network.tcp.mn`
/// sibling file is accepted as a fallback.
pub fn resolve_module_path(search_paths: &[PathBuf], dotted: &str) -> Option<PathBuf> {
    let as_directories: PathBuf = dotted.split('.').collect::<PathBuf>().with_extension(SOURCE_EXTENSION);
    let literal = PathBuf::from(format!("{dotted}.{SOURCE_EXTENSION}"));

    let current = PathBuf::from(".");
    let roots = std::iter::once(&current).chain(search_paths.iter());
    for root in roots {
        let candidate = root.join(&as_directories);
        if candidate.is_file() {
            return Some(candidate);
        }
        let candidate = root.join(&literal);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::node::{Command, Node};

    #[test]
    fn push_and_patch_nodes() {
        let mut registry = ModuleRegistry::new();
        let module = registry.module_mut(MAIN_ID);

        assert_eq!(module.next_node_offset(), 0);
        module.push_node(Node::Command(Command::Jump));
        let placeholder = module.next_node_offset();
        module.push_node(Node::Parameter(0));
        module.push_node(Node::Command(Command::ExitModule));

        module.replace_node(placeholder, Node::Parameter(2));
        assert_eq!(module.at(placeholder).parameter(), 2);
        assert_eq!(module.end(), 2);
    }

    #[test]
    fn symbols_intern_to_the_same_handle() {
        let mut registry = ModuleRegistry::new();
        let module = registry.module_mut(MAIN_ID);
        let a = module.make_symbol("value");
        let b = module.make_symbol("value");
        assert_eq!(a, b);
    }

    #[test]
    fn debug_info_maps_offsets_to_lines() {
        let mut debug = DebugInfo::new();
        debug.new_line(0, 1);
        debug.new_line(5, 2);
        debug.new_line(9, 4);

        assert_eq!(debug.line_at(0), Some(1));
        assert_eq!(debug.line_at(4), Some(1));
        assert_eq!(debug.line_at(5), Some(2));
        assert_eq!(debug.line_at(100), Some(4));
    }

    #[test]
    fn main_module_exists_up_front() {
        let registry = ModuleRegistry::new();
        assert_eq!(registry.name(MAIN_ID), MAIN_NAME);
        assert_eq!(registry.entry(MAIN_ID).state, ModuleState::NotCompiled);
    }

    #[test]
    fn handles_are_stable() {
        let mut registry = ModuleRegistry::new();
        let package = crate::memory::global_data::PackageId(0);
        let module = registry.module_mut(MAIN_ID);
        let first = module.make_handle(package, 3, 0, false, true);
        let second = module.make_handle(package, 9, 2, true, false);

        assert_ne!(first, second);
        assert_eq!(registry.handle(first).offset, 3);
        assert!(registry.handle(second).generator);
    }
}
