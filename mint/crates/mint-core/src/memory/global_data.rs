//! Global data: the package tree and the class tables.
//!
//! Packages, classes, and class descriptions live for the runtime lifetime;
//! they are cleaned up only at shutdown. All of it hangs off [`GlobalData`],
//! which the runtime owns and the collector marks as a root set.

use crate::memory::class::{Class, ClassId, Metatype, METATYPE_COUNT};
use crate::memory::class_register::{ClassDescription, DescriptionId};
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::symbol_table::{SymbolMapping, SymbolTable};
use mint_util::{define_index_type, IndexVec, Symbol};

define_index_type! {
    /// Index of a package in the package table.
    pub struct PackageId;
}

/// One package: nested packages, global symbols, and the classes defined in
/// it.
pub struct PackageData {
    name: Symbol,
    full_name: String,
    owner: Option<PackageId>,
    packages: SymbolMapping<PackageId>,
    symbols: SymbolTable,
    descriptions: Vec<DescriptionId>,
}

impl PackageData {
    #[inline]
    pub fn name(&self) -> Symbol {
        self.name
    }

    #[inline]
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    #[inline]
    pub fn owner(&self) -> Option<PackageId> {
        self.owner
    }

    #[inline]
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    #[inline]
    pub fn symbols_mut(&mut self) -> &mut SymbolTable {
        &mut self.symbols
    }

    #[inline]
    pub fn descriptions(&self) -> &[DescriptionId] {
        &self.descriptions
    }

    pub fn find_package(&self, name: Symbol) -> Option<PackageId> {
        self.packages.get(&name).copied()
    }
}

/// The root of the metadata world.
pub struct GlobalData {
    packages: IndexVec<PackageId, PackageData>,
    root: PackageId,
    classes: IndexVec<ClassId, Class>,
    descriptions: IndexVec<DescriptionId, ClassDescription>,
    builtin: [ClassId; METATYPE_COUNT],
}

impl GlobalData {
    pub fn new() -> Self {
        let mut packages = IndexVec::new();
        let root = packages.push(PackageData {
            name: Symbol::intern("(root)"),
            full_name: String::new(),
            owner: None,
            packages: SymbolMapping::default(),
            symbols: SymbolTable::new(None),
            descriptions: Vec::new(),
        });

        let mut classes = IndexVec::new();
        let builtin = [
            Metatype::Object,
            Metatype::String,
            Metatype::Regex,
            Metatype::Array,
            Metatype::Hash,
            Metatype::Iterator,
            Metatype::Library,
            Metatype::LibObject,
        ]
        .map(|metatype| classes.push(Class::new(root, metatype.name(), metatype)));

        Self {
            packages,
            root,
            classes,
            descriptions: IndexVec::new(),
            builtin,
        }
    }

    // ------------------------------------------------------------------
    // Packages

    #[inline]
    pub fn root(&self) -> PackageId {
        self.root
    }

    #[inline]
    pub fn package(&self, id: PackageId) -> &PackageData {
        &self.packages[id]
    }

    #[inline]
    pub fn package_mut(&mut self, id: PackageId) -> &mut PackageData {
        &mut self.packages[id]
    }

    /// Child package lookup, creating it on first mention.
    pub fn get_or_create_package(&mut self, owner: PackageId, name: Symbol) -> PackageId {
        if let Some(existing) = self.packages[owner].packages.get(&name) {
            return *existing;
        }
        let full_name = if self.packages[owner].full_name.is_empty() {
            name.as_str().to_string()
        } else {
            format!("{}.{}", self.packages[owner].full_name, name)
        };
        let created = self.packages.push(PackageData {
            name,
            full_name,
            owner: Some(owner),
            packages: SymbolMapping::default(),
            symbols: SymbolTable::new(None),
            descriptions: Vec::new(),
        });
        self.packages[owner].packages.insert(name, created);
        created
    }

    // ------------------------------------------------------------------
    // Classes

    #[inline]
    pub fn class(&self, id: ClassId) -> &Class {
        &self.classes[id]
    }

    #[inline]
    pub fn class_mut(&mut self, id: ClassId) -> &mut Class {
        &mut self.classes[id]
    }

    pub(crate) fn add_class(&mut self, class: Class) -> ClassId {
        self.classes.push(class)
    }

    /// The singleton class for a built-in representation.
    #[inline]
    pub fn builtin_class(&self, metatype: Metatype) -> ClassId {
        self.builtin[metatype.index()]
    }

    /// Transitive base relation.
    pub fn is_base_of(&self, base: ClassId, other: ClassId) -> bool {
        self.classes[other].bases().iter().any(|direct| {
            *direct == base || self.is_base_of(base, *direct)
        })
    }

    pub fn is_base_or_same(&self, base: ClassId, other: ClassId) -> bool {
        base == other || self.is_base_of(base, other)
    }

    pub fn is_direct_base_or_same(&self, base: ClassId, other: ClassId) -> bool {
        base == other || self.classes[other].bases().contains(&base)
    }

    // ------------------------------------------------------------------
    // Class descriptions

    #[inline]
    pub fn description(&self, id: DescriptionId) -> &ClassDescription {
        &self.descriptions[id]
    }

    #[inline]
    pub fn description_mut(&mut self, id: DescriptionId) -> &mut ClassDescription {
        &mut self.descriptions[id]
    }

    /// Register a new class description in its package.
    pub fn add_description(&mut self, description: ClassDescription) -> DescriptionId {
        let package = description.package();
        let id = self.descriptions.push(description);
        self.packages[package].descriptions.push(id);
        id
    }

    /// Find a class description by name, searching the package then its
    /// ancestors.
    pub fn find_description(&self, package: PackageId, name: Symbol) -> Option<DescriptionId> {
        let mut current = Some(package);
        while let Some(id) = current {
            let found = self.packages[id]
                .descriptions
                .iter()
                .copied()
                .find(|desc| self.descriptions[*desc].name() == name);
            if found.is_some() {
                return found;
            }
            current = self.packages[id].owner;
        }
        None
    }

    // ------------------------------------------------------------------
    // Collection support

    /// Mark every process-lifetime reference: package symbols, class member
    /// defaults, description member values.
    pub fn mark(&self, gc: &mut GarbageCollector) {
        for package in self.packages.iter() {
            package.symbols.visit_children(&mut |info| gc.mark_info(info));
        }
        for class in self.classes.iter() {
            class.mark(gc);
        }
        for description in self.descriptions.iter() {
            description.mark(gc);
        }
    }
}

impl Default for GlobalData {
    fn default() -> Self {
        Self::new()
    }
}
