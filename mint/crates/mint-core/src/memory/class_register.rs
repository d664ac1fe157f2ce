//! Class descriptions and class generation.
//!
//! The compiler collaborator builds a [`ClassDescription`] per `class`
//! statement: name, flags, base paths, members. `REGISTER_CLASS` then calls
//! [`GlobalData::register_class`], which lazily generates the runtime
//! [`Class`]: bases resolved, slots linearized, operators inherited, members
//! installed.

use crate::error::{MintError, MintResult};
use crate::memory::class::{Class, ClassId, Metatype, Operator};
use crate::memory::data::{Data, Format, Object};
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::{GlobalData, PackageId};
use crate::memory::reference::{ReferenceFlags, WeakReference};
use crate::memory::symbol_table::SymbolMapping;
use mint_util::{define_index_type, Symbol};
use rustc_hash::FxHashSet;

define_index_type! {
    /// Index of a class description in the global description table.
    pub struct DescriptionId;
}

/// A dotted base-class path, resolved at generation time.
pub type Path = Vec<Symbol>;

/// Compile-time description of a class.
pub struct ClassDescription {
    package: PackageId,
    flags: ReferenceFlags,
    name: Symbol,
    bases: Vec<Path>,
    members: SymbolMapping<WeakReference>,
    globals: SymbolMapping<WeakReference>,
    children: Vec<DescriptionId>,
    generated: Option<ClassId>,
}

impl ClassDescription {
    pub fn new(package: PackageId, flags: ReferenceFlags, name: Symbol) -> Self {
        Self {
            package,
            flags,
            name,
            bases: Vec::new(),
            members: SymbolMapping::default(),
            globals: SymbolMapping::default(),
            children: Vec::new(),
            generated: None,
        }
    }

    #[inline]
    pub fn name(&self) -> Symbol {
        self.name
    }

    #[inline]
    pub fn flags(&self) -> ReferenceFlags {
        self.flags
    }

    #[inline]
    pub fn package(&self) -> PackageId {
        self.package
    }

    #[inline]
    pub fn generated(&self) -> Option<ClassId> {
        self.generated
    }

    pub fn add_base(&mut self, base: Path) {
        self.bases.push(base);
    }

    /// Declare a member. Fails on redeclaration.
    pub fn create_member(&mut self, name: Symbol, value: WeakReference) -> bool {
        if self.members.contains_key(&name) {
            return false;
        }
        self.members.insert(name, value);
        true
    }

    /// Replace a declared member's value, for overload accumulation.
    ///
    /// Returns the previous value for disposal, or the given value back when
    /// the member does not exist.
    #[must_use = "the returned reference must be discarded"]
    pub fn update_member(
        &mut self,
        name: Symbol,
        value: WeakReference,
    ) -> Result<WeakReference, WeakReference> {
        if !self.members.contains_key(&name) {
            return Err(value);
        }
        Ok(self
            .members
            .insert(name, value)
            .expect("member presence was just checked"))
    }

    /// Declare a class-level (static) member.
    pub fn create_global(&mut self, name: Symbol, value: WeakReference) -> bool {
        if self.globals.contains_key(&name) {
            return false;
        }
        self.globals.insert(name, value);
        true
    }

    /// Attach a nested class description.
    pub fn add_child(&mut self, child: DescriptionId) {
        self.children.push(child);
    }

    pub(crate) fn mark(&self, gc: &mut GarbageCollector) {
        for reference in self.members.values() {
            gc.mark_info(reference.info());
        }
        for reference in self.globals.values() {
            gc.mark_info(reference.info());
        }
    }
}

/// Whether a member value occupies a per-instance slot.
///
/// Fully-const members holding a real value (functions, constants) are
/// statically shared; everything else gets a slot, including const members
/// still defaulted to none, whose value arrives at construction time.
pub fn is_slot(gc: &GarbageCollector, member: &WeakReference) -> bool {
    let fully_const = ReferenceFlags::CONST_ADDRESS | ReferenceFlags::CONST_VALUE;
    !gc.flags(member).contains(fully_const) || gc.format_of(member) == Format::None
}

impl GlobalData {
    /// Generate the runtime class for a description, then bind the class
    /// object into the description's package under the class name.
    pub fn register_class(
        &mut self,
        gc: &mut GarbageCollector,
        description: DescriptionId,
    ) -> MintResult<ClassId> {
        let class_id = self.generate_class(gc, description)?;

        let class_object_value = gc_alloc_class_object(gc, class_id);
        let class_object = gc.new_reference(
            ReferenceFlags::CONST_ADDRESS | ReferenceFlags::CONST_VALUE | ReferenceFlags::GLOBAL,
            class_object_value,
        );
        let name = self.description(description).name();
        let package = self.description(description).package();
        if let Some(previous) = self.package_mut(package).symbols_mut().insert(name, class_object) {
            gc.discard(previous);
        }
        Ok(class_id)
    }

    /// Lazily produce the runtime [`Class`] for a description.
    pub fn generate_class(
        &mut self,
        gc: &mut GarbageCollector,
        description: DescriptionId,
    ) -> MintResult<ClassId> {
        if let Some(existing) = self.description(description).generated() {
            return Ok(existing);
        }

        let name = self.description(description).name();
        let package = self.description(description).package();
        let full_name = if self.package(package).full_name().is_empty() {
            name.as_str().to_string()
        } else {
            format!("{}.{}", self.package(package).full_name(), name)
        };

        // Resolve and generate every base first.
        let base_paths = {
            let desc = self.description(description);
            desc.bases.clone()
        };
        let mut bases = Vec::with_capacity(base_paths.len());
        for path in &base_paths {
            let base = self.resolve_base(gc, package, path).ok_or_else(|| {
                MintError::UnresolvedBase {
                    class: full_name.clone(),
                    base: path
                        .iter()
                        .map(|s| s.as_str())
                        .collect::<Vec<_>>()
                        .join("."),
                }
            })?;
            bases.push(self.generate_class(gc, base)?);
        }

        let class_id = self.add_class(Class::new(package, full_name.clone(), Metatype::Object));
        self.class_mut(class_id).set_bases(bases.clone());

        self.merge_bases(gc, class_id, &bases, description, &full_name)?;
        self.install_own_members(gc, class_id, description)?;

        self.description_mut(description).generated = Some(class_id);
        Ok(class_id)
    }

    fn resolve_base(
        &mut self,
        _gc: &mut GarbageCollector,
        package: PackageId,
        path: &Path,
    ) -> Option<DescriptionId> {
        let (first, rest) = path.split_first()?;
        // The head resolves in the lexical package chain; the tail descends
        // through packages.
        if rest.is_empty() {
            return self.find_description(package, *first);
        }
        let mut current = self.package(package).find_package(*first).or_else(|| {
            let root = self.root();
            self.package(root).find_package(*first)
        })?;
        let (last, middle) = rest.split_last()?;
        for segment in middle {
            current = self.package(current).find_package(*segment)?;
        }
        self.find_description(current, *last)
    }

    /// Linearize the base classes into the derived class.
    ///
    /// Slots are unioned in base declaration order; a member reaching the
    /// derived class from two unrelated bases without a local override is an
    /// ambiguity error. Operator members colliding the same way are simply
    /// not inherited.
    fn merge_bases(
        &mut self,
        gc: &mut GarbageCollector,
        class_id: ClassId,
        bases: &[ClassId],
        description: DescriptionId,
        full_name: &str,
    ) -> MintResult<()> {
        let mut dropped_operators: FxHashSet<Symbol> = FxHashSet::default();

        for base_id in bases {
            let merges: Vec<(Symbol, ClassId, bool, WeakReference)> = {
                let base = self.class(*base_id);
                base.members()
                    .map(|(symbol, member)| {
                        (symbol, member.owner, member.is_slot(), member.value.raw_alias())
                    })
                    .collect()
            };

            for (symbol, owner, slot, value) in merges {
                if dropped_operators.contains(&symbol) {
                    continue;
                }
                let existing = self
                    .class(class_id)
                    .member(symbol)
                    .map(|member| (member.owner, member.is_slot()));

                match existing {
                    None => {
                        let shared = gc.share(&value);
                        if slot {
                            self.class_mut(class_id).add_slot_member(symbol, owner, shared);
                        } else {
                            self.class_mut(class_id).add_static_member(symbol, owner, shared);
                        }
                    }
                    Some((present_owner, _)) if present_owner == owner => {
                        // Diamond: same introducing class through two paths.
                    }
                    Some((present_owner, _)) => {
                        if self.is_base_or_same(owner, present_owner) {
                            // Existing entry is the more derived one.
                        } else if self.is_base_or_same(present_owner, owner) {
                            let shared = gc.share(&value);
                            if let Some(previous) =
                                self.class_mut(class_id).override_member(symbol, owner, shared)
                            {
                                gc.discard(previous);
                            }
                        } else if self.description(description).members.contains_key(&symbol) {
                            // The derived class overrides; resolution below.
                        } else if Operator::from_symbol(symbol).is_some() {
                            // Operator defined in more than one base and not
                            // overridden: not inherited.
                            dropped_operators.insert(symbol);
                            self.class_mut(class_id).drop_operator(symbol);
                        } else {
                            return Err(MintError::AmbiguousInheritance {
                                class: full_name.to_string(),
                                member: symbol,
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn install_own_members(
        &mut self,
        gc: &mut GarbageCollector,
        class_id: ClassId,
        description: DescriptionId,
    ) -> MintResult<()> {
        let members: Vec<(Symbol, WeakReference)> = self
            .description(description)
            .members
            .iter()
            .map(|(symbol, value)| (*symbol, value.raw_alias()))
            .collect();

        for (symbol, value) in members {
            let shared = gc.share(&value);
            let inherited = self.class(class_id).member(symbol).is_some();
            if inherited {
                if let Some(previous) =
                    self.class_mut(class_id).override_member(symbol, class_id, shared)
                {
                    gc.discard(previous);
                }
            } else if is_slot(gc, &value) {
                self.class_mut(class_id).add_slot_member(symbol, class_id, shared);
            } else {
                self.class_mut(class_id).add_static_member(symbol, class_id, shared);
            }
        }

        let globals: Vec<(Symbol, WeakReference)> = self
            .description(description)
            .globals
            .iter()
            .map(|(symbol, value)| (*symbol, value.raw_alias()))
            .collect();
        for (symbol, value) in globals {
            let shared = gc.share(&value);
            self.class_mut(class_id).add_global_member(symbol, class_id, shared);
        }

        // Nested classes surface as class-object globals.
        let children = self.description(description).children.clone();
        for child in children {
            let child_class = self.generate_class(gc, child)?;
            let child_name = self.description(child).name();
            let child_class_object = gc_alloc_class_object(gc, child_class);
            let reference = gc.new_reference(
                ReferenceFlags::CONST_ADDRESS | ReferenceFlags::CONST_VALUE,
                child_class_object,
            );
            self.class_mut(class_id).add_global_member(child_name, class_id, reference);
        }
        Ok(())
    }
}

fn gc_alloc_class_object(gc: &mut GarbageCollector, class: ClassId) -> crate::memory::data::DataId {
    gc.alloc(Data::Object(Object::class_object(class)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_value(gc: &mut GarbageCollector, value: f64) -> WeakReference {
        let id = gc.alloc(Data::Number(value));
        gc.new_reference(ReferenceFlags::DEFAULT, id)
    }

    fn describe(
        global: &mut GlobalData,
        name: &str,
        bases: &[&str],
        members: Vec<(&str, WeakReference)>,
    ) -> DescriptionId {
        let root = global.root();
        let mut description =
            ClassDescription::new(root, ReferenceFlags::DEFAULT, Symbol::intern(name));
        for base in bases {
            description.add_base(vec![Symbol::intern(base)]);
        }
        for (member, value) in members {
            assert!(description.create_member(Symbol::intern(member), value));
        }
        global.add_description(description)
    }

    #[test]
    fn single_inheritance_preserves_offsets() {
        let mut gc = GarbageCollector::new();
        let mut global = GlobalData::new();

        let base_member = member_value(&mut gc, 1.0);
        let base = describe(&mut global, "Base", &[], vec![("mbr", base_member)]);
        let derived_extra = member_value(&mut gc, 2.0);
        let derived = describe(&mut global, "Derived", &["Base"], vec![("extra", derived_extra)]);

        let base_class = global.generate_class(&mut gc, base).unwrap();
        let derived_class = global.generate_class(&mut gc, derived).unwrap();

        let mbr = Symbol::intern("mbr");
        assert_eq!(
            global.class(base_class).member(mbr).unwrap().offset,
            global.class(derived_class).member(mbr).unwrap().offset
        );
        assert_eq!(global.class(derived_class).slot_count(), 2);
        assert!(global.is_base_of(base_class, derived_class));
    }

    #[test]
    fn unrelated_bases_with_override_resolve() {
        let mut gc = GarbageCollector::new();
        let mut global = GlobalData::new();

        let a_value = member_value(&mut gc, 1.0);
        let a = describe(&mut global, "A", &[], vec![("mbr", a_value)]);
        let b_value = member_value(&mut gc, 2.0);
        let b = describe(&mut global, "B", &[], vec![("mbr", b_value)]);
        let c_value = member_value(&mut gc, 3.0);
        let c = describe(&mut global, "C", &["A", "B"], vec![("mbr", c_value)]);

        let _ = global.generate_class(&mut gc, a).unwrap();
        let _ = global.generate_class(&mut gc, b).unwrap();
        let c_class = global.generate_class(&mut gc, c).unwrap();

        let member = global.class(c_class).member(Symbol::intern("mbr")).unwrap();
        assert_eq!(member.owner, c_class);
        // One slot for mbr, shared across the merged layout.
        assert_eq!(global.class(c_class).slot_count(), 1);
    }

    #[test]
    fn unrelated_bases_without_override_are_ambiguous() {
        let mut gc = GarbageCollector::new();
        let mut global = GlobalData::new();

        let a_value = member_value(&mut gc, 1.0);
        let a = describe(&mut global, "A2", &[], vec![("mbr", a_value)]);
        let b_value = member_value(&mut gc, 2.0);
        let b = describe(&mut global, "B2", &[], vec![("mbr", b_value)]);
        let c = describe(&mut global, "C2", &["A2", "B2"], vec![]);

        let _ = global.generate_class(&mut gc, a).unwrap();
        let _ = global.generate_class(&mut gc, b).unwrap();
        let result = global.generate_class(&mut gc, c);
        assert!(matches!(
            result,
            Err(MintError::AmbiguousInheritance { .. })
        ));
    }

    #[test]
    fn unresolved_base_is_reported() {
        let mut gc = GarbageCollector::new();
        let mut global = GlobalData::new();
        let c = describe(&mut global, "Orphan", &["Missing"], vec![]);
        assert!(matches!(
            global.generate_class(&mut gc, c),
            Err(MintError::UnresolvedBase { .. })
        ));
    }
}
