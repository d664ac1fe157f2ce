//! Class metadata.
//!
//! A [`Class`] is the runtime shape of a type: its linearized base list, its
//! member map, the per-instance slot layout, and the fixed-size operator
//! table the dispatch loop indexes directly. Classes are generated once from
//! a [`crate::memory::ClassDescription`] and live for the runtime lifetime.

use crate::memory::data::{Data, DataId, Object, Payload};
use crate::memory::garbage_collector::GarbageCollector;
use crate::memory::global_data::{GlobalData, PackageId};
use crate::memory::reference::WeakReference;
use crate::memory::symbol_table::SymbolMapping;
use mint_util::{define_index_type, Symbol};
use mint_util::symbol::known;

define_index_type! {
    /// Index of a class in the global class table.
    pub struct ClassId;
}

/// Offset value identifying a statically shared member (functions and
/// constants that live on the class rather than in instance slots).
pub const INVALID_OFFSET: usize = usize::MAX;

/// Built-in representation tag of a class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metatype {
    Object,
    String,
    Regex,
    Array,
    Hash,
    Iterator,
    Library,
    LibObject,
}

/// Number of metatypes, which is also the builtin class table size.
pub const METATYPE_COUNT: usize = 8;

impl Metatype {
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Metatype::Object => "object",
            Metatype::String => "string",
            Metatype::Regex => "regex",
            Metatype::Array => "array",
            Metatype::Hash => "hash",
            Metatype::Iterator => "iterator",
            Metatype::Library => "library",
            Metatype::LibObject => "libobject",
        }
    }
}

/// Operator kinds, indexing the per-class operator table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operator {
    New,
    Delete,
    Copy,
    Call,
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Mod,
    In,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    BAnd,
    BOr,
    XOr,
    Inc,
    Dec,
    Not,
    Compl,
    ShiftLeft,
    ShiftRight,
    InclusiveRange,
    ExclusiveRange,
    Subscript,
    SubscriptMove,
    RegexMatch,
    RegexUnmatch,
}

/// Size of the operator table.
pub const OPERATOR_COUNT: usize = Operator::RegexUnmatch as usize + 1;

impl Operator {
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Operator> {
        OPERATORS.get(index).copied()
    }

    /// The member symbol this operator is registered under.
    pub fn symbol(self) -> Symbol {
        match self {
            Operator::New => known::new_method(),
            Operator::Delete => known::delete_method(),
            Operator::Copy => known::copy_operator(),
            Operator::Call => known::call_operator(),
            Operator::Add => known::add_operator(),
            Operator::Sub => known::sub_operator(),
            Operator::Mul => known::mul_operator(),
            Operator::Div => known::div_operator(),
            Operator::Pow => known::pow_operator(),
            Operator::Mod => known::mod_operator(),
            Operator::In => known::in_operator(),
            Operator::Eq => known::eq_operator(),
            Operator::Ne => known::ne_operator(),
            Operator::Lt => known::lt_operator(),
            Operator::Gt => known::gt_operator(),
            Operator::Le => known::le_operator(),
            Operator::Ge => known::ge_operator(),
            Operator::And => known::and_operator(),
            Operator::Or => known::or_operator(),
            Operator::BAnd => known::band_operator(),
            Operator::BOr => known::bor_operator(),
            Operator::XOr => known::xor_operator(),
            Operator::Inc => known::inc_operator(),
            Operator::Dec => known::dec_operator(),
            Operator::Not => known::not_operator(),
            Operator::Compl => known::compl_operator(),
            Operator::ShiftLeft => known::shift_left_operator(),
            Operator::ShiftRight => known::shift_right_operator(),
            Operator::InclusiveRange => known::inclusive_range_operator(),
            Operator::ExclusiveRange => known::exclusive_range_operator(),
            Operator::Subscript => known::subscript_operator(),
            Operator::SubscriptMove => known::subscript_move_operator(),
            Operator::RegexMatch => known::regex_match_operator(),
            Operator::RegexUnmatch => known::regex_unmatch_operator(),
        }
    }

    pub fn from_symbol(symbol: Symbol) -> Option<Operator> {
        OPERATORS.iter().copied().find(|op| op.symbol() == symbol)
    }

    /// Spelled form, for diagnostics.
    pub fn name(self) -> &'static str {
        self.symbol().as_str()
    }
}

const OPERATORS: [Operator; OPERATOR_COUNT] = [
    Operator::New,
    Operator::Delete,
    Operator::Copy,
    Operator::Call,
    Operator::Add,
    Operator::Sub,
    Operator::Mul,
    Operator::Div,
    Operator::Pow,
    Operator::Mod,
    Operator::In,
    Operator::Eq,
    Operator::Ne,
    Operator::Lt,
    Operator::Gt,
    Operator::Le,
    Operator::Ge,
    Operator::And,
    Operator::Or,
    Operator::BAnd,
    Operator::BOr,
    Operator::XOr,
    Operator::Inc,
    Operator::Dec,
    Operator::Not,
    Operator::Compl,
    Operator::ShiftLeft,
    Operator::ShiftRight,
    Operator::InclusiveRange,
    Operator::ExclusiveRange,
    Operator::Subscript,
    Operator::SubscriptMove,
    Operator::RegexMatch,
    Operator::RegexUnmatch,
];

/// Location of one member: a slot offset or INVALID_OFFSET, the class that
/// introduced it, and its default value.
pub struct MemberInfo {
    pub offset: usize,
    pub owner: ClassId,
    pub value: WeakReference,
}

impl MemberInfo {
    /// Whether the member occupies a per-instance slot.
    #[inline]
    pub fn is_slot(&self) -> bool {
        self.offset != INVALID_OFFSET
    }
}

/// Runtime class metadata.
pub struct Class {
    name: String,
    package: PackageId,
    metatype: Metatype,
    copyable: bool,
    bases: Vec<ClassId>,

    /// Member storage arena; maps index into it.
    members: Vec<MemberInfo>,
    member_index: SymbolMapping<usize>,
    global_index: SymbolMapping<usize>,

    /// Operator shortcut table, indexed by [`Operator`]. The dispatch hot
    /// path never touches the symbol map.
    operators: [Option<usize>; OPERATOR_COUNT],

    /// Member arena index per slot offset.
    slots: Vec<usize>,
}

impl Class {
    pub fn new(package: PackageId, name: impl Into<String>, metatype: Metatype) -> Self {
        Self {
            name: name.into(),
            package,
            metatype,
            copyable: true,
            bases: Vec::new(),
            members: Vec::new(),
            member_index: SymbolMapping::default(),
            global_index: SymbolMapping::default(),
            operators: [None; OPERATOR_COUNT],
            slots: Vec::new(),
        }
    }

    #[inline]
    pub fn metatype(&self) -> Metatype {
        self.metatype
    }

    pub fn name(&self) -> Symbol {
        let short = self.name.rsplit('.').next().unwrap_or(&self.name);
        Symbol::intern(short)
    }

    pub fn full_name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn package(&self) -> PackageId {
        self.package
    }

    #[inline]
    pub fn bases(&self) -> &[ClassId] {
        &self.bases
    }

    pub(crate) fn set_bases(&mut self, bases: Vec<ClassId>) {
        self.bases = bases;
    }

    /// Number of per-instance slots.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn slots(&self) -> impl Iterator<Item = &MemberInfo> {
        self.slots.iter().map(|index| &self.members[*index])
    }

    #[inline]
    pub fn find_operator(&self, op: Operator) -> Option<&MemberInfo> {
        self.operators[op.index()].map(|index| &self.members[index])
    }

    pub fn member(&self, symbol: Symbol) -> Option<&MemberInfo> {
        self.member_index
            .get(&symbol)
            .map(|index| &self.members[*index])
    }

    pub fn global(&self, symbol: Symbol) -> Option<&MemberInfo> {
        self.global_index
            .get(&symbol)
            .map(|index| &self.members[*index])
    }

    pub fn members(&self) -> impl Iterator<Item = (Symbol, &MemberInfo)> {
        self.member_index
            .iter()
            .map(|(symbol, index)| (*symbol, &self.members[*index]))
    }

    pub fn globals(&self) -> impl Iterator<Item = (Symbol, &MemberInfo)> {
        self.global_index
            .iter()
            .map(|(symbol, index)| (*symbol, &self.members[*index]))
    }

    #[inline]
    pub fn is_copyable(&self) -> bool {
        self.copyable
    }

    pub fn disable_copy(&mut self) {
        self.copyable = false;
    }

    /// Install a member occupying the next slot.
    pub(crate) fn add_slot_member(
        &mut self,
        symbol: Symbol,
        owner: ClassId,
        value: WeakReference,
    ) -> usize {
        let offset = self.slots.len();
        let index = self.members.len();
        self.members.push(MemberInfo {
            offset,
            owner,
            value,
        });
        self.member_index.insert(symbol, index);
        self.slots.push(index);
        self.sync_operator(symbol, index);
        offset
    }

    /// Install a statically shared member.
    pub(crate) fn add_static_member(
        &mut self,
        symbol: Symbol,
        owner: ClassId,
        value: WeakReference,
    ) {
        let index = self.members.len();
        self.members.push(MemberInfo {
            offset: INVALID_OFFSET,
            owner,
            value,
        });
        self.member_index.insert(symbol, index);
        self.sync_operator(symbol, index);
    }

    /// Install a global (class-level) member.
    pub(crate) fn add_global_member(
        &mut self,
        symbol: Symbol,
        owner: ClassId,
        value: WeakReference,
    ) {
        let index = self.members.len();
        self.members.push(MemberInfo {
            offset: INVALID_OFFSET,
            owner,
            value,
        });
        self.global_index.insert(symbol, index);
    }

    /// Override an inherited member: keep its slot offset, replace the
    /// default value and owner. Returns the previous default.
    pub(crate) fn override_member(
        &mut self,
        symbol: Symbol,
        owner: ClassId,
        value: WeakReference,
    ) -> Option<WeakReference> {
        let index = *self.member_index.get(&symbol)?;
        let member = &mut self.members[index];
        member.owner = owner;
        let previous = std::mem::replace(&mut member.value, value);
        self.sync_operator(symbol, index);
        Some(previous)
    }

    /// Keep the operator table in sync when a member named like an operator
    /// is installed.
    fn sync_operator(&mut self, symbol: Symbol, index: usize) {
        if let Some(op) = Operator::from_symbol(symbol) {
            self.operators[op.index()] = Some(index);
        }
    }

    /// Withdraw an operator inherited from conflicting bases.
    ///
    /// The member entry itself stays (kept alive for the override check);
    /// only the dispatch shortcut is removed.
    pub(crate) fn drop_operator(&mut self, symbol: Symbol) {
        if let Some(op) = Operator::from_symbol(symbol) {
            self.operators[op.index()] = None;
        }
    }

    /// Mark every member default for the collector.
    pub(crate) fn mark(&self, gc: &mut GarbageCollector) {
        for member in &self.members {
            gc.mark_info(member.value.info());
        }
    }
}

/// Instantiate a class: allocate an object whose slots are clones of each
/// slot's default value, with the metatype's default payload.
pub fn make_instance(
    global: &GlobalData,
    gc: &mut GarbageCollector,
    class_id: ClassId,
) -> DataId {
    let class = global.class(class_id);
    let finalize = class.find_operator(Operator::Delete).is_some();
    let metatype = class.metatype();

    let slot_infos: Vec<_> = class.slots().map(|member| member.value.raw_alias()).collect();
    let mut slots = Vec::with_capacity(slot_infos.len());
    for default in &slot_infos {
        slots.push(gc.clone_reference(default));
    }

    let payload = default_payload(metatype);
    gc.alloc(Data::Object(Object {
        class: class_id,
        slots: Some(slots.into_boxed_slice()),
        payload,
        finalize,
    }))
}

fn default_payload(metatype: Metatype) -> Payload {
    use crate::memory::builtin::hash::HashPayload;
    use crate::memory::builtin::iterator::IteratorPayload;
    match metatype {
        Metatype::Object => Payload::Plain,
        Metatype::String => Payload::Str(String::new()),
        Metatype::Regex => Payload::Regex(Default::default()),
        Metatype::Array => Payload::Array(Vec::new()),
        Metatype::Hash => Payload::Hash(HashPayload::new()),
        Metatype::Iterator => Payload::Iterator(IteratorPayload::items(Default::default())),
        Metatype::Library => Payload::Library(None),
        Metatype::LibObject => Payload::LibObject(Default::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_indices_round_trip() {
        for index in 0..OPERATOR_COUNT {
            let op = Operator::from_index(index).unwrap();
            assert_eq!(op.index(), index);
        }
        assert!(Operator::from_index(OPERATOR_COUNT).is_none());
    }

    #[test]
    fn operator_symbols_are_distinct() {
        for i in 0..OPERATOR_COUNT {
            for j in (i + 1)..OPERATOR_COUNT {
                let a = Operator::from_index(i).unwrap();
                let b = Operator::from_index(j).unwrap();
                assert_ne!(a.symbol(), b.symbol());
            }
        }
    }

    #[test]
    fn operator_symbol_lookup_round_trips() {
        assert_eq!(
            Operator::from_symbol(Operator::Add.symbol()),
            Some(Operator::Add)
        );
        assert_eq!(Operator::from_symbol(Symbol::intern("no_such_op")), None);
    }

    #[test]
    fn class_name_strips_package_path() {
        let class = Class::new(PackageId(0), "pkg.sub.Widget", Metatype::Object);
        assert_eq!(class.name().as_str(), "Widget");
        assert_eq!(class.full_name(), "pkg.sub.Widget");
    }
}
