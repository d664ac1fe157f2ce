//! Reference cells.
//!
//! A reference is a handle to an info block `{flags, data, refcount}` living
//! in the collector's info slab. Several references may share one info block
//! (`share`), in which case flag mutations through one are visible through
//! the others.
//!
//! Two reference kinds exist:
//!
//! - [`WeakReference`]: the workhorse. Stack slots, member slots, and
//!   container elements are weak: they keep their datum alive through the
//!   info block's refcount but are not traced as collection roots.
//! - [`StrongReference`]: additionally registered in the collector's root
//!   list for its whole lifetime, so the datum survives a mark-sweep cycle
//!   even when every counted alias is temporarily detached.
//!
//! Reference lifecycles are explicit: construction and disposal go through
//! [`crate::memory::GarbageCollector`] methods, which own the counters. A
//! reference value is inert data; dropping one without handing it back to
//! the collector leaks its count (debug builds assert against it in the
//! collector's bookkeeping tests).

use mint_util::define_index_type;
use std::fmt;
use std::ops::{BitAnd, BitOr};

define_index_type! {
    /// Index of an info block in the collector's info slab.
    pub struct InfoId;
}

define_index_type! {
    /// Index of a registered root in the collector's root list.
    pub struct RootId;
}

/// Reference flag bitfield.
///
/// The three visibility bits form a mutually exclusive field; everything
/// else combines freely.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ReferenceFlags(pub u16);

impl ReferenceFlags {
    pub const DEFAULT: ReferenceFlags = ReferenceFlags(0x000);
    /// The datum pointer may not be replaced.
    pub const CONST_VALUE: ReferenceFlags = ReferenceFlags(0x001);
    /// The reference may not be rebound to another cell.
    pub const CONST_ADDRESS: ReferenceFlags = ReferenceFlags(0x002);
    pub const PRIVATE_VISIBILITY: ReferenceFlags = ReferenceFlags(0x004);
    pub const PROTECTED_VISIBILITY: ReferenceFlags = ReferenceFlags(0x008);
    pub const PACKAGE_VISIBILITY: ReferenceFlags = ReferenceFlags(0x010);
    pub const GLOBAL: ReferenceFlags = ReferenceFlags(0x020);
    /// Move-optimization marker: refcount bumps may be skipped on transfer.
    pub const TEMPORARY: ReferenceFlags = ReferenceFlags(0x040);
    pub const FINAL_MEMBER: ReferenceFlags = ReferenceFlags(0x080);
    pub const OVERRIDE_MEMBER: ReferenceFlags = ReferenceFlags(0x100);

    pub const VISIBILITY_MASK: ReferenceFlags = ReferenceFlags(0x004 | 0x008 | 0x010);

    /// Flag set used for freshly created temporaries.
    pub const CONST_TEMPORARY: ReferenceFlags =
        ReferenceFlags(0x001 | 0x002 | 0x040);

    #[inline]
    pub fn contains(self, other: ReferenceFlags) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn intersects(self, other: ReferenceFlags) -> bool {
        self.0 & other.0 != 0
    }

    /// The visibility bits alone.
    #[inline]
    pub fn visibility(self) -> ReferenceFlags {
        self & Self::VISIBILITY_MASK
    }
}

impl BitOr for ReferenceFlags {
    type Output = ReferenceFlags;

    #[inline]
    fn bitor(self, rhs: ReferenceFlags) -> ReferenceFlags {
        ReferenceFlags(self.0 | rhs.0)
    }
}

impl BitAnd for ReferenceFlags {
    type Output = ReferenceFlags;

    #[inline]
    fn bitand(self, rhs: ReferenceFlags) -> ReferenceFlags {
        ReferenceFlags(self.0 & rhs.0)
    }
}

impl fmt::Debug for ReferenceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReferenceFlags({:#05x})", self.0)
    }
}

/// A counted handle to an info block.
///
/// Not `Clone`: aliasing must go through the collector (`share`, `copy`,
/// `clone_reference`) so the counters stay balanced.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct WeakReference {
    info: InfoId,
}

impl WeakReference {
    /// Crate-internal raw constructor; counters are the caller's business.
    #[inline]
    pub(crate) fn from_raw(info: InfoId) -> Self {
        Self { info }
    }

    /// The info block this reference designates.
    #[inline]
    pub fn info(&self) -> InfoId {
        self.info
    }

    /// Raw alias without touching counters.
    ///
    /// Used by the collector and by mark traversal, where the original
    /// handle provably outlives the alias.
    #[inline]
    pub(crate) fn raw_alias(&self) -> WeakReference {
        WeakReference { info: self.info }
    }
}

/// A weak reference plus a root registration.
///
/// While alive, the collector marks through it on every cycle. Must be
/// released with [`crate::memory::GarbageCollector::release_root`].
#[derive(Debug)]
pub struct StrongReference {
    pub(crate) reference: WeakReference,
    pub(crate) root: RootId,
}

impl StrongReference {
    #[inline]
    pub fn info(&self) -> InfoId {
        self.reference.info()
    }

    /// View as a plain reference for read paths.
    #[inline]
    pub fn as_weak(&self) -> &WeakReference {
        &self.reference
    }

    #[inline]
    pub fn root(&self) -> RootId {
        self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visibility_bits_are_a_mask() {
        let flags = ReferenceFlags::PRIVATE_VISIBILITY | ReferenceFlags::GLOBAL;
        assert_eq!(flags.visibility(), ReferenceFlags::PRIVATE_VISIBILITY);
        assert!(flags.intersects(ReferenceFlags::VISIBILITY_MASK));
    }

    #[test]
    fn const_temporary_combines_three_flags() {
        let flags = ReferenceFlags::CONST_TEMPORARY;
        assert!(flags.contains(ReferenceFlags::CONST_VALUE));
        assert!(flags.contains(ReferenceFlags::CONST_ADDRESS));
        assert!(flags.contains(ReferenceFlags::TEMPORARY));
        assert!(!flags.contains(ReferenceFlags::GLOBAL));
    }

    #[test]
    fn contains_requires_all_bits() {
        let flags = ReferenceFlags::CONST_VALUE;
        assert!(!flags.contains(ReferenceFlags::CONST_TEMPORARY));
        assert!(ReferenceFlags::CONST_TEMPORARY.contains(flags));
    }
}
