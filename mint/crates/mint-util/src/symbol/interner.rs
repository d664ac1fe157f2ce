//! String interner implementation using DashMap for concurrent access.
//!
//! The interner keeps two views of the same data:
//! - a lock-free forward map (string hash → symbol index) via DashMap,
//! - an indexed reverse table (symbol index → string) behind a read-write
//!   lock, because the runtime resolves symbols to text constantly.
//!
//! All strings the runtime itself depends on are pre-interned during
//! initialization so they never race with user code.

use ahash::AHasher;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use super::{Symbol, KNOWN_SYMBOLS};

/// Global string table instance.
///
/// Initialized on first use via `LazyLock`; runtime-known symbols are
/// pre-interned so their indices are stable and dense.
pub static STRING_TABLE: LazyLock<StringTable> = LazyLock::new(|| {
    let table = StringTable::new();
    for symbol in KNOWN_SYMBOLS {
        table.intern(symbol);
    }
    table
});

/// Thread-safe string table.
///
/// The forward map uses a `u64` AHash key so the common lookup does a single
/// hash probe with no string comparison unless the probe hits.
pub struct StringTable {
    /// string hash → (string, symbol index)
    map: DashMap<u64, (&'static str, u32)>,

    /// symbol index → string; append-only, indexed by `Symbol::index`.
    strings: RwLock<Vec<&'static str>>,
}

impl StringTable {
    fn new() -> Self {
        Self {
            map: DashMap::with_capacity(256),
            strings: RwLock::new(Vec::with_capacity(256)),
        }
    }

    /// Intern a string, returning its symbol.
    ///
    /// If the string is already interned, returns the existing symbol;
    /// otherwise allocates a `'static` copy and a fresh index.
    pub fn intern(&self, string: &str) -> Symbol {
        let hash = Self::hash_string(string);

        // Fast path: already interned.
        if let Some(entry) = self.map.get(&hash) {
            if entry.value().0 == string {
                return Symbol {
                    index: entry.value().1,
                };
            }
        }

        match self.map.entry(hash) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                if entry.get().0 == string {
                    return Symbol {
                        index: entry.get().1,
                    };
                }
                // Hash collision with a different string.
                self.intern_collision(string, hash)
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                let interned: &'static str = Box::leak(string.to_string().into_boxed_str());
                let index = self.push_string(interned);
                entry.insert((interned, index));
                Symbol { index }
            }
        }
    }

    /// Resolve a symbol back to its string.
    ///
    /// # Panics
    ///
    /// Panics if the symbol was not produced by this table. Symbols are only
    /// constructed through interning, so this indicates corruption.
    pub fn resolve(&self, symbol: Symbol) -> &'static str {
        self.strings.read()[symbol.index as usize]
    }

    /// Number of distinct interned strings.
    pub fn len(&self) -> usize {
        self.strings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_string(&self, interned: &'static str) -> u32 {
        let mut strings = self.strings.write();
        let index = u32::try_from(strings.len()).expect("symbol table overflow");
        strings.push(interned);
        index
    }

    /// Collision path: linear probing with a golden-ratio offset.
    fn intern_collision(&self, string: &str, original_hash: u64) -> Symbol {
        const MAX_PROBES: u64 = 32;
        const PROBE_PRIME: u64 = 0x9e3779b97f4a7c15;

        for i in 1u64..=MAX_PROBES {
            let probe_hash = original_hash.wrapping_add(i.wrapping_mul(PROBE_PRIME));

            match self.map.entry(probe_hash) {
                dashmap::mapref::entry::Entry::Occupied(entry) => {
                    if entry.get().0 == string {
                        return Symbol {
                            index: entry.get().1,
                        };
                    }
                }
                dashmap::mapref::entry::Entry::Vacant(entry) => {
                    let interned: &'static str = Box::leak(string.to_string().into_boxed_str());
                    let index = self.push_string(interned);
                    entry.insert((interned, index));
                    return Symbol { index };
                }
            }
        }

        // 32 consecutive collisions on a 64-bit hash space does not happen
        // with a functioning hasher.
        unreachable!("symbol interner probe sequence exhausted");
    }

    fn hash_string(string: &str) -> u64 {
        let mut hasher = AHasher::default();
        string.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn intern_is_idempotent() {
        let s1 = STRING_TABLE.intern("hello");
        let s2 = STRING_TABLE.intern("hello");
        assert_eq!(s1, s2);
    }

    #[test]
    fn resolve_returns_original_text() {
        let sym = STRING_TABLE.intern("resolve_me");
        assert_eq!(STRING_TABLE.resolve(sym), "resolve_me");
    }

    #[test]
    fn empty_string() {
        let sym = STRING_TABLE.intern("");
        assert_eq!(STRING_TABLE.resolve(sym), "");
    }

    #[test]
    fn unicode_strings() {
        for text in ["tëst", "你好", "🦀"] {
            let sym = STRING_TABLE.intern(text);
            assert_eq!(STRING_TABLE.resolve(sym), text);
        }
    }

    #[test]
    fn concurrent_interning_yields_unique_symbols() {
        let handles: Vec<_> = (0..16)
            .map(|i| thread::spawn(move || STRING_TABLE.intern(&format!("concurrent_{i}"))))
            .collect();

        let symbols: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for i in 0..symbols.len() {
            for j in (i + 1)..symbols.len() {
                assert_ne!(symbols[i], symbols[j]);
            }
        }
    }

    #[test]
    fn concurrent_interning_of_same_string_agrees() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| STRING_TABLE.intern("concurrent_same")))
            .collect();

        let symbols: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for symbol in &symbols[1..] {
            assert_eq!(symbols[0], *symbol);
        }
    }

    #[test]
    fn send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<StringTable>();
    }
}
