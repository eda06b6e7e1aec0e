//! Interned identifiers.
//!
//! Every source identifier is interned once into a small numeric handle, the
//! way `mmcc`'s own `Symbol`/`intern` pair works. Comparisons and hashing on
//! `Symbol` are `u32` comparisons; `Ord` falls back to the resolved string so
//! that capture lists sort by identifier name, not by interning order (the
//! capture-ordering invariant needs a stable, name-based order).

use std::cmp::Ordering;
use std::fmt;
use std::sync::{LazyLock, Mutex};
use hashbrown::HashMap;

/// An interned identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symbol(u32);

struct Interner {
  names: Vec<&'static str>,
  ids: HashMap<&'static str, u32>,
}

impl Interner {
  fn new() -> Self { Self { names: Vec::new(), ids: HashMap::new() } }

  fn intern(&mut self, s: &str) -> Symbol {
    if let Some(&id) = self.ids.get(s) {
      return Symbol(id);
    }
    let id = u32::try_from(self.names.len()).expect("too many distinct identifiers");
    let leaked: &'static str = Box::leak(s.to_owned().into_boxed_str());
    self.names.push(leaked);
    self.ids.insert(leaked, id);
    Symbol(id)
  }

  fn resolve(&self, sym: Symbol) -> &'static str { self.names[sym.0 as usize] }
}

static INTERNER: LazyLock<Mutex<Interner>> = LazyLock::new(|| Mutex::new(Interner::new()));

/// Interns `s`, returning the `Symbol` handle for it.
pub fn intern(s: &str) -> Symbol {
  INTERNER.lock().expect("interner poisoned").intern(s)
}

impl Symbol {
  /// Returns the original string this symbol was interned from.
  ///
  /// Identifiers are interned for the process lifetime, so the returned
  /// reference is genuinely `'static`.
  #[must_use] pub fn as_str(self) -> &'static str {
    INTERNER.lock().expect("interner poisoned").resolve(self)
  }
}

impl fmt::Display for Symbol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl PartialOrd for Symbol {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for Symbol {
  fn cmp(&self, other: &Self) -> Ordering { self.as_str().cmp(other.as_str()) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_is_idempotent() {
    let a = intern("foo");
    let b = intern("foo");
    let c = intern("bar");
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(a.as_str(), "foo");
  }

  #[test]
  fn ordering_is_lexicographic_by_name() {
    let z = intern("zzz_unique_sym");
    let a = intern("aaa_unique_sym");
    assert!(a < z);
  }
}
