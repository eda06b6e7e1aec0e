//! Disjoint-set forest over type terms (spec §3, §4.1).
//!
//! Unlike a textbook union-find, elements here are whole [`Type`] terms, not
//! just variables: a root can be a concrete constructor, and `join` always
//! prefers a concrete root over a `Var` root regardless of subtree weight.
//! A parallel `non_generic` set tracks which variables are currently
//! ineligible for let-generalization (Cardelli 1988).

use hashbrown::{HashMap, HashSet};
use log::trace;
use crate::error::{Error, Result};
use super::typ::{Type, Var};

#[derive(Debug)]
enum Entry {
  Root { size: u32 },
  Child(Type),
}

#[derive(Debug, Default)]
pub struct UnifierSet {
  map: HashMap<Type, Entry>,
  non_generic: HashSet<Var>,
  next_var: u32,
}

impl UnifierSet {
  #[must_use] pub fn new() -> Self { Self::default() }

  /// Allocates a fresh variable, numbered from a single global counter
  /// (rendered as a Greek-letter stream on `Display`). Non-generic unless
  /// `non_generic` is set.
  pub fn fresh_var(&mut self, non_generic: bool) -> Type {
    let v = Var(self.next_var);
    self.next_var += 1;
    let t = Type::Var(v);
    self.add(t.clone());
    if non_generic { self.non_generic.insert(v); }
    t
  }

  fn add(&mut self, t: Type) {
    self.map.entry(t).or_insert(Entry::Root { size: 1 });
  }

  fn root_of(&mut self, t: &Type) -> Type {
    match self.map.get(t) {
      None | Some(Entry::Root { .. }) => t.clone(),
      Some(Entry::Child(parent)) => {
        let parent = parent.clone();
        let root = self.root_of(&parent);
        self.map.insert(t.clone(), Entry::Child(root.clone())); // path compression
        root
      }
    }
  }

  fn size_of(&self, t: &Type) -> u32 {
    match self.map.get(t) {
      Some(Entry::Root { size }) => *size,
      _ => 1,
    }
  }

  fn occurs_in_type(&self, needle: &Type, t: &Type) -> bool {
    if needle == t { return true; }
    match t {
      Type::Fn(a, b) => self.occurs_in_type(needle, a) || self.occurs_in_type(needle, b),
      Type::Tuple(ts) => ts.iter().any(|x| self.occurs_in_type(needle, x)),
      Type::List(x) => self.occurs_in_type(needle, x),
      _ => false,
    }
  }

  /// Recursively adds every `Var` contained in `t` to the non-generic set.
  pub fn make_non_generic(&mut self, t: &Type) {
    match t {
      Type::Var(v) => { self.non_generic.insert(*v); }
      Type::Fn(a, b) => { self.make_non_generic(a); self.make_non_generic(b); }
      Type::Tuple(ts) => ts.iter().for_each(|x| self.make_non_generic(x)),
      Type::List(x) => self.make_non_generic(x),
      _ => {}
    }
  }

  pub fn make_generic(&mut self, v: Var) { self.non_generic.remove(&v); }

  #[must_use] pub fn is_non_generic(&self, v: Var) -> bool { self.non_generic.contains(&v) }

  /// Structural unification with an occurs check.
  pub fn unify(&mut self, t1: &Type, t2: &Type) -> Result<()> {
    if let Type::Var(v1) = t1 {
      self.add(t1.clone());
      self.add(t2.clone());

      // "In unifying a non-generic type variable to a term, all the type
      // variables contained in that term become non-generic." (Cardelli 1988)
      if self.is_non_generic(*v1) {
        let t2 = t2.clone();
        self.make_non_generic(&t2);
      }
      if let Type::Var(v2) = t2
        && self.is_non_generic(*v2)
      {
        let t1 = t1.clone();
        self.make_non_generic(&t1);
      }

      if t1 == t2 { return Ok(()); } // already identical, nothing to join
      if self.occurs_in_type(t1, t2) { return Err(Error::RecursiveType); }
      self.join(t1.clone(), t2.clone())
    } else if matches!(t2, Type::Var(_)) {
      self.unify(t2, t1)
    } else {
      self.unify_constructors(t1, t2)
    }
  }

  fn unify_constructors(&mut self, t1: &Type, t2: &Type) -> Result<()> {
    match (t1, t2) {
      (Type::Int, Type::Int) | (Type::Bool, Type::Bool) | (Type::Unit, Type::Unit) => Ok(()),
      (Type::Fn(a1, b1), Type::Fn(a2, b2)) => { self.unify(a1, a2)?; self.unify(b1, b2) }
      (Type::Tuple(xs), Type::Tuple(ys)) if xs.len() == ys.len() =>
        xs.iter().zip(ys).try_for_each(|(x, y)| self.unify(x, y)),
      (Type::List(a), Type::List(b)) => self.unify(a, b),
      _ => Err(Error::TypeMismatch(t1.clone(), t2.clone())),
    }
  }

  fn join(&mut self, t1: Type, t2: Type) -> Result<()> {
    let r1 = self.root_of(&t1);
    let r2 = self.root_of(&t2);
    self.join_roots(r1, r2)
  }

  fn join_roots(&mut self, r1: Type, r2: Type) -> Result<()> {
    trace!("join_roots: {:?} <-> {:?}", r1, r2);
    match (matches!(r1, Type::Var(_)), matches!(r2, Type::Var(_))) {
      (true, false) => { // r2 is concrete, it wins regardless of weight
        let size1 = self.size_of(&r1);
        self.bump_size(&r2, size1);
        self.map.insert(r1, Entry::Child(r2));
        Ok(())
      }
      (false, true) => {
        let size2 = self.size_of(&r2);
        self.bump_size(&r1, size2);
        self.map.insert(r2, Entry::Child(r1));
        Ok(())
      }
      (true, true) => { // weighted union to keep the forest shallow
        let (s1, s2) = (self.size_of(&r1), self.size_of(&r2));
        if s1 > s2 {
          self.bump_size(&r1, s2);
          self.map.insert(r2, Entry::Child(r1));
        } else {
          self.bump_size(&r2, s1);
          self.map.insert(r1, Entry::Child(r2));
        }
        Ok(())
      }
      (false, false) => self.unify_constructors(&r1, &r2),
    }
  }

  fn bump_size(&mut self, root: &Type, by: u32) {
    if let Some(Entry::Root { size }) = self.map.get_mut(root) {
      *size += by;
    }
  }

  /// Recursively replaces every `Var` in `t` with the concrete term at its
  /// root. Idempotent: `concretize(concretize(t)) == concretize(t)`.
  pub fn concretize(&mut self, t: &Type) -> Type {
    match t {
      Type::Var(_) => {
        let r = self.root_of(t);
        if &r == t { r } else { self.concretize(&r) }
      }
      Type::Fn(a, b) => Type::fn_of(self.concretize(a), self.concretize(b)),
      Type::Tuple(ts) => Type::Tuple(ts.iter().map(|x| self.concretize(x)).collect()),
      Type::List(x) => Type::List(Box::new(self.concretize(x))),
      _ => t.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn unify_var_with_concrete_picks_concrete_root() {
    let mut u = UnifierSet::new();
    let a = u.fresh_var(false);
    u.unify(&a, &Type::Int).unwrap();
    assert_eq!(u.concretize(&a), Type::Int);
  }

  #[test]
  fn concretize_is_idempotent() {
    let mut u = UnifierSet::new();
    let a = u.fresh_var(false);
    let b = u.fresh_var(false);
    u.unify(&a, &Type::Tuple(vec![b.clone(), Type::Int])).unwrap();
    let once = u.concretize(&a);
    let twice = u.concretize(&once);
    assert_eq!(once, twice);
  }

  #[test]
  fn occurs_check_rejects_recursive_type() {
    let mut u = UnifierSet::new();
    let a = u.fresh_var(false);
    let wrapped = Type::Tuple(vec![a.clone()]);
    assert!(matches!(u.unify(&a, &wrapped), Err(Error::RecursiveType)));
  }

  #[test]
  fn arity_mismatch_is_a_type_error() {
    let mut u = UnifierSet::new();
    let t1 = Type::Tuple(vec![Type::Int]);
    let t2 = Type::Tuple(vec![Type::Int, Type::Bool]);
    assert!(matches!(u.unify(&t1, &t2), Err(Error::TypeMismatch(..))));
  }

  #[test]
  fn non_genericness_propagates_into_unified_term() {
    let mut u = UnifierSet::new();
    let a = u.fresh_var(true);
    let b = u.fresh_var(false);
    u.unify(&a, &Type::Fn(Box::new(b.clone()), Box::new(Type::Int))).unwrap();
    let Type::Var(bv) = b else { unreachable!() };
    assert!(u.is_non_generic(bv));
  }
}
