//! The type term universe (spec §3): ground types, type variables, and the
//! fixed-arity compound constructors built from them.

use std::fmt;

/// A fresh type variable. Identity is by `id` alone; the display name is
/// derived from `id` via a Greek-letter stream (α, β, …, α₁, β₁, …).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub u32);

const GREEK: [char; 24] = [
  'α', 'β', 'γ', 'δ', 'ε', 'ζ', 'η', 'θ', 'ι', 'κ', 'λ', 'μ',
  'ν', 'ξ', 'ο', 'π', 'ρ', 'σ', 'τ', 'υ', 'φ', 'χ', 'ψ', 'ω',
];

fn subscript(mut n: usize) -> String {
  const DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];
  if n == 0 { return String::new(); }
  let mut digits = Vec::new();
  while n > 0 {
    digits.push(DIGITS[n % 10]);
    n /= 10;
  }
  digits.iter().rev().collect()
}

impl fmt::Display for Var {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let letter = GREEK[self.0 as usize % GREEK.len()];
    let round = self.0 as usize / GREEK.len();
    write!(f, "{letter}{}", subscript(round))
  }
}

/// A type term: a variable, or a constructor of fixed arity applied to
/// recursively-unifiable children. Two terms only unify if they're the same
/// variant with equal arity (spec §3's invariant).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
  Var(Var),
  Int,
  Bool,
  Unit,
  /// Curried function type; always binary.
  Fn(Box<Type>, Box<Type>),
  /// Fixed-arity tuple, `n >= 2` at the syntax level but unconstrained here.
  Tuple(Vec<Type>),
  /// Only ever appears in prelude signatures; there's no list literal in the
  /// surface grammar.
  List(Box<Type>),
}

impl Type {
  #[must_use] pub fn fn_of(arg: Type, ret: Type) -> Type { Type::Fn(Box::new(arg), Box::new(ret)) }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Type::Var(v) => write!(f, "{v}"),
      Type::Int => write!(f, "int"),
      Type::Bool => write!(f, "bool"),
      Type::Unit => write!(f, "unit"),
      Type::Fn(a, b) => write!(f, "({a} -> {b})"),
      Type::Tuple(ts) => {
        write!(f, "(")?;
        for (i, t) in ts.iter().enumerate() {
          if i > 0 { write!(f, " * ")?; }
          write!(f, "{t}")?;
        }
        write!(f, ")")
      }
      Type::List(t) => write!(f, "(list {t})"),
    }
  }
}
