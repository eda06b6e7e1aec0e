//! Inferred-type-decorated AST (spec §3, §4.2, §4.4).

use std::cell::RefCell;
use std::collections::BTreeSet;
use crate::symbol::Symbol;
use crate::types::Type;

/// A literal constant; the surface grammar only produces integers and
/// booleans, but the node carries its own type so `Const` stays uniform.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
  Int(i64),
  Bool(bool),
}

#[derive(Debug)]
pub struct Expr {
  pub kind: ExprKind,
  /// Filled in by the type checker; `None` until `infer_type` runs on this
  /// node.
  pub ty_cache: RefCell<Option<Type>>,
}

#[derive(Debug)]
pub enum ExprKind {
  Const(Literal, Type),
  Ident(Symbol),
  Lambda(Symbol, Box<Expr>),
  Call(Box<Expr>, Box<Expr>),
  If(Box<Expr>, Box<Expr>, Box<Expr>),
  Let { name: Symbol, rhs: Box<Expr>, body: Box<Expr>, recursive: bool },
  TupleLit(Vec<Expr>),
  LetStmt { name: Symbol, rhs: Box<Expr>, recursive: bool },
  TopLevelStmts(Vec<Expr>),
}

impl Expr {
  #[must_use] pub fn new(kind: ExprKind) -> Self { Self { kind, ty_cache: RefCell::new(None) } }

  /// The set of free identifiers referenced by this node (spec §4.4).
  #[must_use] pub fn captures(&self) -> BTreeSet<Symbol> {
    match &self.kind {
      ExprKind::Const(..) => BTreeSet::new(),
      ExprKind::Ident(x) => BTreeSet::from([*x]),
      ExprKind::Lambda(p, body) => {
        let mut s = body.captures();
        s.remove(p);
        s
      }
      ExprKind::Call(f, a) => {
        if let ExprKind::Ident(name) = &f.kind
          && crate::intrinsics::is_direct_primitive_call(name.as_str(), a)
        {
          return a.captures(); // the callee is a fast-pathed intrinsic, never an environment reference
        }
        union(f.captures(), a.captures())
      }
      ExprKind::If(p, y, n) => union(union(p.captures(), y.captures()), n.captures()),
      ExprKind::Let { name, rhs, body, .. } => {
        let mut s = union(rhs.captures(), body.captures());
        s.remove(name);
        s
      }
      ExprKind::TupleLit(vs) => vs.iter().fold(BTreeSet::new(), |acc, v| union(acc, v.captures())),
      ExprKind::LetStmt { name, rhs, .. } => {
        let mut s = rhs.captures();
        s.remove(name); // the bound name isn't captured, even when recursive
        s
      }
      ExprKind::TopLevelStmts(stmts) =>
        stmts.iter().fold(BTreeSet::new(), |acc, s| union(acc, s.captures())),
    }
  }
}

fn union(mut a: BTreeSet<Symbol>, b: BTreeSet<Symbol>) -> BTreeSet<Symbol> {
  a.extend(b);
  a
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::symbol::intern;

  fn ident(name: &str) -> Expr { Expr::new(ExprKind::Ident(intern(name))) }

  #[test]
  fn lambda_excludes_its_own_parameter() {
    let p = intern("x");
    let lam = Expr::new(ExprKind::Lambda(p, Box::new(ident("x"))));
    assert!(lam.captures().is_empty());
  }

  #[test]
  fn lambda_captures_free_outer_identifier() {
    let p = intern("x");
    let lam = Expr::new(ExprKind::Lambda(p, Box::new(ident("y"))));
    assert_eq!(lam.captures(), BTreeSet::from([intern("y")]));
  }

  #[test]
  fn recursive_let_stmt_does_not_self_capture() {
    let f = intern("f");
    let stmt = Expr::new(ExprKind::LetStmt {
      name: f,
      rhs: Box::new(Expr::new(ExprKind::Lambda(intern("n"), Box::new(ident("f"))))),
      recursive: true,
    });
    assert!(stmt.captures().is_empty());
  }

  #[test]
  fn let_excludes_bound_name_from_both_sides() {
    let x = intern("x");
    let let_expr = Expr::new(ExprKind::Let {
      name: x,
      rhs: Box::new(ident("x")),
      body: Box::new(ident("x")),
      recursive: false,
    });
    assert!(let_expr.captures().is_empty());
  }
}
