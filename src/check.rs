//! Hindley-Milner type inference over the AST (spec §4.2).

use hashbrown::HashMap;
use crate::ast::{Expr, ExprKind};
use crate::error::{Error, Result};
use crate::symbol::Symbol;
use crate::types::{Env, Type, UnifierSet};
use crate::types::typ::Var;

pub struct Checker {
  pub unifier: UnifierSet,
  env: Env,
}

impl Checker {
  #[must_use] pub fn new() -> Self {
    let mut checker = Self { unifier: UnifierSet::new(), env: Env::new() };
    crate::std_env::install(&mut checker);
    checker
  }

  pub fn bind_prelude(&mut self, name: Symbol, ty: Type) {
    self.env.bind(name, ty);
  }

  /// Runs `f` with a fresh innermost scope, guaranteeing the scope is popped
  /// on every exit path, including an `Err` return from `f` (spec §5's
  /// scoped-acquisition-with-guaranteed-restore contract).
  fn with_scope<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
    self.env.push_scope();
    let result = f(self);
    self.env.pop_scope();
    result
  }

  /// Marks `var` non-generic for the duration of `f`, then restores its
  /// previous generic status regardless of how `f` returns.
  fn with_non_generic<T>(&mut self, var: Var, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
    let was_non_generic = self.unifier.is_non_generic(var);
    self.unifier.make_non_generic(&Type::Var(var));
    let result = f(self);
    if !was_non_generic { self.unifier.make_generic(var); }
    result
  }

  /// Duplicates `t` for let-polymorphic instantiation: generic variables are
  /// copied fresh (consistently, via `subst`), non-generic ones and concrete
  /// constructors are rebuilt with their children duplicated the same way.
  fn duplicate_type(&mut self, t: &Type, subst: &mut HashMap<Var, Type>) -> Type {
    let t = self.unifier.concretize(t);
    match t {
      Type::Var(v) => {
        if self.unifier.is_non_generic(v) {
          Type::Var(v)
        } else if let Some(fresh) = subst.get(&v) {
          fresh.clone()
        } else {
          let fresh = self.unifier.fresh_var(false);
          subst.insert(v, fresh.clone());
          fresh
        }
      }
      Type::Fn(a, b) => Type::fn_of(self.duplicate_type(&a, subst), self.duplicate_type(&b, subst)),
      Type::Tuple(ts) => Type::Tuple(ts.iter().map(|x| self.duplicate_type(x, subst)).collect()),
      Type::List(x) => Type::List(Box::new(self.duplicate_type(&x, subst))),
      concrete => concrete,
    }
  }

  /// Infers the type of `expr`, caching the (non-concretized) result on the
  /// node and returning the concretized type.
  pub fn infer_type(&mut self, expr: &Expr) -> Result<Type> {
    let raw = self.infer_raw(expr)?;
    *expr.ty_cache.borrow_mut() = Some(raw.clone());
    Ok(self.unifier.concretize(&raw))
  }

  fn infer_raw(&mut self, expr: &Expr) -> Result<Type> {
    match &expr.kind {
      ExprKind::Const(_, t) => Ok(t.clone()),

      ExprKind::Ident(x) => {
        let looked_up = self.env.lookup(*x).cloned().ok_or(Error::UnknownSymbol(*x))?;
        let mut subst = HashMap::new();
        Ok(self.duplicate_type(&looked_up, &mut subst))
      }

      ExprKind::Lambda(p, body) => {
        let param_ty = self.unifier.fresh_var(false);
        let Type::Var(param_var) = param_ty.clone() else { unreachable!() };
        self.with_scope(|checker| {
          checker.env.bind(*p, param_ty.clone());
          checker.with_non_generic(param_var, |checker| {
            let body_t = checker.infer_type(body)?;
            Ok(Type::fn_of(checker.unifier.concretize(&param_ty), body_t))
          })
        })
      }

      ExprKind::Call(f, a) => {
        let a_t = self.infer_type(a)?;
        let ret = self.unifier.fresh_var(false);
        let f_t = self.infer_type(f)?;
        self.unifier.unify(&f_t, &Type::fn_of(a_t, ret.clone()))?;
        Ok(self.unifier.concretize(&ret))
      }

      ExprKind::If(p, y, n) => {
        let p_t = self.infer_type(p)?;
        self.unifier.unify(&p_t, &Type::Bool)?;
        let y_t = self.infer_type(y)?;
        let n_t = self.infer_type(n)?;
        self.unifier.unify(&y_t, &n_t)?;
        Ok(self.unifier.concretize(&y_t))
      }

      ExprKind::Let { name, rhs, body, .. } => {
        self.with_scope(|checker| {
          let bind_var = checker.unifier.fresh_var(false);
          let Type::Var(bind_id) = bind_var.clone() else { unreachable!() };
          checker.env.bind(*name, bind_var.clone());
          // `bind_id` is non-generic only for the duration of inferring `rhs`
          // (so a recursive reference to `name` isn't prematurely
          // generalized); it must already be generalized again by the time
          // we unify against `rhs_t`, or that unification would propagate
          // non-genericness into `rhs_t`'s own variables and permanently
          // block let-polymorphism on them.
          let rhs_t = checker.with_non_generic(bind_id, |checker| checker.infer_type(rhs))?;
          checker.unifier.unify(&bind_var, &rhs_t)?;
          checker.infer_type(body)
        })
      }

      ExprKind::TupleLit(vs) => {
        let tys = vs.iter().map(|v| self.infer_type(v)).collect::<Result<Vec<_>>>()?;
        Ok(Type::Tuple(tys))
      }

      ExprKind::LetStmt { name, rhs, .. } => {
        let bind_var = self.unifier.fresh_var(false);
        let Type::Var(bind_id) = bind_var.clone() else { unreachable!() };
        self.env.bind(*name, bind_var.clone());
        let rhs_t = self.with_non_generic(bind_id, |checker| checker.infer_type(rhs))?;
        self.unifier.unify(&bind_var, &rhs_t)?;
        Ok(Type::Unit)
      }

      ExprKind::TopLevelStmts(stmts) => {
        let mut last = Type::Unit;
        for stmt in stmts { last = self.infer_type(stmt)?; }
        Ok(last)
      }
    }
  }
}

impl Default for Checker {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::{Expr, Literal};
  use crate::symbol::intern;

  fn ident(name: &str) -> Expr { Expr::new(ExprKind::Ident(intern(name))) }
  fn int(v: i64) -> Expr { Expr::new(ExprKind::Const(Literal::Int(v), Type::Int)) }

  #[test]
  fn identity_lambda_is_polymorphic_across_two_uses() {
    let mut checker = Checker::new();
    let id = intern("id");
    let lambda = Expr::new(ExprKind::Lambda(intern("x"), Box::new(ident("x"))));
    let body = Expr::new(ExprKind::TupleLit(vec![
      Expr::new(ExprKind::Call(Box::new(ident("id")), Box::new(int(1)))),
      Expr::new(ExprKind::Call(
        Box::new(ident("id")),
        Box::new(Expr::new(ExprKind::Const(Literal::Bool(true), Type::Bool))),
      )),
    ]));
    let expr = Expr::new(ExprKind::Let { name: id, rhs: Box::new(lambda), body: Box::new(body), recursive: false });
    let t = checker.infer_type(&expr).unwrap();
    assert_eq!(t, Type::Tuple(vec![Type::Int, Type::Bool]));
  }

  #[test]
  fn if_branches_must_unify() {
    let mut checker = Checker::new();
    let expr = Expr::new(ExprKind::If(
      Box::new(Expr::new(ExprKind::Const(Literal::Bool(true), Type::Bool))),
      Box::new(int(1)),
      Box::new(Expr::new(ExprKind::Const(Literal::Bool(false), Type::Bool))),
    ));
    assert!(checker.infer_type(&expr).is_err());
  }

  #[test]
  fn unknown_identifier_is_an_error() {
    let mut checker = Checker::new();
    assert!(matches!(checker.infer_type(&ident("totally_unbound")), Err(Error::UnknownSymbol(_))));
  }

  #[test]
  fn prelude_plus_is_typed_over_int_tuple() {
    let mut checker = Checker::new();
    let call = Expr::new(ExprKind::Call(
      Box::new(ident("+")),
      Box::new(Expr::new(ExprKind::TupleLit(vec![int(1), int(2)]))),
    ));
    assert_eq!(checker.infer_type(&call).unwrap(), Type::Int);
  }
}
