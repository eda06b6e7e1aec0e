//! Recognizes direct-call-shape primitives: `exit`, `print_int`, and the
//! tupled binary operators the grammar desugars `a + b` etc. into. Both
//! capture analysis (`ast::Expr::captures`) and LIR lowering (`build_lir`)
//! need to agree on which `Call(Ident(name), arg)` nodes are emitted as a
//! direct intrinsic instruction rather than a generic closure call, since a
//! fast-pathed callee is never read out of the environment.

use crate::ast::{Expr, ExprKind};

#[must_use] pub fn is_direct_primitive_call(name: &str, arg: &Expr) -> bool {
  match name {
    "exit" | "print_int" => true,
    "=" | "+" | "-" | "*" | "div" | "mod" =>
      matches!(&arg.kind, ExprKind::TupleLit(elems) if elems.len() == 2),
    _ => false,
  }
}
