//! AST→LIR lowering (spec §4.5).

use hashbrown::HashMap;
use log::trace;
use crate::ast::{Expr, ExprKind, Literal};
use crate::check::Checker;
use crate::error::{LoweringError, Result};
use crate::lir::gen_ctx::LirBuilder;
use crate::lir::{ArithOp, Instr, Program, Temp64, Value};
use crate::symbol::Symbol;
use crate::types::Type;

fn arith_op_of(name: &str) -> Option<ArithOp> {
  match name {
    "+" => Some(ArithOp::Add),
    "-" => Some(ArithOp::Sub),
    "*" => Some(ArithOp::Mul),
    "div" => Some(ArithOp::Div),
    "mod" => Some(ArithOp::Mod),
    _ => None,
  }
}

fn expr_type(checker: &mut Checker, e: &Expr) -> Type {
  let cached = e.ty_cache.borrow().clone().expect("lowering a node the checker never visited");
  checker.unifier.concretize(&cached)
}

/// Lowers a fully type-checked top-level program into a `Program`.
pub fn lower(checker: &mut Checker, top: &Expr) -> Result<Program> {
  let mut builder = LirBuilder::new();
  crate::lir::prelude::install(&mut builder)?;
  lower_expr(&mut builder, checker, top)?;
  builder.emit(Instr::Return { value: Value::Temp0 });
  Ok(builder.finish())
}

fn lower_expr(builder: &mut LirBuilder, checker: &mut Checker, expr: &Expr) -> Result<Value> {
  match &expr.kind {
    ExprKind::Const(lit, _) => Ok(match lit {
      Literal::Int(v) => Value::I64(*v),
      Literal::Bool(b) => Value::I64(i64::from(*b)),
    }),

    ExprKind::Ident(x) => lower_ident(builder, *x),

    ExprKind::TupleLit(vs) => {
      let values = vs.iter().map(|v| lower_expr(builder, checker, v)).collect::<Result<Vec<_>>>()?;
      let res = builder.fresh_temp();
      builder.emit(Instr::CreateTuple { values, res });
      Ok(Value::Temp64(res))
    }

    ExprKind::If(p, y, n) => lower_if(builder, checker, expr, p, y, n),

    ExprKind::Call(f, a) => lower_call(builder, checker, expr, f, a),

    ExprKind::Lambda(p, body) => lower_lambda(builder, checker, expr, *p, body).map(Value::Temp64),

    ExprKind::Let { name, rhs, body, recursive } => {
      lower_binding(builder, checker, *name, rhs, *recursive)?;
      lower_expr(builder, checker, body)
    }

    ExprKind::LetStmt { name, rhs, recursive } => {
      lower_binding(builder, checker, *name, rhs, *recursive)?;
      Ok(Value::Temp0)
    }

    ExprKind::TopLevelStmts(stmts) => {
      let mut last = Value::Temp0;
      for stmt in stmts { last = lower_expr(builder, checker, stmt)?; }
      Ok(last)
    }
  }
}

fn lower_ident(builder: &mut LirBuilder, x: Symbol) -> Result<Value> {
  if let Some(v) = builder.lookup_local(x) { return Ok(v); }
  if let Some(index) = builder.capture_index(x) {
    let res = builder.fresh_temp();
    builder.emit(Instr::EnvLookup { index, res });
    return Ok(Value::Temp64(res));
  }
  Err(LoweringError::MissingIdent(x).into())
}

fn lower_if(
  builder: &mut LirBuilder,
  checker: &mut Checker,
  expr: &Expr,
  p: &Expr,
  y: &Expr,
  n: &Expr,
) -> Result<Value> {
  let is_unit = expr_type(checker, expr) == Type::Unit;
  let result = if is_unit { None } else { Some(builder.fresh_temp()) };

  let p_val = lower_expr(builder, checker, p)?;
  let else_lbl = builder.fresh_label();
  let end_lbl = builder.fresh_label();
  builder.emit(Instr::IfFalse { cond: p_val, target: else_lbl });

  let y_val = lower_expr(builder, checker, y)?;
  if let Some(dst) = result { builder.emit(Instr::Assign { dst, src: y_val }); }
  builder.emit(Instr::Goto { target: end_lbl });

  builder.emit(Instr::LabelDef(else_lbl));
  let n_val = lower_expr(builder, checker, n)?;
  if let Some(dst) = result { builder.emit(Instr::Assign { dst, src: n_val }); }

  builder.emit(Instr::LabelDef(end_lbl));
  Ok(result.map_or(Value::Temp0, Value::Temp64))
}

fn lower_call(
  builder: &mut LirBuilder,
  checker: &mut Checker,
  expr: &Expr,
  f: &Expr,
  a: &Expr,
) -> Result<Value> {
  if let ExprKind::Ident(fname) = &f.kind {
    let name = fname.as_str();
    if crate::intrinsics::is_direct_primitive_call(name, a) {
      if name == "exit" {
        let arg_val = lower_expr(builder, checker, a)?;
        builder.emit(Instr::Exit { code: arg_val });
        return Ok(Value::Temp0);
      }
      if name == "print_int" {
        let arg_val = lower_expr(builder, checker, a)?;
        let fmt = builder.print_int_fmt_label();
        builder.emit(Instr::PrintInt { value: arg_val, fmt });
        return Ok(Value::Temp0);
      }
      let ExprKind::TupleLit(elems) = &a.kind else { unreachable!("checked by is_direct_primitive_call") };
      let a1 = lower_expr(builder, checker, &elems[0])?;
      let a2 = lower_expr(builder, checker, &elems[1])?;
      let res = builder.fresh_temp();
      if name == "=" {
        builder.emit(Instr::EqI64 { a: a1, b: a2, res });
      } else {
        let op = arith_op_of(name).expect("checked by is_direct_primitive_call");
        let instr = match op {
          ArithOp::Mul | ArithOp::Div | ArithOp::Mod => Instr::MulDivMod { op, a: a1, b: a2, res },
          ArithOp::Add | ArithOp::Sub => Instr::AddSub { op, a: a1, b: a2, res },
        };
        builder.emit(instr);
      }
      return Ok(Value::Temp64(res));
    }
  }

  let arg_val = lower_expr(builder, checker, a)?;
  let fn_val = lower_expr(builder, checker, f)?;
  let Value::Temp64(fn_temp) = fn_val else {
    return Err(LoweringError::CallNonClosure { value: format!("{fn_val:?}") }.into());
  };
  let ret_is_unit = expr_type(checker, expr) == Type::Unit;
  if ret_is_unit {
    builder.emit(Instr::CallClosure { func: Value::Temp64(fn_temp), arg: arg_val, ret: Value::Temp0 });
    Ok(Value::Temp0)
  } else {
    let ret = builder.fresh_temp();
    builder.emit(Instr::CallClosure { func: Value::Temp64(fn_temp), arg: arg_val, ret: Value::Temp64(ret) });
    Ok(Value::Temp64(ret))
  }
}

/// Lowers a lambda's free variables in the *current* scope, opens a nested
/// function definition for its body, and emits the `CreateClosure` for it in
/// the enclosing function. Shared by bare `Lambda` nodes and `Let`/`LetStmt`
/// bindings whose right-hand side is a lambda.
fn lower_lambda(
  builder: &mut LirBuilder,
  checker: &mut Checker,
  lambda_expr: &Expr,
  param: Symbol,
  body: &Expr,
) -> Result<Temp64> {
  let captured_names: Vec<Symbol> = lambda_expr.captures().into_iter().collect();
  trace!("lower_lambda: captures = {:?}", captured_names);
  let captured_values = captured_names.iter()
    .map(|&name| lower_ident(builder, name))
    .collect::<Result<Vec<_>>>()?;
  let capture_map: HashMap<Symbol, u32> =
    captured_names.iter().enumerate().map(|(i, &n)| (n, i as u32)).collect();

  let ((), label) = builder.with_new_fn(None, capture_map, |b| {
    b.bind_local(param, Value::Temp64(Temp64::Param));
    let body_val = lower_expr(b, checker, body)?;
    b.emit(Instr::Return { value: body_val });
    Ok(())
  })?;

  let res = builder.fresh_temp();
  builder.emit(Instr::CreateClosure { label, captures: captured_values, res, recursive: false });
  Ok(res)
}

/// Lowers the right-hand side of a `Let`/`LetStmt` and binds `name` in the
/// current function's locals. A lambda right-hand side becomes its own
/// function definition (enabling self-recursion via the environment's
/// reserved slot 0 when `recursive`); anything else is lowered in place.
fn lower_binding(
  builder: &mut LirBuilder,
  checker: &mut Checker,
  name: Symbol,
  rhs: &Expr,
  recursive: bool,
) -> Result<()> {
  if let ExprKind::Lambda(param, lam_body) = &rhs.kind {
    let mut captured_names: Vec<Symbol> = rhs.captures().into_iter().collect();
    captured_names.retain(|s| *s != name);
    trace!("lower_binding: {:?} captures = {:?}", name, captured_names);
    let captured_values = captured_names.iter()
      .map(|&n| lower_ident(builder, n))
      .collect::<Result<Vec<_>>>()?;

    let mut capture_map: HashMap<Symbol, u32> = HashMap::new();
    let offset = if recursive { capture_map.insert(name, 0); 1 } else { 0 };
    for (i, &n) in captured_names.iter().enumerate() {
      capture_map.insert(n, offset + i as u32);
    }

    let ((), label) = builder.with_new_fn(Some(name), capture_map, |b| {
      b.bind_local(*param, Value::Temp64(Temp64::Param));
      let body_val = lower_expr(b, checker, lam_body)?;
      b.emit(Instr::Return { value: body_val });
      Ok(())
    })?;

    let res = builder.fresh_temp();
    builder.emit(Instr::CreateClosure { label, captures: captured_values, res, recursive });
    builder.bind_local(name, Value::Temp64(res));
  } else {
    let rhs_val = lower_expr(builder, checker, rhs)?;
    builder.bind_local(name, rhs_val);
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::ast::Literal;
  use crate::symbol::intern;

  fn int(v: i64) -> Expr { Expr::new(ExprKind::Const(Literal::Int(v), Type::Int)) }
  fn ident(name: &str) -> Expr { Expr::new(ExprKind::Ident(intern(name))) }

  fn check_and_lower(top: &Expr) -> Program {
    let mut checker = Checker::new();
    checker.infer_type(top).expect("type checks");
    lower(&mut checker, top).expect("lowers")
  }

  #[test]
  fn closure_over_outer_let_captures_one_value() {
    // let y = 10 ;; let f x = x + y ;; exit (f 20) ;;
    let y = intern("y");
    let f = intern("f");
    let x = intern("x");
    let call_f_20 = Expr::new(ExprKind::Call(Box::new(ident("f")), Box::new(int(20))));
    let exit_call = Expr::new(ExprKind::Call(Box::new(ident("exit")), Box::new(call_f_20)));
    let f_body = Expr::new(ExprKind::Call(
      Box::new(ident("+")),
      Box::new(Expr::new(ExprKind::TupleLit(vec![ident("x"), ident("y")]))),
    ));
    let f_lambda = Expr::new(ExprKind::Lambda(x, Box::new(f_body)));
    let let_f = Expr::new(ExprKind::LetStmt { name: f, rhs: Box::new(f_lambda), recursive: false });
    let let_y = Expr::new(ExprKind::LetStmt {
      name: y,
      rhs: Box::new(int(10)),
      recursive: false,
    });
    let top = Expr::new(ExprKind::TopLevelStmts(vec![let_y, let_f, exit_call]));

    let program = check_and_lower(&top);
    let f_fn = program.fns.iter().find(|fndef| fndef.name == Some(f)).expect("f was lowered");
    assert!(
      f_fn.body.iter().any(|i| matches!(i, Instr::EnvLookup { index: 0, .. })),
      "f's body should read its captured `y` via EnvLookup(0)"
    );
  }

  #[test]
  fn recursive_function_places_self_at_capture_slot_zero() {
    // let rec count n = if n = 0 then 0 else count (n - 1) ;;
    let count = intern("count");
    let n = intern("n");
    let base_case = int(0);
    let recurse = Expr::new(ExprKind::Call(
      Box::new(ident("count")),
      Box::new(Expr::new(ExprKind::Call(
        Box::new(ident("-")),
        Box::new(Expr::new(ExprKind::TupleLit(vec![ident("n"), int(1)]))),
      ))),
    ));
    let cond = Expr::new(ExprKind::Call(
      Box::new(ident("=")),
      Box::new(Expr::new(ExprKind::TupleLit(vec![ident("n"), int(0)]))),
    ));
    let body = Expr::new(ExprKind::If(Box::new(cond), Box::new(base_case), Box::new(recurse)));
    let lambda = Expr::new(ExprKind::Lambda(n, Box::new(body)));
    let let_stmt = Expr::new(ExprKind::LetStmt { name: count, rhs: Box::new(lambda), recursive: true });
    let top = Expr::new(ExprKind::TopLevelStmts(vec![let_stmt]));

    let program = check_and_lower(&top);
    let count_fn = program.fns.iter().find(|fndef| fndef.name == Some(count)).unwrap();
    let main_fn = &program.fns[0];
    let closure = main_fn.body.iter().find_map(|i| match i {
      Instr::CreateClosure { label, recursive: true, captures, .. } if *label == count_fn.label => Some(captures),
      _ => None,
    }).expect("main creates count's recursive closure");
    assert!(closure.is_empty(), "count has no free variables besides itself");
  }
}
