//! Installs prelude closures into `main`'s locals before user code runs
//! (spec §4.3). Direct two-argument calls to `+ - * div mod =` are
//! recognized and fast-pathed at the call site instead of going through
//! `CallClosure` (see `build_lir::lower_call`); these closures exist so the
//! same identifiers still work when used as values rather than called
//! immediately.

use hashbrown::HashMap;
use crate::error::Result;
use crate::symbol::{intern, Symbol};
use super::gen_ctx::LirBuilder;
use super::{ArithOp, Instr, Label, Temp64, Value};

pub fn install(builder: &mut LirBuilder) -> Result<()> {
  install_exit(builder)?;
  install_print_int(builder)?;
  install_curried_arith(builder, "+", ArithOp::Add)?;
  install_curried_arith(builder, "-", ArithOp::Sub)?;
  install_curried_arith(builder, "*", ArithOp::Mul)?;
  install_curried_arith(builder, "div", ArithOp::Div)?;
  install_curried_arith(builder, "mod", ArithOp::Mod)?;
  install_curried_arith(builder, "times", ArithOp::Mul)?;
  install_curried_eq(builder, "=")?;
  install_unary_arith_imm(builder, "succ", ArithOp::Add, 1)?;
  install_unary_arith_imm(builder, "pred", ArithOp::Sub, 1)?;
  install_unary_eq_zero(builder, "zero")?;
  install_unary_eq_zero(builder, "null")?;
  install_tail(builder)?;
  install_pair(builder)?;
  Ok(())
}

/// Binds `name` in `main`'s locals to a freshly created closure over
/// `label`, capturing nothing.
fn bind_top_level_closure(builder: &mut LirBuilder, name: Symbol, label: Label) {
  let res = builder.fresh_temp();
  builder.emit(Instr::CreateClosure { label, captures: Vec::new(), res, recursive: false });
  builder.bind_local(name, Value::Temp64(res));
}

fn install_exit(builder: &mut LirBuilder) -> Result<()> {
  let ((), label) = builder.with_new_fn(Some(intern("exit")), HashMap::new(), |b| {
    b.emit(Instr::Exit { code: Value::Temp64(Temp64::Param) });
    b.emit(Instr::Return { value: Value::Temp0 });
    Ok(())
  })?;
  bind_top_level_closure(builder, intern("exit"), label);
  Ok(())
}

fn install_print_int(builder: &mut LirBuilder) -> Result<()> {
  let fmt = builder.print_int_fmt_label();
  let ((), label) = builder.with_new_fn(Some(intern("print_int")), HashMap::new(), |b| {
    b.emit(Instr::PrintInt { value: Value::Temp64(Temp64::Param), fmt });
    b.emit(Instr::Return { value: Value::Temp0 });
    Ok(())
  })?;
  bind_top_level_closure(builder, intern("print_int"), label);
  Ok(())
}

/// `x -> y -> x op y`: the outer function returns a closure over `x` that,
/// given `y`, emits the arithmetic instruction.
fn install_curried_arith(builder: &mut LirBuilder, name: &str, op: ArithOp) -> Result<()> {
  let sym = intern(name);
  let ((), outer_label) = builder.with_new_fn(Some(sym), HashMap::new(), |b| {
    let ((), inner_label) = b.with_new_fn(None, HashMap::new(), |b| {
      let x = b.fresh_temp();
      b.emit(Instr::EnvLookup { index: 0, res: x });
      let res = b.fresh_temp();
      let a = Value::Temp64(x);
      let bb = Value::Temp64(Temp64::Param);
      let instr = match op {
        ArithOp::Add | ArithOp::Sub => Instr::AddSub { op, a, b: bb, res },
        ArithOp::Mul | ArithOp::Div | ArithOp::Mod => Instr::MulDivMod { op, a, b: bb, res },
      };
      b.emit(instr);
      b.emit(Instr::Return { value: Value::Temp64(res) });
      Ok(())
    })?;
    let closure = b.fresh_temp();
    b.emit(Instr::CreateClosure {
      label: inner_label,
      captures: vec![Value::Temp64(Temp64::Param)],
      res: closure,
      recursive: false,
    });
    b.emit(Instr::Return { value: Value::Temp64(closure) });
    Ok(())
  })?;
  bind_top_level_closure(builder, sym, outer_label);
  Ok(())
}

fn install_curried_eq(builder: &mut LirBuilder, name: &str) -> Result<()> {
  let sym = intern(name);
  let ((), outer_label) = builder.with_new_fn(Some(sym), HashMap::new(), |b| {
    let ((), inner_label) = b.with_new_fn(None, HashMap::new(), |b| {
      let x = b.fresh_temp();
      b.emit(Instr::EnvLookup { index: 0, res: x });
      let res = b.fresh_temp();
      b.emit(Instr::EqI64 { a: Value::Temp64(x), b: Value::Temp64(Temp64::Param), res });
      b.emit(Instr::Return { value: Value::Temp64(res) });
      Ok(())
    })?;
    let closure = b.fresh_temp();
    b.emit(Instr::CreateClosure {
      label: inner_label,
      captures: vec![Value::Temp64(Temp64::Param)],
      res: closure,
      recursive: false,
    });
    b.emit(Instr::Return { value: Value::Temp64(closure) });
    Ok(())
  })?;
  bind_top_level_closure(builder, sym, outer_label);
  Ok(())
}

/// `x -> x op imm`, e.g. `succ = x -> x + 1`.
fn install_unary_arith_imm(builder: &mut LirBuilder, name: &str, op: ArithOp, imm: i64) -> Result<()> {
  let sym = intern(name);
  let ((), label) = builder.with_new_fn(Some(sym), HashMap::new(), |b| {
    let res = b.fresh_temp();
    b.emit(Instr::AddSub { op, a: Value::Temp64(Temp64::Param), b: Value::I64(imm), res });
    b.emit(Instr::Return { value: Value::Temp64(res) });
    Ok(())
  })?;
  bind_top_level_closure(builder, sym, label);
  Ok(())
}

/// `x -> x == 0`; used for both `zero` (Peano naturals) and `null` (the list
/// convention: a pointer-sized 0 marks the empty list).
fn install_unary_eq_zero(builder: &mut LirBuilder, name: &str) -> Result<()> {
  let sym = intern(name);
  let ((), label) = builder.with_new_fn(Some(sym), HashMap::new(), |b| {
    let res = b.fresh_temp();
    b.emit(Instr::EqI64 { a: Value::Temp64(Temp64::Param), b: Value::I64(0), res });
    b.emit(Instr::Return { value: Value::Temp64(res) });
    Ok(())
  })?;
  bind_top_level_closure(builder, sym, label);
  Ok(())
}

/// `xs -> *(xs + 1*8)`: a non-empty list is a two-slot cons cell
/// `[head][tail]`; the empty list is the null pointer (see `zero`/`null`).
fn install_tail(builder: &mut LirBuilder) -> Result<()> {
  let sym = intern("tail");
  let ((), label) = builder.with_new_fn(Some(sym), HashMap::new(), |b| {
    let res = b.fresh_temp();
    b.emit(Instr::GetElementPtr { ptr: Value::Temp64(Temp64::Param), index: 1, stride: 8, res });
    b.emit(Instr::Return { value: Value::Temp64(res) });
    Ok(())
  })?;
  bind_top_level_closure(builder, sym, label);
  Ok(())
}

/// `u -> v -> (u, v)`.
fn install_pair(builder: &mut LirBuilder) -> Result<()> {
  let sym = intern("pair");
  let ((), outer_label) = builder.with_new_fn(Some(sym), HashMap::new(), |b| {
    let ((), inner_label) = b.with_new_fn(None, HashMap::new(), |b| {
      let u = b.fresh_temp();
      b.emit(Instr::EnvLookup { index: 0, res: u });
      let res = b.fresh_temp();
      b.emit(Instr::CreateTuple { values: vec![Value::Temp64(u), Value::Temp64(Temp64::Param)], res });
      b.emit(Instr::Return { value: Value::Temp64(res) });
      Ok(())
    })?;
    let closure = b.fresh_temp();
    b.emit(Instr::CreateClosure {
      label: inner_label,
      captures: vec![Value::Temp64(Temp64::Param)],
      res: closure,
      recursive: false,
    });
    b.emit(Instr::Return { value: Value::Temp64(closure) });
    Ok(())
  })?;
  bind_top_level_closure(builder, sym, outer_label);
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn install_binds_every_prelude_name_in_main() {
    let mut builder = LirBuilder::new();
    install(&mut builder).unwrap();
    for name in ["exit", "print_int", "+", "-", "*", "div", "mod", "times", "=",
                 "succ", "pred", "zero", "null", "tail", "pair"] {
      assert!(builder.lookup_local(intern(name)).is_some(), "missing prelude binding for {name}");
    }
  }

  #[test]
  fn install_produces_more_than_just_main() {
    let mut builder = LirBuilder::new();
    install(&mut builder).unwrap();
    let program = builder.finish();
    assert!(program.fns.len() > 1);
  }
}
