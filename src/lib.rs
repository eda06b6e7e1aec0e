//! Compiler for a small ML-family language: parses, infers types, lowers to
//! a low-level IR, and emits x86-64 NASM assembly.

pub mod ast;
pub mod build_lir;
pub mod check;
pub mod codegen;
pub mod error;
pub mod intrinsics;
pub mod lexer;
pub mod lir;
pub mod parser;
pub mod std_env;
pub mod symbol;
pub mod toolchain;
pub mod types;

use log::debug;
use error::Result;

/// Runs the full front end and lowering pipeline, returning emitted NASM
/// source text. Does not touch the filesystem or invoke the toolchain.
pub fn compile_to_asm(src: &str) -> Result<String> {
  debug!("parse: {} bytes of source", src.len());
  let ast = parser::parse(src)?;
  debug!("parse: done");

  debug!("infer: entered");
  let mut checker = check::Checker::new();
  checker.infer_type(&ast)?;
  debug!("infer: done");

  debug!("lower: entered");
  let program = build_lir::lower(&mut checker, &ast)?;
  debug!("lower: done, {} functions, {} statics", program.fns.len(), program.statics.len());

  debug!("emit: entered");
  let asm = codegen::emit(&program);
  debug!("emit: done, {} bytes of assembly", asm.len());
  Ok(asm)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn compiles_every_end_to_end_scenario_without_erroring() {
    let programs = [
      "exit 5;;",
      "exit (2 * (9 div 2 - 7 mod 3));;",
      "let x = 7;; let y = x * 4;; let z = x + y + 45;; exit z;;",
      "let add x y = x + y;; exit (add 100 50);;",
      "let adder x y = x + y;; let plus77 = adder 77;; exit (plus77 99);;",
      "let rec fact n = if n = 1 then 1 else n * (fact (n - 1));; exit (fact 5);;",
      "let y = 10;; let f x = x + y;; exit (f 20);;",
      "let my_exit = exit;; my_exit 12;; exit 99;;",
    ];
    for src in programs {
      let asm = compile_to_asm(src).unwrap_or_else(|e| panic!("failed on {src:?}: {e}"));
      assert!(asm.contains("global main"));
    }
  }

  #[test]
  fn if_branches_of_different_types_is_a_type_error() {
    assert!(compile_to_asm("if true then 1 else false;;").is_err());
  }

  #[test]
  fn unbound_identifier_is_an_error() {
    assert!(compile_to_asm("exit (this_name_is_not_bound_anywhere);;").is_err());
  }

  #[test]
  fn malformed_source_is_a_parse_error() {
    assert!(compile_to_asm("let = 5;;").is_err());
  }
}
