//! NASM text emission (spec §4.6, §4.7).
//!
//! Every instruction's expansion is wrapped in an XML-like comment pair
//! naming the LIR instruction and its salient attributes, so the emitted
//! assembly stays legible when something downstream needs to be debugged by
//! a human reading the `.asm` directly.

use std::fmt::Write as _;
use crate::lir::{ArithOp, FnDef, Instr, Label, Program, Temp64, Value};

pub fn emit(program: &Program) -> String {
  let mut out = String::new();
  out.push_str("extern malloc\nextern printf\nglobal main\n\n");

  out.push_str("section .data\n");
  for s in &program.statics {
    writeln!(out, "{}: db {}", label_name(s.label, program), s.text).unwrap();
  }
  out.push('\n');

  out.push_str("section .text\n");
  for f in &program.fns {
    emit_fn(&mut out, f, program);
  }
  out
}

fn label_name(label: Label, program: &Program) -> String {
  if let Some(f) = program.fns.iter().find(|f| f.label == label) {
    return if f.is_entry { "main".to_string() } else { label.asm_name(f.name) };
  }
  if let Some(s) = program.statics.iter().find(|s| s.label == label) {
    return label.asm_name(s.name);
  }
  label.asm_name(None)
}

fn emit_fn(out: &mut String, f: &FnDef, program: &Program) {
  writeln!(out, "{}:", label_name(f.label, program)).unwrap();
  writeln!(out, "  enter {}, 0", f.frame_size().unsigned_abs()).unwrap();
  for instr in &f.body {
    emit_instr(out, instr, f, program);
  }
  if f.is_entry {
    out.push_str("  leave\n  ret\n\n");
  } else {
    out.push_str("  leave\n  ret 16\n\n"); // pops the caller's pushed env + arg (8 bytes each)
  }
}

fn operand(v: &Value, f: &FnDef) -> String {
  match v {
    Value::I64(n) => format!("QWORD {n}"),
    Value::LabelRef(l) => l.asm_name(None),
    Value::Temp0 => "0".to_string(), // Unit has no storage; reads as a 0 immediate
    Value::Temp64(t) => temp_operand(*t, f),
  }
}

fn temp_operand(t: Temp64, f: &FnDef) -> String {
  let offset = t.fixed_offset().unwrap_or_else(|| *f.locals.get(&t).expect("temp has no assigned offset"));
  if offset >= 0 { format!("[rbp+{offset}]") } else { format!("[rbp{offset}]") }
}

fn emit_instr(out: &mut String, instr: &Instr, f: &FnDef, program: &Program) {
  match instr {
    Instr::LabelDef(l) => {
      writeln!(out, "{}:", l.asm_name(None)).unwrap();
    }
    Instr::Assign { dst, src } => {
      annotated(out, "Assign", &[], |out| {
        writeln!(out, "  mov rax, {}", operand(src, f)).unwrap();
        writeln!(out, "  mov {}, rax", temp_operand(*dst, f)).unwrap();
      });
    }
    Instr::GetElementPtr { ptr, index, stride, res } => {
      annotated(out, "GetElementPtr", &[("index", index.to_string()), ("stride", stride.to_string())], |out| {
        writeln!(out, "  mov rax, {}", operand(ptr, f)).unwrap();
        writeln!(out, "  mov rax, [rax+{}]", index * stride).unwrap();
        writeln!(out, "  mov {}, rax", temp_operand(*res, f)).unwrap();
      });
    }
    Instr::SetElementPtr { ptr, index, stride, value } => {
      annotated(out, "SetElementPtr", &[("index", index.to_string()), ("stride", stride.to_string())], |out| {
        writeln!(out, "  mov rax, {}", operand(ptr, f)).unwrap();
        writeln!(out, "  mov rbx, {}", operand(value, f)).unwrap();
        writeln!(out, "  mov [rax+{}], rbx", index * stride).unwrap();
      });
    }
    Instr::EnvLookup { index, res } => {
      annotated(out, "EnvLookup", &[("index", index.to_string())], |out| {
        writeln!(out, "  mov rax, {}", temp_operand(Temp64::Env, f)).unwrap();
        writeln!(out, "  mov rax, [rax+{}]", 8 * (index + 1)).unwrap();
        writeln!(out, "  mov {}, rax", temp_operand(*res, f)).unwrap();
      });
    }
    Instr::CreateClosure { label, captures, res, recursive } => {
      let size = 8 * (1 + usize::from(*recursive) + captures.len());
      annotated(out, "CreateClosure", &[("recursive", recursive.to_string()), ("size", size.to_string())], |out| {
        writeln!(out, "  mov rdi, {size}").unwrap();
        writeln!(out, "  call malloc").unwrap();
        writeln!(out, "  mov QWORD [rax], {}", label_name(*label, program)).unwrap();
        let mut offset = 8;
        if *recursive {
          writeln!(out, "  mov [rax+{offset}], rax").unwrap();
          offset += 8;
        }
        for c in captures {
          writeln!(out, "  mov rbx, {}", operand(c, f)).unwrap();
          writeln!(out, "  mov [rax+{offset}], rbx").unwrap();
          offset += 8;
        }
        writeln!(out, "  mov {}, rax", temp_operand(*res, f)).unwrap();
      });
    }
    Instr::CallClosure { func, arg, ret } => {
      annotated(out, "CallClosure", &[], |out| {
        writeln!(out, "  mov rax, {}", operand(func, f)).unwrap();
        writeln!(out, "  push rax").unwrap(); // environment: the closure pointer itself
        writeln!(out, "  mov rax, {}", operand(arg, f)).unwrap();
        writeln!(out, "  push rax").unwrap();
        writeln!(out, "  mov rax, {}", operand(func, f)).unwrap();
        writeln!(out, "  call [rax]").unwrap();
        if let Value::Temp64(dst) = ret {
          writeln!(out, "  mov {}, rax", temp_operand(*dst, f)).unwrap();
        }
      });
    }
    Instr::CreateTuple { values, res } => {
      annotated(out, "CreateTuple", &[("len", values.len().to_string())], |out| {
        writeln!(out, "  mov rdi, {}", 8 * values.len()).unwrap();
        writeln!(out, "  call malloc").unwrap();
        for (i, v) in values.iter().enumerate() {
          writeln!(out, "  mov rbx, {}", operand(v, f)).unwrap();
          writeln!(out, "  mov [rax+{}], rbx", 8 * i).unwrap();
        }
        writeln!(out, "  mov {}, rax", temp_operand(*res, f)).unwrap();
      });
    }
    Instr::AddSub { op, a, b, res } => {
      let mnemonic = if *op == ArithOp::Add { "add" } else { "sub" };
      annotated(out, "AddSub", &[("op", format!("{op:?}"))], |out| {
        writeln!(out, "  mov rax, {}", operand(a, f)).unwrap();
        writeln!(out, "  mov rbx, {}", operand(b, f)).unwrap();
        writeln!(out, "  {mnemonic} rax, rbx").unwrap();
        writeln!(out, "  mov {}, rax", temp_operand(*res, f)).unwrap();
      });
    }
    Instr::MulDivMod { op, a, b, res } => {
      annotated(out, "MulDivMod", &[("op", format!("{op:?}"))], |out| {
        writeln!(out, "  mov rax, {}", operand(a, f)).unwrap();
        match op {
          ArithOp::Mul => {
            writeln!(out, "  mov rbx, {}", operand(b, f)).unwrap();
            out.push_str("  imul rax, rbx\n");
          }
          ArithOp::Div | ArithOp::Mod => {
            writeln!(out, "  mov rbx, {}", operand(b, f)).unwrap();
            out.push_str("  cqo\n  idiv rbx\n");
            if *op == ArithOp::Mod { out.push_str("  mov rax, rdx\n"); }
          }
          ArithOp::Add | ArithOp::Sub => unreachable!("AddSub handles these"),
        }
        writeln!(out, "  mov {}, rax", temp_operand(*res, f)).unwrap();
      });
    }
    Instr::EqI64 { a, b, res } => {
      annotated(out, "EqI64", &[], |out| {
        writeln!(out, "  mov rax, {}", operand(a, f)).unwrap();
        writeln!(out, "  mov rbx, {}", operand(b, f)).unwrap();
        out.push_str("  cmp rax, rbx\n  sete al\n  movzx rax, al\n");
        writeln!(out, "  mov {}, rax", temp_operand(*res, f)).unwrap();
      });
    }
    Instr::Exit { code } => {
      annotated(out, "Exit", &[], |out| {
        writeln!(out, "  mov rdi, {}", operand(code, f)).unwrap();
        out.push_str("  mov rax, 60\n  syscall\n");
      });
    }
    Instr::PrintInt { value, fmt } => {
      annotated(out, "PrintInt", &[], |out| {
        writeln!(out, "  mov rsi, {}", operand(value, f)).unwrap();
        writeln!(out, "  lea rdi, [rel {}]", label_name(*fmt, program)).unwrap();
        out.push_str("  xor rax, rax\n  call printf\n");
      });
    }
    Instr::IfFalse { cond, target } => {
      annotated(out, "IfFalse", &[("target", target.asm_name(None))], |out| {
        writeln!(out, "  mov rax, {}", operand(cond, f)).unwrap();
        out.push_str("  cmp rax, 0\n");
        writeln!(out, "  je {}", target.asm_name(None)).unwrap();
      });
    }
    Instr::Goto { target } => {
      annotated(out, "Goto", &[("target", target.asm_name(None))], |out| {
        writeln!(out, "  jmp {}", target.asm_name(None)).unwrap();
      });
    }
    Instr::Return { value } => {
      annotated(out, "Return", &[], |out| {
        if !matches!(value, Value::Temp0) {
          writeln!(out, "  mov rax, {}", operand(value, f)).unwrap();
        } else {
          out.push_str("  xor rax, rax\n");
        }
        if f.is_entry {
          out.push_str("  leave\n  ret\n");
        } else {
          out.push_str("  leave\n  ret 16\n");
        }
      });
    }
  }
}

fn annotated(out: &mut String, tag: &str, attrs: &[(&str, String)], body: impl FnOnce(&mut String)) {
  let attr_str: String = attrs.iter().map(|(k, v)| format!(" {k}=\"{v}\"")).collect();
  writeln!(out, "  ; <{tag}{attr_str}>").unwrap();
  body(out);
  writeln!(out, "  ; </{tag}>").unwrap();
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::lir::gen_ctx::LirBuilder;

  #[test]
  fn emits_required_externs_and_sections() {
    let builder = LirBuilder::new();
    let program = builder.finish();
    let asm = emit(&program);
    assert!(asm.contains("extern malloc"));
    assert!(asm.contains("extern printf"));
    assert!(asm.contains("global main"));
    assert!(asm.contains("section .data"));
    assert!(asm.contains("section .text"));
    assert!(asm.contains("main:"));
  }

  #[test]
  fn every_instruction_is_wrapped_in_matching_xml_tags() {
    let mut builder = LirBuilder::new();
    builder.emit(Instr::Exit { code: Value::I64(5) });
    let program = builder.finish();
    let asm = emit(&program);
    assert!(asm.contains("<Exit>"));
    assert!(asm.contains("</Exit>"));
  }

  #[test]
  fn print_int_format_literal_is_byte_exact_and_comes_from_the_data_section() {
    let mut builder = LirBuilder::new();
    let fmt = builder.print_int_fmt_label();
    builder.emit(Instr::PrintInt { value: Value::I64(5), fmt });
    let program = builder.finish();
    assert_eq!(program.statics.len(), 1, "print_int's format string is a labeled static, not a hardcoded constant");
    let asm = emit(&program);
    assert!(asm.contains("db \"%d\", 0x0A, 0x0"), "format literal must be byte-exact per spec");
    assert!(!asm.contains("%ld"));
  }
}
