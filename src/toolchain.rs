//! Invokes the external assembler and linker (spec §6).
//!
//! `nasm` assembles the emitted `.asm` into an ELF object; the system `cc`
//! links it against libc so `malloc` and `printf` resolve.

use std::path::Path;
use std::process::Command;
use log::debug;
use tempfile::TempDir;
use crate::error::{Result, ToolchainError};

/// Assembles `asm` and links it into an executable at `out_path`.
/// `keep_asm_at`, if given, also writes the `.asm` text there.
pub fn assemble_and_link(asm: &str, out_path: &Path, keep_asm_at: Option<&Path>) -> Result<()> {
  let scratch = TempDir::new()?;
  let asm_path = scratch.path().join("out.asm");
  std::fs::write(&asm_path, asm)?;
  if let Some(keep) = keep_asm_at {
    std::fs::write(keep, asm)?;
  }

  debug!("assemble: entered, scratch dir {}", scratch.path().display());
  let obj_path = scratch.path().join("out.o");
  run_tool("nasm", Command::new("nasm")
    .args(["-f", "elf64", "-o"])
    .arg(&obj_path)
    .arg(&asm_path))?;
  debug!("assemble: done, object at {}", obj_path.display());

  debug!("link: entered, output {}", out_path.display());
  run_tool("cc", Command::new("cc")
    .arg(&obj_path)
    .arg("-o")
    .arg(out_path)
    .arg("-no-pie"))?;
  debug!("link: done");

  Ok(())
}

fn run_tool(name: &'static str, cmd: &mut Command) -> Result<()> {
  let output = cmd.output()?;
  if !output.status.success() {
    return Err(ToolchainError {
      tool: name,
      status: output.status.code(),
      stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }.into());
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  /// Only runs when `nasm` and `cc` are actually installed; skipped
  /// otherwise rather than failing CI environments that lack them.
  #[test]
  fn assembles_a_trivial_exit_program() {
    if which("nasm").is_none() || which("cc").is_none() {
      eprintln!("skipping: nasm/cc not found on PATH");
      return;
    }
    let asm = "extern malloc\nextern printf\nglobal main\n\nsection .data\n\nsection .text\nmain:\n  enter 0, 0\n  mov rdi, 7\n  mov rax, 60\n  syscall\n  leave\n  ret\n";
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("a.out");
    assemble_and_link(asm, &out, None).unwrap();
    assert!(out.exists());
  }

  fn which(tool: &str) -> Option<()> {
    std::env::var_os("PATH")?.to_str()?.split(':').find_map(|dir| {
      let p = std::path::Path::new(dir).join(tool);
      p.exists().then_some(())
    })
  }
}
