//! Full pipeline integration test: source text through the real `nasm`/`cc`
//! toolchain to a running process, checking its exit status (spec §8's
//! "Closure ABI round trip" property and its eight end-to-end scenarios).
//!
//! Skips (rather than fails) when `nasm` or `cc` aren't on `PATH`, matching
//! `src/toolchain.rs`'s own unit test.

use std::path::Path;
use tempfile::TempDir;

const SCENARIOS: &[(&str, i32)] = &[
  ("exit 5;;", 5),
  ("exit (2 * (9 div 2 - 7 mod 3));;", 2),
  ("let x = 7;; let y = x * 4;; let z = x + y + 45;; exit z;;", 80),
  ("let add x y = x + y;; exit (add 100 50);;", 150),
  ("let adder x y = x + y;; let plus77 = adder 77;; exit (plus77 99);;", 176),
  ("let rec fact n = if n = 1 then 1 else n * (fact (n - 1));; exit (fact 5);;", 120),
  ("let y = 10;; let f x = x + y;; exit (f 20);;", 30),
  ("let my_exit = exit;; my_exit 12;; exit 99;;", 12),
];

#[test]
fn end_to_end_scenarios_exit_with_the_documented_status() {
  if which("nasm").is_none() || which("cc").is_none() {
    eprintln!("skipping: nasm/cc not found on PATH");
    return;
  }

  for (src, expected) in SCENARIOS {
    let asm = mlcc::compile_to_asm(src).unwrap_or_else(|e| panic!("failed to compile {src:?}: {e}"));

    let dir = TempDir::new().unwrap();
    let out = dir.path().join("a.out");
    mlcc::toolchain::assemble_and_link(&asm, &out, None)
      .unwrap_or_else(|e| panic!("failed to assemble/link {src:?}: {e}"));

    let status = std::process::Command::new(&out).status()
      .unwrap_or_else(|e| panic!("failed to run compiled binary for {src:?}: {e}"));
    let code = status.code().unwrap_or_else(|| panic!("{src:?} terminated by signal"));
    assert_eq!(code & 0xff, *expected, "wrong exit status for {src:?}");
  }
}

fn which(tool: &str) -> Option<()> {
  std::env::var_os("PATH")?.to_str()?.split(':').find_map(|dir| {
    let p = Path::new(dir).join(tool);
    p.exists().then_some(())
  })
}
