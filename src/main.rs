//! CLI driver (spec §6): `mlcc <SRC> [-o EXE] [-S] [--keep-asm] [-v]...`.

use std::path::PathBuf;
use std::process::ExitCode;
use clap::Parser;
use log::error;
use mlcc::error::Result;

/// Compiler for a small ML-family language, emitting x86-64 NASM.
#[derive(Parser, Debug)]
#[command(name = "mlcc", version)]
struct Args {
  /// Source file to compile.
  src: PathBuf,

  /// Output executable path. Defaults to the source file's basename.
  #[arg(short = 'o', long = "out")]
  out: Option<PathBuf>,

  /// Emit assembly only; do not invoke the assembler or linker.
  #[arg(short = 'S', long)]
  asm_only: bool,

  /// Keep the generated `.asm` file alongside the executable.
  #[arg(long)]
  keep_asm: bool,

  /// Increase log verbosity; repeatable.
  #[arg(short, long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn main() -> ExitCode {
  let args = Args::parse();
  init_logging(args.verbose);

  match run(&args) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      error!("{e}");
      eprintln!("mlcc: {e}");
      ExitCode::FAILURE
    }
  }
}

fn init_logging(verbose: u8) {
  let level = match verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(args: &Args) -> Result<()> {
  let src = std::fs::read_to_string(&args.src)?;
  let asm = mlcc::compile_to_asm(&src)?;

  let out_path = args.out.clone().unwrap_or_else(|| {
    args.src.file_stem().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("a.out"))
  });

  if args.asm_only {
    let asm_path = out_path.with_extension("asm");
    std::fs::write(&asm_path, asm)?;
    return Ok(());
  }

  let keep_asm_at = args.keep_asm.then(|| out_path.with_extension("asm"));
  mlcc::toolchain::assemble_and_link(&asm, &out_path, keep_asm_at.as_deref())?;
  Ok(())
}
