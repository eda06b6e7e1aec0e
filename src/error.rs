//! The compiler's error taxonomy (spec §7).
//!
//! User-facing errors halt compilation with a single diagnostic line; no
//! partial outputs are retained (the driver in `main.rs` is responsible for
//! that half of the contract). `LoweringError` indicates a compiler
//! invariant was violated and may carry internal detail.

use std::fmt;
use crate::symbol::Symbol;
use crate::types::typ::Type;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("{0}")]
  Lex(LexError),

  #[error("{0}")]
  Parse(ParseError),

  #[error("unknown symbol `{0}`")]
  UnknownSymbol(Symbol),

  #[error("type mismatch: {0} != {1}")]
  TypeMismatch(Type, Type),

  #[error("recursive type")]
  RecursiveType,

  #[error("internal compiler error: {0}")]
  Lowering(LoweringError),

  #[error("{0}")]
  Toolchain(ToolchainError),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Unexpected character while scanning, with a byte position.
#[derive(Debug)]
pub struct LexError {
  pub pos: usize,
  pub snippet: String,
}

impl fmt::Display for LexError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "unexpected character at byte {}: {:?}", self.pos, self.snippet)
  }
}

/// Unexpected token while parsing, with a byte position.
#[derive(Debug)]
pub struct ParseError {
  pub pos: usize,
  pub message: String,
}

impl fmt::Display for ParseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "parse error at byte {}: {}", self.pos, self.message)
  }
}

/// A compiler-invariant violation discovered during lowering, e.g. calling a
/// non-closure value.
#[derive(Debug)]
pub enum LoweringError {
  CallNonClosure { value: String },
  MissingIdent(Symbol),
}

impl fmt::Display for LoweringError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      LoweringError::CallNonClosure { value } =>
        write!(f, "cannot call something other than a closure temporary, given `{value}`"),
      LoweringError::MissingIdent(name) =>
        write!(f, "identifier `{name}` is neither a local nor a capture at lowering time"),
    }
  }
}

/// The external assembler or linker exited non-zero.
#[derive(Debug)]
pub struct ToolchainError {
  pub tool: &'static str,
  pub status: Option<i32>,
  pub stderr: String,
}

impl fmt::Display for ToolchainError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.status {
      Some(code) => write!(f, "{} exited with status {code}: {}", self.tool, self.stderr.trim()),
      None => write!(f, "{} terminated by signal: {}", self.tool, self.stderr.trim()),
    }
  }
}

impl From<LexError> for Error { fn from(e: LexError) -> Self { Error::Lex(e) } }
impl From<ParseError> for Error { fn from(e: ParseError) -> Self { Error::Parse(e) } }
impl From<LoweringError> for Error { fn from(e: LoweringError) -> Self { Error::Lowering(e) } }
impl From<ToolchainError> for Error { fn from(e: ToolchainError) -> Self { Error::Toolchain(e) } }
