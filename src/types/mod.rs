//! The type term universe, the scoped environment, and the unifier set
//! (spec §3, §4.1).

pub mod typ;
pub mod env;
pub mod unify;

pub use typ::{Type, Var};
pub use env::Env;
pub use unify::UnifierSet;
