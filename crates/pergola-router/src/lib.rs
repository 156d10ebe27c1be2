//! Pattern-alternation HTTP request router.
//!
//! Compiles ordered sets of canonical root paths into anchored prefix
//! patterns that capture the path remainder, and indexes them in a
//! [`RouteTable`] keyed by compiled pattern identity. Matching walks the
//! patterns longest-source-first so nested mounts are tried before their
//! parents.

pub mod pattern;
pub mod table;

pub use pattern::{PatternError, PatternMatch, RoutePattern};
pub use table::{MethodKey, MethodMap, RouteTable, TableMatch};
