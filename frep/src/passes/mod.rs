//! Graph-to-graph optimization passes
//!
//! Passes take a [`Context`](crate::context::Context) and a root, and return
//! a new root in the same context; the original graph is left untouched.
//! They are normally run in this order:
//!
//! 1. [`merge_axes`] makes every reference to each axis point at a single
//!    node.  This is required before lowering to a
//!    [`Tape`](crate::tape::Tape).
//! 2. [`simplify`] performs constant folding and local algebraic rewrites.
mod merge_axes;
mod simplify;

pub use merge_axes::merge_axes;
pub use simplify::simplify;
