//! `frep` compiles function representations of implicit surfaces into compact
//! bytecode tapes.
//!
//! A **function representation** (F-rep) is a scalar function `f(x, y, z, t)`
//! of position and time; the surface is the set of points where `f` is zero.
//! By convention, `f < 0` is **inside** the shape and `f > 0` is **outside**.
//!
//! Evaluating such a function at every sample of every frame is expensive, so
//! rather than walking an expression graph, an evaluator (usually running on a
//! GPU) executes a **tape**: a flat list of fixed-width instructions that read
//! and write a small number of scratch slots.  This crate builds those tapes.
//!
//! # Shape construction
//! Expressions are built in a [`Context`](crate::context::Context), which is
//! an arena of nodes.  Nodes are identified by construction, not by value, and
//! reusing a handle shares the subexpression:
//! ```
//! use frep::context::Context;
//!
//! let mut ctx = Context::new();
//! let x = ctx.x();
//! let y = ctx.y();
//! let z = ctx.z();
//! let x2 = ctx.mul(x, x)?;
//! let y2 = ctx.mul(y, y)?;
//! let z2 = ctx.mul(z, z)?;
//! let sum = ctx.add(x2, y2)?;
//! let sum = ctx.add(sum, z2)?;
//! let sphere = ctx.sub(sum, 100.0)?;
//! assert_eq!(ctx.eval(sphere, 10.0, 0.0, 0.0, 0.0)?, 0.0);
//! # Ok::<(), frep::Error>(())
//! ```
//!
//! # Optimization
//! Graph-to-graph passes live in [`passes`]:
//! [`merge_axes`](passes::merge_axes) makes every reference to an axis point
//! at one node (required before lowering), and
//! [`simplify`](passes::simplify) folds constants and applies local algebraic
//! identities.
//!
//! # Lowering
//! A [`Tape`](tape::Tape) is built from a canonicalized graph; its
//! instructions are packed into 32-bit words, and slots are assigned with a
//! liveness-driven first-fit allocator.  The [`compiler::compile`] function
//! runs the whole pipeline:
//! ```
//! use frep::{compiler::{compile, CompilerConfig}, context::Context};
//!
//! let mut ctx = Context::new();
//! let x = ctx.x();
//! let t = ctx.t();
//! let s = ctx.sin(t)?;
//! let out = ctx.sub(x, s)?;
//!
//! let tape = compile(&mut ctx, out, &CompilerConfig::default())?;
//! println!("{tape}");
//! assert_eq!(tape.eval(1.0, 0.0, 0.0, 0.0)?, 1.0);
//! # Ok::<(), frep::Error>(())
//! ```
//!
//! Tapes can be evaluated with the reference interpreter
//! ([`TapeEval`](tape::TapeEval)), serialized with `serde`, or handed to an
//! external evaluator as raw words.
#![warn(missing_docs)]

pub mod compiler;
pub mod context;
pub mod passes;
pub mod tape;

mod error;
pub use error::{Error, InternalError};

pub use context::Context;
