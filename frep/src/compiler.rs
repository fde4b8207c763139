//! End-to-end compilation from an expression graph to a [`Tape`]
use crate::{
    Error,
    context::{Context, Node},
    passes::{merge_axes, simplify},
    tape::Tape,
};
use log::debug;

/// Settings for [`compile`]
///
/// Axis canonicalization always runs, since lowering depends on it.
#[derive(Copy, Clone, Debug)]
pub struct CompilerConfig {
    /// Run constant folding and algebraic simplification
    pub simplify: bool,

    /// Check slot discipline on the finished tape
    pub validate: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            simplify: true,
            validate: true,
        }
    }
}

/// Compiles the expression rooted at `root` into a tape
///
/// New nodes are added to `ctx` by the optimization passes; the original
/// graph is left untouched, and `root` stays valid.
///
/// A tape needs at least one instruction, so this returns
/// [`Error::EmptyTape`] whenever the optimized root is a bare axis.  That
/// isn't limited to a root which is literally `X`: ordinary expressions like
/// `x * 1` or `x + 0` simplify down to an axis and fail the same way.
///
/// ```
/// # use frep::{compiler::{compile, CompilerConfig}, context::Context};
/// let mut ctx = Context::new();
/// let x = ctx.x();
/// let x2 = ctx.x(); // a second `X` node
/// let zero = ctx.mul(x2, 0.0)?;
/// let out = ctx.add(x, zero)?;
///
/// let tape = compile(&mut ctx, out, &CompilerConfig::default());
/// assert!(tape.is_err()); // the root simplifies to a bare axis
///
/// let out = ctx.sin(out)?;
/// let tape = compile(&mut ctx, out, &CompilerConfig::default())?;
/// assert_eq!(tape.len(), 1);
/// # Ok::<(), frep::Error>(())
/// ```
pub fn compile(
    ctx: &mut Context,
    root: Node,
    cfg: &CompilerConfig,
) -> Result<Tape, Error> {
    let mut root = merge_axes(ctx, root)?;
    if cfg.simplify {
        root = simplify(ctx, root)?;
    }
    let tape = Tape::new(ctx, root)?;
    if cfg.validate {
        tape.validate()?;
    }
    debug!("compiled {} nodes into {} instructions", ctx.len(), tape.len());
    Ok(tape)
}
