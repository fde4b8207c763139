use crate::{
    Error,
    context::{BinaryOpcode, Context, Node, Op, UnaryOpcode},
};
use log::debug;

/// Performs constant folding and local algebraic simplification
///
/// This is a single bottom-up pass: each operation is visited once, after
/// its inputs have been simplified.
///
/// - If every input is a constant, the operation is replaced by a constant.
/// - Otherwise, a small set of identities is tried, in order (e.g.
///   `a + 0 → a`, `(-a) * (-b) → a * b`, `a / c → a * (1 / c)`).  The result
///   of each rewrite is itself simplified.
///
/// Comparisons against constants are exact, and division by zero is not
/// guarded; it produces whatever IEEE-754 arithmetic produces.
///
/// ```
/// # use frep::{context::{Context, Op}, passes::simplify};
/// let mut ctx = Context::new();
/// let a = ctx.constant(4.0);
/// let b = ctx.constant(2.0);
/// let d = ctx.div(a, b)?;
/// let out = simplify(&mut ctx, d)?;
/// assert_eq!(ctx.get_op(out), Some(&Op::Const(2.0)));
/// # Ok::<(), frep::Error>(())
/// ```
pub fn simplify(ctx: &mut Context, root: Node) -> Result<Node, Error> {
    let out = ctx.transform(root, |ctx, node, op, inputs: &[Node]| {
        let mut s = Simplifier { ctx };
        match op {
            Op::Axis(..) | Op::Const(..) => Ok(node),
            Op::Unary(opcode, a) => {
                let orig = (inputs[0] == a).then_some(node);
                s.unary(opcode, inputs[0], orig)
            }
            Op::Binary(opcode, a, b) => {
                let orig = (inputs[0] == a && inputs[1] == b).then_some(node);
                s.binary(opcode, inputs[0], inputs[1], orig)
            }
        }
    })?;
    debug!(
        "simplify: {} -> {} nodes",
        ctx.node_count(root)?,
        ctx.node_count(out)?
    );
    Ok(out)
}

/// Rewriting helper, borrowing the context mutably
///
/// Every function takes (already-simplified) inputs and an optional original
/// node; if no rule fires, the original node is returned as-is, or a new node
/// is built if there isn't one.
struct Simplifier<'a> {
    ctx: &'a mut Context,
}

impl Simplifier<'_> {
    fn op(&self, n: Node) -> Result<Op, Error> {
        self.ctx.get_op(n).copied().ok_or(Error::BadNode)
    }

    /// Returns the argument of a negation node
    fn negated(&self, n: Node) -> Result<Option<Node>, Error> {
        Ok(match self.op(n)? {
            Op::Unary(UnaryOpcode::Neg, a) => Some(a),
            _ => None,
        })
    }

    fn is_const(&self, n: Node, v: f64) -> Result<bool, Error> {
        Ok(self.op(n)?.is_const(v))
    }

    fn unary(
        &mut self,
        opcode: UnaryOpcode,
        a: Node,
        orig: Option<Node>,
    ) -> Result<Node, Error> {
        let op_a = self.op(a)?;
        if let Op::Const(c) = op_a {
            return Ok(self.ctx.constant(opcode.apply(c)));
        }
        match (opcode, op_a) {
            // -(-a) → a
            (UnaryOpcode::Neg, Op::Unary(UnaryOpcode::Neg, inner)) => {
                return Ok(inner);
            }
            // -(a - b) → b - a
            (UnaryOpcode::Neg, Op::Binary(BinaryOpcode::Sub, p, q)) => {
                return self.binary(BinaryOpcode::Sub, q, p, None);
            }
            // cos(-a) → cos(a)
            (UnaryOpcode::Cos, Op::Unary(UnaryOpcode::Neg, inner)) => {
                return self.unary(UnaryOpcode::Cos, inner, None);
            }
            _ => (),
        }
        Ok(match orig {
            Some(n) => n,
            None => self.ctx.push_op(Op::Unary(opcode, a)),
        })
    }

    fn binary(
        &mut self,
        opcode: BinaryOpcode,
        a: Node,
        b: Node,
        orig: Option<Node>,
    ) -> Result<Node, Error> {
        if let (Op::Const(x), Op::Const(y)) = (self.op(a)?, self.op(b)?) {
            return Ok(self.ctx.constant(opcode.apply(x, y)));
        }
        let neg_a = self.negated(a)?;
        let neg_b = self.negated(b)?;

        let rewritten = match opcode {
            BinaryOpcode::Add => {
                if self.is_const(b, 0.0)? {
                    Some(a)
                } else if self.is_const(a, 0.0)? {
                    Some(b)
                } else {
                    match (neg_a, neg_b) {
                        // (-p) + (-q) → -(p + q)
                        (Some(p), Some(q)) => {
                            let sum = self.binary(BinaryOpcode::Add, p, q, None)?;
                            Some(self.unary(UnaryOpcode::Neg, sum, None)?)
                        }
                        // (-p) + b → b - p
                        (Some(p), None) => {
                            Some(self.binary(BinaryOpcode::Sub, b, p, None)?)
                        }
                        // a + (-q) → a - q
                        (None, Some(q)) => {
                            Some(self.binary(BinaryOpcode::Sub, a, q, None)?)
                        }
                        (None, None) => None,
                    }
                }
            }
            BinaryOpcode::Mul => {
                if self.is_const(b, 0.0)? {
                    Some(b)
                } else if self.is_const(a, 0.0)? {
                    Some(a)
                } else if self.is_const(b, 1.0)? {
                    Some(a)
                } else if self.is_const(a, 1.0)? {
                    Some(b)
                } else if self.is_const(b, -1.0)? {
                    Some(self.unary(UnaryOpcode::Neg, a, None)?)
                } else if self.is_const(a, -1.0)? {
                    Some(self.unary(UnaryOpcode::Neg, b, None)?)
                } else if let (Some(p), Some(q)) = (neg_a, neg_b) {
                    // (-p) * (-q) → p * q
                    Some(self.binary(BinaryOpcode::Mul, p, q, None)?)
                } else {
                    None
                }
            }
            BinaryOpcode::Sub => {
                if self.is_const(a, 0.0)? {
                    Some(self.unary(UnaryOpcode::Neg, b, None)?)
                } else if self.is_const(b, 0.0)? {
                    Some(a)
                } else if let Some(q) = neg_b {
                    // a - (-q) → a + q
                    Some(self.binary(BinaryOpcode::Add, a, q, None)?)
                } else {
                    None
                }
            }
            BinaryOpcode::Div => {
                if self.is_const(a, 0.0)? {
                    Some(a)
                } else if self.is_const(b, 1.0)? {
                    Some(a)
                } else if self.is_const(b, -1.0)? {
                    Some(self.unary(UnaryOpcode::Neg, a, None)?)
                } else if let Op::Const(c) = self.op(b)? {
                    if c != 0.0 {
                        // a / c → a * (1 / c)
                        let r = self.ctx.constant(1.0 / c);
                        Some(self.binary(BinaryOpcode::Mul, a, r, None)?)
                    } else {
                        None
                    }
                } else if let (Some(p), Some(q)) = (neg_a, neg_b) {
                    // (-p) / (-q) → p / q
                    Some(self.binary(BinaryOpcode::Div, p, q, None)?)
                } else {
                    None
                }
            }
            BinaryOpcode::Min | BinaryOpcode::Max => None,
        };

        Ok(match (rewritten, orig) {
            (Some(n), _) => n,
            (None, Some(n)) => n,
            (None, None) => self.ctx.push_op(Op::Binary(opcode, a, b)),
        })
    }
}
