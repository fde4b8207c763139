use crate::{
    Error,
    context::{Axis, Context, Node, Op},
};
use enum_map::EnumMap;
use log::debug;

/// Unifies all axis leaves, so that each axis is represented by one node
///
/// The first node of each axis (in topological order) becomes the
/// representative, and every other reference is redirected to it.  Constants
/// are passed through untouched, and operations are only rebuilt if one of
/// their inputs changed; shared subgraphs stay shared.
///
/// ```
/// # use frep::{context::Context, passes::merge_axes};
/// let mut ctx = Context::new();
/// let x1 = ctx.x();
/// let x2 = ctx.x();
/// let sum = ctx.add(x1, x2)?;
///
/// let merged = merge_axes(&mut ctx, sum)?;
/// assert_eq!(ctx.node_count(sum)?, 3);
/// assert_eq!(ctx.node_count(merged)?, 2);
/// # Ok::<(), frep::Error>(())
/// ```
pub fn merge_axes(ctx: &mut Context, root: Node) -> Result<Node, Error> {
    let mut reps: EnumMap<Axis, Option<Node>> = EnumMap::default();
    let out = ctx.transform(root, |ctx, node, op, inputs: &[Node]| {
        Ok(match op {
            Op::Axis(a) => *reps[a].get_or_insert(node),
            Op::Const(..) => node,
            Op::Unary(opcode, a) => {
                if inputs[0] == a {
                    node
                } else {
                    ctx.push_op(Op::Unary(opcode, inputs[0]))
                }
            }
            Op::Binary(opcode, a, b) => {
                if inputs[0] == a && inputs[1] == b {
                    node
                } else {
                    ctx.push_op(Op::Binary(opcode, inputs[0], inputs[1]))
                }
            }
        })
    })?;
    debug!(
        "merge_axes: {} -> {} nodes",
        ctx.node_count(root)?,
        ctx.node_count(out)?
    );
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::context::BinaryOpcode;

    /// Returns the set of axis nodes reachable from `root`
    fn axis_nodes(ctx: &Context, root: Node) -> Vec<(Axis, Node)> {
        let mut out = vec![];
        ctx.visit_once(root, |node, op| {
            if let Op::Axis(a) = op {
                out.push((*a, node));
            }
        })
        .unwrap();
        out
    }

    fn build(ctx: &mut Context) -> Node {
        // x*x + y*(-1) + y / sin(4)
        let x1 = ctx.x();
        let x2 = ctx.x();
        let y1 = ctx.y();
        let y2 = ctx.y();
        let a = ctx.mul(x1, x2).unwrap();
        let b = ctx.mul(y1, -1.0).unwrap();
        let s = ctx.sin(4.0).unwrap();
        let c = ctx.div(y2, s).unwrap();
        let ab = ctx.add(a, b).unwrap();
        ctx.add(ab, c).unwrap()
    }

    #[test]
    fn one_node_per_axis() {
        let mut ctx = Context::new();
        let root = build(&mut ctx);
        assert_eq!(axis_nodes(&ctx, root).len(), 4);

        let merged = merge_axes(&mut ctx, root).unwrap();
        let axes = axis_nodes(&ctx, merged);
        assert_eq!(axes.len(), 2);
        assert_eq!(axes[0].0, Axis::X);
        assert_eq!(axes[1].0, Axis::Y);

        for (x, y) in [(1.0, 2.0), (-3.0, 0.5)] {
            assert_eq!(
                ctx.eval(root, x, y, 0.0, 0.0).unwrap(),
                ctx.eval(merged, x, y, 0.0, 0.0).unwrap()
            );
        }
    }

    #[test]
    fn first_encountered_wins() {
        let mut ctx = Context::new();
        let x1 = ctx.x();
        let x2 = ctx.x();
        let out = ctx.sub(x2, x1).unwrap();
        let merged = merge_axes(&mut ctx, out).unwrap();
        assert_eq!(
            ctx.get_op(merged),
            Some(&Op::Binary(BinaryOpcode::Sub, x2, x2))
        );
    }

    #[test]
    fn idempotent() {
        let mut ctx = Context::new();
        let root = build(&mut ctx);
        let once = merge_axes(&mut ctx, root).unwrap();
        let len = ctx.len();
        let twice = merge_axes(&mut ctx, once).unwrap();

        // Nothing needed to change, so nothing was rebuilt
        assert_eq!(once, twice);
        assert_eq!(ctx.len(), len);
        assert_eq!(axis_nodes(&ctx, once), axis_nodes(&ctx, twice));
    }

    #[test]
    fn untouched_when_canonical() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let c1 = ctx.constant(2.0);
        let c2 = ctx.constant(2.0);
        let a = ctx.mul(x, c1).unwrap();
        let b = ctx.add(a, c2).unwrap();
        assert_eq!(merge_axes(&mut ctx, b).unwrap(), b);
        // Constants are never merged
        assert_eq!(ctx.node_count(b).unwrap(), 5);
    }
}
