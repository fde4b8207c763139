//! Identity-based graph traversal
//!
//! Both traversals visit each distinct [`Node`] exactly once, no matter how
//! many parents share it, and both run on the heap (rather than by recursion)
//! so that very deep expressions can't overflow the stack.
use super::{Context, Node, Op};
use crate::Error;

use std::collections::{BTreeMap, BTreeSet};

impl Context {
    /// Calls `f` once for every distinct node reachable from `root`
    ///
    /// Nodes are visited depth-first, children before parents, with the
    /// inputs of a node explored in order (input 0 first).  The resulting
    /// sequence is a topological order: every node is visited after all of
    /// its inputs, and `root` is visited last.
    ///
    /// ```
    /// # use frep::context::Context;
    /// let mut ctx = Context::new();
    /// let x = ctx.x();
    /// let s = ctx.add(x, x)?;
    /// let out = ctx.mul(s, s)?;
    ///
    /// let mut seen = vec![];
    /// ctx.visit_once(out, |node, _op| seen.push(node))?;
    /// assert_eq!(seen, [x, s, out]);
    /// # Ok::<(), frep::Error>(())
    /// ```
    pub fn visit_once<F>(&self, root: Node, mut f: F) -> Result<(), Error>
    where
        F: FnMut(Node, &Op),
    {
        self.check_node(root)?;

        enum Action {
            Down,
            Up,
        }

        let mut todo = vec![(Action::Down, root)];
        let mut seen = BTreeSet::new();
        while let Some((action, node)) = todo.pop() {
            let op = self.get_op(node).ok_or(Error::BadNode)?;
            match action {
                Action::Down => {
                    if !seen.insert(node) {
                        continue;
                    }
                    todo.push((Action::Up, node));
                    // Reversed, so that the first input is popped first
                    let children: Vec<Node> = op.iter_children().collect();
                    todo.extend(
                        children.into_iter().rev().map(|c| (Action::Down, c)),
                    );
                }
                Action::Up => f(node, op),
            }
        }
        Ok(())
    }

    /// Returns every distinct node reachable from `root`, in the order used
    /// by [`visit_once`](Self::visit_once)
    pub fn topo_order(&self, root: Node) -> Result<Vec<Node>, Error> {
        let mut out = vec![];
        self.visit_once(root, |node, _| out.push(node))?;
        Ok(out)
    }

    /// Counts the distinct nodes reachable from `root`
    pub fn node_count(&self, root: Node) -> Result<usize, Error> {
        let mut count = 0;
        self.visit_once(root, |_, _| count += 1)?;
        Ok(count)
    }

    /// Bottom-up memoized rewrite of the graph rooted at `root`
    ///
    /// For each distinct node (in [`visit_once`](Self::visit_once) order),
    /// calls `f(ctx, node, op, inputs)`, where `inputs` are the results that
    /// `f` already returned for that node's children.  Results are cached by
    /// node, so `f` is called exactly once per node even if it is shared by
    /// many parents.  Returns the result for `root`.
    ///
    /// `f` receives the context mutably, so it may allocate new nodes; those
    /// nodes are not visited by this traversal.
    ///
    /// ```
    /// # use frep::context::Context;
    /// let mut ctx = Context::new();
    /// let x = ctx.x();
    /// let s = ctx.add(x, x)?;
    /// let out = ctx.mul(s, s)?;
    ///
    /// // Compute the depth of the graph
    /// let depth = ctx.transform(out, |_ctx, _node, _op, inputs: &[usize]| {
    ///     Ok(inputs.iter().max().map(|d| d + 1).unwrap_or(0))
    /// })?;
    /// assert_eq!(depth, 2);
    /// # Ok::<(), frep::Error>(())
    /// ```
    pub fn transform<T, F>(&mut self, root: Node, mut f: F) -> Result<T, Error>
    where
        T: Clone,
        F: FnMut(&mut Context, Node, Op, &[T]) -> Result<T, Error>,
    {
        let order = self.topo_order(root)?;
        let mut done: BTreeMap<Node, T> = BTreeMap::new();
        let mut inputs = Vec::with_capacity(2);
        for node in order {
            let op = self.ops[node];
            inputs.clear();
            inputs.extend(op.iter_children().map(|c| done[&c].clone()));
            let r = f(self, node, op, &inputs)?;
            done.insert(node, r);
        }
        done.remove(&root).ok_or(Error::BadNode)
    }
}
