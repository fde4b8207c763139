//! Infrastructure for representing math expressions as graphs
//!
//! Expressions live in a [`Context`], which is an arena of [`Op`] nodes
//! addressed by [`Node`] handles.  Nodes are identified by **construction**,
//! not by value: every call to a builder function allocates a fresh node, so
//! two calls to [`Context::constant`] with the same value produce two distinct
//! nodes, and two calls to [`Context::x`] produce two distinct `X` leaves.
//! Sharing happens only when a handle is used more than once:
//!
//! ```
//! use frep::context::Context;
//!
//! let mut ctx = Context::new();
//! let x = ctx.x();
//! let s = ctx.add(x, x)?; // `x` is shared by both inputs
//! let out = ctx.mul(s, s)?; // `s` is shared by both inputs
//! assert_eq!(ctx.node_count(out)?, 3);
//! # Ok::<(), frep::Error>(())
//! ```
//!
//! Axis leaves are unified later by the
//! [`merge_axes`](crate::passes::merge_axes) pass.
mod indexed;
mod op;
mod walk;

use indexed::{IndexVec, define_index};
pub use op::{Axis, BinaryOpcode, Op, Opcode, UnaryOpcode};

use crate::Error;

use std::collections::BTreeMap;
use std::fmt::Write;
use std::io::{BufRead, BufReader, Read};

define_index!(Node, "An index in the `Context::ops` arena");

/// A `Context` holds a set of constants, axes, and operations.
///
/// It should be used like an arena allocator: it grows over time, then frees
/// all of its contents when dropped.  Nodes are never deduplicated.
#[derive(Clone, Debug, Default)]
pub struct Context {
    ops: IndexVec<Op, Node>,
}

impl Context {
    /// Build a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the context
    ///
    /// All [`Node`] handles from this context are invalidated.
    ///
    /// ```
    /// # use frep::context::Context;
    /// let mut ctx = Context::new();
    /// let x = ctx.x();
    /// ctx.clear();
    /// assert!(ctx.eval(x, 1.0, 0.0, 0.0, 0.0).is_err());
    /// ```
    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// Returns the number of [`Op`] nodes in the context
    ///
    /// ```
    /// # use frep::context::Context;
    /// let mut ctx = Context::new();
    /// let x = ctx.x();
    /// assert_eq!(ctx.len(), 1);
    /// let x2 = ctx.x();
    /// assert_eq!(ctx.len(), 2); // no deduplication
    /// ```
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Checks whether the context is empty
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Checks whether the given [`Node`] is valid in this context
    fn check_node(&self, node: Node) -> Result<(), Error> {
        self.get_op(node).ok_or(Error::BadNode).map(|_| ())
    }

    /// Looks up an operation by `Node` handle
    pub fn get_op(&self, node: Node) -> Option<&Op> {
        self.ops.get(node)
    }

    /// Looks up the constant associated with the given node.
    ///
    /// If the node is invalid for this tree, returns an error; if the node is
    /// not a constant, returns `Ok(None)`.
    pub fn const_value(&self, n: Node) -> Result<Option<f64>, Error> {
        match self.get_op(n) {
            Some(Op::Const(c)) => Ok(Some(*c)),
            Some(_) => Ok(None),
            None => Err(Error::BadNode),
        }
    }

    /// Looks up the axis associated with the given node.
    ///
    /// If the node is invalid for this tree, returns an error; if the node is
    /// not an axis, returns `Ok(None)`.
    pub fn axis_value(&self, n: Node) -> Result<Option<Axis>, Error> {
        match self.get_op(n) {
            Some(Op::Axis(a)) => Ok(Some(*a)),
            Some(_) => Ok(None),
            None => Err(Error::BadNode),
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Primitives
    /// Constructs a new node for the given axis
    pub fn axis(&mut self, a: Axis) -> Node {
        self.ops.push(Op::Axis(a))
    }

    /// Constructs a new `X` axis node
    /// ```
    /// # use frep::context::Context;
    /// let mut ctx = Context::new();
    /// let x = ctx.x();
    /// let v = ctx.eval(x, 1.0, 0.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 1.0);
    /// ```
    pub fn x(&mut self) -> Node {
        self.axis(Axis::X)
    }

    /// Constructs a new `Y` axis node
    pub fn y(&mut self) -> Node {
        self.axis(Axis::Y)
    }

    /// Constructs a new `Z` axis node
    pub fn z(&mut self) -> Node {
        self.axis(Axis::Z)
    }

    /// Constructs a new `T` (time) axis node
    pub fn t(&mut self) -> Node {
        self.axis(Axis::T)
    }

    /// Returns a new node representing the given constant value.
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let v = ctx.constant(3.0);
    /// assert_eq!(ctx.eval(v, 0.0, 0.0, 0.0, 0.0).unwrap(), 3.0);
    /// ```
    pub fn constant(&mut self, f: f64) -> Node {
        self.ops.push(Op::Const(f))
    }

    /// Builds a node for an arbitrary opcode
    ///
    /// The number of inputs must match the opcode's arity; otherwise,
    /// [`Error::BadArity`] is returned and nothing is allocated.
    ///
    /// ```
    /// # use frep::context::{BinaryOpcode, Context};
    /// let mut ctx = Context::new();
    /// let x = ctx.x();
    /// assert!(ctx.op(BinaryOpcode::Add, &[x]).is_err());
    /// let sum = ctx.op(BinaryOpcode::Add, &[x, x]).unwrap();
    /// assert_eq!(ctx.eval(sum, 2.0, 0.0, 0.0, 0.0).unwrap(), 4.0);
    /// ```
    pub fn op<O: Into<Opcode>>(
        &mut self,
        op: O,
        inputs: &[Node],
    ) -> Result<Node, Error> {
        let op = op.into();
        if inputs.len() != op.arity() {
            return Err(Error::BadArity {
                op,
                expected: op.arity(),
                actual: inputs.len(),
            });
        }
        for &n in inputs {
            self.check_node(n)?;
        }
        let node = match (op, inputs) {
            (Opcode::Unary(op), &[a]) => Op::Unary(op, a),
            (Opcode::Binary(op), &[a, b]) => Op::Binary(op, a, b),
            _ => unreachable!("arity was checked above"),
        };
        Ok(self.ops.push(node))
    }

    /// Rebuilds an `Op` with new children
    ///
    /// This is used by passes that rewrite the graph; the input nodes must
    /// already be valid in this context.
    pub(crate) fn push_op(&mut self, op: Op) -> Node {
        self.ops.push(op)
    }

    fn op_unary(&mut self, a: Node, op: UnaryOpcode) -> Result<Node, Error> {
        self.check_node(a)?;
        Ok(self.ops.push(Op::Unary(op, a)))
    }

    fn op_binary(
        &mut self,
        a: Node,
        b: Node,
        op: BinaryOpcode,
    ) -> Result<Node, Error> {
        self.check_node(a)?;
        self.check_node(b)?;
        Ok(self.ops.push(Op::Binary(op, a, b)))
    }

    /// Builds an addition node
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let x = ctx.x();
    /// let op = ctx.add(x, 1.0).unwrap();
    /// let v = ctx.eval(op, 1.0, 0.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 2.0);
    /// ```
    pub fn add<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        let b = b.into_node(self)?;
        self.op_binary(a, b, BinaryOpcode::Add)
    }

    /// Builds a subtraction node
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let x = ctx.x();
    /// let y = ctx.y();
    /// let op = ctx.sub(x, y).unwrap();
    /// let v = ctx.eval(op, 3.0, 2.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 1.0);
    /// ```
    pub fn sub<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        let b = b.into_node(self)?;
        self.op_binary(a, b, BinaryOpcode::Sub)
    }

    /// Builds a multiplication node
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let x = ctx.x();
    /// let op = ctx.mul(x, 5.0).unwrap();
    /// let v = ctx.eval(op, 2.0, 0.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 10.0);
    /// ```
    pub fn mul<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        let b = b.into_node(self)?;
        self.op_binary(a, b, BinaryOpcode::Mul)
    }

    /// Builds a division node
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let x = ctx.x();
    /// let y = ctx.y();
    /// let op = ctx.div(x, y).unwrap();
    /// let v = ctx.eval(op, 3.0, 2.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 1.5);
    /// ```
    pub fn div<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        let b = b.into_node(self)?;
        self.op_binary(a, b, BinaryOpcode::Div)
    }

    /// Builds a `min` node
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let x = ctx.x();
    /// let op = ctx.min(x, 5.0).unwrap();
    /// let v = ctx.eval(op, 2.0, 0.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 2.0);
    /// ```
    pub fn min<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        let b = b.into_node(self)?;
        self.op_binary(a, b, BinaryOpcode::Min)
    }

    /// Builds a `max` node
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let x = ctx.x();
    /// let op = ctx.max(x, 5.0).unwrap();
    /// let v = ctx.eval(op, 2.0, 0.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 5.0);
    /// ```
    pub fn max<A: IntoNode, B: IntoNode>(
        &mut self,
        a: A,
        b: B,
    ) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        let b = b.into_node(self)?;
        self.op_binary(a, b, BinaryOpcode::Max)
    }

    /// Builds a unary negation node
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let x = ctx.x();
    /// let op = ctx.neg(x).unwrap();
    /// let v = ctx.eval(op, 2.0, 0.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, -2.0);
    /// ```
    pub fn neg<A: IntoNode>(&mut self, a: A) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        self.op_unary(a, UnaryOpcode::Neg)
    }

    /// Builds a node which calculates the square root of its input
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let x = ctx.x();
    /// let op = ctx.sqrt(x).unwrap();
    /// let v = ctx.eval(op, 4.0, 0.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 2.0);
    /// ```
    pub fn sqrt<A: IntoNode>(&mut self, a: A) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        self.op_unary(a, UnaryOpcode::Sqrt)
    }

    /// Builds a node which calculates the sine of its input (in radians)
    pub fn sin<A: IntoNode>(&mut self, a: A) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        self.op_unary(a, UnaryOpcode::Sin)
    }

    /// Builds a node which calculates the cosine of its input (in radians)
    pub fn cos<A: IntoNode>(&mut self, a: A) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        self.op_unary(a, UnaryOpcode::Cos)
    }

    /// Builds a node which calculates `e` raised to its input
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let x = ctx.x();
    /// let op = ctx.exp(x).unwrap();
    /// let v = ctx.eval(op, 0.0, 0.0, 0.0, 0.0).unwrap();
    /// assert_eq!(v, 1.0);
    /// ```
    pub fn exp<A: IntoNode>(&mut self, a: A) -> Result<Node, Error> {
        let a = a.into_node(self)?;
        self.op_unary(a, UnaryOpcode::Exp)
    }

    ////////////////////////////////////////////////////////////////////////////
    /// Evaluates the given node with the provided values for X, Y, Z, and T
    ///
    /// Each distinct node is evaluated once, even if it is shared.  This is
    /// the reference against which compiled tapes are checked; it is far too
    /// slow for rendering.
    ///
    /// ```
    /// # let mut ctx = frep::context::Context::new();
    /// let x = ctx.x();
    /// let y = ctx.y();
    /// let z = ctx.z();
    /// let op = ctx.mul(x, y).unwrap();
    /// let op = ctx.div(op, z).unwrap();
    /// let v = ctx.eval(op, 3.0, 5.0, 2.0, 0.0).unwrap();
    /// assert_eq!(v, 7.5); // (3.0 * 5.0) / 2.0
    /// ```
    pub fn eval(
        &self,
        root: Node,
        x: f64,
        y: f64,
        z: f64,
        t: f64,
    ) -> Result<f64, Error> {
        let mut values: BTreeMap<Node, f64> = BTreeMap::new();
        for node in self.topo_order(root)? {
            let v = match self.ops[node] {
                Op::Axis(Axis::X) => x,
                Op::Axis(Axis::Y) => y,
                Op::Axis(Axis::Z) => z,
                Op::Axis(Axis::T) => t,
                Op::Const(c) => c,
                Op::Unary(op, a) => op.apply(values[&a]),
                Op::Binary(op, a, b) => op.apply(values[&a], values[&b]),
            };
            values.insert(node, v);
        }
        Ok(values[&root])
    }

    /// Parses a flat text representation of a math graph. For example, the
    /// sphere `x² + y² + z² - 100` can be parsed from
    /// ```
    /// # use frep::context::Context;
    /// let txt = "
    /// ## This is a comment!
    /// 0x600000b90000 var-x
    /// 0x600000b900a0 mul 0x600000b90000 0x600000b90000
    /// 0x600000b90050 var-y
    /// 0x600000b900f0 mul 0x600000b90050 0x600000b90050
    /// 0x600000b90140 add 0x600000b900a0 0x600000b900f0
    /// 0x600000b90060 var-z
    /// 0x600000b90190 mul 0x600000b90060 0x600000b90060
    /// 0x600000b901e0 add 0x600000b90140 0x600000b90190
    /// 0x600000b90230 const 100
    /// 0x600000b90280 sub 0x600000b901e0 0x600000b90230
    /// ";
    /// let (ctx, root) = Context::from_text(&mut txt.as_bytes()).unwrap();
    /// assert_eq!(ctx.len(), 10);
    /// assert_eq!(ctx.eval(root, 10.0, 0.0, 0.0, 0.0).unwrap(), 0.0);
    /// ```
    ///
    /// Every `var-*` line allocates a new axis node; run
    /// [`merge_axes`](crate::passes::merge_axes) before compiling.  The last
    /// line of the file is the root.
    ///
    /// This representation is loosely defined and only intended for use in
    /// quick experiments.
    pub fn from_text<R: Read>(r: R) -> Result<(Self, Node), Error> {
        let reader = BufReader::new(r);
        let mut ctx = Self::new();
        let mut seen = BTreeMap::new();
        let mut last = None;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut iter = line.split_whitespace();
            let missing = || Error::MissingArgument(line_no + 1);
            let i = iter.next().ok_or_else(missing)?.to_owned();
            let opcode = iter.next().ok_or_else(missing)?;

            let mut pop = || {
                let txt = iter.next().ok_or_else(missing)?;
                seen.get(txt)
                    .cloned()
                    .ok_or_else(|| Error::UnknownVariable(txt.to_string()))
            };
            let node = match opcode {
                "const" => {
                    let txt = iter.next().ok_or_else(missing)?;
                    let v = txt
                        .parse()
                        .map_err(|_| Error::BadConstant(txt.to_owned()))?;
                    ctx.constant(v)
                }
                "var-x" => ctx.x(),
                "var-y" => ctx.y(),
                "var-z" => ctx.z(),
                "var-t" => ctx.t(),
                "sin" => ctx.sin(pop()?)?,
                "cos" => ctx.cos(pop()?)?,
                "exp" => ctx.exp(pop()?)?,
                "sqrt" => ctx.sqrt(pop()?)?,
                "neg" => ctx.neg(pop()?)?,
                "add" => ctx.add(pop()?, pop()?)?,
                "sub" => ctx.sub(pop()?, pop()?)?,
                "mul" => ctx.mul(pop()?, pop()?)?,
                "div" => ctx.div(pop()?, pop()?)?,
                "min" => ctx.min(pop()?, pop()?)?,
                "max" => ctx.max(pop()?, pop()?)?,
                op => return Err(Error::UnknownOpcode(op.to_owned())),
            };
            seen.insert(i, node);
            last = Some(node);
        }
        match last {
            Some(node) => Ok((ctx, node)),
            None => Err(Error::EmptyFile),
        }
    }

    /// Converts the graph rooted at `root` into a GraphViz drawing
    ///
    /// If `label_edges` is set, edges out of binary nodes are labelled with
    /// the input position (0 or 1).
    pub fn dot(&self, root: Node, label_edges: bool) -> Result<String, Error> {
        let order = self.topo_order(root)?;
        let mut out = format!(
            "digraph \"DAG with {} nodes\" {{\n",
            order.len()
        );
        for node in order {
            let op = &self.ops[node];
            out += &self.dot_node(node);
            let binary = op.arity() > 1;
            for (i, c) in op.iter_children().enumerate() {
                let label = (label_edges && binary).then_some(i);
                out += &op.dot_edge(node, c, label);
            }
        }
        out += "}\n";
        Ok(out)
    }

    /// Converts the given node into a GraphViz node
    fn dot_node(&self, i: Node) -> String {
        let op = &self.ops[i];
        let mut out = format!(r#"n{} [label = "{}"#, i.get(), op.label());
        // Writing to a `String` is infallible
        let _ = writeln!(
            out,
            r#"" color="{0}1" shape="{1}" fontcolor="{0}4"]"#,
            op.dot_node_color(),
            op.dot_node_shape()
        );
        out
    }
}

////////////////////////////////////////////////////////////////////////////////
/// Helper trait for things that can be converted into a
/// [`Node`] given a [`Context`].
///
/// This trait allows you to write
/// ```
/// # let mut ctx = frep::context::Context::new();
/// let x = ctx.x();
/// let sum = ctx.add(x, 1.0).unwrap();
/// ```
/// instead of the more verbose
/// ```
/// # let mut ctx = frep::context::Context::new();
/// let x = ctx.x();
/// let num = ctx.constant(1.0);
/// let sum = ctx.add(x, num).unwrap();
/// ```
///
/// Note that each conversion from a float allocates a new constant node.
pub trait IntoNode {
    /// Converts the given values into a node
    fn into_node(self, ctx: &mut Context) -> Result<Node, Error>;
}

impl IntoNode for Node {
    fn into_node(self, ctx: &mut Context) -> Result<Node, Error> {
        ctx.check_node(self)?;
        Ok(self)
    }
}

impl IntoNode for f32 {
    fn into_node(self, ctx: &mut Context) -> Result<Node, Error> {
        Ok(ctx.constant(self as f64))
    }
}

impl IntoNode for f64 {
    fn into_node(self, ctx: &mut Context) -> Result<Node, Error> {
        Ok(ctx.constant(self))
    }
}

////////////////////////////////////////////////////////////////////////////////
