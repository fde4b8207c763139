use crate::context::Node;
use enum_map::Enum;
use strum::IntoStaticStr;

/// One of the four scalar inputs to an expression
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Enum)]
#[allow(missing_docs)]
pub enum Axis {
    X,
    Y,
    Z,
    /// Time
    T,
}

impl Axis {
    /// Returns the name of this axis as an uppercase letter
    pub fn name(&self) -> &'static str {
        match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
            Axis::T => "T",
        }
    }

    /// Returns the tape slot which is pre-loaded with this axis
    pub fn slot(&self) -> usize {
        self.into_usize()
    }
}

/// A one-argument math operation
#[derive(
    Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum UnaryOpcode {
    Sin,
    Cos,
    Exp,
    Sqrt,
    Neg,
}

impl UnaryOpcode {
    /// Applies the operation to a scalar
    pub fn apply(&self, a: f64) -> f64 {
        match self {
            UnaryOpcode::Sin => a.sin(),
            UnaryOpcode::Cos => a.cos(),
            UnaryOpcode::Exp => a.exp(),
            UnaryOpcode::Sqrt => a.sqrt(),
            UnaryOpcode::Neg => -a,
        }
    }

    /// Returns the lowercase name of this operation
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// A two-argument math operation
#[derive(
    Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[allow(missing_docs)]
pub enum BinaryOpcode {
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
}

impl BinaryOpcode {
    /// Applies the operation to a pair of scalars
    pub fn apply(&self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOpcode::Add => a + b,
            BinaryOpcode::Sub => a - b,
            BinaryOpcode::Mul => a * b,
            BinaryOpcode::Div => a / b,
            BinaryOpcode::Min => a.min(b),
            BinaryOpcode::Max => a.max(b),
        }
    }

    /// Returns the lowercase name of this operation
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

/// Any operation which takes inputs
///
/// The arity is a static property of the opcode; it is checked when nodes
/// are built with [`Context::op`](crate::context::Context::op).
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[allow(missing_docs)]
pub enum Opcode {
    Unary(UnaryOpcode),
    Binary(BinaryOpcode),
}

impl Opcode {
    /// Returns the number of inputs taken by this opcode
    pub fn arity(&self) -> usize {
        match self {
            Opcode::Unary(..) => 1,
            Opcode::Binary(..) => 2,
        }
    }

    /// Returns the lowercase name of this operation
    pub fn name(&self) -> &'static str {
        match self {
            Opcode::Unary(op) => op.name(),
            Opcode::Binary(op) => op.name(),
        }
    }
}

impl From<UnaryOpcode> for Opcode {
    fn from(op: UnaryOpcode) -> Self {
        Opcode::Unary(op)
    }
}

impl From<BinaryOpcode> for Opcode {
    fn from(op: BinaryOpcode) -> Self {
        Opcode::Binary(op)
    }
}

/// Represents an operation in a math expression.
///
/// `Op`s should be constructed by calling functions on
/// [`Context`](crate::context::Context), e.g.
/// [`Context::add`](crate::context::Context::add) will generate an
/// `Op::Binary(BinaryOpcode::Add, .., ..)` node and return an opaque handle.
///
/// Each `Op` is tightly coupled to the [`Context`](crate::context::Context)
/// which generated it, and will not be valid for a different `Context`.
///
/// Equality on `Op` is structural and shallow (child handles are compared by
/// index); it is not used to deduplicate nodes.
#[derive(Copy, Clone, Debug, PartialEq)]
#[allow(missing_docs)]
pub enum Op {
    Axis(Axis),
    Const(f64),
    Unary(UnaryOpcode, Node),
    Binary(BinaryOpcode, Node, Node),
}

fn dot_color_to_rgb(s: &str) -> &'static str {
    match s {
        "red" => "#FF0000",
        "green" => "#00FF00",
        "goldenrod" => "#DAA520",
        "dodgerblue" => "#1E90FF",
        s => panic!("Unknown X11 color '{s}'"),
    }
}

impl Op {
    /// Returns the opcode, or `None` for leaf nodes
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Op::Unary(op, ..) => Some(Opcode::Unary(*op)),
            Op::Binary(op, ..) => Some(Opcode::Binary(*op)),
            Op::Axis(..) | Op::Const(..) => None,
        }
    }

    /// Returns the number of inputs of this node
    pub fn arity(&self) -> usize {
        self.opcode().map(|op| op.arity()).unwrap_or(0)
    }

    /// Checks whether this node is the constant `v` (exact comparison)
    pub fn is_const(&self, v: f64) -> bool {
        matches!(self, Op::Const(c) if *c == v)
    }

    /// Iterates over children, producing 0, 1, or 2 values
    pub fn iter_children(&self) -> impl Iterator<Item = Node> + use<> {
        let out = match self {
            Op::Binary(_, a, b) => [Some(*a), Some(*b)],
            Op::Unary(_, a) => [Some(*a), None],
            Op::Axis(..) | Op::Const(..) => [None, None],
        };
        out.into_iter().flatten()
    }

    /// Returns a short human-readable label for this node
    pub fn label(&self) -> String {
        match self {
            Op::Axis(a) => a.name().to_owned(),
            Op::Const(c) => format!("{c:.1}"),
            Op::Unary(op, ..) => op.name().to_owned(),
            Op::Binary(op, ..) => op.name().to_owned(),
        }
    }

    /// Returns the color to be used in a GraphViz drawing for this node
    pub fn dot_node_color(&self) -> &str {
        match self {
            Op::Const(..) => "green",
            Op::Axis(..) => "red",
            Op::Binary(BinaryOpcode::Min | BinaryOpcode::Max, ..) => {
                "dodgerblue"
            }
            Op::Binary(..) | Op::Unary(..) => "goldenrod",
        }
    }

    /// Returns the shape to be used in a GraphViz drawing for this node
    pub fn dot_node_shape(&self) -> &str {
        match self {
            Op::Const(..) => "oval",
            Op::Axis(..) => "circle",
            Op::Binary(..) | Op::Unary(..) => "box",
        }
    }

    /// Returns a single edge, optionally labelled with the input position
    pub fn dot_edge(&self, a: Node, b: Node, label: Option<usize>) -> String {
        let color = dot_color_to_rgb(self.dot_node_color());
        match label {
            Some(i) => format!(
                "n{} -> n{} [color = \"{color}\" label = \"{i}\"]\n",
                a.get(),
                b.get()
            ),
            None => {
                format!("n{} -> n{} [color = \"{color}\"]\n", a.get(), b.get())
            }
        }
    }
}
