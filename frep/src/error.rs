//! Module containing the universal error type
use crate::context::{Node, Opcode};
use thiserror::Error;

/// Universal error type for `frep`
#[derive(Error, Debug)]
pub enum Error {
    /// Node is not present in this `Context`
    #[error("node is not present in this `Context`")]
    BadNode,

    /// Opcode was given the wrong number of inputs
    #[error("opcode {op:?} takes {expected} inputs, but got {actual}")]
    BadArity {
        /// Opcode being constructed
        op: Opcode,
        /// Fixed arity of the opcode
        expected: usize,
        /// Number of inputs actually supplied
        actual: usize,
    },

    /// Unknown opcode {0}
    #[error("unknown opcode {0}")]
    UnknownOpcode(String),

    /// Unknown variable {0}
    #[error("unknown variable {0}")]
    UnknownVariable(String),

    /// Could not parse a constant
    #[error("could not parse constant '{0}'")]
    BadConstant(String),

    /// A line in a text file is missing an argument
    #[error("missing argument on line {0}")]
    MissingArgument(usize),

    /// Empty file
    #[error("empty file")]
    EmptyFile,

    /// The root is a bare axis, so there is nothing to compute
    #[error("root node is a bare axis and produces no instructions")]
    EmptyTape,

    /// Byte does not correspond to any tape opcode
    #[error("bad tape opcode {0}")]
    BadOpcode(u8),

    /// A compiler invariant was broken; see inner error for details
    #[error("internal compiler error: {0}")]
    Internal(#[from] InternalError),

    /// IO error; see inner code for details
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Internal-consistency faults raised while lowering to a tape
///
/// These are never expected in a correctly canonicalized graph; seeing one
/// means that a pass upstream of the tape compiler misbehaved.
#[derive(Error, Debug)]
pub enum InternalError {
    /// Input node was not found in the slot table
    #[error("node {0:?} has no slot (was the graph canonicalized?)")]
    MissingSlot(Node),

    /// A non-root node is never used as an input
    #[error("node {0:?} is not the root but has no consumer")]
    DeadNode(Node),

    /// An instruction field does not fit in a byte
    #[error("{field} value {value} does not fit in 8 bits")]
    FieldOverflow {
        /// Name of the overflowing field
        field: &'static str,
        /// Value that was rejected
        value: usize,
    },

    /// Tape violates slot discipline
    #[error("instruction {index}: {reason}")]
    SlotDiscipline {
        /// Index of the offending instruction
        index: usize,
        /// What went wrong
        reason: &'static str,
    },
}
