//! Linear, slot-allocated instruction tapes
//!
//! A [`Tape`] is the compiled form of an expression: a list of packed 32-bit
//! [`Instruction`]s in evaluation order, a pool of `f32` constants, and the
//! number of slots that an evaluator must provide.
//!
//! Before evaluation, slots 0-3 are loaded with the values of `X`, `Y`, `Z`
//! and `T`.  Every other slot is written before it is read, and the final
//! instruction always writes to slot 0, where the result is found.
//!
//! ```
//! use frep::{context::Context, passes::merge_axes, tape::Tape};
//!
//! let mut ctx = Context::new();
//! let x = ctx.x();
//! let y = ctx.y();
//! let x2 = ctx.mul(x, x)?;
//! let y2 = ctx.mul(y, y)?;
//! let r = ctx.add(x2, y2)?;
//! let circle = ctx.sub(r, 1.0)?;
//!
//! let root = merge_axes(&mut ctx, circle)?;
//! let tape = Tape::new(&ctx, root)?;
//! assert_eq!(tape.len(), 5);
//! assert_eq!(tape.constants(), &[1.0]);
//! assert_eq!(tape.eval(3.0, 4.0, 0.0, 0.0)?, 24.0);
//! # Ok::<(), frep::Error>(())
//! ```
use crate::{
    Error, InternalError,
    context::{Context, Node, Op},
};
use arrayvec::ArrayVec;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use zerocopy::IntoBytes;

use std::collections::BTreeMap;

mod alloc;
mod eval;
mod op;

use alloc::{Liveness, SlotAllocator};
pub use eval::TapeEval;
pub use op::{Instruction, TapeOpcode, iter_ops};

/// Number of slots reserved for the axes `X`, `Y`, `Z`, `T`
pub const AXIS_SLOTS: usize = 4;

/// A compiled expression, ready for evaluation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tape {
    instructions: Vec<Instruction>,
    constants: Vec<f32>,
    slot_count: usize,
}

static_assertions::assert_impl_all!(Tape: Send, Sync);

impl Tape {
    /// Lowers the expression rooted at `root` into a tape
    ///
    /// The graph must have been canonicalized with
    /// [`merge_axes`](crate::passes::merge_axes); otherwise, a duplicated
    /// axis will fail to find a slot and this returns an
    /// [`InternalError::MissingSlot`].  If `root` is itself an axis, there is
    /// nothing to compute and this returns [`Error::EmptyTape`].
    ///
    /// Slots are assigned first-fit: an instruction's inputs are released
    /// (if this is their last use) before its output is allocated, so the
    /// output may reuse an input's slot.
    pub fn new(ctx: &Context, root: Node) -> Result<Self, Error> {
        if let Some(Op::Axis(..)) = ctx.get_op(root) {
            return Err(Error::EmptyTape);
        }
        let order = ctx.topo_order(root)?;

        // Constants are deduplicated by bit pattern, in the order they're
        // found, so `0.0` and `-0.0` get separate entries
        let mut constants = vec![];
        let mut const_index: BTreeMap<u32, usize> = BTreeMap::new();
        for &node in &order {
            if let Some(c) = ctx.const_value(node)? {
                let c = c as f32;
                const_index.entry(c.to_bits()).or_insert_with(|| {
                    constants.push(c);
                    constants.len() - 1
                });
            }
        }

        let live = Liveness::new(ctx, &order, root)?;
        let mut slots = SlotAllocator::new(&alloc::axis_reps(ctx, &order)?);

        let mut instructions = Vec::with_capacity(order.len());
        for (i, &node) in order.iter().enumerate() {
            let op = ctx.get_op(node).ok_or(Error::BadNode)?;
            let (opcode, a, b) = match *op {
                Op::Axis(..) => continue,
                Op::Const(c) => {
                    let c = (c as f32).to_bits();
                    (TapeOpcode::Const, const_index[&c], 0)
                }
                Op::Unary(opcode, a) => (opcode.into(), slots.get(a)?, 0),
                Op::Binary(opcode, a, b) => {
                    (opcode.into(), slots.get(a)?, slots.get(b)?)
                }
            };

            // `x * x` must only release `x` once
            let mut dying: ArrayVec<usize, 2> = ArrayVec::new();
            for c in op.iter_children() {
                if live.dies_at(c, i) {
                    let s = slots.get(c)?;
                    if !dying.contains(&s) {
                        dying.push(s);
                    }
                }
            }
            for s in dying {
                slots.release(s);
            }

            let out = slots.claim(node);
            let instr = Instruction::new(opcode, out, a, b)?;
            trace!("{i}: {opcode} out={out} a={a} b={b}");
            instructions.push(instr);
        }

        // The root is always the last node, and everything else is dead by
        // then, so it should already land in slot 0.
        let last = instructions.last_mut().ok_or(Error::EmptyTape)?;
        *last = last.with_output(0);

        let tape = Self {
            instructions,
            constants,
            slot_count: slots.slot_count(),
        };
        debug!(
            "tape: {} instructions, {} slots, {} constants",
            tape.len(),
            tape.slot_count,
            tape.constants.len()
        );
        Ok(tape)
    }

    /// Builds a tape from raw parts, without checking it
    ///
    /// Use [`Tape::validate`] to check the result.
    pub fn from_parts(
        instructions: Vec<Instruction>,
        constants: Vec<f32>,
        slot_count: usize,
    ) -> Self {
        Self {
            instructions,
            constants,
            slot_count,
        }
    }

    /// Returns the number of instructions in the tape
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns the number of slots used by the tape, including axis slots
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Returns the instructions, in evaluation order
    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Returns the constant pool
    pub fn constants(&self) -> &[f32] {
        &self.constants
    }

    /// Iterates over raw instruction words
    pub fn words(&self) -> impl Iterator<Item = u32> + '_ {
        self.instructions.iter().map(Instruction::word)
    }

    /// Returns the instruction stream as native-endian bytes
    ///
    /// This is suitable for uploading directly into a GPU buffer of `u32`s.
    pub fn as_bytes(&self) -> &[u8] {
        self.instructions.as_bytes()
    }

    /// Evaluates the tape at a single point
    ///
    /// This allocates a fresh [`TapeEval`]; use one directly to evaluate many
    /// points.
    pub fn eval(&self, x: f32, y: f32, z: f32, t: f32) -> Result<f32, Error> {
        TapeEval::new().eval(self, x, y, z, t)
    }

    /// Checks that the tape follows slot discipline
    ///
    /// - Every opcode is known
    /// - Every slot read is either an axis slot or was written by an earlier
    ///   instruction
    /// - Every written slot is below [`slot_count`](Self::slot_count)
    /// - Every constant index is within the pool
    /// - The final instruction writes slot 0
    pub fn validate(&self) -> Result<(), Error> {
        let fail = |index, reason| InternalError::SlotDiscipline { index, reason };
        let mut written = [false; u8::MAX as usize + 1];
        written[..AXIS_SLOTS].fill(true);

        for (index, instr) in self.instructions.iter().enumerate() {
            let (op, out, a, b) = instr.decode()?;
            let reads = [a, b];
            let reads = &reads[..op.slot_inputs()];
            if op == TapeOpcode::Const && a as usize >= self.constants.len() {
                return Err(fail(index, "constant index out of range").into());
            }
            if reads.iter().any(|&r| !written[r as usize]) {
                let reason = "reads a slot before it is written";
                return Err(fail(index, reason).into());
            }
            if out as usize >= self.slot_count {
                let reason = "output slot exceeds slot count";
                return Err(fail(index, reason).into());
            }
            written[out as usize] = true;
        }

        match self.instructions.last() {
            None => Err(Error::EmptyTape),
            Some(i) if i.out() != 0 => Err(fail(
                self.instructions.len() - 1,
                "final output is not slot 0",
            )
            .into()),
            Some(_) => Ok(()),
        }
    }

    /// Returns a human-readable listing of the tape
    ///
    /// If `detailed` is false, only the instruction, slot, and constant
    /// counts are printed.
    ///
    /// ```
    /// # use frep::{context::Context, tape::Tape};
    /// let mut ctx = Context::new();
    /// let x = ctx.x();
    /// let out = ctx.add(x, 2.5)?;
    /// let tape = Tape::new(&ctx, out)?;
    /// assert_eq!(
    ///     tape.dump(false),
    ///     "Tape: instr_count=2 slot_count=4\nConstant pool: size=1\n"
    /// );
    /// # Ok::<(), frep::Error>(())
    /// ```
    pub fn dump(&self, detailed: bool) -> String {
        let mut out = format!(
            "Tape: instr_count={} slot_count={}\n",
            self.len(),
            self.slot_count
        );
        if detailed {
            for (i, instr) in self.instructions.iter().enumerate() {
                let (op, slot, a, b) = instr.unpack();
                let name = TapeOpcode::from_repr(op)
                    .map(|op| op.to_string())
                    .unwrap_or_else(|| format!("{op:#04x}"));
                out += &format!(
                    "\t{i:2} {name:>10}  out={slot:2}  inA={a:2}  inB={b:2}\n"
                );
            }
        }
        out += &format!("Constant pool: size={}\n", self.constants.len());
        if detailed {
            for (i, c) in self.constants.iter().enumerate() {
                out += &format!("\t{i:2} {c:4.2}\n");
            }
        }
        out
    }
}

impl std::fmt::Display for Tape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dump(true))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::passes::merge_axes;

    fn decoded(tape: &Tape) -> Vec<(TapeOpcode, u8, u8, u8)> {
        tape.instructions()
            .iter()
            .map(|i| i.decode().unwrap())
            .collect()
    }

    #[test]
    fn sphere_layout() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let y = ctx.y();
        let z = ctx.z();
        let x2 = ctx.mul(x, x).unwrap();
        let y2 = ctx.mul(y, y).unwrap();
        let z2 = ctx.mul(z, z).unwrap();
        let s = ctx.add(x2, y2).unwrap();
        let s = ctx.add(s, z2).unwrap();
        let out = ctx.sub(s, 100.0).unwrap();

        let tape = Tape::new(&ctx, out).unwrap();
        assert_eq!(
            decoded(&tape),
            [
                (TapeOpcode::Mul, 0, 0, 0),
                (TapeOpcode::Mul, 1, 1, 1),
                (TapeOpcode::Add, 0, 0, 1),
                (TapeOpcode::Mul, 1, 2, 2),
                (TapeOpcode::Add, 0, 0, 1),
                (TapeOpcode::Const, 1, 0, 0),
                (TapeOpcode::Sub, 0, 0, 1),
            ]
        );
        assert_eq!(tape.slot_count(), 4);
        assert_eq!(tape.constants(), &[100.0]);
        tape.validate().unwrap();
    }

    #[test]
    fn shared_input_released_once() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let s = ctx.sin(x).unwrap();
        let sq = ctx.mul(s, s).unwrap();
        let out = ctx.add(sq, 1.0).unwrap();
        let tape = Tape::new(&ctx, out).unwrap();
        assert_eq!(
            decoded(&tape),
            [
                (TapeOpcode::Sin, 0, 0, 0),
                (TapeOpcode::Mul, 0, 0, 0),
                (TapeOpcode::Const, 1, 0, 0),
                (TapeOpcode::Add, 0, 0, 1),
            ]
        );
        tape.validate().unwrap();
    }

    #[test]
    fn slots_grow_when_busy() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let y = ctx.y();
        let z = ctx.z();
        let t = ctx.t();
        // Axes occupy slots 0-3, so the first constant needs a new slot
        let a = ctx.add(x, 1.0).unwrap();
        let b = ctx.add(y, 2.0).unwrap();
        let c = ctx.mul(z, t).unwrap();
        let ab = ctx.min(a, b).unwrap();
        let out = ctx.max(ab, c).unwrap();
        let tape = Tape::new(&ctx, out).unwrap();
        assert_eq!(
            decoded(&tape),
            [
                (TapeOpcode::Const, 4, 0, 0),
                (TapeOpcode::Add, 0, 0, 4),
                (TapeOpcode::Const, 4, 1, 0),
                (TapeOpcode::Add, 1, 1, 4),
                (TapeOpcode::Min, 0, 0, 1),
                (TapeOpcode::Mul, 1, 2, 3),
                (TapeOpcode::Max, 0, 0, 1),
            ]
        );
        assert_eq!(tape.slot_count(), 5);
        tape.validate().unwrap();
        assert_eq!(tape.eval(1.0, 2.0, 3.0, 4.0).unwrap(), 12.0);
    }

    #[test]
    fn constant_dedup() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let a = ctx.constant(3.0);
        let b = ctx.constant(3.0);
        let c = ctx.constant(0.5);
        let p = ctx.mul(x, a).unwrap();
        let q = ctx.add(p, b).unwrap();
        let out = ctx.div(q, c).unwrap();
        let tape = Tape::new(&ctx, out).unwrap();
        assert_eq!(tape.constants(), &[3.0, 0.5]);
        assert_eq!(tape.eval(2.0, 0.0, 0.0, 0.0).unwrap(), 18.0);
    }

    #[test]
    fn signed_zero_constants() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let m = ctx.max(x, 0.0).unwrap();
        let out = ctx.div(m, -0.0).unwrap();
        let tape = Tape::new(&ctx, out).unwrap();

        let c = tape.constants();
        assert_eq!(c.len(), 2);
        assert!(c[0].is_sign_positive());
        assert!(c[1].is_sign_negative());
        assert_eq!(tape.eval(1.0, 0.0, 0.0, 0.0).unwrap(), f32::NEG_INFINITY);
        assert_eq!(
            tape.eval(1.0, 0.0, 0.0, 0.0).unwrap() as f64,
            ctx.eval(out, 1.0, 0.0, 0.0, 0.0).unwrap()
        );

        // NaN constants still share one entry
        let n = ctx.add(out, f64::NAN).unwrap();
        let n = ctx.mul(n, f64::NAN).unwrap();
        let tape = Tape::new(&ctx, n).unwrap();
        assert_eq!(tape.constants().len(), 3);
    }

    #[test]
    fn missing_axis_slot_is_free() {
        let mut ctx = Context::new();
        let y = ctx.y();
        let out = ctx.sub(2.0, y).unwrap();
        let tape = Tape::new(&ctx, out).unwrap();
        assert_eq!(
            decoded(&tape),
            [(TapeOpcode::Const, 0, 0, 0), (TapeOpcode::Sub, 0, 0, 1)]
        );
        assert_eq!(tape.slot_count(), 4);
        assert_eq!(tape.eval(0.0, 0.5, 0.0, 0.0).unwrap(), 1.5);
    }

    #[test]
    fn constant_root() {
        let mut ctx = Context::new();
        let c = ctx.constant(7.0);
        let tape = Tape::new(&ctx, c).unwrap();
        assert_eq!(decoded(&tape), [(TapeOpcode::Const, 0, 0, 0)]);
        assert_eq!(tape.eval(1.0, 1.0, 1.0, 1.0).unwrap(), 7.0);
    }

    #[test]
    fn axis_root() {
        let mut ctx = Context::new();
        let x = ctx.x();
        assert!(matches!(Tape::new(&ctx, x), Err(Error::EmptyTape)));
    }

    #[test]
    fn requires_merged_axes() {
        let mut ctx = Context::new();
        let x1 = ctx.x();
        let x2 = ctx.x();
        let out = ctx.add(x1, x2).unwrap();
        assert!(matches!(
            Tape::new(&ctx, out),
            Err(Error::Internal(InternalError::MissingSlot(n))) if n == x2
        ));

        let out = merge_axes(&mut ctx, out).unwrap();
        let tape = Tape::new(&ctx, out).unwrap();
        assert_eq!(tape.eval(2.5, 0.0, 0.0, 0.0).unwrap(), 5.0);
    }

    #[test]
    fn too_many_constants() {
        let mut ctx = Context::new();
        let mut out = ctx.x();
        for i in 0..300 {
            out = ctx.add(out, i as f64).unwrap();
        }
        assert!(matches!(
            Tape::new(&ctx, out),
            Err(Error::Internal(InternalError::FieldOverflow { .. }))
        ));
    }

    #[test]
    fn validate_catches_bad_tapes() {
        let ok = |ops: &[(TapeOpcode, u8, u8, u8)], n| {
            let instructions = ops
                .iter()
                .map(|&(op, out, a, b)| Instruction::pack(op as u8, out, a, b))
                .collect();
            Tape::from_parts(instructions, vec![1.0], n).validate()
        };
        assert!(ok(&[(TapeOpcode::Add, 0, 1, 2)], 4).is_ok());
        assert!(ok(&[(TapeOpcode::Add, 0, 1, 4)], 5).is_err());
        assert!(ok(&[(TapeOpcode::Const, 0, 1, 0)], 4).is_err());
        assert!(ok(&[(TapeOpcode::Neg, 1, 0, 0)], 4).is_err());
        assert!(ok(&[(TapeOpcode::Neg, 7, 0, 0)], 4).is_err());
        assert!(ok(&[], 4).is_err());
        assert!(
            ok(
                &[(TapeOpcode::Const, 4, 0, 0), (TapeOpcode::Sub, 0, 4, 0)],
                5
            )
            .is_ok()
        );
    }

    #[test]
    fn dump() {
        let mut ctx = Context::new();
        let t = ctx.t();
        let s = ctx.sin(t).unwrap();
        let out = ctx.mul(s, 0.25).unwrap();
        let tape = Tape::new(&ctx, out).unwrap();
        let text = tape.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Tape: instr_count=3 slot_count=4");
        assert_eq!(lines[1], "\t 0        SIN  out= 0  inA= 3  inB= 0");
        assert_eq!(lines[2], "\t 1      CONST  out= 1  inA= 0  inB= 0");
        assert_eq!(lines[3], "\t 2        MUL  out= 0  inA= 0  inB= 1");
        assert_eq!(lines[4], "Constant pool: size=1");
        assert_eq!(lines[5], "\t 0 0.25");
    }

    #[test]
    fn byte_views() {
        let mut ctx = Context::new();
        let z = ctx.z();
        let out = ctx.neg(z).unwrap();
        let tape = Tape::new(&ctx, out).unwrap();
        let words: Vec<u32> = tape.words().collect();
        assert_eq!(words, [0x05_00_02_00]);
        assert_eq!(tape.as_bytes(), 0x05_00_02_00u32.to_ne_bytes());
    }
}
