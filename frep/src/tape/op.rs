use crate::{
    Error, InternalError,
    context::{BinaryOpcode, Opcode, UnaryOpcode},
};
use serde::{Deserialize, Serialize};
use zerocopy::{Immutable, IntoBytes};

/// Opcodes understood by a tape evaluator
///
/// The discriminant is the value stored in the top byte of an
/// [`Instruction`].  Axes have no tape opcode; they are pre-loaded into
/// slots 0-3 before evaluation begins.
#[derive(
    Copy,
    Clone,
    Debug,
    Hash,
    Eq,
    PartialEq,
    strum::Display,
    strum::EnumIter,
    strum::FromRepr,
    strum::IntoStaticStr,
)]
#[strum(serialize_all = "UPPERCASE")]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TapeOpcode {
    /// Loads a constant; input A is an index into the constant pool
    Const = 0,
    Sin,
    Cos,
    Exp,
    Sqrt,
    Neg,
    Add,
    Sub,
    Mul,
    Div,
    Min,
    Max,
    /// Copies input A into the output slot
    ///
    /// This is never emitted by the compiler, but evaluators must support it.
    Copy,
}

impl TapeOpcode {
    /// Returns the number of slot inputs read by this opcode
    ///
    /// `Const` reads no slots (its input A is a constant-pool index).
    pub fn slot_inputs(&self) -> usize {
        match self {
            TapeOpcode::Const => 0,
            TapeOpcode::Sin
            | TapeOpcode::Cos
            | TapeOpcode::Exp
            | TapeOpcode::Sqrt
            | TapeOpcode::Neg
            | TapeOpcode::Copy => 1,
            TapeOpcode::Add
            | TapeOpcode::Sub
            | TapeOpcode::Mul
            | TapeOpcode::Div
            | TapeOpcode::Min
            | TapeOpcode::Max => 2,
        }
    }
}

impl From<UnaryOpcode> for TapeOpcode {
    fn from(op: UnaryOpcode) -> Self {
        match op {
            UnaryOpcode::Sin => TapeOpcode::Sin,
            UnaryOpcode::Cos => TapeOpcode::Cos,
            UnaryOpcode::Exp => TapeOpcode::Exp,
            UnaryOpcode::Sqrt => TapeOpcode::Sqrt,
            UnaryOpcode::Neg => TapeOpcode::Neg,
        }
    }
}

impl From<BinaryOpcode> for TapeOpcode {
    fn from(op: BinaryOpcode) -> Self {
        match op {
            BinaryOpcode::Add => TapeOpcode::Add,
            BinaryOpcode::Sub => TapeOpcode::Sub,
            BinaryOpcode::Mul => TapeOpcode::Mul,
            BinaryOpcode::Div => TapeOpcode::Div,
            BinaryOpcode::Min => TapeOpcode::Min,
            BinaryOpcode::Max => TapeOpcode::Max,
        }
    }
}

impl From<Opcode> for TapeOpcode {
    fn from(op: Opcode) -> Self {
        match op {
            Opcode::Unary(op) => op.into(),
            Opcode::Binary(op) => op.into(),
        }
    }
}

/// A single packed tape instruction
///
/// | Bits    | Value                                       |
/// |---------|---------------------------------------------|
/// | 31-24   | opcode                                      |
/// | 23-16   | output slot                                 |
/// | 15-8    | input A (slot, or constant-pool index)      |
/// | 7-0     | input B (slot)                              |
///
/// Unused input fields are zero.
#[derive(
    Copy,
    Clone,
    Debug,
    Hash,
    Eq,
    PartialEq,
    Serialize,
    Deserialize,
    IntoBytes,
    Immutable,
)]
#[repr(transparent)]
pub struct Instruction(u32);

static_assertions::assert_eq_size!(Instruction, u32);

impl Instruction {
    /// Packs an instruction, checking that every field fits in a byte
    pub fn new(
        op: TapeOpcode,
        out: usize,
        a: usize,
        b: usize,
    ) -> Result<Self, Error> {
        let field = |field: &'static str, value: usize| {
            u8::try_from(value)
                .map_err(|_| InternalError::FieldOverflow { field, value })
        };
        Ok(Self::pack(
            op as u8,
            field("output slot", out)?,
            field("input A", a)?,
            field("input B", b)?,
        ))
    }

    /// Packs four raw bytes into an instruction, without checking the opcode
    pub fn pack(op: u8, out: u8, a: u8, b: u8) -> Self {
        Self(u32::from_be_bytes([op, out, a, b]))
    }

    /// Splits the instruction into its four raw bytes
    pub fn unpack(&self) -> (u8, u8, u8, u8) {
        let [op, out, a, b] = self.0.to_be_bytes();
        (op, out, a, b)
    }

    /// Decodes the instruction into `(opcode, out, a, b)`
    pub fn decode(&self) -> Result<(TapeOpcode, u8, u8, u8), Error> {
        let (op, out, a, b) = self.unpack();
        let op = TapeOpcode::from_repr(op).ok_or(Error::BadOpcode(op))?;
        Ok((op, out, a, b))
    }

    /// Returns the output slot
    pub fn out(&self) -> u8 {
        self.unpack().1
    }

    /// Returns a copy of this instruction writing to a different slot
    pub fn with_output(&self, out: u8) -> Self {
        let (op, _, a, b) = self.unpack();
        Self::pack(op, out, a, b)
    }

    /// Returns the raw instruction word
    pub fn word(&self) -> u32 {
        self.0
    }
}

impl From<u32> for Instruction {
    fn from(w: u32) -> Self {
        Self(w)
    }
}

/// Iterates over opcode `(name, value)` tuples, with names in `UPPERCASE`
///
/// This is a helper function for defining constants in an external tape
/// interpreter (e.g. a GPU shader).
///
/// ```
/// let ops: Vec<_> = frep::tape::iter_ops().collect();
/// assert_eq!(ops[0], ("CONST", 0));
/// assert_eq!(ops.last(), Some(&("COPY", 12)));
/// ```
pub fn iter_ops<'a>() -> impl Iterator<Item = (&'a str, u8)> {
    use strum::IntoEnumIterator;

    TapeOpcode::iter().map(|op| {
        let s: &'static str = op.into();
        (s, op as u8)
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    #[test]
    fn bit_layout() {
        let i = Instruction::new(TapeOpcode::Sub, 4, 1, 2).unwrap();
        assert_eq!(i.word(), 0x07_04_01_02);
        assert_eq!(i.as_bytes().len(), 4);

        let c = Instruction::new(TapeOpcode::Const, 5, 3, 0).unwrap();
        assert_eq!(c.word(), 0x00_05_03_00);
    }

    #[test]
    fn field_overflow() {
        for (out, a, b) in [(256, 0, 0), (0, 300, 0), (0, 0, 1000)] {
            let err = Instruction::new(TapeOpcode::Add, out, a, b).unwrap_err();
            assert!(matches!(
                err,
                Error::Internal(InternalError::FieldOverflow { .. })
            ));
        }
        assert!(Instruction::new(TapeOpcode::Add, 255, 255, 255).is_ok());
    }

    #[test]
    fn decode_sampled_words() {
        let mut rng = StdRng::seed_from_u64(0x1234);
        for _ in 0..256 {
            let op = TapeOpcode::from_repr(rng.gen_range(0..=12)).unwrap();
            let out = rng.gen_range(0..=255u8);
            let a = rng.gen_range(0..=255u8);
            let b = rng.gen_range(0..=255u8);
            let i =
                Instruction::new(op, out.into(), a.into(), b.into()).unwrap();
            assert_eq!(i.decode().unwrap(), (op, out, a, b));
        }
    }

    #[test]
    fn decode_boundary_fields() {
        use strum::IntoEnumIterator;

        const EDGES: [u8; 4] = [0, 1, 254, 255];
        for op in TapeOpcode::iter() {
            for out in EDGES {
                for a in EDGES {
                    for b in EDGES {
                        let i = Instruction::new(
                            op,
                            out.into(),
                            a.into(),
                            b.into(),
                        )
                        .unwrap();
                        assert_eq!(
                            i.word(),
                            u32::from_be_bytes([op as u8, out, a, b])
                        );
                        assert_eq!(i.decode().unwrap(), (op, out, a, b));
                    }
                }
            }
        }
    }

    #[test]
    fn bad_opcode() {
        let i = Instruction::pack(13, 0, 0, 0);
        assert!(matches!(i.decode(), Err(Error::BadOpcode(13))));
    }

    #[test]
    fn with_output() {
        let i = Instruction::new(TapeOpcode::Max, 7, 1, 2).unwrap();
        let j = i.with_output(0);
        assert_eq!(j.decode().unwrap(), (TapeOpcode::Max, 0, 1, 2));
    }

    #[test]
    fn opcode_names() {
        assert_eq!(TapeOpcode::Sqrt.to_string(), "SQRT");
        let names: Vec<_> = iter_ops().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            [
                "CONST", "SIN", "COS", "EXP", "SQRT", "NEG", "ADD", "SUB",
                "MUL", "DIV", "MIN", "MAX", "COPY"
            ]
        );
        for (i, (_, v)) in iter_ops().enumerate() {
            assert_eq!(v as usize, i);
        }
    }

    #[test]
    fn from_opcode() {
        assert_eq!(
            TapeOpcode::from(Opcode::Binary(BinaryOpcode::Div)),
            TapeOpcode::Div
        );
        assert_eq!(TapeOpcode::from(UnaryOpcode::Neg), TapeOpcode::Neg);
        assert_eq!(TapeOpcode::Neg.slot_inputs(), 1);
        assert_eq!(TapeOpcode::Const.slot_inputs(), 0);
    }
}
