use super::{Tape, TapeOpcode};
use crate::{Error, InternalError};

/// Helper struct to index slots with a `u8`
struct SlotArray<'a>(&'a mut [f32]);
impl std::ops::Index<u8> for SlotArray<'_> {
    type Output = f32;
    fn index(&self, i: u8) -> &Self::Output {
        &self.0[i as usize]
    }
}
impl std::ops::IndexMut<u8> for SlotArray<'_> {
    fn index_mut(&mut self, i: u8) -> &mut f32 {
        &mut self.0[i as usize]
    }
}

/// Reference interpreter for a [`Tape`]
///
/// This is a slow, single-point evaluator, used to check compiled tapes
/// against [`Context::eval`](crate::context::Context::eval).  It owns its
/// slot buffer, so repeated calls don't allocate.
///
/// ```
/// # use frep::{context::Context, tape::{Tape, TapeEval}};
/// let mut ctx = Context::new();
/// let x = ctx.x();
/// let y = ctx.y();
/// let out = ctx.max(x, y)?;
/// let tape = Tape::new(&ctx, out)?;
///
/// let mut eval = TapeEval::new();
/// assert_eq!(eval.eval(&tape, 1.0, 2.0, 0.0, 0.0)?, 2.0);
/// assert_eq!(eval.eval(&tape, 3.0, 2.0, 0.0, 0.0)?, 3.0);
/// # Ok::<(), frep::Error>(())
/// ```
#[derive(Default)]
pub struct TapeEval {
    /// Workspace for data
    ///
    /// This is always large enough to hold every slot addressable by an
    /// 8-bit field, so an instruction can never index out of bounds.
    slots: Vec<f32>,
}

impl TapeEval {
    /// Builds a new evaluator
    pub fn new() -> Self {
        Self {
            slots: vec![f32::NAN; u8::MAX as usize + 1],
        }
    }

    /// Evaluates the tape at the given position and time
    ///
    /// Slots 0-3 are seeded with `x`, `y`, `z`, and `t`; all other slots
    /// start as NaN.  Returns the value of slot 0 once every instruction has
    /// run.
    pub fn eval(
        &mut self,
        tape: &Tape,
        x: f32,
        y: f32,
        z: f32,
        t: f32,
    ) -> Result<f32, Error> {
        self.slots.resize(u8::MAX as usize + 1, f32::NAN);
        self.slots.fill(f32::NAN);
        let mut v = SlotArray(&mut self.slots);
        v[0] = x;
        v[1] = y;
        v[2] = z;
        v[3] = t;

        for (index, instr) in tape.instructions().iter().enumerate() {
            let (op, out, a, b) = instr.decode()?;
            v[out] = match op {
                TapeOpcode::Const => {
                    *tape.constants().get(a as usize).ok_or(
                        InternalError::SlotDiscipline {
                            index,
                            reason: "constant index out of range",
                        },
                    )?
                }
                TapeOpcode::Sin => v[a].sin(),
                TapeOpcode::Cos => v[a].cos(),
                TapeOpcode::Exp => v[a].exp(),
                TapeOpcode::Sqrt => v[a].sqrt(),
                TapeOpcode::Neg => -v[a],
                TapeOpcode::Add => v[a] + v[b],
                TapeOpcode::Sub => v[a] - v[b],
                TapeOpcode::Mul => v[a] * v[b],
                TapeOpcode::Div => v[a] / v[b],
                TapeOpcode::Min => v[a].min(v[b]),
                TapeOpcode::Max => v[a].max(v[b]),
                TapeOpcode::Copy => v[a],
            };
        }
        Ok(v[0])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::tape::Instruction;

    /// Builds a tape by hand, bypassing the compiler
    fn tape(ops: &[(TapeOpcode, u8, u8, u8)], constants: &[f32]) -> Tape {
        let instructions = ops
            .iter()
            .map(|&(op, out, a, b)| Instruction::pack(op as u8, out, a, b))
            .collect();
        Tape::from_parts(instructions, constants.to_vec(), 6)
    }

    #[test]
    fn copy_is_supported() {
        let t = tape(
            &[
                (TapeOpcode::Const, 4, 0, 0),
                (TapeOpcode::Add, 5, 4, 1),
                (TapeOpcode::Copy, 0, 5, 0),
            ],
            &[1.5],
        );
        let mut eval = TapeEval::new();
        assert_eq!(eval.eval(&t, 0.0, 2.0, 0.0, 0.0).unwrap(), 3.5);
    }

    #[test]
    fn slots_are_reset() {
        // Slot 4 is read before it's written
        let t = tape(&[(TapeOpcode::Add, 0, 4, 1)], &[]);
        let mut eval = TapeEval::new();
        assert!(eval.eval(&t, 0.0, 1.0, 0.0, 0.0).unwrap().is_nan());

        let t2 = tape(
            &[(TapeOpcode::Const, 4, 0, 0), (TapeOpcode::Neg, 0, 4, 0)],
            &[2.0],
        );
        assert_eq!(eval.eval(&t2, 0.0, 0.0, 0.0, 0.0).unwrap(), -2.0);
        // Data from the previous run must not leak through
        assert!(eval.eval(&t, 0.0, 1.0, 0.0, 0.0).unwrap().is_nan());
    }

    #[test]
    fn bad_tapes() {
        let mut eval = TapeEval::new();
        let t = tape(&[(TapeOpcode::Const, 0, 3, 0)], &[1.0]);
        assert!(matches!(
            eval.eval(&t, 0.0, 0.0, 0.0, 0.0),
            Err(Error::Internal(InternalError::SlotDiscipline {
                index: 0,
                ..
            }))
        ));

        let bad = Tape::from_parts(
            vec![Instruction::pack(0xFF, 0, 0, 0)],
            vec![],
            4,
        );
        assert!(matches!(
            eval.eval(&bad, 0.0, 0.0, 0.0, 0.0),
            Err(Error::BadOpcode(0xFF))
        ));
    }

    #[test]
    fn min_max_with_nan() {
        let t = tape(&[(TapeOpcode::Min, 0, 0, 1)], &[]);
        let mut eval = TapeEval::new();
        assert_eq!(eval.eval(&t, f32::NAN, 1.0, 0.0, 0.0).unwrap(), 1.0);
        let t = tape(&[(TapeOpcode::Max, 0, 0, 1)], &[]);
        assert_eq!(eval.eval(&t, 4.0, f32::NAN, 0.0, 0.0).unwrap(), 4.0);
    }
}
