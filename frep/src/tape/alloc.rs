use crate::{
    Error, InternalError,
    context::{Axis, Context, Node, Op},
};
use enum_map::EnumMap;
use log::trace;

use std::collections::BTreeMap;

/// Last-use positions for every node in a topologically-ordered tape
pub(crate) struct Liveness {
    last_use: BTreeMap<Node, usize>,
}

impl Liveness {
    /// Computes liveness for nodes in the given order
    ///
    /// `order` must be topological with `root` as its final item.  Every node
    /// other than the root must be consumed by some later node.
    pub fn new(ctx: &Context, order: &[Node], root: Node) -> Result<Self, Error> {
        let mut last_use = BTreeMap::new();
        for (i, &node) in order.iter().enumerate() {
            let op = ctx.get_op(node).ok_or(Error::BadNode)?;
            for c in op.iter_children() {
                last_use.insert(c, i);
            }
        }
        if let Some(&dead) = order
            .iter()
            .find(|&&n| n != root && !last_use.contains_key(&n))
        {
            return Err(InternalError::DeadNode(dead).into());
        }
        Ok(Self { last_use })
    }

    /// Checks whether the node is last used at position `i`
    pub fn dies_at(&self, node: Node, i: usize) -> bool {
        self.last_use.get(&node) == Some(&i)
    }
}

/// First-fit slot allocator for straight-line code
///
/// Slots 0-3 start out bound to the representative node of each axis; an
/// axis which doesn't appear in the expression leaves its slot free from
/// the beginning.  Slots are never shrunk, so the table's final length is
/// the tape's slot count.
pub(crate) struct SlotAllocator {
    /// Map from slot index to the node currently living there, or `None` if
    /// the slot is free
    slots: Vec<Option<Node>>,
}

impl SlotAllocator {
    /// Builds a new allocator with axes pre-bound
    pub fn new(axes: &EnumMap<Axis, Option<Node>>) -> Self {
        Self {
            slots: axes.values().copied().collect(),
        }
    }

    /// Returns the slot currently holding `node`
    pub fn get(&self, node: Node) -> Result<usize, Error> {
        self.slots
            .iter()
            .position(|s| *s == Some(node))
            .ok_or_else(|| InternalError::MissingSlot(node).into())
    }

    /// Marks a slot as free
    pub fn release(&mut self, slot: usize) {
        trace!("releasing slot {slot} ({:?})", self.slots[slot]);
        self.slots[slot] = None;
    }

    /// Binds `node` to the first free slot, growing the table if needed
    pub fn claim(&mut self, node: Node) -> usize {
        let slot = match self.slots.iter().position(Option::is_none) {
            Some(i) => i,
            None => {
                self.slots.push(None);
                self.slots.len() - 1
            }
        };
        trace!("binding {node:?} to slot {slot}");
        self.slots[slot] = Some(node);
        slot
    }

    /// Returns the number of slots which have ever been used
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

/// Finds the representative node of each axis in `order`
///
/// If an axis appears more than once (i.e. the graph was not canonicalized),
/// the first occurrence wins; later occurrences will fail to find a slot.
pub(crate) fn axis_reps(
    ctx: &Context,
    order: &[Node],
) -> Result<EnumMap<Axis, Option<Node>>, Error> {
    let mut out: EnumMap<Axis, Option<Node>> = EnumMap::default();
    for &node in order {
        if let Op::Axis(a) = ctx.get_op(node).ok_or(Error::BadNode)? {
            out[*a].get_or_insert(node);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_fit() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let z = ctx.z();
        let mut axes = EnumMap::default();
        axes[Axis::X] = Some(x);
        axes[Axis::Z] = Some(z);

        let mut alloc = SlotAllocator::new(&axes);
        assert_eq!(alloc.slot_count(), 4);
        assert_eq!(alloc.get(x).unwrap(), 0);
        assert_eq!(alloc.get(z).unwrap(), 2);

        // Missing axes leave their slots free
        let a = ctx.constant(1.0);
        assert_eq!(alloc.claim(a), 1);
        let b = ctx.constant(2.0);
        assert_eq!(alloc.claim(b), 3);
        let c = ctx.constant(3.0);
        assert_eq!(alloc.claim(c), 4);
        assert_eq!(alloc.slot_count(), 5);

        alloc.release(0);
        let d = ctx.constant(4.0);
        assert_eq!(alloc.claim(d), 0);
        assert_eq!(alloc.slot_count(), 5);
    }

    #[test]
    fn missing_slot() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let alloc = SlotAllocator::new(&EnumMap::default());
        assert!(matches!(
            alloc.get(x),
            Err(Error::Internal(InternalError::MissingSlot(n))) if n == x
        ));
    }

    #[test]
    fn liveness() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let s = ctx.sin(x).unwrap();
        let p = ctx.mul(x, s).unwrap();
        let order = ctx.topo_order(p).unwrap();
        assert_eq!(order, [x, s, p]);

        let live = Liveness::new(&ctx, &order, p).unwrap();
        assert!(!live.dies_at(x, 1));
        assert!(live.dies_at(x, 2));
        assert!(live.dies_at(s, 2));
        assert!(!live.dies_at(p, 2));
    }

    #[test]
    fn dead_node() {
        let mut ctx = Context::new();
        let x = ctx.x();
        let y = ctx.y();
        let s = ctx.sin(x).unwrap();
        // `y` is never consumed
        let order = [x, y, s];
        assert!(matches!(
            Liveness::new(&ctx, &order, s),
            Err(Error::Internal(InternalError::DeadNode(n))) if n == y
        ));
    }

    #[test]
    fn reps() {
        let mut ctx = Context::new();
        let t1 = ctx.t();
        let t2 = ctx.t();
        let y = ctx.y();
        let a = ctx.add(t1, t2).unwrap();
        let b = ctx.mul(a, y).unwrap();
        let order = ctx.topo_order(b).unwrap();
        let reps = axis_reps(&ctx, &order).unwrap();
        assert_eq!(reps[Axis::T], Some(t1));
        assert_eq!(reps[Axis::Y], Some(y));
        assert_eq!(reps[Axis::X], None);
    }
}
