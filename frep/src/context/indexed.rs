//! Containers with strongly-typed indexes
use std::marker::PhantomData;

/// A `Vec<Value>` which is indexed by a dedicated `Index` type
///
/// Unlike a map, this performs no deduplication: every `push` returns a fresh
/// index, even if an equal value is already stored.
#[derive(Clone, Debug)]
pub struct IndexVec<Value, Index> {
    data: Vec<Value>,
    _phantom: PhantomData<fn(Index)>,
}

impl<Value, Index> Default for IndexVec<Value, Index> {
    fn default() -> Self {
        Self {
            data: vec![],
            _phantom: PhantomData,
        }
    }
}

impl<Value, Index> IndexVec<Value, Index>
where
    Index: Copy + From<usize>,
    usize: From<Index>,
{
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
    pub fn get(&self, i: Index) -> Option<&Value> {
        self.data.get(usize::from(i))
    }
    pub fn push(&mut self, v: Value) -> Index {
        let out = Index::from(self.data.len());
        self.data.push(v);
        out
    }
    pub fn clear(&mut self) {
        self.data.clear()
    }
}

impl<Value, Index> std::ops::Index<Index> for IndexVec<Value, Index>
where
    usize: From<Index>,
{
    type Output = Value;
    fn index(&self, i: Index) -> &Value {
        &self.data[usize::from(i)]
    }
}

impl<Value, Index> std::ops::IndexMut<Index> for IndexVec<Value, Index>
where
    usize: From<Index>,
{
    fn index_mut(&mut self, i: Index) -> &mut Value {
        &mut self.data[usize::from(i)]
    }
}

impl<Value, Index> From<Vec<Value>> for IndexVec<Value, Index> {
    fn from(data: Vec<Value>) -> Self {
        Self {
            data,
            _phantom: PhantomData,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

macro_rules! define_index {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
        pub struct $name(usize);
        impl $name {
            /// Returns the inner index
            pub fn get(&self) -> usize {
                self.0
            }
        }
        impl From<usize> for $name {
            fn from(v: usize) -> Self {
                Self(v)
            }
        }
        impl From<$name> for usize {
            fn from(v: $name) -> Self {
                v.0
            }
        }
    };
}
pub(crate) use define_index;
