//! Dense, opaque identifiers with `vec_map::VecMap`-backed storage.
//!
//! This crate has two independent id spaces (variables, constraints), so the
//! `Idx` trait is pulled out so both can reuse the same dense-map/dense-vec
//! storage without duplicating the indexing boilerplate.

use vec_map::VecMap;

/// A type that can be densely mapped to and from a `usize`, the key type
/// `vec_map::VecMap` wants.
pub trait Idx {
    fn idx(&self) -> usize;
    fn unidx(v: usize) -> Self;
}

macro_rules! dense_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(u32);

        impl $name {
            /// Id `0` is reserved as invalid.
            pub const INVALID: $name = $name(0);

            #[inline]
            pub fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl Idx for $name {
            #[inline]
            fn idx(&self) -> usize {
                self.0 as usize
            }

            #[inline]
            fn unidx(v: usize) -> Self {
                $name(v as u32)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

dense_id!(VarId, "Identifies one finite-domain variable.");
dense_id!(ConstraintId, "Identifies one constraint registered with the solver.");

/// A dense map keyed by a dense id, backed by `vec_map::VecMap` exactly like
/// a dense map keyed by id.
#[derive(Clone)]
pub struct IdxMap<K, V> {
    map: VecMap<V>,
    _marker: std::marker::PhantomData<K>,
}

impl<K: Idx, V> IdxMap<K, V> {
    pub fn new() -> Self {
        IdxMap {
            map: VecMap::new(),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn insert(&mut self, k: K, v: V) -> Option<V> {
        self.map.insert(k.idx(), v)
    }

    pub fn get(&self, k: K) -> Option<&V> {
        self.map.get(k.idx())
    }

    pub fn get_mut(&mut self, k: K) -> Option<&mut V> {
        self.map.get_mut(k.idx())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.map.values_mut()
    }
}

impl<K: Idx, V> Default for IdxMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A dense, append-only vector keyed by a dense id starting at 1 (id 0 is
/// `INVALID`).
#[derive(Clone)]
pub struct IdxVec<K, V> {
    items: Vec<V>,
    _marker: std::marker::PhantomData<K>,
}

impl<K: Idx, V> IdxVec<K, V> {
    pub fn new() -> Self {
        IdxVec {
            items: Vec::new(),
            _marker: std::marker::PhantomData,
        }
    }

    /// Pushes `v` and returns the freshly minted id for it (1-based).
    pub fn push(&mut self, v: V) -> K {
        self.items.push(v);
        K::unidx(self.items.len())
    }

    /// The id that the next `push` would return, without pushing anything.
    pub fn next_id(&self) -> K {
        K::unidx(self.items.len() + 1)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.items.iter_mut()
    }
}

impl<K: Idx, V> std::ops::Index<K> for IdxVec<K, V> {
    type Output = V;

    fn index(&self, k: K) -> &V {
        &self.items[k.idx() - 1]
    }
}

impl<K: Idx, V> std::ops::IndexMut<K> for IdxVec<K, V> {
    fn index_mut(&mut self, k: K) -> &mut V {
        &mut self.items[k.idx() - 1]
    }
}

impl<K: Idx, V> Default for IdxVec<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
