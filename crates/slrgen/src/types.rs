//! Collection types shared by the analysis passes.
//!
//! Every map and set iterates in insertion order, so the derived tables do
//! not depend on hashing.

type BuildHasher = std::hash::BuildHasherDefault<rustc_hash::FxHasher>;

pub type Map<K, V> = indexmap::IndexMap<K, V, BuildHasher>;
pub type Set<T> = indexmap::IndexSet<T, BuildHasher>;
