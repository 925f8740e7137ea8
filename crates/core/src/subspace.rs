//! Key subspaces
//!
//! A `Subspace` is a raw byte prefix under which tuples are packed. Record
//! stores are rooted at a subspace derived from their key-space path, and
//! records and index entries live in child subspaces of that root.

use crate::error::CodecError;
use crate::tuple::{Tuple, TupleElement};

/// A byte prefix that namespaces packed tuples
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subspace {
    prefix: Vec<u8>,
}

impl Subspace {
    /// Subspace whose prefix is the packed form of `path`
    pub fn new(path: &Tuple) -> Self {
        Self {
            prefix: path.pack(),
        }
    }

    /// Subspace over an arbitrary raw prefix
    pub fn from_bytes(prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Raw prefix bytes
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    /// Child subspace extended by `suffix`
    pub fn subspace(&self, suffix: &Tuple) -> Subspace {
        let mut prefix = self.prefix.clone();
        suffix.pack_into(&mut prefix);
        Subspace { prefix }
    }

    /// Child subspace extended by a single element
    pub fn child(&self, element: impl Into<TupleElement>) -> Subspace {
        self.subspace(&Tuple::new().with(element))
    }

    /// Prefix followed by the packed tuple
    pub fn pack(&self, tuple: &Tuple) -> Vec<u8> {
        let mut key = self.prefix.clone();
        tuple.pack_into(&mut key);
        key
    }

    /// Decode a key that belongs to this subspace
    ///
    /// # Errors
    /// `CodecError::SubspaceMismatch` if the key lacks the prefix; any
    /// tuple decoding error otherwise.
    pub fn unpack(&self, key: &[u8]) -> Result<Tuple, CodecError> {
        let rest = key
            .strip_prefix(self.prefix.as_slice())
            .ok_or(CodecError::SubspaceMismatch)?;
        Tuple::unpack(rest)
    }

    /// True if `key` starts with this subspace's prefix
    pub fn contains(&self, key: &[u8]) -> bool {
        key.starts_with(&self.prefix)
    }

    /// Range `[begin, end)` of every key strictly inside the subspace
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        let mut begin = self.prefix.clone();
        begin.push(0x00);
        let mut end = self.prefix.clone();
        end.push(0xFF);
        (begin, end)
    }

    /// First key after every tuple that extends `tuple`
    ///
    /// This is `pack(tuple)` followed by `0xFF`, not `strinc`: a packed
    /// string or bytes element ends in its `0x00` terminator, and a longer
    /// value with an escaped `0x00` continues with `0x00 0xFF`, so
    /// incrementing the terminator would skip it.
    pub fn after(&self, tuple: &Tuple) -> Vec<u8> {
        let mut key = self.pack(tuple);
        key.push(0xFF);
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> Subspace {
        Subspace::new(&Tuple::new().with("record-layer-demo"))
    }

    #[test]
    fn test_pack_unpack_within_subspace() {
        let records = root().child(1i64).child("Order");
        let pk = Tuple::new().with(23i64);
        let key = records.pack(&pk);
        assert!(records.contains(&key));
        assert_eq!(records.unpack(&key).unwrap(), pk);
    }

    #[test]
    fn test_unpack_foreign_key_fails() {
        let records = root().child(1i64);
        let indexes = root().child(2i64);
        let key = indexes.pack(&Tuple::new().with("priceIndex"));
        assert_eq!(records.unpack(&key), Err(CodecError::SubspaceMismatch));
    }

    #[test]
    fn test_sibling_subspaces_disjoint() {
        let (begin, end) = root().child(1i64).range();
        let index_key = root().child(2i64).pack(&Tuple::new().with(5i64));
        assert!(!(begin <= index_key && index_key < end));
    }

    #[test]
    fn test_after_skips_all_extensions() {
        let idx = root().child(2i64).child("priceIndex");
        let after = idx.after(&Tuple::new().with(50i64));
        let same_value = idx.pack(&Tuple::new().with(50i64).with(999i64));
        let next_value = idx.pack(&Tuple::new().with(51i64));
        assert!(same_value < after);
        assert!(after <= next_value);
    }

    #[test]
    fn test_after_string_keeps_longer_values_with_nul() {
        let idx = root().child(2i64).child("nameIndex");
        let after = idx.after(&Tuple::new().with("ab"));
        let same = idx.pack(&Tuple::new().with("ab").with(1i64));
        let with_nul = idx.pack(&Tuple::new().with("ab\0").with(2i64));
        let with_nul_tail = idx.pack(&Tuple::new().with("ab\0z").with(3i64));
        let next = idx.pack(&Tuple::new().with("ac").with(4i64));
        assert!(same < after);
        assert!(after <= with_nul);
        assert!(after <= with_nul_tail);
        assert!(after <= next);

        let bytes_after = idx.after(&Tuple::new().with(vec![0x61u8]));
        let longer = idx.pack(&Tuple::new().with(vec![0x61u8, 0x00]));
        assert!(bytes_after <= longer);
    }
}
