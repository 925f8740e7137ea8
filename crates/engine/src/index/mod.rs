//! Secondary index maintenance
//!
//! Every index entry is a key with an empty value:
//!
//! ```text
//! (root..., 2, index_name, indexed_value..., primary_key...) -> ''
//! ```
//!
//! The record itself is found by following the trailing primary key back to
//! the record subspace. Entries are written in the same transaction as the
//! record change that produced them.

mod maintainer;

pub use maintainer::{IndexCheckReport, IndexEntry, IndexMaintainer};
pub(crate) use maintainer::decode_entry_key;

use std::ops::Bound;

use recordlayer_core::{Result, Subspace, Tuple};

/// Raw key range covering tuples between `low` and `high` inside `subspace`
///
/// Bounds are tuple prefixes: `Included(t)` starts at the first key whose
/// leading columns equal `t`, `Excluded(t)` starts after all of them, and
/// symmetrically for the high side. Unbounded sides cover the whole subspace.
pub fn key_range(
    subspace: &Subspace,
    low: Bound<&Tuple>,
    high: Bound<&Tuple>,
) -> Result<(Vec<u8>, Vec<u8>)> {
    let (whole_begin, whole_end) = subspace.range();
    let begin = match low {
        Bound::Included(t) => subspace.pack(t),
        Bound::Excluded(t) => subspace.after(t),
        Bound::Unbounded => whole_begin,
    };
    let end = match high {
        Bound::Included(t) => subspace.after(t),
        Bound::Excluded(t) => subspace.pack(t),
        Bound::Unbounded => whole_end,
    };
    Ok((begin, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordlayer_core::TupleElement;

    fn index() -> Subspace {
        Subspace::new(&Tuple::new().with("root").with(2i64).with("priceIndex"))
    }

    fn entry(price: i64, pk: i64) -> Vec<u8> {
        index().pack(&Tuple::new().with(price).with(pk))
    }

    fn within(range: &(Vec<u8>, Vec<u8>), key: &[u8]) -> bool {
        range.0.as_slice() <= key && key < range.1.as_slice()
    }

    #[test]
    fn test_inclusive_and_exclusive_bounds() {
        let fifty = Tuple::new().with(50i64);
        let r = key_range(&index(), Bound::Unbounded, Bound::Excluded(&fifty)).unwrap();
        assert!(within(&r, &entry(34, 23)));
        assert!(!within(&r, &entry(50, 1)));

        let r = key_range(&index(), Bound::Unbounded, Bound::Included(&fifty)).unwrap();
        assert!(within(&r, &entry(50, 1)));
        assert!(!within(&r, &entry(51, 1)));

        let r = key_range(&index(), Bound::Excluded(&fifty), Bound::Unbounded).unwrap();
        assert!(!within(&r, &entry(50, 999)));
        assert!(within(&r, &entry(51, 0)));
    }

    #[test]
    fn test_string_bounds_respect_embedded_nul() {
        let name = |s: &str, pk: i64| index().pack(&Tuple::new().with(s).with(pk));
        let ab = Tuple::new().with("ab");

        let above = key_range(&index(), Bound::Excluded(&ab), Bound::Unbounded).unwrap();
        assert!(!within(&above, &name("ab", 1)));
        assert!(within(&above, &name("ab\0", 2)));
        assert!(within(&above, &name("ab\0z", 3)));
        assert!(within(&above, &name("ac", 4)));

        let at_most = key_range(&index(), Bound::Unbounded, Bound::Included(&ab)).unwrap();
        assert!(within(&at_most, &name("aa", 5)));
        assert!(within(&at_most, &name("ab", 1)));
        assert!(!within(&at_most, &name("ab\0", 2)));
        assert!(!within(&at_most, &name("ab\0z", 3)));
    }

    #[test]
    fn test_excluding_null_skips_null_entries() {
        let null = Tuple::new().with(TupleElement::Null);
        let null_entry = index().pack(&Tuple::new().with(TupleElement::Null).with(7i64));
        let r = key_range(&index(), Bound::Excluded(&null), Bound::Unbounded).unwrap();
        assert!(!within(&r, &null_entry));
        assert!(within(&r, &entry(i64::MIN, 0)));

        let all = key_range(&index(), Bound::Unbounded, Bound::Unbounded).unwrap();
        assert!(within(&all, &null_entry));
    }
}
