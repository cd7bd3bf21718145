//! Ordering, equality, and truthiness.
//!
//! Records of different kinds order by their kind code; records of the same
//! kind compare payloads. NaN keeps Number comparisons partial, so the
//! engine exposes [`Variant::compare`] returning `Option<Ordering>` and
//! derives `PartialEq`/`PartialOrd` from it.

use std::cmp::Ordering;

use gridvar_abi::Kind;

use crate::{wide, Variant};

impl Variant {
    /// Partial comparison. Differing kinds order by kind code; equal kinds
    /// compare payloads. `None` only when a Number payload involves NaN.
    pub fn compare(&self, other: &Variant) -> Option<Ordering> {
        if self.kind != other.kind {
            return Some(self.kind.cmp(&other.kind));
        }
        match self.kind {
            Kind::Number => unsafe { self.val.num.partial_cmp(&other.val.num) },
            Kind::String => {
                let a = unsafe { wide::counted_units(self.val.str) };
                let b = unsafe { wide::counted_units(other.val.str) };
                Some(a.cmp(b))
            }
            Kind::Boolean => Some(unsafe { self.val.boolean.cmp(&other.val.boolean) }),
            Kind::Error => Some(unsafe { self.val.err.cmp(&other.val.err) }),
            Kind::Integer => Some(unsafe { self.val.int.cmp(&other.val.int) }),
            Kind::Missing | Kind::Nil => Some(Ordering::Equal),
            Kind::SingleRef => {
                let a = unsafe { self.val.sref }.rect;
                let b = unsafe { other.val.sref }.rect;
                Some(a.cmp(&b))
            }
            Kind::RefList => {
                let (sheet_a, rects_a) = self.as_ref_list().unwrap_or((0, &[]));
                let (sheet_b, rects_b) = other.as_ref_list().unwrap_or((0, &[]));
                Some(sheet_a.cmp(&sheet_b).then_with(|| rects_a.cmp(rects_b)))
            }
            Kind::Array => {
                let by_rows = self.rows().cmp(&other.rows());
                if by_rows != Ordering::Equal {
                    return Some(by_rows);
                }
                let by_cols = self.columns().cmp(&other.columns());
                if by_cols != Ordering::Equal {
                    return Some(by_cols);
                }
                for (a, b) in self.elements().iter().zip(other.elements()) {
                    match a.compare(b) {
                        Some(Ordering::Equal) => continue,
                        unequal => return unequal,
                    }
                }
                Some(Ordering::Equal)
            }
            Kind::Blob => {
                let a = self.as_blob().unwrap_or(&[]);
                let b = other.as_blob().unwrap_or(&[]);
                Some(a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            }
        }
    }

    /// The falsy table: NaN-or-zero Number, empty String, false Boolean,
    /// empty RefList, every Error, empty Array, Missing, Nil, empty
    /// SingleRef, zero Integer, empty Blob. Everything else is true.
    pub fn is_false(&self) -> bool {
        match self.kind {
            Kind::Number => {
                let n = unsafe { self.val.num };
                n.is_nan() || n == 0.0
            }
            Kind::String => unsafe { wide::counted_units(self.val.str) }.is_empty(),
            Kind::Boolean => (unsafe { self.val.boolean }) == 0,
            Kind::RefList => self.as_ref_list().map_or(true, |(_, rects)| rects.is_empty()),
            Kind::Error => true,
            Kind::Array => self.len() == 0,
            Kind::Missing | Kind::Nil => true,
            Kind::SingleRef => self.len() == 0,
            Kind::Integer => (unsafe { self.val.int }) == 0,
            Kind::Blob => (unsafe { self.val.blob.len }) <= 0,
        }
    }

    pub fn is_true(&self) -> bool {
        !self.is_false()
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Variant) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Variant {
    fn partial_cmp(&self, other: &Variant) -> Option<Ordering> {
        self.compare(other)
    }
}
