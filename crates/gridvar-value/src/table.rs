//! Key-value lookup over 2 x N and N x 2 arrays.
//!
//! A two-row array reads as keys-over-values and a two-column array as
//! key-value rows, which makes small JSON-like tables addressable by key.
//! The two-row interpretation wins for a 2 x 2 array.

use gridvar_abi::ErrorCode;

use crate::Variant;

impl Variant {
    /// Linear index of the value cell paired with `key`, when the receiver
    /// is 2-row or 2-column shaped and the key compares equal somewhere.
    fn lookup_index(&self, key: &Variant) -> Option<usize> {
        if !self.is_array() {
            return None;
        }
        let (rows, cols) = (self.rows(), self.columns());
        if rows == 2 {
            for j in 0..cols {
                if self.at(0, j) == key {
                    return Some(cols + j);
                }
            }
            None
        } else if cols == 2 {
            for i in 0..rows {
                if self.at(i, 0) == key {
                    return Some(2 * i + 1);
                }
            }
            None
        } else {
            None
        }
    }

    /// The value paired with `key`, if present.
    pub fn lookup(&self, key: &Variant) -> Option<&Variant> {
        self.lookup_index(key).map(|i| &self.elements()[i])
    }

    /// Mutable form of [`Variant::lookup`].
    pub fn lookup_mut(&mut self, key: &Variant) -> Option<&mut Variant> {
        let i = self.lookup_index(key)?;
        Some(&mut self.elements_mut()[i])
    }

    /// Clone of the value paired with `key`, or the `Error(Value)` sentinel
    /// when the key is absent or the receiver is not 2-shaped.
    pub fn value_of(&self, key: &Variant) -> Variant {
        self.lookup(key)
            .cloned()
            .unwrap_or_else(|| Variant::error(ErrorCode::Value))
    }
}
