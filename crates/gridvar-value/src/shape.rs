//! Structural editing: reshape, resize, stacking, enlist, transpose, and
//! the lenient indexing forms.
//!
//! Shape mismatches that plausibly arrive from user data degrade to Error
//! records; calls that violate the API contract outright (reshape changing
//! the element count, out-of-range array indexing) panic and are caught at
//! the dispatch boundary.

use std::ops::{Index, IndexMut};

use gridvar_abi::{ErrorCode, Kind, Owner};

use crate::value::nils;
use crate::Variant;

/// Moves `src` out when the surrounding buffer is owned, clones when it
/// belongs to the host.
fn lift(src: &mut Variant, owned: bool) -> Variant {
    if owned {
        src.take()
    } else {
        src.clone()
    }
}

impl Variant {
    /// Elements of an array in row-major order; any other value is its own
    /// one-element slice.
    pub fn elements(&self) -> &[Variant] {
        if self.kind == Kind::Array {
            let n = self.len();
            if n == 0 {
                return &[];
            }
            unsafe { std::slice::from_raw_parts(self.val.array.data, n) }
        } else {
            std::slice::from_ref(self)
        }
    }

    /// Mutable form of [`Variant::elements`].
    pub fn elements_mut(&mut self) -> &mut [Variant] {
        if self.kind == Kind::Array {
            let n = self.len();
            if n == 0 {
                return &mut [];
            }
            unsafe { std::slice::from_raw_parts_mut(self.val.array.data, n) }
        } else {
            std::slice::from_mut(self)
        }
    }

    /// Row `r` of an array as a slice.
    pub fn row_slice(&self, r: usize) -> Option<&[Variant]> {
        if !self.is_array() || r >= self.rows() {
            return None;
        }
        let cols = self.columns();
        Some(&self.elements()[r * cols..(r + 1) * cols])
    }

    /// Two-dimensional access. Non-arrays ignore the indices and return
    /// themselves; arrays check both coordinates.
    pub fn at(&self, i: usize, j: usize) -> &Variant {
        if !self.is_array() {
            return self;
        }
        let (r, c) = (self.rows(), self.columns());
        assert!(i < r && j < c, "index ({i}, {j}) out of range for {r}x{c} array");
        &self.elements()[i * c + j]
    }

    /// Mutable form of [`Variant::at`].
    pub fn at_mut(&mut self, i: usize, j: usize) -> &mut Variant {
        if !self.is_array() {
            return self;
        }
        let (r, c) = (self.rows(), self.columns());
        assert!(i < r && j < c, "index ({i}, {j}) out of range for {r}x{c} array");
        &mut self.elements_mut()[i * c + j]
    }

    /// Relabels an array's dimensions without touching elements. Panics
    /// when the value is not an array or the element count would change.
    pub fn reshape(&mut self, rows: usize, cols: usize) -> &mut Self {
        assert!(self.is_array(), "reshape on a non-array value");
        let n = rows.checked_mul(cols);
        assert!(
            n == Some(self.len()) && rows <= i32::MAX as usize && cols <= i32::MAX as usize,
            "reshape {rows}x{cols} does not preserve element count {}",
            self.len()
        );
        let mut a = unsafe { self.val.array };
        a.rows = rows as i32;
        a.columns = cols as i32;
        self.val.array = a;
        self
    }

    /// Reallocates to `rows x cols`, keeping `min(old, new)` elements by
    /// linear index and Nil-filling growth. Zero size degrades the record
    /// to `Error(NA)`; a non-array contributes its single element.
    pub fn resize(&mut self, rows: usize, cols: usize) -> &mut Self {
        let n = match rows.checked_mul(cols) {
            Some(n) if rows <= i32::MAX as usize && cols <= i32::MAX as usize => n,
            _ => {
                *self = Variant::error(ErrorCode::NA);
                return self;
            }
        };
        if n == 0 {
            *self = Variant::error(ErrorCode::NA);
            return self;
        }
        if self.is_array() && n == self.len() {
            return self.reshape(rows, cols);
        }
        let mut old = self.take();
        let owned = old.owner() == Owner::Scope;
        let keep = n.min(old.len());
        let mut fresh = nils(n);
        for (dst, src) in fresh.iter_mut().zip(old.elements_mut().iter_mut().take(keep)) {
            *dst = lift(src, owned);
        }
        *self = Variant::from_boxed_elements(rows as i32, cols as i32, fresh.into_boxed_slice());
        self
    }

    /// Stacks `other` below. An empty operand is neutral; column counts
    /// must match exactly (a non-array, non-empty operand counts as 1 x 1)
    /// or the record degrades to `Error(Value)`.
    pub fn vstack(&mut self, other: &Variant) -> &mut Self {
        if other.len() == 0 {
            return self;
        }
        if self.len() == 0 {
            *self = other.clone();
            return self;
        }
        let (self_rows, self_cols) = self.stack_dims();
        let (other_rows, other_cols) = other.stack_dims();
        if self_cols != other_cols {
            *self = Variant::error(ErrorCode::Value);
            return self;
        }
        let rows = self_rows + other_rows;
        let mut old = self.take();
        let owned = old.owner() == Owner::Scope;
        let mut fresh = nils(rows * self_cols);
        for (dst, src) in fresh.iter_mut().zip(old.elements_mut().iter_mut()) {
            *dst = lift(src, owned);
        }
        for (dst, src) in fresh[self_rows * self_cols..].iter_mut().zip(other.elements()) {
            *dst = src.clone();
        }
        *self = Variant::from_boxed_elements(rows as i32, self_cols as i32, fresh.into_boxed_slice());
        self
    }

    /// Stacks `other` to the right: transpose both operands, vstack,
    /// transpose back. Row mismatches therefore degrade to `Error(Value)`.
    pub fn hstack(&mut self, other: &Variant) -> &mut Self {
        let mut lhs = self.take();
        lhs.transpose();
        let mut rhs = other.clone();
        rhs.transpose();
        lhs.vstack(&rhs);
        lhs.transpose();
        *self = lhs;
        self
    }

    /// Appends `x` as one element (arrays included) to a vector,
    /// preserving orientation: a 1 x n row becomes 1 x (n+1) and an n x 1
    /// column becomes (n+1) x 1, with 1 x 1 counting as a row. An empty
    /// receiver becomes `x` (enlisted when scalar); a non-vector receiver
    /// degrades to `Error(Value)`.
    pub fn append(&mut self, x: Variant) -> &mut Self {
        if self.len() == 0 {
            *self = x;
            if !self.is_array() {
                self.enlist();
            }
            return self;
        }
        if !self.is_array() {
            self.enlist();
        }
        if self.rows() != 1 && self.columns() != 1 {
            *self = Variant::error(ErrorCode::Value);
            return self;
        }
        let was_column = self.columns() == 1 && self.rows() > 1;
        let n = self.len();
        let mut old = self.take();
        let owned = old.owner() == Owner::Scope;
        let mut fresh = nils(n + 1);
        for (dst, src) in fresh.iter_mut().zip(old.elements_mut().iter_mut()) {
            *dst = lift(src, owned);
        }
        fresh[n] = x;
        *self = Variant::from_boxed_elements(1, (n + 1) as i32, fresh.into_boxed_slice());
        if was_column {
            let mut a = unsafe { self.val.array };
            std::mem::swap(&mut a.rows, &mut a.columns);
            self.val.array = a;
        }
        self
    }

    /// Wraps the value in a fresh 1 x 1 array. Every call wraps one more
    /// level; repeated enlisting nests rather than idempotently no-oping.
    pub fn enlist(&mut self) -> &mut Self {
        let inner = self.take();
        *self = Variant::from_boxed_elements(1, 1, vec![inner].into_boxed_slice());
        self
    }

    /// Element-transpose for arrays; vectors only swap their header, other
    /// kinds are untouched.
    pub fn transpose(&mut self) -> &mut Self {
        if !self.is_array() {
            return self;
        }
        let (r, c) = (self.rows(), self.columns());
        if r <= 1 || c <= 1 {
            // Row-major vectors keep their element order under transpose.
            let mut a = unsafe { self.val.array };
            std::mem::swap(&mut a.rows, &mut a.columns);
            self.val.array = a;
            return self;
        }
        let mut old = self.take();
        let owned = old.owner() == Owner::Scope;
        let mut fresh = nils(r * c);
        {
            let src = old.elements_mut();
            for i in 0..r {
                for j in 0..c {
                    fresh[j * r + i] = lift(&mut src[i * c + j], owned);
                }
            }
        }
        *self = Variant::from_boxed_elements(c as i32, r as i32, fresh.into_boxed_slice());
        self
    }

    /// Shape an operand contributes to stacking: arrays report their own,
    /// anything else non-empty is a 1 x 1 cell.
    fn stack_dims(&self) -> (usize, usize) {
        if self.is_array() {
            (self.rows(), self.columns())
        } else {
            (1, 1)
        }
    }
}

impl Index<usize> for Variant {
    type Output = Variant;

    /// Row-major linear access; non-arrays ignore the index and return
    /// themselves.
    fn index(&self, i: usize) -> &Variant {
        if self.is_array() {
            &self.elements()[i]
        } else {
            self
        }
    }
}

impl IndexMut<usize> for Variant {
    fn index_mut(&mut self, i: usize) -> &mut Variant {
        if self.is_array() {
            &mut self.elements_mut()[i]
        } else {
            self
        }
    }
}
