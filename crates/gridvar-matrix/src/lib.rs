//! Fixed numeric matrix for gridvar add-in modules.
//!
//! [`NumericMatrix`] is the dense counterpart of the variant Array: a
//! `rows x columns` rectangle of `f64` held in one allocation, the
//! [`MatrixHeader`] first and the elements row-major behind it at
//! [`MATRIX_DATA_OFFSET`]. Because the layout matches the host contract
//! byte for byte, the whole allocation crosses the boundary as-is through
//! [`NumericMatrix::as_raw`]. Zero-size matrices are valid and keep a
//! header-only allocation.
//!
//! Shape mismatches here are call-contract violations and assert, landing
//! in the dispatch-boundary guard like every other contract panic; there is
//! no Error-value escape hatch at this level.

#![forbid(unsafe_op_in_unsafe_fn)]

use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::ptr::NonNull;

use gridvar_abi::{MatrixHeader, MATRIX_ALIGN, MATRIX_DATA_OFFSET};

/// A `rows x columns` matrix of `f64` in a single header-plus-tail
/// allocation.
pub struct NumericMatrix {
    header: NonNull<MatrixHeader>,
}

// The allocation is uniquely owned, so moving a matrix between threads
// moves its storage with it. Shared references are not claimed thread-safe.
unsafe impl Send for NumericMatrix {}

/// Allocation layout for a matrix of `n` elements.
fn layout_for(n: usize) -> Layout {
    let bytes = n
        .checked_mul(std::mem::size_of::<f64>())
        .and_then(|b| b.checked_add(MATRIX_DATA_OFFSET));
    let Some(bytes) = bytes else {
        panic!("matrix of {n} elements overflows the allocation size");
    };
    let Ok(layout) = Layout::from_size_align(bytes, MATRIX_ALIGN) else {
        panic!("matrix allocation of {bytes} bytes exceeds the address space");
    };
    layout
}

/// Validates a shape and returns it with its element count.
fn checked_dims(rows: usize, columns: usize) -> (i32, i32, usize) {
    assert!(
        rows <= i32::MAX as usize && columns <= i32::MAX as usize,
        "matrix shape {rows}x{columns} is out of range"
    );
    let Some(n) = rows.checked_mul(columns) else {
        panic!("matrix shape {rows}x{columns} overflows the element count");
    };
    (rows as i32, columns as i32, n)
}

impl NumericMatrix {
    /// Zero-filled `rows x columns` matrix. Either dimension may be zero.
    pub fn new(rows: usize, columns: usize) -> NumericMatrix {
        let (r, c, n) = checked_dims(rows, columns);
        let layout = layout_for(n);
        let p = unsafe { alloc::alloc_zeroed(layout) } as *mut MatrixHeader;
        let Some(header) = NonNull::new(p) else {
            alloc::handle_alloc_error(layout);
        };
        unsafe {
            (*header.as_ptr()).rows = r;
            (*header.as_ptr()).columns = c;
        }
        NumericMatrix { header }
    }

    /// Matrix filled from `data` in row-major order; the length must match
    /// the shape exactly.
    pub fn from_slice(rows: usize, columns: usize, data: &[f64]) -> NumericMatrix {
        let mut m = NumericMatrix::new(rows, columns);
        assert_eq!(
            data.len(),
            m.len(),
            "data length {} does not fill a {rows}x{columns} matrix",
            data.len()
        );
        m.data_mut().copy_from_slice(data);
        m
    }

    /// One-row matrix from a vector.
    pub fn from_vec(data: Vec<f64>) -> NumericMatrix {
        NumericMatrix::from_slice(1, data.len(), &data)
    }

    /// Imports a host matrix by copy; null imports as the empty matrix.
    ///
    /// # Safety
    /// A non-null `p` must point at a well-formed header with
    /// `rows * columns` doubles behind it in the same allocation.
    pub unsafe fn from_raw(p: *const MatrixHeader) -> NumericMatrix {
        if p.is_null() {
            return NumericMatrix::new(0, 0);
        }
        let header = unsafe { *p };
        let data = unsafe { (p as *const u8).add(MATRIX_DATA_OFFSET) } as *const f64;
        let elements = unsafe { std::slice::from_raw_parts(data, header.len()) };
        NumericMatrix::from_slice(
            header.rows.max(0) as usize,
            header.columns.max(0) as usize,
            elements,
        )
    }

    pub fn rows(&self) -> usize {
        unsafe { (*self.header.as_ptr()).rows.max(0) as usize }
    }

    pub fn columns(&self) -> usize {
        unsafe { (*self.header.as_ptr()).columns.max(0) as usize }
    }

    /// Element count, `rows * columns`.
    pub fn len(&self) -> usize {
        self.rows() * self.columns()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_vector(&self) -> bool {
        !self.is_empty() && (self.rows() == 1 || self.columns() == 1)
    }

    fn data_ptr(&self) -> *mut f64 {
        unsafe { (self.header.as_ptr() as *mut u8).add(MATRIX_DATA_OFFSET) as *mut f64 }
    }

    /// The elements in row-major order.
    pub fn data(&self) -> &[f64] {
        unsafe { std::slice::from_raw_parts(self.data_ptr(), self.len()) }
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        unsafe { std::slice::from_raw_parts_mut(self.data_ptr(), self.len()) }
    }

    /// Checked element access.
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        if i < self.rows() && j < self.columns() {
            Some(self.data()[i * self.columns() + j])
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, i: usize, j: usize) -> Option<&mut f64> {
        if i < self.rows() && j < self.columns() {
            let c = self.columns();
            Some(&mut self.data_mut()[i * c + j])
        } else {
            None
        }
    }

    /// Row `i` as a slice.
    pub fn row(&self, i: usize) -> Option<&[f64]> {
        if i >= self.rows() {
            return None;
        }
        let c = self.columns();
        Some(&self.data()[i * c..(i + 1) * c])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.data().iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, f64> {
        self.data_mut().iter_mut()
    }

    fn set_shape(&mut self, rows: i32, columns: i32) {
        unsafe {
            (*self.header.as_ptr()).rows = rows;
            (*self.header.as_ptr()).columns = columns;
        }
    }

    /// Relabels the dimensions without touching elements. Panics when the
    /// element count would change.
    pub fn reshape(&mut self, rows: usize, columns: usize) -> &mut Self {
        let (r, c, n) = checked_dims(rows, columns);
        assert_eq!(
            n,
            self.len(),
            "reshape {rows}x{columns} does not preserve element count {}",
            self.len()
        );
        self.set_shape(r, c);
        self
    }

    /// Resizes to `rows x columns`. An unchanged element count only updates
    /// the header; otherwise the block reallocates, the leading
    /// `min(old, new)` elements survive by linear index, and growth reads
    /// as zero.
    pub fn resize(&mut self, rows: usize, columns: usize) -> &mut Self {
        let (r, c, n) = checked_dims(rows, columns);
        let old_n = self.len();
        if n == old_n {
            self.set_shape(r, c);
            return self;
        }
        let new_layout = layout_for(n);
        let p = unsafe {
            alloc::realloc(
                self.header.as_ptr() as *mut u8,
                layout_for(old_n),
                new_layout.size(),
            )
        } as *mut MatrixHeader;
        let Some(header) = NonNull::new(p) else {
            alloc::handle_alloc_error(new_layout);
        };
        self.header = header;
        self.set_shape(r, c);
        if n > old_n {
            // Realloc leaves the tail uninitialized.
            unsafe { std::ptr::write_bytes(self.data_ptr().add(old_n), 0, n - old_n) };
        }
        self
    }

    /// In-place transpose. Vectors and degenerate shapes only swap the
    /// header fields; the general case keeps one scratch copy and applies
    /// the index permutation `dst = (rows * k) mod (len - 1)`, which sends
    /// row-major position `k = columns * i + j` to `rows * j + i` with both
    /// endpoints fixed.
    pub fn transpose(&mut self) -> &mut Self {
        let (r, c) = (self.rows(), self.columns());
        if r > 1 && c > 1 {
            let n = self.len();
            let scratch = self.data().to_vec();
            let data = self.data_mut();
            for (k, &x) in scratch.iter().enumerate().take(n - 1).skip(1) {
                data[(r * k) % (n - 1)] = x;
            }
        }
        self.set_shape(c as i32, r as i32);
        self
    }

    /// Stacks `other` below. An empty operand is neutral; otherwise the
    /// column counts must match.
    pub fn vstack(&mut self, other: &NumericMatrix) -> &mut Self {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            *self = other.clone();
            return self;
        }
        assert_eq!(
            self.columns(),
            other.columns(),
            "vstack column mismatch: {}x{} below {}x{}",
            other.rows(),
            other.columns(),
            self.rows(),
            self.columns()
        );
        let n = self.len();
        let rows = self.rows() + other.rows();
        let columns = self.columns();
        self.resize(rows, columns);
        self.data_mut()[n..].copy_from_slice(other.data());
        self
    }

    /// Stacks `other` to the right: transpose both operands, vstack,
    /// transpose back. Correctness, not speed, is the contract here.
    pub fn hstack(&mut self, other: &NumericMatrix) -> &mut Self {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            *self = other.clone();
            return self;
        }
        assert_eq!(
            self.rows(),
            other.rows(),
            "hstack row mismatch: {}x{} beside {}x{}",
            other.rows(),
            other.columns(),
            self.rows(),
            self.columns()
        );
        self.transpose();
        let mut rhs = other.clone();
        rhs.transpose();
        self.vstack(&rhs);
        self.transpose();
        self
    }

    /// Appends one element to a vector, preserving orientation: rows grow
    /// sideways, columns grow downward, and an empty matrix becomes 1 x 1.
    /// Panics on a non-vector shape.
    pub fn append(&mut self, x: f64) -> &mut Self {
        let n = self.len();
        assert!(
            n == 0 || self.rows() == 1 || self.columns() == 1,
            "append to a non-vector {}x{} matrix",
            self.rows(),
            self.columns()
        );
        if n == 0 {
            self.resize(1, 1);
        } else if self.rows() == 1 {
            self.resize(1, n + 1);
        } else {
            self.resize(n + 1, 1);
        }
        self.data_mut()[n] = x;
        self
    }

    /// The host-facing pointer: the header with the elements behind it, or
    /// null when the matrix is empty.
    pub fn as_raw(&self) -> *const MatrixHeader {
        if self.is_empty() {
            std::ptr::null()
        } else {
            self.header.as_ptr()
        }
    }

    pub fn as_raw_mut(&mut self) -> *mut MatrixHeader {
        if self.is_empty() {
            std::ptr::null_mut()
        } else {
            self.header.as_ptr()
        }
    }
}

impl Drop for NumericMatrix {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.header.as_ptr() as *mut u8, layout_for(self.len())) };
    }
}

impl Clone for NumericMatrix {
    fn clone(&self) -> NumericMatrix {
        NumericMatrix::from_slice(self.rows(), self.columns(), self.data())
    }
}

impl Default for NumericMatrix {
    fn default() -> NumericMatrix {
        NumericMatrix::new(0, 0)
    }
}

impl From<f64> for NumericMatrix {
    fn from(x: f64) -> NumericMatrix {
        NumericMatrix::from_slice(1, 1, &[x])
    }
}

impl FromIterator<f64> for NumericMatrix {
    /// Collects into a one-row matrix.
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> NumericMatrix {
        NumericMatrix::from_vec(iter.into_iter().collect())
    }
}

impl PartialEq for NumericMatrix {
    fn eq(&self, other: &NumericMatrix) -> bool {
        self.rows() == other.rows()
            && self.columns() == other.columns()
            && self.data() == other.data()
    }
}

impl Index<usize> for NumericMatrix {
    type Output = f64;

    /// Row-major linear access.
    fn index(&self, i: usize) -> &f64 {
        &self.data()[i]
    }
}

impl IndexMut<usize> for NumericMatrix {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        &mut self.data_mut()[i]
    }
}

impl Index<(usize, usize)> for NumericMatrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        let (r, c) = (self.rows(), self.columns());
        assert!(
            i < r && j < c,
            "index ({i}, {j}) out of range for {r}x{c} matrix"
        );
        &self.data()[i * c + j]
    }
}

impl IndexMut<(usize, usize)> for NumericMatrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        let (r, c) = (self.rows(), self.columns());
        assert!(
            i < r && j < c,
            "index ({i}, {j}) out of range for {r}x{c} matrix"
        );
        &mut self.data_mut()[i * c + j]
    }
}

impl fmt::Display for NumericMatrix {
    /// Brace/row notation, `{1,2;3,4}`, matching the variant Array form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        let c = self.columns();
        for (k, x) in self.data().iter().enumerate() {
            if k > 0 {
                f.write_str(if k % c == 0 { ";" } else { "," })?;
            }
            write!(f, "{x}")?;
        }
        f.write_str("}")
    }
}

impl fmt::Debug for NumericMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumericMatrix")
            .field("rows", &self.rows())
            .field("columns", &self.columns())
            .field("data", &self.data())
            .finish()
    }
}
