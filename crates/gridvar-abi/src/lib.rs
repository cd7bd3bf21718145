//! Host ABI contract for gridvar add-in modules.
//!
//! This crate defines the types and constants shared between the grid host's
//! loader shim and the value engine: kind codes, ownership codes, error
//! codes, sheet rectangles, the raw numeric-matrix header, and the layout
//! constants the engine's record type must satisfy. It is deliberately
//! dependency-free and contains no allocation or engine logic, so it can be
//! consumed from any crate that needs to speak the boundary format.

use std::cmp::Ordering;

/// ABI version for host/module compatibility checks.
///
/// Bump on any change to record layout, kind or owner codes, or the matrix
/// header.
pub const GRIDVAR_ABI_VERSION: u32 = 2;

/// Total size of one value record in bytes (64-bit targets).
pub const RECORD_SIZE: usize = 32;
/// Byte offset of the kind code within a record.
pub const RECORD_KIND_OFFSET: usize = 24;
/// Byte offset of the owner code within a record.
pub const RECORD_OWNER_OFFSET: usize = 28;
/// Size of the payload union at the front of a record.
pub const RECORD_PAYLOAD_SIZE: usize = 24;

/// Discriminant codes for the value record.
///
/// The numeric values are the host's wire codes and must not change. The
/// derived ordering compares by code, which is the cross-kind ordering the
/// engine exposes. Ownership is never encoded here; see [`Owner`].
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Kind {
    /// IEEE double.
    Number = 0x0001,
    /// Counted UTF-16 string.
    String = 0x0002,
    /// Boolean stored as a 32-bit integer.
    Boolean = 0x0004,
    /// Multi-rectangle sheet reference.
    RefList = 0x0008,
    /// Host error code, see [`ErrorCode`].
    Error = 0x0010,
    /// Two-dimensional array of records, row-major.
    Array = 0x0040,
    /// Omitted argument.
    Missing = 0x0080,
    /// Empty cell.
    Nil = 0x0100,
    /// Single rectangle on the active sheet.
    SingleRef = 0x0400,
    /// 32-bit integer.
    Integer = 0x0800,
    /// Opaque byte payload.
    Blob = 0x0802,
}

impl Kind {
    /// Raw wire code.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Checked decode of a wire code.
    pub const fn from_code(code: u32) -> Option<Kind> {
        Some(match code {
            0x0001 => Kind::Number,
            0x0002 => Kind::String,
            0x0004 => Kind::Boolean,
            0x0008 => Kind::RefList,
            0x0010 => Kind::Error,
            0x0040 => Kind::Array,
            0x0080 => Kind::Missing,
            0x0100 => Kind::Nil,
            0x0400 => Kind::SingleRef,
            0x0800 => Kind::Integer,
            0x0802 => Kind::Blob,
            _ => return None,
        })
    }

    /// True for the kinds that carry a heap payload.
    pub const fn is_allocating(self) -> bool {
        matches!(self, Kind::String | Kind::Array | Kind::RefList | Kind::Blob)
    }
}

/// Destruction policy for a record, carried alongside the kind.
///
/// Exactly one of these applies to every record at every point in its life;
/// destruction dispatches on it exhaustively.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Owner {
    /// The record's scope owns the payload and releases it directly.
    #[default]
    Scope = 0,
    /// The host allocator owns the payload; release goes through the host's
    /// free entry point.
    Host = 1,
    /// The payload belongs to a boxed record handed to the host; the local
    /// record releases nothing.
    Module = 2,
}

impl Owner {
    pub const fn code(self) -> u8 {
        self as u8
    }

    pub const fn from_code(code: u8) -> Option<Owner> {
        Some(match code {
            0 => Owner::Scope,
            1 => Owner::Host,
            2 => Owner::Module,
            _ => return None,
        })
    }
}

/// Host error codes carried by Error records.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    /// Intersection of two ranges that do not intersect.
    Null = 0,
    /// Division by zero.
    Div0 = 7,
    /// Wrong type of operand or argument.
    Value = 15,
    /// Reference to cells that are no longer valid.
    Ref = 23,
    /// Unrecognized name in a formula.
    Name = 29,
    /// Invalid numeric value.
    Num = 36,
    /// Value not available.
    NA = 42,
}

impl ErrorCode {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub const fn from_code(code: i32) -> Option<ErrorCode> {
        Some(match code {
            0 => ErrorCode::Null,
            7 => ErrorCode::Div0,
            15 => ErrorCode::Value,
            23 => ErrorCode::Ref,
            29 => ErrorCode::Name,
            36 => ErrorCode::Num,
            42 => ErrorCode::NA,
            _ => return None,
        })
    }

    /// The host's display form, e.g. `#VALUE!`.
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Null => "#NULL!",
            ErrorCode::Div0 => "#DIV/0!",
            ErrorCode::Value => "#VALUE!",
            ErrorCode::Ref => "#REF!",
            ErrorCode::Name => "#NAME?",
            ErrorCode::Num => "#NUM!",
            ErrorCode::NA => "#N/A",
        }
    }

    /// One-line description suitable for alerts.
    pub const fn description(self) -> &'static str {
        match self {
            ErrorCode::Null => "intersection of ranges that do not intersect",
            ErrorCode::Div0 => "division by zero",
            ErrorCode::Value => "wrong type of operand or argument",
            ErrorCode::Ref => "reference to cells that are not valid",
            ErrorCode::Name => "unrecognized name",
            ErrorCode::Num => "invalid numeric value",
            ErrorCode::NA => "value not available",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rectangle of cells, bounds inclusive.
///
/// Field order is the host's wire order. The default value is the empty
/// rectangle anchored at the origin (zero height and width), not the
/// all-zero single cell.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SheetRect {
    pub row_first: i32,
    pub row_last: i32,
    pub col_first: i32,
    pub col_last: i32,
}

impl SheetRect {
    /// Rectangle of `height` x `width` cells anchored at (`row`, `col`).
    pub const fn new(row: i32, col: i32, height: i32, width: i32) -> SheetRect {
        SheetRect {
            row_first: row,
            row_last: row + height - 1,
            col_first: col,
            col_last: col + width - 1,
        }
    }

    /// Single cell at (`row`, `col`).
    pub const fn cell(row: i32, col: i32) -> SheetRect {
        SheetRect::new(row, col, 1, 1)
    }

    pub const fn rows(&self) -> i32 {
        self.row_last - self.row_first + 1
    }

    pub const fn columns(&self) -> i32 {
        self.col_last - self.col_first + 1
    }

    /// Number of cells covered; zero for degenerate rectangles.
    pub const fn count(&self) -> i64 {
        let r = self.rows();
        let c = self.columns();
        if r <= 0 || c <= 0 {
            0
        } else {
            r as i64 * c as i64
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.count() == 0
    }
}

impl Default for SheetRect {
    fn default() -> SheetRect {
        SheetRect::new(0, 0, 0, 0)
    }
}

impl PartialOrd for SheetRect {
    fn partial_cmp(&self, other: &SheetRect) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SheetRect {
    /// Lexicographic over (row_first, col_first, row_last, col_last): the
    /// upper-left corner orders first, extents break ties.
    fn cmp(&self, other: &SheetRect) -> Ordering {
        (self.row_first, self.col_first, self.row_last, self.col_last).cmp(&(
            other.row_first,
            other.col_first,
            other.row_last,
            other.col_last,
        ))
    }
}

/// Inline payload of a SingleRef record.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SingleRefPayload {
    /// Rectangle count; 1 for a well-formed single reference.
    pub count: u16,
    pub rect: SheetRect,
}

impl SingleRefPayload {
    pub const fn new(rect: SheetRect) -> SingleRefPayload {
        SingleRefPayload { count: 1, rect }
    }
}

impl Default for SingleRefPayload {
    fn default() -> SingleRefPayload {
        SingleRefPayload::new(SheetRect::new(0, 0, 0, 0))
    }
}

/// Header of the rectangle table a RefList record points at.
///
/// `count` rectangles are stored contiguously starting at `rects[0]`; the
/// declared length 1 is the usual C flexible-tail idiom and the allocation
/// is sized for the real count.
#[repr(C)]
#[derive(Debug)]
pub struct RefTableHeader {
    pub count: u16,
    pub rects: [SheetRect; 1],
}

/// Header of a fixed numeric matrix.
///
/// `rows * columns` doubles follow contiguously, row-major, in the same
/// allocation, at [`MATRIX_DATA_OFFSET`] bytes from the header.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixHeader {
    pub rows: i32,
    pub columns: i32,
}

impl MatrixHeader {
    pub const fn len(&self) -> usize {
        if self.rows <= 0 || self.columns <= 0 {
            0
        } else {
            self.rows as usize * self.columns as usize
        }
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Byte offset of the first element behind a [`MatrixHeader`].
pub const MATRIX_DATA_OFFSET: usize = std::mem::size_of::<MatrixHeader>();
/// Alignment of a matrix allocation.
pub const MATRIX_ALIGN: usize = std::mem::align_of::<f64>();

/// ABI version probe for host shims.
///
/// # Safety
/// Trivially safe; declared `extern "C"` so loaders can resolve it by name.
#[no_mangle]
pub extern "C" fn gv_abi_version() -> u32 {
    GRIDVAR_ABI_VERSION
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{align_of, size_of};

    #[test]
    fn test_layout_constants() {
        assert_eq!(size_of::<SheetRect>(), 16);
        assert_eq!(align_of::<SheetRect>(), 4);
        assert_eq!(size_of::<SingleRefPayload>(), 20);
        assert_eq!(size_of::<MatrixHeader>(), 8);
        assert_eq!(MATRIX_DATA_OFFSET, 8);
        assert_eq!(size_of::<Kind>(), 4);
        assert_eq!(size_of::<Owner>(), 1);
        assert_eq!(size_of::<ErrorCode>(), 4);
    }

    #[test]
    fn test_kind_codes_round_trip() {
        for kind in [
            Kind::Number,
            Kind::String,
            Kind::Boolean,
            Kind::RefList,
            Kind::Error,
            Kind::Array,
            Kind::Missing,
            Kind::Nil,
            Kind::SingleRef,
            Kind::Integer,
            Kind::Blob,
        ] {
            assert_eq!(Kind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(Kind::from_code(0x0003), None);
        assert_eq!(Kind::from_code(0), None);
    }

    #[test]
    fn test_kind_order_follows_codes() {
        assert!(Kind::Number < Kind::String);
        assert!(Kind::String < Kind::Boolean);
        assert!(Kind::Error < Kind::Array);
        assert!(Kind::Nil < Kind::SingleRef);
        assert!(Kind::Integer < Kind::Blob);
    }

    #[test]
    fn test_allocating_kinds() {
        assert!(Kind::String.is_allocating());
        assert!(Kind::Array.is_allocating());
        assert!(Kind::RefList.is_allocating());
        assert!(Kind::Blob.is_allocating());
        assert!(!Kind::Number.is_allocating());
        assert!(!Kind::SingleRef.is_allocating());
        assert!(!Kind::Nil.is_allocating());
    }

    #[test]
    fn test_error_code_strings() {
        assert_eq!(ErrorCode::Value.as_str(), "#VALUE!");
        assert_eq!(ErrorCode::NA.as_str(), "#N/A");
        assert_eq!(ErrorCode::Div0.to_string(), "#DIV/0!");
        assert_eq!(ErrorCode::from_code(15), Some(ErrorCode::Value));
        assert_eq!(ErrorCode::from_code(1), None);
    }

    #[test]
    fn test_rect_geometry() {
        let r = SheetRect::new(2, 3, 4, 5);
        assert_eq!(r.rows(), 4);
        assert_eq!(r.columns(), 5);
        assert_eq!(r.count(), 20);
        assert!(!r.is_empty());

        let empty = SheetRect::default();
        assert_eq!(empty.rows(), 0);
        assert_eq!(empty.columns(), 0);
        assert!(empty.is_empty());

        let cell = SheetRect::cell(1, 1);
        assert_eq!(cell.count(), 1);
    }

    #[test]
    fn test_rect_ordering() {
        let a = SheetRect::new(0, 0, 1, 1);
        let b = SheetRect::new(0, 1, 1, 1);
        let c = SheetRect::new(1, 0, 1, 1);
        let wide = SheetRect::new(0, 0, 1, 3);
        assert!(a < b);
        assert!(b < c);
        assert!(a < wide);
        assert_eq!(a.cmp(&a), std::cmp::Ordering::Equal);
    }

    #[test]
    fn test_owner_codes() {
        assert_eq!(Owner::from_code(0), Some(Owner::Scope));
        assert_eq!(Owner::from_code(1), Some(Owner::Host));
        assert_eq!(Owner::from_code(2), Some(Owner::Module));
        assert_eq!(Owner::from_code(3), None);
        assert_eq!(Owner::default(), Owner::Scope);
    }

    #[test]
    fn test_abi_version_probe() {
        assert_eq!(gv_abi_version(), GRIDVAR_ABI_VERSION);
    }
}
