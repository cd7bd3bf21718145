//! The variant value record.
//!
//! [`Variant`] is the 32-byte tagged-union record exchanged with the grid
//! host: a 24-byte payload union, the kind code at offset 24, and the owner
//! code at offset 28. The kind is a pure discriminant; destruction policy
//! lives in the separate [`Owner`] field and is dispatched exhaustively in
//! [`Variant::release`]. Four kinds carry heap payloads (String, Array,
//! RefList, Blob); everything else is inline.

use std::alloc::Layout;
use std::fmt;
use std::mem::ManuallyDrop;

use thiserror::Error;

use gridvar_abi::{
    ErrorCode, Kind, Owner, RefTableHeader, SheetRect, SingleRefPayload, RECORD_KIND_OFFSET,
    RECORD_OWNER_OFFSET, RECORD_PAYLOAD_SIZE, RECORD_SIZE,
};

use crate::{boundary, handle, wide};

/// Conversion failure for the typed accessors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValueError {
    #[error("expected a {expected:?} record, found {found:?}")]
    KindMismatch { expected: Kind, found: Kind },
    #[error("number {0} does not fit an i32")]
    IntOutOfRange(f64),
}

/// Array payload arm: element pointer plus dimensions.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct ArrayPayload {
    pub data: *mut Variant,
    pub rows: i32,
    pub columns: i32,
}

/// RefList payload arm: rectangle table plus the owning sheet.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct RefListPayload {
    pub table: *mut RefTableHeader,
    pub sheet_id: usize,
}

/// Blob payload arm.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) struct BlobPayload {
    pub data: *mut u8,
    pub len: i32,
}

/// The 24-byte payload union. Reads are gated by the kind field; all arms
/// are plain-old-data so writes never drop.
#[repr(C)]
#[derive(Clone, Copy)]
pub(crate) union Payload {
    pub num: f64,
    pub str: *mut u16,
    pub boolean: i32,
    pub err: i32,
    pub int: i32,
    pub sref: SingleRefPayload,
    pub mref: RefListPayload,
    pub array: ArrayPayload,
    pub blob: BlobPayload,
}

/// A variant value record.
///
/// Owns its payload per the [`Owner`] tag: Scope-owned payloads free
/// directly, Host-owned ones release through the host's free entry point,
/// Module-owned ones belong to a boxed record already handed to the host.
/// Cloning is always a deep, Scope-owned copy. Dropping a Number consults
/// the handle registry (see [`crate::handle`]).
#[repr(C)]
pub struct Variant {
    pub(crate) val: Payload,
    pub(crate) kind: Kind,
    pub(crate) owner: Owner,
}

// Layout pinned against the host contract.
const _: () = {
    assert!(std::mem::size_of::<Variant>() == RECORD_SIZE);
    assert!(std::mem::size_of::<Payload>() == RECORD_PAYLOAD_SIZE);
    assert!(std::mem::offset_of!(Variant, kind) == RECORD_KIND_OFFSET);
    assert!(std::mem::offset_of!(Variant, owner) == RECORD_OWNER_OFFSET);
};

// Payload pointers are uniquely owned by their record, so moving a record
// between threads moves the allocations with it. Shared references are not
// claimed thread-safe; there is deliberately no `Sync`.
unsafe impl Send for Variant {}

impl Variant {
    pub const fn nil() -> Variant {
        Variant {
            val: Payload { num: 0.0 },
            kind: Kind::Nil,
            owner: Owner::Scope,
        }
    }

    pub const fn missing() -> Variant {
        Variant {
            val: Payload { num: 0.0 },
            kind: Kind::Missing,
            owner: Owner::Scope,
        }
    }

    pub const fn error(code: ErrorCode) -> Variant {
        Variant {
            val: Payload { err: code.code() },
            kind: Kind::Error,
            owner: Owner::Scope,
        }
    }

    /// Counted UTF-16 string from code units. Over-long input degrades to
    /// `Error(Value)`.
    pub fn from_wide(units: &[u16]) -> Variant {
        match wide::alloc_counted(units) {
            Some(p) => Variant {
                val: Payload { str: p },
                kind: Kind::String,
                owner: Owner::Scope,
            },
            None => Variant::error(ErrorCode::Value),
        }
    }

    /// Imports a null-terminated UTF-16 buffer, scanning at most
    /// [`wide::SCAN_CAP`] units.
    ///
    /// # Safety
    /// `p` must be readable up to its terminator or the scan cap.
    pub unsafe fn from_wide_ptr(p: *const u16) -> Variant {
        let n = unsafe { wide::scan_len(p) };
        let units = unsafe { std::slice::from_raw_parts(p, n) };
        Variant::from_wide(units)
    }

    /// Nil-filled `rows x cols` array. A zero-size shape is an invalid
    /// allocation and degrades to `Error(NA)`.
    pub fn array(rows: usize, cols: usize) -> Variant {
        let n = match rows.checked_mul(cols) {
            Some(n) if n > 0 && rows <= i32::MAX as usize && cols <= i32::MAX as usize => n,
            _ => return Variant::error(ErrorCode::NA),
        };
        Variant::from_boxed_elements(rows as i32, cols as i32, nils(n).into_boxed_slice())
    }

    /// 1 x n array from a list of elements.
    pub fn row(elements: Vec<Variant>) -> Variant {
        if elements.is_empty() {
            return Variant::error(ErrorCode::NA);
        }
        if elements.len() > i32::MAX as usize {
            return Variant::error(ErrorCode::NA);
        }
        let n = elements.len() as i32;
        Variant::from_boxed_elements(1, n, elements.into_boxed_slice())
    }

    /// Opaque byte payload. Empty input carries a null pointer and length
    /// zero, which never frees.
    pub fn blob(bytes: &[u8]) -> Variant {
        if bytes.len() > i32::MAX as usize {
            return Variant::error(ErrorCode::Value);
        }
        let payload = if bytes.is_empty() {
            BlobPayload {
                data: std::ptr::null_mut(),
                len: 0,
            }
        } else {
            BlobPayload {
                data: Box::into_raw(bytes.to_vec().into_boxed_slice()) as *mut u8,
                len: bytes.len() as i32,
            }
        };
        Variant {
            val: Payload { blob: payload },
            kind: Kind::Blob,
            owner: Owner::Scope,
        }
    }

    /// Multi-rectangle reference on one sheet.
    pub fn ref_list(sheet_id: usize, rects: &[SheetRect]) -> Variant {
        if rects.len() > u16::MAX as usize {
            return Variant::error(ErrorCode::Value);
        }
        Variant {
            val: Payload {
                mref: RefListPayload {
                    table: alloc_ref_table(rects),
                    sheet_id,
                },
            },
            kind: Kind::RefList,
            owner: Owner::Scope,
        }
    }

    /// Raw array constructor; callers guarantee `elements.len() == rows * columns`.
    pub(crate) fn from_boxed_elements(
        rows: i32,
        columns: i32,
        elements: Box<[Variant]>,
    ) -> Variant {
        debug_assert_eq!(elements.len(), rows as usize * columns as usize);
        let data = Box::into_raw(elements) as *mut Variant;
        Variant {
            val: Payload {
                array: ArrayPayload {
                    data,
                    rows,
                    columns,
                },
            },
            kind: Kind::Array,
            owner: Owner::Scope,
        }
    }

    /// Imports a host-written record by deep copy. The result is
    /// Scope-owned and independent of the host's allocations. `None` when
    /// the kind code, error code, or array header is malformed.
    ///
    /// # Safety
    /// `p` must point at [`RECORD_SIZE`] readable bytes laid out per the
    /// contract, and any payload pointers must be valid for the claimed
    /// kind.
    pub unsafe fn from_raw_record(p: *const u8) -> Option<Variant> {
        let code = unsafe { std::ptr::read_unaligned(p.add(RECORD_KIND_OFFSET) as *const u32) };
        let kind = Kind::from_code(code)?;
        let val = unsafe { std::ptr::read_unaligned(p as *const Payload) };
        match kind {
            Kind::Error => {
                ErrorCode::from_code(unsafe { val.err })?;
            }
            Kind::String => {
                if unsafe { val.str }.is_null() {
                    return None;
                }
            }
            Kind::Array => {
                let a = unsafe { val.array };
                if a.rows < 0 || a.columns < 0 {
                    return None;
                }
                if a.rows as i64 * a.columns as i64 > 0 && a.data.is_null() {
                    return None;
                }
            }
            Kind::Blob => {
                let b = unsafe { val.blob };
                if b.len < 0 || (b.len > 0 && b.data.is_null()) {
                    return None;
                }
            }
            _ => {}
        }
        // A non-dropping view over the host memory; cloning it produces the
        // owned deep copy.
        let view = ManuallyDrop::new(Variant {
            val,
            kind,
            owner: Owner::Scope,
        });
        Some((*view).clone())
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn owner(&self) -> Owner {
        self.owner
    }

    pub fn is_array(&self) -> bool {
        self.kind == Kind::Array
    }

    /// Row count: arrays and references report their shape, Missing and Nil
    /// are empty, and every other kind is a 1 x 1 scalar.
    pub fn rows(&self) -> usize {
        match self.kind {
            Kind::Array => (unsafe { self.val.array.rows.max(0) }) as usize,
            Kind::SingleRef => (unsafe { self.val.sref.rect.rows().max(0) }) as usize,
            Kind::Missing | Kind::Nil => 0,
            _ => 1,
        }
    }

    pub fn columns(&self) -> usize {
        match self.kind {
            Kind::Array => (unsafe { self.val.array.columns.max(0) }) as usize,
            Kind::SingleRef => (unsafe { self.val.sref.rect.columns().max(0) }) as usize,
            Kind::Missing | Kind::Nil => 0,
            _ => 1,
        }
    }

    /// Element count, `rows * columns`.
    pub fn len(&self) -> usize {
        self.rows() * self.columns()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_vector(&self) -> bool {
        self.is_array() && (self.rows() == 1 || self.columns() == 1)
    }

    /// Numeric coercion: Number, Boolean, and Integer yield their value,
    /// Missing and Nil yield zero, everything else is NaN.
    pub fn as_num(&self) -> f64 {
        match self.kind {
            Kind::Number => unsafe { self.val.num },
            Kind::Boolean => (unsafe { self.val.boolean }) as f64,
            Kind::Integer => (unsafe { self.val.int }) as f64,
            Kind::Missing | Kind::Nil => 0.0,
            _ => f64::NAN,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.kind {
            Kind::Boolean => Some(unsafe { self.val.boolean } != 0),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self.kind {
            Kind::Integer => Some(unsafe { self.val.int }),
            _ => None,
        }
    }

    pub fn as_err(&self) -> Option<ErrorCode> {
        match self.kind {
            Kind::Error => ErrorCode::from_code(unsafe { self.val.err }),
            _ => None,
        }
    }

    pub fn as_sref(&self) -> Option<SheetRect> {
        match self.kind {
            Kind::SingleRef => Some(unsafe { self.val.sref }.rect),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self.kind {
            Kind::Blob => {
                let b = unsafe { self.val.blob };
                if b.len <= 0 || b.data.is_null() {
                    Some(&[])
                } else {
                    Some(unsafe { std::slice::from_raw_parts(b.data, b.len as usize) })
                }
            }
            _ => None,
        }
    }

    pub fn as_ref_list(&self) -> Option<(usize, &[SheetRect])> {
        match self.kind {
            Kind::RefList => {
                let m = unsafe { self.val.mref };
                if m.table.is_null() {
                    Some((m.sheet_id, &[]))
                } else {
                    Some((m.sheet_id, unsafe { ref_table_rects(m.table) }))
                }
            }
            _ => None,
        }
    }

    /// UTF-16 code units of a String record.
    pub fn wide(&self) -> Option<&[u16]> {
        match self.kind {
            Kind::String => Some(unsafe { wide::counted_units(self.val.str) }),
            _ => None,
        }
    }

    /// UTF-8 form of a String record.
    pub fn to_utf8(&self) -> Option<String> {
        self.wide().map(wide::decode)
    }

    /// Moves the value out, leaving Nil behind.
    pub fn take(&mut self) -> Variant {
        std::mem::replace(self, Variant::nil())
    }

    /// String concatenation in place: a Missing or Nil receiver becomes a
    /// copy of `other`; two Strings join into a fresh buffer; any other
    /// combination degrades to `Error(NA)`. Never panics.
    pub fn concat(&mut self, other: &Variant) -> &mut Self {
        if matches!(self.kind, Kind::Missing | Kind::Nil) {
            *self = other.clone();
        } else if self.kind == Kind::String && other.kind == Kind::String {
            let a = unsafe { wide::counted_units(self.val.str) };
            let b = unsafe { wide::counted_units(other.val.str) };
            let mut joined = Vec::with_capacity(a.len() + b.len());
            joined.extend_from_slice(a);
            joined.extend_from_slice(b);
            *self = Variant::from_wide(&joined);
        } else {
            *self = Variant::error(ErrorCode::NA);
        }
        self
    }

    /// Marks a record received from the host so its destruction releases
    /// through the host's free entry point. Only allocating kinds carry
    /// host storage; everything else stays Scope-owned.
    pub fn mark_host_owned(&mut self) -> &mut Self {
        if self.kind.is_allocating() && self.owner == Owner::Scope {
            self.owner = Owner::Host;
        }
        self
    }

    /// Releases the payload per the owner tag and resets the record to Nil.
    /// Safe to run on an already-reset record.
    fn release(&mut self) {
        match self.owner {
            Owner::Host => {
                // Reset the tag first so the hook sees a Scope record and
                // re-entry cannot double-release.
                self.owner = Owner::Scope;
                boundary::host_release(self);
            }
            Owner::Module => {
                // The payload belongs to the boxed record handed to the
                // host; releasing it is `release_returned`'s job.
            }
            Owner::Scope => match self.kind {
                Kind::String => unsafe { wide::free_counted(self.val.str) },
                Kind::Array => unsafe {
                    let a = self.val.array;
                    let n = a.rows as usize * a.columns as usize;
                    if !a.data.is_null() {
                        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                            a.data, n,
                        )));
                    }
                },
                Kind::Blob => unsafe {
                    let b = self.val.blob;
                    if b.len > 0 && !b.data.is_null() {
                        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(
                            b.data,
                            b.len as usize,
                        )));
                    }
                },
                Kind::RefList => unsafe { free_ref_table(self.val.mref.table) },
                Kind::Number => handle::release_pointee(unsafe { self.val.num }),
                _ => {}
            },
        }
        self.val = Payload { num: 0.0 };
        self.kind = Kind::Nil;
        self.owner = Owner::Scope;
    }
}

impl Drop for Variant {
    fn drop(&mut self) {
        self.release();
    }
}

impl Clone for Variant {
    /// Deep copy. The clone is always Scope-owned; heap payloads are
    /// duplicated and array elements clone recursively.
    fn clone(&self) -> Variant {
        match self.kind {
            Kind::String => {
                let units = unsafe { wide::counted_units(self.val.str) };
                Variant::from_wide(units)
            }
            Kind::Array => {
                let a = unsafe { self.val.array };
                let elements: Vec<Variant> = self.elements().iter().cloned().collect();
                Variant::from_boxed_elements(a.rows, a.columns, elements.into_boxed_slice())
            }
            Kind::Blob => {
                let bytes = self.as_blob().unwrap_or(&[]);
                Variant::blob(bytes)
            }
            Kind::RefList => {
                let (sheet_id, rects) = self.as_ref_list().unwrap_or((0, &[]));
                Variant::ref_list(sheet_id, rects)
            }
            _ => Variant {
                val: self.val,
                kind: self.kind,
                owner: Owner::Scope,
            },
        }
    }
}

impl Default for Variant {
    fn default() -> Variant {
        Variant::nil()
    }
}

impl From<f64> for Variant {
    fn from(num: f64) -> Variant {
        Variant {
            val: Payload { num },
            kind: Kind::Number,
            owner: Owner::Scope,
        }
    }
}

impl From<bool> for Variant {
    fn from(b: bool) -> Variant {
        Variant {
            val: Payload {
                boolean: b as i32,
            },
            kind: Kind::Boolean,
            owner: Owner::Scope,
        }
    }
}

impl From<i32> for Variant {
    fn from(int: i32) -> Variant {
        Variant {
            val: Payload { int },
            kind: Kind::Integer,
            owner: Owner::Scope,
        }
    }
}

impl From<ErrorCode> for Variant {
    fn from(code: ErrorCode) -> Variant {
        Variant::error(code)
    }
}

impl From<SheetRect> for Variant {
    fn from(rect: SheetRect) -> Variant {
        Variant {
            val: Payload {
                sref: SingleRefPayload::new(rect),
            },
            kind: Kind::SingleRef,
            owner: Owner::Scope,
        }
    }
}

impl From<&str> for Variant {
    fn from(s: &str) -> Variant {
        Variant::from_wide(&wide::encode(s))
    }
}

impl From<String> for Variant {
    fn from(s: String) -> Variant {
        Variant::from(s.as_str())
    }
}

impl FromIterator<Variant> for Variant {
    /// Collects into a 1 x n array row.
    fn from_iter<I: IntoIterator<Item = Variant>>(iter: I) -> Variant {
        Variant::row(iter.into_iter().collect())
    }
}

impl TryFrom<&Variant> for f64 {
    type Error = ValueError;

    fn try_from(v: &Variant) -> Result<f64, ValueError> {
        match v.kind {
            Kind::Number | Kind::Boolean | Kind::Integer => Ok(v.as_num()),
            found => Err(ValueError::KindMismatch {
                expected: Kind::Number,
                found,
            }),
        }
    }
}

impl TryFrom<&Variant> for i32 {
    type Error = ValueError;

    fn try_from(v: &Variant) -> Result<i32, ValueError> {
        match v.kind {
            Kind::Integer => Ok(unsafe { v.val.int }),
            Kind::Number => {
                let n = unsafe { v.val.num };
                if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 {
                    Ok(n as i32)
                } else {
                    Err(ValueError::IntOutOfRange(n))
                }
            }
            found => Err(ValueError::KindMismatch {
                expected: Kind::Integer,
                found,
            }),
        }
    }
}

impl TryFrom<&Variant> for bool {
    type Error = ValueError;

    fn try_from(v: &Variant) -> Result<bool, ValueError> {
        v.as_bool().ok_or(ValueError::KindMismatch {
            expected: Kind::Boolean,
            found: v.kind,
        })
    }
}

impl TryFrom<&Variant> for String {
    type Error = ValueError;

    fn try_from(v: &Variant) -> Result<String, ValueError> {
        v.to_utf8().ok_or(ValueError::KindMismatch {
            expected: Kind::String,
            found: v.kind,
        })
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Number => write!(f, "{}", unsafe { self.val.num }),
            Kind::String => f.write_str(&self.to_utf8().unwrap_or_default()),
            Kind::Boolean => f.write_str(if unsafe { self.val.boolean } != 0 {
                "TRUE"
            } else {
                "FALSE"
            }),
            Kind::Integer => write!(f, "{}", unsafe { self.val.int }),
            Kind::Error => match self.as_err() {
                Some(code) => f.write_str(code.as_str()),
                None => f.write_str("#ERR?"),
            },
            Kind::Missing | Kind::Nil => Ok(()),
            Kind::SingleRef => {
                let rect = unsafe { self.val.sref }.rect;
                write_rect(f, &rect)
            }
            Kind::RefList => {
                let (sheet_id, rects) = self.as_ref_list().unwrap_or((0, &[]));
                write!(f, "[{sheet_id}]")?;
                for (i, rect) in rects.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_rect(f, rect)?;
                }
                Ok(())
            }
            Kind::Array => {
                f.write_str("{")?;
                let cols = self.columns();
                for (i, el) in self.elements().iter().enumerate() {
                    if i > 0 {
                        f.write_str(if i % cols == 0 { ";" } else { "," })?;
                    }
                    write!(f, "{el}")?;
                }
                f.write_str("}")
            }
            Kind::Blob => write!(f, "blob[{}]", unsafe { self.val.blob.len }),
        }
    }
}

fn write_rect(f: &mut fmt::Formatter<'_>, rect: &SheetRect) -> fmt::Result {
    if rect.rows() == 1 && rect.columns() == 1 {
        write!(f, "R{}C{}", rect.row_first + 1, rect.col_first + 1)
    } else {
        write!(
            f,
            "R{}C{}:R{}C{}",
            rect.row_first + 1,
            rect.col_first + 1,
            rect.row_last + 1,
            rect.col_last + 1
        )
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            Kind::Number => f.debug_tuple("Number").field(&unsafe { self.val.num }).finish(),
            Kind::String => f
                .debug_tuple("String")
                .field(&self.to_utf8().unwrap_or_default())
                .finish(),
            Kind::Boolean => f
                .debug_tuple("Boolean")
                .field(&(unsafe { self.val.boolean } != 0))
                .finish(),
            Kind::Integer => f.debug_tuple("Integer").field(&unsafe { self.val.int }).finish(),
            Kind::Error => f.debug_tuple("Error").field(&self.as_err()).finish(),
            Kind::Missing => f.write_str("Missing"),
            Kind::Nil => f.write_str("Nil"),
            Kind::SingleRef => f
                .debug_tuple("SingleRef")
                .field(&unsafe { self.val.sref }.rect)
                .finish(),
            Kind::RefList => {
                let (sheet_id, rects) = self.as_ref_list().unwrap_or((0, &[]));
                f.debug_struct("RefList")
                    .field("sheet_id", &sheet_id)
                    .field("rects", &rects)
                    .finish()
            }
            Kind::Array => f
                .debug_struct("Array")
                .field("rows", &self.rows())
                .field("columns", &self.columns())
                .field("elements", &self.elements())
                .finish(),
            Kind::Blob => f
                .debug_tuple("Blob")
                .field(&self.as_blob().unwrap_or(&[]))
                .finish(),
        }
    }
}

/// `n` fresh Nil records.
pub(crate) fn nils(n: usize) -> Vec<Variant> {
    std::iter::repeat_with(Variant::nil).take(n).collect()
}

fn ref_table_layout(count: usize) -> Layout {
    let bytes = std::mem::size_of::<RefTableHeader>()
        .max(std::mem::offset_of!(RefTableHeader, rects) + count * std::mem::size_of::<SheetRect>());
    // Infallible for any count that fits the u16 field.
    Layout::from_size_align(bytes, std::mem::align_of::<RefTableHeader>())
        .unwrap_or_else(|_| Layout::new::<RefTableHeader>())
}

fn alloc_ref_table(rects: &[SheetRect]) -> *mut RefTableHeader {
    let layout = ref_table_layout(rects.len());
    unsafe {
        let p = std::alloc::alloc(layout) as *mut RefTableHeader;
        if p.is_null() {
            std::alloc::handle_alloc_error(layout);
        }
        (*p).count = rects.len() as u16;
        let dst = std::ptr::addr_of_mut!((*p).rects) as *mut SheetRect;
        std::ptr::copy_nonoverlapping(rects.as_ptr(), dst, rects.len());
        p
    }
}

unsafe fn free_ref_table(p: *mut RefTableHeader) {
    if p.is_null() {
        return;
    }
    let count = unsafe { (*p).count } as usize;
    let layout = ref_table_layout(count);
    unsafe { std::alloc::dealloc(p as *mut u8, layout) };
}

unsafe fn ref_table_rects<'a>(p: *const RefTableHeader) -> &'a [SheetRect] {
    let count = unsafe { (*p).count } as usize;
    if count == 0 {
        return &[];
    }
    let first = unsafe { std::ptr::addr_of!((*p).rects) } as *const SheetRect;
    unsafe { std::slice::from_raw_parts(first, count) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_layout() {
        assert_eq!(std::mem::size_of::<Variant>(), RECORD_SIZE);
        assert_eq!(std::mem::offset_of!(Variant, kind), RECORD_KIND_OFFSET);
        assert_eq!(std::mem::offset_of!(Variant, owner), RECORD_OWNER_OFFSET);
        assert_eq!(std::mem::align_of::<Variant>(), 8);
    }

    #[test]
    fn test_scalar_constructors() {
        assert_eq!(Variant::nil().kind(), Kind::Nil);
        assert_eq!(Variant::missing().kind(), Kind::Missing);
        assert_eq!(Variant::from(1.5).kind(), Kind::Number);
        assert_eq!(Variant::from(true).kind(), Kind::Boolean);
        assert_eq!(Variant::from(7i32).kind(), Kind::Integer);
        assert_eq!(Variant::from(ErrorCode::NA).kind(), Kind::Error);
        assert_eq!(
            Variant::from(SheetRect::cell(0, 0)).kind(),
            Kind::SingleRef
        );
        assert_eq!(Variant::default().kind(), Kind::Nil);
    }

    #[test]
    fn test_shape_accessors() {
        let nil = Variant::nil();
        assert_eq!(nil.rows(), 0);
        assert_eq!(nil.len(), 0);
        assert!(nil.is_empty());

        let num = Variant::from(2.0);
        assert_eq!((num.rows(), num.columns(), num.len()), (1, 1, 1));

        let arr = Variant::array(2, 3);
        assert_eq!((arr.rows(), arr.columns(), arr.len()), (2, 3, 6));
        assert!(arr.is_array());
        assert!(!arr.is_vector());
        assert!(Variant::array(1, 4).is_vector());

        let sref = Variant::from(SheetRect::new(0, 0, 2, 5));
        assert_eq!((sref.rows(), sref.columns(), sref.len()), (2, 5, 10));
    }

    #[test]
    fn test_zero_size_array_degrades() {
        let v = Variant::array(0, 5);
        assert_eq!(v.kind(), Kind::Error);
        assert_eq!(v.as_err(), Some(ErrorCode::NA));
        assert_eq!(Variant::array(3, 0).as_err(), Some(ErrorCode::NA));
        assert_eq!(Variant::row(Vec::new()).as_err(), Some(ErrorCode::NA));
    }

    #[test]
    fn test_string_round_trip() {
        let v = Variant::from("héllo grid");
        assert_eq!(v.kind(), Kind::String);
        assert_eq!(v.to_utf8().as_deref(), Some("héllo grid"));
        assert_eq!(v.wide().map(|w| w.len()), Some(10));

        let empty = Variant::from("");
        assert_eq!(empty.to_utf8().as_deref(), Some(""));
        assert_eq!(empty.len(), 1);
    }

    #[test]
    fn test_as_num_coercions() {
        assert_eq!(Variant::from(2.5).as_num(), 2.5);
        assert_eq!(Variant::from(true).as_num(), 1.0);
        assert_eq!(Variant::from(false).as_num(), 0.0);
        assert_eq!(Variant::from(9i32).as_num(), 9.0);
        assert_eq!(Variant::missing().as_num(), 0.0);
        assert_eq!(Variant::nil().as_num(), 0.0);
        assert!(Variant::from("text").as_num().is_nan());
        assert!(Variant::error(ErrorCode::Div0).as_num().is_nan());
    }

    #[test]
    fn test_try_from_accessors() {
        assert_eq!(f64::try_from(&Variant::from(3.0)), Ok(3.0));
        assert_eq!(f64::try_from(&Variant::from(true)), Ok(1.0));
        assert_eq!(i32::try_from(&Variant::from(7i32)), Ok(7));
        assert_eq!(i32::try_from(&Variant::from(8.0)), Ok(8));
        assert_eq!(
            i32::try_from(&Variant::from(8.5)),
            Err(ValueError::IntOutOfRange(8.5))
        );
        assert_eq!(bool::try_from(&Variant::from(true)), Ok(true));
        assert_eq!(String::try_from(&Variant::from("ok")), Ok("ok".into()));
        assert!(matches!(
            f64::try_from(&Variant::from("text")),
            Err(ValueError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_clone_is_deep() {
        let mut original = Variant::array(2, 2);
        original[0] = Variant::from("abc");
        original[1] = Variant::from(1.0);
        let copy = original.clone();

        original[0] = Variant::from("changed");
        original[1] = Variant::from(99.0);

        assert_eq!(copy[0].to_utf8().as_deref(), Some("abc"));
        assert_eq!(copy[1].as_num(), 1.0);
        assert_eq!(copy.owner(), Owner::Scope);
    }

    #[test]
    fn test_take_leaves_nil() {
        let mut v = Variant::from("abc");
        let moved = v.take();
        assert_eq!(v.kind(), Kind::Nil);
        assert_eq!(moved.to_utf8().as_deref(), Some("abc"));
    }

    #[test]
    fn test_concat() {
        let mut s = Variant::from("abc");
        s.concat(&Variant::from("def"));
        assert_eq!(s.to_utf8().as_deref(), Some("abcdef"));

        let mut empty = Variant::nil();
        empty.concat(&Variant::from("xyz"));
        assert_eq!(empty.to_utf8().as_deref(), Some("xyz"));

        let mut missing = Variant::missing();
        missing.concat(&Variant::from(5.0));
        assert_eq!(missing.as_num(), 5.0);

        let mut num = Variant::from(5.0);
        num.concat(&Variant::from("abc"));
        assert_eq!(num.as_err(), Some(ErrorCode::NA));

        let mut s2 = Variant::from("abc");
        s2.concat(&Variant::from(1.0));
        assert_eq!(s2.as_err(), Some(ErrorCode::NA));
    }

    #[test]
    fn test_blob_round_trip() {
        let v = Variant::blob(&[1, 2, 3]);
        assert_eq!(v.kind(), Kind::Blob);
        assert_eq!(v.as_blob(), Some(&[1u8, 2, 3][..]));
        let copy = v.clone();
        drop(v);
        assert_eq!(copy.as_blob(), Some(&[1u8, 2, 3][..]));

        let empty = Variant::blob(&[]);
        assert_eq!(empty.as_blob(), Some(&[][..]));
        assert!(empty.is_false());
    }

    #[test]
    fn test_ref_list_round_trip() {
        let rects = [SheetRect::new(0, 0, 2, 2), SheetRect::cell(5, 5)];
        let v = Variant::ref_list(3, &rects);
        assert_eq!(v.kind(), Kind::RefList);
        let (sheet, got) = v.as_ref_list().unwrap();
        assert_eq!(sheet, 3);
        assert_eq!(got, &rects[..]);

        let copy = v.clone();
        drop(v);
        assert_eq!(copy.as_ref_list().unwrap().1, &rects[..]);

        let empty = Variant::ref_list(0, &[]);
        assert_eq!(empty.as_ref_list().unwrap().1.len(), 0);
    }

    #[test]
    fn test_from_wide_ptr_scans_to_terminator() {
        let buf: Vec<u16> = wide::encode("abc").into_iter().chain([0, 0x41]).collect();
        let v = unsafe { Variant::from_wide_ptr(buf.as_ptr()) };
        assert_eq!(v.to_utf8().as_deref(), Some("abc"));
    }

    #[test]
    fn test_from_raw_record_deep_copies() {
        let mut source = Variant::array(1, 2);
        source[0] = Variant::from("abc");
        source[1] = Variant::from(2.0);

        let imported = unsafe {
            Variant::from_raw_record(&source as *const Variant as *const u8)
        }
        .unwrap();
        // Mutating the source must not affect the import.
        source[0] = Variant::from("zzz");
        assert_eq!(imported[0].to_utf8().as_deref(), Some("abc"));
        assert_eq!(imported[1].as_num(), 2.0);
        assert_eq!(imported.owner(), Owner::Scope);
    }

    #[test]
    fn test_from_raw_record_rejects_garbage() {
        let mut bytes = [0u8; RECORD_SIZE];
        // An unknown kind code.
        bytes[RECORD_KIND_OFFSET..RECORD_KIND_OFFSET + 4]
            .copy_from_slice(&0x0003u32.to_ne_bytes());
        assert!(unsafe { Variant::from_raw_record(bytes.as_ptr()) }.is_none());
        // An Error record with an invalid code.
        let mut err = [0u8; RECORD_SIZE];
        err[..4].copy_from_slice(&99i32.to_ne_bytes());
        err[RECORD_KIND_OFFSET..RECORD_KIND_OFFSET + 4]
            .copy_from_slice(&Kind::Error.code().to_ne_bytes());
        assert!(unsafe { Variant::from_raw_record(err.as_ptr()) }.is_none());
    }

    #[test]
    fn test_mark_host_owned_only_allocating() {
        let mut s = Variant::from("abc");
        s.mark_host_owned();
        assert_eq!(s.owner(), Owner::Host);
        // Neutralize: reclaim the payload locally so the test does not leak
        // through the missing host hook.
        s.owner = Owner::Scope;

        let mut n = Variant::from(1.0);
        n.mark_host_owned();
        assert_eq!(n.owner(), Owner::Scope);
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Variant::from(1.0).to_string(), "1");
        assert_eq!(Variant::from("abc").to_string(), "abc");
        assert_eq!(Variant::from(true).to_string(), "TRUE");
        assert_eq!(Variant::error(ErrorCode::Value).to_string(), "#VALUE!");
        assert_eq!(Variant::nil().to_string(), "");
        assert_eq!(Variant::from(SheetRect::cell(0, 0)).to_string(), "R1C1");
        assert_eq!(
            Variant::from(SheetRect::new(0, 0, 2, 3)).to_string(),
            "R1C1:R2C3"
        );

        let mut arr = Variant::array(2, 2);
        arr[0] = Variant::from(1.0);
        arr[1] = Variant::from(2.0);
        arr[2] = Variant::from("x");
        arr[3] = Variant::from(4.0);
        assert_eq!(arr.to_string(), "{1,2;x,4}");
    }
}
