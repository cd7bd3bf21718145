//! Handle registry: numeric keys for heap-owned pointees.
//!
//! The registry maps `u64` keys to boxed [`Variant`]s or embedded native
//! objects, so a scalar Number can stand in for a nested structure when the
//! host only understands flat grids. Keys are allocated sequentially from
//! 2^48: every key is an integer exactly representable in the `f64` payload
//! of a Number record, and the range is disjoint from ordinary user numbers,
//! so a key can be carried in cells without colliding with data.
//!
//! Dropping a Scope-owned Number whose payload is a live key releases the
//! registered pointee's contents (the entry keeps a Nil shell); that is what
//! lets a compressed value own its nested parts transitively. Erasure hands
//! the entry back to the caller instead of freeing it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::Variant;

/// First key handed out.
const HANDLE_BASE: u64 = 1 << 48;
/// Exclusive upper bound; beyond this an f64 can no longer hold every
/// integer key exactly.
const HANDLE_LIMIT: u64 = 1 << 53;

/// Registry key. `0` is the reserved null handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub const fn null() -> Handle {
        Handle(0)
    }

    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// The form carried in Number payloads; exact by construction.
    pub fn as_num(self) -> f64 {
        self.0 as f64
    }

    /// Checked decode of a Number payload: integral and inside the key
    /// range. Ordinary user numbers never qualify.
    pub fn from_num(num: f64) -> Option<Handle> {
        if !(num >= HANDLE_BASE as f64) || num >= HANDLE_LIMIT as f64 {
            return None;
        }
        if num.fract() != 0.0 {
            return None;
        }
        Some(Handle(num as u64))
    }
}

/// An entry owned by the registry.
pub enum Registered {
    /// A boxed variant value.
    Value(Box<Variant>),
    /// An embedded native object.
    Native(Box<dyn Any + Send>),
}

static TABLE: Lazy<Mutex<HashMap<u64, Registered>>> = Lazy::new(|| Mutex::new(HashMap::new()));
static NEXT_KEY: AtomicU64 = AtomicU64::new(HANDLE_BASE);
static LIVE: AtomicUsize = AtomicUsize::new(0);

fn next_key() -> u64 {
    let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
    // 2^53 - 2^48 allocations would take months of continuous inserts.
    assert!(key < HANDLE_LIMIT, "handle key space exhausted");
    key
}

/// Prepares the registry. Idempotent; insertion also works lazily, so this
/// exists for embedders that want deterministic setup at module attach.
pub fn init() {
    Lazy::force(&TABLE);
    log::debug!("handle registry ready");
}

/// Drains the registry, dropping every surviving entry, and returns how
/// many there were. Meant for module detach; the key sequence keeps
/// advancing so stale keys can never alias new entries.
pub fn shutdown() -> usize {
    let drained: Vec<Registered> = {
        let mut table = TABLE.lock();
        table.drain().map(|(_, entry)| entry).collect()
    };
    LIVE.store(0, Ordering::Release);
    let n = drained.len();
    if n > 0 {
        log::warn!("handle registry shutdown dropped {n} live entries");
    }
    // Dropped outside the lock: entries may hold nested handle keys whose
    // destruction consults the (now empty) table.
    drop(drained);
    n
}

/// Boxes `value` and returns its key.
pub fn insert(value: Variant) -> Handle {
    let key = next_key();
    TABLE.lock().insert(key, Registered::Value(Box::new(value)));
    LIVE.fetch_add(1, Ordering::Release);
    log::debug!("handle {key:#x}: boxed value");
    Handle(key)
}

/// Boxes a native object and returns its key.
pub fn insert_native<T: Any + Send>(object: T) -> Handle {
    let key = next_key();
    TABLE.lock().insert(key, Registered::Native(Box::new(object)));
    LIVE.fetch_add(1, Ordering::Release);
    log::debug!("handle {key:#x}: native object");
    Handle(key)
}

pub fn contains(handle: Handle) -> bool {
    !handle.is_null() && TABLE.lock().contains_key(&handle.raw())
}

/// Runs `f` over the boxed value behind `handle`, if there is one. `f`
/// runs under the table lock and must not call back into the registry.
pub fn with_value<R>(handle: Handle, f: impl FnOnce(&mut Variant) -> R) -> Option<R> {
    let mut table = TABLE.lock();
    match table.get_mut(&handle.raw()) {
        Some(Registered::Value(value)) => Some(f(value)),
        _ => None,
    }
}

/// Runs `f` over the native object behind `handle` when it is a `T`. Same
/// locking contract as [`with_value`].
pub fn with_native<T: Any, R>(handle: Handle, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    let mut table = TABLE.lock();
    match table.get_mut(&handle.raw()) {
        Some(Registered::Native(object)) => object.downcast_mut::<T>().map(f),
        _ => None,
    }
}

/// Removes the entry and hands it back. Erasure itself never frees the
/// pointee; the caller decides whether the returned box drops.
pub fn erase(handle: Handle) -> Option<Registered> {
    let removed = TABLE.lock().remove(&handle.raw());
    if removed.is_some() {
        LIVE.fetch_sub(1, Ordering::Release);
        log::debug!("handle {:#x} erased", handle.raw());
    }
    removed
}

/// Number-destruction hook: when `num` is a live key over a boxed value,
/// takes the pointee's contents and drops them. The entry keeps its Nil
/// shell, so a second release of the same key is a no-op.
pub(crate) fn release_pointee(num: f64) {
    if LIVE.load(Ordering::Acquire) == 0 {
        return;
    }
    let Some(handle) = Handle::from_num(num) else {
        return;
    };
    let taken = {
        let mut table = TABLE.lock();
        match table.get_mut(&handle.raw()) {
            Some(Registered::Value(value)) => Some(value.take()),
            _ => None,
        }
    };
    // Dropped outside the lock: the pointee may itself carry handle keys.
    if let Some(value) = taken {
        log::debug!("handle {:#x}: pointee released", handle.raw());
        drop(value);
    }
}

/// Deep copy of `value` in which every nested array element of an array is
/// recursively compressed, registered, and replaced by a Number carrying
/// the new key. The result owns its registered pointees transitively.
pub fn compress(value: &Variant) -> Variant {
    let mut out = value.clone();
    compress_in_place(&mut out);
    out
}

fn compress_in_place(value: &mut Variant) {
    if !value.is_array() {
        return;
    }
    for element in value.elements_mut() {
        if element.is_array() {
            let mut nested = element.take();
            compress_in_place(&mut nested);
            let handle = insert(nested);
            *element = Variant::from(handle.as_num());
        }
    }
}

/// Deep copy of `value` in which every Number that is a live key over a
/// boxed value is replaced by a recursively expanded clone of the pointee.
/// Registry entries are left untouched, so expansion can be repeated.
pub fn expand(value: &Variant) -> Variant {
    if value.is_array() {
        if value.len() == 0 {
            return value.clone();
        }
        let elements: Vec<Variant> = value.elements().iter().map(expand).collect();
        return Variant::from_boxed_elements(
            value.rows() as i32,
            value.columns() as i32,
            elements.into_boxed_slice(),
        );
    }
    if let Some(handle) = Handle::from_num(value.as_num()) {
        if value.kind() == gridvar_abi::Kind::Number {
            // Clone under the lock, expand after releasing it.
            if let Some(inner) = with_value(handle, |pointee| pointee.clone()) {
                return expand(&inner);
            }
        }
    }
    value.clone()
}

/// The registry is process-global; tests that touch it serialize here, from
/// this module and from the boundary tests alike.
#[cfg(test)]
pub(crate) fn registry_test_guard() -> parking_lot::MutexGuard<'static, ()> {
    static TEST_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
    TEST_LOCK.lock()
}
