//! The module's side of the host call boundary.
//!
//! Records returned to the host are boxed and marked Module-owned; the host
//! hands them back through [`gv_release_value`] when it is done. Records
//! received from the host whose payload the host will free are marked
//! Host-owned ([`Variant::mark_host_owned`]) and release through the
//! installed [`HostRelease`] hook. [`guarded`] is the outermost catch:
//! a contract-violation panic inside an entry point becomes an error alert
//! plus an `Error(Value)` result instead of unwinding into the host.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use once_cell::sync::OnceCell;

use gridvar_abi::{ErrorCode, Owner};

use crate::{alert, Variant};

/// The host's designated free entry point for Host-owned payloads.
pub type HostRelease = Arc<dyn Fn(&mut Variant) + Send + Sync>;

/// Completion callback for [`spawn_async`], called with the token the host
/// issued for the call and the finished result.
pub type AsyncResult = Arc<dyn Fn(&Variant, &Variant) + Send + Sync>;

static HOST_RELEASE: OnceCell<HostRelease> = OnceCell::new();
static ASYNC_RESULT: OnceCell<AsyncResult> = OnceCell::new();

/// Installs the host's free entry point. First installation wins.
pub fn set_host_release_hook<F>(hook: F)
where
    F: Fn(&mut Variant) + Send + Sync + 'static,
{
    let _ = HOST_RELEASE.set(Arc::new(hook));
}

/// Installs the async completion callback. First installation wins.
pub fn set_async_result_hook<F>(hook: F)
where
    F: Fn(&Variant, &Variant) + Send + Sync + 'static,
{
    let _ = ASYNC_RESULT.set(Arc::new(hook));
}

/// Routes a Host-owned payload to the host's free entry point. Freeing host
/// storage locally would go through the wrong allocator, so a missing hook
/// leaks the payload instead.
pub(crate) fn host_release(value: &mut Variant) {
    match HOST_RELEASE.get() {
        Some(hook) => hook(value),
        None => {
            log::error!(
                "host release hook not installed; leaking a {:?} payload",
                value.kind()
            );
        }
    }
}

/// Marks `value` Module-owned, boxes it, and hands the raw pointer across
/// the boundary. The host calls [`gv_release_value`] with the pointer once
/// the record is no longer needed; until then the box owns the payload.
pub fn leak_to_host(mut value: Variant) -> *mut Variant {
    if value.kind().is_allocating() && value.owner == Owner::Scope {
        value.owner = Owner::Module;
    }
    Box::into_raw(Box::new(value))
}

/// Reclaims a record handed out by [`leak_to_host`]: clears the Module mark
/// so the payload releases normally and drops the box.
///
/// # Safety
/// `p` must come from [`leak_to_host`] and must not be released twice.
pub unsafe fn release_returned(p: *mut Variant) {
    if p.is_null() {
        return;
    }
    let mut value = unsafe { Box::from_raw(p) };
    if value.owner == Owner::Module {
        value.owner = Owner::Scope;
    }
    drop(value);
}

/// The host-facing release entry point for records returned by value.
///
/// # Safety
/// Same contract as [`release_returned`].
#[no_mangle]
pub unsafe extern "C" fn gv_release_value(p: *mut Variant) {
    unsafe { release_returned(p) }
}

/// Runs an entry-point body under the boundary's panic guard. A panic is
/// converted into an error alert carrying the panic message plus an
/// `Error(Value)` result record, so a broken invariant fails the one call
/// instead of crossing the boundary.
pub fn guarded<F: FnOnce() -> Variant>(f: F) -> Variant {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(payload) => {
            alert::alert_error(&panic_message(payload.as_ref()));
            Variant::error(ErrorCode::Value)
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Hands `work` to a detached worker thread. The worker computes one fresh
/// record under the panic guard, downgrades arrays to `Error(Value)` (async
/// completion delivers single records only), and signals the [`AsyncResult`]
/// hook with `token` and the result. The worker touches no shared value
/// state, so the engine is never reentered concurrently.
pub fn spawn_async<F>(token: Variant, work: F)
where
    F: FnOnce() -> Variant + Send + 'static,
{
    std::thread::spawn(move || {
        let mut result = guarded(work);
        if result.is_array() {
            result = Variant::error(ErrorCode::Value);
        }
        match ASYNC_RESULT.get() {
            Some(hook) => hook(&token, &result),
            None => log::error!("async completion dropped; no result hook installed"),
        }
    });
}
