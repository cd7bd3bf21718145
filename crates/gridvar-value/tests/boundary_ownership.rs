//! Ownership protocol across the host boundary: Host-owned payloads route
//! through the installed release hook, Module-owned records come back
//! through `gv_release_value`, and panics stop at the dispatch guard.
//!
//! The hooks are process-global and the harness runs tests concurrently,
//! so every test tags its traffic with unique markers instead of counting.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use gridvar_value::alert::{self, AlertLevel};
use gridvar_value::boundary::{self, gv_release_value};
use gridvar_value::{ErrorCode, Kind, Owner, Variant};

static HOST_RELEASED: Mutex<Vec<(Kind, Option<String>)>> = Mutex::new(Vec::new());
static ALERTS: Mutex<Vec<(AlertLevel, String)>> = Mutex::new(Vec::new());
static ASYNC_RESULTS: Mutex<Vec<(f64, Variant)>> = Mutex::new(Vec::new());

// Hooks are install-once per process; every test goes through here.
fn install_hooks() {
    boundary::set_host_release_hook(|value| {
        HOST_RELEASED.lock().push((value.kind(), value.to_utf8()));
        // Stand-in for the host allocator: reclaim the payload locally.
        let _ = value.take();
    });
    alert::set_alert_sink(|level, text| {
        ALERTS.lock().push((level, text.to_string()));
        true
    });
    boundary::set_async_result_hook(|token, result| {
        ASYNC_RESULTS.lock().push((token.as_num(), result.clone()));
    });
}

fn host_released(marker: &str) -> Option<Kind> {
    HOST_RELEASED
        .lock()
        .iter()
        .find(|(_, text)| text.as_deref() == Some(marker))
        .map(|(kind, _)| *kind)
}

#[test]
fn test_host_owned_drop_routes_through_hook() {
    install_hooks();

    let mut incoming = Variant::from("host allocated: routed");
    incoming.mark_host_owned();
    assert_eq!(incoming.owner(), Owner::Host);
    drop(incoming);

    assert_eq!(host_released("host allocated: routed"), Some(Kind::String));
}

#[test]
fn test_scope_owned_drop_never_reaches_the_hook() {
    install_hooks();

    drop(Variant::from("module allocated: local"));
    let mut arr = Variant::array(1, 1);
    arr[0] = Variant::from("module allocated: nested");
    drop(arr);

    assert_eq!(host_released("module allocated: local"), None);
    assert_eq!(host_released("module allocated: nested"), None);
}

#[test]
fn test_returned_record_round_trip() {
    install_hooks();

    let mut result = Variant::array(1, 2);
    result[0] = Variant::from("answer");
    result[1] = Variant::from(42.0);
    let p = boundary::leak_to_host(result);

    // The host sees a live Module-owned record until it hands it back.
    let view = unsafe { &*p };
    assert_eq!(view.owner(), Owner::Module);
    assert_eq!(view[0].to_utf8().as_deref(), Some("answer"));
    assert_eq!(view[1].as_num(), 42.0);

    unsafe { gv_release_value(p) };
    // A null hand-back is tolerated.
    unsafe { gv_release_value(std::ptr::null_mut()) };
}

#[test]
fn test_guard_converts_contract_panics_to_alerts() {
    install_hooks();

    let result = boundary::guarded(|| {
        let mut v = Variant::array(2, 3);
        // 2x3 cannot relabel as 4x2; the contract panic must not escape.
        v.reshape(4, 2);
        v
    });
    assert_eq!(result.as_err(), Some(ErrorCode::Value));

    let seen = ALERTS
        .lock()
        .iter()
        .any(|(level, text)| *level == AlertLevel::Error && text.contains("reshape 4x2"));
    assert!(seen, "contract panic did not surface as an error alert");
}

fn wait_for_async(token: f64) -> Variant {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let Some((_, result)) = ASYNC_RESULTS
            .lock()
            .iter()
            .find(|(t, _)| *t == token)
        {
            return result.clone();
        }
        assert!(Instant::now() < deadline, "async completion never arrived");
        std::thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_async_completion_delivers_one_scalar() {
    install_hooks();

    boundary::spawn_async(Variant::from(101.0), || Variant::from(7.0));
    assert_eq!(wait_for_async(101.0).as_num(), 7.0);

    // Arrays cannot cross the async completion path.
    boundary::spawn_async(Variant::from(102.0), || Variant::array(2, 2));
    assert_eq!(wait_for_async(102.0).as_err(), Some(ErrorCode::Value));

    // A panicking worker completes with the guard's error record.
    boundary::spawn_async(Variant::from(103.0), || panic!("worker failed"));
    assert_eq!(wait_for_async(103.0).as_err(), Some(ErrorCode::Value));
}
