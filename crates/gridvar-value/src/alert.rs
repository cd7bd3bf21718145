//! User-visible alerts, distinct from developer logging.
//!
//! Alerts carry leveled diagnostics to whoever is driving the host session:
//! a process-wide bitmask gates which levels surface, an embedding shim may
//! install a sink that shows the text (a dialog, a status bar), and without
//! a sink the text routes to the `log` facade at the matching level. The
//! mask's initial value comes from the `GRIDVAR_ALERT` environment variable,
//! either a numeric mask or comma-separated level names.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};

/// Alert levels. The discriminants are the mask bits.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlertLevel {
    Error = 1,
    Warning = 2,
    Info = 4,
}

impl AlertLevel {
    pub const fn bit(self) -> u32 {
        self as u32
    }
}

/// Mask with every level enabled, the default.
pub const ALERT_ALL: u32 =
    AlertLevel::Error.bit() | AlertLevel::Warning.bit() | AlertLevel::Info.bit();

/// Sink installed by the embedding shim. Returns whether the level should
/// stay enabled; `false` clears it from the mask for the rest of the
/// session, the dialog-Cancel gesture of the original surface.
type AlertSink = Arc<dyn Fn(AlertLevel, &str) -> bool + Send + Sync>;

static SINK: OnceCell<AlertSink> = OnceCell::new();
static MASK: Lazy<AtomicU32> = Lazy::new(|| AtomicU32::new(env_mask()));

/// Installs the alert sink. First installation wins.
pub fn set_alert_sink<F>(sink: F)
where
    F: Fn(AlertLevel, &str) -> bool + Send + Sync + 'static,
{
    let _ = SINK.set(Arc::new(sink));
}

/// The current mask.
pub fn alert_mask() -> u32 {
    MASK.load(Ordering::Relaxed) & ALERT_ALL
}

/// Replaces the mask. Bits outside the known levels are ignored.
pub fn set_alert_mask(mask: u32) {
    MASK.store(mask & ALERT_ALL, Ordering::Relaxed);
}

fn env_mask() -> u32 {
    match std::env::var("GRIDVAR_ALERT") {
        Ok(spec) => match parse_mask(&spec) {
            Some(mask) => mask,
            None => {
                log::warn!("GRIDVAR_ALERT {spec:?} is not an alert mask; all levels stay enabled");
                ALERT_ALL
            }
        },
        Err(_) => ALERT_ALL,
    }
}

/// Parses a numeric mask or comma-separated level names ("error,warning").
fn parse_mask(spec: &str) -> Option<u32> {
    let spec = spec.trim();
    if let Ok(mask) = spec.parse::<u32>() {
        return Some(mask & ALERT_ALL);
    }
    let mut mask = 0;
    for part in spec.split(',') {
        mask |= match part.trim().to_ascii_lowercase().as_str() {
            "error" => AlertLevel::Error.bit(),
            "warning" | "warn" => AlertLevel::Warning.bit(),
            "info" | "information" => AlertLevel::Info.bit(),
            "" => 0,
            _ => return None,
        };
    }
    Some(mask)
}

/// Emits `text` at `level` when the mask enables it, or unconditionally
/// when `force` is set. Returns the mask after the call; a sink that
/// declines the level leaves it disabled from then on.
pub fn alert(level: AlertLevel, text: &str, force: bool) -> u32 {
    let mask = alert_mask();
    if force || mask & level.bit() != 0 {
        match SINK.get() {
            Some(sink) => {
                if !sink(level, text) {
                    set_alert_mask(mask & !level.bit());
                }
            }
            None => match level {
                AlertLevel::Error => log::error!("{text}"),
                AlertLevel::Warning => log::warn!("{text}"),
                AlertLevel::Info => log::info!("{text}"),
            },
        }
    }
    alert_mask()
}

pub fn alert_error(text: &str) -> u32 {
    alert(AlertLevel::Error, text, false)
}

pub fn alert_warning(text: &str) -> u32 {
    alert(AlertLevel::Warning, text, false)
}

pub fn alert_info(text: &str) -> u32 {
    alert(AlertLevel::Info, text, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::{Mutex, MutexGuard};

    // The mask is process-global; serialize the tests that set it.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    fn mask_test() -> MutexGuard<'static, ()> {
        let guard = TEST_LOCK.lock();
        set_alert_mask(ALERT_ALL);
        guard
    }

    #[test]
    fn test_parse_mask_names() {
        assert_eq!(parse_mask("error"), Some(1));
        assert_eq!(parse_mask("error,warning"), Some(3));
        assert_eq!(parse_mask("Error, Info"), Some(5));
        assert_eq!(parse_mask("warn,information"), Some(6));
        assert_eq!(parse_mask(""), Some(0));
        assert_eq!(parse_mask("verbose"), None);
    }

    #[test]
    fn test_parse_mask_numeric() {
        assert_eq!(parse_mask("7"), Some(7));
        assert_eq!(parse_mask("0"), Some(0));
        assert_eq!(parse_mask(" 5 "), Some(5));
        // Unknown bits fall away.
        assert_eq!(parse_mask("255"), Some(ALERT_ALL));
    }

    #[test]
    fn test_mask_set_get() {
        let _guard = mask_test();
        set_alert_mask(AlertLevel::Error.bit());
        assert_eq!(alert_mask(), 1);
        set_alert_mask(0xFFFF_FFFF);
        assert_eq!(alert_mask(), ALERT_ALL);
        set_alert_mask(0);
        assert_eq!(alert_mask(), 0);
    }

    #[test]
    fn test_masked_alert_returns_mask() {
        let _guard = mask_test();
        set_alert_mask(AlertLevel::Error.bit());
        // Warning is masked off; the call is a no-op that reports the mask.
        assert_eq!(alert_warning("masked"), AlertLevel::Error.bit());
        assert_eq!(alert_error("enabled"), AlertLevel::Error.bit());
    }

    #[test]
    fn test_forced_alert_ignores_mask() {
        let _guard = mask_test();
        set_alert_mask(0);
        assert_eq!(alert(AlertLevel::Info, "forced through", true), 0);
    }
}
