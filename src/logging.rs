//! Process-wide log hook and native whisper.cpp log bridging.
//!
//! whisper.cpp and ggml log from arbitrary internal threads through a single
//! process-global callback. This module models that as one atomically
//! replaceable registration with last-write-wins semantics and a process
//! lifetime, and routes native engine logs onto the `log` facade via
//! whisper-rs's trampoline.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Once, RwLock};

use once_cell::sync::Lazy;

/// Log levels with ordinals fixed to ggml's native `ggml_log_level` values,
/// so a hook can compare against what the engine reports directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum LogLevel {
    None = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    /// Continuation of the previous message.
    Cont = 5,
}

impl LogLevel {
    pub fn from_ordinal(value: i32) -> Option<Self> {
        match value {
            0 => Some(LogLevel::None),
            1 => Some(LogLevel::Debug),
            2 => Some(LogLevel::Info),
            3 => Some(LogLevel::Warn),
            4 => Some(LogLevel::Error),
            5 => Some(LogLevel::Cont),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::None => "NONE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Cont => "CONT",
        }
    }
}

type LogHook = dyn Fn(LogLevel, &str) + Send + Sync;

static LOG_HOOK: Lazy<RwLock<Option<std::sync::Arc<LogHook>>>> =
    Lazy::new(|| RwLock::new(None));

static NATIVE_HOOKS: Once = Once::new();

/// Register the process-wide log callback. Registering a new callback
/// atomically replaces the previous one. The callback may be invoked from
/// any internal thread of any model instance.
pub fn set_log_callback<F>(callback: F)
where
    F: Fn(LogLevel, &str) + Send + Sync + 'static,
{
    if let Ok(mut hook) = LOG_HOOK.write() {
        *hook = Some(std::sync::Arc::new(callback));
    }
}

/// Clear the process-wide log callback.
pub fn clear_log_callback() {
    if let Ok(mut hook) = LOG_HOOK.write() {
        *hook = None;
    }
}

/// Invoke the registered hook, if any. Panics raised by the hook are caught
/// and discarded here so they cannot corrupt scheduler or accumulator state.
pub(crate) fn emit(level: LogLevel, message: &str) {
    let hook = match LOG_HOOK.read() {
        Ok(guard) => guard.clone(),
        Err(_) => return,
    };
    if let Some(hook) = hook {
        let _ = catch_unwind(AssertUnwindSafe(|| hook(level, message)));
    }
}

/// Route native whisper.cpp/ggml output onto the `log` facade. Installed
/// once per process, on first model load.
pub(crate) fn install_native_hooks() {
    NATIVE_HOOKS.call_once(|| {
        whisper_rs::install_whisper_log_trampoline();
    });
}

/// A `log::Log` wrapper that forwards whisper-targeted records to the
/// registered log hook while passing everything through to the inner logger.
///
/// Native whisper.cpp logs reach the `log` facade through the trampoline
/// installed by [`install_native_hooks`]; an application that wants those
/// records in its [`set_log_callback`] hook wraps its logger in this
/// forwarder before installing it.
pub struct LogHookForwarder {
    inner: Box<dyn log::Log>,
}

impl LogHookForwarder {
    pub fn new(inner: Box<dyn log::Log>) -> Self {
        Self { inner }
    }
}

impl log::Log for LogHookForwarder {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        self.inner.log(record);

        if record.target().starts_with("whisper") {
            let level = match record.level() {
                log::Level::Error => LogLevel::Error,
                log::Level::Warn => LogLevel::Warn,
                log::Level::Info => LogLevel::Info,
                log::Level::Debug | log::Level::Trace => LogLevel::Debug,
            };
            emit(level, &record.args().to_string());
        }
    }

    fn flush(&self) {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // The hook is process-global; tests that touch it must not overlap.
    static HOOK_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_level_ordinals_match_ggml() {
        assert_eq!(LogLevel::None as i32, 0);
        assert_eq!(LogLevel::Debug as i32, 1);
        assert_eq!(LogLevel::Info as i32, 2);
        assert_eq!(LogLevel::Warn as i32, 3);
        assert_eq!(LogLevel::Error as i32, 4);
        assert_eq!(LogLevel::Cont as i32, 5);
    }

    #[test]
    fn test_level_ordinal_round_trip() {
        for ordinal in 0..=5 {
            let level = LogLevel::from_ordinal(ordinal).unwrap();
            assert_eq!(level as i32, ordinal);
        }
        assert!(LogLevel::from_ordinal(6).is_none());
        assert!(LogLevel::from_ordinal(-1).is_none());
    }

    #[test]
    fn test_hook_replacement_is_last_write_wins() {
        let _guard = HOOK_LOCK.lock().unwrap();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let counter = first.clone();
        set_log_callback(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let counter = second.clone();
        set_log_callback(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        emit(LogLevel::Info, "hello");
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);

        clear_log_callback();
        emit(LogLevel::Info, "dropped");
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    struct NullLog;

    impl log::Log for NullLog {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }
        fn log(&self, _: &log::Record) {}
        fn flush(&self) {}
    }

    #[test]
    fn test_forwarder_routes_whisper_records_to_hook() {
        let _guard = HOOK_LOCK.lock().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        set_log_callback(move |level, message| {
            sink.lock().unwrap().push((level, message.to_string()));
        });

        let forwarder = LogHookForwarder::new(Box::new(NullLog));
        log::Log::log(
            &forwarder,
            &log::Record::builder()
                .args(format_args!("ggml backend ready"))
                .level(log::Level::Info)
                .target("whisper-rs")
                .build(),
        );
        log::Log::log(
            &forwarder,
            &log::Record::builder()
                .args(format_args!("unrelated record"))
                .level(log::Level::Info)
                .target("app")
                .build(),
        );

        clear_log_callback();
        let seen = seen.lock().unwrap();
        assert_eq!(*seen, vec![(LogLevel::Info, "ggml backend ready".to_string())]);
    }

    #[test]
    fn test_panicking_hook_is_discarded() {
        let _guard = HOOK_LOCK.lock().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        set_log_callback(move |level, message| {
            log.lock().unwrap().push((level, message.to_string()));
            panic!("hook failure");
        });

        // Must not propagate the panic to the caller.
        emit(LogLevel::Error, "first");
        emit(LogLevel::Warn, "second");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], (LogLevel::Error, "first".to_string()));
        assert_eq!(seen[1], (LogLevel::Warn, "second".to_string()));
        drop(seen);

        clear_log_callback();
    }
}
