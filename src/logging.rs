//! Logging configuration for funclib's C surface.
//!
//! The two fixture functions never log; this bridge exists so a host
//! harness can route library records through a C callback.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};
use std::ptr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Once, RwLock};

use log::{Level, LevelFilter, Log, Metadata, Record};
use once_cell::sync::Lazy;
use thiserror::Error;

use crate::error::{clear_error, cstring_from_str_lossy, funclib_error_t, write_error};

const LOGGER_STATE_UNINIT: u8 = 0;
const LOGGER_STATE_READY: u8 = 1;
const LOGGER_STATE_FAILED: u8 = 2;

static LOGGER_STATE: AtomicU8 = AtomicU8::new(LOGGER_STATE_UNINIT);
static LOGGER_INIT: Once = Once::new();
static FUNCLIB_LOGGER: Lazy<FunclibLogger> = Lazy::new(FunclibLogger::new);

/// Log level values for funclib logging.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(C)]
pub enum funclib_log_level_t {
    FUNCLIB_LOG_LEVEL_OFF = 0,
    FUNCLIB_LOG_LEVEL_ERROR = 1,
    FUNCLIB_LOG_LEVEL_WARN = 2,
    FUNCLIB_LOG_LEVEL_INFO = 3,
    FUNCLIB_LOG_LEVEL_DEBUG = 4,
    FUNCLIB_LOG_LEVEL_TRACE = 5,
}

impl From<funclib_log_level_t> for LevelFilter {
    fn from(value: funclib_log_level_t) -> Self {
        match value {
            funclib_log_level_t::FUNCLIB_LOG_LEVEL_OFF => LevelFilter::Off,
            funclib_log_level_t::FUNCLIB_LOG_LEVEL_ERROR => LevelFilter::Error,
            funclib_log_level_t::FUNCLIB_LOG_LEVEL_WARN => LevelFilter::Warn,
            funclib_log_level_t::FUNCLIB_LOG_LEVEL_INFO => LevelFilter::Info,
            funclib_log_level_t::FUNCLIB_LOG_LEVEL_DEBUG => LevelFilter::Debug,
            funclib_log_level_t::FUNCLIB_LOG_LEVEL_TRACE => LevelFilter::Trace,
        }
    }
}

impl From<Level> for funclib_log_level_t {
    fn from(value: Level) -> Self {
        match value {
            Level::Error => funclib_log_level_t::FUNCLIB_LOG_LEVEL_ERROR,
            Level::Warn => funclib_log_level_t::FUNCLIB_LOG_LEVEL_WARN,
            Level::Info => funclib_log_level_t::FUNCLIB_LOG_LEVEL_INFO,
            Level::Debug => funclib_log_level_t::FUNCLIB_LOG_LEVEL_DEBUG,
            Level::Trace => funclib_log_level_t::FUNCLIB_LOG_LEVEL_TRACE,
        }
    }
}

/// Structured log record delivered to a C callback.
///
/// String pointers are only valid for the duration of the callback and must not be retained.
/// `module_path` and `file` may be null when unavailable. `line` is 0 when unknown.
#[repr(C)]
pub struct funclib_log_record_t {
    pub level: funclib_log_level_t,
    pub target: *const c_char,
    pub message: *const c_char,
    pub module_path: *const c_char,
    pub file: *const c_char,
    pub line: u32,
}

/// Callback invoked for each log record emitted by funclib.
///
/// The callback may be invoked from any thread that emits a log record.
#[allow(non_camel_case_types)]
pub type funclib_log_callback_t =
    Option<extern "C" fn(record: *const funclib_log_record_t, user_data: *mut c_void)>;

/// Configuration for initializing funclib logging.
///
/// If `filter` is non-null, it is interpreted as an `RUST_LOG`-style filter string and
/// overrides `level`. If `filter` is null and `RUST_LOG` is set in the environment, the
/// environment value is used. Otherwise `level` is applied to funclib logs.
/// If `callback` is null, logs are written to stderr. Otherwise they are delivered to the
/// callback with `user_data` forwarded unchanged.
#[repr(C)]
pub struct funclib_log_config_t {
    pub level: funclib_log_level_t,
    pub filter: *const c_char,
    pub callback: funclib_log_callback_t,
    pub user_data: *mut c_void,
}

#[derive(Debug, Error)]
enum FilterError {
    #[error("empty target at position {position}")]
    EmptyTarget { position: usize },
    #[error("missing level for target `{target}`")]
    MissingLevel { target: String },
    #[error("unknown level `{level}`")]
    UnknownLevel { level: String },
}

#[derive(Clone)]
struct Directive {
    target: String,
    level: LevelFilter,
}

#[derive(Clone)]
struct LogFilter {
    default: LevelFilter,
    directives: Vec<Directive>,
}

impl LogFilter {
    fn for_level(level: LevelFilter) -> Self {
        Self {
            default: LevelFilter::Off,
            directives: vec![Directive {
                target: "funclib".to_string(),
                level,
            }],
        }
    }

    fn parse(spec: &str) -> Result<Self, FilterError> {
        let mut default = LevelFilter::Off;
        let mut directives = Vec::new();

        for (position, raw) in spec.split(',').enumerate() {
            let directive = raw.trim();
            if directive.is_empty() {
                continue;
            }
            match directive.split_once('=') {
                Some((target, level)) => {
                    let target = target.trim();
                    let level = level.trim();
                    if target.is_empty() {
                        return Err(FilterError::EmptyTarget { position });
                    }
                    if level.is_empty() {
                        return Err(FilterError::MissingLevel {
                            target: target.to_string(),
                        });
                    }
                    let level = parse_level(level).ok_or_else(|| FilterError::UnknownLevel {
                        level: level.to_string(),
                    })?;
                    directives.push(Directive {
                        target: target.to_string(),
                        level,
                    });
                }
                None => match parse_level(directive) {
                    Some(level) => default = level,
                    None => directives.push(Directive {
                        target: directive.to_string(),
                        level: LevelFilter::Trace,
                    }),
                },
            }
        }

        Ok(Self { default, directives })
    }

    // Longest matching target prefix wins; later directives break ties.
    fn enabled(&self, metadata: &Metadata) -> bool {
        let target = metadata.target();
        let mut allowed = self.default;
        let mut matched_len = 0usize;

        for directive in &self.directives {
            if target.starts_with(&directive.target) && directive.target.len() >= matched_len {
                matched_len = directive.target.len();
                allowed = directive.level;
            }
        }

        metadata.level().to_level_filter() <= allowed
    }

    fn max_level(&self) -> LevelFilter {
        self.directives
            .iter()
            .map(|directive| directive.level)
            .fold(self.default, std::cmp::max)
    }
}

struct LoggerConfig {
    filter: LogFilter,
    callback: funclib_log_callback_t,
    user_data: usize,
}

impl LoggerConfig {
    fn new(filter: LogFilter, callback: funclib_log_callback_t, user_data: usize) -> Self {
        Self {
            filter,
            callback,
            user_data,
        }
    }
}

struct FunclibLogger {
    config: RwLock<LoggerConfig>,
}

impl FunclibLogger {
    fn new() -> Self {
        Self {
            config: RwLock::new(LoggerConfig::new(
                LogFilter::for_level(LevelFilter::Info),
                None,
                0,
            )),
        }
    }

    fn update(&self, config: LoggerConfig) {
        let mut guard = self.config.write().unwrap_or_else(|err| err.into_inner());
        *guard = config;
    }

    fn with_config<T>(&self, f: impl FnOnce(&LoggerConfig) -> T) -> T {
        let guard = self.config.read().unwrap_or_else(|err| err.into_inner());
        f(&guard)
    }
}

impl Log for FunclibLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.with_config(|config| config.filter.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        let (callback, user_data, enabled) = self.with_config(|config| {
            (
                config.callback,
                config.user_data,
                config.filter.enabled(record.metadata()),
            )
        });

        if !enabled {
            return;
        }

        if let Some(callback) = callback {
            let user_data = user_data as *mut c_void;
            let level = funclib_log_level_t::from(record.level());
            let target = cstring_from_str_lossy(record.target());
            let message = cstring_from_str_lossy(&record.args().to_string());
            let module_path = record.module_path().map(cstring_from_str_lossy);
            let file = record.file().map(cstring_from_str_lossy);
            let record = funclib_log_record_t {
                level,
                target: target.as_ptr(),
                message: message.as_ptr(),
                module_path: module_path
                    .as_ref()
                    .map_or(ptr::null(), |value| value.as_ptr()),
                file: file.as_ref().map_or(ptr::null(), |value| value.as_ptr()),
                line: record.line().unwrap_or(0),
            };
            callback(&record, user_data);
        } else {
            eprintln!(
                "{} {}: {}",
                record.level(),
                record.target(),
                record.args()
            );
        }
    }

    fn flush(&self) {}
}

fn parse_level(value: &str) -> Option<LevelFilter> {
    match value.trim().to_ascii_lowercase().as_str() {
        "off" => Some(LevelFilter::Off),
        "error" => Some(LevelFilter::Error),
        "warn" | "warning" => Some(LevelFilter::Warn),
        "info" => Some(LevelFilter::Info),
        "debug" => Some(LevelFilter::Debug),
        "trace" => Some(LevelFilter::Trace),
        _ => None,
    }
}

fn read_optional_cstr(value: *const c_char) -> Option<String> {
    if value.is_null() {
        return None;
    }
    // Safety: caller guarantees a valid, NUL-terminated C string.
    let cstr = unsafe { CStr::from_ptr(value) };
    Some(cstr.to_string_lossy().into_owned())
}

fn resolve_filter(config: Option<&funclib_log_config_t>) -> Result<LogFilter, String> {
    if let Some(config) = config {
        if let Some(filter) = read_optional_cstr(config.filter) {
            return LogFilter::parse(&filter)
                .map_err(|err| format!("invalid log filter `{filter}`: {err}"));
        }
    }

    if let Ok(filter) = std::env::var("RUST_LOG") {
        return LogFilter::parse(&filter)
            .map_err(|err| format!("invalid RUST_LOG value `{filter}`: {err}"));
    }

    let level = config
        .map(|config| config.level)
        .unwrap_or(funclib_log_level_t::FUNCLIB_LOG_LEVEL_INFO);
    Ok(LogFilter::for_level(level.into()))
}

fn ensure_logger(out_error: *mut *mut funclib_error_t) -> bool {
    LOGGER_INIT.call_once(|| {
        if log::set_logger(&*FUNCLIB_LOGGER).is_ok() {
            LOGGER_STATE.store(LOGGER_STATE_READY, Ordering::SeqCst);
        } else {
            LOGGER_STATE.store(LOGGER_STATE_FAILED, Ordering::SeqCst);
        }
    });

    match LOGGER_STATE.load(Ordering::SeqCst) {
        LOGGER_STATE_READY => true,
        LOGGER_STATE_FAILED => {
            write_error(out_error, "logging already initialized by another logger");
            false
        }
        _ => {
            write_error(out_error, "logging failed to initialize");
            false
        }
    }
}

/// Initializes default logging configuration values.
///
/// The defaults select INFO logging for funclib and use no callback.
#[unsafe(no_mangle)]
pub extern "C" fn funclib_log_config_init(config: *mut funclib_log_config_t) {
    if config.is_null() {
        return;
    }
    // Safety: caller provided a writable config pointer.
    unsafe {
        *config = funclib_log_config_t {
            level: funclib_log_level_t::FUNCLIB_LOG_LEVEL_INFO,
            filter: ptr::null(),
            callback: None,
            user_data: ptr::null_mut(),
        };
    }
}

/// Initializes logging for funclib.
///
/// If `config` is null, defaults are used. This function may be called multiple
/// times to update the logging configuration after initialization. On success
/// one DEBUG record is emitted, so callback delivery can be verified end to end.
#[unsafe(no_mangle)]
pub extern "C" fn funclib_log_init(
    config: *const funclib_log_config_t,
    out_error: *mut *mut funclib_error_t,
) -> bool {
    clear_error(out_error);

    let config = unsafe { config.as_ref() };
    let filter = match resolve_filter(config) {
        Ok(filter) => filter,
        Err(message) => {
            write_error(out_error, message);
            return false;
        }
    };

    if !ensure_logger(out_error) {
        return false;
    }

    let callback = config.and_then(|config| config.callback);
    let user_data = config.map(|config| config.user_data as usize).unwrap_or(0);

    let max_level = filter.max_level();
    FUNCLIB_LOGGER.update(LoggerConfig::new(filter, callback, user_data));
    log::set_max_level(max_level);
    log::debug!(target: "funclib", "logging configured, max level {max_level}");
    true
}

#[cfg(test)]
mod tests {
    use std::ffi::{CStr, CString};
    use std::sync::Mutex;

    use super::*;

    #[test]
    fn parse_accepts_bare_default_level() {
        let filter = LogFilter::parse("warn").unwrap();
        assert_eq!(filter.default, LevelFilter::Warn);
        assert!(filter.directives.is_empty());
    }

    #[test]
    fn parse_accepts_target_directives() {
        let filter = LogFilter::parse("error,funclib=debug").unwrap();
        assert_eq!(filter.default, LevelFilter::Error);
        assert_eq!(filter.directives.len(), 1);
        assert_eq!(filter.directives[0].target, "funclib");
        assert_eq!(filter.directives[0].level, LevelFilter::Debug);
    }

    #[test]
    fn parse_treats_bare_target_as_trace() {
        let filter = LogFilter::parse("funclib").unwrap();
        assert_eq!(filter.directives[0].level, LevelFilter::Trace);
    }

    #[test]
    fn parse_rejects_unknown_level() {
        assert!(matches!(
            LogFilter::parse("funclib=loud"),
            Err(FilterError::UnknownLevel { .. })
        ));
    }

    #[test]
    fn parse_rejects_missing_level() {
        assert!(matches!(
            LogFilter::parse("funclib="),
            Err(FilterError::MissingLevel { .. })
        ));
    }

    #[test]
    fn longest_target_prefix_wins() {
        let filter = LogFilter::parse("funclib=error,funclib::arith=trace").unwrap();
        let metadata = Metadata::builder()
            .target("funclib::arith")
            .level(Level::Debug)
            .build();
        assert!(filter.enabled(&metadata));

        let metadata = Metadata::builder()
            .target("funclib")
            .level(Level::Debug)
            .build();
        assert!(!filter.enabled(&metadata));
    }

    #[test]
    fn max_level_spans_all_directives() {
        let filter = LogFilter::parse("warn,funclib=trace").unwrap();
        assert_eq!(filter.max_level(), LevelFilter::Trace);
    }

    #[test]
    fn config_init_fills_defaults() {
        let mut config = funclib_log_config_t {
            level: funclib_log_level_t::FUNCLIB_LOG_LEVEL_TRACE,
            filter: 1usize as *const c_char,
            callback: None,
            user_data: 1usize as *mut c_void,
        };
        funclib_log_config_init(&mut config);
        assert_eq!(config.level, funclib_log_level_t::FUNCLIB_LOG_LEVEL_INFO);
        assert!(config.filter.is_null());
        assert!(config.callback.is_none());
        assert!(config.user_data.is_null());
    }

    static RECEIVED: Mutex<Vec<String>> = Mutex::new(Vec::new());

    extern "C" fn record_messages(record: *const funclib_log_record_t, _user_data: *mut c_void) {
        assert!(!record.is_null());
        let record = unsafe { &*record };
        let message = unsafe { CStr::from_ptr(record.message) };
        RECEIVED
            .lock()
            .unwrap()
            .push(message.to_string_lossy().into_owned());
    }

    #[test]
    fn init_delivers_records_to_callback() {
        let filter = CString::new("funclib=debug").unwrap();
        let mut config = funclib_log_config_t {
            level: funclib_log_level_t::FUNCLIB_LOG_LEVEL_INFO,
            filter: ptr::null(),
            callback: None,
            user_data: ptr::null_mut(),
        };
        funclib_log_config_init(&mut config);
        config.filter = filter.as_ptr();
        config.callback = Some(record_messages);

        let mut error = ptr::null_mut();
        assert!(funclib_log_init(&config, &mut error));
        assert!(error.is_null());

        log::info!(target: "funclib", "fixture record");

        let received = RECEIVED.lock().unwrap();
        assert!(received.iter().any(|message| message == "fixture record"));
    }
}
