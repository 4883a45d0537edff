/// Vulkan debug messenger - forwards validation layer messages to the engine log
///
/// Messages at or above the configured severity are logged under the
/// `umbra::vulkan::validation` source. When statistics are enabled each
/// message is also counted, and identical messages are grouped so repeats
/// show up as `[xN]`.

use ash::vk;
use colored::*;
use rustc_hash::FxHashMap;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use umbra_engine::umbra::Engine;
use umbra_engine::umbra::log::LogSeverity;

const SOURCE: &str = "umbra::vulkan::validation";

/// Global debug configuration (shared across callbacks)
static DEBUG_CONFIG: Mutex<Option<DebugConfig>> = Mutex::new(None);

/// Global validation statistics
static VALIDATION_STATS: ValidationStatsTracker = ValidationStatsTracker::new();

/// Occurrences per message text, for grouping
static MESSAGE_TRACKER: Mutex<Option<FxHashMap<String, u32>>> = Mutex::new(None);

/// Callback configuration
#[derive(Debug, Clone, Copy)]
pub(crate) struct DebugConfig {
    pub severity: LogSeverity,
    pub enable_stats: bool,
}

/// Validation message counts by severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub errors: u32,
    pub warnings: u32,
    pub info: u32,
    pub verbose: u32,
}

impl ValidationStats {
    pub fn total(&self) -> u32 {
        self.errors + self.warnings + self.info + self.verbose
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

struct ValidationStatsTracker {
    errors: AtomicU32,
    warnings: AtomicU32,
    info: AtomicU32,
    verbose: AtomicU32,
}

impl ValidationStatsTracker {
    const fn new() -> Self {
        Self {
            errors: AtomicU32::new(0),
            warnings: AtomicU32::new(0),
            info: AtomicU32::new(0),
            verbose: AtomicU32::new(0),
        }
    }

    fn increment(&self, severity: LogSeverity) {
        let counter = match severity {
            LogSeverity::Error => &self.errors,
            LogSeverity::Warn => &self.warnings,
            LogSeverity::Info => &self.info,
            LogSeverity::Debug | LogSeverity::Trace => &self.verbose,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn get_stats(&self) -> ValidationStats {
        ValidationStats {
            errors: self.errors.load(Ordering::Relaxed),
            warnings: self.warnings.load(Ordering::Relaxed),
            info: self.info.load(Ordering::Relaxed),
            verbose: self.verbose.load(Ordering::Relaxed),
        }
    }

    fn reset(&self) {
        self.errors.store(0, Ordering::Relaxed);
        self.warnings.store(0, Ordering::Relaxed);
        self.info.store(0, Ordering::Relaxed);
        self.verbose.store(0, Ordering::Relaxed);
    }
}

/// Install the callback configuration and reset the statistics
pub(crate) fn init_debug_config(config: DebugConfig) {
    VALIDATION_STATS.reset();
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = Some(FxHashMap::default());
    }
    if let Ok(mut current) = DEBUG_CONFIG.lock() {
        *current = Some(config);
    }
}

/// Drop the configuration; later callbacks are ignored
pub(crate) fn cleanup_debug_config() {
    if let Ok(mut current) = DEBUG_CONFIG.lock() {
        *current = None;
    }
    if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
        *tracker = None;
    }
}

/// Current validation statistics
pub fn get_validation_stats() -> ValidationStats {
    VALIDATION_STATS.get_stats()
}

/// Log a summary of the validation statistics
pub fn log_validation_stats_report() {
    let stats = get_validation_stats();

    if stats.total() == 0 {
        Engine::log(LogSeverity::Info, SOURCE, format!("{}", "No validation messages".green()));
        return;
    }

    let duplicates = MESSAGE_TRACKER
        .lock()
        .ok()
        .and_then(|tracker| tracker.as_ref().map(|messages| messages.values().filter(|&&n| n > 1).count()))
        .unwrap_or(0);

    let severity = if stats.has_errors() { LogSeverity::Error } else { LogSeverity::Warn };
    Engine::log(severity, SOURCE, format!(
        "Validation report: {} {}, {} {}, {} {}, {} {} (total {}, {} repeated)",
        "errors".red().bold(), stats.errors,
        "warnings".yellow().bold(), stats.warnings,
        "info".cyan(), stats.info,
        "verbose".bright_black(), stats.verbose,
        stats.total(), duplicates,
    ));
}

fn severity_from_vk(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> LogSeverity {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        LogSeverity::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        LogSeverity::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        LogSeverity::Info
    } else {
        LogSeverity::Trace
    }
}

/// Messenger severity mask covering `min` and everything more severe
pub(crate) fn severity_mask(min: LogSeverity) -> vk::DebugUtilsMessageSeverityFlagsEXT {
    let mut mask = vk::DebugUtilsMessageSeverityFlagsEXT::ERROR;
    if min <= LogSeverity::Warn {
        mask |= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING;
    }
    if min <= LogSeverity::Info {
        mask |= vk::DebugUtilsMessageSeverityFlagsEXT::INFO;
    }
    if min <= LogSeverity::Debug {
        mask |= vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE;
    }
    mask
}

unsafe fn c_str_or<'a>(ptr: *const std::os::raw::c_char, fallback: &'a str) -> std::borrow::Cow<'a, str> {
    if ptr.is_null() {
        std::borrow::Cow::Borrowed(fallback)
    } else {
        CStr::from_ptr(ptr).to_string_lossy()
    }
}

/// Vulkan debug messenger callback
pub(crate) unsafe extern "system" fn vulkan_debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _user_data: *mut std::os::raw::c_void,
) -> vk::Bool32 {
    let config = match DEBUG_CONFIG.lock() {
        Ok(guard) => match *guard {
            Some(config) => config,
            None => return vk::FALSE,
        },
        Err(_) => return vk::FALSE,
    };

    let severity = severity_from_vk(message_severity);
    if severity < config.severity || p_callback_data.is_null() {
        return vk::FALSE;
    }

    let callback_data = &*p_callback_data;
    let message_id_name = c_str_or(callback_data.p_message_id_name, "Unknown");
    let message = c_str_or(callback_data.p_message, "No message");

    let type_str = if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION) {
        "Validation"
    } else if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
        "Performance"
    } else {
        "General"
    };

    let mut occurrences = 1;
    if config.enable_stats {
        VALIDATION_STATS.increment(severity);
        if let Ok(mut tracker) = MESSAGE_TRACKER.lock() {
            let messages = tracker.get_or_insert_with(FxHashMap::default);
            let count = messages.entry(message.to_string()).or_insert(0);
            *count += 1;
            occurrences = *count;
        }
    }

    let repeat_indicator = if occurrences > 1 {
        format!(" [x{}]", occurrences)
    } else {
        String::new()
    };

    Engine::log(severity, SOURCE, format!(
        "[{}]{} {}: {}",
        type_str, repeat_indicator, message_id_name, message
    ));

    vk::FALSE
}
