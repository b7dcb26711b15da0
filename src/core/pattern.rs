//! Pattern templates
//!
//! A template mixes literal text with `%[FieldName]verb` placeholders, for
//! example `"%[LevelName]s %[DateTime]s %[Message]v"`. The verb is one of
//! `s d f w v t q` and only matters to the tokenizer. Templates are compiled
//! once into a [`PatternProgram`] that renders a record without re-parsing.

use super::caller::CallerInfo;
use super::error::{LoggerError, Result};
use super::log_record::LogRecord;
use chrono::format::{Fixed, Item, Numeric, StrftimeItems};
use chrono::{DateTime, Local, Timelike};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use std::fmt;
use std::io::Write;

pub const PATTERN_DEFAULT: &str =
    "%[LoggerName]s (%[Pid]d,%[RoutineId]d) %[DateTime]s %[LevelName]s %[ShortCaller]s %[Message]v";
pub const PATTERN_SIMPLE: &str = "%[LevelName]s %[DateTime]s %[ShortCaller]s %[Message]v";
pub const PATTERN_TRACE: &str = "<%[TradeId]s> %[LoggerName]s (%[Pid]d,%[RoutineId]d) %[DateTime]s %[LevelName]s %[ShortCaller]s %[Message]v";

/// `MM-DDTHH:MM:SS.micros`
pub const DEFAULT_TIME_LAYOUT: &str = "%m-%dT%H:%M:%S%.6f";

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\[(\w+)?\][sdfwvtq]").expect("placeholder regex is valid"));

static FRACTION_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"%\.([1-9])?f$").expect("fraction regex is valid"));

static PID: Lazy<String> = Lazy::new(|| std::process::id().to_string());
static HOSTNAME: Lazy<String> = Lazy::new(local_hostname);
static LOCAL_IP: Lazy<String> = Lazy::new(local_ip);

fn local_hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "localhost".to_string())
}

// A connected UDP socket never sends anything; it only makes the OS pick
// the outbound interface.
fn local_ip() -> String {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|socket| {
            socket.connect("8.8.8.8:80")?;
            socket.local_addr()
        })
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|_| "127.0.0.1".to_string())
}

/// Timestamp layout with the seconds part cached.
///
/// Layouts are chrono strftime strings. A trailing `%.Nf` is split off and
/// rendered separately so the formatted seconds prefix can be reused for
/// every record within the same second. A layout with sub-second items
/// anywhere else is formatted in full for every record.
pub struct DateTimeFormat {
    layout: String,
    second_layout: String,
    fraction_digits: u32,
    cacheable: bool,
    cache: Mutex<Option<(i64, String)>>,
}

impl DateTimeFormat {
    pub fn new(layout: impl Into<String>) -> Result<Self> {
        let layout = layout.into();
        if StrftimeItems::new(&layout).any(|item| matches!(item, Item::Error)) {
            return Err(LoggerError::formatter(
                "DateTime",
                format!("invalid time layout '{}'", layout),
            ));
        }

        let (second_layout, fraction_digits) = match FRACTION_SUFFIX.captures(&layout) {
            Some(caps) => {
                let digits = caps
                    .get(1)
                    .and_then(|d| d.as_str().parse::<u32>().ok())
                    .unwrap_or(9);
                let start = caps.get(0).map(|m| m.start()).unwrap_or(layout.len());
                (layout[..start].to_string(), digits)
            }
            None => (layout.clone(), 0),
        };
        let cacheable = !StrftimeItems::new(&second_layout).any(|item| is_sub_second(&item));

        Ok(Self {
            layout,
            second_layout,
            fraction_digits,
            cacheable,
            cache: Mutex::new(None),
        })
    }

    pub fn layout(&self) -> &str {
        &self.layout
    }

    pub fn write(&self, ts: &DateTime<Local>, out: &mut Vec<u8>) {
        if !self.cacheable {
            let _ = write!(out, "{}", ts.format(&self.layout));
            return;
        }

        let sec = ts.timestamp();
        {
            let mut cache = self.cache.lock();
            match cache.as_ref() {
                Some((cached, text)) if *cached == sec => out.extend_from_slice(text.as_bytes()),
                _ => {
                    let text = ts.format(&self.second_layout).to_string();
                    out.extend_from_slice(text.as_bytes());
                    *cache = Some((sec, text));
                }
            }
        }

        if self.fraction_digits > 0 {
            let nanos = ts.nanosecond() % 1_000_000_000;
            let value = nanos / 10u32.pow(9 - self.fraction_digits);
            let _ = write!(
                out,
                ".{:0width$}",
                value,
                width = self.fraction_digits as usize
            );
        }
    }

    pub fn format(&self, ts: &DateTime<Local>) -> String {
        let mut out = Vec::new();
        self.write(ts, &mut out);
        String::from_utf8_lossy(&out).into_owned()
    }
}

// `%f`, `%.f`, `%3f` and `%+` all change within a second
fn is_sub_second(item: &Item<'_>) -> bool {
    matches!(
        item,
        Item::Numeric(Numeric::Nanosecond, _)
            | Item::Fixed(
                Fixed::Nanosecond
                    | Fixed::Nanosecond3
                    | Fixed::Nanosecond6
                    | Fixed::Nanosecond9
                    | Fixed::Internal(_)
                    | Fixed::RFC3339
            )
    )
}

impl Default for DateTimeFormat {
    fn default() -> Self {
        Self {
            layout: DEFAULT_TIME_LAYOUT.to_string(),
            second_layout: "%m-%dT%H:%M:%S".to_string(),
            fraction_digits: 6,
            cacheable: true,
            cache: Mutex::new(None),
        }
    }
}

impl Clone for DateTimeFormat {
    fn clone(&self) -> Self {
        Self {
            layout: self.layout.clone(),
            second_layout: self.second_layout.clone(),
            fraction_digits: self.fraction_digits,
            cacheable: self.cacheable,
            cache: Mutex::new(None),
        }
    }
}

impl fmt::Debug for DateTimeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateTimeFormat")
            .field("layout", &self.layout)
            .finish()
    }
}

/// Per-formatter rendering switches
#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// ANSI colors on level and caller fields (needs the `console` feature)
    pub colors: bool,
    /// Always quote the message
    pub quote: bool,
    /// Quote the message only when it is empty
    pub quote_empty: bool,
    pub time_format: DateTimeFormat,
}

type Emitter = fn(&LogRecord, &RenderOptions, &mut Vec<u8>);

fn emit_logger_name(r: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    out.extend_from_slice(r.logger_name.as_bytes());
}

fn emit_pid(_: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    out.extend_from_slice(PID.as_bytes());
}

fn emit_thread_id(r: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    let _ = write!(out, "{}", r.thread_id);
}

// Unnamed threads fall back to the id
fn emit_thread_name(r: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    match &r.thread_name {
        Some(name) => out.extend_from_slice(name.as_bytes()),
        None => {
            let _ = write!(out, "{}", r.thread_id);
        }
    }
}

fn emit_ip(_: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    out.extend_from_slice(LOCAL_IP.as_bytes());
}

fn emit_hostname(_: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    out.extend_from_slice(HOSTNAME.as_bytes());
}

fn write_colored(text: &str, opts: &RenderOptions, color: ColorOf, out: &mut Vec<u8>) {
    #[cfg(feature = "console")]
    if opts.colors {
        use colored::Colorize;
        let color = match color {
            ColorOf::Level(level) => level.color_code(),
            ColorOf::Caller => colored::Color::Blue,
        };
        let _ = write!(out, "{}", text.color(color));
        return;
    }
    #[cfg(not(feature = "console"))]
    let _ = (opts, color);
    out.extend_from_slice(text.as_bytes());
}

#[derive(Clone, Copy)]
enum ColorOf {
    Level(super::log_level::LogLevel),
    Caller,
}

fn with_caller(r: &LogRecord, out: &mut Vec<u8>, f: impl FnOnce(&CallerInfo, &mut Vec<u8>)) {
    if let Some(caller) = &r.caller {
        f(caller, out);
    }
}

fn emit_caller(r: &LogRecord, opts: &RenderOptions, out: &mut Vec<u8>) {
    with_caller(r, out, |c, out| {
        write_colored(&c.full(), opts, ColorOf::Caller, out)
    });
}

fn emit_short_caller(r: &LogRecord, opts: &RenderOptions, out: &mut Vec<u8>) {
    with_caller(r, out, |c, out| {
        write_colored(&c.short(), opts, ColorOf::Caller, out)
    });
}

fn emit_caller_file(r: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    with_caller(r, out, |c, out| out.extend_from_slice(c.file_name().as_bytes()));
}

fn emit_caller_path(r: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    with_caller(r, out, |c, out| out.extend_from_slice(c.file.as_bytes()));
}

fn emit_caller_line(r: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    with_caller(r, out, |c, out| {
        let _ = write!(out, "{}", c.line);
    });
}

fn emit_caller_name(r: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    with_caller(r, out, |c, out| out.extend_from_slice(c.function.as_bytes()));
}

fn emit_trace_id(r: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    if let Some(id) = &r.trace_id {
        out.extend_from_slice(id.as_bytes());
    }
}

fn emit_level_name(r: &LogRecord, opts: &RenderOptions, out: &mut Vec<u8>) {
    write_colored(r.level.short_str(), opts, ColorOf::Level(r.level), out);
}

fn emit_level_no(r: &LogRecord, opts: &RenderOptions, out: &mut Vec<u8>) {
    write_colored(
        &r.level.as_u8().to_string(),
        opts,
        ColorOf::Level(r.level),
        out,
    );
}

fn emit_date_time(r: &LogRecord, opts: &RenderOptions, out: &mut Vec<u8>) {
    opts.time_format.write(&r.timestamp, out);
}

fn emit_msecs(r: &LogRecord, _: &RenderOptions, out: &mut Vec<u8>) {
    let _ = write!(out, "{:03}", r.timestamp.timestamp_subsec_millis() % 1000);
}

fn emit_message(r: &LogRecord, opts: &RenderOptions, out: &mut Vec<u8>) {
    if opts.quote || (opts.quote_empty && r.message.is_empty()) {
        let _ = write!(out, "{:?}", r.message);
    } else {
        out.extend_from_slice(r.message.as_bytes());
    }
}

/// Static field registry
const FIELDS: &[(&str, Emitter)] = &[
    ("LoggerName", emit_logger_name),
    ("Caller", emit_caller),
    ("ShortCaller", emit_short_caller),
    ("Pid", emit_pid),
    ("RoutineId", emit_thread_id),
    ("RoutineName", emit_thread_name),
    ("Ip", emit_ip),
    ("HostName", emit_hostname),
    ("CallerFile", emit_caller_file),
    ("CallerPath", emit_caller_path),
    ("CallerLine", emit_caller_line),
    ("CallerName", emit_caller_name),
    ("TradeId", emit_trace_id),
    ("TraceId", emit_trace_id),
    ("LevelName", emit_level_name),
    ("LevelNo", emit_level_no),
    ("DateTime", emit_date_time),
    ("Msecs", emit_msecs),
    ("Message", emit_message),
    ("File", emit_caller_path),
    ("Line", emit_caller_line),
    ("Func", emit_caller_name),
];

fn lookup(name: &str) -> Option<(&'static str, Emitter)> {
    FIELDS
        .iter()
        .find(|(field, _)| *field == name)
        .map(|(field, emit)| (*field, *emit))
}

/// Names accepted inside `%[...]`
pub fn known_fields() -> impl Iterator<Item = &'static str> {
    FIELDS.iter().map(|(name, _)| *name)
}

#[derive(Clone)]
struct Slot {
    field: &'static str,
    emit: Emitter,
    separator: String,
}

/// Compiled template: prefix, then each field followed by the literal that
/// came after it, then suffix.
#[derive(Clone)]
pub struct PatternProgram {
    template: String,
    prefix: String,
    slots: Vec<Slot>,
    suffix: String,
    unknown: Vec<String>,
}

impl PatternProgram {
    /// Compile a template. Never fails: unknown field names are reported on
    /// stderr and dropped while the text around them is kept.
    pub fn compile(template: &str) -> Self {
        let mut prefix = String::new();
        let mut slots: Vec<Slot> = Vec::new();
        let mut unknown = Vec::new();
        let mut prev_end: Option<usize> = None;

        for caps in PLACEHOLDER.captures_iter(template) {
            let Some(whole) = caps.get(0) else { continue };
            let literal = &template[prev_end.unwrap_or(0)..whole.start()];
            match slots.last_mut() {
                Some(last) => last.separator.push_str(literal),
                None => prefix.push_str(literal),
            }

            let name = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            match lookup(name) {
                Some((field, emit)) => slots.push(Slot {
                    field,
                    emit,
                    separator: String::new(),
                }),
                None => {
                    eprintln!(
                        "[LOGGER WARNING] Unknown pattern field '{}' in template '{}', dropping it",
                        name, template
                    );
                    unknown.push(name.to_string());
                }
            }
            prev_end = Some(whole.end());
        }

        let tail = &template[prev_end.unwrap_or(0)..];
        let suffix = match slots.pop() {
            Some(mut last) => {
                // Text after the final placeholder is the suffix, not a separator
                let suffix = std::mem::take(&mut last.separator) + tail;
                slots.push(last);
                suffix
            }
            None => {
                prefix.push_str(tail);
                String::new()
            }
        };

        Self {
            template: template.to_string(),
            prefix,
            slots,
            suffix,
            unknown,
        }
    }

    /// Render `record` into `out`. No trailing newline.
    pub fn execute(&self, record: &LogRecord, opts: &RenderOptions, out: &mut Vec<u8>) {
        out.extend_from_slice(self.prefix.as_bytes());
        for slot in &self.slots {
            (slot.emit)(record, opts, out);
            out.extend_from_slice(slot.separator.as_bytes());
        }
        out.extend_from_slice(self.suffix.as_bytes());
    }

    pub fn render(&self, record: &LogRecord, opts: &RenderOptions) -> Vec<u8> {
        let mut out = Vec::with_capacity(128);
        self.execute(record, opts, &mut out);
        out
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Fields that will be emitted, in order
    pub fn fields(&self) -> Vec<&'static str> {
        self.slots.iter().map(|s| s.field).collect()
    }

    /// Field names that were dropped at compile time
    pub fn unknown_fields(&self) -> &[String] {
        &self.unknown
    }
}

impl fmt::Debug for PatternProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternProgram")
            .field("prefix", &self.prefix)
            .field("fields", &self.fields())
            .field("suffix", &self.suffix)
            .finish()
    }
}
