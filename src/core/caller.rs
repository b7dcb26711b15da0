//! Caller-site capture
//!
//! Logging entry points are `#[track_caller]`, so the location that reaches
//! the resolver is the user's call site, not a frame inside this crate.

use std::panic::Location;
use std::path::Path;
use std::sync::Arc;

/// Raw call-site data collected at the logging call
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    pub location: &'static Location<'static>,
    /// `module_path!()` of the caller when it came through a macro
    pub module_path: Option<&'static str>,
}

impl CallSite {
    #[track_caller]
    pub fn here(module_path: Option<&'static str>) -> Self {
        Self {
            location: Location::caller(),
            module_path,
        }
    }
}

/// Resolved caller frame carried by a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerInfo {
    pub file: String,
    pub function: String,
    pub line: u32,
}

impl CallerInfo {
    pub fn new(file: impl Into<String>, function: impl Into<String>, line: u32) -> Self {
        Self {
            file: file.into(),
            function: function.into(),
            line,
        }
    }

    /// Last component of the source path
    pub fn file_name(&self) -> &str {
        Path::new(&self.file)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.file)
    }

    /// `path/to/file.rs:42:module::function`
    pub fn full(&self) -> String {
        format!("{}:{}:{}", self.file, self.line, self.function)
    }

    /// `file.rs:42`
    pub fn short(&self) -> String {
        format!("{}:{}", self.file_name(), self.line)
    }
}

/// Maps a call site to caller information. Returning `None` leaves the
/// caller fields of the record empty.
pub trait CallerResolver: Send + Sync {
    fn resolve(&self, site: &CallSite) -> Option<CallerInfo>;
}

impl<F> CallerResolver for F
where
    F: Fn(&CallSite) -> Option<CallerInfo> + Send + Sync,
{
    fn resolve(&self, site: &CallSite) -> Option<CallerInfo> {
        self(site)
    }
}

/// Default resolver: source location from `#[track_caller]`, function name
/// from the macro-supplied module path.
///
/// Direct method calls such as `logger.info(..)` carry no module path, so
/// the function name falls back to the file stem (`disk` for `src/disk.rs`).
#[derive(Debug, Default, Clone, Copy)]
pub struct LocationResolver;

impl CallerResolver for LocationResolver {
    fn resolve(&self, site: &CallSite) -> Option<CallerInfo> {
        let file = site.location.file();
        let function = match site.module_path {
            Some(module) => module,
            None => Path::new(file)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default(),
        };
        Some(CallerInfo {
            file: file.to_string(),
            function: function.to_string(),
            line: site.location.line(),
        })
    }
}

pub type SharedResolver = Arc<dyn CallerResolver>;
