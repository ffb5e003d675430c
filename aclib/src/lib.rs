//! aclib - dynamic shell auto-completion for declaratively built clap CLIs.
//!
//! The library keeps an ordered registry of options ([`OptionSet`]) that is
//! used both to build a `clap::Command` at runtime ([`cli::build_command`])
//! and to answer shell completion requests.
//!
//! Completion follows the environment-variable protocol spoken by bash
//! completion functions: when the registration script (see
//! [`registration_script`]) invokes the program, it sets `_ARGCOMPLETE`
//! together with `COMP_LINE` (the command line typed so far) and
//! `COMP_POINT` (the cursor offset). The program answers with the candidate
//! list on its completion stream, one candidate per vertical-tab separator,
//! and exits without running its normal logic.
//!
//! ```rust
//! use aclib::{autocomplete, CompletionRequest, OptionSet, OptionSpec};
//!
//! let set = OptionSet::with([
//!     OptionSpec::new("group1.op"),
//!     OptionSpec::enumerated("mode", &["fast", "safe"]),
//! ])
//! .unwrap();
//!
//! let req = CompletionRequest::new("tool --group1");
//! let mut out = Vec::new();
//! let mut err = Vec::new();
//! autocomplete(&set, &req, &mut out, &mut err).unwrap();
//! assert_eq!(out, b"--group1.op");
//! ```
//!
//! In a binary the whole hookup is a single call before clap parsing:
//!
//! ```rust,no_run
//! use aclib::{autocomplete_from_env, CompletionOutcome, OptionSet, OptionSpec};
//!
//! let set = OptionSet::with([OptionSpec::new("input")]).unwrap();
//! if let CompletionOutcome::Completed { .. } = autocomplete_from_env(&set).unwrap() {
//!     std::process::exit(0);
//! }
//! // ... normal clap parsing follows
//! ```

use std::env;
use std::io::Write;

pub mod cli;
pub mod error;
pub mod register;
pub mod spec;

pub use error::{Error, Result};
pub use register::{registration_script, Shell};
pub use spec::{parse_option_root, OptionSet, OptionSpec, ValueType};

// =====================
// Protocol constants
// =====================

/// Presence of this variable activates completion mode.
pub const ACTIVATE_VAR: &str = "_ARGCOMPLETE";
/// Suppresses the trailing space the shell would add after a completion.
pub const SUPPRESS_SPACE_VAR: &str = "_ARGCOMPLETE_SUPPRESS_SPACE";
/// Word break characters the shell used to split the line.
pub const WORDBREAKS_VAR: &str = "_ARGCOMPLETE_COMP_WORDBREAKS";
/// Candidate separator override.
pub const IFS_VAR: &str = "_ARGCOMPLETE_IFS";
/// The command line typed so far.
pub const COMP_LINE_VAR: &str = "COMP_LINE";
/// Byte offset of the cursor within `COMP_LINE`.
pub const COMP_POINT_VAR: &str = "COMP_POINT";
/// Kind of completion requested (`63` for listing, `9` for insertion).
pub const COMP_TYPE_VAR: &str = "COMP_TYPE";
/// Enables decision tracing on the error stream.
pub const DEBUG_VAR: &str = "ACLIB_DEBUG";

/// Default word break characters, matching bash's `COMP_WORDBREAKS`.
pub const DEFAULT_WORDBREAKS: &str = " \t\n\"'><=;|&(:";
/// Default candidate separator (vertical tab).
pub const DEFAULT_IFS: &str = "\x0b";

// =====================
// Completion requests
// =====================

/// Snapshot of one shell completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// The command line typed so far.
    pub line: String,
    /// Byte offset of the cursor within `line`.
    pub point: usize,
    /// Kind of completion requested, if the shell reported one.
    pub comp_type: Option<u32>,
    /// Word break characters used by the shell.
    pub wordbreaks: String,
    /// Whether the shell was asked not to append a space after completing.
    pub suppress_space: bool,
    /// Candidate separator.
    pub ifs: String,
}

impl CompletionRequest {
    /// A request with the cursor at the end of `line` and protocol defaults.
    pub fn new(line: &str) -> Self {
        Self::with_point(line, line.len())
    }

    /// A request with an explicit cursor offset.
    pub fn with_point(line: &str, point: usize) -> Self {
        CompletionRequest {
            line: line.to_string(),
            point,
            comp_type: Some(u32::from(b'?')),
            wordbreaks: DEFAULT_WORDBREAKS.to_string(),
            suppress_space: true,
            ifs: DEFAULT_IFS.to_string(),
        }
    }

    /// Build a request from the process environment.
    ///
    /// Returns `None` when `_ARGCOMPLETE` is not set, i.e. the program is
    /// running normally rather than answering a completion. A missing or
    /// garbled `COMP_POINT` falls back to the end of the line.
    pub fn from_env() -> Option<Self> {
        env::var_os(ACTIVATE_VAR)?;
        let line = env::var(COMP_LINE_VAR).unwrap_or_default();
        let point = env::var(COMP_POINT_VAR)
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(line.len());
        Some(CompletionRequest {
            point,
            comp_type: env::var(COMP_TYPE_VAR).ok().and_then(|t| t.parse().ok()),
            wordbreaks: env::var(WORDBREAKS_VAR)
                .unwrap_or_else(|_| DEFAULT_WORDBREAKS.to_string()),
            suppress_space: env::var_os(SUPPRESS_SPACE_VAR).is_some(),
            ifs: env::var(IFS_VAR).unwrap_or_else(|_| DEFAULT_IFS.to_string()),
            line,
        })
    }
}

/// Result of a completion attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The environment did not request a completion.
    NotRequested,
    /// A completion response was written to the output stream.
    Completed {
        /// Number of candidates emitted.
        candidates: usize,
    },
}

// =====================
// Completion engine
// =====================

/// What the word at the cursor is asking for.
enum Context<'a> {
    /// A long flag is being typed.
    Flags { prefix: String },
    /// A value for `spec` is being typed.
    Value {
        spec: &'a OptionSpec,
        prefix: String,
    },
    /// Nothing we can complete.
    None,
}

/// Answer a completion request against the registry.
///
/// Candidates go to `out`, joined by the request's separator without a
/// trailing newline. Diagnostics for partial values of validation-only types
/// (JSON and list options) go to `err`; the candidate stream stays empty for
/// those.
pub fn autocomplete<O: Write, E: Write>(
    set: &OptionSet,
    req: &CompletionRequest,
    out: &mut O,
    err: &mut E,
) -> Result<CompletionOutcome> {
    let point = floor_char_boundary(&req.line, req.point);
    let (words, current) = split_line(&req.line[..point]);
    if debug_enabled() {
        writeln!(err, "aclib: words={:?} current={:?}", words, current)?;
    }

    // The first word is the program name; completing it is the shell's job.
    if words.is_empty() {
        out.flush()?;
        return Ok(CompletionOutcome::Completed { candidates: 0 });
    }
    let args = &words[1..];

    let mut candidates: Vec<String> = Vec::new();
    match completion_context(set, req, args, &current) {
        Context::Flags { prefix } => {
            candidates = set
                .flag_spellings()
                .into_iter()
                .filter(|f| f.starts_with(&prefix))
                .collect();
        }
        Context::Value { spec, prefix } => {
            let matching = spec.value_candidates();
            if matching.is_empty() {
                // No enumerable value space: validate the partial value and
                // report on the error stream instead.
                if let Ok(value_type) = spec.value_type() {
                    if matches!(value_type, ValueType::List(_) | ValueType::Json(_)) {
                        writeln!(err, "{}", partial_value_diagnostic(&value_type, &prefix))?;
                    }
                }
            } else {
                candidates = matching
                    .into_iter()
                    .filter(|c| c.starts_with(&prefix))
                    .collect();
            }
        }
        Context::None => {}
    }

    out.write_all(candidates.join(&req.ifs).as_bytes())?;
    out.flush()?;
    Ok(CompletionOutcome::Completed {
        candidates: candidates.len(),
    })
}

/// Answer a completion request taken from the process environment, writing
/// to stdout/stderr.
///
/// Returns [`CompletionOutcome::NotRequested`] when completion mode is not
/// active; callers exit the process on [`CompletionOutcome::Completed`].
pub fn autocomplete_from_env(set: &OptionSet) -> Result<CompletionOutcome> {
    match CompletionRequest::from_env() {
        Some(req) => {
            let stdout = std::io::stdout();
            let stderr = std::io::stderr();
            autocomplete(set, &req, &mut stdout.lock(), &mut stderr.lock())
        }
        None => Ok(CompletionOutcome::NotRequested),
    }
}

fn completion_context<'a>(
    set: &'a OptionSet,
    req: &CompletionRequest,
    args: &[String],
    current: &str,
) -> Context<'a> {
    if current.starts_with("--") {
        // `--flag=prefix` only splits when the shell breaks words on `=`.
        if req.wordbreaks.contains('=') {
            if let Some(eq) = current.find('=') {
                let flag = &current[..eq];
                let value_prefix = &current[eq + 1..];
                if let Some((spec, negated)) = set.find_by_flag(flag) {
                    if !negated && spec.equals_value() {
                        return Context::Value {
                            spec,
                            prefix: value_prefix.to_string(),
                        };
                    }
                }
                return Context::None;
            }
        }
        return Context::Flags {
            prefix: current.to_string(),
        };
    }
    if current.starts_with('-') {
        return Context::Flags {
            prefix: current.to_string(),
        };
    }
    // A bare word: it may be the value of the preceding option.
    if let Some(prev) = args.last() {
        if prev.starts_with("--") && !prev.contains('=') {
            if let Some((spec, negated)) = set.find_by_flag(prev) {
                if !negated && spec.takes_value() {
                    return Context::Value {
                        spec,
                        prefix: current.to_string(),
                    };
                }
            }
        }
    }
    Context::None
}

/// Diagnostic line for a partially typed value of a validation-only type.
fn partial_value_diagnostic(value_type: &ValueType, raw: &str) -> String {
    let valid = serde_json::from_str::<serde_json::Value>(raw)
        .map(|v| value_type.accepts(&v))
        .unwrap_or(false);
    let status = if valid {
        "value already valid"
    } else {
        "value not yet valid"
    };
    match value_type {
        ValueType::Json(Some(schema)) => {
            format!("{}, required to match schema {}", status, schema)
        }
        _ => format!("{}, expected type {}", status, value_type),
    }
}

/// Split the line up to the cursor into completed words and the word being
/// typed. Tokenization is shell-aware (quotes are stripped); an unbalanced
/// quote is retried with a synthetic closing quote before falling back to
/// plain whitespace splitting.
fn split_line(prefix: &str) -> (Vec<String>, String) {
    match shell_words::split(prefix) {
        Ok(mut words) => {
            if prefix.ends_with(char::is_whitespace) || words.is_empty() {
                (words, String::new())
            } else {
                let current = words.pop().unwrap_or_default();
                (words, current)
            }
        }
        Err(_) => {
            for quote in ['\'', '"'] {
                let mut patched = prefix.to_string();
                patched.push(quote);
                if let Ok(mut words) = shell_words::split(&patched) {
                    let current = words.pop().unwrap_or_default();
                    return (words, current);
                }
            }
            let mut words: Vec<String> = prefix.split_whitespace().map(String::from).collect();
            let current = if prefix.ends_with(char::is_whitespace) {
                String::new()
            } else {
                words.pop().unwrap_or_default()
            };
            (words, current)
        }
    }
}

/// Clamp a byte offset down to the nearest char boundary.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    let mut i = index.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn debug_enabled() -> bool {
    env::var_os(DEBUG_VAR).is_some()
}
