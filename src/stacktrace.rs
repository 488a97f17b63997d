//! Stack trace parsing and in-app frame classification.
//!
//! Accepts the textual formats the SDK actually meets: the std backtrace
//! rendering (`N: symbol` followed by an indented `at path:line:col`),
//! V8-style `at function (path:line:col)` lines, and JSC/Hermes-style
//! `function@path:line:col` lines. Anything unrecognized is skipped; a fully
//! unparseable trace yields an empty frame list, never an error.

use crate::model::StackFrame;

/// Path fragments that mark a frame as library or toolchain code.
const LIBRARY_PATH_PARTS: &[&str] = &[
    "node_modules",
    "react-native",
    "ReactNative",
    "expo-modules",
    "metro",
    "hermes",
    "/rustc/",
    "/.cargo/registry",
    "/.rustup/",
];

/// Whether a source path belongs to application code.
pub fn is_in_app_frame(filename: &str) -> bool {
    !LIBRARY_PATH_PARTS.iter().any(|p| filename.contains(p))
}

/// Parses a stack trace string into frames, innermost first.
pub fn parse_stack_trace(stack: &str) -> Vec<StackFrame> {
    let mut frames = Vec::new();
    // Symbol from an `N: symbol` line waiting for its `at path` line.
    let mut pending_symbol: Option<String> = None;

    for raw_line in stack.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("at ") {
            if let Some((function, location)) = split_v8_frame(rest) {
                pending_symbol = None;
                push_frame(&mut frames, function, location);
            } else {
                // Bare `at path:line:col`: either the location line of a std
                // backtrace symbol, or an anonymous V8 frame.
                let function = pending_symbol.take();
                push_frame(&mut frames, function, rest);
            }
            continue;
        }

        if let Some(symbol) = split_numbered_frame(line) {
            // A symbol without a following location still counts as a frame.
            if let Some(prev) = pending_symbol.take() {
                frames.push(StackFrame {
                    function: prev,
                    filename: String::new(),
                    lineno: None,
                    colno: None,
                    in_app: false,
                });
            }
            pending_symbol = Some(symbol.to_string());
            continue;
        }

        if let Some((function, location)) = line.split_once('@') {
            if !location.is_empty() {
                pending_symbol = None;
                let function = if function.is_empty() {
                    None
                } else {
                    Some(function.to_string())
                };
                push_frame(&mut frames, function, location);
            }
        }
    }

    if let Some(symbol) = pending_symbol {
        frames.push(StackFrame {
            function: symbol,
            filename: String::new(),
            lineno: None,
            colno: None,
            in_app: false,
        });
    }

    frames
}

/// Captures the current call stack and parses it into frames.
///
/// Frames from this module and the backtrace machinery itself are dropped.
pub fn current_frames() -> Vec<StackFrame> {
    let rendered = std::backtrace::Backtrace::force_capture().to_string();
    parse_stack_trace(&rendered)
        .into_iter()
        .filter(|f| {
            !f.function.contains("stacktrace::current_frames")
                && !f.function.starts_with("std::backtrace")
                && !f.function.starts_with("backtrace::")
        })
        .collect()
}

/// Renders frames as `function at file:line` lines for span event attributes.
pub fn render_frames(frames: &[StackFrame]) -> String {
    frames
        .iter()
        .map(|f| {
            let function = if f.function.is_empty() {
                "<anonymous>"
            } else {
                f.function.as_str()
            };
            match f.lineno {
                Some(line) => format!("{function} at {}:{line}", f.filename),
                None => format!("{function} at {}", f.filename),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Splits `function (path:line:col)` into its parts.
fn split_v8_frame(rest: &str) -> Option<(Option<String>, &str)> {
    let open = rest.find(" (")?;
    let location = rest[open + 2..].strip_suffix(')')?;
    let function = rest[..open].trim();
    let function = if function.is_empty() {
        None
    } else {
        Some(function.to_string())
    };
    Some((function, location))
}

/// Extracts the symbol from a `N: symbol` backtrace line.
fn split_numbered_frame(line: &str) -> Option<&str> {
    let (index, symbol) = line.split_once(':')?;
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let symbol = symbol.trim();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol)
    }
}

fn push_frame(frames: &mut Vec<StackFrame>, function: Option<String>, location: &str) {
    let (filename, lineno, colno) = parse_location(location);
    let in_app = is_in_app_frame(&filename);
    frames.push(StackFrame {
        function: function.unwrap_or_else(|| "<anonymous>".to_string()),
        filename,
        lineno,
        colno,
        in_app,
    });
}

/// Splits `path:line:col` (or `path:line`, or a bare path) into parts.
fn parse_location(location: &str) -> (String, Option<u32>, Option<u32>) {
    let mut tail = location.rsplitn(3, ':');
    let last = tail.next().unwrap_or("");
    let middle = tail.next();
    let rest = tail.next();

    if let (Some(middle), Some(rest)) = (middle, rest) {
        if let (Ok(line), Ok(col)) = (middle.parse(), last.parse()) {
            return (rest.to_string(), Some(line), Some(col));
        }
    }

    if let Some((path, line_str)) = location.rsplit_once(':') {
        if let Ok(line) = line_str.parse() {
            if !path.is_empty() {
                return (path.to_string(), Some(line), None);
            }
        }
    }

    (location.to_string(), None, None)
}
