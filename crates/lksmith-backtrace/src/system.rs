//! System-API provider.
//!
//! Captures through `std::backtrace::Backtrace` and reshapes its rendered
//! output into one string per frame. Symbol text is kept exactly as the
//! platform symbolizer produced it; `at file:line` continuation lines are
//! folded away so the output is a pure frame sequence, like the unwinder
//! provider's.

use crate::{CaptureError, CaptureScratch, MAX_FRAMES};

pub fn capture(_scratch: &mut CaptureScratch) -> Result<Vec<String>, CaptureError> {
    let rendered = std::backtrace::Backtrace::force_capture().to_string();

    let mut frames = Vec::new();
    frames
        .try_reserve(MAX_FRAMES.min(rendered.len()))
        .map_err(|_| CaptureError::OutOfMemory)?;

    for line in rendered.lines() {
        if frames.len() >= MAX_FRAMES {
            break;
        }
        if let Some(symbol) = parse_frame_line(line) {
            frames.push(symbol.to_string());
        }
    }
    Ok(frames)
}

/// Extract the symbol text from one rendered backtrace line.
///
/// Frame lines look like `  4: module::function`; source-location lines look
/// like `        at /path/file.rs:123` and are skipped.
fn parse_frame_line(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("at ") {
        return None;
    }
    match trimmed.split_once(": ") {
        Some((index, symbol)) if index.trim().chars().all(|c| c.is_ascii_digit()) => {
            Some(symbol.trim())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_frame_lines_and_skips_locations() {
        assert_eq!(
            parse_frame_line("  4: myapp::worker::run"),
            Some("myapp::worker::run")
        );
        assert_eq!(parse_frame_line("        at /src/worker.rs:42"), None);
        assert_eq!(parse_frame_line(""), None);
    }

    #[test]
    fn capture_produces_frames() {
        let mut scratch = CaptureScratch::new();
        let frames = capture(&mut scratch).expect("system capture should succeed");
        assert!(!frames.is_empty());
        assert!(frames.len() <= MAX_FRAMES);
    }
}
