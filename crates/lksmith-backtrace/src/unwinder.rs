//! Unwinder-based provider.
//!
//! Walks the stack with `backtrace::trace`, stashing raw instruction pointers
//! in the caller's scratch, then resolves each pointer to a demangled
//! procedure name. Frames that cannot be symbolized keep their address in
//! `0x…` form so the frame count stays faithful to the walk.

use std::ffi::c_void;

use crate::{CaptureError, CaptureScratch, MAX_FRAMES};

pub fn capture(scratch: &mut CaptureScratch) -> Result<Vec<String>, CaptureError> {
    scratch.ips.clear();
    scratch
        .ips
        .try_reserve(MAX_FRAMES)
        .map_err(|_| CaptureError::OutOfMemory)?;

    backtrace::trace(|frame| {
        if scratch.ips.len() >= MAX_FRAMES {
            return false;
        }
        scratch.ips.push(frame.ip() as usize);
        true
    });

    let mut frames = Vec::new();
    frames
        .try_reserve(scratch.ips.len())
        .map_err(|_| CaptureError::OutOfMemory)?;

    for &ip in &scratch.ips {
        let mut name: Option<String> = None;
        backtrace::resolve(ip as *mut c_void, |symbol| {
            if name.is_none()
                && let Some(symbol_name) = symbol.name()
            {
                // `{:#}` demangles without the trailing hash.
                name = Some(format!("{symbol_name:#}"));
            }
        });
        frames.push(name.unwrap_or_else(|| format!("{ip:#x}")));
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[inline(never)]
    fn capture_from_here(scratch: &mut CaptureScratch) -> Vec<String> {
        capture(scratch).expect("unwinder capture should succeed")
    }

    #[test]
    fn frames_are_undecorated_names() {
        let mut scratch = CaptureScratch::new();
        let frames = capture_from_here(&mut scratch);
        assert!(!frames.is_empty());
        // Resolved names carry no legacy-mangling hash suffix.
        for frame in frames.iter().filter(|f| !f.starts_with("0x")) {
            assert!(
                !frame.contains("::h") || !frame.ends_with(|c: char| c.is_ascii_hexdigit()),
                "frame looks decorated: {frame}"
            );
        }
    }

    #[test]
    fn walk_includes_the_calling_function() {
        let mut scratch = CaptureScratch::new();
        let frames = capture_from_here(&mut scratch);
        assert!(
            frames.iter().any(|f| f.contains("capture_from_here")),
            "expected the caller in: {frames:?}"
        );
    }
}
