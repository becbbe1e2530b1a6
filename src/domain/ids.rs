//! Job identifier generation.
//!
//! A job id sorts chronologically by construction: `YY-MMDD-HHMMSS_<slug>`.

use chrono::{DateTime, Utc};

/// Derive a filesystem-safe slug from a source path's file stem.
pub fn slugify(stem: &str) -> String {
    let mut out = String::with_capacity(stem.len());
    let mut last_was_dash = false;
    for ch in stem.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && !out.is_empty() {
            out.push('-');
            last_was_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "job".to_string()
    } else {
        out
    }
}

/// Build a job id from a timestamp and a source-derived slug, with a short
/// random suffix so two jobs created from the same source in the same
/// second (watcher burst, retried `run`) never collide on one directory.
pub fn new_job_id(now: DateTime<Utc>, slug: &str) -> String {
    let suffix: u16 = rand::random();
    format!("{}_{}_{:04x}", now.format("%y-%m%d-%H%M%S"), slug, suffix)
}
