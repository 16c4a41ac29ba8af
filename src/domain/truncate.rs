//! UTF-8 safe truncation of remote output.

/// Cut raw bytes to at most `max_bytes` and decode them.
///
/// Returns the text and whether anything was cut. The cut never splits a
/// multi-byte character; an incomplete trailing sequence is dropped. Invalid
/// bytes elsewhere decode lossily.
#[must_use]
pub fn truncate_utf8(bytes: &[u8], max_bytes: usize) -> (String, bool) {
    if bytes.len() <= max_bytes {
        return (String::from_utf8_lossy(bytes).into_owned(), false);
    }

    let slice = &bytes[..max_bytes];
    let text = match std::str::from_utf8(slice) {
        Ok(s) => s.to_string(),
        // Only an incomplete sequence at the very end
        Err(e) if e.error_len().is_none() => {
            String::from_utf8_lossy(&slice[..e.valid_up_to()]).into_owned()
        }
        Err(_) => {
            let tail = incomplete_tail_len(slice);
            String::from_utf8_lossy(&slice[..slice.len() - tail]).into_owned()
        }
    };
    (text, true)
}

/// Length of a trailing, not yet complete UTF-8 sequence (0 if none)
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    for back in 1..=bytes.len().min(3) {
        let b = bytes[bytes.len() - back];
        if b & 0xC0 == 0x80 {
            continue;
        }
        let needed = match b {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => return 0,
        };
        return if needed > back { back } else { 0 };
    }
    0
}

/// Find the largest index that is both <= `index` and a valid char boundary.
#[doc(hidden)]
#[must_use]
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Cap a string at `max` bytes, appending `...` when cut
#[must_use]
pub fn cap(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    format!("{}...", &s[..floor_char_boundary(s, max)])
}
