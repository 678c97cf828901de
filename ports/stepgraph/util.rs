/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

/// Collapse runs of whitespace (including newlines from multi-line LaTeX)
/// into single spaces and cap the result at `max_chars` characters.
///
/// Counts characters, not bytes, so it never splits a multi-byte code point.
pub(crate) fn compact_label(input: &str, max_chars: usize) -> String {
    let collapsed = input.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > max_chars {
        let truncated: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
        format!("{}\u{2026}", truncated.trim_end())
    } else {
        collapsed
    }
}
