//! Raw extracted text cleanup.
//!
//! Extraction output is noisy: Windows line endings, runs of blank lines
//! left by page breaks, columns of spaces from table layouts. The
//! normalizer reduces all of that to a stable form that the chunker can
//! split on:
//!
//! 1. `\r\n` and bare `\r` become `\n`.
//! 2. Runs of three or more newlines collapse to exactly one blank line.
//! 3. Runs of spaces and tabs collapse to a single space.
//! 4. Leading and trailing whitespace is trimmed.
//!
//! Pure and total: no input can make it fail, and re-running it on its own
//! output is a no-op.

/// Normalize extracted document text.
pub fn normalize_text(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut newline_run = 0usize;
    let mut space_run = false;

    for ch in unified.chars() {
        match ch {
            '\n' => {
                newline_run += 1;
                space_run = false;
                // Cap any run at one blank line.
                if newline_run <= 2 {
                    out.push('\n');
                }
            }
            ' ' | '\t' => {
                if !space_run {
                    out.push(' ');
                }
                space_run = true;
            }
            _ => {
                newline_run = 0;
                space_run = false;
                out.push(ch);
            }
        }
    }

    out.trim().to_string()
}
