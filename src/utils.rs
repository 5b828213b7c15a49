//! Small helpers shared by the diagnostics model and the compiler.

/// Returns the `(line, column)` of the `nth` byte in `s`, both one-indexed.
///
/// Returns `None` if `nth_byte` is not a valid index into `s` (past the end,
/// or not on a char boundary).
///
/// ```
/// use brainc::utils::find_ln_col;
///
/// assert_eq!(find_ln_col("", 0), Some((1, 1)));
/// assert_eq!(find_ln_col("ab\ncd", 3), Some((2, 1)));
/// ```
pub fn find_ln_col(s: &str, nth_byte: usize) -> Option<(usize, usize)> {
    let prefix = s.get(0..nth_byte)?;
    let line = prefix.matches('\n').count() + 1;
    let last_nl = prefix.rfind('\n').map_or(0, |i| i + 1);
    let column = prefix[last_nl..].chars().count() + 1;
    Some((line, column))
}

/// Keeps only the eight significant Brainfuck characters, discarding
/// everything else (comments, whitespace, any other byte). Idempotent:
/// `trim(trim(s)) == trim(s)`.
pub fn trim(source: &str) -> String {
    source
        .chars()
        .filter(|c| matches!(c, '+' | '-' | '<' | '>' | '.' | ',' | '[' | ']'))
        .collect()
}
