//! `SET NOCOUNT ON|OFF` scanning shared by both engines.
//!
//! `SQLite` has no such statement, so its engine cuts the directives out of the batch
//! and runs the remaining segments, each remembering whether row counting was off.
//! SQL Server honours the directive itself but still reports a zero count for every
//! silenced statement, so its engine only asks whether any statement ran counted.

#[derive(Clone, Copy)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    Bracketed,
    Backticked,
    LineComment,
    BlockComment,
}

/// A run of statements sharing one NOCOUNT setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BatchSegment<'a> {
    pub sql: &'a str,
    pub nocount: bool,
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

fn keyword_at(bytes: &[u8], idx: usize, keyword: &str) -> Option<usize> {
    let end = idx + keyword.len();
    let candidate = bytes.get(idx..end)?;
    if !candidate.eq_ignore_ascii_case(keyword.as_bytes()) {
        return None;
    }
    match bytes.get(end) {
        Some(b) if is_ident_byte(*b) => None,
        _ => Some(end),
    }
}

fn skip_whitespace(bytes: &[u8], mut idx: usize) -> usize {
    while idx < bytes.len() && bytes[idx].is_ascii_whitespace() {
        idx += 1;
    }
    idx
}

/// Match `SET NOCOUNT ON|OFF [;]` at `idx`; returns the new setting and the index just
/// past the directive.
fn nocount_directive(bytes: &[u8], idx: usize) -> Option<(bool, usize)> {
    if idx > 0 && is_ident_byte(bytes[idx - 1]) {
        return None;
    }
    let after_set = keyword_at(bytes, idx, "set")?;
    let start = skip_whitespace(bytes, after_set);
    if start == after_set {
        return None;
    }
    let after_nocount = keyword_at(bytes, start, "nocount")?;
    let start = skip_whitespace(bytes, after_nocount);
    if start == after_nocount {
        return None;
    }
    let (on, end) = if let Some(end) = keyword_at(bytes, start, "on") {
        (true, end)
    } else {
        (false, keyword_at(bytes, start, "off")?)
    };
    let tail = skip_whitespace(bytes, end);
    if bytes.get(tail) == Some(&b';') {
        Some((on, tail + 1))
    } else {
        Some((on, end))
    }
}

fn push_segment<'a>(segments: &mut Vec<BatchSegment<'a>>, sql: &'a str, nocount: bool) {
    if !sql.trim().is_empty() {
        segments.push(BatchSegment { sql, nocount });
    }
}

/// Split `sql` around its NOCOUNT directives. Directives inside literals, quoted
/// identifiers and comments are left alone; segments with nothing but whitespace are
/// dropped.
pub(crate) fn split_nocount(sql: &str) -> Vec<BatchSegment<'_>> {
    let bytes = sql.as_bytes();
    let mut segments = Vec::new();
    let mut nocount = false;
    let mut segment_start = 0;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'[' => state = State::Bracketed,
                b'`' => state = State::Backticked,
                b'-' if bytes.get(idx + 1) == Some(&b'-') => state = State::LineComment,
                b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                    state = State::BlockComment;
                    idx += 1;
                }
                b's' | b'S' => {
                    if let Some((on, end)) = nocount_directive(bytes, idx) {
                        push_segment(&mut segments, &sql[segment_start..idx], nocount);
                        nocount = on;
                        segment_start = end;
                        idx = end;
                        continue;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1; // escaped quote
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::Bracketed => {
                if b == b']' {
                    state = State::Normal;
                }
            }
            State::Backticked => {
                if b == b'`' {
                    state = State::Normal;
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                    state = State::Normal;
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    push_segment(&mut segments, &sql[segment_start..], nocount);
    segments
}

/// Whether any statement of `sql` runs with row counting on.
#[cfg(feature = "mssql")]
pub(crate) fn reports_counts(sql: &str) -> bool {
    split_nocount(sql).iter().any(|segment| !segment.nocount)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(sql: &str, nocount: bool) -> BatchSegment<'_> {
        BatchSegment { sql, nocount }
    }

    #[test]
    fn plain_batch_is_one_counting_segment() {
        let sql = "UPDATE t SET a = 1; SELECT * FROM t;";
        assert_eq!(split_nocount(sql), vec![seg(sql, false)]);
    }

    #[test]
    fn lone_directive_leaves_nothing_to_run() {
        assert!(split_nocount("SET NOCOUNT ON").is_empty());
        assert!(split_nocount("  set   nocount on ;  ").is_empty());
    }

    #[test]
    fn directives_toggle_counting_per_segment() {
        let sql = "SET NOCOUNT ON; INSERT INTO t VALUES (1);\nSET NOCOUNT OFF;\nDELETE FROM t;";
        assert_eq!(
            split_nocount(sql),
            vec![
                seg(" INSERT INTO t VALUES (1);\n", true),
                seg("\nDELETE FROM t;", false),
            ]
        );
    }

    #[test]
    fn update_set_clauses_are_not_directives() {
        let sql = "UPDATE t SET nocount = 1 WHERE id = 2";
        assert_eq!(split_nocount(sql), vec![seg(sql, false)]);
        let sql = "UPDATE t SETNOCOUNT ON";
        assert_eq!(split_nocount(sql), vec![seg(sql, false)]);
    }

    #[cfg(feature = "mssql")]
    #[test]
    fn counting_survives_only_outside_nocount() {
        assert!(reports_counts("UPDATE t SET a = 1"));
        assert!(reports_counts("SET NOCOUNT ON; UPDATE t SET a = 1; SET NOCOUNT OFF; DELETE FROM t"));
        assert!(!reports_counts("SET NOCOUNT ON; UPDATE t SET a = 1; DELETE FROM t"));
        assert!(!reports_counts("SET NOCOUNT ON"));
        assert!(reports_counts("SELECT 'SET NOCOUNT ON'"));
    }

    #[test]
    fn literals_and_comments_are_skipped() {
        let sql = "SELECT 'SET NOCOUNT ON', [set nocount on] -- SET NOCOUNT ON\n/* SET NOCOUNT OFF */ FROM t";
        assert_eq!(split_nocount(sql), vec![seg(sql, false)]);
    }
}
