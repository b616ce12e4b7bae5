//! Deterministic identifiers for index records.
//!
//! Index keys may only contain ASCII letters, digits, `_` and `-`, so the blob name is sanitized.
//! Sanitizing is lossy (`a b.pdf` and `a_b.pdf` collapse to the same string), so the parent id
//! also carries the upper-case hex encoding of the original UTF-8 name.

const PARENT_ID_PREFIX: &str = "file";

/// Replace every character outside `[0-9a-zA-Z_-]` with `_`.
pub fn sanitize_key(value: &str) -> String {
    value
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Parent identifier shared by every chunk of a document: `file-{sanitized}-{HEX}`.
///
/// Callers must pass a non-empty name.
pub fn build_parent_id(source_name: &str) -> String {
    format!(
        "{PARENT_ID_PREFIX}-{}-{}",
        sanitize_key(source_name),
        hex::encode_upper(source_name.as_bytes())
    )
}

/// Index key of one chunk: the parent id immediately followed by the decimal ordinal.
pub fn build_chunk_id(parent_id: &str, ordinal: usize) -> String {
    format!("{parent_id}{ordinal}")
}

/// Base file name used as the record title (`docs/guide.pdf` -> `guide.pdf`).
pub fn document_title(source_name: &str) -> &str {
    source_name.rsplit('/').next().unwrap_or(source_name)
}
