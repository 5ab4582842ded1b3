//! Pre-flight checks applied to user-entered paths and dates before a run is started.

use thiserror::Error;
use time::macros::format_description;
use time::Date;

pub const MAX_PATH_CHARS: usize = 4096;

const FORBIDDEN_PATTERNS: &[(&str, &str)] = &[
    ("<script", "스크립트 태그를 사용할 수 없습니다"),
    ("</script", "스크립트 태그를 사용할 수 없습니다"),
    ("<iframe", "iframe 태그를 사용할 수 없습니다"),
    ("<object", "object 태그를 사용할 수 없습니다"),
    ("<embed", "embed 태그를 사용할 수 없습니다"),
    ("<img", "img 태그를 사용할 수 없습니다"),
    ("javascript:", "JavaScript URL을 사용할 수 없습니다"),
    ("onerror=", "이벤트 핸들러를 사용할 수 없습니다"),
    ("onload=", "이벤트 핸들러를 사용할 수 없습니다"),
    ("onclick=", "이벤트 핸들러를 사용할 수 없습니다"),
    ("onmouseover=", "이벤트 핸들러를 사용할 수 없습니다"),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("경로가 너무 깁니다 (최대 {MAX_PATH_CHARS}자)")]
    TooLong,
    #[error("날짜 형식이 올바르지 않습니다 (YYYY-MM-DD): {0}")]
    InvalidDate(String),
}

/// Trim whitespace and strip one leading and one trailing quote, as left by drag-and-drop or
/// "copy as path".
pub fn clean_path(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix(['\'', '"'])
        .unwrap_or(trimmed);
    trimmed
        .strip_suffix(['\'', '"'])
        .unwrap_or(trimmed)
        .to_string()
}

/// Empty paths pass; emptiness is checked where a path is required.
pub fn validate_path(path: &str) -> Result<(), PathError> {
    if path.is_empty() {
        return Ok(());
    }
    let lower = path.to_lowercase();
    if let Some((_, reason)) = FORBIDDEN_PATTERNS.iter().find(|(p, _)| lower.contains(p)) {
        return Err(PathError::Forbidden(reason));
    }
    if path.chars().count() > MAX_PATH_CHARS {
        return Err(PathError::TooLong);
    }
    Ok(())
}

/// `YYYY-MM-DD`, a calendar date without time zone.
pub fn validate_date(value: &str) -> Result<(), PathError> {
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map(|_| ())
        .map_err(|_| PathError::InvalidDate(value.to_string()))
}
