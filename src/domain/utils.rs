//! Domain-specific shared validations and formatting utilities

use crate::errors::AppError;

pub const DEFAULT_LIST_LIMIT: u32 = 50;
pub const MAX_LIST_LIMIT: u32 = 100;
pub const MAX_SEARCH_PAGE_SIZE: u32 = 50;

pub fn normalize_operation(
    operation: &str,
    allowed: &'static [&'static str],
) -> Result<&'static str, AppError> {
    let normalized = operation.trim().to_ascii_lowercase();
    allowed
        .iter()
        .copied()
        .find(|candidate| *candidate == normalized)
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_operation",
                format!("operation must be one of: {}", allowed.join(", ")),
            )
        })
}

/// Trims the value and treats blank strings as absent.
pub fn normalize_text(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

pub fn require_text(
    value: Option<String>,
    code: &'static str,
    message: &'static str,
) -> Result<String, AppError> {
    normalize_text(value).ok_or_else(|| AppError::bad_request(code, message))
}

pub fn require_id<T>(value: Option<T>, message: &'static str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::bad_request("missing_id", message))
}

/// Object ids (highlights) are hex strings; anything else is rejected before
/// it can reach a request path.
pub fn normalize_object_id(value: Option<String>) -> Result<Option<String>, AppError> {
    let Some(id) = normalize_text(value) else {
        return Ok(None);
    };

    if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::bad_request(
            "invalid_id",
            format!("id must contain only letters and digits: {id}"),
        ));
    }

    Ok(Some(id))
}

pub fn normalize_tag_names(tags: Vec<String>) -> Result<Vec<String>, AppError> {
    let normalized = tags
        .into_iter()
        .filter_map(|tag| normalize_text(Some(tag)))
        .collect::<Vec<_>>();

    if normalized.is_empty() {
        return Err(AppError::bad_request(
            "missing_tag_names",
            "tag_names must include at least one non-empty tag",
        ));
    }

    Ok(normalized)
}

pub fn normalize_list_limit(limit: Option<u32>) -> Result<u32, AppError> {
    let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT);
    if limit == 0 || limit > MAX_LIST_LIMIT {
        return Err(AppError::bad_request(
            "invalid_limit",
            "limit must be between 1 and 100",
        ));
    }
    Ok(limit)
}

pub fn normalize_page_size(per_page: Option<u32>) -> Result<Option<u32>, AppError> {
    match per_page {
        Some(0) => Err(AppError::bad_request(
            "invalid_per_page",
            "per_page must be between 1 and 50",
        )),
        Some(value) if value > MAX_SEARCH_PAGE_SIZE => Err(AppError::bad_request(
            "invalid_per_page",
            "per_page must be between 1 and 50",
        )),
        other => Ok(other),
    }
}

pub fn normalize_url(url: Option<String>) -> Result<Option<String>, AppError> {
    let Some(value) = normalize_text(url) else {
        return Ok(None);
    };

    if !(value.starts_with("http://") || value.starts_with("https://")) {
        return Err(AppError::bad_request(
            "invalid_url",
            "url must be an absolute http or https URL",
        ));
    }

    Ok(Some(value))
}

/// Parses the numeric id segment of an `mcp://{kind}/{id}` URI.
pub fn parse_resource_id(raw: &str, label: &'static str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AppError::bad_request("invalid_id", format!("Invalid {label} ID: {raw}")))
}
