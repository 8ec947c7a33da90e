use crate::utils::error::{Result, WatchError};
use regex::Regex;
use std::sync::LazyLock;
use url::Url;

static POSTCODE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Z]{1,2}[0-9][A-Z0-9]? ?[0-9][A-Z]{2}$").expect("postcode pattern compiles")
});

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 去除前後空白並轉大寫
pub fn canonicalize_postcode(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// 檢查已經正規化的郵遞區號是否符合英國格式
pub fn is_valid_postcode(canonical: &str) -> bool {
    POSTCODE_PATTERN.is_match(canonical)
}

pub fn validate_postcode(raw: &str) -> Result<String> {
    let canonical = canonicalize_postcode(raw);
    if canonical.is_empty() {
        return Err(WatchError::validation("postcode cannot be empty"));
    }
    if !is_valid_postcode(&canonical) {
        return Err(WatchError::validation(format!(
            "'{}' is not a valid UK postcode",
            raw.trim()
        )));
    }
    Ok(canonical)
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(WatchError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(WatchError::InvalidConfigValue {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(WatchError::InvalidConfigValue {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.trim().is_empty() {
        return Err(WatchError::InvalidConfigValue {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(WatchError::InvalidConfigValue {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_positive_number(field_name: &str, value: u64, min_value: u64) -> Result<()> {
    if value < min_value {
        return Err(WatchError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be at least {}", min_value),
        });
    }
    Ok(())
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| WatchError::MissingConfig {
        field: field_name.to_string(),
    })
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    // NaN 比較永遠為 false，所以用反向判斷
    if !(value >= min && value <= max) {
        return Err(WatchError::InvalidConfigValue {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}
