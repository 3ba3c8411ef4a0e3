//! Custom Askama template filters.

#![allow(clippy::unnecessary_wraps)]

use std::fmt::Display;

/// Returns the current year.
///
/// Usage in templates: `{{ ""|current_year }}`
#[askama::filter_fn]
pub fn current_year(_value: impl Display, _env: &dyn askama::Values) -> askama::Result<i32> {
    use chrono::Datelike;
    Ok(chrono::Utc::now().year())
}

/// Left-pads a number to two digits, as the checkout lines show quantities.
///
/// Usage in templates: `{{ item.quantity()|two_digits }}`
#[askama::filter_fn]
pub fn two_digits(value: impl Display, _env: &dyn askama::Values) -> askama::Result<String> {
    Ok(pad_two(&value.to_string()))
}

fn pad_two(value: &str) -> String {
    format!("{value:0>2}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_two() {
        assert_eq!(pad_two("3"), "03");
        assert_eq!(pad_two("12"), "12");
        assert_eq!(pad_two("120"), "120");
    }
}
