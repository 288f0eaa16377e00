//! Utility functions for keys, file names and dates

use chrono::{DateTime, NaiveDate};
use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Fallback extension for documents whose URL has none
pub const DEFAULT_EXTENSION: &str = ".pdf";

// Patterns are literals; compilation cannot fail at runtime
#[allow(clippy::unwrap_used)]
static UNIVERSAL_INVALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"|?*\\\x00-\x1f\x7f]"#).unwrap());

#[allow(clippy::unwrap_used)]
static POSIX_INVALID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1f\x7f]").unwrap());

#[allow(clippy::unwrap_used)]
static WINDOWS_RESERVED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(con|prn|aux|nul|com[1-9]|lpt[1-9])(\..*)?$").unwrap());

/// Deduplication key of a document: its URL without query string
///
/// Signed download URLs carry a fresh signature on every request, so only the
/// part before `?` identifies the document.
pub fn canonical_key(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// File extension (with leading dot) of the document behind `url`
pub fn document_extension(url: &str) -> String {
    let base = canonical_key(url);
    let path = url::Url::parse(base)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| base.to_string());
    let name = path.rsplit('/').next().unwrap_or_default();

    match name.rfind('.') {
        Some(idx) if idx > 0 => {
            let ext = &name[idx + 1..];
            if (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
                format!(".{ext}")
            } else {
                DEFAULT_EXTENSION.to_string()
            }
        }
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// Parse a date as shown in the app ("01.02.2024", "01.02.24" or "2024-02-01")
pub fn parse_display_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    // %Y accepts two-digit years, so the short form has to be picked by length
    let formats: &[&str] = if text.len() == 8 {
        &["%d.%m.%y"]
    } else {
        &["%d.%m.%Y", "%Y-%m-%d"]
    };
    formats
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// UTC date-time of a millisecond timestamp
pub fn timestamp_to_datetime(millis: i64) -> Option<DateTime<chrono::Utc>> {
    DateTime::from_timestamp_millis(millis)
}

/// `YYYY-MM-DD` of a millisecond timestamp, empty when out of range
pub fn iso_date(millis: i64) -> String {
    timestamp_to_datetime(millis)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Values substituted into a file name template
#[derive(Clone, Debug, Default)]
pub struct FilenameVars<'a> {
    /// Document date, `YYYY-MM-DD`
    pub iso_date: &'a str,
    /// ` HH-MM` or empty
    pub time: &'a str,
    /// Document title
    pub title: &'a str,
    /// ` (n)` or empty
    pub doc_num: &'a str,
    /// Event subtitle
    pub subtitle: &'a str,
    /// Document id
    pub id: &'a str,
}

impl FilenameVars<'_> {
    fn lookup(&self, name: &str) -> Option<&str> {
        match name {
            "iso_date" => Some(self.iso_date),
            "time" => Some(self.time),
            "title" => Some(self.title),
            "doc_num" => Some(self.doc_num),
            "subtitle" => Some(self.subtitle),
            "id" => Some(self.id),
            _ => None,
        }
    }
}

/// Render a file name template and sanitize the result into a relative path
///
/// `/` inside a variable value never creates a directory; `/` in the template does.
pub fn render_filename(format: &str, vars: &FilenameVars<'_>, universal: bool) -> PathBuf {
    let mut rendered = String::with_capacity(format.len() + 32);
    let mut rest = format;

    while let Some(start) = rest.find('{') {
        rendered.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match vars.lookup(name) {
                    Some(value) => rendered.push_str(&value.replace(['/', '\\'], "-")),
                    None => {
                        rendered.push('{');
                        rendered.push_str(name);
                        rendered.push('}');
                    }
                }
                rest = &after[end + 1..];
            }
            None => {
                rendered.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    rendered.push_str(rest);

    sanitize_path(Path::new(&rendered), universal)
}

/// Sanitize every component of a relative path
///
/// Control characters are always removed and `.`/`..`/root components are
/// dropped. With `universal`, characters invalid on Windows are replaced,
/// trailing dots and spaces are trimmed and reserved device names are suffixed.
pub fn sanitize_path(path: &Path, universal: bool) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        if let Component::Normal(part) = component {
            let name = sanitize_component(&part.to_string_lossy(), universal);
            if !name.is_empty() {
                out.push(name);
            }
        }
    }
    if out.as_os_str().is_empty() {
        out.push("unnamed");
    }
    out
}

fn sanitize_component(name: &str, universal: bool) -> String {
    if universal {
        let replaced = UNIVERSAL_INVALID.replace_all(name, "_");
        let trimmed = replaced.trim().trim_end_matches(['.', ' ']).to_string();
        if WINDOWS_RESERVED.is_match(&trimmed) {
            format!("{trimmed}_")
        } else {
            trimmed
        }
    } else {
        POSIX_INVALID.replace_all(name, "").trim().to_string()
    }
}

/// Replace characters that would break a `;`-separated, unquoted CSV field
pub fn csv_field(text: &str) -> String {
    text.replace([';', '\n', '\r'], " ").trim().to_string()
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_strips_query() {
        assert_eq!(canonical_key("https://x/doc?sig=abc"), "https://x/doc");
        assert_eq!(canonical_key("https://x/doc?x=1&y=2"), "https://x/doc");
        assert_eq!(canonical_key("https://x/doc"), "https://x/doc");
    }

    #[test]
    fn extension_comes_from_url_path() {
        assert_eq!(document_extension("https://x/a/b/invoice.pdf?sig=1.2"), ".pdf");
        assert_eq!(document_extension("https://x/a/statement.csv"), ".csv");
        assert_eq!(document_extension("https://x/a/no-extension"), ".pdf");
        assert_eq!(document_extension("https://x.example.com/"), ".pdf");
        assert_eq!(document_extension("https://x/a/weird.ext-with-dash"), ".pdf");
    }

    #[test]
    fn display_dates_in_all_app_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(parse_display_date("01.02.2024"), Some(expected));
        assert_eq!(parse_display_date("01.02.24"), Some(expected));
        assert_eq!(parse_display_date(" 2024-02-01 "), Some(expected));
        assert_eq!(parse_display_date("yesterday"), None);
    }

    #[test]
    fn iso_date_of_timestamp() {
        assert_eq!(iso_date(1_700_000_000_000), "2023-11-14");
    }

    #[test]
    fn render_default_template() {
        let vars = FilenameVars {
            iso_date: "2024-02-01",
            time: " 10-15",
            title: "Invoice",
            doc_num: " (2)",
            subtitle: "Buy order",
            id: "d1",
        };
        let path = render_filename("{iso_date}{time} {title}{doc_num}", &vars, false);
        assert_eq!(path, PathBuf::from("2024-02-01 10-15 Invoice (2)"));
    }

    #[test]
    fn slash_in_value_does_not_create_directories() {
        let vars = FilenameVars {
            title: "Statement 01/2024",
            ..Default::default()
        };
        let path = render_filename("{title}", &vars, false);
        assert_eq!(path, PathBuf::from("Statement 01-2024"));

        let vars = FilenameVars {
            title: "a",
            id: "b",
            ..Default::default()
        };
        let path = render_filename("{title}/{id}", &vars, false);
        assert_eq!(path, PathBuf::from("a").join("b"));
    }

    #[test]
    fn unknown_placeholders_are_kept_verbatim() {
        let vars = FilenameVars {
            title: "x",
            ..Default::default()
        };
        let path = render_filename("{title} {isin}", &vars, false);
        assert_eq!(path, PathBuf::from("x {isin}"));
    }

    #[test]
    fn universal_sanitization_replaces_windows_invalid_chars() {
        assert_eq!(
            sanitize_path(Path::new("What? <Dividend>: \"A|B\"*."), true),
            PathBuf::from("What_ _Dividend__ _A_B__")
        );
        assert_eq!(sanitize_path(Path::new("CON"), true), PathBuf::from("CON_"));
        assert_eq!(sanitize_path(Path::new("What? x"), false), PathBuf::from("What? x"));
    }

    #[test]
    fn traversal_components_are_dropped() {
        assert_eq!(
            sanitize_path(Path::new("../../etc/passwd"), false),
            PathBuf::from("etc").join("passwd")
        );
        assert_eq!(sanitize_path(Path::new(".."), false), PathBuf::from("unnamed"));
    }

    #[test]
    fn csv_field_removes_separators() {
        assert_eq!(csv_field("Rent; March\n"), "Rent  March");
    }
}
