//! Query-parameter parsing with per-field issue collection.
//!
//! Invalid values never 500: every field failure lands in the `issues`
//! map and the handler answers 400 with all of them at once.

use chrono::{DateTime, Utc};
use registry_model::ServerKind;
use serde_json::{Map, Value};

pub(crate) type Issues = Map<String, Value>;

fn note(issues: &mut Issues, field: &str, message: impl Into<String>) {
    issues.insert(field.to_string(), Value::String(message.into()));
}

pub(crate) fn parse_limit(
    raw: Option<&str>,
    default: usize,
    max: usize,
    issues: &mut Issues,
) -> usize {
    let Some(raw) = raw else {
        return default;
    };
    match raw.parse::<usize>() {
        Ok(v) if (1..=max).contains(&v) => v,
        _ => {
            note(issues, "limit", format!("must be an integer between 1 and {max}"));
            default
        }
    }
}

pub(crate) fn parse_bool(raw: Option<&str>, field: &str, issues: &mut Issues) -> Option<bool> {
    match raw {
        None => None,
        Some("true") => Some(true),
        Some("false") => Some(false),
        Some(_) => {
            note(issues, field, "must be \"true\" or \"false\"");
            None
        }
    }
}

pub(crate) fn parse_u32(raw: Option<&str>, field: &str, issues: &mut Issues) -> Option<u32> {
    match raw {
        None => None,
        Some(raw) => match raw.parse::<u32>() {
            Ok(v) => Some(v),
            Err(_) => {
                note(issues, field, "must be a non-negative integer");
                None
            }
        },
    }
}

pub(crate) fn parse_server_kind(
    raw: Option<&str>,
    issues: &mut Issues,
) -> Option<ServerKind> {
    match raw {
        None => None,
        Some(raw) => match raw.parse::<ServerKind>() {
            Ok(kind) => Some(kind),
            Err(()) => {
                note(
                    issues,
                    "serverKind",
                    "must be one of retriever, evaluator, indexer, router, other",
                );
                None
            }
        },
    }
}

pub(crate) fn parse_transport(raw: Option<&str>, issues: &mut Issues) -> Option<String> {
    match raw {
        None => None,
        Some(t @ ("stdio" | "streamable-http")) => Some(t.to_string()),
        Some(_) => {
            note(issues, "transport", "must be \"stdio\" or \"streamable-http\"");
            None
        }
    }
}

pub(crate) fn parse_rfc3339(
    raw: Option<&str>,
    field: &str,
    issues: &mut Issues,
) -> Option<DateTime<Utc>> {
    match raw {
        None => None,
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(_) => {
                note(issues, field, "must be an RFC3339 timestamp");
                None
            }
        },
    }
}

/// Comma-separated category tags, trimmed, empty segments dropped.
pub(crate) fn parse_categories(raw: Option<&str>) -> Vec<String> {
    raw.map(|raw| {
        raw.split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_rejects_zero_and_overflow() {
        let mut issues = Issues::new();
        assert_eq!(parse_limit(Some("25"), 10, 50, &mut issues), 25);
        assert!(issues.is_empty());

        parse_limit(Some("0"), 10, 50, &mut issues);
        assert!(issues.contains_key("limit"));

        let mut issues = Issues::new();
        parse_limit(Some("51"), 10, 50, &mut issues);
        assert!(issues.contains_key("limit"));

        let mut issues = Issues::new();
        parse_limit(Some("many"), 10, 50, &mut issues);
        assert!(issues.contains_key("limit"));
    }

    #[test]
    fn bools_and_kinds_validate() {
        let mut issues = Issues::new();
        assert_eq!(parse_bool(Some("true"), "reachable", &mut issues), Some(true));
        assert_eq!(parse_bool(None, "reachable", &mut issues), None);
        parse_bool(Some("yes"), "reachable", &mut issues);
        assert!(issues.contains_key("reachable"));

        let mut issues = Issues::new();
        assert_eq!(
            parse_server_kind(Some("retriever"), &mut issues),
            Some(registry_model::ServerKind::Retriever)
        );
        parse_server_kind(Some("oracle"), &mut issues);
        assert!(issues.contains_key("serverKind"));
    }

    #[test]
    fn categories_split_and_trim() {
        assert_eq!(
            parse_categories(Some("rag, retrieval ,,search")),
            ["rag", "retrieval", "search"]
        );
        assert!(parse_categories(None).is_empty());
    }
}
