use std::collections::BTreeMap;

use jiff::Timestamp;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, Time};

pub const NOT_AVAILABLE: &str = "N/A";
pub const UNKNOWN: &str = "Unknown";
pub const NONE: &str = "<none>";

/// Formats whole seconds the way Go prints a `time.Duration`: `72h0m0s`,
/// `5m3s`, `0s`.
pub fn go_duration(total_secs: i64) -> String {
    let sign = if total_secs < 0 { "-" } else { "" };
    let total = total_secs.unsigned_abs();
    let hours = total / 3600;
    let mins = (total % 3600) / 60;
    let secs = total % 60;

    if hours > 0 {
        format!("{sign}{hours}h{mins}m{secs}s")
    } else if mins > 0 {
        format!("{sign}{mins}m{secs}s")
    } else {
        format!("{sign}{secs}s")
    }
}

/// The API's `Time` as a jiff instant; `None` outside jiff's supported range.
pub fn instant(time: &Time) -> Option<Timestamp> {
    let nanos = i32::try_from(time.0.timestamp_subsec_nanos()).ok()?;
    Timestamp::new(time.0.timestamp(), nanos).ok()
}

/// Age of an object relative to `now`, rounded to the nearest hour.
pub fn age(created: Option<&Time>, now: Timestamp) -> String {
    let Some(created) = created.and_then(instant) else {
        return UNKNOWN.to_string();
    };
    let secs = now.duration_since(created).as_secs().max(0);
    let rounded = (secs + 1800) / 3600 * 3600;
    go_duration(rounded)
}

/// Unrounded elapsed time between two instants; negative skew yields `0s`.
pub fn elapsed(from: Timestamp, to: Timestamp) -> String {
    go_duration(to.duration_since(from).as_secs().max(0))
}

pub fn timestamp_or(time: Option<&Time>, sentinel: &str) -> String {
    time.and_then(instant)
        .map(|t| t.to_string())
        .unwrap_or_else(|| sentinel.to_string())
}

/// `k=v` pairs in key order, joined with `, `.
pub fn join_map(map: Option<&BTreeMap<String, String>>) -> String {
    map.map(|m| {
        m.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(", ")
    })
    .unwrap_or_default()
}

pub fn bracketed<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let inner: Vec<String> = items.into_iter().map(|s| s.as_ref().to_string()).collect();
    format!("[{}]", inner.join(", "))
}

/// Types of the conditions whose status is `True`, comma joined.
pub fn true_conditions<'a, I>(conditions: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    conditions
        .into_iter()
        .filter(|(_, status)| *status == "True")
        .map(|(type_, _)| type_)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders a label selector as `kubectl` does: `app=web,tier in (a,b)`.
pub fn label_selector(selector: Option<&LabelSelector>) -> String {
    let Some(selector) = selector else {
        return NONE.to_string();
    };
    let mut terms: Vec<String> = selector
        .match_labels
        .iter()
        .flatten()
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    for expr in selector.match_expressions.iter().flatten() {
        let values = expr.values.as_deref().unwrap_or_default().join(",");
        terms.push(match expr.operator.as_str() {
            "In" => format!("{} in ({values})", expr.key),
            "NotIn" => format!("{} notin ({values})", expr.key),
            "Exists" => expr.key.clone(),
            "DoesNotExist" => format!("!{}", expr.key),
            other => format!("{} {other} ({values})", expr.key),
        });
    }
    if terms.is_empty() {
        return NONE.to_string();
    }
    terms.join(",")
}

pub fn or_sentinel(value: Option<String>, sentinel: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => sentinel.to_string(),
    }
}

/// Accepts a field whether the API version declares it required or optional.
pub fn opt<T>(value: impl Into<Option<T>>) -> Option<T> {
    value.into()
}

pub fn yes_no(flag: bool) -> String {
    if flag { "Yes" } else { "No" }.to_string()
}
