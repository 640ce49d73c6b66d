use std::fmt::Write;
use std::sync::LazyLock;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use regex::Regex;

use super::words;
use crate::error::TemplateError;

pub const DEFAULT_TIME_LAYOUT: &str = "%a, %d %b %Y %H:%M:%S GMT";
const DEFAULT_EMAIL_DOMAIN: &str = "example.org";
const MAX_TEXT_WORDS: u64 = 10_000;
const MAX_NUMBER_WIDTH: usize = 64;

static NOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^NOW\s*(?:([+-])\s*(\d+)\s*([smhd]))?\s*(?:\|\s*"([^"]*)")?\s*$"#)
        .expect("valid NOW regex")
});

static NUMBER_FORMAT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%(0)?(\d*)([dxXo])$").expect("valid format regex"));

pub fn is_now(inner: &str) -> bool {
    match inner.strip_prefix("NOW") {
        Some("") => true,
        Some(rest) => rest.starts_with([' ', '+', '-', '|']),
        None => false,
    }
}

pub fn is_random(inner: &str) -> bool {
    inner == "RANDOM" || inner.starts_with("RANDOM ")
}

pub fn now(inner: &str, now: DateTime<Utc>) -> Result<String, TemplateError> {
    let malformed = |reason: &str| TemplateError::MalformedNow {
        placeholder: inner.to_string(),
        reason: reason.to_string(),
    };

    let caps = NOW_RE
        .captures(inner)
        .ok_or_else(|| malformed("want NOW [+|- <n><s|m|h|d>] [| \"<layout>\"]"))?;

    let mut time = now;
    if let (Some(sign), Some(amount), Some(unit)) = (caps.get(1), caps.get(2), caps.get(3)) {
        let amount: i64 = amount
            .as_str()
            .parse()
            .map_err(|_| malformed("offset out of range"))?;
        let offset = match unit.as_str() {
            "s" => Duration::try_seconds(amount),
            "m" => Duration::try_minutes(amount),
            "h" => Duration::try_hours(amount),
            _ => Duration::try_days(amount),
        }
        .ok_or_else(|| malformed("offset out of range"))?;
        time = if sign.as_str() == "-" {
            time.checked_sub_signed(offset)
        } else {
            time.checked_add_signed(offset)
        }
        .ok_or_else(|| malformed("offset out of range"))?;
    }

    let layout = caps.get(4).map_or(DEFAULT_TIME_LAYOUT, |m| m.as_str());
    let items: Vec<Item<'_>> = StrftimeItems::new(layout).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(malformed("invalid layout"));
    }

    let mut out = String::new();
    write!(out, "{}", time.format_with_items(items.iter()))
        .map_err(|_| malformed("layout cannot be applied"))?;
    Ok(out)
}

pub fn random<R: Rng>(inner: &str, rng: &mut R) -> Result<String, TemplateError> {
    let malformed = |reason: String| TemplateError::MalformedRandom {
        placeholder: inner.to_string(),
        reason,
    };

    let fields: Vec<&str> = inner.split_whitespace().collect();
    match fields.get(1).copied() {
        Some("NUMBER") => random_number(&fields[2..], rng).map_err(malformed),
        Some("TEXT") => random_text(&fields[2..], rng).map_err(malformed),
        Some("EMAIL") => random_email(&fields[2..], rng).map_err(malformed),
        Some(other) => Err(malformed(format!(
            "unknown kind `{other}`, want NUMBER, TEXT or EMAIL"
        ))),
        None => Err(malformed("missing kind".to_string())),
    }
}

fn random_number<R: Rng>(args: &[&str], rng: &mut R) -> Result<String, String> {
    let (range, format) = match args {
        [range] => (*range, None),
        [range, format] => (*range, Some(*format)),
        _ => return Err("want NUMBER <max>|<min>-<max> [<format>]".to_string()),
    };
    let (min, max) = parse_range(range, Some(1))?;
    let value = rng.gen_range(min..=max);

    match format {
        Some(format) => format_number(value, format),
        None => Ok(value.to_string()),
    }
}

fn random_text<R: Rng>(args: &[&str], rng: &mut R) -> Result<String, String> {
    let (lang, range) = match args {
        [range] => ("en", *range),
        [lang, range] => (*lang, *range),
        _ => return Err("want TEXT [<lang>] <n>|<min>-<max>".to_string()),
    };
    let corpus = words::corpus(lang).ok_or_else(|| format!("no word list for language `{lang}`"))?;
    let (min, max) = parse_range(range, None)?;
    if max > MAX_TEXT_WORDS {
        return Err(format!("at most {MAX_TEXT_WORDS} words, got {max}"));
    }
    let count = rng.gen_range(min..=max);

    let text: Vec<&str> = (0..count)
        .map(|_| corpus[rng.gen_range(0..corpus.len())])
        .collect();
    Ok(text.join(" "))
}

fn random_email<R: Rng>(args: &[&str], rng: &mut R) -> Result<String, String> {
    let domain = match args {
        [] => DEFAULT_EMAIL_DOMAIN,
        [domain] => *domain,
        _ => return Err("want EMAIL [<domain>]".to_string()),
    };
    let first = words::FIRST_NAMES[rng.gen_range(0..words::FIRST_NAMES.len())];
    let last = words::LAST_NAMES[rng.gen_range(0..words::LAST_NAMES.len())];
    Ok(format!("{first}.{last}@{domain}"))
}

/// `"<n>"` means `[lower, n]`, or exactly `n` without a lower bound;
/// `"<min>-<max>"` is inclusive on both ends.
fn parse_range(range: &str, lower: Option<u64>) -> Result<(u64, u64), String> {
    let parse = |s: &str| {
        s.parse::<u64>()
            .map_err(|_| format!("`{s}` is not a non-negative integer"))
    };
    let (min, max) = match range.split_once('-') {
        Some((min, max)) => (parse(min)?, parse(max)?),
        None => {
            let n = parse(range)?;
            (lower.unwrap_or(n), n)
        }
    };
    if min > max {
        return Err(format!("empty range {min}-{max}"));
    }
    Ok((min, max))
}

fn format_number(value: u64, format: &str) -> Result<String, String> {
    let caps = NUMBER_FORMAT_RE
        .captures(format)
        .ok_or_else(|| format!("unsupported format `{format}`"))?;
    let zero = caps.get(1).is_some();
    let width: usize = match caps.get(2).map(|m| m.as_str()) {
        Some("") | None => 0,
        Some(width) => width.parse().map_err(|_| format!("bad width in `{format}`"))?,
    };
    if width > MAX_NUMBER_WIDTH {
        return Err(format!("width {width} exceeds {MAX_NUMBER_WIDTH}"));
    }
    let digits = match caps.get(3).map(|m| m.as_str()) {
        Some("x") => format!("{value:x}"),
        Some("X") => format!("{value:X}"),
        Some("o") => format!("{value:o}"),
        _ => value.to_string(),
    };
    Ok(if zero {
        format!("{digits:0>width$}")
    } else {
        format!("{digits:>width$}")
    })
}
