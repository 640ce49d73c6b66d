//! Name lookup for check variants.
//!
//! Each variant is registered once under its canonical name together with a
//! zero-value prototype and a decoder for its fields.

use serde_json::{Map, Value};

use super::{AnyOne, Body, Check, ContentType, Header, NoServerError, NoneOf, Redirect, ResponseTime, StatusCode};
use crate::error::RegistryError;

/// Name of the discriminator field in serialized checks.
pub const DISCRIMINATOR: &str = "check";

const MAX_SUGGESTIONS: usize = 3;

pub struct Registration {
    pub name: &'static str,
    pub prototype: fn() -> Check,
    decode: fn(Value) -> Result<Check, serde_json::Error>,
}

static REGISTRY: [Registration; 9] = [
    Registration {
        name: "AnyOne",
        prototype: || Check::AnyOne(AnyOne::default()),
        decode: |v| serde_json::from_value(v).map(Check::AnyOne),
    },
    Registration {
        name: "Body",
        prototype: || Check::Body(Body::default()),
        decode: |v| serde_json::from_value(v).map(Check::Body),
    },
    Registration {
        name: "ContentType",
        prototype: || Check::ContentType(ContentType::default()),
        decode: |v| serde_json::from_value(v).map(Check::ContentType),
    },
    Registration {
        name: "Header",
        prototype: || Check::Header(Header::default()),
        decode: |v| serde_json::from_value(v).map(Check::Header),
    },
    Registration {
        name: "NoServerError",
        prototype: || Check::NoServerError(NoServerError::default()),
        decode: |v| serde_json::from_value(v).map(Check::NoServerError),
    },
    Registration {
        name: "None",
        prototype: || Check::None(NoneOf::default()),
        decode: |v| serde_json::from_value(v).map(Check::None),
    },
    Registration {
        name: "Redirect",
        prototype: || Check::Redirect(Redirect::default()),
        decode: |v| serde_json::from_value(v).map(Check::Redirect),
    },
    Registration {
        name: "ResponseTime",
        prototype: || Check::ResponseTime(ResponseTime::default()),
        decode: |v| serde_json::from_value(v).map(Check::ResponseTime),
    },
    Registration {
        name: "StatusCode",
        prototype: || Check::StatusCode(StatusCode::default()),
        decode: |v| serde_json::from_value(v).map(Check::StatusCode),
    },
];

/// Canonical names of all registered checks, sorted.
pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|registration| registration.name)
}

/// Resolve a check name: exact match first, then a case-insensitive match,
/// then a unique case-insensitive prefix.
pub fn lookup(name: &str) -> Result<&'static Registration, RegistryError> {
    if let Some(registration) = REGISTRY.iter().find(|r| r.name == name) {
        return Ok(registration);
    }
    if let Some(registration) = REGISTRY.iter().find(|r| r.name.eq_ignore_ascii_case(name)) {
        return Ok(registration);
    }

    let lowered = name.to_ascii_lowercase();
    let prefixed: Vec<&Registration> = if lowered.is_empty() {
        Vec::new()
    } else {
        REGISTRY
            .iter()
            .filter(|r| r.name.to_ascii_lowercase().starts_with(&lowered))
            .collect()
    };
    match prefixed.as_slice() {
        [single] => Ok(single),
        [] => Err(RegistryError::Unknown {
            name: name.to_string(),
            suggestions: suggestions(&lowered),
        }),
        many => Err(RegistryError::Ambiguous {
            name: name.to_string(),
            candidates: many.iter().map(|r| r.name.to_string()).collect(),
        }),
    }
}

/// Zero value of the named check.
pub fn prototype(name: &str) -> Result<Check, RegistryError> {
    lookup(name).map(|registration| (registration.prototype)())
}

/// Decode one serialized check.
pub fn decode(value: Value) -> Result<Check, RegistryError> {
    let mut fields: Map<String, Value> = match value {
        Value::Object(fields) => fields,
        _ => return Err(RegistryError::MissingDiscriminator),
    };
    let name = match fields.remove(DISCRIMINATOR) {
        Some(Value::String(name)) => name,
        _ => return Err(RegistryError::MissingDiscriminator),
    };
    let registration = lookup(&name)?;
    (registration.decode)(Value::Object(fields)).map_err(|err| RegistryError::Decode {
        name: registration.name.to_string(),
        reason: err.to_string(),
    })
}

fn suggestions(lowered: &str) -> Vec<String> {
    let threshold = (lowered.chars().count() / 2).max(2);
    let mut ranked: Vec<(usize, &str)> = REGISTRY
        .iter()
        .map(|r| (levenshtein(lowered, &r.name.to_ascii_lowercase()), r.name))
        .filter(|(distance, _)| *distance <= threshold)
        .collect();
    ranked.sort();
    ranked
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, name)| name.to_string())
        .collect()
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }
    previous[b.len()]
}
