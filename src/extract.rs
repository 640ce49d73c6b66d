//! Capturing values from a finished test for use as variables later on.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ExtractError;
use crate::testing::Test;

fn response_body(test: &Test) -> Result<String, ExtractError> {
    test.response
        .as_ref()
        .map(|response| response.body_str())
        .ok_or_else(|| ExtractError::NotFound("no response".to_string()))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "extractor")]
pub enum Extractor {
    /// A regular expression match on the body. `submatch` 0 is the whole
    /// match, higher values select capture groups.
    BodyExtractor {
        regexp: String,
        #[serde(default)]
        submatch: usize,
    },
    /// First value of a response header.
    HeaderExtractor { header: String },
    /// Element of a JSON body addressed by a dotted path; numeric segments
    /// index arrays (`items.0.id`).
    #[serde(rename = "JSONExtractor")]
    JsonExtractor { element: String },
    /// Value of a cookie set by the response.
    CookieExtractor { name: String },
}

impl Extractor {
    pub fn extract(&self, test: &Test) -> Result<String, ExtractError> {
        match self {
            Extractor::BodyExtractor { regexp, submatch } => {
                let re = Regex::new(regexp)
                    .map_err(|err| ExtractError::Malformed(format!("regexp `{regexp}`: {err}")))?;
                let body = response_body(test)?;
                let captures = re
                    .captures(&body)
                    .ok_or_else(|| ExtractError::NotFound(format!("no match for `{regexp}`")))?;
                captures
                    .get(*submatch)
                    .map(|m| m.as_str().to_string())
                    .ok_or_else(|| {
                        ExtractError::Malformed(format!(
                            "`{regexp}` has no submatch {submatch}"
                        ))
                    })
            }
            Extractor::HeaderExtractor { header } => test
                .response
                .as_ref()
                .and_then(|response| response.header_value(header))
                .map(str::to_string)
                .ok_or_else(|| ExtractError::NotFound(format!("header {header}"))),
            Extractor::JsonExtractor { element } => {
                let body = response_body(test)?;
                let document: Value = serde_json::from_str(&body)
                    .map_err(|err| ExtractError::NotFound(format!("body is not JSON: {err}")))?;
                let found = lookup_element(&document, element)
                    .ok_or_else(|| ExtractError::NotFound(format!("element {element}")))?;
                Ok(match found {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            }
            Extractor::CookieExtractor { name } => test
                .response
                .as_ref()
                .into_iter()
                .flat_map(|response| response.header_values("set-cookie"))
                .filter_map(|cookie| cookie.split(';').next()?.split_once('='))
                .find(|(cookie_name, _)| cookie_name.trim() == name)
                .map(|(_, value)| value.trim().trim_matches('"').to_string())
                .ok_or_else(|| ExtractError::NotFound(format!("cookie {name}"))),
        }
    }
}

fn lookup_element<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(document);
    }
    path.split('.').try_fold(document, |current, segment| match current {
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        Value::Object(fields) => fields.get(segment),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Response;
    use http::HeaderName;
    use http::header::SET_COOKIE;

    fn test_with(response: Response) -> Test {
        Test {
            response: Some(response),
            ..Default::default()
        }
    }

    #[test]
    fn body_extractor_uses_submatch() {
        let test = test_with(Response::synthetic(200, "OK", "token=abc123; rest"));
        let whole = Extractor::BodyExtractor {
            regexp: "token=([a-z0-9]+)".into(),
            submatch: 0,
        };
        let group = Extractor::BodyExtractor {
            regexp: "token=([a-z0-9]+)".into(),
            submatch: 1,
        };
        assert_eq!(whole.extract(&test).unwrap(), "token=abc123");
        assert_eq!(group.extract(&test).unwrap(), "abc123");
    }

    #[test]
    fn json_extractor_walks_objects_and_arrays() {
        let test = test_with(Response::synthetic(
            200,
            "OK",
            r#"{"items": [{"id": 7, "name": "a"}], "ok": true}"#,
        ));
        let id = Extractor::JsonExtractor {
            element: "items.0.id".into(),
        };
        let name = Extractor::JsonExtractor {
            element: "items.0.name".into(),
        };
        let missing = Extractor::JsonExtractor {
            element: "items.3".into(),
        };
        assert_eq!(id.extract(&test).unwrap(), "7");
        assert_eq!(name.extract(&test).unwrap(), "a");
        assert!(matches!(missing.extract(&test), Err(ExtractError::NotFound(_))));
    }

    #[test]
    fn header_and_cookie_extractors() {
        let test = test_with(
            Response::synthetic(200, "OK", "")
                .with_header(HeaderName::from_static("x-request-id"), "r-1")
                .with_header(SET_COOKIE, "theme=dark; Path=/")
                .with_header(SET_COOKIE, "session=s3cr3t; HttpOnly"),
        );
        let header = Extractor::HeaderExtractor {
            header: "X-Request-Id".into(),
        };
        let cookie = Extractor::CookieExtractor {
            name: "session".into(),
        };
        assert_eq!(header.extract(&test).unwrap(), "r-1");
        assert_eq!(cookie.extract(&test).unwrap(), "s3cr3t");
    }

    #[test]
    fn extractors_serialize_with_tag() {
        let extractor: Extractor =
            serde_json::from_str(r#"{"extractor": "JSONExtractor", "element": "a.b"}"#).unwrap();
        assert_eq!(
            extractor,
            Extractor::JsonExtractor {
                element: "a.b".into()
            }
        );
    }
}
