//! End-to-end runs against a local HTTP server.

use std::io::{Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use checkman::check::{Body, Check, ContentType, Header, Redirect, StatusCode};
use checkman::extract::Extractor;
use checkman::http::{Cookie, HttpMethod, ParamsAs, Request};
use checkman::{Collection, Condition, EngineConfig, Status, Suite, Test, TestError, TransportError};
use flate2::Compression;
use flate2::write::GzEncoder;
use reqwest::cookie::Jar;
use tiny_http::{Header as ServerHeader, Response, Server};

fn header_value(request: &tiny_http::Request, name: &'static str) -> String {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
        .unwrap_or_default()
}

fn gzipped(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).unwrap();
    encoder.finish().unwrap()
}

/// Serve a few fixed routes on an ephemeral port and return the base URL.
fn spawn_server() -> String {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let flaky_calls = Arc::new(AtomicUsize::new(0));

    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let cookie = header_value(&request, "Cookie");
            let content_type = header_value(&request, "Content-Type");
            let mut body = String::new();
            let _ = request.as_reader().read_to_string(&mut body);
            let path = request.url().split('?').next().unwrap_or_default().to_string();

            let response = match path.as_str() {
                "/flaky" => {
                    if flaky_calls.fetch_add(1, Ordering::SeqCst) < 3 {
                        Response::from_string("not yet").with_status_code(500)
                    } else {
                        Response::from_string("ready")
                    }
                }
                "/redirect" => Response::from_string("")
                    .with_status_code(302)
                    .with_header(ServerHeader::from_bytes("Location", "/target").unwrap()),
                "/target" => Response::from_string("arrived"),
                "/login" => Response::from_data(b"{\"token\": \"t-42\"}".to_vec())
                    .with_header(ServerHeader::from_bytes("Set-Cookie", "session=abc; Path=/").unwrap())
                    .with_header(ServerHeader::from_bytes("Content-Type", "application/json").unwrap()),
                "/whoami" => Response::from_string(format!("cookie={cookie}")),
                "/echo" => Response::from_string(format!(
                    "{} {} [{content_type}] {body}",
                    request.method(),
                    request.url()
                )),
                "/gzip" => Response::from_data(gzipped("compressed greetings"))
                    .with_header(ServerHeader::from_bytes("Content-Encoding", "gzip").unwrap()),
                hop if hop.starts_with("/hop/") => {
                    let left: u32 = hop["/hop/".len()..].parse().unwrap_or(0);
                    if left == 0 {
                        Response::from_string("landed")
                    } else {
                        let next = format!("/hop/{}", left - 1);
                        Response::from_string("")
                            .with_status_code(302)
                            .with_header(ServerHeader::from_bytes("Location", next).unwrap())
                    }
                }
                "/slow" => {
                    thread::sleep(Duration::from_millis(600));
                    Response::from_string("late")
                }
                _ => Response::from_string("not found").with_status_code(404),
            };
            let _ = request.respond(response);
        }
    });

    format!("http://{addr}")
}

fn get(name: &str, url: String) -> Test {
    Test::new(
        name,
        Request {
            url,
            ..Default::default()
        },
    )
}

fn status(expect: u16) -> Check {
    Check::StatusCode(StatusCode { expect })
}

fn body_contains(needle: &str) -> Check {
    Check::Body(Body {
        condition: Condition::contains(needle, 1),
    })
}

#[tokio::test]
async fn polls_until_the_server_recovers() {
    let base = spawn_server();
    let mut test = get("flaky", format!("{base}/flaky"));
    test.poll.max = 4;
    test.checks = vec![status(200), body_contains("ready")];

    assert_eq!(test.run().await, Ok(()));
    assert_eq!(test.status, Status::Pass);
    assert_eq!(test.tries, 4);
    assert!(test.check_results.iter().all(|r| r.status == Status::Pass));
}

#[tokio::test]
async fn followed_redirects_are_recorded() {
    let base = spawn_server();
    let mut test = get("follow", format!("{base}/redirect"));
    test.request.follow_redirects = true;
    test.checks = vec![
        status(200),
        body_contains("arrived"),
        Check::Redirect(Redirect {
            to: format!("{base}/target"),
            status_code: 0,
        }),
    ];

    test.run().await.unwrap();
    assert_eq!(test.status, Status::Pass, "{:?}", test.error);
    let response = test.response.as_ref().unwrap();
    assert_eq!(response.redirections, vec![format!("{base}/target")]);
}

#[tokio::test]
async fn unfollowed_redirect_is_not_an_error() {
    let base = spawn_server();
    let mut test = get("no follow", format!("{base}/redirect"));
    test.checks = vec![
        status(302),
        Check::Redirect(Redirect {
            to: format!("{base}/target"),
            status_code: 302,
        }),
    ];

    test.run().await.unwrap();
    assert_eq!(test.status, Status::Pass, "{:?}", test.error);
}

#[tokio::test]
async fn collection_shares_cookies_between_tests() {
    let base = spawn_server();
    let mut login = get("login", format!("{base}/login"));
    login.checks = vec![status(200)];
    let mut whoami = get("whoami", format!("{base}/whoami"));
    whoami.checks = vec![body_contains("session=abc")];

    let mut collection = Collection::new(vec![login, whoami]).with_jar(Arc::new(Jar::default()));
    assert_eq!(collection.execute(1).await, Status::Pass, "{:?}", collection.error);
}

#[tokio::test]
async fn explicit_cookies_are_sent() {
    let base = spawn_server();
    let mut test = get("cookies", format!("{base}/whoami"));
    test.request.cookies = vec![Cookie {
        name: "flavour".into(),
        value: "oat".into(),
    }];
    test.checks = vec![body_contains("cookie=flavour=oat")];

    test.run().await.unwrap();
    assert_eq!(test.status, Status::Pass, "{:?}", test.error);
}

#[tokio::test]
async fn form_parameters_are_posted_in_the_body() {
    let base = spawn_server();
    let mut test = get("form", format!("{base}/echo"));
    test.request.method = HttpMethod::Post;
    test.request.params_as = ParamsAs::Body;
    test.request.params = [
        ("a".to_string(), vec!["1".to_string()]),
        ("b".to_string(), vec!["x y".to_string()]),
    ]
    .into();
    test.checks = vec![body_contains("POST /echo [application/x-www-form-urlencoded] a=1&b=x+y")];

    test.run().await.unwrap();
    assert_eq!(test.status, Status::Pass, "{:?}", test.error);
}

#[tokio::test]
async fn url_parameters_and_variables_reach_the_server() {
    let base = spawn_server();
    let mut test = get("query", "{{base}}/echo".to_string());
    test.variables.insert("base".into(), base);
    test.request.params = [("q".to_string(), vec!["{{term}}".to_string()])].into();
    test.variables.insert("term".into(), "rust".into());
    test.checks = vec![status(200), body_contains("GET /echo?q=rust")];

    test.run().await.unwrap();
    assert_eq!(test.status, Status::Pass, "{:?}", test.error);
}

#[tokio::test]
async fn request_timeout_is_a_transport_error() {
    let base = spawn_server();
    let mut test = get("slow", format!("{base}/slow"));
    test.request.timeout_ms = Some(100);
    test.checks = vec![status(200)];

    assert_eq!(test.run().await, Ok(()));
    assert_eq!(test.status, Status::Error);
    assert!(matches!(
        test.error,
        Some(TestError::Transport(TransportError::Timeout(100)))
    ));
}

#[tokio::test]
async fn suite_extracts_and_keeps_cookies() {
    let base = spawn_server();
    let mut login = get("login", format!("{base}/login"));
    login.checks = vec![
        status(200),
        Check::ContentType(ContentType {
            is: "json".into(),
            charset: String::new(),
        }),
        Check::Header(Header {
            header: "Set-Cookie".into(),
            condition: Condition {
                prefix: "session=".into(),
                ..Default::default()
            },
            absent: false,
        }),
    ];
    login.data_extraction.insert(
        "TOKEN".into(),
        Extractor::JsonExtractor {
            element: "token".into(),
        },
    );

    let mut echo = get("echo", format!("{base}/echo?token={{{{TOKEN}}}}"));
    echo.checks = vec![body_contains("token=t-42")];
    let mut whoami = get("whoami", format!("{base}/whoami"));
    whoami.checks = vec![body_contains("session=abc")];

    let mut suite = Suite {
        name: "login flow".into(),
        setup: vec![login],
        main: vec![echo, whoami],
        keep_cookies: true,
        ..Default::default()
    };
    suite.set_config(Arc::new(EngineConfig::default()));

    assert_eq!(suite.execute().await, Status::Pass, "{:?}", suite.error);
}

#[tokio::test]
async fn ten_redirects_are_followed() {
    let base = spawn_server();
    let mut test = get("ten hops", format!("{base}/hop/10"));
    test.request.follow_redirects = true;
    test.checks = vec![status(200), body_contains("landed")];

    test.run().await.unwrap();
    assert_eq!(test.status, Status::Pass, "{:?}", test.error);
    assert_eq!(test.response.as_ref().unwrap().redirections.len(), 10);
}

#[tokio::test]
async fn eleventh_redirect_is_a_transport_error() {
    let base = spawn_server();
    let mut test = get("eleven hops", format!("{base}/hop/11"));
    test.request.follow_redirects = true;
    test.checks = vec![status(200)];

    assert_eq!(test.run().await, Ok(()));
    assert_eq!(test.status, Status::Error);
    assert!(
        matches!(test.error, Some(TestError::Transport(_))),
        "{:?}",
        test.error
    );
}

#[tokio::test]
async fn gzip_bodies_are_decoded() {
    let base = spawn_server();
    let mut test = get("gzip", format!("{base}/gzip"));
    test.checks = vec![
        status(200),
        Check::Body(Body {
            condition: Condition {
                equals: Some("compressed greetings".into()),
                ..Default::default()
            },
        }),
    ];

    test.run().await.unwrap();
    assert_eq!(test.status, Status::Pass, "{:?}", test.error);
}

#[tokio::test]
async fn length_and_regexp_conditions_apply_end_to_end() {
    let base = spawn_server();
    let mut test = get("hop count", format!("{base}/hop/0"));
    test.checks = vec![Check::Body(Body {
        condition: Condition {
            min: 6,
            max: 6,
            regexp: "^l".into(),
            ..Default::default()
        },
    })];

    test.run().await.unwrap();
    assert_eq!(test.status, Status::Pass, "{:?}", test.error);
}
