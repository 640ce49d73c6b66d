use std::sync::{Arc, Mutex};
use std::time::Instant;

use reqwest::cookie::Jar;
use reqwest::{Client, Proxy};

use super::compile::{CompiledRequest, Scheme};
use super::response::Response;
use crate::config::EngineConfig;
use crate::error::TransportError;
use crate::pseudo;

/// Perform a compiled request, dispatching on its scheme.
pub async fn perform(
    request: &CompiledRequest,
    jar: Option<Arc<Jar>>,
    config: &EngineConfig,
) -> Result<Response, TransportError> {
    let started = Instant::now();
    let mut response = match request.scheme {
        Scheme::Http | Scheme::Https => send_http_request(request, jar, config).await?,
        Scheme::File => pseudo::file::perform(request).await?,
        Scheme::Bash => pseudo::bash::perform(request).await?,
        Scheme::Sql => pseudo::sql::perform(request).await?,
    };
    response.duration = started.elapsed();
    Ok(response)
}

fn build_client(
    request: &CompiledRequest,
    jar: Option<Arc<Jar>>,
    config: &EngineConfig,
    redirections: Arc<Mutex<Vec<String>>>,
) -> Result<Client, TransportError> {
    let redirect_policy = if request.follow_redirects {
        let limit = config.redirect_limit();
        reqwest::redirect::Policy::custom(move |attempt| {
            if attempt.previous().len() > limit {
                return attempt.error(format!("stopped after {limit} redirects"));
            }
            if let Ok(mut seen) = redirections.lock() {
                seen.push(attempt.url().to_string());
            }
            attempt.follow()
        })
    } else {
        reqwest::redirect::Policy::none()
    };

    let mut builder = Client::builder()
        .gzip(true)
        .redirect(redirect_policy)
        .timeout(request.timeout);

    if let Some(proxy_url) = config
        .proxy_url
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
    {
        let proxy = Proxy::all(proxy_url)
            .map_err(|err| TransportError::Request(format!("invalid proxy URL: {err}")))?;
        builder = builder.proxy(proxy);
    }

    if !config.verify_ssl {
        builder = builder.danger_accept_invalid_certs(true);
    }

    if let Some(jar) = jar {
        builder = builder.cookie_provider(jar);
    }

    builder
        .build()
        .map_err(|err| TransportError::Request(format!("failed to build HTTP client: {err}")))
}

async fn send_http_request(
    request: &CompiledRequest,
    jar: Option<Arc<Jar>>,
    config: &EngineConfig,
) -> Result<Response, TransportError> {
    let redirections = Arc::new(Mutex::new(Vec::new()));
    let client = build_client(request, jar, config, redirections.clone())?;

    let mut builder = client
        .request(request.method.into(), request.url.clone())
        .headers(request.header.clone());

    if !request.body.is_empty() {
        builder = if request.chunked {
            let body = request.body.clone();
            let stream = futures::stream::once(async move { Ok::<_, std::io::Error>(body) });
            builder.body(reqwest::Body::wrap_stream(stream))
        } else {
            builder.body(request.body.clone())
        };
    }

    let response = builder
        .send()
        .await
        .map_err(|err| transport_error(err, request, "cannot send"))?;

    let status = response.status();
    let url = response.url().to_string();
    let header = response.headers().clone();
    let body = response
        .bytes()
        .await
        .map_err(|err| transport_error(err, request, "cannot read response"))?;

    let redirections = redirections
        .lock()
        .map(|seen| seen.clone())
        .unwrap_or_default();

    Ok(Response {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("Unknown").to_string(),
        header,
        body,
        duration: Default::default(),
        redirections,
        url,
    })
}

fn transport_error(err: reqwest::Error, request: &CompiledRequest, context: &str) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(request.timeout.as_millis())
    } else {
        TransportError::Request(format!("{context}: {err}"))
    }
}
