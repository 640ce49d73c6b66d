use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;

use http::HeaderName;
use tokio::process::Command;
use url::Url;

use crate::error::TransportError;
use crate::http::{CompiledRequest, Response};

pub const EXIT_STATUS: &str = "exit-status";

/// The directory a `bash://` URL names, percent-decoded.
pub fn working_dir(url: &Url) -> Option<PathBuf> {
    Url::parse(&format!("file://{}", url.path()))
        .ok()?
        .to_file_path()
        .ok()
        .filter(|path| !path.as_os_str().as_encoded_bytes().contains(&0))
}

/// Run the request body as a bash script inside the URL path.
pub async fn perform(request: &CompiledRequest) -> Result<Response, TransportError> {
    let workdir = working_dir(&request.url).ok_or_else(|| {
        TransportError::Script(format!("{} names no local directory", request.url))
    })?;
    let script_error = |context: &str, err: std::io::Error| {
        TransportError::Script(format!("{context} in {}: {err}", workdir.display()))
    };

    let mut script = tempfile::Builder::new()
        .prefix("checkman-")
        .suffix(".sh")
        .tempfile_in(&workdir)
        .map_err(|err| script_error("cannot create script", err))?;
    script
        .write_all(&request.body)
        .and_then(|_| script.flush())
        .map_err(|err| script_error("cannot write script", err))?;

    let mut command = Command::new("/bin/bash");
    command
        .arg(script.path())
        .current_dir(&workdir)
        .stdin(Stdio::null())
        .kill_on_drop(true);
    for (name, value) in &request.params {
        if name.contains('=') {
            tracing::warn!(variable = %name, "dropping environment variable with '=' in its name");
            continue;
        }
        command.env(name, value);
    }

    let output = match tokio::time::timeout(request.timeout, command.output()).await {
        Ok(output) => output.map_err(|err| script_error("cannot run script", err))?,
        Err(_) => {
            let body = format!("script timed out after {}ms", request.timeout.as_millis());
            return Ok(Response {
                url: request.url.to_string(),
                ..Response::synthetic(408, "Request Timeout", body)
            });
        }
    };

    let mut body = output.stdout;
    body.extend_from_slice(&output.stderr);

    let (status, status_text) = if output.status.success() {
        (200, "OK")
    } else {
        (500, "Internal Server Error")
    };
    let exit_status = output
        .status
        .code()
        .map(|code| code.to_string())
        .unwrap_or_else(|| "signal".to_string());

    Ok(Response {
        url: request.url.to_string(),
        ..Response::synthetic(status, status_text, body)
            .with_header(HeaderName::from_static(EXIT_STATUS), &exit_status)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::http::{HttpMethod, Request, RequestCompiler};
    use crate::template::Replacer;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn compile(dir: &std::path::Path, script: &str, params: &[(&str, &str)], timeout_ms: u64) -> CompiledRequest {
        let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (k, v) in params {
            map.entry(k.to_string()).or_default().push(v.to_string());
        }
        let request = Request {
            method: HttpMethod::Post,
            url: format!("bash://localhost{}", dir.display()),
            body: script.to_string(),
            params: map,
            timeout_ms: Some(timeout_ms),
            ..Default::default()
        };
        let config = EngineConfig::default();
        let mut replacer = Replacer::from_config(BTreeMap::new(), &config);
        RequestCompiler::new(Arc::new(config))
            .compile(&request, &mut replacer)
            .unwrap()
    }

    #[tokio::test]
    async fn success_collects_stdout_then_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let request = compile(
            dir.path(),
            "echo out-$GREETING\necho err >&2\npwd\n",
            &[("GREETING", "hi"), ("BAD=KEY", "x")],
            5_000,
        );
        let response = perform(&request).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.header_value(EXIT_STATUS), Some("0"));
        let body = response.body_str();
        assert!(body.starts_with("out-hi\n"));
        assert!(body.ends_with("err\n"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let response = perform(&compile(dir.path(), "exit 3", &[], 5_000)).await.unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.header_value(EXIT_STATUS), Some("3"));
    }

    #[tokio::test]
    async fn escaped_directory_names_are_decoded() {
        let dir = tempfile::tempdir().unwrap();
        let spaced = dir.path().join("my dir");
        std::fs::create_dir(&spaced).unwrap();

        let request = compile(&spaced, "pwd", &[], 5_000);
        assert!(request.url.path().ends_with("/my%20dir"));
        assert_eq!(working_dir(&request.url), Some(spaced.clone()));

        let response = perform(&request).await.unwrap();
        assert_eq!(response.status, 200, "{}", response.body_str());
        assert_eq!(response.body_str().trim_end(), spaced.display().to_string());
    }

    #[test]
    fn nul_in_directory_is_rejected() {
        let url = Url::parse("bash://localhost/tmp/a%00b").unwrap();
        assert_eq!(working_dir(&url), None);
    }

    #[tokio::test]
    async fn deadline_is_408() {
        let dir = tempfile::tempdir().unwrap();
        let response = perform(&compile(dir.path(), "sleep 5", &[], 100)).await.unwrap();
        assert_eq!(response.status, 408);
    }
}
