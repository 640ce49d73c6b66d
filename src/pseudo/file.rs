use std::path::PathBuf;

use tokio::fs;

use crate::error::TransportError;
use crate::http::{CompiledRequest, HttpMethod, Response};

fn local_path(request: &CompiledRequest) -> Result<PathBuf, TransportError> {
    request
        .url
        .to_file_path()
        .map_err(|_| TransportError::Io(format!("`{}` is not a local file path", request.url)))
}

/// GET reads, PUT writes the body, DELETE removes.
pub async fn perform(request: &CompiledRequest) -> Result<Response, TransportError> {
    let path = local_path(request)?;
    let io_error = |err: std::io::Error| TransportError::Io(format!("{}: {err}", path.display()));

    let body = match request.method {
        HttpMethod::Get => fs::read(&path).await.map_err(io_error)?,
        HttpMethod::Put => {
            fs::write(&path, &request.body).await.map_err(io_error)?;
            format!("Successfully wrote {}", request.url).into_bytes()
        }
        HttpMethod::Delete => {
            fs::remove_file(&path).await.map_err(io_error)?;
            format!("Successfully deleted {}", request.url).into_bytes()
        }
        other => {
            return Err(TransportError::Io(format!(
                "method {other} is not supported for file:// requests"
            )));
        }
    };

    Ok(Response {
        url: request.url.to_string(),
        ..Response::synthetic(200, "OK", body)
    })
}
