//! Static asset serving with validator based caching.
//!
//! Files are served by `tower_http`'s `ServeDir`; [`conditional_etag`] sits in
//! front of it and answers revalidation requests from file metadata alone.

use std::{
    fs::Metadata,
    path::{Component, Path, PathBuf},
    sync::Arc,
    time::UNIX_EPOCH,
};

use axum::{
    extract::{Request, State},
    http::{
        HeaderValue, Method, StatusCode,
        header::{CACHE_CONTROL, ETAG, IF_NONE_MATCH},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};

pub const CACHE_CONTROL_VALUE: &str = "public, max-age=0, must-revalidate";

/// Root directory the middleware resolves request paths against.
#[derive(Debug, Clone)]
pub struct AssetRoot(pub Arc<PathBuf>);

impl AssetRoot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(Arc::new(path.into()))
    }

    /// Map a percent-encoded request path onto a file below the root.
    ///
    /// Anything that could escape the root (`..`, absolute segments) is refused,
    /// as is a path that does not decode to UTF-8.
    pub fn resolve(&self, request_path: &str) -> Option<PathBuf> {
        let decoded = urlencoding::decode(request_path).ok()?;
        let relative = Path::new(decoded.trim_start_matches('/'));
        let mut resolved = self.0.as_ref().clone();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => resolved.push(segment),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(resolved)
    }
}

/// `"<mtime nanos hex>-<size hex>"`, quotes included.
pub fn fingerprint(metadata: &Metadata) -> Option<String> {
    let modified = metadata.modified().ok()?;
    let nanos = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
    Some(format!("\"{:x}-{:x}\"", nanos, metadata.len()))
}

/// Whether an `If-None-Match` header value names `etag`.
pub fn etag_matches(if_none_match: &str, etag: &str) -> bool {
    if_none_match.split(',').map(str::trim).any(|candidate| {
        candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
    })
}

/// Middleware adding `ETag` / `Cache-Control` to regular files and answering a
/// matching `If-None-Match` with 304 without touching the file contents.
pub async fn conditional_etag(
    State(root): State<AssetRoot>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return next.run(request).await;
    }

    let etag = match root.resolve(request.uri().path()) {
        Some(path) => match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => fingerprint(&metadata),
            _ => None,
        },
        None => None,
    };
    let Some(etag) = etag.and_then(|etag| HeaderValue::from_str(&etag).ok()) else {
        return next.run(request).await;
    };

    let revalidated = request
        .headers()
        .get(IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| etag_matches(value, etag.to_str().unwrap_or_default()));

    let mut response = if revalidated {
        tracing::debug!("Asset '{}' not modified", request.uri().path());
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        next.run(request).await
    };

    if response.status().is_success() || response.status() == StatusCode::NOT_MODIFIED {
        let headers = response.headers_mut();
        headers.insert(ETAG, etag);
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_VALUE));
    }
    response
}
