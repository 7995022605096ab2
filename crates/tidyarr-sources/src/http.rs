//! Shared HTTP plumbing for the adapters.
//!
//! # Design
//! - Connection failures, timeouts, auth rejections and 5xx responses are `Unavailable`,
//!   which the engine treats as "skip this source for this run".
//! - 404 is `NotFound`; any other non-success status is `Rejected`.

use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tidyarr_core::{DeleteOutcome, SourceError, SourceKind, SourceResult};
use url::Url;

/// JSON client bound to one backend.
#[derive(Debug, Clone)]
pub(crate) struct HttpClient {
    kind: SourceKind,
    client: Client,
    base: Url,
}

impl HttpClient {
    /// Build a client that sends `auth_header: secret` and expects JSON.
    pub(crate) fn new(
        kind: SourceKind,
        base: Url,
        auth_header: &'static str,
        secret: &str,
        timeout: Duration,
    ) -> SourceResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let mut secret = HeaderValue::from_str(secret)
            .map_err(|err| SourceError::unavailable(kind, "build_client", err))?;
        secret.set_sensitive(true);
        headers.insert(HeaderName::from_static(auth_header), secret);

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|err| SourceError::unavailable(kind, "build_client", err))?;

        let mut base = base;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { kind, client, base })
    }

    pub(crate) const fn kind(&self) -> SourceKind {
        self.kind
    }

    fn endpoint(&self, operation: &'static str, path: &str) -> SourceResult<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|err| SourceError::decode(self.kind, operation, err))
    }

    fn request(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
    ) -> SourceResult<RequestBuilder> {
        Ok(self.client.request(method, self.endpoint(operation, path)?))
    }

    /// Send a request and classify transport errors and non-success statuses.
    pub(crate) async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> SourceResult<Response> {
        let response = request
            .send()
            .await
            .map_err(|err| classify_transport(self.kind, operation, err))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let reference = response.url().path().to_string();
        Err(classify_status(self.kind, operation, status, reference))
    }

    /// GET `path` with `query` and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, String)],
    ) -> SourceResult<T> {
        let request = self.request(operation, Method::GET, path)?.query(query);
        let response = self.send(operation, request).await?;
        response
            .json::<T>()
            .await
            .map_err(|err| SourceError::decode(self.kind, operation, err))
    }

    /// GET `path`, discarding the body.
    pub(crate) async fn get(&self, operation: &'static str, path: &str) -> SourceResult<()> {
        let request = self.request(operation, Method::GET, path)?;
        self.send(operation, request).await.map(drop)
    }

    /// PUT a JSON body to `path`, discarding the response body.
    pub(crate) async fn put_json<B: Serialize + Sync>(
        &self,
        operation: &'static str,
        path: &str,
        body: &B,
    ) -> SourceResult<()> {
        let request = self.request(operation, Method::PUT, path)?.json(body);
        self.send(operation, request).await.map(drop)
    }

    /// DELETE `path`; a 404 means the item is already gone.
    pub(crate) async fn delete(
        &self,
        operation: &'static str,
        path: &str,
    ) -> SourceResult<DeleteOutcome> {
        let request = self.request(operation, Method::DELETE, path)?;
        match self.send(operation, request).await {
            Ok(_) => Ok(DeleteOutcome::Deleted),
            Err(SourceError::NotFound { .. }) => Ok(DeleteOutcome::AlreadyAbsent),
            Err(err) => Err(err),
        }
    }
}

fn classify_transport(kind: SourceKind, operation: &'static str, err: reqwest::Error) -> SourceError {
    if err.is_decode() {
        SourceError::decode(kind, operation, err)
    } else {
        SourceError::unavailable(kind, operation, err)
    }
}

pub(crate) fn classify_status(
    kind: SourceKind,
    operation: &'static str,
    status: StatusCode,
    reference: String,
) -> SourceError {
    match status {
        StatusCode::NOT_FOUND => SourceError::NotFound {
            adapter: kind,
            operation,
            reference,
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::unavailable(
            kind,
            operation,
            format!("credentials rejected with status {}", status.as_u16()),
        ),
        status if status.is_server_error() => SourceError::unavailable(
            kind,
            operation,
            format!("server error status {}", status.as_u16()),
        ),
        status => SourceError::Rejected {
            adapter: kind,
            operation,
            status: status.as_u16(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_map_onto_source_errors() {
        let kind = SourceKind::Sonarr;
        assert!(classify_status(kind, "op", StatusCode::UNAUTHORIZED, String::new()).is_unavailable());
        assert!(classify_status(kind, "op", StatusCode::BAD_GATEWAY, String::new()).is_unavailable());
        assert!(matches!(
            classify_status(kind, "op", StatusCode::NOT_FOUND, "/x".into()),
            SourceError::NotFound { .. }
        ));
        assert!(matches!(
            classify_status(kind, "op", StatusCode::CONFLICT, String::new()),
            SourceError::Rejected { status: 409, .. }
        ));
    }

    #[test]
    fn base_url_keeps_sub_path() -> anyhow::Result<()> {
        let client = HttpClient::new(
            SourceKind::Sonarr,
            Url::parse("http://nas.local/sonarr")?,
            "x-api-key",
            "secret",
            Duration::from_secs(1),
        )?;
        let url = client.endpoint("op", "/api/v3/series")?;
        assert_eq!(url.as_str(), "http://nas.local/sonarr/api/v3/series");
        Ok(())
    }
}
