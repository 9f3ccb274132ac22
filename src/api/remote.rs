//! Purpose: HTTP client for a running `starnotary serve` instance.
//! Exports: `RemoteClient`.
//! Role: Mirrors `LocalClient` over the JSON wire envelopes served by `serve`.
//! Invariants: Base URLs are http(s) origins without a path.
//! Invariants: Server error envelopes are mapped back onto `ErrorKind` unchanged.
#![allow(clippy::result_large_err)]

use crate::core::error::{Error, ErrorKind};
use crate::core::star::{NewStar, RangeRequest, StarRecord};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use url::Url;

type ApiResult<T> = Result<T, Error>;

#[derive(Clone)]
pub struct RemoteClient {
    base_url: Url,
    agent: ureq::Agent,
}

impl fmt::Debug for RemoteClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct StarEnvelope {
    star: StarRecord,
}

#[derive(Deserialize)]
struct StarsEnvelope {
    stars: Vec<StarRecord>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: RemoteError,
}

#[derive(Deserialize)]
struct RemoteError {
    kind: String,
    message: Option<String>,
    hint: Option<String>,
    token_id: Option<u64>,
}

impl RemoteError {
    /// Unknown kinds fall back to what the HTTP status implies.
    fn into_error(self, status: u16) -> Error {
        let kind = kind_named(&self.kind).unwrap_or_else(|| kind_for_status(status));
        let mut err = Error::new(kind)
            .with_message(self.message.unwrap_or_else(|| format!("remote error status {status}")));
        if let Some(hint) = self.hint {
            err = err.with_hint(hint);
        }
        if let Some(token_id) = self.token_id {
            err = err.with_star_id(token_id);
        }
        err
    }
}

impl RemoteClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        let base_url = normalize_base_url(base_url.into())?;
        let agent = ureq::AgentBuilder::new().build();
        Ok(Self { base_url, agent })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn register(&self, star: &NewStar) -> ApiResult<StarRecord> {
        let response = self
            .agent
            .post(self.stars_url()?.as_str())
            .set("Accept", "application/json")
            .send_json(star);
        let envelope: StarEnvelope = decode(response)?;
        Ok(envelope.star)
    }

    pub fn star_range(&self, request: &RangeRequest) -> ApiResult<Vec<StarRecord>> {
        let mut url = self.stars_url()?;
        {
            let mut query = url.query_pairs_mut();
            match request {
                RangeRequest::Window {
                    start,
                    end,
                    oldest_first,
                } => {
                    query
                        .append_pair("start", start)
                        .append_pair("end", end)
                        .append_pair("oldest-first", if *oldest_first { "true" } else { "false" });
                }
                RangeRequest::Ids { first_id, last_id } => {
                    query
                        .append_pair("first-id", first_id)
                        .append_pair("last-id", last_id);
                }
            }
        }
        let response = self
            .agent
            .get(url.as_str())
            .set("Accept", "application/json")
            .call();
        let envelope: StarsEnvelope = decode(response)?;
        Ok(envelope.stars)
    }

    fn stars_url(&self) -> ApiResult<Url> {
        self.base_url.join("v0/stars").map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to build stars url")
                .with_source(err)
        })
    }
}

fn normalize_base_url(raw: String) -> ApiResult<Url> {
    let mut url = Url::parse(&raw).map_err(|err| {
        Error::new(ErrorKind::Usage)
            .with_message("invalid remote base url")
            .with_source(err)
    })?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("remote base url must use http or https scheme"));
    }
    if url.path() != "/" {
        return Err(
            Error::new(ErrorKind::Usage).with_message("remote base url must not include a path")
        );
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Decodes a success envelope, or turns a server error envelope back into an `Error`.
fn decode<R>(response: Result<ureq::Response, ureq::Error>) -> ApiResult<R>
where
    R: DeserializeOwned,
{
    match response {
        Ok(resp) => resp.into_json().map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("invalid response json")
                .with_source(err)
        }),
        Err(ureq::Error::Status(status, resp)) => Err(match resp.into_json::<ErrorEnvelope>() {
            Ok(envelope) => envelope.error.into_error(status),
            Err(_) => Error::new(kind_for_status(status))
                .with_message(format!("remote error status {status}")),
        }),
        Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
            .with_message("request failed")
            .with_source(err)),
    }
}

fn kind_named(kind: &str) -> Option<ErrorKind> {
    Some(match kind {
        "Internal" => ErrorKind::Internal,
        "Usage" => ErrorKind::Usage,
        "NotFound" => ErrorKind::NotFound,
        "AlreadyExists" => ErrorKind::AlreadyExists,
        "Busy" => ErrorKind::Busy,
        "Permission" => ErrorKind::Permission,
        "Corrupt" => ErrorKind::Corrupt,
        "Io" => ErrorKind::Io,
        _ => return None,
    })
}

/// Mirrors the server's kind-to-status table for bodies that carry no usable kind.
fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        400 | 413 => ErrorKind::Usage,
        403 => ErrorKind::Permission,
        404 => ErrorKind::NotFound,
        409 => ErrorKind::AlreadyExists,
        423 => ErrorKind::Busy,
        _ => ErrorKind::Internal,
    }
}
