//! Some helper functions for HTTP calls
use std::{fmt, path::Path, path::PathBuf, time::Duration};

use log::{debug, trace};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT},
    Response, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio::io::AsyncWriteExt;

use crate::{
    api::{ErrorResponse, Token},
    commons::file,
    constants::CAPROV_VERSION,
};

const JSON_CONTENT: &str = "application/json";

/// Performs a GET request that expects a json response that can be
/// deserialized into the an owned value of the expected type. Returns an error
/// if nothing is returned.
pub async fn get_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    uri: &str,
    token: Option<&Token>,
) -> Result<T, Error> {
    let headers = headers(uri, Some(JSON_CONTENT), token)?;

    let res = client
        .get(uri)
        .headers(headers)
        .send()
        .await
        .map_err(|e| Error::execute(uri, e))?;

    process_json_response(uri, res).await
}

/// Performs a POST of data that can be serialized into json, and expects
/// a json response that can be deserialized into the an owned value of the
/// expected type.
pub async fn post_json_with_response<T: DeserializeOwned>(
    client: &reqwest::Client,
    uri: &str,
    data: impl Serialize,
    token: Option<&Token>,
) -> Result<T, Error> {
    match post_json_with_opt_response(client, uri, data, token).await? {
        None => Err(Error::response(uri, "expected JSON response")),
        Some(res) => Ok(res),
    }
}

/// Performs a POST of data that can be serialized into json, and expects
/// an optional json response that can be deserialized into the an owned
/// value of the expected type.
pub async fn post_json_with_opt_response<T: DeserializeOwned>(
    client: &reqwest::Client,
    uri: &str,
    data: impl Serialize,
    token: Option<&Token>,
) -> Result<Option<T>, Error> {
    let body = serde_json::to_string_pretty(&data)
        .map_err(|e| Error::request_build_json(uri, e))?;

    let headers = headers(uri, Some(JSON_CONTENT), token)?;
    let res = client
        .post(uri)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| Error::execute(uri, e))?;

    process_opt_json_response(uri, res).await
}

/// Performs a POST with no data to the given URI and expects a successful
/// response. Discards the response body.
pub async fn post_empty(
    client: &reqwest::Client,
    uri: &str,
    token: Option<&Token>,
) -> Result<(), Error> {
    let headers = headers(uri, Some(JSON_CONTENT), token)?;
    let res = client
        .post(uri)
        .headers(headers)
        .send()
        .await
        .map_err(|e| Error::execute(uri, e))?;

    opt_text_response(uri, res).await?;
    Ok(())
}

/// Performs a PUT of data that can be serialized into json, and expects a
/// successful response. Discards the response body.
pub async fn put_json(
    client: &reqwest::Client,
    uri: &str,
    data: impl Serialize,
    token: Option<&Token>,
) -> Result<(), Error> {
    let body = serde_json::to_string_pretty(&data)
        .map_err(|e| Error::request_build_json(uri, e))?;

    let headers = headers(uri, Some(JSON_CONTENT), token)?;
    let res = client
        .put(uri)
        .headers(headers)
        .body(body)
        .send()
        .await
        .map_err(|e| Error::execute(uri, e))?;

    opt_text_response(uri, res).await?;
    Ok(())
}

/// Downloads the resource at `uri` into the file at `dest`.
///
/// The body is streamed into a `.part` sibling first and renamed when
/// complete, so `dest` never holds a truncated download. Returns the number
/// of bytes written.
pub async fn download(
    client: &reqwest::Client,
    uri: &str,
    dest: &Path,
) -> Result<u64, Error> {
    let headers = headers(uri, None, None)?;
    let mut res = client
        .get(uri)
        .headers(headers)
        .send()
        .await
        .map_err(|e| Error::execute(uri, e))?;

    if !res.status().is_success() {
        return Err(Error::from_res(uri, res).await);
    }

    let partial = partial_path(dest);
    let mut out = tokio::fs::File::create(&partial)
        .await
        .map_err(|e| Error::write(&partial, e))?;

    let mut total = 0u64;
    loop {
        let chunk = match res.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                let _ = file::remove_if_exists(&partial);
                return Err(Error::execute(uri, e));
            }
        };
        if let Err(e) = out.write_all(&chunk).await {
            let _ = file::remove_if_exists(&partial);
            return Err(Error::write(&partial, e));
        }
        total += chunk.len() as u64;
        trace!("Downloaded {total} bytes from {uri}");
    }
    let flushed = out.flush().await;
    drop(out);
    if let Err(e) = flushed {
        let _ = file::remove_if_exists(&partial);
        return Err(Error::write(&partial, e));
    }

    tokio::fs::rename(&partial, dest)
        .await
        .map_err(|e| Error::write(dest, e))?;

    debug!("Saved {} bytes from {} to {}", total, uri, dest.display());
    Ok(total)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[allow(clippy::result_large_err)]
fn load_root_cert(path: &Path) -> Result<reqwest::Certificate, Error> {
    let bytes = file::read(path)
        .map_err(|e| Error::request_build_https_cert(path, e))?;
    reqwest::Certificate::from_pem(&bytes)
        .map_err(|e| Error::request_build_https_cert(path, e))
}

/// Builds a client with the given timeout for every request.
///
/// The certificates in `root_certs` are trusted in addition to the system
/// roots. Files that don't exist yet are skipped, as they are typically
/// written by the installer later on.
#[allow(clippy::result_large_err)]
pub fn client(
    uri: &str,
    timeout: Duration,
    root_certs: &[PathBuf],
) -> Result<reqwest::Client, Error> {
    let mut builder = reqwest::ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(timeout);

    for path in root_certs {
        if path.exists() {
            let cert = load_root_cert(path)?;
            builder = builder.add_root_certificate(cert);
        } else {
            debug!("Root certificate {} not present, skipping", path.display());
        }
    }

    builder.build().map_err(|e| Error::request_build(uri, e))
}

#[allow(clippy::result_large_err)]
fn headers(
    uri: &str,
    content_type: Option<&str>,
    token: Option<&Token>,
) -> Result<HeaderMap, Error> {
    let mut headers = HeaderMap::new();

    let ua_string = format!("caprov/{}", CAPROV_VERSION);
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(&ua_string)
            .map_err(|e| Error::request_build(uri, e))?,
    );

    if let Some(content_type) = content_type {
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type)
                .map_err(|e| Error::request_build(uri, e))?,
        );
    }
    if let Some(token) = token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token.as_ref()))
                .map_err(|e| Error::request_build(uri, e))?,
        );
    }
    Ok(headers)
}

async fn process_json_response<T: DeserializeOwned>(
    uri: &str,
    res: Response,
) -> Result<T, Error> {
    match process_opt_json_response(uri, res).await? {
        None => Err(Error::response(uri, "got empty response body")),
        Some(res) => Ok(res),
    }
}

async fn process_opt_json_response<T: DeserializeOwned>(
    uri: &str,
    res: Response,
) -> Result<Option<T>, Error> {
    match opt_text_response(uri, res).await? {
        None => Ok(None),
        Some(s) => {
            let res: T = serde_json::from_str(&s).map_err(|e| {
                Error::response(
                    uri,
                    format!("could not parse JSON response: {e}"),
                )
            })?;
            Ok(Some(res))
        }
    }
}

async fn opt_text_response(
    uri: &str,
    res: Response,
) -> Result<Option<String>, Error> {
    let status = res.status();
    if status.is_success() {
        match res.text().await.ok() {
            None => Ok(None),
            Some(s) => {
                if s.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(s))
                }
            }
        }
    } else if status == StatusCode::FORBIDDEN {
        Err(Error::Forbidden(uri.to_string()))
    } else {
        Err(Error::from_res(uri, res).await)
    }
}

//------------ Error ---------------------------------------------------------

type ErrorUri = String;
type RootCertPath = String;
type ErrorMessage = String;

#[derive(Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Error {
    RequestBuild(ErrorUri, ErrorMessage),
    RequestBuildHttpsCert(RootCertPath, ErrorMessage),

    RequestExecute(ErrorUri, ErrorMessage),
    RequestConnect(ErrorUri, ErrorMessage),
    RequestTimeout(ErrorUri),

    Response(ErrorUri, ErrorMessage),
    Forbidden(ErrorUri),
    ErrorResponseWithBody(ErrorUri, StatusCode, String),
    ErrorResponseWithJson(ErrorUri, StatusCode, ErrorResponse),

    Write(String, ErrorMessage),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::RequestBuild(uri, msg) => {
                write!(f, "Issue creating request for URI: {uri}, error: {msg}")
            }
            Error::RequestBuildHttpsCert(path, msg) => {
                write!(f, "Cannot use configured HTTPS root cert '{path}'. Error: {msg}")
            }
            Error::RequestExecute(uri, msg) => {
                write!(f, "Issue accessing URI: {uri}, error: {msg}")
            }
            Error::RequestConnect(uri, msg) => {
                write!(f, "Cannot connect to URI: {uri}, error: {msg}")
            }
            Error::RequestTimeout(uri) => {
                write!(f, "Request to URI: {uri} timed out")
            }
            Error::Response(uri, msg) => {
                write!(f, "Issue processing response from URI: {uri}, error: {msg}")
            }
            Error::Forbidden(uri) => {
                write!(f, "Got 'Forbidden' response for URI: {uri}")
            }
            Error::ErrorResponseWithBody(uri, code, e) => {
                write!(f, "Error response from URI: {uri}, Status: {code}, Error: {e}")
            }
            Error::ErrorResponseWithJson(uri, code, res) => {
                write!(f, "Error response from URI: {uri}, Status: {code}, ErrorResponse: {res}")
            }
            Error::Write(path, msg) => {
                write!(f, "Cannot write download to '{path}': {msg}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn request_build(uri: &str, msg: impl fmt::Display) -> Self {
        Error::RequestBuild(uri.to_string(), msg.to_string())
    }

    pub fn request_build_json(uri: &str, e: impl fmt::Display) -> Self {
        Error::RequestBuild(
            uri.to_string(),
            format!("could not serialize type to JSON: {e}"),
        )
    }

    pub fn request_build_https_cert(path: &Path, msg: impl fmt::Display) -> Self {
        Error::RequestBuildHttpsCert(path.display().to_string(), msg.to_string())
    }

    pub fn execute(uri: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::RequestTimeout(uri.to_string())
        } else if e.is_connect() {
            Error::RequestConnect(uri.to_string(), e.to_string())
        } else {
            Error::RequestExecute(uri.to_string(), e.to_string())
        }
    }

    pub fn response(uri: &str, msg: impl fmt::Display) -> Self {
        Error::Response(uri.to_string(), msg.to_string())
    }

    pub fn write(path: &Path, msg: impl fmt::Display) -> Self {
        Error::Write(path.display().to_string(), msg.to_string())
    }

    pub fn unexpected_status(status: StatusCode) -> String {
        format!("unexpected status code {status}")
    }

    pub fn response_unexpected_status(uri: &str, status: StatusCode) -> Self {
        Error::Response(uri.to_string(), Self::unexpected_status(status))
    }

    /// Returns the HTTP status of an error response, if there was one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Forbidden(_) => Some(StatusCode::FORBIDDEN),
            Error::ErrorResponseWithBody(_, status, _)
            | Error::ErrorResponseWithJson(_, status, _) => Some(*status),
            _ => None,
        }
    }

    /// Returns whether the server could not be reached at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::RequestConnect(..) | Error::RequestTimeout(_))
    }

    async fn from_res(uri: &str, res: Response) -> Error {
        let status = res.status();
        match res.text().await {
            Ok(body) => {
                if body.is_empty() {
                    Error::ErrorResponseWithBody(
                        uri.to_string(), status, Self::unexpected_status(status)
                    )
                } else {
                    match serde_json::from_str::<ErrorResponse>(&body) {
                        Ok(res) => Error::ErrorResponseWithJson(
                            uri.to_string(), status, res
                        ),
                        Err(_) => Error::ErrorResponseWithBody(
                            uri.to_string(), status, body
                        ),
                    }
                }
            }
            _ => Self::response_unexpected_status(uri, status),
        }
    }
}

//------------ Tests ---------------------------------------------------------
