//! A single resumable transfer.
//!
//! [`Transport`] is the seam between the downloader and the network. The
//! downloader only ever asks for one URL into one sink; [`HttpTransport`]
//! answers with reqwest.
//!
//! File sinks resume: if the file already holds `n` bytes the request
//! carries `Range: bytes=n-`. A `416 Range Not Satisfiable` answer means the
//! file is already complete, and a `200 OK` answer restarts it from scratch.

use crate::download::Sink;
use crate::error::FetchError;
use crate::utils::content_length::total_length;

use futures::future::BoxFuture;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, AUTHORIZATION, RANGE};
use reqwest::{StatusCode, Url};
use reqwest_middleware::ClientWithMiddleware;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Media type accepted as a fallback next to a target's own type.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Callback receiving `(bytes_received, total_bytes)`; total is 0 when
/// unknown.
pub type ProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// One transfer request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: Url,
    /// Destination; file paths are absolute by the time they get here.
    pub sink: Sink,
    /// Preferred media type for the `Accept` header, see [`accept_header`].
    pub mime_type: Option<String>,
    /// Sent as `Authorization: token ...`.
    pub auth_token: Option<String>,
}

/// Performs single transfers.
pub trait Transport: Send + Sync {
    /// Fetch `request.url` into `request.sink`, returning the number of bytes
    /// the sink holds at the end.
    fn fetch(
        &self,
        request: FetchRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<u64, FetchError>>;
}

/// [`Transport`] over HTTP(S).
#[derive(Clone)]
pub struct HttpTransport {
    client: ClientWithMiddleware,
    read_timeout: Duration,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

impl HttpTransport {
    /// `read_timeout` bounds the wait for the response headers and for each
    /// body chunk.
    pub fn new(client: ClientWithMiddleware, read_timeout: Duration) -> Self {
        Self {
            client,
            read_timeout,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Transport for HttpTransport {
    fn fetch(
        &self,
        request: FetchRequest,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<u64, FetchError>> {
        let client = self.client.clone();
        let read_timeout = self.read_timeout;
        async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                result = fetch_resumable(&client, read_timeout, &request, progress.as_ref()) => result,
            }
        }
        .boxed()
    }
}

/// `Accept` value preferring `mime` while still taking a generic binary
/// answer from hosts that label the file differently.
pub fn accept_header(mime: &str) -> String {
    if mime == DEFAULT_MIME_TYPE {
        return mime.to_string();
    }
    format!("{mime};q=1.0,{DEFAULT_MIME_TYPE};q=0.9")
}

async fn fetch_resumable(
    client: &ClientWithMiddleware,
    read_timeout: Duration,
    request: &FetchRequest,
    progress: &(dyn Fn(u64, u64) + Send + Sync),
) -> Result<u64, FetchError> {
    let url = request.url.to_string();
    let offset = existing_length(&request.sink).await;

    let mut req = client.get(request.url.clone());
    if let Some(mime) = &request.mime_type {
        req = req.header(ACCEPT, accept_header(mime));
    }
    if let Some(token) = &request.auth_token {
        req = req.header(AUTHORIZATION, format!("token {token}"));
    }
    if offset > 0 {
        debug!("Resuming {} from byte {}", url, offset);
        req = req.header(RANGE, format!("bytes={offset}-"));
    }

    debug!("Fetching {}", url);
    let response = match timeout(read_timeout, req.send()).await {
        Err(_) => return Err(FetchError::Timeout { url }),
        Ok(Err(e)) => return Err(classify_middleware(&url, e)),
        Ok(Ok(response)) => response,
    };

    let status = response.status();
    if status == StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
        debug!("{} was already fully downloaded", url);
        progress(offset, offset);
        return Ok(offset);
    }
    if !status.is_success() {
        return Err(FetchError::Status {
            url,
            status: status.as_u16(),
        });
    }

    let resume = offset > 0 && status == StatusCode::PARTIAL_CONTENT;
    let mut received = if resume { offset } else { 0 };
    let total = total_length(&response, received).unwrap_or(0);
    let mut writer = SinkWriter::open(&request.sink, resume).await?;
    progress(received, total);

    let mut stream = response.bytes_stream();
    loop {
        let chunk = match timeout(read_timeout, stream.next()).await {
            Err(_) => return Err(FetchError::Timeout { url }),
            Ok(None) => break,
            Ok(Some(Err(e))) => {
                let timed_out = e.is_timeout();
                return Err(classify_chain(&url, &e, timed_out));
            }
            Ok(Some(Ok(chunk))) => chunk,
        };
        writer.write(&chunk).await?;
        received += chunk.len() as u64;
        progress(received, total);
    }
    writer.finish().await?;

    debug!("Finished {} ({} bytes)", url, received);
    Ok(received)
}

async fn existing_length(sink: &Sink) -> u64 {
    match sink {
        Sink::File(path) => fs::metadata(path).await.map(|m| m.len()).unwrap_or(0),
        Sink::Memory(_) => 0,
    }
}

enum SinkWriter {
    File(fs::File),
    Memory(Arc<Mutex<Vec<u8>>>),
}

impl SinkWriter {
    async fn open(sink: &Sink, append: bool) -> Result<Self, FetchError> {
        match sink {
            Sink::File(path) => {
                if let Some(parent) = path.parent() {
                    fs::create_dir_all(parent).await?;
                }
                let file = OpenOptions::new()
                    .create(true)
                    .write(true)
                    .append(append)
                    .truncate(!append)
                    .open(path)
                    .await?;
                Ok(SinkWriter::File(file))
            }
            Sink::Memory(buffer) => {
                if !append {
                    buffer.lock().clear();
                }
                Ok(SinkWriter::Memory(buffer.clone()))
            }
        }
    }

    async fn write(&mut self, chunk: &[u8]) -> Result<(), FetchError> {
        match self {
            SinkWriter::File(file) => file.write_all(chunk).await?,
            SinkWriter::Memory(buffer) => {
                buffer.lock().extend_from_slice(chunk);
            }
        }
        Ok(())
    }

    async fn finish(&mut self) -> Result<(), FetchError> {
        if let SinkWriter::File(file) = self {
            file.flush().await?;
        }
        Ok(())
    }
}

fn classify_middleware(url: &str, error: reqwest_middleware::Error) -> FetchError {
    let timed_out = matches!(&error, reqwest_middleware::Error::Reqwest(e) if e.is_timeout());
    classify_chain(url, &error, timed_out)
}

/// Certificate problems are recognised anywhere in the source chain.
fn classify_chain(
    url: &str,
    error: &(dyn std::error::Error + 'static),
    timed_out: bool,
) -> FetchError {
    let mut messages = Vec::new();
    let mut current = Some(error);
    while let Some(e) = current {
        messages.push(e.to_string());
        current = e.source();
    }
    let message = messages.join(": ");

    if message.to_ascii_lowercase().contains("certificate") {
        FetchError::Certificate {
            url: url.to_string(),
            message,
        }
    } else if timed_out {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message,
        }
    }
}
