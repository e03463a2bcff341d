use crate::clock::Clock;
use crate::clock::WallClock;
use crate::error::ErrContext;
use crate::error::FetchError;
use crate::outcome::FailureMode;
use crate::outcome::FetchOutcome;
use crate::outcome::SnapshotFile;
use crate::request::FetchRequest;
use crate::snapshot::check_free_space;
use crate::snapshot::DraftSnapshot;
use crate::snapshot::SnapshotName;
use backoff::future::retry_notify;
use reqwest::header::ACCEPT;
use reqwest::header::CONNECTION;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing::info;
use tracing::warn;

pub const DEFAULT_USER_AGENT: &str = concat!("snapshot-download/", env!("CARGO_PKG_VERSION"));

/// Downloads snapshots, one request at a time.
pub struct Fetcher {
    clock: Arc<dyn Clock>,
    user_agent: String,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        Self::with_clock(WallClock)
    }

    pub fn with_clock(clock: impl Clock) -> Self {
        Self {
            clock: Arc::new(clock),
            user_agent: DEFAULT_USER_AGENT.into(),
        }
    }

    /// Sets the `User-Agent` used to identify this client to the server.
    pub fn with_user_agent(self, user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.into(),
            ..self
        }
    }

    /// Downloads a snapshot, then decides with `mode` how a failure has to be reported.
    pub async fn fetch(&self, request: &FetchRequest, mode: FailureMode) -> FetchOutcome {
        let result = self.download(request).await;
        if let Err(err) = &result {
            debug!("Download of {} failed: {err:?}", request.url());
        }
        FetchOutcome::classify(result, mode)
    }

    /// Downloads a snapshot to a new timestamped file in the output directory.
    ///
    /// Transient failures are retried according to the request retry policy.
    /// Nothing is left in the output directory when this returns an error.
    pub async fn download(&self, request: &FetchRequest) -> Result<SnapshotFile, FetchError> {
        let (username, password) = request.credentials()?;

        let dir = request.output_dir.as_path();
        tokio::fs::create_dir_all(dir)
            .await
            .context(format!("Can't create output directory {dir:?}"))?;
        let name = SnapshotName::new(&request.file_prefix, self.clock.now());

        let client = reqwest::Client::builder()
            .connect_timeout(request.connect_timeout)
            .read_timeout(request.read_timeout)
            .user_agent(self.user_agent.as_str())
            .build()?;

        let policy = &request.retry_policy;
        let max_attempts = policy.max_attempts();
        let attempts = &AtomicU32::new(0);
        let client = &client;

        let operation = || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(
                "Requesting {} (attempt {attempt}/{max_attempts})",
                request.url()
            );
            self.attempt(client, request, username, password)
                .await
                .map_err(|err| err.into_backoff(attempt, max_attempts))
        };

        let draft = retry_notify(policy.backoff(), operation, |err, delay: Duration| {
            warn!("Temporary failure: {err}. Retrying in {delay:?}")
        })
        .await?;

        if draft.is_empty() {
            return Err(FetchError::EmptyPayload);
        }
        let looks_like_xml = draft.looks_like_xml();
        if !looks_like_xml {
            warn!(
                "Payload from {} does not start with '<', it might not be XML",
                request.url()
            );
        }

        let size = draft.len();
        let path = draft.persist(dir, &name)?;
        info!("Saved snapshot {path:?} ({size} bytes)");

        Ok(SnapshotFile {
            path,
            size,
            looks_like_xml,
        })
    }

    /// Makes one request and streams a successful response into a draft file.
    async fn attempt(
        &self,
        client: &reqwest::Client,
        request: &FetchRequest,
        username: &str,
        password: &str,
    ) -> Result<DraftSnapshot, AttemptError> {
        let mut response = client
            .get(request.url())
            .basic_auth(username, Some(password))
            .header(ACCEPT, "application/xml")
            .header(CONNECTION, "keep-alive")
            .send()
            .await
            .map_err(|err| {
                if err.is_builder() || err.is_redirect() {
                    AttemptError::Permanent(err.into())
                } else {
                    AttemptError::transient(err.into())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let policy = &request.retry_policy;
            if policy.is_retryable(status) {
                return Err(AttemptError::Transient {
                    err: FetchError::RetryableStatus { status },
                    retry_after: policy.retry_after(response.headers(), self.clock.now()),
                });
            }
            return Err(AttemptError::Permanent(FetchError::UnexpectedStatus {
                status,
            }));
        }

        let dir = request.output_dir.as_path();
        if let Some(len) = response.content_length().filter(|len| *len > 0) {
            check_free_space(dir, len).map_err(AttemptError::Permanent)?;
        }

        let mut draft =
            DraftSnapshot::new_in(dir, &request.file_prefix).map_err(AttemptError::Permanent)?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| AttemptError::transient(err.into()))?
        {
            draft
                .write_chunk(&chunk)
                .await
                .map_err(AttemptError::Permanent)?;
        }
        draft.finish().await.map_err(AttemptError::Permanent)?;

        Ok(draft)
    }
}

/// Why a single attempt failed.
enum AttemptError {
    Transient {
        err: FetchError,
        retry_after: Option<Duration>,
    },
    Permanent(FetchError),
}

impl AttemptError {
    fn transient(err: FetchError) -> Self {
        AttemptError::Transient {
            err,
            retry_after: None,
        }
    }

    /// Transient errors become permanent once all the attempts have been used.
    fn into_backoff(self, attempt: u32, max_attempts: u32) -> backoff::Error<FetchError> {
        match self {
            AttemptError::Permanent(err) => backoff::Error::Permanent(err),
            AttemptError::Transient { err, .. } if attempt >= max_attempts => {
                backoff::Error::Permanent(FetchError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(err),
                })
            }
            AttemptError::Transient {
                err,
                retry_after: Some(delay),
            } => backoff::Error::retry_after(err, delay),
            AttemptError::Transient {
                err,
                retry_after: None,
            } => backoff::Error::transient(err),
        }
    }
}
