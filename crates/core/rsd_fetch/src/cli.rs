use camino::Utf8PathBuf;
use clap::builder::BoolishValueParser;
use clap::ArgAction;
use clap::Parser;
use download::Auth;
use download::FailureMode;
use download::FetchRequest;
use download::RetryPolicy;
use download::StatusCode;
use download::DEFAULT_FILE_PREFIX;
use std::num::NonZeroU32;
use std::time::Duration;

pub const DEFAULT_URL: &str = "https://cloud.ostrava.cz/public.php/webdav/upload.xml";

/// Downloads a snapshot of the RSD upload document into a timestamped file.
///
/// Every option can also be given with the environment variable shown in its help.
#[derive(Debug, Clone, PartialEq, Eq, Parser)]
#[command(about, version, long_about)]
pub struct Args {
    /// URL of the document to download.
    #[arg(long, env = "RSD_URL", default_value = DEFAULT_URL)]
    pub url: String,

    /// User name for HTTP Basic authentication.
    #[arg(long, env = "RSD_USERNAME")]
    pub username: Option<String>,

    /// Password for HTTP Basic authentication.
    #[arg(long, env = "RSD_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Directory where the snapshots are saved. Created if missing.
    #[arg(long, env = "OUT_DIR", default_value = "data")]
    pub out_dir: Utf8PathBuf,

    /// Report download failures as warnings and exit successfully.
    ///
    /// Missing credentials are always reported as an error.
    #[arg(
        long,
        env = "SOFT_FAIL",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set,
    )]
    pub soft_fail: bool,

    /// Number of requests made before giving up on transient failures.
    #[arg(long, env = "RSD_MAX_ATTEMPTS", default_value = "5")]
    pub max_attempts: NonZeroU32,

    /// HTTP statuses that are retried, comma separated.
    #[arg(
        long,
        env = "RSD_RETRY_STATUSES",
        value_delimiter = ',',
        default_value = "429,500,502,503,504"
    )]
    pub retry_statuses: Vec<StatusCode>,

    /// Delay before the first retry, doubled on each following one.
    #[arg(long, env = "RSD_BACKOFF", default_value = "2s", value_parser = humantime::parse_duration)]
    pub backoff: Duration,

    /// Upper bound of a single retry delay, including those requested by the server.
    #[arg(long, env = "RSD_MAX_BACKOFF", default_value = "120s", value_parser = humantime::parse_duration)]
    pub max_backoff: Duration,

    /// Wait as long as the server asks with a Retry-After header.
    #[arg(
        long,
        env = "RSD_HONOR_RETRY_AFTER",
        default_value = "true",
        value_parser = BoolishValueParser::new(),
        action = ArgAction::Set,
    )]
    pub honor_retry_after: bool,

    /// Time allowed to establish a connection.
    #[arg(long, env = "RSD_CONNECT_TIMEOUT", default_value = "10s", value_parser = humantime::parse_duration)]
    pub connect_timeout: Duration,

    /// Time allowed between two reads of the response.
    #[arg(long, env = "RSD_READ_TIMEOUT", default_value = "120s", value_parser = humantime::parse_duration)]
    pub read_timeout: Duration,

    /// Name prefix of the snapshot files.
    #[arg(long, env = "RSD_FILE_PREFIX", default_value = DEFAULT_FILE_PREFIX)]
    pub file_prefix: String,

    /// Turn on debug logging.
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    pub fn failure_mode(&self) -> FailureMode {
        self.soft_fail.into()
    }

    /// The request described by these arguments.
    ///
    /// Credentials are not checked here: the fetcher rejects incomplete ones.
    pub fn fetch_request(&self) -> FetchRequest {
        let retry_policy = RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_retry_statuses(self.retry_statuses.iter().copied())
            .with_backoff(self.backoff, self.max_backoff)
            .honor_retry_after(self.honor_retry_after);

        FetchRequest::new(&self.url, &self.out_dir)
            .with_auth(Auth::new_basic(
                self.username.as_deref().unwrap_or_default(),
                self.password.as_deref().unwrap_or_default(),
            ))
            .with_timeouts(self.connect_timeout, self.read_timeout)
            .with_retry_policy(retry_policy)
            .with_file_prefix(&self.file_prefix)
    }
}
