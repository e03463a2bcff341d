//! Command line entry point of the RSD snapshot fetcher.
//!
//! Meant to run from a scheduler: by default a failed download is reported
//! as a warning and the process still exits successfully, so a transient
//! outage of the server does not fail the whole scheduled job.

mod cli;
pub mod logging;

pub use crate::cli::Args;
pub use crate::cli::DEFAULT_URL;

use anyhow::Context;
use download::FetchOutcome;
use download::Fetcher;
use tracing::info;

pub const USER_AGENT: &str = concat!("rsd-fetch/", env!("CARGO_PKG_VERSION"));

pub async fn run(args: Args) -> anyhow::Result<()> {
    let request = args.fetch_request();
    info!(
        "Fetching snapshot from {} into {}",
        request.url(),
        args.out_dir
    );

    let fetcher = Fetcher::new().with_user_agent(USER_AGENT);
    match fetcher.fetch(&request, args.failure_mode()).await {
        FetchOutcome::Success(snapshot) => {
            println!(
                "Saved snapshot: {} ({} bytes)",
                snapshot.path.display(),
                snapshot.size
            );
        }
        FetchOutcome::SoftFailure(err) => {
            let err = anyhow::Error::new(err);
            eprintln!("WARNING: no snapshot saved in this run: {err:#}");
        }
        FetchOutcome::HardFailure(err) => {
            return Err(err).with_context(|| format!("Failed to fetch {}", request.url()));
        }
    }

    Ok(())
}
