use clap::Parser;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = rsd_fetch::Args::parse();
    rsd_fetch::logging::initialise_tracing_subscriber(args.debug);
    rsd_fetch::run(args).await
}
