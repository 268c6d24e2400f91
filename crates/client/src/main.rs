use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use federated_signature::{JsonFileStore, OutgoingRequest, OutgoingSigner, fill_local_signatory};
use reqwest::Method;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Sends one signed request as a local signatory.
#[derive(Parser)]
struct Args {
    /// Identity to sign as, e.g. `https://a.example/users/alice`.
    #[clap(long, env = "SIGNATORY_ID")]
    id: String,
    #[clap(long, env = "SIGNATORY_STORE", default_value = "signatories.json")]
    store: PathBuf,
    /// Create the identity with a fresh key pair when the store lacks it.
    #[clap(long)]
    generate: bool,
    #[clap(long, short = 'X', default_value = "POST")]
    method: Method,
    /// Request body, read from a file when prefixed with `@`.
    #[clap(long, short = 'd')]
    data: Option<String>,
    url: Url,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let store = JsonFileStore::new(&args.store);
    let signatory = fill_local_signatory(&store, &args.id, args.generate)
        .with_context(|| format!("loading signatory {} from {}", args.id, args.store.display()))?;

    let body = match args.data.as_deref() {
        Some(path) if path.starts_with('@') => std::fs::read(&path[1..])
            .with_context(|| format!("reading body from {}", &path[1..]))?,
        Some(data) => data.as_bytes().to_vec(),
        None => Vec::new(),
    };

    let mut request = OutgoingRequest::new(args.method, args.url).with_body(body);
    let signed = OutgoingSigner::new()
        .sign_outgoing(&mut request, &signatory)
        .context("signing request")?;
    tracing::debug!(clear_signature = %signed.clear_signature, "Signed request");

    let response = request
        .into_reqwest(&reqwest::Client::new())
        .send()
        .await
        .context("sending request")?;
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    tracing::info!(%status, "Delivered");
    println!("{status} {text}");

    if !status.is_success() {
        anyhow::bail!("remote rejected the request with {status}");
    }
    Ok(())
}
