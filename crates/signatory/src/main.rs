use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use federated_signature::{
    AppState, IncomingVerifier, JsonFileStore, ResolverConfig, SignatoryResolver,
    SignatoryStore, VerifierConfig, fill_local_signatory, run,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Args {
    #[clap(long, env = "SIGNATORY_HOST", default_value = "127.0.0.1")]
    host: String,
    #[clap(long, env = "SIGNATORY_PORT", default_value = "3000")]
    port: u16,
    /// Host remote servers use to reach us, defaults to `host:port`.
    #[clap(long, env = "SIGNATORY_PUBLIC_HOST")]
    public_host: Option<String>,
    #[clap(long, env = "SIGNATORY_SCHEME", default_value = "http")]
    scheme: String,
    #[clap(long, env = "SIGNATORY_STORE", default_value = "signatories.json")]
    store: PathBuf,
    /// Local users to publish, created on first start.
    #[clap(long = "actor", env = "SIGNATORY_ACTORS", value_delimiter = ',')]
    actors: Vec<String>,

    #[clap(long, env = "SIGNATURE_TTL", default_value = "300")]
    signature_ttl: u64,
    #[clap(long, env = "REQUIRE_DIGEST")]
    require_digest: bool,
    /// Headers a signature must cover in addition to content-length, date and host.
    #[clap(long = "enforce-header", env = "ENFORCED_HEADERS", value_delimiter = ',')]
    enforced_headers: Vec<String>,

    #[clap(long, env = "KEY_FETCH_TIMEOUT", default_value = "5")]
    key_fetch_timeout: u64,
    #[clap(long, env = "KEY_CACHE_TTL", default_value = "3600")]
    key_cache_ttl: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let public_host = args
        .public_host
        .clone()
        .unwrap_or_else(|| format!("{}:{}", args.host, args.port));

    let resolver = SignatoryResolver::with_http(&ResolverConfig {
        fetch_timeout: Duration::from_secs(args.key_fetch_timeout),
        cache_ttl: Some(Duration::from_secs(args.key_cache_ttl)),
        ..ResolverConfig::default()
    })
    .context("creating key resolver")?;

    let verifier = IncomingVerifier::new(
        Arc::new(resolver),
        VerifierConfig {
            ttl: Duration::from_secs(args.signature_ttl),
            enforced_headers: args.enforced_headers,
            require_digest: args.require_digest,
        },
    );

    let store: Arc<dyn SignatoryStore> = Arc::new(JsonFileStore::new(&args.store));
    let state = AppState {
        public_host,
        scheme: args.scheme,
        verifier: Arc::new(verifier),
        store,
    };

    for name in &args.actors {
        let id = state.actor_id(name);
        let signatory = fill_local_signatory(state.store.as_ref(), &id, true)
            .with_context(|| format!("loading local signatory {id}"))?;
        tracing::info!(id = %signatory.id, key_id = %signatory.key_id, "Publishing actor");
    }

    run(args.host, args.port, state).await
}
