//! Notary - delegated attestation relay for meeting claims

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notary::{
    config::{Args, ProfileSet},
    ledger::{InMemoryLedger, JsonRpcLedger, LedgerGateway, RpcConfig},
    publish::OffchainPublisher,
    server::{self, AppState},
    services::{AttestationService, ServiceConfig},
    signing::{DelegationTarget, Wallet},
    types::address_string,
};

/// Chain id of the in-memory ledger when none is configured
const DEV_CHAIN_ID: u64 = 31337;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    let registry = tracing_subscriber::registry().with(
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| format!("notary={},info", log_level).into()),
    );
    if args.log_format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let profiles = args.profiles().context("resolving schema profiles")?;
    let attester = load_wallet("attester", args.attester_key().as_deref().map(String::as_str), args.dev_mode)?;
    let relayer = load_wallet("relayer", args.relayer_key().as_deref().map(String::as_str), args.dev_mode)?;
    let gateway = build_gateway(&args, &profiles).await?;

    let publisher = OffchainPublisher::new(args.offchain_base_url.clone(), args.request_timeout())
        .context("building off-ledger publisher")?;
    let config = ServiceConfig {
        eas: args.eas()?,
        schema_registry: args.schema_registry()?,
        offchain_version: args.offchain_version()?,
        delegation_deadline_secs: args.delegation_deadline_secs,
        nonce_retry_limit: args.nonce_retry_limit,
        finalize_timeout: args.finalize_timeout(),
    };

    let service = AttestationService::new(
        gateway,
        publisher,
        attester,
        relayer,
        profiles,
        config,
        &args.eas_version,
    )
    .await
    .context("building attestation service")?;

    info!("======================================");
    info!("  Notary - meeting attestation relay");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Ledger: {} (chain {})", service.ledger_name(), service.chain_id());
    info!("EAS: {} v{}", args.eas_address, args.eas_version);
    info!("Attester: {}", address_string(&service.attester()));
    info!("Relayer: {}", address_string(&service.relayer()));
    info!("Off-ledger index: {}", args.offchain_base_url);
    for profile in service.profiles().iter() {
        info!(
            "  profile {}: {} (delegation: {})",
            profile.name,
            profile.uid,
            profile.delegation.label()
        );
    }
    info!("======================================");

    let state = Arc::new(AppState::new(args, Arc::new(service)));
    server::run(state).await?;

    Ok(())
}

/// Wallet from a configured key; dev mode falls back to an ephemeral one
fn load_wallet(role: &str, key: Option<&str>, dev_mode: bool) -> anyhow::Result<Wallet> {
    match key {
        Some(secret) => Wallet::from_hex(secret).with_context(|| format!("parsing {role} private key")),
        None if dev_mode => {
            let wallet = Wallet::random();
            warn!("No {} key configured, using ephemeral {}", role, address_string(&wallet.address()));
            Ok(wallet)
        }
        None => anyhow::bail!("{role} private key is required"),
    }
}

/// JSON-RPC node in production; an in-memory ledger seeded with the
/// configured profiles in dev mode without an RPC endpoint
async fn build_gateway(args: &Args, profiles: &ProfileSet) -> anyhow::Result<Arc<dyn LedgerGateway>> {
    if let Some(url) = &args.rpc_url {
        info!("Using JSON-RPC ledger at {}", url);
        let ledger = JsonRpcLedger::new(RpcConfig {
            url: url.clone(),
            eas: args.eas()?,
            request_timeout: args.request_timeout(),
            poll_interval: args.receipt_poll(),
            gas_multiplier_percent: args.gas_multiplier_percent,
            chain_id: args.chain_id,
        })
        .context("building JSON-RPC ledger")?;
        return Ok(Arc::new(ledger));
    }

    let ledger = InMemoryLedger::new(
        args.chain_id.unwrap_or(DEV_CHAIN_ID),
        args.eas()?,
        args.schema_registry()?,
        args.eas_version.clone(),
    );
    for profile in profiles.iter() {
        ledger.seed_schema(&profile.spec, profile.resolver, profile.revocable).await;
        if let DelegationTarget::Proxy { address, name, version } = &profile.delegation {
            ledger.deploy_proxy(*address, name, version).await;
        }
    }
    warn!("Using in-memory ledger - attestations are lost on restart");
    Ok(Arc::new(ledger))
}
