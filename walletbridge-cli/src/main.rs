//! Developer CLI for the wallet bridge.
//!
//! Wires every context (page adapter, relay, orchestrator, approval
//! surface and executor) into one process and drives a chosen flow end to
//! end, with a simulated human approving (or rejecting) after a short
//! delay. Useful for watching the state machine, timers and broadcasts
//! without a browser harness.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use serde_json::json;

use walletbridge_core::store::{FileStore, KeyValueStore, MemoryStore};
use walletbridge_core::{
    executor_channel, ApprovalSurface, BridgeError, ExecutorResponse, ExecutorStream,
    Orchestrator, PageAdapter, PageRequest, Relay, SurfaceMessage,
};

#[derive(Parser)]
#[command(name = "walletbridge", about = "Wallet bridge developer CLI", version)]
struct Cli {
    /// Persist bridge state to this JSON file instead of memory.
    #[arg(long, env = "WALLETBRIDGE_STORE")]
    store: Option<PathBuf>,

    /// Origin to impersonate for the requesting page.
    #[arg(long, default_value = "https://verifier.example")]
    origin: String,

    /// Simulate the human rejecting instead of approving.
    #[arg(long)]
    reject: bool,

    /// Seconds the simulated human takes to decide.
    #[arg(long, default_value_t = 1)]
    think_time: u64,

    #[command(subcommand)]
    flow: Flow,
}

#[derive(Subcommand)]
enum Flow {
    /// Request the wallet address.
    Address,
    /// Submit a proof without address disclosure (simulated pipeline).
    Proof,
    /// Submit a proof with address disclosure and an executor round trip.
    ProofWithAddress,
    /// Save a credential twice to demonstrate the dedup overwrite.
    Save,
}

/// Surface stand-in: always visible, decisions come from the simulated
/// human task.
struct ConsoleSurface;

impl ApprovalSurface for ConsoleSurface {
    fn open(&self) -> Result<(), BridgeError> {
        println!("[surface] approval surface opened");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_log::LogTracer::init().wrap_err("cannot bridge log records")?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let backend: Arc<dyn KeyValueStore> = match &cli.store {
        Some(path) => Arc::new(
            FileStore::open(path).wrap_err_with(|| format!("cannot open {}", path.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    };

    let (executor, executor_requests) = executor_channel();
    let orchestrator = Orchestrator::new(backend, Arc::new(ConsoleSurface), executor);
    orchestrator.resume_idle_lock();

    tokio::spawn(run_executor(Arc::clone(&orchestrator), executor_requests));
    tokio::spawn(print_notifications(Arc::clone(&orchestrator)));

    let adapter = PageAdapter::new(&cli.origin, Relay::new(Arc::clone(&orchestrator)));
    println!("[page] {:?}", PageAdapter::announce());

    match cli.flow {
        Flow::Address => {
            spawn_human(&orchestrator, &cli, human_address_decision(&cli));
            drive(&adapter, PageRequest::RequestAddress).await;
        }
        Flow::Proof => {
            spawn_human(
                &orchestrator,
                &cli,
                SurfaceMessage::Proof {
                    approved: !cli.reject,
                },
            );
            drive(
                &adapter,
                PageRequest::RequestProof {
                    region: "kr".to_string(),
                    vc_type: "IdentityCredential".to_string(),
                    prep: Some(json!({"circuit": "region"})),
                },
            )
            .await;
            wait_for_pipeline().await;
        }
        Flow::ProofWithAddress => {
            spawn_human(
                &orchestrator,
                &cli,
                SurfaceMessage::ProofWithAddress {
                    approved: !cli.reject,
                    address: Some("0xDEMO000000000000000000000000000000000001".to_string()),
                },
            );
            drive(
                &adapter,
                PageRequest::RequestProofWithAddress {
                    region: "kr".to_string(),
                    vc_type: "IdentityCredential".to_string(),
                    prep: Some(json!({"circuit": "region"})),
                    contract_info: Some(json!({"address": "0xc0ffee", "method": "mintSBT"})),
                },
            )
            .await;
            wait_for_pipeline().await;
            let soulbound = orchestrator.credentials().soulbound_list()?;
            println!("[store] soulbound records: {}", soulbound.len());
        }
        Flow::Save => {
            drive(
                &adapter,
                PageRequest::SaveCredential {
                    vc: demo_credential("urn:uuid:demo-1", "2024-01-01"),
                },
            )
            .await;

            // Second save with the same dedup key: parked in the surface,
            // then confirmed by the simulated human.
            spawn_human(
                &orchestrator,
                &cli,
                SurfaceMessage::CredentialSave {
                    approved: !cli.reject,
                },
            );
            drive(
                &adapter,
                PageRequest::SaveCredential {
                    vc: demo_credential("urn:uuid:demo-2", "2025-06-01"),
                },
            )
            .await;
            tokio::time::sleep(Duration::from_secs(cli.think_time + 1)).await;

            let items = orchestrator.credentials().list()?;
            println!("[store] {} credential(s) saved", items.len());
            for item in items {
                println!(
                    "[store]   id {} issued {}",
                    item["id"], item["issuanceDate"]
                );
            }
        }
    }

    Ok(())
}

fn human_address_decision(cli: &Cli) -> SurfaceMessage {
    if cli.reject {
        SurfaceMessage::Address {
            success: false,
            address: None,
            error: Some("user rejected".to_string()),
        }
    } else {
        SurfaceMessage::Address {
            success: true,
            address: Some("0xDEMO000000000000000000000000000000000001".to_string()),
            error: None,
        }
    }
}

/// Simulated human: decides after the configured think time.
fn spawn_human(orchestrator: &Arc<Orchestrator>, cli: &Cli, decision: SurfaceMessage) {
    let orchestrator = Arc::clone(orchestrator);
    let think_time = Duration::from_secs(cli.think_time);
    tokio::spawn(async move {
        tokio::time::sleep(think_time).await;
        println!("[surface] human decided");
        if !orchestrator.deliver_decision(decision) {
            println!("[surface] decision arrived too late");
        }
    });
}

async fn drive(adapter: &PageAdapter, request: PageRequest) {
    if let Some(event) = adapter.handle_page_message(request).await {
        println!("[page] {}", serde_json::to_string(&event).unwrap_or_default());
    }
}

/// Demo executor: confirms every transaction after a short delay.
async fn run_executor(orchestrator: Arc<Orchestrator>, mut requests: ExecutorStream) {
    while let Some(request) = requests.recv().await {
        println!(
            "[executor] submitting transaction for {} (token {})",
            request.address, request.token_uri
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
        let delivered = orchestrator.deliver_executor_response(ExecutorResponse {
            id: request.id,
            success: true,
            tx_hash: Some("0xdemofeedbeef".to_string()),
            block_number: Some("42".to_string()),
            sbt_data: Some(json!({
                "id": "sbt:demo",
                "tokenURI": request.token_uri,
            })),
            error: None,
        });
        if !delivered {
            println!("[executor] response arrived too late");
        }
    }
}

async fn print_notifications(orchestrator: Arc<Orchestrator>) {
    let mut notifications = orchestrator.subscribe();
    while let Ok(notification) = notifications.recv().await {
        println!(
            "[broadcast] {}",
            serde_json::to_string(&notification).unwrap_or_default()
        );
    }
}

/// Waits out the simulated pipeline: generation, submission and the
/// retention sweep.
async fn wait_for_pipeline() {
    tokio::time::sleep(
        walletbridge_core::defaults::PROOF_GENERATION_LATENCY
            + walletbridge_core::defaults::TRANSACTION_SUBMISSION_LATENCY
            + walletbridge_core::defaults::RECORD_RETENTION
            + Duration::from_secs(2),
    )
    .await;
}

fn demo_credential(id: &str, issuance_date: &str) -> walletbridge_core::Credential {
    walletbridge_core::Credential(json!({
        "id": id,
        "issuer": { "id": "https://gov.example/moi" },
        "credentialSubject": { "id": "did:ethr:0xABC", "name": "Demo Holder" },
        "type": ["VerifiableCredential", "IdentityCredential"],
        "issuanceDate": issuance_date
    }))
}
