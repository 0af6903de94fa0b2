use std::sync::Arc;

use anyhow::bail;
use envconfig::Envconfig;
use kube::Client;
use pdv_verifier::{
    config::VerifierConfig,
    deployment::Release,
    init_tracing,
    orchestrator::{Orchestrator, RunSettings},
    progress::ProgressTracker,
    report::emit,
    validation::HttpValidationClient,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing("info");

    if let Err(e) = rustls::crypto::CryptoProvider::install_default(
        rustls::crypto::aws_lc_rs::default_provider(),
    ) {
        tracing::debug!(
            ?e,
            "CryptoProvider already installed or incompatible; proceeding"
        );
    }

    let cfg = VerifierConfig::init_from_env()?;
    info!(?cfg, "Starting verification");

    let client = Client::try_default().await?;
    let release = Release::from_kube(&cfg.release_name, &cfg.namespace, client);
    let validation = HttpValidationClient::new(&cfg.validation, &cfg.target)?;
    let orchestrator =
        Orchestrator::new(Arc::new(validation), RunSettings::from_config(&cfg));

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_shutdown(cancel.clone(), cfg.release_name.clone()));

    let tracker = ProgressTracker::visible();
    let mut out = std::io::stdout();
    let outcome = orchestrator.run(&release, &tracker, &cancel, &mut out).await?;

    let failed = outcome.result.failed().count();
    if failed > 0 {
        bail!(
            "{failed} sub-test(s) of validation task {} failed",
            outcome.task_id
        );
    }
    Ok(())
}

async fn cancel_on_shutdown(cancel: CancellationToken, release: String) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    cancel.cancel();
    emit(
        &mut std::io::stdout(),
        format_args!("Verification of {release} has been cancelled."),
    );
}
