//! terraform-provider-kudo plugin binary

use anyhow::Result;

use terraform_provider_kudo::cli::CliApp;

#[tokio::main]
async fn main() -> Result<()> {
    // Stdout carries the plugin handshake, logs go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "terraform_provider_kudo=info,kudo_tfplugin=info".into()),
        )
        .init();

    // kube and reqwest share one rustls provider
    let _ = rustls::crypto::ring::default_provider().install_default();

    let matches = CliApp::app().get_matches();
    CliApp::run(&matches).await
}
