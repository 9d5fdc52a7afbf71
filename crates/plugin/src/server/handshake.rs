//! go-plugin handshake and server startup

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use rcgen::{
    BasicConstraints, CertificateParams, DnType, DnValue, IsCa, KeyPair, KeyUsagePurpose,
};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::{debug, info};

use super::{Controller, HealthService, ProviderService};
use crate::error::{PluginError, PluginResult};
use crate::proto::controller::grpc_controller_server::GrpcControllerServer;
use crate::proto::health::health_server::HealthServer;
use crate::proto::tfplugin5::provider_server::ProviderServer;
use crate::traits::Provider;

pub const MAGIC_COOKIE_KEY: &str = "TF_PLUGIN_MAGIC_COOKIE";
pub const MAGIC_COOKIE_VALUE: &str =
    "d602bf8f470bc67ca7faa0386276bbdd4330efaf76d1a219cb4d6991ca9872b2";

/// go-plugin core protocol version
const CORE_PROTOCOL_VERSION: u32 = 1;

/// Terraform plugin protocol major version served
pub const PROTOCOL_VERSION: u32 = 5;

/// Largest gRPC message accepted or sent; schemas and states can be large
pub const MAX_MESSAGE_SIZE: usize = 256 << 20;

/// How the plugin server is started
#[derive(Debug, Clone, Default)]
pub struct ServeOptions {
    /// Run standalone and print `TF_REATTACH_PROVIDERS` instead of a handshake
    pub debug: bool,

    /// Registry address reported in the reattach configuration
    pub provider_address: String,
}

/// Serve `provider` until the host asks the plugin to shut down
pub async fn serve<P: Provider>(provider: P, opts: ServeOptions) -> PluginResult<()> {
    if !opts.debug {
        check_magic_cookie(std::env::var(MAGIC_COOKIE_KEY).ok().as_deref())?;
        negotiate_protocol(std::env::var("PLUGIN_PROTOCOL_VERSIONS").ok().as_deref())?;
    }

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let shutdown = Arc::new(Notify::new());

    let mut builder = Server::builder();
    let mut server_cert = None;
    if !opts.debug && std::env::var_os("PLUGIN_CLIENT_CERT").is_some() {
        let identity = ServerIdentity::generate()?;
        builder = builder.tls_config(
            ServerTlsConfig::new()
                .identity(Identity::from_pem(&identity.cert_pem, &identity.key_pem)),
        )?;
        server_cert = Some(identity.cert_der);
    }

    if opts.debug {
        println!(
            "Provider started. To attach Terraform CLI, set the TF_REATTACH_PROVIDERS environment variable with the following:\n\n\tTF_REATTACH_PROVIDERS='{}'\n",
            reattach_config(&opts.provider_address, addr, std::process::id())
        );
        spawn_interrupt_handler(Some(shutdown.clone()));
    } else {
        println!("{}", handshake_line(addr, server_cert.as_deref()));
        // Terraform forwards interrupts through Stop; the signal itself is ignored
        spawn_interrupt_handler(None);
    }
    std::io::stdout().flush()?;

    info!(%addr, debug = opts.debug, "Serving tfplugin5");

    let provider = ProviderServer::new(ProviderService::new(provider))
        .max_decoding_message_size(MAX_MESSAGE_SIZE)
        .max_encoding_message_size(MAX_MESSAGE_SIZE);

    let stop = shutdown.clone();
    builder
        .add_service(provider)
        .add_service(GrpcControllerServer::new(Controller::new(shutdown)))
        .add_service(HealthServer::new(HealthService))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async move {
            stop.notified().await
        })
        .await?;

    info!("Plugin server stopped");
    Ok(())
}

fn spawn_interrupt_handler(shutdown: Option<Arc<Notify>>) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            match &shutdown {
                Some(shutdown) => {
                    shutdown.notify_one();
                    break;
                }
                None => debug!("Ignoring interrupt"),
            }
        }
    });
}

/// Refuse to run unless launched by Terraform
pub fn check_magic_cookie(value: Option<&str>) -> PluginResult<()> {
    match value {
        Some(MAGIC_COOKIE_VALUE) => Ok(()),
        _ => Err(PluginError::NotLaunchedByHost),
    }
}

/// Check that the host offers the protocol version served here
///
/// A host that does not advertise versions is assumed to speak ours.
pub fn negotiate_protocol(offered: Option<&str>) -> PluginResult<u32> {
    let Some(offered) = offered.filter(|v| !v.trim().is_empty()) else {
        return Ok(PROTOCOL_VERSION);
    };

    let supported = offered
        .split(',')
        .filter_map(|v| v.trim().parse::<u32>().ok())
        .any(|v| v == PROTOCOL_VERSION);

    if supported {
        Ok(PROTOCOL_VERSION)
    } else {
        Err(PluginError::IncompatibleProtocol(offered.to_string()))
    }
}

/// Handshake line go-plugin reads from stdout
pub fn handshake_line(addr: SocketAddr, server_cert: Option<&[u8]>) -> String {
    let cert = server_cert
        .map(|der| STANDARD_NO_PAD.encode(der))
        .unwrap_or_default();
    format!("{CORE_PROTOCOL_VERSION}|{PROTOCOL_VERSION}|tcp|{addr}|grpc|{cert}")
}

/// `TF_REATTACH_PROVIDERS` value for a debug-mode server
pub fn reattach_config(provider_address: &str, addr: SocketAddr, pid: u32) -> String {
    let entry = serde_json::json!({
        "Protocol": "grpc",
        "ProtocolVersion": PROTOCOL_VERSION,
        "Pid": pid,
        "Test": true,
        "Addr": {
            "Network": "tcp",
            "String": addr.to_string(),
        }
    });

    let mut providers = serde_json::Map::new();
    providers.insert(provider_address.to_string(), entry);
    serde_json::Value::Object(providers).to_string()
}

/// Self-signed server certificate for the AutoMTLS exchange
struct ServerIdentity {
    cert_pem: String,
    cert_der: Vec<u8>,
    key_pem: String,
}

impl ServerIdentity {
    fn generate() -> PluginResult<Self> {
        let mut params = CertificateParams::new(vec!["localhost".to_string()])?;
        params.distinguished_name.push(
            DnType::OrganizationName,
            DnValue::Utf8String("HashiCorp".to_string()),
        );
        params.distinguished_name.push(
            DnType::CommonName,
            DnValue::Utf8String("localhost".to_string()),
        );
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        params.key_usages = vec![
            KeyUsagePurpose::DigitalSignature,
            KeyUsagePurpose::KeyEncipherment,
            KeyUsagePurpose::KeyAgreement,
            KeyUsagePurpose::KeyCertSign,
        ];

        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;

        Ok(Self {
            cert_pem: cert.pem(),
            cert_der: cert.der().to_vec(),
            key_pem: key_pair.serialize_pem(),
        })
    }
}
