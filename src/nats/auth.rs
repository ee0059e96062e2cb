//! Connection setup
//!
//! Turns an explicit [`ConnectionConfig`] into a live session. Every call
//! builds its own options and owns its own connection; there is no process
//! wide connection state.

use super::client::JetStreamClient;
use super::{Connector, RemoteResult};
use crate::error::RemoteError;
use async_nats::ConnectOptions;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Default server when none is configured
pub const DEFAULT_SERVER: &str = "nats://127.0.0.1:4222";

/// TLS settings; `*_data` fields carry PEM contents instead of a path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_file_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cert_file_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file_data: Option<String>,
}

impl TlsConfig {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Everything needed to open a session
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    pub servers: Vec<String>,
    /// Path to a `.creds` file
    pub credentials: Option<PathBuf>,
    /// Contents of a `.creds` file
    pub credential_data: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// NKey seed
    pub nkey: Option<String>,
    pub tls: TlsConfig,
    pub request_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            servers: vec![DEFAULT_SERVER.to_string()],
            credentials: None,
            credential_data: None,
            user: None,
            password: None,
            nkey: None,
            tls: TlsConfig::default(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// How the connection authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    None,
    CredentialsFile(PathBuf),
    Credentials(String),
    UserPassword { user: String, password: String },
    Token(String),
    NKey(String),
}

impl ConnectionConfig {
    /// Pick the authentication method by precedence
    ///
    /// A credentials file wins over inline credentials, which win over user
    /// and password. A user without a password is sent as a token. An NKey
    /// seed is used last.
    pub fn auth_method(&self) -> AuthMethod {
        let set = |v: &Option<String>| v.clone().filter(|s| !s.is_empty());

        if let Some(path) = &self.credentials {
            return AuthMethod::CredentialsFile(path.clone());
        }
        if let Some(data) = set(&self.credential_data) {
            return AuthMethod::Credentials(data);
        }
        match (set(&self.user), set(&self.password)) {
            (Some(user), Some(password)) => return AuthMethod::UserPassword { user, password },
            (Some(token), None) => return AuthMethod::Token(token),
            _ => {},
        }
        if let Some(seed) = set(&self.nkey) {
            return AuthMethod::NKey(seed);
        }
        AuthMethod::None
    }

    /// Comma separated server list as accepted by the client
    pub fn server_list(&self) -> String {
        if self.servers.is_empty() {
            DEFAULT_SERVER.to_string()
        } else {
            self.servers.join(",")
        }
    }
}

/// Opens [`JetStreamClient`] sessions
#[derive(Debug, Clone)]
pub struct JetStreamConnector {
    config: ConnectionConfig,
}

impl JetStreamConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Build connect options; PEM files written here must outlive the connect
    async fn options(&self, pem_files: &mut Vec<NamedTempFile>) -> RemoteResult<ConnectOptions> {
        let options = match self.config.auth_method() {
            AuthMethod::CredentialsFile(path) => ConnectOptions::with_credentials_file(path).await?,
            AuthMethod::Credentials(data) => ConnectOptions::with_credentials(&data)?,
            AuthMethod::UserPassword { user, password } => {
                ConnectOptions::with_user_and_password(user, password)
            },
            AuthMethod::Token(token) => ConnectOptions::with_token(token),
            AuthMethod::NKey(seed) => ConnectOptions::with_nkey(seed),
            AuthMethod::None => ConnectOptions::new(),
        };

        let mut options = options
            .name("jsreconcile")
            .request_timeout(Some(self.config.request_timeout))
            .connection_timeout(self.config.request_timeout);

        let tls = &self.config.tls;
        if tls.is_empty() {
            return Ok(options);
        }

        let ca = pem_path(&tls.ca_file, &tls.ca_file_data, pem_files)?;
        let cert = pem_path(&tls.cert_file, &tls.cert_file_data, pem_files)?;
        let key = pem_path(&tls.key_file, &tls.key_file_data, pem_files)?;

        options = options.require_tls(true);
        if let Some(ca) = ca {
            options = options.add_root_certificates(ca);
        }
        match (cert, key) {
            (Some(cert), Some(key)) => options = options.add_client_certificate(cert, key),
            (None, None) => {},
            _ => {
                return Err(RemoteError::Connect(
                    "a TLS client certificate and key must be configured together".to_string(),
                ))
            },
        }

        Ok(options)
    }
}

/// Path of a PEM file, writing inline contents to a temporary file
fn pem_path(
    path: &Option<PathBuf>,
    data: &Option<String>,
    pem_files: &mut Vec<NamedTempFile>,
) -> RemoteResult<Option<PathBuf>> {
    if let Some(path) = path {
        return Ok(Some(path.clone()));
    }
    let Some(data) = data.as_ref().filter(|d| !d.is_empty()) else {
        return Ok(None);
    };

    let mut file = tempfile::Builder::new()
        .prefix("jsreconcile-")
        .suffix(".pem")
        .tempfile()?;
    file.write_all(data.as_bytes())?;
    file.flush()?;

    let path = file.path().to_path_buf();
    pem_files.push(file);
    Ok(Some(path))
}

#[async_trait]
impl Connector for JetStreamConnector {
    type Session = JetStreamClient;

    async fn connect(&self) -> RemoteResult<JetStreamClient> {
        let servers = self.config.server_list();
        tracing::debug!("Connecting to {}", servers);

        // dropped at the end of this call, which removes the files
        let mut pem_files = Vec::new();
        let options = self.options(&mut pem_files).await?;

        let client = options
            .connect(servers.as_str())
            .await
            .map_err(|e| RemoteError::Connect(e.to_string()))?;

        Ok(JetStreamClient::new(client))
    }
}
