//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;


const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "scrawl";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_STORE_API_VERSION: &str = "v2023-03-01";
const DEFAULT_IMAGE_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";
const DEFAULT_ALLOWED_IMAGE_HOST: &str = "i.ibb.co";

/// Command-line arguments for the Scrawl binary.
#[derive(Debug, Parser)]
#[command(name = "scrawl", version, about = "Scrawl authoring server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "SCRAWL_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the Scrawl HTTP service.
    Serve(Box<ServeArgs>),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

/// CLI overrides for `serve`. Secrets (store token, image host key) are
/// deliberately not flags; they arrive via config file or environment.
#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the content store base URL.
    #[arg(long = "content-store-base-url", value_name = "URL")]
    pub content_store_base_url: Option<String>,

    /// Override the content store dataset name.
    #[arg(long = "content-store-dataset", value_name = "NAME")]
    pub content_store_dataset: Option<String>,

    /// Override the content store API version segment.
    #[arg(long = "content-store-api-version", value_name = "VERSION")]
    pub content_store_api_version: Option<String>,

    /// Override the image host upload endpoint.
    #[arg(long = "image-host-upload-url", value_name = "URL")]
    pub image_host_upload_url: Option<String>,

    /// Override the allow-listed image hostnames (comma separated).
    #[arg(long = "image-allowed-hosts", value_name = "HOSTS")]
    pub image_allowed_hosts: Option<String>,

    /// Override the maximum request size for image uploads in bytes.
    #[arg(long = "uploads-max-request-bytes", value_name = "BYTES")]
    pub uploads_max_request_bytes: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub content_store: ContentStoreSettings,
    pub image_host: ImageHostSettings,
    pub uploads: UploadSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub public_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Where posts live. `base_url`, `dataset` and `token` have no sensible
/// defaults; they stay optional here and are demanded at serve time.
#[derive(Debug, Clone)]
pub struct ContentStoreSettings {
    pub base_url: Option<Url>,
    pub api_version: String,
    pub dataset: Option<String>,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageHostSettings {
    pub upload_url: Url,
    pub api_key: Option<String>,
    /// Hostnames whose images the page will render. Empty means unrestricted.
    pub allowed_hosts: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Parse the CLI and load settings with the configured precedence.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let cli = CliArgs::parse();
    let settings = load(&cli)?;
    Ok((cli, settings))
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("SCRAWL").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    content_store: RawContentStoreSettings,
    image_host: RawImageHostSettings,
    uploads: RawUploadSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentStoreSettings {
    base_url: Option<String>,
    api_version: Option<String>,
    dataset: Option<String>,
    token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawImageHostSettings {
    upload_url: Option<String>,
    api_key: Option<String>,
    allowed_hosts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    max_request_bytes: Option<u64>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.content_store_base_url.as_ref() {
            self.content_store.base_url = Some(url.clone());
        }
        if let Some(dataset) = overrides.content_store_dataset.as_ref() {
            self.content_store.dataset = Some(dataset.clone());
        }
        if let Some(version) = overrides.content_store_api_version.as_ref() {
            self.content_store.api_version = Some(version.clone());
        }
        if let Some(url) = overrides.image_host_upload_url.as_ref() {
            self.image_host.upload_url = Some(url.clone());
        }
        if let Some(hosts) = overrides.image_allowed_hosts.as_ref() {
            self.image_host.allowed_hosts =
                Some(hosts.split(',').map(|h| h.trim().to_string()).collect());
        }
        if let Some(limit) = overrides.uploads_max_request_bytes {
            self.uploads.max_request_bytes = Some(limit);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            content_store,
            image_host,
            uploads,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            content_store: build_content_store_settings(content_store)?,
            image_host: build_image_host_settings(image_host)?,
            uploads: build_upload_settings(uploads)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let ip: IpAddr = host
        .parse()
        .map_err(|err| LoadError::invalid("server.host", format!("failed to parse: {err}")))?;
    let public_addr = SocketAddr::new(ip, port);

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        public_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_content_store_settings(
    store: RawContentStoreSettings,
) -> Result<ContentStoreSettings, LoadError> {
    let base_url = match non_empty(store.base_url) {
        Some(value) => Some(Url::parse(&value).map_err(|err| {
            LoadError::invalid("content_store.base_url", format!("failed to parse: {err}"))
        })?),
        None => None,
    };

    Ok(ContentStoreSettings {
        base_url,
        api_version: non_empty(store.api_version)
            .unwrap_or_else(|| DEFAULT_STORE_API_VERSION.to_string()),
        dataset: non_empty(store.dataset),
        token: non_empty(store.token),
    })
}

fn build_image_host_settings(
    image_host: RawImageHostSettings,
) -> Result<ImageHostSettings, LoadError> {
    let upload_url = non_empty(image_host.upload_url)
        .unwrap_or_else(|| DEFAULT_IMAGE_UPLOAD_URL.to_string());
    let upload_url = Url::parse(&upload_url).map_err(|err| {
        LoadError::invalid("image_host.upload_url", format!("failed to parse: {err}"))
    })?;

    let allowed_hosts = image_host
        .allowed_hosts
        .unwrap_or_else(|| vec![DEFAULT_ALLOWED_IMAGE_HOST.to_string()])
        .into_iter()
        .map(|host| host.trim().to_string())
        .filter(|host| !host.is_empty())
        .collect();

    Ok(ImageHostSettings {
        upload_url,
        api_key: non_empty(image_host.api_key),
        allowed_hosts,
    })
}

fn build_upload_settings(uploads: RawUploadSettings) -> Result<UploadSettings, LoadError> {
    let max_request_bytes_value = uploads
        .max_request_bytes
        .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
    let max_request_bytes = NonZeroU64::new(max_request_bytes_value).ok_or_else(|| {
        LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
    })?;
    usize::try_from(max_request_bytes_value).map_err(|_| {
        LoadError::invalid(
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(UploadSettings { max_request_bytes })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
