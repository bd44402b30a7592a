//! The configuration of a provisioning run.
//!
//! Everything the run needs is read from a single TOML file up front. The
//! resulting [`Config`] is passed by reference to the orchestrator, there is
//! no global configuration state.

use std::{env, fmt, fs, io};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use log::{error, LevelFilter};
use serde::de;
use serde::{Deserialize, Deserializer};
use url::Url;

use crate::api::{
    ExtendedKeyUsage, HashAlgorithm, IssuerId, KeyParameters, KeyUsage,
    PolicyInformation, SignatureAlgorithm,
};
use crate::commons::template::{self, TemplateError};
use crate::constants::*;
use crate::install::INSTALLER_PLACEHOLDERS;

/// The placeholders available in the CRL distribution point template.
pub const CRL_URI_PLACEHOLDERS: &[&str] = &["fqdn", "file"];


//------------ ConfigDefaults ------------------------------------------------

pub struct ConfigDefaults;

impl ConfigDefaults {
    fn log_level() -> LevelFilter {
        match env::var(CAPROV_ENV_LOG_LEVEL) {
            Ok(level) => match LevelFilter::from_str(&level) {
                Ok(level) => level,
                Err(_) => {
                    eprintln!(
                        "Unrecognized value for log level in env var {}, \
                         using 'info'",
                        CAPROV_ENV_LOG_LEVEL
                    );
                    LevelFilter::Info
                }
            },
            _ => LevelFilter::Info,
        }
    }

    fn log_type() -> LogType {
        LogType::Stderr
    }

    fn log_file() -> PathBuf {
        PathBuf::from("./caprov.log")
    }

    fn syslog_facility() -> String {
        "daemon".to_string()
    }

    fn cert_dir() -> PathBuf {
        PathBuf::from("./certs")
    }

    fn download_path() -> PathBuf {
        PathBuf::from("./pki-installer.tar.gz")
    }

    fn download_timeout() -> u64 {
        DOWNLOAD_TIMEOUT_SECS
    }

    fn installer_timeout() -> u64 {
        INSTALLER_TIMEOUT_SECS
    }

    fn agent_args() -> Vec<String> {
        vec!["--enable-agent".to_string()]
    }

    fn enable_agent() -> bool {
        true
    }

    fn listen_address() -> String {
        "0.0.0.0".to_string()
    }

    fn listen_port() -> u16 {
        443
    }

    fn admin_username() -> String {
        "admin".to_string()
    }

    fn api_base_uri() -> Url {
        Url::parse("https://localhost/").unwrap_or_else(|_| unreachable!())
    }

    fn api_timeout() -> u64 {
        API_TIMEOUT_SECS
    }

    fn api_login_retry() -> u64 {
        API_LOGIN_RETRY_SECS
    }

    fn key_store_name() -> String {
        "caprov-keystore".to_string()
    }

    fn crl_uri_template() -> String {
        "http://{fqdn}/crl/{file}".to_string()
    }

    fn profile_name() -> String {
        "caprov-tls".to_string()
    }

    fn profile_lifetime_minutes() -> u64 {
        365 * 24 * 60
    }

    fn copy_sans() -> bool {
        true
    }

    fn extended_key_usages() -> Vec<ExtendedKeyUsage> {
        vec![ExtendedKeyUsage::ClientAuth, ExtendedKeyUsage::ServerAuth]
    }

    fn key_usages() -> Vec<KeyUsage> {
        vec![KeyUsage::DigitalSignature, KeyUsage::KeyEncipherment]
    }

    fn csr_generator_name() -> String {
        "caprov-csr".to_string()
    }

    fn csr_key() -> KeyParameters {
        KeyParameters {
            signature_algorithm: SignatureAlgorithm::Rsa,
            key_size: 2048,
            hash_algorithm: HashAlgorithm::Sha256,
        }
    }

    fn trust_store_kind() -> TrustStoreKind {
        if cfg!(windows) {
            TrustStoreKind::Certutil
        } else {
            TrustStoreKind::Anchors
        }
    }

    fn anchors_dir() -> PathBuf {
        PathBuf::from(DEFAULT_ANCHORS_DIR)
    }

    fn intermediates_dir() -> PathBuf {
        PathBuf::from(DEFAULT_INTERMEDIATES_DIR)
    }

    fn anchors_refresh() -> Vec<String> {
        vec![DEFAULT_ANCHORS_REFRESH.to_string()]
    }
}


//------------ Config --------------------------------------------------------

/// The complete configuration of a provisioning run.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    #[serde(
        default = "ConfigDefaults::log_level",
        deserialize_with = "de_level_filter"
    )]
    pub log_level: LevelFilter,

    #[serde(default = "ConfigDefaults::log_type")]
    pub log_type: LogType,

    #[serde(default = "ConfigDefaults::log_file")]
    pub log_file: PathBuf,

    #[serde(default = "ConfigDefaults::syslog_facility")]
    pub syslog_facility: String,

    /// Where the CA certificates returned by the API are saved.
    #[serde(default = "ConfigDefaults::cert_dir")]
    pub cert_dir: PathBuf,

    /// Overrides the resolved FQDN of this host.
    #[serde(default)]
    pub fqdn: Option<String>,

    /// The URI opened in the browser at the end, defaults to the API base.
    #[serde(default)]
    pub ui_uri: Option<Url>,

    pub artifact: ArtifactConfig,
    pub prerequisite: ProgramConfig,
    pub installer: InstallerConfig,
    pub credentials: Credentials,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub key_store: KeyStoreConfig,

    pub root_ca: CaSettings,
    pub intermediate_ca: CaSettings,

    #[serde(default)]
    pub crl: CrlConfig,

    #[serde(default)]
    pub profile: ProfileSettings,

    pub issuer: IssuerSettings,

    #[serde(default)]
    pub csr_generator: CsrGeneratorSettings,

    pub team: TeamSettings,

    #[serde(default)]
    pub trust_store: TrustStoreConfig,
}

/// Where to get the installer and where to unpack it.
#[derive(Clone, Debug, Deserialize)]
pub struct ArtifactConfig {
    pub uri: Url,

    #[serde(default = "ConfigDefaults::download_path")]
    pub download_path: PathBuf,

    pub install_root: PathBuf,

    #[serde(default = "ConfigDefaults::download_timeout")]
    pub timeout_secs: u64,
}

/// An external program run from the unpacked artifact.
#[derive(Clone, Debug, Deserialize)]
pub struct ProgramConfig {
    /// Relative paths are resolved against the install root.
    pub program: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default = "ConfigDefaults::installer_timeout")]
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct InstallerConfig {
    /// Relative paths are resolved against the install root.
    pub program: PathBuf,

    /// Argument templates, see [`INSTALLER_PLACEHOLDERS`].
    #[serde(default)]
    pub args: Vec<String>,

    /// Appended to the arguments when `enable_agent` is set.
    #[serde(default = "ConfigDefaults::agent_args")]
    pub agent_args: Vec<String>,

    #[serde(default = "ConfigDefaults::enable_agent")]
    pub enable_agent: bool,

    #[serde(default = "ConfigDefaults::listen_address")]
    pub listen_address: String,

    #[serde(default = "ConfigDefaults::listen_port")]
    pub listen_port: u16,

    pub install_dir: PathBuf,

    /// The TLS certificate the installer leaves behind for the new
    /// service. Relative paths are resolved against `install_dir`.
    pub bootstrap_certificate: PathBuf,

    #[serde(default = "ConfigDefaults::installer_timeout")]
    pub timeout_secs: u64,
}

#[derive(Clone, Deserialize)]
pub struct Credentials {
    #[serde(default = "ConfigDefaults::admin_username")]
    pub admin_username: String,
    pub admin_email: String,
    pub admin_password: String,
    pub db_admin_password: String,
    pub keystore_password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("admin_username", &self.admin_username)
            .field("admin_email", &self.admin_email)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "ConfigDefaults::api_base_uri")]
    pub base_uri: Url,

    #[serde(default = "ConfigDefaults::api_timeout")]
    pub timeout_secs: u64,

    /// How long to keep retrying the login while the service starts.
    /// Zero disables retrying.
    #[serde(default = "ConfigDefaults::api_login_retry")]
    pub login_retry_secs: u64,

    /// Extra root certificates to trust for the API connection.
    #[serde(default)]
    pub root_certs: Vec<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            base_uri: ConfigDefaults::api_base_uri(),
            timeout_secs: ConfigDefaults::api_timeout(),
            login_retry_secs: ConfigDefaults::api_login_retry(),
            root_certs: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct KeyStoreConfig {
    #[serde(default = "ConfigDefaults::key_store_name")]
    pub name: String,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        KeyStoreConfig { name: ConfigDefaults::key_store_name() }
    }
}

/// Settings of one CA in the hierarchy.
#[derive(Clone, Debug, Deserialize)]
pub struct CaSettings {
    pub name: String,
    pub dn: String,

    #[serde(default)]
    pub key: KeyParameters,

    pub validity_days: u32,
    pub crl_lifetime_hours: u32,
    pub crl_regeneration_hours: u32,

    /// Defaults to the CA name with a `.crl` extension.
    #[serde(default)]
    pub crl_file: Option<String>,

    /// Defaults to the CA name with a `.crt` extension.
    #[serde(default)]
    pub cert_file: Option<String>,

    #[serde(default)]
    pub policies: Vec<PolicyInformation>,
}

impl CaSettings {
    pub fn crl_file(&self) -> String {
        self.crl_file
            .clone()
            .unwrap_or_else(|| format!("{}.crl", file_stem(&self.name)))
    }

    pub fn cert_file(&self) -> String {
        self.cert_file
            .clone()
            .unwrap_or_else(|| format!("{}.crt", file_stem(&self.name)))
    }

    fn verify(&self, label: &str) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::other(&format!("{label}.name must not be empty")));
        }
        if !self.dn.contains('=') {
            return Err(ConfigError::Other(format!(
                "{label}.dn '{}' is not a distinguished name", self.dn
            )));
        }
        self.key.verify().map_err(|e| {
            ConfigError::Other(format!("{label}.key: {e}"))
        })?;
        if self.validity_days == 0 {
            return Err(ConfigError::other(&format!("{label}.validity_days must be at least 1")));
        }
        if self.crl_lifetime_hours == 0 {
            return Err(ConfigError::other(&format!("{label}.crl_lifetime_hours must be at least 1")));
        }
        if self.crl_regeneration_hours == 0
            || self.crl_regeneration_hours >= self.crl_lifetime_hours
        {
            return Err(ConfigError::other(&format!(
                "{label}.crl_regeneration_hours must be at least 1 and smaller than crl_lifetime_hours"
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CrlConfig {
    /// Where the product writes CRLs, defaults to `crl` in the install dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default = "ConfigDefaults::crl_uri_template")]
    pub uri_template: String,
}

impl Default for CrlConfig {
    fn default() -> Self {
        CrlConfig {
            dir: None,
            uri_template: ConfigDefaults::crl_uri_template(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProfileSettings {
    #[serde(default = "ConfigDefaults::profile_name")]
    pub name: String,

    #[serde(default = "ConfigDefaults::profile_lifetime_minutes")]
    pub lifetime_minutes: u64,

    #[serde(default = "ConfigDefaults::copy_sans")]
    pub copy_sans_from_request: bool,

    #[serde(default = "ConfigDefaults::extended_key_usages")]
    pub extended_key_usages: Vec<ExtendedKeyUsage>,

    #[serde(default = "ConfigDefaults::key_usages")]
    pub key_usages: Vec<KeyUsage>,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        ProfileSettings {
            name: ConfigDefaults::profile_name(),
            lifetime_minutes: ConfigDefaults::profile_lifetime_minutes(),
            copy_sans_from_request: ConfigDefaults::copy_sans(),
            extended_key_usages: ConfigDefaults::extended_key_usages(),
            key_usages: ConfigDefaults::key_usages(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct IssuerSettings {
    pub name: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CsrGeneratorSettings {
    #[serde(default = "ConfigDefaults::csr_generator_name")]
    pub name: String,

    #[serde(default = "ConfigDefaults::csr_key")]
    pub key: KeyParameters,
}

impl Default for CsrGeneratorSettings {
    fn default() -> Self {
        CsrGeneratorSettings {
            name: ConfigDefaults::csr_generator_name(),
            key: ConfigDefaults::csr_key(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct TeamSettings {
    pub name: String,

    /// Issuers to authorise for the team besides the one created here.
    #[serde(default)]
    pub additional_issuers: Vec<IssuerId>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TrustStoreConfig {
    #[serde(default = "ConfigDefaults::trust_store_kind")]
    pub kind: TrustStoreKind,

    #[serde(default = "ConfigDefaults::anchors_dir")]
    pub anchors_dir: PathBuf,

    /// Where intermediate CA certificates go. Must not be `anchors_dir`.
    #[serde(default = "ConfigDefaults::intermediates_dir")]
    pub intermediates_dir: PathBuf,

    /// Run after copying a certificate into `anchors_dir`. Empty to skip.
    #[serde(default = "ConfigDefaults::anchors_refresh")]
    pub refresh_command: Vec<String>,
}

impl Default for TrustStoreConfig {
    fn default() -> Self {
        TrustStoreConfig {
            kind: ConfigDefaults::trust_store_kind(),
            anchors_dir: ConfigDefaults::anchors_dir(),
            intermediates_dir: ConfigDefaults::intermediates_dir(),
            refresh_command: ConfigDefaults::anchors_refresh(),
        }
    }
}

/// # Accessors
impl Config {
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    pub fn login_retry(&self) -> Duration {
        Duration::from_secs(self.api.login_retry_secs)
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.artifact.timeout_secs)
    }

    /// Resolves an installer program against the install root.
    pub fn program_path(&self, program: &Path) -> PathBuf {
        if program.is_absolute() {
            program.to_path_buf()
        } else {
            self.artifact.install_root.join(program)
        }
    }

    pub fn bootstrap_certificate(&self) -> PathBuf {
        let cert = &self.installer.bootstrap_certificate;
        if cert.is_absolute() {
            cert.clone()
        } else {
            self.installer.install_dir.join(cert)
        }
    }

    /// The root certificates the API client trusts.
    pub fn api_root_certs(&self) -> Vec<PathBuf> {
        let mut certs = vec![self.bootstrap_certificate()];
        certs.extend(self.api.root_certs.iter().cloned());
        certs
    }

    pub fn crl_dir(&self) -> PathBuf {
        match &self.crl.dir {
            Some(dir) => dir.clone(),
            None => self.installer.install_dir.join("crl"),
        }
    }

    pub fn ui_uri(&self) -> &Url {
        self.ui_uri.as_ref().unwrap_or(&self.api.base_uri)
    }
}

/// # Loading and verification
impl Config {
    /// Reads and verifies the config file at `path`.
    pub fn create(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_config(path)?;
        config.verify()?;
        Ok(config)
    }

    pub fn read_config(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::IoError(path.to_path_buf(), e)
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn verify(&self) -> Result<(), ConfigError> {
        let credentials = [
            ("credentials.admin_username", &self.credentials.admin_username),
            ("credentials.admin_email", &self.credentials.admin_email),
            ("credentials.admin_password", &self.credentials.admin_password),
            ("credentials.db_admin_password", &self.credentials.db_admin_password),
            ("credentials.keystore_password", &self.credentials.keystore_password),
        ];
        for (name, value) in credentials {
            if value.is_empty() {
                return Err(ConfigError::Other(format!("{name} must not be empty")));
            }
        }

        for arg in self.prerequisite.args.iter()
            .chain(self.installer.args.iter())
            .chain(self.installer.agent_args.iter())
        {
            template::verify(arg, INSTALLER_PLACEHOLDERS)?;
        }
        template::verify(&self.crl.uri_template, CRL_URI_PLACEHOLDERS)?;

        match self.api.base_uri.scheme() {
            "https" | "http" => {}
            other => {
                return Err(ConfigError::Other(format!(
                    "api.base_uri must use http or https, not '{other}'"
                )))
            }
        }
        let timeouts = [
            ("api.timeout_secs", self.api.timeout_secs),
            ("artifact.timeout_secs", self.artifact.timeout_secs),
            ("prerequisite.timeout_secs", self.prerequisite.timeout_secs),
            ("installer.timeout_secs", self.installer.timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs == 0 {
                return Err(ConfigError::Other(format!("{name} must be at least 1")));
            }
        }

        self.root_ca.verify("root_ca")?;
        self.intermediate_ca.verify("intermediate_ca")?;
        if self.root_ca.name == self.intermediate_ca.name {
            return Err(ConfigError::other(
                "root_ca.name and intermediate_ca.name must differ",
            ));
        }
        if self.root_ca.cert_file() == self.intermediate_ca.cert_file() {
            return Err(ConfigError::other(
                "root_ca and intermediate_ca must use different cert files",
            ));
        }
        if self.root_ca.crl_file() == self.intermediate_ca.crl_file() {
            return Err(ConfigError::other(
                "root_ca and intermediate_ca must use different CRL files",
            ));
        }
        if self.intermediate_ca.validity_days > self.root_ca.validity_days {
            return Err(ConfigError::other(
                "intermediate_ca.validity_days must not exceed root_ca.validity_days",
            ));
        }

        if self.key_store.name.trim().is_empty() {
            return Err(ConfigError::other("key_store.name must not be empty"));
        }
        if self.profile.lifetime_minutes == 0 {
            return Err(ConfigError::other("profile.lifetime_minutes must be at least 1"));
        }
        if self.profile.key_usages.is_empty() {
            return Err(ConfigError::other("profile.key_usages must not be empty"));
        }
        if self.issuer.name.trim().is_empty() {
            return Err(ConfigError::other("issuer.name must not be empty"));
        }
        self.csr_generator.key.verify().map_err(|e| {
            ConfigError::Other(format!("csr_generator.key: {e}"))
        })?;
        if self.team.name.trim().is_empty() {
            return Err(ConfigError::other("team.name must not be empty"));
        }
        if self.trust_store.kind == TrustStoreKind::Anchors
            && self.trust_store.anchors_dir == self.trust_store.intermediates_dir
        {
            return Err(ConfigError::other(
                "trust_store.intermediates_dir must differ from anchors_dir",
            ));
        }

        Ok(())
    }
}

/// Turns a CA name into something usable as a file name.
fn file_stem(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect()
}

fn de_level_filter<'de, D>(d: D) -> Result<LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    let string = String::deserialize(d)?;
    LevelFilter::from_str(&string).map_err(|_| {
        de::Error::custom(format!(
            "expected \"off\", \"error\", \"warn\", \"info\", \"debug\", \
             or \"trace\", found: \"{string}\""
        ))
    })
}


//------------ Logging -------------------------------------------------------

impl Config {
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        match self.log_type {
            LogType::File => self.file_logger(&self.log_file),
            LogType::Stderr => self.stderr_logger(),
            LogType::Syslog => self.syslog_logger(),
        }
    }

    /// Creates a stderr logger.
    fn stderr_logger(&self) -> Result<(), ConfigError> {
        self.fern_logger()
            .chain(io::stderr())
            .apply()
            .map_err(|e| {
                ConfigError::Other(format!("Failed to init stderr logging: {e}"))
            })
    }

    /// Creates a file logger using the file provided by `path`.
    fn file_logger(&self, path: &Path) -> Result<(), ConfigError> {
        let file = match fern::log_file(path) {
            Ok(file) => file,
            Err(err) => {
                let error_string = format!(
                    "Failed to open log file '{}': {}", path.display(), err
                );
                error!("{}", error_string.as_str());
                return Err(ConfigError::Other(error_string));
            }
        };
        self.fern_logger()
            .chain(file)
            .apply()
            .map_err(|e| {
                ConfigError::Other(format!("Failed to init file logging: {e}"))
            })
    }

    /// Creates a syslog logger and configures correctly.
    #[cfg(unix)]
    fn syslog_logger(&self) -> Result<(), ConfigError> {
        let facility = syslog::Facility::from_str(&self.syslog_facility)
            .map_err(|_| ConfigError::other("Invalid syslog_facility"))?;
        let process = env::current_exe()
            .ok()
            .and_then(|path| {
                path.file_name()
                    .and_then(std::ffi::OsStr::to_str)
                    .map(ToString::to_string)
            })
            .unwrap_or_else(|| String::from("caprov"));
        let formatter = syslog::Formatter3164 {
            facility,
            hostname: None,
            process,
            pid: std::process::id(),
        };
        let logger = syslog::unix(formatter.clone())
            .or_else(|_| syslog::tcp(formatter.clone(), ("127.0.0.1", 601)))
            .or_else(|_| {
                syslog::udp(formatter, ("127.0.0.1", 0), ("127.0.0.1", 514))
            });
        match logger {
            Ok(logger) => self
                .fern_logger()
                .chain(logger)
                .apply()
                .map_err(|e| {
                    ConfigError::Other(format!("Failed to init syslog: {e}"))
                }),
            Err(err) => {
                let msg = format!("Cannot connect to syslog: {err}");
                Err(ConfigError::Other(msg))
            }
        }
    }

    #[cfg(not(unix))]
    fn syslog_logger(&self) -> Result<(), ConfigError> {
        Err(ConfigError::other("syslog is not supported on this platform"))
    }

    /// Creates and returns a fern logger with log level tweaks
    fn fern_logger(&self) -> fern::Dispatch {
        // suppress overly noisy logging
        let framework_level = self.log_level.min(LevelFilter::Warn);

        let show_target = self.log_level == LevelFilter::Trace
            || self.log_level == LevelFilter::Debug;
        fern::Dispatch::new()
            .format(move |out, message, record| {
                if show_target {
                    out.finish(format_args!(
                        "{} [{}] [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        record.target(),
                        message
                    ))
                } else {
                    out.finish(format_args!(
                        "{} [{}] {}",
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                        record.level(),
                        message
                    ))
                }
            })
            .level(self.log_level)
            .level_for("rustls", framework_level)
            .level_for("hyper", framework_level)
            .level_for("hyper_util", framework_level)
            .level_for("mio", framework_level)
            .level_for("reqwest", framework_level)
            .level_for("want", framework_level)
            .level_for("h2", framework_level)
    }
}


//------------ ConfigError ---------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, io::Error),
    TomlError(toml::de::Error),
    Template(TemplateError),
    Other(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "Cannot read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlError(e) => e.fmt(f),
            ConfigError::Template(e) => e.fmt(f),
            ConfigError::Other(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for ConfigError {}

impl ConfigError {
    pub fn other(s: &str) -> ConfigError {
        ConfigError::Other(s.to_string())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::TomlError(e)
    }
}

impl From<TemplateError> for ConfigError {
    fn from(e: TemplateError) -> Self {
        ConfigError::Template(e)
    }
}


//------------ LogType -------------------------------------------------------

/// The target to log to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LogType {
    Stderr,
    File,
    Syslog,
}

impl<'de> Deserialize<'de> for LogType {
    fn deserialize<D>(d: D) -> Result<LogType, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.as_str() {
            "stderr" => Ok(LogType::Stderr),
            "file" => Ok(LogType::File),
            "syslog" => Ok(LogType::Syslog),
            _ => Err(de::Error::custom(format!(
                "expected \"stderr\", \"file\", or \"syslog\", found: \"{string}\""
            ))),
        }
    }
}


//------------ TrustStoreKind ------------------------------------------------

/// How certificates are added to the trust store of this host.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrustStoreKind {
    /// Windows `certutil`.
    Certutil,

    /// Copy into an anchor directory and refresh.
    Anchors,
}

impl<'de> Deserialize<'de> for TrustStoreKind {
    fn deserialize<D>(d: D) -> Result<TrustStoreKind, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(d)?;
        match string.as_str() {
            "certutil" => Ok(TrustStoreKind::Certutil),
            "anchors" => Ok(TrustStoreKind::Anchors),
            _ => Err(de::Error::custom(format!(
                "expected \"certutil\" or \"anchors\", found: \"{string}\""
            ))),
        }
    }
}


//------------ Tests ---------------------------------------------------------
