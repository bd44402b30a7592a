#![allow(dead_code)] // Different tests use different parts.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64::Engine;
use openssl::asn1::Asn1Time;
use openssl::bn::BigNum;
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::x509::{X509, X509Builder, X509NameBuilder};
use tempfile::TempDir;
use url::Url;

use caprov::api::{
    AdminApi, ApiError, CaConfigId, CaConfigInfo, CaConfigRequest,
    CertProfileRequest, CsrGeneratorRequest, GeneratorId, IssuerId,
    IssuerRequest, KeyStoreId, KeyStoreRequest, ProfileId, Team, TeamId,
    Token,
};
use caprov::config::Config;
use caprov::install::InstallCommand;
use caprov::local::{Host, HostError};
use caprov::local::fqdn::HostName;
use caprov::local::process::ExitOutcome;
use caprov::local::truststore::{StoreLocation, TrustStore, TrustStoreError};

pub const TOKEN: &str = "fake-session-token";
pub const EXISTING_ISSUER: &str = "issuer-existing";


//------------ TestConfig ----------------------------------------------------

/// A config with all local paths below a temporary directory.
pub struct TestConfig {
    pub dir: TempDir,
    login_retry_secs: u64,
    api_uri: String,
    api_timeout_secs: u64,
    fqdn: Option<String>,
    additional_issuers: Vec<String>,
    team: String,
}

impl TestConfig {
    pub fn new() -> Self {
        TestConfig {
            dir: TempDir::new().unwrap(),
            login_retry_secs: 0,
            api_uri: "https://localhost/".into(),
            api_timeout_secs: 30,
            fqdn: None,
            additional_issuers: Vec::new(),
            team: "Administrators".into(),
        }
    }

    pub fn login_retry_secs(mut self, secs: u64) -> Self {
        self.login_retry_secs = secs;
        self
    }

    pub fn api(mut self, uri: &str, timeout_secs: u64) -> Self {
        self.api_uri = uri.into();
        self.api_timeout_secs = timeout_secs;
        self
    }

    pub fn fqdn(mut self, fqdn: &str) -> Self {
        self.fqdn = Some(fqdn.into());
        self
    }

    pub fn additional_issuer(mut self, id: &str) -> Self {
        self.additional_issuers.push(id.into());
        self
    }

    pub fn team(mut self, name: &str) -> Self {
        self.team = name.into();
        self
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn build(&self) -> Config {
        let path = |rel: &str| self.path(rel).display().to_string();
        let fqdn = match &self.fqdn {
            Some(fqdn) => format!("fqdn = '{fqdn}'"),
            None => String::new(),
        };
        let additional = self.additional_issuers.iter()
            .map(|id| format!("'{id}'"))
            .collect::<Vec<_>>()
            .join(", ");

        let toml = format!(r#"
            log_level = "debug"
            cert_dir = '{certs}'
            {fqdn}

            [artifact]
            uri = "https://downloads.example.net/pki/installer.tar.gz"
            download_path = '{download}'
            install_root = '{setup}'

            [prerequisite]
            program = "redist/prereq.sh"
            args = ["--quiet", "--norestart"]

            [installer]
            program = "setup.sh"
            args = [
                "--admin-password", "{{admin_password}}",
                "--db-password", "{{db_admin_password}}",
                "--listen", "{{listen_address}}:{{listen_port}}",
            ]
            install_dir = '{pki}'
            bootstrap_certificate = "certs/bootstrap.pem"

            [credentials]
            admin_email = "admin@example.net"
            admin_password = "password"
            db_admin_password = "db-secret"
            keystore_password = "ks-secret"

            [api]
            base_uri = "{api}"
            timeout_secs = {timeout}
            login_retry_secs = {retry}

            [root_ca]
            name = "Test Root"
            dn = "CN=Test Root,O=Org"
            validity_days = 7300
            crl_lifetime_hours = 8760
            crl_regeneration_hours = 720

            [intermediate_ca]
            name = "Test Issuing"
            dn = "CN=Test Issuing,O=Org"
            validity_days = 3650
            crl_lifetime_hours = 168
            crl_regeneration_hours = 24

            [issuer]
            name = "TLS Issuer"

            [team]
            name = "{team}"
            additional_issuers = [{additional}]

            [trust_store]
            kind = "anchors"
            anchors_dir = '{anchors}'
            intermediates_dir = '{intermediates}'
            refresh_command = []
        "#,
            certs = path("certs"),
            fqdn = fqdn,
            download = path("installer.tar.gz"),
            setup = path("setup"),
            pki = path("pki"),
            api = self.api_uri,
            timeout = self.api_timeout_secs,
            retry = self.login_retry_secs,
            team = self.team,
            additional = additional,
            anchors = path("anchors"),
            intermediates = path("intermediates"),
        );

        let config = Config::parse(&toml).unwrap();
        config.verify().unwrap();
        config
    }
}

impl Default for TestConfig {
    fn default() -> Self {
        Self::new()
    }
}


//------------ Certificates --------------------------------------------------

/// Creates a self-signed certificate with the given simple DN.
pub fn certificate(dn: &str) -> X509 {
    let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
    let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    for part in dn.split(',') {
        let (field, value) = part.split_once('=').unwrap();
        name.append_entry_by_text(field.trim(), value.trim()).unwrap();
    }
    let name = name.build();

    let mut builder = X509Builder::new().unwrap();
    builder.set_version(2).unwrap();
    let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
    builder.set_serial_number(&serial).unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder.set_not_before(&Asn1Time::days_from_now(0).unwrap()).unwrap();
    builder.set_not_after(&Asn1Time::days_from_now(365).unwrap()).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    builder.build()
}


//------------ FakeAdminApi --------------------------------------------------

/// An in-memory stand-in for the product's administrative API.
///
/// Clones share their state, so a second run sees what the first created.
#[derive(Clone)]
pub struct FakeAdminApi {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Default)]
pub struct FakeState {
    next_id: u32,
    pub login_attempts: usize,
    pub logouts: usize,
    pub calls: Vec<&'static str>,

    pub key_stores: Vec<(KeyStoreId, KeyStoreRequest)>,
    pub ca_configs: Vec<(CaConfigId, CaConfigRequest)>,
    pub ocsp: Vec<CaConfigId>,
    pub profiles: Vec<(ProfileId, CertProfileRequest)>,
    pub issuers: Vec<(IssuerId, IssuerRequest)>,
    pub generators: Vec<(GeneratorId, CsrGeneratorRequest)>,
    pub teams: Vec<Team>,

    /// Fail every call of the given name with the error.
    pub failures: HashMap<&'static str, ApiError>,

    /// Answer that many logins with `Unavailable` before accepting one.
    pub unavailable_logins: usize,

    /// Created CA configs cannot be found later.
    pub forget_ca_configs: bool,

    /// Return something that isn't a certificate for new CA configs.
    pub garbage_certificates: bool,
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

impl FakeAdminApi {
    pub fn new() -> Self {
        let mut state = FakeState::default();
        state.teams.push(Team {
            id: "team-1".into(),
            name: "Administrators".into(),
            authorised_cas: vec![EXISTING_ISSUER.into()],
        });
        FakeAdminApi { state: Arc::new(Mutex::new(state)) }
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn fail(&self, call: &'static str, err: ApiError) {
        self.state().failures.insert(call, err);
    }

    /// Records the call and checks the session.
    fn enter(
        &self, call: &'static str, token: &Token
    ) -> Result<std::sync::MutexGuard<'_, FakeState>, ApiError> {
        let mut state = self.state();
        state.calls.push(call);
        if let Some(err) = state.failures.get(call) {
            return Err(err.clone());
        }
        if token.as_ref() != TOKEN {
            return Err(ApiError::Unauthorized("invalid session".into()));
        }
        Ok(state)
    }
}

impl Default for FakeAdminApi {
    fn default() -> Self {
        Self::new()
    }
}

fn conflict(kind: &str, name: &str) -> ApiError {
    ApiError::Conflict(format!("{kind} '{name}' already exists"))
}

impl AdminApi for FakeAdminApi {
    async fn login(
        &self, username: &str, password: &str
    ) -> Result<Token, ApiError> {
        let mut state = self.state();
        state.calls.push("login");
        state.login_attempts += 1;
        if let Some(err) = state.failures.get("login") {
            return Err(err.clone());
        }
        if state.unavailable_logins > 0 {
            state.unavailable_logins -= 1;
            return Err(ApiError::Unavailable("service is starting".into()));
        }
        if username == "admin" && password == "password" {
            Ok(Token::from(TOKEN))
        } else {
            Err(ApiError::Unauthorized("wrong credentials".into()))
        }
    }

    async fn logout(&self, token: &Token) -> Result<(), ApiError> {
        let mut state = self.enter("logout", token)?;
        state.logouts += 1;
        Ok(())
    }

    async fn create_key_store(
        &self, token: &Token, req: &KeyStoreRequest
    ) -> Result<KeyStoreId, ApiError> {
        let mut state = self.enter("create_key_store", token)?;
        if state.key_stores.iter().any(|(_, ks)| ks.name == req.name) {
            return Err(conflict("key store", &req.name));
        }
        let id = KeyStoreId::from(state.next_id("ks"));
        state.key_stores.push((id.clone(), req.clone()));
        Ok(id)
    }

    async fn create_local_ca_config(
        &self, token: &Token, req: &CaConfigRequest
    ) -> Result<CaConfigInfo, ApiError> {
        let mut state = self.enter("create_local_ca_config", token)?;
        if !state.key_stores.iter().any(|(id, _)| *id == req.key_store_id) {
            return Err(ApiError::NotFound(format!(
                "key store {}", req.key_store_id
            )));
        }
        if let Some(issuer) = &req.issuer_id {
            if !state.ca_configs.iter().any(|(id, _)| id == issuer) {
                return Err(ApiError::NotFound(format!("CA config {issuer}")));
            }
        }
        if state.ca_configs.iter().any(|(_, ca)| ca.name == req.name) {
            return Err(conflict("CA config", &req.name));
        }

        let id = CaConfigId::from(state.next_id("ca"));
        let cert = certificate(&req.subject_dn);

        // Roots come back as PEM, intermediates as bare base64 DER.
        let certificate = if state.garbage_certificates {
            "not a certificate".to_string()
        } else if req.is_root {
            String::from_utf8(cert.to_pem().unwrap()).unwrap()
        } else {
            base64::engine::general_purpose::STANDARD
                .encode(cert.to_der().unwrap())
        };
        if !state.forget_ca_configs {
            state.ca_configs.push((id.clone(), req.clone()));
        }
        Ok(CaConfigInfo { id, certificate })
    }

    async fn set_ocsp_for_local_ca(
        &self, token: &Token, ca: &CaConfigId
    ) -> Result<(), ApiError> {
        let mut state = self.enter("set_ocsp_for_local_ca", token)?;
        if !state.ca_configs.iter().any(|(id, _)| id == ca) {
            return Err(ApiError::NotFound(format!("CA config {ca}")));
        }
        state.ocsp.push(ca.clone());
        Ok(())
    }

    async fn create_cert_profile(
        &self, token: &Token, req: &CertProfileRequest
    ) -> Result<ProfileId, ApiError> {
        let mut state = self.enter("create_cert_profile", token)?;
        if state.profiles.iter().any(|(_, p)| p.name == req.name) {
            return Err(conflict("profile", &req.name));
        }
        let id = ProfileId::from(state.next_id("profile"));
        state.profiles.push((id.clone(), req.clone()));
        Ok(id)
    }

    async fn create_local_ca(
        &self, token: &Token, req: &IssuerRequest
    ) -> Result<IssuerId, ApiError> {
        let mut state = self.enter("create_local_ca", token)?;
        if state.issuers.iter().any(|(_, i)| i.name == req.name) {
            return Err(conflict("issuer", &req.name));
        }
        if !state.profiles.iter().any(|(id, _)| *id == req.profile_id) {
            return Err(ApiError::NotFound(format!("profile {}", req.profile_id)));
        }
        let id = IssuerId::from(state.next_id("issuer"));
        state.issuers.push((id.clone(), req.clone()));
        Ok(id)
    }

    async fn create_csr_generator(
        &self, token: &Token, req: &CsrGeneratorRequest
    ) -> Result<GeneratorId, ApiError> {
        let mut state = self.enter("create_csr_generator", token)?;
        if state.generators.iter().any(|(_, g)| g.name == req.name) {
            return Err(conflict("CSR generator", &req.name));
        }
        let id = GeneratorId::from(state.next_id("gen"));
        state.generators.push((id.clone(), req.clone()));
        Ok(id)
    }

    async fn get_team(
        &self, token: &Token, name: &str
    ) -> Result<Team, ApiError> {
        let state = self.enter("get_team", token)?;
        state.teams.iter()
            .find(|team| team.name == name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("team {name}")))
    }

    async fn update_team(
        &self, token: &Token, team: &TeamId, authorised_cas: &[IssuerId]
    ) -> Result<(), ApiError> {
        let mut state = self.enter("update_team", token)?;
        match state.teams.iter_mut().find(|t| t.id == *team) {
            Some(t) => {
                t.authorised_cas = authorised_cas.to_vec();
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("team {team}"))),
        }
    }
}


//------------ FakeHost ------------------------------------------------------

/// A machine that only records what is done to it.
pub struct FakeHost {
    pub calls: Mutex<Vec<String>>,
    pub installer_outcomes: HashMap<PathBuf, ExitOutcome>,
    pub host_name: Option<HostName>,
    pub fetch_fails: bool,
    pub unpack_fails: bool,
    pub browser_fails: bool,
}

impl FakeHost {
    pub fn new() -> Self {
        FakeHost {
            calls: Mutex::new(Vec::new()),
            installer_outcomes: HashMap::new(),
            host_name: Some(HostName::Qualified("pki.example.net".into())),
            fetch_fails: false,
            unpack_fails: false,
            browser_fails: false,
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Default for FakeHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for FakeHost {
    async fn fetch_artifact(
        &self, uri: &Url, dest: &Path, _timeout: std::time::Duration
    ) -> Result<u64, HostError> {
        self.record(format!("fetch {uri}"));
        if self.fetch_fails {
            return Err(HostError::Other("404 Not Found".into()));
        }
        caprov::commons::file::save(b"archive", dest)?;
        Ok(7)
    }

    async fn unpack_artifact(
        &self, archive: &Path, dest: &Path
    ) -> Result<usize, HostError> {
        self.record(format!(
            "unpack {} {}",
            archive.file_name().unwrap().to_string_lossy(),
            dest.file_name().unwrap().to_string_lossy(),
        ));
        if self.unpack_fails {
            return Err(HostError::Other("corrupt archive".into()));
        }
        Ok(1)
    }

    async fn run_program(
        &self, command: &InstallCommand
    ) -> Result<ExitOutcome, HostError> {
        self.record(format!(
            "run {}", command.program.file_name().unwrap().to_string_lossy()
        ));
        Ok(self.installer_outcomes
            .get(&command.program)
            .copied()
            .unwrap_or(ExitOutcome::Success))
    }

    async fn local_fqdn(&self) -> Result<HostName, HostError> {
        self.record("fqdn".into());
        self.host_name
            .clone()
            .ok_or_else(|| HostError::Other("no hostname".into()))
    }

    fn open_browser(&self, uri: &Url) -> Result<(), HostError> {
        self.record(format!("browse {uri}"));
        if self.browser_fails {
            Err(HostError::Other("no display".into()))
        } else {
            Ok(())
        }
    }
}


//------------ FakeTrustStore ------------------------------------------------

/// A trust store remembering what was imported.
pub struct FakeTrustStore {
    pub privileged: bool,
    pub imports: Mutex<Vec<(PathBuf, StoreLocation)>>,
}

impl FakeTrustStore {
    pub fn new() -> Self {
        FakeTrustStore { privileged: true, imports: Mutex::new(Vec::new()) }
    }

    pub fn imports(&self) -> Vec<(PathBuf, StoreLocation)> {
        self.imports.lock().unwrap().clone()
    }
}

impl Default for FakeTrustStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TrustStore for FakeTrustStore {
    async fn check_privileges(&self) -> Result<(), TrustStoreError> {
        if self.privileged {
            Ok(())
        } else {
            Err(TrustStoreError::NotPrivileged("not an administrator".into()))
        }
    }

    async fn import_certificate(
        &self, cert: &Path, location: StoreLocation
    ) -> Result<(), TrustStoreError> {
        self.imports.lock().unwrap().push((cert.to_path_buf(), location));
        Ok(())
    }
}
