//! The REST binding of the administrative API.

use std::{path::PathBuf, sync::OnceLock, time::Duration};

use log::trace;
use url::Url;

use crate::commons::httpclient;
use super::{
    AdminApi, ApiError, CaConfigId, CaConfigInfo, CaConfigRequest,
    CertProfileRequest, CsrGeneratorRequest, GeneratorId, IdResponse,
    IssuerId, IssuerRequest, KeyStoreId, KeyStoreRequest, LoginRequest,
    LoginResponse, ProfileId, Team, TeamAuthorisationUpdate, TeamId, Token,
};


//------------ HttpAdminApi --------------------------------------------------

/// Talks to the administrative API of an installed product over HTTPS.
pub struct HttpAdminApi {
    server: Url,
    timeout: Duration,
    root_certs: Vec<PathBuf>,
    client: OnceLock<reqwest::Client>,
}

impl HttpAdminApi {
    /// Creates a client for the server at `server`.
    ///
    /// Every request is bounded by `timeout`. The certificates in
    /// `root_certs` are trusted on top of the system roots. They are loaded
    /// with the first request, so they may be written after this call.
    pub fn new(server: Url, timeout: Duration, root_certs: Vec<PathBuf>) -> Self {
        HttpAdminApi {
            server,
            timeout,
            root_certs,
            client: OnceLock::new(),
        }
    }

    pub fn with_client(server: Url, client: reqwest::Client) -> Self {
        HttpAdminApi {
            server,
            timeout: Duration::ZERO,
            root_certs: Vec::new(),
            client: OnceLock::from(client),
        }
    }

    fn client(&self) -> Result<&reqwest::Client, ApiError> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = httpclient::client(
            self.server.as_str(), self.timeout, &self.root_certs
        )?;
        Ok(self.client.get_or_init(|| client))
    }

    /// Resolves the segments below the server's base path.
    ///
    /// Segments are percent-encoded, so identifiers can be passed as is.
    fn resolve_uri(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut uri = self.server.clone();
        uri.path_segments_mut()
            .map_err(|_| {
                ApiError::Protocol(format!(
                    "server URI {} cannot be used as a base", self.server
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        trace!("Resolved API URI: {uri}");
        Ok(uri)
    }

    fn api_uri(&self, path: &[&str]) -> Result<String, ApiError> {
        let mut segments = vec!["api", "v1"];
        segments.extend_from_slice(path);
        self.resolve_uri(&segments).map(String::from)
    }
}

impl AdminApi for HttpAdminApi {
    async fn login(
        &self, username: &str, password: &str
    ) -> Result<Token, ApiError> {
        let uri = self.api_uri(&["auth", "login"])?;
        let res: LoginResponse = httpclient::post_json_with_response(
            self.client()?,
            &uri,
            LoginRequest { username, password },
            None,
        ).await?;
        Ok(res.token)
    }

    async fn logout(&self, token: &Token) -> Result<(), ApiError> {
        let uri = self.api_uri(&["auth", "logout"])?;
        httpclient::post_empty(self.client()?, &uri, Some(token)).await?;
        Ok(())
    }

    async fn create_key_store(
        &self, token: &Token, req: &KeyStoreRequest
    ) -> Result<KeyStoreId, ApiError> {
        let uri = self.api_uri(&["keystores"])?;
        let res: IdResponse<KeyStoreId> = httpclient::post_json_with_response(
            self.client()?, &uri, req, Some(token)
        ).await?;
        Ok(res.id)
    }

    async fn create_local_ca_config(
        &self, token: &Token, req: &CaConfigRequest
    ) -> Result<CaConfigInfo, ApiError> {
        let uri = self.api_uri(&["ca-configs"])?;
        let info = httpclient::post_json_with_response(
            self.client()?, &uri, req, Some(token)
        ).await?;
        Ok(info)
    }

    async fn set_ocsp_for_local_ca(
        &self, token: &Token, ca: &CaConfigId
    ) -> Result<(), ApiError> {
        let uri = self.api_uri(&["ca-configs", ca.as_ref(), "ocsp"])?;
        httpclient::post_empty(self.client()?, &uri, Some(token)).await?;
        Ok(())
    }

    async fn create_cert_profile(
        &self, token: &Token, req: &CertProfileRequest
    ) -> Result<ProfileId, ApiError> {
        let uri = self.api_uri(&["cert-profiles"])?;
        let res: IdResponse<ProfileId> = httpclient::post_json_with_response(
            self.client()?, &uri, req, Some(token)
        ).await?;
        Ok(res.id)
    }

    async fn create_local_ca(
        &self, token: &Token, req: &IssuerRequest
    ) -> Result<IssuerId, ApiError> {
        let uri = self.api_uri(&["issuers"])?;
        let res: IdResponse<IssuerId> = httpclient::post_json_with_response(
            self.client()?, &uri, req, Some(token)
        ).await?;
        Ok(res.id)
    }

    async fn create_csr_generator(
        &self, token: &Token, req: &CsrGeneratorRequest
    ) -> Result<GeneratorId, ApiError> {
        let uri = self.api_uri(&["csr-generators"])?;
        let res: IdResponse<GeneratorId> = httpclient::post_json_with_response(
            self.client()?, &uri, req, Some(token)
        ).await?;
        Ok(res.id)
    }

    async fn get_team(
        &self, token: &Token, name: &str
    ) -> Result<Team, ApiError> {
        let mut uri = self.resolve_uri(&["api", "v1", "teams"])?;
        uri.query_pairs_mut().append_pair("name", name);
        let team = httpclient::get_json(
            self.client()?, uri.as_str(), Some(token)
        ).await?;
        Ok(team)
    }

    async fn update_team(
        &self, token: &Token, team: &TeamId, authorised_cas: &[IssuerId]
    ) -> Result<(), ApiError> {
        let uri = self.api_uri(&["teams", team.as_ref(), "authorised-cas"])?;
        httpclient::put_json(
            self.client()?,
            &uri,
            TeamAuthorisationUpdate { authorised_cas },
            Some(token),
        ).await?;
        Ok(())
    }
}


//------------ Tests ---------------------------------------------------------
