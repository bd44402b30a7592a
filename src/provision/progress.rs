//! What a provisioning run has achieved so far.

use std::path::PathBuf;

use serde::Serialize;

use crate::api::{
    CaConfigId, GeneratorId, IssuerId, KeyStoreId, ProfileId, TeamId, Token,
};
use super::error::ProvisionError;
use super::step::Step;


//------------ CaRecord ------------------------------------------------------

/// A CA created during the run.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct CaRecord {
    pub name: String,
    pub id: CaConfigId,
    pub subject: String,
    pub cert_file: PathBuf,
}


//------------ TeamRecord ----------------------------------------------------

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct TeamRecord {
    pub id: TeamId,
    pub name: String,
    pub authorised_cas: Vec<IssuerId>,
}


//------------ Progress ------------------------------------------------------

/// The results of the steps run so far.
///
/// Each step records what it created here, later steps take their inputs
/// from it.
#[derive(Debug, Default)]
pub struct Progress {
    pub token: Option<Token>,
    pub key_store: Option<KeyStoreId>,
    pub fqdn: Option<String>,
    pub root_ca: Option<CaRecord>,
    pub intermediate_ca: Option<CaRecord>,
    pub profile: Option<ProfileId>,
    pub issuer: Option<IssuerId>,
    pub csr_generator: Option<GeneratorId>,
    pub team: Option<TeamRecord>,

    /// Failures of best-effort steps.
    pub warnings: Vec<String>,
}

impl Progress {
    /// Returns a recorded value or the error naming what is missing.
    pub fn require<'a, T>(
        value: &'a Option<T>,
        step: Step,
        needs: &'static str,
    ) -> Result<&'a T, ProvisionError> {
        value
            .as_ref()
            .ok_or(ProvisionError::MissingPrerequisite { step, needs })
    }

    /// Converts the completed progress into the run's result.
    pub fn finish(self, step: Step) -> Result<Provisioned, ProvisionError> {
        let missing = |needs| ProvisionError::MissingPrerequisite { step, needs };
        Ok(Provisioned {
            fqdn: self.fqdn.ok_or_else(|| missing("the FQDN"))?,
            key_store: self.key_store.ok_or_else(|| missing("the key store"))?,
            root_ca: self.root_ca.ok_or_else(|| missing("the root CA"))?,
            intermediate_ca: self
                .intermediate_ca
                .ok_or_else(|| missing("the intermediate CA"))?,
            profile: self.profile.ok_or_else(|| missing("the profile"))?,
            issuer: self.issuer.ok_or_else(|| missing("the issuer"))?,
            csr_generator: self
                .csr_generator
                .ok_or_else(|| missing("the CSR generator"))?,
            team: self.team.ok_or_else(|| missing("the team"))?,
            warnings: self.warnings,
        })
    }
}


//------------ Provisioned ---------------------------------------------------

/// Everything a successful run created.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Provisioned {
    pub fqdn: String,
    pub key_store: KeyStoreId,
    pub root_ca: CaRecord,
    pub intermediate_ca: CaRecord,
    pub profile: ProfileId,
    pub issuer: IssuerId,
    pub csr_generator: GeneratorId,
    pub team: TeamRecord,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}


//------------ Tests ---------------------------------------------------------
