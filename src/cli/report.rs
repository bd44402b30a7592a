//! Formatting results for the user.

use std::{fmt, path::PathBuf, str::FromStr};

use serde::Serialize;

use crate::provision::Provisioned;
use crate::provision::progress::CaRecord;


//------------ ReportFormat --------------------------------------------------

/// The format to use when presenting a result.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, ReportError> {
        match s {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            _ => Err(ReportError::UnrecognisedFormat(s.to_string())),
        }
    }
}


//------------ ReportError ---------------------------------------------------

#[derive(Debug)]
pub enum ReportError {
    UnrecognisedFormat(String),
    Json(serde_json::Error),
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReportError::UnrecognisedFormat(s) => {
                write!(f, "This report format is not recognised: {s}")
            }
            ReportError::Json(e) => write!(f, "Cannot format report: {e}"),
        }
    }
}

impl std::error::Error for ReportError {}

impl From<serde_json::Error> for ReportError {
    fn from(e: serde_json::Error) -> Self {
        ReportError::Json(e)
    }
}


//------------ Report --------------------------------------------------------

/// Implemented by everything the command line tool prints.
pub trait Report: Serialize {
    fn text(&self) -> String;

    fn report(&self, format: ReportFormat) -> Result<String, ReportError> {
        match format {
            ReportFormat::Text => Ok(self.text()),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

impl Report for Provisioned {
    fn text(&self) -> String {
        fn push_ca(res: &mut String, label: &str, ca: &CaRecord) {
            res.push_str(&format!("{label}: {} ({})\n", ca.name, ca.id));
            res.push_str(&format!("  subject:     {}\n", ca.subject));
            res.push_str(&format!("  certificate: {}\n", ca.cert_file.display()));
        }

        let mut res = String::new();
        res.push_str(&format!("FQDN:          {}\n", self.fqdn));
        res.push_str(&format!("Key store:     {}\n", self.key_store));
        push_ca(&mut res, "Root CA", &self.root_ca);
        push_ca(&mut res, "Intermediate CA", &self.intermediate_ca);
        res.push_str(&format!("Profile:       {}\n", self.profile));
        res.push_str(&format!("Issuer:        {}\n", self.issuer));
        res.push_str(&format!("CSR generator: {}\n", self.csr_generator));
        res.push_str(&format!("Team:          {} ({})\n", self.team.name, self.team.id));
        res.push_str("  authorised issuers:\n");
        for id in &self.team.authorised_cas {
            res.push_str(&format!("    {id}\n"));
        }
        if !self.warnings.is_empty() {
            res.push_str("Warnings:\n");
            for warning in &self.warnings {
                res.push_str(&format!("  {warning}\n"));
            }
        }
        res
    }
}


//------------ Checked -------------------------------------------------------

/// The result of checking a configuration.
#[derive(Clone, Debug, Serialize)]
pub struct Checked {
    pub config: PathBuf,
    pub api: String,
    pub team: String,
}

impl Report for Checked {
    fn text(&self) -> String {
        format!(
            "Configuration {} is valid and the trust store is writable.\n\
             The API at {} will be provisioned for team '{}'.\n",
            self.config.display(), self.api, self.team
        )
    }
}


//------------ Tests ---------------------------------------------------------
