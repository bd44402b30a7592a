//! The command line options.

use std::path::PathBuf;

use clap::Parser;

use crate::api::http::HttpAdminApi;
use crate::config::Config;
use crate::constants::{CAPROV_DEFAULT_CONFIG_FILE, CAPROV_ENV_CONFIG};
use crate::local::SystemHost;
use crate::local::truststore::SystemTrustStore;
use crate::provision::Provisioner;
use super::Error;
use super::report::{Checked, Report, ReportFormat};


//------------ Options -------------------------------------------------------

/// The command line options for the provisioner.
#[derive(clap::Parser)]
#[command(
    version,
    about = "Installs a PKI product and provisions its CA hierarchy.",
)]
pub struct Options {
    #[command(flatten)]
    pub general: GeneralOptions,

    #[command(subcommand)]
    pub command: Command,
}

impl Options {
    /// Creates the options from the process arguments.
    ///
    /// If the arguments won’t result in usable options, exits the process.
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Runs the selected command and returns the formatted result.
    pub async fn run(self) -> Result<String, Error> {
        let config = Config::create(&self.general.config)?;
        config.init_logging()?;
        self.command.run(&self.general, &config).await
    }
}


//------------ GeneralOptions ------------------------------------------------

#[derive(clap::Args)]
pub struct GeneralOptions {
    /// Path to the configuration file.
    #[arg(
        short, long,
        env = CAPROV_ENV_CONFIG,
        default_value = CAPROV_DEFAULT_CONFIG_FILE,
        value_name = "FILE",
    )]
    pub config: PathBuf,

    /// Report format
    #[arg(short, long, default_value = "text")]
    pub format: ReportFormat,
}


//------------ Command -------------------------------------------------------

#[derive(clap::Subcommand)]
pub enum Command {
    /// Install the product and provision the CA hierarchy.
    ///
    /// Meant for a fresh host. Entities created by an earlier run make a
    /// second run fail.
    Run,

    /// Verify the configuration and the trust store privileges only.
    Check,
}

impl Command {
    pub async fn run(
        self, general: &GeneralOptions, config: &Config
    ) -> Result<String, Error> {
        let provisioner = Provisioner::new(
            config,
            HttpAdminApi::new(
                config.api.base_uri.clone(),
                config.api_timeout(),
                config.api_root_certs(),
            ),
            SystemHost,
            SystemTrustStore::from_config(&config.trust_store),
        );

        match self {
            Command::Run => {
                let provisioned = provisioner.run().await?;
                Ok(provisioned.report(general.format)?)
            }
            Command::Check => {
                provisioner.preflight().await?;
                let checked = Checked {
                    config: general.config.clone(),
                    api: config.api.base_uri.to_string(),
                    team: config.team.name.clone(),
                };
                Ok(checked.report(general.format)?)
            }
        }
    }
}


//------------ Tests ---------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_arguments() {
        let options = Options::try_parse_from([
            "caprov", "--config", "/etc/caprov.conf", "--format", "json", "run"
        ]).unwrap();
        assert_eq!(options.general.config, PathBuf::from("/etc/caprov.conf"));
        assert_eq!(options.general.format, ReportFormat::Json);
        assert!(matches!(options.command, Command::Run));
    }

    #[test]
    fn reject_unknown_format() {
        assert!(Options::try_parse_from(
            ["caprov", "--format", "xml", "check"]
        ).is_err());
    }

    #[test]
    fn command_is_required() {
        assert!(Options::try_parse_from(["caprov"]).is_err());
    }
}
