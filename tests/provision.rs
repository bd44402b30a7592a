//! Complete provisioning runs against in-memory fakes.

mod common;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use caprov::api::{ApiError, IssuerId};
use caprov::local::fqdn::HostName;
use caprov::local::process::ExitOutcome;
use caprov::local::truststore::StoreLocation;
use caprov::provision::cert::CaCertificate;
use caprov::provision::error::CaFailure;
use caprov::provision::{ProvisionError, Provisioner, Step};
use common::{
    FakeAdminApi, FakeHost, FakeTrustStore, TestConfig, EXISTING_ISSUER,
};

fn read_cert(path: &Path) -> CaCertificate {
    let text = std::fs::read_to_string(path).unwrap();
    assert!(text.starts_with("-----BEGIN CERTIFICATE-----"));
    CaCertificate::parse(&text).unwrap()
}

#[tokio::test]
async fn full_run_provisions_everything() {
    let test = TestConfig::new();
    let config = test.build();
    let api = FakeAdminApi::new();
    let provisioner = Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    );

    let provisioned = provisioner.run().await.unwrap();

    {
        let state = api.state();
        assert_eq!(state.key_stores.len(), 1);
        assert_eq!(state.key_stores[0].1.name, "caprov-keystore");
        assert_eq!(state.key_stores[0].1.password, "ks-secret");
        assert_eq!(state.ca_configs.len(), 2);
        assert_eq!(state.profiles.len(), 1);
        assert_eq!(state.issuers.len(), 1);
        assert_eq!(state.generators.len(), 1);
        assert_eq!(state.logouts, 1);

        // OCSP is enabled for the intermediate only.
        assert_eq!(state.ocsp, vec![state.ca_configs[1].0.clone()]);

        let team = &state.teams[0];
        assert_eq!(
            team.authorised_cas,
            vec![IssuerId::from(EXISTING_ISSUER), provisioned.issuer.clone()]
        );
    }

    assert_eq!(provisioned.fqdn, "pki.example.net");
    assert!(provisioned.warnings.is_empty());

    let root = read_cert(&provisioned.root_ca.cert_file);
    assert!(root.subject_matches("CN=Test Root,O=Org"));
    let intermediate = read_cert(&provisioned.intermediate_ca.cert_file);
    assert!(intermediate.subject_matches("CN=Test Issuing,O=Org"));
    assert_eq!(provisioned.root_ca.cert_file, test.path("certs/test-root.crt"));
    assert_eq!(
        provisioned.intermediate_ca.cert_file,
        test.path("certs/test-issuing.crt")
    );

    assert_eq!(
        provisioner.trust_store().imports(),
        vec![
            (test.path("pki/certs/bootstrap.pem"), StoreLocation::Root),
            (provisioned.root_ca.cert_file.clone(), StoreLocation::Root),
            (
                provisioned.intermediate_ca.cert_file.clone(),
                StoreLocation::IntermediateCa
            ),
        ]
    );

    assert_eq!(
        provisioner.host().calls(),
        vec![
            "fetch https://downloads.example.net/pki/installer.tar.gz".to_string(),
            "unpack installer.tar.gz setup".to_string(),
            "run prereq.sh".to_string(),
            "run setup.sh".to_string(),
            "fqdn".to_string(),
            "browse https://localhost/".to_string(),
        ]
    );
}

#[tokio::test]
async fn second_run_fails_at_key_store() {
    let test = TestConfig::new();
    let config = test.build();
    let api = FakeAdminApi::new();

    Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    ).run().await.unwrap();

    let second = Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    );
    let failure = second.run().await.unwrap_err();

    assert_eq!(failure.step, Step::CreateKeyStore);
    match &failure.error {
        ProvisionError::KeyStoreCreation { name, cause } => {
            assert_eq!(name, "caprov-keystore");
            assert!(matches!(cause, ApiError::Conflict(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(failure.to_string().starts_with("step 'create-key-store' failed: "));

    let state = api.state();
    assert_eq!(state.key_stores.len(), 1);
    assert_eq!(state.ca_configs.len(), 2);

    // The session of the failed run was closed as well.
    assert_eq!(state.logouts, 2);
}

#[tokio::test]
async fn intermediate_is_issued_by_root() {
    let config = TestConfig::new().build();
    let api = FakeAdminApi::new();
    let provisioned = Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    ).run().await.unwrap();

    let state = api.state();
    let (root_id, root) = &state.ca_configs[0];
    let (intermediate_id, intermediate) = &state.ca_configs[1];

    assert!(root.is_root);
    assert_eq!(root.issuer_id, None);
    assert_eq!(root.subject_dn, "CN=Test Root,O=Org");
    assert!(!intermediate.is_root);
    assert_eq!(intermediate.issuer_id.as_ref(), Some(root_id));
    assert_eq!(intermediate.key_store_id, root.key_store_id);

    assert_eq!(&provisioned.root_ca.id, root_id);
    assert_eq!(&provisioned.intermediate_ca.id, intermediate_id);

    let (_, issuer) = &state.issuers[0];
    assert_eq!(&issuer.ca_config_id, intermediate_id);
    assert_eq!(issuer.profile_id, state.profiles[0].0);
}

#[tokio::test]
async fn crl_settings_use_fqdn_and_cadence() {
    let test = TestConfig::new();
    let config = test.build();
    let api = FakeAdminApi::new();
    Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    ).run().await.unwrap();

    let state = api.state();
    let root = &state.ca_configs[0].1.crl;
    assert_eq!(root.distribution_point, "http://pki.example.net/crl/test-root.crl");
    assert_eq!(root.lifetime_hours, 8760);
    assert_eq!(root.regeneration_hours, 720);
    assert_eq!(
        PathBuf::from(&root.file_path),
        test.path("pki/crl/test-root.crl")
    );

    let intermediate = &state.ca_configs[1].1.crl;
    assert_eq!(
        intermediate.distribution_point,
        "http://pki.example.net/crl/test-issuing.crl"
    );
    assert_eq!(intermediate.lifetime_hours, 168);
    assert_eq!(intermediate.regeneration_hours, 24);
}

#[tokio::test]
async fn plain_hostname_is_used_without_domain() {
    let config = TestConfig::new().build();
    let api = FakeAdminApi::new();
    let mut host = FakeHost::new();
    host.host_name = Some(HostName::Unqualified("pki".into()));

    let provisioned = Provisioner::new(
        &config, api.clone(), host, FakeTrustStore::new()
    ).run().await.unwrap();

    assert_eq!(provisioned.fqdn, "pki");
    assert_eq!(
        api.state().ca_configs[0].1.crl.distribution_point,
        "http://pki/crl/test-root.crl"
    );
}

#[tokio::test]
async fn configured_fqdn_wins() {
    let config = TestConfig::new().fqdn("ca.example.org").build();
    let provisioner = Provisioner::new(
        &config, FakeAdminApi::new(), FakeHost::new(), FakeTrustStore::new()
    );
    let provisioned = provisioner.run().await.unwrap();

    assert_eq!(provisioned.fqdn, "ca.example.org");
    assert!(!provisioner.host().calls().contains(&"fqdn".to_string()));
}

#[tokio::test]
async fn missing_hostname_fails() {
    let config = TestConfig::new().build();
    let mut host = FakeHost::new();
    host.host_name = None;

    let failure = Provisioner::new(
        &config, FakeAdminApi::new(), host, FakeTrustStore::new()
    ).run().await.unwrap_err();

    assert_eq!(failure.step, Step::ResolveFqdn);
    assert!(matches!(failure.error, ProvisionError::HostResolution(_)));
}

#[tokio::test]
async fn failed_prerequisite_stops_the_run() {
    let test = TestConfig::new();
    let config = test.build();
    let api = FakeAdminApi::new();
    let mut host = FakeHost::new();
    host.installer_outcomes.insert(
        test.path("setup/redist/prereq.sh"), ExitOutcome::Code(3)
    );

    let provisioner = Provisioner::new(
        &config, api.clone(), host, FakeTrustStore::new()
    );
    let failure = provisioner.run().await.unwrap_err();

    assert_eq!(failure.step, Step::InstallPrerequisites);
    assert!(matches!(failure.error, ProvisionError::PrerequisiteInstall { .. }));
    assert!(failure.to_string().contains("exited with status 3"));

    assert!(!provisioner.host().calls().contains(&"run setup.sh".to_string()));
    assert!(provisioner.trust_store().imports().is_empty());
    assert!(api.state().calls.is_empty());
}

#[tokio::test]
async fn installer_log_hides_secrets() {
    let test = TestConfig::new();
    let config = test.build();
    let mut host = FakeHost::new();
    host.installer_outcomes.insert(
        test.path("setup/setup.sh"), ExitOutcome::Code(1)
    );

    let failure = Provisioner::new(
        &config, FakeAdminApi::new(), host, FakeTrustStore::new()
    ).run().await.unwrap_err();

    assert_eq!(failure.step, Step::InstallProduct);
    let msg = failure.to_string();
    assert!(msg.contains("{db_admin_password}"));
    assert!(!msg.contains("db-secret"));
}

#[tokio::test]
async fn failure_after_login_closes_session() {
    let config = TestConfig::new().build();
    let api = FakeAdminApi::new();
    api.fail("create_cert_profile", ApiError::Rejected("bad lifetime".into()));

    let provisioner = Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    );
    let failure = provisioner.run().await.unwrap_err();

    assert_eq!(failure.step, Step::CreateProfile);
    assert!(matches!(
        failure.error, ProvisionError::ProfileCreation { .. }
    ));

    let state = api.state();
    assert_eq!(state.logouts, 1);
    assert!(state.issuers.is_empty());
    assert!(!state.calls.contains(&"create_local_ca"));

    // Only the bootstrap certificate made it into the trust store.
    assert_eq!(provisioner.trust_store().imports().len(), 1);
    assert!(!provisioner.host().calls().iter().any(|c| c.starts_with("browse")));
}

#[tokio::test]
async fn unknown_root_is_reported_as_such() {
    let config = TestConfig::new().build();
    let api = FakeAdminApi::new();
    api.state().forget_ca_configs = true;

    let failure = Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    ).run().await.unwrap_err();

    assert_eq!(failure.step, Step::CreateIntermediateCa);
    match failure.error {
        ProvisionError::IssuerNotFound { name, issuer, .. } => {
            assert_eq!(name, "Test Issuing");
            assert_eq!(issuer.as_ref(), "ca-2");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn unknown_root_message_names_the_issuing_ca() {
    let config = TestConfig::new().build();
    let api = FakeAdminApi::new();
    api.state().forget_ca_configs = true;

    let failure = Provisioner::new(
        &config, api, FakeHost::new(), FakeTrustStore::new()
    ).run().await.unwrap_err();

    let msg = failure.to_string();
    assert!(msg.contains("under issuing CA 'ca-2'"));
    assert!(!msg.contains("does not exist"));
}

#[tokio::test]
async fn failed_download_stops_the_run() {
    let config = TestConfig::new().build();
    let mut host = FakeHost::new();
    host.fetch_fails = true;
    let api = FakeAdminApi::new();

    let provisioner = Provisioner::new(
        &config, api.clone(), host, FakeTrustStore::new()
    );
    let failure = provisioner.run().await.unwrap_err();

    assert_eq!(failure.step, Step::FetchInstaller);
    assert!(matches!(failure.error, ProvisionError::Download { .. }));
    assert!(failure.to_string().contains("404 Not Found"));
    assert!(!provisioner.host().calls().iter().any(|c| c.starts_with("unpack")));
    assert!(api.state().calls.is_empty());
}

#[tokio::test]
async fn failed_extraction_stops_the_run() {
    let config = TestConfig::new().build();
    let mut host = FakeHost::new();
    host.unpack_fails = true;

    let provisioner = Provisioner::new(
        &config, FakeAdminApi::new(), host, FakeTrustStore::new()
    );
    let failure = provisioner.run().await.unwrap_err();

    assert_eq!(failure.step, Step::UnpackInstaller);
    assert!(matches!(failure.error, ProvisionError::Extraction { .. }));
    assert!(!provisioner.host().calls().iter().any(|c| c.starts_with("run")));
}

#[tokio::test]
async fn unusable_certificate_fails_root_creation() {
    let config = TestConfig::new().build();
    let api = FakeAdminApi::new();
    api.state().garbage_certificates = true;

    let provisioner = Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    );
    let failure = provisioner.run().await.unwrap_err();

    assert_eq!(failure.step, Step::CreateRootCa);
    assert!(matches!(
        failure.error,
        ProvisionError::CaConfig { cause: CaFailure::Certificate(_), .. }
    ));
    assert_eq!(api.state().logouts, 1);
}

#[tokio::test]
async fn api_failures_map_to_their_step() {
    let cases = [
        ("set_ocsp_for_local_ca", Step::EnableOcsp),
        ("create_local_ca", Step::CreateIssuer),
        ("create_csr_generator", Step::CreateCsrGenerator),
        ("update_team", Step::AuthorizeTeam),
    ];
    for (call, step) in cases {
        let config = TestConfig::new().build();
        let api = FakeAdminApi::new();
        api.fail(call, ApiError::Conflict("already exists".into()));

        let provisioner = Provisioner::new(
            &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
        );
        let failure = provisioner.run().await.unwrap_err();

        assert_eq!(failure.step, step, "{call}");
        let matched = match (&step, &failure.error) {
            (Step::EnableOcsp, ProvisionError::OcspBinding { .. }) => true,
            (Step::CreateIssuer, ProvisionError::IssuerCreation { .. }) => true,
            (
                Step::CreateCsrGenerator,
                ProvisionError::GeneratorCreation { .. }
            ) => true,
            (
                Step::AuthorizeTeam,
                ProvisionError::AuthorizationUpdate {
                    cause: ApiError::Conflict(_), ..
                }
            ) => true,
            _ => false,
        };
        assert!(matched, "{call}: {}", failure.error);
        assert_eq!(api.state().logouts, 1, "{call}");
        assert_eq!(provisioner.trust_store().imports().len(), 1, "{call}");
    }
}

#[tokio::test]
async fn best_effort_steps_do_not_fail_the_run() {
    let config = TestConfig::new().build();
    let api = FakeAdminApi::new();
    api.fail("logout", ApiError::Unavailable("gone".into()));
    let mut host = FakeHost::new();
    host.browser_fails = true;

    let provisioner = Provisioner::new(
        &config, api.clone(), host, FakeTrustStore::new()
    );
    let provisioned = provisioner.run().await.unwrap();

    assert_eq!(provisioned.warnings.len(), 2);
    assert!(provisioned.warnings[0].starts_with("close-session: "));
    assert!(provisioned.warnings[1].starts_with("launch-browser: "));

    // Certificates are imported even though logging out failed.
    assert_eq!(provisioner.trust_store().imports().len(), 3);
}

#[tokio::test]
async fn missing_privileges_fail_before_anything_happens() {
    let config = TestConfig::new().build();
    let mut trust_store = FakeTrustStore::new();
    trust_store.privileged = false;

    let provisioner = Provisioner::new(
        &config, FakeAdminApi::new(), FakeHost::new(), trust_store
    );
    let failure = provisioner.run().await.unwrap_err();

    assert_eq!(failure.step, Step::Preflight);
    assert!(matches!(failure.error, ProvisionError::Privileges(_)));
    assert!(provisioner.host().calls().is_empty());
}

#[tokio::test]
async fn unknown_team_fails() {
    let config = TestConfig::new().team("Nobody").build();
    let failure = Provisioner::new(
        &config, FakeAdminApi::new(), FakeHost::new(), FakeTrustStore::new()
    ).run().await.unwrap_err();

    assert_eq!(failure.step, Step::AuthorizeTeam);
    match failure.error {
        ProvisionError::TeamUpdate { team, cause } => {
            assert_eq!(team, "Nobody");
            assert!(matches!(cause, ApiError::NotFound(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn additional_issuers_are_authorised() {
    let config = TestConfig::new()
        .additional_issuer("code-signing")
        .additional_issuer(EXISTING_ISSUER)
        .build();
    let api = FakeAdminApi::new();
    let provisioned = Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    ).run().await.unwrap();

    let expected: Vec<IssuerId> = vec![
        EXISTING_ISSUER.into(), "code-signing".into(), provisioned.issuer.clone()
    ];
    assert_eq!(api.state().teams[0].authorised_cas, expected);
    assert_eq!(provisioned.team.authorised_cas, expected);
}

#[tokio::test]
async fn rejected_login_is_not_retried() {
    let config = TestConfig::new().login_retry_secs(30).build();
    let api = FakeAdminApi::new();
    api.fail("login", ApiError::Unauthorized("wrong credentials".into()));

    let started = Instant::now();
    let failure = Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    ).run().await.unwrap_err();

    assert_eq!(failure.step, Step::Authenticate);
    assert!(matches!(
        failure.error,
        ProvisionError::Authentication { cause: ApiError::Unauthorized(_), .. }
    ));
    assert_eq!(api.state().login_attempts, 1);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn unavailable_service_is_retried() {
    let config = TestConfig::new().login_retry_secs(30).build();
    let api = FakeAdminApi::new();
    api.state().unavailable_logins = 2;

    Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    ).run().await.unwrap();

    assert_eq!(api.state().login_attempts, 3);
}

#[tokio::test]
async fn no_retry_without_budget() {
    let config = TestConfig::new().build();
    let api = FakeAdminApi::new();
    api.state().unavailable_logins = 1;

    let failure = Provisioner::new(
        &config, api.clone(), FakeHost::new(), FakeTrustStore::new()
    ).run().await.unwrap_err();

    assert_eq!(failure.step, Step::Authenticate);
    assert_eq!(api.state().login_attempts, 1);
}
