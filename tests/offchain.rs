//! Off-ledger attestation, publication and revocation

use alloy_primitives::Address;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notary::codec::{decode, Claim};
use notary::config::{ProfileSet, ProfileSpec};
use notary::ledger::InMemoryLedger;
use notary::publish::{decode_locator, OffchainPublisher, STORE_PATH};
use notary::services::{AttestationService, ServiceConfig};
use notary::signing::{DelegationTarget, OffchainVersion, Wallet};
use notary::types::to_hex;

const SPEC: &str = "bytes16 MeetingId,uint8 MeetingType,uint32 StartTime,uint32 EndTime";

fn claim() -> Claim {
    Claim {
        recipient: "0x00000000000000000000000000000000000000a1".into(),
        meeting_id: "standup-42".into(),
        meeting_type: 2,
        start_time: 1_700_000_000,
        end_time: 1_700_003_600,
    }
}

async fn service(index: &str, version: OffchainVersion) -> (Arc<InMemoryLedger>, AttestationService) {
    let eas = Address::repeat_byte(0x21);
    let ledger = Arc::new(InMemoryLedger::new(11155420, eas, Address::repeat_byte(0x20), "1.3.0"));
    let profiles = ProfileSet::resolve(vec![ProfileSpec {
        name: "default".into(),
        schema: SPEC.into(),
        resolver: Address::ZERO,
        revocable: false,
        delegation: DelegationTarget::Eas,
        expected_uid: None,
    }])
    .unwrap();

    let svc = AttestationService::new(
        ledger.clone(),
        OffchainPublisher::new(index, Duration::from_secs(2)).unwrap(),
        Wallet::random(),
        Wallet::random(),
        profiles,
        ServiceConfig {
            eas,
            schema_registry: Address::repeat_byte(0x20),
            offchain_version: version,
            ..ServiceConfig::default()
        },
        "1.3.0",
    )
    .await
    .unwrap();
    (ledger, svc)
}

#[tokio::test]
async fn test_offchain_attestation_is_published() {
    let index = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STORE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "offchainAttestationId": "1" })))
        .expect(1)
        .mount(&index)
        .await;

    let (_, svc) = service(&index.uri(), OffchainVersion::V2).await;
    let profile = svc.profile(None).unwrap().clone();
    let outcome = svc.attest_offchain(&profile, &claim()).await.unwrap();

    assert!(outcome.upload_succeeded);
    assert!(outcome.locator_url.starts_with(&index.uri()));

    let signed = &outcome.signed_attestation;
    assert!(signed.verify(&svc.attester()));
    assert_eq!(signed.message.schema, profile.uid);
    assert_eq!(signed.domain.chain_id, 11155420);

    let fields = decode(&profile.schema, &signed.message.data).unwrap();
    assert_eq!(fields.meeting_type, 2);
    assert_eq!(fields.start_time, 1_700_000_000);
    assert_eq!(fields.end_time, 1_700_003_600);

    let compact = decode_locator(&outcome.locator_url).unwrap();
    assert_eq!(compact[7], to_hex(signed.uid));
    assert_eq!(compact.as_array().unwrap().len(), 18);
}

#[tokio::test]
async fn test_upload_failure_does_not_undo_signature() {
    let index = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(STORE_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&index)
        .await;

    let (_, svc) = service(&index.uri(), OffchainVersion::V1).await;
    let profile = svc.profile(None).unwrap().clone();
    let outcome = svc.attest_offchain(&profile, &claim()).await.unwrap();

    assert!(!outcome.upload_succeeded);
    assert!(outcome.signed_attestation.verify(&svc.attester()));
    assert!(outcome.signed_attestation.message.salt.is_none());
    assert_eq!(decode_locator(&outcome.locator_url).unwrap().as_array().unwrap().len(), 17);
}

#[tokio::test]
async fn test_offchain_revocation_is_recorded_once() {
    let (ledger, svc) = service("http://127.0.0.1:9", OffchainVersion::V2).await;
    let profile = svc.profile(None).unwrap().clone();
    let outcome = svc.attest_offchain(&profile, &claim()).await.unwrap();
    let digest = outcome.signed_attestation.uid;

    svc.revoke_offchain(digest).await.unwrap();
    assert!(ledger.offchain_revocation(svc.attester(), digest).await.is_some());

    let err = svc.revoke_offchain(digest).await.unwrap_err();
    assert_eq!(err.kind(), "already_revoked");
}
