//! Token lifecycle tests
//!
//! Issue, open, transfer and audit tokens over both range proof engines,
//! and check that tampered actions are caught.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::rngs::OsRng;
use zkatdlog::audit::get_audit_info_for_issues;
use zkatdlog::identity::schnorr::{SchnorrDeserializer, SchnorrSigningIdentity};
use zkatdlog::identity::Signer;
use zkatdlog::math::zr_from_u64;
use zkatdlog::request::{IssueMetadata, TransferMetadata};
use zkatdlog::{
    issue, setup, transfer, Auditor, IssueAction, Issuer, Metadata, PublicParams, RangeEngine, Result, Sender,
    SetupConfig, TokenID, TokenRequest, TokenRequestMetadata,
};

/// Signer counting how many times it was asked to sign
struct CountingSigner {
    inner: SchnorrSigningIdentity,
    count: AtomicUsize,
}

impl CountingSigner {
    fn new() -> Self {
        Self {
            inner: SchnorrSigningIdentity::new(&mut OsRng),
            count: AtomicUsize::new(0),
        }
    }
}

impl Signer for CountingSigner {
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.inner.sign(message)
    }
}

fn issue_abc(pp: &PublicParams, owner: &SchnorrSigningIdentity) -> (SchnorrSigningIdentity, IssueAction, Vec<Metadata>) {
    let issuer = SchnorrSigningIdentity::new(&mut OsRng);
    let (action, metadata) = Issuer::new("ABC", &issuer, pp)
        .generate_zk_issue(&[50, 20], vec![owner.identity().into_bytes(); 2], &mut OsRng)
        .unwrap();
    (issuer, action, metadata)
}

fn issue_metadata(
    issuer: &SchnorrSigningIdentity,
    action: &IssueAction,
    metadata: &[Metadata],
    owner: &SchnorrSigningIdentity,
) -> IssueMetadata {
    IssueMetadata {
        issuer: issuer.identity(),
        outputs: action.outputs.iter().map(|t| t.serialize().unwrap()).collect(),
        outputs_metadata: metadata.iter().map(|m| m.serialize().unwrap()).collect(),
        receivers: vec![owner.identity(); action.outputs.len()],
        receivers_audit_infos: vec![owner.identity().into_bytes(); action.outputs.len()],
    }
}

#[test]
fn test_membership_issue() {
    let pp = setup(&SetupConfig::membership(100, 2), &mut OsRng).unwrap();
    assert_eq!(pp.range_engine(), RangeEngine::Membership);
    assert_eq!(pp.max_token_value(), 9999);

    let alice = SchnorrSigningIdentity::new(&mut OsRng);
    let (_, action, metadata) = issue_abc(&pp, &alice);
    issue::Verifier::new(action.get_commitments(), false, &pp)
        .verify(&action.proof)
        .unwrap();

    // The action survives the wire
    let back = IssueAction::deserialize(&action.serialize().unwrap()).unwrap();
    assert_eq!(back, action);

    let quantities: Vec<_> = action
        .outputs
        .iter()
        .zip(&metadata)
        .map(|(t, m)| t.to_clear(m, &pp.pedersen_generators).unwrap().quantity)
        .collect();
    assert_eq!(quantities, vec!["0x32", "0x14"]);

    // Changing a committed value breaks the proof
    let mut coms = action.get_commitments();
    coms[1] += pp.pedersen_generators[1];
    assert!(issue::Verifier::new(coms, false, &pp).verify(&action.proof).is_err());

    // So does swapping two commitments
    let mut coms = action.get_commitments();
    coms.swap(0, 1);
    assert!(issue::Verifier::new(coms, false, &pp).verify(&action.proof).is_err());

    // So does claiming the issue was anonymous
    assert!(issue::Verifier::new(action.get_commitments(), true, &pp)
        .verify(&action.proof)
        .is_err());
}

#[test]
fn test_value_out_of_range() {
    let pp = setup(&SetupConfig::membership(100, 2), &mut OsRng).unwrap();
    let issuer = SchnorrSigningIdentity::new(&mut OsRng);
    assert!(Issuer::new("ABC", &issuer, &pp)
        .generate_zk_issue(&[10_000], vec![b"alice".to_vec()], &mut OsRng)
        .is_err());

    let pp = setup(&SetupConfig::bulletproof(8), &mut OsRng).unwrap();
    assert!(Issuer::new("ABC", &issuer, &pp)
        .generate_zk_issue(&[256], vec![b"alice".to_vec()], &mut OsRng)
        .is_err());
}

#[test]
fn test_transfer_conservation() {
    for config in [SetupConfig::bulletproof(16), SetupConfig::membership(16, 4)] {
        let pp = setup(&config, &mut OsRng).unwrap();
        let alice = SchnorrSigningIdentity::new(&mut OsRng);
        let (_, issued, metadata) = issue_abc(&pp, &alice);
        let sender = Sender::new(
            vec![&alice as &dyn Signer, &alice],
            issued.outputs.clone(),
            vec![TokenID::new("tx0", 0), TokenID::new("tx0", 1)],
            metadata,
            &pp,
        )
        .unwrap();

        let (action, _) = sender
            .generate_zk_transfer(&[23, 47], vec![b"bob".to_vec(), b"carol".to_vec()], &mut OsRng)
            .unwrap();
        let verifier = transfer::Verifier::new(action.get_input_commitments(), action.get_output_commitments(), &pp);
        verifier.verify(&action.proof).unwrap();

        // Outputs worth more than the inputs yield a proof nobody accepts
        let (inflated, _) = sender
            .generate_zk_transfer(&[60, 11], vec![b"bob".to_vec(), b"carol".to_vec()], &mut OsRng)
            .unwrap();
        let err = transfer::Verifier::new(
            inflated.get_input_commitments(),
            inflated.get_output_commitments(),
            &pp,
        )
        .verify(&inflated.proof)
        .unwrap_err();
        assert_eq!(err.root().to_string(), "invalid zero-knowledge transfer");

        // Dropping an output breaks conservation
        let outputs = action.get_output_commitments()[..1].to_vec();
        assert!(transfer::Verifier::new(action.get_input_commitments(), outputs, &pp)
            .verify(&action.proof)
            .is_err());
    }
}

#[test]
fn test_transfer_mixed_types_rejected() {
    let pp = setup(&SetupConfig::bulletproof(16), &mut OsRng).unwrap();
    let alice = SchnorrSigningIdentity::new(&mut OsRng);
    let issuer = SchnorrSigningIdentity::new(&mut OsRng);
    let (abc, abc_meta) = Issuer::new("ABC", &issuer, &pp)
        .generate_zk_issue(&[5], vec![alice.identity().into_bytes()], &mut OsRng)
        .unwrap();
    let (xyz, xyz_meta) = Issuer::new("XYZ", &issuer, &pp)
        .generate_zk_issue(&[5], vec![alice.identity().into_bytes()], &mut OsRng)
        .unwrap();

    let sender = Sender::new(
        vec![&alice as &dyn Signer, &alice],
        vec![abc.outputs[0].clone(), xyz.outputs[0].clone()],
        vec![TokenID::new("tx0", 0), TokenID::new("tx1", 0)],
        vec![abc_meta[0].clone(), xyz_meta[0].clone()],
        &pp,
    )
    .unwrap();
    let err = sender
        .generate_zk_transfer(&[10], vec![b"bob".to_vec()], &mut OsRng)
        .unwrap_err();
    assert!(err.to_string().contains("same token type"));
}

#[test]
fn test_audit_issue() {
    let pp = setup(&SetupConfig::membership(100, 2), &mut OsRng).unwrap();
    let alice = SchnorrSigningIdentity::new(&mut OsRng);
    let (issuer, action, metadata) = issue_abc(&pp, &alice);

    let mut request = TokenRequest::new();
    request.add_issue(&action).unwrap();
    let mut md = TokenRequestMetadata {
        issues: vec![issue_metadata(&issuer, &action, &metadata, &alice)],
        ..Default::default()
    };

    let signer = CountingSigner::new();
    let auditor = Auditor::new(&SchnorrDeserializer, &signer, pp.pedersen_generators.clone());
    let audit = |md: &TokenRequestMetadata| -> Result<Vec<u8>> {
        auditor.check(&request, md, &[], "tx0")?;
        auditor.endorse(&request, "tx0")
    };

    // An altered value is caught before anything is signed
    let honest = md.clone();
    let mut opening = Metadata::deserialize(&md.issues[0].outputs_metadata[1]).unwrap();
    opening.value = zr_from_u64(21);
    md.issues[0].outputs_metadata[1] = opening.serialize().unwrap();
    let err = audit(&md).unwrap_err();
    assert_eq!(
        err.root().to_string(),
        "output at index [1] does not match the provided opening"
    );
    assert_eq!(signer.count.load(Ordering::SeqCst), 0);

    audit(&honest).unwrap();
    assert_eq!(signer.count.load(Ordering::SeqCst), 1);

    let tokens = get_audit_info_for_issues(&request.issues, &honest.issues).unwrap();
    assert_eq!(tokens[0].len(), 2);
    assert_eq!(tokens[0][1].data.as_ref().unwrap().token_type, "ABC");
}

#[test]
fn test_audit_transfer() {
    let pp = setup(&SetupConfig::bulletproof(16), &mut OsRng).unwrap();
    let alice = SchnorrSigningIdentity::new(&mut OsRng);
    let bob = SchnorrSigningIdentity::new(&mut OsRng);
    let (_, issued, metadata) = issue_abc(&pp, &alice);

    let ids = vec![TokenID::new("tx0", 0), TokenID::new("tx0", 1)];
    let sender = Sender::new(
        vec![&alice as &dyn Signer, &alice],
        issued.outputs.clone(),
        ids.clone(),
        metadata,
        &pp,
    )
    .unwrap();
    let (action, out_meta) = sender
        .generate_zk_transfer(&[70], vec![bob.identity().into_bytes()], &mut OsRng)
        .unwrap();

    let mut request = TokenRequest::new();
    request.add_transfer(&action).unwrap();
    let mut md = TokenRequestMetadata {
        transfers: vec![TransferMetadata {
            token_ids: ids,
            senders: vec![alice.identity(); 2],
            sender_audit_infos: vec![alice.identity().into_bytes(); 2],
            outputs: vec![action.output_tokens[0].serialize().unwrap()],
            outputs_metadata: vec![out_meta[0].serialize().unwrap()],
            output_audit_infos: vec![bob.identity().into_bytes()],
            receivers: vec![bob.identity()],
            receiver_audit_infos: vec![bob.identity().into_bytes()],
            receiver_is_sender: vec![false],
        }],
        ..Default::default()
    };
    assert_eq!(md.get_token_info(&md.transfers[0].outputs[0]), Some(&md.transfers[0].outputs_metadata[0][..]));

    let signer = CountingSigner::new();
    let auditor = Auditor::new(&SchnorrDeserializer, &signer, pp.pedersen_generators.clone());
    auditor
        .check(&request, &md, &[issued.outputs.clone()], "tx1")
        .unwrap();

    // A sender hiding behind someone else's audit info
    md.transfers[0].sender_audit_infos[1] = bob.identity().into_bytes();
    let err = auditor
        .check(&request, &md, &[issued.outputs.clone()], "tx1")
        .unwrap_err();
    assert!(err
        .root()
        .to_string()
        .starts_with("owner at index [1] does not match the provided opening"));

    // Inputs must be supplied for every transfer
    assert!(auditor.check(&request, &md, &[], "tx1").is_err());
    assert_eq!(signer.count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_public_params_round_trip() {
    let issuer = SchnorrSigningIdentity::new(&mut OsRng);
    let pp = setup(&SetupConfig::membership(100, 2), &mut OsRng)
        .unwrap()
        .with_issuer(issuer.identity());
    let raw = pp.serialize().unwrap();
    let back = PublicParams::deserialize(&raw, "zkatdlog").unwrap();
    back.validate().unwrap();
    assert_eq!(back, pp);
    assert_eq!(back.issuers(), &[issuer.identity()][..]);

    assert!(PublicParams::deserialize(&raw, "other").is_err());
}
