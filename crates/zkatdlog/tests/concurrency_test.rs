//! Concurrency tests
//!
//! Provers and the validator share nothing mutable: many threads can build
//! and check requests over the same public parameters at once.

use std::collections::HashMap;

use rand::rngs::OsRng;
use rayon::prelude::*;
use zkatdlog::identity::schnorr::{SchnorrDeserializer, SchnorrSigningIdentity};
use zkatdlog::identity::Signer;
use zkatdlog::{setup, Action, Issuer, Result, Sender, SetupConfig, TokenID, TokenRequest, Validator};

const ITERATIONS: usize = 1000;

#[test]
fn test_parallel_transfers() {
    let issuer = SchnorrSigningIdentity::new(&mut OsRng);
    let alice = SchnorrSigningIdentity::new(&mut OsRng);
    let pp = setup(&SetupConfig::bulletproof(16), &mut OsRng)
        .unwrap()
        .with_issuer(issuer.identity());
    let validator = Validator::new(pp.clone(), Box::new(SchnorrDeserializer)).unwrap();

    let (issued, metadata) = Issuer::new("ABC", &issuer, &pp)
        .generate_zk_issue(&[42], vec![alice.identity().into_bytes()], &mut OsRng)
        .unwrap();
    let id = TokenID::new("tx0", 0);
    let ledger: HashMap<TokenID, Vec<u8>> = HashMap::from([(id.clone(), issued.outputs[0].serialize().unwrap())]);

    let sender = Sender::new(vec![&alice as &dyn Signer], issued.outputs.clone(), vec![id], metadata, &pp).unwrap();

    // Every iteration proposes its own split of the same token, so each
    // one proves and checks the range of two outputs
    let results: Vec<Result<Vec<Action>>> = (0..ITERATIONS)
        .into_par_iter()
        .map(|i| -> Result<Vec<Action>> {
            let recipient = SchnorrSigningIdentity::new(&mut OsRng);
            let owners = vec![recipient.identity().into_bytes(), alice.identity().into_bytes()];
            let (action, _) = sender.generate_zk_transfer(&[40, 2], owners, &mut OsRng)?;
            assert_eq!(action.get_output_commitments().len(), 2);

            let tx_id = format!("tx{}", i + 1);
            let mut request = TokenRequest::new();
            request.add_transfer(&action)?;
            request.signatures = sender.sign_token_actions(&request.marshal_to_message()?, &tx_id)?;
            validator.verify_token_request_from_raw(
                |id: &TokenID| Ok(ledger.get(id).cloned().unwrap_or_default()),
                &tx_id,
                &request.serialize()?,
            )
        })
        .collect();

    assert_eq!(results.len(), ITERATIONS);
    for result in results {
        let actions = result.unwrap();
        assert!(matches!(actions.as_slice(), [Action::Transfer(_)]));
    }
}

#[test]
fn test_parallel_issue_verification() {
    let issuer = SchnorrSigningIdentity::new(&mut OsRng);
    let pp = setup(&SetupConfig::membership(16, 2), &mut OsRng).unwrap();
    let generator = Issuer::new("ABC", &issuer, &pp);

    let verified = (0..ITERATIONS)
        .into_par_iter()
        .map(|i| -> Result<()> {
            let values = [i as u64 % 256, 255 - i as u64 % 256];
            let (action, _) = generator.generate_zk_issue(&values, vec![b"alice".to_vec(); 2], &mut OsRng)?;
            zkatdlog::issue::Verifier::new(action.get_commitments(), false, &pp).verify(&action.proof)
        })
        .filter(Result::is_ok)
        .count();
    assert_eq!(verified, ITERATIONS);
}
