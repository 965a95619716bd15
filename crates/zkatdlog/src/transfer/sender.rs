//! Building transfer actions from owned tokens

use log::debug;
use rand_core::{CryptoRng, RngCore};

use super::{new_transfer, Prover, TransferAction};
use crate::error::{Result, ResultExt, ZkatError};
use crate::identity::Signer;
use crate::math;
use crate::setup::PublicParams;
use crate::token::{get_tokens_with_witness, Metadata, Token, TokenDataWitness, TokenID};

/// Spends tokens it holds the openings of
pub struct Sender<'a> {
    /// One signer per input, in input order
    signers: Vec<&'a dyn Signer>,
    inputs: Vec<Token>,
    input_ids: Vec<TokenID>,
    input_information: Vec<Metadata>,
    pp: &'a PublicParams,
}

impl<'a> Sender<'a> {
    pub fn new(
        signers: Vec<&'a dyn Signer>,
        inputs: Vec<Token>,
        input_ids: Vec<TokenID>,
        input_information: Vec<Metadata>,
        pp: &'a PublicParams,
    ) -> Result<Self> {
        if signers.len() != inputs.len() || inputs.len() != input_information.len() || input_ids.len() != inputs.len() {
            return Err(ZkatError::InvalidInput(
                "number of tokens to be spent does not match number of opening".into(),
            ));
        }
        if inputs.is_empty() {
            return Err(ZkatError::InvalidInput("no tokens to spend".into()));
        }
        Ok(Self {
            signers,
            inputs,
            input_ids,
            input_information,
            pp,
        })
    }

    fn input_witness(&self) -> Result<Vec<TokenDataWitness>> {
        let token_type = &self.input_information[0].token_type;
        self.input_information
            .iter()
            .map(|info| {
                if &info.token_type != token_type {
                    return Err(ZkatError::InvalidInput(
                        "cannot generate transfer: please choose inputs of the same token type".into(),
                    ));
                }
                let value = math::zr_to_u64(&info.value)
                    .ok_or_else(|| ZkatError::InvalidInput("cannot generate transfer: invalid value".into()))?;
                Ok(TokenDataWitness::new(token_type.clone(), value, info.blinding_factor))
            })
            .collect()
    }

    /// Transfer of the inputs to `owners`, one output of `values[i]` each,
    /// plus the metadata each recipient needs to open its token
    pub fn generate_zk_transfer<R: RngCore + CryptoRng>(
        &self,
        values: &[u64],
        owners: Vec<Vec<u8>>,
        rng: &mut R,
    ) -> Result<(TransferAction, Vec<Metadata>)> {
        if values.len() != owners.len() {
            return Err(ZkatError::InvalidInput(format!(
                "cannot generate transfer: number of values [{}] does not match number of recipients [{}]",
                values.len(),
                owners.len()
            )));
        }
        let in_witness = self.input_witness()?;
        let token_type = in_witness[0].token_type.clone();
        let (outputs, out_witness) =
            get_tokens_with_witness(values, &token_type, &self.pp.pedersen_generators, &mut *rng)
                .context(|| "cannot generate transfer")?;

        let inputs: Vec<_> = self.inputs.iter().map(|t| t.data).collect();
        let proof = Prover::new(&in_witness, &out_witness, inputs, outputs.clone(), self.pp)?
            .prove(rng)
            .context(|| "cannot generate zero-knowledge proof for transfer")?;

        let metadata = out_witness
            .iter()
            .zip(&owners)
            .map(|(w, owner)| w.to_metadata(owner.clone(), Vec::new()))
            .collect();
        let action = new_transfer(self.input_ids.clone(), self.inputs.clone(), outputs, owners, proof)
            .context(|| "failed to produce transfer action")?;
        debug!(
            "generated transfer of type [{}]: [{}] inputs, [{}] outputs",
            token_type,
            action.num_inputs(),
            action.num_outputs()
        );
        Ok((action, metadata))
    }

    /// One signature over `raw ∥ tx_id` per input owner
    pub fn sign_token_actions(&self, raw: &[u8], tx_id: &str) -> Result<Vec<Vec<u8>>> {
        let message = [raw, tx_id.as_bytes()].concat();
        self.signers
            .iter()
            .map(|s| s.sign(&message).context(|| "failed to sign token requests"))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SetupConfig;
    use crate::identity::schnorr::SchnorrSigningIdentity;
    use crate::identity::Verifier as _;
    use crate::setup::setup;
    use crate::transfer::Verifier;
    use rand::rngs::OsRng;

    #[test]
    fn test_generate_zk_transfer() {
        let pp = setup(&SetupConfig::bulletproof(16), &mut OsRng).unwrap();
        let alice = SchnorrSigningIdentity::new(&mut OsRng);
        let (tokens, witness) =
            get_tokens_with_witness(&[30, 12], "ABC", &pp.pedersen_generators, &mut OsRng).unwrap();
        let inputs: Vec<Token> = tokens
            .iter()
            .map(|t| Token::new(alice.identity().into_bytes(), *t))
            .collect();
        let info: Vec<Metadata> = witness.iter().map(|w| w.to_metadata(vec![], vec![])).collect();
        let ids = vec![TokenID::new("tx0", 0), TokenID::new("tx0", 1)];

        let sender = Sender::new(vec![&alice as &dyn Signer, &alice], inputs, ids, info, &pp).unwrap();
        let (action, metadata) = sender
            .generate_zk_transfer(&[40, 2], vec![b"bob".to_vec(), b"carol".to_vec()], &mut OsRng)
            .unwrap();

        Verifier::new(action.get_input_commitments(), action.get_output_commitments(), &pp)
            .verify(&action.proof)
            .unwrap();
        let clear = action.output_tokens[0]
            .to_clear(&metadata[0], &pp.pedersen_generators)
            .unwrap();
        assert_eq!(clear.quantity, "0x28");

        let raw = action.serialize().unwrap();
        let sigs = sender.sign_token_actions(&raw, "tx1").unwrap();
        assert_eq!(sigs.len(), 2);
        alice
            .verifier()
            .verify(&[raw.as_slice(), &b"tx1"[..]].concat(), &sigs[0])
            .unwrap();
    }

    #[test]
    fn test_mismatched_openings() {
        let pp = setup(&SetupConfig::bulletproof(8), &mut OsRng).unwrap();
        let alice = SchnorrSigningIdentity::new(&mut OsRng);
        let token = Token::new(vec![1], math::rand_g1(&mut OsRng));
        assert!(Sender::new(vec![&alice as &dyn Signer], vec![token], vec![], vec![], &pp).is_err());
    }
}
