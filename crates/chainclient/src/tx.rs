//! Legacy (EIP-155) transaction building and signing.

use alloy_consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy_eips::eip2718::Encodable2718;
use alloy_network::TxSignerSync;
use alloy_primitives::{Bytes, TxKind, B256, U256};
use alloy_signer_local::PrivateKeySigner;

use crate::error::ClientError;

pub const INVOKE_GAS_LIMIT: u64 = 1_000_000;
pub const TRANSFER_GAS_LIMIT: u64 = 21_000;
pub const DEPLOY_GAS_LIMIT: u64 = 10_000_000;

/// Fully resolved fields of a transaction about to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTx {
    pub chain_id: u64,
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: u64,
    pub to: TxKind,
    pub value: U256,
    pub input: Bytes,
}

/// An encoded, signed transaction ready for `eth_sendRawTransaction`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub hash: B256,
    pub nonce: u64,
    pub raw: Bytes,
}

impl UnsignedTx {
    pub fn sign(self, signer: &PrivateKeySigner) -> Result<SignedTx, ClientError> {
        let gas_price = u128::try_from(self.gas_price)
            .map_err(|_| ClientError::Signer(format!("gas price {} out of range", self.gas_price)))?;
        let mut tx = TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: self.nonce,
            gas_price,
            gas_limit: self.gas_limit,
            to: self.to,
            value: self.value,
            input: self.input,
        };
        let signature = signer
            .sign_transaction_sync(&mut tx)
            .map_err(|e| ClientError::Signer(e.to_string()))?;
        let envelope = TxEnvelope::from(tx.into_signed(signature));
        Ok(SignedTx {
            hash: *envelope.tx_hash(),
            nonce: self.nonce,
            raw: envelope.encoded_2718().into(),
        })
    }
}
