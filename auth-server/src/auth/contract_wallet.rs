// auth-server/src/auth/contract_wallet.rs
use alloy::primitives::{Address as EvmAddress, Bytes};
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{BlockId, TransactionInput, TransactionRequest};
use alloy::sol;
use alloy::sol_types::SolCall;
use alloy::transports::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::signature::Address;

sol! {
    /// EIP-1271 signature check implemented by contract wallets
    function isValidSignature(bytes32 hash, bytes signature) external view returns (bytes4 magicValue);
}

/// `bytes4(keccak256("isValidSignature(bytes32,bytes)"))`, also the success value
pub const EIP1271_MAGIC_VALUE: [u8; 4] = isValidSignatureCall::SELECTOR;

const RPC_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ContractWalletError {
    #[error("rpc transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid rpc url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// On-chain signature validation for smart-contract wallets
#[async_trait]
pub trait ContractWalletVerifier: Send + Sync {
    /// Ask `wallet` whether `signature` is valid for `hash`, at the latest block
    async fn is_valid_signature(
        &self,
        wallet: Address,
        hash: [u8; 32],
        signature: &[u8],
    ) -> Result<bool, ContractWalletError>;
}

/// Used when no RPC endpoint is configured; only plain key recovery works
pub struct DisabledContractWallets;

#[async_trait]
impl ContractWalletVerifier for DisabledContractWallets {
    async fn is_valid_signature(
        &self,
        _wallet: Address,
        _hash: [u8; 32],
        _signature: &[u8],
    ) -> Result<bool, ContractWalletError> {
        Ok(false)
    }
}

/// EIP-1271 validation through `eth_call` on a JSON-RPC endpoint
pub struct RpcContractWalletVerifier {
    provider: RootProvider,
    timeout: Duration,
}

impl RpcContractWalletVerifier {
    pub fn new(rpc_url: &str) -> Result<Self, ContractWalletError> {
        let url = Url::parse(rpc_url)?;
        let provider: RootProvider = RootProvider::new_http(url);

        Ok(Self { provider, timeout: RPC_TIMEOUT })
    }
}

#[async_trait]
impl ContractWalletVerifier for RpcContractWalletVerifier {
    async fn is_valid_signature(
        &self,
        wallet: Address,
        hash: [u8; 32],
        signature: &[u8],
    ) -> Result<bool, ContractWalletError> {
        let call = isValidSignatureCall {
            hash: hash.into(),
            signature: Bytes::copy_from_slice(signature),
        };
        let request = TransactionRequest::default()
            .to(EvmAddress::from(wallet))
            .input(TransactionInput::new(Bytes::from(call.abi_encode())));

        let pending = self.provider.call(request).block(BlockId::latest());

        match tokio::time::timeout(self.timeout, pending).await {
            Err(_) => Err(ContractWalletError::Timeout(self.timeout)),
            Ok(Ok(output)) => Ok(is_magic_value(&output)),
            Ok(Err(e)) => match e.as_error_resp() {
                // Reverts and calls into accounts without code land here
                Some(payload) => {
                    tracing::debug!("isValidSignature call rejected ({}): {}", payload.code, payload.message);
                    Ok(false)
                }
                None => Err(e.into()),
            },
        }
    }
}

/// A `bytes4` return value is left-aligned in its 32-byte word
fn is_magic_value(output: &[u8]) -> bool {
    output.len() >= 4 && output[..4] == EIP1271_MAGIC_VALUE
}
