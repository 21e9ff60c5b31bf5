//! Deterministic per-namespace wallets.
//!
//! A namespace (e.g. a calendar id) maps to a stable signing identity
//! with no stored state: key material is HMAC-SHA256 over
//! `(master secret, namespace)`, so the same namespace always derives
//! the same address. Namespaces are not secrets; the master secret is.

use dashmap::DashMap;
use ed25519_dalek::{Signer, SigningKey};
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::gateway::{NetworkError, NetworkGateway};

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Insufficient balance: have {available}, need {required}")]
    InsufficientBalance {
        available: Decimal,
        required: Decimal,
    },
    #[error(transparent)]
    Network(#[from] NetworkError),
}

struct DerivedSigner {
    address: String,
    signing_key: SigningKey,
}

pub struct NamespaceWallet {
    master_secret: String,
    network: Arc<dyn NetworkGateway>,
    // Derivation is cheap but not free; cache per-namespace signers for
    // the process lifetime.
    signers: DashMap<String, Arc<DerivedSigner>>,
}

impl NamespaceWallet {
    pub fn new(master_secret: String, network: Arc<dyn NetworkGateway>) -> Self {
        Self {
            master_secret,
            network,
            signers: DashMap::new(),
        }
    }

    fn derive(&self, namespace: &str) -> Arc<DerivedSigner> {
        if let Some(cached) = self.signers.get(namespace) {
            return cached.clone();
        }

        let mut mac = HmacSha256::new_from_slice(self.master_secret.as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(namespace.as_bytes());
        let key_material: [u8; 32] = mac.finalize().into_bytes().into();

        let signing_key = SigningKey::from_bytes(&key_material);
        let digest = Sha256::digest(signing_key.verifying_key().as_bytes());
        // Last 20 digest bytes, hex-encoded: a fixed-length 0x address.
        let address = format!("0x{}", hex::encode(&digest[12..]));

        info!(namespace = %namespace, address = %address, "Derived namespace signer");

        let signer = Arc::new(DerivedSigner {
            address,
            signing_key,
        });
        self.signers.insert(namespace.to_string(), signer.clone());
        signer
    }

    /// Stable address for a namespace.
    pub fn address(&self, namespace: &str) -> String {
        self.derive(namespace).address.clone()
    }

    pub async fn balance(&self, namespace: &str) -> Result<Decimal, WalletError> {
        let address = self.address(namespace);
        Ok(self.network.get_balance(&address).await?)
    }

    pub async fn has_sufficient_balance(
        &self,
        namespace: &str,
        amount: Decimal,
    ) -> Result<bool, WalletError> {
        Ok(self.balance(namespace).await? >= amount)
    }

    /// Sign and broadcast a transfer, blocking until the network confirms
    /// or errors. Returns the chain tx ref. No retry at this layer; that
    /// is the scheduler's responsibility.
    pub async fn send(
        &self,
        namespace: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<String, WalletError> {
        let signer = self.derive(namespace);

        let available = self.network.get_balance(&signer.address).await?;
        if available < amount {
            return Err(WalletError::InsufficientBalance {
                available,
                required: amount,
            });
        }

        let canonical = format!("{}.{}.{}", signer.address, to, amount);
        let signature = hex::encode(signer.signing_key.sign(canonical.as_bytes()).to_bytes());
        debug!(from = %signer.address, to = %to, amount = %amount, "Broadcasting transfer");

        let tx_ref = self
            .network
            .broadcast_transfer(&signer.address, to, amount, &signature)
            .await?;
        Ok(tx_ref)
    }
}
