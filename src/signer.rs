//! Wallet signer collaborator
//!
//! The stop flow only needs two things from a wallet: which chain an address
//! belongs to and a signature over the challenge text. [`HmacSigner`] is a
//! local HMAC-SHA256 stand-in for paper and development setups.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::fmt;

use crate::error::SignerError;

type HmacSha256 = Hmac<Sha256>;

const BASE58_ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainType {
    Evm,
    Solana,
    Unknown,
}

impl fmt::Display for ChainType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainType::Evm => write!(f, "evm"),
            ChainType::Solana => write!(f, "solana"),
            ChainType::Unknown => write!(f, "unknown"),
        }
    }
}

/// Classify a wallet address by its textual shape.
///
/// EVM: `0x` followed by 40 hex digits. Solana: 32-44 base58 characters.
pub fn detect_chain_type(address: &str) -> ChainType {
    if let Some(hex_part) = address.strip_prefix("0x") {
        if hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            return ChainType::Evm;
        }
        return ChainType::Unknown;
    }
    if (32..=44).contains(&address.len()) && address.chars().all(|c| BASE58_ALPHABET.contains(c)) {
        return ChainType::Solana;
    }
    ChainType::Unknown
}

#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn detect_chain_type(&self, address: &str) -> ChainType {
        detect_chain_type(address)
    }

    /// Sign `message` with the wallet for `chain`. May fail or be rejected by the user.
    async fn sign_message(&self, message: &str, chain: ChainType) -> Result<String, SignerError>;
}

/// HMAC-SHA256 signer keyed by a local secret
#[derive(Clone)]
pub struct HmacSigner {
    key: String,
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner").field("key", &"***").finish()
    }
}

impl HmacSigner {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Looks for `GRID_BOT_SIGNING_KEY`
    pub fn from_env() -> Result<Self, std::env::VarError> {
        std::env::var("GRID_BOT_SIGNING_KEY").map(Self::new)
    }

    fn digest(&self, message: &str) -> Result<String, SignerError> {
        let mut mac = HmacSha256::new_from_slice(self.key.as_bytes())
            .map_err(|e| SignerError::Failed(e.to_string()))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Check a signature produced by this signer.
    pub fn verify(&self, message: &str, chain: ChainType, signature: &str) -> bool {
        let expected = match self.render(message, chain) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
    }

    fn render(&self, message: &str, chain: ChainType) -> Result<String, SignerError> {
        let digest = self.digest(message)?;
        match chain {
            ChainType::Evm => Ok(format!("0x{}", digest)),
            ChainType::Solana => Ok(digest),
            ChainType::Unknown => Err(SignerError::UnsupportedChain(chain.to_string())),
        }
    }
}

#[async_trait]
impl WalletSigner for HmacSigner {
    async fn sign_message(&self, message: &str, chain: ChainType) -> Result<String, SignerError> {
        self.render(message, chain)
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVM_ADDRESS: &str = "0x52908400098527886E0F7030069857D2E4169EE7";
    const SOLANA_ADDRESS: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";

    #[test]
    fn test_detect_chain_type() {
        assert_eq!(detect_chain_type(EVM_ADDRESS), ChainType::Evm);
        assert_eq!(detect_chain_type(SOLANA_ADDRESS), ChainType::Solana);
        assert_eq!(detect_chain_type("0x1234"), ChainType::Unknown);
        assert_eq!(detect_chain_type("not an address"), ChainType::Unknown);
        // 0 and O are not base58
        assert_eq!(
            detect_chain_type("0OOOOOOOOOOOOOOOOOOOOOOOOOOOOOOOOOO"),
            ChainType::Unknown
        );
    }

    #[tokio::test]
    async fn test_hmac_signer_evm() {
        let signer = HmacSigner::new("secret");
        let sig = signer
            .sign_message("1700000000-abc", ChainType::Evm)
            .await
            .unwrap();

        assert!(sig.starts_with("0x"));
        // 32 bytes of SHA256 as hex, plus prefix
        assert_eq!(sig.len(), 66);
        assert!(signer.verify("1700000000-abc", ChainType::Evm, &sig));
        assert!(!signer.verify("1700000000-abd", ChainType::Evm, &sig));
    }

    #[tokio::test]
    async fn test_hmac_signer_is_deterministic_per_key() {
        let a = HmacSigner::new("k1");
        let b = HmacSigner::new("k2");
        let sig_a1 = a.sign_message("m", ChainType::Solana).await.unwrap();
        let sig_a2 = a.sign_message("m", ChainType::Solana).await.unwrap();
        let sig_b = b.sign_message("m", ChainType::Solana).await.unwrap();
        assert_eq!(sig_a1, sig_a2);
        assert_ne!(sig_a1, sig_b);
    }

    #[tokio::test]
    async fn test_unknown_chain_rejected() {
        let signer = HmacSigner::new("secret");
        let err = signer
            .sign_message("m", ChainType::Unknown)
            .await
            .unwrap_err();
        assert!(matches!(err, SignerError::UnsupportedChain(_)));
    }

    #[test]
    fn test_debug_hides_key() {
        let signer = HmacSigner::new("super-secret");
        assert!(!format!("{:?}", signer).contains("super-secret"));
    }
}
