//! Wallet collaborator
//!
//! Connection is mocked. Addresses are validated by prefix only.

use crate::error::PipelineError;
use crate::fake_data::FakeDataGenerator;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::info;

/// Address prefixes accepted for disbursement (testnet, mainnet)
pub const RECOGNIZED_ADDRESS_PREFIXES: &[&str] = &["addr_test", "addr1"];

pub fn is_recognized_address(address: &str) -> bool {
    RECOGNIZED_ADDRESS_PREFIXES
        .iter()
        .any(|prefix| address.starts_with(prefix))
}

pub fn ensure_recognized_address(address: &str) -> Result<()> {
    if is_recognized_address(address) {
        Ok(())
    } else {
        Err(PipelineError::InvalidWalletAddress(address.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Nami,
    Eternl,
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WalletType::Nami => "nami",
            WalletType::Eternl => "eternl",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for WalletType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "nami" => Ok(WalletType::Nami),
            "eternl" => Ok(WalletType::Eternl),
            other => Err(PipelineError::Wallet(format!("Unsupported wallet: {}", other))),
        }
    }
}

#[async_trait]
pub trait WalletConnector: Send + Sync {
    async fn connect(&self, wallet_type: WalletType) -> Result<String>;
    fn disconnect(&self);
    fn address(&self) -> Option<String>;

    fn is_connected(&self) -> bool {
        self.address().is_some()
    }
}

#[derive(Debug, Clone)]
struct Connection {
    address: String,
    wallet_type: WalletType,
}

/// Hands out `addr_test_<20 chars>` addresses
pub struct MockWallet {
    fake: Arc<dyn FakeDataGenerator>,
    connection: RwLock<Option<Connection>>,
}

impl MockWallet {
    pub fn new(fake: Arc<dyn FakeDataGenerator>) -> Self {
        Self {
            fake,
            connection: RwLock::new(None),
        }
    }

    /// Restore a connection saved by a previous session
    pub fn restore(fake: Arc<dyn FakeDataGenerator>, address: String, wallet_type: WalletType) -> Self {
        Self {
            fake,
            connection: RwLock::new(Some(Connection {
                address,
                wallet_type,
            })),
        }
    }

    pub fn wallet_type(&self) -> Option<WalletType> {
        self.connection
            .read()
            .ok()
            .and_then(|c| c.as_ref().map(|c| c.wallet_type))
    }
}

#[async_trait]
impl WalletConnector for MockWallet {
    async fn connect(&self, wallet_type: WalletType) -> Result<String> {
        let address = format!("addr_test_{}", self.fake.alphanumeric(20));

        let mut connection = self
            .connection
            .write()
            .map_err(|_| PipelineError::Wallet("wallet state poisoned".to_string()))?;
        *connection = Some(Connection {
            address: address.clone(),
            wallet_type,
        });

        info!(wallet = %wallet_type, address = %address, "Wallet connected");
        Ok(address)
    }

    fn disconnect(&self) {
        if let Ok(mut connection) = self.connection.write() {
            *connection = None;
        }
        info!("Wallet disconnected");
    }

    fn address(&self) -> Option<String> {
        self.connection
            .read()
            .ok()
            .and_then(|c| c.as_ref().map(|c| c.address.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_data::SeededFakeData;

    #[test]
    fn test_address_prefixes() {
        assert!(is_recognized_address("addr_test1qz9example"));
        assert!(is_recognized_address("addr1q9example"));
        assert!(!is_recognized_address("stake1uexample"));
        assert!(!is_recognized_address(""));
        assert!(matches!(
            ensure_recognized_address("0xdeadbeef"),
            Err(PipelineError::InvalidWalletAddress(_))
        ));
    }

    #[test]
    fn test_wallet_type_parsing() {
        assert_eq!("Nami".parse::<WalletType>().unwrap(), WalletType::Nami);
        assert_eq!("eternl".parse::<WalletType>().unwrap(), WalletType::Eternl);
        assert!("metamask".parse::<WalletType>().is_err());
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let wallet = MockWallet::new(Arc::new(SeededFakeData::new(8)));
        assert!(!wallet.is_connected());

        let address = wallet.connect(WalletType::Eternl).await.unwrap();
        assert!(address.starts_with("addr_test_"));
        assert_eq!(address.len(), "addr_test_".len() + 20);
        assert!(is_recognized_address(&address));
        assert_eq!(wallet.address(), Some(address));
        assert_eq!(wallet.wallet_type(), Some(WalletType::Eternl));

        wallet.disconnect();
        assert!(!wallet.is_connected());
        assert_eq!(wallet.wallet_type(), None);
    }

    #[test]
    fn test_restore_previous_session() {
        let wallet = MockWallet::restore(
            Arc::new(SeededFakeData::new(8)),
            "addr_test_saved".to_string(),
            WalletType::Nami,
        );
        assert!(wallet.is_connected());
        assert_eq!(wallet.address().as_deref(), Some("addr_test_saved"));
    }
}
