use crate::BalanceLookup;
use async_trait::async_trait;
use common::{Error, Result};
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::Address;
use std::str::FromStr;
use tracing::{debug, error};

/// Configuration for the Ethereum node endpoint
#[derive(Debug, Clone)]
pub struct EthereumConfig {
    /// JSON-RPC endpoint of the node provider
    pub rpc_url: String,
}

impl EthereumConfig {
    pub fn from_env() -> std::result::Result<Self, String> {
        let rpc_url = std::env::var("ETH_RPC_URL")
            .or_else(|_| std::env::var("INFURA_URI"))
            .map_err(|_| "ETH_RPC_URL environment variable not set")?;

        Ok(Self { rpc_url })
    }
}

/// Balance lookups against a single shared JSON-RPC provider
pub struct EthereumBalanceClient {
    provider: Provider<Http>,
}

impl EthereumBalanceClient {
    pub fn new(config: &EthereumConfig) -> Result<Self> {
        let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
            .map_err(|e| Error::ConfigError(format!("Invalid Ethereum RPC URL: {}", e)))?;

        Ok(Self { provider })
    }
}

#[async_trait]
impl BalanceLookup for EthereumBalanceClient {
    async fn get_balance(&self, address: &str) -> Result<String> {
        // Unparseable addresses fail like any other lookup
        let account = Address::from_str(address).map_err(|e| {
            error!("Invalid Ethereum address {}: {}", address, e);
            Error::BalanceError(format!("Invalid Ethereum address {}: {}", address, e))
        })?;

        debug!("Fetching balance for {:?}", account);

        // No block id means the latest block
        let balance = self
            .provider
            .get_balance(account, None)
            .await
            .map_err(|e| {
                error!("eth_getBalance failed for {:?}: {}", account, e);
                Error::BalanceError(e.to_string())
            })?;

        Ok(balance.to_string())
    }
}
