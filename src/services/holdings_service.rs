use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    config::{ChainConfig, HoldingsConfig},
    metrics::HOLDINGS_LOOKUP_ERRORS_TOTAL,
    models::{
        eth_address::EthAddress,
        holdings::{ChainHoldings, TokenBalance},
    },
};

#[derive(Debug, thiserror::Error)]
pub enum HoldingsError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Holdings API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Holdings API error: {0}")]
    Api(String),
}

pub type HoldingsResult<T> = Result<T, HoldingsError>;

/// NFT balances of an address across every supported chain. A chain that
/// cannot be queried contributes an empty list rather than failing the call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HoldingsLookup: Send + Sync {
    async fn holdings(&self, address: &EthAddress) -> Vec<ChainHoldings>;
}

#[derive(Debug, Deserialize)]
struct BalancesResponse {
    data: Option<BalancesData>,
    #[serde(default)]
    error: bool,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalancesData {
    #[serde(default)]
    items: Vec<BalanceItem>,
}

#[derive(Debug, Deserialize)]
struct BalanceItem {
    contract_name: Option<String>,
    contract_ticker_symbol: Option<String>,
    contract_address: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    balance: Option<String>,
    #[serde(default)]
    nft_data: Option<Vec<NftData>>,
}

#[derive(Debug, Deserialize)]
struct NftData {
    token_id: Option<String>,
}

impl From<BalanceItem> for TokenBalance {
    fn from(item: BalanceItem) -> Self {
        TokenBalance {
            contract_name: item.contract_name,
            contract_ticker_symbol: item.contract_ticker_symbol,
            contract_address: item.contract_address,
            balance: item.balance.unwrap_or_else(|| "0".to_string()),
            token_ids: item
                .nft_data
                .unwrap_or_default()
                .into_iter()
                .filter_map(|nft| nft.token_id)
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HoldingsService {
    client: Client,
    base_url: String,
    api_key: String,
    chains: Vec<ChainConfig>,
}

impl HoldingsService {
    pub fn new(config: &HoldingsConfig, timeout: std::time::Duration) -> HoldingsResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            chains: config.chains.clone(),
        })
    }

    async fn fetch_chain(&self, chain: &ChainConfig, address: &EthAddress) -> HoldingsResult<Vec<TokenBalance>> {
        let url = format!(
            "{}/{}/address/{}/balances_v2/",
            self.base_url, chain.chain_id, address
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("nft", "true"), ("no-nft-fetch", "true")])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(HoldingsError::Status { status, body });
        }

        let body: BalancesResponse = response.json().await?;

        if body.error {
            return Err(HoldingsError::Api(
                body.error_message.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let tokens: Vec<TokenBalance> = body
            .data
            .map(|data| data.items)
            .unwrap_or_default()
            .into_iter()
            .filter(|item| item.kind.as_deref() == Some("nft"))
            .map(TokenBalance::from)
            .collect();

        debug!(chain = %chain.name, address = %address, count = tokens.len(), "Fetched NFT balances");

        Ok(tokens)
    }
}

#[async_trait]
impl HoldingsLookup for HoldingsService {
    async fn holdings(&self, address: &EthAddress) -> Vec<ChainHoldings> {
        let lookups = self.chains.iter().map(|chain| async move {
            let tokens = match self.fetch_chain(chain, address).await {
                Ok(tokens) => tokens,
                Err(e) => {
                    HOLDINGS_LOOKUP_ERRORS_TOTAL.with_label_values(&[chain.name.as_str()]).inc();
                    warn!(chain = %chain.name, address = %address, error = %e, "NFT balance lookup failed");
                    Vec::new()
                }
            };

            ChainHoldings {
                chain_name: chain.name.clone(),
                chain_id: chain.chain_id,
                tokens,
            }
        });

        join_all(lookups).await
    }
}

/// Renders holdings as one chat message.
pub fn format_holdings(address: &EthAddress, holdings: &[ChainHoldings]) -> String {
    if holdings.iter().all(|chain| chain.tokens.is_empty()) {
        let chains: Vec<&str> = holdings.iter().map(|chain| chain.chain_name.as_str()).collect();
        return format!("No NFTs found for {} on {}.", address, chains.join(", "));
    }

    let mut lines = vec![format!("NFTs held by {}:", address)];

    for chain in holdings {
        if chain.tokens.is_empty() {
            lines.push(format!("{}: none", chain.chain_name));
            continue;
        }

        lines.push(format!("{}:", chain.chain_name));
        for token in &chain.tokens {
            lines.push(format!(
                "- {} x{} (`{}`)",
                token.display_name(),
                token.balance,
                token.contract_address
            ));
        }
    }

    lines.join("\n")
}
