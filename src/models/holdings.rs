use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBalance {
    pub contract_name: Option<String>,
    pub contract_ticker_symbol: Option<String>,
    pub contract_address: String,
    pub balance: String,
    pub token_ids: Vec<String>,
}

impl TokenBalance {
    pub fn display_name(&self) -> &str {
        self.contract_name
            .as_deref()
            .or(self.contract_ticker_symbol.as_deref())
            .unwrap_or(&self.contract_address)
    }
}

/// NFT balances of one address on one chain. A chain whose lookup failed
/// reports no tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainHoldings {
    pub chain_name: String,
    pub chain_id: u64,
    pub tokens: Vec<TokenBalance>,
}

impl ChainHoldings {
    pub fn holds_contract(&self, contract_address: &str) -> bool {
        self.tokens
            .iter()
            .any(|token| token.contract_address.eq_ignore_ascii_case(contract_address))
    }
}
