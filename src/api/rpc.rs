// ============================================================================
// Client JSON-RPC : lectures de contrats de marché
// ============================================================================
// Implémente ContractReader et TimeSource au-dessus d'un nœud Ethereum
// (Optimism par défaut) avec deux méthodes :
// - eth_call : appel en lecture d'une fonction view du contrat
// - eth_getBlockByNumber("latest") : timestamp de référence
//
// Encodage ABI minimal : sélecteur de 4 octets + arguments uint256, réponse
// découpée en mots de 32 octets.
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, error, instrument};

use crate::api::contract::{ContractReader, DepositsSource, TimeSource};
use crate::models::{MarketIdentity, RawFixedPool};

// Sélecteurs = 4 premiers octets de keccak256(signature)

/// floatingAssets()
const FLOATING_ASSETS: [u8; 4] = [0x2e, 0x0a, 0xf0, 0x08];
/// totalAssets()
const TOTAL_ASSETS: [u8; 4] = [0x01, 0xe1, 0xd1, 0x14];
/// totalFloatingBorrowAssets()
const TOTAL_FLOATING_BORROW_ASSETS: [u8; 4] = [0xee, 0xe8, 0xc9, 0xe0];
/// fixedPools(uint256) -> (borrowed, supplied, unassignedEarnings, lastAccrual)
const FIXED_POOLS: [u8; 4] = [0x4e, 0x7c, 0x50, 0x59];

// ============================================================================
// Structures JSON-RPC
// ============================================================================

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

/// Réponse générique : soit `result`, soit `error`
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct Block {
    timestamp: String,
}

// ============================================================================
// Client
// ============================================================================

/// Client JSON-RPC partagé par tous les marchés
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    deposits_source: DepositsSource,
    next_id: AtomicU64,
}

impl RpcClient {
    /// Crée un client pour le nœud `url`
    pub fn new(url: &str, deposits_source: DepositsSource) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("lazylend/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            url: url.to_string(),
            deposits_source,
            next_id: AtomicU64::new(1),
        })
    }

    /// Envoie une requête JSON-RPC ; Ok(None) si `result` est null
    async fn request<T>(&self, method: &str, params: serde_json::Value) -> Result<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let body = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("HTTP request for {} failed", method))?;

        let status = response.status();
        if !status.is_success() {
            error!(%status, method, "RPC node returned error status");
            anyhow::bail!("RPC node returned HTTP {} for {}", status, method);
        }

        let parsed: RpcResponse<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", method))?;

        if let Some(err) = parsed.error {
            anyhow::bail!("{} rejected by node: {} (code {})", method, err.message, err.code);
        }

        Ok(parsed.result)
    }

    /// eth_call sur `address` ; Ok(None) pour une réponse vide ("0x")
    async fn call(&self, address: &str, data: String) -> Result<Option<Vec<[u8; 32]>>> {
        let params = json!([{ "to": address, "data": data }, "latest"]);
        let result: Option<String> = self.request("eth_call", params).await?;

        match result {
            Some(hex_data) => {
                let words = decode_words(&hex_data)?;
                Ok(if words.is_empty() { None } else { Some(words) })
            }
            None => Ok(None),
        }
    }

    /// Appel sans argument retournant un seul uint256
    async fn call_uint(&self, address: &str, selector: [u8; 4]) -> Result<Option<u128>> {
        match self.call(address, encode_call(selector, &[])).await? {
            Some(words) => Ok(Some(word_to_u128(&words[0])?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ContractReader for RpcClient {
    #[instrument(skip(self, market), fields(symbol = %market.symbol))]
    async fn floating_deposits(&self, market: &MarketIdentity) -> Result<Option<u128>> {
        let selector = match self.deposits_source {
            DepositsSource::FloatingAssets => FLOATING_ASSETS,
            DepositsSource::TotalAssets => TOTAL_ASSETS,
        };
        self.call_uint(&market.address, selector)
            .await
            .context("floating deposits read")
    }

    #[instrument(skip(self, market), fields(symbol = %market.symbol))]
    async fn floating_borrows(&self, market: &MarketIdentity) -> Result<Option<u128>> {
        self.call_uint(&market.address, TOTAL_FLOATING_BORROW_ASSETS)
            .await
            .context("floating borrows read")
    }

    #[instrument(skip(self, market), fields(symbol = %market.symbol))]
    async fn fixed_pool(&self, market: &MarketIdentity, maturity: u64) -> Result<Option<RawFixedPool>> {
        let words = match self
            .call(&market.address, encode_call(FIXED_POOLS, &[maturity]))
            .await
            .context("fixed pool read")?
        {
            Some(words) => words,
            None => return Ok(None),
        };

        let pool = decode_fixed_pool(&words, maturity)?;
        debug!(?pool, "Decoded fixed pool");
        Ok(Some(pool))
    }
}

#[async_trait]
impl TimeSource for RpcClient {
    #[instrument(skip(self))]
    async fn current_timestamp(&self) -> Result<Option<u64>> {
        let block: Option<Block> = self
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;

        match block {
            Some(block) => {
                let timestamp = parse_hex_u64(&block.timestamp)
                    .context("Invalid block timestamp")?;
                debug!(timestamp, "Fetched latest block timestamp");
                Ok(Some(timestamp))
            }
            None => Ok(None),
        }
    }
}

// ============================================================================
// Encodage / décodage ABI
// ============================================================================

/// Sélecteur + arguments uint256 (big-endian, 32 octets chacun), en hex "0x…"
fn encode_call(selector: [u8; 4], args: &[u64]) -> String {
    let mut data = Vec::with_capacity(4 + 32 * args.len());
    data.extend_from_slice(&selector);
    for arg in args {
        let mut word = [0u8; 32];
        word[24..].copy_from_slice(&arg.to_be_bytes());
        data.extend_from_slice(&word);
    }
    format!("0x{}", hex::encode(data))
}

/// Découpe une réponse hex en mots de 32 octets
fn decode_words(data: &str) -> Result<Vec<[u8; 32]>> {
    let stripped = data.strip_prefix("0x").unwrap_or(data);
    let bytes = hex::decode(stripped).context("Response is not valid hex")?;

    if bytes.len() % 32 != 0 {
        anyhow::bail!("Response length {} is not a multiple of 32", bytes.len());
    }

    Ok(bytes
        .chunks_exact(32)
        .map(|chunk| {
            let mut word = [0u8; 32];
            word.copy_from_slice(chunk);
            word
        })
        .collect())
}

/// fixedPools(maturity) -> (borrowed, supplied, unassignedEarnings, lastAccrual)
///
/// Le quatrième mot (lastAccrual) n'est pas utilisé mais doit être présent.
fn decode_fixed_pool(words: &[[u8; 32]], maturity: u64) -> Result<RawFixedPool> {
    const FIXED_POOL_WORDS: usize = 4;

    if words.len() < FIXED_POOL_WORDS {
        anyhow::bail!(
            "fixedPools({}) returned {} words, expected {}",
            maturity,
            words.len(),
            FIXED_POOL_WORDS
        );
    }

    Ok(RawFixedPool {
        borrowed: word_to_u128(&words[0])?,
        supplied: word_to_u128(&words[1])?,
        unassigned_earnings: word_to_u128(&words[2])?,
    })
}

/// uint256 -> u128 ; erreur si les 16 octets de poids fort ne sont pas nuls
fn word_to_u128(word: &[u8; 32]) -> Result<u128> {
    if word[..16].iter().any(|&b| b != 0) {
        anyhow::bail!("uint256 value does not fit in 128 bits");
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

fn parse_hex_u64(value: &str) -> Result<u64> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(stripped, 16).with_context(|| format!("Invalid hex quantity {}", value))
}
