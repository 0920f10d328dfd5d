use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use crate::{
    address::TonAddress,
    errors::TonError,
    traits::TonClient,
    types::{BlockId, MasterchainInfo, RawAddressInformation, RawTransaction, TonAccount,
        TonTransaction},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct RpcError {
    code: i32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<R> {
    result: Option<R>,
    error: Option<RpcError>,
}

/// JSON-RPC client bound to a single TON node endpoint.
#[derive(Debug, Clone)]
pub struct HttpTonClient {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpTonClient {
    pub fn new(endpoint: &str) -> Result<Self, TonError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, TonError> {
        let response: RpcResponse<T> = self
            .client
            .post(&self.endpoint)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": method,
                "method": method,
                "params": params,
            }))
            .send()
            .await?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(TonError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        response.result.ok_or(TonError::MissingResult)
    }

    /// Resolves a masterchain block by seqno. Used during discovery to
    /// check that a node still serves deep history.
    pub async fn lookup_block(
        &self,
        workchain: i32,
        shard: i64,
        seqno: u32,
    ) -> Result<(), TonError> {
        self.call::<serde_json::Value>(
            "lookupBlock",
            json!({
                "workchain": workchain,
                "shard": shard.to_string(),
                "seqno": seqno,
            }),
        )
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl TonClient for HttpTonClient {
    async fn get_masterchain_info(&self) -> Result<BlockId, TonError> {
        let info: MasterchainInfo = self.call("getMasterchainInfo", json!({})).await?;
        Ok(info.last)
    }

    async fn get_account(
        &self,
        block: &BlockId,
        addr: &TonAddress,
    ) -> Result<TonAccount, TonError> {
        let raw: RawAddressInformation = self
            .call(
                "getAddressInformation",
                json!({
                    "address": addr.to_string(),
                    "block": block,
                }),
            )
            .await?;

        raw.into_account(addr)
    }

    async fn list_transactions(
        &self,
        addr: &TonAddress,
        limit: u32,
        lt: u64,
        hash: &[u8],
    ) -> Result<Vec<TonTransaction>, TonError> {
        let raw: Vec<RawTransaction> = self
            .call(
                "getTransactions",
                json!({
                    "address": addr.to_string(),
                    "limit": limit,
                    "lt": lt.to_string(),
                    "hash": STANDARD.encode(hash),
                }),
            )
            .await?;

        raw.into_iter().map(TonTransaction::try_from).collect()
    }
}
