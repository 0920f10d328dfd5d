use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::{address::TonAddress, errors::TonError};

/// Identifier of a masterchain block used as the read anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockId {
    pub workchain: i32,
    #[serde(with = "string_num")]
    pub shard: i64,
    pub seqno: u32,
}

/// Snapshot of an account as reported by a node at some block.
///
/// `state` is present only for initialized accounts; an address that has
/// never been deployed is a normal runtime condition, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TonAccount {
    pub state: Option<AccountState>,
    pub last_tx_hash: Vec<u8>,
    pub last_tx_lt: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub address: TonAddress,
}

/// One raw on-chain transaction with its pagination back-pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TonTransaction {
    pub hash: Vec<u8>,
    pub lt: u64,
    /// Wall-clock unix seconds the transaction was applied.
    pub now: u64,
    /// Total fees charged, in nanotons.
    pub total_fees: u128,
    pub in_msg: Option<TonMessage>,
    pub out_msgs: Vec<TonMessage>,
    /// Previous transaction of this account; an `lt` of zero marks the
    /// start of the account's history.
    pub prev_tx_hash: Vec<u8>,
    pub prev_tx_lt: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    Internal,
    ExternalIn,
    ExternalOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TonMessage {
    pub kind: MsgKind,
    pub src: String,
    pub dest: String,
    /// Transferred value in nanotons.
    pub amount: u128,
    pub ihr_fee: u128,
    pub fwd_fee: u128,
    pub comment: String,
}

// Wire shapes of the node's JSON-RPC responses. Logical times and nanoton
// amounts travel as decimal strings; hashes as standard base64.

#[derive(Debug, Deserialize)]
pub(crate) struct MasterchainInfo {
    pub last: BlockId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTransactionId {
    #[serde(with = "string_num")]
    pub lt: u64,
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAddressInformation {
    pub state: String,
    pub last_transaction_id: RawTransactionId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawTransaction {
    pub transaction_id: RawTransactionId,
    pub utime: u64,
    #[serde(with = "string_num")]
    pub total_fees: u128,
    pub in_msg: Option<RawMessage>,
    #[serde(default)]
    pub out_msgs: Vec<RawMessage>,
    pub prev_transaction_id: Option<RawTransactionId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMessage {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub destination: String,
    #[serde(with = "string_num", default)]
    pub value: u128,
    #[serde(with = "string_num", default)]
    pub ihr_fee: u128,
    #[serde(with = "string_num", default)]
    pub fwd_fee: u128,
    #[serde(default)]
    pub message: Option<String>,
}

impl RawAddressInformation {
    pub(crate) fn into_account(self, addr: &TonAddress) -> Result<TonAccount, TonError> {
        let state = (self.state == "active").then(|| AccountState {
            address: addr.clone(),
        });

        Ok(TonAccount {
            state,
            last_tx_hash: STANDARD.decode(&self.last_transaction_id.hash)?,
            last_tx_lt: self.last_transaction_id.lt,
        })
    }
}

impl TryFrom<RawTransaction> for TonTransaction {
    type Error = TonError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        let (prev_tx_hash, prev_tx_lt) = match raw.prev_transaction_id {
            Some(prev) => (STANDARD.decode(&prev.hash)?, prev.lt),
            None => (Vec::new(), 0),
        };

        Ok(Self {
            hash: STANDARD.decode(&raw.transaction_id.hash)?,
            lt: raw.transaction_id.lt,
            now: raw.utime,
            total_fees: raw.total_fees,
            in_msg: raw.in_msg.map(Into::into),
            out_msgs: raw.out_msgs.into_iter().map(Into::into).collect(),
            prev_tx_hash,
            prev_tx_lt,
        })
    }
}

impl From<RawMessage> for TonMessage {
    fn from(raw: RawMessage) -> Self {
        let kind = match (raw.source.is_empty(), raw.destination.is_empty()) {
            (true, _) => MsgKind::ExternalIn,
            (_, true) => MsgKind::ExternalOut,
            (false, false) => MsgKind::Internal,
        };

        Self {
            kind,
            src: raw.source,
            dest: raw.destination,
            amount: raw.value,
            ihr_fee: raw.ihr_fee,
            fwd_fee: raw.fwd_fee,
            comment: raw.message.unwrap_or_default(),
        }
    }
}

/// (De)serializes integers from the decimal strings the node emits, which
/// would overflow JSON number parsers for 64-bit logical times.
pub(crate) mod string_num {
    use std::{fmt::Display, str::FromStr};

    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}
