use serde::{Deserialize, Serialize};

/// Queue job type both pipeline stages enqueue under.
pub const JOB_TYPE_UPDATE: &str = "update";

/// Payload of one update job: the account and the `(lt, hash)` cursor the
/// updater should paginate from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobArgs {
    pub addr: String,
    pub account_id: i64,
    #[serde(with = "base64_bytes")]
    pub tx_hash: Vec<u8>,
    pub tx_lt: u64,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(&s).map_err(de::Error::custom)
    }
}
