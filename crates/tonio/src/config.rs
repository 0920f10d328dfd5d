use std::net::Ipv4Addr;

use serde::Deserialize;
use tracing::*;

use crate::{client::HttpTonClient, errors::TonError, traits::TonClient};

/// Published directory of public lite-servers.
pub const GLOBAL_CONFIG_URL: &str = "https://ton-blockchain.github.io/global.config.json";

/// Block depth probed to tell archive nodes from pruned ones.
const ARCHIVE_PROBE_SEQNO: u32 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalConfig {
    pub liteservers: Vec<LiteserverEntry>,
}

/// One lite-server directory entry. The IP is a packed big-endian 32-bit
/// value, possibly sign-extended.
#[derive(Debug, Clone, Deserialize)]
pub struct LiteserverEntry {
    pub ip: i64,
    pub port: u16,
}

impl LiteserverEntry {
    pub fn endpoint(&self) -> String {
        format!("http://{}:{}", int_to_ipv4(self.ip), self.port)
    }
}

fn int_to_ipv4(ip: i64) -> Ipv4Addr {
    Ipv4Addr::from(ip as u32)
}

pub async fn fetch_global_config(url: &str) -> Result<GlobalConfig, TonError> {
    let config = reqwest::get(url)
        .await?
        .error_for_status()?
        .json::<GlobalConfig>()
        .await?;

    Ok(config)
}

/// Probes the directory in order and returns a client for the first node
/// that answers both a tip query and a deep-history lookup.
pub async fn find_archive_node(config: &GlobalConfig) -> Option<HttpTonClient> {
    for entry in &config.liteservers {
        let endpoint = entry.endpoint();
        let client = match HttpTonClient::new(&endpoint) {
            Ok(client) => client,
            Err(err) => {
                debug!(%endpoint, %err, "could not build client for lite-server");
                continue;
            }
        };

        let info = match client.get_masterchain_info().await {
            Ok(info) => info,
            Err(err) => {
                debug!(%endpoint, %err, "lite-server did not answer tip query");
                continue;
            }
        };

        if let Err(err) = client
            .lookup_block(info.workchain, info.shard, ARCHIVE_PROBE_SEQNO)
            .await
        {
            debug!(%endpoint, %err, "lite-server has no deep history");
            continue;
        }

        return Some(client);
    }

    None
}
