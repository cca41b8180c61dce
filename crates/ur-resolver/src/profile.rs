//! Profile helper: texts, addresses and content hash in one call

use crate::engine::{Resolution, UniversalResolver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ur_core::{RecordQuery, RecordValue, Result};

/// Records to fetch for a profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileRequest {
    /// Text record keys
    pub texts: Vec<String>,
    /// Coin types of address records
    pub coin_types: Vec<u64>,
    /// Whether to fetch the content hash
    pub contenthash: bool,
}

impl ProfileRequest {
    fn queries(&self) -> Vec<RecordQuery> {
        let mut queries: Vec<RecordQuery> = self.texts.iter().map(RecordQuery::text).collect();
        queries.extend(self.coin_types.iter().map(|ct| RecordQuery::addr(*ct)));
        if self.contenthash {
            queries.push(RecordQuery::ContentHash);
        }
        queries
    }
}

/// Decoded profile. Failed or empty records are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Text records by key
    pub texts: BTreeMap<String, Option<String>>,
    /// Address bytes by coin type
    pub addresses: BTreeMap<u64, Option<Vec<u8>>>,
    /// Content hash, when requested and set
    pub contenthash: Option<Vec<u8>>,
    /// Underlying resolution
    pub resolution: Resolution,
}

impl UniversalResolver {
    /// Fetch a profile for `name` in one resolution
    pub async fn profile(
        &self,
        name: &str,
        request: &ProfileRequest,
        batch_endpoints: &[String],
    ) -> Result<Profile> {
        let queries = request.queries();
        let resolution = self.resolve(name, &queries, batch_endpoints).await?;

        let mut texts = BTreeMap::new();
        let mut addresses = BTreeMap::new();
        let mut contenthash = None;
        for (query, record) in queries.iter().zip(&resolution.records) {
            let value = record.value(query).filter(|v| !v.is_empty());
            match (query, value) {
                (RecordQuery::Text { key }, Some(RecordValue::Text(text))) => {
                    texts.insert(key.clone(), Some(text));
                }
                (RecordQuery::Text { key }, _) => {
                    texts.insert(key.clone(), None);
                }
                (RecordQuery::Addr { coin_type: Some(ct) }, Some(RecordValue::Address(bytes))) => {
                    addresses.insert(*ct, Some(bytes));
                }
                (RecordQuery::Addr { coin_type: Some(ct) }, _) => {
                    addresses.insert(*ct, None);
                }
                (RecordQuery::ContentHash, Some(RecordValue::ContentHash(bytes))) => {
                    contenthash = Some(bytes);
                }
                _ => {}
            }
        }

        Ok(Profile {
            texts,
            addresses,
            contenthash,
            resolution,
        })
    }
}
