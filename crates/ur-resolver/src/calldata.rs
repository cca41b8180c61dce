//! Caller-encoded calldata: one raw call or a `multicall(bytes[])` of them

use crate::engine::{Resolution, UniversalResolver};
use ur_core::{encode_multicall_answers, unpack_multicall, RecordQuery, Result};

/// Answer of [`UniversalResolver::resolve_calldata`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallAnswer {
    /// Answer of a single call, or ABI `bytes[]` of every call's data for a
    /// multicall. Failed calls contribute their error payload.
    pub data: Vec<u8>,
    /// Whether the calldata was a multicall
    pub multicall: bool,
    /// One record per call
    pub resolution: Resolution,
}

impl UniversalResolver {
    /// Resolve calldata against `name` as given by the caller.
    ///
    /// `multicall(bytes[])` is unpacked and every inner call becomes one
    /// record of the same resolution.
    pub async fn resolve_calldata(
        &self,
        name: &str,
        data: &[u8],
        batch_endpoints: &[String],
    ) -> Result<CallAnswer> {
        let (calls, multicall) = match unpack_multicall(data) {
            Some(calls) => (calls?, true),
            None => (vec![data.to_vec()], false),
        };
        let queries: Vec<RecordQuery> = calls.into_iter().map(RecordQuery::call).collect();
        let resolution = self.resolve(name, &queries, batch_endpoints).await?;

        let data = if multicall {
            let answers: Vec<Vec<u8>> = resolution.records.iter().map(|r| r.data.clone()).collect();
            encode_multicall_answers(&answers)
        } else {
            resolution
                .records
                .first()
                .map(|r| r.data.clone())
                .unwrap_or_default()
        };
        Ok(CallAnswer {
            data,
            multicall,
            resolution,
        })
    }
}
