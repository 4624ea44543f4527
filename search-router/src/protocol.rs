//! Wire types for the catalog search endpoint.
//!
//! The upstream returns one `SearchResult` per term:
//!
//! ```json
//! {
//!   "resultCount": 1,
//!   "results": [
//!     {
//!       "wrapperType": "track",
//!       "kind": "song",
//!       "artistId": 909253,
//!       "trackName": "Upside Down",
//!       "trackPrice": 1.29,
//!       "currency": "USD",
//!       "isStreamable": true
//!     }
//!   ]
//! }
//! ```
//!
//! Upstream entries routinely omit fields. Missing or `null` strings and numbers
//! decode to empty/zero and missing flags to `false`; unknown fields are ignored.
//!
//! The router answers with a JSON array holding one element per inbound
//! query, in query order. Each element is either the `SearchResult` for that
//! query or `{"error": "<description>"}`.

use crate::errors::SearchError;
use hyper::body::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A single non-empty search term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn new(value: impl Into<String>) -> Result<Self, SearchError> {
        let value = value.into();
        if value.is_empty() {
            return Err(SearchError::InvalidQuery);
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Decoded upstream response for one query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(deserialize_with = "null_as_default")]
    pub result_count: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub results: Vec<SearchEntry>,
}

/// One catalog item (track, album, artist, ...) in a search result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchEntry {
    #[serde(deserialize_with = "null_as_default")]
    pub wrapper_type: String,
    #[serde(deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub artist_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub collection_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub track_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub artist_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub collection_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub track_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub collection_censored_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub track_censored_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub artist_view_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub collection_view_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub track_view_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub preview_url: String,
    #[serde(rename = "artworkUrl30", deserialize_with = "null_as_default")]
    pub artwork_url_30: String,
    #[serde(rename = "artworkUrl60", deserialize_with = "null_as_default")]
    pub artwork_url_60: String,
    #[serde(rename = "artworkUrl100", deserialize_with = "null_as_default")]
    pub artwork_url_100: String,
    #[serde(deserialize_with = "null_as_default")]
    pub collection_price: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub track_price: f64,
    /// ISO 8601 timestamp as sent by the upstream, e.g. `2012-01-01T08:00:00Z`.
    /// Passed through verbatim; an absent date stays empty.
    #[serde(deserialize_with = "null_as_default")]
    pub release_date: String,
    #[serde(deserialize_with = "null_as_default")]
    pub collection_explicitness: String,
    #[serde(deserialize_with = "null_as_default")]
    pub track_explicitness: String,
    #[serde(deserialize_with = "null_as_default")]
    pub disc_count: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub disc_number: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub track_count: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub track_number: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub track_time_millis: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub country: String,
    #[serde(deserialize_with = "null_as_default")]
    pub currency: String,
    #[serde(deserialize_with = "null_as_default")]
    pub primary_genre_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub is_streamable: bool,
    /// Only present on compilation entries.
    #[serde(skip_serializing_if = "String::is_empty", deserialize_with = "null_as_default")]
    pub collection_artist_name: String,
    #[serde(skip_serializing_if = "is_zero", deserialize_with = "null_as_default")]
    pub collection_artist_id: i64,
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}

/// Decodes an explicit `null` the same way as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A query parameter as received: a valid query or the reason it was rejected.
pub type ParsedQuery = Result<SearchQuery, SearchError>;

/// Outcome of searching one query: the decoded result or why it failed.
pub type FanOutOutcome = Result<SearchResult, SearchError>;

/// Outcomes of a fan-out, index-aligned with the queries that produced them.
#[derive(Debug, Default)]
pub struct AggregatedResponse {
    outcomes: Vec<FanOutOutcome>,
}

impl AggregatedResponse {
    pub fn new(outcomes: Vec<FanOutOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[FanOutOutcome] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<FanOutOutcome> {
        self.outcomes
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_err()).count()
    }

    /// Serializes the outcomes as the JSON array returned to the caller.
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        let entries: Vec<ResponseEntry<'_>> =
            self.outcomes.iter().map(ResponseEntry::from).collect();
        serde_json::to_vec(&entries).map(Bytes::from)
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum ResponseEntry<'a> {
    Found(&'a SearchResult),
    Failed { error: String },
}

impl<'a> From<&'a FanOutOutcome> for ResponseEntry<'a> {
    fn from(outcome: &'a FanOutOutcome) -> Self {
        match outcome {
            Ok(result) => ResponseEntry::Found(result),
            Err(e) => ResponseEntry::Failed {
                error: e.to_string(),
            },
        }
    }
}
