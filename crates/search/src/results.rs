//! SearxNG JSON response decoding and result accumulation.

use std::collections::HashSet;

use pipeline::{CollectorError, SourceRecord, Timestamp};
use serde::Deserialize;

/// The part of a SearxNG `format=json` response this adapter reads.
#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

pub fn decode(body: &[u8]) -> Result<SearchResponse, CollectorError> {
    serde_json::from_slice(body).map_err(|e| CollectorError::Decode {
        message: e.to_string(),
    })
}

/// Accumulates hits across result pages: drops hits without a URL, keeps the
/// first hit per URL and stops at `max_count`.
#[derive(Debug)]
pub struct ResultSet {
    max_count: usize,
    seen: HashSet<String>,
    records: Vec<SourceRecord>,
}

impl ResultSet {
    pub fn new(max_count: usize) -> Self {
        Self {
            max_count,
            seen: HashSet::new(),
            records: Vec::new(),
        }
    }

    /// Adds the hits of one page and returns how many were new.
    pub fn extend(&mut self, hits: Vec<SearchHit>, retrieved_at: Timestamp) -> usize {
        let before = self.records.len();
        for hit in hits {
            if self.is_full() {
                break;
            }
            let Some(url) = hit.url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
            else {
                continue;
            };
            if !self.seen.insert(url.clone()) {
                continue;
            }
            self.records.push(SourceRecord::new(
                url,
                hit.title.unwrap_or_default().trim(),
                hit.content.unwrap_or_default().trim(),
                retrieved_at,
            ));
        }
        self.records.len() - before
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.max_count
    }

    pub fn into_records(self) -> Vec<SourceRecord> {
        self.records
    }
}
