//! DNS query responder
//!
//! Synthesizes answers for managed names straight from the record store, so
//! a fresh update is visible on the very next query. Anything the responder
//! cannot answer is deferred to the DNS host instead of being answered
//! negatively. The deferral carries its reason: a name with no active record
//! behind it must not be served from older data, while a slow or failing
//! store may be.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::AppRecord;
use crate::record::{DynamicRecord, normalize_domain};
use crate::traits::RecordStore;

/// DNS query types the responder distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryType {
    A,
    Aaaa,
    Txt,
    /// Any other type, by its numeric code
    Other(u16),
}

impl QueryType {
    /// Map a numeric RR type code
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => QueryType::A,
            28 => QueryType::Aaaa,
            16 => QueryType::Txt,
            other => QueryType::Other(other),
        }
    }
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryType::A => write!(f, "A"),
            QueryType::Aaaa => write!(f, "AAAA"),
            QueryType::Txt => write!(f, "TXT"),
            QueryType::Other(code) => write!(f, "TYPE{}", code),
        }
    }
}

/// A parsed DNS question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    /// Query name, with or without a trailing dot
    pub name: String,
    pub query_type: QueryType,
}

impl DnsQuery {
    pub fn new(name: impl Into<String>, query_type: QueryType) -> Self {
        Self {
            name: name.into(),
            query_type,
        }
    }
}

/// Answer payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Txt(String),
}

/// A synthesized answer record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsAnswer {
    /// Owner name as it was asked
    pub name: String,
    pub ttl: u32,
    pub data: AnswerData,
}

/// Why the responder stepped aside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    /// Name not covered, unsupported type, or no active record holding the
    /// requested data. Nothing may be served for it from cached state.
    NotServed,
    /// The store lookup failed or timed out
    Unavailable,
}

/// What the responder decided about a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Authoritative answer from current record state
    Answer(DnsAnswer),
    /// Not handled here; the host continues its normal resolution
    Defer(DeferReason),
}

impl QueryOutcome {
    /// Whether the responder handled the query
    pub fn is_answer(&self) -> bool {
        matches!(self, QueryOutcome::Answer(_))
    }

    /// Whether the host may fall back to previously cached answers
    pub fn allows_cached_answer(&self) -> bool {
        matches!(self, QueryOutcome::Defer(DeferReason::Unavailable))
    }
}

/// Whether an app record name covers a query name
///
/// Exact case-insensitive comparison; a pattern starting with `*` covers
/// every name.
pub fn name_matches(app_record_name: &str, query_name: &str) -> bool {
    let pattern = app_record_name.trim();
    if pattern.starts_with('*') {
        return true;
    }
    normalize_domain(pattern) == normalize_domain(query_name)
}

/// Text of the TXT answer for a record
pub fn txt_for(record: &DynamicRecord) -> String {
    format!(
        "Updated: {}",
        record.last_updated.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Answers DNS queries for managed names
#[derive(Clone)]
pub struct QueryResponder {
    store: Arc<dyn RecordStore>,
    lookup_timeout: Duration,
}

impl QueryResponder {
    /// Create a responder
    ///
    /// `lookup_timeout` bounds each store read; a slower store makes the
    /// responder defer.
    pub fn new(store: Arc<dyn RecordStore>, lookup_timeout: Duration) -> Self {
        Self {
            store,
            lookup_timeout,
        }
    }

    /// Answer a query or defer
    ///
    /// Never fails: every internal error becomes a deferral with
    /// [`DeferReason::Unavailable`].
    pub async fn respond(&self, query: &DnsQuery, app_record: &AppRecord) -> QueryOutcome {
        const NOT_SERVED: QueryOutcome = QueryOutcome::Defer(DeferReason::NotServed);
        const UNAVAILABLE: QueryOutcome = QueryOutcome::Defer(DeferReason::Unavailable);

        if !name_matches(&app_record.name, &query.name) {
            return NOT_SERVED;
        }

        if let QueryType::Other(code) = query.query_type {
            debug!(name = %query.name, code, "Unsupported query type, deferring");
            return NOT_SERVED;
        }

        let domain = normalize_domain(&query.name);
        if domain.is_empty() {
            return NOT_SERVED;
        }

        let record =
            match tokio::time::timeout(self.lookup_timeout, self.store.get_by_domain(&domain)).await
            {
                Ok(Ok(Some(record))) if record.is_active => record,
                Ok(Ok(_)) => return NOT_SERVED,
                Ok(Err(e)) => {
                    warn!(name = %domain, "Record lookup failed, deferring: {}", e);
                    return UNAVAILABLE;
                }
                Err(_) => {
                    warn!(
                        name = %domain,
                        timeout_ms = self.lookup_timeout.as_millis() as u64,
                        "Record lookup timed out, deferring"
                    );
                    return UNAVAILABLE;
                }
            };

        let data = match query.query_type {
            QueryType::A => record.ipv4_address.map(AnswerData::A),
            QueryType::Aaaa => record.ipv6_address.map(AnswerData::Aaaa),
            QueryType::Txt => Some(AnswerData::Txt(txt_for(&record))),
            QueryType::Other(_) => None,
        };

        match data {
            Some(data) => {
                debug!(name = %domain, query_type = %query.query_type, "Answering from record");
                QueryOutcome::Answer(DnsAnswer {
                    name: query.name.clone(),
                    ttl: app_record.ttl,
                    data,
                })
            }
            None => NOT_SERVED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_matches() {
        assert!(name_matches("home.example.com", "HOME.example.com."));
        assert!(!name_matches("home.example.com", "other.example.com"));
        assert!(name_matches("*", "anything.test"));
        assert!(name_matches("*.example.com", "foo.example.com"));
        assert!(!name_matches("bar.example.com", "foo.example.com"));
    }

    #[test]
    fn test_query_type_codes() {
        assert_eq!(QueryType::from_code(1), QueryType::A);
        assert_eq!(QueryType::from_code(28), QueryType::Aaaa);
        assert_eq!(QueryType::from_code(16), QueryType::Txt);
        assert_eq!(QueryType::from_code(15), QueryType::Other(15));
        assert_eq!(QueryType::Other(15).to_string(), "TYPE15");
    }

    #[test]
    fn test_txt_format() {
        let mut record = DynamicRecord::new(1, "home.example.com", None, "t".into());
        record.last_updated = chrono::DateTime::parse_from_rfc3339("2024-03-01T08:05:09Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(txt_for(&record), "Updated: 2024-03-01 08:05:09");
    }

    #[test]
    fn test_only_unavailable_store_allows_cached_answer() {
        assert!(QueryOutcome::Defer(DeferReason::Unavailable).allows_cached_answer());
        assert!(!QueryOutcome::Defer(DeferReason::NotServed).allows_cached_answer());
    }
}
