//! Contract Test: Update Resolution
//!
//! This test verifies how update callbacks turn into record writes.
//!
//! Constraints verified:
//! - An identical update twice changes nothing the second time
//! - IPv4 and IPv6 slots are updated independently
//! - The observed client address only fills its own family
//! - Invalid literals are ignored as if absent
//! - Every changed family is pushed into the DNS cache; cache failures are non-fatal
//!
//! If this test fails, the update path writes the wrong thing.

mod common;

use common::*;
use dyndns_core::config::UpdateConfig;
use dyndns_core::record::UpdateStatus;
use dyndns_core::resolver::{UpdateOutcome, UpdateRequest};
use dyndns_core::traits::RecordStore;
use dyndns_core::{MemoryRecordStore, UpdateResolver};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

#[tokio::test]
async fn identical_update_twice_is_no_change() {
    let h = Harness::new();
    let record = h.create("home.example.com").await;

    let request = UpdateRequest::new("home.example.com", &record.update_token)
        .with_ipv4("203.0.113.5");

    let first = h.resolver.apply(&request).await.unwrap();
    assert_eq!(
        first,
        UpdateOutcome::Updated {
            ipv4_changed: true,
            ipv6_changed: false
        }
    );
    let after_first = h.fetch("home.example.com").await;
    assert_eq!(after_first.update_count, 1);
    assert_eq!(after_first.last_update_status, Some(UpdateStatus::Success));

    let second = h.resolver.apply(&request).await.unwrap();
    assert_eq!(second, UpdateOutcome::NoChange);

    let after_second = h.fetch("home.example.com").await;
    assert_eq!(after_second.update_count, 1, "No-change update must not count");
    assert_eq!(after_second.last_update_status, Some(UpdateStatus::NoChange));
    assert_eq!(after_second.last_updated, after_first.last_updated);
    assert!(after_second.last_update_attempt >= after_first.last_update_attempt);

    assert_eq!(h.cache.call_count(), 1, "Only the real change is pushed");
}

#[tokio::test]
async fn update_count_matches_changing_calls() {
    let h = Harness::new();
    let record = h.create("home.example.com").await;
    let token = record.update_token.as_str();

    let sequence = [
        "203.0.113.1",
        "203.0.113.1",
        "203.0.113.2",
        "203.0.113.2",
        "203.0.113.2",
        "203.0.113.1",
    ];
    for ip in sequence {
        let accepted = h
            .resolver
            .update("home.example.com", token, Some(ip), None, None)
            .await
            .unwrap();
        assert!(accepted);
    }

    let fetched = h.fetch("home.example.com").await;
    assert_eq!(fetched.update_count, 3);
    assert_eq!(fetched.ipv4_address, Some(Ipv4Addr::new(203, 0, 113, 1)));
}

#[tokio::test]
async fn families_update_independently() {
    let h = Harness::new();
    let record = h.create("home.example.com").await;
    let token = record.update_token.clone();

    h.resolver
        .apply(&UpdateRequest::new("home.example.com", &token).with_ipv4("203.0.113.5"))
        .await
        .unwrap();
    h.resolver
        .apply(&UpdateRequest::new("home.example.com", &token).with_ipv6("2001:db8::5"))
        .await
        .unwrap();

    let fetched = h.fetch("home.example.com").await;
    assert_eq!(fetched.ipv4_address, Some(Ipv4Addr::new(203, 0, 113, 5)));
    assert_eq!(fetched.ipv6_address, Some("2001:db8::5".parse::<Ipv6Addr>().unwrap()));
    assert_eq!(fetched.update_count, 2);

    let pushed: Vec<&'static str> = h.cache.pushed().iter().map(|r| r.type_name()).collect();
    assert_eq!(pushed, vec!["A", "AAAA"]);
}

#[tokio::test]
async fn both_families_in_one_call_count_once() {
    let h = Harness::new();
    let record = h.create("home.example.com").await;

    let outcome = h
        .resolver
        .apply(
            &UpdateRequest::new("home.example.com", &record.update_token)
                .with_ipv4("203.0.113.5")
                .with_ipv6("2001:db8::5"),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            ipv4_changed: true,
            ipv6_changed: true
        }
    );
    assert_eq!(h.fetch("home.example.com").await.update_count, 1);
    assert_eq!(h.cache.call_count(), 2);
}

#[tokio::test]
async fn observed_address_fills_only_its_family() {
    let h = Harness::new();
    let record = h.create("home.example.com").await;
    let client: IpAddr = "198.51.100.7".parse().unwrap();

    h.resolver
        .apply(&UpdateRequest::new("home.example.com", &record.update_token).with_observed(client))
        .await
        .unwrap();

    let fetched = h.fetch("home.example.com").await;
    assert_eq!(fetched.ipv4_address, Some(Ipv4Addr::new(198, 51, 100, 7)));
    assert_eq!(fetched.ipv6_address, None);
    assert_eq!(fetched.last_update_ip, Some(client));
}

#[tokio::test]
async fn supplied_literal_suppresses_fallback() {
    let h = Harness::new();
    let record = h.create("home.example.com").await;

    h.resolver
        .apply(
            &UpdateRequest::new("home.example.com", &record.update_token)
                .with_ipv6("2001:db8::5")
                .with_observed("198.51.100.7".parse().unwrap()),
        )
        .await
        .unwrap();

    let fetched = h.fetch("home.example.com").await;
    assert_eq!(fetched.ipv4_address, None, "Client address must not fill IPv4");
    assert_eq!(fetched.ipv6_address, Some("2001:db8::5".parse().unwrap()));
}

#[tokio::test]
async fn invalid_literal_from_ipv6_client_fills_ipv6() {
    let h = Harness::new();
    let record = h.create("home.example.com").await;
    let client: IpAddr = "2001:db8::beef".parse().unwrap();

    let outcome = h
        .resolver
        .apply(
            &UpdateRequest::new("home.example.com", &record.update_token)
                .with_ipv4("not-an-ip")
                .with_observed(client),
        )
        .await
        .unwrap();

    assert_eq!(
        outcome,
        UpdateOutcome::Updated {
            ipv4_changed: false,
            ipv6_changed: true
        }
    );
    let fetched = h.fetch("home.example.com").await;
    assert_eq!(fetched.ipv4_address, None);
    assert_eq!(fetched.ipv6_address, Some("2001:db8::beef".parse().unwrap()));
}

#[tokio::test]
async fn invalid_literal_without_client_is_no_change() {
    let h = Harness::new();
    let record = h.create("home.example.com").await;

    let outcome = h
        .resolver
        .apply(&UpdateRequest::new("home.example.com", &record.update_token).with_ipv4("999.1.1.1"))
        .await
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::NoChange);
    let fetched = h.fetch("home.example.com").await;
    assert_eq!(fetched.update_count, 0);
    assert_eq!(fetched.last_update_status, Some(UpdateStatus::NoChange));
    assert_eq!(h.cache.call_count(), 0);
}

#[tokio::test]
async fn cache_failure_does_not_fail_update() {
    let store = Arc::new(MemoryRecordStore::new());
    let cache = FailingDnsCache::new();
    let resolver = UpdateResolver::new(
        store.clone(),
        Arc::new(cache.clone()),
        &UpdateConfig::default(),
    );

    let record = store
        .create(dyndns_core::DynamicRecord::new(
            1,
            "home.example.com",
            None,
            "token-1".to_string(),
        ))
        .await
        .unwrap();

    let accepted = resolver
        .update("home.example.com", &record.update_token, Some("203.0.113.5"), None, None)
        .await
        .unwrap();

    assert!(accepted);
    assert_eq!(cache.call_count(), 1);
    let fetched = store.get_by_domain("home.example.com").await.unwrap().unwrap();
    assert_eq!(fetched.ipv4_address, Some(Ipv4Addr::new(203, 0, 113, 5)));
}

#[tokio::test]
async fn cache_push_uses_configured_ttl() {
    let h = Harness::new();
    let record = h.create("Home.Example.com").await;

    h.resolver
        .apply(&UpdateRequest::new("HOME.example.com", &record.update_token).with_ipv4("203.0.113.5"))
        .await
        .unwrap();

    let pushed = h.cache.pushed();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].name, "home.example.com");
    assert_eq!(pushed[0].address, IpAddr::V4(Ipv4Addr::new(203, 0, 113, 5)));
    assert_eq!(pushed[0].ttl, UpdateConfig::default().cache_ttl_secs);
}
