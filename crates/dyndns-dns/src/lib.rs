// # DNS Host Integration
//
// This crate hosts the dynamic DNS responder on a UDP socket.
//
// ## Components
//
// - `AnswerCache`: the host answer cache; implements `DnsCache` so the
//   update path can push fresh addresses into it
// - `NetworkPolicy`: allowed-network check from the app record data
// - `wire`: hickory-proto message conversion
// - `DnsServer`: the UDP loop tying them to a `QueryResponder`
//
// ## Trust Level: Untrusted (Network Facing)
//
// **Allowed Capabilities**:
// - ✅ Read records through the `QueryResponder`
// - ✅ Answer, refuse or drop datagrams
//
// **Forbidden Capabilities**:
// - ❌ Mutate records (owned by `UpdateResolver` and `RecordService`)
// - ❌ Recurse to upstream servers

pub mod cache;
pub mod policy;
pub mod server;
pub mod wire;

pub use cache::AnswerCache;
pub use policy::{IpNetwork, NetworkPolicy};
pub use server::DnsServer;
