//! UDP DNS host
//!
//! Answers queries for managed names. Each datagram goes through:
//!
//! ```text
//! datagram ─► parse ─► allowed network? ─no─► REFUSED
//!                            │yes
//!                            ▼
//!                     QueryResponder ─answer─► NOERROR (authoritative)
//!                            │defer
//!                            ▼
//!                   store unavailable? ─no──────┐
//!                            │yes               │
//!                            ▼                  │
//!                      AnswerCache ─hit─► NOERROR
//!                            │miss              │
//!                            ▼◄─────────────────┘
//!              app record covers name? ─yes─► NOERROR, no answers
//!                            │no
//!                            ▼
//!                         REFUSED
//! ```
//!
//! Malformed datagrams and responses get no reply at all.

use dyndns_core::responder::name_matches;
use dyndns_core::{AppRecord, QueryOutcome, QueryResponder};
use hickory_proto::op::{Message, MessageType, OpCode, ResponseCode};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::task::JoinSet;
use tracing::{debug, info, trace, warn};

use crate::cache::AnswerCache;
use crate::policy::NetworkPolicy;
use crate::wire;

/// Largest datagram accepted
const MAX_DATAGRAM: usize = 4096;

/// DNS host answering for one app record
pub struct DnsServer {
    responder: QueryResponder,
    cache: Arc<AnswerCache>,
    app_record: AppRecord,
    policy: NetworkPolicy,
}

impl DnsServer {
    /// Create a server
    ///
    /// The allowed-network policy is taken from the app record data.
    pub fn new(responder: QueryResponder, cache: Arc<AnswerCache>, app_record: AppRecord) -> Self {
        let policy = NetworkPolicy::from_app_record_data(&app_record.data);
        Self {
            responder,
            cache,
            app_record,
            policy,
        }
    }

    /// Handle one datagram, returning the encoded reply
    ///
    /// `None` means the datagram is dropped without a reply.
    pub async fn handle_packet(&self, packet: &[u8], source: SocketAddr) -> Option<Vec<u8>> {
        let request = match Message::from_vec(packet) {
            Ok(message) => message,
            Err(e) => {
                debug!(%source, "Dropping malformed datagram: {}", e);
                return None;
            }
        };

        if request.message_type() != MessageType::Query {
            trace!(%source, "Dropping non-query message");
            return None;
        }

        let response = self.handle_message(&request, source).await;
        match response.to_vec() {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(%source, "Failed to encode response: {}", e);
                None
            }
        }
    }

    async fn handle_message(&self, request: &Message, source: SocketAddr) -> Message {
        if request.op_code() != OpCode::Query {
            return wire::response_for(request, ResponseCode::NotImp);
        }

        if !self.policy.allows(source.ip()) {
            debug!(%source, "Source outside allowed networks");
            return wire::response_for(request, ResponseCode::Refused);
        }

        let Some(question) = request.queries().first() else {
            return wire::response_for(request, ResponseCode::FormErr);
        };
        let query = wire::parse_query(question);

        match self.responder.respond(&query, &self.app_record).await {
            QueryOutcome::Answer(answer) => {
                let mut response = wire::response_for(request, ResponseCode::NoError);
                response.set_authoritative(true);
                response.add_answer(wire::answer_record(question.name(), &answer));
                response
            }
            outcome => {
                if outcome.allows_cached_answer()
                    && let Some(answer) = self.cache.lookup(&query).await
                {
                    trace!(name = %query.name, "Answering from cache");
                    let mut response = wire::response_for(request, ResponseCode::NoError);
                    response.add_answer(wire::answer_record(question.name(), &answer));
                    response
                } else if name_matches(&self.app_record.name, &query.name) {
                    wire::response_for(request, ResponseCode::NoError)
                } else {
                    wire::response_for(request, ResponseCode::Refused)
                }
            }
        }
    }

    /// Serve datagrams until shutdown
    ///
    /// Each datagram is handled on its own task; in-flight tasks are awaited
    /// before returning.
    pub async fn run_with_shutdown(
        self: Arc<Self>,
        socket: Arc<UdpSocket>,
        mut shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<(), dyndns_core::Error> {
        info!("DNS server listening on {}", socket.local_addr()?);

        let mut tasks = JoinSet::new();
        let mut buf = vec![0u8; MAX_DATAGRAM];

        loop {
            tokio::select! {
                received = socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, source)) => {
                            let packet = buf[..len].to_vec();
                            let server = self.clone();
                            let socket = socket.clone();
                            tasks.spawn(async move {
                                if let Some(reply) = server.handle_packet(&packet, source).await
                                    && let Err(e) = socket.send_to(&reply, source).await
                                {
                                    debug!(%source, "Failed to send reply: {}", e);
                                }
                            });
                        }
                        Err(e) => warn!("DNS receive failed: {}", e),
                    }
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}

                _ = &mut shutdown_rx => {
                    info!("DNS server shutting down");
                    break;
                }
            }
        }

        while tasks.join_next().await.is_some() {}
        Ok(())
    }
}
