//! Conversion between DNS wire messages and core query/answer types

use dyndns_core::responder::AnswerData;
use dyndns_core::{DnsAnswer, DnsQuery, QueryType};
use hickory_proto::op::{Message, MessageType, Query, ResponseCode};
use hickory_proto::rr::rdata::{A, AAAA, TXT};
use hickory_proto::rr::{Name, RData, Record};

/// First question of a request, as a core query
pub fn parse_query(query: &Query) -> DnsQuery {
    DnsQuery::new(
        query.name().to_ascii(),
        QueryType::from_code(u16::from(query.query_type())),
    )
}

/// Build the resource record for an answer
///
/// The owner name is taken from the question so the reply echoes the case
/// the client asked with.
pub fn answer_record(owner: &Name, answer: &DnsAnswer) -> Record {
    let rdata = match &answer.data {
        AnswerData::A(ip) => RData::A(A::from(*ip)),
        AnswerData::Aaaa(ip) => RData::AAAA(AAAA::from(*ip)),
        AnswerData::Txt(text) => RData::TXT(TXT::new(vec![text.clone()])),
    };
    Record::from_rdata(owner.clone(), answer.ttl, rdata)
}

/// Start a response mirroring a request's header and questions
pub fn response_for(request: &Message, code: ResponseCode) -> Message {
    let mut response = Message::new();
    response.set_id(request.id());
    response.set_message_type(MessageType::Response);
    response.set_op_code(request.op_code());
    response.set_recursion_desired(request.recursion_desired());
    response.set_recursion_available(false);
    response.set_response_code(code);
    response.add_queries(request.queries().to_vec());
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_proto::op::OpCode;
    use hickory_proto::rr::RecordType;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    #[test]
    fn test_parse_query() {
        let query = Query::query(Name::from_str("Home.Example.com.").unwrap(), RecordType::AAAA);
        let parsed = parse_query(&query);
        assert_eq!(parsed.query_type, QueryType::Aaaa);
        assert_eq!(
            parsed.name.trim_end_matches('.').to_ascii_lowercase(),
            "home.example.com"
        );

        let mx = Query::query(Name::from_str("example.com.").unwrap(), RecordType::MX);
        assert_eq!(parse_query(&mx).query_type, QueryType::Other(15));
    }

    #[test]
    fn test_answer_record() {
        let owner = Name::from_str("home.example.com.").unwrap();
        let answer = DnsAnswer {
            name: "home.example.com.".to_string(),
            ttl: 42,
            data: AnswerData::A(Ipv4Addr::new(203, 0, 113, 5)),
        };

        let record = answer_record(&owner, &answer);
        assert_eq!(record.record_type(), RecordType::A);
        assert_eq!(record.ttl(), 42);
        assert_eq!(record.name(), &owner);
        assert!(record.to_string().contains("203.0.113.5"));
    }

    #[test]
    fn test_response_mirrors_request() {
        let mut request = Message::new();
        request.set_id(0x4242);
        request.set_op_code(OpCode::Query);
        request.set_recursion_desired(true);
        request.add_query(Query::query(
            Name::from_str("home.example.com.").unwrap(),
            RecordType::A,
        ));

        let response = response_for(&request, ResponseCode::Refused);
        assert_eq!(response.id(), 0x4242);
        assert_eq!(response.message_type(), MessageType::Response);
        assert_eq!(response.response_code(), ResponseCode::Refused);
        assert!(response.recursion_desired());
        assert_eq!(response.queries().len(), 1);
    }
}
