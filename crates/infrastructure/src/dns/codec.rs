//! DNS wire codec backed by `hickory-proto`.
//!
//! Full decoding goes through hickory; EDNS option codes are read straight
//! from the OPT record bytes so conformance checks do not depend on how the
//! codec models unknown options.

use doqd_application::ports::QueryCodec;
use doqd_domain::{DomainError, DoqQuery};
use hickory_proto::op::{Message, MessageType, OpCode, Query};
use hickory_proto::rr::{DNSClass, Name, RecordType};
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use std::str::FromStr;
use std::sync::Arc;

const HEADER_LEN: usize = 12;
const OPT_RR_TYPE: u16 = 41;

/// Advertised UDP payload size of the OPT record appended to client queries.
pub const CLIENT_EDNS_PAYLOAD: u16 = 4096;

#[derive(Debug, Default, Clone, Copy)]
pub struct HickoryQueryCodec;

impl HickoryQueryCodec {
    pub fn new() -> Self {
        Self
    }
}

impl QueryCodec for HickoryQueryCodec {
    fn decode_query(&self, wire: &[u8]) -> Result<DoqQuery, DomainError> {
        let message =
            Message::from_vec(wire).map_err(|e| DomainError::MalformedQuery(e.to_string()))?;

        let (name, record_type) = match message.queries().first() {
            Some(q) => (q.name().to_utf8(), q.query_type().to_string()),
            None => (String::new(), String::new()),
        };

        Ok(DoqQuery {
            id: message.id(),
            name: Arc::from(name.as_str()),
            record_type: Arc::from(record_type.as_str()),
            edns_options: scan_edns_option_codes(wire),
            wire: encode_message(&message)?,
        })
    }

    fn encode_response(&self, wire: &[u8]) -> Result<Vec<u8>, DomainError> {
        let message =
            Message::from_vec(wire).map_err(|e| DomainError::MalformedResponse(e.to_string()))?;
        encode_message(&message)
    }
}

pub fn encode_message(message: &Message) -> Result<Vec<u8>, DomainError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);

    message
        .emit(&mut encoder)
        .map_err(|e| DomainError::Encode(e.to_string()))?;

    Ok(buf)
}

pub fn decode_message(wire: &[u8]) -> Result<Message, DomainError> {
    Message::from_vec(wire).map_err(|e| DomainError::MalformedResponse(e.to_string()))
}

/// Builds a single-question query message with transaction id 0.
pub fn build_query_message(
    name: &str,
    record_type: &str,
    recursion_desired: bool,
) -> Result<Message, DomainError> {
    let name = Name::from_str(name)
        .map_err(|e| DomainError::MalformedQuery(format!("Invalid name '{}': {}", name, e)))?;
    let record_type = RecordType::from_str(&record_type.to_ascii_uppercase()).map_err(|e| {
        DomainError::MalformedQuery(format!("Invalid record type '{}': {}", record_type, e))
    })?;

    let mut query = Query::new();
    query.set_name(name);
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);

    let mut message = Message::new(0, MessageType::Query, OpCode::Query);
    message.set_recursion_desired(recursion_desired);
    message.add_query(query);

    Ok(message)
}

/// Encodes a query and, when `dnssec` is set, appends an EDNS(0) OPT record
/// advertising a 4096-byte payload with the DO bit.
pub fn build_query(
    name: &str,
    record_type: &str,
    recursion_desired: bool,
    dnssec: bool,
) -> Result<Vec<u8>, DomainError> {
    let message = build_query_message(name, record_type, recursion_desired)?;
    let mut wire = encode_message(&message)?;
    if dnssec {
        append_opt_record(&mut wire, CLIENT_EDNS_PAYLOAD, true, &[])?;
    }
    Ok(wire)
}

/// Appends an OPT pseudo-record to an encoded message and bumps ARCOUNT.
/// `options` are `(code, data)` pairs written in order.
pub fn append_opt_record(
    wire: &mut Vec<u8>,
    payload_size: u16,
    dnssec_ok: bool,
    options: &[(u16, &[u8])],
) -> Result<(), DomainError> {
    if wire.len() < HEADER_LEN {
        return Err(DomainError::Encode("message shorter than header".into()));
    }

    let rdata_len: usize = options.iter().map(|(_, data)| 4 + data.len()).sum();
    let rdata_len = u16::try_from(rdata_len)
        .map_err(|_| DomainError::Encode("EDNS options exceed 65535 bytes".into()))?;

    let arcount = u16::from_be_bytes([wire[10], wire[11]])
        .checked_add(1)
        .ok_or_else(|| DomainError::Encode("additional section is full".into()))?;
    wire[10..12].copy_from_slice(&arcount.to_be_bytes());

    wire.push(0x00);
    wire.extend_from_slice(&OPT_RR_TYPE.to_be_bytes());
    wire.extend_from_slice(&payload_size.to_be_bytes());
    // extended rcode, version
    wire.extend_from_slice(&[0x00, 0x00]);
    let flags: u16 = if dnssec_ok { 0x8000 } else { 0x0000 };
    wire.extend_from_slice(&flags.to_be_bytes());
    wire.extend_from_slice(&rdata_len.to_be_bytes());

    for (code, data) in options {
        wire.extend_from_slice(&code.to_be_bytes());
        wire.extend_from_slice(&(data.len() as u16).to_be_bytes());
        wire.extend_from_slice(data);
    }

    Ok(())
}

/// Returns the option codes of every OPT record in the message, in wire order.
/// Truncated input yields whatever was read before the cut.
pub fn scan_edns_option_codes(buf: &[u8]) -> Vec<u16> {
    let mut codes = Vec::new();
    if buf.len() < HEADER_LEN {
        return codes;
    }

    let qdcount = read_u16(buf, 4).unwrap_or(0);
    let rrcount = [6, 8, 10]
        .iter()
        .map(|&offset| read_u16(buf, offset).unwrap_or(0) as usize)
        .sum::<usize>();

    let mut pos = HEADER_LEN;
    for _ in 0..qdcount {
        match skip_name(buf, pos) {
            Some(end) => pos = end + 4,
            None => return codes,
        }
    }

    for _ in 0..rrcount {
        let Some(end) = skip_name(buf, pos) else {
            return codes;
        };
        pos = end;
        let (Some(rr_type), Some(rdlen)) = (read_u16(buf, pos), read_u16(buf, pos + 8)) else {
            return codes;
        };
        pos += 10;
        let rdlen = rdlen as usize;
        if pos + rdlen > buf.len() {
            return codes;
        }

        if rr_type == OPT_RR_TYPE {
            let rdata = &buf[pos..pos + rdlen];
            let mut opt_pos = 0;
            while let (Some(code), Some(len)) =
                (read_u16(rdata, opt_pos), read_u16(rdata, opt_pos + 2))
            {
                codes.push(code);
                opt_pos += 4 + len as usize;
            }
        }
        pos += rdlen;
    }

    codes
}

fn read_u16(buf: &[u8], pos: usize) -> Option<u16> {
    let bytes = buf.get(pos..pos + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Position just past an encoded name. A compression pointer terminates it.
fn skip_name(buf: &[u8], mut pos: usize) -> Option<usize> {
    loop {
        let label = *buf.get(pos)? as usize;
        if label == 0 {
            return Some(pos + 1);
        }
        if label & 0xC0 == 0xC0 {
            buf.get(pos + 1)?;
            return Some(pos + 2);
        }
        if label & 0xC0 != 0 {
            return None;
        }
        pos += 1 + label;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query_sets_zero_id_and_rd() {
        let wire = build_query("example.com", "A", true, false).unwrap();
        assert_eq!(&wire[0..2], &[0, 0]);
        assert_eq!(wire[2] & 0x01, 0x01, "RD flag should be set");
        assert_eq!(&wire[10..12], &[0, 0]);
    }

    #[test]
    fn test_build_query_without_recursion() {
        let wire = build_query("example.com", "aaaa", false, false).unwrap();
        assert_eq!(wire[2] & 0x01, 0x00);
    }

    #[test]
    fn test_dnssec_query_carries_do_bit() {
        let wire = build_query("example.com", "A", true, true).unwrap();
        assert_eq!(&wire[10..12], &[0, 1]);

        let message = Message::from_vec(&wire).unwrap();
        assert_eq!(message.queries().len(), 1);

        let opt = &wire[wire.len() - 11..];
        assert_eq!(&opt[1..3], &[0x00, 0x29]);
        assert_eq!(&opt[3..5], &4096u16.to_be_bytes());
        assert_eq!(opt[7], 0x80);
    }

    #[test]
    fn test_scan_finds_options_in_order() {
        let mut wire = build_query("example.com", "A", true, false).unwrap();
        append_opt_record(&mut wire, 1232, false, &[(10, &[1, 2, 3, 4, 5, 6, 7, 8]), (11, &[])])
            .unwrap();
        assert_eq!(scan_edns_option_codes(&wire), vec![10, 11]);
    }

    #[test]
    fn test_scan_without_opt_is_empty() {
        let wire = build_query("example.com", "MX", true, false).unwrap();
        assert!(scan_edns_option_codes(&wire).is_empty());
    }

    #[test]
    fn test_scan_tolerates_truncation() {
        let mut wire = build_query("example.com", "A", true, false).unwrap();
        append_opt_record(&mut wire, 1232, false, &[(11, &[0, 0])]).unwrap();
        wire.truncate(wire.len() - 3);
        assert!(scan_edns_option_codes(&wire).is_empty());
        assert!(scan_edns_option_codes(&[0u8; 5]).is_empty());
    }

    #[test]
    fn test_skip_name_handles_pointer() {
        let buf = [3, b'w', b'w', b'w', 0xC0, 0x0C, 0xFF];
        assert_eq!(skip_name(&buf, 0), Some(6));
        assert_eq!(skip_name(&[5, b'a'], 0), None);
    }

    #[test]
    fn test_decode_extracts_question() {
        let codec = HickoryQueryCodec::new();
        let wire = build_query("www.example.com", "AAAA", true, false).unwrap();
        let query = codec.decode_query(&wire).unwrap();
        assert_eq!(query.id, 0);
        assert_eq!(query.name.as_ref(), "www.example.com.");
        assert_eq!(query.record_type.as_ref(), "AAAA");
        assert!(query.edns_options.is_empty());
        assert_eq!(query.wire, wire);
    }

    #[test]
    fn test_decoded_keepalive_fails_conformance() {
        let codec = HickoryQueryCodec::new();
        let mut wire = build_query("example.com", "A", true, false).unwrap();
        append_opt_record(&mut wire, 1232, false, &[(11, &[0x00, 0x64])]).unwrap();

        let query = codec.decode_query(&wire).unwrap();
        assert_eq!(query.edns_options, vec![11]);
        assert!(matches!(
            query.check_conformance(),
            Err(DomainError::ProhibitedEdnsOption(11))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = HickoryQueryCodec::new();
        let garbage = [0xFFu8; 20];
        assert!(matches!(
            codec.decode_query(&garbage),
            Err(DomainError::MalformedQuery(_))
        ));
    }

    #[test]
    fn test_encode_response_rejects_garbage() {
        let codec = HickoryQueryCodec::new();
        assert!(matches!(
            codec.encode_response(&[0x01, 0x02, 0x03]),
            Err(DomainError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_invalid_record_type() {
        assert!(matches!(
            build_query("example.com", "NOTATYPE", true, false),
            Err(DomainError::MalformedQuery(_))
        ));
    }
}
