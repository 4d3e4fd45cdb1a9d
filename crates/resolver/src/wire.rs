//! DNS wire format: query construction and response parsing.
//!
//! Covers exactly what the tunnel needs — a single-question A-record query,
//! and enough of RFC 1035 §4.1 to walk the answer/authority/additional
//! sections of a reply, including compressed names. Everything else
//! (other record/class/opcodes) is skipped, not interpreted.

use crate::error::ResolverError;
use std::net::Ipv4Addr;

const TYPE_A: u16 = 1;
const CLASS_IN: u16 = 1;
const POINTER_TAG: u8 = 0xc0;

/// Encode `name` as a sequence of length-prefixed labels terminated by a
/// zero-length label (RFC 1035 §4.1.2). `name` must not itself contain a
/// NUL byte or labels over 63 bytes.
pub fn encode_name(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 2);
    for label in name.split('.') {
        debug_assert!(label.len() <= 63, "DNS label exceeds 63 bytes");
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    out
}

/// Build a recursion-desired, single-question A/IN query for `name`.
pub fn build_query(name: &str, transaction_id: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + name.len());
    out.extend_from_slice(&transaction_id.to_be_bytes());
    out.extend_from_slice(&[0x01, 0x00]); // flags: recursion desired
    out.extend_from_slice(&1u16.to_be_bytes()); // qdcount
    out.extend_from_slice(&[0, 0, 0, 0, 0, 0]); // ancount, nscount, arcount
    out.extend(encode_name(name));
    out.extend_from_slice(&TYPE_A.to_be_bytes());
    out.extend_from_slice(&CLASS_IN.to_be_bytes());
    out
}

/// Number of bytes occupied by the name starting at `packet[at]`, whether
/// it is an inline label sequence, a compression pointer, or a sequence of
/// labels terminated by one. Does not follow the pointer.
fn name_len(packet: &[u8], at: usize) -> Result<usize, ResolverError> {
    let mut i = at;
    loop {
        let len = *packet.get(i).ok_or(ResolverError::TruncatedRecord)?;
        if len & POINTER_TAG == POINTER_TAG {
            return Ok(i + 2 - at);
        }
        if len == 0 {
            return Ok(i + 1 - at);
        }
        i += 1 + len as usize;
    }
}

/// Decode the (possibly compressed) name starting at `packet[at]`,
/// following compression pointers as needed. `packet` is the whole
/// message — pointers are offsets from its start.
fn decode_name(packet: &[u8], at: usize) -> Result<String, ResolverError> {
    let mut labels: Vec<String> = Vec::new();
    let mut cursor = at;
    let mut jumps = 0u8;
    loop {
        let len = *packet.get(cursor).ok_or(ResolverError::TruncatedRecord)?;
        if len & POINTER_TAG == POINTER_TAG {
            jumps += 1;
            if jumps > 16 {
                return Err(ResolverError::TruncatedRecord);
            }
            let hi = (len & !POINTER_TAG) as usize;
            let lo = *packet.get(cursor + 1).ok_or(ResolverError::TruncatedRecord)?;
            cursor = (hi << 8) | lo as usize;
            continue;
        }
        if len == 0 {
            break;
        }
        let start = cursor + 1;
        let end = start + len as usize;
        let label = packet
            .get(start..end)
            .ok_or(ResolverError::TruncatedRecord)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        cursor = end;
    }
    Ok(labels.join("."))
}

fn read_u16(packet: &[u8], at: usize) -> Result<u16, ResolverError> {
    let bytes = packet
        .get(at..at + 2)
        .ok_or(ResolverError::TruncatedRecord)?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// One resource record parsed from an answer/authority/additional section.
enum Record {
    /// An A record's address, plus the record's byte length in `packet`.
    A(Ipv4Addr, usize),
    /// A record this resolver does not interpret; still reports its byte
    /// length so the caller's cursor advances correctly.
    Skipped(usize),
}

fn parse_record(packet: &[u8], at: usize) -> Result<Record, ResolverError> {
    let name_bytes = name_len(packet, at)?;
    let mut i = at + name_bytes;
    let rtype = read_u16(packet, i)?;
    i += 2;
    let class = read_u16(packet, i)?;
    i += 2;
    i += 4; // TTL, not needed
    let rdlength = read_u16(packet, i)? as usize;
    i += 2;
    let rdata = packet
        .get(i..i + rdlength)
        .ok_or(ResolverError::TruncatedRecord)?;
    let total = i + rdlength - at;
    if rtype != TYPE_A || class != CLASS_IN {
        return Ok(Record::Skipped(total));
    }
    if rdlength != 4 {
        return Err(ResolverError::MalformedRdata);
    }
    Ok(Record::A(
        Ipv4Addr::new(rdata[0], rdata[1], rdata[2], rdata[3]),
        total,
    ))
}

/// Parse a DNS response: returns the transaction id and every A-record
/// address found across the answer, authority, and additional sections.
pub fn parse_response(packet: &[u8]) -> Result<(u16, Vec<String>), ResolverError> {
    if packet.len() < 12 {
        return Err(ResolverError::TruncatedHeader);
    }
    let response_code = packet[3] & 0x0f;
    if response_code != 0 {
        return Err(ResolverError::ResponseCode(response_code));
    }
    let transaction_id = read_u16(packet, 0)?;
    let question_count = read_u16(packet, 4)?;
    let answer_count = read_u16(packet, 6)?;
    let nameserver_count = read_u16(packet, 8)?;
    let additional_count = read_u16(packet, 10)?;

    let mut at = 12usize;
    for _ in 0..question_count {
        at += name_len(packet, at)?;
        at += 4; // qtype + qclass
    }

    let mut addrs = Vec::new();
    let total_records = answer_count as u32 + nameserver_count as u32 + additional_count as u32;
    for _ in 0..total_records {
        match parse_record(packet, at) {
            Ok(Record::A(addr, consumed)) => {
                addrs.push(addr.to_string());
                at += consumed;
            }
            Ok(Record::Skipped(consumed)) => at += consumed,
            Err(e) => return Err(e),
        }
    }
    Ok((transaction_id, addrs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_query_matches_reference_bytes() {
        let query = build_query("www.google.com", 0x2c13);
        let expected: [u8; 32] = [
            0x2c, 0x13, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x77,
            0x77, 0x77, 0x06, 0x67, 0x6f, 0x6f, 0x67, 0x6c, 0x65, 0x03, 0x63, 0x6f, 0x6d, 0x00,
            0x00, 0x01, 0x00, 0x01,
        ];
        assert_eq!(query, expected);
    }

    #[test]
    fn decode_name_round_trips_through_skip_len() {
        let mut packet = vec![0u8; 12];
        packet.extend(encode_name("www.google.com"));
        let at = 12;
        let decoded = decode_name(&packet, at).unwrap();
        assert_eq!(decoded, "www.google.com");
        assert_eq!(name_len(&packet, at).unwrap(), packet.len() - at);
    }

    #[test]
    fn decode_name_follows_compression_pointer() {
        let mut packet = vec![0u8; 12];
        let name_at = packet.len();
        packet.extend(encode_name("example.com"));
        // A second name that just points back at the first.
        let pointer_at = packet.len();
        packet.push(POINTER_TAG | ((name_at >> 8) as u8));
        packet.push((name_at & 0xff) as u8);

        assert_eq!(decode_name(&packet, name_at).unwrap(), "example.com");
        assert_eq!(decode_name(&packet, pointer_at).unwrap(), "example.com");
        assert_eq!(name_len(&packet, pointer_at).unwrap(), 2);
    }

    fn sample_response_with_one_a_record(ip: [u8; 4]) -> Vec<u8> {
        let mut packet = vec![0u8; 12];
        packet[0] = 0x2c;
        packet[1] = 0x13;
        packet[3] = 0x80; // response bit set, rcode 0
        packet[5] = 1; // qdcount
        packet[7] = 1; // ancount
        packet.extend(encode_name("www.google.com"));
        packet.extend_from_slice(&TYPE_A.to_be_bytes());
        packet.extend_from_slice(&CLASS_IN.to_be_bytes());
        // answer: pointer to offset 12, type A, class IN, ttl, rdlength 4, addr
        packet.push(POINTER_TAG);
        packet.push(12);
        packet.extend_from_slice(&TYPE_A.to_be_bytes());
        packet.extend_from_slice(&CLASS_IN.to_be_bytes());
        packet.extend_from_slice(&300u32.to_be_bytes());
        packet.extend_from_slice(&4u16.to_be_bytes());
        packet.extend_from_slice(&ip);
        packet
    }

    #[test]
    fn parse_response_extracts_transaction_id_and_address() {
        let packet = sample_response_with_one_a_record([93, 184, 216, 34]);
        let (txid, addrs) = parse_response(&packet).unwrap();
        assert_eq!(txid, 0x2c13);
        assert_eq!(addrs, vec!["93.184.216.34".to_string()]);
    }

    #[test]
    fn parse_response_rejects_error_code() {
        let mut packet = sample_response_with_one_a_record([1, 2, 3, 4]);
        packet[3] = 0x83; // rcode 3, NXDOMAIN
        assert!(matches!(
            parse_response(&packet),
            Err(ResolverError::ResponseCode(3))
        ));
    }

    #[test]
    fn parse_response_rejects_short_header() {
        assert!(matches!(
            parse_response(&[0u8; 4]),
            Err(ResolverError::TruncatedHeader)
        ));
    }

    proptest::proptest! {
        #[test]
        fn encode_decode_name_round_trips(
            labels in proptest::collection::vec("[a-z]{1,10}", 1..6)
        ) {
            let name = labels.join(".");
            let mut packet = vec![0u8; 12];
            packet.extend(encode_name(&name));
            let decoded = decode_name(&packet, 12).unwrap();
            proptest::prop_assert_eq!(decoded, name);
        }
    }
}
