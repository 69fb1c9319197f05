// BER framing for SNMPv2c messages: GET, GETNEXT, GETBULK and their RESPONSE.
// Only the universal and application types an OLT agent returns are handled.

use super::oid::Oid;
use crate::error::PollError;
use bytes::{BufMut, BytesMut};
use std::net::Ipv4Addr;

pub const VERSION_2C: i64 = 1;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_IP_ADDRESS: u8 = 0x40;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIMETICKS: u8 = 0x43;
const TAG_OPAQUE: u8 = 0x44;
const TAG_COUNTER64: u8 = 0x46;
const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    Get,
    GetNext,
    Response,
    GetBulk,
}

impl PduType {
    fn tag(self) -> u8 {
        match self {
            PduType::Get => 0xA0,
            PduType::GetNext => 0xA1,
            PduType::Response => 0xA2,
            PduType::GetBulk => 0xA5,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(PduType::Get),
            0xA1 => Some(PduType::GetNext),
            0xA2 => Some(PduType::Response),
            0xA5 => Some(PduType::GetBulk),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    ObjectId(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Vec<u8>),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpValue {
    /// noSuchObject / noSuchInstance / endOfMibView.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            SnmpValue::NoSuchObject | SnmpValue::NoSuchInstance | SnmpValue::EndOfMibView
        )
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SnmpValue::Integer(v) => Some(*v),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                Some(i64::from(*v))
            }
            SnmpValue::Counter64(v) => i64::try_from(*v).ok(),
            SnmpValue::OctetString(b) => String::from_utf8_lossy(b).trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            SnmpValue::OctetString(b) | SnmpValue::Opaque(b) => {
                String::from_utf8_lossy(b).into_owned()
            }
            SnmpValue::Integer(v) => v.to_string(),
            SnmpValue::Counter32(v) | SnmpValue::Gauge32(v) | SnmpValue::TimeTicks(v) => {
                v.to_string()
            }
            SnmpValue::Counter64(v) => v.to_string(),
            SnmpValue::ObjectId(o) => o.to_string(),
            SnmpValue::IpAddress(a) => Ipv4Addr::from(*a).to_string(),
            SnmpValue::Null
            | SnmpValue::NoSuchObject
            | SnmpValue::NoSuchInstance
            | SnmpValue::EndOfMibView => String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarBind {
    pub name: Oid,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn null(name: Oid) -> Self {
        Self {
            name,
            value: SnmpValue::Null,
        }
    }
}

/// One SNMPv2c message. `field1`/`field2` are error-status/error-index, or
/// non-repeaters/max-repetitions for GETBULK.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub community: Vec<u8>,
    pub pdu_type: PduType,
    pub request_id: i32,
    pub field1: i64,
    pub field2: i64,
    pub varbinds: Vec<VarBind>,
}

impl Message {
    pub fn error_status(&self) -> i64 {
        self.field1
    }

    pub fn error_index(&self) -> i64 {
        self.field2
    }
}

pub fn encode(msg: &Message) -> BytesMut {
    let mut list = BytesMut::new();
    for vb in &msg.varbinds {
        let mut inner = BytesMut::new();
        write_oid(&mut inner, &vb.name);
        write_value(&mut inner, &vb.value);
        write_tlv(&mut list, TAG_SEQUENCE, &inner);
    }

    let mut pdu = BytesMut::new();
    write_integer(&mut pdu, i64::from(msg.request_id));
    write_integer(&mut pdu, msg.field1);
    write_integer(&mut pdu, msg.field2);
    write_tlv(&mut pdu, TAG_SEQUENCE, &list);

    let mut body = BytesMut::new();
    write_integer(&mut body, VERSION_2C);
    write_tlv(&mut body, TAG_OCTET_STRING, &msg.community);
    write_tlv(&mut body, msg.pdu_type.tag(), &pdu);

    let mut out = BytesMut::with_capacity(body.len() + 6);
    write_tlv(&mut out, TAG_SEQUENCE, &body);
    out
}

pub fn decode(buf: &[u8]) -> Result<Message, PollError> {
    let mut top = Reader::new(buf);
    let mut body = Reader::new(top.expect(TAG_SEQUENCE, "message")?);
    let version = decode_integer(body.expect(TAG_INTEGER, "version")?)?;
    if version != VERSION_2C {
        return Err(PollError::parse(format!("unsupported snmp version {version}")));
    }
    let community = body.expect(TAG_OCTET_STRING, "community")?.to_vec();

    let (tag, pdu) = body.read_tlv()?;
    let pdu_type = PduType::from_tag(tag)
        .ok_or_else(|| PollError::parse(format!("unexpected pdu tag 0x{tag:02x}")))?;
    let mut pdu = Reader::new(pdu);
    let request_id = decode_integer(pdu.expect(TAG_INTEGER, "request-id")?)?;
    let field1 = decode_integer(pdu.expect(TAG_INTEGER, "error-status")?)?;
    let field2 = decode_integer(pdu.expect(TAG_INTEGER, "error-index")?)?;

    let mut list = Reader::new(pdu.expect(TAG_SEQUENCE, "varbind list")?);
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut vb = Reader::new(list.expect(TAG_SEQUENCE, "varbind")?);
        let name = decode_oid(vb.expect(TAG_OID, "varbind name")?)?;
        let (tag, content) = vb.read_tlv()?;
        varbinds.push(VarBind {
            name,
            value: decode_value(tag, content)?,
        });
    }

    Ok(Message {
        community,
        pdu_type,
        request_id: request_id as i32,
        field1,
        field2,
        varbinds,
    })
}

fn write_tlv(out: &mut BytesMut, tag: u8, content: &[u8]) {
    out.put_u8(tag);
    write_length(out, content.len());
    out.put_slice(content);
}

fn write_length(out: &mut BytesMut, len: usize) {
    if len < 0x80 {
        out.put_u8(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    out.put_u8(0x80 | (bytes.len() - skip) as u8);
    out.put_slice(&bytes[skip..]);
}

fn minimal_signed(v: i64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let (b, next) = (bytes[start], bytes[start + 1]);
        let redundant = (b == 0x00 && next & 0x80 == 0) || (b == 0xFF && next & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn minimal_unsigned(v: u64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    let mut out = bytes[skip..].to_vec();
    if out[0] & 0x80 != 0 {
        out.insert(0, 0);
    }
    out
}

fn write_integer(out: &mut BytesMut, v: i64) {
    write_tlv(out, TAG_INTEGER, &minimal_signed(v));
}

fn write_oid(out: &mut BytesMut, oid: &Oid) {
    let arcs = oid.arcs();
    let mut content = Vec::with_capacity(arcs.len() + 2);
    let first = arcs.first().copied().unwrap_or(0);
    let second = arcs.get(1).copied().unwrap_or(0);
    push_base128(&mut content, first * 40 + second);
    for arc in arcs.iter().skip(2) {
        push_base128(&mut content, *arc);
    }
    write_tlv(out, TAG_OID, &content);
}

fn push_base128(out: &mut Vec<u8>, mut v: u32) {
    let mut tmp = [0u8; 5];
    let mut i = tmp.len();
    loop {
        i -= 1;
        tmp[i] = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    let last = tmp.len() - 1;
    for (j, byte) in tmp.iter().enumerate().skip(i) {
        out.push(if j == last { *byte } else { *byte | 0x80 });
    }
}

fn write_value(out: &mut BytesMut, value: &SnmpValue) {
    match value {
        SnmpValue::Integer(v) => write_integer(out, *v),
        SnmpValue::OctetString(b) => write_tlv(out, TAG_OCTET_STRING, b),
        SnmpValue::Null => write_tlv(out, TAG_NULL, &[]),
        SnmpValue::ObjectId(o) => write_oid(out, o),
        SnmpValue::IpAddress(a) => write_tlv(out, TAG_IP_ADDRESS, a),
        SnmpValue::Counter32(v) => {
            write_tlv(out, TAG_COUNTER32, &minimal_unsigned(u64::from(*v)))
        }
        SnmpValue::Gauge32(v) => write_tlv(out, TAG_GAUGE32, &minimal_unsigned(u64::from(*v))),
        SnmpValue::TimeTicks(v) => {
            write_tlv(out, TAG_TIMETICKS, &minimal_unsigned(u64::from(*v)))
        }
        SnmpValue::Opaque(b) => write_tlv(out, TAG_OPAQUE, b),
        SnmpValue::Counter64(v) => write_tlv(out, TAG_COUNTER64, &minimal_unsigned(*v)),
        SnmpValue::NoSuchObject => write_tlv(out, TAG_NO_SUCH_OBJECT, &[]),
        SnmpValue::NoSuchInstance => write_tlv(out, TAG_NO_SUCH_INSTANCE, &[]),
        SnmpValue::EndOfMibView => write_tlv(out, TAG_END_OF_MIB_VIEW, &[]),
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), PollError> {
        let truncated = || PollError::parse("truncated snmp message");
        let (&tag, rest) = self.buf.split_first().ok_or_else(truncated)?;
        let (&first, mut rest) = rest.split_first().ok_or_else(truncated)?;
        let len = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let n = usize::from(first & 0x7F);
            if n == 0 || n > 4 || rest.len() < n {
                return Err(PollError::parse("invalid ber length"));
            }
            let len = rest[..n]
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
            rest = &rest[n..];
            len
        };
        if rest.len() < len {
            return Err(truncated());
        }
        let (content, tail) = rest.split_at(len);
        self.buf = tail;
        Ok((tag, content))
    }

    fn expect(&mut self, tag: u8, what: &str) -> Result<&'a [u8], PollError> {
        let (found, content) = self.read_tlv()?;
        if found != tag {
            return Err(PollError::parse(format!(
                "expected {what} (0x{tag:02x}), found 0x{found:02x}"
            )));
        }
        Ok(content)
    }
}

fn decode_integer(content: &[u8]) -> Result<i64, PollError> {
    if content.is_empty() || content.len() > 8 {
        return Err(PollError::parse(format!(
            "integer of {} bytes",
            content.len()
        )));
    }
    let init: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    Ok(content
        .iter()
        .fold(init, |acc, b| (acc << 8) | i64::from(*b)))
}

fn decode_unsigned(content: &[u8]) -> Result<u64, PollError> {
    let skip = content.iter().take_while(|b| **b == 0).count();
    let significant = &content[skip..];
    if significant.len() > 8 {
        return Err(PollError::parse("unsigned value overflows 64 bits"));
    }
    Ok(significant
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn decode_u32(content: &[u8]) -> Result<u32, PollError> {
    u32::try_from(decode_unsigned(content)?)
        .map_err(|_| PollError::parse("32-bit value out of range"))
}

fn decode_oid(content: &[u8]) -> Result<Oid, PollError> {
    let mut values = Vec::with_capacity(content.len() + 1);
    let mut acc: u32 = 0;
    for b in content {
        acc = acc
            .checked_mul(128)
            .ok_or_else(|| PollError::parse("oid arc overflow"))?
            | u32::from(b & 0x7F);
        if b & 0x80 == 0 {
            values.push(acc);
            acc = 0;
        }
    }
    let Some((&head, tail)) = values.split_first() else {
        return Err(PollError::parse("empty oid"));
    };
    let (first, second) = match head {
        0..=39 => (0, head),
        40..=79 => (1, head - 40),
        _ => (2, head - 80),
    };
    let mut arcs = Vec::with_capacity(values.len() + 1);
    arcs.push(first);
    arcs.push(second);
    arcs.extend_from_slice(tail);
    Ok(Oid::from_arcs(arcs))
}

fn decode_value(tag: u8, content: &[u8]) -> Result<SnmpValue, PollError> {
    Ok(match tag {
        TAG_INTEGER => SnmpValue::Integer(decode_integer(content)?),
        TAG_OCTET_STRING => SnmpValue::OctetString(content.to_vec()),
        TAG_NULL => SnmpValue::Null,
        TAG_OID => SnmpValue::ObjectId(decode_oid(content)?),
        TAG_IP_ADDRESS => {
            let octets: [u8; 4] = content
                .try_into()
                .map_err(|_| PollError::parse("ip address must be 4 bytes"))?;
            SnmpValue::IpAddress(octets)
        }
        TAG_COUNTER32 => SnmpValue::Counter32(decode_u32(content)?),
        TAG_GAUGE32 => SnmpValue::Gauge32(decode_u32(content)?),
        TAG_TIMETICKS => SnmpValue::TimeTicks(decode_u32(content)?),
        TAG_OPAQUE => SnmpValue::Opaque(content.to_vec()),
        TAG_COUNTER64 => SnmpValue::Counter64(decode_unsigned(content)?),
        TAG_NO_SUCH_OBJECT => SnmpValue::NoSuchObject,
        TAG_NO_SUCH_INSTANCE => SnmpValue::NoSuchInstance,
        TAG_END_OF_MIB_VIEW => SnmpValue::EndOfMibView,
        other => {
            return Err(PollError::parse(format!(
                "unsupported value tag 0x{other:02x}"
            )));
        }
    })
}
