//! DNS message codec.
//!
//! Exactly the subset the resolver needs: encode questions and
//! responses, decode replies from glue nameservers. Encoding never
//! compresses; decoding follows compression pointers, and name-bearing
//! rdata (NS, CNAME) is decompressed on decode so a re-encoded message
//! never carries a dangling pointer.

use crate::domain::ResolveError;

/// Question/record types.
pub mod qtype {
    /// IPv4 address.
    pub const A: u16 = 1;
    /// Nameserver.
    pub const NS: u16 = 2;
    /// Canonical name.
    pub const CNAME: u16 = 5;
    /// IPv6 address.
    pub const AAAA: u16 = 28;
    /// TLS association.
    pub const TLSA: u16 = 52;
}

/// Question/record classes.
pub mod qclass {
    /// Internet.
    pub const IN: u16 = 1;
}

/// Response codes.
pub mod rcode {
    /// No error.
    pub const NOERROR: u8 = 0;
    /// Server failure.
    pub const SERVFAIL: u8 = 2;
    /// Name does not exist.
    pub const NXDOMAIN: u8 = 3;
}

const FLAG_QR: u16 = 0x8000;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;

const MAX_NAME_LEN: usize = 255;
const MAX_POINTER_JUMPS: usize = 32;

/// A DNS question.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Question {
    /// Queried name, dot-separated, no trailing dot.
    pub name: String,
    /// Record type wanted.
    pub qtype: u16,
    /// Class, practically always IN.
    pub qclass: u16,
}

/// A resource record in a DNS message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DnsRecord {
    /// Owner name.
    pub name: String,
    /// Record type.
    pub rtype: u16,
    /// Class.
    pub class: u16,
    /// Time to live, seconds.
    pub ttl: u32,
    /// Record data, decompressed where it carries names.
    pub rdata: Vec<u8>,
}

/// A DNS message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DnsMessage {
    /// Transaction id.
    pub id: u16,
    /// Header flags.
    pub flags: u16,
    /// Questions.
    pub questions: Vec<Question>,
    /// Answer records.
    pub answers: Vec<DnsRecord>,
    /// Authority records.
    pub authority: Vec<DnsRecord>,
    /// Additional records.
    pub additional: Vec<DnsRecord>,
}

impl DnsMessage {
    /// A recursive query for one question.
    pub fn query(id: u16, name: &str, qtype_: u16) -> Self {
        Self {
            id,
            flags: FLAG_RD,
            questions: vec![Question {
                name: name.to_string(),
                qtype: qtype_,
                qclass: qclass::IN,
            }],
            ..Self::default()
        }
    }

    /// A response skeleton echoing `question`, with the given rcode.
    pub fn response(id: u16, question: Question, code: u8) -> Self {
        Self {
            id,
            flags: FLAG_QR | FLAG_RD | FLAG_RA | code as u16,
            questions: vec![question],
            ..Self::default()
        }
    }

    /// The response code.
    pub fn rcode(&self) -> u8 {
        (self.flags & 0x000f) as u8
    }

    /// Whether this is a response (QR set).
    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }

    /// Smallest TTL across answers, if any.
    pub fn min_answer_ttl(&self) -> Option<u32> {
        self.answers.iter().map(|r| r.ttl).min()
    }

    /// Encode to wire bytes, uncompressed.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(64);
        out.extend_from_slice(&self.id.to_be_bytes());
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        out.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
        out.extend_from_slice(&(self.authority.len() as u16).to_be_bytes());
        out.extend_from_slice(&(self.additional.len() as u16).to_be_bytes());

        for q in &self.questions {
            encode_name(&q.name, &mut out);
            out.extend_from_slice(&q.qtype.to_be_bytes());
            out.extend_from_slice(&q.qclass.to_be_bytes());
        }
        for record in self
            .answers
            .iter()
            .chain(&self.authority)
            .chain(&self.additional)
        {
            encode_name(&record.name, &mut out);
            out.extend_from_slice(&record.rtype.to_be_bytes());
            out.extend_from_slice(&record.class.to_be_bytes());
            out.extend_from_slice(&record.ttl.to_be_bytes());
            out.extend_from_slice(&(record.rdata.len() as u16).to_be_bytes());
            out.extend_from_slice(&record.rdata);
        }
        out
    }

    /// Decode from wire bytes.
    pub fn decode(buf: &[u8]) -> Result<Self, ResolveError> {
        if buf.len() < 12 {
            return Err(format_err("message shorter than header"));
        }
        let id = u16::from_be_bytes([buf[0], buf[1]]);
        let flags = u16::from_be_bytes([buf[2], buf[3]]);
        let qdcount = u16::from_be_bytes([buf[4], buf[5]]) as usize;
        let ancount = u16::from_be_bytes([buf[6], buf[7]]) as usize;
        let nscount = u16::from_be_bytes([buf[8], buf[9]]) as usize;
        let arcount = u16::from_be_bytes([buf[10], buf[11]]) as usize;

        let mut offset = 12;
        let mut questions = Vec::with_capacity(qdcount);
        for _ in 0..qdcount {
            let name = decode_name(buf, &mut offset)?;
            let qtype_ = read_u16(buf, &mut offset)?;
            let qclass_ = read_u16(buf, &mut offset)?;
            questions.push(Question {
                name,
                qtype: qtype_,
                qclass: qclass_,
            });
        }

        let mut sections = [
            Vec::with_capacity(ancount),
            Vec::with_capacity(nscount),
            Vec::with_capacity(arcount),
        ];
        for (section, count) in sections.iter_mut().zip([ancount, nscount, arcount]) {
            for _ in 0..count {
                section.push(decode_record(buf, &mut offset)?);
            }
        }
        let [answers, authority, additional] = sections;

        Ok(Self {
            id,
            flags,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

/// Encode a dotted name as labels. Empty string is the root.
pub fn encode_name(name: &str, out: &mut Vec<u8>) {
    for label in name.split('.').filter(|l| !l.is_empty()) {
        let bytes = label.as_bytes();
        let len = bytes.len().min(63);
        out.push(len as u8);
        out.extend_from_slice(&bytes[..len]);
    }
    out.push(0);
}

/// A name as rdata (for NS/CNAME records we synthesize).
pub fn name_rdata(name: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(name.len() + 2);
    encode_name(name, &mut out);
    out
}

/// Decode a possibly-compressed name starting at `*offset`; advances the
/// offset past the name as stored (pointers count as two bytes).
pub fn decode_name(buf: &[u8], offset: &mut usize) -> Result<String, ResolveError> {
    let mut labels: Vec<String> = Vec::new();
    let mut cursor = *offset;
    let mut jumped = false;
    let mut jumps = 0;
    let mut total_len = 0usize;

    loop {
        let len_byte = *buf.get(cursor).ok_or_else(|| format_err("name truncated"))?;
        if len_byte & 0xc0 == 0xc0 {
            let second = *buf
                .get(cursor + 1)
                .ok_or_else(|| format_err("pointer truncated"))?;
            let target = (((len_byte & 0x3f) as usize) << 8) | second as usize;
            if !jumped {
                *offset = cursor + 2;
                jumped = true;
            }
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return Err(format_err("compression pointer loop"));
            }
            if target >= cursor {
                return Err(format_err("forward compression pointer"));
            }
            cursor = target;
            continue;
        }
        if len_byte == 0 {
            if !jumped {
                *offset = cursor + 1;
            }
            break;
        }
        let len = len_byte as usize;
        let label = buf
            .get(cursor + 1..cursor + 1 + len)
            .ok_or_else(|| format_err("label truncated"))?;
        total_len += len + 1;
        if total_len > MAX_NAME_LEN {
            return Err(format_err("name exceeds 255 bytes"));
        }
        labels.push(String::from_utf8_lossy(label).into_owned());
        cursor += 1 + len;
    }

    Ok(labels.join("."))
}

fn decode_record(buf: &[u8], offset: &mut usize) -> Result<DnsRecord, ResolveError> {
    let name = decode_name(buf, offset)?;
    let rtype = read_u16(buf, offset)?;
    let class = read_u16(buf, offset)?;
    let ttl = read_u32(buf, offset)?;
    let rdlen = read_u16(buf, offset)? as usize;
    let rdata_start = *offset;
    let rdata_raw = buf
        .get(rdata_start..rdata_start + rdlen)
        .ok_or_else(|| format_err("rdata truncated"))?;
    *offset = rdata_start + rdlen;

    // NS and CNAME rdata is a name and may be compressed against the
    // whole message; store it decompressed.
    let rdata = if rtype == qtype::NS || rtype == qtype::CNAME {
        let mut inner = rdata_start;
        let target = decode_name(buf, &mut inner)?;
        name_rdata(&target)
    } else {
        rdata_raw.to_vec()
    };

    Ok(DnsRecord {
        name,
        rtype,
        class,
        ttl,
        rdata,
    })
}

fn read_u16(buf: &[u8], offset: &mut usize) -> Result<u16, ResolveError> {
    let bytes = buf
        .get(*offset..*offset + 2)
        .ok_or_else(|| format_err("message truncated"))?;
    *offset += 2;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32(buf: &[u8], offset: &mut usize) -> Result<u32, ResolveError> {
    let bytes = buf
        .get(*offset..*offset + 4)
        .ok_or_else(|| format_err("message truncated"))?;
    *offset += 4;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn format_err(reason: &str) -> ResolveError {
    ResolveError::Format {
        reason: reason.to_string(),
    }
}
