//! The binary wire protocol (spec §4.5, §6). Grounded on the teacher's
//! `dbnet/connection.rs` `ProtocolConnectionExt` — reading into a
//! `BytesMut` and returning a distinguished "not enough data yet" signal
//! rather than blocking — but using safe `bytes::Buf` cursor reads
//! throughout instead of the teacher's unsafe pointer-walking
//! `protocol/raw_parser.rs`, since Gibson's frames are fixed-width binary
//! fields rather than newline-terminated text tokens.

use bytes::{Buf, BufMut, BytesMut};

/// One of the twenty opcodes named in spec §4.5. Numeric values are an
/// implementation choice (the spec fixes the *shape*, not the wire
/// numbers) — recorded in DESIGN.md.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum Opcode {
    Set = 1,
    Ttl = 2,
    Get = 3,
    Del = 4,
    Inc = 5,
    Dec = 6,
    Lock = 7,
    Unlock = 8,
    Count = 9,
    Meta = 10,
    Keys = 11,
    MSet = 101,
    MTtl = 102,
    MGet = 103,
    MDel = 104,
    MInc = 105,
    MDec = 106,
    MLock = 107,
    MUnlock = 108,
    MCount = 109,
}

impl Opcode {
    fn from_u16(v: u16) -> Option<Self> {
        Some(match v {
            1 => Self::Set,
            2 => Self::Ttl,
            3 => Self::Get,
            4 => Self::Del,
            5 => Self::Inc,
            6 => Self::Dec,
            7 => Self::Lock,
            8 => Self::Unlock,
            9 => Self::Count,
            10 => Self::Meta,
            11 => Self::Keys,
            101 => Self::MSet,
            102 => Self::MTtl,
            103 => Self::MGet,
            104 => Self::MDel,
            105 => Self::MInc,
            106 => Self::MDec,
            107 => Self::MLock,
            108 => Self::MUnlock,
            109 => Self::MCount,
            _ => return None,
        })
    }
}

/// `META(key, field)`'s field selector (spec §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MetaField {
    Size = 0,
    Encoding = 1,
    Ttl = 2,
    LockRemaining = 3,
    LastAccessAge = 4,
}

impl MetaField {
    fn from_u8(v: u8) -> Option<Self> {
        Some(match v {
            0 => Self::Size,
            1 => Self::Encoding,
            2 => Self::Ttl,
            3 => Self::LockRemaining,
            4 => Self::LastAccessAge,
            _ => return None,
        })
    }
}

/// A fully decoded request, ready for the query processor. One variant per
/// opcode shape rather than per opcode name, since several opcodes
/// (DEL/INC/DEC/UNLOCK/COUNT, and their M-prefixed kin) share an identical
/// "just a key" or "just a prefix" payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Set { key: Vec<u8>, value: Vec<u8>, ttl: u64 },
    Ttl { key: Vec<u8>, seconds: u64 },
    Get { key: Vec<u8> },
    Del { key: Vec<u8> },
    Inc { key: Vec<u8> },
    Dec { key: Vec<u8> },
    Lock { key: Vec<u8>, seconds: u64 },
    Unlock { key: Vec<u8> },
    Count { key: Vec<u8> },
    Meta { key: Vec<u8>, field: MetaField },
    Keys { prefix: Vec<u8> },
    MSet { prefix: Vec<u8>, value: Vec<u8>, ttl: u64 },
    MTtl { prefix: Vec<u8>, seconds: u64 },
    MGet { prefix: Vec<u8> },
    MDel { prefix: Vec<u8> },
    MInc { prefix: Vec<u8> },
    MDec { prefix: Vec<u8> },
    MLock { prefix: Vec<u8>, seconds: u64 },
    MUnlock { prefix: Vec<u8> },
    MCount { prefix: Vec<u8> },
}

/// Why decoding a frame failed outright (as opposed to simply needing more
/// bytes). Every variant here drops the connection per spec §4.5/§7.
#[derive(Debug, PartialEq, Eq)]
pub enum ProtocolError {
    UnknownOpcode(u16),
    UnknownMetaField(u8),
    ArgumentShape,
    KeyTooLarge,
    ValueTooLarge,
    KeyEmpty,
    RequestTooLarge,
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownOpcode(op) => write!(f, "unknown opcode {op}"),
            Self::UnknownMetaField(field) => write!(f, "unknown meta field {field}"),
            Self::ArgumentShape => write!(f, "malformed argument shape"),
            Self::KeyTooLarge => write!(f, "key exceeds max_key_size"),
            Self::ValueTooLarge => write!(f, "value exceeds max_value_size"),
            Self::KeyEmpty => write!(f, "key must be non-empty"),
            Self::RequestTooLarge => write!(f, "request exceeds max_request_size"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Limits enforced while decoding, pulled from the live `Config` (spec
/// §6's table). Checked at the codec layer rather than the query
/// processor per SPEC_FULL.md §11 — a frame that never satisfies these
/// never reaches a handler.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub max_request_size: u32,
    pub max_key_size: u32,
    pub max_value_size: u32,
}

const SIZE_PREFIX_LEN: usize = 4;
const OPCODE_LEN: usize = 2;

/// Attempts to decode one request frame from the front of `buf`.
///
/// Returns `Ok(None)` if `buf` doesn't yet hold a complete frame (the
/// caller should read more and retry — this is the `WAITING_SIZE` /
/// `WAITING_BUFFER` distinction from spec §4.6, collapsed into a single
/// entry point since `BytesMut` lets us just re-attempt the whole parse
/// cheaply). On success, the consumed bytes are advanced out of `buf`.
pub fn decode_request(buf: &mut BytesMut, limits: Limits) -> Result<Option<Request>, ProtocolError> {
    if buf.len() < SIZE_PREFIX_LEN {
        return Ok(None);
    }
    let size = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    if size as usize > limits.max_request_size as usize {
        return Err(ProtocolError::RequestTooLarge);
    }
    let total = SIZE_PREFIX_LEN + size as usize;
    if buf.len() < total {
        return Ok(None);
    }

    buf.advance(SIZE_PREFIX_LEN);
    let mut payload = buf.split_to(size as usize);

    if payload.len() < OPCODE_LEN {
        return Err(ProtocolError::ArgumentShape);
    }
    let opcode_val = payload.get_u16_le();
    let opcode = Opcode::from_u16(opcode_val).ok_or(ProtocolError::UnknownOpcode(opcode_val))?;

    let req = decode_body(opcode, &mut payload, limits)?;
    if payload.has_remaining() {
        return Err(ProtocolError::ArgumentShape);
    }
    Ok(Some(req))
}

fn read_len_prefixed(buf: &mut BytesMut, max: u32, empty_ok: bool) -> Result<Vec<u8>, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::ArgumentShape);
    }
    let len = buf.get_u32_le();
    if !empty_ok && len == 0 {
        return Err(ProtocolError::KeyEmpty);
    }
    if len > max {
        return Err(if empty_ok {
            ProtocolError::ValueTooLarge
        } else {
            ProtocolError::KeyTooLarge
        });
    }
    if buf.remaining() < len as usize {
        return Err(ProtocolError::ArgumentShape);
    }
    let mut out = vec![0u8; len as usize];
    buf.copy_to_slice(&mut out);
    Ok(out)
}

fn read_key(buf: &mut BytesMut, limits: Limits) -> Result<Vec<u8>, ProtocolError> {
    read_len_prefixed(buf, limits.max_key_size, false)
}

fn read_prefix(buf: &mut BytesMut, limits: Limits) -> Result<Vec<u8>, ProtocolError> {
    // a prefix may legitimately be empty (matches every key)
    read_len_prefixed(buf, limits.max_key_size, true)
}

fn read_value(buf: &mut BytesMut, limits: Limits) -> Result<Vec<u8>, ProtocolError> {
    read_len_prefixed(buf, limits.max_value_size, true)
}

fn read_u32(buf: &mut BytesMut) -> Result<u32, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::ArgumentShape);
    }
    Ok(buf.get_u32_le())
}

fn decode_body(opcode: Opcode, buf: &mut BytesMut, limits: Limits) -> Result<Request, ProtocolError> {
    use Opcode::*;
    Ok(match opcode {
        Set => {
            let key = read_key(buf, limits)?;
            let value = read_value(buf, limits)?;
            let ttl = read_u32(buf)? as u64;
            Request::Set { key, value, ttl }
        }
        Ttl => {
            let key = read_key(buf, limits)?;
            let seconds = read_u32(buf)? as u64;
            Request::Ttl { key, seconds }
        }
        Get => Request::Get { key: read_key(buf, limits)? },
        Del => Request::Del { key: read_key(buf, limits)? },
        Inc => Request::Inc { key: read_key(buf, limits)? },
        Dec => Request::Dec { key: read_key(buf, limits)? },
        Lock => {
            let key = read_key(buf, limits)?;
            let seconds = read_u32(buf)? as u64;
            Request::Lock { key, seconds }
        }
        Unlock => Request::Unlock { key: read_key(buf, limits)? },
        Count => Request::Count { key: read_key(buf, limits)? },
        Meta => {
            let key = read_key(buf, limits)?;
            if buf.remaining() < 1 {
                return Err(ProtocolError::ArgumentShape);
            }
            let field_byte = buf.get_u8();
            let field = MetaField::from_u8(field_byte)
                .ok_or(ProtocolError::UnknownMetaField(field_byte))?;
            Request::Meta { key, field }
        }
        Keys => Request::Keys { prefix: read_prefix(buf, limits)? },
        MSet => {
            let prefix = read_prefix(buf, limits)?;
            let value = read_value(buf, limits)?;
            let ttl = read_u32(buf)? as u64;
            Request::MSet { prefix, value, ttl }
        }
        MTtl => {
            let prefix = read_prefix(buf, limits)?;
            let seconds = read_u32(buf)? as u64;
            Request::MTtl { prefix, seconds }
        }
        MGet => Request::MGet { prefix: read_prefix(buf, limits)? },
        MDel => Request::MDel { prefix: read_prefix(buf, limits)? },
        MInc => Request::MInc { prefix: read_prefix(buf, limits)? },
        MDec => Request::MDec { prefix: read_prefix(buf, limits)? },
        MLock => {
            let prefix = read_prefix(buf, limits)?;
            let seconds = read_u32(buf)? as u64;
            Request::MLock { prefix, seconds }
        }
        MUnlock => Request::MUnlock { prefix: read_prefix(buf, limits)? },
        MCount => Request::MCount { prefix: read_prefix(buf, limits)? },
    })
}

/// One reply-code family per spec §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Val { encoding: u8, value: Vec<u8> },
    Kval(Vec<KvalEntry>),
    NotFound,
    Locked,
    Nan,
    Err(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvalEntry {
    pub key: Vec<u8>,
    pub encoding: u8,
    pub value: Vec<u8>,
}

const CODE_OK: u16 = 0;
const CODE_VAL: u16 = 1;
const CODE_KVAL: u16 = 2;
const CODE_NOT_FOUND: u16 = 3;
const CODE_LOCKED: u16 = 4;
const CODE_NAN: u16 = 5;
const CODE_ERR: u16 = 6;

/// Encodes a reply as `u32 size, u16 code, payload` into `out`, appending
/// rather than overwriting — callers reuse one scratch buffer per spec
/// §5's `m_buffer`.
pub fn encode_reply(reply: &Reply, out: &mut BytesMut) {
    let size_pos = out.len();
    out.put_u32_le(0); // patched below
    let body_start = out.len();

    match reply {
        Reply::Ok => {
            out.put_u16_le(CODE_OK);
        }
        Reply::Val { encoding, value } => {
            out.put_u16_le(CODE_VAL);
            out.put_u8(*encoding);
            out.put_u32_le(value.len() as u32);
            out.extend_from_slice(value);
        }
        Reply::Kval(entries) => {
            out.put_u16_le(CODE_KVAL);
            out.put_u32_le(entries.len() as u32);
            for entry in entries {
                out.put_u32_le(entry.key.len() as u32);
                out.extend_from_slice(&entry.key);
                out.put_u8(entry.encoding);
                out.put_u32_le(entry.value.len() as u32);
                out.extend_from_slice(&entry.value);
            }
        }
        Reply::NotFound => {
            out.put_u16_le(CODE_NOT_FOUND);
        }
        Reply::Locked => {
            out.put_u16_le(CODE_LOCKED);
        }
        Reply::Nan => {
            out.put_u16_le(CODE_NAN);
        }
        Reply::Err(msg) => {
            out.put_u16_le(CODE_ERR);
            match msg {
                Some(m) => {
                    out.put_u32_le(m.len() as u32);
                    out.extend_from_slice(m.as_bytes());
                }
                None => {}
            }
        }
    }

    let body_len = (out.len() - body_start) as u32;
    out[size_pos..size_pos + 4].copy_from_slice(&body_len.to_le_bytes());
}
