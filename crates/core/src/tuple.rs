//! Order-preserving tuple encoding
//!
//! Typed key components are packed into byte strings whose lexicographic
//! order matches the natural order of the values, element by element. Every
//! element starts with a one-byte type code, so elements of different types
//! order by type code and `Null` (code `0x00`) sorts before everything else.
//!
//! ## Element layout
//!
//! ```text
//! Null    0x00
//! Bytes   0x01 <payload, 0x00 escaped as 0x00 0xFF> 0x00
//! String  0x02 <utf-8 payload, escaped the same way> 0x00
//! Int     0x15 <8 bytes big-endian, sign bit flipped>
//! Uint    0x16 <8 bytes big-endian>
//! Double  0x21 <8 bytes big-endian, IEEE bits transformed for total order>
//! False   0x26
//! True    0x27
//! ```
//!
//! Variable-length payloads are escaped and terminated, which makes every
//! encoded element prefix-free: concatenating elements never produces an
//! ambiguous boundary, so a packed tuple is just the concatenation of its
//! packed elements.

use crate::error::CodecError;
use byteorder::{BigEndian, ByteOrder};
use std::cmp::Ordering;
use std::fmt;

const NULL_CODE: u8 = 0x00;
const BYTES_CODE: u8 = 0x01;
const STRING_CODE: u8 = 0x02;
const INT_CODE: u8 = 0x15;
const UINT_CODE: u8 = 0x16;
const DOUBLE_CODE: u8 = 0x21;
const FALSE_CODE: u8 = 0x26;
const TRUE_CODE: u8 = 0x27;

const ESCAPE: u8 = 0xFF;
const SIGN_BIT: u64 = 1 << 63;

/// One typed component of a tuple
#[derive(Debug, Clone)]
pub enum TupleElement {
    /// Absent value; sorts first
    Null,
    /// Raw bytes
    Bytes(Vec<u8>),
    /// UTF-8 string
    String(String),
    /// Signed 64-bit integer
    Int(i64),
    /// Unsigned 64-bit integer
    Uint(u64),
    /// 64-bit float, totally ordered (-NaN < -inf < ... < -0.0 < 0.0 < ... < inf < NaN)
    Double(f64),
    /// Boolean (false < true)
    Bool(bool),
}

impl TupleElement {
    /// Append the ordered encoding of this element to `out`
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            TupleElement::Null => out.push(NULL_CODE),
            TupleElement::Bytes(b) => {
                out.push(BYTES_CODE);
                push_escaped(out, b);
            }
            TupleElement::String(s) => {
                out.push(STRING_CODE);
                push_escaped(out, s.as_bytes());
            }
            TupleElement::Int(v) => {
                out.push(INT_CODE);
                push_u64(out, (*v as u64) ^ SIGN_BIT);
            }
            TupleElement::Uint(v) => {
                out.push(UINT_CODE);
                push_u64(out, *v);
            }
            TupleElement::Double(v) => {
                out.push(DOUBLE_CODE);
                push_u64(out, encode_double_bits(*v));
            }
            TupleElement::Bool(false) => out.push(FALSE_CODE),
            TupleElement::Bool(true) => out.push(TRUE_CODE),
        }
    }

    /// Ordered encoding of this element alone
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_into(&mut out);
        out
    }

    /// Decode one element starting at `offset`, returning it and the next offset
    pub fn decode_at(bytes: &[u8], offset: usize) -> Result<(TupleElement, usize), CodecError> {
        let code = *bytes
            .get(offset)
            .ok_or(CodecError::Truncated { offset, needed: 1 })?;
        let body = offset + 1;

        match code {
            NULL_CODE => Ok((TupleElement::Null, body)),
            BYTES_CODE => {
                let (payload, next) = read_escaped(bytes, body, offset)?;
                Ok((TupleElement::Bytes(payload), next))
            }
            STRING_CODE => {
                let (payload, next) = read_escaped(bytes, body, offset)?;
                let s = String::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8 { offset })?;
                Ok((TupleElement::String(s), next))
            }
            INT_CODE => {
                let raw = read_u64(bytes, body)?;
                Ok((TupleElement::Int((raw ^ SIGN_BIT) as i64), body + 8))
            }
            UINT_CODE => {
                let raw = read_u64(bytes, body)?;
                Ok((TupleElement::Uint(raw), body + 8))
            }
            DOUBLE_CODE => {
                let raw = read_u64(bytes, body)?;
                Ok((TupleElement::Double(decode_double_bits(raw)), body + 8))
            }
            FALSE_CODE => Ok((TupleElement::Bool(false), body)),
            TRUE_CODE => Ok((TupleElement::Bool(true), body)),
            other => Err(CodecError::UnknownTypeCode {
                code: other,
                offset,
            }),
        }
    }

    /// True for [`TupleElement::Null`]
    pub fn is_null(&self) -> bool {
        matches!(self, TupleElement::Null)
    }
}

// Equality and ordering are defined by the encoding, which keeps them
// consistent with key order (and total for doubles).
impl PartialEq for TupleElement {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TupleElement {}

impl PartialOrd for TupleElement {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TupleElement {
    fn cmp(&self, other: &Self) -> Ordering {
        self.encode().cmp(&other.encode())
    }
}

impl std::hash::Hash for TupleElement {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.encode().hash(state);
    }
}

impl fmt::Display for TupleElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TupleElement::Null => write!(f, "null"),
            TupleElement::Bytes(b) => {
                write!(f, "b\"")?;
                for byte in b {
                    write!(f, "\\x{:02x}", byte)?;
                }
                write!(f, "\"")
            }
            TupleElement::String(s) => write!(f, "{:?}", s),
            TupleElement::Int(v) => write!(f, "{}", v),
            TupleElement::Uint(v) => write!(f, "{}u", v),
            TupleElement::Double(v) => write!(f, "{:?}", v),
            TupleElement::Bool(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for TupleElement {
    fn from(v: i64) -> Self {
        TupleElement::Int(v)
    }
}

impl From<i32> for TupleElement {
    fn from(v: i32) -> Self {
        TupleElement::Int(v as i64)
    }
}

impl From<u64> for TupleElement {
    fn from(v: u64) -> Self {
        TupleElement::Uint(v)
    }
}

impl From<f64> for TupleElement {
    fn from(v: f64) -> Self {
        TupleElement::Double(v)
    }
}

impl From<bool> for TupleElement {
    fn from(v: bool) -> Self {
        TupleElement::Bool(v)
    }
}

impl From<&str> for TupleElement {
    fn from(v: &str) -> Self {
        TupleElement::String(v.to_string())
    }
}

impl From<String> for TupleElement {
    fn from(v: String) -> Self {
        TupleElement::String(v)
    }
}

impl From<Vec<u8>> for TupleElement {
    fn from(v: Vec<u8>) -> Self {
        TupleElement::Bytes(v)
    }
}

// ============================================================================
// Tuple
// ============================================================================

/// An ordered sequence of typed elements with an order-preserving encoding
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tuple {
    elements: Vec<TupleElement>,
}

impl Tuple {
    /// Empty tuple
    pub fn new() -> Self {
        Self::default()
    }

    /// Tuple from existing elements
    pub fn from_elements(elements: Vec<TupleElement>) -> Self {
        Self { elements }
    }

    /// Append an element, builder style
    pub fn with(mut self, element: impl Into<TupleElement>) -> Self {
        self.elements.push(element.into());
        self
    }

    /// Append an element
    pub fn push(&mut self, element: impl Into<TupleElement>) {
        self.elements.push(element.into());
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True if the tuple has no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element at `index`
    pub fn get(&self, index: usize) -> Option<&TupleElement> {
        self.elements.get(index)
    }

    /// All elements
    pub fn elements(&self) -> &[TupleElement] {
        &self.elements
    }

    /// Consume into elements
    pub fn into_elements(self) -> Vec<TupleElement> {
        self.elements
    }

    /// Iterate over elements
    pub fn iter(&self) -> std::slice::Iter<'_, TupleElement> {
        self.elements.iter()
    }

    /// True if any element is null
    pub fn has_null(&self) -> bool {
        self.elements.iter().any(TupleElement::is_null)
    }

    /// New tuple with `other`'s elements appended
    pub fn concat(&self, other: &Tuple) -> Tuple {
        let mut elements = Vec::with_capacity(self.len() + other.len());
        elements.extend_from_slice(&self.elements);
        elements.extend_from_slice(&other.elements);
        Tuple { elements }
    }

    /// Split into the first `at` elements and the rest
    ///
    /// # Errors
    /// `CodecError::Shape` if `at` exceeds the length.
    pub fn split_at(&self, at: usize) -> Result<(Tuple, Tuple), CodecError> {
        if at > self.len() {
            return Err(CodecError::Shape(format!(
                "cannot split {} element tuple at {}",
                self.len(),
                at
            )));
        }
        let (head, tail) = self.elements.split_at(at);
        Ok((Tuple::from_elements(head.to_vec()), Tuple::from_elements(tail.to_vec())))
    }

    /// Append the packed form to `out`
    pub fn pack_into(&self, out: &mut Vec<u8>) {
        for element in &self.elements {
            element.encode_into(out);
        }
    }

    /// Packed, order-preserving byte form
    pub fn pack(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.pack_into(&mut out);
        out
    }

    /// Decode a packed tuple; the whole input must be consumed
    pub fn unpack(bytes: &[u8]) -> Result<Tuple, CodecError> {
        let mut elements = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let (element, next) = TupleElement::decode_at(bytes, offset)?;
            elements.push(element);
            offset = next;
        }
        Ok(Tuple { elements })
    }

    /// Key range `[begin, end)` covering every tuple that extends this one
    /// by at least one element (the tuple itself is excluded)
    pub fn range(&self) -> (Vec<u8>, Vec<u8>) {
        let packed = self.pack();
        let mut begin = packed.clone();
        begin.push(0x00);
        let mut end = packed;
        end.push(0xFF);
        (begin, end)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, element) in self.elements.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", element)?;
        }
        write!(f, ")")
    }
}

impl FromIterator<TupleElement> for Tuple {
    fn from_iter<I: IntoIterator<Item = TupleElement>>(iter: I) -> Self {
        Tuple {
            elements: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<TupleElement>> for Tuple {
    fn from(elements: Vec<TupleElement>) -> Self {
        Tuple { elements }
    }
}

impl<'a> IntoIterator for &'a Tuple {
    type Item = &'a TupleElement;
    type IntoIter = std::slice::Iter<'a, TupleElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

/// First key that sorts after every key starting with `prefix`
///
/// Trailing `0xFF` bytes are dropped and the last remaining byte incremented.
///
/// # Errors
/// `CodecError::Shape` if `prefix` is empty or all `0xFF`.
pub fn strinc(prefix: &[u8]) -> Result<Vec<u8>, CodecError> {
    let keep = prefix
        .iter()
        .rposition(|&b| b != 0xFF)
        .ok_or_else(|| CodecError::Shape("key has no successor prefix".to_string()))?;
    let mut out = prefix[..=keep].to_vec();
    out[keep] += 1;
    Ok(out)
}

// ============================================================================
// Primitive helpers
// ============================================================================

fn push_escaped(out: &mut Vec<u8>, payload: &[u8]) {
    for &byte in payload {
        out.push(byte);
        if byte == 0x00 {
            out.push(ESCAPE);
        }
    }
    out.push(0x00);
}

fn read_escaped(bytes: &[u8], mut pos: usize, offset: usize) -> Result<(Vec<u8>, usize), CodecError> {
    let mut payload = Vec::new();
    loop {
        let byte = *bytes
            .get(pos)
            .ok_or(CodecError::BadEscape { offset })?;
        if byte == 0x00 {
            if bytes.get(pos + 1) == Some(&ESCAPE) {
                payload.push(0x00);
                pos += 2;
                continue;
            }
            return Ok((payload, pos + 1));
        }
        payload.push(byte);
        pos += 1;
    }
}

fn push_u64(out: &mut Vec<u8>, v: u64) {
    let mut buf = [0u8; 8];
    BigEndian::write_u64(&mut buf, v);
    out.extend_from_slice(&buf);
}

fn read_u64(bytes: &[u8], offset: usize) -> Result<u64, CodecError> {
    let available = bytes.len().saturating_sub(offset);
    if available < 8 {
        return Err(CodecError::Truncated {
            offset,
            needed: 8 - available,
        });
    }
    Ok(BigEndian::read_u64(&bytes[offset..offset + 8]))
}

// Negative doubles have every bit inverted; non-negative ones only the sign bit.
fn encode_double_bits(v: f64) -> u64 {
    let bits = v.to_bits();
    if bits & SIGN_BIT != 0 {
        !bits
    } else {
        bits ^ SIGN_BIT
    }
}

fn decode_double_bits(raw: u64) -> f64 {
    let bits = if raw & SIGN_BIT != 0 {
        raw ^ SIGN_BIT
    } else {
        !raw
    };
    f64::from_bits(bits)
}
