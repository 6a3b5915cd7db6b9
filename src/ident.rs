use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

///////////////////////////////////////////// EntityKind ///////////////////////////////////////////

/// The four resource kinds managed by the API.
///
/// The kind is embedded in every external identifier so that a reference to
/// the wrong kind of entity is detectable before any lookup happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    /// A registered user; owns shops.
    User,
    /// A shop; belongs to a user and owns items.
    Shop,
    /// A category; owns items.
    Category,
    /// An item for sale; belongs to a shop and a category.
    Item,
}

impl EntityKind {
    /// Returns the lowercase wire name of the kind, used as the identifier prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Shop => "shop",
            EntityKind::Category => "category",
            EntityKind::Item => "item",
        }
    }

    fn from_prefix(s: &str) -> Option<EntityKind> {
        match s {
            "user" => Some(EntityKind::User),
            "shop" => Some(EntityKind::Shop),
            "category" => Some(EntityKind::Category),
            "item" => Some(EntityKind::Item),
            _ => None,
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

////////////////////////////////////// URL-Safe Base64 Encoding ////////////////////////////////////

const BASE64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

// 8 bytes encode to 11 characters without padding.
const ENCODED_KEY_LEN: usize = 11;

fn encode_key(key: u64) -> String {
    let bytes = key.to_be_bytes();
    let mut out = String::with_capacity(ENCODED_KEY_LEN);

    for chunk in bytes.chunks(3) {
        let b1 = chunk[0] as u32;
        let b2 = *chunk.get(1).unwrap_or(&0) as u32;
        let b3 = *chunk.get(2).unwrap_or(&0) as u32;
        let combined = (b1 << 16) | (b2 << 8) | b3;

        out.push(BASE64_CHARS[((combined >> 18) & 0x3F) as usize] as char);
        out.push(BASE64_CHARS[((combined >> 12) & 0x3F) as usize] as char);
        if chunk.len() > 1 {
            out.push(BASE64_CHARS[((combined >> 6) & 0x3F) as usize] as char);
        }
        if chunk.len() > 2 {
            out.push(BASE64_CHARS[(combined & 0x3F) as usize] as char);
        }
    }

    out
}

fn base64_value(c: char) -> Result<u32, IdentParseError> {
    match c {
        'A'..='Z' => Ok((c as u32) - ('A' as u32)),
        'a'..='z' => Ok((c as u32) - ('a' as u32) + 26),
        '0'..='9' => Ok((c as u32) - ('0' as u32) + 52),
        '-' => Ok(62),
        '_' => Ok(63),
        _ => Err(IdentParseError::InvalidBase64),
    }
}

fn decode_key(s: &str) -> Result<u64, IdentParseError> {
    if s.chars().count() != ENCODED_KEY_LEN {
        return Err(IdentParseError::InvalidFormat);
    }

    let values = s
        .chars()
        .map(base64_value)
        .collect::<Result<Vec<u32>, IdentParseError>>()?;

    let mut bytes = Vec::with_capacity(8);
    for group in values.chunks(4) {
        let v1 = group[0];
        let v2 = *group.get(1).unwrap_or(&0);
        let v3 = *group.get(2).unwrap_or(&0);
        let v4 = *group.get(3).unwrap_or(&0);
        let combined = (v1 << 18) | (v2 << 12) | (v3 << 6) | v4;

        bytes.push((combined >> 16) as u8);
        if group.len() > 2 {
            bytes.push((combined >> 8) as u8);
        }
        if group.len() > 3 {
            bytes.push(combined as u8);
        }
    }

    let mut key = [0u8; 8];
    key.copy_from_slice(&bytes);
    Ok(u64::from_be_bytes(key))
}

///////////////////////////////////////////// ExternalId ///////////////////////////////////////////

/// An opaque, externally-stable identifier for an entity.
///
/// External identifiers are strings of the form `<kind>:<base64>` where the
/// base64 part is the URL-safe encoding of the 8-byte big-endian internal
/// key, e.g. `item:AAAAAAAAAAE`. They are assigned by the server at creation
/// and round-trip exactly through [`Display`] and [`FromStr`].
///
/// # Examples
///
/// ```rust
/// use brocante::{EntityKind, ExternalId};
///
/// let id = ExternalId::new(EntityKind::Item, 1);
/// let s = id.to_string();
/// assert_eq!(s, "item:AAAAAAAAAAE");
///
/// let parsed: ExternalId = s.parse().unwrap();
/// assert_eq!(parsed, id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExternalId {
    kind: EntityKind,
    key: u64,
}

impl ExternalId {
    /// Creates an external identifier for the given kind and internal key.
    pub fn new(kind: EntityKind, key: u64) -> Self {
        ExternalId { kind, key }
    }

    /// Returns the entity kind encoded in this identifier.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Returns the internal store key encoded in this identifier.
    pub fn key(&self) -> u64 {
        self.key
    }
}

impl Display for ExternalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}:{}", self.kind, encode_key(self.key))
    }
}

/// Errors produced when parsing an external identifier string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentParseError {
    /// The string has no `<kind>:` prefix.
    MissingPrefix,
    /// The prefix does not name a known entity kind.
    UnknownKind,
    /// The encoded key part has the wrong length or is non-canonical.
    InvalidFormat,
    /// The encoded key part contains a character outside the URL-safe alphabet.
    InvalidBase64,
}

impl Display for IdentParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            IdentParseError::MissingPrefix => {
                write!(f, "identifier must have a '<kind>:' prefix")
            }
            IdentParseError::UnknownKind => write!(f, "unknown entity kind in identifier"),
            IdentParseError::InvalidFormat => write!(f, "invalid identifier format"),
            IdentParseError::InvalidBase64 => write!(f, "invalid base64 in identifier"),
        }
    }
}

impl std::error::Error for IdentParseError {}

impl FromStr for ExternalId {
    type Err = IdentParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, encoded) = s.split_once(':').ok_or(IdentParseError::MissingPrefix)?;
        let kind = EntityKind::from_prefix(prefix).ok_or(IdentParseError::UnknownKind)?;
        let key = decode_key(encoded)?;

        // Reject non-canonical encodings so each key has exactly one spelling.
        if encode_key(key) != encoded {
            return Err(IdentParseError::InvalidFormat);
        }

        Ok(ExternalId { kind, key })
    }
}
