//! Pre-shared key credentials.

use std::fmt;

use nom::bytes::complete::{tag, take_till1, take_while_m_n};
use nom::character::complete::char;
use nom::combinator::{all_consuming, map, map_res, rest};
use nom::multi::many1;
use nom::sequence::{preceded, separated_pair};
use nom::IResult;
use zeroize::Zeroize;

use crate::error::CredentialError;
use crate::Error;

/// What the engine is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// Client role: our own PSK identity.
    ClientIdentity,
    /// Server role: the key for the identity the client presented.
    Key,
    /// Server role: the identity hint sent to clients.
    Hint,
    /// Raw public key signing material. Not supported.
    EcdsaKey,
    /// Raw public key verification. Not supported.
    EcdsaVerify,
}

/// One identity and its key.
#[derive(Clone, PartialEq, Eq)]
pub struct PskEntry {
    identity: Vec<u8>,
    key: Vec<u8>,
}

impl PskEntry {
    pub fn new(identity: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        PskEntry {
            identity: identity.into(),
            key: key.into(),
        }
    }

    pub fn identity(&self) -> &[u8] {
        &self.identity
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl Drop for PskEntry {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl fmt::Debug for PskEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PskEntry")
            .field("identity", &String::from_utf8_lossy(&self.identity))
            .field("key_len", &self.key.len())
            .finish()
    }
}

/// Identity/key pairs in initialization order.
///
/// The table is never re-sorted, the first matching entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PskTable {
    entries: Vec<PskEntry>,
}

impl PskTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PskEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[PskEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Parse textual PSK params.
    ///
    /// One `identity:key` pair per line. Blank lines and lines starting with
    /// `#` are skipped. A key written as `hex:0a1b..` is decoded to bytes,
    /// anything else is taken verbatim. Surrounding whitespace is trimmed.
    pub fn parse(text: &str) -> Result<PskTable, Error> {
        let mut table = PskTable::new();

        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (_, (identity, key)) = all_consuming(entry)(line)
                .map_err(|e| Error::InvalidParams(format!("line {}: {:?}", n + 1, e)))?;

            if identity.is_empty() || key.is_empty() {
                return Err(Error::InvalidParams(format!(
                    "line {}: empty identity or key",
                    n + 1
                )));
            }

            table.push(PskEntry::new(identity, key));
        }

        Ok(table)
    }

    /// Look up a credential without copying.
    pub fn lookup(
        &self,
        kind: CredentialKind,
        peer_identity: Option<&[u8]>,
    ) -> Result<&[u8], CredentialError> {
        match kind {
            CredentialKind::ClientIdentity => self
                .entries
                .first()
                .map(|e| e.identity())
                .ok_or(CredentialError::UnknownIdentity),

            CredentialKind::Key => {
                let id = peer_identity.ok_or(CredentialError::UnknownIdentity)?;
                self.entries
                    .iter()
                    .find(|e| e.identity() == id)
                    .map(|e| e.key())
                    .ok_or(CredentialError::UnknownIdentity)
            }

            CredentialKind::Hint => Ok(&[][..]),

            kind => Err(CredentialError::Unsupported(kind)),
        }
    }

    /// Copy the requested credential into `out`, returning its length.
    pub fn resolve(
        &self,
        kind: CredentialKind,
        peer_identity: Option<&[u8]>,
        out: &mut [u8],
    ) -> Result<usize, CredentialError> {
        let found = self.lookup(kind, peer_identity)?;

        if out.len() < found.len() {
            return Err(CredentialError::BufferTooSmall {
                needed: found.len(),
                available: out.len(),
            });
        }

        out[..found.len()].copy_from_slice(found);
        Ok(found.len())
    }
}

impl FromIterator<PskEntry> for PskTable {
    fn from_iter<T: IntoIterator<Item = PskEntry>>(iter: T) -> Self {
        PskTable {
            entries: iter.into_iter().collect(),
        }
    }
}

fn entry(input: &str) -> IResult<&str, (&str, Vec<u8>)> {
    let (input, (identity, key)) = separated_pair(
        map(take_till1(|c: char| c == ':'), str::trim),
        char(':'),
        map(rest, str::trim),
    )(input)?;
    let (_, key) = key_bytes(key)?;
    Ok((input, (identity, key)))
}

fn key_bytes(input: &str) -> IResult<&str, Vec<u8>> {
    if input.starts_with("hex:") {
        all_consuming(preceded(tag("hex:"), many1(hex_byte)))(input)
    } else {
        Ok(("", input.as_bytes().to_vec()))
    }
}

fn hex_byte(input: &str) -> IResult<&str, u8> {
    map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |s| {
        u8::from_str_radix(s, 16)
    })(input)
}
