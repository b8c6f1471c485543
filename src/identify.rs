//! Logical unit identifier selection
//!
//! Picks the logical unit NAA designator out of a Device Identification
//! page and renders it as a World-Wide Name string (`0x5000c50012345678`).

use crate::error::{VpdError, VpdResult};
use crate::vpd::{Descriptor, Vpd83Page};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;

/// Size of an NAA designator rendered as a World-Wide Name
pub const NAA_LEN: usize = 8;

/// NAA identifier of a logical unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LuIdentifier([u8; NAA_LEN]);

impl LuIdentifier {
    pub fn new(bytes: [u8; NAA_LEN]) -> Self {
        LuIdentifier(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NAA_LEN] {
        &self.0
    }

    /// Identifier as a big-endian integer
    pub fn as_u64(&self) -> u64 {
        BigEndian::read_u64(&self.0)
    }

    /// NAA field (high nibble of the first byte): 2, 3, 5 or 6 in practice
    pub fn naa_format(&self) -> u8 {
        self.0[0] >> 4
    }
}

impl fmt::Display for LuIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Select the first logical unit NAA descriptor and extract its identifier
///
/// Returns `Ok(None)` when no descriptor qualifies. The identifier is the 8
/// page bytes following the descriptor header, whatever length the header
/// declares: a 16 byte NAA 6 designator (length byte 0x10) reads as length 0
/// but still yields its first 8 bytes.
///
/// # Errors
///
/// Returns `MalformedPage` if the page ends less than 8 bytes after the
/// selected descriptor header
pub fn select_lu_naa<'a, I>(descriptors: I) -> VpdResult<Option<LuIdentifier>>
where
    I: IntoIterator<Item = Descriptor<'a>>,
{
    let selected = match descriptors.into_iter().find(|d| {
        log::debug!(
            "Descriptor at offset {}: association={}, type={}, length={}",
            d.offset,
            describe(d.association_kind(), d.association),
            describe(d.designator_kind(), d.designator_type),
            d.designator_length
        );
        d.is_lu_naa()
    }) {
        Some(d) => d,
        None => return Ok(None),
    };

    if selected.trailing.len() < NAA_LEN {
        return Err(VpdError::MalformedPage(format!(
            "NAA designator at offset {} has {} bytes before the page end, need {}",
            selected.offset,
            selected.trailing.len(),
            NAA_LEN
        )));
    }
    if selected.designator.len() < NAA_LEN {
        log::debug!(
            "NAA designator at offset {} declares {} bytes, reading {} from the page",
            selected.offset,
            selected.designator_length,
            NAA_LEN
        );
    }

    let mut bytes = [0u8; NAA_LEN];
    bytes.copy_from_slice(&selected.trailing[..NAA_LEN]);
    let id = LuIdentifier(bytes);
    log::debug!("Selected logical unit NAA {} at offset {}", id, selected.offset);
    Ok(Some(id))
}

fn describe<T: fmt::Display>(kind: Option<T>, raw: u8) -> String {
    match kind {
        Some(kind) => kind.to_string(),
        None => format!("reserved (0x{:02x})", raw),
    }
}

impl<'a> Vpd83Page<'a> {
    /// Logical unit NAA identifier of this page, if any
    pub fn lu_identifier(&self) -> VpdResult<Option<LuIdentifier>> {
        select_lu_naa(self.descriptors())
    }
}

/// Decode the logical unit identifier from a raw VPD page 0x83 buffer
///
/// # Example
///
/// ```
/// let page = [
///     0x00, 0x83, 0x00, 0x0c,
///     0x01, 0x03, 0x00, 0x08,
///     0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08,
/// ];
/// let id = sasutils::decode_vpd83_lu(&page).unwrap();
/// assert_eq!(id.as_deref(), Some("0x0102030405060708"));
/// ```
pub fn decode_vpd83_lu(page: &[u8]) -> VpdResult<Option<String>> {
    let page = Vpd83Page::parse(page)?;
    Ok(page.lu_identifier()?.map(|id| id.to_string()))
}
