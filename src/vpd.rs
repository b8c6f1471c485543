//! Device Identification VPD page (0x83) parsing
//!
//! This module walks the identification descriptors of a VPD page 0x83
//! buffer, as exposed by the kernel in `/sys/block/<name>/device/vpd_pg83`.
//! Layout based on SPC-4 Section 7.8.6.
//!
//! ```text
//! Page header (4 bytes):
//!    +---------------+---------------+---------------+---------------+
//!   0| PQ | Dev type |  Page code    |  Page length (big-endian)     |
//!    +---------------+---------------+---------------+---------------+
//!
//! Identification descriptor (4 byte header + designator):
//!    |0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|0 1 2 3 4 5 6 7|
//!    +---------------+---------------+---------------+---------------+
//!   0|Proto ID|CodeSt|P|R|Asc|DesType|   Reserved    |  Length       |
//!    +---------------+---------------+---------------+---------------+
//!   4| Designator (Length bytes)                                     |
//!    +---------------+---------------+---------------+---------------+
//! ```
//!
//! Only the low nibble of the length byte is honoured, which covers the
//! NAA, EUI-64 and relative port designators reported by SAS devices.

use crate::error::{VpdError, VpdResult};
use byteorder::{BigEndian, ByteOrder};
use std::fmt;
use std::iter::FusedIterator;

/// Page code of the Device Identification VPD page
pub const VPD_DEVICE_IDENTIFICATION: u8 = 0x83;

/// Size of the page header; descriptors start right after it
pub const PAGE_HEADER_LEN: usize = 4;

/// Size of an identification descriptor header
pub const DESCRIPTOR_HEADER_LEN: usize = 4;

/// Smallest page that can be decoded: page header plus one descriptor header
pub const MIN_PAGE_LEN: usize = PAGE_HEADER_LEN + DESCRIPTOR_HEADER_LEN;

/// Association field values (byte 1, bits 4-5)
pub mod association {
    pub const LOGICAL_UNIT: u8 = 0x00;
    pub const TARGET_PORT: u8 = 0x01;
    pub const TARGET_DEVICE: u8 = 0x02;
}

/// Designator type values (byte 1, bits 0-3)
pub mod designator_type {
    pub const VENDOR_SPECIFIC: u8 = 0x00;
    pub const T10_VENDOR_ID: u8 = 0x01;
    pub const EUI64: u8 = 0x02;
    pub const NAA: u8 = 0x03;
    pub const RELATIVE_TARGET_PORT: u8 = 0x04;
    pub const TARGET_PORT_GROUP: u8 = 0x05;
    pub const LOGICAL_UNIT_GROUP: u8 = 0x06;
    pub const MD5_LOGICAL_UNIT: u8 = 0x07;
    pub const SCSI_NAME_STRING: u8 = 0x08;
    pub const PROTOCOL_SPECIFIC_PORT: u8 = 0x09;
    pub const UUID: u8 = 0x0A;
}

/// Code set values (byte 0, bits 0-3)
pub mod code_set {
    pub const BINARY: u8 = 0x01;
    pub const ASCII: u8 = 0x02;
    pub const UTF8: u8 = 0x03;
}

/// What a descriptor identifies
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Association {
    LogicalUnit = 0x00,
    TargetPort = 0x01,
    TargetDevice = 0x02,
}

impl Association {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0x00 => Some(Association::LogicalUnit),
            0x01 => Some(Association::TargetPort),
            0x02 => Some(Association::TargetDevice),
            _ => None,
        }
    }
}

impl fmt::Display for Association {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Association::LogicalUnit => "logical unit",
            Association::TargetPort => "target port",
            Association::TargetDevice => "target device",
        };
        f.write_str(name)
    }
}

/// Encoding scheme of a designator
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesignatorType {
    VendorSpecific = 0x00,
    T10VendorId = 0x01,
    Eui64 = 0x02,
    Naa = 0x03,
    RelativeTargetPort = 0x04,
    TargetPortGroup = 0x05,
    LogicalUnitGroup = 0x06,
    Md5LogicalUnit = 0x07,
    ScsiNameString = 0x08,
    ProtocolSpecificPort = 0x09,
    Uuid = 0x0A,
}

impl DesignatorType {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0x00 => Some(DesignatorType::VendorSpecific),
            0x01 => Some(DesignatorType::T10VendorId),
            0x02 => Some(DesignatorType::Eui64),
            0x03 => Some(DesignatorType::Naa),
            0x04 => Some(DesignatorType::RelativeTargetPort),
            0x05 => Some(DesignatorType::TargetPortGroup),
            0x06 => Some(DesignatorType::LogicalUnitGroup),
            0x07 => Some(DesignatorType::Md5LogicalUnit),
            0x08 => Some(DesignatorType::ScsiNameString),
            0x09 => Some(DesignatorType::ProtocolSpecificPort),
            0x0A => Some(DesignatorType::Uuid),
            _ => None,
        }
    }
}

impl fmt::Display for DesignatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DesignatorType::VendorSpecific => "vendor specific",
            DesignatorType::T10VendorId => "T10 vendor ID",
            DesignatorType::Eui64 => "EUI-64",
            DesignatorType::Naa => "NAA",
            DesignatorType::RelativeTargetPort => "relative target port",
            DesignatorType::TargetPortGroup => "target port group",
            DesignatorType::LogicalUnitGroup => "logical unit group",
            DesignatorType::Md5LogicalUnit => "MD5 logical unit",
            DesignatorType::ScsiNameString => "SCSI name string",
            DesignatorType::ProtocolSpecificPort => "protocol specific port",
            DesignatorType::Uuid => "UUID",
        };
        f.write_str(name)
    }
}

/// Code set from descriptor byte 0
pub fn extract_code_set(byte: u8) -> u8 {
    byte & 0x0F
}

/// Protocol identifier from descriptor byte 0
pub fn extract_protocol_identifier(byte: u8) -> u8 {
    byte >> 4
}

/// PIV bit from descriptor byte 1
pub fn extract_piv(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Association from descriptor byte 1
pub fn extract_association(byte: u8) -> u8 {
    (byte >> 4) & 0x03
}

/// Designator type from descriptor byte 1
pub fn extract_designator_type(byte: u8) -> u8 {
    byte & 0x0F
}

/// Designator length from descriptor byte 3
pub fn extract_length(byte: u8) -> usize {
    (byte & 0x0F) as usize
}

/// One identification descriptor, borrowing its designator from the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor<'a> {
    /// Page offset of the descriptor header
    pub offset: usize,
    /// Low nibble of byte 0; the high nibble is `protocol_identifier`
    pub code_set: u8,
    pub protocol_identifier: u8,
    pub piv: bool,
    pub association: u8,
    pub designator_type: u8,
    pub designator_length: usize,
    pub designator: &'a [u8],
    /// Page bytes from the start of the designator to the end of the page
    pub trailing: &'a [u8],
}

impl<'a> Descriptor<'a> {
    fn from_header(
        offset: usize,
        header: &[u8],
        designator: &'a [u8],
        trailing: &'a [u8],
    ) -> Self {
        Descriptor {
            offset,
            code_set: extract_code_set(header[0]),
            protocol_identifier: extract_protocol_identifier(header[0]),
            piv: extract_piv(header[1]),
            association: extract_association(header[1]),
            designator_type: extract_designator_type(header[1]),
            designator_length: extract_length(header[3]),
            designator,
            trailing,
        }
    }

    pub fn association_kind(&self) -> Option<Association> {
        Association::from_u8(self.association)
    }

    pub fn designator_kind(&self) -> Option<DesignatorType> {
        DesignatorType::from_u8(self.designator_type)
    }

    /// True for a logical unit NAA designator
    pub fn is_lu_naa(&self) -> bool {
        self.association_kind() == Some(Association::LogicalUnit)
            && self.designator_kind() == Some(DesignatorType::Naa)
    }
}

/// Iterator over the identification descriptors of a page
///
/// Stops at the first descriptor whose header or designator would run past
/// the end of the buffer. Every step consumes at least a descriptor header,
/// so a page of `n` bytes yields at most `n / 4` descriptors.
#[derive(Debug, Clone)]
pub struct DescriptorIter<'a> {
    page: &'a [u8],
    cursor: usize,
    done: bool,
}

impl<'a> DescriptorIter<'a> {
    fn new(page: &'a [u8]) -> Self {
        DescriptorIter {
            page,
            cursor: PAGE_HEADER_LEN,
            done: false,
        }
    }
}

impl<'a> Iterator for DescriptorIter<'a> {
    type Item = Descriptor<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let header_end = self.cursor + DESCRIPTOR_HEADER_LEN;
        if header_end > self.page.len() {
            self.done = true;
            return None;
        }

        let header = &self.page[self.cursor..header_end];
        let next_offset = header_end + extract_length(header[3]);
        if next_offset > self.page.len() {
            log::debug!(
                "Descriptor at offset {} ends at {}, past page end {}; stopping",
                self.cursor,
                next_offset,
                self.page.len()
            );
            self.done = true;
            return None;
        }

        let descriptor = Descriptor::from_header(
            self.cursor,
            header,
            &self.page[header_end..next_offset],
            &self.page[header_end..],
        );
        self.cursor = next_offset;
        Some(descriptor)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let remaining = self.page.len().saturating_sub(self.cursor);
        (0, Some(remaining / DESCRIPTOR_HEADER_LEN))
    }
}

impl FusedIterator for DescriptorIter<'_> {}

/// Iterate the descriptors of a raw page without validating it
///
/// A buffer too short to hold one descriptor header yields nothing.
pub fn descriptors(page: &[u8]) -> DescriptorIter<'_> {
    DescriptorIter::new(page)
}

/// Validated view over a Device Identification VPD page
#[derive(Debug, Clone, Copy)]
pub struct Vpd83Page<'a> {
    bytes: &'a [u8],
}

impl<'a> Vpd83Page<'a> {
    /// Check that a buffer can be decoded as a VPD page 0x83
    ///
    /// # Errors
    ///
    /// * `MalformedPage` if the buffer cannot hold the page header and the
    ///   first descriptor header
    /// * `UnsupportedLayout` if the first descriptor's reserved byte is set
    pub fn parse(bytes: &'a [u8]) -> VpdResult<Self> {
        if bytes.len() < MIN_PAGE_LEN {
            return Err(VpdError::MalformedPage(format!(
                "page is {} bytes, need at least {} for the page header and one descriptor header",
                bytes.len(),
                MIN_PAGE_LEN
            )));
        }

        let reserved = bytes[PAGE_HEADER_LEN + 2];
        if reserved != 0 {
            log::warn!(
                "VPD page 0x83: first descriptor reserved byte is 0x{:02x}, cannot decode",
                reserved
            );
            return Err(VpdError::UnsupportedLayout(format!(
                "first descriptor reserved byte at offset {} is 0x{:02x}, expected 0x00",
                PAGE_HEADER_LEN + 2,
                reserved
            )));
        }

        if bytes[1] != VPD_DEVICE_IDENTIFICATION {
            log::debug!(
                "Page code is 0x{:02x}, expected 0x{:02x}; decoding anyway",
                bytes[1],
                VPD_DEVICE_IDENTIFICATION
            );
        }

        let declared = BigEndian::read_u16(&bytes[2..4]) as usize;
        if declared + PAGE_HEADER_LEN != bytes.len() {
            log::debug!(
                "Page length field says {} bytes, buffer holds {}",
                declared,
                bytes.len() - PAGE_HEADER_LEN
            );
        }

        Ok(Vpd83Page { bytes })
    }

    /// Page code (byte 1)
    pub fn page_code(&self) -> u8 {
        self.bytes[1]
    }

    /// Page length field (bytes 2-3), excluding the page header
    pub fn page_length(&self) -> u16 {
        BigEndian::read_u16(&self.bytes[2..4])
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    /// Fresh iterator over the page's descriptors
    pub fn descriptors(&self) -> DescriptorIter<'a> {
        DescriptorIter::new(self.bytes)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a page from raw descriptors, filling in the page header
    fn build_page(descriptors: &[&[u8]]) -> Vec<u8> {
        let mut data = vec![0x00, VPD_DEVICE_IDENTIFICATION, 0x00, 0x00];
        for desc in descriptors {
            data.extend_from_slice(desc);
        }
        let len = (data.len() - PAGE_HEADER_LEN) as u16;
        BigEndian::write_u16(&mut data[2..4], len);
        data
    }

    const LU_NAA: [u8; 12] = [
        0x01, 0x03, 0x00, 0x08, // binary, LU, NAA, length=8
        0x50, 0x00, 0xc5, 0x00, 0x12, 0x34, 0x56, 0x78,
    ];
    const PORT_NAA: [u8; 12] = [
        0x61, 0x93, 0x00, 0x08, // SAS, PIV, target port, NAA
        0x50, 0x00, 0xc5, 0x00, 0x12, 0x34, 0x56, 0x79,
    ];
    const RELATIVE_PORT: [u8; 8] = [0x61, 0x94, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01];

    #[test]
    fn test_extract_association() {
        assert_eq!(extract_association(0x03), association::LOGICAL_UNIT);
        assert_eq!(extract_association(0x93), association::TARGET_PORT);
        assert_eq!(extract_association(0xa3), association::TARGET_DEVICE);
        assert_eq!(extract_association(0xb3), 0x03);
    }

    #[test]
    fn test_extract_designator_type() {
        assert_eq!(extract_designator_type(0x03), designator_type::NAA);
        assert_eq!(extract_designator_type(0x94), designator_type::RELATIVE_TARGET_PORT);
        assert_eq!(extract_designator_type(0xa8), designator_type::SCSI_NAME_STRING);
    }

    #[test]
    fn test_extract_length_masks_high_nibble() {
        assert_eq!(extract_length(0x08), 8);
        assert_eq!(extract_length(0x18), 8);
        assert_eq!(extract_length(0xf0), 0);
        assert_eq!(extract_length(0xff), 15);
    }

    #[test]
    fn test_extract_byte0_fields() {
        assert_eq!(extract_code_set(0x61), code_set::BINARY);
        assert_eq!(extract_protocol_identifier(0x61), 0x06);
        assert!(extract_piv(0x93));
        assert!(!extract_piv(0x13));
    }

    #[test]
    fn test_enum_from_u8() {
        assert_eq!(Association::from_u8(1), Some(Association::TargetPort));
        assert_eq!(Association::from_u8(3), None);
        assert_eq!(DesignatorType::from_u8(3), Some(DesignatorType::Naa));
        assert_eq!(DesignatorType::from_u8(0x0F), None);
        assert_eq!(DesignatorType::Naa.to_string(), "NAA");
        assert_eq!(Association::LogicalUnit.to_string(), "logical unit");
    }

    #[test]
    fn test_iterate_descriptors() {
        let page = build_page(&[&LU_NAA, &PORT_NAA, &RELATIVE_PORT]);
        let descs: Vec<_> = descriptors(&page).collect();
        assert_eq!(descs.len(), 3);

        assert_eq!(descs[0].offset, 4);
        assert!(descs[0].is_lu_naa());
        assert_eq!(descs[0].designator, &LU_NAA[4..]);

        assert_eq!(descs[1].offset, 16);
        assert_eq!(descs[1].association, association::TARGET_PORT);
        assert_eq!(descs[1].code_set, code_set::BINARY);
        assert_eq!(descs[1].protocol_identifier, 0x06);
        assert!(descs[1].piv);
        assert!(!descs[1].is_lu_naa());

        assert_eq!(descs[2].offset, 28);
        assert_eq!(descs[2].designator_type, designator_type::RELATIVE_TARGET_PORT);
        assert_eq!(descs[2].designator_length, 4);
        assert_eq!(descs[2].designator, &[0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn test_descriptor_kinds() {
        let page = build_page(&[&LU_NAA, &PORT_NAA, &[0x01, 0xbf, 0x00, 0x00]]);
        let descs: Vec<_> = descriptors(&page).collect();
        assert_eq!(descs[0].association_kind(), Some(Association::LogicalUnit));
        assert_eq!(descs[0].designator_kind(), Some(DesignatorType::Naa));
        assert_eq!(descs[1].association_kind(), Some(Association::TargetPort));
        assert_eq!(descs[2].association_kind(), None);
        assert_eq!(descs[2].designator_kind(), None);
        assert!(!descs[2].is_lu_naa());
    }

    #[test]
    fn test_trailing_runs_to_page_end() {
        let page = build_page(&[&RELATIVE_PORT, &LU_NAA]);
        let descs: Vec<_> = descriptors(&page).collect();
        assert_eq!(descs[0].trailing, &page[8..]);
        assert_eq!(descs[1].trailing, &LU_NAA[4..]);
    }

    #[test]
    fn test_short_buffers_yield_nothing() {
        assert_eq!(descriptors(&[]).count(), 0);
        assert_eq!(descriptors(&[0x00, 0x83, 0x00, 0x00]).count(), 0);
        assert_eq!(descriptors(&[0x00, 0x83, 0x00, 0x03, 0x01, 0x03, 0x00]).count(), 0);
    }

    #[test]
    fn test_truncated_last_descriptor_is_dropped() {
        let mut page = build_page(&[&RELATIVE_PORT, &LU_NAA]);
        page.truncate(page.len() - 3);
        let descs: Vec<_> = descriptors(&page).collect();
        assert_eq!(descs.len(), 1);
        assert_eq!(descs[0].designator_type, designator_type::RELATIVE_TARGET_PORT);
    }

    #[test]
    fn test_trailing_slack_is_ignored() {
        let mut page = build_page(&[&LU_NAA]);
        page.extend_from_slice(&[0x00, 0x00]);
        assert_eq!(descriptors(&page).count(), 1);
    }

    #[test]
    fn test_zero_length_descriptors_advance() {
        let empty = [0x01, 0x00, 0x00, 0x00];
        let page = build_page(&[&empty, &empty, &empty, &empty]);
        let iter = descriptors(&page);
        assert_eq!(iter.size_hint(), (0, Some(4)));
        let offsets: Vec<_> = iter.map(|d| d.offset).collect();
        assert_eq!(offsets, vec![4, 8, 12, 16]);
    }

    #[test]
    fn test_adversarial_lengths_terminate() {
        let page = vec![0xFFu8; 300];
        let count = descriptors(&page).count();
        assert!(count <= page.len() / DESCRIPTOR_HEADER_LEN);
        // 15 byte designators: (300 - 4) / 19
        assert_eq!(count, 15);
    }

    #[test]
    fn test_iteration_is_restartable() {
        let page = build_page(&[&PORT_NAA, &LU_NAA]);
        let first: Vec<_> = descriptors(&page).collect();
        let second: Vec<_> = descriptors(&page).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_iterator_is_fused() {
        let page = build_page(&[&LU_NAA]);
        let mut iter = descriptors(&page);
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
        assert_eq!(iter.size_hint(), (0, Some(0)));
    }

    #[test]
    fn test_parse_header_fields() {
        let page = build_page(&[&LU_NAA, &RELATIVE_PORT]);
        let vpd = Vpd83Page::parse(&page).unwrap();
        assert_eq!(vpd.page_code(), VPD_DEVICE_IDENTIFICATION);
        assert_eq!(vpd.page_length(), 20);
        assert_eq!(vpd.as_bytes(), &page[..]);
        assert_eq!(vpd.descriptors().count(), 2);
    }

    #[test]
    fn test_parse_rejects_short_page() {
        let result = Vpd83Page::parse(&[0x00, 0x83, 0x00, 0x00, 0x01, 0x03, 0x00]);
        assert!(matches!(result, Err(VpdError::MalformedPage(_))));
    }

    #[test]
    fn test_parse_rejects_reserved_byte() {
        let mut page = build_page(&[&LU_NAA]);
        page[6] = 0x01;
        match Vpd83Page::parse(&page) {
            Err(VpdError::UnsupportedLayout(msg)) => assert!(msg.contains("0x01")),
            other => panic!("Expected UnsupportedLayout, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_tolerates_other_page_code() {
        let mut page = build_page(&[&LU_NAA]);
        page[1] = 0x80;
        let vpd = Vpd83Page::parse(&page).unwrap();
        assert_eq!(vpd.page_code(), 0x80);
    }
}
