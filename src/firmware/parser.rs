//! Firmware image parser (spec.md §4.B).
//!
//! Grounded in `os/kernel/src/device/mlx4/fw.rs`'s low-level, hand-rolled
//! field extraction (`byteorder`, manual cursors) and in
//! `original_source/arch/arm/plat-omap/remoteproc.c`'s `omap_rproc_load`
//! section loop. Unlike `fw.rs` (which reads a single, fixed-layout
//! firmware-query struct), a remoteproc image is a *sequence* of
//! variable-length sections, so this module walks the buffer by hand
//! instead of casting it onto a `#[repr(C, packed)]` struct.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{Result, RprocError};
use crate::firmware::format::{self, ResourceEntry, ResourceKind, SectionHeader, FW_RESOURCE};
use crate::translate::MemoryMap;

/// Callback surface the parser needs from its caller: write translated
/// host memory, and react to resource-table entries as they are found.
/// Kept as a trait (rather than a concrete struct) so the parser itself
/// stays ignorant of `RemoteProcessor`'s locking, matching how
/// `rproc_handle_resources` in the original is a free function taking
/// the owning `rproc` by reference rather than a method on it.
pub trait FirmwareSink {
    /// Map `[pa, pa+data.len())` on the host and copy `data` into it.
    /// A `len == 0` write is legal and must be a no-op.
    fn write(&mut self, pa: u64, data: &[u8]) -> Result<()>;

    /// Called once per resource-table entry, in file order. Duplicate
    /// `FW_RESOURCE` sections are allowed; resources simply accumulate
    /// across calls.
    fn resource(&mut self, entry: ResourceEntry, pa: Option<u64>);
}

/// Outcome of a successful parse: the boot address resolved from a
/// `BOOTADDR` resource entry, or 0 if none was present (spec.md §4.B.5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadResult {
    pub boot_addr: u64,
}

/// Parse `image` and apply it to `sink` through `map`.
pub fn load(image: &[u8], map: &MemoryMap, sink: &mut impl FirmwareSink) -> Result<LoadResult> {
    if image.len() < format::IMAGE_HEADER_LEN {
        log::warn!("firmware image shorter than header ({} bytes)", image.len());
        return Err(RprocError::Malformed);
    }

    let magic = &image[0..4];
    if magic != format::MAGIC {
        log::warn!("firmware magic mismatch: got {magic:02x?}");
        return Err(RprocError::BadMagic);
    }
    let _version = LittleEndian::read_u32(&image[4..8]);
    let header_len = LittleEndian::read_u32(&image[8..12]) as usize;

    let mut offset = format::IMAGE_HEADER_LEN;
    if image.len() < offset + header_len {
        return Err(RprocError::Truncated);
    }
    offset += header_len; // opaque textual header, skipped verbatim

    let section_header_len = format::section_header_len();
    let mut boot_addr = 0u64;

    while image.len() - offset >= section_header_len {
        let header = read_section_header(&image[offset..offset + section_header_len]);
        offset += section_header_len;

        let remaining = image.len() - offset;
        if header.len as usize > remaining {
            log::warn!(
                "section type={} da=0x{:x} len={} overruns image (remaining {})",
                header.kind, header.da, header.len, remaining
            );
            return Err(RprocError::Truncated);
        }

        let content = &image[offset..offset + header.len as usize];
        offset += header.len as usize;

        apply_section(&header, content, map, sink, &mut boot_addr)?;
    }

    // Trailing bytes shorter than a section header terminate parsing
    // silently (spec.md §4.B edge cases): nothing further to do here.
    Ok(LoadResult { boot_addr })
}

fn apply_section(
    header: &SectionHeader,
    content: &[u8],
    map: &MemoryMap,
    sink: &mut impl FirmwareSink,
    boot_addr: &mut u64,
) -> Result<()> {
    if header.kind == FW_RESOURCE {
        log::debug!("firmware resource table section: {} bytes", content.len());
        parse_resource_table(content, map, sink, boot_addr);
        // A resource-table section is not additionally written through
        // `pa`; its bytes are consumed entirely by the resource handler.
        return Ok(());
    }

    let pa = map.lookup(header.da).ok_or(RprocError::BadAddress)?;
    log::debug!(
        "firmware section type={} da=0x{:x} pa=0x{:x} len={}",
        header.kind, header.da, pa, content.len()
    );
    // A zero-length section is a legal no-op write (spec.md §4.B edge cases).
    sink.write(pa, content)
}

fn parse_resource_table(
    content: &[u8],
    map: &MemoryMap,
    sink: &mut impl FirmwareSink,
    boot_addr: &mut u64,
) {
    let entry_len = ResourceEntry::WIRE_LEN;
    let mut offset = 0;
    while content.len() - offset >= entry_len {
        let entry = read_resource_entry(&content[offset..offset + entry_len]);
        offset += entry_len;

        if entry.reserved != 0 {
            log::warn!("resource {}: nonzero reserved field", entry.name_str());
        }

        if entry.da > u32::MAX as u64 {
            log::warn!(
                "resource {}: da 0x{:x} exceeds 32 bits, downcasting for translation",
                entry.name_str(),
                entry.da
            );
        }
        let pa = map.lookup(entry.da & 0xFFFF_FFFF);

        if let ResourceKind::BootAddr = entry.kind {
            *boot_addr = entry.da;
        }

        sink.resource(entry, pa);
    }
}

fn read_section_header(bytes: &[u8]) -> SectionHeader {
    let kind = LittleEndian::read_u32(&bytes[0..4]);
    let da = read_da(&bytes[4..4 + format::DA_WIDTH]);
    let len_off = 4 + format::DA_WIDTH;
    let len = LittleEndian::read_u32(&bytes[len_off..len_off + 4]);
    SectionHeader { kind, da, len }
}

fn read_resource_entry(bytes: &[u8]) -> ResourceEntry {
    let kind = ResourceKind::from(LittleEndian::read_u32(&bytes[0..4]));
    let mut off = 4;
    let da = read_da(&bytes[off..off + format::DA_WIDTH]);
    off += format::DA_WIDTH;
    let len = LittleEndian::read_u32(&bytes[off..off + 4]);
    off += 4;
    let reserved = LittleEndian::read_u32(&bytes[off..off + 4]);
    off += 4;
    let mut name = [0u8; format::RESOURCE_NAME_LEN];
    name.copy_from_slice(&bytes[off..off + format::RESOURCE_NAME_LEN]);
    ResourceEntry { kind, da, len, reserved, name }
}

fn read_da(bytes: &[u8]) -> u64 {
    if bytes.len() == 4 {
        LittleEndian::read_u32(bytes) as u64
    } else {
        LittleEndian::read_u64(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::MemMapEntry;
    use std::vec::Vec;

    struct RecordingSink {
        writes: Vec<(u64, Vec<u8>)>,
        resources: Vec<ResourceEntry>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self { writes: Vec::new(), resources: Vec::new() }
        }
    }

    impl FirmwareSink for RecordingSink {
        fn write(&mut self, pa: u64, data: &[u8]) -> Result<()> {
            self.writes.push((pa, data.to_vec()));
            Ok(())
        }

        fn resource(&mut self, entry: ResourceEntry, _pa: Option<u64>) {
            self.resources.push(entry);
        }
    }

    fn push_section(buf: &mut Vec<u8>, kind: u32, da: u64, content: &[u8]) {
        let mut header = [0u8; 4];
        LittleEndian::write_u32(&mut header, kind);
        buf.extend_from_slice(&header);
        if format::DA_WIDTH == 4 {
            let mut b = [0u8; 4];
            LittleEndian::write_u32(&mut b, da as u32);
            buf.extend_from_slice(&b);
        } else {
            let mut b = [0u8; 8];
            LittleEndian::write_u64(&mut b, da);
            buf.extend_from_slice(&b);
        }
        let mut len = [0u8; 4];
        LittleEndian::write_u32(&mut len, content.len() as u32);
        buf.extend_from_slice(&len);
        buf.extend_from_slice(content);
    }

    fn push_resource_entry(buf: &mut Vec<u8>, kind: u32, da: u64, len: u32, name: &str) {
        let mut k = [0u8; 4];
        LittleEndian::write_u32(&mut k, kind);
        buf.extend_from_slice(&k);
        if format::DA_WIDTH == 4 {
            let mut b = [0u8; 4];
            LittleEndian::write_u32(&mut b, da as u32);
            buf.extend_from_slice(&b);
        } else {
            let mut b = [0u8; 8];
            LittleEndian::write_u64(&mut b, da);
            buf.extend_from_slice(&b);
        }
        let mut l = [0u8; 4];
        LittleEndian::write_u32(&mut l, len);
        buf.extend_from_slice(&l);
        buf.extend_from_slice(&[0u8; 4]); // reserved
        let mut name_bytes = [0u8; format::RESOURCE_NAME_LEN];
        let n = name.as_bytes();
        name_bytes[..n.len()].copy_from_slice(n);
        buf.extend_from_slice(&name_bytes);
    }

    fn header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(&format::MAGIC);
        buf.extend_from_slice(&0u32.to_le_bytes()); // version
        buf.extend_from_slice(&0u32.to_le_bytes()); // header_len = 0
    }

    #[test]
    fn load_and_boot_e1() {
        let map = MemoryMap::new(vec![MemMapEntry::new(0xA000_0000, 0x9CF0_0000, 0x10_0000)]);
        let mut image = Vec::new();
        header(&mut image);
        push_section(&mut image, 1, 0xA000_0000, &(0u8..=0x0F).collect::<Vec<_>>());

        let mut resource_table = Vec::new();
        push_resource_entry(&mut resource_table, 5, 0xA000_0000, 0, "boot");
        push_section(&mut image, FW_RESOURCE, 0xA000_1000, &resource_table);

        let mut sink = RecordingSink::new();
        let result = load(&image, &map, &mut sink).expect("should parse");

        assert_eq!(result.boot_addr, 0xA000_0000);
        assert_eq!(sink.writes.len(), 1);
        assert_eq!(sink.writes[0].0, 0x9CF0_0000);
        assert_eq!(sink.writes[0].1, (0u8..=0x0F).collect::<Vec<_>>());
    }

    #[test]
    fn bad_magic_e2() {
        let map = MemoryMap::new(vec![]);
        let mut image = Vec::new();
        image.extend_from_slice(b"XXXX");
        image.extend_from_slice(&0u32.to_le_bytes());
        image.extend_from_slice(&0u32.to_le_bytes());

        let mut sink = RecordingSink::new();
        assert_eq!(load(&image, &map, &mut sink), Err(RprocError::BadMagic));
        assert!(sink.writes.is_empty());
    }

    #[test]
    fn truncated_header_is_malformed() {
        let map = MemoryMap::new(vec![]);
        let mut sink = RecordingSink::new();
        assert_eq!(load(&[1, 2, 3], &map, &mut sink), Err(RprocError::Malformed));
    }

    #[test]
    fn section_overrunning_image_is_truncated() {
        let map = MemoryMap::new(vec![MemMapEntry::new(0, 0, 0x1000)]);
        let mut image = Vec::new();
        header(&mut image);
        // Claim a length far bigger than what actually follows.
        image.extend_from_slice(&1u32.to_le_bytes());
        if format::DA_WIDTH == 4 {
            image.extend_from_slice(&0u32.to_le_bytes());
        } else {
            image.extend_from_slice(&0u64.to_le_bytes());
        }
        image.extend_from_slice(&1000u32.to_le_bytes());
        image.extend_from_slice(&[0u8; 4]); // far short of 1000 bytes

        let mut sink = RecordingSink::new();
        assert_eq!(load(&image, &map, &mut sink), Err(RprocError::Truncated));
    }

    #[test]
    fn unmapped_section_is_bad_address() {
        let map = MemoryMap::new(vec![MemMapEntry::new(0x1000, 0x2000, 0x100)]);
        let mut image = Vec::new();
        header(&mut image);
        push_section(&mut image, 1, 0x9999, &[1, 2, 3]);

        let mut sink = RecordingSink::new();
        assert_eq!(load(&image, &map, &mut sink), Err(RprocError::BadAddress));
    }

    #[test]
    fn zero_length_section_is_noop_write() {
        let map = MemoryMap::new(vec![MemMapEntry::new(0x1000, 0x2000, 0x100)]);
        let mut image = Vec::new();
        header(&mut image);
        push_section(&mut image, 1, 0x1000, &[]);

        let mut sink = RecordingSink::new();
        load(&image, &map, &mut sink).unwrap();
        assert_eq!(sink.writes, vec![(0x2000, vec![])]);
    }

    #[test]
    fn trailing_garbage_shorter_than_header_is_ignored() {
        let map = MemoryMap::new(vec![MemMapEntry::new(0x1000, 0x2000, 0x100)]);
        let mut image = Vec::new();
        header(&mut image);
        push_section(&mut image, 1, 0x1000, &[9, 9]);
        image.push(0xAB); // trailing byte, shorter than a section header

        let mut sink = RecordingSink::new();
        let result = load(&image, &map, &mut sink).unwrap();
        assert_eq!(result.boot_addr, 0);
        assert_eq!(sink.writes.len(), 1);
    }

    #[test]
    fn duplicate_resource_sections_accumulate() {
        let map = MemoryMap::new(vec![]);
        let mut image = Vec::new();
        header(&mut image);

        let mut rt1 = Vec::new();
        push_resource_entry(&mut rt1, 4, 0, 0x100, "trace0");
        push_section(&mut image, FW_RESOURCE, 0, &rt1);

        let mut rt2 = Vec::new();
        push_resource_entry(&mut rt2, 4, 0, 0x100, "trace1");
        push_section(&mut image, FW_RESOURCE, 0, &rt2);

        let mut sink = RecordingSink::new();
        load(&image, &map, &mut sink).unwrap();
        assert_eq!(sink.resources.len(), 2);
    }
}
