use byteorder::{ByteOrder, LittleEndian};

use crate::common::types::{PageNo, NO_PAGE, PAGE_SIZE};
use crate::storage::record::bitmap;
use crate::storage::record::error::RecordError;

/// Page holding the file header
pub const FILE_HDR_PAGE: PageNo = 0;
/// First page that stores records
pub const FIRST_RECORD_PAGE: PageNo = 1;

pub const FILE_HEADER_SIZE: usize = 20; // 4 bytes per field * 5 fields
pub const PAGE_HEADER_SIZE: usize = 8; // next free page + record count

fn encode_page_no(page_no: Option<PageNo>) -> u32 {
    page_no.unwrap_or(NO_PAGE)
}

fn decode_page_no(raw: u32) -> Option<PageNo> {
    if raw == NO_PAGE { None } else { Some(raw) }
}

/// Largest slot count whose header, bitmap and slots fit into one page
pub fn records_per_page(record_size: usize) -> usize {
    let usable = PAGE_SIZE - PAGE_HEADER_SIZE;
    let mut n = usable * 8 / (record_size * 8 + 1);
    while n > 0 && bitmap::size_for(n) + n * record_size > usable {
        n -= 1;
    }
    n
}

/// Per-file metadata, persisted in page 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFileHeader {
    pub record_size: u32,
    /// Pages in the file, header page included
    pub num_pages: u32,
    pub num_records_per_page: u32,
    /// Head of the chain of pages with at least one free slot
    pub first_free_page_no: Option<PageNo>,
    pub bitmap_size: u32,
}

impl RecordFileHeader {
    /// Header of an empty file storing records of `record_size` bytes
    pub fn new(record_size: usize) -> Result<Self, RecordError> {
        if record_size == 0 || records_per_page(record_size) == 0 {
            return Err(RecordError::InvalidRecordSize(record_size));
        }
        let per_page = records_per_page(record_size);
        Ok(Self {
            record_size: record_size as u32,
            num_pages: FIRST_RECORD_PAGE,
            num_records_per_page: per_page as u32,
            first_free_page_no: None,
            bitmap_size: bitmap::size_for(per_page) as u32,
        })
    }

    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE] {
        let mut bytes = [0u8; FILE_HEADER_SIZE];
        LittleEndian::write_u32(&mut bytes[0..4], self.record_size);
        LittleEndian::write_u32(&mut bytes[4..8], self.num_pages);
        LittleEndian::write_u32(&mut bytes[8..12], self.num_records_per_page);
        LittleEndian::write_u32(&mut bytes[12..16], encode_page_no(self.first_free_page_no));
        LittleEndian::write_u32(&mut bytes[16..20], self.bitmap_size);
        bytes
    }

    /// Decode a header, rejecting one whose geometry is inconsistent
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RecordError> {
        let header = Self {
            record_size: LittleEndian::read_u32(&bytes[0..4]),
            num_pages: LittleEndian::read_u32(&bytes[4..8]),
            num_records_per_page: LittleEndian::read_u32(&bytes[8..12]),
            first_free_page_no: decode_page_no(LittleEndian::read_u32(&bytes[12..16])),
            bitmap_size: LittleEndian::read_u32(&bytes[16..20]),
        };

        let expected = Self::new(header.record_size as usize)?;
        if header.num_records_per_page != expected.num_records_per_page
            || header.bitmap_size != expected.bitmap_size
            || header.num_pages < FIRST_RECORD_PAGE
        {
            return Err(RecordError::InvalidRecordSize(header.record_size as usize));
        }
        Ok(header)
    }

    pub fn record_size(&self) -> usize {
        self.record_size as usize
    }

    pub fn slots(&self) -> usize {
        self.num_records_per_page as usize
    }

    /// Byte range of the occupancy bitmap inside a record page
    pub fn bitmap_range(&self) -> std::ops::Range<usize> {
        PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + self.bitmap_size as usize
    }

    /// Byte range of slot `slot_no` inside a record page
    pub fn slot_range(&self, slot_no: u32) -> std::ops::Range<usize> {
        let start = PAGE_HEADER_SIZE
            + self.bitmap_size as usize
            + slot_no as usize * self.record_size as usize;
        start..start + self.record_size as usize
    }
}

/// Header at the start of every record page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordPageHeader {
    /// Next page in the free-page chain
    pub next_free_page_no: Option<PageNo>,
    pub num_records: u32,
}

impl RecordPageHeader {
    pub fn read_from(data: &[u8]) -> Self {
        Self {
            next_free_page_no: decode_page_no(LittleEndian::read_u32(&data[0..4])),
            num_records: LittleEndian::read_u32(&data[4..8]),
        }
    }

    pub fn write_to(&self, data: &mut [u8]) {
        LittleEndian::write_u32(&mut data[0..4], encode_page_no(self.next_free_page_no));
        LittleEndian::write_u32(&mut data[4..8], self.num_records);
    }
}
