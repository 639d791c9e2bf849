use crate::error::RollPressError;
use crate::flate;

/// Where rendered documents land. The batch driver calls `put` once per
/// group and `finalize` once after every group succeeded, so a partially
/// filled sink is never exposed.
pub trait ArchiveSink {
    fn put(&mut self, name: &str, bytes: Vec<u8>);
    fn finalize(self) -> Result<Vec<u8>, RollPressError>
    where
        Self: Sized;
}

// Fixed entry timestamp, 1980-01-01 00:00:00 in DOS format. Archives must
// be byte-identical across runs on identical input.
const DOS_TIME: u16 = 0;
const DOS_DATE: u16 = 1 << 5 | 1;

const METHOD_STORED: u16 = 0;
const METHOD_DEFLATED: u16 = 8;
// General-purpose flag bit 11: names are UTF-8.
const FLAG_UTF8_NAMES: u16 = 1 << 11;

struct EntryRecord {
    name: Vec<u8>,
    crc: u32,
    method: u16,
    compressed_size: u32,
    uncompressed_size: u32,
    local_offset: u32,
}

/// In-memory ZIP writer: local headers and payloads stream into `body` as
/// entries arrive; the central directory and end record are laid down at
/// finalize. Entries deflate through [`flate`] unless storing is smaller.
#[derive(Default)]
pub struct ZipSink {
    body: Vec<u8>,
    entries: Vec<EntryRecord>,
}

impl ZipSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

impl ArchiveSink for ZipSink {
    fn put(&mut self, name: &str, bytes: Vec<u8>) {
        let crc = crc32(&bytes);
        let uncompressed_size = bytes.len() as u32;
        let deflated = flate::deflate_parallel(&bytes);
        let (method, payload) = if deflated.len() < bytes.len() {
            (METHOD_DEFLATED, deflated)
        } else {
            (METHOD_STORED, bytes)
        };

        let name = name.as_bytes().to_vec();
        let local_offset = self.body.len() as u32;

        // Local file header.
        push_u32(&mut self.body, 0x0403_4B50);
        push_u16(&mut self.body, 20);
        push_u16(&mut self.body, FLAG_UTF8_NAMES);
        push_u16(&mut self.body, method);
        push_u16(&mut self.body, DOS_TIME);
        push_u16(&mut self.body, DOS_DATE);
        push_u32(&mut self.body, crc);
        push_u32(&mut self.body, payload.len() as u32);
        push_u32(&mut self.body, uncompressed_size);
        push_u16(&mut self.body, name.len() as u16);
        push_u16(&mut self.body, 0);
        self.body.extend_from_slice(&name);
        self.body.extend_from_slice(&payload);

        self.entries.push(EntryRecord {
            name,
            crc,
            method,
            compressed_size: payload.len() as u32,
            uncompressed_size,
            local_offset,
        });
    }

    fn finalize(self) -> Result<Vec<u8>, RollPressError> {
        let mut out = self.body;
        let central_offset = out.len() as u32;
        for entry in &self.entries {
            push_u32(&mut out, 0x0201_4B50);
            push_u16(&mut out, 20);
            push_u16(&mut out, 20);
            push_u16(&mut out, FLAG_UTF8_NAMES);
            push_u16(&mut out, entry.method);
            push_u16(&mut out, DOS_TIME);
            push_u16(&mut out, DOS_DATE);
            push_u32(&mut out, entry.crc);
            push_u32(&mut out, entry.compressed_size);
            push_u32(&mut out, entry.uncompressed_size);
            push_u16(&mut out, entry.name.len() as u16);
            push_u16(&mut out, 0);
            push_u16(&mut out, 0);
            push_u16(&mut out, 0);
            push_u16(&mut out, 0);
            push_u32(&mut out, 0);
            push_u32(&mut out, entry.local_offset);
            out.extend_from_slice(&entry.name);
        }
        let central_size = out.len() as u32 - central_offset;
        // End of central directory.
        push_u32(&mut out, 0x0605_4B50);
        push_u16(&mut out, 0);
        push_u16(&mut out, 0);
        push_u16(&mut out, self.entries.len() as u16);
        push_u16(&mut out, self.entries.len() as u16);
        push_u32(&mut out, central_size);
        push_u32(&mut out, central_offset);
        push_u16(&mut out, 0);
        Ok(out)
    }
}

fn push_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

const fn build_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xEDB8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = build_crc_table();

fn crc32(data: &[u8]) -> u32 {
    let mut c = 0xFFFF_FFFFu32;
    for &byte in data {
        c = CRC_TABLE[((c ^ byte as u32) & 0xFF) as usize] ^ (c >> 8);
    }
    c ^ 0xFFFF_FFFF
}
