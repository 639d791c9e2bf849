//! Fixed-Huffman DEFLATE, planned in parallel over independent chunks.
//! Emits either a raw deflate stream (archive entries) or a zlib stream
//! (PDF content streams). Output is identical for any thread count because
//! chunk boundaries depend only on input length.

use rayon::prelude::*;

const ADLER_BASE: u32 = 65_521;
const ADLER_CHUNK_BYTES: usize = 1 << 20;

const CHUNK_BYTES: usize = 64 * 1024;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 258;
const MAX_DISTANCE: usize = 32 * 1024;
const MAX_CHAIN_STEPS: usize = 64;
const HASH_BITS: usize = 15;
const HASH_SIZE: usize = 1 << HASH_BITS;

// RFC 1951 length/distance symbol tables.
const LENGTH_BASE: [usize; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

const DIST_BASE: [usize; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

const DIST_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

#[derive(Clone, Copy, Debug)]
enum Token {
    Literal(u8),
    Match { len: u16, dist: u16 },
}

#[derive(Default)]
struct BitWriter {
    out: Vec<u8>,
    bit_buf: u64,
    bit_count: u8,
}

impl BitWriter {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            out: Vec::with_capacity(capacity),
            bit_buf: 0,
            bit_count: 0,
        }
    }

    fn push_bits(&mut self, bits: u32, count: u8) {
        if count == 0 {
            return;
        }
        self.bit_buf |= (bits as u64) << self.bit_count;
        self.bit_count += count;
        while self.bit_count >= 8 {
            self.out.push((self.bit_buf & 0xFF) as u8);
            self.bit_buf >>= 8;
            self.bit_count -= 8;
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.bit_count > 0 {
            self.out.push((self.bit_buf & 0xFF) as u8);
        }
        self.out
    }
}

fn chunk_ranges(total_len: usize, chunk_size: usize) -> Vec<(usize, usize)> {
    if total_len == 0 {
        return vec![(0, 0)];
    }
    let chunk_size = chunk_size.max(1);
    let mut out = Vec::with_capacity(total_len.div_ceil(chunk_size));
    let mut start = 0usize;
    while start < total_len {
        let end = (start + chunk_size).min(total_len);
        out.push((start, end));
        start = end;
    }
    out
}

fn hash3(data: &[u8], i: usize) -> usize {
    let v = ((data[i] as u32) << 16) ^ ((data[i + 1] as u32) << 8) ^ (data[i + 2] as u32);
    (v.wrapping_mul(0x1E35_A7BD) >> (32 - HASH_BITS)) as usize
}

fn common_prefix_len(data: &[u8], a: usize, b: usize, max_len: usize) -> usize {
    let mut l = 0usize;
    while l < max_len && data[a + l] == data[b + l] {
        l += 1;
    }
    l
}

/// Greedy hash-chain LZ77 over one chunk. Matches never cross the chunk
/// boundary, which is what keeps chunks independent and the whole encode
/// parallel.
fn tokenize_chunk(data: &[u8]) -> Vec<Token> {
    let n = data.len();
    if n == 0 {
        return Vec::new();
    }

    let mut head = vec![-1_i32; HASH_SIZE];
    let mut prev = vec![-1_i32; n];
    let mut tokens = Vec::with_capacity(n / 2);

    let mut i = 0usize;
    while i < n {
        if i + MIN_MATCH > n {
            tokens.push(Token::Literal(data[i]));
            i += 1;
            continue;
        }

        let h = hash3(data, i);
        let mut cand = head[h];
        prev[i] = cand;
        head[h] = i as i32;

        let mut best_len = 0usize;
        let mut best_dist = 0usize;
        let mut steps = 0usize;
        while cand >= 0 && steps < MAX_CHAIN_STEPS {
            let c = cand as usize;
            let dist = i - c;
            if dist > MAX_DISTANCE {
                break;
            }
            if data[c] == data[i] && data[c + 1] == data[i + 1] && data[c + 2] == data[i + 2] {
                let len = common_prefix_len(data, c, i, MAX_MATCH.min(n - i));
                if len >= MIN_MATCH && (len > best_len || (len == best_len && dist < best_dist)) {
                    best_len = len;
                    best_dist = dist;
                    if best_len == MAX_MATCH {
                        break;
                    }
                }
            }
            cand = prev[c];
            steps += 1;
        }

        if best_len >= MIN_MATCH {
            tokens.push(Token::Match {
                len: best_len as u16,
                dist: best_dist as u16,
            });
            // Positions inside the match still enter the hash chains.
            let end = (i + best_len).min(n);
            let mut j = i + 1;
            while j < end {
                if j + MIN_MATCH <= n {
                    let hj = hash3(data, j);
                    prev[j] = head[hj];
                    head[hj] = j as i32;
                }
                j += 1;
            }
            i += best_len;
        } else {
            tokens.push(Token::Literal(data[i]));
            i += 1;
        }
    }

    tokens
}

fn reverse_bits(mut value: u16, len: u8) -> u16 {
    let mut out = 0u16;
    for _ in 0..len {
        out = (out << 1) | (value & 1);
        value >>= 1;
    }
    out
}

fn fixed_litlen_code(sym: u16) -> (u16, u8) {
    match sym {
        0..=143 => (0x30 + sym, 8),
        144..=255 => (0x190 + (sym - 144), 9),
        256..=279 => (sym - 256, 7),
        280..=287 => (0x0C0 + (sym - 280), 8),
        _ => (0, 0),
    }
}

fn push_litlen(bw: &mut BitWriter, sym: u16) {
    let (code, len) = fixed_litlen_code(sym);
    bw.push_bits(reverse_bits(code, len) as u32, len);
}

fn symbol_for_length(len: usize) -> (u16, u8, u16) {
    for (idx, (&base, &extra)) in LENGTH_BASE.iter().zip(LENGTH_EXTRA_BITS.iter()).enumerate() {
        let max = if extra == 0 {
            base
        } else {
            base + ((1usize << extra) - 1)
        };
        if len <= max {
            return (257 + idx as u16, extra, (len - base) as u16);
        }
    }
    (285, 0, 0)
}

fn symbol_for_distance(dist: usize) -> (u16, u8, u16) {
    for (idx, (&base, &extra)) in DIST_BASE.iter().zip(DIST_EXTRA_BITS.iter()).enumerate() {
        let max = if extra == 0 {
            base
        } else {
            base + ((1usize << extra) - 1)
        };
        if dist <= max {
            return (idx as u16, extra, (dist - base) as u16);
        }
    }
    (0, 0, 0)
}

fn write_block(bw: &mut BitWriter, tokens: &[Token], final_block: bool) {
    // BFINAL bit then BTYPE=01 (fixed Huffman), LSB-first.
    let header = (final_block as u32) | (0b01 << 1);
    bw.push_bits(header, 3);
    for token in tokens {
        match *token {
            Token::Literal(byte) => push_litlen(bw, byte as u16),
            Token::Match { len, dist } => {
                let (len_sym, len_extra, len_val) = symbol_for_length(len as usize);
                push_litlen(bw, len_sym);
                if len_extra > 0 {
                    bw.push_bits(len_val as u32, len_extra);
                }
                let (dist_sym, dist_extra, dist_val) = symbol_for_distance(dist as usize);
                bw.push_bits(reverse_bits(dist_sym, 5) as u32, 5);
                if dist_extra > 0 {
                    bw.push_bits(dist_val as u32, dist_extra);
                }
            }
        }
    }
    push_litlen(bw, 256);
}

/// Raw RFC 1951 deflate stream, one fixed-Huffman block per chunk.
pub(crate) fn deflate_parallel(data: &[u8]) -> Vec<u8> {
    let ranges = chunk_ranges(data.len(), CHUNK_BYTES);
    let token_runs: Vec<Vec<Token>> = ranges
        .par_iter()
        .map(|(start, end)| tokenize_chunk(&data[*start..*end]))
        .collect();

    let mut bw = BitWriter::with_capacity(2 + data.len() / 2 + 64);
    let last = token_runs.len().saturating_sub(1);
    for (idx, tokens) in token_runs.iter().enumerate() {
        write_block(&mut bw, tokens, idx == last);
    }
    bw.finish()
}

/// RFC 1950 zlib stream: header, raw deflate body, big-endian Adler-32.
pub(crate) fn zlib_deflate_parallel(data: &[u8]) -> Vec<u8> {
    let body = deflate_parallel(data);
    let mut out = Vec::with_capacity(body.len() + 6);
    // CMF 0x78 (deflate, 32K window), FLG 0x01 (FCHECK valid).
    out.extend_from_slice(&[0x78, 0x01]);
    out.extend_from_slice(&body);
    out.extend_from_slice(&adler32_parallel(data).to_be_bytes());
    out
}

#[derive(Clone, Copy, Debug)]
struct AdlerSum {
    a: u32,
    b: u32,
    len: usize,
}

impl AdlerSum {
    fn identity() -> Self {
        Self { a: 1, b: 0, len: 0 }
    }

    fn for_bytes(data: &[u8]) -> Self {
        let mut a: u32 = 1;
        let mut b: u32 = 0;
        for &byte in data {
            a += byte as u32;
            if a >= ADLER_BASE {
                a -= ADLER_BASE;
            }
            b += a;
            b %= ADLER_BASE;
        }
        Self {
            a,
            b,
            len: data.len(),
        }
    }

    // zlib's adler32_combine: append rhs after self.
    fn combine(self, rhs: Self) -> Self {
        if self.len == 0 {
            return rhs;
        }
        if rhs.len == 0 {
            return self;
        }
        let a = (self.a + rhs.a + ADLER_BASE - 1) % ADLER_BASE;
        let b = (self.b as u64
            + rhs.b as u64
            + ((rhs.len as u64 % ADLER_BASE as u64) * ((self.a + ADLER_BASE - 1) as u64)))
            % ADLER_BASE as u64;
        Self {
            a,
            b: b as u32,
            len: self.len + rhs.len,
        }
    }

    fn value(self) -> u32 {
        (self.b << 16) | self.a
    }
}

fn adler32_parallel(data: &[u8]) -> u32 {
    let partials: Vec<AdlerSum> = chunk_ranges(data.len(), ADLER_CHUNK_BYTES)
        .par_iter()
        .map(|(start, end)| AdlerSum::for_bytes(&data[*start..*end]))
        .collect();
    partials
        .into_iter()
        .fold(AdlerSum::identity(), AdlerSum::combine)
        .value()
}
