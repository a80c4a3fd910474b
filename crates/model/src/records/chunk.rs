use crate::{pagination::cursor::Cursor, records::record::Record};
use xxhash_rust::xxh3::xxh3_64_with_seed;

#[derive(Debug, Clone)]
pub struct Chunk {
    pub job_id: String,
    pub sequence: u64,
    pub records: Vec<Record>, // already transformed
    pub start: Cursor,        // cursor the chunk was read from (last committed offset)
    pub end: Cursor,          // resume-from cursor once this chunk commits
    pub manifest: Manifest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Manifest {
    pub row_count: usize,
    pub checksum_xxh3: u64, // rolling checksum over canonicalized records
}

pub fn manifest_for(records: &[Record]) -> Manifest {
    let mut h: u64 = 0;
    for r in records {
        h = xxh3_64_with_seed(&r.canonical_bytes(), h);
    }
    Manifest {
        row_count: records.len(),
        checksum_xxh3: h,
    }
}

impl Chunk {
    pub fn new(
        job_id: &str,
        sequence: u64,
        records: Vec<Record>,
        start: Cursor,
        end: Cursor,
    ) -> Self {
        let manifest = manifest_for(&records);
        Chunk {
            job_id: job_id.to_string(),
            sequence,
            records,
            start,
            end,
            manifest,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
