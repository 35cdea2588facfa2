//! Persisted integer settings
//!
//! Values live in RAM and are mirrored to a single flash record. Record
//! layout, little endian:
//!
//! ```text
//! magic: "PWLK" | version: u8 | count: u8 | reserved: u16
//! key: u32 | value: i32                                  (x count)
//! checksum: u32                                          (CRC-32 of all of the above)
//! ```

use heapless::LinearMap;

/// Most keys that can be persisted
pub const CAPACITY: usize = 8;

/// Size of the largest record, already a multiple of 4
pub const RECORD_LEN: usize = HEADER_LEN + CAPACITY * ENTRY_LEN + 4;

const MAGIC: [u8; 4] = *b"PWLK";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 8;
const ENTRY_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// No room for another key
    Full,
    /// Buffer too small for the record
    BufferTooSmall,
    /// Erased flash or foreign data
    BadMagic,
    UnsupportedVersion(u8),
    BadChecksum,
    Truncated,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    values: LinearMap<u32, i32, CAPACITY>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value; keys never written read as 0
    pub fn read_int(&self, key: u32) -> i32 {
        self.values.get(&key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: u32) -> bool {
        self.values.contains_key(&key)
    }

    /// Store a value, returning whether it differs from what was stored
    pub fn write_int(&mut self, key: u32, value: i32) -> Result<bool, Error> {
        if self.values.get(&key) == Some(&value) {
            return Ok(false);
        }
        self.values.insert(key, value).map_err(|_| Error::Full)?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialize into `buf`, returning the record length
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, Error> {
        let len = HEADER_LEN + self.values.len() * ENTRY_LEN + 4;
        if buf.len() < len {
            return Err(Error::BufferTooSmall);
        }

        buf[..4].copy_from_slice(&MAGIC);
        buf[4] = VERSION;
        buf[5] = self.values.len() as u8;
        buf[6..8].fill(0);

        for (i, (key, value)) in self.values.iter().enumerate() {
            let entry = &mut buf[HEADER_LEN + i * ENTRY_LEN..][..ENTRY_LEN];
            entry[..4].copy_from_slice(&key.to_le_bytes());
            entry[4..].copy_from_slice(&value.to_le_bytes());
        }

        let body = len - 4;
        let checksum = crc32fast::hash(&buf[..body]);
        buf[body..len].copy_from_slice(&checksum.to_le_bytes());

        Ok(len)
    }

    pub fn decode(buf: &[u8]) -> Result<Self, Error> {
        if buf.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }
        if buf[..4] != MAGIC {
            return Err(Error::BadMagic);
        }
        if buf[4] != VERSION {
            return Err(Error::UnsupportedVersion(buf[4]));
        }

        let count = buf[5] as usize;
        if count > CAPACITY {
            return Err(Error::Full);
        }
        let body = HEADER_LEN + count * ENTRY_LEN;
        if buf.len() < body + 4 {
            return Err(Error::Truncated);
        }

        let stored = u32::from_le_bytes([buf[body], buf[body + 1], buf[body + 2], buf[body + 3]]);
        if stored != crc32fast::hash(&buf[..body]) {
            return Err(Error::BadChecksum);
        }

        let mut settings = Self::new();
        for entry in buf[HEADER_LEN..body].chunks_exact(ENTRY_LEN) {
            let key = u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]);
            let value = i32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]);
            settings.write_int(key, value)?;
        }

        Ok(settings)
    }
}
