//! On-disk index format: header + component blobs. All integers are
//! little-endian. Each succinct component is self-describing; the header
//! carries a magic/version pair plus a flavor tag so the loader can pick
//! the PML or MS layout before touching the payload.

use byteorder::{LittleEndian as LE, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const INDEX_MAGIC: u32 = 0x52_42_4D_31; // "RBM1"
pub const INDEX_VERSION: u32 = 1;

/// Magic for the standalone random-access (grammar) file.
pub const GRAMMAR_MAGIC: u32 = 0x52_42_4D_47; // "RBMG"

/// Which engine the index file serves.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IndexFlavor {
    /// Pseudo-matching lengths: BWT + thresholds.
    Pml = 0,
    /// Matching statistics: BWT + thresholds + run-boundary SA samples.
    Ms = 1,
}

/// Errors surfaced while loading or writing index files.
///
/// Queries on a successfully loaded index never fail; every variant here
/// is produced at load/store time only.
#[derive(Debug, Error)]
pub enum IndexError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Truncated, mis-sized, or malformed file.
    #[error("invalid index data: {0}")]
    Format(String),
    /// A structural invariant of the loaded data does not hold.
    #[error("invariant violation: {0}")]
    Invariant(String),
    /// Error with the offending file attached.
    #[error("{path}: {source}")]
    File {
        /// Path of the file being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Box<IndexError>,
    },
}

impl IndexError {
    /// Attach the offending filename to an error bubbling out of a loader.
    pub fn at_path(self, path: &Path) -> IndexError {
        IndexError::File {
            path: path.to_path_buf(),
            source: Box::new(self),
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;

/// File header: magic, version, flavor.
pub struct FileHeader {
    pub magic: u32,
    pub version: u32,
    pub flavor: IndexFlavor,
}

impl FileHeader {
    pub fn new(flavor: IndexFlavor) -> Self {
        FileHeader {
            magic: INDEX_MAGIC,
            version: INDEX_VERSION,
            flavor,
        }
    }

    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<usize> {
        w.write_u32::<LE>(self.magic)?;
        w.write_u32::<LE>(self.version)?;
        w.write_u8(self.flavor as u8)?;
        Ok(9)
    }

    pub fn read_from<R: Read>(r: &mut R) -> Result<Self> {
        let magic = r.read_u32::<LE>()?;
        if magic != INDEX_MAGIC {
            return Err(IndexError::Format(format!(
                "bad magic {magic:#010x}, expected {INDEX_MAGIC:#010x}"
            )));
        }
        let version = r.read_u32::<LE>()?;
        if version != INDEX_VERSION {
            return Err(IndexError::Format(format!(
                "unsupported version {version}"
            )));
        }
        let flavor = match r.read_u8()? {
            0 => IndexFlavor::Pml,
            1 => IndexFlavor::Ms,
            t => return Err(IndexError::Format(format!("unknown flavor tag {t}"))),
        };
        Ok(FileHeader {
            magic,
            version,
            flavor,
        })
    }
}

/// Write a `u64` word payload and return the bytes written.
pub(crate) fn write_words<W: Write>(w: &mut W, words: &[u64]) -> Result<usize> {
    w.write_all(bytemuck::cast_slice::<u64, u8>(words))?;
    Ok(words.len() * 8)
}

/// Read exactly `count` little-endian `u64` words.
pub(crate) fn read_words<R: Read>(r: &mut R, count: usize) -> Result<Vec<u64>> {
    let mut words = vec![0u64; count];
    for word in words.iter_mut() {
        *word = r.read_u64::<LE>()?;
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let mut buf = Vec::new();
        let bytes = FileHeader::new(IndexFlavor::Ms).write_to(&mut buf).unwrap();
        assert_eq!(bytes, buf.len());
        let back = FileHeader::read_from(&mut buf.as_slice()).unwrap();
        assert_eq!(back.flavor, IndexFlavor::Ms);
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut buf = Vec::new();
        FileHeader::new(IndexFlavor::Pml).write_to(&mut buf).unwrap();
        buf[0] ^= 0xFF;
        assert!(matches!(
            FileHeader::read_from(&mut buf.as_slice()),
            Err(IndexError::Format(_))
        ));
    }
}
