//! The file-info map: small ordered metadata persisted with the file.
//!
//! Keys prefixed `hfile.` are reserved for the engine itself; user entries
//! must not use that prefix. The map is ordered byte-wise so its serialized
//! form is deterministic.

use crate::encoding;
use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// Prefix reserved for keys written by the engine.
pub const RESERVED_PREFIX: &str = "hfile.";

/// Reserved key holding the last key appended to the file.
pub const LASTKEY: &[u8] = b"hfile.LASTKEY";
/// Reserved key holding the average key length as a 4-byte big-endian integer.
pub const AVG_KEY_LEN: &[u8] = b"hfile.AVG_KEY_LEN";
/// Reserved key holding the average value length as a 4-byte big-endian integer.
pub const AVG_VALUE_LEN: &[u8] = b"hfile.AVG_VALUE_LEN";
/// Reserved key holding the comparator identity string.
pub const COMPARATOR: &[u8] = b"hfile.COMPARATOR";

/// Ordered mapping of byte-array keys to byte-array values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl FileInfo {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user entry, rejecting keys with the reserved prefix.
    ///
    /// The prefix check is case-insensitive: `HFILE.x` is as reserved as
    /// `hfile.x`.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if is_reserved_key(key) {
            return Err(Error::ReservedPrefix(String::from_utf8_lossy(key).into_owned()));
        }
        self.map.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    /// Insert an entry without the reserved-prefix check. The writer uses
    /// this for the engine's own keys.
    pub(crate) fn insert(&mut self, key: &[u8], value: &[u8]) {
        self.map.insert(key.to_vec(), value.to_vec());
    }

    /// Look up an entry.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(|v| v.as_slice())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &[u8])> + '_ {
        self.map.iter().map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Serialize the map: a 4-byte big-endian entry count, then each entry as
    /// a length-prefixed key followed by a length-prefixed value.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_u32::<BigEndian>(self.map.len() as u32)?;
        for (key, value) in &self.map {
            encoding::write_byte_array(w, key)?;
            encoding::write_byte_array(w, value)?;
        }
        Ok(())
    }

    /// Deserialize a map written by [`serialize`](FileInfo::serialize).
    pub fn deserialize<R: Read>(r: &mut R) -> Result<Self> {
        let count = r.read_u32::<BigEndian>()?;
        let mut map = BTreeMap::new();
        for _ in 0..count {
            let key = encoding::read_byte_array(r)?;
            let value = encoding::read_byte_array(r)?;
            map.insert(key, value);
        }
        Ok(Self { map })
    }
}

fn is_reserved_key(key: &[u8]) -> bool {
    key.len() >= RESERVED_PREFIX.len()
        && key[..RESERVED_PREFIX.len()].eq_ignore_ascii_case(RESERVED_PREFIX.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_append_and_get() {
        let mut fi = FileInfo::new();
        fi.append(b"owner", b"table-7").unwrap();
        assert_eq!(fi.get(b"owner"), Some(b"table-7" as &[u8]));
        assert_eq!(fi.get(b"missing"), None);
        assert_eq!(fi.len(), 1);
    }

    #[test]
    fn test_reserved_prefix_rejected() {
        let mut fi = FileInfo::new();
        let err = fi.append(b"hfile.custom", b"x").unwrap_err();
        assert!(matches!(err, Error::ReservedPrefix(_)));

        // Case-insensitive.
        let err = fi.append(b"HFile.custom", b"x").unwrap_err();
        assert!(matches!(err, Error::ReservedPrefix(_)));

        // Internal inserts bypass the check.
        fi.insert(LASTKEY, b"zzz");
        assert_eq!(fi.get(LASTKEY), Some(b"zzz" as &[u8]));
    }

    #[test]
    fn test_serialize_round_trip() {
        let mut fi = FileInfo::new();
        fi.insert(AVG_KEY_LEN, &5u32.to_be_bytes());
        fi.insert(LASTKEY, b"last");
        fi.append(b"user-key", b"user-value").unwrap();
        fi.append(b"empty", b"").unwrap();

        let mut buf = Vec::new();
        fi.serialize(&mut buf).unwrap();
        let restored = FileInfo::deserialize(&mut Cursor::new(buf)).unwrap();
        assert_eq!(restored, fi);
    }

    #[test]
    fn test_serialized_form() {
        let mut fi = FileInfo::new();
        fi.append(b"k", b"v").unwrap();

        let mut buf = Vec::new();
        fi.serialize(&mut buf).unwrap();
        assert_eq!(&buf, &[0, 0, 0, 1, 0, 0, 0, 1, b'k', 0, 0, 0, 1, b'v']);
    }

    #[test]
    fn test_entries_iterate_in_key_order() {
        let mut fi = FileInfo::new();
        fi.append(b"b", b"2").unwrap();
        fi.append(b"a", b"1").unwrap();
        fi.append(b"c", b"3").unwrap();

        let keys: Vec<&[u8]> = fi.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![b"a" as &[u8], b"b", b"c"]);
    }
}
