//! Name dictionaries.
//!
//! BCH stores object names as a Patricia trie: a root node followed by one
//! node per entry, each `(reference bit: u32, left: u16, right: u16, name: u32)`.
//! Entry `i` carries the name of object `i`, so a linear read is enough.

use crate::error::Result;
use crate::utils::ByteReader;

/// One trie node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameNode {
    pub reference_bit: u32,
    pub left: u16,
    pub right: u16,
    pub name: String,
}

fn read_node(reader: &mut ByteReader<'_>) -> Result<NameNode> {
    Ok(NameNode {
        reference_bit: reader.read_u32()?,
        left: reader.read_u16()?,
        right: reader.read_u16()?,
        name: reader.read_string_ptr()?,
    })
}

/// Read `entries` nodes of the trie at `offset`, skipping the root.
///
/// # Errors
/// Returns [`crate::Error::UnexpectedEof`] if the trie is truncated.
pub fn read_name_trie(data: &[u8], offset: usize, entries: usize) -> Result<Vec<NameNode>> {
    if offset == 0 || entries == 0 {
        return Ok(Vec::new());
    }
    let mut reader = ByteReader::at(data, offset);
    read_node(&mut reader)?;
    (0..entries).map(|_| read_node(&mut reader)).collect()
}

/// Names of the trie's entries, in entry order.
///
/// # Errors
/// Returns [`crate::Error::UnexpectedEof`] if the trie is truncated.
pub fn read_names(data: &[u8], offset: usize, entries: usize) -> Result<Vec<String>> {
    Ok(read_name_trie(data, offset, entries)?
        .into_iter()
        .map(|node| node.name)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_entry_names_after_root() {
        let mut data = vec![0u8; 4];
        let names_at = 4 + 12 * 3;
        for (i, name_offset) in [0u32, names_at, names_at + 5].iter().enumerate() {
            data.extend_from_slice(&(i as u32).to_le_bytes());
            data.extend_from_slice(&0u16.to_le_bytes());
            data.extend_from_slice(&1u16.to_le_bytes());
            data.extend_from_slice(&name_offset.to_le_bytes());
        }
        data.extend_from_slice(b"body\0eyes\0");

        assert_eq!(read_names(&data, 4, 2).unwrap(), vec!["body", "eyes"]);
        assert!(read_names(&data, 0, 2).unwrap().is_empty());
    }
}
