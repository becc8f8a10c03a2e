use alloc::string::String;
use alloc::vec::Vec;

use crate::{FsError, Result, NAME_MAX};

/// 记录头：inode 编号(u32) + 名字长度(u8)
const HEADER_LEN: usize = 5;

/// 文件系统项的元信息。
///
/// 磁盘编码为**长度前缀记录**：`inode(u32 小端) | name_len(u8) | name`，
/// 记录首尾相接，无定宽填充；记录序列的总长由根 inode 的 `size` 字段界定。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub inode: u32,
    pub name: String,
}

impl DirEntry {
    pub fn new(inode: u32, name: &str) -> Result<Self> {
        validate_name(name)?;
        Ok(Self {
            inode,
            name: String::from(name),
        })
    }

    #[inline]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.name.len()
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.inode.to_le_bytes());
        out.push(self.name.len() as u8);
        out.extend_from_slice(self.name.as_bytes());
    }

    /// 从 `raw` 头部解出一条记录，返回记录与其占用的字节数
    pub fn decode(raw: &[u8]) -> Result<(Self, usize)> {
        if raw.len() < HEADER_LEN {
            return Err(FsError::CorruptDirectory);
        }
        let inode = u32::from_le_bytes(raw[0..4].try_into().unwrap());
        let name_len = raw[4] as usize;
        let total = HEADER_LEN + name_len;
        if name_len == 0 || raw.len() < total {
            return Err(FsError::CorruptDirectory);
        }
        let name = core::str::from_utf8(&raw[HEADER_LEN..total])
            .map_err(|_| FsError::CorruptDirectory)?;

        Ok((
            Self {
                inode,
                name: String::from(name),
            },
            total,
        ))
    }
}

/// 名字校验：空名、超长、以及含保留分隔符 `/`、`,` 的名字
/// 都在写入目录之前拒绝。
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > NAME_MAX {
        return Err(FsError::InvalidName);
    }
    if name.contains(['/', ',']) {
        return Err(FsError::InvalidName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_roundtrip() {
        let entry = DirEntry::new(7, "a.txt").unwrap();
        let mut raw = Vec::new();
        entry.encode_into(&mut raw);
        assert_eq!(raw.len(), entry.encoded_len());
        assert_eq!(raw[..4], 7u32.to_le_bytes());
        assert_eq!(raw[4], 5);

        let (decoded, consumed) = DirEntry::decode(&raw).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(consumed, raw.len());
    }

    #[test]
    fn reserved_delimiters_rejected() {
        assert_eq!(DirEntry::new(1, "a/b").unwrap_err(), FsError::InvalidName);
        assert_eq!(DirEntry::new(1, "a,b").unwrap_err(), FsError::InvalidName);
        assert_eq!(DirEntry::new(1, "").unwrap_err(), FsError::InvalidName);
        assert_eq!(
            DirEntry::new(1, core::str::from_utf8(&[b'x'; 256]).unwrap()).unwrap_err(),
            FsError::InvalidName
        );
        assert!(DirEntry::new(1, "a.txt").is_ok());
    }

    #[test]
    fn truncated_records_are_corrupt() {
        let entry = DirEntry::new(3, "name").unwrap();
        let mut raw = Vec::new();
        entry.encode_into(&mut raw);

        assert_eq!(
            DirEntry::decode(&raw[..4]).unwrap_err(),
            FsError::CorruptDirectory
        );
        assert_eq!(
            DirEntry::decode(&raw[..raw.len() - 1]).unwrap_err(),
            FsError::CorruptDirectory
        );
    }
}
