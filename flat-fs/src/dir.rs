//! # 目录层
//!
//! 扁平根目录的内存表。表项序列本身不落盘，
//! 持久化由会话层借普通文件的增长路径完成：
//! 根目录就是"一个内容为目录项编码的普通文件"。

use alloc::vec::Vec;

use crate::layout::DirEntry;
use crate::{FsError, Result};

/// 挂载后驻留内存的根目录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    entries: Vec<DirEntry>,
}

impl Directory {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 解码目录流。`raw` 的长度由根 inode 的 `size` 界定，
    /// `count` 是其记录的存活项个数；两者与流内容不符即为损坏。
    pub fn decode_stream(raw: &[u8], count: u32) -> Result<Self> {
        let mut entries = Vec::with_capacity(count as usize);
        let mut cursor = 0;
        while cursor < raw.len() {
            let (entry, consumed) = DirEntry::decode(&raw[cursor..])?;
            cursor += consumed;
            entries.push(entry);
        }
        if entries.len() != count as usize {
            return Err(FsError::CorruptDirectory);
        }
        Ok(Self { entries })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let len = self.entries.iter().map(DirEntry::encoded_len).sum();
        let mut raw = Vec::with_capacity(len);
        for entry in &self.entries {
            entry.encode_into(&mut raw);
        }
        raw
    }

    /// 全名精确匹配的线性查找，没有前缀/部分匹配
    pub fn lookup(&self, name: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.inode)
    }

    /// 追加一项；重名（大小写敏感的全等）直接拒绝，表保持原样
    pub fn insert(&mut self, entry: DirEntry) -> Result<()> {
        if self.lookup(&entry.name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// 摘除一项并压实序列（无墓碑）
    pub fn remove(&mut self, name: &str) -> Result<DirEntry> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.name == name)
            .ok_or(FsError::NotFound)?;
        Ok(self.entries.remove(index))
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&DirEntry> {
        self.entries.get(index)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DirEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Directory {
        let mut dir = Directory::empty();
        dir.insert(DirEntry::new(2, "a.txt").unwrap()).unwrap();
        dir.insert(DirEntry::new(3, "b.txt").unwrap()).unwrap();
        dir.insert(DirEntry::new(4, "c.txt").unwrap()).unwrap();
        dir
    }

    #[test]
    fn duplicate_insert_leaves_table_unchanged() {
        let mut dir = sample();
        let before = dir.clone();
        assert_eq!(
            dir.insert(DirEntry::new(9, "b.txt").unwrap()),
            Err(FsError::AlreadyExists)
        );
        assert_eq!(dir, before);
    }

    #[test]
    fn remove_compacts_without_tombstones() {
        let mut dir = sample();
        let removed = dir.remove("b.txt").unwrap();
        assert_eq!(removed.inode, 3);
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get(0).unwrap().name, "a.txt");
        assert_eq!(dir.get(1).unwrap().name, "c.txt");
        assert_eq!(dir.remove("b.txt"), Err(FsError::NotFound));
    }

    #[test]
    fn stream_roundtrip() {
        let dir = sample();
        let raw = dir.serialize();
        assert_eq!(Directory::decode_stream(&raw, 3).unwrap(), dir);
    }

    #[test]
    fn count_mismatch_is_corrupt() {
        let raw = sample().serialize();
        assert_eq!(
            Directory::decode_stream(&raw, 2),
            Err(FsError::CorruptDirectory)
        );
    }

    #[test]
    fn lookup_matches_whole_names_only() {
        let dir = sample();
        assert_eq!(dir.lookup("a.txt"), Some(2));
        assert_eq!(dir.lookup("a.tx"), None);
        assert_eq!(dir.lookup("A.txt"), None);
    }
}
