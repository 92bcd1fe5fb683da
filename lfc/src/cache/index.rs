//! Tag → entry-offset index. Backed by a plain hash map: entries
//! themselves live at stable offsets in [`LocalFileCache`](super::core::LocalFileCache)'s
//! entry arena, so moving this map's internal storage on rehash never
//! invalidates an LRU link (those point at offsets, not addresses).

use std::collections::HashMap;

use super::key::BlockKey;

#[derive(Debug, Default)]
pub struct TagIndex {
    map: HashMap<BlockKey, u32>,
}

impl TagIndex {
    pub fn with_capacity(capacity: usize) -> Self {
        TagIndex {
            map: HashMap::with_capacity(capacity),
        }
    }

    pub fn find(&self, key: &BlockKey) -> Option<u32> {
        self.map.get(key).copied()
    }

    pub fn insert(&mut self, key: BlockKey, offset: u32) {
        self.map.insert(key, offset);
    }

    pub fn remove(&mut self, key: &BlockKey) -> Option<u32> {
        self.map.remove(key)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::key::ForkNumber;

    fn key(chunk_no: u32) -> BlockKey {
        BlockKey {
            spc_node: 1,
            db_node: 1,
            rel_node: 1,
            fork: ForkNumber::Main,
            chunk_no,
        }
    }

    #[test]
    fn insert_find_remove() {
        let mut idx = TagIndex::with_capacity(4);
        assert_eq!(idx.find(&key(0)), None);
        idx.insert(key(0), 3);
        assert_eq!(idx.find(&key(0)), Some(3));
        assert_eq!(idx.remove(&key(0)), Some(3));
        assert_eq!(idx.find(&key(0)), None);
    }
}
