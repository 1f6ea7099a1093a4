//! Shape keys.
//!
//! A [`Key`] owns an ordered list of [`KeyBlock`]s, each an alternate
//! position for every vertex. In a relative key every block stores absolute
//! coordinates but is interpreted as an offset from the block named by its
//! `relative` field (normally the reference key, "Basis").
//!
//! Blocks carry a uid that is stable for the lifetime of the key. The
//! editable graph stores one shape layer per block tagged with the same uid,
//! which is how the two are paired again when converting back: list order
//! is never used for matching.

use nalgebra::Point3;

/// How the blocks of a key are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyType {
    /// Absolute keys evaluated along a timeline.
    Normal,
    /// Each block is relative to another block.
    #[default]
    Relative,
}

/// One shape.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyBlock {
    /// Display name.
    pub name: String,
    uid: u32,
    /// Index of the block this one is relative to.
    pub relative: usize,
    /// Influence of the block.
    pub value: f32,
    /// One coordinate per vertex.
    pub data: Vec<Point3<f32>>,
}

impl KeyBlock {
    /// The block's stable identifier.
    #[inline]
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Number of stored coordinates.
    #[inline]
    pub fn totelem(&self) -> usize {
        self.data.len()
    }
}

/// A set of shape key blocks belonging to one mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Key {
    /// Interpretation of the blocks.
    pub kind: KeyType,
    blocks: Vec<KeyBlock>,
    refkey: Option<usize>,
    uidgen: u32,
}

impl Default for Key {
    fn default() -> Self {
        Self::new(KeyType::default())
    }
}

impl Key {
    /// Create an empty key.
    pub fn new(kind: KeyType) -> Self {
        Self {
            kind,
            blocks: Vec::new(),
            refkey: None,
            uidgen: 1,
        }
    }

    /// Create an empty relative key.
    pub fn relative() -> Self {
        Self::new(KeyType::Relative)
    }

    /// All blocks in order.
    #[inline]
    pub fn blocks(&self) -> &[KeyBlock] {
        &self.blocks
    }

    /// Mutable access to the blocks. Blocks cannot be added or removed
    /// through this slice, so uids stay unique.
    #[inline]
    pub fn blocks_mut(&mut self) -> &mut [KeyBlock] {
        &mut self.blocks
    }

    /// Number of blocks.
    #[inline]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the key has no blocks.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Index of the reference ("Basis") block.
    #[inline]
    pub fn refkey(&self) -> Option<usize> {
        self.refkey
    }

    /// Make another block the reference block.
    pub fn set_refkey(&mut self, index: usize) {
        debug_assert!(index < self.blocks.len());
        self.refkey = Some(index);
    }

    /// Add an empty block with a fresh uid. The first block added becomes
    /// the reference block; every block starts relative to it.
    pub fn add_block(&mut self, name: &str) -> usize {
        let uid = self.uidgen;
        self.push_block(name, uid)
    }

    /// Add an empty block that reuses an existing uid, as when a shape layer
    /// created during editing has no block yet.
    pub fn add_block_with_uid(&mut self, name: &str, uid: u32) -> usize {
        if self.block_index_by_uid(uid).is_some() {
            tracing::warn!(uid, name, "shape key uid already in use, assigning a new one");
            return self.add_block(name);
        }
        self.push_block(name, uid)
    }

    fn push_block(&mut self, name: &str, uid: u32) -> usize {
        let index = self.blocks.len();
        let relative = self.refkey.unwrap_or(0);
        self.blocks.push(KeyBlock {
            name: name.to_owned(),
            uid,
            relative,
            value: 0.0,
            data: Vec::new(),
        });
        self.uidgen = self.uidgen.max(uid.saturating_add(1));
        if self.refkey.is_none() {
            self.refkey = Some(index);
        }
        index
    }

    /// Find a block by uid.
    pub fn block_index_by_uid(&self, uid: u32) -> Option<usize> {
        self.blocks.iter().position(|b| b.uid == uid)
    }

    /// Find a block by name.
    pub fn block_index_by_name(&self, name: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.name == name)
    }

    /// Whether any other block is relative to block `index`.
    ///
    /// Always `false` for non-relative keys.
    pub fn is_basis(&self, index: usize) -> bool {
        self.kind == KeyType::Relative
            && self
                .blocks
                .iter()
                .enumerate()
                .any(|(i, b)| i != index && b.relative == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uids_are_unique() {
        let mut key = Key::relative();
        let a = key.add_block("Basis");
        let b = key.add_block("Key 1");
        assert_ne!(key.blocks()[a].uid(), key.blocks()[b].uid());
        assert_eq!(key.block_index_by_uid(key.blocks()[b].uid()), Some(b));
    }

    #[test]
    fn test_add_block_with_uid_advances_generator() {
        let mut key = Key::relative();
        key.add_block_with_uid("Imported", 40);
        let next = key.add_block("Next");
        assert_eq!(key.blocks()[next].uid(), 41);

        // A colliding uid is replaced.
        let dup = key.add_block_with_uid("Dup", 40);
        assert_eq!(key.blocks()[dup].uid(), 42);
    }

    #[test]
    fn test_is_basis() {
        let mut key = Key::relative();
        key.add_block("Basis");
        assert!(!key.is_basis(0));

        key.add_block("Key 1");
        assert!(key.is_basis(0));
        assert!(!key.is_basis(1));

        key.blocks_mut()[1].relative = 1;
        assert!(!key.is_basis(0));

        let mut absolute = Key::new(KeyType::Normal);
        absolute.add_block("A");
        absolute.add_block("B");
        assert!(!absolute.is_basis(0));
    }
}
