//! A singly linked list stored in allocator blocks.
//!
//! [`NodeList`] is a thin client of [`ArenaAlloc`]: one `alloc` per
//! insertion, one `free` per deletion, never `resize`. Each node is a
//! 12-byte block:
//!
//! ```text
//! [0..4)   i32 payload, little endian
//! [4..12)  u64 offset of the next node, little endian (u64::MAX = none)
//! ```
//!
//! Allocator errors propagate unchanged, so the list doubles as an
//! end-to-end exercise of allocation, block I/O and strict frees.

use carve_core::{AllocError, ArenaAlloc, BlockAddr};

/// Bytes per list node.
pub const NODE_SIZE: usize = 12;

const NO_NEXT: u64 = u64::MAX;

/// A singly linked list of `i32` whose nodes are arena blocks.
pub struct NodeList<'a, A: ArenaAlloc + ?Sized> {
    alloc: &'a A,
    head: Option<BlockAddr>,
}

impl<'a, A: ArenaAlloc + ?Sized> NodeList<'a, A> {
    /// An empty list drawing nodes from `alloc`.
    pub fn new(alloc: &'a A) -> Self {
        Self { alloc, head: None }
    }

    /// Address of the first node.
    pub fn head(&self) -> Option<BlockAddr> {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Append `value` at the tail.
    pub fn insert(&mut self, value: i32) -> Result<BlockAddr, AllocError> {
        let node = self.new_node(value, None)?;
        match self.last()? {
            None => self.head = Some(node),
            Some(tail) => self.set_next(tail, Some(node))?,
        }
        Ok(node)
    }

    /// Insert `value` directly after `node`.
    pub fn insert_after(&mut self, node: BlockAddr, value: i32) -> Result<BlockAddr, AllocError> {
        let (_, next) = self.read_node(node)?;
        let fresh = self.new_node(value, next)?;
        self.set_next(node, Some(fresh))?;
        Ok(fresh)
    }

    /// Insert `value` directly before `node`.
    ///
    /// Returns `None` without allocating if `node` is not in the list.
    pub fn insert_before(
        &mut self,
        node: BlockAddr,
        value: i32,
    ) -> Result<Option<BlockAddr>, AllocError> {
        if self.head == Some(node) {
            let fresh = self.new_node(value, Some(node))?;
            self.head = Some(fresh);
            return Ok(Some(fresh));
        }
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let (_, next) = self.read_node(current)?;
            if next == Some(node) {
                let fresh = self.new_node(value, Some(node))?;
                self.set_next(current, Some(fresh))?;
                return Ok(Some(fresh));
            }
            cursor = next;
        }
        Ok(None)
    }

    /// Remove the first node holding `value`. Returns whether one was found.
    pub fn delete(&mut self, value: i32) -> Result<bool, AllocError> {
        let mut prev: Option<BlockAddr> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let (v, next) = self.read_node(current)?;
            if v == value {
                match prev {
                    None => self.head = next,
                    Some(p) => self.set_next(p, next)?,
                }
                self.alloc.free(current)?;
                return Ok(true);
            }
            prev = Some(current);
            cursor = next;
        }
        Ok(false)
    }

    /// The first node holding `value`.
    pub fn search(&self, value: i32) -> Result<Option<BlockAddr>, AllocError> {
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let (v, next) = self.read_node(current)?;
            if v == value {
                return Ok(Some(current));
            }
            cursor = next;
        }
        Ok(None)
    }

    /// Payload of `node`.
    pub fn value_at(&self, node: BlockAddr) -> Result<i32, AllocError> {
        Ok(self.read_node(node)?.0)
    }

    /// All payloads, head first.
    pub fn values(&self) -> Result<Vec<i32>, AllocError> {
        let mut out = Vec::new();
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let (v, next) = self.read_node(current)?;
            out.push(v);
            cursor = next;
        }
        Ok(out)
    }

    /// The list as `[1, 2, 3]`.
    pub fn display(&self) -> Result<String, AllocError> {
        Ok(format_values(&self.values()?))
    }

    /// Payloads from `start` (or the head) through `end` inclusive (or the
    /// tail), formatted like [`display`](Self::display).
    pub fn display_range(
        &self,
        start: Option<BlockAddr>,
        end: Option<BlockAddr>,
    ) -> Result<String, AllocError> {
        if self.head.is_none() {
            return Ok(format_values(&[]));
        }
        let mut out = Vec::new();
        let mut cursor = start.or(self.head);
        while let Some(current) = cursor {
            let (v, next) = self.read_node(current)?;
            out.push(v);
            if Some(current) == end {
                break;
            }
            cursor = next;
        }
        Ok(format_values(&out))
    }

    /// Number of nodes.
    pub fn count(&self) -> Result<usize, AllocError> {
        let mut n = 0;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            n += 1;
            cursor = self.read_node(current)?.1;
        }
        Ok(n)
    }

    /// Free every node and empty the list.
    pub fn cleanup(&mut self) -> Result<(), AllocError> {
        while let Some(current) = self.head {
            let (_, next) = self.read_node(current)?;
            self.alloc.free(current)?;
            self.head = next;
        }
        Ok(())
    }

    fn last(&self) -> Result<Option<BlockAddr>, AllocError> {
        let mut cursor = self.head;
        while let Some(current) = cursor {
            match self.read_node(current)?.1 {
                Some(next) => cursor = Some(next),
                None => return Ok(Some(current)),
            }
        }
        Ok(None)
    }

    fn new_node(&self, value: i32, next: Option<BlockAddr>) -> Result<BlockAddr, AllocError> {
        let node = self.alloc.alloc(NODE_SIZE)?;
        let mut bytes = [0u8; NODE_SIZE];
        bytes[..4].copy_from_slice(&value.to_le_bytes());
        bytes[4..].copy_from_slice(&encode_next(next).to_le_bytes());
        if let Err(err) = self.alloc.write(node, 0, &bytes) {
            // Don't leak the block; the write error is the one to report.
            let _ = self.alloc.free(node);
            return Err(err);
        }
        Ok(node)
    }

    fn read_node(&self, node: BlockAddr) -> Result<(i32, Option<BlockAddr>), AllocError> {
        let mut bytes = [0u8; NODE_SIZE];
        self.alloc.read(node, 0, &mut bytes)?;
        let mut value = [0u8; 4];
        value.copy_from_slice(&bytes[..4]);
        let mut next = [0u8; 8];
        next.copy_from_slice(&bytes[4..]);
        Ok((i32::from_le_bytes(value), decode_next(u64::from_le_bytes(next))))
    }

    fn set_next(&self, node: BlockAddr, next: Option<BlockAddr>) -> Result<(), AllocError> {
        self.alloc
            .write(node, 4, &encode_next(next).to_le_bytes())
    }
}

fn encode_next(next: Option<BlockAddr>) -> u64 {
    next.map_or(NO_NEXT, |addr| addr.0 as u64)
}

fn decode_next(raw: u64) -> Option<BlockAddr> {
    (raw != NO_NEXT).then_some(BlockAddr(raw as usize))
}

fn format_values(values: &[i32]) -> String {
    let items: Vec<String> = values.iter().map(i32::to_string).collect();
    format!("[{}]", items.join(", "))
}
