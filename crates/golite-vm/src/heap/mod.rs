//! The managed heap (spec §3, §4.1): a fixed-node, word-addressed memory
//! with tagged-pointer objects, a free-list allocator, mark-and-sweep, and
//! doubling growth.
//!
//! Modeled on the teacher's `vm/gc/{heap,header,collector,roots}.rs` split,
//! adapted from a generic-Rust-type, `TypeId`-tagged allocator to the exact
//! byte-precise, word-addressed node layout spec.md §3.1 mandates.

mod header;
mod roots;
mod string_pool;
mod tag;
mod value;

pub use roots::{NoRoots, RootSource};
pub use tag::Tag;
pub use value::Value;

use crate::error::{VmError, VmResult};
use header::Header;
use string_pool::StringPool;

/// A word-address into the heap's backing buffer. Always a multiple of
/// [`NODE_WORDS`].
pub type Address = u32;

/// Words per node: a 1-word header, 8 child slots, 1 extension-link word.
pub const NODE_WORDS: u32 = 10;
/// Child slots that fit directly in one node before an extension is needed.
pub const MAX_CHILDREN: u32 = 8;

const SINGLETON_COUNT: u32 = 5;

pub const FALSE_ADDR: Address = 0 * NODE_WORDS;
pub const TRUE_ADDR: Address = 1 * NODE_WORDS;
pub const NULL_ADDR: Address = 2 * NODE_WORDS;
pub const UNDEFINED_ADDR: Address = 3 * NODE_WORDS;
pub const UNALLOCATED_ADDR: Address = 4 * NODE_WORDS;

/// Terminator for the free list's internal next-pointer chain. Distinct from
/// [`UNALLOCATED_ADDR`]: this never appears as a live object's address, it
/// only ever lives in a `FREE` node's metadata word.
const FREE_LIST_END: u32 = u32::MAX;

#[derive(Debug)]
pub struct Heap {
    words: Vec<u64>,
    free_head: Address,
    string_pool: StringPool,
    /// Addresses protected across a multi-step construction that might
    /// trigger GC partway through (spec §4.1 "Extension strategy",
    /// Design Notes "Working-set roots").
    working_set: Vec<Address>,
    debug: bool,
}

impl Heap {
    pub fn new(initial_words: usize, debug: bool) -> Self {
        let floor = (SINGLETON_COUNT * NODE_WORDS) as usize;
        let requested = initial_words.max(floor);
        let capacity_words = requested.div_ceil(NODE_WORDS as usize) * NODE_WORDS as usize;

        let mut heap = Heap {
            words: vec![0u64; capacity_words],
            free_head: FREE_LIST_END,
            string_pool: StringPool::default(),
            working_set: Vec::new(),
            debug,
        };

        heap.init_singleton(FALSE_ADDR, Tag::False);
        heap.init_singleton(TRUE_ADDR, Tag::True);
        heap.init_singleton(NULL_ADDR, Tag::Null);
        heap.init_singleton(UNDEFINED_ADDR, Tag::Undefined);
        heap.init_singleton(UNALLOCATED_ADDR, Tag::Unallocated);

        let total_nodes = capacity_words / NODE_WORDS as usize;
        heap.extend_free_list(SINGLETON_COUNT as usize, total_nodes);
        heap
    }

    fn init_singleton(&mut self, addr: Address, tag: Tag) {
        self.set_header(addr, Header::new(tag, 0, 0));
        for slot in 0..MAX_CHILDREN {
            self.set_word(addr + 1 + slot, 0);
        }
        self.set_extension(addr, UNALLOCATED_ADDR);
    }

    /// Appends nodes `[from_node, to_node)` to the front of the free list.
    fn extend_free_list(&mut self, from_node: usize, to_node: usize) {
        for node_idx in (from_node..to_node).rev() {
            let addr = (node_idx * NODE_WORDS as usize) as Address;
            self.set_header(addr, Header::new(Tag::Free, 0, self.free_head));
            self.free_head = addr;
        }
    }

    fn node_count(&self) -> usize {
        self.words.len() / NODE_WORDS as usize
    }

    // --- raw word/header access -------------------------------------------------

    fn word(&self, addr: Address) -> u64 {
        self.words[addr as usize]
    }

    fn set_word(&mut self, addr: Address, value: u64) {
        self.words[addr as usize] = value;
    }

    fn header(&self, addr: Address) -> Header {
        Header::from_word(self.word(addr))
    }

    fn set_header(&mut self, addr: Address, header: Header) {
        self.set_word(addr, header.word());
    }

    fn extension(&self, addr: Address) -> Address {
        self.word(addr + MAX_CHILDREN + 1) as Address
    }

    fn set_extension(&mut self, addr: Address, ext: Address) {
        self.set_word(addr + MAX_CHILDREN + 1, ext as u64);
    }

    pub fn tag_of(&self, addr: Address) -> Tag {
        self.header(addr).tag()
    }

    fn check_tag(&self, addr: Address, expected: Tag) -> VmResult<()> {
        let found = self.tag_of(addr);
        if found as u8 == expected as u8 {
            Ok(())
        } else {
            Err(VmError::TypeTagMismatch {
                address: addr,
                expected: expected.name(),
                found: found.name(),
            })
        }
    }

    /// Walks the extension chain `chain_index` hops from `head`.
    fn node_at_chain_index(&self, head: Address, chain_index: u32) -> Address {
        let mut node = head;
        for _ in 0..chain_index {
            node = self.extension(node);
        }
        node
    }

    /// Reads logical child `i` of `head` as a raw word, per spec §4.1
    /// "Accessing indexed children": `(chain_index, slot) = (i/8, i%8)`.
    fn read_indexed_raw(&self, head: Address, i: u32) -> u64 {
        let node = self.node_at_chain_index(head, i / MAX_CHILDREN);
        self.word(node + 1 + i % MAX_CHILDREN)
    }

    fn write_indexed_raw(&mut self, head: Address, i: u32, value: u64) {
        let node = self.node_at_chain_index(head, i / MAX_CHILDREN);
        self.set_word(node + 1 + i % MAX_CHILDREN, value);
    }

    fn read_indexed_addr(&self, head: Address, i: u32) -> Address {
        self.read_indexed_raw(head, i) as Address
    }

    // --- allocation ---------------------------------------------------------

    /// Pops one node off the free list, or `None` if it's empty. Never
    /// triggers GC or growth — that orchestration lives in [`Self::allocate`].
    fn allocate_raw(&mut self) -> Option<Address> {
        if self.free_head == FREE_LIST_END {
            return None;
        }
        let addr = self.free_head;
        self.free_head = self.header(addr).metadata();
        Some(addr)
    }

    fn doubled_capacity(&self) -> usize {
        self.words.len() * 2
    }

    fn grow(&mut self) {
        let old_nodes = self.node_count();
        let new_size = self.doubled_capacity();
        self.words.resize(new_size, 0);
        let new_nodes = self.node_count();
        self.extend_free_list(old_nodes, new_nodes);
        if self.debug {
            eprintln!("[gc] heap grown to {new_nodes} nodes ({new_size} words)");
        }
    }

    /// General allocation entry point (spec §4.1). Builds an extension chain
    /// when `child_count` exceeds [`MAX_CHILDREN`]. On a free-list miss,
    /// collects, then doubles the backing buffer if collection didn't help.
    pub fn allocate(
        &mut self,
        tag: Tag,
        child_count: u32,
        roots: &dyn RootSource,
    ) -> VmResult<Address> {
        let head = self.allocate_node_chain(tag, child_count, roots)?;
        Ok(head)
    }

    fn allocate_node_chain(
        &mut self,
        tag: Tag,
        child_count: u32,
        roots: &dyn RootSource,
    ) -> VmResult<Address> {
        let head = self.allocate_one_node(roots)?;
        self.set_header(head, Header::new(tag, child_count.min(u16::MAX as u32) as u16, 0));
        for slot in 0..MAX_CHILDREN {
            self.set_word(head + 1 + slot, UNALLOCATED_ADDR as u64);
        }
        self.set_extension(head, UNALLOCATED_ADDR);

        if child_count > MAX_CHILDREN {
            self.working_set.push(head);
            let mut remaining = child_count - MAX_CHILDREN;
            let mut tail = head;
            while remaining > 0 {
                let cont = match self.allocate_one_node(roots) {
                    Ok(addr) => addr,
                    Err(e) => {
                        self.working_set.pop();
                        return Err(e);
                    }
                };
                self.set_header(cont, Header::new(Tag::Extension, 0, 0));
                for slot in 0..MAX_CHILDREN {
                    self.set_word(cont + 1 + slot, UNALLOCATED_ADDR as u64);
                }
                self.set_extension(cont, UNALLOCATED_ADDR);
                self.set_extension(tail, cont);
                self.working_set.push(cont);
                tail = cont;
                remaining = remaining.saturating_sub(MAX_CHILDREN);
            }
            // Pop every continuation node (and the head) we protected above.
            let protected = 1 + ((child_count - MAX_CHILDREN).div_ceil(MAX_CHILDREN)) as usize;
            let new_len = self.working_set.len() - protected;
            self.working_set.truncate(new_len);
        }
        Ok(head)
    }

    fn allocate_one_node(&mut self, roots: &dyn RootSource) -> VmResult<Address> {
        if let Some(addr) = self.allocate_raw() {
            return Ok(addr);
        }
        self.collect(roots);
        if let Some(addr) = self.allocate_raw() {
            return Ok(addr);
        }
        let before = self.node_count();
        self.grow();
        if self.node_count() == before {
            return Err(VmError::OutOfMemory);
        }
        self.allocate_raw().ok_or(VmError::OutOfMemory)
    }

    // --- typed allocators (spec §4.1) ---------------------------------------

    pub fn allocate_number(&mut self, n: f64, roots: &dyn RootSource) -> VmResult<Address> {
        let addr = self.allocate(Tag::Number, 1, roots)?;
        self.set_word(addr + 1, n.to_bits());
        Ok(addr)
    }

    pub fn read_number(&self, addr: Address) -> VmResult<f64> {
        self.check_tag(addr, Tag::Number)?;
        Ok(f64::from_bits(self.word(addr + 1)))
    }

    pub fn allocate_string(&mut self, text: &str, roots: &dyn RootSource) -> VmResult<Address> {
        let hash = string_pool::djb2(text);
        if let Some(addr) = self.string_pool.lookup(hash, text) {
            return Ok(addr);
        }
        let addr = self.allocate(Tag::String, 1, roots)?;
        self.set_word(addr + 1, hash as u64);
        self.string_pool.insert(hash, addr, text.to_string());
        Ok(addr)
    }

    pub fn read_string(&self, addr: Address) -> VmResult<&str> {
        self.check_tag(addr, Tag::String)?;
        let hash = self.word(addr + 1) as u32;
        self.string_pool
            .text_for(hash, addr)
            .ok_or(VmError::TypeTagMismatch {
                address: addr,
                expected: "STRING (interned)",
                found: "dangling string entry",
            })
    }

    pub fn allocate_channel(&mut self, roots: &dyn RootSource) -> VmResult<Address> {
        let addr = self.allocate(Tag::Chan, 2, roots)?;
        self.set_word(addr + 1, FALSE_ADDR as u64);
        self.set_word(addr + 2, UNALLOCATED_ADDR as u64);
        Ok(addr)
    }

    pub fn channel_is_empty(&self, addr: Address) -> VmResult<bool> {
        self.check_tag(addr, Tag::Chan)?;
        Ok(self.word(addr + 2) as Address == UNALLOCATED_ADDR)
    }

    pub fn channel_is_full(&self, addr: Address) -> VmResult<bool> {
        Ok(!self.channel_is_empty(addr)?)
    }

    pub fn channel_push_item(&mut self, addr: Address, item: Address) -> VmResult<()> {
        self.check_tag(addr, Tag::Chan)?;
        self.set_word(addr + 1, TRUE_ADDR as u64);
        self.set_word(addr + 2, item as u64);
        Ok(())
    }

    pub fn channel_pop_item(&mut self, addr: Address) -> VmResult<Address> {
        self.check_tag(addr, Tag::Chan)?;
        let item = self.word(addr + 2) as Address;
        self.set_word(addr + 1, FALSE_ADDR as u64);
        self.set_word(addr + 2, UNALLOCATED_ADDR as u64);
        Ok(item)
    }

    pub fn allocate_array(&mut self, len: u32, roots: &dyn RootSource) -> VmResult<Address> {
        let addr = self.allocate(Tag::Array, len, roots)?;
        let mut header = self.header(addr);
        header.set_metadata(len);
        self.set_header(addr, header);
        Ok(addr)
    }

    pub fn array_len(&self, addr: Address) -> VmResult<u32> {
        self.check_tag(addr, Tag::Array)?;
        Ok(self.header(addr).metadata())
    }

    pub fn array_get(&self, addr: Address, index: i64) -> VmResult<Address> {
        let len = self.array_len(addr)?;
        self.bounds_check(index, len)?;
        Ok(self.read_indexed_addr(addr, index as u32))
    }

    pub fn array_set(&mut self, addr: Address, index: i64, value: Address) -> VmResult<()> {
        let len = self.array_len(addr)?;
        self.bounds_check(index, len)?;
        self.write_indexed_raw(addr, index as u32, value as u64);
        Ok(())
    }

    fn bounds_check(&self, index: i64, len: u32) -> VmResult<()> {
        if index < 0 || index as u64 >= len as u64 {
            Err(VmError::IndexOutOfRange { index, length: len })
        } else {
            Ok(())
        }
    }

    pub fn allocate_closure(
        &mut self,
        arity: u16,
        entry_pc: u16,
        env: Address,
        roots: &dyn RootSource,
    ) -> VmResult<Address> {
        let addr = self.allocate(Tag::Closure, 1, roots)?;
        let metadata = ((arity as u32) << 16) | entry_pc as u32;
        let mut header = self.header(addr);
        header.set_metadata(metadata);
        self.set_header(addr, header);
        self.set_word(addr + 1, env as u64);
        Ok(addr)
    }

    pub fn closure_arity(&self, addr: Address) -> VmResult<u16> {
        self.check_tag(addr, Tag::Closure)?;
        Ok((self.header(addr).metadata() >> 16) as u16)
    }

    pub fn closure_entry(&self, addr: Address) -> VmResult<u16> {
        self.check_tag(addr, Tag::Closure)?;
        Ok(self.header(addr).metadata() as u16)
    }

    pub fn closure_env(&self, addr: Address) -> VmResult<Address> {
        self.check_tag(addr, Tag::Closure)?;
        Ok(self.word(addr + 1) as Address)
    }

    pub fn allocate_builtin(&mut self, id: u32, roots: &dyn RootSource) -> VmResult<Address> {
        let addr = self.allocate(Tag::Builtin, 0, roots)?;
        let mut header = self.header(addr);
        header.set_metadata(id);
        self.set_header(addr, header);
        Ok(addr)
    }

    pub fn builtin_id(&self, addr: Address) -> VmResult<u32> {
        self.check_tag(addr, Tag::Builtin)?;
        Ok(self.header(addr).metadata())
    }

    pub fn allocate_frame(&mut self, n: u32, roots: &dyn RootSource) -> VmResult<Address> {
        self.allocate(Tag::Frame, n, roots)
    }

    pub fn frame_len(&self, addr: Address) -> VmResult<u32> {
        self.check_tag(addr, Tag::Frame)?;
        Ok(self.header(addr).child_count() as u32)
    }

    pub fn frame_get(&self, addr: Address, slot: u32) -> VmResult<Address> {
        self.check_tag(addr, Tag::Frame)?;
        Ok(self.read_indexed_addr(addr, slot))
    }

    pub fn frame_set(&mut self, addr: Address, slot: u32, value: Address) -> VmResult<()> {
        self.check_tag(addr, Tag::Frame)?;
        self.write_indexed_raw(addr, slot, value as u64);
        Ok(())
    }

    pub fn allocate_environment(
        &mut self,
        n_frames: u32,
        roots: &dyn RootSource,
    ) -> VmResult<Address> {
        let addr = self.allocate(Tag::Environment, n_frames, roots)?;
        let mut header = self.header(addr);
        header.set_metadata(n_frames);
        self.set_header(addr, header);
        Ok(addr)
    }

    pub fn env_frame_count(&self, addr: Address) -> VmResult<u32> {
        self.check_tag(addr, Tag::Environment)?;
        Ok(self.header(addr).metadata())
    }

    pub fn env_frame_at(&self, addr: Address, depth: u32) -> VmResult<Address> {
        let count = self.env_frame_count(addr)?;
        if depth >= count {
            return Err(VmError::IndexOutOfRange {
                index: depth as i64,
                length: count,
            });
        }
        Ok(self.read_indexed_addr(addr, depth))
    }

    /// Creates a new environment one frame longer than `env`, with `frame`
    /// appended at the end. `env` itself is left unchanged (spec §4.1
    /// "Environment extension").
    pub fn extend_environment(
        &mut self,
        env: Address,
        frame: Address,
        roots: &dyn RootSource,
    ) -> VmResult<Address> {
        let old_len = self.env_frame_count(env)?;
        self.working_set.push(frame);
        let new_env = match self.allocate_environment(old_len + 1, roots) {
            Ok(addr) => addr,
            Err(e) => {
                self.working_set.pop();
                return Err(e);
            }
        };
        self.working_set.pop();
        for i in 0..old_len {
            let f = self.read_indexed_addr(env, i);
            self.write_indexed_raw(new_env, i, f as u64);
        }
        self.write_indexed_raw(new_env, old_len, frame as u64);
        Ok(new_env)
    }

    pub fn allocate_block_frame(
        &mut self,
        env: Address,
        roots: &dyn RootSource,
    ) -> VmResult<Address> {
        let addr = self.allocate(Tag::BlockFrame, 1, roots)?;
        self.set_word(addr + 1, env as u64);
        Ok(addr)
    }

    pub fn block_frame_env(&self, addr: Address) -> VmResult<Address> {
        self.check_tag(addr, Tag::BlockFrame)?;
        Ok(self.word(addr + 1) as Address)
    }

    pub fn allocate_call_frame(
        &mut self,
        env: Address,
        return_pc: u32,
        roots: &dyn RootSource,
    ) -> VmResult<Address> {
        let addr = self.allocate(Tag::CallFrame, 2, roots)?;
        self.set_word(addr + 1, env as u64);
        self.set_word(addr + 2, return_pc as u64);
        Ok(addr)
    }

    pub fn call_frame_env(&self, addr: Address) -> VmResult<Address> {
        self.check_tag(addr, Tag::CallFrame)?;
        Ok(self.word(addr + 1) as Address)
    }

    pub fn call_frame_return_pc(&self, addr: Address) -> VmResult<u32> {
        self.check_tag(addr, Tag::CallFrame)?;
        Ok(self.word(addr + 2) as u32)
    }

    pub fn allocate_wait_send(&mut self, chan: Address, roots: &dyn RootSource) -> VmResult<Address> {
        let addr = self.allocate(Tag::WaitSend, 1, roots)?;
        self.set_word(addr + 1, chan as u64);
        Ok(addr)
    }

    pub fn allocate_wait_receive(
        &mut self,
        chan: Address,
        roots: &dyn RootSource,
    ) -> VmResult<Address> {
        let addr = self.allocate(Tag::WaitReceive, 1, roots)?;
        self.set_word(addr + 1, chan as u64);
        Ok(addr)
    }

    pub fn wait_token_channel(&self, addr: Address) -> VmResult<Address> {
        let tag = self.tag_of(addr);
        if tag != Tag::WaitSend && tag != Tag::WaitReceive {
            return Err(VmError::TypeTagMismatch {
                address: addr,
                expected: "WAIT_SEND or WAIT_RECEIVE",
                found: tag.name(),
            });
        }
        Ok(self.word(addr + 1) as Address)
    }

    // --- boxing / unboxing (spec §4.1) --------------------------------------

    pub fn value_to_address(&mut self, value: &Value, roots: &dyn RootSource) -> VmResult<Address> {
        Ok(match value {
            Value::Number(n) => self.allocate_number(*n, roots)?,
            Value::Bool(true) => TRUE_ADDR,
            Value::Bool(false) => FALSE_ADDR,
            Value::Null => NULL_ADDR,
            Value::Undefined => UNDEFINED_ADDR,
            Value::Str(s) => self.allocate_string(s, roots)?,
        })
    }

    pub fn address_to_value(&self, addr: Address) -> VmResult<Value> {
        Ok(match self.tag_of(addr) {
            Tag::False => Value::Bool(false),
            Tag::True => Value::Bool(true),
            Tag::Null => Value::Null,
            Tag::Undefined => Value::Undefined,
            Tag::Number => Value::Number(self.read_number(addr)?),
            Tag::String => Value::Str(self.read_string(addr)?.to_string()),
            other => {
                return Err(VmError::OperandTypeError(format!(
                    "address {addr} holds a {} value, not a boxable primitive",
                    other.name()
                )))
            }
        })
    }

    pub fn is_truthy_jump(&self, addr: Address) -> bool {
        addr == FALSE_ADDR
    }

    // --- mark-and-sweep (spec §4.1) ------------------------------------------

    pub fn collect(&mut self, roots: &dyn RootSource) {
        let marked_before = self.node_count() - self.free_list_len();
        self.mark(roots);
        let freed = self.sweep();
        if self.debug {
            eprintln!(
                "[gc] collect: {marked_before} live before, {freed} nodes freed, {} nodes total",
                self.node_count()
            );
        }
    }

    fn free_list_len(&self) -> usize {
        let mut count = 0;
        let mut node = self.free_head;
        while node != FREE_LIST_END {
            count += 1;
            node = self.header(node).metadata();
        }
        count
    }

    fn mark(&mut self, roots: &dyn RootSource) {
        let mut stack = vec![FALSE_ADDR, TRUE_ADDR, NULL_ADDR, UNDEFINED_ADDR, UNALLOCATED_ADDR];
        stack.extend_from_slice(&self.working_set);
        roots.collect_roots(&mut stack);

        while let Some(addr) = stack.pop() {
            if self.tag_of(addr) == Tag::Free {
                continue; // invariant 1: should never be reachable
            }
            let mut header = self.header(addr);
            if header.is_marked() {
                continue;
            }
            header.set_marked(true);
            self.set_header(addr, header);

            match header.tag() {
                Tag::Chan | Tag::WaitSend | Tag::WaitReceive => {
                    if header.tag() == Tag::Chan {
                        stack.push(self.word(addr + 1) as Address);
                        stack.push(self.word(addr + 2) as Address);
                    } else {
                        stack.push(self.word(addr + 1) as Address);
                    }
                }
                Tag::Closure | Tag::BlockFrame => stack.push(self.word(addr + 1) as Address),
                Tag::CallFrame => stack.push(self.word(addr + 1) as Address),
                Tag::Array => {
                    let len = header.metadata();
                    self.mark_chain(addr, len, &mut stack);
                }
                Tag::Environment | Tag::Frame => {
                    let len = if header.tag() == Tag::Environment {
                        header.metadata()
                    } else {
                        header.child_count() as u32
                    };
                    self.mark_chain(addr, len, &mut stack);
                }
                Tag::False
                | Tag::True
                | Tag::Null
                | Tag::Undefined
                | Tag::Unallocated
                | Tag::Number
                | Tag::String
                | Tag::Builtin
                | Tag::Struct
                | Tag::Slice
                | Tag::Extension
                | Tag::Free => {}
            }
        }
    }

    /// Marks every node in `head`'s extension chain and pushes each of its
    /// `logical_len` child-slot values for further marking.
    fn mark_chain(&mut self, head: Address, logical_len: u32, stack: &mut Vec<Address>) {
        let mut node = head;
        let mut remaining = logical_len;
        loop {
            let mut h = self.header(node);
            h.set_marked(true);
            self.set_header(node, h);

            let take = remaining.min(MAX_CHILDREN);
            for slot in 0..take {
                stack.push(self.word(node + 1 + slot) as Address);
            }
            remaining -= take;
            if remaining == 0 {
                break;
            }
            let ext = self.extension(node);
            if ext == UNALLOCATED_ADDR {
                break; // malformed chain; nothing further to mark
            }
            node = ext;
        }
    }

    /// Sweeps every node: frees unmarked ones, unmarks survivors. Returns
    /// the number of nodes freed.
    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        let total = self.node_count();
        for node_idx in 0..total {
            let addr = (node_idx * NODE_WORDS as usize) as Address;
            let mut header = self.header(addr);
            if header.tag() == Tag::Free {
                continue;
            }
            if !header.is_marked() {
                if header.tag() == Tag::String {
                    let hash = self.word(addr + 1) as u32;
                    self.string_pool.remove(hash, addr);
                }
                self.set_header(addr, Header::new(Tag::Free, 0, self.free_head));
                self.free_head = addr;
                freed += 1;
            } else {
                header.set_marked(false);
                self.set_header(addr, header);
            }
        }
        freed
    }

    #[cfg(test)]
    pub(crate) fn debug_is_marked(&self, addr: Address) -> bool {
        self.header(addr).is_marked()
    }

    #[cfg(test)]
    pub(crate) fn debug_is_free(&self, addr: Address) -> bool {
        self.tag_of(addr) == Tag::Free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> Heap {
        Heap::new(200, false)
    }

    #[test]
    fn singletons_have_fixed_addresses_and_no_children() {
        let h = heap();
        assert_eq!(h.tag_of(FALSE_ADDR), Tag::False);
        assert_eq!(h.tag_of(TRUE_ADDR), Tag::True);
        assert_eq!(h.tag_of(NULL_ADDR), Tag::Null);
        assert_eq!(h.tag_of(UNDEFINED_ADDR), Tag::Undefined);
        assert_eq!(h.tag_of(UNALLOCATED_ADDR), Tag::Unallocated);
    }

    #[test]
    fn tag_type_soundness_for_every_allocator() {
        let mut h = heap();
        let n = h.allocate_number(3.5, &NoRoots).unwrap();
        assert_eq!(h.tag_of(n), Tag::Number);
        assert!(h.read_number(n).is_ok());
        assert!(h.read_string(n).is_err());

        let s = h.allocate_string("hi", &NoRoots).unwrap();
        assert_eq!(h.tag_of(s), Tag::String);
        assert!(h.read_number(s).is_err());

        let c = h.allocate_channel(&NoRoots).unwrap();
        assert_eq!(h.tag_of(c), Tag::Chan);
        assert!(h.channel_is_empty(c).unwrap());

        let a = h.allocate_array(3, &NoRoots).unwrap();
        assert_eq!(h.tag_of(a), Tag::Array);
        assert_eq!(h.array_len(a).unwrap(), 3);

        let cl = h.allocate_closure(2, 10, NULL_ADDR, &NoRoots).unwrap();
        assert_eq!(h.tag_of(cl), Tag::Closure);
        assert_eq!(h.closure_arity(cl).unwrap(), 2);
        assert_eq!(h.closure_entry(cl).unwrap(), 10);
    }

    #[test]
    fn string_interning_returns_same_address() {
        let mut h = heap();
        let a = h.allocate_string("hello", &NoRoots).unwrap();
        let b = h.allocate_string("hello", &NoRoots).unwrap();
        assert_eq!(a, b);
        assert_eq!(h.read_string(a).unwrap(), "hello");
    }

    #[test]
    fn channel_invariant_has_item_matches_slot() {
        let mut h = heap();
        let c = h.allocate_channel(&NoRoots).unwrap();
        assert!(h.channel_is_empty(c).unwrap());
        let v = h.allocate_number(1.0, &NoRoots).unwrap();
        h.channel_push_item(c, v).unwrap();
        assert!(h.channel_is_full(c).unwrap());
        let popped = h.channel_pop_item(c).unwrap();
        assert_eq!(popped, v);
        assert!(h.channel_is_empty(c).unwrap());
    }

    #[test]
    fn array_beyond_eight_elements_uses_extension_chain() {
        let mut h = heap();
        let a = h.allocate_array(20, &NoRoots).unwrap();
        for i in 0..20 {
            let v = h.allocate_number(i as f64, &NoRoots).unwrap();
            h.array_set(a, i, v).unwrap();
        }
        for i in 0..20 {
            let v = h.array_get(a, i).unwrap();
            assert_eq!(h.read_number(v).unwrap(), i as f64);
        }
        assert!(h.array_get(a, 20).is_err());
    }

    #[test]
    fn gc_frees_unreachable_and_preserves_reachable() {
        let mut h = heap();
        let kept = h.allocate_number(1.0, &NoRoots).unwrap();
        let _garbage = h.allocate_number(2.0, &NoRoots).unwrap();
        struct OneRoot(Address);
        impl RootSource for OneRoot {
            fn collect_roots(&self, out: &mut Vec<Address>) {
                out.push(self.0);
            }
        }
        h.collect(&OneRoot(kept));
        assert!(!h.debug_is_free(kept));
        assert!(h.debug_is_free(_garbage) || h.tag_of(_garbage) == Tag::Free);
        assert!(!h.debug_is_marked(kept));
    }

    #[test]
    fn free_list_and_reachable_set_are_disjoint() {
        let mut h = heap();
        let a = h.allocate_number(1.0, &NoRoots).unwrap();
        assert_ne!(h.tag_of(a), Tag::Free);
    }

    #[test]
    fn heap_doubles_when_allocation_and_collection_both_miss() {
        let mut h = Heap::new(50, false); // exactly the 5-singleton floor
        struct AllRoots(Vec<Address>);
        impl RootSource for AllRoots {
            fn collect_roots(&self, out: &mut Vec<Address>) {
                out.extend_from_slice(&self.0);
            }
        }
        let mut kept = Vec::new();
        for i in 0..50 {
            let roots = AllRoots(kept.clone());
            let a = h.allocate_number(i as f64, &roots).unwrap();
            kept.push(a);
        }
        assert_eq!(kept.len(), 50);
    }
}
