//! # Static Huffman Coder
//!
//! Byte-oriented prefix code shared by every compressed channel.
//!
//! ## Construction
//!
//! The tree is grown with the incremental (FGK-style) algorithm: each symbol
//! is "referenced" as many times as its weight in [`SYMBOL_FREQUENCIES`],
//! starting from a lone NYT ("not yet transmitted") node. Nothing adapts once
//! construction is over, so both peers end up with the same tree as long as
//! they build from the same table. Do not touch the weights or the update
//! order: the result is part of the wire format.
//!
//! ## Layout
//!
//! Construction runs on an index arena (`TreeBuilder`). The finished
//! [`Huffman`] keeps only what the hot path needs: a flat decode tree and
//! one precomputed code per symbol.

use std::sync::OnceLock;

/// Pseudo-symbol for "not yet transmitted".
///
/// A well-formed stream never contains it, but garbage input can decode to
/// it, so readers must treat the receive result as a 9-bit value.
pub const NYT: u16 = 256;

const INTERNAL_NODE: u16 = 257;

/// Empirical byte frequencies of game traffic.
pub const SYMBOL_FREQUENCIES: [u32; 256] = [
    250315,  41193,   6292,   7106,   3730,   3750,   6110,  23283, // 0
     33317,   6950,   7838,   9714,   9257,  17259,   3949,   1778, // 8
      8288,   1604,   1590,   1663,   1100,   1213,   1238,   1134, // 16
      1749,   1059,   1246,   1149,   1273,   4486,   2805,   3472, // 24
     21819,   1159,   1670,   1066,   1043,   1012,   1053,   1070, // 32
      1726,    888,   1180,    850,    960,    780,   1752,   3296, // 40
     10630,   4514,   5881,   2685,   4650,   3837,   2093,   1867, // 48
      2584,   1949,   1972,    940,   1134,   1788,   1670,   1206, // 56
      5719,   6128,   7222,   6654,   3710,   3795,   1492,   1524, // 64
      2215,   1140,   1355,    971,   2180,   1248,   1328,   1195, // 72
      1770,   1078,   1264,   1266,   1168,    965,   1155,   1186, // 80
      1347,   1228,   1529,   1600,   2617,   2048,   2546,   3275, // 88
      2410,   3585,   2504,   2800,   2675,   6146,   3663,   2840, // 96
     14253,   3164,   2221,   1687,   3208,   2739,   3512,   4796, // 104
      4091,   3515,   5288,   4016,   7937,   6031,   5360,   3924, // 112
      4892,   3743,   4566,   4807,   5852,   6400,   6225,   8291, // 120
     23243,   7838,   7073,   8935,   5437,   4483,   3641,   5256, // 128
      5312,   5328,   5370,   3492,   2458,   1694,   1821,   2121, // 136
      1916,   1149,   1516,   1367,   1236,   1029,   1258,   1104, // 144
      1245,   1006,   1149,   1025,   1241,    952,   1287,    997, // 152
      1713,   1009,   1187,    879,   1099,    929,   1078,    951, // 160
      1656,    930,   1153,   1030,   1262,   1062,   1214,   1060, // 168
      1621,    930,   1106,    912,   1034,    892,   1158,    990, // 176
      1175,    850,   1121,    903,   1087,    920,   1144,   1056, // 184
      3462,   2240,   4397,  12136,   7758,   1345,   1307,   3278, // 192
      1950,    886,   1023,   1112,   1077,   1042,   1061,   1071, // 200
      1484,   1001,   1096,    915,   1052,    995,   1070,    876, // 208
      1111,    851,   1059,    805,   1112,    923,   1103,    817, // 216
      1899,   1872,    976,    841,   1127,    956,   1159,    950, // 224
      7791,    954,   1289,    933,   1127,   3207,   1020,    927, // 232
      1355,    768,   1040,    745,    952,    805,   1073,    740, // 240
      1013,    805,   1008,    796,    996,   1057,  11457,  13504, // 248
];

static SHARED: OnceLock<Huffman> = OnceLock::new();

/// Returns the process-wide coder, building it on first use.
///
/// Servers call this once during startup so the first packet does not pay
/// for construction.
pub fn shared() -> &'static Huffman {
    SHARED.get_or_init(Huffman::build)
}

/// Writes one raw bit at `*offset` and advances it.
///
/// The first bit written into a byte clears that byte, so buffers never
/// need zeroing up front.
#[inline]
pub fn put_bit(bit: u8, data: &mut [u8], offset: &mut usize) {
    let index = *offset >> 3;
    let shift = *offset & 7;
    if shift == 0 {
        data[index] = 0;
    }
    data[index] |= (bit & 1) << shift;
    *offset += 1;
}

/// Reads one raw bit at `*offset` and advances it.
///
/// Bits past the end of `data` read as zero.
#[inline]
#[must_use]
pub fn get_bit(data: &[u8], offset: &mut usize) -> u8 {
    let bit = data.get(*offset >> 3).map_or(0, |byte| (byte >> (*offset & 7)) & 1);
    *offset += 1;
    bit
}

/// Prefix code of one symbol. Bit `i` is the branch taken at depth `i`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Code {
    bits: u64,
    len: u8,
}

#[derive(Clone, Copy, Debug)]
struct DecodeNode {
    left: Option<usize>,
    right: Option<usize>,
    symbol: u16,
}

/// Immutable Huffman coder.
pub struct Huffman {
    nodes: Vec<DecodeNode>,
    root: usize,
    codes: [Code; 257],
}

impl Huffman {
    /// Builds the coder from [`SYMBOL_FREQUENCIES`].
    #[must_use]
    pub fn build() -> Self {
        let mut builder = TreeBuilder::new();
        for (symbol, &weight) in SYMBOL_FREQUENCIES.iter().enumerate() {
            for _ in 0..weight {
                builder.add_ref(symbol as u8);
            }
        }
        builder.finish()
    }

    /// Length in bits of the code for `symbol` (256 is [`NYT`]).
    #[must_use]
    pub fn code_len(&self, symbol: u16) -> usize {
        self.codes.get(usize::from(symbol)).map_or(0, |code| usize::from(code.len))
    }

    /// Transmits `symbol` at `*offset`, never writing at or past `max_offset`.
    ///
    /// If the code does not fit, `*offset` is left at `max_offset + 1` so the
    /// caller's overflow check trips.
    pub fn offset_transmit(&self, symbol: u8, data: &mut [u8], offset: &mut usize, max_offset: usize) {
        let code = self.codes[usize::from(symbol)];
        for depth in 0..code.len {
            if *offset >= max_offset {
                *offset = max_offset + 1;
                return;
            }
            put_bit(((code.bits >> depth) & 1) as u8, data, offset);
        }
    }

    /// Receives one symbol starting at `*offset`.
    ///
    /// Running into `max_offset` mid-code yields 0 and leaves `*offset` at
    /// `max_offset + 1`.
    #[must_use]
    pub fn offset_receive(&self, data: &[u8], offset: &mut usize, max_offset: usize) -> u16 {
        let mut cursor = *offset;
        let mut node = self.root;
        while self.nodes[node].symbol == INTERNAL_NODE {
            if cursor >= max_offset {
                *offset = max_offset + 1;
                return 0;
            }
            let branch = if get_bit(data, &mut cursor) == 1 {
                self.nodes[node].right
            } else {
                self.nodes[node].left
            };
            match branch {
                Some(child) => node = child,
                None => return 0,
            }
        }
        *offset = cursor;
        self.nodes[node].symbol
    }
}

impl std::fmt::Debug for Huffman {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Huffman")
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug)]
struct TreeNode {
    left: Option<usize>,
    right: Option<usize>,
    parent: Option<usize>,
    /// Next node in rank order (towards heavier nodes).
    next: Option<usize>,
    prev: Option<usize>,
    /// Slot holding the leader of this node's weight block.
    head: usize,
    weight: u32,
    symbol: u16,
}

/// Arena used while the tree grows.
///
/// Nodes of equal weight form a block inside the rank list; every member
/// points at one shared slot in `blocks` naming the block leader. Slots are
/// recycled through `free_blocks`.
struct TreeBuilder {
    nodes: Vec<TreeNode>,
    blocks: Vec<Option<usize>>,
    free_blocks: Vec<usize>,
    root: usize,
    /// Lightest node in rank order; always the NYT node.
    lhead: usize,
    loc: [Option<usize>; 257],
}

impl TreeBuilder {
    fn new() -> Self {
        let nyt = TreeNode {
            left: None,
            right: None,
            parent: None,
            next: None,
            prev: None,
            head: 0,
            weight: 0,
            symbol: NYT,
        };
        let mut loc = [None; 257];
        loc[usize::from(NYT)] = Some(0);
        Self {
            nodes: vec![nyt],
            blocks: vec![Some(0)],
            free_blocks: Vec::new(),
            root: 0,
            lhead: 0,
            loc,
        }
    }

    fn push_node(&mut self, symbol: u16) -> usize {
        self.nodes.push(TreeNode {
            left: None,
            right: None,
            parent: None,
            next: None,
            prev: None,
            head: 0,
            weight: 1,
            symbol,
        });
        self.nodes.len() - 1
    }

    fn alloc_block(&mut self, leader: usize) -> usize {
        if let Some(slot) = self.free_blocks.pop() {
            self.blocks[slot] = Some(leader);
            slot
        } else {
            self.blocks.push(Some(leader));
            self.blocks.len() - 1
        }
    }

    fn free_block(&mut self, slot: usize) {
        self.blocks[slot] = None;
        self.free_blocks.push(slot);
    }

    /// Exchanges the tree positions of two nodes.
    fn swap(&mut self, a: usize, b: usize) {
        let parent_a = self.nodes[a].parent;
        let parent_b = self.nodes[b].parent;

        match parent_a {
            Some(p) if self.nodes[p].left == Some(a) => self.nodes[p].left = Some(b),
            Some(p) => self.nodes[p].right = Some(b),
            None => self.root = b,
        }
        // Siblings: the first rewrite already pointed this slot at `b`, so
        // the second one restores it. The net effect is a no-op.
        match parent_b {
            Some(p) if self.nodes[p].left == Some(b) => self.nodes[p].left = Some(a),
            Some(p) => self.nodes[p].right = Some(a),
            None => self.root = a,
        }

        self.nodes[a].parent = parent_b;
        self.nodes[b].parent = parent_a;
    }

    /// Exchanges the rank-list positions of two nodes.
    fn swap_list(&mut self, a: usize, b: usize) {
        let next_a = self.nodes[a].next;
        self.nodes[a].next = self.nodes[b].next;
        self.nodes[b].next = next_a;

        let prev_a = self.nodes[a].prev;
        self.nodes[a].prev = self.nodes[b].prev;
        self.nodes[b].prev = prev_a;

        if self.nodes[a].next == Some(a) {
            self.nodes[a].next = Some(b);
        }
        if self.nodes[b].next == Some(b) {
            self.nodes[b].next = Some(a);
        }
        if let Some(n) = self.nodes[a].next {
            self.nodes[n].prev = Some(a);
        }
        if let Some(n) = self.nodes[b].next {
            self.nodes[n].prev = Some(b);
        }
        if let Some(p) = self.nodes[a].prev {
            self.nodes[p].next = Some(a);
        }
        if let Some(p) = self.nodes[b].prev {
            self.nodes[p].next = Some(b);
        }
    }

    fn same_weight(&self, a: Option<usize>, node: usize) -> bool {
        a.is_some_and(|a| self.nodes[a].weight == self.nodes[node].weight)
    }

    /// Bumps a node's weight and restores the sibling property up to the root.
    fn increment(&mut self, node: usize) {
        if self.same_weight(self.nodes[node].next, node) {
            if let Some(leader) = self.blocks[self.nodes[node].head] {
                if Some(leader) != self.nodes[node].parent {
                    self.swap(leader, node);
                }
                self.swap_list(leader, node);
            }
        }

        let head = self.nodes[node].head;
        match self.nodes[node].prev {
            Some(prev) if self.nodes[prev].weight == self.nodes[node].weight => {
                self.blocks[head] = Some(prev);
            }
            _ => self.free_block(head),
        }

        self.nodes[node].weight += 1;

        match self.nodes[node].next {
            Some(next) if self.nodes[next].weight == self.nodes[node].weight => {
                self.nodes[node].head = self.nodes[next].head;
            }
            _ => self.nodes[node].head = self.alloc_block(node),
        }

        if let Some(parent) = self.nodes[node].parent {
            self.increment(parent);
            let prev = self.nodes[node].prev;
            if let Some(parent) = self.nodes[node].parent.filter(|&p| prev == Some(p)) {
                self.swap_list(node, parent);
                let head = self.nodes[node].head;
                if self.blocks[head] == Some(node) {
                    self.blocks[head] = Some(parent);
                }
            }
        }
    }

    fn add_ref(&mut self, symbol: u8) {
        if let Some(leaf) = self.loc[usize::from(symbol)] {
            self.increment(leaf);
            return;
        }

        // First sighting: split NYT into (NYT, leaf) under a new internal node.
        let leaf = self.push_node(u16::from(symbol));
        let internal = self.push_node(INTERNAL_NODE);
        let nyt = self.lhead;

        let first = self.nodes[nyt].next;
        self.nodes[internal].next = first;
        self.nodes[internal].head = match first {
            Some(first) => {
                self.nodes[first].prev = Some(internal);
                if self.nodes[first].weight == 1 {
                    self.nodes[first].head
                } else {
                    self.alloc_block(internal)
                }
            }
            None => self.alloc_block(internal),
        };
        self.nodes[nyt].next = Some(internal);
        self.nodes[internal].prev = Some(nyt);

        self.nodes[leaf].next = Some(internal);
        self.nodes[internal].prev = Some(leaf);
        self.nodes[leaf].head = self.nodes[internal].head;
        self.nodes[nyt].next = Some(leaf);
        self.nodes[leaf].prev = Some(nyt);

        let grandparent = self.nodes[nyt].parent;
        match grandparent {
            Some(g) if self.nodes[g].left == Some(nyt) => self.nodes[g].left = Some(internal),
            Some(g) => self.nodes[g].right = Some(internal),
            None => self.root = internal,
        }

        self.nodes[internal].right = Some(leaf);
        self.nodes[internal].left = Some(nyt);
        self.nodes[internal].parent = grandparent;
        self.nodes[nyt].parent = Some(internal);
        self.nodes[leaf].parent = Some(internal);

        self.loc[usize::from(symbol)] = Some(leaf);

        if let Some(grandparent) = grandparent {
            self.increment(grandparent);
        }
    }

    fn finish(self) -> Huffman {
        let nodes = self
            .nodes
            .iter()
            .map(|node| DecodeNode {
                left: node.left,
                right: node.right,
                symbol: node.symbol,
            })
            .collect();

        let mut codes = [Code::default(); 257];
        for (code, leaf) in codes.iter_mut().zip(self.loc) {
            let Some(mut node) = leaf else { continue };
            while let Some(parent) = self.nodes[node].parent {
                debug_assert!(code.len < 64, "huffman code deeper than 64 bits");
                code.bits = (code.bits << 1) | u64::from(self.nodes[parent].right == Some(node));
                code.len += 1;
                node = parent;
            }
        }

        Huffman {
            nodes,
            root: self.root,
            codes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_table_total() {
        let total: u64 = SYMBOL_FREQUENCIES.iter().map(|&w| u64::from(w)).sum();
        assert_eq!(total, 1_053_340);
        assert!(SYMBOL_FREQUENCIES.iter().all(|&w| w > 0));
    }

    #[test]
    fn test_code_lengths() {
        let huff = shared();
        // Zero dominates game traffic and gets the shortest code.
        assert_eq!(huff.code_len(0), 2);
        assert_eq!(huff.code_len(255), 6);
        assert_eq!(huff.code_len(NYT), 11);
        assert!((0..=256).all(|s| (1..=11).contains(&huff.code_len(s))));
    }

    #[test]
    fn test_every_byte_round_trips() {
        let huff = shared();
        let mut data = [0u8; 512];
        let mut offset = 0;
        let max_offset = data.len() * 8;
        for symbol in 0..=255u8 {
            huff.offset_transmit(symbol, &mut data, &mut offset, max_offset);
        }
        let end = offset;

        let mut cursor = 0;
        for symbol in 0..=255u16 {
            assert_eq!(huff.offset_receive(&data, &mut cursor, end), symbol);
        }
        assert_eq!(cursor, end);
    }

    #[test]
    fn test_transmit_stops_at_limit() {
        let huff = shared();
        let mut data = [0u8; 4];
        let mut offset = 0;
        // 255 needs six bits; only three are available.
        huff.offset_transmit(255, &mut data, &mut offset, 3);
        assert_eq!(offset, 4);
    }

    #[test]
    fn test_receive_stops_at_limit() {
        let huff = shared();
        let data = [0xFFu8; 4];
        let mut offset = 30;
        assert_eq!(huff.offset_receive(&data, &mut offset, 32), 0);
        assert_eq!(offset, 33);
    }

    #[test]
    fn test_put_and_get_bit() {
        let mut data = [0xAAu8; 2];
        let mut offset = 0;
        for bit in [1, 0, 1, 1] {
            put_bit(bit, &mut data, &mut offset);
        }
        // The first bit cleared the stale byte.
        assert_eq!(data[0], 0b1101);

        let mut cursor = 0;
        let read: Vec<u8> = (0..4).map(|_| get_bit(&data, &mut cursor)).collect();
        assert_eq!(read, vec![1, 0, 1, 1]);

        let mut past = 64;
        assert_eq!(get_bit(&data, &mut past), 0);
        assert_eq!(past, 65);
    }
}
