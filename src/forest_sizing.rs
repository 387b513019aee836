//! Block-map tree page sizing (`spec.md` §3, §4.6).
//!
//! The block map is a k-ary tree of fan-out 812 (entries per leaf page),
//! split across a fixed number of root subtrees so that different parts of
//! the logical space can be read/written independently. `block_map_page_count`
//! is the number of on-disk pages — leaves plus every interior page above
//! them — the tree needs to address `logical_blocks` logical block numbers.

/// Entries a leaf page holds; a fixed constant of the on-disk format.
pub const ENTRIES_PER_PAGE: u64 = 812;

/// Number of independent root subtrees the leaves are partitioned across.
pub const DEFAULT_BLOCK_MAP_TREE_ROOT_COUNT: u64 = 60;

/// Interior pages needed above `leaf_count` leaves belonging to a single
/// root, folding the tree up one fan-out-812 level at a time until a single
/// root page remains. A root with zero leaves still costs its one (empty)
/// root page.
fn interior_pages_for_root(leaf_count: u64) -> u64 {
    if leaf_count == 0 {
        return 1;
    }
    let mut level = leaf_count.div_ceil(ENTRIES_PER_PAGE);
    let mut pages = level;
    while level > 1 {
        level = level.div_ceil(ENTRIES_PER_PAGE);
        pages += level;
    }
    pages
}

/// Total on-disk block-map pages (leaves plus interior) needed to address
/// `logical_blocks` logical block numbers.
pub fn block_map_page_count(logical_blocks: u64) -> u64 {
    let leaves = logical_blocks.div_ceil(ENTRIES_PER_PAGE);
    let root_count = DEFAULT_BLOCK_MAP_TREE_ROOT_COUNT;

    let base_leaves_per_root = leaves / root_count;
    let extra_leaves = leaves % root_count;

    let mut total = leaves;
    for root_idx in 0..root_count {
        let leaves_for_root = base_leaves_per_root + u64::from(root_idx < extra_leaves);
        total += interior_pages_for_root(leaves_for_root);
    }
    total
}

/// The largest `logical_blocks` whose block-map page count still leaves room
/// for the logical blocks themselves within `data_blocks` total — used when
/// the caller asks to "fill the device" (`logical_blocks == 0` in
/// `FormatConfig`). Found by binary search rather than a closed form, since
/// `L + block_map_page_count(L)` is monotone non-decreasing in `L`
/// (`spec.md` §9, open question: replicate the exact behaviour, not the
/// heuristic's derivation).
pub fn compute_logical_blocks(data_blocks: u64) -> u64 {
    if data_blocks == 0 {
        return 0;
    }

    let mut lo = 0u64;
    let mut hi = data_blocks;
    while lo < hi {
        let mid = lo + (hi - lo + 1) / 2;
        if mid + block_map_page_count(mid) <= data_blocks {
            lo = mid;
        } else {
            hi = mid - 1;
        }
    }
    lo
}
