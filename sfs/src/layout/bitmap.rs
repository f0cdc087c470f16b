use alloc::vec;
use alloc::vec::Vec;

use crate::config::{BITMAP_BITS, DIRECTORY_BLOCKS};

use super::{as_bytes, as_bytes_mut};

/// 每组 64 位
const GROUP_BITS: usize = u64::BITS as usize;
const GROUPS: usize = BITMAP_BITS.div_ceil(GROUP_BITS);

/// 空闲位图在内存中的副本，一位对应一个块
///
/// 第 0 位对应目录区域的首块，目录占用的前几位在格式化时置位且永不释放。
#[derive(Debug, Clone)]
pub struct Bitmap {
    groups: Vec<u64>,
}

/// 位编号
#[derive(Debug, Clone, Copy)]
struct BitId(usize);

impl Bitmap {
    /// 新卷的位图：只有目录块被占用
    pub fn new() -> Self {
        let mut bitmap = Self {
            groups: vec![0; GROUPS],
        };
        for bit in 0..DIRECTORY_BLOCKS {
            bitmap.set(bit);
        }
        bitmap
    }

    /// 从磁盘区域的字节恢复位图
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut groups = vec![0u64; GROUPS];
        let image = as_bytes_mut(&mut groups);
        let len = image.len();
        image.copy_from_slice(&bytes[..len]);

        Self { groups }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        as_bytes(&self.groups)
    }

    /// 位图所指示区域的总块数
    #[inline]
    pub const fn capacity(&self) -> usize {
        BITMAP_BITS
    }

    /// 找到第一个空闲位并置位，返回其编号。
    /// 若位图的空间用尽，则返回空。
    pub fn alloc(&mut self) -> Option<usize> {
        let (group_index, ingroup_index) = self
            .groups
            .iter()
            .enumerate()
            .find_map(|(group_index, &bits)| {
                (bits != u64::MAX).then_some((group_index, bits.trailing_ones() as usize))
            })?;

        let bit = BitId::encode(group_index, ingroup_index);
        // 末组超出容量的那几位不对应任何块
        if bit >= self.capacity() {
            return None;
        }

        self.groups[group_index] |= 1 << ingroup_index;
        Some(bit)
    }

    /// 清除一位，返回它原先是否被置位
    pub fn dealloc(&mut self, bit: usize) -> bool {
        let was_set = self.is_set(bit);
        let (group_index, ingroup_index) = BitId(bit).decode();
        self.groups[group_index] &= !(1 << ingroup_index);
        was_set
    }

    #[inline]
    pub fn is_set(&self, bit: usize) -> bool {
        let (group_index, ingroup_index) = BitId(bit).decode();
        self.groups[group_index] & (1 << ingroup_index) != 0
    }

    /// 所有已置位的编号，升序
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.capacity()).filter(|&bit| self.is_set(bit))
    }

    pub fn count_free(&self) -> usize {
        let used: usize = self.groups.iter().map(|bits| bits.count_ones() as usize).sum();
        self.capacity().saturating_sub(used)
    }

    #[inline]
    fn set(&mut self, bit: usize) {
        let (group_index, ingroup_index) = BitId(bit).decode();
        self.groups[group_index] |= 1 << ingroup_index;
    }
}

impl BitId {
    #[inline]
    fn encode(group_index: usize, ingroup_index: usize) -> usize {
        group_index * GROUP_BITS + ingroup_index
    }

    #[inline]
    fn decode(self) -> (usize, usize) {
        (self.0 / GROUP_BITS, self.0 % GROUP_BITS)
    }
}
