use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::host_disasm::disassemble_x86_64;
use crate::{
    CoreError, CpuThreadGuard, HostDisassembly, JitBlock, JitInterface, MemoryRegionStats,
    ProfileData, Result, GUEST_INSTRUCTION_SIZE,
};

/// Guest pages are 4 KiB.
pub const PAGE_SHIFT: u32 = 12;
const PAGE_OFFSET_MASK: u32 = (1 << PAGE_SHIFT) - 1;

/// Placement of the two host code regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheRegions {
    pub near_base: u64,
    pub near_capacity: u64,
    pub far_base: u64,
    pub far_capacity: u64,
}

impl Default for CacheRegions {
    fn default() -> Self {
        Self {
            near_base: 0x7f00_0000_0000,
            near_capacity: 64 * 1024 * 1024,
            far_base: 0x7f00_1000_0000,
            far_capacity: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMapping {
    pub effective_page: u32,
    pub physical_page: u32,
}

/// Serialized form of a [`BlockCache`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSnapshot {
    pub blocks: Vec<JitBlock>,
    pub page_map: Vec<PageMapping>,
    pub regions: CacheRegions,
    pub profiling_enabled: bool,
}

/// First-fit allocator over one host code region.
#[derive(Debug, Clone)]
pub struct CodeRegion {
    name: &'static str,
    base: u64,
    capacity: u64,
    /// Offset → length of every live allocation.
    allocations: BTreeMap<u64, u64>,
}

impl CodeRegion {
    pub fn new(name: &'static str, base: u64, capacity: u64) -> Self {
        Self {
            name,
            base,
            capacity,
            allocations: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Reserve `len` bytes and return the host address of the first one. Zero-length requests
    /// are not tracked and resolve to the region base.
    pub fn allocate(&mut self, len: u64) -> Result<u64> {
        if len == 0 {
            return Ok(self.base);
        }
        let offset = self
            .free_extents()
            .find(|&(_, extent_len)| extent_len >= len)
            .map(|(offset, _)| offset)
            .ok_or_else(|| CoreError::RegionFull {
                region: self.name,
                requested: len,
                largest_free: self.largest_free_extent(),
            })?;
        self.allocations.insert(offset, len);
        Ok(self.base + offset)
    }

    /// Release the allocation starting at host address `start`. Unknown addresses are ignored.
    pub fn release(&mut self, start: u64) {
        if let Some(offset) = start.checked_sub(self.base) {
            self.allocations.remove(&offset);
        }
    }

    pub fn clear(&mut self) {
        self.allocations.clear();
    }

    pub fn used_bytes(&self) -> u64 {
        self.allocations.values().sum()
    }

    pub fn free_bytes(&self) -> u64 {
        self.capacity.saturating_sub(self.used_bytes())
    }

    pub fn largest_free_extent(&self) -> u64 {
        self.free_extents().map(|(_, len)| len).max().unwrap_or(0)
    }

    pub fn stats(&self) -> MemoryRegionStats {
        let free = self.free_bytes();
        let fragmentation = if free == 0 {
            0.0
        } else {
            1.0 - self.largest_free_extent() as f64 / free as f64
        };
        MemoryRegionStats {
            free_bytes: free,
            fragmentation,
        }
    }

    /// Gaps between allocations as `(offset, len)`, in address order.
    fn free_extents(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        let ends = std::iter::once(0).chain(
            self.allocations
                .iter()
                .map(|(&offset, &len)| offset + len),
        );
        let starts = self
            .allocations
            .keys()
            .copied()
            .chain(std::iter::once(self.capacity));
        ends.zip(starts)
            .filter(|(end, start)| start > end)
            .map(|(end, start)| (end, start - end))
    }
}

/// In-memory JIT block cache implementing [`JitInterface`].
#[derive(Debug, Clone)]
pub struct BlockCache {
    blocks: BTreeMap<u32, JitBlock>,
    page_map: BTreeMap<u32, u32>,
    regions: CacheRegions,
    near: CodeRegion,
    far: CodeRegion,
    profiling_enabled: bool,
}

impl BlockCache {
    pub fn new(regions: CacheRegions) -> Self {
        Self {
            blocks: BTreeMap::new(),
            page_map: BTreeMap::new(),
            regions,
            near: CodeRegion::new("near", regions.near_base, regions.near_capacity),
            far: CodeRegion::new("far", regions.far_base, regions.far_capacity),
            profiling_enabled: false,
        }
    }

    pub fn from_snapshot(snapshot: CacheSnapshot) -> Result<Self> {
        let mut cache = BlockCache::new(snapshot.regions);
        cache.profiling_enabled = snapshot.profiling_enabled;
        for mapping in snapshot.page_map {
            cache.map_page(mapping.effective_page, mapping.physical_page);
        }
        for block in snapshot.blocks {
            cache.insert(block)?;
        }
        tracing::debug!(blocks = cache.len(), "loaded cache snapshot");
        Ok(cache)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let snapshot: CacheSnapshot = serde_json::from_str(text)?;
        Self::from_snapshot(snapshot)
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            blocks: self.blocks.values().cloned().collect(),
            page_map: self
                .page_map
                .iter()
                .map(|(&effective_page, &physical_page)| PageMapping {
                    effective_page,
                    physical_page,
                })
                .collect(),
            regions: self.regions,
            profiling_enabled: self.profiling_enabled,
        }
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).expect("cache snapshot must serialize")
    }

    pub fn map_page(&mut self, effective_page: u32, physical_page: u32) {
        self.page_map.insert(effective_page, physical_page);
    }

    /// Install a compiled block, replacing any block at the same effective address.
    ///
    /// Host code is placed into the near/far regions (overwriting `start`), the guest instruction
    /// count is raised to at least the buffer length, and the current translation of the entry
    /// address is recorded as a covered physical address.
    pub fn insert(&mut self, mut block: JitBlock) -> Result<()> {
        if let Some(bad) = block
            .original_buffer
            .iter()
            .find(|i| i.address % GUEST_INSTRUCTION_SIZE != 0)
        {
            return Err(CoreError::UnalignedInstruction {
                address: bad.address,
            });
        }

        // A failed placement must leave the cache (including a replaced block) untouched.
        let saved_regions = (self.near.clone(), self.far.clone());
        let old = self.blocks.remove(&block.effective_address);
        if let Some(old) = &old {
            self.release_host_code(old);
        }

        if let Err(err) = self.place_host_code(&mut block) {
            (self.near, self.far) = saved_regions;
            if let Some(old) = old {
                self.blocks.insert(old.effective_address, old);
            }
            return Err(err);
        }

        let buffer_len = block.original_buffer.len() as u32;
        block.guest_instruction_count = block.guest_instruction_count.max(buffer_len);
        if let Some(paddr) = self.translate(block.effective_address) {
            block.physical_addresses.insert(paddr);
        }
        if self.profiling_enabled && block.profile.is_none() {
            block.profile = Some(ProfileData::default());
        }

        self.blocks.insert(block.effective_address, block);
        Ok(())
    }

    /// Account one execution of the block at `effective_address`. Ignored when profiling is off
    /// or the block is unknown.
    pub fn record_run(&mut self, effective_address: u32, cycles: u64, time_ns: u64) {
        if !self.profiling_enabled {
            return;
        }
        if let Some(profile) = self
            .blocks
            .get_mut(&effective_address)
            .and_then(|block| block.profile.as_mut())
        {
            profile.run_count = profile.run_count.saturating_add(1);
            profile.cycles_spent = profile.cycles_spent.saturating_add(cycles);
            profile.time_spent_ns = profile.time_spent_ns.saturating_add(time_ns);
        }
    }

    pub fn get(&self, effective_address: u32) -> Option<&JitBlock> {
        self.blocks.get(&effective_address)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn translate(&self, effective_address: u32) -> Option<u32> {
        let page = effective_address >> PAGE_SHIFT;
        self.page_map
            .get(&page)
            .map(|&physical_page| (physical_page << PAGE_SHIFT) | (effective_address & PAGE_OFFSET_MASK))
    }

    fn place_host_code(&mut self, block: &mut JitBlock) -> Result<()> {
        block.near.start = self.near.allocate(block.near.len() as u64)?;
        block.far.start = self.far.allocate(block.far.len() as u64)?;
        Ok(())
    }

    fn release_host_code(&mut self, block: &JitBlock) {
        if !block.near.is_empty() {
            self.near.release(block.near.start);
        }
        if !block.far.is_empty() {
            self.far.release(block.far.start);
        }
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new(CacheRegions::default())
    }
}

impl JitInterface for BlockCache {
    fn jit_blocks(&self, _guard: &CpuThreadGuard<'_>) -> Vec<JitBlock> {
        self.blocks.values().cloned().collect()
    }

    fn memory_stats(&self) -> BTreeMap<String, MemoryRegionStats> {
        [&self.near, &self.far]
            .into_iter()
            .map(|region| (region.name().to_string(), region.stats()))
            .collect()
    }

    fn clear_cache(&mut self, _guard: &CpuThreadGuard<'_>) {
        tracing::info!(blocks = self.blocks.len(), "clearing jit cache");
        self.blocks.clear();
        self.near.clear();
        self.far.clear();
    }

    fn wipe_profiling_data(&mut self, _guard: &CpuThreadGuard<'_>) {
        for profile in self.blocks.values_mut().filter_map(|b| b.profile.as_mut()) {
            *profile = ProfileData::default();
        }
    }

    fn erase_block(&mut self, _guard: &CpuThreadGuard<'_>, effective_address: u32) -> bool {
        match self.blocks.remove(&effective_address) {
            Some(block) => {
                self.release_host_code(&block);
                tracing::debug!(
                    effective_address = format_args!("{effective_address:#010x}"),
                    "erased jit block"
                );
                true
            }
            None => false,
        }
    }

    fn profiling_enabled(&self) -> bool {
        self.profiling_enabled
    }

    fn set_profiling_enabled(&mut self, guard: &CpuThreadGuard<'_>, enabled: bool) {
        if self.profiling_enabled == enabled {
            return;
        }
        self.profiling_enabled = enabled;
        self.clear_cache(guard);
    }

    fn disassemble_near_code(&self, block: &JitBlock) -> HostDisassembly {
        disassemble_x86_64(&block.near)
    }

    fn disassemble_far_code(&self, block: &JitBlock) -> HostDisassembly {
        disassemble_x86_64(&block.far)
    }

    fn translated_address(&self, effective_address: u32) -> Option<u32> {
        self.translate(effective_address)
    }
}
