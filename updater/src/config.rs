/// Build-time (but here, runtime-valued) constants for one device. Kept as
/// an explicit value rather than `cfg`-gated constants — per the engine
/// being a plain value instead of function-local statics — so host tests
/// can construct a device with an arbitrary updater reservation without a
/// recompile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Staging buffer capacity in bytes. Fixed at 4 KiB by the protocol.
    pub ram_cap: usize,
    /// Flash erase granularity, in bytes.
    pub sector_size: u32,
    /// Base of the updater's own interrupt vectors.
    pub updater_start: u32,
    /// End of the updater's read-only text.
    pub updater_end: u32,
    /// Candidate application's `startAddress` must be at or below this.
    pub descriptor_start_ceiling: u32,
    /// Candidate application's `endAddress` must be at or below this.
    pub descriptor_end_ceiling: u32,
    /// `getAppVersion` refuses to surface a version pointer above this.
    pub app_version_ceiling: u32,
    /// Size in bytes of one boot descriptor block.
    pub boot_block_size: u32,
    /// Flash erase granularity used when committing a boot descriptor.
    pub descriptor_page_size: u32,
    /// Base address of the first application sector; descriptor slots sit
    /// just below it.
    pub first_sector: u32,
    /// Number of boot-descriptor slots available below `first_sector`.
    pub num_descriptor_slots: u8,
}

impl DeviceConfig {
    /// Address of boot-descriptor slot `i`, per spec: `FIRST_SECTOR -
    /// (1 + i) * BOOT_BLOCK_SIZE`.
    pub fn descriptor_slot_address(&self, slot: u8) -> u32 {
        self.first_sector - (1 + slot as u32) * self.boot_block_size
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            ram_cap: 4096,
            sector_size: 4096,
            updater_start: 0x1000,
            updater_end: 0x3FFF,
            descriptor_start_ceiling: 0x5000,
            descriptor_end_ceiling: 0x100000,
            app_version_ceiling: 0x50000,
            boot_block_size: 256,
            descriptor_page_size: 4096,
            first_sector: 0x4000,
            num_descriptor_slots: 2,
        }
    }
}
