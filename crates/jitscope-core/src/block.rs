use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

bitflags::bitflags! {
    /// CPU state the block was compiled under. A block is only valid while these match.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FeatureFlags: u32 {
        /// Data address translation enabled (MSR.DR).
        const MSR_DR = 1 << 0;
        /// Instruction address translation enabled (MSR.IR).
        const MSR_IR = 1 << 1;
        /// Performance monitor counters enabled.
        const PERFMON = 1 << 2;
    }
}

impl FeatureFlags {
    /// Space separated short names, e.g. `"DR IR"`. Empty when no flag is set.
    pub fn describe(self) -> String {
        let mut names = Vec::with_capacity(3);
        if self.contains(FeatureFlags::MSR_DR) {
            names.push("DR");
        }
        if self.contains(FeatureFlags::MSR_IR) {
            names.push("IR");
        }
        if self.contains(FeatureFlags::PERFMON) {
            names.push("PM");
        }
        names.join(" ")
    }
}

impl Serialize for FeatureFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.bits())
    }
}

impl<'de> Deserialize<'de> for FeatureFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Ok(FeatureFlags::from_bits_truncate(bits))
    }
}

/// One guest instruction word as it was fetched when the block was compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuestInstruction {
    pub address: u32,
    pub inst: u32,
}

/// Host machine code emitted for a block into one of the code regions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCode {
    /// Host address of the first byte. Assigned by the cache when the block is installed.
    #[serde(default)]
    pub start: u64,
    #[serde(with = "hex_bytes", default)]
    pub bytes: Vec<u8>,
}

impl HostCode {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { start: 0, bytes }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Profiling counters accumulated while the block ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileData {
    pub run_count: u64,
    pub cycles_spent: u64,
    pub time_spent_ns: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitBlock {
    pub effective_address: u32,
    /// Every physical address this block has been entered at. With address translation on, the
    /// same effective address can be backed by different physical pages over time.
    #[serde(default)]
    pub physical_addresses: BTreeSet<u32>,
    /// Guest instructions in address order. Gaps mark followed branches.
    pub original_buffer: Vec<GuestInstruction>,
    /// Number of guest instructions the block accounts for, including repeats of the same
    /// address (e.g. unrolled idle loops). Never smaller than `original_buffer.len()` once the
    /// block is installed in a cache.
    #[serde(default)]
    pub guest_instruction_count: u32,
    #[serde(default)]
    pub feature_flags: FeatureFlags,
    #[serde(default)]
    pub near: HostCode,
    #[serde(default)]
    pub far: HostCode,
    /// `None` when the block was compiled without profiling instrumentation.
    #[serde(default)]
    pub profile: Option<ProfileData>,
}

impl JitBlock {
    /// A block covering `instructions` consecutive guest words starting at `effective_address`.
    pub fn new(effective_address: u32, instructions: &[u32]) -> Self {
        let original_buffer = instructions
            .iter()
            .enumerate()
            .map(|(i, &inst)| GuestInstruction {
                address: effective_address.wrapping_add((i as u32) * crate::GUEST_INSTRUCTION_SIZE),
                inst,
            })
            .collect::<Vec<_>>();
        Self {
            effective_address,
            physical_addresses: BTreeSet::new(),
            guest_instruction_count: original_buffer.len() as u32,
            original_buffer,
            feature_flags: FeatureFlags::empty(),
            near: HostCode::default(),
            far: HostCode::default(),
            profile: None,
        }
    }

    pub fn with_host_code(mut self, near: Vec<u8>, far: Vec<u8>) -> Self {
        self.near = HostCode::new(near);
        self.far = HostCode::new(far);
        self
    }

    pub fn with_profile(mut self, profile: ProfileData) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn with_physical_addresses(mut self, addrs: impl IntoIterator<Item = u32>) -> Self {
        self.physical_addresses.extend(addrs);
        self
    }

    pub fn with_feature_flags(mut self, flags: FeatureFlags) -> Self {
        self.feature_flags = flags;
        self
    }

    pub fn code_buffer_size(&self) -> usize {
        self.original_buffer.len()
    }

    pub fn repeat_instructions(&self) -> usize {
        (self.guest_instruction_count as usize).saturating_sub(self.original_buffer.len())
    }

    pub fn covers_physical_address(&self, paddr: u32) -> bool {
        self.physical_addresses.contains(&paddr)
    }
}

mod hex_bytes {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits: String = text.split_ascii_whitespace().collect();
        hex::decode(digits).map_err(D::Error::custom)
    }
}
