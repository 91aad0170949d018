use std::collections::BTreeMap;

use pisa_isa::Opcode;
use serde::Serialize;

/// Issue cost of an operation: `throughput` cycles occupy the queue,
/// `latency` cycles until the result is visible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Perf {
    pub throughput: u64,
    pub latency: u64,
}

impl Perf {
    pub const fn new(throughput: u64, latency: u64) -> Self {
        Self {
            throughput,
            latency,
        }
    }
}

impl Default for Perf {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum MemoryTier {
    Register,
    Cache,
    MemoryCache,
    Memory,
}

impl MemoryTier {
    pub fn name(self) -> &'static str {
        match self {
            MemoryTier::Register => "REGISTER",
            MemoryTier::Cache => "CACHE",
            MemoryTier::MemoryCache => "MEMORY_CACHE",
            MemoryTier::Memory => "MEMORY",
        }
    }
}

/// Named throughput/latency characterization per opcode and memory tier,
/// plus the tier sizes driving the recency-based tier rule.
#[derive(Clone, Debug)]
pub struct HardwareModel {
    pub name: &'static str,
    pub instruction_perf: BTreeMap<Opcode, Perf>,
    pub memory_perf: BTreeMap<MemoryTier, Perf>,
    pub memory_sizes: BTreeMap<MemoryTier, u64>,
}

impl HardwareModel {
    pub const PROFILE_NAMES: [&'static str; 3] = ["example", "model1", "model2"];

    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "example" => Some(Self::example()),
            "model1" => Some(Self::model1()),
            "model2" => Some(Self::model2()),
            _ => None,
        }
    }

    /// Lane-serial reference hardware: one cycle per lane of the 8192-wide
    /// registers, six passes for a butterfly stage.
    pub fn example() -> Self {
        Self {
            name: "example",
            instruction_perf: arithmetic_profile(Perf::new(8192, 8192), Perf::new(8192 * 6, 8192 * 6)),
            memory_perf: default_memory_perf(),
            memory_sizes: memory_sizes(1_572_000, 1_572_000),
        }
    }

    /// Fully pipelined vector unit with large register and cache tiers.
    pub fn model1() -> Self {
        Self {
            name: "model1",
            instruction_perf: arithmetic_profile(Perf::new(1, 6), Perf::new(1, 33)),
            memory_perf: default_memory_perf(),
            memory_sizes: memory_sizes(1_572_000, 1_572_000),
        }
    }

    /// Same pipeline as `model1` with tight register and cache capacity.
    pub fn model2() -> Self {
        Self {
            name: "model2",
            instruction_perf: arithmetic_profile(Perf::new(1, 6), Perf::new(1, 33)),
            memory_perf: default_memory_perf(),
            memory_sizes: memory_sizes(2048, 256),
        }
    }

    /// Per-opcode cost; opcodes without an entry issue at `(1, 1)`.
    pub fn instruction(&self, opcode: Opcode) -> Perf {
        self.instruction_perf
            .get(&opcode)
            .copied()
            .unwrap_or_default()
    }

    pub fn memory(&self, tier: MemoryTier) -> Perf {
        self.memory_perf.get(&tier).copied().unwrap_or_default()
    }

    pub fn size(&self, tier: MemoryTier) -> u64 {
        self.memory_sizes.get(&tier).copied().unwrap_or(0)
    }
}

fn arithmetic_profile(arith: Perf, butterfly: Perf) -> BTreeMap<Opcode, Perf> {
    let mut map = BTreeMap::new();
    for opcode in [
        Opcode::Add,
        Opcode::Sub,
        Opcode::Mul,
        Opcode::Mac,
        Opcode::Maci,
        Opcode::Muli,
    ] {
        map.insert(opcode, arith);
    }
    map.insert(Opcode::Ntt, butterfly);
    map.insert(Opcode::Intt, butterfly);
    map
}

fn default_memory_perf() -> BTreeMap<MemoryTier, Perf> {
    BTreeMap::from([
        (MemoryTier::Memory, Perf::new(1, 40)),
        (MemoryTier::MemoryCache, Perf::new(5, 44)),
        (MemoryTier::Cache, Perf::new(4, 4)),
        (MemoryTier::Register, Perf::new(1, 1)),
    ])
}

fn memory_sizes(cache: u64, register: u64) -> BTreeMap<MemoryTier, u64> {
    BTreeMap::from([
        (MemoryTier::Memory, 1_572_000),
        (MemoryTier::Cache, cache),
        (MemoryTier::Register, register),
    ])
}
