// arch.rs — Target architecture table
//
// Two AIE generations are recognized. Everything that differs between them
// (output triple, lock intrinsic naming) is read from `ARCH_TABLE`, so a new
// generation is one more row rather than another branch at each use site.

use std::fmt;

use serde::{Deserialize, Serialize};

// ── Architectures ───────────────────────────────────────────────────────────

/// AIE architecture generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AieArch {
    /// First generation (AI Engine, Versal AI Core).
    Aie1,
    /// Second generation (AIE-ML, Versal AI Edge / NPU).
    Aie2,
}

/// Per-architecture naming and target data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchInfo {
    pub arch: AieArch,
    /// Generation number as written in device descriptions ("1", "2").
    pub generation: u32,
    /// Value written to the module's `target_triple` attribute.
    pub triple: &'static str,
    /// Prefix shared by both lock intrinsics.
    pub lock_prefix: &'static str,
    pub acquire_name: &'static str,
    pub release_name: &'static str,
    /// Whether lock intrinsics carry the `.reg` suffix.
    pub reg_suffix: bool,
}

pub const ARCH_TABLE: [ArchInfo; 2] = [
    ArchInfo {
        arch: AieArch::Aie1,
        generation: 1,
        triple: "aie",
        lock_prefix: "llvm.aie.lock.",
        acquire_name: "acquire",
        release_name: "release",
        reg_suffix: true,
    },
    ArchInfo {
        arch: AieArch::Aie2,
        generation: 2,
        triple: "aie2",
        lock_prefix: "llvm.aie2.",
        acquire_name: "acquire",
        release_name: "release",
        reg_suffix: false,
    },
];

impl AieArch {
    pub const ALL: [AieArch; 2] = [AieArch::Aie1, AieArch::Aie2];

    pub fn info(self) -> &'static ArchInfo {
        // ARCH_TABLE rows are declared in variant order.
        &ARCH_TABLE[self as usize]
    }

    pub fn triple(self) -> &'static str {
        self.info().triple
    }

    pub fn generation(self) -> u32 {
        self.info().generation
    }

    pub fn from_generation(generation: u32) -> Option<AieArch> {
        ARCH_TABLE
            .iter()
            .find(|info| info.generation == generation)
            .map(|info| info.arch)
    }
}

impl fmt::Display for AieArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AieArch::Aie1 => write!(f, "AIE1"),
            AieArch::Aie2 => write!(f, "AIE2"),
        }
    }
}

// ── Devices ─────────────────────────────────────────────────────────────────

/// Device part named by an `aie.device` container. The part fixes the
/// architecture generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AieDevice {
    Xcvc1902,
    Xcve2302,
    Xcve2802,
    Npu,
}

impl AieDevice {
    pub fn arch(self) -> AieArch {
        match self {
            AieDevice::Xcvc1902 => AieArch::Aie1,
            AieDevice::Xcve2302 | AieDevice::Xcve2802 | AieDevice::Npu => AieArch::Aie2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AieDevice::Xcvc1902 => "xcvc1902",
            AieDevice::Xcve2302 => "xcve2302",
            AieDevice::Xcve2802 => "xcve2802",
            AieDevice::Npu => "npu",
        }
    }
}

// ── Locks ───────────────────────────────────────────────────────────────────

/// The three lock operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    Acquire,
    AcquireGreaterEqual,
    Release,
}

impl LockAction {
    pub fn is_acquire(self) -> bool {
        matches!(self, LockAction::Acquire | LockAction::AcquireGreaterEqual)
    }

    /// Encode the lock value for the intrinsic call. Acquire-greater-or-equal
    /// is passed as the two's-complement negation of the threshold.
    pub fn encode_value(self, value: i32) -> i32 {
        match self {
            LockAction::AcquireGreaterEqual => value.wrapping_neg(),
            LockAction::Acquire | LockAction::Release => value,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            LockAction::Acquire => "acquire",
            LockAction::AcquireGreaterEqual => "acquire_ge",
            LockAction::Release => "release",
        }
    }
}

/// Name of the lock intrinsic for `action` on `arch`.
pub fn lock_intrinsic_name(arch: AieArch, action: LockAction) -> String {
    let info = arch.info();
    let op = if action.is_acquire() {
        info.acquire_name
    } else {
        info.release_name
    };
    let suffix = if info.reg_suffix { ".reg" } else { "" };
    format!("{}{}{}", info.lock_prefix, op, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_rows_follow_variant_order() {
        for arch in AieArch::ALL {
            assert_eq!(arch.info().arch, arch);
        }
    }

    #[test]
    fn triples() {
        assert_eq!(AieArch::Aie1.triple(), "aie");
        assert_eq!(AieArch::Aie2.triple(), "aie2");
        assert_eq!(AieArch::from_generation(1), Some(AieArch::Aie1));
        assert_eq!(AieArch::from_generation(2), Some(AieArch::Aie2));
        assert_eq!(AieArch::from_generation(3), None);
    }

    #[test]
    fn lock_names_aie1_use_reg_suffix() {
        assert_eq!(
            lock_intrinsic_name(AieArch::Aie1, LockAction::Acquire),
            "llvm.aie.lock.acquire.reg"
        );
        assert_eq!(
            lock_intrinsic_name(AieArch::Aie1, LockAction::AcquireGreaterEqual),
            "llvm.aie.lock.acquire.reg"
        );
        assert_eq!(
            lock_intrinsic_name(AieArch::Aie1, LockAction::Release),
            "llvm.aie.lock.release.reg"
        );
    }

    #[test]
    fn lock_names_aie2() {
        assert_eq!(
            lock_intrinsic_name(AieArch::Aie2, LockAction::Acquire),
            "llvm.aie2.acquire"
        );
        assert_eq!(
            lock_intrinsic_name(AieArch::Aie2, LockAction::Release),
            "llvm.aie2.release"
        );
    }

    #[test]
    fn acquire_ge_is_negated() {
        assert_eq!(LockAction::AcquireGreaterEqual.encode_value(3), -3);
        assert_eq!(LockAction::AcquireGreaterEqual.encode_value(0), 0);
        assert_eq!(LockAction::Acquire.encode_value(3), 3);
        assert_eq!(LockAction::Release.encode_value(1), 1);
    }

    #[test]
    fn device_parts_map_to_generations() {
        assert_eq!(AieDevice::Xcvc1902.arch(), AieArch::Aie1);
        assert_eq!(AieDevice::Xcve2802.arch(), AieArch::Aie2);
        assert_eq!(AieDevice::Npu.arch(), AieArch::Aie2);
    }
}
