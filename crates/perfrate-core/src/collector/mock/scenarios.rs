//! Pre-built mock filesystem scenarios for testing.
//!
//! These scenarios provide realistic pseudo-file states whose counters can
//! be advanced tick by tick.

use super::filesystem::MockFs;
use crate::collector::sysfs::DEFAULT_ENERGY_PATH;

/// Builds `/proc/stat` content for `cores` CPUs where every per-core
/// counter grows linearly with `tick`. The aggregate line is the sum of the
/// per-core lines, as on a real kernel.
pub fn proc_stat_fixture(cores: usize, tick: u64) -> String {
    let core_columns = |core: u64| -> [u64; 10] {
        [
            2500 + core + 10 * tick,
            125 + tick,
            750 + 5 * tick,
            20000 + 80 * tick,
            250 + 2 * tick,
            50,
            25 + tick,
            0,
            0,
            0,
        ]
    };

    let mut aggregate = [0u64; 10];
    let mut per_core = String::new();
    for core in 0..cores {
        let columns = core_columns(core as u64);
        for (sum, value) in aggregate.iter_mut().zip(columns) {
            *sum += value;
        }
        per_core.push_str(&format!("cpu{core} {}\n", join(&columns)));
    }

    format!(
        "cpu  {}\n{per_core}intr {} 50 0 0 0 0 0 0 0 1 0 0 0 100 0 0 1000\nctxt {}\nbtime 1700000000\nprocesses {}\nprocs_running 2\nprocs_blocked 0\nsoftirq 200000 0 50000 10 20000 5000 0 100 60000 0 65000\n",
        join(&aggregate),
        1_000_000 + 500 * tick,
        500_000 + 300 * tick,
        10_000 + tick,
    )
}

/// Builds `/proc/meminfo` content; `MemFree` drops by 1024 kB per tick and
/// `Dirty` grows by 8 kB per tick.
pub fn meminfo_fixture(tick: u64) -> String {
    format!(
        "\
MemTotal:       16384000 kB
MemFree:        {free} kB
MemAvailable:   12000000 kB
Buffers:          512000 kB
Cached:          2048000 kB
SwapCached:            0 kB
Active:          4096000 kB
Inactive:        2048000 kB
Active(anon):    1024000 kB
Inactive(anon):   256000 kB
Active(file):    3072000 kB
Inactive(file):  1792000 kB
Unevictable:           0 kB
Mlocked:               0 kB
SwapTotal:       4096000 kB
SwapFree:        4096000 kB
Dirty:           {dirty} kB
Writeback:             0 kB
AnonPages:       1200000 kB
Mapped:           300000 kB
Shmem:             80000 kB
KReclaimable:     256000 kB
Slab:             512000 kB
SReclaimable:     256000 kB
SUnreclaim:       256000 kB
KernelStack:       12000 kB
PageTables:        24000 kB
CommitLimit:    12288000 kB
Committed_AS:    6000000 kB
VmallocTotal:   34359738367 kB
HugePages_Total:       0
Hugepagesize:       2048 kB
",
        free = 8_192_000 - 1024 * tick,
        dirty = 1024 + 8 * tick,
    )
}

/// Power-monitor reading in milliwatts.
pub fn energy_fixture(tick: u64) -> String {
    format!("{}\n", 4000 + 25 * tick)
}

fn join(values: &[u64]) -> String {
    values
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

impl MockFs {
    /// Creates a typical 4-core system at tick 0.
    ///
    /// Includes `/proc/stat`, `/proc/meminfo` and the default energy
    /// monitor attribute.
    pub fn typical_system() -> Self {
        Self::with_cores(4)
    }

    /// Creates a system with `cores` CPUs at tick 0.
    pub fn with_cores(cores: usize) -> Self {
        let mut fs = Self::new();
        fs.add_file("/proc/stat", proc_stat_fixture(cores, 0));
        fs.add_file("/proc/meminfo", meminfo_fixture(0));
        fs.add_file(DEFAULT_ENERGY_PATH, energy_fixture(0));
        fs
    }

    /// Rewrites every scenario file with the counters of `tick`.
    pub fn advance(&self, cores: usize, tick: u64) -> std::io::Result<()> {
        self.update_file("/proc/stat", proc_stat_fixture(cores, tick))?;
        self.update_file("/proc/meminfo", meminfo_fixture(tick))?;
        self.update_file(DEFAULT_ENERGY_PATH, energy_fixture(tick))
    }
}
