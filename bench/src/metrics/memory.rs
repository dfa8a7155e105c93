//! Process memory probe.
//!
//! Reports the peak resident set size of the current process as returned by
//! `getrusage(RUSAGE_SELF)`. The value only ever grows over a run.

use std::fmt;

/// Peak resident memory of this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct PeakMemory {
    pub kilobytes: u64,
}

impl fmt::Display for PeakMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} KB", self.kilobytes)
    }
}

/// Current peak RSS. Zero when the platform cannot report it.
#[cfg(unix)]
pub fn peak_memory() -> PeakMemory {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if result != 0 {
        return PeakMemory::default();
    }

    let max_rss = u64::try_from(usage.ru_maxrss).unwrap_or(0);
    // macOS reports bytes, Linux and the BSDs report kilobytes
    let kilobytes = if cfg!(target_os = "macos") {
        max_rss / 1024
    } else {
        max_rss
    };
    PeakMemory { kilobytes }
}

#[cfg(not(unix))]
pub fn peak_memory() -> PeakMemory {
    PeakMemory::default()
}
