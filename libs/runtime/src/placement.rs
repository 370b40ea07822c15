//! Thread placement: CPU affinity and scheduling class.
//!
//! Placement is applied from inside each worker thread right after spawn.
//! Realtime scheduling needs the matching OS capability; every failure here
//! is reported to the caller, logged by the Manager, and never fatal.

use std::collections::BTreeSet;
use std::io;

/// Scheduling class for a worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedClass {
    /// The OS default time-sharing class.
    #[default]
    Default,
    /// Realtime first-in-first-out.
    Fifo,
    /// Realtime round-robin.
    RoundRobin,
}

/// Desired thread placement for one managed actor.
#[derive(Debug, Clone, Default)]
pub struct Placement {
    /// Logical cores to pin the worker to. Empty means no pinning.
    pub affinity: BTreeSet<usize>,
    /// Scheduling priority; 0 leaves the thread at the OS default.
    pub priority: i32,
    /// Scheduling class applied together with a non-zero priority.
    pub class: SchedClass,
}

impl Placement {
    /// Pin the worker to a set of logical cores.
    pub fn pinned<I: IntoIterator<Item = usize>>(cores: I) -> Self {
        Self {
            affinity: cores.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Request a realtime class with the given priority.
    pub fn realtime(class: SchedClass, priority: i32) -> Self {
        Self {
            priority,
            class,
            ..Self::default()
        }
    }
}

/// Number of logical cores visible to this process.
pub fn logical_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[cfg(target_os = "linux")]
mod sys {
    use super::*;

    pub(crate) fn pin_current_thread(cores: &BTreeSet<usize>) -> io::Result<()> {
        // SAFETY: cpu_set_t is plain-old-data; zeroed is its empty state, and
        // CPU_SET only writes inside the set.
        let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
        unsafe {
            libc::CPU_ZERO(&mut set);
            for &core in cores {
                libc::CPU_SET(core, &mut set);
            }
        }
        // SAFETY: pid 0 targets the calling thread; the set outlives the call.
        let rc = unsafe {
            libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set)
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(crate) fn set_current_priority(class: SchedClass, priority: i32) -> io::Result<()> {
        let policy = match class {
            SchedClass::Default => libc::SCHED_OTHER,
            SchedClass::Fifo => libc::SCHED_FIFO,
            SchedClass::RoundRobin => libc::SCHED_RR,
        };
        let param = libc::sched_param {
            sched_priority: priority,
        };
        // SAFETY: the param struct outlives the call.
        let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), policy, &param) };
        if rc != 0 {
            return Err(io::Error::from_raw_os_error(rc));
        }
        Ok(())
    }

    pub(crate) fn current_thread_id() -> i64 {
        // SAFETY: gettid has no preconditions.
        unsafe { libc::syscall(libc::SYS_gettid) as i64 }
    }
}

#[cfg(not(target_os = "linux"))]
mod sys {
    use super::*;

    pub(crate) fn pin_current_thread(_cores: &BTreeSet<usize>) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "thread affinity is only supported on Linux",
        ))
    }

    pub(crate) fn set_current_priority(_class: SchedClass, _priority: i32) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "scheduling classes are only supported on Linux",
        ))
    }

    pub(crate) fn current_thread_id() -> i64 {
        0
    }
}

/// Pin the calling thread to the given cores.
pub fn pin_current_thread(cores: &BTreeSet<usize>) -> io::Result<()> {
    sys::pin_current_thread(cores)
}

/// Apply a scheduling class and priority to the calling thread.
pub fn set_current_priority(class: SchedClass, priority: i32) -> io::Result<()> {
    sys::set_current_priority(class, priority)
}

/// OS thread id of the calling thread (0 where unavailable).
pub fn current_thread_id() -> i64 {
    sys::current_thread_id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_builders() {
        let p = Placement::pinned([0, 2]);
        assert_eq!(p.affinity.iter().copied().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(p.priority, 0);

        let p = Placement::realtime(SchedClass::Fifo, 40);
        assert!(p.affinity.is_empty());
        assert_eq!(p.class, SchedClass::Fifo);
        assert_eq!(p.priority, 40);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn pin_to_first_core() {
        // Core 0 always exists; pinning the test thread is harmless.
        pin_current_thread(&[0usize].into_iter().collect()).unwrap();
        assert!(current_thread_id() > 0);
    }
}
