//! Real-time scheduling helpers (Linux SCHED_FIFO / affinity / mlockall).
//!
//! Applied once, on the main thread, before the controller spawns its
//! threads: Linux threads inherit the scheduling policy and affinity of the
//! thread that creates them.

use crate::cli::{RtArgs, RtLock};
use std::sync::OnceLock;

static RT_ONCE: OnceLock<()> = OnceLock::new();

pub fn setup_rt_once(args: &RtArgs) {
    if !args.rt {
        return;
    }
    RT_ONCE.get_or_init(|| {
        let lock = args.rt_lock.unwrap_or_else(RtLock::os_default);
        match lock_memory(lock) {
            Ok(()) => tracing::info!(?lock, "rt: memory lock applied"),
            Err(e) => tracing::warn!(error = %e, "rt: mlockall failed"),
        }
        apply_scheduling(args);
    });
}

#[cfg(unix)]
fn lock_memory(lock: RtLock) -> eyre::Result<()> {
    use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};

    let flags = match lock {
        RtLock::None => return Ok(()),
        RtLock::Current => MCL_CURRENT,
        RtLock::All => MCL_CURRENT | MCL_FUTURE,
    };
    // SAFETY: mlockall only takes flags and touches no caller memory.
    if unsafe { mlockall(flags) } == 0 {
        return Ok(());
    }
    let err = std::io::Error::last_os_error();
    let retryable = matches!(err.raw_os_error(), Some(c) if c == libc::EPERM || c == libc::ENOMEM);
    if lock == RtLock::All && retryable {
        // SAFETY: as above.
        if unsafe { mlockall(MCL_CURRENT) } == 0 {
            tracing::warn!(error = %err, "rt: locking future pages failed, locked current only");
            return Ok(());
        }
    }
    let mut msg = format!("{err}");
    if retryable {
        if let Some(limit) = memlock_limit() {
            msg.push_str(&format!("; {limit}"));
        }
        msg.push_str("; needs CAP_IPC_LOCK (or root) and a large enough 'ulimit -l'");
    }
    Err(eyre::eyre!(msg))
}

#[cfg(not(unix))]
fn lock_memory(lock: RtLock) -> eyre::Result<()> {
    if lock == RtLock::None {
        Ok(())
    } else {
        eyre::bail!("memory locking is not supported on this OS")
    }
}

#[cfg(unix)]
fn memlock_limit() -> Option<String> {
    let mut rlim = std::mem::MaybeUninit::<libc::rlimit>::uninit();
    // SAFETY: getrlimit writes a full rlimit on success.
    let rc = unsafe { libc::getrlimit(libc::RLIMIT_MEMLOCK, rlim.as_mut_ptr()) };
    if rc != 0 {
        return None;
    }
    // SAFETY: rc == 0 means the struct was initialized.
    let cur = unsafe { rlim.assume_init() }.rlim_cur;
    Some(if cur == libc::RLIM_INFINITY {
        "memlock limit: unlimited".to_string()
    } else {
        format!("memlock limit: {} KiB", cur / 1024)
    })
}

#[cfg(target_os = "linux")]
fn apply_scheduling(args: &RtArgs) {
    match set_fifo(args.rt_prio) {
        Ok(prio) => tracing::info!(prio, "rt: SCHED_FIFO applied"),
        Err(e) => tracing::warn!(error = %e, "rt: SCHED_FIFO not applied"),
    }
    let cpu = args.rt_cpu.unwrap_or(0);
    match pin_to_cpu(cpu) {
        Ok(()) => tracing::info!(cpu, "rt: pinned"),
        Err(e) => tracing::warn!(error = %e, cpu, "rt: affinity not applied"),
    }
}

#[cfg(not(target_os = "linux"))]
fn apply_scheduling(args: &RtArgs) {
    if args.rt_prio.is_some() || args.rt_cpu.is_some() {
        tracing::warn!("rt: SCHED_FIFO and CPU affinity are Linux only; ignored");
    }
}

/// Whether the process holds CAP_SYS_NICE in its effective or permitted set.
#[cfg(target_os = "linux")]
fn has_sys_nice() -> bool {
    const CAP_SYS_NICE: u64 = 1 << 23;
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return false;
    };
    status.lines().any(|line| {
        if let Some(hex) = line
            .strip_prefix("CapEff:")
            .or_else(|| line.strip_prefix("CapPrm:"))
            && let Ok(caps) = u64::from_str_radix(hex.trim(), 16)
        {
            return caps & CAP_SYS_NICE != 0;
        }
        false
    })
}

#[cfg(target_os = "linux")]
fn set_fifo(prio: Option<i32>) -> eyre::Result<i32> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

    // SAFETY: geteuid has no preconditions.
    let euid = unsafe { libc::geteuid() };
    if euid != 0 && !has_sys_nice() {
        eyre::bail!(
            "needs CAP_SYS_NICE or root (euid {euid}); try 'sudo setcap cap_sys_nice=ep /path/to/roto'"
        );
    }
    // SAFETY: plain queries on a policy constant.
    let (min, max) = unsafe { (sched_get_priority_min(SCHED_FIFO), sched_get_priority_max(SCHED_FIFO)) };
    let (min, max) = if min < 0 || max < 0 { (1, 99) } else { (min, max) };
    let prio = prio.unwrap_or(max).clamp(min, max);
    let param = sched_param {
        sched_priority: prio,
    };
    // SAFETY: param outlives the call; pid 0 is the calling thread.
    if unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) } != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    Ok(prio)
}

#[cfg(target_os = "linux")]
fn pin_to_cpu(cpu: usize) -> eyre::Result<()> {
    use libc::{CPU_ISSET, CPU_SET, CPU_ZERO, cpu_set_t};
    let capacity = std::mem::size_of::<cpu_set_t>() * 8;
    if cpu >= capacity {
        eyre::bail!("CPU {cpu} exceeds cpu_set_t capacity {capacity}");
    }
    // SAFETY: cpu_set_t is plain data; an all-zero set is valid.
    let mut allowed: cpu_set_t = unsafe { std::mem::zeroed() };
    // SAFETY: allowed is a valid, correctly sized set.
    let rc = unsafe { libc::sched_getaffinity(0, std::mem::size_of::<cpu_set_t>(), &mut allowed) };
    if rc != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    // SAFETY: cpu < capacity was checked above.
    if !unsafe { CPU_ISSET(cpu, &allowed) } {
        eyre::bail!("CPU {cpu} not permitted by the current affinity mask");
    }
    // SAFETY: as above.
    let mut desired: cpu_set_t = unsafe { std::mem::zeroed() };
    unsafe {
        CPU_ZERO(&mut desired);
        CPU_SET(cpu, &mut desired);
    }
    // SAFETY: desired is a valid, correctly sized set.
    let rc = unsafe { libc::sched_setaffinity(0, std::mem::size_of::<cpu_set_t>(), &desired) };
    if rc != 0 {
        return Err(eyre::eyre!(std::io::Error::last_os_error()));
    }
    Ok(())
}
