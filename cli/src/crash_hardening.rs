//! Process hardening applied before any anchor is loaded.
//!
//! A crashing `aura` must not leave anchor bytes behind in a core file. On
//! Unix the core size limit drops to zero; on Linux the process is also
//! marked non-dumpable, which keeps ptrace-style readers out as well.
//! `AURA_ALLOW_COREDUMPS=1` skips both for debugging.

use std::env;
#[cfg(unix)]
use std::io;

use anyhow::{Context, Result};

const OVERRIDE_VAR: &str = "AURA_ALLOW_COREDUMPS";

/// One protection that was put in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protection {
    CoreLimitZero,
    NonDumpable,
}

/// Apply every protection the platform supports. Returns what was applied;
/// empty when overridden or unsupported.
pub fn apply() -> Result<Vec<Protection>> {
    if override_requested(env::var(OVERRIDE_VAR).ok().as_deref()) {
        tracing::warn!(
            env_var = OVERRIDE_VAR,
            "Core dumps allowed; anchors may reach disk on a crash"
        );
        return Ok(Vec::new());
    }

    let applied = platform_protections().context("failed to harden process against core dumps")?;
    tracing::debug!(?applied, "Process hardened");
    Ok(applied)
}

fn override_requested(raw: Option<&str>) -> bool {
    raw.is_some_and(|raw| {
        matches!(
            raw.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes"
        )
    })
}

#[cfg(unix)]
fn platform_protections() -> Result<Vec<Protection>> {
    let mut applied = Vec::new();

    let limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    check(unsafe { libc::setrlimit(libc::RLIMIT_CORE, &raw const limit) })
        .context("setrlimit(RLIMIT_CORE, 0)")?;
    applied.push(Protection::CoreLimitZero);

    #[cfg(target_os = "linux")]
    {
        check(unsafe { libc::prctl(libc::PR_SET_DUMPABLE, 0, 0, 0, 0) })
            .context("prctl(PR_SET_DUMPABLE, 0)")?;
        applied.push(Protection::NonDumpable);
    }

    Ok(applied)
}

#[cfg(unix)]
fn check(rc: libc::c_int) -> io::Result<()> {
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn platform_protections() -> Result<Vec<Protection>> {
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::override_requested;

    #[test]
    fn override_accepts_truthy_values_only() {
        for raw in ["1", "true", "TRUE", " YeS "] {
            assert!(override_requested(Some(raw)), "{raw:?}");
        }
        for raw in ["", "0", "false", "no", "on"] {
            assert!(!override_requested(Some(raw)), "{raw:?}");
        }
        assert!(!override_requested(None));
    }
}
