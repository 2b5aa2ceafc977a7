//! Open-file limit bootstrap

/// Raise the soft `RLIMIT_NOFILE` toward `target`, capped at the hard limit.
///
/// Returns the soft limit in effect afterwards, or `None` on platforms
/// without rlimits. The hard limit is never touched.
#[cfg(unix)]
pub fn raise_fd_limit(target: u64) -> std::io::Result<Option<u64>> {
    let mut lim = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };

    // SAFETY: getrlimit only writes into the struct we pass
    if unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut lim) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    let wanted = (target as libc::rlim_t).min(lim.rlim_max);
    if lim.rlim_cur >= wanted {
        return Ok(Some(lim.rlim_cur as u64));
    }

    lim.rlim_cur = wanted;
    // SAFETY: setrlimit only reads the struct we pass
    if unsafe { libc::setrlimit(libc::RLIMIT_NOFILE, &lim) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(Some(wanted as u64))
}

#[cfg(not(unix))]
pub fn raise_fd_limit(_target: u64) -> std::io::Result<Option<u64>> {
    Ok(None)
}
