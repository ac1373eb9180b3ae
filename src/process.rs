/// Reports whether `pid` refers to a process that is still running. A probe
/// that cannot run reports `false`.
pub fn is_process_alive(pid: u32) -> bool {
    // kill(0, ..) would address the whole process group.
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    probe(pid)
}

#[cfg(unix)]
fn probe(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    match kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        // Exists, but owned by another user.
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

#[cfg(windows)]
fn probe(pid: u32) -> bool {
    use std::process::{Command, Stdio};

    let output = Command::new("tasklist")
        .args(["/FI", &format!("PID eq {}", pid), "/NH", "/FO", "CSV"])
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output();

    match output {
        Ok(output) => tasklist_lists(pid, Some(&output.stdout)),
        Err(error) => {
            tracing::warn!(pid, error = %error, "tasklist probe failed, treating process as gone");
            tasklist_lists(pid, None)
        }
    }
}

#[cfg(not(any(unix, windows)))]
fn probe(pid: u32) -> bool {
    tracing::warn!(pid, "no process probe on this platform, treating process as gone");
    false
}

#[cfg_attr(not(windows), allow(dead_code))]
fn tasklist_lists(pid: u32, stdout: Option<&[u8]>) -> bool {
    let Some(stdout) = stdout else {
        return false;
    };
    let needle = format!("\"{}\"", pid);
    String::from_utf8_lossy(stdout)
        .lines()
        .any(|line| line.contains(&needle))
}
