use crate::error::{PipelineError, Result};
use std::io::Read;
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub fn run_with_timeout(
    mut cmd: Command,
    label: &str,
    stdin: Option<&[u8]>,
    timeout: Option<Duration>,
) -> Result<Output> {
    debug!("spawn {label} timeout={:?}", timeout);
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn()?;

    if let Some(bytes) = stdin {
        let mut pipe = child
            .stdin
            .take()
            .ok_or_else(|| std::io::Error::other(format!("{label}: stdin not captured")))?;
        use std::io::Write;
        pipe.write_all(bytes)?;
        pipe.flush().ok();
    }

    match timeout {
        Some(limit) => wait_with_timeout(&mut child, label, limit),
        None => Ok(child.wait_with_output()?),
    }
}

fn wait_with_timeout(child: &mut Child, label: &str, timeout: Duration) -> Result<Output> {
    // Drain pipes while waiting so a chatty child can't block on a full buffer.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf)?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            let stdout = join_reader(stdout_thread, "stdout")?;
            let stderr = join_reader(stderr_thread, "stderr")?;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("{label} timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait()?;
            let _ = join_reader(stdout_thread, "stdout");
            let _ = join_reader(stderr_thread, "stderr");
            return Err(PipelineError::Timeout {
                operation: label.to_string(),
                seconds: timeout.as_secs(),
            });
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

fn join_reader(
    handle: std::thread::JoinHandle<std::io::Result<Vec<u8>>>,
    stream: &str,
) -> Result<Vec<u8>> {
    let buf = handle
        .join()
        .map_err(|_| std::io::Error::other(format!("{stream} reader thread panicked")))??;
    Ok(buf)
}

pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    if secs > 0 {
        Some(Duration::from_secs(secs))
    } else {
        None
    }
}
