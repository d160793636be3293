// src/exec/supervisor.rs

//! The process supervisor: spawns the child a manifest describes, watches it
//! from a single cooperative loop, enforces the soft timeout and publishes
//! the terminal status record.

use std::collections::BTreeMap;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, ensure};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tokio::time;
use tracing::{debug, info};

use crate::coord;
use crate::exec::LazyOutputWriter;
use crate::exec::template;
use crate::manifest::{OutputMode, RunManifest, StatusRecord};

/// Upper bound on how long a loop iteration may sleep. This caps the latency
/// between the timeout deadline passing and the next signal delivery.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Wait per post-exit drain sweep. Must be non-zero: pipe readiness reaches
/// the task through the reactor only once it parks, so an instant poll can
/// see an empty pipe whose final chunk is still buffered in the kernel. Kept
/// short so a grandchild holding the pipe open cannot stall finalisation.
const DRAIN_INTERVAL: Duration = Duration::from_millis(20);

/// Execute the run a manifest describes, through to the `status` marker.
///
/// Side-effect order is part of the on-disk protocol: the `out` marker is
/// created before the child is spawned ("run started"), and the atomic
/// `status` write is the very last action ("run finished"). The timeout is
/// soft: past the deadline the child receives `SIGXCPU` once per poll wake,
/// never anything harsher, so a child that traps the signal decides its own
/// fate. Errors here are fatal for the run; no retries happen at this layer.
pub async fn execute(manifest: &RunManifest) -> Result<StatusRecord> {
    // Creating the output file signals that the run has started, whether or
    // not anything is ever piped into it.
    let out_path = manifest.output_file_path("out");
    let out_file = std::fs::File::create(&out_path)
        .with_context(|| format!("creating {}", out_path.display()))?;
    let stdout = match manifest.output {
        OutputMode::Stdout => Stdio::from(out_file),
        OutputMode::None => Stdio::null(),
    };

    let out_display = out_path.to_string_lossy().into_owned();
    let output_subdir = manifest.output_subdir().to_string_lossy().into_owned();
    let instance_path = manifest
        .config
        .instance_dir
        .join(&manifest.instance)
        .to_string_lossy()
        .into_owned();

    let scalar = |name: &str| -> Option<String> {
        match name {
            "INSTANCE" => Some(instance_path.clone()),
            "REPETITION" => Some(manifest.repetition.to_string()),
            "OUTPUT" => Some(out_display.clone()),
            "OUTPUT_SUBDIR" => Some(output_subdir.clone()),
            _ => None,
        }
    };
    let list = |name: &str| (name == "EXTRA_ARGS").then(|| manifest.extra_args());

    let argv = template::expand_args(&manifest.args, &scalar, &list)?;
    ensure!(!argv.is_empty(), "argument list expanded to nothing");

    let workdir = match &manifest.workdir {
        Some(tpl) => PathBuf::from(template::expand_string(tpl, &scalar)?),
        None => manifest.config.base_dir.clone(),
    };

    let environ = build_child_environ(manifest);

    info!(
        experiment = %manifest.experiment,
        instance = %manifest.instance,
        repetition = manifest.repetition,
        cmd = %argv.join(" "),
        "starting run child"
    );

    let start = Instant::now();
    let mut child = Command::new(&argv[0])
        .args(&argv[1..])
        .current_dir(&workdir)
        .env_clear()
        .envs(&environ)
        .stdout(stdout)
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning run child '{}'", argv[0]))?;

    let stderr = child
        .stderr
        .take()
        .context("child was spawned without a stderr pipe")?;
    let mut writer = LazyOutputWriter::new(stderr, manifest.aux_file_path("stderr"));
    let mut stderr_open = true;

    // One cooperative loop interleaves exit polling, deadline checking and
    // stderr draining, so none of the three can starve another.
    let exit_status = loop {
        if let Some(status) = child.try_wait().context("polling child status")? {
            break status;
        }

        if let Some(limit) = manifest.timeout {
            if start.elapsed().as_secs_f64() > limit {
                debug!(experiment = %manifest.experiment, "deadline passed, signalling child");
                send_time_limit_signal(&child)?;
            }
        }

        if stderr_open {
            match time::timeout(POLL_INTERVAL, writer.progress()).await {
                Ok(Ok(true)) => {}
                Ok(Ok(false)) => stderr_open = false,
                Ok(Err(e)) => return Err(e),
                Err(_) => {} // nothing ready within the poll interval
            }
        } else {
            time::sleep(POLL_INTERVAL).await;
        }
    };

    // Bounded sweeps pick up whatever the child wrote between the last wake
    // and its exit; the loop ends at EOF or on the first sweep with no data.
    while stderr_open {
        match time::timeout(DRAIN_INTERVAL, writer.progress()).await {
            Ok(Ok(true)) => {}
            Ok(Ok(false)) => stderr_open = false,
            Ok(Err(e)) => return Err(e),
            Err(_) => break,
        }
    }
    writer.close()?;

    let walltime = start.elapsed().as_secs_f64();
    let timed_out = manifest.timeout.is_some_and(|limit| walltime > limit);

    // A termination signal and an exit code are mutually exclusive; record
    // whichever the child actually died to. The timeout flag is advisory and
    // says nothing about *why* the child ended.
    let record = match exit_status.signal() {
        Some(signum) => StatusRecord {
            timeout: timed_out,
            walltime,
            status: None,
            signal: Some(signal_name(signum)),
        },
        None => {
            let code = exit_status
                .code()
                .context("child exit status carries neither code nor signal")?;
            StatusRecord {
                timeout: timed_out,
                walltime,
                status: Some(code),
                signal: None,
            }
        }
    };

    info!(
        experiment = %manifest.experiment,
        instance = %manifest.instance,
        walltime,
        status = ?record.status,
        signal = ?record.signal,
        timed_out,
        "run finished"
    );

    // The status marker is the "run finished" signal for every downstream
    // consumer, so it goes last, atomically.
    let status_path = manifest.output_file_path("status");
    coord::write_marker_atomic(&status_path, record.to_yaml()?.as_bytes())?;

    Ok(record)
}

/// Child environment: a copy of our own, with the three search-path
/// variables prepended from the build closure (inherited value kept as the
/// trailing fallback) and the manifest's explicit assignments layered on top.
/// The supervisor's own environment is never touched.
fn build_child_environ(manifest: &RunManifest) -> BTreeMap<String, String> {
    let mut environ: BTreeMap<String, String> = std::env::vars().collect();
    prepend_paths(&mut environ, "PATH", &manifest.bin_paths());
    prepend_paths(&mut environ, "LD_LIBRARY_PATH", &manifest.ldso_paths());
    prepend_paths(&mut environ, "PYTHONPATH", &manifest.python_paths());
    environ.extend(manifest.merged_environ());
    environ
}

fn prepend_paths(environ: &mut BTreeMap<String, String>, var: &str, paths: &[PathBuf]) {
    let mut joined = paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(":");
    if let Some(inherited) = environ.get(var) {
        if !inherited.is_empty() {
            if !joined.is_empty() {
                joined.push(':');
            }
            joined.push_str(inherited);
        }
    }
    environ.insert(var.to_string(), joined);
}

/// Deliver the catchable time-limit signal to a still-running child.
fn send_time_limit_signal(child: &Child) -> Result<()> {
    // id() is None only once the child has been reaped, and we only get here
    // right after try_wait reported it still running.
    let Some(pid) = child.id() else { return Ok(()) };
    match signal::kill(Pid::from_raw(pid as i32), Signal::SIGXCPU) {
        Ok(()) => Ok(()),
        // Exited between the wait poll and the signal; the next iteration
        // will observe that.
        Err(Errno::ESRCH) => Ok(()),
        Err(e) => Err(e).context("delivering SIGXCPU to run child"),
    }
}

fn signal_name(signum: i32) -> String {
    match Signal::try_from(signum) {
        Ok(sig) => sig.as_str().to_string(),
        Err(_) => format!("SIG{signum}"),
    }
}
