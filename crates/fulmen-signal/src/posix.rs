//! POSIX signal installation: self-pipe-to-channel pattern.
//!
//! The actual OS signal handler is async-signal-unsafe territory — it may
//! only call functions documented as async-signal-safe. `write(2)` is one
//! of the few. The handler therefore does nothing but write the raw signal
//! number to a process-wide self-pipe; a dedicated dispatch thread blocks
//! reading that pipe and runs the real dispatch logic (ordering, timeouts,
//! logging, telemetry) in ordinary, signal-unsafe Rust.

use std::collections::HashMap;
use std::os::fd::{IntoRawFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, Once, OnceLock};
use std::thread;

use fulmen_error::{Error, ErrorCode};
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::unistd::{pipe, read};

static WRITE_FD: AtomicI32 = AtomicI32::new(-1);
static DISPATCH_STARTED: Once = Once::new();
static DISPATCHERS: OnceLock<Mutex<HashMap<i32, Arc<dyn Fn() + Send + Sync>>>> = OnceLock::new();

fn dispatchers() -> &'static Mutex<HashMap<i32, Arc<dyn Fn() + Send + Sync>>> {
    DISPATCHERS.get_or_init(|| Mutex::new(HashMap::new()))
}

extern "C" fn trampoline(signum: libc::c_int) {
    let fd = WRITE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = [signum as u8];
        unsafe {
            libc::write(fd, byte.as_ptr().cast(), 1);
        }
    }
}

fn ensure_dispatch_thread() {
    DISPATCH_STARTED.call_once(|| {
        let (read_fd, write_fd) = pipe().expect("failed to create self-pipe for signal dispatch");
        let read_fd: RawFd = read_fd.into_raw_fd();
        let write_fd: RawFd = write_fd.into_raw_fd();
        WRITE_FD.store(write_fd, Ordering::Relaxed);
        thread::Builder::new()
            .name("fulmen-signal-dispatch".to_string())
            .spawn(move || loop {
                let mut buf = [0u8; 1];
                match read(read_fd, &mut buf) {
                    Ok(0) | Err(_) => continue,
                    Ok(_) => {
                        let signum = i32::from(buf[0]);
                        let callback = dispatchers()
                            .lock()
                            .expect("signal dispatcher map poisoned")
                            .get(&signum)
                            .cloned();
                        if let Some(cb) = callback {
                            cb();
                        }
                    }
                }
            })
            .expect("failed to spawn signal dispatch thread");
    });
}

fn signal_enum(name: &str) -> Result<Signal, Error> {
    match name {
        "SIGINT" => Ok(Signal::SIGINT),
        "SIGTERM" => Ok(Signal::SIGTERM),
        "SIGHUP" => Ok(Signal::SIGHUP),
        "SIGQUIT" => Ok(Signal::SIGQUIT),
        "SIGUSR1" => Ok(Signal::SIGUSR1),
        "SIGUSR2" => Ok(Signal::SIGUSR2),
        other => Err(Error::new(
            ErrorCode::UnsupportedAlgorithm,
            format!("no POSIX signal mapping for '{other}'"),
        )),
    }
}

/// Install the process-wide handler for `name` (raw number `signum`),
/// routing delivery to `on_signal` via the dispatch thread. Idempotent per
/// signal number: re-installing simply replaces the callback.
pub fn install(name: &str, signum: i32, on_signal: impl Fn() + Send + Sync + 'static) -> Result<(), Error> {
    let sig = signal_enum(name)?;
    ensure_dispatch_thread();
    dispatchers()
        .lock()
        .expect("signal dispatcher map poisoned")
        .insert(signum, Arc::new(on_signal));
    unsafe {
        signal(sig, SigHandler::Handler(trampoline)).map_err(|e| {
            Error::new(
                ErrorCode::OperationFailed,
                format!("failed to install handler for {name}: {e}"),
            )
        })?;
    }
    Ok(())
}
