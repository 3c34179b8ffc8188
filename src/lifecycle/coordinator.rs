//! Process lifecycle: shutdown requests, signal handling and exit codes.

use ::parking_lot::Mutex;
use ::std::{
    process::ExitCode,
    sync::atomic::{AtomicBool, AtomicI32, Ordering},
};
use ::strum::Display;
use ::tokio::sync::watch;
use ::tracing::{debug, info, warn};

use crate::{
    errors::Result,
    lifecycle::{signals::TermSignal, WakeTimer},
};

/// Exit code reserved for "the embedded script engine crashed".
pub const EXIT_SCRIPT_CRASHED: i32 = 5;

/// Exit codes above this value report death by signal (`128 + signo`).
const SIGNAL_EXIT_BASE: i32 = 128;

/// The phases of the process lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
pub enum State {
    /// The main loop is accepting work.
    Running,
    /// A shutdown was requested. The main loop stops at its next iteration.
    ShuttingDown,
    /// The main loop has returned.
    Terminated,
}

/// The application's event loop, driven by [`Lifecycle::run`].
pub trait MainLoop {
    /// Process one batch of pending work.
    ///
    /// Implementations should return promptly (poll with a timeout rather than
    /// blocking indefinitely) so termination signals are noticed.
    fn iterate(&mut self, lifecycle: &Lifecycle);
}

/// The graphics subsystem, as far as the final moments of the process are
/// concerned.
pub trait Desktop {
    /// Repaint the desktops after an orderly exit.
    fn paint(&mut self);

    /// Show the fatal error screen after the script engine crashed.
    fn show_fatal_error(&mut self);
}

/// Coordinates the shutdown of the process.
///
/// There is exactly one [`Lifecycle`] per process. It owns the exit code the
/// process will return, the `SIGTERM` registration, and the wake-up timer that
/// must be cleared on the way out.
///
/// # Shutdown
///
/// A shutdown starts either from `SIGTERM` (exit code `128 + signo`) or from a
/// call to [`quit_main_loop`] with an arbitrary exit code. Either way the
/// wake-up timer flag is reset on a best-effort basis, the exit code is
/// recorded and the main loop is asked to stop. The signal handler does none
/// of this work itself; it only flags the signal, which [`run`] picks up at
/// the top of the next iteration.
///
/// # Example
///
/// ```no_run
/// use ::stbcore::lifecycle::{Builder, Lifecycle, MainLoop};
///
/// struct App;
///
/// impl MainLoop for App {
///     fn iterate(&mut self, lifecycle: &Lifecycle) {
///         // poll input, timers, sockets...
///         # lifecycle.quit_main_loop(0);
///     }
/// }
///
/// let lifecycle = Builder::new().build().expect("Failed to set up lifecycle");
/// let status = lifecycle.run(&mut App);
/// ::std::process::exit(status.code());
/// ```
///
/// [`quit_main_loop`]: Self::quit_main_loop
/// [`run`]: Self::run
#[derive(Debug)]
pub struct Lifecycle {
    wake_timer: WakeTimer,
    state: Mutex<State>,
    /// The code the process will exit with. Written by the shutdown path,
    /// read once the main loop has returned.
    exit_code: AtomicI32,
    /// The signal behind the recorded exit code, or zero if it was requested
    /// by the application.
    exit_signal: AtomicI32,
    /// Stores an outstanding request for the main loop to return.
    quit_request: AtomicBool,
    term_signal: Option<TermSignal>,
    notifier: watch::Sender<State>,
}

impl Lifecycle {
    /// Constructs a new lifecycle in the [`State::Running`] state, with an exit
    /// code of zero and no signal handler installed.
    pub fn new(wake_timer: WakeTimer) -> Self {
        let (notifier, _) = watch::channel(State::Running);
        Self {
            wake_timer,
            state: Mutex::new(State::Running),
            exit_code: AtomicI32::new(0),
            exit_signal: AtomicI32::new(0),
            quit_request: AtomicBool::new(false),
            term_signal: None,
            notifier,
        }
    }

    /// Installs the `SIGTERM` handler. Repeated calls are no-ops.
    pub fn catch_term_signal(&mut self) -> Result<()> {
        if self.term_signal.is_none() {
            self.term_signal = Some(TermSignal::register()?);
        }
        Ok(())
    }

    /// The current lifecycle state.
    pub fn state(&self) -> State {
        *self.state.lock()
    }

    /// The exit code recorded by the most recent shutdown, or zero.
    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// Returns whether the main loop has been asked to return.
    pub fn is_requesting_quit(&self) -> bool {
        self.quit_request.load(Ordering::SeqCst)
    }

    /// Subscribe to lifecycle state changes, e.g. to stop a background worker
    /// once shutdown begins.
    pub fn subscribe(&self) -> watch::Receiver<State> {
        self.notifier.subscribe()
    }

    /// Checks for a pending termination signal and, if one arrived, runs the
    /// shutdown sequence with exit code `128 + signo`.
    ///
    /// Returns `true` if a signal was handled. [`run`] calls this at the top
    /// of every iteration; callers that drive their own loop should do the
    /// same.
    ///
    /// [`run`]: Self::run
    pub fn poll_signals(&self) -> bool {
        let Some(signo) = self.term_signal.as_ref().and_then(TermSignal::take) else {
            return false;
        };

        info!(signo, "Termination signal received");
        self.shutdown(SIGNAL_EXIT_BASE + signo, signo);
        true
    }

    /// Requests a controlled shutdown with the given exit code.
    ///
    /// The wake-up timer flag is reset first. Failure to do so is logged and
    /// otherwise ignored, the shutdown proceeds regardless. The exit code is
    /// then recorded and the main loop asked to return.
    ///
    /// Calling this again before the main loop returns re-runs the sequence and
    /// replaces the exit code. Calls after the main loop returned are ignored.
    pub fn quit_main_loop(&self, exit_code: i32) {
        self.shutdown(exit_code, 0);
    }

    /// Runs the shutdown sequence. `signo` is zero unless a signal triggered
    /// it.
    fn shutdown(&self, exit_code: i32, signo: i32) {
        {
            let mut state = self.state.lock();
            if *state == State::Terminated {
                warn!(exit_code, "Ignoring shutdown request after main loop returned");
                return;
            }
            *state = State::ShuttingDown;
        }
        debug!(exit_code, "Shutting down");
        self.notifier.send_replace(State::ShuttingDown);

        match self.wake_timer.clear() {
            Ok(method) => debug!(?method, "Wake-up timer cleared"),
            Err(e) => warn!(error = %e, "Failed to clear wake-up timer"),
        }

        self.exit_code.store(exit_code, Ordering::SeqCst);
        self.exit_signal.store(signo, Ordering::SeqCst);
        self.quit_request.store(true, Ordering::SeqCst);
    }

    /// Drives `main_loop` until a shutdown is requested, then returns the exit
    /// status the process should report.
    pub fn run<L>(&self, main_loop: &mut L) -> ExitStatus
    where
        L: MainLoop + ?Sized,
    {
        debug!("Entering main loop");
        loop {
            self.poll_signals();
            if self.is_requesting_quit() {
                break;
            }
            main_loop.iterate(self);
        }

        *self.state.lock() = State::Terminated;
        self.notifier.send_replace(State::Terminated);

        let status = ExitStatus {
            code: self.exit_code(),
            signal: match self.exit_signal.load(Ordering::SeqCst) {
                0 => None,
                signo => Some(signo),
            },
        };
        debug!(%status, "Main loop returned");
        status
    }
}

/// The exit code recorded when the main loop returned, and the signal that
/// caused it, if any.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExitStatus {
    code: i32,
    signal: Option<i32>,
}

impl ExitStatus {
    pub const fn code(self) -> i32 {
        self.code
    }

    /// Returns `true` if the script engine crashed.
    pub const fn is_script_crash(self) -> bool {
        self.code == EXIT_SCRIPT_CRASHED
    }

    /// The terminating signal, if the process is exiting because of one.
    /// Application exit codes above 128 never count as signals.
    pub const fn signal(self) -> Option<i32> {
        self.signal
    }

    /// Performs the final display update and hands the status back for the
    /// process to exit with.
    ///
    /// A script crash shows the fatal error screen instead of the regular
    /// repaint.
    pub fn finish<D>(self, desktop: &mut D) -> Self
    where
        D: Desktop + ?Sized,
    {
        if self.is_script_crash() {
            warn!("Script engine crashed (exit code {EXIT_SCRIPT_CRASHED})");
            desktop.show_fatal_error();
        } else {
            desktop.paint();
        }
        self
    }
}

impl ::std::fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
        match self.signal {
            Some(signo) => write!(f, "{} (signal {signo})", self.code),
            None => write!(f, "{}", self.code),
        }
    }
}

impl From<ExitStatus> for ExitCode {
    /// Only the low byte of the code is visible to the parent process.
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code as u8)
    }
}
