// A minimal set-top-box entry point. Remote-control input is read from the
// evdev nodes given on the command line, e.g.:
//
//     RUST_LOG=debug stbcore-example /dev/input/event0
//
// `STB_PROBE_HOST` overrides the host used for the startup connectivity check.

use ::std::{
    env,
    fs::File,
    io::Read,
    process::ExitCode,
    sync::mpsc::{self, Receiver, RecvTimeoutError, Sender},
    thread,
    time::Duration,
};

use ::stbcore::{
    input::rc::{
        ActionSink, Dispatcher, KeyEvent, KeyFlags, ProducerId, RcKey, INPUT_EVENT_SIZE,
        KEY_ASCII,
    },
    lifecycle::{Builder, Desktop, Lifecycle, MainLoop},
    net::{Prober, DEFAULT_CONNECT_TIMEOUT_SECS},
};
use ::tracing::{error, info, warn};
use ::tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_PROBE_HOST: &str = "https://www.example.com";

/// How long the main loop waits for input before checking for signals.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub fn main() -> ExitCode {
    ::tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let lifecycle = match Builder::new().build() {
        Ok(lifecycle) => lifecycle,
        Err(e) => {
            error!(error = %e, "Failed to set up process lifecycle");
            return ExitCode::FAILURE;
        }
    };

    let host = env::var("STB_PROBE_HOST").unwrap_or_else(|_| DEFAULT_PROBE_HOST.to_owned());
    match Prober::new().check_internet_access(&host, DEFAULT_CONNECT_TIMEOUT_SECS) {
        Ok(()) => info!(%host, "Internet access available"),
        Err(e) => warn!(%host, code = e.code(), error = %e, "No internet access"),
    }

    let (tx, rx) = mpsc::channel();
    for path in env::args().skip(1) {
        spawn_reader(path, tx.clone());
    }
    drop(tx);

    let mut app = App {
        keys: rx,
        dispatcher: Dispatcher::new(),
        actions: LoggingActions::default(),
    };

    lifecycle.run(&mut app).finish(&mut LoggingDesktop).into()
}

/// Reads raw input event records from an evdev node and forwards key events to
/// the main loop.
fn spawn_reader(path: String, tx: Sender<KeyEvent>) {
    thread::spawn(move || {
        let producer = ProducerId::new(path.as_str());
        let mut device = match File::open(&path) {
            Ok(device) => device,
            Err(e) => {
                error!(%path, error = %e, "Failed to open input device");
                return;
            }
        };

        let mut record = [0u8; INPUT_EVENT_SIZE];
        while device.read_exact(&mut record).is_ok() {
            if let Some(event) = KeyEvent::from_input_event(&producer, &record) {
                if tx.send(event).is_err() {
                    break;
                }
            }
        }
        warn!(%path, "Input device closed");
    });
}

struct App {
    keys: Receiver<KeyEvent>,
    dispatcher: Dispatcher,
    actions: LoggingActions,
}

impl MainLoop for App {
    fn iterate(&mut self, lifecycle: &Lifecycle) {
        match self.keys.recv_timeout(POLL_INTERVAL) {
            Ok(event) => self.dispatcher.dispatch(&event, &mut self.actions),
            Err(RecvTimeoutError::Timeout) => (),
            // No input devices left; keep running until told to stop.
            Err(RecvTimeoutError::Disconnected) => thread::sleep(POLL_INTERVAL),
        }

        for (code, flags) in self.actions.pending.drain(..) {
            if code == KEY_ASCII {
                let ascii = self.dispatcher.take_latched_ascii();
                info!(character = ?char::from_u32(ascii), "Text input");
            } else if code == RcKey::Power.value() && flags.contains(KeyFlags::LONG) {
                info!("Power held, shutting down");
                lifecycle.quit_main_loop(0);
            }
        }
    }
}

/// Stands in for the action map: logs every key press and queues it for the
/// main loop to act on.
#[derive(Default)]
struct LoggingActions {
    pending: Vec<(u32, KeyFlags)>,
}

impl ActionSink for LoggingActions {
    fn key_pressed(&mut self, producer: &ProducerId, code: u32, flags: KeyFlags) {
        match RcKey::try_from(code) {
            Ok(key) => info!(%producer, %key, ?flags, "Key pressed"),
            Err(code) => info!(%producer, code, ?flags, "Key pressed"),
        }
        self.pending.push((code, flags));
    }
}

struct LoggingDesktop;

impl Desktop for LoggingDesktop {
    fn paint(&mut self) {
        info!("Final repaint");
    }

    fn show_fatal_error(&mut self) {
        error!("Script engine crashed");
    }
}
