//! Front-processor wake-up timer management.

use ::std::{
    fs::OpenOptions,
    io::Write,
    os::fd::AsRawFd,
    path::{Path, PathBuf},
};
use ::tracing::debug;

use crate::errors::{cvt, Context, Result};

/// Procfs entry which records whether the box was woken by a timer. Written by
/// the front processor driver, read by the bootloader and by the application
/// on its next start.
pub const WAKEUP_FLAG_PATH: &str = "/proc/stb/fp/was_timer_wakeup";

/// Front processor device node on boxes whose driver predates the procfs
/// interface.
pub const FRONT_PROCESSOR_DEVICE: &str = "/dev/dbox/fp0";

/// `FP_CLEAR_WAKEUP_TIMER` ioctl request understood by [`FRONT_PROCESSOR_DEVICE`].
pub const FP_CLEAR_WAKEUP_TIMER: u64 = 10;

/// How a [`WakeTimer`] was cleared.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearMethod {
    /// `0` was written to the procfs flag.
    Flag,
    /// The procfs flag was unavailable and the device ioctl was issued.
    Ioctl,
}

/// The persisted "woken by timer" indicator of the front processor.
///
/// If the application exits without clearing the flag, the next start will
/// believe it was woken by a scheduled recording and may immediately return
/// to standby.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WakeTimer {
    flag_path: PathBuf,
    device_path: PathBuf,
    clear_request: u64,
}

impl Default for WakeTimer {
    fn default() -> Self {
        Self::new(WAKEUP_FLAG_PATH, FRONT_PROCESSOR_DEVICE, FP_CLEAR_WAKEUP_TIMER)
    }
}

impl WakeTimer {
    pub fn new(
        flag_path: impl Into<PathBuf>,
        device_path: impl Into<PathBuf>,
        clear_request: u64,
    ) -> Self {
        Self {
            flag_path: flag_path.into(),
            device_path: device_path.into(),
            clear_request,
        }
    }

    pub fn flag_path(&self) -> &Path {
        &self.flag_path
    }

    pub fn device_path(&self) -> &Path {
        &self.device_path
    }

    pub fn clear_request(&self) -> u64 {
        self.clear_request
    }

    /// Resets the wake-up flag.
    ///
    /// The procfs flag is preferred. The device ioctl is only attempted if the
    /// flag cannot be opened for writing.
    pub fn clear(&self) -> Result<ClearMethod> {
        match OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.flag_path)
        {
            Ok(mut flag) => {
                debug!(path = %self.flag_path.display(), "Clearing wake-up timer flag");
                flag.write_all(b"0")
                    .context("Failed to reset wake-up timer flag")
                    .function("write")?;
                Ok(ClearMethod::Flag)
            }
            Err(err) => {
                debug!(
                    path = %self.flag_path.display(),
                    %err,
                    "Wake-up timer flag unavailable, falling back to device ioctl"
                );
                self.clear_via_device()?;
                Ok(ClearMethod::Ioctl)
            }
        }
    }

    fn clear_via_device(&self) -> Result<()> {
        let device = OpenOptions::new()
            .write(true)
            .open(&self.device_path)
            .context(format!(
                "Failed to open {} for wake-up timer clear",
                self.device_path.display()
            ))
            .function("open")?;

        // SAFETY: the descriptor is owned by `device` and outlives the call. The
        // clear request takes no argument.
        cvt(unsafe { libc::ioctl(device.as_raw_fd(), self.clear_request as _) })
            .context("FP_CLEAR_WAKEUP_TIMER failed")
            .function("ioctl")?;

        Ok(())
    }
}
