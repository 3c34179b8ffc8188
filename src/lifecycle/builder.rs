//! Builder object which constructs [`Lifecycle`]s
//!
//! [`Lifecycle`]: crate::lifecycle::Lifecycle

use ::std::path::{Path, PathBuf};

use crate::{
    errors::Result,
    lifecycle::{
        Lifecycle, WakeTimer, FP_CLEAR_WAKEUP_TIMER, FRONT_PROCESSOR_DEVICE, WAKEUP_FLAG_PATH,
    },
};

/// A builder pattern object which simplifies the process of creating a
/// [`Lifecycle`].
///
/// The defaults match the hardware of the box: the procfs wake-up flag, the
/// legacy front processor device as fallback, and a `SIGTERM` handler.
///
/// ```no_run
/// use ::stbcore::lifecycle::Builder;
///
/// let lifecycle = Builder::new()
///     .with_wake_timer_flag("/proc/stb/fp/was_timer_wakeup")
///     .build()
///     .expect("Lifecycle setup failed");
/// ```
///
/// [`Lifecycle`]: crate::lifecycle::Lifecycle
#[derive(Clone, Debug)]
pub struct Builder {
    flag_path: PathBuf,
    device_path: PathBuf,
    clear_request: u64,
    catch_term_signal: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Construct a new builder. Default values will be used for all properties
    /// until explicitly set.
    pub fn new() -> Self {
        Self {
            flag_path: WAKEUP_FLAG_PATH.into(),
            device_path: FRONT_PROCESSOR_DEVICE.into(),
            clear_request: FP_CLEAR_WAKEUP_TIMER,
            catch_term_signal: true,
        }
    }

    /// Set the path of the wake-up timer flag which is reset on shutdown.
    ///
    /// Defaults to [`WAKEUP_FLAG_PATH`] if not set.
    ///
    /// [`WAKEUP_FLAG_PATH`]: crate::lifecycle::WAKEUP_FLAG_PATH
    pub fn with_wake_timer_flag(self, path: impl AsRef<Path>) -> Self {
        Self {
            flag_path: path.as_ref().to_owned(),
            ..self
        }
    }

    /// Set the front processor device used when the wake-up timer flag is
    /// unavailable.
    ///
    /// Defaults to [`FRONT_PROCESSOR_DEVICE`] if not set.
    ///
    /// [`FRONT_PROCESSOR_DEVICE`]: crate::lifecycle::FRONT_PROCESSOR_DEVICE
    pub fn with_front_processor_device(self, path: impl AsRef<Path>) -> Self {
        Self {
            device_path: path.as_ref().to_owned(),
            ..self
        }
    }

    /// Set the ioctl request which clears the wake-up timer on the front
    /// processor device.
    ///
    /// Defaults to [`FP_CLEAR_WAKEUP_TIMER`] if not set.
    ///
    /// [`FP_CLEAR_WAKEUP_TIMER`]: crate::lifecycle::FP_CLEAR_WAKEUP_TIMER
    pub fn with_clear_wakeup_request(self, clear_request: u64) -> Self {
        Self {
            clear_request,
            ..self
        }
    }

    /// Whether to install a `SIGTERM` handler when building.
    ///
    /// Defaults to `true` if not set.
    pub fn with_term_signal(self, catch_term_signal: bool) -> Self {
        Self {
            catch_term_signal,
            ..self
        }
    }

    /// Gets the currently set wake-up timer flag path.
    pub fn wake_timer_flag(&self) -> &Path {
        &self.flag_path
    }

    /// Gets the currently set front processor device path.
    pub fn front_processor_device(&self) -> &Path {
        &self.device_path
    }

    /// Gets the currently set wake-up timer clear request.
    pub fn clear_wakeup_request(&self) -> u64 {
        self.clear_request
    }

    /// Gets whether a `SIGTERM` handler will be installed.
    pub fn term_signal(&self) -> bool {
        self.catch_term_signal
    }

    /// Build a new [`Lifecycle`] with the properties of the builder.
    ///
    /// Fails only if the `SIGTERM` handler cannot be installed.
    ///
    /// [`Lifecycle`]: crate::lifecycle::Lifecycle
    pub fn build(&self) -> Result<Lifecycle> {
        let mut lifecycle = Lifecycle::new(WakeTimer::new(
            &self.flag_path,
            &self.device_path,
            self.clear_request,
        ));
        if self.catch_term_signal {
            lifecycle.catch_term_signal()?;
        }
        Ok(lifecycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::State;

    use ::pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let builder = Builder::new();

        assert_eq!(builder.wake_timer_flag(), Path::new(WAKEUP_FLAG_PATH));
        assert_eq!(builder.front_processor_device(), Path::new(FRONT_PROCESSOR_DEVICE));
        assert_eq!(builder.clear_wakeup_request(), FP_CLEAR_WAKEUP_TIMER);
        assert!(builder.term_signal());
    }

    #[test]
    fn test_overrides() {
        let builder = Builder::new()
            .with_wake_timer_flag("/tmp/flag")
            .with_front_processor_device("/tmp/fp0")
            .with_clear_wakeup_request(0x4004_6601)
            .with_term_signal(false);

        assert_eq!(builder.wake_timer_flag(), Path::new("/tmp/flag"));
        assert_eq!(builder.front_processor_device(), Path::new("/tmp/fp0"));
        assert_eq!(builder.clear_wakeup_request(), 0x4004_6601);
        assert!(!builder.term_signal());

        let lifecycle = builder.build().unwrap();
        assert_eq!(lifecycle.state(), State::Running);
        assert!(!lifecycle.poll_signals());
    }
}
