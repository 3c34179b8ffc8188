//! Crate-specific error and result types, plus common conversions.

use ::std::{
    fmt::{self, Display},
    io,
    sync::Arc,
};

/// Result type returned by functions that call into the operating system.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Error type for functions that call into the operating system (`libc`,
/// device nodes, procfs). The error attempts to pro-actively capture as much
/// context as possible (errno, system error message strings, etc).
#[derive(Clone, Debug)]
pub struct Error {
    /// The underlying OS error. Implements [`Display`] to conveniently print
    /// the errno and system error message which were gathered at the point of
    /// the error.
    ///
    /// [`Display`]: std::fmt::Display
    underlying_error: Arc<io::Error>,

    /// The name of the system call or library function which failed.
    function: Option<&'static str>,

    /// An optional context information which describes what was happening
    /// at the time error.
    context: Option<String>,
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            underlying_error,
            function,
            context,
        } = &self;

        if let Some(context) = context {
            write!(f, "{context}\nCaused by:\n    {underlying_error}")?;
        } else {
            write!(f, "{underlying_error}")?;
        }

        if let Some(function) = function {
            write!(f, " ({function})")?;
        }

        Ok(())
    }
}

impl ::std::error::Error for Error {
    fn source(&self) -> Option<&(dyn ::std::error::Error + 'static)> {
        Some(self.underlying_error.as_ref())
    }
}

impl From<io::Error> for Error {
    fn from(source: io::Error) -> Self {
        Self {
            underlying_error: Arc::new(source),
            function: None,
            context: None,
        }
    }
}

impl Error {
    /// Returns the underlying OS error code (errno), if any.
    pub fn raw_os_error(&self) -> Option<i32> {
        self.underlying_error.raw_os_error()
    }

    /// Returns the kind of the underlying I/O error.
    pub fn kind(&self) -> io::ErrorKind {
        self.underlying_error.kind()
    }
}

/// Converts the return value of a `libc` call into a [`Result`].
///
/// Returns `Ok` with the original value if the call succeeded (a non-negative
/// return value). Otherwise, returns `Err` with an inner error that captures
/// the current `errno` and its system error message.
pub(crate) fn cvt(ret: libc::c_int) -> Result<libc::c_int> {
    if ret < 0 {
        Err(io::Error::last_os_error().into())
    } else {
        Ok(ret)
    }
}

/// A crate-private trait which allows context information to be attached to
/// fallible types.
///
/// This is useful to attach high level context information and track which
/// particular system call failed, something that might not be obvious when
/// relying on the inner errno alone.
pub(crate) trait Context<T> {
    /// Attach the name of the function which failed to the error as additional
    /// context.
    fn function(self, function: &'static str) -> Result<T>
    where
        Self: Sized;

    /// Attach a context message to a fallible type and return crate error.
    fn context(self, ctx: impl AsRef<str>) -> Result<T>
    where
        Self: Sized;
}

impl<T> Context<T> for Result<T> {
    fn function(mut self, f: &'static str) -> Result<T>
    where
        Self: Sized,
    {
        if let Err(err) = &mut self {
            err.function = Some(f);
        }
        self
    }

    fn context(mut self, ctx: impl AsRef<str>) -> Result<T>
    where
        Self: Sized,
    {
        if let Err(err) = &mut self {
            err.context = Some(ctx.as_ref().to_owned());
        }
        self
    }
}

impl<T> Context<T> for ::std::result::Result<T, io::Error> {
    fn function(self, function: &'static str) -> Result<T> {
        self.map_err(|source| Error {
            underlying_error: Arc::new(source),
            context: None,
            function: Some(function),
        })
    }

    fn context(self, ctx: impl AsRef<str>) -> Result<T> {
        self.map_err(|source| Error {
            underlying_error: Arc::new(source),
            context: Some(ctx.as_ref().to_owned()),
            function: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ::pretty_assertions::assert_eq;

    #[test]
    fn test_cvt_passes_through_success() {
        assert_eq!(cvt(3).unwrap(), 3);
        assert_eq!(cvt(0).unwrap(), 0);
    }

    #[test]
    fn test_display_with_context_and_function() {
        let err = Err::<(), _>(io::Error::from_raw_os_error(libc::ENOENT))
            .context("Failed to open wake-up timer flag")
            .function("open")
            .unwrap_err();

        assert_eq!(err.raw_os_error(), Some(libc::ENOENT));
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let msg = err.to_string();
        assert!(msg.starts_with("Failed to open wake-up timer flag\nCaused by:\n    "));
        assert!(msg.ends_with(" (open)"), "unexpected message: {msg}");
    }

    #[test]
    fn test_display_without_context() {
        let err = Error::from(io::Error::new(io::ErrorKind::Other, "boom"));
        assert_eq!(err.to_string(), "boom");
    }
}
