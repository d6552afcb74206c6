/// Helper macro for constructing [`crate::Error::Malformed`] with the source
/// location of the detection site baked in.
///
/// ```rust, ignore
///  return Err(malformed_error!("Missing header line"));
///  return Err(malformed_error!("Bad column count - {}", count));
/// ```
macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// Helper macro for locking items, converting a poisoned lock into
/// [`crate::Error::LockError`] instead of panicking.
///
/// ```rust, ignore
///  let mut data = lock!(my_mutex);
///  data.some_field = 42;
/// ```
macro_rules! lock {
    ($lock:expr) => {
        $lock
            .lock()
            .map_err(|_| crate::Error::LockError("poisoned lock".to_string()))?
    };
}
