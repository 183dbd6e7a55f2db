/// Converts a `Result` into an `Option`, logging the error instead of
/// propagating it.
///
/// Probe boundaries use this to make the "never fails outward" contract
/// visible in the types: a caller receives `Some(data)` or `None`, and the
/// failure itself goes to the log.
pub trait ResultOkLogExt<T, E> {
    /// Logs the error at `error` level with the given context.
    fn ok_log(self, context: &str) -> Option<T>;

    /// Logs the error at `debug` level with the given context.
    ///
    /// Used where failure is expected in normal operation, e.g. an optional
    /// diagnostic tool that is not installed on this host.
    fn ok_debug(self, context: &str) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::fmt::Display,
{
    fn ok_log(self, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{context}: {err}");
                None
            }
        }
    }

    fn ok_debug(self, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::debug!("{context}: {err}");
                None
            }
        }
    }
}
