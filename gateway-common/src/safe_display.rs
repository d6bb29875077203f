/// Renders a value the way it is safe to hand back to an untrusted caller or
/// print in a log line: no upstream stack traces, no config secrets.
///
/// Plain `Display`/`Debug` remain available for internal diagnostics; this
/// trait is the one callers reach for at the HTTP boundary and at startup
/// when logging the loaded configuration.
pub trait SafeDisplay {
    fn to_safe_string(&self) -> String;
}
