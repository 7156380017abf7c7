//! Subject naming.
//!
//! Every function is addressed as `faas:<engine>:<function>`. Names are used
//! verbatim and colons inside them are not escaped, so a name containing `:`
//! produces an ambiguous subject.

/// Prefix shared by all function subjects.
pub const PREFIX: &str = "faas";

/// Build the subject a function is served on.
///
/// `faas:<engine_name>:<function_name>`
#[must_use]
pub fn function_subject(engine_name: &str, function_name: &str) -> String {
    format!("{PREFIX}:{engine_name}:{function_name}")
}

/// Build the queue group name for an engine's instances.
///
/// Instances sharing an engine name load-balance their functions.
#[must_use]
pub fn queue_group(engine_name: &str) -> String {
    engine_name.to_string()
}

/// Split a function subject into `(engine, function)`.
///
/// Splits on the first two colons, so any further colons stay in the
/// function name.
#[must_use]
pub fn parse_function_subject(subject: &str) -> Option<(&str, &str)> {
    let rest = subject.strip_prefix(PREFIX)?.strip_prefix(':')?;
    rest.split_once(':')
}
