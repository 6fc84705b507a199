//! Redaction of personal data in log messages.
//!
//! Log lines about users are written as `field=value;` pairs. The values of personal fields are
//! replaced before a line reaches the log, either by calling [`redact_fields`] or by installing a
//! [`RedactingLogger`] around the actual logger.

use crate::Result;
use log::{Log, Metadata, Record};
use regex::{NoExpand, Regex};

/// The fields holding personal data of a user.
pub const PII_FIELDS: [&str; 5] = ["name", "email", "ssn", "password", "phone"];

/// The text that replaces redacted values.
pub const REDACTION: &str = "***";

/// The separator terminating a `field=value` pair.
pub const SEPARATOR: &str = ";";

/// Replace the values of `fields` in `message` with `redaction`.
///
/// A value extends from the `=` after the field name up to the next `separator`.
/// Fields are matched as whole words, so `name` does not match `username`.
/// A value without a terminating separator is left untouched.
///
/// ```rust
/// # use typed_auth::redact_fields;
/// let message = "name=bob;email=bob@example.com;username=bobby;";
/// assert_eq!(
///     redact_fields(&["name", "email"], "xxx", message, ";").unwrap(),
///     "name=xxx;email=xxx;username=bobby;"
/// );
/// ```
pub fn redact_fields(
    fields: &[&str],
    redaction: &str,
    message: &str,
    separator: &str,
) -> Result<String> {
    Ok(FieldRedactor::new(fields, redaction, separator)?.redact(message))
}

/// Compiled redaction of a set of fields.
#[derive(Debug, Clone)]
pub struct FieldRedactor {
    patterns: Vec<(Regex, String)>,
}

impl FieldRedactor {
    /// Redact the values of `fields`, replacing them with `redaction`.
    pub fn new(fields: &[&str], redaction: &str, separator: &str) -> Result<Self> {
        let patterns = fields
            .iter()
            .map(|field| -> Result<(Regex, String)> {
                let pattern = format!(r"\b{}=.*?{}", regex::escape(field), regex::escape(separator));
                let replacement = format!("{field}={redaction}{separator}");
                Ok((Regex::new(&pattern)?, replacement))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Redact the [`PII_FIELDS`] with [`REDACTION`], assuming pairs are terminated by [`SEPARATOR`].
    pub fn pii() -> Result<Self> {
        Self::new(&PII_FIELDS, REDACTION, SEPARATOR)
    }

    /// Return `message` with the values of all fields redacted.
    pub fn redact(&self, message: &str) -> String {
        let mut message = message.to_owned();
        for (pattern, replacement) in &self.patterns {
            message = pattern
                .replace_all(&message, NoExpand(replacement))
                .into_owned();
        }
        message
    }
}

/// A logger that redacts personal data from messages before passing them to another logger.
///
/// ```rust,no_run
/// # use typed_auth::RedactingLogger;
/// # fn install<L: log::Log + 'static>(inner: L) -> typed_auth::Result {
/// let logger = Box::leak(Box::new(RedactingLogger::pii(inner)?));
/// log::set_logger(logger).expect("no logger is installed yet");
/// log::set_max_level(log::LevelFilter::Info);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct RedactingLogger<Inner> {
    inner: Inner,
    redactor: FieldRedactor,
}

impl<Inner: Log> RedactingLogger<Inner> {
    /// Wrap `inner`, redacting messages with `redactor`.
    pub fn new(inner: Inner, redactor: FieldRedactor) -> Self {
        Self { inner, redactor }
    }

    /// Wrap `inner`, redacting the [`PII_FIELDS`].
    pub fn pii(inner: Inner) -> Result<Self> {
        Ok(Self::new(inner, FieldRedactor::pii()?))
    }

    /// A reference to the wrapped logger.
    pub fn inner(&self) -> &Inner {
        &self.inner
    }
}

impl<Inner: Log> Log for RedactingLogger<Inner> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let message = self.redactor.redact(&record.args().to_string());
        self.inner.log(
            &Record::builder()
                .metadata(record.metadata().clone())
                .args(format_args!("{message}"))
                .module_path(record.module_path())
                .file(record.file())
                .line(record.line())
                .build(),
        );
    }

    fn flush(&self) {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::Level;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct CapturingLogger {
        lines: Mutex<Vec<String>>,
    }

    impl Log for CapturingLogger {
        fn enabled(&self, metadata: &Metadata<'_>) -> bool {
            metadata.level() <= Level::Info
        }

        fn log(&self, record: &Record<'_>) {
            self.lines
                .lock()
                .push(format!("{} {}: {}", record.level(), record.target(), record.args()));
        }

        fn flush(&self) {}
    }

    #[test]
    fn test_redact_fields() {
        let message = "name=egg;email=eggmin@eggsample.com;password=eggcellent;date_of_birth=12/12/1986;";
        assert_eq!(
            redact_fields(&["password", "date_of_birth"], "xxx", message, ";").unwrap(),
            "name=egg;email=eggmin@eggsample.com;password=xxx;date_of_birth=xxx;"
        );
        let message = "ssn=123-45-6789; phone=555 1234; last_login=2019;";
        assert_eq!(
            redact_fields(&PII_FIELDS, REDACTION, message, SEPARATOR).unwrap(),
            "ssn=***; phone=***; last_login=2019;"
        );
    }

    #[test]
    fn test_special_characters_are_literal() {
        assert_eq!(
            redact_fields(&["a.b"], "$1", "a.b=secret|axb=kept|", "|").unwrap(),
            "a.b=$1|axb=kept|"
        );
    }

    #[test]
    fn test_unterminated_values_are_kept() {
        let redactor = FieldRedactor::pii().unwrap();
        assert_eq!(redactor.redact("email=bob@example.com"), "email=bob@example.com");
        assert_eq!(redactor.redact("username=bob;"), "username=bob;");
    }

    #[test]
    fn test_logger_redacts_messages() {
        let logger = RedactingLogger::pii(CapturingLogger::default()).unwrap();
        logger.log(
            &Record::builder()
                .args(format_args!("name=bob; email=bob@example.com; role=admin;"))
                .level(Level::Info)
                .target("user_data")
                .build(),
        );
        logger.log(
            &Record::builder()
                .args(format_args!("name=alice;"))
                .level(Level::Debug)
                .target("user_data")
                .build(),
        );

        assert_eq!(
            logger.inner().lines.lock().as_slice(),
            ["INFO user_data: name=***; email=***; role=admin;"]
        );
    }
}
