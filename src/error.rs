//! Error types for Ampere
//!
//! The server's posture toward charge points is tolerance: peer misbehavior
//! is logged and answered, never propagated. Errors therefore exist for the
//! places where *we* can fail, not where the station can: decoding a frame
//! off the wire, and getting the process up (configuration, logging, I/O).

use thiserror::Error;

/// Result type alias for Ampere operations
pub type Result<T> = std::result::Result<T, AmpereError>;

/// Failures Ampere itself can produce
#[derive(Debug, Error)]
pub enum AmpereError {
    /// A WebSocket text frame that is not a well-formed OCPP-J array.
    /// The connection survives this; the frame is dropped.
    #[error("malformed OCPP frame: {detail}")]
    Frame { detail: String },

    /// Configuration that failed to load or validate
    #[error("configuration: {detail}")]
    Config { detail: String },

    /// Logging could not be initialized
    #[error("logging setup: {detail}")]
    Logging { detail: String },

    /// Filesystem and socket errors
    #[error("i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Unparseable YAML in a config file
    #[error("config parse: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl AmpereError {
    pub fn frame(detail: impl Into<String>) -> Self {
        AmpereError::Frame {
            detail: detail.into(),
        }
    }

    pub fn config(detail: impl Into<String>) -> Self {
        AmpereError::Config {
            detail: detail.into(),
        }
    }

    pub fn logging(detail: impl Into<String>) -> Self {
        AmpereError::Logging {
            detail: detail.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocpp::frame::Frame;

    #[test]
    fn wire_garbage_surfaces_as_frame_errors() {
        // Not JSON at all
        let err = Frame::decode("BOOT PLEASE").unwrap_err();
        assert!(matches!(err, AmpereError::Frame { .. }));
        assert!(err.to_string().starts_with("malformed OCPP frame:"));

        // JSON, but an object where the array framing is required
        let err = Frame::decode(r#"{"action":"Heartbeat"}"#).unwrap_err();
        let AmpereError::Frame { detail } = err else {
            panic!("expected a frame error");
        };
        assert!(detail.contains("array"), "got: {detail}");
    }

    #[test]
    fn config_validation_reports_the_offending_field() {
        let mut config = crate::Config::default();
        config.web.port = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, AmpereError::Config { .. }));
        assert!(err.to_string().contains("web.port"));
    }

    #[test]
    fn config_file_errors_convert_through_question_mark() {
        fn parse(text: &str) -> Result<crate::Config> {
            let config: crate::Config = serde_yaml::from_str(text)?;
            Ok(config)
        }

        assert!(matches!(
            parse("web: [not, a, table]").unwrap_err(),
            AmpereError::Yaml(_)
        ));

        let io: AmpereError = std::io::Error::other("disk gone").into();
        assert_eq!(io.to_string(), "i/o: disk gone");
    }
}
