/// Declare how an error from a lower layer becomes a higher layer's error.
///
/// Expands to a `From` impl, so `?` converts at the crate boundary. The
/// poller uses it to turn token [`CodecError`](crate::token::CodecError)s into
/// its own invalid-token error.
///
/// ```
/// use turbolro_core::error_boundary;
/// use turbolro_core::token::{CodecError, TokenPayload};
///
/// #[derive(Debug, thiserror::Error)]
/// enum ResumeError {
///     #[error("invalid continuation token: {0}")]
///     InvalidToken(String),
/// }
///
/// error_boundary!(CodecError => ResumeError, |e| {
///     ResumeError::InvalidToken(e.to_string())
/// });
///
/// fn resume(token: &str) -> Result<String, ResumeError> {
///     Ok(String::from_token("no-polling", token)?)
/// }
///
/// assert!(resume("%%%").is_err());
/// ```
#[macro_export]
macro_rules! error_boundary {
    ($inner:ty => $outer:ty, |$err:ident| $body:expr) => {
        impl ::std::convert::From<$inner> for $outer {
            fn from($err: $inner) -> $outer {
                $body
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::token::{CodecError, TokenPayload};

    #[derive(Debug, thiserror::Error, PartialEq)]
    enum ResumeError {
        #[error("token: {0}")]
        Token(String),
        #[error("interval: {0}")]
        Interval(String),
    }

    error_boundary!(CodecError => ResumeError, |e| ResumeError::Token(e.to_string()));
    error_boundary!(std::num::ParseIntError => ResumeError, |e| {
        ResumeError::Interval(e.to_string())
    });

    fn resume_counter(token: &str) -> Result<u64, ResumeError> {
        Ok(u64::from_token("counter", token)?)
    }

    #[test]
    fn test_kind_mismatch_keeps_both_kinds() {
        let token = 3u64.to_token("status-polling").unwrap();
        let Err(ResumeError::Token(msg)) = resume_counter(&token) else {
            panic!("expected a token error");
        };
        assert!(msg.contains("status-polling"));
        assert!(msg.contains("counter"));
    }

    #[test]
    fn test_question_mark_converts() {
        assert!(matches!(resume_counter("not base64!"), Err(ResumeError::Token(_))));

        let token = 7u64.to_token("counter").unwrap();
        assert_eq!(resume_counter(&token), Ok(7));
    }

    #[test]
    fn test_several_sources_share_a_target() {
        let parse_interval = |s: &str| -> Result<u64, ResumeError> { Ok(s.parse::<u64>()?) };

        assert_eq!(parse_interval("250"), Ok(250));
        assert!(matches!(parse_interval("soon"), Err(ResumeError::Interval(msg)) if msg.contains("invalid digit")));
    }
}
