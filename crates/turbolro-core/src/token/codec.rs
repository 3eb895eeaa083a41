use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version written into every token envelope.
pub const TOKEN_VERSION: u8 = 1;

/// Errors produced while encoding or decoding a continuation token.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The token is not valid base64.
    #[error("continuation token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    /// The envelope or payload could not be (de)serialized.
    #[error("continuation token payload is malformed: {0}")]
    Json(#[from] serde_json::Error),

    /// The token was minted by a different strategy.
    #[error("continuation token was issued by '{found}', expected '{expected}'")]
    KindMismatch {
        /// Kind the decoding strategy expects
        expected: String,
        /// Kind written into the token
        found: String,
    },

    /// The envelope version is not understood by this codec.
    #[error("unsupported continuation token version {0}")]
    UnsupportedVersion(u8),
}

#[derive(Serialize, Deserialize)]
struct Envelope<P> {
    v: u8,
    kind: String,
    payload: P,
}

/// The tagged header of a token, readable without knowing the payload type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenHeader {
    /// Envelope version
    pub version: u8,
    /// Kind of the strategy that minted the token
    pub kind: String,
}

/// A strategy state that can be written to and read from a continuation token.
///
/// Every `T: Serialize + DeserializeOwned` gets this trait through a blanket
/// impl, so strategies only derive serde traits on their resumable state.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use turbolro_core::token::TokenPayload;
///
/// #[derive(Serialize, Deserialize, Debug, PartialEq)]
/// struct PollState {
///     operation_url: String,
///     last_status: String,
/// }
///
/// let state = PollState {
///     operation_url: "https://example.test/operations/7".to_string(),
///     last_status: "Running".to_string(),
/// };
///
/// let token = state.to_token("operation-location").unwrap();
/// let restored = PollState::from_token("operation-location", &token).unwrap();
/// assert_eq!(restored, state);
///
/// // A token from one strategy kind is refused by another
/// assert!(PollState::from_token("no-polling", &token).is_err());
/// ```
pub trait TokenPayload: Serialize + DeserializeOwned {
    /// Encode this state into an opaque token tagged with `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Json`] if the state cannot be serialized.
    fn to_token(&self, kind: &str) -> Result<String, CodecError> {
        let envelope = Envelope {
            v: TOKEN_VERSION,
            kind: kind.to_string(),
            payload: self,
        };
        let json = serde_json::to_vec(&envelope)?;
        Ok(STANDARD.encode(json))
    }

    /// Decode a token minted by a strategy of the given `kind`.
    ///
    /// # Errors
    ///
    /// Fails if the token is not base64, is not a version-1 envelope, was
    /// minted by another kind, or does not hold a `Self`.
    fn from_token(kind: &str, token: &str) -> Result<Self, CodecError> {
        let envelope = decode_envelope(token)?;
        if envelope.kind != kind {
            return Err(CodecError::KindMismatch {
                expected: kind.to_string(),
                found: envelope.kind,
            });
        }
        Ok(serde_json::from_value(envelope.payload)?)
    }
}

impl<T: Serialize + DeserializeOwned> TokenPayload for T {}

/// Read the header of a token without decoding its payload.
///
/// ```
/// use turbolro_core::token::{TokenPayload, inspect};
///
/// let token = vec![1, 2, 3].to_token("batch").unwrap();
/// let header = inspect(&token).unwrap();
/// assert_eq!(header.kind, "batch");
/// assert_eq!(header.version, 1);
/// ```
pub fn inspect(token: &str) -> Result<TokenHeader, CodecError> {
    let envelope = decode_envelope(token)?;
    Ok(TokenHeader {
        version: envelope.v,
        kind: envelope.kind,
    })
}

fn decode_envelope(token: &str) -> Result<Envelope<serde_json::Value>, CodecError> {
    let bytes = STANDARD.decode(token.trim())?;
    let envelope: Envelope<serde_json::Value> = serde_json::from_slice(&bytes)?;
    if envelope.v != TOKEN_VERSION {
        return Err(CodecError::UnsupportedVersion(envelope.v));
    }
    Ok(envelope)
}
