//! Response decoding
//!
//! A [`Decoder`] turns a raw 2xx response body into a typed value or a list
//! of [`ValidationIssue`]s. Decode failures are classified as
//! [`ErrorKind::Parse`](crate::ErrorKind::Parse) and never retried.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use thiserror::Error;

/// One problem found while decoding or validating a response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Location of the problem (JSON path, or line/column for syntax errors)
    pub path: String,
    /// What is wrong
    pub message: String,
}

impl ValidationIssue {
    /// Create a new issue.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// A response body did not match the expected shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("response failed validation ({} issue(s)): {}", .issues.len(), summary(.issues))]
pub struct DecodeError {
    issues: Vec<ValidationIssue>,
}

impl DecodeError {
    /// Create a decode error from its issues.
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// Shorthand for a single issue.
    pub fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(vec![ValidationIssue::new(path, message)])
    }

    /// The individual problems.
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }
}

fn summary(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<serde_json::Error> for DecodeError {
    fn from(err: serde_json::Error) -> Self {
        let path = if err.line() == 0 {
            String::new()
        } else {
            format!("line {}, column {}", err.line(), err.column())
        };
        Self::single(path, err.to_string())
    }
}

/// Turns a raw response body into a typed value.
///
/// Closures of the right shape are decoders:
///
/// ```rust
/// use querykit::decode::{DecodeError, Decoder};
///
/// let utf8 = |body: &[u8]| {
///     String::from_utf8(body.to_vec()).map_err(|e| DecodeError::single("", e.to_string()))
/// };
/// assert_eq!(utf8.decode(b"hi").unwrap(), "hi");
/// ```
pub trait Decoder<A>: Send + Sync {
    /// Decode `body`.
    fn decode(&self, body: &[u8]) -> Result<A, DecodeError>;
}

impl<A, F> Decoder<A> for F
where
    F: Fn(&[u8]) -> Result<A, DecodeError> + Send + Sync,
{
    fn decode(&self, body: &[u8]) -> Result<A, DecodeError> {
        self(body)
    }
}

type Validator<T> = Arc<dyn Fn(&T) -> Vec<ValidationIssue> + Send + Sync>;

/// JSON decoder backed by serde, with an optional semantic validation step.
///
/// # Examples
///
/// ```rust
/// use querykit::decode::{Decoder, JsonDecoder, ValidationIssue};
///
/// #[derive(serde::Deserialize)]
/// struct Order {
///     qty: i32,
/// }
///
/// let decoder = JsonDecoder::<Order>::new().with_validator(|order| {
///     if order.qty > 0 {
///         vec![]
///     } else {
///         vec![ValidationIssue::new("qty", "must be positive")]
///     }
/// });
///
/// assert!(decoder.decode(br#"{"qty": 2}"#).is_ok());
/// assert!(decoder.decode(br#"{"qty": 0}"#).is_err());
/// ```
pub struct JsonDecoder<T> {
    validator: Option<Validator<T>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDecoder<T> {
    /// Create a decoder with no extra validation.
    pub fn new() -> Self {
        Self {
            validator: None,
            _marker: PhantomData,
        }
    }

    /// Run `validator` after deserialization; any returned issue fails the decode.
    pub fn with_validator<V>(mut self, validator: V) -> Self
    where
        V: Fn(&T) -> Vec<ValidationIssue> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(validator));
        self
    }
}

impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self {
            validator: self.validator.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonDecoder")
            .field("target", &std::any::type_name::<T>())
            .field("validated", &self.validator.is_some())
            .finish()
    }
}

impl<T> Decoder<T> for JsonDecoder<T>
where
    T: DeserializeOwned,
{
    fn decode(&self, body: &[u8]) -> Result<T, DecodeError> {
        let value: T = serde_json::from_slice(body)?;

        if let Some(validator) = &self.validator {
            let issues = validator(&value);
            if !issues.is_empty() {
                return Err(DecodeError::new(issues));
            }
        }

        Ok(value)
    }
}
