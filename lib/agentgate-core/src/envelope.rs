//! The `{"data": ...}` success envelope.

use serde::{Deserialize, Serialize};

/// Success payload wrapper: `{"data": <payload>}`.
///
/// Agents that wrap their answers can be decoded with
/// `execute_into::<Envelope<T>>`, and co-located server code can produce the
/// same shape with [`Envelope::new`]. Nothing in the transport requires it.
///
/// ```
/// use agentgate_core::{Envelope, from_json};
///
/// let envelope: Envelope<Vec<String>> = from_json(br#"{"data":["a","b"]}"#).expect("decode");
/// assert_eq!(envelope.into_inner(), ["a", "b"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Wrapped payload.
    pub data: T,
}

impl<T> Envelope<T> {
    /// Wrap a payload.
    #[must_use]
    pub const fn new(data: T) -> Self {
        Self { data }
    }

    /// Unwrap the payload.
    #[must_use]
    pub fn into_inner(self) -> T {
        self.data
    }
}

impl<T> From<T> for Envelope<T> {
    fn from(data: T) -> Self {
        Self::new(data)
    }
}
