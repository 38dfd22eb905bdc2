use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A provider-specific message that the agent stores without looking
/// inside.
///
/// Some providers need their own message shape back in later requests,
/// e.g. an assistant message that carries tool call entries which must be
/// answered by tool results with matching ids. The provider wraps that
/// shape in an `OpaqueMessage`, the agent keeps it in the run's trace, and
/// the provider downcasts it again when building the next request.
pub struct OpaqueMessage(Arc<dyn OpaqueMessageObject>);

impl OpaqueMessage {
    /// Creates a new `OpaqueMessage`.
    ///
    /// `id` must be unique within one run. Equality and hashing only look
    /// at the `id`.
    #[inline]
    pub fn new<ID: Into<String>, T: Send + Sync + 'static>(
        id: ID,
        value: T,
    ) -> Self {
        Self(Arc::new(OpaqueMessageInner {
            id: id.into(),
            value,
        }))
    }

    /// Returns the id of this message.
    #[inline]
    pub fn id(&self) -> &str {
        self.0.id()
    }

    /// Downcasts to the provider's raw message type.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref()
    }
}

impl Clone for OpaqueMessage {
    #[inline]
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueMessage").field(&self.0.id()).finish()
    }
}

impl PartialEq for OpaqueMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

trait OpaqueMessageObject: Send + Sync {
    fn id(&self) -> &str;
    fn as_any(&self) -> &dyn Any;
}

struct OpaqueMessageInner<T> {
    id: String,
    value: T,
}

impl<T: Send + Sync + 'static> OpaqueMessageObject for OpaqueMessageInner<T> {
    fn id(&self) -> &str {
        &self.id
    }

    fn as_any(&self) -> &dyn Any {
        &self.value
    }
}
