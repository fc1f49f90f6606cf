use std::any::Any;
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A provider-specific message carried through the conversation history
/// without the agent looking inside it.
///
/// Providers that need more than plain text to replay an assistant turn
/// (tool call ids, reasoning content, and so on) wrap their native message
/// in an `OpaqueMessage`. The agent stores it verbatim and hands it back on
/// the next request, where the provider downcasts it with
/// [`OpaqueMessage::to_raw`].
///
/// Equality and hashing only look at the id.
#[derive(Clone)]
pub struct OpaqueMessage {
    id: Arc<str>,
    value: Arc<dyn Any + Send + Sync>,
}

impl OpaqueMessage {
    /// Wraps `value` under `id`, which must be unique within a conversation.
    #[inline]
    pub fn new<ID: Into<String>, T: Send + Sync + 'static>(
        id: ID,
        value: T,
    ) -> Self {
        Self {
            id: Arc::from(id.into()),
            value: Arc::new(value),
        }
    }

    /// Returns the id of this message.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the wrapped value if it has type `T`.
    #[inline]
    pub fn to_raw<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref()
    }
}

impl Debug for OpaqueMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpaqueMessage").field(&self.id).finish()
    }
}

impl PartialEq for OpaqueMessage {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for OpaqueMessage {}

impl Hash for OpaqueMessage {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    struct NativeMessage {
        text: String,
    }

    #[test]
    fn test_downcast() {
        let opaque = OpaqueMessage::new(
            "chatcmpl-1",
            NativeMessage {
                text: "ls -la".to_owned(),
            },
        );
        assert_eq!(opaque.id(), "chatcmpl-1");
        assert_eq!(opaque.to_raw::<NativeMessage>().unwrap().text, "ls -la");
        assert!(opaque.to_raw::<String>().is_none());
    }

    #[test]
    fn test_identity_is_the_id() {
        let first = OpaqueMessage::new("a", 1_u32);
        let same_id = OpaqueMessage::new("a", "different payload");
        let other = OpaqueMessage::new("b", 1_u32);
        assert_eq!(first, same_id);
        assert_ne!(first, other);

        let set: HashSet<_> = [first.clone(), same_id, other].into();
        assert_eq!(set.len(), 2);
    }
}
