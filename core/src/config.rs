use crate::error::Metadata;
use crate::scope::Scope;
use std::time::Duration;

/// Per-call configuration.
///
/// ``` rust
/// use callbridge_core::{CallOptions, Scope};
/// use std::time::Duration;
///
/// let scope = Scope::new();
/// let options = CallOptions::default()
///     .with_scope(scope.clone())
///     .with_initial_credit(4)
///     .with_deadline(Duration::from_secs(3));
/// assert_eq!(options.initial_credit, 4);
/// ```
#[derive(Clone, Debug)]
pub struct CallOptions {
    /// The enclosing scope, the call is opened in a child of it.
    pub scope: Option<Scope>,
    /// How many inbound messages the transport may deliver before the consumer takes any.
    ///
    /// Streaming calls replenish one credit per consumed message afterwards. 0 is taken as 1.
    pub initial_credit: usize,
    /// Bound of the inner message buffer, 0 means unbounded.
    ///
    /// On overflow the call is cancelled and the stream ends with `resource_exhausted` after
    /// the buffered messages, nothing is dropped.
    pub buffer_limit: usize,
    /// Passed through to the transport, the bridge does not enforce it
    pub deadline: Option<Duration>,
    /// Headers sent when the call starts
    pub metadata: Metadata,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            scope: None,
            initial_credit: 1,
            buffer_limit: 0,
            deadline: None,
            metadata: Metadata::default(),
        }
    }
}

impl CallOptions {
    #[inline]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// 0 is raised to 1, otherwise the transport would never deliver anything
    #[inline]
    pub fn with_initial_credit(mut self, credit: usize) -> Self {
        self.initial_credit = credit.max(1);
        self
    }

    #[inline]
    pub fn with_buffer_limit(mut self, limit: usize) -> Self {
        self.buffer_limit = limit;
        self
    }

    #[inline]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    #[inline]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key, value);
        self
    }

    /// Replace all the metadata
    #[inline]
    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// The credit granted when a streaming call opens, never below 1
    #[inline(always)]
    pub fn effective_initial_credit(&self) -> usize {
        self.initial_credit.max(1)
    }
}
