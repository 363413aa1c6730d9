use std::fmt;

/// The status code reported by the transport when a call closes.
///
/// Numeric values follow the usual RPC status code table, so a transport can convert its own
/// codes with [Code::from_u8].
#[derive(
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
    PartialEq,
    Eq,
    PartialOrd,
    Clone,
    Copy,
    Hash,
    Debug,
)]
#[repr(u8)]
pub enum Code {
    #[strum(serialize = "ok")]
    Ok = 0,
    #[strum(serialize = "cancelled")]
    Cancelled = 1,
    #[strum(serialize = "unknown")]
    Unknown = 2,
    #[strum(serialize = "invalid_argument")]
    InvalidArgument = 3,
    #[strum(serialize = "deadline_exceeded")]
    DeadlineExceeded = 4,
    #[strum(serialize = "not_found")]
    NotFound = 5,
    #[strum(serialize = "already_exists")]
    AlreadyExists = 6,
    #[strum(serialize = "permission_denied")]
    PermissionDenied = 7,
    #[strum(serialize = "resource_exhausted")]
    ResourceExhausted = 8,
    #[strum(serialize = "failed_precondition")]
    FailedPrecondition = 9,
    #[strum(serialize = "aborted")]
    Aborted = 10,
    #[strum(serialize = "out_of_range")]
    OutOfRange = 11,
    #[strum(serialize = "unimplemented")]
    Unimplemented = 12,
    #[strum(serialize = "internal")]
    Internal = 13,
    #[strum(serialize = "unavailable")]
    Unavailable = 14,
    #[strum(serialize = "data_loss")]
    DataLoss = 15,
    #[strum(serialize = "unauthenticated")]
    Unauthenticated = 16,
}

impl Code {
    /// Unknown numbers map to [Code::Unknown]
    pub fn from_u8(n: u8) -> Self {
        match n {
            0 => Self::Ok,
            1 => Self::Cancelled,
            3 => Self::InvalidArgument,
            4 => Self::DeadlineExceeded,
            5 => Self::NotFound,
            6 => Self::AlreadyExists,
            7 => Self::PermissionDenied,
            8 => Self::ResourceExhausted,
            9 => Self::FailedPrecondition,
            10 => Self::Aborted,
            11 => Self::OutOfRange,
            12 => Self::Unimplemented,
            13 => Self::Internal,
            14 => Self::Unavailable,
            15 => Self::DataLoss,
            16 => Self::Unauthenticated,
            _ => Self::Unknown,
        }
    }
}

/// Key-value pairs sent along with a call (headers) or received when it closes (trailers).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata(Vec<(String, String)>);

impl Metadata {
    #[inline]
    pub fn new() -> Self {
        Self(Vec::new())
    }

    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Return the first value of `key`
    #[inline]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// The outcome the transport reports when a call closes.
#[derive(Clone, PartialEq, thiserror::Error)]
pub struct Status {
    code: Code,
    message: String,
    trailers: Metadata,
}

impl Status {
    #[inline]
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), trailers: Metadata::default() }
    }

    #[inline]
    pub fn ok() -> Self {
        Self::new(Code::Ok, "")
    }

    #[inline]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(Code::Cancelled, message)
    }

    #[inline]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }

    #[inline]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(Code::Unavailable, message)
    }

    #[inline]
    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(Code::ResourceExhausted, message)
    }

    #[inline]
    pub fn with_trailers(mut self, trailers: Metadata) -> Self {
        self.trailers = trailers;
        self
    }

    #[inline(always)]
    pub fn code(&self) -> Code {
        self.code
    }

    #[inline(always)]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[inline(always)]
    pub fn trailers(&self) -> &Metadata {
        &self.trailers
    }

    #[inline(always)]
    pub fn is_ok(&self) -> bool {
        self.code == Code::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "status {}", self.code)
        } else {
            write!(f, "status {}: {}", self.code, self.message)
        }
    }
}

// Same as RpcIntErr, keep Debug short for log lines
impl fmt::Debug for Status {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The failure a call surfaces to application code.
///
/// A unary outcome or a stream termination carries exactly one of these. Broken internal
/// invariants (e.g. a transport closing a call twice) are not represented here, they panic.
#[derive(Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    /// The remote side or the transport failed the call
    #[error("{0}")]
    Transport(Status),
    /// The call was cancelled through its own handle, carries the original cause
    #[error("cancelled: {0}")]
    Cancelled(String),
    /// An enclosing scope cancelled the call
    #[error("call cancelled")]
    ScopeCancelled,
    /// Sending on a request stream that was already half-closed
    #[error("stream already closed")]
    StreamClosed,
}

impl fmt::Debug for CallError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl CallError {
    /// Map every failure to a status, cancellations become [Code::Cancelled]
    pub fn status(&self) -> Status {
        match self {
            Self::Transport(s) => s.clone(),
            Self::Cancelled(cause) => Status::cancelled(cause.as_str()),
            Self::ScopeCancelled => Status::cancelled("call cancelled"),
            Self::StreamClosed => Status::new(Code::FailedPrecondition, "stream already closed"),
        }
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_) | Self::ScopeCancelled)
    }
}

impl From<Status> for CallError {
    #[inline(always)]
    fn from(s: Status) -> Self {
        Self::Transport(s)
    }
}

impl std::cmp::PartialEq<Code> for CallError {
    #[inline]
    fn eq(&self, other: &Code) -> bool {
        if let Self::Transport(s) = self {
            return s.code == *other;
        }
        false
    }
}
