//! Bridge errors

/// The error type for bridged GATT operations
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
    message: String,
}

impl Error {
    pub(crate) fn new(
        kind: ErrorKind,
        source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
        message: impl Into<String>,
    ) -> Self {
        Error {
            kind,
            source,
            message: message.into(),
        }
    }

    /// Returns the corresponding [ErrorKind] for this error.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the free-form detail message for this error.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.message.is_empty(), &self.source) {
            (true, None) => write!(f, "{}", &self.kind),
            (false, None) => write!(f, "{}: {}", &self.kind, &self.message),
            (true, Some(err)) => write!(f, "{}: {}", &self.kind, err),
            (false, Some(err)) => write!(f, "{}: {} ({})", &self.kind, &self.message, err),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|x| {
            let x: &(dyn std::error::Error + 'static) = &**x;
            x
        })
    }
}

/// The failure categories a bridged operation can resolve with.
#[non_exhaustive]
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// unknown device
    UnknownDevice,
    /// unknown characteristic
    UnknownCharacteristic,
    /// characteristic unavailable
    CharacteristicUnavailable,
    /// device disconnected
    DeviceDisconnected,
    /// connection failed
    ConnectionFailed,
    /// timed out
    Timeout,
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error {
            kind,
            source: None,
            message: String::new(),
        }
    }
}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        let message = rejection.message.clone();
        Error::new(ErrorKind::CharacteristicUnavailable, Some(Box::new(rejection)), message)
    }
}

/// Why the host stack refused to start an operation.
#[non_exhaustive]
#[derive(Debug, displaydoc::Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// another operation is in progress
    Busy,
    /// the operation is not supported
    NotSupported,
    /// permission denied
    NotAuthorized,
    /// rejected
    Other,
}

/// A synchronous refusal from the host stack.
///
/// The bridge collapses every reason into [`ErrorKind::CharacteristicUnavailable`] and keeps the rejection as the
/// error's source so the detail text survives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// The category reported by the host stack
    pub reason: RejectReason,
    /// Free-form detail text from the host stack
    pub message: String,
}

impl Rejection {
    /// Creates a rejection with a detail message.
    pub fn new(reason: RejectReason, message: impl Into<String>) -> Self {
        Rejection {
            reason,
            message: message.into(),
        }
    }
}

impl From<RejectReason> for Rejection {
    fn from(reason: RejectReason) -> Self {
        Rejection {
            reason,
            message: String::new(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "{}: {}", self.reason, self.message)
        }
    }
}

impl std::error::Error for Rejection {}

/// Attribute Protocol status byte reported with a completion callback. See the Bluetooth Core Specification, Vol 3,
/// Part F, §3.4.1.1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GattStatus(pub u8);

impl GattStatus {
    /// The operation completed successfully.
    pub const SUCCESS: GattStatus = GattStatus(0x00);
    /// The attribute cannot be read.
    pub const READ_NOT_PERMITTED: GattStatus = GattStatus(0x02);
    /// The attribute cannot be written.
    pub const WRITE_NOT_PERMITTED: GattStatus = GattStatus(0x03);
    /// The attribute request encountered an error that was unlikely.
    pub const UNLIKELY_ERROR: GattStatus = GattStatus(0x0e);

    /// Converts a raw platform status code. Codes outside the byte range map to [`GattStatus::UNLIKELY_ERROR`].
    pub fn from_code(code: i32) -> Self {
        u8::try_from(code).map(GattStatus).unwrap_or(Self::UNLIKELY_ERROR)
    }

    /// Returns `true` for [`GattStatus::SUCCESS`].
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl std::fmt::Display for GattStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            0x00 => f.write_str("success"),
            0x80..=0x9f => write!(f, "application error {:#04x}", self.0),
            code => write!(f, "status {:#04x}", code),
        }
    }
}
