//! Error types for the dispenser control loop.
//!
//! HAL drivers each have their own associated `Error` type. Those values are
//! logged where they are mapped and collapsed into the small `Copy` enums
//! below, so the control loop has one uniform error to return.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible control-loop operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A motor or servo write failed.
    Actuator(ActuatorError),
    /// The pub/sub transport rejected an operation.
    Transport(TransportError),
    /// The network link could not be reconfigured.
    Network,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Network => write!(f, "network link failure"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

/// Which actuator failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// Feed motor PWM write failed.
    Feed,
    /// Gate servo write failed.
    Gate,
    /// Refill turntable servo write failed.
    Turntable,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Feed => write!(f, "feed motor write failed"),
            Self::Gate => write!(f, "gate servo write failed"),
            Self::Turntable => write!(f, "turntable servo write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Which transport operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Broker connection could not be established.
    Connect,
    /// Subscription was rejected.
    Subscribe,
    /// Publish was rejected.
    Publish,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect => write!(f, "connect failed"),
            Self::Subscribe => write!(f, "subscribe failed"),
            Self::Publish => write!(f, "publish failed"),
        }
    }
}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn display_nests_cause() {
        let e: Error = ActuatorError::Gate.into();
        assert_eq!(e.to_string(), "actuator: gate servo write failed");

        let e: Error = TransportError::Subscribe.into();
        assert_eq!(e.to_string(), "transport: subscribe failed");
    }

    #[test]
    fn question_mark_converts() {
        fn feed() -> Result<()> {
            Err(ActuatorError::Feed)?
        }
        assert_eq!(feed(), Err(Error::Actuator(ActuatorError::Feed)));
    }
}
