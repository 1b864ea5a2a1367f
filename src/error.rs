//! # suspend errors
//!
//! protocol violations and application failures share one error type
//!

use std::error::Error as StdError;
use std::rc::Rc;

use thiserror::Error;

/// crate wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// errors reported by the coroutine driver
///
/// The protocol variants signal programmer error and are returned right at
/// the violation site. `Message` and `Failure` carry application errors
/// that travel through the suspension points.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// a resumer factory, `fork()` or `join()` was used outside the
    /// synchronous execution of a generator body
    #[error("resume(), fork() and join() must be called from the generator body")]
    NotInGeneratorBody,

    /// a single use resume token was invoked again
    #[error("cannot call same resumer multiple times")]
    ResumerReused,

    /// a resumption reached a coroutine that already completed
    #[error("generators cannot be resumed once completed")]
    ResumedAfterCompletion,

    /// a fork slot was settled twice
    #[error("fork slot {index} settled more than once")]
    DoubleSettlement {
        /// registration index of the slot
        index: usize,
    },

    /// `join()` was requested while another join is outstanding
    #[error("join() called while another join() is pending")]
    JoinAlreadyPending,

    /// the resumed value is not of the type the body asked for
    #[error("resumed value type mismatch, expected `{expected}`")]
    TypeMismatch {
        /// name of the requested type
        expected: &'static str,
    },

    /// application error described by a message
    #[error("{0}")]
    Message(String),

    /// application error wrapping any error value
    #[error("{0}")]
    Failure(Rc<dyn StdError>),
}

impl Error {
    /// create an application error from a message
    pub fn msg<M: Into<String>>(msg: M) -> Self {
        Error::Message(msg.into())
    }

    /// wrap an arbitrary error value
    pub fn failure<E: StdError + 'static>(err: E) -> Self {
        Error::Failure(Rc::new(err))
    }

    /// check if this is one of the driver protocol violations
    pub fn is_protocol(&self) -> bool {
        !matches!(self, Error::Message(_) | Error::Failure(_))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io;

    #[test]
    fn test_display() {
        assert_eq!(Error::msg("oops").to_string(), "oops");
        assert!(Error::ResumerReused
            .to_string()
            .contains("same resumer multiple times"));
        assert!(Error::NotInGeneratorBody
            .to_string()
            .contains("called from the generator body"));
        assert_eq!(
            Error::DoubleSettlement { index: 2 }.to_string(),
            "fork slot 2 settled more than once"
        );
    }

    #[test]
    fn test_failure_is_cloneable() {
        let err = Error::failure(io::Error::new(io::ErrorKind::Other, "disk gone"));
        let copy = err.clone();
        assert_eq!(copy.to_string(), "disk gone");
        assert!(!copy.is_protocol());
        assert!(Error::JoinAlreadyPending.is_protocol());
    }
}
