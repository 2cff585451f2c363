//! Observer admission gate
//!
//! Holds a single rotating token. A token admits exactly one observer
//! connection: a successful check installs a fresh token in the same
//! critical section, so concurrent callers presenting the same value cannot
//! both succeed.
//!
//! The token lives in a `watch` channel; [`AdmissionGate::subscribe`] yields
//! every replacement so an operator surface can hand out the next one.

use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::sync::watch;

/// Default token length in characters
pub const DEFAULT_TOKEN_LENGTH: usize = 32;

/// Reason an observer was not admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AdmissionDenied {
    /// No credential was supplied
    #[error("Missing token")]
    MissingToken,
    /// Credential did not match the current token (wrong or already used)
    #[error("Invalid Token!")]
    InvalidToken,
}

/// Single-use rotating token gate
#[derive(Debug)]
pub struct AdmissionGate {
    current: watch::Sender<String>,
    token_length: usize,
}

impl AdmissionGate {
    /// Create a gate with the default token length
    pub fn new() -> Self {
        Self::with_token_length(DEFAULT_TOKEN_LENGTH)
    }

    /// Create a gate issuing tokens of `token_length` characters
    pub fn with_token_length(token_length: usize) -> Self {
        let token_length = token_length.max(1);
        let (current, _) = watch::channel(generate_token(token_length));
        Self {
            current,
            token_length,
        }
    }

    /// Replace the current token with a fresh one and return it
    pub fn issue_and_rotate(&self) -> String {
        let token = generate_token(self.token_length);
        self.current.send_replace(token.clone());
        tracing::debug!("Admission token rotated");
        token
    }

    /// Check `candidate` against the current token, rotating on success
    pub fn check_and_rotate(&self, candidate: Option<&str>) -> Result<(), AdmissionDenied> {
        let candidate = match candidate {
            Some(c) if !c.is_empty() => c,
            _ => return Err(AdmissionDenied::MissingToken),
        };

        let mut outcome = Err(AdmissionDenied::InvalidToken);
        self.current.send_if_modified(|current| {
            if current.as_str() != candidate {
                return false;
            }
            *current = generate_token(self.token_length);
            outcome = Ok(());
            true
        });

        if outcome.is_ok() {
            tracing::debug!("Admission token consumed and rotated");
        }
        outcome
    }

    /// Current token value, for handing to an operator or UI
    pub fn current(&self) -> String {
        self.current.borrow().clone()
    }

    /// Receiver that observes every token rotation
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.current.subscribe()
    }

    /// Length of issued tokens
    pub fn token_length(&self) -> usize {
        self.token_length
    }
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_token(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
