use serde::{Deserialize, Serialize};

/// Wraps a value whose `Debug`/`Display` must never reach a log line:
/// GitHub tokens minted for Copilot, service-account private keys, and
/// similar opaque provider material that must never leave the process
/// except to the issuing provider.
#[derive(Clone, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Sensitive<T>(pub T);

impl<T> Sensitive<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> std::fmt::Debug for Sensitive<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Sensitive(..redacted..)")
    }
}

impl<T> std::ops::Deref for Sensitive<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.0
    }
}
