//! Credentials and the pluggable security mechanism

use std::fmt;

use crate::errors::TransportError;

/// Protection requested from the security mechanism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Protection {
    /// Ask for message confidentiality (wrap with encryption)
    pub confidentiality: bool,
    /// Ask for message integrity (wrap with a MIC)
    pub integrity: bool,
}

impl Protection {
    pub fn new(confidentiality: bool, integrity: bool) -> Self {
        Self {
            confidentiality,
            integrity,
        }
    }
}

/// A credential obtained outside of this crate (e.g. a delegated ticket)
pub trait DelegatedCredential: Send {
    /// Principal the credential belongs to, if known
    fn principal(&self) -> Option<String>;

    /// Releases the credential; it must not be used afterwards
    fn dispose(&mut self);
}

/// How the transport authenticates
pub enum Credentials {
    /// Login through the named login module (keytab or ticket cache)
    LoginModule { module: String },
    /// Login through the named login module with username and password
    Password {
        module: String,
        username: String,
        password: String,
    },
    /// Use an existing credential; `dispose` releases it once the exchange ends
    Delegated {
        credential: Box<dyn DelegatedCredential>,
        dispose: bool,
    },
}

impl Credentials {
    pub fn login_module(module: impl Into<String>) -> Self {
        Credentials::LoginModule {
            module: module.into(),
        }
    }

    pub fn password(
        module: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Credentials::Password {
            module: module.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn delegated(credential: Box<dyn DelegatedCredential>, dispose: bool) -> Self {
        Credentials::Delegated {
            credential,
            dispose,
        }
    }

    /// Releases a delegated credential flagged for disposal
    ///
    /// Returns `true` when a credential was disposed.
    pub(crate) fn dispose_if_requested(&mut self) -> bool {
        match self {
            Credentials::Delegated {
                credential,
                dispose: true,
            } => {
                credential.dispose();
                true
            }
            _ => false,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::LoginModule { module } => f
                .debug_struct("LoginModule")
                .field("module", module)
                .finish(),
            Credentials::Password {
                module, username, ..
            } => f
                .debug_struct("Password")
                .field("module", module)
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credentials::Delegated {
                credential,
                dispose,
            } => f
                .debug_struct("Delegated")
                .field("principal", &credential.principal())
                .field("dispose", dispose)
                .finish(),
        }
    }
}

/// Client side of one security context (e.g. a GSS-API context)
pub trait SecurityContext {
    /// Consumes the server token (`None` on the first leg) and returns the
    /// next token to send, if any
    fn step(&mut self, input: Option<&[u8]>) -> Result<Option<Vec<u8>>, TransportError>;

    fn is_established(&self) -> bool;

    fn dispose(&mut self) {}
}

/// Source of security contexts
///
/// Login failures should be reported as [`TransportError::Privileged`],
/// token failures as [`TransportError::Negotiation`].
pub trait SecurityProvider: Send {
    /// Creates a context for `service` (`HTTP@host`) on behalf of `credentials`
    fn create_context(
        &self,
        credentials: &Credentials,
        service: &str,
        protection: Protection,
    ) -> Result<Box<dyn SecurityContext>, TransportError>;
}
