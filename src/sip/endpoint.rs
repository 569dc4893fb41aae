use std::sync::Arc;

/// Kinds of credential records an endpoint may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    /// Username and plaintext password.
    UserPass,
    /// Username and precomputed MD5 digest.
    Md5,
    /// Stand-in record attached to the synthetic endpoint; it can never
    /// satisfy a challenge.
    Artificial,
}

/// Credential record consumed by the authentication verifier.
#[derive(Debug, Clone)]
pub struct SipAuth {
    pub name: String,
    pub realm: String,
    pub username: String,
    pub password: String,
    pub kind: AuthKind,
}

impl SipAuth {
    pub(crate) fn artificial(realm: &str) -> Self {
        Self {
            name: "artificial".into(),
            realm: realm.into(),
            username: String::new(),
            password: String::new(),
            kind: AuthKind::Artificial,
        }
    }
}

/// Configured SIP peer, reduced to what inbound dispatch needs: an identity
/// and the auth records that gate its requests.
#[derive(Debug)]
pub struct SipEndpoint {
    name: String,
    inbound_auths: Vec<String>,
}

impl SipEndpoint {
    pub fn new(name: impl Into<String>, inbound_auths: Vec<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            inbound_auths,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the auth records gating inbound requests from this peer.
    pub fn inbound_auths(&self) -> &[String] {
        &self.inbound_auths
    }

    /// The endpoint substituted for requests no configured endpoint claims.
    ///
    /// The single auth entry is a sentinel that keeps the endpoint subject
    /// to authentication; it is never resolved to a real record.
    pub(crate) fn artificial() -> Arc<Self> {
        Self::new("", vec!["artificial-auth".into()])
    }
}
