//! The immutable challenge bundle shared by every worker of one attempt.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::encoding;
use crate::error::{KeytapError, Result};

/// Relying party the assertion is produced for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
}

impl RelyingParty {
    /// Derive the relying party from the identity provider's base URL.
    ///
    /// The id is the URL without its scheme: the host, plus the port when it
    /// is not the scheme's default.
    pub fn from_base_url(base_url: &Url) -> Result<Self> {
        let host = base_url
            .host_str()
            .ok_or_else(|| KeytapError::InvalidBaseUrl(format!("{base_url} has no host")))?;

        let id = match base_url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };

        Ok(Self {
            name: id.clone(),
            id,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialType {
    #[serde(rename = "public-key")]
    PublicKey,
}

impl std::fmt::Display for CredentialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PublicKey => write!(f, "public-key"),
        }
    }
}

/// One entry of the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    #[serde(with = "encoding::base64url")]
    pub id: Vec<u8>,
}

impl CredentialDescriptor {
    pub fn public_key(id: Vec<u8>) -> Self {
        Self {
            credential_type: CredentialType::PublicKey,
            id,
        }
    }

    /// Decode a base64url credential id as handed out by the identity provider.
    pub fn from_base64url(credential_id: &str) -> Result<Self> {
        let id = encoding::decode(credential_id)?;
        Ok(Self::public_key(id))
    }
}

/// Everything a device needs to answer one authentication challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeContext {
    pub relying_party: RelyingParty,
    pub origin: Url,
    pub challenge: Vec<u8>,
    pub allow_list: Vec<CredentialDescriptor>,
}

impl ChallengeContext {
    /// Build a context from raw identity provider input.
    ///
    /// Fails on an unusable base URL or a credential id that is not valid
    /// base64url. Nothing here touches a device.
    pub fn new(base_url: &str, challenge: impl Into<Vec<u8>>, credential_id: &str) -> Result<Self> {
        let origin = Url::parse(base_url)
            .map_err(|e| KeytapError::InvalidBaseUrl(format!("{base_url}: {e}")))?;

        if !matches!(origin.scheme(), "https" | "http") {
            return Err(KeytapError::InvalidBaseUrl(format!(
                "{base_url}: unsupported scheme {}",
                origin.scheme()
            )));
        }

        let relying_party = RelyingParty::from_base_url(&origin)?;
        let credential = CredentialDescriptor::from_base64url(credential_id)?;

        debug!(
            rp_id = %relying_party.id,
            credential = %hex::encode(&credential.id[..credential.id.len().min(8)]),
            "Built challenge context"
        );

        Ok(Self::from_parts(
            relying_party,
            origin,
            challenge.into(),
            vec![credential],
        ))
    }

    pub fn from_parts(
        relying_party: RelyingParty,
        origin: Url,
        challenge: Vec<u8>,
        allow_list: Vec<CredentialDescriptor>,
    ) -> Self {
        Self {
            relying_party,
            origin,
            challenge,
            allow_list,
        }
    }

    /// Whether `credential_id` appears in the allow-list.
    pub fn allows(&self, credential_id: &[u8]) -> bool {
        self.allow_list.iter().any(|c| c.id == credential_id)
    }
}
