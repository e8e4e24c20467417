//! Revocation records.

use crate::model::generate_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Why a certificate was revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
}

impl fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RevocationReason::Unspecified => "unspecified",
            RevocationReason::KeyCompromise => "key-compromise",
            RevocationReason::CaCompromise => "ca-compromise",
            RevocationReason::AffiliationChanged => "affiliation-changed",
            RevocationReason::Superseded => "superseded",
            RevocationReason::CessationOfOperation => "cessation-of-operation",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for RevocationReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "unspecified" => Ok(RevocationReason::Unspecified),
            "key-compromise" => Ok(RevocationReason::KeyCompromise),
            "ca-compromise" => Ok(RevocationReason::CaCompromise),
            "affiliation-changed" => Ok(RevocationReason::AffiliationChanged),
            "superseded" => Ok(RevocationReason::Superseded),
            "cessation-of-operation" => Ok(RevocationReason::CessationOfOperation),
            other => Err(format!("Unknown revocation reason: '{}'", other)),
        }
    }
}

/// A revocation recorded on the issuing CA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Revocation {
    pub id: String,
    pub cert_id: String,
    pub revocation_date: DateTime<Utc>,
    pub reason: RevocationReason,
}

impl Revocation {
    /// Revoke `cert_id` now.
    pub fn new(cert_id: String, reason: RevocationReason) -> Self {
        Self {
            id: generate_id(),
            cert_id,
            revocation_date: Utc::now(),
            reason,
        }
    }
}

impl PartialEq for Revocation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Revocation {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_parse() {
        assert_eq!(
            "key-compromise".parse::<RevocationReason>().unwrap(),
            RevocationReason::KeyCompromise
        );
        assert_eq!(
            "SUPERSEDED".parse::<RevocationReason>().unwrap(),
            RevocationReason::Superseded
        );
        assert_eq!(
            "cessation_of_operation".parse::<RevocationReason>().unwrap(),
            RevocationReason::CessationOfOperation
        );
        assert!("bogus".parse::<RevocationReason>().is_err());
    }

    #[test]
    fn test_reason_display_roundtrips_through_parse() {
        for reason in [
            RevocationReason::Unspecified,
            RevocationReason::KeyCompromise,
            RevocationReason::CaCompromise,
            RevocationReason::AffiliationChanged,
            RevocationReason::Superseded,
            RevocationReason::CessationOfOperation,
        ] {
            assert_eq!(reason.to_string().parse::<RevocationReason>().unwrap(), reason);
        }
    }

    #[test]
    fn test_revocation_new() {
        let revocation = Revocation::new("cert-1".to_string(), RevocationReason::Superseded);

        assert_eq!(revocation.cert_id, "cert-1");
        assert!(revocation.revocation_date <= Utc::now());

        let json = serde_json::to_value(&revocation).unwrap();
        assert_eq!(json["reason"], "SUPERSEDED");
    }
}
