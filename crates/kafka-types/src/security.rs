//! Connection enums read from configuration.
//!
//! Parsing is case-insensitive and never fails; unknown values map to the
//! variant marked `#[default]`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecurityProtocol {
    #[default]
    Plaintext,
    SaslPlaintext,
    Ssl,
    SaslSsl,
}

impl SecurityProtocol {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "plaintext" => SecurityProtocol::Plaintext,
            "sasl_plaintext" => SecurityProtocol::SaslPlaintext,
            "ssl" => SecurityProtocol::Ssl,
            "sasl_ssl" => SecurityProtocol::SaslSsl,
            _ => SecurityProtocol::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityProtocol::Plaintext => "plaintext",
            SecurityProtocol::SaslPlaintext => "sasl_plaintext",
            SecurityProtocol::Ssl => "ssl",
            SecurityProtocol::SaslSsl => "sasl_ssl",
        }
    }

    /// Whether the protocol authenticates with a username and password.
    pub fn requires_credentials(&self) -> bool {
        !matches!(self, SecurityProtocol::Plaintext)
    }

    pub fn uses_sasl(&self) -> bool {
        matches!(
            self,
            SecurityProtocol::SaslPlaintext | SecurityProtocol::SaslSsl
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaslMechanism {
    None,
    Gssapi,
    #[default]
    Plain,
    ScramSha256,
    ScramSha512,
    OauthBearer,
}

impl SaslMechanism {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().replace('_', "-").as_str() {
            "NONE" => SaslMechanism::None,
            "GSSAPI" => SaslMechanism::Gssapi,
            "PLAIN" => SaslMechanism::Plain,
            "SCRAM-SHA-256" => SaslMechanism::ScramSha256,
            "SCRAM-SHA-512" => SaslMechanism::ScramSha512,
            "OAUTHBEARER" => SaslMechanism::OauthBearer,
            _ => SaslMechanism::default(),
        }
    }

    /// The librdkafka `sasl.mechanism` value, `None` when no mechanism is set.
    pub fn as_config_value(&self) -> Option<&'static str> {
        match self {
            SaslMechanism::None => None,
            SaslMechanism::Gssapi => Some("GSSAPI"),
            SaslMechanism::Plain => Some("PLAIN"),
            SaslMechanism::ScramSha256 => Some("SCRAM-SHA-256"),
            SaslMechanism::ScramSha512 => Some("SCRAM-SHA-512"),
            SaslMechanism::OauthBearer => Some("OAUTHBEARER"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoOffsetReset {
    Error,
    Smallest,
    Earliest,
    Beginning,
    Largest,
    #[default]
    Latest,
    End,
}

impl AutoOffsetReset {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "error" => AutoOffsetReset::Error,
            "smallest" => AutoOffsetReset::Smallest,
            "earliest" => AutoOffsetReset::Earliest,
            "beginning" => AutoOffsetReset::Beginning,
            "largest" => AutoOffsetReset::Largest,
            "latest" => AutoOffsetReset::Latest,
            "end" => AutoOffsetReset::End,
            _ => AutoOffsetReset::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AutoOffsetReset::Error => "error",
            AutoOffsetReset::Smallest => "smallest",
            AutoOffsetReset::Earliest => "earliest",
            AutoOffsetReset::Beginning => "beginning",
            AutoOffsetReset::Largest => "largest",
            AutoOffsetReset::Latest => "latest",
            AutoOffsetReset::End => "end",
        }
    }

    /// Whether a group without committed offsets starts at the head of the log.
    pub fn starts_from_beginning(&self) -> bool {
        matches!(
            self,
            AutoOffsetReset::Smallest | AutoOffsetReset::Earliest | AutoOffsetReset::Beginning
        )
    }
}

impl fmt::Display for AutoOffsetReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the schema registry's basic-auth credentials come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaRegistryAuth {
    /// Dedicated registry username and password.
    #[default]
    UserInfo,
    /// Reuse the Kafka SASL username and password.
    SaslInherit,
    /// No authentication.
    None,
}

impl SchemaRegistryAuth {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "USER_INFO" => SchemaRegistryAuth::UserInfo,
            "SASL_INHERIT" => SchemaRegistryAuth::SaslInherit,
            "NONE" => SchemaRegistryAuth::None,
            _ => SchemaRegistryAuth::default(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaRegistryAuth::UserInfo => "USER_INFO",
            SchemaRegistryAuth::SaslInherit => "SASL_INHERIT",
            SchemaRegistryAuth::None => "NONE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_protocol_parsing() {
        assert_eq!(SecurityProtocol::parse("SASL_SSL"), SecurityProtocol::SaslSsl);
        assert_eq!(
            SecurityProtocol::parse("sasl-plaintext"),
            SecurityProtocol::SaslPlaintext
        );
        assert_eq!(SecurityProtocol::parse("kerberos"), SecurityProtocol::Plaintext);
        assert!(!SecurityProtocol::Plaintext.requires_credentials());
        assert!(SecurityProtocol::Ssl.requires_credentials());
    }

    #[test]
    fn test_sasl_mechanism_parsing() {
        assert_eq!(SaslMechanism::parse("scram_sha_512"), SaslMechanism::ScramSha512);
        assert_eq!(SaslMechanism::parse("none").as_config_value(), None);
        assert_eq!(SaslMechanism::parse("whatever"), SaslMechanism::Plain);
        assert_eq!(
            SaslMechanism::OauthBearer.as_config_value(),
            Some("OAUTHBEARER")
        );
    }

    #[test]
    fn test_offset_reset_parsing() {
        assert_eq!(AutoOffsetReset::parse("EARLIEST"), AutoOffsetReset::Earliest);
        assert_eq!(AutoOffsetReset::parse(""), AutoOffsetReset::Latest);
        assert!(AutoOffsetReset::Beginning.starts_from_beginning());
        assert!(!AutoOffsetReset::End.starts_from_beginning());
    }

    #[test]
    fn test_registry_auth_parsing() {
        assert_eq!(
            SchemaRegistryAuth::parse("sasl_inherit"),
            SchemaRegistryAuth::SaslInherit
        );
        assert_eq!(SchemaRegistryAuth::parse("NONE"), SchemaRegistryAuth::None);
        assert_eq!(SchemaRegistryAuth::parse("?"), SchemaRegistryAuth::UserInfo);
    }
}
