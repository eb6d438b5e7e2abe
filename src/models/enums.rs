use serde::{Deserialize, Serialize};

/// Unknown string for a string-backed enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {field}: {value}")]
pub struct InvalidEnum {
    pub field: String,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(DocumentStatus {
    Processing => "PROCESSING",
    AutoApproved => "AUTO_APPROVED",
    RequiresApproval => "REQUIRES_APPROVAL",
    ReviewNeeded => "REVIEW_NEEDED",
    ArchivedHr => "ARCHIVED_HR",
    PendingLegal => "PENDING_LEGAL",
});

impl DocumentStatus {
    /// Every status except `Processing` is terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

str_enum!(ConfidenceBasis {
    Measured => "measured",
    Estimated => "estimated",
    Degraded => "degraded",
});

str_enum!(FileKind {
    Pdf => "pdf",
    PlainText => "plain_text",
    Image => "image",
    Unknown => "unknown",
});

str_enum!(ExtractionMethod {
    PdfTextLayer => "pdf_text_layer",
    PlainText => "plain_text",
    NoText => "none",
});

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            DocumentStatus::Processing,
            DocumentStatus::AutoApproved,
            DocumentStatus::RequiresApproval,
            DocumentStatus::ReviewNeeded,
            DocumentStatus::ArchivedHr,
            DocumentStatus::PendingLegal,
        ] {
            assert_eq!(DocumentStatus::from_str(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn only_processing_is_non_terminal() {
        assert!(!DocumentStatus::Processing.is_terminal());
        assert!(DocumentStatus::AutoApproved.is_terminal());
        assert!(DocumentStatus::PendingLegal.is_terminal());
    }

    #[test]
    fn status_serializes_as_screaming_snake() {
        let json = serde_json::to_string(&DocumentStatus::RequiresApproval).unwrap();
        assert_eq!(json, "\"REQUIRES_APPROVAL\"");
    }

    #[test]
    fn unknown_value_rejected() {
        let err = DocumentStatus::from_str("DONE").unwrap_err();
        assert_eq!(err.field, "DocumentStatus");
        assert_eq!(err.value, "DONE");
    }

    #[test]
    fn confidence_serializes_lowercase() {
        let json = serde_json::to_string(&ConfidenceBasis::Estimated).unwrap();
        assert_eq!(json, "\"estimated\"");
    }
}
