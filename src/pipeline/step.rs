//! Step definitions: kinds, parameters and error policies.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// What type a step needs its input coerced to before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputRequirement {
    /// The value is passed as is, error values included
    Any,
    Text,
    Float,
    Unsigned,
    /// Unsigned or float, whichever fits the value
    Numeric,
}

/// The closed set of step kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Trim,
    #[serde(rename = "ltrim")]
    LTrim,
    #[serde(rename = "rtrim")]
    RTrim,
    RegexExtract,
    RegexReplace,
    StringReplace,
    JsonPath,
    ErrorFieldJson,
    ErrorFieldRegex,
    ValidateRange,
    ValidateRegex,
    ValidateNotRegex,
    CheckNotError,
    BoolToDecimal,
    OctalToDecimal,
    HexToDecimal,
    ToFloat,
    ToUnsigned,
    ToText,
    Multiplier,
    DeltaValue,
    DeltaSpeed,
    DiscardUnchanged,
    DiscardUnchangedHeartbeat,
    Script,
}

impl StepKind {
    /// Every step kind
    pub const ALL: &'static [StepKind] = &[
        StepKind::Trim,
        StepKind::LTrim,
        StepKind::RTrim,
        StepKind::RegexExtract,
        StepKind::RegexReplace,
        StepKind::StringReplace,
        StepKind::JsonPath,
        StepKind::ErrorFieldJson,
        StepKind::ErrorFieldRegex,
        StepKind::ValidateRange,
        StepKind::ValidateRegex,
        StepKind::ValidateNotRegex,
        StepKind::CheckNotError,
        StepKind::BoolToDecimal,
        StepKind::OctalToDecimal,
        StepKind::HexToDecimal,
        StepKind::ToFloat,
        StepKind::ToUnsigned,
        StepKind::ToText,
        StepKind::Multiplier,
        StepKind::DeltaValue,
        StepKind::DeltaSpeed,
        StepKind::DiscardUnchanged,
        StepKind::DiscardUnchangedHeartbeat,
        StepKind::Script,
    ];

    /// Wire name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Trim => "trim",
            StepKind::LTrim => "ltrim",
            StepKind::RTrim => "rtrim",
            StepKind::RegexExtract => "regex_extract",
            StepKind::RegexReplace => "regex_replace",
            StepKind::StringReplace => "string_replace",
            StepKind::JsonPath => "json_path",
            StepKind::ErrorFieldJson => "error_field_json",
            StepKind::ErrorFieldRegex => "error_field_regex",
            StepKind::ValidateRange => "validate_range",
            StepKind::ValidateRegex => "validate_regex",
            StepKind::ValidateNotRegex => "validate_not_regex",
            StepKind::CheckNotError => "check_not_error",
            StepKind::BoolToDecimal => "bool_to_decimal",
            StepKind::OctalToDecimal => "octal_to_decimal",
            StepKind::HexToDecimal => "hex_to_decimal",
            StepKind::ToFloat => "to_float",
            StepKind::ToUnsigned => "to_unsigned",
            StepKind::ToText => "to_text",
            StepKind::Multiplier => "multiplier",
            StepKind::DeltaValue => "delta_value",
            StepKind::DeltaSpeed => "delta_speed",
            StepKind::DiscardUnchanged => "discard_unchanged",
            StepKind::DiscardUnchangedHeartbeat => "discard_unchanged_heartbeat",
            StepKind::Script => "script",
        }
    }

    /// Number of parameters the kind takes
    pub fn arity(&self) -> usize {
        match self {
            StepKind::CheckNotError
            | StepKind::BoolToDecimal
            | StepKind::OctalToDecimal
            | StepKind::HexToDecimal
            | StepKind::ToFloat
            | StepKind::ToUnsigned
            | StepKind::ToText
            | StepKind::DeltaValue
            | StepKind::DeltaSpeed
            | StepKind::DiscardUnchanged => 0,
            StepKind::Trim
            | StepKind::LTrim
            | StepKind::RTrim
            | StepKind::JsonPath
            | StepKind::ErrorFieldJson
            | StepKind::ValidateRegex
            | StepKind::ValidateNotRegex
            | StepKind::Multiplier
            | StepKind::DiscardUnchangedHeartbeat
            | StepKind::Script => 1,
            StepKind::RegexExtract
            | StepKind::RegexReplace
            | StepKind::StringReplace
            | StepKind::ErrorFieldRegex
            | StepKind::ValidateRange => 2,
        }
    }

    /// Input type the executor coerces to before running the step
    pub fn input(&self) -> InputRequirement {
        match self {
            StepKind::Trim
            | StepKind::LTrim
            | StepKind::RTrim
            | StepKind::RegexExtract
            | StepKind::RegexReplace
            | StepKind::StringReplace
            | StepKind::JsonPath
            | StepKind::ErrorFieldJson
            | StepKind::ErrorFieldRegex
            | StepKind::ValidateRegex
            | StepKind::ValidateNotRegex
            | StepKind::BoolToDecimal
            | StepKind::OctalToDecimal
            | StepKind::HexToDecimal
            | StepKind::ToText => InputRequirement::Text,
            StepKind::ToFloat => InputRequirement::Float,
            StepKind::ToUnsigned => InputRequirement::Unsigned,
            StepKind::ValidateRange
            | StepKind::Multiplier
            | StepKind::DeltaValue
            | StepKind::DeltaSpeed => InputRequirement::Numeric,
            StepKind::CheckNotError
            | StepKind::DiscardUnchanged
            | StepKind::DiscardUnchangedHeartbeat
            | StepKind::Script => InputRequirement::Any,
        }
    }

    /// True for kinds whose result depends on the previous observation
    pub fn uses_history(&self) -> bool {
        matches!(
            self,
            StepKind::DeltaValue
                | StepKind::DeltaSpeed
                | StepKind::DiscardUnchanged
                | StepKind::DiscardUnchangedHeartbeat
                | StepKind::Script
        )
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StepKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StepKind::ALL
            .iter()
            .copied()
            .find(|k| k.name() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// What to do when a step fails.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Stop the chain and report the failure
    #[default]
    Abort,
    /// Stop the chain and report success without a value
    #[serde(rename = "discard")]
    DiscardSilently,
    /// Replace the value with a literal and continue
    SetValue(String),
    /// Replace the value with an error value and continue
    #[serde(rename = "set_error")]
    SetCustomError(String),
}

impl ErrorPolicy {
    /// True if the chain keeps running after this policy is applied
    pub fn continues(&self) -> bool {
        matches!(self, ErrorPolicy::SetValue(_) | ErrorPolicy::SetCustomError(_))
    }
}

/// One unit of a preprocessing chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub kind: StepKind,
    pub params: Vec<String>,
    pub on_fail: ErrorPolicy,
}

impl Step {
    pub fn new<I, S>(kind: StepKind, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            params: params.into_iter().map(Into::into).collect(),
            on_fail: ErrorPolicy::Abort,
        }
    }

    /// A step of a kind that takes no parameters
    pub fn bare(kind: StepKind) -> Self {
        Self::new(kind, Vec::<String>::new())
    }

    /// Set the failure policy
    pub fn on_fail(mut self, policy: ErrorPolicy) -> Self {
        self.on_fail = policy;
        self
    }

    /// Parameter `i`, or an empty string if absent
    pub fn param(&self, i: usize) -> &str {
        self.params.get(i).map(String::as_str).unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in StepKind::ALL {
            assert_eq!(kind.name().parse::<StepKind>().unwrap(), *kind);
            let json = serde_json::to_string(kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.name()));
        }
        assert!("frobnicate".parse::<StepKind>().is_err());
    }

    #[test]
    fn test_policy_wire_format() {
        let policy: ErrorPolicy = serde_json::from_str("\"discard\"").unwrap();
        assert_eq!(policy, ErrorPolicy::DiscardSilently);
        let policy: ErrorPolicy = serde_json::from_str(r#"{"set_error":"bad"}"#).unwrap();
        assert_eq!(policy, ErrorPolicy::SetCustomError("bad".to_string()));
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Abort);
        assert!(!ErrorPolicy::Abort.continues());
        assert!(ErrorPolicy::SetValue("0".into()).continues());
    }

    #[test]
    fn test_step_param_defaults_to_empty() {
        let step = Step::new(StepKind::ValidateRange, ["1"]);
        assert_eq!(step.param(0), "1");
        assert_eq!(step.param(1), "");
    }
}
