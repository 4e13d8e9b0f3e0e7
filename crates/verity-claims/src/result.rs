//! Verification result: the stable contract rendered by UIs.

use chrono::{DateTime, Utc};
use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use verity_core::Tier;

/// Bumped whenever a field or the step layout changes shape.
/// Version 2 added `issuer_name`, `verification_method` and `content_hash`.
pub const RESULT_SCHEMA_VERSION: u32 = 2;

/// Pipeline steps in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Step {
    ClaimFetch,
    IssuerResolution,
    MethodResolution,
    /// Runs only when content is presented. Advisory unless required.
    ContentMatch,
    SignatureCheck,
    RegistrationCheck,
}

impl Step {
    pub const ALL: [Step; 6] = [
        Step::ClaimFetch,
        Step::IssuerResolution,
        Step::MethodResolution,
        Step::ContentMatch,
        Step::SignatureCheck,
        Step::RegistrationCheck,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ClaimFetch => "claim_fetch",
            Self::IssuerResolution => "issuer_resolution",
            Self::MethodResolution => "method_resolution",
            Self::ContentMatch => "content_match",
            Self::SignatureCheck => "signature_check",
            Self::RegistrationCheck => "registration_check",
        }
    }

    /// Whether failing this step ends the evaluation.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::ContentMatch | Self::RegistrationCheck)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.name() == s)
            .ok_or_else(|| format!("unknown verification step: {}", s))
    }
}

/// Outcome of one step. Serialized as `true`, `false`, or `null` (skipped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Passed,
    Failed,
    Skipped,
}

impl Serialize for StepOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Passed => serializer.serialize_bool(true),
            Self::Failed => serializer.serialize_bool(false),
            Self::Skipped => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for StepOutcome {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<bool>::deserialize(deserializer)? {
            Some(true) => Self::Passed,
            Some(false) => Self::Failed,
            None => Self::Skipped,
        })
    }
}

/// Step outcomes in the order the steps ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Steps(Vec<(Step, StepOutcome)>);

impl Steps {
    pub fn get(&self, step: Step) -> Option<StepOutcome> {
        self.0.iter().find(|(s, _)| *s == step).map(|(_, o)| *o)
    }

    pub fn contains(&self, step: Step) -> bool {
        self.get(step).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Step, StepOutcome)> + '_ {
        self.0.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Record a step once; later records for the same step are ignored.
    pub(crate) fn record(&mut self, step: Step, outcome: StepOutcome) -> bool {
        if self.contains(step) {
            return false;
        }
        self.0.push((step, outcome));
        true
    }
}

impl Serialize for Steps {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (step, outcome) in &self.0 {
            map.serialize_entry(step.name(), outcome)?;
        }
        map.end()
    }
}

struct StepsVisitor;

impl<'de> Visitor<'de> for StepsVisitor {
    type Value = Steps;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an ordered map of step name to true, false or null")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Steps, A::Error> {
        let mut steps = Steps::default();
        while let Some((name, outcome)) = access.next_entry::<String, StepOutcome>()? {
            let step = name.parse::<Step>().map_err(de::Error::custom)?;
            if !steps.record(step, outcome) {
                return Err(de::Error::custom(format!("duplicate step: {}", name)));
            }
        }
        Ok(steps)
    }
}

impl<'de> Deserialize<'de> for Steps {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(StepsVisitor)
    }
}

/// Outcome of verifying one claim. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub schema_version: u32,
    /// The claim id that was asked for (as given when it could not be parsed).
    pub claim_id: String,
    pub issuer: Option<String>,
    /// Organization name from the issuer's DID document.
    pub issuer_name: Option<String>,
    /// Full id of the method the proof names, once it resolved.
    pub verification_method: Option<String>,
    /// `<algorithm>:<hex>` digest of the claim's content.
    pub content_hash: Option<String>,
    pub verified: bool,
    /// Issuer tier, present only when `verified`.
    pub verification_tier: Option<Tier>,
    pub steps: Steps,
    /// Reasons for failed or skipped steps, keyed by step name.
    #[serde(default)]
    pub details: BTreeMap<String, String>,
    pub verification_time: DateTime<Utc>,
    /// Set only when evaluation itself could not complete.
    pub error_message: Option<String>,
}

impl VerificationResult {
    pub fn step(&self, step: Step) -> Option<StepOutcome> {
        self.steps.get(step)
    }

    pub fn passed(&self, step: Step) -> bool {
        self.step(step) == Some(StepOutcome::Passed)
    }

    pub fn detail(&self, step: Step) -> Option<&str> {
        self.details.get(step.name()).map(String::as_str)
    }
}
