//! Call filters for list and snapshot reads.

use core::str::FromStr;

use rescue_types::CallStatus;

/// Which calls a list or snapshot read includes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CallFilter {
    /// Every non-terminal call. The resync default.
    #[default]
    Open,
    /// `DISPATCHED` through `TRANSPORTING`.
    Active,
    /// `RECEIVED`, awaiting assignment.
    Pending,
    /// `AT_HOSPITAL`, `CLOSED`, or `CANCELLED`.
    Completed,
    /// Every call.
    All,
    /// Exactly one status.
    Status(CallStatus),
}

impl CallFilter {
    /// Whether a call in `status` passes this filter.
    pub fn matches(self, status: CallStatus) -> bool {
        match self {
            Self::Open => !status.is_terminal(),
            Self::Active => status.is_active(),
            Self::Pending => status.is_pending(),
            Self::Completed => status.is_completed(),
            Self::All => true,
            Self::Status(wanted) => status == wanted,
        }
    }
}

impl FromStr for CallFilter {
    type Err = String;

    /// Accepts the bucket names (`open`, `active`, `pending`, `completed`,
    /// `all`) case-insensitively, or an exact status wire name such as
    /// `EN_ROUTE`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "open" => return Ok(Self::Open),
            "active" => return Ok(Self::Active),
            "pending" => return Ok(Self::Pending),
            "completed" => return Ok(Self::Completed),
            "all" => return Ok(Self::All),
            _ => {}
        }
        serde_json::from_value::<CallStatus>(serde_json::Value::String(s.trim().to_ascii_uppercase()))
            .map(Self::Status)
            .map_err(|err| format!("unknown call filter {s}: {err}"))
    }
}
