use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of leave a student asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassType {
    /// Same-day leave, warden-only approval.
    Outing,
    /// Multi-day leave, HOD then warden approval.
    #[serde(alias = "home", alias = "homeVisit", alias = "home-visit")]
    HomeVisit,
}

impl PassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassType::Outing => "outing",
            PassType::HomeVisit => "home_visit",
        }
    }

    pub fn needs_hod(&self) -> bool {
        matches!(self, PassType::HomeVisit)
    }
}

impl fmt::Display for PassType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PassType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "outing" => Ok(PassType::Outing),
            "home_visit" | "home-visit" | "homeVisit" | "home" => Ok(PassType::HomeVisit),
            other => Err(format!("unknown pass type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    #[default]
    Pending,
    #[serde(alias = "hodApproved", alias = "approved_by_hod")]
    HodApproved,
    #[serde(alias = "approved", alias = "wardenApproved")]
    WardenApproved,
    #[serde(alias = "rejected")]
    Declined,
}

impl PassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassStatus::Pending => "pending",
            PassStatus::HodApproved => "hod_approved",
            PassStatus::WardenApproved => "warden_approved",
            PassStatus::Declined => "declined",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PassStatus::WardenApproved | PassStatus::Declined)
    }
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Student,
    Warden,
    Hod,
}

impl Role {
    /// Directory tree holding users of this role.
    pub fn table(&self) -> &'static str {
        match self {
            Role::Student => "students",
            Role::Warden => "warden",
            Role::Hod => "hod",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Warden => "warden",
            Role::Hod => "hod",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory entry for a student, warden or HOD.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "password", skip_serializing_if = "String::is_empty")]
    pub credential: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<String>,
}

impl User {
    /// Copy of the user suitable for persisting client-side.
    pub fn without_credential(&self) -> Self {
        Self {
            credential: String::new(),
            ..self.clone()
        }
    }
}

/// What a student fills in when asking for a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassDraft {
    pub pass_type: PassType,
    pub reason: String,
    pub date: NaiveDate,
    pub return_date: Option<NaiveDate>,
    pub room_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PassRequest {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "type")]
    pub pass_type: PassType,
    #[serde(alias = "studentId", alias = "requester_id", alias = "userId")]
    pub requester_id: String,
    #[serde(default, alias = "studentName", skip_serializing_if = "Option::is_none")]
    pub requester_name: Option<String>,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub block: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    #[serde(default)]
    pub reason: String,
    #[serde(default, alias = "fromDate", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, alias = "toDate", skip_serializing_if = "Option::is_none")]
    pub return_date: Option<NaiveDate>,
    #[serde(default)]
    pub status: PassStatus,
    #[serde(with = "flexible_ts")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "flexible_ts::option", skip_serializing_if = "Option::is_none")]
    pub granted_at: Option<DateTime<Utc>>,
    #[serde(default, with = "flexible_ts::option", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_warden: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_hod: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hod_approved_by: Option<String>,
    #[serde(default, with = "flexible_ts::option", skip_serializing_if = "Option::is_none")]
    pub hod_approved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warden_approved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub declined_by: Option<String>,
    #[serde(default, with = "flexible_ts::option", skip_serializing_if = "Option::is_none")]
    pub declined_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<String>,
}

/// Field names older clients wrote in place of the camelCase ones. A stored
/// document must never carry one of these next to its canonical name.
pub const LEGACY_FIELD_NAMES: &[&str] = &[
    "studentId",
    "requester_id",
    "userId",
    "studentName",
    "fromDate",
    "toDate",
];

impl PassRequest {
    /// Fresh pending request for `student`. The id is left empty until the
    /// store hands out a key.
    pub fn new(student: &User, draft: PassDraft, now: DateTime<Utc>) -> Self {
        Self {
            id: String::new(),
            pass_type: draft.pass_type,
            requester_id: student.id.clone(),
            requester_name: Some(student.name.clone()).filter(|n| !n.is_empty()),
            department: student.department.clone().unwrap_or_default(),
            block: student.block.clone().unwrap_or_default(),
            room_number: draft.room_number,
            reason: draft.reason,
            date: Some(draft.date),
            return_date: draft.return_date,
            status: PassStatus::Pending,
            created_at: now,
            granted_at: None,
            expires_at: None,
            assigned_warden: None,
            assigned_hod: None,
            hod_approved_by: None,
            hod_approved_at: None,
            warden_approved_by: None,
            declined_by: None,
            declined_at: None,
            decline_reason: None,
        }
    }

    /// Whether `user_id` stamped an approval or decline on this request.
    pub fn acted_on_by(&self, user_id: &str) -> bool {
        [
            &self.hod_approved_by,
            &self.warden_approved_by,
            &self.declined_by,
        ]
        .iter()
        .any(|stamp| stamp.as_deref() == Some(user_id))
    }
}

/// Timestamps are written as epoch milliseconds; older records may carry
/// RFC 3339 strings or floats.
pub(crate) mod flexible_ts {
    use chrono::{DateTime, TimeZone, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Millis(i64),
        Float(f64),
        Text(String),
    }

    fn from_millis(ms: i64) -> Result<DateTime<Utc>, String> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| format!("timestamp out of range: {}", ms))
    }

    fn from_raw(raw: Raw) -> Result<DateTime<Utc>, String> {
        match raw {
            Raw::Millis(ms) => from_millis(ms),
            Raw::Float(f) => from_millis(f as i64),
            Raw::Text(s) => {
                if let Ok(ms) = s.trim().parse::<i64>() {
                    return from_millis(ms);
                }
                DateTime::parse_from_rfc3339(s.trim())
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|e| format!("invalid timestamp '{}': {}", s, e))
            }
        }
    }

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_i64(ts.timestamp_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        from_raw(Raw::deserialize(d)?).map_err(D::Error::custom)
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            ts: &Option<DateTime<Utc>>,
            s: S,
        ) -> Result<S::Ok, S::Error> {
            match ts {
                Some(ts) => s.serialize_some(&ts.timestamp_millis()),
                None => s.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            d: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<Raw>::deserialize(d)? {
                Some(raw) => from_raw(raw).map(Some).map_err(D::Error::custom),
                None => Ok(None),
            }
        }
    }
}
