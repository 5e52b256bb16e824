use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum CandidateStatus {
    Incomplete,
    Active,
    Hired,
    Archived,
}

impl CandidateStatus {
    pub const ALL: [CandidateStatus; 4] = [
        CandidateStatus::Incomplete,
        CandidateStatus::Active,
        CandidateStatus::Hired,
        CandidateStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Incomplete => "incomplete",
            CandidateStatus::Active => "active",
            CandidateStatus::Hired => "hired",
            CandidateStatus::Archived => "archived",
        }
    }
}

impl std::fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CandidateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CandidateStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Invalid status: {}", s))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: Uuid,
    pub bot_id: Uuid,
    pub job_id: Uuid,
    pub channel_user_id: String,
    pub username: Option<String>,
    pub lang: String,
    pub status: CandidateStatus,
    pub current_step: i32,
    pub column_id: Option<Uuid>,
    pub full_name: Option<String>,
    pub age: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    #[serde(skip)]
    pub last_answer_key: Option<String>,
    #[serde(skip)]
    pub last_answer_step: Option<i32>,
    pub last_activity: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub bot_id: Uuid,
    pub job_id: Uuid,
    pub channel_user_id: String,
    pub username: Option<String>,
    pub lang: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFilter {
    pub status: Option<CandidateStatus>,
    pub bot_id: Option<Uuid>,
    pub job_id: Option<Uuid>,
    pub column_id: Option<Uuid>,
    pub search: Option<String>,
}

impl CandidateFilter {
    /// Blank search text matches everything.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, candidate: &Candidate) -> bool {
        self.status.map_or(true, |s| candidate.status == s)
            && self.bot_id.map_or(true, |b| candidate.bot_id == b)
            && self.job_id.map_or(true, |j| candidate.job_id == j)
            && self.column_id.map_or(true, |c| candidate.column_id == Some(c))
            && self.search_term().map_or(true, |term| {
                [
                    &candidate.full_name,
                    &candidate.username,
                    &candidate.email,
                    &candidate.phone,
                ]
                .into_iter()
                .flatten()
                .any(|field| field.to_lowercase().contains(&term))
            })
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageRequest {
    pub fn page(&self) -> u32 {
        self.page.filter(|p| *p > 0).unwrap_or(1)
    }

    pub fn limit(&self) -> u32 {
        self.limit
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }

    pub fn pages(&self, total: i64) -> u32 {
        let limit = i64::from(self.limit());
        ((total.max(0) + limit - 1) / limit) as u32
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatePage {
    pub candidates: Vec<CandidateSummary>,
    pub total: i64,
    pub page: u32,
    pub pages: u32,
}

/// Operator edit of the profile fields. `None` leaves a field as it is and an
/// empty string clears it.
#[derive(Debug, Clone, Default)]
pub struct ProfilePatch {
    pub full_name: Option<String>,
    pub age: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub lang: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.age.is_none()
            && self.phone.is_none()
            && self.email.is_none()
            && self.lang.is_none()
    }

    pub fn apply(self, candidate: &mut Candidate) {
        fn set(field: &mut Option<String>, value: Option<String>) {
            if let Some(value) = value {
                let value = value.trim();
                *field = (!value.is_empty()).then(|| value.to_string());
            }
        }
        set(&mut candidate.full_name, self.full_name);
        set(&mut candidate.age, self.age);
        set(&mut candidate.phone, self.phone);
        set(&mut candidate.email, self.email);
        if let Some(lang) = self.lang {
            candidate.lang = lang.trim().to_string();
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSummary {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFile {
    pub id: Uuid,
    pub candidate_id: Uuid,
    pub file_ref: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub local_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCandidateFile {
    pub candidate_id: Uuid,
    pub file_ref: String,
    pub file_name: String,
    pub mime_type: Option<String>,
    pub local_path: Option<String>,
}
