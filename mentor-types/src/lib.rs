//! Shared data model for the Mentor de Redação client
//!
//! These types mirror the JSON payloads of the remote REST API and are used by:
//! - the HTTP gateway and services (`mentor-client`)
//! - the client-side caches and the feedback poller
//! - the terminal host (`mentor-cli`)
//!
//! Field names are camelCase on the wire, enum values SCREAMING_SNAKE_CASE.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub type EssayId = i64;
pub type FeedbackId = i64;
pub type UserId = i64;

// ============================================================================
// Essays
// ============================================================================

/// Lifecycle status of an essay as reported by the server.
///
/// The client never owns this value; it mirrors whatever the gateway last
/// returned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EssayStatus {
    Draft,
    Submitted,
    Analyzed,
    Archived,
}

impl EssayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Submitted => "SUBMITTED",
            Self::Analyzed => "ANALYZED",
            Self::Archived => "ARCHIVED",
        }
    }

    /// Sent for analysis, no result yet.
    pub fn is_awaiting_analysis(&self) -> bool {
        matches!(self, Self::Submitted)
    }

    /// A new analysis may be requested for essays in these states.
    pub fn can_request_analysis(&self) -> bool {
        matches!(self, Self::Submitted | Self::Analyzed)
    }

    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl std::fmt::Display for EssayStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for EssayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "SUBMITTED" => Ok(Self::Submitted),
            "ANALYZED" => Ok(Self::Analyzed),
            "ARCHIVED" => Ok(Self::Archived),
            other => Err(format!(
                "unknown essay status '{other}', expected one of DRAFT, SUBMITTED, ANALYZED, ARCHIVED"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Essay {
    pub id: EssayId,
    pub title: String,
    #[serde(default)]
    pub theme: String,
    #[serde(default)]
    pub content: String,
    pub status: EssayStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essay_type: Option<String>,
    /// Cached by the server, may lag behind `content`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_count: Option<u32>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub feedbacks: Vec<Feedback>,
}

impl Essay {
    /// Server-cached word count, or a fresh count of `content` when absent.
    pub fn word_count(&self) -> u32 {
        self.word_count
            .unwrap_or_else(|| word_count(&self.content))
    }

    pub fn word_count_band(&self) -> WordCountBand {
        WordCountBand::for_count(self.word_count())
    }
}

/// Fields the user edits when creating or updating an essay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct EssayDraft {
    pub title: String,
    pub theme: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essay_type: Option<String>,
}

impl EssayDraft {
    pub fn new(
        title: impl Into<String>,
        theme: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            theme: theme.into(),
            content: content.into(),
            essay_type: None,
        }
    }

    pub fn word_count(&self) -> u32 {
        word_count(&self.content)
    }
}

/// Count whitespace separated words.
pub fn word_count(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

/// Length guidance for an ENEM essay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordCountBand {
    TooShort,
    Short,
    Ideal,
    Long,
}

impl WordCountBand {
    pub const MIN_WORDS: u32 = 150;
    pub const COMFORTABLE_WORDS: u32 = 250;
    pub const MAX_WORDS: u32 = 400;

    pub fn for_count(words: u32) -> Self {
        if words < Self::MIN_WORDS {
            Self::TooShort
        } else if words < Self::COMFORTABLE_WORDS {
            Self::Short
        } else if words <= Self::MAX_WORDS {
            Self::Ideal
        } else {
            Self::Long
        }
    }
}

// ============================================================================
// Feedback
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackType {
    AiGenerated,
    HumanReview,
    PeerReview,
}

/// Scored critique produced by the server-side analysis pipeline.
///
/// Immutable from the client's point of view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: FeedbackId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub essay_id: Option<EssayId>,
    /// 0..=1000
    #[serde(default)]
    pub overall_score: Option<u32>,
    /// 0..=200 each
    #[serde(default)]
    pub competence1_score: Option<u32>,
    #[serde(default)]
    pub competence2_score: Option<u32>,
    #[serde(default)]
    pub competence3_score: Option<u32>,
    #[serde(default)]
    pub competence4_score: Option<u32>,
    #[serde(default)]
    pub competence5_score: Option<u32>,
    #[serde(default)]
    pub general_comment: String,
    #[serde(default)]
    pub competence1_comment: Option<String>,
    #[serde(default)]
    pub competence2_comment: Option<String>,
    #[serde(default)]
    pub competence3_comment: Option<String>,
    #[serde(default)]
    pub competence4_comment: Option<String>,
    #[serde(default)]
    pub competence5_comment: Option<String>,
    #[serde(default)]
    pub competence1_detailed: Option<String>,
    #[serde(default)]
    pub competence2_detailed: Option<String>,
    #[serde(default)]
    pub competence3_detailed: Option<String>,
    #[serde(default)]
    pub competence4_detailed: Option<String>,
    #[serde(default)]
    pub competence5_detailed: Option<String>,
    #[serde(default)]
    pub line_errors: Option<String>,
    #[serde(default)]
    pub web_research_context: Option<String>,
    #[serde(default)]
    pub suggestions: Option<String>,
    #[serde(default)]
    pub positive_points: Option<String>,
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Feedback {
    pub const MAX_OVERALL_SCORE: u32 = 1000;
    pub const MAX_COMPETENCE_SCORE: u32 = 200;

    pub fn competence_scores(&self) -> [Option<u32>; 5] {
        [
            self.competence1_score,
            self.competence2_score,
            self.competence3_score,
            self.competence4_score,
            self.competence5_score,
        ]
    }

    pub fn competence_comments(&self) -> [Option<&str>; 5] {
        [
            self.competence1_comment.as_deref(),
            self.competence2_comment.as_deref(),
            self.competence3_comment.as_deref(),
            self.competence4_comment.as_deref(),
            self.competence5_comment.as_deref(),
        ]
    }

    /// Sum of the competence scores that are present.
    pub fn competence_total(&self) -> u32 {
        self.competence_scores().iter().flatten().sum()
    }

    pub fn scores_within_bounds(&self) -> bool {
        self.overall_score
            .map_or(true, |s| s <= Self::MAX_OVERALL_SCORE)
            && self
                .competence_scores()
                .iter()
                .flatten()
                .all(|s| *s <= Self::MAX_COMPETENCE_SCORE)
    }
}

// ============================================================================
// Users & auth
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_goals: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Google ID token obtained by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleLoginRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_goals: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageResponse {
    pub message: String,
}

/// Partial profile update; absent fields are left untouched.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub school_grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_goals: Option<String>,
}

impl UpdateProfileRequest {
    /// Apply the present fields onto `user`.
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name = name.clone();
        }
        if let Some(email) = &self.email {
            user.email = email.clone();
        }
        if let Some(phone) = &self.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(grade) = &self.school_grade {
            user.school_grade = Some(grade.clone());
        }
        if let Some(goals) = &self.study_goals {
            user.study_goals = Some(goals.clone());
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

// ============================================================================
// Listing & stats
// ============================================================================

/// One page of a server-side paginated collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u32,
    pub size: u32,
    pub number: u32,
    #[serde(default)]
    pub first: bool,
    #[serde(default)]
    pub last: bool,
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub average_score: f64,
    pub feedback_count: u64,
    pub total_essays: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EssaySortField {
    CreatedAt,
    #[default]
    UpdatedAt,
    Title,
    WordCount,
    Status,
}

impl EssaySortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedAt => "createdAt",
            Self::UpdatedAt => "updatedAt",
            Self::Title => "title",
            Self::WordCount => "wordCount",
            Self::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// Parameters of `GET /essays`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EssayQuery {
    pub page: u32,
    pub size: u32,
    pub sort_by: EssaySortField,
    pub sort_dir: SortDirection,
    pub status: Option<EssayStatus>,
    pub keyword: Option<String>,
    pub date: Option<NaiveDate>,
}

impl Default for EssayQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: 10,
            sort_by: EssaySortField::default(),
            sort_dir: SortDirection::default(),
            status: None,
            keyword: None,
            date: None,
        }
    }
}

impl EssayQuery {
    pub fn page(page: u32, size: u32) -> Self {
        Self {
            page,
            size,
            ..Self::default()
        }
    }

    pub fn sorted(mut self, sort_by: EssaySortField, sort_dir: SortDirection) -> Self {
        self.sort_by = sort_by;
        self.sort_dir = sort_dir;
        self
    }

    pub fn with_status(mut self, status: EssayStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn on_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Query string pairs; blank keywords are omitted.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("size", self.size.to_string()),
            ("sortBy", self.sort_by.as_str().to_string()),
            ("sortDir", self.sort_dir.as_str().to_string()),
        ];
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(keyword) = self.keyword.as_deref().map(str::trim) {
            if !keyword.is_empty() {
                pairs.push(("keyword", keyword.to_string()));
            }
        }
        if let Some(date) = self.date {
            pairs.push(("date", date.format("%Y-%m-%d").to_string()));
        }
        pairs
    }
}

// ============================================================================
// Timestamps
// ============================================================================

/// Serde adapter for server timestamps.
///
/// Accepts RFC 3339 (`2024-03-01T10:00:00Z`, `...+00:00`) as well as the
/// offset-less local date-time the backend emits (`2024-03-01T10:00:00.123`),
/// which is taken as UTC. Always serializes RFC 3339.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    const LOCAL_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

    pub fn parse(raw: &str) -> Result<DateTime<Utc>, String> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Ok(dt.with_timezone(&Utc));
        }
        LOCAL_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
            .ok_or_else(|| format!("invalid timestamp '{raw}'"))
    }

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(dt) => super::serialize(dt, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(raw) if !raw.trim().is_empty() => {
                    super::parse(&raw).map(Some).map_err(D::Error::custom)
                }
                _ => Ok(None),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
