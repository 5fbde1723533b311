use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Eligibility threshold that may impose no constraint. The wire encoding
/// is either a number-as-string or the literal sentinel "Not Mentioned";
/// in memory it is an explicit optional so the evaluator never branches on
/// a magic string. Only the exact sentinel means unconstrained; any other
/// non-numeric value is Invalid and admits nobody.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrearsLimit {
    #[default]
    NotMentioned,
    AtMost(i64),
    Invalid,
}

pub const NOT_MENTIONED: &str = "Not Mentioned";

impl ArrearsLimit {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw == NOT_MENTIONED {
            return ArrearsLimit::NotMentioned;
        }
        match raw.parse::<i64>() {
            Ok(n) => ArrearsLimit::AtMost(n),
            Err(_) => ArrearsLimit::Invalid,
        }
    }

    /// Whether a student with this many arrears clears the limit.
    pub fn admits(self, count: i64) -> bool {
        match self {
            ArrearsLimit::NotMentioned => true,
            ArrearsLimit::AtMost(max) => count <= max,
            ArrearsLimit::Invalid => false,
        }
    }
}

impl Serialize for ArrearsLimit {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ArrearsLimit::NotMentioned => serializer.serialize_str(NOT_MENTIONED),
            ArrearsLimit::AtMost(n) => serializer.serialize_str(&n.to_string()),
            // Only ever produced by decoding a malformed stored value.
            ArrearsLimit::Invalid => serializer.serialize_str("NaN"),
        }
    }
}

impl<'de> Deserialize<'de> for ArrearsLimit {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Number(n) => match n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)) {
                Some(n) => ArrearsLimit::AtMost(n),
                None => ArrearsLimit::Invalid,
            },
            Value::String(s) => ArrearsLimit::parse(&s),
            _ => ArrearsLimit::Invalid,
        })
    }
}

/// A student record in `Users_details`. Documents live under generated ids
/// and are addressed through the indexed "Register Number" field. Numeric
/// academic fields are stored as strings on the wire and parsed on read.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Student {
    #[serde(rename = "Register Number")]
    pub register_number: String,
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Email", default)]
    pub email: String,
    #[serde(rename = "CGPA", default)]
    pub cgpa: String,
    #[serde(rename = "History of Arrears", default)]
    pub history_of_arrears: String,
    #[serde(rename = "Current Backlogs", default)]
    pub current_backlogs: String,
    /// Lowercase on the wire; absent for older records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(rename = "Resume", default)]
    pub resume: String,
    #[serde(rename = "Github", default)]
    pub github: String,
    #[serde(rename = "LinkedIn", default)]
    pub linkedin: String,
    #[serde(rename = "Roll No", default)]
    pub roll_no: String,
    #[serde(rename = "Mobile Number", default)]
    pub mobile_number: String,
    #[serde(rename = "10 Percent", default)]
    pub tenth_percent: String,
    #[serde(rename = "Diploma / 12th Percentage", default)]
    pub diploma_percent: String,
    #[serde(rename = "isDiploma", default)]
    pub is_diploma: String, // "Yes" / "No"
    #[serde(rename = "SkillSet", default)]
    pub skill_set: String,
    #[serde(rename = "Domain", default)]
    pub domain: String,
    #[serde(rename = "OtherInterestedDomain", default)]
    pub other_interested_domain: String,
    #[serde(rename = "isMentor", default)]
    pub is_mentor: i64, // 0 / 1
}

impl Student {
    pub fn cgpa_raw(&self) -> f64 {
        self.cgpa.trim().parse().unwrap_or(0.0)
    }

    pub fn history_of_arrears(&self) -> i64 {
        self.history_of_arrears.trim().parse().unwrap_or(0)
    }

    pub fn current_backlogs(&self) -> i64 {
        self.current_backlogs.trim().parse().unwrap_or(0)
    }
}

/// A recruiting company in `Company`, keyed by generated id. `name` doubles
/// as the foreign key into `Company_Applications`, so it must stay unique
/// and stable once applications exist.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Company {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ctc: String,
    #[serde(default)]
    pub criteria: String,
    #[serde(rename = "type", default)]
    pub company_type: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub link: String,
    #[serde(rename = "imageUrls", default)]
    pub image_urls: Vec<String>,
    #[serde(rename = "maxAllowedHistoryOfArrears", default)]
    pub max_history_of_arrears: ArrearsLimit,
    #[serde(rename = "maxAllowedStandingArrears", default)]
    pub max_standing_arrears: ArrearsLimit,
    /// Optional gender restriction; unset or empty means open to all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(rename = "feedbackStatus", default)]
    pub feedback_status: bool,
    #[serde(rename = "feedbackCompleted", default)]
    pub feedback_completed: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Company {
    pub fn criteria(&self) -> f64 {
        self.criteria.trim().parse().unwrap_or(0.0)
    }
}

/// Post-rejection feedback captured per student.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RejectionFeedback {
    #[serde(rename = "needTraining", default)]
    pub need_training: bool,
    #[serde(rename = "rejectedRound", default)]
    pub rejected_round: String,
}

/// One placement outcome. The same shape backs both sides of the
/// denormalized pair: `Company_Applications.placed` keyed by register
/// number and `Applications_Tracking.placed` keyed by company name.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Placement {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub ctc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(rename = "offerLetter", default, skip_serializing_if = "Option::is_none")]
    pub offer_letter: Option<String>,
    #[serde(rename = "offerLetterUrl", default, skip_serializing_if = "Option::is_none")]
    pub offer_letter_url: Option<String>,
    #[serde(rename = "offerDate", default, skip_serializing_if = "Option::is_none")]
    pub offer_date: Option<DateTime<Utc>>,
    #[serde(rename = "companyType", default, skip_serializing_if = "Option::is_none")]
    pub company_type: Option<String>,
    #[serde(rename = "offCampus", default, skip_serializing_if = "Option::is_none")]
    pub off_campus: Option<bool>,
    /// Only ever written on the tracking side; the company side never
    /// carries it.
    #[serde(rename = "offerAccepted", default, skip_serializing_if = "Option::is_none")]
    pub offer_accepted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Denormalized application state in `Company_Applications`, keyed by
/// company name.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompanyApplication {
    #[serde(default)]
    pub willing: Vec<String>,
    #[serde(rename = "notWilling", default)]
    pub not_willing: Vec<String>,
    #[serde(default)]
    pub feedback: BTreeMap<String, RejectionFeedback>,
    #[serde(default)]
    pub placed: BTreeMap<String, Placement>,
}

/// Per-student mirror in `Applications_Tracking`, keyed by register
/// number. Mutated in lockstep with `CompanyApplication` by the same
/// logical event, via separate writes.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApplicationTracking {
    #[serde(rename = "Status", default)]
    pub status: BTreeMap<String, bool>,
    #[serde(default)]
    pub placed: BTreeMap<String, Placement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// A coding-practice problem in `Problems`, keyed by generated id.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PracticeProblem {
    #[serde(rename = "problemName", default)]
    pub problem_name: String,
    #[serde(rename = "problemDescription", default)]
    pub problem_description: String,
    #[serde(rename = "sampleInput", default)]
    pub sample_input: String,
    #[serde(rename = "sampleOutput", default)]
    pub sample_output: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub hint: String,
    #[serde(default)]
    pub input1: String,
    #[serde(default)]
    pub input2: String,
    #[serde(default)]
    pub output1: String,
    #[serde(default)]
    pub output2: String,
    #[serde(default)]
    pub explanation1: String,
    #[serde(default)]
    pub explanation2: String,
    #[serde(default)]
    pub constraints: String,
}

/// Listing row for the timed-test question bank; documents without a
/// problemName are skipped by the listing.
#[derive(Debug, Clone, Serialize)]
pub struct TestProblemSummary {
    pub id: String,
    #[serde(rename = "problemName")]
    pub problem_name: String,
    pub topic: String,
    pub difficulty: String,
}

/// One submission inside `Tests.completionStatus`; the list per register
/// number is append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub score: f64,
    #[serde(rename = "completedTime")]
    pub completed_time: DateTime<Utc>,
    /// Single problem id; plural name kept from the wire.
    #[serde(rename = "problemIds")]
    pub problem_ids: String,
}

/// A timed test in `Tests`, keyed by explicit id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    #[serde(rename = "problemIds", default)]
    pub problem_ids: Vec<String>,
    #[serde(rename = "numberOfProblems", default)]
    pub number_of_problems: i64,
    #[serde(rename = "dueTime")]
    pub due_time: DateTime<Utc>,
    #[serde(rename = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "completionStatus", default)]
    pub completion_status: BTreeMap<String, Vec<Submission>>,
}

/// A crowd-sourced interview question in `CompanyQuestions`, keyed by
/// generated id. Tags arrive as one comma-separated string and are stored
/// as an array.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CompanyQuestion {
    #[serde(rename = "companyName", default)]
    pub company_name: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub round: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(rename = "externalLinks", default)]
    pub external_links: String,
    #[serde(rename = "additionalNotes", default)]
    pub additional_notes: String,
    #[serde(rename = "registerNumber", default)]
    pub register_number: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Gate for student CGPA edits, a single config document.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CgpaConfig {
    #[serde(rename = "isAllow")]
    pub is_allow: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_arrears_limit_sentinel_round_trip() {
        let limit: ArrearsLimit = serde_json::from_value(json!("Not Mentioned")).unwrap();
        assert_eq!(limit, ArrearsLimit::NotMentioned);
        assert_eq!(serde_json::to_value(limit).unwrap(), json!("Not Mentioned"));

        let limit: ArrearsLimit = serde_json::from_value(json!("3")).unwrap();
        assert_eq!(limit, ArrearsLimit::AtMost(3));
        assert_eq!(serde_json::to_value(limit).unwrap(), json!("3"));

        let limit: ArrearsLimit = serde_json::from_value(json!(2)).unwrap();
        assert_eq!(limit, ArrearsLimit::AtMost(2));
    }

    #[test]
    fn test_arrears_limit_malformed_is_not_unconstrained() {
        // Only the exact sentinel means "no limit"; anything else
        // non-numeric must deny rather than admit everyone.
        assert_eq!(ArrearsLimit::parse("garbage"), ArrearsLimit::Invalid);
        assert_eq!(ArrearsLimit::parse("  Not Mentioned  "), ArrearsLimit::NotMentioned);
        assert!(!ArrearsLimit::Invalid.admits(0));
        assert!(ArrearsLimit::NotMentioned.admits(99));
        assert!(ArrearsLimit::AtMost(2).admits(2));
        assert!(!ArrearsLimit::AtMost(2).admits(3));

        let limit: ArrearsLimit = serde_json::from_value(json!("none")).unwrap();
        assert_eq!(limit, ArrearsLimit::Invalid);
    }

    #[test]
    fn test_student_wire_field_names() {
        let student: Student = serde_json::from_value(json!({
            "Register Number": "711721CS001",
            "CGPA": "8.5",
            "History of Arrears": "2",
            "Current Backlogs": "1",
            "gender": "female"
        }))
        .unwrap();
        assert_eq!(student.register_number, "711721CS001");
        assert_eq!(student.history_of_arrears(), 2);
        assert_eq!(student.current_backlogs(), 1);

        let value = serde_json::to_value(&student).unwrap();
        assert!(value.get("History of Arrears").is_some());
        assert!(value.get("Current Backlogs").is_some());
    }

    #[test]
    fn test_student_numeric_fields_default_to_zero() {
        let student = Student {
            cgpa: "n/a".into(),
            current_backlogs: "".into(),
            ..Default::default()
        };
        assert_eq!(student.cgpa_raw(), 0.0);
        assert_eq!(student.current_backlogs(), 0);
    }

    #[test]
    fn test_company_application_defaults() {
        let app: CompanyApplication = serde_json::from_value(json!({})).unwrap();
        assert!(app.willing.is_empty());
        assert!(app.placed.is_empty());
    }
}
