//! Data models for the platform services.
//!
//! Statistics payloads are fetched as free-form JSON and only interpreted here,
//! so a schema change in one service never breaks aggregation of the others.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Credentials sent to the auth service.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Successful login answer.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    /// Token lifetime in seconds.
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub user: Option<AdminUser>,
}

/// Administrator account returned by the auth service.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Counts keyed by a free-form label (course, faculty, category...).
pub type Breakdown = BTreeMap<String, Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffStatistics {
    pub total_students: u64,
    pub total_teachers: u64,
    pub active_students: u64,
    pub active_teachers: u64,
    pub students_by_course: Breakdown,
    pub students_by_faculty: Breakdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicantStatistics {
    pub total_applicants: u64,
    pub new_applicants: u64,
    pub contacted_applicants: u64,
    pub enrolled_applicants: u64,
    pub rejected_applicants: u64,
    pub applicants_by_program: Breakdown,
    pub applicants_by_source: Breakdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventStatistics {
    pub total_events: u64,
    pub published_events: u64,
    pub completed_events: u64,
    pub events_by_category: Breakdown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateStatistics {
    pub total_certificates: u64,
    pub pending_certificates: u64,
    pub processing_certificates: u64,
    pub ready_certificates: u64,
    pub issued_certificates: u64,
    pub cancelled_certificates: u64,
    pub certificates_by_type: Breakdown,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryStatistics {
    pub total_books: u64,
    pub total_copies: u64,
    pub available_copies: u64,
    pub books_by_category: Breakdown,
}

impl LibraryStatistics {
    /// Copies currently lent out.
    pub fn copies_on_loan(&self) -> u64 {
        self.total_copies.saturating_sub(self.available_copies)
    }
}

/// Typed view of one service's statistics payload.
#[derive(Debug, Clone)]
pub enum ServiceStatistics {
    Staff(StaffStatistics),
    Applicants(ApplicantStatistics),
    Events(EventStatistics),
    Certificates(CertificateStatistics),
    Library(LibraryStatistics),
}

impl ServiceStatistics {
    /// Interpret the payload of `source`. Unknown sources and payloads that are
    /// not JSON objects yield `None`.
    pub fn parse(source: &str, value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }

        let parsed = match source {
            "staff" => Self::Staff(serde_json::from_value(value.clone()).ok()?),
            "applicants" => Self::Applicants(serde_json::from_value(value.clone()).ok()?),
            "events" => Self::Events(serde_json::from_value(value.clone()).ok()?),
            "certificates" => Self::Certificates(serde_json::from_value(value.clone()).ok()?),
            "library" => Self::Library(serde_json::from_value(value.clone()).ok()?),
            _ => return None,
        };
        Some(parsed)
    }

    /// Headline figures as `(label, value)` pairs for display.
    pub fn headline(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Staff(s) => vec![
                ("Students", s.total_students.to_string()),
                ("Teachers", s.total_teachers.to_string()),
                ("Active students", s.active_students.to_string()),
                ("Active teachers", s.active_teachers.to_string()),
            ],
            Self::Applicants(s) => vec![
                ("Applicants", s.total_applicants.to_string()),
                ("New", s.new_applicants.to_string()),
                ("Contacted", s.contacted_applicants.to_string()),
                ("Enrolled", s.enrolled_applicants.to_string()),
                ("Rejected", s.rejected_applicants.to_string()),
            ],
            Self::Events(s) => vec![
                ("Events", s.total_events.to_string()),
                ("Published", s.published_events.to_string()),
                ("Completed", s.completed_events.to_string()),
            ],
            Self::Certificates(s) => vec![
                ("Certificates", s.total_certificates.to_string()),
                ("Pending", s.pending_certificates.to_string()),
                ("Processing", s.processing_certificates.to_string()),
                ("Ready", s.ready_certificates.to_string()),
                ("Issued", s.issued_certificates.to_string()),
                ("Revenue", format!("{:.2}", s.total_revenue)),
            ],
            Self::Library(s) => vec![
                ("Books", s.total_books.to_string()),
                ("Copies", s.total_copies.to_string()),
                ("Available", s.available_copies.to_string()),
                ("On loan", s.copies_on_loan().to_string()),
            ],
        }
    }

    /// The main breakdown table of the payload, if any.
    pub fn breakdown(&self) -> Option<(&'static str, &Breakdown)> {
        let (label, map) = match self {
            Self::Staff(s) => ("Students by faculty", &s.students_by_faculty),
            Self::Applicants(s) => ("Applicants by program", &s.applicants_by_program),
            Self::Events(s) => ("Events by category", &s.events_by_category),
            Self::Certificates(s) => ("Certificates by type", &s.certificates_by_type),
            Self::Library(s) => ("Books by category", &s.books_by_category),
        };
        (!map.is_empty()).then_some((label, map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_fields_default() {
        let stats = ServiceStatistics::parse("staff", &json!({"total_students": 3})).unwrap();
        match stats {
            ServiceStatistics::Staff(s) => {
                assert_eq!(s.total_students, 3);
                assert_eq!(s.total_teachers, 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_library_on_loan_saturates() {
        let lib = LibraryStatistics {
            total_copies: 10,
            available_copies: 4,
            ..Default::default()
        };
        assert_eq!(lib.copies_on_loan(), 6);

        let inconsistent = LibraryStatistics {
            total_copies: 2,
            available_copies: 5,
            ..Default::default()
        };
        assert_eq!(inconsistent.copies_on_loan(), 0);
    }

    #[test]
    fn test_unknown_source_or_non_object() {
        assert!(ServiceStatistics::parse("payroll", &json!({})).is_none());
        assert!(ServiceStatistics::parse("events", &json!([1, 2])).is_none());
        assert!(ServiceStatistics::parse("events", &json!({"total_events": "many"})).is_none());
    }

    #[test]
    fn test_headline_and_breakdown() {
        let stats = ServiceStatistics::parse(
            "events",
            &json!({"total_events": 5, "published_events": 2, "events_by_category": {"sport": 3}}),
        )
        .unwrap();

        let headline = stats.headline();
        assert_eq!(headline[0], ("Events", "5".to_string()));

        let (label, map) = stats.breakdown().unwrap();
        assert_eq!(label, "Events by category");
        assert_eq!(map.get("sport"), Some(&json!(3)));
    }

    #[test]
    fn test_login_response_minimal() {
        let resp: LoginResponse =
            serde_json::from_value(json!({"access_token": "tok", "token_type": "bearer"})).unwrap();
        assert_eq!(resp.access_token, "tok");
        assert!(resp.user.is_none());
    }
}
