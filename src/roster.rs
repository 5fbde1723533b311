//! Student roster and profile operations, plus the company listings the
//! student side browses.

use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::info;

use crate::config::CGPA_CONFIG_KEY;
use crate::eligibility;
use crate::error::{Error, Result};
use crate::models::{CgpaConfig, Company, CompanyApplication, Student};
use crate::store::{collections, Store};

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{what} is required")));
    }
    Ok(())
}

fn student_doc(store: &Store, register_number: &str) -> Result<(String, Value)> {
    store
        .find_by_field(collections::STUDENTS, "Register Number", register_number)?
        .ok_or_else(|| Error::not_found(format!("student {register_number} not found")))
}

pub fn get_student(store: &Store, register_number: &str) -> Result<Student> {
    let (_, body) = student_doc(store, register_number)?;
    Ok(serde_json::from_value(body)?)
}

pub fn all_students(store: &Store) -> Result<Vec<Student>> {
    let mut out = Vec::new();
    for (_, body) in store.scan(collections::STUDENTS)? {
        out.push(serde_json::from_value(body)?);
    }
    Ok(out)
}

// --- Onboarding ---

/// Creates the bare roster record for a new student. Every profile field
/// starts empty and isMentor starts at 0; the record is filled in by
/// [`complete_onboarding`] later.
pub fn onboard_student(store: &Store, register_number: &str, name: &str, email: &str) -> Result<String> {
    require(register_number, "register number")?;
    require(email, "email")?;
    if store
        .find_by_field(collections::STUDENTS, "Register Number", register_number)?
        .is_some()
    {
        return Err(Error::validation(format!(
            "student {register_number} already exists"
        )));
    }

    let student = Student {
        register_number: register_number.to_string(),
        name: name.to_string(),
        email: email.to_string(),
        is_diploma: "No".to_string(),
        is_mentor: 0,
        ..Default::default()
    };
    let id = store.insert(collections::STUDENTS, &serde_json::to_value(&student)?)?;
    info!(register_number, "student onboarded");
    Ok(id)
}

/// Everything the completed-onboarding form carries. All of it is
/// mandatory; the gate rejects before any write.
pub struct OnboardingProfile {
    pub register_number: String,
    pub roll_no: String,
    pub mobile_number: String,
    pub tenth_percent: String,
    pub diploma_percent: String,
    pub is_diploma: bool,
    pub cgpa: String,
    pub history_of_arrears: String,
    pub current_backlogs: String,
    pub gender: String,
    pub skill_set: String,
    pub domain: String,
}

/// Fills in the academic profile and marks onboarding finished. Two
/// writes: the merge into the student record, then the marker document.
pub fn complete_onboarding(store: &Store, profile: OnboardingProfile) -> Result<()> {
    require(&profile.register_number, "register number")?;
    require(&profile.roll_no, "roll number")?;
    require(&profile.mobile_number, "mobile number")?;
    require(&profile.tenth_percent, "10th percentage")?;
    require(&profile.diploma_percent, "diploma / 12th percentage")?;
    require(&profile.cgpa, "cgpa")?;
    require(&profile.history_of_arrears, "history of arrears")?;
    require(&profile.current_backlogs, "current backlogs")?;
    require(&profile.gender, "gender")?;
    require(&profile.skill_set, "skill set")?;
    require(&profile.domain, "domain")?;

    let (id, _) = student_doc(store, &profile.register_number)?;
    store.merge(
        collections::STUDENTS,
        &id,
        &json!({
            "Roll No": profile.roll_no,
            "Mobile Number": profile.mobile_number,
            "10 Percent": profile.tenth_percent,
            "Diploma / 12th Percentage": profile.diploma_percent,
            "isDiploma": if profile.is_diploma { "Yes" } else { "No" },
            "CGPA": profile.cgpa,
            "History of Arrears": profile.history_of_arrears,
            "Current Backlogs": profile.current_backlogs,
            "gender": profile.gender.to_lowercase(),
            "SkillSet": profile.skill_set,
            "Domain": profile.domain,
        }),
    )?;

    store.set(
        collections::ONBOARDING,
        &profile.register_number,
        &json!({ "Register Number": profile.register_number, "completed": true }),
    )?;
    info!(register_number = %profile.register_number, "onboarding completed");
    Ok(())
}

pub fn onboarding_completed(store: &Store, register_number: &str) -> Result<bool> {
    Ok(store
        .get(collections::ONBOARDING, register_number)?
        .and_then(|doc| doc.get("completed").and_then(Value::as_bool))
        .unwrap_or(false))
}

// --- Profile updates ---

#[derive(Default)]
pub struct ProfileUpdate {
    pub resume: Option<String>,
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub mobile_number: Option<String>,
    pub skill_set: Option<String>,
    pub domain: Option<String>,
    pub other_interested_domain: Option<String>,
    pub cgpa: Option<String>,
}

/// Merge-updates the provided profile fields. A CGPA change additionally
/// requires the global edit gate to be open.
pub fn update_profile(store: &Store, register_number: &str, update: ProfileUpdate) -> Result<()> {
    let (id, _) = student_doc(store, register_number)?;

    let mut patch = Map::new();
    if let Some(resume) = update.resume {
        patch.insert("Resume".into(), Value::String(resume));
    }
    if let Some(github) = update.github {
        patch.insert("Github".into(), Value::String(github));
    }
    if let Some(linkedin) = update.linkedin {
        patch.insert("LinkedIn".into(), Value::String(linkedin));
    }
    if let Some(mobile) = update.mobile_number {
        patch.insert("Mobile Number".into(), Value::String(mobile));
    }
    if let Some(skills) = update.skill_set {
        patch.insert("SkillSet".into(), Value::String(skills));
    }
    if let Some(domain) = update.domain {
        patch.insert("Domain".into(), Value::String(domain));
    }
    if let Some(other) = update.other_interested_domain {
        patch.insert("OtherInterestedDomain".into(), Value::String(other));
    }
    if let Some(cgpa) = update.cgpa {
        if !cgpa_edit_allowed(store)? {
            return Err(Error::validation("CGPA edits are currently disabled"));
        }
        patch.insert("CGPA".into(), Value::String(cgpa));
    }
    if patch.is_empty() {
        return Err(Error::validation("nothing to update"));
    }
    store.merge(collections::STUDENTS, &id, &Value::Object(patch))
}

/// Stored lowercase so the eligibility comparison stays trivial.
pub fn update_gender(store: &Store, register_number: &str, gender: &str) -> Result<()> {
    require(gender, "gender")?;
    let (id, _) = student_doc(store, register_number)?;
    store.merge(
        collections::STUDENTS,
        &id,
        &json!({ "gender": gender.to_lowercase() }),
    )
}

pub fn set_mentor(store: &Store, register_number: &str, is_mentor: bool) -> Result<()> {
    let (id, _) = student_doc(store, register_number)?;
    store.merge(
        collections::STUDENTS,
        &id,
        &json!({ "isMentor": if is_mentor { 1 } else { 0 } }),
    )
}

// --- Roster queries ---

pub struct FilterQuery {
    pub min_cgpa: f64,
    pub max_history_of_arrears: i64,
    pub max_current_backlogs: i64,
    pub min_tenth_percent: Option<f64>,
    pub min_twelfth_percent: Option<f64>,
}

fn percent(raw: &str) -> f64 {
    raw.trim().trim_end_matches('%').parse().unwrap_or(0.0)
}

/// Students clearing every given academic threshold. Comparisons are on
/// the parsed numbers, with unparseable values treated as zero.
pub fn filter_students(store: &Store, query: &FilterQuery) -> Result<Vec<Student>> {
    let mut matched = Vec::new();
    for student in all_students(store)? {
        if student.cgpa_raw() >= query.min_cgpa
            && student.history_of_arrears() <= query.max_history_of_arrears
            && student.current_backlogs() <= query.max_current_backlogs
            && query
                .min_tenth_percent
                .map(|min| percent(&student.tenth_percent) >= min)
                .unwrap_or(true)
            && query
                .min_twelfth_percent
                .map(|min| percent(&student.diploma_percent) >= min)
                .unwrap_or(true)
        {
            matched.push(student);
        }
    }
    if matched.is_empty() {
        return Err(Error::not_found("no students match the filter".to_string()));
    }
    Ok(matched)
}

const MISSING_FIELD_CHOICES: &[&str] = &[
    "Resume",
    "LinkedIn",
    "Github",
    "History of Arrears",
    "Current Backlogs",
];

fn field_is_missing(value: Option<&Value>) -> bool {
    match value.and_then(Value::as_str) {
        None => true,
        Some(s) => {
            let s = s.trim();
            s.is_empty() || s.eq_ignore_ascii_case("N/A") || s.eq_ignore_ascii_case("NIL")
        }
    }
}

/// Students who have not filled in one of the tracked profile fields.
/// Empty, "N/A" and "NIL" all count as missing.
pub fn missing_field(store: &Store, field: &str) -> Result<Vec<Student>> {
    if !MISSING_FIELD_CHOICES.contains(&field) {
        return Err(Error::validation(format!(
            "unknown field {field}; expected one of {}",
            MISSING_FIELD_CHOICES.join(", ")
        )));
    }
    let mut matched = Vec::new();
    for (_, body) in store.scan(collections::STUDENTS)? {
        if field_is_missing(body.get(field)) {
            matched.push(serde_json::from_value(body)?);
        }
    }
    if matched.is_empty() {
        return Err(Error::not_found(format!("no students missing {field}")));
    }
    Ok(matched)
}

pub fn mentors(store: &Store) -> Result<Vec<Student>> {
    let mut out = Vec::new();
    for student in all_students(store)? {
        if student.is_mentor == 1 {
            out.push(student);
        }
    }
    if out.is_empty() {
        return Err(Error::not_found("no mentors on the roster".to_string()));
    }
    Ok(out)
}

// --- Company listings ---

pub fn company_names(store: &Store) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for (_, body) in store.scan(collections::COMPANIES)? {
        let company: Company = serde_json::from_value(body)?;
        names.push(company.name);
    }
    Ok(names)
}

pub fn all_companies(store: &Store) -> Result<Vec<(String, Company)>> {
    let mut out = Vec::new();
    for (id, body) in store.scan(collections::COMPANIES)? {
        out.push((id, serde_json::from_value(body)?));
    }
    Ok(out)
}

pub fn get_company(store: &Store, id: &str) -> Result<Company> {
    let body = store
        .get(collections::COMPANIES, id)?
        .ok_or_else(|| Error::not_found(format!("company {id} not found")))?;
    Ok(serde_json::from_value(body)?)
}

/// Drives whose date has not passed yet. Undated companies are excluded
/// from both listings.
pub fn upcoming_companies(store: &Store, now: DateTime<Utc>) -> Result<Vec<Company>> {
    let mut out = Vec::new();
    for (_, company) in all_companies(store)? {
        if company.date.map(|d| d >= now).unwrap_or(false) {
            out.push(company);
        }
    }
    Ok(out)
}

/// Drives dated before the start of today. The boundary is midnight, not
/// `now`: a drive earlier today is in neither listing.
pub fn previous_companies(store: &Store, now: DateTime<Utc>) -> Result<Vec<Company>> {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let mut out = Vec::new();
    for (_, company) in all_companies(store)? {
        if company.date.map(|d| d < today).unwrap_or(false) {
            out.push(company);
        }
    }
    Ok(out)
}

/// One upcoming drive from a particular student's point of view.
#[derive(Debug, Clone, Serialize)]
pub struct UpcomingForStudent {
    #[serde(flatten)]
    pub company: Company,
    /// How many students have already declared willingness.
    #[serde(rename = "willingCount")]
    pub willing_count: usize,
    #[serde(rename = "hasApplied")]
    pub has_applied: bool,
}

/// Upcoming drives the student is eligible for, each annotated with the
/// current applicant count. Costs one extra shell read per eligible
/// company.
pub fn upcoming_for_student(
    store: &Store,
    register_number: &str,
    now: DateTime<Utc>,
) -> Result<Vec<UpcomingForStudent>> {
    let student = get_student(store, register_number)?;
    let mut out = Vec::new();
    for company in upcoming_companies(store, now)? {
        if !eligibility::evaluate(&student, &company).is_eligible() {
            continue;
        }
        let willing = store
            .get(collections::COMPANY_APPLICATIONS, &company.name)?
            .map(serde_json::from_value::<CompanyApplication>)
            .transpose()?
            .map(|app| app.willing)
            .unwrap_or_default();
        out.push(UpcomingForStudent {
            willing_count: willing.len(),
            has_applied: willing.iter().any(|r| r == register_number),
            company,
        });
    }
    Ok(out)
}

/// Whether the student already sits in the company's willing list. A
/// company with no application shell is an error.
pub fn has_applied(store: &Store, register_number: &str, company_name: &str) -> Result<bool> {
    let body = store
        .get(collections::COMPANY_APPLICATIONS, company_name)?
        .ok_or_else(|| Error::not_found(format!("company application {company_name} not found")))?;
    let app: CompanyApplication = serde_json::from_value(body)?;
    Ok(app.willing.iter().any(|r| r == register_number))
}

// --- CGPA edit gate ---

pub fn cgpa_edit_allowed(store: &Store) -> Result<bool> {
    Ok(store
        .get(collections::CGPA_CONFIG, CGPA_CONFIG_KEY)?
        .map(serde_json::from_value::<CgpaConfig>)
        .transpose()?
        .map(|c| c.is_allow)
        .unwrap_or(false))
}

pub fn set_cgpa_edit(store: &Store, allow: bool) -> Result<()> {
    store.set(
        collections::CGPA_CONFIG,
        CGPA_CONFIG_KEY,
        &serde_json::to_value(CgpaConfig { is_allow: allow })?,
    )?;
    info!(allow, "cgpa edit gate updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArrearsLimit;
    use crate::propagate::{self, NewCompany};
    use chrono::Duration;

    const REG: &str = "711721CS001";

    fn test_store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn profile(reg: &str) -> OnboardingProfile {
        OnboardingProfile {
            register_number: reg.into(),
            roll_no: "21CS001".into(),
            mobile_number: "9876543210".into(),
            tenth_percent: "92".into(),
            diploma_percent: "88".into(),
            is_diploma: false,
            cgpa: "8.4".into(),
            history_of_arrears: "0".into(),
            current_backlogs: "0".into(),
            gender: "Female".into(),
            skill_set: "Rust, SQL".into(),
            domain: "Backend".into(),
        }
    }

    fn seed_company(store: &Store, name: &str, date: DateTime<Utc>, criteria: &str) {
        propagate::add_company(
            store,
            NewCompany {
                name: name.into(),
                date: Some(date),
                ctc: "10 LPA".into(),
                criteria: criteria.into(),
                company_type: "Product".into(),
                role: "SDE".into(),
                link: String::new(),
                image_urls: Vec::new(),
                max_history_of_arrears: ArrearsLimit::NotMentioned,
                max_standing_arrears: ArrearsLimit::NotMentioned,
                gender: None,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_onboarding_lifecycle() {
        let store = test_store();
        onboard_student(&store, REG, "Asha", "asha@example.edu").unwrap();
        assert!(!onboarding_completed(&store, REG).unwrap());

        complete_onboarding(&store, profile(REG)).unwrap();
        assert!(onboarding_completed(&store, REG).unwrap());

        let student = get_student(&store, REG).unwrap();
        assert_eq!(student.cgpa, "8.4");
        assert_eq!(student.gender.as_deref(), Some("female"));
        assert_eq!(student.is_diploma, "No");
        // Fields the form does not carry survive the merge.
        assert_eq!(student.email, "asha@example.edu");
    }

    #[test]
    fn test_onboard_rejects_duplicate_registration() {
        let store = test_store();
        onboard_student(&store, REG, "Asha", "asha@example.edu").unwrap();
        let err = onboard_student(&store, REG, "Asha", "asha@example.edu").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_complete_onboarding_requires_every_field() {
        let store = test_store();
        onboard_student(&store, REG, "Asha", "asha@example.edu").unwrap();
        let mut p = profile(REG);
        p.mobile_number = String::new();
        let err = complete_onboarding(&store, p).unwrap_err();
        assert_eq!(err.status(), 400);
        // Nothing was written.
        assert_eq!(get_student(&store, REG).unwrap().cgpa, "");
    }

    #[test]
    fn test_cgpa_update_respects_gate() {
        let store = test_store();
        onboard_student(&store, REG, "Asha", "asha@example.edu").unwrap();

        let update = ProfileUpdate {
            cgpa: Some("9.0".into()),
            ..Default::default()
        };
        let err = update_profile(&store, REG, update).unwrap_err();
        assert_eq!(err.status(), 400);

        set_cgpa_edit(&store, true).unwrap();
        let update = ProfileUpdate {
            cgpa: Some("9.0".into()),
            ..Default::default()
        };
        update_profile(&store, REG, update).unwrap();
        assert_eq!(get_student(&store, REG).unwrap().cgpa, "9.0");
    }

    #[test]
    fn test_filter_students_numeric_thresholds() {
        let store = test_store();
        for (reg, cgpa, history, backlogs) in [
            ("R1", "8.5", "0", "0"),
            ("R2", "7.9", "0", "0"),
            ("R3", "9.0", "3", "0"),
        ] {
            store
                .insert(
                    collections::STUDENTS,
                    &json!({
                        "Register Number": reg,
                        "CGPA": cgpa,
                        "History of Arrears": history,
                        "Current Backlogs": backlogs,
                    }),
                )
                .unwrap();
        }

        let matched = filter_students(
            &store,
            &FilterQuery {
                min_cgpa: 8.0,
                max_history_of_arrears: 1,
                max_current_backlogs: 0,
                min_tenth_percent: None,
                min_twelfth_percent: None,
            },
        )
        .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].register_number, "R1");

        let err = filter_students(
            &store,
            &FilterQuery {
                min_cgpa: 10.0,
                max_history_of_arrears: 0,
                max_current_backlogs: 0,
                min_tenth_percent: None,
                min_twelfth_percent: None,
            },
        )
        .unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_filter_students_percentage_thresholds() {
        let store = test_store();
        store
            .insert(
                collections::STUDENTS,
                &json!({ "Register Number": "R1", "CGPA": "8.0", "10 Percent": "91" }),
            )
            .unwrap();
        store
            .insert(
                collections::STUDENTS,
                &json!({ "Register Number": "R2", "CGPA": "8.0", "10 Percent": "74" }),
            )
            .unwrap();

        let matched = filter_students(
            &store,
            &FilterQuery {
                min_cgpa: 0.0,
                max_history_of_arrears: 99,
                max_current_backlogs: 99,
                min_tenth_percent: Some(80.0),
                min_twelfth_percent: None,
            },
        )
        .unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].register_number, "R1");
    }

    #[test]
    fn test_missing_field_treats_placeholders_as_absent() {
        let store = test_store();
        store
            .insert(
                collections::STUDENTS,
                &json!({ "Register Number": "R1", "Resume": "N/A" }),
            )
            .unwrap();
        store
            .insert(
                collections::STUDENTS,
                &json!({ "Register Number": "R2", "Resume": "https://cv.example/r2.pdf" }),
            )
            .unwrap();

        let matched = missing_field(&store, "Resume").unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].register_number, "R1");

        let err = missing_field(&store, "Email").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_mentors_404_when_none() {
        let store = test_store();
        store
            .insert(collections::STUDENTS, &json!({ "Register Number": "R1" }))
            .unwrap();
        assert_eq!(mentors(&store).unwrap_err().status(), 404);

        set_mentor(&store, "R1", true).unwrap();
        assert_eq!(mentors(&store).unwrap().len(), 1);
    }

    #[test]
    fn test_company_listings_split_on_date() {
        let store = test_store();
        let now = Utc::now();
        seed_company(&store, "Soon", now + Duration::days(3), "0");
        seed_company(&store, "Gone", now - Duration::days(3), "0");

        let upcoming = upcoming_companies(&store, now).unwrap();
        assert_eq!(upcoming.len(), 1);
        assert_eq!(upcoming[0].name, "Soon");

        let previous = previous_companies(&store, now).unwrap();
        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].name, "Gone");
    }

    #[test]
    fn test_drive_earlier_today_is_in_neither_listing() {
        use chrono::TimeZone;

        let store = test_store();
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        seed_company(
            &store,
            "ThisMorning",
            Utc.with_ymd_and_hms(2024, 3, 10, 9, 0, 0).unwrap(),
            "0",
        );
        seed_company(
            &store,
            "Yesterday",
            Utc.with_ymd_and_hms(2024, 3, 9, 9, 0, 0).unwrap(),
            "0",
        );

        assert!(upcoming_companies(&store, now).unwrap().is_empty());
        let previous = previous_companies(&store, now).unwrap();
        assert_eq!(previous.len(), 1);
        assert_eq!(previous[0].name, "Yesterday");
    }

    #[test]
    fn test_upcoming_for_student_applies_eligibility() {
        let store = test_store();
        let now = Utc::now();
        store
            .insert(
                collections::STUDENTS,
                &json!({ "Register Number": REG, "CGPA": "7.5" }),
            )
            .unwrap();
        seed_company(&store, "Open", now + Duration::days(1), "7.0");
        seed_company(&store, "Strict", now + Duration::days(1), "9.0");
        propagate::declare_willingness(&store, REG, "Open", true).unwrap();

        let listings = upcoming_for_student(&store, REG, now).unwrap();
        assert_eq!(listings.len(), 1);
        assert_eq!(listings[0].company.name, "Open");
        assert_eq!(listings[0].willing_count, 1);
        assert!(listings[0].has_applied);
    }

    #[test]
    fn test_has_applied_requires_shell() {
        let store = test_store();
        assert_eq!(has_applied(&store, REG, "Ghost").unwrap_err().status(), 404);

        seed_company(&store, "Acme", Utc::now(), "0");
        assert!(!has_applied(&store, REG, "Acme").unwrap());
        propagate::declare_willingness(&store, REG, "Acme", true).unwrap();
        assert!(has_applied(&store, REG, "Acme").unwrap());
    }
}
