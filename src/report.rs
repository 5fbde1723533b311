//! Read-side aggregation over the denormalized collections. Everything
//! here is computed by scanning documents at request time; there are no
//! materialized counters to drift.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::models::{ApplicationTracking, Company, CompanyApplication, Placement, Student};
use crate::store::{collections, Store};

/// One flattened placement row: company-side placed entry plus its keys.
#[derive(Debug, Clone, Serialize)]
pub struct PlacedRecord {
    pub company: String,
    #[serde(rename = "registerNumber")]
    pub register_number: String,
    #[serde(flatten)]
    pub placement: Placement,
}

fn all_placed(store: &Store) -> Result<Vec<PlacedRecord>> {
    let mut out = Vec::new();
    for (company, body) in store.scan(collections::COMPANY_APPLICATIONS)? {
        let app: CompanyApplication = serde_json::from_value(body)?;
        for (register_number, placement) in app.placed {
            out.push(PlacedRecord {
                company: company.clone(),
                register_number,
                placement,
            });
        }
    }
    Ok(out)
}

/// Every placement in the system, flattened from the company-side maps.
pub fn placed_all(store: &Store) -> Result<Vec<PlacedRecord>> {
    all_placed(store)
}

/// Placements for one company. A company with no application shell is an
/// error, a shell with an empty placed map is an empty report.
pub fn placed_for_company(store: &Store, company_name: &str) -> Result<BTreeMap<String, Placement>> {
    let body = store
        .get(collections::COMPANY_APPLICATIONS, company_name)?
        .ok_or_else(|| Error::not_found(format!("company application {company_name} not found")))?;
    let app: CompanyApplication = serde_json::from_value(body)?;
    Ok(app.placed)
}

/// Placements whose date falls inside [from, to].
pub fn placed_in_window(
    store: &Store,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<PlacedRecord>> {
    let mut rows = all_placed(store)?;
    rows.retain(|row| {
        row.placement
            .date
            .map(|d| d >= from && d <= to)
            .unwrap_or(false)
    });
    Ok(rows)
}

/// Everything one student has been placed for, from the tracking mirror.
/// No placements at all is reported as not-found, matching the write side's
/// reading of "nothing here".
pub fn placed_for_student(store: &Store, register_number: &str) -> Result<BTreeMap<String, Placement>> {
    let placed = store
        .get(collections::TRACKING, register_number)?
        .map(serde_json::from_value::<ApplicationTracking>)
        .transpose()?
        .map(|t| t.placed)
        .unwrap_or_default();
    if placed.is_empty() {
        return Err(Error::not_found(format!(
            "no placements for {register_number}"
        )));
    }
    Ok(placed)
}

/// Placement counts bucketed by calendar month, oldest first, labelled
/// "MonthName Year". Entries without a date are skipped.
pub fn placements_by_month(store: &Store) -> Result<Vec<(String, usize)>> {
    let mut buckets: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for row in all_placed(store)? {
        if let Some(date) = row.placement.date {
            *buckets.entry((date.year(), date.month())).or_default() += 1;
        }
    }
    let mut out = Vec::new();
    for ((year, month), count) in buckets {
        let label = NaiveDate::from_ymd_opt(year, month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_else(|| format!("{month} {year}"));
        out.push((label, count));
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct TrainingNeedCounts {
    #[serde(rename = "needTraining")]
    pub need_training: usize,
    #[serde(rename = "noTraining")]
    pub no_training: usize,
}

/// Tallies rejection feedback per company: how many students asked for
/// training versus not. Companies with no feedback are absent.
pub fn training_need_counts(store: &Store) -> Result<BTreeMap<String, TrainingNeedCounts>> {
    let mut out: BTreeMap<String, TrainingNeedCounts> = BTreeMap::new();
    for (company, body) in store.scan(collections::COMPANY_APPLICATIONS)? {
        let app: CompanyApplication = serde_json::from_value(body)?;
        if app.feedback.is_empty() {
            continue;
        }
        let counts = out.entry(company).or_default();
        for feedback in app.feedback.values() {
            if feedback.need_training {
                counts.need_training += 1;
            } else {
                counts.no_training += 1;
            }
        }
    }
    Ok(out)
}

/// One student's profile and application state side by side. The two reads
/// are independent; a student with no tracking document yet gets the empty
/// maps rather than an error.
#[derive(Debug, Clone, Serialize)]
pub struct StudentSummary {
    pub student: Student,
    #[serde(rename = "applications")]
    pub tracking: ApplicationTracking,
}

pub fn student_summary(store: &Store, register_number: &str) -> Result<StudentSummary> {
    let (_, body) = store
        .find_by_field(collections::STUDENTS, "Register Number", register_number)?
        .ok_or_else(|| Error::not_found(format!("student {register_number} not found")))?;
    let student: Student = serde_json::from_value(body)?;

    let tracking = store
        .get(collections::TRACKING, register_number)?
        .map(serde_json::from_value::<ApplicationTracking>)
        .transpose()?
        .unwrap_or_default();

    Ok(StudentSummary { student, tracking })
}

/// What one student still owes and has finished: feedback asked of them
/// across every company, tests they have submitted to, and their
/// placements. Three independent reads; a missing tracking document means
/// no placements, not an error.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionSummary {
    #[serde(rename = "feedbackRequested")]
    pub feedback_requested: usize,
    #[serde(rename = "feedbackCompleted")]
    pub feedback_completed: usize,
    #[serde(rename = "testsTaken")]
    pub tests_taken: usize,
    pub placed: BTreeMap<String, Placement>,
}

pub fn completion_summary(store: &Store, register_number: &str) -> Result<CompletionSummary> {
    let mut feedback_requested = 0;
    let mut feedback_completed = 0;
    for (_, body) in store.scan(collections::COMPANIES)? {
        let company: Company = serde_json::from_value(body)?;
        if let Some(done) = company.feedback_completed.get(register_number) {
            feedback_requested += 1;
            if *done {
                feedback_completed += 1;
            }
        }
    }

    let mut tests_taken = 0;
    for (_, body) in store.scan(collections::TESTS)? {
        if body
            .get("completionStatus")
            .and_then(|m| m.get(register_number))
            .is_some()
        {
            tests_taken += 1;
        }
    }

    let placed = store
        .get(collections::TRACKING, register_number)?
        .map(serde_json::from_value::<ApplicationTracking>)
        .transpose()?
        .map(|t| t.placed)
        .unwrap_or_default();

    Ok(CompletionSummary {
        feedback_requested,
        feedback_completed,
        tests_taken,
        placed,
    })
}

/// Companies that have asked this student for feedback which the student
/// has not completed yet.
pub fn pending_feedback(store: &Store, register_number: &str) -> Result<Vec<String>> {
    let mut pending = Vec::new();
    for (_, body) in store.scan(collections::COMPANIES)? {
        let company: Company = serde_json::from_value(body)?;
        if company.feedback_status
            && company.feedback_completed.get(register_number) == Some(&false)
        {
            pending.push(company.name);
        }
    }
    if pending.is_empty() {
        return Err(Error::not_found(format!(
            "no pending feedback for {register_number}"
        )));
    }
    Ok(pending)
}

/// Companies whose drive has never had a feedback push.
pub fn companies_without_feedback_push(store: &Store) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for (_, body) in store.scan(collections::COMPANIES)? {
        let company: Company = serde_json::from_value(body)?;
        if !company.feedback_status {
            names.push(company.name);
        }
    }
    if names.is_empty() {
        return Err(Error::not_found("every company has pushed feedback".to_string()));
    }
    Ok(names)
}

/// Export rows for the students willing to sit a company's drive,
/// projected onto the caller's field set. "Register Number" is always
/// present whether or not it was asked for; requested fields absent from a
/// record are simply omitted, and a register number with no roster record
/// still yields a bare row. Row order follows the willing list.
pub fn willing_students(
    store: &Store,
    company_name: &str,
    fields: &[&str],
) -> Result<Vec<Value>> {
    let body = store
        .get(collections::COMPANY_APPLICATIONS, company_name)?
        .ok_or_else(|| Error::not_found(format!("company application {company_name} not found")))?;
    let app: CompanyApplication = serde_json::from_value(body)?;

    let mut rows = Vec::new();
    for reg in &app.willing {
        let mut row = serde_json::Map::new();
        if let Some((_, student)) =
            store.find_by_field(collections::STUDENTS, "Register Number", reg)?
        {
            for field in fields {
                if let Some(value) = student.get(*field) {
                    row.insert((*field).to_string(), value.clone());
                }
            }
        }
        row.insert("Register Number".to_string(), Value::String(reg.clone()));
        rows.push(Value::Object(row));
    }
    Ok(rows)
}
