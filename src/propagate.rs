//! Application state propagation.
//!
//! Each business event writes to the exact set of denormalized records it
//! touches, through independent single-document writes. There is no
//! cross-document transaction and no compensation: if a later write fails
//! after an earlier one committed, the sibling records are left skewed and
//! the failure is surfaced as `Error::PartialPropagation`. Concurrent
//! events for the same company/student pair can interleave; only the
//! willing/notWilling array-union dodges lost updates.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{ArrearsLimit, Company, CompanyApplication, Placement};
use crate::store::{collections, Store};

/// Wraps a follow-up write of a multi-write event: store-level failures
/// become PartialPropagation naming what already committed, while NotFound
/// and Validation keep their meaning (and their status code).
fn guard<T>(event: &'static str, committed: &'static str, result: Result<T>) -> Result<T> {
    result.map_err(|e| match e {
        Error::NotFound(_) | Error::Validation(_) => e,
        other => {
            warn!(event, committed, error = %other, "partial propagation");
            Error::PartialPropagation {
                event,
                committed,
                source: Box::new(other),
            }
        }
    })
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{what} is required")));
    }
    Ok(())
}

// --- Willingness ---

/// A student declares interest (or not) in a company. Two writes: the
/// per-student Status map, then the company-side willing/notWilling list.
pub fn declare_willingness(store: &Store, register_number: &str, company_name: &str, willing: bool) -> Result<()> {
    require(register_number, "register number")?;
    require(company_name, "company name")?;

    store.set_map_entry(
        collections::TRACKING,
        register_number,
        "Status",
        company_name,
        Value::Bool(willing),
    )?;

    let field = if willing { "willing" } else { "notWilling" };
    guard(
        "willingness",
        "tracking status entry",
        store.array_union(collections::COMPANY_APPLICATIONS, company_name, field, register_number),
    )?;

    info!(register_number, company_name, willing, "willingness recorded");
    Ok(())
}

// --- Company lifecycle ---

pub struct NewCompany {
    pub name: String,
    pub date: Option<DateTime<Utc>>,
    pub ctc: String,
    pub criteria: String,
    pub company_type: String,
    pub role: String,
    pub link: String,
    pub image_urls: Vec<String>,
    pub max_history_of_arrears: ArrearsLimit,
    pub max_standing_arrears: ArrearsLimit,
    pub gender: Option<String>,
}

/// Admin posts an opening. Two independent creates: the company record
/// under a generated id, then the empty application shell keyed by company
/// name. If the second write fails the company exists with no shell.
pub fn add_company(store: &Store, new: NewCompany) -> Result<String> {
    require(&new.name, "company name")?;

    let company = Company {
        name: new.name.clone(),
        date: new.date,
        ctc: new.ctc,
        criteria: new.criteria,
        company_type: new.company_type,
        role: new.role,
        link: new.link,
        image_urls: new.image_urls,
        max_history_of_arrears: new.max_history_of_arrears,
        max_standing_arrears: new.max_standing_arrears,
        gender: new.gender,
        feedback_status: false,
        feedback_completed: Default::default(),
        created_at: Some(Utc::now()),
    };
    let id = store.insert(collections::COMPANIES, &serde_json::to_value(&company)?)?;

    let shell = serde_json::to_value(CompanyApplication::default())?;
    guard(
        "add-company",
        "company record",
        store.set(collections::COMPANY_APPLICATIONS, &new.name, &shell),
    )?;

    info!(company = %new.name, id, "company added");
    Ok(id)
}

#[derive(Default)]
pub struct CompanyEdit {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub role: Option<String>,
    pub criteria: Option<String>,
    pub ctc: Option<String>,
    pub link: Option<String>,
    pub max_history_of_arrears: Option<ArrearsLimit>,
    pub max_standing_arrears: Option<ArrearsLimit>,
}

/// Merge-updates the provided fields of one company record. Renaming a
/// company that already has applications orphans its shell; the name is
/// the foreign key, so edits to it are the caller's risk.
pub fn edit_company(store: &Store, id: &str, edit: CompanyEdit) -> Result<()> {
    require(id, "company id")?;
    if !store.exists(collections::COMPANIES, id)? {
        return Err(Error::not_found(format!("company {id} not found")));
    }

    let mut patch = Map::new();
    if let Some(name) = edit.name {
        patch.insert("name".into(), Value::String(name));
    }
    if let Some(date) = edit.date {
        patch.insert("date".into(), serde_json::to_value(date)?);
    }
    if let Some(role) = edit.role {
        patch.insert("role".into(), Value::String(role));
    }
    if let Some(criteria) = edit.criteria {
        patch.insert("criteria".into(), Value::String(criteria));
    }
    if let Some(ctc) = edit.ctc {
        patch.insert("ctc".into(), Value::String(ctc));
    }
    if let Some(link) = edit.link {
        patch.insert("link".into(), Value::String(link));
    }
    if let Some(limit) = edit.max_history_of_arrears {
        patch.insert("maxAllowedHistoryOfArrears".into(), serde_json::to_value(limit)?);
    }
    if let Some(limit) = edit.max_standing_arrears {
        patch.insert("maxAllowedStandingArrears".into(), serde_json::to_value(limit)?);
    }
    store.merge(collections::COMPANIES, id, &Value::Object(patch))
}

// --- Feedback ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushTo {
    All,
    Applicants,
}

impl std::str::FromStr for PushTo {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "All" | "all" => Ok(PushTo::All),
            "Applicants" | "applicants" => Ok(PushTo::Applicants),
            other => Err(Error::validation(format!("unknown pushTo target: {other}"))),
        }
    }
}

/// Admin requests post-process feedback from a set of students: flips the
/// company's feedbackStatus and seeds feedbackCompleted with every target
/// register number mapped to false (merged, so earlier flags survive).
pub fn push_feedback(store: &Store, company_name: &str, push_to: PushTo) -> Result<()> {
    require(company_name, "company name")?;

    let (company_id, _) = store
        .find_by_field(collections::COMPANIES, "name", company_name)?
        .ok_or_else(|| Error::not_found(format!("company {company_name} not found")))?;

    let targets: Vec<String> = match push_to {
        PushTo::All => {
            let mut regs = Vec::new();
            for (_, body) in store.scan(collections::STUDENTS)? {
                if let Some(reg) = body.get("Register Number").and_then(Value::as_str) {
                    regs.push(reg.to_string());
                }
            }
            regs
        }
        PushTo::Applicants => {
            let shell = store
                .get(collections::COMPANY_APPLICATIONS, company_name)?
                .ok_or_else(|| {
                    Error::not_found(format!("company application {company_name} not found"))
                })?;
            let app: CompanyApplication = serde_json::from_value(shell)?;
            app.willing
        }
    };

    let mut completed = Map::new();
    for reg in &targets {
        completed.insert(reg.clone(), Value::Bool(false));
    }
    store.merge(
        collections::COMPANIES,
        &company_id,
        &json!({ "feedbackStatus": true, "feedbackCompleted": completed }),
    )?;

    info!(company_name, targets = targets.len(), "feedback push requested");
    Ok(())
}

// --- Placement outcomes ---

pub struct Selection {
    pub register_number: String,
    pub company_name: String,
    pub role: String,
    pub ctc: String,
    pub image_url: String,
}

/// "Got selected": three separate writes keep the placed entry, the
/// feedback flag and the student's tracking record in step. The company
/// lookup happens after the application-side write has committed, so a
/// missing company record still returns NotFound with the placed entry
/// already in place.
pub fn confirm_selection(store: &Store, sel: Selection) -> Result<()> {
    require(&sel.register_number, "register number")?;
    require(&sel.company_name, "company name")?;
    require(&sel.role, "role")?;
    require(&sel.ctc, "ctc")?;
    require(&sel.image_url, "image url")?;

    let now = Utc::now();
    let entry = Placement {
        role: sel.role.clone(),
        ctc: sel.ctc.clone(),
        date: Some(now),
        image_url: Some(sel.image_url.clone()),
        ..Default::default()
    };
    store.set_map_entry(
        collections::COMPANY_APPLICATIONS,
        &sel.company_name,
        "placed",
        &sel.register_number,
        serde_json::to_value(&entry)?,
    )?;

    let (company_id, _) = store
        .find_by_field(collections::COMPANIES, "name", &sel.company_name)?
        .ok_or_else(|| Error::not_found(format!("company {} not found", sel.company_name)))?;
    guard(
        "got-selected",
        "application placed entry",
        store.set_map_entry(
            collections::COMPANIES,
            &company_id,
            "feedbackCompleted",
            &sel.register_number,
            Value::Bool(true),
        ),
    )?;

    let tracking_entry = Placement {
        role: sel.role.clone(),
        ctc: sel.ctc.clone(),
        date: Some(now),
        ..Default::default()
    };
    guard(
        "got-selected",
        "application placed entry and feedback flag",
        store.set_map_entry(
            collections::TRACKING,
            &sel.register_number,
            "placed",
            &sel.company_name,
            serde_json::to_value(&tracking_entry)?,
        ),
    )?;

    info!(
        register_number = %sel.register_number,
        company_name = %sel.company_name,
        "selection confirmed"
    );
    Ok(())
}

pub struct RejectionReview {
    pub register_number: String,
    pub company_name: String,
    pub need_training: bool,
    pub rejected_round: String,
}

/// Rejection review: records per-student feedback on the application side
/// and flips the company's feedbackCompleted flag. Two writes.
pub fn record_rejection_review(store: &Store, review: RejectionReview) -> Result<()> {
    require(&review.register_number, "register number")?;
    require(&review.company_name, "company name")?;
    require(&review.rejected_round, "rejected round")?;

    store.set_map_entry(
        collections::COMPANY_APPLICATIONS,
        &review.company_name,
        "feedback",
        &review.register_number,
        json!({
            "needTraining": review.need_training,
            "rejectedRound": review.rejected_round,
        }),
    )?;

    let (company_id, _) = store
        .find_by_field(collections::COMPANIES, "name", &review.company_name)?
        .ok_or_else(|| Error::not_found(format!("company {} not found", review.company_name)))?;
    guard(
        "rejection-review",
        "application feedback entry",
        store.set_map_entry(
            collections::COMPANIES,
            &company_id,
            "feedbackCompleted",
            &review.register_number,
            Value::Bool(true),
        ),
    )?;

    info!(
        register_number = %review.register_number,
        company_name = %review.company_name,
        need_training = review.need_training,
        "rejection review recorded"
    );
    Ok(())
}

// --- Off-campus placements ---

pub struct OffCampusPlacement {
    pub register_number: String,
    pub company_name: String,
    pub role: String,
    pub ctc: String,
    pub date: Option<DateTime<Utc>>,
    pub offer_letter_url: Option<String>,
    pub image_url: Option<String>,
    pub company_type: Option<String>,
}

/// Records a placement that did not come from an on-platform listing.
/// Two merge writes, tracking side first; both entries carry
/// offCampus=true.
pub fn add_off_campus(store: &Store, placement: OffCampusPlacement) -> Result<()> {
    require(&placement.register_number, "register number")?;
    require(&placement.company_name, "company name")?;
    require(&placement.role, "role")?;
    require(&placement.ctc, "ctc")?;

    let date = placement.date.unwrap_or_else(Utc::now);
    let tracking_entry = Placement {
        role: placement.role.clone(),
        ctc: placement.ctc.clone(),
        date: Some(date),
        offer_letter_url: placement.offer_letter_url.clone(),
        company_type: placement.company_type.clone(),
        off_campus: Some(true),
        ..Default::default()
    };
    store.set_map_entry(
        collections::TRACKING,
        &placement.register_number,
        "placed",
        &placement.company_name,
        serde_json::to_value(&tracking_entry)?,
    )?;

    let application_entry = Placement {
        image_url: placement.image_url.clone(),
        ..tracking_entry
    };
    guard(
        "off-campus-add",
        "tracking placed entry",
        store.set_map_entry(
            collections::COMPANY_APPLICATIONS,
            &placement.company_name,
            "placed",
            &placement.register_number,
            serde_json::to_value(&application_entry)?,
        ),
    )?;

    info!(
        register_number = %placement.register_number,
        company_name = %placement.company_name,
        "off-campus placement added"
    );
    Ok(())
}

/// Bulk edit of an off-campus company's terms: rewrites every placed entry
/// under the company with the new role/ctc/date (a whole-field overwrite of
/// the placed map), then fans out over all tracking documents carrying that
/// company. A concurrent single-student update can be overwritten by this,
/// or vice versa; there is no optimistic check. Returns the number of
/// tracking documents touched.
pub fn edit_off_campus(
    store: &Store,
    company_name: &str,
    role: &str,
    ctc: &str,
    date: DateTime<Utc>,
) -> Result<usize> {
    require(company_name, "company name")?;
    require(role, "role")?;
    require(ctc, "ctc")?;

    let shell = store
        .get(collections::COMPANY_APPLICATIONS, company_name)?
        .ok_or_else(|| Error::not_found(format!("company application {company_name} not found")))?;

    let date_value = serde_json::to_value(date)?;
    let mut placed = shell.get("placed").cloned().unwrap_or_else(|| json!({}));
    if let Value::Object(entries) = &mut placed {
        for entry in entries.values_mut() {
            if let Value::Object(fields) = entry {
                fields.insert("role".into(), Value::String(role.to_string()));
                fields.insert("ctc".into(), Value::String(ctc.to_string()));
                fields.insert("date".into(), date_value.clone());
            }
        }
    }
    store.set_field(collections::COMPANY_APPLICATIONS, company_name, "placed", placed)?;

    let mut updated = 0;
    for (reg, mut body) in store.scan(collections::TRACKING)? {
        let Some(Value::Object(entry)) = body
            .get_mut("placed")
            .and_then(|placed| placed.get_mut(company_name))
        else {
            continue;
        };
        entry.insert("role".into(), Value::String(role.to_string()));
        entry.insert("ctc".into(), Value::String(ctc.to_string()));
        entry.insert("date".into(), date_value.clone());
        guard(
            "off-campus-edit",
            "application placed map",
            store.set(collections::TRACKING, &reg, &body),
        )?;
        updated += 1;
    }

    info!(company_name, updated, "off-campus placement data rewritten");
    Ok(updated)
}

/// Removes one off-campus placement from both sides. Two writes; a missing
/// entry on either side is tolerated, a missing document is not.
pub fn delete_off_campus(store: &Store, register_number: &str, company_name: &str) -> Result<()> {
    require(register_number, "register number")?;
    require(company_name, "company name")?;

    store.delete_map_entry(
        collections::COMPANY_APPLICATIONS,
        company_name,
        "placed",
        register_number,
    )?;
    guard(
        "off-campus-delete",
        "application placed entry removal",
        store.delete_map_entry(collections::TRACKING, register_number, "placed", company_name),
    )?;

    info!(register_number, company_name, "off-campus placement deleted");
    Ok(())
}

// --- Offers ---

/// Records whether the student accepted an offer. A single write on the
/// tracking side only; the company-side placed entry is deliberately left
/// untouched, so acceptance state only ever lives in the tracking mirror.
pub fn record_offer_acceptance(
    store: &Store,
    register_number: &str,
    company_name: &str,
    accepted: bool,
    reason: Option<&str>,
) -> Result<()> {
    require(register_number, "register number")?;
    require(company_name, "company name")?;

    let tracking = store
        .get(collections::TRACKING, register_number)?
        .ok_or_else(|| Error::not_found(format!("no applications for {register_number}")))?;
    if tracking
        .get("placed")
        .and_then(|placed| placed.get(company_name))
        .is_none()
    {
        return Err(Error::not_found(format!(
            "no placement under {company_name} for {register_number}"
        )));
    }

    let mut patch = Map::new();
    patch.insert("offerAccepted".into(), Value::Bool(accepted));
    if let Some(reason) = reason {
        patch.insert("reason".into(), Value::String(reason.to_string()));
    }
    store.set_map_entry(
        collections::TRACKING,
        register_number,
        "placed",
        company_name,
        Value::Object(patch),
    )?;

    info!(register_number, company_name, accepted, "offer acceptance recorded");
    Ok(())
}
