use crate::models::{Company, Student};

/// Outcome of evaluating one student against one company's criteria.
/// Carries the failing predicate instead of a bare boolean so a rejection
/// can be explained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    GenderRestricted,
    CgpaBelowCutoff,
    TooManyHistoryArrears,
    TooManyStandingArrears,
}

impl Eligibility {
    pub fn is_eligible(self) -> bool {
        matches!(self, Eligibility::Eligible)
    }
}

/// Normalize a CGPA onto the 0-10 scale. Some student records carry
/// percentage-scale values, so anything above 10 is divided by 10. This is
/// a data-quality workaround, not a validated scale flag.
pub fn normalize_cgpa(raw: &str) -> f64 {
    let parsed: f64 = raw.trim().parse().unwrap_or(0.0);
    if parsed > 10.0 { parsed / 10.0 } else { parsed }
}

/// Pure read-side check of a student against a company's CGPA, arrears and
/// gender predicates. A gender restriction rules the student out before
/// anything else is looked at. An unconstrained arrears limit skips that
/// check entirely.
pub fn evaluate(student: &Student, company: &Company) -> Eligibility {
    if let Some(required) = company.gender.as_deref() {
        if !required.is_empty() {
            let matches = student
                .gender
                .as_deref()
                .map(|g| g.eq_ignore_ascii_case(required))
                .unwrap_or(false);
            if !matches {
                return Eligibility::GenderRestricted;
            }
        }
    }

    if normalize_cgpa(&student.cgpa) < company.criteria() {
        return Eligibility::CgpaBelowCutoff;
    }

    if !company.max_history_of_arrears.admits(student.history_of_arrears()) {
        return Eligibility::TooManyHistoryArrears;
    }

    if !company.max_standing_arrears.admits(student.current_backlogs()) {
        return Eligibility::TooManyStandingArrears;
    }

    Eligibility::Eligible
}
