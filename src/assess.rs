//! Practice problems, the timed-test question bank and test scheduling.

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::{PracticeProblem, Submission, Test, TestProblemSummary};
use crate::store::{collections, Store};

// --- Practice problems ---

pub fn add_practice_problem(store: &Store, problem: &PracticeProblem) -> Result<String> {
    if problem.problem_name.trim().is_empty() {
        return Err(Error::validation("problem name is required"));
    }
    let id = store.insert(collections::PROBLEMS, &serde_json::to_value(problem)?)?;
    info!(id, name = %problem.problem_name, "practice problem added");
    Ok(id)
}

pub fn practice_problems(store: &Store) -> Result<Vec<(String, PracticeProblem)>> {
    let mut out = Vec::new();
    for (id, body) in store.scan(collections::PROBLEMS)? {
        out.push((id, serde_json::from_value(body)?));
    }
    if out.is_empty() {
        return Err(Error::not_found("no practice problems".to_string()));
    }
    Ok(out)
}

// --- Test question bank ---

fn summary_from(id: String, body: &Value) -> Option<TestProblemSummary> {
    let name = body.get("problemName").and_then(Value::as_str)?;
    Some(TestProblemSummary {
        id,
        problem_name: name.to_string(),
        topic: body
            .get("topic")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        difficulty: body
            .get("difficulty")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

/// Listing rows for the question bank. Documents without a problemName are
/// silently skipped rather than surfaced as broken rows.
pub fn test_problems(store: &Store) -> Result<Vec<TestProblemSummary>> {
    let mut out = Vec::new();
    for (id, body) in store.scan(collections::TEST_PROBLEMS)? {
        if let Some(summary) = summary_from(id, &body) {
            out.push(summary);
        }
    }
    if out.is_empty() {
        return Err(Error::not_found("no test problems".to_string()));
    }
    Ok(out)
}

pub fn test_problem(store: &Store, id: &str) -> Result<Value> {
    store
        .get(collections::TEST_PROBLEMS, id)?
        .ok_or_else(|| Error::not_found(format!("test problem {id} not found")))
}

// --- Tests ---

/// Schedules a timed test under an explicit id. The whole document is
/// written fresh, so re-creating an id clears earlier submissions.
pub fn create_test(
    store: &Store,
    test_id: &str,
    problem_ids: Vec<String>,
    due_time: DateTime<Utc>,
) -> Result<()> {
    if test_id.trim().is_empty() {
        return Err(Error::validation("test id is required"));
    }
    if problem_ids.is_empty() {
        return Err(Error::validation("a test needs at least one problem"));
    }
    let test = Test {
        number_of_problems: problem_ids.len() as i64,
        problem_ids,
        due_time,
        created_at: Utc::now(),
        completion_status: Default::default(),
    };
    store.set(collections::TESTS, test_id, &serde_json::to_value(&test)?)?;
    info!(test_id, "test created");
    Ok(())
}

pub fn get_test(store: &Store, test_id: &str) -> Result<Test> {
    let body = store
        .get(collections::TESTS, test_id)?
        .ok_or_else(|| Error::not_found(format!("test {test_id} not found")))?;
    Ok(serde_json::from_value(body)?)
}

pub fn all_tests(store: &Store) -> Result<Vec<(String, Test)>> {
    let mut out = Vec::new();
    for (id, body) in store.scan(collections::TESTS)? {
        out.push((id, serde_json::from_value(body)?));
    }
    Ok(out)
}

pub fn test_ids(store: &Store) -> Result<Vec<String>> {
    Ok(store
        .scan(collections::TESTS)?
        .into_iter()
        .map(|(id, _)| id)
        .collect())
}

/// Tests still open for submission.
pub fn active_tests(store: &Store, now: DateTime<Utc>) -> Result<Vec<(String, Test)>> {
    let mut out = all_tests(store)?;
    out.retain(|(_, test)| test.due_time > now);
    Ok(out)
}

/// A test with its problem documents resolved. Ids that no longer match a
/// bank document are skipped instead of failing the whole fetch.
pub fn test_with_problems(store: &Store, test_id: &str) -> Result<(Test, Vec<Value>)> {
    let test = get_test(store, test_id)?;
    let mut problems = Vec::new();
    for id in &test.problem_ids {
        if let Some(body) = store.get(collections::TEST_PROBLEMS, id)? {
            problems.push(body);
        }
    }
    Ok((test, problems))
}

/// Appends one submission to the student's list and writes the whole
/// completionStatus field back. Read-modify-write with no locking; two
/// simultaneous submitters can lose one entry.
pub fn record_submission(
    store: &Store,
    test_id: &str,
    register_number: &str,
    submission: Submission,
) -> Result<()> {
    if register_number.trim().is_empty() {
        return Err(Error::validation("register number is required"));
    }
    let mut test = get_test(store, test_id)?;
    test.completion_status
        .entry(register_number.to_string())
        .or_default()
        .push(submission);
    store.set_field(
        collections::TESTS,
        test_id,
        "completionStatus",
        serde_json::to_value(&test.completion_status)?,
    )?;
    info!(test_id, register_number, "submission recorded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    const REG: &str = "711721CS001";

    fn test_store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn bank_problem(store: &Store, key: &str, name: &str) {
        store
            .set(
                collections::TEST_PROBLEMS,
                key,
                &json!({ "problemName": name, "topic": "arrays", "difficulty": "easy" }),
            )
            .unwrap();
    }

    fn submission(problem: &str, score: f64) -> Submission {
        Submission {
            score,
            completed_time: Utc::now(),
            problem_ids: problem.into(),
        }
    }

    #[test]
    fn test_bank_listing_skips_nameless_documents() {
        let store = test_store();
        bank_problem(&store, "p1", "Two Sum");
        store
            .set(collections::TEST_PROBLEMS, "junk", &json!({ "topic": "misc" }))
            .unwrap();

        let rows = test_problems(&store).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].problem_name, "Two Sum");
    }

    #[test]
    fn test_bank_listing_404_when_empty() {
        let store = test_store();
        assert_eq!(test_problems(&store).unwrap_err().status(), 404);
    }

    #[test]
    fn test_create_test_starts_with_no_submissions() {
        let store = test_store();
        create_test(
            &store,
            "weekly-1",
            vec!["p1".into(), "p2".into()],
            Utc::now() + Duration::days(1),
        )
        .unwrap();

        let test = get_test(&store, "weekly-1").unwrap();
        assert_eq!(test.number_of_problems, 2);
        assert!(test.completion_status.is_empty());
    }

    #[test]
    fn test_active_tests_filters_on_due_time() {
        let store = test_store();
        let now = Utc::now();
        create_test(&store, "open", vec!["p1".into()], now + Duration::hours(2)).unwrap();
        create_test(&store, "closed", vec!["p1".into()], now - Duration::hours(2)).unwrap();

        let active = active_tests(&store, now).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].0, "open");

        assert_eq!(test_ids(&store).unwrap(), vec!["closed", "open"]);
    }

    #[test]
    fn test_with_problems_skips_dangling_ids() {
        let store = test_store();
        bank_problem(&store, "p1", "Two Sum");
        create_test(
            &store,
            "weekly-1",
            vec!["p1".into(), "deleted".into()],
            Utc::now() + Duration::days(1),
        )
        .unwrap();

        let (test, problems) = test_with_problems(&store, "weekly-1").unwrap();
        assert_eq!(test.problem_ids.len(), 2);
        assert_eq!(problems.len(), 1);
    }

    #[test]
    fn test_submissions_append_per_student() {
        let store = test_store();
        create_test(&store, "weekly-1", vec!["p1".into()], Utc::now() + Duration::days(1)).unwrap();

        record_submission(&store, "weekly-1", REG, submission("p1", 40.0)).unwrap();
        record_submission(&store, "weekly-1", REG, submission("p1", 100.0)).unwrap();

        let test = get_test(&store, "weekly-1").unwrap();
        let attempts = test.completion_status.get(REG).unwrap();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1].score, 100.0);
    }

    #[test]
    fn test_submission_to_unknown_test_is_not_found() {
        let store = test_store();
        let err = record_submission(&store, "nope", REG, submission("p1", 1.0)).unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_practice_problem_round_trip() {
        let store = test_store();
        let problem = PracticeProblem {
            problem_name: "FizzBuzz".into(),
            problem_description: "Print fizz or buzz.".into(),
            ..Default::default()
        };
        let id = add_practice_problem(&store, &problem).unwrap();

        let listed = practice_problems(&store).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].0, id);
        assert_eq!(listed[0].1.problem_name, "FizzBuzz");
    }
}
