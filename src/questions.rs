//! Crowd-sourced interview question bank, contributed by students per
//! company drive.

use chrono::Utc;
use tracing::info;

use crate::error::{Error, Result};
use crate::models::CompanyQuestion;
use crate::store::{collections, Store};

fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct NewQuestion {
    pub company_name: String,
    pub year: String,
    pub round: String,
    pub question: String,
    pub solution: String,
    /// Comma-separated; stored as an array.
    pub tags: String,
    pub external_links: String,
    pub additional_notes: String,
    pub register_number: String,
}

pub fn add_question(store: &Store, new: NewQuestion) -> Result<String> {
    if new.company_name.trim().is_empty() {
        return Err(Error::validation("company name is required"));
    }
    if new.question.trim().is_empty() {
        return Err(Error::validation("question text is required"));
    }

    let question = CompanyQuestion {
        company_name: new.company_name,
        year: new.year,
        round: new.round,
        question: new.question,
        solution: new.solution,
        tags: split_tags(&new.tags),
        external_links: new.external_links,
        additional_notes: new.additional_notes,
        register_number: new.register_number,
        created_at: Some(Utc::now()),
        updated_at: None,
    };
    let id = store.insert(collections::QUESTIONS, &serde_json::to_value(&question)?)?;
    info!(id, company = %question.company_name, "interview question added");
    Ok(id)
}

/// Questions for one company, or the whole bank when no name (or a blank
/// one) is given. An empty result is reported as not-found either way.
pub fn search_questions(
    store: &Store,
    company_name: Option<&str>,
) -> Result<Vec<(String, CompanyQuestion)>> {
    let filter = company_name.map(str::trim).filter(|c| !c.is_empty());
    let mut out = Vec::new();
    for (id, body) in store.scan(collections::QUESTIONS)? {
        let question: CompanyQuestion = serde_json::from_value(body)?;
        if filter.map(|c| question.company_name == c).unwrap_or(true) {
            out.push((id, question));
        }
    }
    if out.is_empty() {
        return Err(match filter {
            Some(company) => Error::not_found(format!("no questions for {company}")),
            None => Error::not_found("no questions".to_string()),
        });
    }
    Ok(out)
}

pub fn all_questions(store: &Store) -> Result<Vec<(String, CompanyQuestion)>> {
    search_questions(store, None)
}

pub fn get_question(store: &Store, id: &str) -> Result<CompanyQuestion> {
    let body = store
        .get(collections::QUESTIONS, id)?
        .ok_or_else(|| Error::not_found(format!("question {id} not found")))?;
    Ok(serde_json::from_value(body)?)
}

/// Replaces every submitted field of one question and stamps updated_at;
/// created_at survives the merge.
pub fn update_question(store: &Store, id: &str, update: NewQuestion) -> Result<()> {
    if !store.exists(collections::QUESTIONS, id)? {
        return Err(Error::not_found(format!("question {id} not found")));
    }
    let patch = serde_json::json!({
        "companyName": update.company_name,
        "year": update.year,
        "round": update.round,
        "question": update.question,
        "solution": update.solution,
        "tags": split_tags(&update.tags),
        "externalLinks": update.external_links,
        "additionalNotes": update.additional_notes,
        "registerNumber": update.register_number,
        "updated_at": Utc::now(),
    });
    store.merge(collections::QUESTIONS, id, &patch)?;
    info!(id, "interview question updated");
    Ok(())
}

pub fn delete_question(store: &Store, id: &str) -> Result<()> {
    store.delete(collections::QUESTIONS, id)?;
    info!(id, "interview question deleted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn new_question(company: &str, tags: &str) -> NewQuestion {
        NewQuestion {
            company_name: company.into(),
            year: "2024".into(),
            round: "Technical".into(),
            question: "Reverse a linked list.".into(),
            solution: "Iterate with three pointers.".into(),
            tags: tags.into(),
            external_links: String::new(),
            additional_notes: String::new(),
            register_number: "711721CS001".into(),
        }
    }

    #[test]
    fn test_add_splits_tags_on_commas() {
        let store = test_store();
        let id = add_question(&store, new_question("Acme", "linked-list, pointers , easy")).unwrap();

        let q = get_question(&store, &id).unwrap();
        assert_eq!(q.tags, vec!["linked-list", "pointers", "easy"]);
        assert!(q.created_at.is_some());
        assert!(q.updated_at.is_none());
    }

    #[test]
    fn test_search_filters_by_company() {
        let store = test_store();
        add_question(&store, new_question("Acme", "a")).unwrap();
        add_question(&store, new_question("Beta", "b")).unwrap();

        let acme = search_questions(&store, Some("Acme")).unwrap();
        assert_eq!(acme.len(), 1);
        assert_eq!(acme[0].1.company_name, "Acme");

        // Blank filter means the whole bank.
        assert_eq!(search_questions(&store, Some("  ")).unwrap().len(), 2);
        assert_eq!(all_questions(&store).unwrap().len(), 2);
    }

    #[test]
    fn test_search_404_when_nothing_matches() {
        let store = test_store();
        assert_eq!(search_questions(&store, None).unwrap_err().status(), 404);

        add_question(&store, new_question("Acme", "a")).unwrap();
        assert_eq!(
            search_questions(&store, Some("Ghost")).unwrap_err().status(),
            404
        );
    }

    #[test]
    fn test_update_rewrites_fields_and_stamps_updated_at() {
        let store = test_store();
        let id = add_question(&store, new_question("Acme", "old")).unwrap();

        let mut update = new_question("Acme", "new, better");
        update.solution = "Use recursion.".into();
        update_question(&store, &id, update).unwrap();

        let q = get_question(&store, &id).unwrap();
        assert_eq!(q.solution, "Use recursion.");
        assert_eq!(q.tags, vec!["new", "better"]);
        assert!(q.created_at.is_some());
        assert!(q.updated_at.is_some());
    }

    #[test]
    fn test_update_requires_existing_question() {
        let store = test_store();
        let err = update_question(&store, "nope", new_question("Acme", "")).unwrap_err();
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn test_delete_removes_question() {
        let store = test_store();
        let id = add_question(&store, new_question("Acme", "a")).unwrap();
        delete_question(&store, &id).unwrap();
        assert_eq!(get_question(&store, &id).unwrap_err().status(), 404);
    }
}
