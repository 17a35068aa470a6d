use std::collections::{HashMap, HashSet};

use seedforge_core::{Row, UniqueConstraint};
use tracing::warn;

use crate::errors::GenerationError;

/// Tracks constraint tuples already used per model and unique constraint.
///
/// One tracker lives for a single top-level generation call. Tuples from the
/// connect pool and from earlier runs are folded in the first time a model is
/// checked.
#[derive(Debug, Default)]
pub struct ConstraintTracker {
    max_attempts: u32,
    seen: HashMap<String, HashSet<Vec<String>>>,
    scanned: HashSet<String>,
}

impl ConstraintTracker {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Whether pre-existing rows for `model` still have to be handed to [`check`](Self::check).
    pub fn needs_pool_scan(&self, model: &str) -> bool {
        !self.scanned.contains(model)
    }

    /// Ensure `row` does not repeat a tuple of any constraint, regenerating the
    /// fields of a violated constraint until it passes or the budget is spent.
    ///
    /// `regenerate` receives the violated constraint and the retry counter
    /// (starting at 1). Returns the number of retries performed.
    pub fn check<F>(
        &mut self,
        model: &str,
        constraints: &[UniqueConstraint],
        row: &mut Row,
        pool: Option<&[Row]>,
        path: &str,
        mut regenerate: F,
    ) -> Result<u32, GenerationError>
    where
        F: FnMut(&UniqueConstraint, u32, &mut Row) -> Result<(), GenerationError>,
    {
        if self.scanned.insert(model.to_string()) {
            for pool_row in pool.unwrap_or_default() {
                for constraint in constraints {
                    if let Some(key) = tuple_key(constraint, pool_row) {
                        self.bucket(model, constraint).insert(key);
                    }
                }
            }
        }

        let mut counter = 0_u32;
        loop {
            let Some(violated) = self.first_violation(model, constraints, row) else {
                for constraint in constraints {
                    if let Some(key) = tuple_key(constraint, row) {
                        self.bucket(model, constraint).insert(key);
                    }
                }
                return Ok(counter);
            };

            if counter >= self.max_attempts {
                warn!(
                    model,
                    constraint = %violated.label(),
                    path,
                    attempts = counter,
                    "unique constraint exhausted"
                );
                return Err(GenerationError::ConstraintExhausted {
                    model: model.to_string(),
                    constraint: violated.label(),
                    path: path.to_string(),
                    attempts: counter,
                });
            }

            counter += 1;
            warn!(
                model,
                constraint = %violated.label(),
                path,
                attempt = counter,
                "unique constraint collision, regenerating"
            );
            regenerate(violated, counter, &mut *row)?;
        }
    }

    fn first_violation<'c>(
        &self,
        model: &str,
        constraints: &'c [UniqueConstraint],
        row: &Row,
    ) -> Option<&'c UniqueConstraint> {
        constraints.iter().find(|constraint| {
            let Some(key) = tuple_key(constraint, row) else {
                return false;
            };
            self.seen
                .get(&bucket_key(model, constraint))
                .is_some_and(|seen| seen.contains(&key))
        })
    }

    fn bucket(
        &mut self,
        model: &str,
        constraint: &UniqueConstraint,
    ) -> &mut HashSet<Vec<String>> {
        self.seen.entry(bucket_key(model, constraint)).or_default()
    }
}

/// Tuple value for `constraint`; `None` when any member is null or missing.
fn tuple_key(constraint: &UniqueConstraint, row: &Row) -> Option<Vec<String>> {
    let mut parts = Vec::with_capacity(constraint.fields.len());
    for field in &constraint.fields {
        match row.get(field) {
            Some(value) if !value.is_null() => parts.push(value.key()),
            _ => return None,
        }
    }
    Some(parts)
}

fn bucket_key(model: &str, constraint: &UniqueConstraint) -> String {
    format!("{model}.{}", constraint.fields.join(","))
}

#[cfg(test)]
mod tests {
    use seedforge_core::Value;

    use super::*;

    fn email_unique() -> Vec<UniqueConstraint> {
        vec![UniqueConstraint::new(vec!["email".to_string()])]
    }

    fn row_with_email(email: &str) -> Row {
        Row::from([("email".to_string(), Value::from(email))])
    }

    #[test]
    fn records_first_tuple_without_retry() {
        let mut tracker = ConstraintTracker::new(3);
        let mut row = row_with_email("a@x");
        let retries = tracker
            .check("User", &email_unique(), &mut row, None, "User/0", |_, _, _| {
                panic!("no regeneration expected")
            })
            .expect("unique row");
        assert_eq!(retries, 0);
    }

    #[test]
    fn regenerates_with_increasing_counter() {
        let mut tracker = ConstraintTracker::new(5);
        let constraints = email_unique();
        let mut first = row_with_email("dup@x");
        tracker
            .check("User", &constraints, &mut first, None, "User/0", |_, _, _| Ok(()))
            .expect("first row");

        let mut counters = Vec::new();
        let mut second = row_with_email("dup@x");
        let retries = tracker
            .check("User", &constraints, &mut second, None, "User/1", |_, counter, row| {
                counters.push(counter);
                if counter == 2 {
                    row.insert("email".into(), Value::from("fresh@x"));
                }
                Ok(())
            })
            .expect("second row");

        assert_eq!(counters, vec![1, 2]);
        assert_eq!(retries, 2);
        assert_eq!(second.get("email"), Some(&Value::from("fresh@x")));
    }

    #[test]
    fn exhaustion_reports_model_and_constraint() {
        let mut tracker = ConstraintTracker::new(2);
        let constraints = email_unique();
        let pool = vec![row_with_email("taken@x")];
        let mut row = row_with_email("taken@x");
        let err = tracker
            .check("User", &constraints, &mut row, Some(pool.as_slice()), "User/0", |_, _, _| Ok(()))
            .expect_err("pool tuple blocks the row");

        match err {
            GenerationError::ConstraintExhausted {
                model,
                constraint,
                attempts,
                ..
            } => {
                assert_eq!(model, "User");
                assert_eq!(constraint, "email");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!tracker.needs_pool_scan("User"));
    }

    #[test]
    fn composite_tuples_compare_member_by_member() {
        let mut tracker = ConstraintTracker::new(0);
        let constraints = vec![UniqueConstraint::new(vec![
            "first".to_string(),
            "last".to_string(),
        ])];
        let rows = [("a\u{1f}b", "c"), ("a", "b\u{1f}c")];
        for (index, (first, last)) in rows.into_iter().enumerate() {
            let mut row = Row::from([
                ("first".to_string(), Value::from(first)),
                ("last".to_string(), Value::from(last)),
            ]);
            tracker
                .check("User", &constraints, &mut row, None, &format!("User/{index}"), |_, _, _| {
                    panic!("distinct tuples must not collide")
                })
                .expect("distinct tuples");
        }
    }

    #[test]
    fn null_tuples_are_not_tracked() {
        let mut tracker = ConstraintTracker::new(0);
        let constraints = email_unique();
        for path in ["User/0", "User/1"] {
            let mut row = Row::from([("email".to_string(), Value::Null)]);
            tracker
                .check("User", &constraints, &mut row, None, path, |_, _, _| Ok(()))
                .expect("null tuples never collide");
        }
    }
}
