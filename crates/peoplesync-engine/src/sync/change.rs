//! Three-way change-set generation.

use peoplesync_connector::person::{ChangeSet, Person};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::comparator::Comparator;
use super::config::CaseSensitivity;

/// Joins source and destination people on their compare value.
#[derive(Debug, Clone)]
pub struct ChangeSetBuilder {
    comparator: Comparator,
    id_field: String,
}

impl ChangeSetBuilder {
    /// `id_field` names the destination attribute holding the record id.
    pub fn new(case_sensitivity: CaseSensitivity, id_field: impl Into<String>) -> Self {
        Self {
            comparator: Comparator::new(case_sensitivity),
            id_field: id_field.into(),
        }
    }

    /// Partition into create, update and delete.
    ///
    /// Output order follows input order, so identical inputs always produce
    /// identical change sets. Source people with changes disabled are never
    /// created or updated, but their compare value still keeps a matching
    /// destination record from being deleted.
    #[must_use]
    pub fn build(&self, source: &[Person], destination: &[Person]) -> ChangeSet {
        let mut by_key: HashMap<String, &Person> = HashMap::with_capacity(destination.len());
        for person in destination {
            by_key.entry(person.compare_key()).or_insert(person);
        }

        let mut changes = ChangeSet::new();

        for person in source.iter().filter(|p| !p.disable_changes) {
            match by_key.get(&person.compare_key()) {
                None => changes.create.push(person.clone()),
                Some(existing) => {
                    if self.comparator.equal(person, existing) {
                        continue;
                    }
                    debug!(
                        person = %person.compare_value,
                        differences = ?self.comparator.differences(person, existing),
                        "Person differs from destination"
                    );
                    let mut update = person.clone();
                    update.id = self.destination_id(existing);
                    changes.update.push(update);
                }
            }
        }

        let present: HashSet<String> = source.iter().map(Person::compare_key).collect();
        changes.delete = destination
            .iter()
            .filter(|p| !present.contains(&p.compare_key()))
            .cloned()
            .collect();

        changes
    }

    fn destination_id(&self, existing: &Person) -> String {
        match existing.attributes.get(&self.id_field) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => existing.id.clone(),
        }
    }
}
