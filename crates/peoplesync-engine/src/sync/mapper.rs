//! Remaps raw source attributes into destination attribute keys.

use peoplesync_connector::person::{AttributeKey, Attributes, Person, OCCURRENCE_DELIMITER};
use tracing::{debug, warn};

use super::config::{AttributeRule, CompiledAttributeMap};

/// Applies a compiled attribute map to source people.
#[derive(Debug, Clone, Copy)]
pub struct AttributeMapper<'a> {
    map: &'a CompiledAttributeMap,
}

impl<'a> AttributeMapper<'a> {
    #[must_use]
    pub fn new(map: &'a CompiledAttributeMap) -> Self {
        Self { map }
    }

    /// Remap every person. The output is 1:1 with the input.
    #[must_use]
    pub fn remap(&self, people: &[Person]) -> Vec<Person> {
        let remapped: Vec<Person> = people.iter().map(|p| self.remap_person(p)).collect();

        let disabled = remapped.iter().filter(|p| p.disable_changes).count();
        debug!(
            people = remapped.len(),
            disabled,
            rules = self.map.len(),
            "Remapped source people"
        );

        remapped
    }

    /// Build a person holding only destination-keyed values.
    ///
    /// A missing required attribute disables changes for the person but does
    /// not stop the rest of the record from being built.
    #[must_use]
    pub fn remap_person(&self, source: &Person) -> Person {
        let mut attributes = Attributes::new();
        let mut disable_changes = source.disable_changes;

        for rule in self.map.rules() {
            match source.attributes.get(&rule.source) {
                Some(value) => {
                    attributes.insert(rule.destination.clone(), rule.apply(value));
                    copy_repeats(rule, &source.attributes, &mut attributes);
                }
                None if rule.required => {
                    disable_changes = true;
                    warn!(
                        person = %source.compare_value,
                        missing = %rule.source,
                        gathered = ?attributes,
                        "Required attribute missing, changes disabled for person"
                    );
                }
                None => {}
            }
        }

        Person {
            compare_value: source.compare_value.clone(),
            id: source.id.clone(),
            attributes,
            disable_changes,
        }
    }
}

/// Carry `source~1`, `source~2`, ... over as `destination~1`, ... for
/// compound keys, so repeated sub-records survive the remap.
fn copy_repeats(rule: &AttributeRule, from: &Attributes, to: &mut Attributes) {
    let key = AttributeKey::parse(&rule.source);
    if !key.is_compound() || key.occurrence != 0 {
        return;
    }

    for occurrence in 1.. {
        let source_key = format!("{}{OCCURRENCE_DELIMITER}{occurrence}", rule.source);
        let Some(value) = from.get(&source_key) else {
            break;
        };
        to.insert(
            format!("{}{OCCURRENCE_DELIMITER}{occurrence}", rule.destination),
            rule.apply(value),
        );
    }
}

/// Remap `people` with `map`.
#[must_use]
pub fn remap(people: &[Person], map: &CompiledAttributeMap) -> Vec<Person> {
    AttributeMapper::new(map).remap(people)
}
