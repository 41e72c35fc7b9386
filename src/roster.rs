use serde::{Deserialize, Serialize};

use crate::model::TherapistId;

/// Read-only therapist reference data. The engine records whatever medium
/// string it is given; the roster exists for display collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Therapist {
    pub id: TherapistId,
    pub name: String,
    pub mediums: Vec<String>,
}

/// Immutable roster value passed into the facade, not an ambient global.
#[derive(Debug, Clone, Default)]
pub struct Roster {
    therapists: Vec<Therapist>,
}

impl Roster {
    pub fn new(therapists: Vec<Therapist>) -> Self {
        Self { therapists }
    }

    pub fn get(&self, id: TherapistId) -> Option<&Therapist> {
        self.therapists.iter().find(|t| t.id == id)
    }

    pub fn therapists(&self) -> &[Therapist] {
        &self.therapists
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id() {
        let roster = Roster::new(vec![
            Therapist {
                id: 1,
                name: "Dr. Ellis".into(),
                mediums: vec!["video".into(), "phone".into()],
            },
            Therapist {
                id: 2,
                name: "Dr. Okafor".into(),
                mediums: vec!["chat".into()],
            },
        ]);
        assert_eq!(roster.get(2).unwrap().name, "Dr. Okafor");
        assert!(roster.get(99).is_none());
        assert_eq!(roster.therapists().len(), 2);
    }
}
