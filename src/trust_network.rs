use crate::error::{AurasafeError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
    pub relationship: String,
    pub priority: Priority,
}

/// Fields for a contact that has not been added yet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewContact {
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub relationship: String,
    #[serde(default)]
    pub priority: Priority,
}

/// In-memory emergency contact list
#[derive(Debug, Clone)]
pub struct TrustNetwork {
    contacts: Vec<Contact>,
}

impl TrustNetwork {
    pub fn empty() -> Self {
        Self {
            contacts: Vec::new(),
        }
    }

    /// Contact list seeded with the demo defaults
    pub fn seeded() -> Self {
        const SEED: [(&str, &str, &str, &str, &str, Priority); 4] = [
            ("1", "Mom", "+1-555-0123", "mom@email.com", "Family", Priority::High),
            (
                "2",
                "Sarah (Best Friend)",
                "+1-555-0456",
                "sarah@email.com",
                "Friend",
                Priority::High,
            ),
            (
                "3",
                "Dr. Smith",
                "+1-555-0789",
                "dr.smith@clinic.com",
                "Doctor",
                Priority::Medium,
            ),
            (
                "4",
                "Workplace Security",
                "+1-555-0999",
                "security@work.com",
                "Work",
                Priority::Low,
            ),
        ];

        let contacts = SEED
            .iter()
            .map(|&(id, name, phone, email, relationship, priority)| Contact {
                id: id.to_string(),
                name: name.to_string(),
                phone: phone.to_string(),
                email: Some(email.to_string()),
                relationship: relationship.to_string(),
                priority,
            })
            .collect();

        Self { contacts }
    }

    pub fn contacts(&self) -> &[Contact] {
        &self.contacts
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.id == id)
    }

    /// Append a contact. Name and phone are required.
    pub fn add(&mut self, new: NewContact) -> Result<Contact> {
        let name = new.name.trim();
        let phone = new.phone.trim();
        if name.is_empty() {
            return Err(AurasafeError::validation("name", "is required"));
        }
        if phone.is_empty() {
            return Err(AurasafeError::validation("phone", "is required"));
        }

        let email = Some(new.email.trim().to_string()).filter(|e| !e.is_empty());
        let contact = Contact {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: phone.to_string(),
            email,
            relationship: new.relationship.trim().to_string(),
            priority: new.priority,
        };

        info!("Added trusted contact {} ({:?})", contact.name, contact.priority);
        self.contacts.push(contact.clone());
        Ok(contact)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.contacts.len();
        self.contacts.retain(|c| c.id != id);
        let removed = self.contacts.len() != before;
        if !removed {
            debug!("No contact with id {}", id);
        }
        removed
    }

    /// Contacts ordered high priority first, insertion order within a priority
    pub fn by_priority(&self) -> Vec<&Contact> {
        let mut sorted: Vec<&Contact> = self.contacts.iter().collect();
        sorted.sort_by_key(|c| c.priority);
        sorted
    }

    /// Contacts that can receive an emailed alert
    pub fn recipients(&self) -> Vec<Contact> {
        self.by_priority()
            .into_iter()
            .filter(|c| c.email.is_some())
            .cloned()
            .collect()
    }
}

impl Default for TrustNetwork {
    fn default() -> Self {
        Self::seeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn new_contact(name: &str, phone: &str) -> NewContact {
        NewContact {
            name: name.to_string(),
            phone: phone.to_string(),
            ..NewContact::default()
        }
    }

    #[test]
    fn test_seeded_contacts_and_default_priority() {
        let network = TrustNetwork::seeded();
        assert_eq!(network.len(), 4);
        assert_eq!(network.contacts()[1].name, "Sarah (Best Friend)");
        assert_eq!(network.contacts()[3].priority, Priority::Low);
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(NewContact::default().priority, Priority::Medium);
    }

    #[test]
    fn test_seeded_contacts() {
        let network = TrustNetwork::seeded();
        assert_eq!(network.len(), 4);
        assert_eq!(network.get("1").map(|c| c.name.as_str()), Some("Mom"));
        assert_eq!(network.recipients().len(), 4);
    }

    #[test]
    fn test_add_requires_name_and_phone() {
        let mut network = TrustNetwork::seeded();

        let err = network.add(new_contact("  ", "+1-555-0000")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(network.add(new_contact("Alex", "")).is_err());
        assert_eq!(network.len(), 4);

        let added = network.add(new_contact("Alex", "+1-555-0111")).unwrap();
        assert_eq!(added.priority, Priority::Medium);
        assert!(added.email.is_none());
        assert_eq!(network.len(), 5);
        assert_eq!(network.recipients().len(), 4);
    }

    #[test]
    fn test_remove_by_id() {
        let mut network = TrustNetwork::seeded();
        assert!(network.remove("3"));
        assert!(!network.remove("3"));
        assert_eq!(network.len(), 3);
    }

    #[test]
    fn test_by_priority_is_stable() {
        let mut network = TrustNetwork::seeded();
        let mut urgent = new_contact("Neighbor", "+1-555-0222");
        urgent.priority = Priority::High;
        network.add(urgent).unwrap();

        let names: Vec<&str> = network.by_priority().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Mom", "Sarah (Best Friend)", "Neighbor", "Dr. Smith", "Workplace Security"]
        );
    }
}
