use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::logging;
use crate::store::{self, KeyValueStore};

pub const NOT_SET: &str = "Not set";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifeEvent {
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub relation: String,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pet {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub note: String,
}

/// Who the user is, as they described themselves on the profile page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    // Basic info
    pub username: String,
    pub nickname: String,
    pub birthday: String,
    pub identity: String,
    pub school_work: String,
    pub school_work_location: String,
    pub residence: String,
    pub avatar: String,

    // Deep info
    pub personality: String,
    pub values_positive: String,
    pub values_negative: String,
    pub life_experience: Vec<LifeEvent>,
    pub short_term_goals: Vec<String>,

    // Connections and interests
    pub core_relationships: Vec<Relationship>,
    pub interests: Vec<String>,
    pub pets: Vec<Pet>,
}

const TEXT_FIELDS: [&str; 11] = [
    "username",
    "nickname",
    "birthday",
    "identity",
    "schoolWork",
    "schoolWorkLocation",
    "residence",
    "avatar",
    "personality",
    "valuesPositive",
    "valuesNegative",
];

impl UserProfile {
    /// Decode a stored profile, upgrading shapes written by older versions.
    /// Anything that is not an object yields the empty profile.
    pub fn from_stored(raw: Value) -> Self {
        let Value::Object(legacy) = raw else {
            return Self::default();
        };
        let migrated = migrate(&legacy);
        serde_json::from_value(Value::Object(migrated)).unwrap_or_else(|e| {
            logging::log_error(Some(store::PROFILE_KEY), &format!("Unreadable profile, using defaults: {}", e));
            Self::default()
        })
    }

    pub fn interests_label(&self) -> String {
        self.interests.join(", ")
    }

    pub fn goals_label(&self) -> String {
        self.short_term_goals.join(", ")
    }

    /// Family members as `name (note)`, comma separated
    pub fn family_label(&self) -> String {
        self.relationship_label(true)
    }

    /// Everyone who is not family
    pub fn relationships_label(&self) -> String {
        self.relationship_label(false)
    }

    fn relationship_label(&self, family: bool) -> String {
        self.core_relationships
            .iter()
            .filter(|r| r.relation.eq_ignore_ascii_case("family") == family)
            .map(|r| {
                if r.note.trim().is_empty() {
                    r.name.clone()
                } else {
                    format!("{} ({})", r.name, r.note)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Set one field by its stored name. List fields take comma separated values.
    pub fn set_field(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim().to_string();
        match key {
            "username" => self.username = value,
            "nickname" => self.nickname = value,
            "birthday" => self.birthday = value,
            "identity" => self.identity = value,
            "schoolWork" => self.school_work = value,
            "schoolWorkLocation" => self.school_work_location = value,
            "residence" => self.residence = value,
            "avatar" => self.avatar = value,
            "personality" => self.personality = value,
            "valuesPositive" => self.values_positive = value,
            "valuesNegative" => self.values_negative = value,
            "interests" => self.interests = split_list(&value),
            "shortTermGoals" => self.short_term_goals = split_list(&value),
            _ => return Err(Error::InvalidInput(format!("unknown profile field: {}", key))),
        }
        Ok(())
    }
}

/// Empty text renders as "Not set"
pub fn or_not_set(value: &str) -> &str {
    if value.trim().is_empty() {
        NOT_SET
    } else {
        value
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn non_empty_str<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn migrate(legacy: &Map<String, Value>) -> Map<String, Value> {
    let mut out = legacy.clone();

    // Text fields: renamed keys first, then anything non-string is dropped
    for (new_key, old_key) in [("residence", "location"), ("schoolWork", "workplace"), ("identity", "occupation")] {
        if non_empty_str(&out, new_key).is_none() {
            if let Some(old) = non_empty_str(legacy, old_key) {
                out.insert(new_key.to_string(), json!(old));
            }
        }
    }
    for key in TEXT_FIELDS {
        if out.get(key).is_some_and(|v| !v.is_string()) {
            out.remove(key);
        }
    }

    let life = match legacy.get("lifeExperience") {
        Some(Value::String(s)) if !s.is_empty() => json!([{ "year": "Past", "content": s }]),
        Some(v @ Value::Array(_)) => v.clone(),
        _ => json!([]),
    };
    out.insert("lifeExperience".to_string(), life);

    let relationships = match legacy.get("coreRelationships") {
        Some(Value::String(s)) => {
            let family = non_empty_str(legacy, "family");
            let friends = non_empty_str(legacy, "relationships");
            let mut parts = Vec::new();
            if let Some(note) = family {
                parts.push(json!({ "name": "Family", "relation": "Family", "note": note }));
            }
            if let Some(note) = friends {
                parts.push(json!({ "name": "Relationships", "relation": "Friends", "note": note }));
            }
            if !s.is_empty() && family.is_none() && friends.is_none() {
                parts.push(json!({ "name": "Others", "relation": "General", "note": s }));
            }
            Value::Array(parts)
        }
        Some(v @ Value::Array(_)) => v.clone(),
        _ => json!([]),
    };
    out.insert("coreRelationships".to_string(), relationships);

    let interests = match legacy.get("interests") {
        Some(Value::String(s)) => json!(split_list(s)),
        Some(v @ Value::Array(_)) => v.clone(),
        _ => json!([]),
    };
    out.insert("interests".to_string(), interests);

    let pets = match legacy.get("pets") {
        Some(Value::String(s)) if !s.is_empty() => json!([{ "name": "Pet", "type": "Pet", "note": s }]),
        Some(v @ Value::Array(_)) => v.clone(),
        _ => json!([]),
    };
    out.insert("pets".to_string(), pets);

    let goals = match legacy.get("shortTermGoals") {
        Some(Value::String(s)) if !s.trim().is_empty() => json!([s]),
        Some(v @ Value::Array(_)) => v.clone(),
        _ => json!([]),
    };
    out.insert("shortTermGoals".to_string(), goals);

    out
}

// ============ Profile Service ============

pub struct ProfileService {
    store: Arc<dyn KeyValueStore>,
    profile: UserProfile,
}

impl ProfileService {
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let profile = store::read_json::<Value>(store.as_ref(), store::PROFILE_KEY)
            .map(UserProfile::from_stored)
            .unwrap_or_default();
        Self { store, profile }
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Apply an edit and persist. The edit stays in memory if the write fails.
    pub fn update<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut UserProfile) -> Result<()>,
    {
        edit(&mut self.profile)?;
        store::write_json(self.store.as_ref(), store::PROFILE_KEY, &self.profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_migrates_legacy_fields() {
        let raw = json!({
            "username": "Lin",
            "location": "Taipei",
            "workplace": "Studio",
            "occupation": "Designer",
            "lifeExperience": "Moved cities in 2019",
            "coreRelationships": "",
            "family": "Mom and sister",
            "relationships": "College friends",
            "interests": "hiking, ,  film",
            "pets": "A grey cat",
            "shortTermGoals": "Run a half marathon"
        });
        let profile = UserProfile::from_stored(raw);

        assert_eq!(profile.residence, "Taipei");
        assert_eq!(profile.school_work, "Studio");
        assert_eq!(profile.identity, "Designer");
        assert_eq!(profile.life_experience, vec![LifeEvent { year: "Past".into(), content: "Moved cities in 2019".into() }]);
        assert_eq!(profile.core_relationships.len(), 2);
        assert_eq!(profile.core_relationships[0].relation, "Family");
        assert_eq!(profile.core_relationships[1].note, "College friends");
        assert_eq!(profile.interests, vec!["hiking", "film"]);
        assert_eq!(profile.pets[0].kind, "Pet");
        assert_eq!(profile.short_term_goals, vec!["Run a half marathon"]);
        assert_eq!(profile.family_label(), "Family (Mom and sister)");
    }

    #[test]
    fn test_string_relationships_without_legacy_fields() {
        let profile = UserProfile::from_stored(json!({ "coreRelationships": "Best friend Mei" }));
        assert_eq!(
            profile.core_relationships,
            vec![Relationship { name: "Others".into(), relation: "General".into(), note: "Best friend Mei".into() }]
        );
    }

    #[test]
    fn test_new_fields_win_over_legacy() {
        let profile = UserProfile::from_stored(json!({ "residence": "Kyoto", "location": "Osaka" }));
        assert_eq!(profile.residence, "Kyoto");
    }

    #[test]
    fn test_garbage_profile_is_default() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(store::PROFILE_KEY, "[1, 2, 3]").unwrap();
        assert_eq!(ProfileService::load(kv.clone()).profile(), &UserProfile::default());

        kv.set(store::PROFILE_KEY, "not json").unwrap();
        assert_eq!(ProfileService::load(kv).profile(), &UserProfile::default());
    }

    #[test]
    fn test_update_persists() {
        let kv = Arc::new(MemoryStore::new());
        let mut service = ProfileService::load(kv.clone());
        service
            .update(|p| {
                p.set_field("nickname", " Lulu ")?;
                p.set_field("interests", "tea,cats")
            })
            .unwrap();
        assert!(service.update(|p| p.set_field("shoeSize", "40")).is_err());

        let reloaded = ProfileService::load(kv);
        assert_eq!(reloaded.profile().nickname, "Lulu");
        assert_eq!(reloaded.profile().interests_label(), "tea, cats");
        assert_eq!(or_not_set(&reloaded.profile().birthday), NOT_SET);
    }
}
