use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identity::Identity;

/// A row of the `user_profiles` table, keyed 1:1 by identity id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub github_username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a profile row. Timestamps are filled by the store.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub id: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub github_username: Option<String>,
}

impl NewProfile {
    /// Builds the row provisioned the first time `identity` is seen.
    pub fn for_identity(identity: &Identity) -> Self {
        let defaults = ProfileDefaults::derive(identity);
        Self {
            id: identity.id.clone(),
            email: identity.email.clone(),
            full_name: defaults.full_name,
            avatar_url: defaults.avatar_url,
            github_username: defaults.github_username,
        }
    }
}

/// Partial update of a profile row. Only the fields that are set are sent.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.email.is_none() && self.avatar_url.is_none() && self.github_username.is_none()
    }

    pub(crate) fn stamped(self, now: DateTime<Utc>) -> Self {
        Self { updated_at: Some(now), ..self }
    }
}

/// Profile fields derived from an identity's metadata bag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileDefaults {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub github_username: Option<String>,
}

impl ProfileDefaults {
    pub fn derive(identity: &Identity) -> Self {
        let email_local_part = identity
            .email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty());

        let full_name = identity
            .metadata_str("full_name")
            .or_else(|| identity.metadata_str("name"))
            .or_else(|| identity.metadata_str("preferred_username"))
            .or(email_local_part);

        let avatar_url = identity.metadata_str("avatar_url").or_else(|| identity.metadata_str("picture"));

        let github_username =
            identity.metadata_str("user_name").or_else(|| identity.metadata_str("preferred_username"));

        Self {
            full_name: full_name.map(str::to_owned),
            avatar_url: avatar_url.map(str::to_owned),
            github_username: github_username.map(str::to_owned),
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;
    use maplit::btreemap;
    use serde_json::{json, Map, Value};

    use super::{NewProfile, ProfileDefaults, ProfilePatch};
    use crate::identity::Identity;

    fn identity(email: Option<&str>, metadata: Map<String, Value>) -> Identity {
        Identity::new("U1", email.map(str::to_owned), metadata)
    }

    fn metadata(entries: std::collections::BTreeMap<&str, &str>) -> Map<String, Value> {
        entries.into_iter().map(|(k, v)| (k.to_owned(), Value::String(v.to_owned()))).collect()
    }

    #[test]
    fn when_full_name_is_present_then_it_wins_over_every_other_source() {
        let identity = identity(
            Some("ada@example.com"),
            metadata(btreemap! {
                "full_name" => "Ada Lovelace",
                "name" => "Ada",
                "preferred_username" => "ada_l",
            }),
        );

        assert_eq!(ProfileDefaults::derive(&identity).full_name.as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn when_deriving_full_name_then_empty_values_fall_through_in_order() {
        let with_name = identity(Some("ada@example.com"), metadata(btreemap! { "full_name" => "", "name" => "Ada" }));
        assert_eq!(ProfileDefaults::derive(&with_name).full_name.as_deref(), Some("Ada"));

        let with_username = identity(Some("ada@example.com"), metadata(btreemap! { "preferred_username" => "ada_l" }));
        assert_eq!(ProfileDefaults::derive(&with_username).full_name.as_deref(), Some("ada_l"));

        let with_email = identity(Some("ada@example.com"), Map::new());
        assert_eq!(ProfileDefaults::derive(&with_email).full_name.as_deref(), Some("ada"));

        let with_nothing = identity(None, Map::new());
        assert_eq!(ProfileDefaults::derive(&with_nothing).full_name, None);
    }

    #[test]
    fn when_metadata_value_is_not_a_string_then_it_is_ignored() {
        let mut bag = Map::new();
        bag.insert("full_name".to_owned(), json!(42));
        bag.insert("picture".to_owned(), json!("https://cdn.example.com/p.png"));

        let defaults = ProfileDefaults::derive(&identity(Some("b@example.com"), bag));

        assert_eq!(defaults.full_name.as_deref(), Some("b"));
        assert_eq!(defaults.avatar_url.as_deref(), Some("https://cdn.example.com/p.png"));
    }

    #[test]
    fn when_social_metadata_is_present_then_avatar_and_handle_follow_precedence() {
        let github = identity(
            Some("octo@example.com"),
            metadata(btreemap! {
                "avatar_url" => "https://avatars.example.com/octo",
                "picture" => "https://other.example.com/octo",
                "user_name" => "octocat",
                "preferred_username" => "octo",
            }),
        );
        let defaults = ProfileDefaults::derive(&github);
        assert_eq!(defaults.avatar_url.as_deref(), Some("https://avatars.example.com/octo"));
        assert_eq!(defaults.github_username.as_deref(), Some("octocat"));

        let google = identity(Some("g@example.com"), metadata(btreemap! { "preferred_username" => "gee" }));
        let defaults = ProfileDefaults::derive(&google);
        assert_eq!(defaults.avatar_url, None);
        assert_eq!(defaults.github_username.as_deref(), Some("gee"));
    }

    #[test]
    fn when_identity_has_empty_metadata_then_new_profile_uses_email_local_part() {
        let new_profile = NewProfile::for_identity(&identity(Some("a@example.com"), Map::new()));

        assert_eq!(
            new_profile,
            NewProfile {
                id: "U1".to_owned(),
                email: Some("a@example.com".to_owned()),
                full_name: Some("a".to_owned()),
                avatar_url: None,
                github_username: None,
            }
        );
    }

    #[test]
    fn when_patch_is_serialized_then_unset_fields_are_omitted() {
        let now = Utc::now();
        let patch = ProfilePatch { full_name: Some("Ada".to_owned()), ..Default::default() }.stamped(now);

        let value = serde_json::to_value(&patch).expect("patch should serialize");
        let object = value.as_object().expect("patch should be an object");

        assert_eq!(object.len(), 2);
        assert_eq!(object["full_name"], json!("Ada"));
        assert!(object.contains_key("updated_at"));
        assert!(!patch.is_empty());
        assert!(ProfilePatch::default().is_empty());
    }
}
