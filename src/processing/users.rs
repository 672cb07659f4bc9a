use crate::{
    crypto,
    error::{ApiError, Result},
    meta::{ConnectedAccount, Preferences, Provider, SavedLocation, UserRecord},
    processing::auth::GoogleIdentity,
    storage::{user_key, KvStore},
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tracing::info;

/// Keys a profile update may not overwrite.
pub const PROTECTED_PROFILE_KEYS: &[&str] = &[
    "id",
    "email",
    "createdAt",
    "updatedAt",
    "connectedAccounts",
    "preferences",
];

/// `user:{id}` records in the KV store.
pub struct UserRepository<'a> {
    store: &'a dyn KvStore,
}

impl<'a> UserRepository<'a> {
    pub fn new(store: &'a dyn KvStore) -> Self {
        UserRepository { store }
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<UserRecord>> {
        let Some(raw) = self.store.get(&user_key(user_id)).await? else {
            return Ok(None);
        };
        let record = serde_json::from_str(&raw)
            .map_err(|e| ApiError::StorageError(format!("Corrupt record for {}: {}", user_id, e)))?;
        Ok(Some(record))
    }

    pub async fn put(&self, record: &UserRecord) -> Result<()> {
        let raw = serde_json::to_string(record)
            .map_err(|e| ApiError::Internal(format!("Failed to serialize user: {}", e)))?;
        self.store.put(&user_key(&record.id), raw, None).await
    }

    /// Creates the record on first sign-in; later sign-ins refresh the
    /// Google profile fields and keep everything else.
    pub async fn upsert_from_identity(
        &self,
        identity: &GoogleIdentity,
        now: DateTime<Utc>,
    ) -> Result<UserRecord> {
        let record = match self.get(&identity.sub).await? {
            Some(mut existing) => {
                existing.email = identity.email.clone();
                existing.name = identity.name.clone();
                existing.picture = identity.picture.clone();
                existing.updated_at = now;
                existing
            }
            None => {
                info!(user = %identity.sub, "Creating user record");
                UserRecord {
                    id: identity.sub.clone(),
                    email: identity.email.clone(),
                    name: identity.name.clone(),
                    picture: identity.picture.clone(),
                    created_at: now,
                    updated_at: now,
                    preferences: Preferences::default(),
                    connected_accounts: Default::default(),
                    extra: Map::new(),
                }
            }
        };
        self.put(&record).await?;
        Ok(record)
    }

    pub async fn update_profile(
        &self,
        user_id: &str,
        updates: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<Option<UserRecord>> {
        let Some(existing) = self.get(user_id).await? else {
            return Ok(None);
        };

        let mut merged = to_object(&existing)?;
        for (key, value) in updates {
            if !PROTECTED_PROFILE_KEYS.contains(&key.as_str()) {
                merged.insert(key, value);
            }
        }

        let mut updated: UserRecord = from_object(merged)?;
        updated.updated_at = now;
        self.put(&updated).await?;
        Ok(Some(updated))
    }

    pub async fn preferences(&self, user_id: &str) -> Result<Value> {
        match self.get(user_id).await? {
            Some(record) => serde_json::to_value(&record.preferences)
                .map_err(|e| ApiError::Internal(e.to_string())),
            None => Ok(Value::Object(Map::new())),
        }
    }

    /// Shallow merge into the stored preferences. `false` when the user has
    /// no record.
    pub async fn update_preferences(
        &self,
        user_id: &str,
        patch: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(mut record) = self.get(user_id).await? else {
            return Ok(false);
        };

        let mut merged = to_object(&record.preferences)?;
        merged.extend(patch);
        record.preferences = from_object(merged)?;
        record.updated_at = now;
        self.put(&record).await?;
        Ok(true)
    }

    pub async fn locations(&self, user_id: &str) -> Result<Vec<SavedLocation>> {
        Ok(self
            .get(user_id)
            .await?
            .map(|record| record.preferences.saved_locations)
            .unwrap_or_default())
    }

    pub async fn add_location(
        &self,
        user_id: &str,
        mut fields: Map<String, Value>,
        now: DateTime<Utc>,
    ) -> Result<Option<SavedLocation>> {
        let Some(mut record) = self.get(user_id).await? else {
            return Ok(None);
        };

        // Server-assigned keys win over client-supplied ones.
        fields.remove("id");
        fields.remove("createdAt");
        let location = SavedLocation {
            id: crypto::new_id(),
            created_at: now,
            fields,
        };
        record.preferences.saved_locations.push(location.clone());
        record.updated_at = now;
        self.put(&record).await?;
        Ok(Some(location))
    }

    /// `Some(true)` when a location was removed, `None` when the user has no
    /// record.
    pub async fn delete_location(
        &self,
        user_id: &str,
        location_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<bool>> {
        let Some(mut record) = self.get(user_id).await? else {
            return Ok(None);
        };

        let before = record.preferences.saved_locations.len();
        record
            .preferences
            .saved_locations
            .retain(|loc| loc.id != location_id);
        if record.preferences.saved_locations.len() == before {
            return Ok(Some(false));
        }

        record.updated_at = now;
        self.put(&record).await?;
        Ok(Some(true))
    }

    pub async fn connect_account(
        &self,
        user_id: &str,
        provider: Provider,
        account: ConnectedAccount,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(mut record) = self.get(user_id).await? else {
            return Ok(false);
        };

        match provider {
            Provider::Uber => record.connected_accounts.uber = account,
            Provider::Ola => record.connected_accounts.ola = account,
        }
        record.updated_at = now;
        self.put(&record).await?;
        Ok(true)
    }

    pub async fn provider_token(&self, user_id: &str, provider: Provider) -> Result<String> {
        let record = self.get(user_id).await?;
        let account = record.as_ref().map(|r| match provider {
            Provider::Uber => &r.connected_accounts.uber,
            Provider::Ola => &r.connected_accounts.ola,
        });

        account
            .and_then(|a| a.token())
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::Unauthorized(format!("{} account not connected", provider.display_name()))
            })
    }
}

fn to_object<T: serde::Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::Internal("Expected a JSON object".into())),
        Err(e) => Err(ApiError::Internal(e.to_string())),
    }
}

fn from_object<T: serde::de::DeserializeOwned>(map: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(map))
        .map_err(|e| ApiError::BadRequest(format!("Invalid update: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStorage;
    use serde_json::json;

    fn identity() -> GoogleIdentity {
        GoogleIdentity {
            sub: "u1".into(),
            email: "rider@example.com".into(),
            name: "Rider".into(),
            picture: None,
            aud: "client".into(),
        }
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_upsert_keeps_preferences() {
        let store = MemoryStorage::new();
        let repo = UserRepository::new(&store);
        let now = Utc::now();

        let created = repo.upsert_from_identity(&identity(), now).await.unwrap();
        assert_eq!(created.preferences.default_transport_modes, vec!["metro", "bus"]);

        repo.update_preferences("u1", object(json!({ "defaultTransportModes": ["train"] })), now)
            .await
            .unwrap();

        let mut renamed = identity();
        renamed.name = "Renamed".into();
        let again = repo.upsert_from_identity(&renamed, now).await.unwrap();
        assert_eq!(again.name, "Renamed");
        assert_eq!(again.preferences.default_transport_modes, vec!["train"]);
        assert_eq!(again.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_profile_update_ignores_protected_keys() {
        let store = MemoryStorage::new();
        let repo = UserRepository::new(&store);
        repo.upsert_from_identity(&identity(), Utc::now()).await.unwrap();

        let updated = repo
            .update_profile(
                "u1",
                object(json!({
                    "name": "New Name",
                    "homeStation": "Andheri",
                    "id": "attacker",
                    "connectedAccounts": { "uber": { "connected": true, "accessToken": "x" } }
                })),
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.id, "u1");
        assert_eq!(updated.name, "New Name");
        assert_eq!(updated.extra["homeStation"], "Andheri");
        assert!(!updated.connected_accounts.uber.connected);
    }

    #[tokio::test]
    async fn test_profile_update_missing_user() {
        let store = MemoryStorage::new();
        let repo = UserRepository::new(&store);
        let result = repo
            .update_profile("ghost", Map::new(), Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_invalid_profile_value_rejected() {
        let store = MemoryStorage::new();
        let repo = UserRepository::new(&store);
        repo.upsert_from_identity(&identity(), Utc::now()).await.unwrap();

        let result = repo
            .update_profile("u1", object(json!({ "name": 12 })), Utc::now())
            .await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_location_lifecycle() {
        let store = MemoryStorage::new();
        let repo = UserRepository::new(&store);
        repo.upsert_from_identity(&identity(), Utc::now()).await.unwrap();

        let home = repo
            .add_location("u1", object(json!({ "name": "Home", "id": "client-id" })), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(home.id, "client-id");
        assert_eq!(home.fields["name"], "Home");

        repo.add_location("u1", object(json!({ "name": "Work" })), Utc::now())
            .await
            .unwrap();
        assert_eq!(repo.locations("u1").await.unwrap().len(), 2);

        let removed = repo.delete_location("u1", &home.id, Utc::now()).await.unwrap();
        assert_eq!(removed, Some(true));
        let removed = repo.delete_location("u1", &home.id, Utc::now()).await.unwrap();
        assert_eq!(removed, Some(false));
        let removed = repo.delete_location("nobody", &home.id, Utc::now()).await.unwrap();
        assert_eq!(removed, None);

        let remaining = repo.locations("u1").await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].fields["name"], "Work");
    }

    #[tokio::test]
    async fn test_provider_token_requires_connection() {
        let store = MemoryStorage::new();
        let repo = UserRepository::new(&store);
        repo.upsert_from_identity(&identity(), Utc::now()).await.unwrap();

        assert!(matches!(
            repo.provider_token("u1", Provider::Uber).await,
            Err(ApiError::Unauthorized(_))
        ));

        let account = ConnectedAccount {
            connected: true,
            access_token: Some("uber-token".into()),
            ..Default::default()
        };
        assert!(repo
            .connect_account("u1", Provider::Uber, account, Utc::now())
            .await
            .unwrap());
        assert_eq!(
            repo.provider_token("u1", Provider::Uber).await.unwrap(),
            "uber-token"
        );
        assert!(repo.provider_token("u1", Provider::Ola).await.is_err());
    }
}
