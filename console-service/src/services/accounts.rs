//! Registry of upstream-platform accounts, stored as one KV record.

use crate::models::Account;
use crate::services::error::ServiceError;
use console_core::kv::KvStore;
use console_core::utils::generate_account_id;
use std::sync::Arc;

const ACCOUNTS_KEY: &str = "console:accounts";

#[derive(Clone)]
pub struct AccountStore {
    kv: Arc<dyn KvStore>,
}

impl AccountStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Read errors degrade to an empty list so the console still
    /// renders; writes propagate because losing an edit is not ok.
    pub async fn list(&self) -> Vec<Account> {
        match console_core::kv::get_json(self.kv.as_ref(), ACCOUNTS_KEY).await {
            Ok(Some(accounts)) => accounts,
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read account registry");
                Vec::new()
            }
        }
    }

    async fn save(&self, accounts: &[Account]) -> Result<(), ServiceError> {
        let payload = serde_json::to_string(accounts)
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))?;
        self.kv
            .put(ACCOUNTS_KEY, &payload, None)
            .await
            .map_err(|e| ServiceError::Internal(anyhow::Error::new(e)))
    }

    /// Accounts are addressable by id or by case-insensitive name.
    pub async fn find(&self, name_or_id: &str) -> Option<Account> {
        self.list().await.into_iter().find(|account| {
            account.id == name_or_id || account.name.eq_ignore_ascii_case(name_or_id)
        })
    }

    pub async fn require(&self, name_or_id: &str) -> Result<Account, ServiceError> {
        self.find(name_or_id)
            .await
            .ok_or_else(|| ServiceError::AccountNotFound(name_or_id.to_string()))
    }

    pub async fn add(
        &self,
        name: &str,
        api_key: &str,
        owner_id: Option<String>,
        owner_email: Option<String>,
    ) -> Result<Account, ServiceError> {
        let mut accounts = self.list().await;
        if accounts
            .iter()
            .any(|a| a.name.eq_ignore_ascii_case(name))
        {
            return Err(ServiceError::DuplicateAccountName(name.to_string()));
        }

        let account = Account {
            id: generate_account_id(),
            name: name.to_string(),
            api_key: api_key.to_string(),
            owner_id,
            owner_email,
            created_at: chrono::Utc::now().timestamp_millis(),
        };
        accounts.push(account.clone());
        self.save(&accounts).await?;
        Ok(account)
    }

    pub async fn update(
        &self,
        account_id: &str,
        name: Option<&str>,
        api_key: Option<&str>,
        owner_id: Option<String>,
        owner_email: Option<String>,
    ) -> Result<Account, ServiceError> {
        let mut accounts = self.list().await;

        if let Some(new_name) = name {
            if accounts
                .iter()
                .any(|a| a.id != account_id && a.name.eq_ignore_ascii_case(new_name))
            {
                return Err(ServiceError::DuplicateAccountName(new_name.to_string()));
            }
        }

        let account = accounts
            .iter_mut()
            .find(|a| a.id == account_id)
            .ok_or_else(|| ServiceError::AccountNotFound(account_id.to_string()))?;

        if let Some(name) = name {
            account.name = name.to_string();
        }
        if let Some(api_key) = api_key {
            account.api_key = api_key.to_string();
        }
        if owner_id.is_some() {
            account.owner_id = owner_id;
        }
        if owner_email.is_some() {
            account.owner_email = owner_email;
        }

        let updated = account.clone();
        self.save(&accounts).await?;
        Ok(updated)
    }

    pub async fn remove(&self, account_id: &str) -> Result<Account, ServiceError> {
        let mut accounts = self.list().await;
        let position = accounts
            .iter()
            .position(|a| a.id == account_id)
            .ok_or_else(|| ServiceError::AccountNotFound(account_id.to_string()))?;
        let removed = accounts.remove(position);
        self.save(&accounts).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use console_core::kv::MemoryKv;

    fn store() -> AccountStore {
        AccountStore::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn add_find_remove_round_trip() {
        let store = store();
        let added = store
            .add("Main", "rnd_abcdefghijklmnop", Some("own-1".into()), None)
            .await
            .unwrap();
        assert!(added.id.starts_with("acc_"));

        // Lookup by id and by case-insensitive name.
        assert!(store.find(&added.id).await.is_some());
        assert!(store.find("main").await.is_some());

        store.remove(&added.id).await.unwrap();
        assert!(store.find(&added.id).await.is_none());
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let store = store();
        store
            .add("Main", "rnd_abcdefghijklmnop", None, None)
            .await
            .unwrap();
        let err = store
            .add("MAIN", "rnd_qrstuvwxyz012345", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateAccountName(_)));
    }

    #[tokio::test]
    async fn update_changes_only_provided_fields() {
        let store = store();
        let account = store
            .add("Main", "rnd_abcdefghijklmnop", Some("own-1".into()), None)
            .await
            .unwrap();

        let updated = store
            .update(&account.id, Some("Renamed"), None, None, None)
            .await
            .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.api_key, account.api_key);
        assert_eq!(updated.owner_id.as_deref(), Some("own-1"));
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let store = store();
        assert!(matches!(
            store.require("nope").await.unwrap_err(),
            ServiceError::AccountNotFound(_)
        ));
    }
}
