//! Username directory.
//!
//! The Bot API cannot resolve `@username` to a user id, so the dispatcher
//! records the username of every sender it sees. Entries live in the
//! `usernames` store namespace, keyed by lower-cased username.

use std::sync::Arc;

use gavel_core::{Message, Store, StoreResult, User, UserId};
use serde_json::Value;

const NAMESPACE: &str = "usernames";

/// Username to user id lookups backed by a [`Store`].
#[derive(Clone)]
pub struct UserDirectory {
    store: Arc<dyn Store>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Records `user` if they have a username. A write only happens when the
    /// mapping changed.
    pub async fn record(&self, user: &User) -> StoreResult<()> {
        let Some(username) = user.username.as_deref() else {
            return Ok(());
        };
        let key = username.to_lowercase();
        let id = Value::from(user.id);
        if self.store.get(NAMESPACE, &key).await?.as_ref() == Some(&id) {
            return Ok(());
        }
        self.store.put(NAMESPACE, &key, id).await
    }

    /// Records the sender of `message` and of the message it replies to.
    pub async fn record_message(&self, message: &Message) -> StoreResult<()> {
        if let Some(user) = &message.from {
            self.record(user).await?;
        }
        if let Some(user) = message.reply_to.as_ref().and_then(|reply| reply.from.as_ref()) {
            self.record(user).await?;
        }
        Ok(())
    }

    /// Looks up a username, with or without the leading `@`.
    pub async fn resolve(&self, username: &str) -> StoreResult<Option<UserId>> {
        let key = username.trim_start_matches('@').to_lowercase();
        if key.is_empty() {
            return Ok(None);
        }
        Ok(self
            .store
            .get(NAMESPACE, &key)
            .await?
            .and_then(|value| value.as_i64()))
    }

    /// Removes every username pointing at `user_id`. Returns how many were
    /// removed.
    pub async fn forget(&self, user_id: UserId) -> StoreResult<usize> {
        let mut removed = 0;
        for key in self.store.keys(NAMESPACE).await? {
            let points_here = self
                .store
                .get(NAMESPACE, &key)
                .await?
                .and_then(|value| value.as_i64())
                == Some(user_id);
            if points_here && self.store.delete(NAMESPACE, &key).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Number of known usernames.
    pub async fn len(&self) -> StoreResult<usize> {
        Ok(self.store.keys(NAMESPACE).await?.len())
    }
}

impl std::fmt::Debug for UserDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserDirectory").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use gavel_core::{ChatKind, MemoryStore};

    use super::*;

    fn directory() -> UserDirectory {
        UserDirectory::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_record_and_resolve_ignore_case_and_at_sign() {
        let users = directory();
        users
            .record(&User::new(7, "Alice").with_username("Alice_W"))
            .await
            .unwrap();
        users.record(&User::new(8, "NoHandle")).await.unwrap();

        assert_eq!(users.resolve("@alice_w").await.unwrap(), Some(7));
        assert_eq!(users.resolve("ALICE_W").await.unwrap(), Some(7));
        assert_eq!(users.resolve("@bob").await.unwrap(), None);
        assert_eq!(users.resolve("@").await.unwrap(), None);
        assert_eq!(users.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_username_moves_to_new_owner() {
        let users = directory();
        users.record(&User::new(7, "a").with_username("handle")).await.unwrap();
        users.record(&User::new(9, "b").with_username("handle")).await.unwrap();
        assert_eq!(users.resolve("handle").await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn test_record_message_and_forget() {
        let users = directory();
        let chat = gavel_core::Chat::new(-1, ChatKind::Group);
        let earlier = Message::text(1, chat.clone(), Some(User::new(7, "a").with_username("old")), "x");
        let mut message = Message::text(2, chat, Some(User::new(8, "b").with_username("bee")), "y");
        message.reply_to = Some(Box::new(earlier));
        users.record_message(&message).await.unwrap();
        users.record(&User::new(7, "a").with_username("new")).await.unwrap();

        assert_eq!(users.resolve("bee").await.unwrap(), Some(8));
        assert_eq!(users.forget(7).await.unwrap(), 2);
        assert_eq!(users.resolve("old").await.unwrap(), None);
        assert_eq!(users.resolve("bee").await.unwrap(), Some(8));
    }
}
