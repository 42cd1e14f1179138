//! Account authority logic.

use crate::password::{PasswordHasher, Sha256PasswordHasher, StoredPassword};
use shared_bus::{MarketEvent, Outbox};
use shared_types::entities::{is_valid_email, Role, UserId, UserPatch, UserReplica};
use shared_types::{AccessToken, MarketError, TokenSigner, UserReplicaStore};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::info;

/// The authoritative user record. Only this service ever sees the email,
/// address, or password; replicas elsewhere carry id, name, and role.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub address: String,
    pub role: Role,
    password: StoredPassword,
}

/// The user account authority.
///
/// Holds the full account table plus a user replica store that mirrors
/// what every consumer projects, so session checks here behave exactly
/// like session checks everywhere else.
pub struct AuthenticationService {
    accounts: RwLock<HashMap<UserId, Account>>,
    users: UserReplicaStore,
    signer: TokenSigner,
    hasher: Box<dyn PasswordHasher>,
    outbox: Outbox,
}

impl AuthenticationService {
    #[must_use]
    pub fn new(signer: TokenSigner) -> Self {
        Self::with_hasher(signer, Box::new(Sha256PasswordHasher))
    }

    #[must_use]
    pub fn with_hasher(signer: TokenSigner, hasher: Box<dyn PasswordHasher>) -> Self {
        Self {
            accounts: RwLock::new(HashMap::new()),
            users: UserReplicaStore::new(),
            signer,
            hasher,
            outbox: Outbox::new(),
        }
    }

    /// Events staged by the last operations, awaiting publication.
    #[must_use]
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    #[must_use]
    pub fn account(&self, id: UserId) -> Option<Account> {
        self.read().get(&id).cloned()
    }

    /// Register a new customer or seller account. Admin accounts can only
    /// be created by an existing admin via [`Self::create_admin`].
    pub fn signup(
        &self,
        name: &str,
        email: &str,
        address: &str,
        password: &str,
        role: Role,
    ) -> Result<UserId, MarketError> {
        if role == Role::Admin {
            return Err(MarketError::Unauthorized(
                "admin accounts require an admin principal".into(),
            ));
        }
        let account = self.create_account(name, email, address, password, role)?;
        let id = account.id;
        info!(user = %id, name, ?role, "account created");
        self.outbox.stage(MarketEvent::UserAdded {
            user: UserReplica::new(id, name, role),
        });
        Ok(id)
    }

    /// Create another admin account. Requires an admin session.
    pub fn create_admin(
        &self,
        token: &AccessToken,
        name: &str,
        email: &str,
        address: &str,
        password: &str,
    ) -> Result<UserId, MarketError> {
        self.users
            .authorize(&self.signer.verifier(), token, Some(Role::Admin))?;
        let account = self.create_account(name, email, address, password, Role::Admin)?;
        let id = account.id;
        info!(user = %id, name, "admin account created");
        self.outbox.stage(MarketEvent::AdminAdded {
            token: token.clone(),
            user: UserReplica::new(id, name, Role::Admin),
        });
        Ok(id)
    }

    /// Seed the very first admin directly, bypassing the admin-principal
    /// requirement. Intended for bootstrap only.
    pub fn bootstrap_admin(
        &self,
        name: &str,
        email: &str,
        address: &str,
        password: &str,
    ) -> Result<UserId, MarketError> {
        let already = self.read().values().any(|a| a.role == Role::Admin);
        if already {
            return Err(MarketError::Unauthorized(
                "an admin already exists, use create_admin".into(),
            ));
        }
        let account = self.create_account(name, email, address, password, Role::Admin)?;
        let id = account.id;
        self.outbox.stage(MarketEvent::UserAdded {
            user: UserReplica::new(id, name, Role::Admin),
        });
        Ok(id)
    }

    /// Authenticate by name and password, producing a signed access token.
    /// Multiple concurrent sessions per user are allowed.
    pub fn login(&self, name: &str, password: &str) -> Result<AccessToken, MarketError> {
        let account = self
            .read()
            .values()
            .find(|a| a.name == name)
            .cloned()
            .ok_or_else(|| MarketError::Unauthorized("bad credentials".into()))?;
        if !self.hasher.verify(password, &account.password) {
            return Err(MarketError::Unauthorized("bad credentials".into()));
        }
        let token = self.signer.sign(account.id);
        self.users.record_login(name, &token.encode())?;
        info!(user = %account.id, name, "session opened");
        self.outbox.stage(MarketEvent::UserLoggedIn {
            name: name.to_string(),
            token: token.clone(),
        });
        Ok(token)
    }

    /// Close the session the token identifies.
    pub fn logout(&self, token: &AccessToken) -> Result<(), MarketError> {
        let principal = self
            .users
            .authorize(&self.signer.verifier(), token, None)?;
        self.users.record_logout(principal.id, &token.encode())?;
        info!(user = %principal.id, "session closed");
        self.outbox.stage(MarketEvent::UserLoggedOut {
            token: token.clone(),
        });
        Ok(())
    }

    /// Apply an allow-listed profile patch to the caller's own account.
    ///
    /// The emitted event carries the patch with the password stripped; a
    /// password-only edit stays entirely local.
    pub fn edit_profile(&self, token: &AccessToken, patch: UserPatch) -> Result<(), MarketError> {
        let principal = self
            .users
            .authorize(&self.signer.verifier(), token, None)?;
        patch.validate()?;
        if let Some(email) = &patch.email {
            if !is_valid_email(email) {
                return Err(MarketError::Validation("invalid email".into()));
            }
        }
        {
            let mut accounts = self.write();
            if let Some(name) = &patch.name {
                if accounts.values().any(|a| a.id != principal.id && a.name == *name) {
                    return Err(MarketError::Validation("name already taken".into()));
                }
            }
            if let Some(email) = &patch.email {
                if accounts.values().any(|a| a.id != principal.id && a.email == *email) {
                    return Err(MarketError::Validation("email already taken".into()));
                }
            }
            let account = accounts
                .get_mut(&principal.id)
                .ok_or_else(|| MarketError::NotFound("account not found".into()))?;
            if let Some(name) = &patch.name {
                account.name = name.clone();
            }
            if let Some(email) = &patch.email {
                account.email = email.clone();
            }
            if let Some(address) = &patch.address {
                account.address = address.clone();
            }
            if let Some(password) = &patch.password {
                account.password = self.hasher.hash(password);
            }
        }
        self.users.apply_patch(principal.id, &patch)?;
        let broadcast = patch.without_password();
        if !broadcast.is_empty() {
            self.outbox.stage(MarketEvent::UserEdited {
                token: token.clone(),
                patch: broadcast,
            });
        }
        Ok(())
    }

    /// Delete the caller's own account, ending all its sessions.
    pub fn remove_account(&self, token: &AccessToken) -> Result<(), MarketError> {
        let principal = self
            .users
            .authorize(&self.signer.verifier(), token, None)?;
        self.write().remove(&principal.id);
        self.users.remove(principal.id);
        info!(user = %principal.id, "account removed");
        self.outbox.stage(MarketEvent::UserRemoved {
            token: token.clone(),
        });
        Ok(())
    }

    /// Admin removal of another user by name.
    pub fn admin_remove_user(&self, token: &AccessToken, name: &str) -> Result<(), MarketError> {
        let admin = self
            .users
            .authorize(&self.signer.verifier(), token, Some(Role::Admin))?;
        let target = self
            .users
            .by_name(name)
            .ok_or_else(|| MarketError::NotFound("user not found".into()))?;
        if target.id == admin.id {
            return Err(MarketError::Validation(
                "use remove_account to delete your own account".into(),
            ));
        }
        self.write().remove(&target.id);
        self.users.remove(target.id);
        info!(admin = %admin.id, user = %target.id, name, "account removed by admin");
        self.outbox.stage(MarketEvent::AdminRemovedUser {
            token: token.clone(),
            name: name.to_string(),
        });
        Ok(())
    }

    fn create_account(
        &self,
        name: &str,
        email: &str,
        address: &str,
        password: &str,
        role: Role,
    ) -> Result<Account, MarketError> {
        if name.trim().is_empty() {
            return Err(MarketError::Validation("name must not be empty".into()));
        }
        if !is_valid_email(email) {
            return Err(MarketError::Validation("invalid email".into()));
        }
        if password.is_empty() {
            return Err(MarketError::Validation("password must not be empty".into()));
        }
        let mut accounts = self.write();
        if accounts.values().any(|a| a.name == name) {
            return Err(MarketError::Validation("name already taken".into()));
        }
        if accounts.values().any(|a| a.email == email) {
            return Err(MarketError::Validation("email already taken".into()));
        }
        let account = Account {
            id: uuid::Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            address: address.to_string(),
            role,
            password: self.hasher.hash(password),
        };
        accounts.insert(account.id, account.clone());
        drop(accounts);
        self.users.insert(UserReplica::new(account.id, name, role));
        Ok(account)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<UserId, Account>> {
        self.accounts.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<UserId, Account>> {
        self.accounts.write().unwrap_or_else(|p| p.into_inner())
    }
}
