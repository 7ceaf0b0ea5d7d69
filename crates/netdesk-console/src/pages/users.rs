//! Operator accounts page

use super::{Fetched, PageContext, RecordTable, tagged};
use crate::{
    filter::FilterInput,
    forms::UserForm,
    render::{TableLayout, TableView},
};
use netdesk_core::{RecordId, Result, types::User};
use std::future::Future;
use tracing::{info, warn};

/// User table columns
#[derive(Debug, Clone, Copy, Default)]
pub struct UserLayout;

impl TableLayout<User> for UserLayout {
    fn headers(&self) -> Vec<&'static str> {
        vec!["Username", "Name", "E-mail", "Role", "Status"]
    }

    fn cells(&self, item: &User) -> Vec<String> {
        vec![
            item.username.clone(),
            item.full_name.clone().unwrap_or_default(),
            item.email.clone().unwrap_or_default(),
            item.role.clone(),
            if item.is_active { "active" } else { "inactive" }.to_string(),
        ]
    }

    fn actions(&self, item: &User) -> Vec<&'static str> {
        if item.is_active {
            vec!["edit", "deactivate"]
        } else {
            vec!["edit", "activate"]
        }
    }

    fn empty_message(&self) -> &'static str {
        "No users found"
    }
}

/// Operator accounts and the own profile
#[derive(Debug)]
pub struct UsersPage {
    ctx: PageContext,
    users: RecordTable<User, UserLayout>,
}

impl UsersPage {
    /// Page with an empty table
    #[must_use]
    pub fn new(ctx: PageContext) -> Self {
        Self {
            users: RecordTable::new(UserLayout),
            ctx,
        }
    }

    /// Rendered rows
    #[must_use]
    pub const fn table(&self) -> &TableView {
        self.users.view()
    }

    /// Start loading users
    pub fn fetch(&self) -> impl Future<Output = Fetched<Vec<User>>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.users.begin_fetch(), async move { api.list_users().await })
    }

    /// Merge loaded users
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply(&mut self, fetched: Fetched<Vec<User>>) -> Result<bool> {
        self.users.apply(&self.ctx, "users", fetched)
    }

    /// Reload users
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn refresh(&mut self) -> Result<bool> {
        let fetched = self.fetch().await;
        self.apply(fetched)
    }

    /// Filter by search text and active/inactive
    ///
    /// # Errors
    ///
    /// Returns a validation error for bad dates.
    pub fn filter(&mut self, input: &FilterInput) -> Result<()> {
        match self.users.set_filter(input) {
            Ok(()) => Ok(()),
            Err(e) => self.ctx.fail("filter users", e),
        }
    }

    /// Save the logged-in operator's profile
    ///
    /// The stored user object is refreshed with the server's answer.
    ///
    /// # Errors
    ///
    /// Validation errors (such as mismatched passwords) are returned before
    /// any request is made.
    pub async fn save_user(&mut self, form: UserForm) -> Result<User> {
        let update = match form.into_profile_update() {
            Ok(update) => update,
            Err(e) => return self.ctx.fail("save profile", e),
        };
        match self.ctx.api.update_profile(&update).await {
            Ok(user) => {
                if let Err(e) = self.ctx.api.session().set_user(&user) {
                    warn!("Failed to store updated user: {e}");
                }
                info!(id = user.id, "Profile updated");
                self.ctx.notifier.success("Profile updated");
                self.users.upsert(user.clone());
                Ok(user)
            }
            Err(e) => self.ctx.fail("save profile", e),
        }
    }

    /// Enable or disable an account
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn toggle_status(&mut self, id: RecordId) -> Result<User> {
        match self.ctx.api.toggle_user_status(id).await {
            Ok(user) => {
                let state = if user.is_active { "activated" } else { "deactivated" };
                info!(id, state, "User status changed");
                self.ctx
                    .notifier
                    .success(&format!("User {} {state}", user.username));
                self.users.upsert(user.clone());
                Ok(user)
            }
            Err(e) => self.ctx.fail("change user status", e),
        }
    }
}
