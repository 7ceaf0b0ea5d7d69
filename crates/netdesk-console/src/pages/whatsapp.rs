//! WhatsApp bot page: connection control, chat monitor and bot settings

use super::PageContext;
use crate::{
    endpoints::SettingsKind,
    realtime::RealtimeListener,
    socket::{SocketEvent, SocketHandle},
    whatsapp::{ChatPanel, ConnectionState, ConnectionWidget},
};
use netdesk_core::Result;
use serde_json::Value;

/// WhatsApp page
#[derive(Debug)]
pub struct WhatsAppPage {
    ctx: PageContext,
    connection: ConnectionWidget,
    chat: ChatPanel,
}

impl WhatsAppPage {
    /// Page bound to the WhatsApp namespace connection
    #[must_use]
    pub fn new(ctx: PageContext, socket: SocketHandle) -> Self {
        Self {
            ctx,
            connection: ConnectionWidget::new(socket),
            chat: ChatPanel::default(),
        }
    }

    /// Connection widget
    #[must_use]
    pub const fn connection(&self) -> &ConnectionWidget {
        &self.connection
    }

    /// Current connection state
    #[must_use]
    pub const fn state(&self) -> &ConnectionState {
        self.connection.state()
    }

    /// Chat monitor
    #[must_use]
    pub const fn chat(&self) -> &ChatPanel {
        &self.chat
    }

    /// Ask for a session
    ///
    /// # Errors
    ///
    /// Rejected while connecting or active; reported as a toast.
    pub fn start(&mut self) -> Result<()> {
        match self.connection.start() {
            Ok(()) => Ok(()),
            Err(e) => self.ctx.fail("start WhatsApp", e),
        }
    }

    /// Ask for a fresh QR code
    ///
    /// # Errors
    ///
    /// Rejected unless a QR code is shown; reported as a toast.
    pub fn refresh_qr(&mut self) -> Result<()> {
        match self.connection.refresh_qr() {
            Ok(()) => Ok(()),
            Err(e) => self.ctx.fail("refresh QR code", e),
        }
    }

    /// Log the bot out
    ///
    /// # Errors
    ///
    /// Rejected while disconnected; reported as a toast.
    pub fn stop(&mut self) -> Result<()> {
        match self.connection.stop() {
            Ok(()) => Ok(()),
            Err(e) => self.ctx.fail("stop WhatsApp", e),
        }
    }

    /// Wipe the stored session
    pub fn delete_session(&self) {
        self.connection.delete_session();
        self.ctx.notifier.success("WhatsApp session deletion requested");
    }

    /// Load the bot settings
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn load_settings(&self) -> Result<Value> {
        match self.ctx.api.get_settings(SettingsKind::WhatsApp).await {
            Ok(settings) => Ok(settings),
            Err(e) => self.ctx.fail("load WhatsApp settings", e),
        }
    }

    /// Store the bot settings and push them to the running bot
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it; nothing is pushed then.
    pub async fn save_settings(&self, settings: Value) -> Result<()> {
        match self
            .ctx
            .api
            .save_settings(SettingsKind::WhatsApp, &settings)
            .await
        {
            Ok(_) => {
                self.connection.update_settings(settings);
                self.ctx.notifier.success("WhatsApp settings saved");
                Ok(())
            }
            Err(e) => self.ctx.fail("save WhatsApp settings", e),
        }
    }
}

impl RealtimeListener for WhatsAppPage {
    fn handles(&self, name: &str) -> bool {
        self.connection.handles(name) || self.chat.handles(name)
    }

    fn on_event(&mut self, event: &SocketEvent) -> Result<()> {
        if self.connection.handles(&event.name) {
            self.connection.on_event(event)?;
            if event.name == "whatsapp:ready"
                && let ConnectionState::Active { phone } = self.connection.state()
            {
                self.ctx
                    .notifier
                    .success(&format!("WhatsApp connected as {phone}"));
            }
            return Ok(());
        }
        self.chat.on_event(event)
    }
}
