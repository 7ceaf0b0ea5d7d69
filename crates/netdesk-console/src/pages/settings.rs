//! Settings page: message templates and integration settings

use super::{Fetched, PageContext, tagged};
use crate::{
    endpoints::SettingsKind,
    generation::RequestGeneration,
    render::{Row, RowAction, TableView},
    templates::{TemplateInput, validate_template_form},
};
use netdesk_core::{Result, types::MessageTemplate};
use serde_json::Value;
use std::{collections::BTreeMap, future::Future};
use tracing::{debug, info};

const TEMPLATE_HEADERS: [&str; 4] = ["Category", "Key", "Variables", "Content"];

/// Longest content preview in the template table
const PREVIEW_CHARS: usize = 40;

fn preview(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

/// Templates and integration settings
#[derive(Debug)]
pub struct SettingsPage {
    ctx: PageContext,
    templates: Vec<MessageTemplate>,
    template_generation: RequestGeneration,
    table: TableView,
    settings: BTreeMap<SettingsKind, Value>,
}

impl SettingsPage {
    /// Page with an empty template table
    #[must_use]
    pub fn new(ctx: PageContext) -> Self {
        let mut page = Self {
            ctx,
            templates: Vec::new(),
            template_generation: RequestGeneration::new(),
            table: TableView::new(),
            settings: BTreeMap::new(),
        };
        page.render();
        page
    }

    /// Loaded templates
    #[must_use]
    pub fn templates(&self) -> &[MessageTemplate] {
        &self.templates
    }

    /// Rendered template table
    #[must_use]
    pub const fn table(&self) -> &TableView {
        &self.table
    }

    /// Loaded settings of one group
    #[must_use]
    pub fn settings(&self, kind: SettingsKind) -> Option<&Value> {
        self.settings.get(&kind)
    }

    /// Start loading templates
    pub fn fetch_templates(
        &self,
    ) -> impl Future<Output = Fetched<Vec<MessageTemplate>>> + Send + 'static {
        let api = self.ctx.api.clone();
        tagged(self.template_generation.begin(), async move {
            api.list_templates().await
        })
    }

    /// Merge loaded templates
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub fn apply_templates(&mut self, fetched: Fetched<Vec<MessageTemplate>>) -> Result<bool> {
        if !self.template_generation.is_current(fetched.generation) {
            debug!("Discarding stale template list");
            return Ok(false);
        }
        match fetched.result {
            Ok(templates) => {
                self.templates = templates;
                self.render();
                Ok(true)
            }
            Err(e) => self.ctx.fail("load templates", e),
        }
    }

    /// Reload templates
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn refresh_templates(&mut self) -> Result<bool> {
        let fetched = self.fetch_templates().await;
        self.apply_templates(fetched)
    }

    /// Validate and save a template
    ///
    /// # Errors
    ///
    /// Missing fields and undefined `{{variables}}` are rejected before any
    /// request is made.
    pub async fn save_template(&mut self, input: &TemplateInput) -> Result<MessageTemplate> {
        let template = match validate_template_form(input) {
            Ok(template) => template,
            Err(e) => return self.ctx.fail("save template", e),
        };
        if let Err(e) = self.ctx.api.save_template(&template).await {
            return self.ctx.fail("save template", e);
        }

        info!(category = %template.category, key = %template.key, "Template saved");
        self.ctx.notifier.success("Template saved");
        match self
            .templates
            .iter_mut()
            .find(|t| t.category == template.category && t.key == template.key)
        {
            Some(existing) => *existing = template.clone(),
            None => self.templates.push(template.clone()),
        }
        self.render();
        Ok(template)
    }

    /// Delete a template
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it; the list is unchanged.
    pub async fn delete_template(&mut self, category: &str, key: &str) -> Result<()> {
        if let Err(e) = self.ctx.api.delete_template(category, key).await {
            return self.ctx.fail("delete template", e);
        }
        info!(category, key, "Template deleted");
        self.ctx.notifier.success("Template deleted");
        self.templates
            .retain(|t| !(t.category == category && t.key == key));
        self.render();
        Ok(())
    }

    /// Load one settings group
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn load_settings(&mut self, kind: SettingsKind) -> Result<Value> {
        match self.ctx.api.get_settings(kind).await {
            Ok(settings) => {
                self.settings.insert(kind, settings.clone());
                Ok(settings)
            }
            Err(e) => self.ctx.fail("load settings", e),
        }
    }

    /// Save one settings group
    ///
    /// # Errors
    ///
    /// Returns the request error after reporting it.
    pub async fn save_settings(&mut self, kind: SettingsKind, settings: Value) -> Result<()> {
        match self.ctx.api.save_settings(kind, &settings).await {
            Ok(_) => {
                info!(group = kind.segment(), "Settings saved");
                self.ctx.notifier.success("Settings saved");
                self.settings.insert(kind, settings);
                Ok(())
            }
            Err(e) => self.ctx.fail("save settings", e),
        }
    }

    fn render(&mut self) {
        let rows = self.templates.iter().zip(0..).map(|(template, id)| Row {
            id,
            cells: vec![
                template.category.clone(),
                template.key.clone(),
                template.variables.join(", "),
                preview(&template.content),
            ],
            actions: ["edit", "delete"]
                .into_iter()
                .map(|name| RowAction {
                    name: name.to_string(),
                    record_id: id,
                })
                .collect(),
        });
        self.table
            .fill(&TEMPLATE_HEADERS, "No templates defined", rows);
    }
}
