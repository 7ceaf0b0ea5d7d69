//! Table view models
//!
//! A [`TableView`] is the container a store renders into. Rendering always
//! starts from an empty table, and the row actions are rebuilt together with
//! the rows.

use netdesk_core::{Filterable, RecordId};
use serde::Serialize;
use std::fmt;

/// Action offered on one row, bound to the record it was rendered from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowAction {
    /// Action name (`view`, `edit`, `pay`, ...)
    pub name: String,
    /// Record the action applies to
    pub record_id: RecordId,
}

/// One rendered row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    /// Record the row was rendered from
    pub id: RecordId,
    /// Cell texts, one per header
    pub cells: Vec<String>,
    /// Actions attached during this render
    pub actions: Vec<RowAction>,
}

/// How records of one type become rows
pub trait TableLayout<T: Filterable> {
    /// Column headers
    fn headers(&self) -> Vec<&'static str>;

    /// Cell texts for a record, one per header
    fn cells(&self, item: &T) -> Vec<String>;

    /// Row action names for a record
    fn actions(&self, _item: &T) -> Vec<&'static str> {
        Vec::new()
    }

    /// Text shown when there are no rows
    fn empty_message(&self) -> &'static str {
        "No data found"
    }

    /// Render one record
    fn row(&self, item: &T) -> Row {
        let id = item.id();
        Row {
            id,
            cells: self.cells(item),
            actions: self
                .actions(item)
                .into_iter()
                .map(|name| RowAction {
                    name: name.to_string(),
                    record_id: id,
                })
                .collect(),
        }
    }
}

/// Rendered table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableView {
    /// Column headers
    pub headers: Vec<String>,
    /// Rows of the current page
    pub rows: Vec<Row>,
    /// Shown instead of rows when empty
    pub empty_message: String,
    /// Number of renders so far
    pub renders: u64,
}

impl TableView {
    /// Empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole content with `items`
    pub fn rebuild<'a, T, L>(&mut self, layout: &L, items: impl IntoIterator<Item = &'a T>)
    where
        T: Filterable + 'a,
        L: TableLayout<T> + ?Sized,
    {
        self.fill(
            &layout.headers(),
            layout.empty_message(),
            items.into_iter().map(|item| layout.row(item)),
        );
    }

    /// Replace the whole content with prepared rows
    pub fn fill(
        &mut self,
        headers: &[&str],
        empty_message: &str,
        rows: impl IntoIterator<Item = Row>,
    ) {
        self.rows.clear();
        self.headers = headers.iter().map(|h| (*h).to_string()).collect();
        self.empty_message = empty_message.to_string();
        self.rows.extend(rows);
        self.renders += 1;
    }

    /// Number of rows
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up an action attached to a row
    #[must_use]
    pub fn action(&self, record_id: RecordId, name: &str) -> Option<&RowAction> {
        self.rows
            .iter()
            .find(|row| row.id == record_id)
            .and_then(|row| row.actions.iter().find(|action| action.name == name))
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.cells.iter().enumerate() {
                let len = cell.chars().count();
                match widths.get_mut(i) {
                    Some(width) => *width = (*width).max(len),
                    None => widths.push(len),
                }
            }
        }
        widths
    }
}

impl fmt::Display for TableView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        let line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            for (i, width) in widths.iter().enumerate() {
                let cell = cells.get(i).map_or("", String::as_str);
                if i > 0 {
                    f.write_str("  ")?;
                }
                write!(f, "{cell:<width$}")?;
            }
            writeln!(f)
        };

        line(f, &self.headers)?;
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        line(f, &rule)?;

        if self.rows.is_empty() {
            return writeln!(f, "{}", self.empty_message);
        }
        for row in &self.rows {
            line(f, &row.cells)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netdesk_core::types::Device;
    use pretty_assertions::assert_eq;

    struct DeviceLayout;

    impl TableLayout<Device> for DeviceLayout {
        fn headers(&self) -> Vec<&'static str> {
            vec!["Name", "Status"]
        }

        fn cells(&self, item: &Device) -> Vec<String> {
            vec![item.name.clone(), item.status.clone()]
        }

        fn actions(&self, _item: &Device) -> Vec<&'static str> {
            vec!["ping"]
        }
    }

    fn device(id: i64, name: &str, status: &str) -> Device {
        Device {
            id,
            name: name.to_string(),
            ip_address: None,
            device_type: None,
            status: status.to_string(),
            last_seen: None,
        }
    }

    #[test]
    fn test_rebuild_replaces_rows_and_actions() {
        let devices = vec![device(1, "core-router", "online"), device(2, "ap-01", "offline")];
        let mut table = TableView::new();

        table.rebuild(&DeviceLayout, &devices);
        table.rebuild(&DeviceLayout, devices.iter().skip(1));

        assert_eq!(table.len(), 1);
        assert_eq!(table.renders, 2);
        assert!(table.action(1, "ping").is_none());
        assert_eq!(table.action(2, "ping").unwrap().record_id, 2);
    }

    #[test]
    fn test_display_aligns_columns() {
        let mut table = TableView::new();
        table.rebuild(&DeviceLayout, &[device(1, "core-router", "online")]);

        assert_eq!(
            table.to_string(),
            "Name         Status\n-----------  ------\ncore-router  online\n"
        );
    }

    #[test]
    fn test_display_empty_message() {
        let mut table = TableView::new();
        table.rebuild(&DeviceLayout, &Vec::<Device>::new());

        assert!(table.to_string().ends_with("No data found\n"));
    }
}
