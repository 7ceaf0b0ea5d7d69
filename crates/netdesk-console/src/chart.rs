//! Chart view models updated in place
//!
//! A chart is created once, with empty series, when its page is built.
//! Updates rewrite `labels` and each series' `data` and bump the revision;
//! the chart itself is never replaced.

use serde::Serialize;
use std::fmt;

/// Chart flavour
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChartKind {
    /// Time series
    Line,
    /// Category comparison
    Bar,
    /// Share of a whole
    Doughnut,
    /// Ring showing one value between `min` and `max`
    Gauge {
        /// Lower bound
        min: f64,
        /// Upper bound
        max: f64,
    },
}

/// One data series
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    /// Legend label
    pub label: String,
    /// Values, aligned with the chart labels
    pub data: Vec<f64>,
}

/// Chart state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    kind: ChartKind,
    title: String,
    labels: Vec<String>,
    series: Vec<Series>,
    history: usize,
    revision: u64,
}

impl Chart {
    fn with_kind(kind: ChartKind, title: &str, series: &[&str]) -> Self {
        Self {
            kind,
            title: title.to_string(),
            labels: Vec::new(),
            series: series
                .iter()
                .map(|label| Series {
                    label: (*label).to_string(),
                    data: Vec::new(),
                })
                .collect(),
            history: 20,
            revision: 0,
        }
    }

    /// Line chart with the given series
    #[must_use]
    pub fn line(title: &str, series: &[&str]) -> Self {
        Self::with_kind(ChartKind::Line, title, series)
    }

    /// Bar chart with the given series
    #[must_use]
    pub fn bar(title: &str, series: &[&str]) -> Self {
        Self::with_kind(ChartKind::Bar, title, series)
    }

    /// Doughnut chart with a single series
    #[must_use]
    pub fn doughnut(title: &str) -> Self {
        Self::with_kind(ChartKind::Doughnut, title, &[title])
    }

    /// Gauge between `min` and `max`
    #[must_use]
    pub fn gauge(title: &str, min: f64, max: f64) -> Self {
        let mut chart = Self::with_kind(ChartKind::Gauge { min, max }, title, &[title]);
        chart.labels = vec!["value".to_string(), "remaining".to_string()];
        chart
    }

    /// Points kept by [`Chart::push_point`]
    #[must_use]
    pub const fn with_history(mut self, points: usize) -> Self {
        self.history = if points == 0 { 1 } else { points };
        self
    }

    /// Chart flavour
    #[must_use]
    pub const fn kind(&self) -> ChartKind {
        self.kind
    }

    /// Title
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// X-axis or slice labels
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Series in creation order
    #[must_use]
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    /// Number of redraws requested so far
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Request a redraw
    pub const fn update(&mut self) {
        self.revision += 1;
    }

    /// Replace labels and data; series without new data are emptied
    pub fn set_data<L, S>(&mut self, labels: L, data: &[Vec<f64>])
    where
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels.clear();
        self.labels.extend(labels.into_iter().map(Into::into));
        for (i, series) in self.series.iter_mut().enumerate() {
            series.data.clear();
            if let Some(values) = data.get(i) {
                series.data.extend_from_slice(values);
            }
        }
        self.update();
    }

    /// Append one point per series, dropping the oldest beyond the history
    pub fn push_point(&mut self, label: impl Into<String>, values: &[f64]) {
        self.labels.push(label.into());
        for (i, series) in self.series.iter_mut().enumerate() {
            series.data.push(values.get(i).copied().unwrap_or(0.0));
        }

        let excess = self.labels.len().saturating_sub(self.history);
        if excess > 0 {
            self.labels.drain(..excess);
            for series in &mut self.series {
                let drop = excess.min(series.data.len());
                series.data.drain(..drop);
            }
        }
        self.update();
    }

    /// Set the gauge value; other kinds get a single-point series
    pub fn set_value(&mut self, value: f64) {
        let data = match self.kind {
            ChartKind::Gauge { min, max } => {
                let clamped = value.clamp(min.min(max), max.max(min));
                vec![clamped - min, max - clamped]
            }
            _ => vec![value],
        };
        if let Some(series) = self.series.first_mut() {
            series.data = data;
        }
        self.update();
    }

    /// Gauge fill in `[0, 1]`: `(value - min) / (max - min)`
    #[must_use]
    pub fn readout(&self) -> Option<f64> {
        let ChartKind::Gauge { min, max } = self.kind else {
            return None;
        };
        let filled = *self.series.first()?.data.first()?;
        let span = max - min;
        if span <= 0.0 {
            return Some(0.0);
        }
        Some((filled / span).clamp(0.0, 1.0))
    }

    /// Centred gauge text, e.g. `75%`
    #[must_use]
    pub fn readout_text(&self) -> Option<String> {
        self.readout()
            .map(|fraction| format!("{:.0}%", fraction * 100.0))
    }
}

impl fmt::Display for Chart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(text) = self.readout_text() {
            return write!(f, "{}: {text}", self.title);
        }

        writeln!(f, "{}", self.title)?;
        for (i, label) in self.labels.iter().enumerate() {
            let values: Vec<String> = self
                .series
                .iter()
                .map(|series| {
                    series
                        .data
                        .get(i)
                        .map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
                })
                .collect();
            writeln!(f, "  {label}: {}", values.join(" / "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_set_data_updates_in_place() {
        let mut chart = Chart::bar("Top consumers", &["Download", "Upload"]);
        assert!(chart.series()[0].data.is_empty());

        chart.set_data(["budi", "sari"], &[vec![10.0, 5.0], vec![1.0, 2.0]]);
        chart.set_data(["andi"], &[vec![7.0]]);

        assert_eq!(chart.labels(), ["andi"]);
        assert_eq!(chart.series()[0].data, vec![7.0]);
        assert!(chart.series()[1].data.is_empty());
        assert_eq!(chart.revision(), 2);
    }

    #[test]
    fn test_push_point_keeps_bounded_history() {
        let mut chart = Chart::line("Traffic", &["Rx", "Tx"]).with_history(3);
        for i in 0..5 {
            chart.push_point(format!("t{i}"), &[f64::from(i), f64::from(i) * 2.0]);
        }

        assert_eq!(chart.labels(), ["t2", "t3", "t4"]);
        assert_eq!(chart.series()[0].data, vec![2.0, 3.0, 4.0]);
        assert_eq!(chart.series()[1].data, vec![4.0, 6.0, 8.0]);
    }

    #[rstest]
    #[case(0.0, 100.0, 75.0, "75%")]
    #[case(0.0, 100.0, 140.0, "100%")]
    #[case(0.0, 100.0, -3.0, "0%")]
    #[case(20.0, 120.0, 70.0, "50%")]
    #[case(5.0, 5.0, 5.0, "0%")]
    fn test_gauge_readout(
        #[case] min: f64,
        #[case] max: f64,
        #[case] value: f64,
        #[case] expected: &str,
    ) {
        let mut gauge = Chart::gauge("CPU", min, max);
        gauge.set_value(value);

        assert_eq!(gauge.readout_text().as_deref(), Some(expected));
        assert_eq!(gauge.to_string(), format!("CPU: {expected}"));
    }

    #[test]
    fn test_readout_only_for_gauges() {
        let mut chart = Chart::doughnut("Response types");
        chart.set_value(3.0);
        assert!(chart.readout().is_none());
    }
}
