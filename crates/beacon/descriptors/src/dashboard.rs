//! Dashboards: named, ordered collections of widgets.

use crate::alarm::AlarmDescriptor;
use crate::metric::MetricDescriptor;
use crate::widget::WidgetDescriptor;
use std::sync::Arc;

/// Ordered collection of widgets under a unique name.
///
/// Never mutated in place: a topology change is expressed by building a new
/// dashboard from the updated metric and alarm descriptors.
#[derive(Clone, Debug)]
pub struct DashboardDescriptor {
    name: Arc<str>,
    widgets: Arc<Vec<WidgetDescriptor>>,
}

impl DashboardDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            name: name.into(),
            widgets: Arc::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn widgets(&self) -> &[WidgetDescriptor] {
        &self.widgets
    }

    pub fn with_widget(&self, widget: WidgetDescriptor) -> Self {
        self.with_widgets([widget])
    }

    pub fn with_widgets(&self, widgets: impl IntoIterator<Item = WidgetDescriptor>) -> Self {
        let mut all = (*self.widgets).clone();
        all.extend(widgets);
        Self {
            widgets: Arc::new(all),
            ..self.clone()
        }
    }

    /// Every metric referenced by any widget, in widget order.
    pub fn metrics(&self) -> impl Iterator<Item = &MetricDescriptor> {
        self.widgets.iter().flat_map(|w| w.metrics().iter())
    }

    /// Every alarm annotated on any widget, in widget order.
    pub fn alarms(&self) -> impl Iterator<Item = &AlarmDescriptor> {
        self.widgets
            .iter()
            .flat_map(|w| w.annotations().iter().map(|a| a.alarm()))
    }
}
