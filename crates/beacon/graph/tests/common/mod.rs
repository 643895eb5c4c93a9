#![allow(dead_code)]

use beacon_deferred::Deferred;
use beacon_descriptors::{
    AlarmDescriptor, AlarmPolicy, Annotation, ComparisonDirection, DashboardDescriptor,
    MetricDescriptor, PhysicalId, ResourceKind, ResourceRef, WidgetDescriptor,
};
use beacon_graph::{CompositionGraph, GraphBuilder};

/// The declarations of one deployment of the mentionbot stack.
pub struct Mentionbot {
    pub function: ResourceRef,
    pub duration: MetricDescriptor,
    pub too_long: AlarmDescriptor,
    pub dashboard: DashboardDescriptor,
}

impl Mentionbot {
    pub fn declare(identifier: Deferred<PhysicalId>) -> Self {
        let function = ResourceRef::new("fn-events", ResourceKind::Function, identifier);
        let duration = MetricDescriptor::new("AWS/Lambda", "Duration", vec![function.clone()])
            .unwrap()
            .with_period(300)
            .unwrap();
        let too_long = duration
            .create_alarm(
                "TooLong",
                AlarmPolicy::new(5.0, 3, ComparisonDirection::GreaterThan),
            )
            .unwrap();
        let dashboard = DashboardDescriptor::new("mentionbot").with_widget(
            WidgetDescriptor::line_graph("fn-events duration")
                .with_metric(&duration)
                .with_annotation(Annotation::new(&too_long)),
        );
        Self {
            function,
            duration,
            too_long,
            dashboard,
        }
    }

    pub fn resolved(id: &str) -> Self {
        Self::declare(Deferred::resolved(PhysicalId::new(id)))
    }

    pub fn graph(&self) -> CompositionGraph {
        let mut builder = GraphBuilder::new();
        builder.add_resource(&self.function).unwrap();
        builder.add_metric(&self.duration).unwrap();
        builder.add_alarm(&self.too_long).unwrap();
        builder.add_dashboard(&self.dashboard).unwrap();
        builder.build().unwrap()
    }
}

pub fn queue(name: &str, id: &str) -> ResourceRef {
    ResourceRef::new(
        name,
        ResourceKind::Queue,
        Deferred::resolved(PhysicalId::new(id)),
    )
}
