//! Test data builders for creating test objects

use super::fixture_settings;
use scriptfilter::config::{BridgeConfig, FilterOptions, FrameErrorPolicy, TimelineWindow};
use scriptfilter::pipeline::ScriptFilterNode;
use scriptfilter::RhaiInterpreter;

/// Builder for Rhai-backed script filter configurations
pub struct NodeBuilder {
    options: FilterOptions,
    policy: FrameErrorPolicy,
    timeline: TimelineWindow,
}

impl NodeBuilder {
    pub fn new(module: &str) -> Self {
        Self {
            options: FilterOptions::new(module, "filter"),
            policy: FrameErrorPolicy::Log,
            timeline: TimelineWindow::default(),
        }
    }

    pub fn init(mut self, function: &str, args: Option<&str>) -> Self {
        self.options = self.options.with_init(function, args);
        self
    }

    pub fn uninit(mut self, function: &str) -> Self {
        self.options = self.options.with_uninit(function);
        self
    }

    pub fn policy(mut self, policy: FrameErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn timeline(mut self, start: Option<f64>, end: Option<f64>) -> Self {
        self.timeline = TimelineWindow { start, end };
        self
    }

    pub fn config(self) -> BridgeConfig {
        let mut config = BridgeConfig::new(self.options);
        config.engine = fixture_settings();
        config.engine.on_frame_error = self.policy;
        config.timeline = self.timeline;
        config
    }

    pub fn build(self) -> ScriptFilterNode<RhaiInterpreter> {
        ScriptFilterNode::from_config(&self.config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_builder() {
        let config = NodeBuilder::new("mark")
            .init("setup", Some("7"))
            .uninit("teardown")
            .policy(FrameErrorPolicy::Fail)
            .config();

        assert_eq!(config.filter.module, "mark");
        assert_eq!(config.filter.filter_function, "filter");
        assert_eq!(config.filter.init_args.as_deref(), Some("7"));
        assert_eq!(config.engine.on_frame_error, FrameErrorPolicy::Fail);
        assert_eq!(config.engine.module_paths.len(), 1);
    }
}
