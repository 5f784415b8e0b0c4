//! Tests for agent construction, the run loop and shutdown

use super::*;
use std::time::Duration;

use async_trait::async_trait;
use tally_metric::FieldValue;
use tally_outputs::OutputFactory;
use tally_pipeline::DestinationKey;

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Default)]
struct Capture {
    batches: parking_lot::Mutex<Vec<Vec<Metric>>>,
}

impl Capture {
    fn metrics(&self) -> Vec<Metric> {
        self.batches.lock().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl Output for Capture {
    async fn write(&self, _destination: &DestinationKey, metrics: &[Metric]) -> anyhow::Result<()> {
        self.batches.lock().push(metrics.to_vec());
        Ok(())
    }
}

struct CaptureFactory(Arc<Capture>);

impl OutputFactory for CaptureFactory {
    fn create(&self, _options: &toml::Table) -> tally_outputs::Result<Arc<dyn Output>> {
        Ok(Arc::clone(&self.0) as Arc<dyn Output>)
    }

    fn name(&self) -> &'static str {
        "capture"
    }
}

struct Exploding;

#[async_trait]
impl Output for Exploding {
    async fn write(&self, _destination: &DestinationKey, _metrics: &[Metric]) -> anyhow::Result<()> {
        panic!("sink exploded");
    }
}

struct ExplodingFactory;

impl OutputFactory for ExplodingFactory {
    fn create(&self, _options: &toml::Table) -> tally_outputs::Result<Arc<dyn Output>> {
        Ok(Arc::new(Exploding))
    }

    fn name(&self) -> &'static str {
        "exploding"
    }
}

fn plugins_with_capture() -> (PluginRegistry, Arc<Capture>) {
    let capture = Arc::new(Capture::default());
    let mut plugins = PluginRegistry::with_builtins();
    plugins
        .outputs_mut()
        .register("capture", CaptureFactory(Arc::clone(&capture)));
    (plugins, capture)
}

fn config(toml: &str) -> Config {
    toml.parse().unwrap()
}

const AGENT: &str = r#"
[agent]
interval = "1s"
round_interval = false
metric_batch_size = 5
metric_buffer_limit = 20
flush_interval = "1s"
omit_hostname = true
"#;

// ============================================================================
// Building
// ============================================================================

#[test]
fn test_instance_id() {
    assert_eq!(instance_id(Some("fast"), "cpu", 3), "fast");
    assert_eq!(instance_id(Some(""), "cpu", 3), "cpu-3");
    assert_eq!(instance_id(None, "cpu", 0), "cpu-0");
}

#[test]
fn test_global_tags_and_hostname() {
    let mut cfg = config("[global_tags]\ndc = \"eu\"\n\n[[outputs.discard]]\n");
    cfg.agent.hostname = "web-1".into();
    let tags = resolve_global_tags(&cfg);
    assert_eq!(tags.get("dc").map(String::as_str), Some("eu"));
    assert_eq!(tags.get("host").map(String::as_str), Some("web-1"));

    cfg.global_tags.insert("host".into(), "pinned".into());
    assert_eq!(resolve_global_tags(&cfg).get("host").map(String::as_str), Some("pinned"));

    cfg.global_tags.remove("host");
    cfg.agent.omit_hostname = true;
    assert!(!resolve_global_tags(&cfg).contains_key("host"));
}

#[test]
fn test_failed_blocks_are_skipped() {
    let cfg = config(&format!(
        r#"{AGENT}
[[inputs.constant]]
name = "cpu"
fields = {{ idle = 10 }}

[[inputs.disk]]

[[inputs.file]]
files = ["/tmp/*.lp"]
data_format = "json"

[[processors.rename]]
unknown_option = 1

[[processors.noop]]
alias = "pass"

[[aggregators.count]]
period = "10s"

[[outputs.discard]]
"#
    ));
    let agent = Agent::new(&cfg, &PluginRegistry::with_builtins()).unwrap();

    let skipped: Vec<PluginKind> = agent.skipped().iter().map(|s| s.kind).collect();
    assert_eq!(
        skipped,
        vec![PluginKind::Processor, PluginKind::Input, PluginKind::Input]
    );
    assert!(agent.skipped()[1].message.contains("unknown input 'disk'"));

    assert_eq!(
        agent.plugins(),
        vec![
            PluginInfo {
                kind: PluginKind::Input,
                id: "constant-0".into(),
                plugin: "constant".into(),
            },
            PluginInfo {
                kind: PluginKind::Processor,
                id: "pass".into(),
                plugin: "noop".into(),
            },
            PluginInfo {
                kind: PluginKind::Aggregator,
                id: "count-0".into(),
                plugin: "count".into(),
            },
            PluginInfo {
                kind: PluginKind::Output,
                id: "discard-0".into(),
                plugin: "discard".into(),
            },
        ]
    );
}

#[test]
fn test_processor_copies_are_independent() {
    let cfg = config(
        r#"
[[processors.noop]]
order = 2

[[processors.rename]]
order = 1
replace = [{ field = "idle", dest = "usage_idle" }]

[[outputs.discard]]
"#,
    );
    let agent = Agent::new(&cfg, &PluginRegistry::with_builtins()).unwrap();
    assert_eq!(agent.processors.ids(), vec!["rename-0", "noop-0"]);
    assert_eq!(agent.aggregate_processors.ids(), vec!["rename-0", "noop-0"]);

    let primary = agent.processors.get("rename-0").unwrap() as *const RunningProcessor;
    let copy = agent.aggregate_processors.get("rename-0").unwrap() as *const RunningProcessor;
    assert_ne!(primary, copy);
}

#[test]
fn test_no_buildable_outputs() {
    let cfg = config("[[outputs.kafka]]\n\n[[outputs.file]]\n");
    let err = Agent::new(&cfg, &PluginRegistry::with_builtins()).unwrap_err();
    assert!(matches!(err, AgentError::NoOutputs(2)));
}

#[tokio::test]
async fn test_no_connectable_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("out.lp");
    let cfg = config(&format!(
        "[[outputs.file]]\npath = \"{}\"\n",
        path.display()
    ));
    let agent = Agent::new(&cfg, &PluginRegistry::with_builtins()).unwrap();
    let err = agent.start().await.unwrap_err();
    assert!(matches!(err, AgentError::NoOutputs(1)));
}

// ============================================================================
// Running
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_drains_everything() {
    let (plugins, capture) = plugins_with_capture();
    let cfg = config(&format!(
        r#"{AGENT}
[[inputs.constant]]
name = "cpu"
fields = {{ idle = 10 }}

[[outputs.capture]]
flush_interval = "1h"
metric_batch_size = 100
metric_buffer_limit = 1000
"#
    ));
    let running = Agent::new(&cfg, &plugins).unwrap().start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(7_500)).await;
    assert!(capture.metrics().is_empty());

    running.shutdown().await.unwrap();
    let metrics = capture.metrics();
    assert_eq!(metrics.len(), 7);
    assert!(metrics.iter().all(|m| m.name() == "cpu"));
    assert!(!running.is_running());
    assert!(running.inputs().iter().all(|input| input.is_closed()));

    let totals = running.hub().collect();
    assert_eq!(totals.total_gathered(), 7);
    assert_eq!(totals.total_written(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_double_shutdown_is_noop() {
    let (plugins, capture) = plugins_with_capture();
    let cfg = config(&format!(
        r#"{AGENT}
[[inputs.constant]]
name = "cpu"
fields = {{ idle = 10 }}

[[outputs.capture]]
"#
    ));
    let running = Agent::new(&cfg, &plugins).unwrap().start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2_500)).await;

    running.shutdown().await.unwrap();
    let written = capture.metrics().len();
    running.shutdown().await.unwrap();
    assert_eq!(capture.metrics().len(), written);
}

#[tokio::test(start_paused = true)]
async fn test_aggregated_path() {
    let (plugins, capture) = plugins_with_capture();
    let cfg = config(&format!(
        r#"{AGENT}
[[inputs.constant]]
name = "cpu"
fields = {{ idle = 10 }}

[[processors.override]]
tags = {{ team = "infra" }}

[[aggregators.count]]
period = "10s"
delay = "100ms"
grace = "5s"
drop_original = true

[[outputs.capture]]
"#
    ));
    let running = Agent::new(&cfg, &plugins).unwrap().start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10_500)).await;
    running.shutdown().await.unwrap();

    let metrics = capture.metrics();
    assert_eq!(metrics.len(), 1);
    let count = &metrics[0];
    assert_eq!(count.name(), "cpu");
    assert_eq!(count.tag("team"), Some("infra"));
    assert_eq!(count.field("count"), Some(&FieldValue::from(10u64)));
    assert!(count.field("idle").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_panicking_output_does_not_stop_others() {
    let (mut plugins, capture) = plugins_with_capture();
    plugins.outputs_mut().register("exploding", ExplodingFactory);
    let mut cfg = config(&format!(
        r#"{AGENT}
[[inputs.constant]]
name = "cpu"
fields = {{ idle = 10 }}

[[outputs.exploding]]
metric_batch_size = 1

[[outputs.capture]]
"#
    ));
    // Every exploding flush lands on the only worker
    cfg.agent.flush_workers = 1;
    let running = Agent::new(&cfg, &plugins).unwrap().start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5_500)).await;
    assert!(capture.metrics().len() >= 4, "got {}", capture.metrics().len());

    running.shutdown().await.unwrap();
    assert_eq!(capture.metrics().len(), 5);
    let totals = running.hub().collect();
    assert_eq!(totals.total_gathered(), 5);
}

#[tokio::test]
async fn test_service_input_lifecycle() {
    let (plugins, _capture) = plugins_with_capture();
    let cfg = config(
        r#"
[agent]
omit_hostname = true

[[inputs.udp_listener]]
service_address = "127.0.0.1:0"

[[outputs.capture]]
"#,
    );
    let running = Agent::new(&cfg, &plugins).unwrap().start().await.unwrap();
    assert_eq!(running.inputs().len(), 1);
    assert!(running.inputs()[0].is_service());
    assert!(running.inputs()[0].service_running());

    running.shutdown().await.unwrap();
    assert!(!running.inputs()[0].service_running());
}

#[tokio::test]
async fn test_service_start_failure_skips_input() {
    let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let address = taken.local_addr().unwrap();
    let (plugins, _capture) = plugins_with_capture();
    let cfg = config(&format!(
        r#"
[agent]
omit_hostname = true

[[inputs.udp_listener]]
service_address = "{address}"

[[outputs.capture]]
"#
    ));
    let running = Agent::new(&cfg, &plugins).unwrap().start().await.unwrap();
    assert!(running.inputs().is_empty());
    assert_eq!(running.skipped().len(), 1);
    assert_eq!(running.skipped()[0].kind, PluginKind::Input);
    running.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_per_plugin_routing() {
    let (plugins, capture) = plugins_with_capture();
    let mut cfg = config(&format!(
        r#"{AGENT}
[[inputs.constant]]
alias = "a"
name = "cpu"
fields = {{ idle = 1 }}

[[inputs.constant]]
alias = "b"
name = "cpu"
fields = {{ idle = 2 }}

[[outputs.capture]]
"#
    ));
    cfg.agent.routing = tally_config::RoutingMode::PerPlugin;
    let running = Agent::new(&cfg, &plugins).unwrap().start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1_500)).await;

    let keys: Vec<DestinationKey> = running.outputs()[0]
        .destinations()
        .iter()
        .map(|d| d.key().clone())
        .collect();
    assert_eq!(
        keys,
        vec![
            DestinationKey::new("constant", "a", None),
            DestinationKey::new("constant", "b", None),
        ]
    );

    running.shutdown().await.unwrap();
    assert_eq!(capture.metrics().len(), 2);
}
