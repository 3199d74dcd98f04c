//! CLI command implementations

use crate::output::{self, OutputFormat};
use indicatif::{ProgressBar, ProgressStyle};
use multiview_core::{
    CatalogProvider, Dashboard, DashboardConfig, HttpCatalog, LeaderPolicy, PlaybackEngine, SimulatedEngine,
    SimulatedStream, SimulationProfile, StaticCatalog, StreamDescriptor, StreamId,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tracing::info;

/// Print the stream catalog
pub async fn catalog(
    config: &DashboardConfig,
    endpoint: Option<&str>,
    preset: &str,
    format: &str,
) -> anyhow::Result<()> {
    let endpoint = endpoint.or(config.catalog.endpoint.as_deref());

    let streams = match endpoint {
        Some(endpoint) => {
            let timeout = Duration::from_millis(config.catalog.request_timeout_ms);
            HttpCatalog::new(endpoint, timeout)?.fetch().await?
        }
        None => preset_catalog(preset)?.fetch().await?,
    };

    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", output::to_json(&streams)?),
        OutputFormat::Table | OutputFormat::Text => {
            if let Some(endpoint) = endpoint {
                println!("Catalog: {endpoint}");
            } else {
                println!("Catalog preset: {preset}");
            }
            println!("{}", output::catalog_table(&streams));
            println!("{} streams, leader: stream {}", streams.len(), leader_label(config, &streams));
        }
    }

    Ok(())
}

/// Stream id the dashboard would elect, or `-` for an empty catalog
fn leader_label(config: &DashboardConfig, streams: &[StreamDescriptor]) -> String {
    config
        .leader
        .select_leader(streams)
        .map(|index| streams[index].id.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn preset_catalog(name: &str) -> anyhow::Result<StaticCatalog> {
    match name {
        "local" => Ok(StaticCatalog::local()),
        "public" => Ok(StaticCatalog::public_test_streams()),
        other => anyhow::bail!("unknown catalog preset '{other}' (expected local or public)"),
    }
}

/// Options for a simulated run
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub streams: u32,
    /// Simulated seconds to run
    pub duration: f64,
    pub tick: Duration,
    pub drift_stream: Option<StreamId>,
    pub drift_rate: f64,
    pub stall_stream: Option<StreamId>,
    pub unsupported_stream: Option<StreamId>,
    pub report_every: f64,
    pub realtime: bool,
}

impl SimulateOptions {
    fn profile(&self, descriptor: &StreamDescriptor) -> SimulationProfile {
        let mut profile = SimulationProfile::default();
        if self.drift_stream == Some(descriptor.id) {
            profile.rate = self.drift_rate;
        }
        if self.unsupported_stream == Some(descriptor.id) {
            profile.library_support = false;
            profile.native_support = false;
        }
        profile
    }
}

/// Drive the dashboard against simulated live streams
pub async fn simulate(
    config: DashboardConfig,
    options: SimulateOptions,
    format: &str,
) -> anyhow::Result<()> {
    anyhow::ensure!(options.streams > 0, "at least one stream is required");
    anyhow::ensure!(!options.tick.is_zero(), "tick must be positive");

    let format = OutputFormat::from(format);
    let engines: Rc<RefCell<Vec<SimulatedStream>>> = Rc::new(RefCell::new(Vec::new()));

    let registry = Rc::clone(&engines);
    let factory_options = options.clone();
    let factory = move |descriptor: &StreamDescriptor| -> Box<dyn PlaybackEngine> {
        let engine = SimulatedEngine::new(factory_options.profile(descriptor));
        registry.borrow_mut().push(engine.stream());
        Box::new(engine)
    };

    let mut dash = Dashboard::new(config, factory)?;
    let catalog = StaticCatalog::from_urls(
        (1..=options.streams).map(|i| format!("/hls/stream{i}/index.m3u8")),
    );
    let attached = dash.load(&catalog).await?;
    let play = dash.play_all();
    info!(
        attached,
        started = play.succeeded(),
        tolerance = dash.config().sync.tolerance_secs,
        "Simulation started"
    );

    let dt = options.tick.as_secs_f64();
    let ticks = (options.duration / dt).ceil() as u64;
    let report_ticks = ((options.report_every / dt).round() as u64).max(1);
    let stall_at = ticks / 2;

    let progress = (format == OutputFormat::Json || options.realtime).then(|| {
        let bar = ProgressBar::new(ticks);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:30}] {pos}/{len} ticks {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar
    });

    let mut ticker = tokio::time::interval(options.tick);

    for tick in 1..=ticks {
        if options.realtime {
            ticker.tick().await;
        }

        if tick == stall_at {
            if let Some(id) = options.stall_stream {
                if let Some(stream) = stream_by_id(&dash, &engines, id) {
                    info!(stream = id, "Stalling stream");
                    stream.set_stalled(true);
                }
            }
        }

        for stream in engines.borrow().iter() {
            stream.tick(dt);
        }
        dash.drain();

        if let Some(bar) = &progress {
            bar.set_position(tick);
            bar.set_message(format!("leader {:.2}", dash.leader_position()));
        }

        if tick % report_ticks == 0 {
            let snapshot = dash.snapshot();
            match format {
                OutputFormat::Json => {
                    let line = serde_json::to_string(&snapshot)?;
                    match &progress {
                        Some(bar) => bar.println(line),
                        None => println!("{line}"),
                    }
                }
                OutputFormat::Table | OutputFormat::Text => {
                    let text = output::snapshot_text(&snapshot, tick as f64 * dt);
                    match &progress {
                        Some(bar) => bar.println(text),
                        None => println!("{text}\n"),
                    }
                }
            }
        }
    }

    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    let snapshot = dash.snapshot();
    match format {
        OutputFormat::Json => println!("{}", output::to_json(&snapshot)?),
        OutputFormat::Table | OutputFormat::Text => println!("{}", output::summary_text(&snapshot)),
    }

    dash.pause_all();
    dash.unmount();
    Ok(())
}

/// Engine handle of the mounted stream with catalog id `id`
fn stream_by_id(
    dash: &Dashboard,
    engines: &Rc<RefCell<Vec<SimulatedStream>>>,
    id: StreamId,
) -> Option<SimulatedStream> {
    let index = dash.sessions().iter().position(|s| s.descriptor().id == id)?;
    engines.borrow().get(index).cloned()
}

/// Print the effective configuration as JSON
pub fn show_config(config: &DashboardConfig) -> anyhow::Result<()> {
    config.validate()?;
    println!("{}", output::to_json(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use multiview_core::LeaderChoice;

    fn options() -> SimulateOptions {
        SimulateOptions {
            streams: 6,
            duration: 10.0,
            tick: Duration::from_millis(250),
            drift_stream: Some(3),
            drift_rate: 0.5,
            stall_stream: None,
            unsupported_stream: Some(5),
            report_every: 5.0,
            realtime: false,
        }
    }

    #[test]
    fn test_simulation_profiles() {
        let opts = options();
        let drifting = opts.profile(&StreamDescriptor::new(3, "/hls/stream3/index.m3u8"));
        assert_eq!(drifting.rate, 0.5);

        let unsupported = opts.profile(&StreamDescriptor::new(5, "/hls/stream5/index.m3u8"));
        assert!(!unsupported.library_support);
        assert!(!unsupported.native_support);

        let normal = opts.profile(&StreamDescriptor::new(1, "/hls/stream1/index.m3u8"));
        assert_eq!(normal, SimulationProfile::default());
    }

    #[test]
    fn test_preset_catalog() {
        assert_eq!(preset_catalog("local").unwrap().streams().len(), 6);
        assert_eq!(preset_catalog("public").unwrap().streams().len(), 6);
        assert!(preset_catalog("other").is_err());
    }

    #[test]
    fn test_leader_label_follows_config() {
        let streams = StaticCatalog::local().streams().to_vec();
        let mut config = DashboardConfig::default();
        assert_eq!(leader_label(&config, &streams), "1");

        config.leader = LeaderChoice::StreamId(4);
        assert_eq!(leader_label(&config, &streams), "4");

        config.leader = LeaderChoice::Index(2);
        assert_eq!(leader_label(&config, &streams), "3");

        assert_eq!(leader_label(&config, &[]), "-");
    }

    #[tokio::test]
    async fn test_simulate_runs() {
        simulate(DashboardConfig::default(), options(), "json").await.unwrap();
    }
}
