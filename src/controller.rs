//! Owner of all mutable viewer state and the rendering pass.
//!
//! The [`Controller`] holds the log API client, the [`GeoResolver`] (and with
//! it the single precise-location attempt), the consent flow and the
//! `show_details` toggle. It runs in one task and handles [`Command`]s one at
//! a time, so entries are labeled in display order without any locking.

use crate::api::{build_http_client, LogApi, CLIENT_USER_AGENT};
use crate::config::{Config, DeviceSource};
use crate::consent::{ConsentChoice, ConsentFlow, ConsentStep, ConsentStore};
use crate::events::Event;
use crate::geocode::ReverseGeocoder;
use crate::location::IpGeolocator;
use crate::models::{format_timestamp, GeoLabel, LogEntry};
use crate::precise::{is_trusted_origin, DeviceLocator, ManualLocator, PreciseLocation};
use crate::resolver::GeoResolver;
use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Shown instead of the list when the backend has no entries.
pub const EMPTY_TEXT: &str = "Aucun log.";

/// Requests sent from the UI task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Refresh,
    SendTestLog,
    ClearLogs,
    ToggleDetails,
    CheckHealth,
    Consent(ConsentChoice),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: String,
    pub level: String,
    pub message: String,
    /// `IP: ... | City, Country`, present only while details are shown.
    pub details: Option<String>,
    pub user_agent: Option<String>,
}

/// Output of one rendering pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LogView {
    /// Summary of the newest entry, or "-".
    pub last_log: String,
    pub lines: Vec<LogLine>,
    pub count: usize,
    pub empty_text: Option<&'static str>,
    pub show_details: bool,
}

fn ip_text(entry: &LogEntry) -> &str {
    entry.ip.as_deref().unwrap_or(GeoLabel::UNKNOWN)
}

fn geo_suffix(geo: &GeoLabel) -> String {
    if geo.is_unknown() {
        String::new()
    } else {
        format!(" | {}", geo)
    }
}

pub struct Controller {
    api: LogApi,
    resolver: GeoResolver,
    consent: ConsentFlow,
    show_details: bool,
    poll_interval: Option<Duration>,
}

impl Controller {
    pub fn new(
        api: LogApi,
        resolver: GeoResolver,
        consent: ConsentFlow,
        show_details: bool,
        poll_interval: Option<Duration>,
    ) -> Self {
        Self {
            api,
            resolver,
            consent,
            show_details,
            poll_interval,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_http_client(Duration::from_secs(config.geo.http_timeout_seconds))?;
        let api = LogApi::new(client.clone(), &config.api.base_url)?;

        let locator: Option<Arc<dyn DeviceLocator>> = match config.location.device {
            DeviceSource::None => None,
            DeviceSource::Manual => Some(Arc::new(ManualLocator::new(
                config.location.manual_lat,
                config.location.manual_lon,
            ))),
        };
        let trusted = is_trusted_origin(api.base_url());
        info!(
            "Log API at {} (trusted origin: {}), device location: {:?}",
            api.base_url(),
            trusted,
            config.location.device
        );

        let resolver = GeoResolver::new(
            ReverseGeocoder::new(
                client.clone(),
                &config.geo.reverse_geocode_url,
                &config.geo.language,
            ),
            IpGeolocator::new(client, &config.geo.ip_geolocation_url),
            PreciseLocation::new(locator, trusted),
        );
        let consent = ConsentFlow::new(ConsentStore::new(&config.ui.state_file));
        let poll_interval = match config.api.poll_interval_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self::new(
            api,
            resolver,
            consent,
            config.ui.show_details,
            poll_interval,
        ))
    }

    pub fn consent(&self) -> &ConsentFlow {
        &self.consent
    }

    pub fn resolver(&self) -> &GeoResolver {
        &self.resolver
    }

    /// Startup decision of the consent flow.
    pub async fn boot(&mut self) -> ConsentStep {
        self.consent.start(&mut self.resolver).await
    }

    pub fn on_defer(&mut self) -> ConsentStep {
        self.consent.on_defer(&mut self.resolver)
    }

    pub async fn on_allow(&mut self) -> ConsentStep {
        self.consent.on_allow(&mut self.resolver).await
    }

    pub fn toggle_details(&mut self) -> bool {
        self.show_details = !self.show_details;
        self.show_details
    }

    pub async fn send_test_log(&self) -> Result<()> {
        let message = format!("Test log depuis frontend | UA: {}", CLIENT_USER_AGENT);
        self.api.post_log(&message, "INFO").await
    }

    pub async fn clear_logs(&self) -> Result<()> {
        self.api.clear_logs().await
    }

    /// Fetches the logs and labels them in display order.
    ///
    /// Log API failures are returned to the caller; geolocation failures only
    /// drop the label.
    pub async fn render(&mut self) -> Result<LogView> {
        let logs = self.api.fetch_logs().await?;

        let last_log = match logs.first() {
            Some(newest) => {
                let geo = self.resolver.best_geo_label(newest.ip.as_deref()).await;
                format!(
                    "{} | {}{}",
                    ip_text(newest),
                    format_timestamp(&newest.created_at),
                    geo_suffix(&geo)
                )
            }
            None => "-".to_string(),
        };

        if logs.is_empty() {
            return Ok(LogView {
                last_log,
                lines: Vec::new(),
                count: 0,
                empty_text: Some(EMPTY_TEXT),
                show_details: self.show_details,
            });
        }

        let mut lines = Vec::with_capacity(logs.len());
        for entry in &logs {
            let (message, user_agent) = entry.split_message();
            let details = if self.show_details {
                let geo = self.resolver.best_geo_label(entry.ip.as_deref()).await;
                Some(format!("IP: {}{}", ip_text(entry), geo_suffix(&geo)))
            } else {
                None
            };
            lines.push(LogLine {
                timestamp: format_timestamp(&entry.created_at),
                level: entry.level.clone(),
                message,
                details,
                user_agent,
            });
        }

        debug!("Rendered {} log entries", lines.len());
        Ok(LogView {
            last_log,
            count: lines.len(),
            lines,
            empty_text: None,
            show_details: self.show_details,
        })
    }

    async fn publish_view(&mut self, events: &mpsc::UnboundedSender<Event>) {
        if !self.consent.is_resolved() {
            debug!("Location prompt pending; render deferred");
            return;
        }
        match self.render().await {
            Ok(view) => {
                events.send(Event::LogsUpdated(view)).ok();
            }
            Err(e) => {
                error!("Failed to fetch logs: {}", e);
                events.send(Event::LogsFailed(e.to_string())).ok();
            }
        }
    }

    async fn publish_backend_status(&self, events: &mpsc::UnboundedSender<Event>) {
        let health = self.api.health().await.ok();
        let stats = self.api.stats().await.ok();
        events.send(Event::BackendStatus { health, stats }).ok();
    }

    async fn after_step(&mut self, step: ConsentStep, events: &mpsc::UnboundedSender<Event>) {
        match step {
            ConsentStep::AwaitChoice => {
                events.send(Event::ConsentPrompt).ok();
            }
            ConsentStep::Render => {
                events.send(Event::ConsentClosed).ok();
                self.publish_view(events).await;
            }
            ConsentStep::Ignored => {}
        }
    }

    pub async fn handle(&mut self, command: Command, events: &mpsc::UnboundedSender<Event>) {
        debug!("Handling {:?}", command);
        match command {
            Command::Refresh => self.publish_view(events).await,
            Command::SendTestLog => {
                if let Err(e) = self.send_test_log().await {
                    error!("Failed to send test log: {}", e);
                    events.send(Event::LogsFailed(e.to_string())).ok();
                }
                self.publish_view(events).await;
            }
            Command::ClearLogs => {
                if let Err(e) = self.clear_logs().await {
                    error!("Failed to clear logs: {}", e);
                    events.send(Event::LogsFailed(e.to_string())).ok();
                }
                self.publish_view(events).await;
            }
            Command::ToggleDetails => {
                self.toggle_details();
                self.publish_view(events).await;
            }
            Command::CheckHealth => self.publish_backend_status(events).await,
            Command::Consent(choice) => {
                let step = match choice {
                    ConsentChoice::Later => self.on_defer(),
                    ConsentChoice::Allow => self.on_allow().await,
                };
                self.after_step(step, events).await;
            }
        }
    }

    /// Drives the controller until the command channel closes.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<Event>,
    ) {
        self.publish_backend_status(&events).await;
        let step = self.boot().await;
        self.after_step(step, &events).await;

        let mut poll = self
            .poll_interval
            .map(poll_timer);

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle(command, &events).await,
                    None => break,
                },
                _ = next_poll(&mut poll) => self.publish_view(&events).await,
            }
        }
        info!("Command channel closed; controller stopped");
    }
}

/// Poll timer whose first tick is one period away. Ticks missed during a slow
/// render are not replayed.
fn poll_timer(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_poll(poll: &mut Option<Interval>) {
    match poll {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
