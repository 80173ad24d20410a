//! Main application orchestration and execution

use crate::{
    cli::Cli,
    client::{ClientConfig, DelayEndpoint, HttpDelayClient},
    config::{display_config_summary, load_config, validate_config},
    error::{AppError, Result},
    executor::Orchestrator,
    heartbeat::{HeartbeatChannel, HeartbeatConfig, LogEntry, MSG_UNEXPECTED_CLOSE},
    logging::{ChannelLogger, LoggerFactory, RunLogger},
    models::{Config, TestSummary},
    output::{JsonEvent, OutputFormatter, OutputFormatterFactory, ResultRow},
    stats::LatencyStats,
    types::{ChannelState, ChannelStatus},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// Runs below this success rate make the process exit non-zero
const MIN_SUCCESS_RATE_PERCENT: f64 = 50.0;

/// What the binary was asked to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Burst,
    Heartbeat,
}

/// Main application struct that coordinates all components
pub struct App {
    config: Config,
    mode: Mode,
    formatter: Box<dyn OutputFormatter>,
    loggers: LoggerFactory,
}

impl App {
    /// Load configuration from CLI arguments, `.env` and the environment
    pub fn new(cli: Cli) -> Result<Self> {
        let mode = if cli.heartbeat { Mode::Heartbeat } else { Mode::Burst };
        let mut config = load_config(cli.clone())?;
        config.enable_color = cli.use_colors(config.enable_color) && !config.json_output;
        Ok(Self::with_config(config, mode))
    }

    /// Build from an already resolved configuration
    pub fn with_config(config: Config, mode: Mode) -> Self {
        let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);
        let loggers = LoggerFactory::new(config.clone());
        Self {
            config,
            mode,
            formatter,
            loggers,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Run the application
    pub async fn run(&self) -> Result<()> {
        if self.config.debug {
            eprintln!("{} v{}", crate::PKG_NAME, crate::build_info());
            eprintln!("{}", display_config_summary(&self.config));
        }

        match self.mode {
            Mode::Burst => {
                let summary = self.run_burst().await?;
                if summary.success_rate_percent < MIN_SUCCESS_RATE_PERCENT {
                    return Err(AppError::test_execution(format!(
                        "Only {}/{} requests succeeded",
                        summary.success_count, summary.request_count
                    )));
                }
                Ok(())
            }
            Mode::Heartbeat => self.run_heartbeat().await,
        }
    }

    /// Fire one burst and print results as they land
    pub async fn run_burst(&self) -> Result<TestSummary> {
        self.print_warnings()?;

        let client = HttpDelayClient::with_config(ClientConfig::from(&self.config))?;
        let target = client.describe();
        let logger = if self.config.json_output {
            RunLogger::quiet()
        } else {
            self.loggers.create_run_logger().await
        };
        let orchestrator = Orchestrator::with_logger(Arc::new(client), logger);

        let test_config = self.config.test_config();
        let mut run = orchestrator
            .run(test_config)
            .await?
            .ok_or_else(|| AppError::test_execution("A burst is already in progress"))?;

        if self.config.json_output {
            let event = JsonEvent::RunStarted {
                run_id: run.run_id(),
                config: &test_config,
                preset: test_config.to_query_string(),
            };
            println!("{}", event.to_line()?);
        } else {
            println!("{}", self.formatter.format_banner(&test_config)?);
            if self.config.verbose {
                println!("Target: {}", target);
            }
        }

        let mut results = Vec::new();
        while let Some(result) = run.next_result().await {
            let row = ResultRow::from(&result);
            if self.config.json_output {
                println!("{}", JsonEvent::Row(&row).to_line()?);
            } else {
                println!("{}", self.formatter.format_result(&row)?);
            }
            results.push(result);
        }

        let summary = run.summary().await?;
        let latency = LatencyStats::from_results(&results);

        if self.config.json_output {
            let event = JsonEvent::Summary {
                summary: &summary,
                latency: latency.as_ref(),
            };
            println!("{}", event.to_line()?);
        } else {
            println!("{}", self.formatter.format_summary(&summary)?);
            if let Some(ref latency) = latency {
                println!("{}", self.formatter.format_latency_stats(latency)?);
            }
            println!("{}", self.formatter.format_preset(&test_config.to_query_string())?);
        }

        Ok(summary)
    }

    /// Keep the heartbeat channel open until the duration elapses, the peer
    /// goes away, or Ctrl-C
    pub async fn run_heartbeat(&self) -> Result<()> {
        let heartbeat_config = HeartbeatConfig::from_config(&self.config)?;
        let logger = if self.config.json_output {
            ChannelLogger::quiet()
        } else {
            self.loggers.create_channel_logger().await
        };
        let channel = HeartbeatChannel::with_logger(heartbeat_config, logger);

        let mut entries = channel.subscribe();
        let mut states = channel.watch_state();
        channel.start().await?;

        if !self.config.json_output {
            println!("Heartbeat channel to {} (Ctrl-C to stop)", channel.url());
        }

        let deadline = self.config.heartbeat_duration_seconds.map(Duration::from_secs);
        let expired = async move {
            match deadline {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        loop {
            tokio::select! {
                _ = &mut expired => break,
                _ = tokio::signal::ctrl_c() => break,
                entry = entries.recv() => match entry {
                    Ok(entry) => self.print_entry(&entry)?,
                    Err(RecvError::Lagged(skipped)) => {
                        eprintln!("{}", self.formatter.format_warning(&format!("{} log entries skipped", skipped))?);
                    }
                    Err(RecvError::Closed) => break,
                },
                changed = states.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let state = *states.borrow_and_update();
                    self.print_state(state, &channel.status())?;
                    if state == ChannelState::Closed && !channel.has_session() {
                        break;
                    }
                }
            }
        }

        channel.stop().await?;
        while let Ok(entry) = entries.try_recv() {
            self.print_entry(&entry)?;
        }

        match channel.status() {
            ChannelStatus::Error(reason) if reason.starts_with(MSG_UNEXPECTED_CLOSE) => {
                Err(AppError::unexpected_close(reason))
            }
            ChannelStatus::Error(reason) => Err(AppError::transport(reason)),
            _ => Ok(()),
        }
    }

    fn print_warnings(&self) -> Result<()> {
        for warning in validate_config(&self.config)? {
            eprintln!("{}", warning.format(self.config.enable_color));
        }
        Ok(())
    }

    fn print_entry(&self, entry: &LogEntry) -> Result<()> {
        if self.config.json_output {
            println!("{}", JsonEvent::Heartbeat(entry).to_line()?);
        } else {
            println!("{}", self.formatter.format_log_entry(entry)?);
        }
        Ok(())
    }

    fn print_state(&self, state: ChannelState, status: &ChannelStatus) -> Result<()> {
        if self.config.json_output {
            let status = match status {
                ChannelStatus::Idle => "idle".to_string(),
                ChannelStatus::Connected => "connected".to_string(),
                ChannelStatus::Error(reason) => reason.clone(),
            };
            println!("{}", JsonEvent::ChannelState { state, status }.to_line()?);
        } else {
            println!("{}", self.formatter.format_channel_state(state, status)?);
        }
        Ok(())
    }
}
