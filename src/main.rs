//! Serial BER Tester - Main CLI Application
//!
//! Echoes test patterns through a looped-back serial line (or a TCP echo
//! server standing in for one) and reports the measured bit error rate.

use clap::Parser;
use serial_bert::{
    cli::{Cli, RunMode},
    config::{load_config, validate_config},
    error::{AppError, ErrorReporter, Result},
    executor::{TestSession, TrialErrorPolicy, TrialPlan},
    logging::LoggerFactory,
    models::Config,
    output::{OutputCoordinator, OutputFormatterFactory},
    ports::PortRegistry,
    stats::SessionReport,
    transport::{self, TransportPort},
    PKG_NAME, VERSION,
};
use std::io::Write;
use std::process;
use std::time::Duration;

/// Refresh interval of the progress line during a timed run
const PROGRESS_INTERVAL: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        process::exit(99);
    }));

    let cli = Cli::parse();

    if let Err(message) = cli.validate() {
        eprintln!("Error: {}", message);
        process::exit(1);
    }

    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose || cli.debug);

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run_application(cli: Cli) -> Result<()> {
    if cli.debug {
        println!("{} v{}", PKG_NAME, VERSION);
        println!("Build: {} ({}) for {}", env!("GIT_COMMIT"), env!("BUILD_TIME"), env!("TARGET_TRIPLE"));
        println!("Debug mode enabled");
        println!();
    }

    if cli.list_ports {
        return list_ports(&cli);
    }

    let mode = cli.mode;
    let abort_on_error = cli.abort_on_error;
    let check_host = cli.check_host;

    let config = load_config(cli)?;

    if config.verbose || config.debug {
        for warning in validate_config(&config)? {
            eprintln!("{}", warning.format(config.enable_color));
        }
    }

    let factory = LoggerFactory::new(config.clone());

    if check_host {
        return check_remote_host(&config, &factory).await;
    }

    let policy = if abort_on_error { TrialErrorPolicy::Abort } else { TrialErrorPolicy::Skip };
    let result = run_session(&config, &factory, mode, policy).await;

    if let Err(ref e) = result {
        factory.create_error_logger().log_error(e, Some("session"), None).await;
    }
    result
}

/// Print the serial ports the OS knows about
fn list_ports(cli: &Cli) -> Result<()> {
    let registry = PortRegistry::discover()?;
    let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(cli.use_colors(), cli.verbose));
    println!("{}", coordinator.display_port_list(&registry)?);
    Ok(())
}

/// Report whether the echo server accepts connections
async fn check_remote_host(config: &Config, factory: &LoggerFactory) -> Result<()> {
    let (host, port) = match (&config.remote_host, config.remote_port) {
        (Some(host), Some(port)) => (host.clone(), port),
        _ => return Err(AppError::config("--check-host needs both --host and --remote-port")),
    };

    let timeout = config.tcp_timeout();
    let probe_host = host.clone();
    let reachable = tokio::task::spawn_blocking(move || transport::probe_host(&probe_host, port, timeout))
        .await
        .map_err(|e| AppError::internal(format!("Host probe failed: {}", e)))??;

    factory.create_transport_logger().log_probe(&host, port, reachable).await;

    let formatter = OutputFormatterFactory::create_formatter(config.enable_color, config.verbose);
    let target = transport::format_endpoint(&host, port);
    if reachable {
        println!("{}", formatter.format_success(&format!("{} accepts connections", target))?);
        Ok(())
    } else {
        Err(AppError::transport(format!("{} did not accept a connection within {:?}", target, timeout)))
    }
}

/// Open the configured link, drive it in `mode` and print the report
async fn run_session(config: &Config, factory: &LoggerFactory, mode: RunMode, policy: TrialErrorPolicy) -> Result<()> {
    let transport_config = config.transport_config()?;
    let target = transport_config.describe();
    let link_logger = factory.create_transport_logger();

    let port = match transport::open(&transport_config) {
        Ok(port) => {
            link_logger.log_open(&target, true, None).await;
            link_logger.log_endpoints(port.local_address().as_deref(), port.peer_address().as_deref()).await;
            port
        }
        Err(e) => {
            link_logger.log_open(&target, false, Some(&e)).await;
            return Err(e);
        }
    };

    let trial_logger = factory.create_trial_logger().await;
    trial_logger.logger().add_context_field("transport".to_string(), &target).await;

    let plan = TrialPlan::from_config(config);
    let mut session = TestSession::new(transport::shared(port), transport_config.frame_structure())
        .with_pattern(config.pattern)
        .with_error_policy(policy)
        .with_logger(trial_logger);

    let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(config.enable_color, config.verbose));

    let outcome = drive(&mut session, &plan, mode, config, &coordinator, &target).await;

    let closed = transport::close_shared(session.port());
    link_logger.log_close(&target).await;

    let loop_printed = outcome?;
    closed?;

    if loop_printed {
        return Ok(());
    }

    let report = SessionReport::from_session(&session, target, config.desired_ber);
    if config.json {
        println!("{}", coordinator.display_json(&report)?);
    } else {
        println!("{}", coordinator.display_report(&report)?);
    }
    Ok(())
}

/// Run the trials for `mode`. Returns true when the outcome was already
/// printed and no report follows.
async fn drive(
    session: &mut TestSession,
    plan: &TrialPlan,
    mode: RunMode,
    config: &Config,
    coordinator: &OutputCoordinator,
    target: &str,
) -> Result<bool> {
    match mode {
        RunMode::Once => {
            session.run_once(plan.frame_length, plan.data_timeout).await?;
            Ok(false)
        }
        RunMode::Timed => {
            let ticker = if config.json {
                None
            } else {
                let handle = session.progress_handle();
                let formatter = OutputFormatterFactory::create_formatter(config.enable_color, false);
                Some(tokio::spawn(async move {
                    let mut interval = tokio::time::interval(PROGRESS_INTERVAL);
                    loop {
                        interval.tick().await;
                        if handle.is_running() {
                            eprint!("\r{}", formatter.format_progress(handle.progress(), handle.due_time()));
                            let _ = std::io::stderr().flush();
                        }
                    }
                }))
            };

            let result = session
                .run_for(
                    plan.duration,
                    plan.frame_length,
                    plan.data_timeout,
                    Some(plan.min_length),
                    Some(plan.max_length),
                )
                .await;

            if let Some(ticker) = ticker {
                ticker.abort();
                eprintln!();
            }
            result?;
            Ok(false)
        }
        RunMode::Loop => {
            let status = session.loop_check(plan.data_timeout).await?;
            if config.json {
                let value = serde_json::json!({
                    "target": target,
                    "success": status.is_success(),
                    "status": status.describe(),
                });
                println!("{}", value);
            } else {
                println!("{}", coordinator.display_loop_status(status, target)?);
            }
            if status.is_success() {
                Ok(true)
            } else {
                Err(AppError::test_execution(status.describe()))
            }
        }
    }
}
