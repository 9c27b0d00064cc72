use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser;
use tracing::{info, warn};

use licwatch::cli::{Args, MainArgs, USAGE};
use licwatch::clock::{Clock, FixedClock, SystemClock};
use licwatch::config::MonitorConfig;
use licwatch::errors::{LicenseError, LicenseResult};
use licwatch::evaluator::{concerning_features, get_license_status, EvaluationRules, LicenseStatus};
use licwatch::logging::init_logging;
use licwatch::portal::{get_server_licenses, PortalSession};
use licwatch::report::{render_report, send_report_email, DeliveryReport, SmtpMailer};

#[tokio::main]
async fn main() -> ExitCode {
    // Every license is evaluated against this one instant.
    let clock = FixedClock::capture(&SystemClock);

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            e.exit()
        }
        Err(e) => {
            eprintln!("{e}");
            println!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let main_args = match args.main_args() {
        Ok(main_args) => main_args,
        Err(_) => {
            println!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let config = match MonitorConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(args.log_level(&config.logging.level)) {
        eprintln!("Error: {e}");
        return ExitCode::FAILURE;
    }

    let status = match run(&args, &main_args, &config, &clock).await {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let expiring = concerning_features(&status);
    if expiring.is_empty() {
        println!("All Licenses Ok!");
        ExitCode::SUCCESS
    } else {
        println!("Features expiring soon or expired:");
        for name in expiring {
            println!("  - {name}");
        }
        // Non-success exit fails the calling build.
        ExitCode::FAILURE
    }
}

async fn run(
    args: &Args,
    main_args: &MainArgs,
    config: &MonitorConfig,
    clock: &impl Clock,
) -> LicenseResult<LicenseStatus> {
    let session = PortalSession::connect(
        &main_args.url,
        &main_args.username,
        &main_args.password,
        &config.gis,
    )
    .await?;

    let licenses = get_server_licenses(&session).await?;
    if licenses.is_none() && config.report.require_hosting_server {
        return Err(LicenseError::NoHostingServer);
    }

    let status = get_license_status(
        licenses.as_ref(),
        clock.now(),
        EvaluationRules::try_from(&config.report)?,
    )?;
    info!(features = status.len(), "License status evaluated");

    if args.dry_run {
        print!("{}", render_report(&status));
        println!();
        return Ok(status);
    }

    let delivery = mail_report(&status, config).await?;
    if !delivery.all_delivered() {
        for failure in delivery.failures() {
            warn!(recipient = %failure.recipient, outcome = ?failure.outcome, "Recipient missed the report");
        }
    }

    Ok(status)
}

/// The SMTP session is blocking, so it runs off the async workers.
async fn mail_report(status: &LicenseStatus, config: &MonitorConfig) -> LicenseResult<DeliveryReport> {
    let status = status.clone();
    let smtp = config.smtp.clone();
    let report = config.report.clone();

    tokio::task::spawn_blocking(move || -> LicenseResult<DeliveryReport> {
        let mailer = SmtpMailer::connect(&smtp)?;
        Ok(send_report_email(&status, &report, smtp.sender(), mailer))
    })
    .await
    .map_err(|e| LicenseError::MailError(format!("mail task failed: {e}")))?
}
