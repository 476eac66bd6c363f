use std::str::FromStr;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Commands, TargetArgs};
use bot_probe::config::HarnessConfig;
use bot_probe::suite::Suite;
use bot_probe::traffic::BehaviorProfile;

fn print_banner(config: &HarnessConfig) {
    println!("\n{}", "=".repeat(60));
    println!("          BOT PROTECTION VERIFICATION HARNESS");
    println!("{}", "=".repeat(60));
    println!("[>] Target: {}", config.target);
    if let Some(zap) = &config.scanner.url {
        println!("[>] Scanner: {}", zap);
    }
    println!("\n{}\n", "-".repeat(60));
}

pub async fn run_from_cli(cli: Cli) -> anyhow::Result<()> {
    // Keep reqwest/hyper at INFO so --debug shows our requests, not connection pool chatter.
    use tracing_subscriber::EnvFilter;
    let crate_level = if cli.debug { "debug" } else if cli.verbose { "info" } else { "warn" };
    let filter_str = format!("bot_probe={crate},reqwest=info,hyper=info,h2=info", crate = crate_level);
    let env_filter = EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new(crate_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(true)
        .with_target(false)
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n[!] Interrupted, finishing current step...");
            on_signal.cancel();
        }
    });

    match cli.command {
        Commands::Run { target, workers, burst, session_mode, zap, active, proxy, no_ingest } => {
            let mut config = resolve_config(&target)?;
            if let Some(w) = workers {
                config.pool_workers = w;
            }
            if let Some(n) = burst {
                config.burst_size = n;
            }
            if let Some(mode) = session_mode {
                config.session_mode = mode;
            }
            if zap.is_some() {
                config.scanner.url = zap;
            }
            config.scanner.run_active |= active;
            config.scanner.proxy_target |= proxy;
            if no_ingest {
                config.ingest = false;
            }
            config.validate()?;

            tracing::info!(target_url = %config.target, workers = config.pool_workers, burst = config.burst_size, "starting verification run");
            print_banner(&config);
            let show_progress = !cli.debug;
            Suite::new(config, cancel)?.with_progress(show_progress).run_all().await?;
        }
        Commands::Profile { name, target } => {
            let profile = BehaviorProfile::from_str(&name)?;
            let config = resolve_config(&target)?;
            run_single_profile(config, profile, cancel).await?;
        }
        Commands::Scan { target, zap, active } => {
            let mut config = resolve_config(&target)?;
            if zap.is_some() {
                config.scanner.url = zap;
            }
            config.scanner.run_active |= active;
            config.ingest = false;
            config.validate()?;
            if config.scanner.url.is_none() {
                anyhow::bail!("no scanner configured; pass --zap or set scanner.url in the config file");
            }
            print_banner(&config);
            let mut suite = Suite::new(config, cancel)?.with_progress(!cli.debug);
            suite.run_scanner().await;
            suite.finish().await?;
        }
    }
    Ok(())
}

/// Defaults, then the config file, then environment, then flags.
fn resolve_config(args: &TargetArgs) -> anyhow::Result<HarnessConfig> {
    let mut config = HarnessConfig::load(args.config.as_deref())?;
    if let Some(t) = &args.target {
        config.target = t.trim_end_matches('/').to_string();
    }
    if let Some(out) = &args.out {
        config.out_dir = out.clone();
    }
    if let Some(secs) = args.timeout {
        config.request_timeout_secs = secs;
    }
    config.validate()?;
    Ok(config)
}

async fn run_single_profile(config: HarnessConfig, profile: BehaviorProfile, cancel: CancellationToken) -> anyhow::Result<()> {
    let mut suite = Suite::new(config, cancel)?;
    suite.check_liveness().await?;

    println!("[*] Running profile {}\n", profile);
    let verdicts = suite.run_profile(profile).await;
    for v in &verdicts {
        let mark = if v.passed { "[+]" } else { "[!]" };
        println!(
            "    {} {:<45} {:>3}  {:.3}s  {}",
            mark,
            bot_probe::utils::truncate(&v.outcome.spec.name, 42),
            v.outcome.status,
            v.outcome.latency_secs,
            v.note
        );
    }
    Ok(())
}
