use axum::serve;
use clap::Parser;
use hostcheck::collectors::build_sources;
use hostcheck::config::{Config, ConfigError, Overrides};
use hostcheck::http::{self, HttpAppState};
use hostcheck::metrics::Metrics;
use hostcheck::report::{append_log, ReportFormat, Reporter};
use hostcheck::{run_health_check, Sampler};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use sysinfo::{System, SystemExt};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const EXIT_CONFIG_ERROR: i32 = 2;

#[derive(Parser, Debug)]
#[command(name = "hostcheck")]
#[command(version)]
#[command(about = "Samples CPU, memory and disk usage and reports Healthy/Unhealthy")]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_enum)]
    format: Option<ReportFormat>,
    /// Default ceiling in percent for metrics without an override.
    #[arg(long)]
    threshold: Option<f64>,
    /// Mount point to check; repeat for several. Replaces the configured list.
    #[arg(long = "mount")]
    mounts: Vec<String>,
    #[arg(long)]
    log_file: Option<PathBuf>,
    /// Serve /healthz, /api/verdict and /metrics instead of a one-shot check.
    #[arg(long)]
    serve: bool,
    #[arg(long)]
    print_default_config: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let cfg = match load_config(&cli) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "не удалось загрузить конфигурацию");
            process::exit(EXIT_CONFIG_ERROR);
        }
    };

    let sources = build_sources(&cfg.sampling);
    let sampler = match Sampler::new(sources, cfg.sampling.source_timeout()) {
        Ok(sampler) => sampler,
        Err(err) => {
            error!(error = %err, "не удалось собрать список источников");
            process::exit(EXIT_CONFIG_ERROR);
        }
    };
    info!(
        metrics = ?sampler.metric_names(),
        timeout_ms = cfg.sampling.source_timeout_ms,
        "источники метрик готовы"
    );

    if cli.serve {
        serve_http(cfg, sampler).await;
        return;
    }

    let code = check_once(&cfg, &sampler).await;
    process::exit(code);
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<Config, ConfigError> {
    let mut cfg = match &cli.config {
        Some(path) => Config::load_from_file(path)?,
        None => Config::default(),
    };
    cfg.apply_overrides(Overrides {
        format: cli.format,
        threshold: cli.threshold,
        mounts: cli.mounts.clone(),
        log_file: cli.log_file.clone(),
    });
    cfg.validate()?;
    Ok(cfg)
}

async fn check_once(cfg: &Config, sampler: &Sampler) -> i32 {
    let verdict = match run_health_check(&cfg.thresholds, sampler).await {
        Ok(verdict) => verdict,
        Err(err) => {
            error!(error = %err, "некорректная политика порогов");
            return EXIT_CONFIG_ERROR;
        }
    };

    let reporter = Reporter::new(cfg.report.format, System::new().host_name());
    match reporter.render(&verdict) {
        Ok(text) => println!("{text}"),
        Err(err) => error!(error = %err, "не удалось сформировать отчёт"),
    }

    if let Some(path) = &cfg.report.log_file {
        if let Err(err) = append_log(path, &verdict) {
            error!(error = %err, "не удалось дописать лог");
        }
    }

    verdict.overall.exit_code()
}

async fn serve_http(cfg: Config, sampler: Sampler) {
    let metrics = match Metrics::new() {
        Ok(m) => m,
        Err(err) => {
            error!(error = %err, "не удалось инициализировать метрики");
            process::exit(1);
        }
    };
    let addr: SocketAddr = match cfg.listen.parse() {
        Ok(addr) => addr,
        Err(err) => {
            error!(error = %err, listen = %cfg.listen, "некорректный адрес listen");
            process::exit(EXIT_CONFIG_ERROR);
        }
    };
    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(err) => {
            error!(error = %err, "не удалось запустить HTTP-сервер");
            process::exit(1);
        }
    };

    let app = http::build_router(HttpAppState::new(
        metrics,
        Arc::new(sampler),
        cfg.thresholds.clone(),
    ));
    info!(listen = %addr, "запуск hostcheck в режиме HTTP");

    let server = serve(listener, app).with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "не удалось дождаться Ctrl+C");
        }
        info!("получен Ctrl+C, выполняется остановка");
    });
    if let Err(err) = server.await {
        error!(error = %err, "ошибка HTTP-сервера");
    }
}
