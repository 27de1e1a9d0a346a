//! Точка входа `tdx-client`.
//!
//! Жизненный цикл:
//! - парсинг CLI и список серверов (`--server` или `connect.cfg`)
//! - подключение к первому ответившему серверу (рукопожатие внутри)
//! - один запрос и печать ответа в JSON, либо `watch` до `Ctrl+C`
//! - закрытие сессии

mod cli;

use std::sync::{Arc, atomic::AtomicBool, atomic::Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::Parser;
use log::{info, warn};
use serde::Serialize;
use serde_json::json;

use tdx_client::{SessionConfig, SessionError, TdxHq};
use tdx_core::codes::parse_codes_csv;
use tdx_core::{SeqGen, TdxCodec};

use crate::cli::Command;

fn main() -> anyhow::Result<()> {
    // Логи через RUST_LOG=info/debug/trace
    env_logger::init();

    let args = cli::Args::parse();
    args.validate()?;
    let endpoints = args.endpoints()?;

    let codec = TdxCodec::with_defaults(Arc::new(SeqGen::new()))?;
    let config = SessionConfig::new("", Arc::new(codec))
        .with_reconnect(!args.no_reconnect)
        .with_connect_timeout(Duration::from_secs(args.timeout));

    let hq = connect_any(&endpoints, config)?;
    let result = run(&hq, &args.command);
    hq.close();
    result
}

/// Серверы пробуются по порядку до первого успешного рукопожатия
fn connect_any(endpoints: &[String], config: SessionConfig) -> anyhow::Result<TdxHq> {
    let mut last = None;
    for addr in endpoints {
        match TdxHq::connect(1, config.clone().with_addr(addr.as_str())) {
            Ok(hq) => {
                info!("connected to {addr}");
                return Ok(hq);
            }
            Err(e) => {
                warn!("{addr}: {e}");
                last = Some(e);
            }
        }
    }

    match last {
        Some(e) => Err(e).context("no server reachable"),
        None => bail!("no servers to connect to"),
    }
}

fn run(hq: &TdxHq, cmd: &Command) -> anyhow::Result<()> {
    match cmd {
        Command::Count { market } => print_json(&json!({
            "market": market,
            "count": hq.security_count(*market)?,
        })),
        Command::List { market, start } => print_json(&hq.security_list(*market, *start)?),
        Command::Quotes { codes } => print_json(&hq.security_quotes(&parse_codes_csv(codes)?)?),
        Command::Bars {
            code,
            period,
            start,
            count,
        } => print_json(&hq.index_bars(code, (*period).into(), *start, *count)?),
        Command::Minutes { code, date } => match date {
            Some(d) => print_json(&hq.history_minute_time_data(code, *d)?),
            None => print_json(&hq.minute_time_data(code)?),
        },
        Command::Ticks {
            code,
            date,
            start,
            count,
        } => match date {
            Some(d) => print_json(&hq.history_transaction_data(code, *d, *start, *count)?),
            None => print_json(&hq.transaction_data(code, *start, *count)?),
        },
        Command::Finance { code } => print_json(&hq.finance_info(code)?),
        Command::Xdxr { code } => print_json(&hq.xdxr_info(code)?),
        Command::Company {
            code,
            file: None,
            ..
        } => print_json(&hq.company_info_category(code)?),
        Command::Company {
            code,
            file: Some(file),
            start,
            length,
        } => print_json(&hq.company_info_content(code, file, *start, *length)?),
        Command::Blocks { file } => print_json(&hq.block_info(file)?),
        Command::Watch { codes, interval } => watch(hq, codes, Duration::from_secs(*interval)),
    }
}

fn watch(hq: &TdxHq, codes: &str, interval: Duration) -> anyhow::Result<()> {
    let codes = parse_codes_csv(codes)?;
    let shutdown = Arc::new(AtomicBool::new(false));

    // Ctrl+C => ставим shutdown=true
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::Relaxed);
            info!("shutting down...");
        })?;
    }

    while !shutdown.load(Ordering::Relaxed) {
        match hq.security_quotes(&codes) {
            Ok(q) => print_json(&q)?,
            Err(SessionError::Closed(id)) => bail!("session {id} is closed"),
            Err(e) => warn!("quotes failed: {e}"),
        }

        // спим мелкими шагами, чтобы быстро реагировать на Ctrl+C
        let until = Instant::now() + interval;
        while !shutdown.load(Ordering::Relaxed) && Instant::now() < until {
            thread::sleep(Duration::from_millis(100));
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(v: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(v)?);
    Ok(())
}
