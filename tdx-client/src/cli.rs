use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};

use tdx_core::codes::parse_codes_csv;
use tdx_core::constants::{BLOCK_INDEX, DEFAULT_PORT};
use tdx_core::hosts::{HQHOST, HostsConfig};
use tdx_core::{KlineCategory, Market, SecurityCode};

/// TDX client - запросы к серверам котировок TDX.
///
/// Сервер задаётся напрямую (--server) или берётся из connect.cfg
/// штатного терминала (--hosts); во втором случае серверы пробуются по
/// порядку до первого ответившего. Ответы печатаются в JSON.
#[derive(Parser, Debug, Clone)]
#[command(name = "tdx-client", version, about)]
#[command(
    group(
        ArgGroup::new("endpoint")
            .required(true)
            .args(["server", "hosts"])
    )
)]
pub(crate) struct Args {
    /// Сервер котировок HOST[:PORT], порт по умолчанию 7709
    #[arg(long)]
    pub(crate) server: Option<String>,

    /// connect.cfg штатного терминала (GBK)
    #[arg(long)]
    pub(crate) hosts: Option<PathBuf>,

    /// Секция connect.cfg со списком серверов
    #[arg(long, default_value = HQHOST)]
    pub(crate) section: String,

    /// Не переподключаться после сбоя соединения
    #[arg(long)]
    pub(crate) no_reconnect: bool,

    /// Таймаут подключения, секунды
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u64).range(1..=60))]
    pub(crate) timeout: u64,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub(crate) enum Command {
    /// Число бумаг рынка (sz|sh)
    Count { market: Market },

    /// Страница списка бумаг рынка
    List {
        market: Market,
        #[arg(long, default_value_t = 0)]
        start: u16,
    },

    /// Котировки: "sh:600000,000001"
    Quotes { codes: String },

    /// Бары (K-линии)
    Bars {
        code: SecurityCode,
        #[arg(long, value_enum, default_value_t = Period::Day)]
        period: Period,
        #[arg(long, default_value_t = 0)]
        start: u16,
        /// не больше 800
        #[arg(long, default_value_t = 100)]
        count: u16,
    },

    /// Минутки за сегодня или за --date YYYYMMDD
    Minutes {
        code: SecurityCode,
        #[arg(long)]
        date: Option<u32>,
    },

    /// Сделки за сегодня или за --date YYYYMMDD
    Ticks {
        code: SecurityCode,
        #[arg(long)]
        date: Option<u32>,
        #[arg(long, default_value_t = 0)]
        start: u16,
        /// не больше 2000
        #[arg(long, default_value_t = 100)]
        count: u16,
    },

    /// Финансовые показатели
    Finance { code: SecurityCode },

    /// Дивиденды и прочие корпоративные события
    Xdxr { code: SecurityCode },

    /// Каталог F10; с --file и --length текст раздела
    Company {
        code: SecurityCode,
        #[arg(long)]
        file: Option<String>,
        #[arg(long, default_value_t = 0)]
        start: u32,
        #[arg(long, default_value_t = 0)]
        length: u32,
    },

    /// Файл секторов
    Blocks {
        #[arg(long, default_value = BLOCK_INDEX)]
        file: String,
    },

    /// Котировки раз в --interval секунд до Ctrl+C
    Watch {
        codes: String,
        #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u64).range(1..))]
        interval: u64,
    },
}

/// Период баров в CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Period {
    Min1,
    Min5,
    Min15,
    Min30,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl From<Period> for KlineCategory {
    fn from(p: Period) -> Self {
        match p {
            Period::Min1 => KlineCategory::Min1,
            Period::Min5 => KlineCategory::Min5,
            Period::Min15 => KlineCategory::Min15,
            Period::Min30 => KlineCategory::Min30,
            Period::Hour => KlineCategory::Hour1,
            Period::Day => KlineCategory::Daily,
            Period::Week => KlineCategory::Weekly,
            Period::Month => KlineCategory::Monthly,
            Period::Quarter => KlineCategory::Quarterly,
            Period::Year => KlineCategory::Yearly,
        }
    }
}

impl Args {
    /// Валидация аргументов (файл существует, списки бумаг разбираются, даты похожи на даты)
    pub(crate) fn validate(&self) -> Result<()> {
        if let Some(server) = &self.server {
            if server.trim().is_empty() {
                bail!("--server is empty");
            }
        }

        if let Some(path) = &self.hosts {
            let md = std::fs::metadata(path)
                .with_context(|| format!("hosts file not found: {:?}", path))?;
            if !md.is_file() {
                bail!("--hosts must point to a file: {:?}", path);
            }
        }

        match &self.command {
            Command::Quotes { codes } | Command::Watch { codes, .. } => {
                let parsed = parse_codes_csv(codes).context("bad security list")?;
                if parsed.is_empty() {
                    bail!("security list is empty");
                }
            }
            Command::Minutes { date: Some(d), .. } | Command::Ticks { date: Some(d), .. } => {
                check_date(*d)?;
            }
            Command::Company {
                file: Some(_),
                length: 0,
                ..
            } => bail!("--length is required with --file"),
            _ => {}
        }

        Ok(())
    }

    /// Адреса серверов в порядке перебора
    pub(crate) fn endpoints(&self) -> Result<Vec<String>> {
        if let Some(server) = &self.server {
            return Ok(vec![with_default_port(server.trim())]);
        }

        let Some(path) = &self.hosts else {
            bail!("either --server or --hosts must be provided");
        };
        let cfg = HostsConfig::load_from_path(path)
            .with_context(|| format!("read hosts file {:?}", path))?;
        let hosts = cfg
            .hosts(&self.section)
            .with_context(|| format!("section [{}] in {:?}", self.section, path))?;
        if hosts.is_empty() {
            bail!("no servers in section [{}]", self.section);
        }

        Ok(hosts.into_iter().map(|h| h.addr).collect())
    }
}

fn with_default_port(server: &str) -> String {
    match server.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => server.to_string(),
        _ => format!("{server}:{DEFAULT_PORT}"),
    }
}

fn check_date(d: u32) -> Result<()> {
    let (month, day) = (d / 100 % 100, d % 100);
    let plausible = (19_900_101..=99_991_231).contains(&d)
        && (1..=12).contains(&month)
        && (1..=31).contains(&day);
    if !plausible {
        bail!("date must look like YYYYMMDD (got: {d})");
    }
    Ok(())
}
