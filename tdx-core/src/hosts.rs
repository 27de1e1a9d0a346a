//! Список серверов из `connect.cfg` штатного терминала.
//!
//! Файл в GBK, INI-подобный: `[SECTION]`, `key=value`, строки на `:`
//! считаются комментариями. Серверы описаны ключами `HostNum`,
//! `HostNameNN`, `IPAddressNN`, `PortNN` (NN с 01).

use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::Path;

use encoding_rs::GBK;
use log::debug;
use serde::Serialize;

use crate::error::HostsError;

/// Секция серверов котировок
pub const HQHOST: &str = "HQHOST";
/// Секция серверов расширенного рынка
pub const DSHOST: &str = "DSHOST";

/// Сервер из списка
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Host {
    pub name: String,
    /// `ip:port`
    pub addr: String,
}

/// Разобранный `connect.cfg`
#[derive(Debug, Clone, Default)]
pub struct HostsConfig {
    sections: HashMap<String, HashMap<String, String>>,
}

impl HostsConfig {
    pub fn load<R: Read>(mut reader: R) -> Result<Self, HostsError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        let (text, _had_errors) = GBK.decode_without_bom_handling(&raw);
        Ok(Self::parse(&text))
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, HostsError> {
        let f = fs::File::open(path)?;
        Self::load(f)
    }

    fn parse(text: &str) -> Self {
        let mut sections: HashMap<String, HashMap<String, String>> = HashMap::new();
        let mut current: Option<String> = None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }

            // пары до первой секции игнорируются
            let (Some(section), Some((k, v))) = (current.as_ref(), line.split_once('=')) else {
                continue;
            };
            sections
                .entry(section.clone())
                .or_default()
                .insert(k.trim().to_string(), v.trim().to_string());
        }

        Self { sections }
    }

    /// Значение ключа в секции
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    /// Серверы секции в порядке нумерации
    pub fn hosts(&self, section: &str) -> Result<Vec<Host>, HostsError> {
        let entries = self
            .sections
            .get(section)
            .ok_or_else(|| HostsError::MissingSection(section.to_string()))?;

        let num = match entries.get("HostNum") {
            Some(v) => v.parse::<usize>().map_err(|_| HostsError::BadValue {
                key: "HostNum".into(),
                value: v.clone(),
            })?,
            None => 0,
        };

        let mut out = Vec::new();
        for i in 1..=num {
            let ip_key = format!("IPAddress{i:02}");
            let port_key = format!("Port{i:02}");
            let name = entries
                .get(&format!("HostName{i:02}"))
                .cloned()
                .unwrap_or_default();

            let Some(ip) = entries.get(&ip_key) else {
                return Err(HostsError::BadValue {
                    key: ip_key,
                    value: String::new(),
                });
            };
            let port = entries.get(&port_key).map(String::as_str).unwrap_or("");
            if port.parse::<u16>().is_err() {
                return Err(HostsError::BadValue {
                    key: port_key,
                    value: port.to_string(),
                });
            }

            out.push(Host {
                name,
                addr: format!("{ip}:{port}"),
            });
        }

        debug!("hosts: section [{section}] has {} entries", out.len());
        Ok(out)
    }
}
