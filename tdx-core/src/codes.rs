use std::collections::BTreeSet;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use crate::error::CodeError;
use crate::messages::SecurityCode;

/// Чтение списка бумаг: по одной на строку, `#` начинает комментарий
pub fn read_codes<R: io::Read>(reader: R) -> Result<Vec<SecurityCode>, CodeError> {
    let mut set = BTreeSet::new();
    let buf = BufReader::new(reader);

    for line in buf.lines() {
        let line = line?;
        if let Some(s) = strip_comment(&line) {
            set.insert(s.parse()?);
        }
    }

    Ok(set.into_iter().collect())
}

/// Чтение списка бумаг из файла
pub fn read_codes_from_path(path: impl AsRef<Path>) -> Result<Vec<SecurityCode>, CodeError> {
    let f = File::open(path)?;
    read_codes(f)
}

fn strip_comment(line: &str) -> Option<&str> {
    let s = line.split('#').next().unwrap_or("").trim();
    if s.is_empty() { None } else { Some(s) }
}

/// Парсит список бумаг из строки вида "sh:600000, 000001,,sz300750".
/// Пустые элементы пропускаются, результат отсортирован и без повторов.
pub fn parse_codes_csv(raw: &str) -> Result<Vec<SecurityCode>, CodeError> {
    let mut set = BTreeSet::new();

    for part in raw.split(',') {
        let s = part.trim();
        if s.is_empty() {
            continue;
        }
        set.insert(s.parse()?);
    }

    Ok(set.into_iter().collect())
}
