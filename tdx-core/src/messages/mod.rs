//! Раскладки конкретных сообщений: построители запросов и декодеры ответов.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::CodeError;

pub mod bars;
pub mod block;
pub mod company;
pub mod finance;
pub mod handshake;
pub mod minute;
pub mod quotes;
pub mod security;
pub mod transaction;
pub mod xdxr;

/// Биржа (рынок) бумаги
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Market {
    /// Шэньчжэнь
    Sz = 0,
    /// Шанхай
    Sh = 1,
}

impl Market {
    /// Код рынка на проводе
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Рынок по первой цифре кода бумаги (6xxxxx, 5xxxxx, 9xxxxx - Шанхай)
    pub fn guess(code: &str) -> Self {
        match code.as_bytes().first() {
            Some(b'5' | b'6' | b'9') => Market::Sh,
            _ => Market::Sz,
        }
    }
}

impl TryFrom<u8> for Market {
    type Error = CodeError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Market::Sz),
            1 => Ok(Market::Sh),
            other => Err(CodeError::UnknownMarket(other.to_string())),
        }
    }
}

impl FromStr for Market {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sz" | "0" => Ok(Market::Sz),
            "sh" | "1" => Ok(Market::Sh),
            other => Err(CodeError::UnknownMarket(other.to_string())),
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Sz => f.write_str("sz"),
            Market::Sh => f.write_str("sh"),
        }
    }
}

/// Бумага: рынок + шестизначный код
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SecurityCode {
    pub market: Market,
    pub code: String,
}

impl SecurityCode {
    /// Проверяет, что код состоит из 6 цифр
    pub fn new(market: Market, code: &str) -> Result<Self, CodeError> {
        let code = code.trim();
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodeError::BadCode(code.to_string()));
        }
        Ok(Self {
            market,
            code: code.to_string(),
        })
    }

    /// Код как поле запроса
    pub fn code_bytes(&self) -> [u8; 6] {
        crate::text::fixed_field(&self.code)
    }
}

/// Форматы: `sh:600000`, `sh600000`, `600000` (рынок угадывается по коду)
impl FromStr for SecurityCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((market, code)) = s.split_once(':') {
            return Self::new(market.parse()?, code);
        }

        let lower = s.to_ascii_lowercase();
        for prefix in ["sh", "sz"] {
            if let Some(code) = lower.strip_prefix(prefix) {
                return Self::new(prefix.parse()?, code);
            }
        }

        Self::new(Market::guess(s), s)
    }
}

impl fmt::Display for SecurityCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.market, self.code)
    }
}

/// Связывает запрос с вариантом [`crate::message::Response`]
macro_rules! reply_variant {
    ($req:ty => $variant:ident($reply:ty)) => {
        impl $crate::message::Request for $req {
            type Reply = $reply;

            fn reply(
                resp: $crate::message::Response,
            ) -> Result<Self::Reply, $crate::message::Response> {
                match resp {
                    $crate::message::Response::$variant(v) => Ok(v),
                    other => Err(other),
                }
            }
        }
    };
}
pub(crate) use reply_variant;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_parse_and_display() {
        assert_eq!("SH".parse::<Market>().unwrap(), Market::Sh);
        assert_eq!("0".parse::<Market>().unwrap(), Market::Sz);
        assert!(matches!(
            "hk".parse::<Market>(),
            Err(CodeError::UnknownMarket(_))
        ));
        assert_eq!(Market::Sh.to_string(), "sh");
        assert_eq!(Market::try_from(1).unwrap(), Market::Sh);
    }

    #[test]
    fn security_code_formats() {
        let want = SecurityCode::new(Market::Sh, "600000").unwrap();
        assert_eq!("sh:600000".parse::<SecurityCode>().unwrap(), want);
        assert_eq!("SH600000".parse::<SecurityCode>().unwrap(), want);
        assert_eq!("600000".parse::<SecurityCode>().unwrap(), want);
        assert_eq!(
            "000001".parse::<SecurityCode>().unwrap(),
            SecurityCode::new(Market::Sz, "000001").unwrap()
        );
        assert_eq!(want.to_string(), "sh:600000");
    }

    #[test]
    fn security_code_rejects_bad_codes() {
        assert!(matches!(
            "sh:60000".parse::<SecurityCode>(),
            Err(CodeError::BadCode(_))
        ));
        assert!(matches!(
            "sz:00000a".parse::<SecurityCode>(),
            Err(CodeError::BadCode(_))
        ));
        assert!(matches!(
            "hk:000001".parse::<SecurityCode>(),
            Err(CodeError::UnknownMarket(_))
        ));
    }
}
