use encoding_rs::GBK;

/// Текстовое поле фиксированной ширины: обрезка по первому NUL + GBK -> UTF-8.
///
/// Некорректные последовательности заменяются на U+FFFD.
pub fn gbk_field(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let (text, _had_errors) = GBK.decode_without_bom_handling(&raw[..end]);
    text.trim_end().to_string()
}

/// ASCII-поле (коды бумаг, имена файлов): обрезка по NUL
pub fn ascii_field(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

/// Копирует строку в поле фиксированной ширины, остаток заполняется нулями
pub fn fixed_field<const N: usize>(s: &str) -> [u8; N] {
    let mut out = [0u8; N];
    let bytes = s.as_bytes();
    let n = bytes.len().min(N);
    out[..n].copy_from_slice(&bytes[..n]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gbk_field_decodes_and_stops_at_nul() {
        // "浦发银行" в GBK
        let raw = [0xc6, 0xd6, 0xb7, 0xa2, 0xd2, 0xf8, 0xd0, 0xd0, 0x00, 0x41];
        assert_eq!(gbk_field(&raw), "浦发银行");
    }

    #[test]
    fn gbk_field_plain_ascii_and_padding() {
        assert_eq!(gbk_field(b"ST ABC  "), "ST ABC");
        assert_eq!(gbk_field(&[0u8; 8]), "");
    }

    #[test]
    fn ascii_and_fixed_fields() {
        let f: [u8; 8] = fixed_field("600000");
        assert_eq!(&f, b"600000\0\0");
        assert_eq!(ascii_field(&f), "600000");

        let short: [u8; 3] = fixed_field("600000");
        assert_eq!(&short, b"600");
    }
}
