//! Read single spectrum `<m/z> <intensity>` text files.
mod reader;

pub use reader::{read_points, XyParserError, XyReader, XyReaderType, XY_SCAN_NUMBER};

/// Whether a buffer starts with what looks like an XY data line
pub fn is_xy(buf: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(buf) else {
        return false;
    };
    text.lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("m/z"))
        .and_then(|line| {
            let mut columns = line.split(|c: char| c.is_whitespace() || c == ',' || c == ';');
            columns.next().map(|mz| mz.parse::<f64>().is_ok())
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_is_xy() {
        assert!(is_xy(b"# header\n100.0\t20\n"));
        assert!(is_xy(b"100.0,20\n"));
        assert!(!is_xy(b"BEGIN IONS\n"));
        assert!(!is_xy(b"<?xml version=\"1.0\"?>"));
    }
}
