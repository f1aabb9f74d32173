//! Delimited text (CSV) input

use super::Result;

/// Bytes inspected when guessing the delimiter
const SNIFF_PREFIX: usize = 2048;

/// Candidates in order of preference
const CANDIDATES: [u8; 5] = [b',', b'\t', b';', b'|', b':'];

/// Parse delimited text into a grid of cells
pub fn read_delimited(data: &[u8]) -> Result<Vec<Vec<String>>> {
    let data = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
    let delimiter = sniff_delimiter(&data[..data.len().min(SNIFF_PREFIX)]).unwrap_or(b',');
    tracing::debug!(delimiter = %(delimiter as char).escape_default(), "Parsing delimited text");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(data);

    let mut grid = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        grid.push(
            record
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect(),
        );
    }
    Ok(grid)
}

/// Guess the delimiter from a sample.
///
/// A candidate qualifies when it occurs the same, non-zero number of times
/// (outside quotes) on every complete line of the sample. Returns `None`
/// when no candidate qualifies.
pub fn sniff_delimiter(sample: &[u8]) -> Option<u8> {
    let text = String::from_utf8_lossy(sample);
    let mut lines: Vec<&str> = text.split('\n').collect();
    // The last line may be cut off by the prefix limit
    if lines.len() > 1 {
        lines.pop();
    }
    let lines: Vec<&str> = lines
        .into_iter()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .collect();
    if lines.is_empty() {
        return None;
    }

    CANDIDATES.into_iter().find(|&candidate| {
        let first = count_unquoted(lines[0], candidate);
        first > 0 && lines.iter().all(|line| count_unquoted(line, candidate) == first)
    })
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_semicolon() {
        let sample = b"\xd0\xa4\xd0\x98\xd0\x9e;Group;Course\nA;B;3\nC;D;4\n";
        assert_eq!(sniff_delimiter(sample), Some(b';'));
    }

    #[test]
    fn test_sniff_ignores_quoted_delimiters() {
        let sample = b"name\tcity\n\"Smith, John\"\tMoscow\n";
        assert_eq!(sniff_delimiter(sample), Some(b'\t'));
    }

    #[test]
    fn test_sniff_fails_on_inconsistent_lines() {
        assert_eq!(sniff_delimiter(b"title\na,b\n"), None);
        assert_eq!(sniff_delimiter(b""), None);
    }

    #[test]
    fn test_read_delimited_falls_back_to_comma() {
        let grid = read_delimited("only one column\nvalue, with comma\n".as_bytes()).unwrap();
        assert_eq!(grid[0], vec!["only one column"]);
        assert_eq!(grid[1], vec!["value", " with comma"]);
    }

    #[test]
    fn test_read_delimited_strips_bom_and_keeps_quotes() {
        let grid = read_delimited(b"\xef\xbb\xbfa;b\n\"x;y\";z\n").unwrap();
        assert_eq!(grid[0], vec!["a", "b"]);
        assert_eq!(grid[1], vec!["x;y", "z"]);
    }
}
