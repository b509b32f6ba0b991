use std::collections::VecDeque;
use std::fs;
use std::io::BufRead;
use std::path::Path;

use rand::Rng;
use thiserror::Error;

use crate::tables::Segment;
use crate::translation::Access;

/// One translation request, as produced by any of the driving modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessRequest {
    pub segment: i64,
    pub page: i64,
    pub offset: i64,
    pub access: Access,
}

/// Errors raised while reading or decoding a request stream.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("failed to read request file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid integer in request stream: '{0}'")]
    BadToken(String),
    #[error("invalid access flag {0}, expected 0 (read) or 1 (write)")]
    BadAccess(i64),
}

/// A decoded batch: the complete records, plus the field count of any
/// trailing partial record. End of input ends the run, so a fragment is
/// reported for the driver to warn about rather than treated as an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub requests: Vec<AccessRequest>,
    pub trailing_fields: usize,
}

/// Decode whitespace-separated integer quadruples:
/// `segment page offset access(0=read,1=write)`.
pub fn parse_requests(content: &str) -> Result<Batch, RequestError> {
    let mut values = Vec::new();
    for token in content.split_whitespace() {
        values.push(parse_field(token)?);
    }

    let requests = values
        .chunks_exact(4)
        .map(|record| {
            let access = match record[3] {
                0 => Access::Read,
                1 => Access::Write,
                other => return Err(RequestError::BadAccess(other)),
            };
            Ok(AccessRequest {
                segment: record[0],
                page: record[1],
                offset: record[2],
                access,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Batch {
        requests,
        trailing_fields: values.len() % 4,
    })
}

/// Read a batch file of request records; end of file ends the run.
pub fn read_requests<P: AsRef<Path>>(path: P) -> Result<Batch, RequestError> {
    let content = fs::read_to_string(path.as_ref())?;
    parse_requests(&content)
}

/// Incremental request reader for interactive sessions.
///
/// Yields one request at a time from a whitespace token stream, pulling
/// further lines as needed, so a record may continue on the next line. The
/// session ends at end of input or at a segment id of -1, which is consumed
/// before the remaining three fields are read.
pub struct RequestReader<R> {
    input: R,
    tokens: VecDeque<String>,
}

impl<R: BufRead> RequestReader<R> {
    pub fn new(input: R) -> Self {
        RequestReader {
            input,
            tokens: VecDeque::new(),
        }
    }

    /// Next request, or `None` once the session is over. A malformed token
    /// fails only the record it belongs to; the caller may keep reading.
    pub fn next_request(&mut self) -> Result<Option<AccessRequest>, RequestError> {
        let Some(first) = self.next_token()? else {
            return Ok(None);
        };
        let segment = parse_field(&first)?;
        if segment == -1 {
            return Ok(None);
        }

        let mut fields = [0i64; 3];
        for slot in &mut fields {
            let Some(token) = self.next_token()? else {
                return Ok(None);
            };
            *slot = parse_field(&token)?;
        }
        let access = match fields[2] {
            0 => Access::Read,
            1 => Access::Write,
            other => return Err(RequestError::BadAccess(other)),
        };
        Ok(Some(AccessRequest {
            segment,
            page: fields[0],
            offset: fields[1],
            access,
        }))
    }

    fn next_token(&mut self) -> Result<Option<String>, RequestError> {
        while self.tokens.is_empty() {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.tokens.extend(line.split_whitespace().map(str::to_string));
        }
        Ok(self.tokens.pop_front())
    }
}

fn parse_field(token: &str) -> Result<i64, RequestError> {
    token
        .parse::<i64>()
        .map_err(|_| RequestError::BadToken(token.to_string()))
}

/// Generate `n` synthetic requests against the given segment layout.
///
/// Roughly `valid_ratio` of them stay within bounds (page under the target
/// segment's limit, offset under the page size); the rest deliberately
/// overshoot both ranges to exercise the fault paths. Reads and writes are
/// mixed evenly.
pub fn generate_stress<R: Rng>(
    n: usize,
    valid_ratio: f64,
    page_size: u64,
    segments: &[Segment],
    rng: &mut R,
) -> Vec<AccessRequest> {
    let valid_ratio = valid_ratio.clamp(0.0, 1.0);
    (0..n)
        .map(|_| {
            let seg = rng.gen_range(0..segments.len().max(1));
            let valid = rng.gen_bool(valid_ratio);
            let limit = segments.get(seg).map(|s| s.limit_pages).unwrap_or(1).max(1);
            let page = if valid {
                rng.gen_range(0..limit) as i64
            } else {
                rng.gen_range(20..40)
            };
            let offset = if valid {
                rng.gen_range(0..page_size.max(1)) as i64
            } else {
                (page_size + rng.gen_range(0..500)) as i64
            };
            let access = if rng.gen_bool(0.5) {
                Access::Read
            } else {
                Access::Write
            };
            AccessRequest {
                segment: seg as i64,
                page,
                offset,
                access,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::Protection;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::{Cursor, Write as _};

    fn layout() -> Vec<Segment> {
        vec![
            Segment {
                base: 1000,
                limit_pages: 4,
                prot: Protection::ReadWrite,
            },
            Segment {
                base: 6000,
                limit_pages: 7,
                prot: Protection::ReadOnly,
            },
        ]
    }

    #[test]
    fn parses_records_across_lines_and_within_lines() {
        let batch = parse_requests("0 1 500 0\n1 2 10 1 0 0 0 0\n").unwrap();
        assert_eq!(batch.requests.len(), 3);
        assert_eq!(batch.trailing_fields, 0);
        assert_eq!(
            batch.requests[0],
            AccessRequest {
                segment: 0,
                page: 1,
                offset: 500,
                access: Access::Read,
            }
        );
        assert_eq!(batch.requests[1].access, Access::Write);
        assert_eq!(batch.requests[2].segment, 0);
    }

    #[test]
    fn parses_negative_fields() {
        // Out-of-range requests are the engine's problem, not the parser's.
        let batch = parse_requests("-1 0 0 0").unwrap();
        assert_eq!(batch.requests[0].segment, -1);
    }

    #[test]
    fn rejects_non_integer_tokens() {
        assert!(matches!(
            parse_requests("0 one 2 0"),
            Err(RequestError::BadToken(t)) if t == "one"
        ));
    }

    #[test]
    fn keeps_complete_records_and_reports_trailing_fragment() {
        let batch = parse_requests("0 1 500 0 3 2").unwrap();
        assert_eq!(batch.requests.len(), 1);
        assert_eq!(batch.requests[0].offset, 500);
        assert_eq!(batch.trailing_fields, 2);
    }

    #[test]
    fn rejects_unknown_access_flags() {
        assert!(matches!(
            parse_requests("0 1 500 7"),
            Err(RequestError::BadAccess(7))
        ));
    }

    #[test]
    fn empty_input_yields_no_requests() {
        assert!(parse_requests("").unwrap().requests.is_empty());
        assert!(parse_requests("   \n\n").unwrap().requests.is_empty());
        assert_eq!(parse_requests("").unwrap().trailing_fields, 0);
    }

    #[test]
    fn reads_requests_from_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0 0 0 0").unwrap();
        writeln!(file, "1 3 999 1").unwrap();

        let batch = read_requests(file.path()).unwrap();
        assert_eq!(batch.requests.len(), 2);
        assert_eq!(batch.requests[1].offset, 999);
    }

    #[test]
    fn reader_accepts_records_split_across_lines() {
        let mut reader = RequestReader::new(Cursor::new("0 1\n500\n0\n"));
        let request = reader.next_request().unwrap().unwrap();
        assert_eq!(
            request,
            AccessRequest {
                segment: 0,
                page: 1,
                offset: 500,
                access: Access::Read,
            }
        );
        assert_eq!(reader.next_request().unwrap(), None);
    }

    #[test]
    fn reader_stops_at_minus_one_segment() {
        let mut reader = RequestReader::new(Cursor::new("-1 9 9 9\n0 0 0 0\n"));
        assert_eq!(reader.next_request().unwrap(), None);
    }

    #[test]
    fn reader_ends_session_on_eof_mid_record() {
        let mut reader = RequestReader::new(Cursor::new("0 1"));
        assert_eq!(reader.next_request().unwrap(), None);
    }

    #[test]
    fn reader_recovers_after_a_bad_token() {
        let mut reader = RequestReader::new(Cursor::new("x\n1 2 3 1\n-1\n"));
        assert!(matches!(
            reader.next_request(),
            Err(RequestError::BadToken(t)) if t == "x"
        ));

        let request = reader.next_request().unwrap().unwrap();
        assert_eq!(request.segment, 1);
        assert_eq!(request.access, Access::Write);
        assert_eq!(reader.next_request().unwrap(), None);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            read_requests("/nonexistent/addrs.txt"),
            Err(RequestError::Io(_))
        ));
    }

    #[test]
    fn fully_valid_stress_requests_stay_in_bounds() {
        let mut rng = StdRng::seed_from_u64(9);
        let segments = layout();
        for req in generate_stress(200, 1.0, 1000, &segments, &mut rng) {
            let limit = segments[req.segment as usize].limit_pages as i64;
            assert!(req.page < limit);
            assert!((0..1000).contains(&req.offset));
        }
    }

    #[test]
    fn fully_invalid_stress_requests_overshoot_bounds() {
        let mut rng = StdRng::seed_from_u64(9);
        let segments = layout();
        for req in generate_stress(200, 0.0, 1000, &segments, &mut rng) {
            assert!((20..40).contains(&req.page));
            assert!(req.offset >= 1000);
        }
    }

    #[test]
    fn stress_generation_is_deterministic_per_seed() {
        let segments = layout();
        let a = generate_stress(50, 0.7, 1000, &segments, &mut StdRng::seed_from_u64(3));
        let b = generate_stress(50, 0.7, 1000, &segments, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
    }
}
