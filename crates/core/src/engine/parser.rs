//! Metric extraction from engine output.
//!
//! Two strategies run in order:
//!
//! 1. **Header**: the leading `;` comment block of the produced G-code is
//!    searched for mass, filament length, estimated print time, and layer
//!    count.
//! 2. **Fallback**: when the header yielded no mass, the engine's console
//!    output is scanned for the first `<number> g`.
//!
//! Extraction never fails. Each field is extracted independently; a miss
//! leaves the field at its "unknown" sentinel and records a diagnostic.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::types::SliceMetrics;

/// Marker that starts a G-code comment line.
pub const COMMENT_MARKER: u8 = b';';

static MASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"filament used \[g\]\s*=\s*([\d.]+)").expect("valid regex"));

static LENGTH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"filament used \[mm\]\s*=\s*([\d.]+)").expect("valid regex"));

static PRINT_TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"estimated printing time[^=\n]*=\s*([^\n]*)").expect("valid regex"));

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:(\d+)d\s*)?(?:(\d+)h\s*)?(?:(\d+)m\s*)?(?:(\d+)s)?").expect("valid regex")
});

static LAYERS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"total layers count\s*=\s*(\d+)").expect("valid regex"));

static CONSOLE_MASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)?)\s*g\b").expect("valid regex"));

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

/// Why a field could not be extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMiss {
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for FieldMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Extracted metrics plus a diagnostic for every field left unknown.
#[derive(Debug, Clone, Default)]
pub struct ParsedMetrics {
    pub metrics: SliceMetrics,
    pub misses: Vec<FieldMiss>,
}

type Extraction<T> = Result<T, FieldMiss>;

fn miss(field: &'static str, reason: impl Into<String>) -> FieldMiss {
    FieldMiss {
        field,
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Extract metrics from the artifact at `artifact` (if readable) and the
/// engine's combined console `output`.
pub async fn parse(output: &str, artifact: &Path) -> ParsedMetrics {
    let header = match read_header(artifact).await {
        Ok(header) => header,
        Err(e) => {
            tracing::warn!(path = %artifact.display(), error = %e, "Failed to read G-code header");
            None
        }
    };
    parse_from(header.as_deref(), output)
}

/// Strategy application over already-loaded text.
pub fn parse_from(header: Option<&str>, output: &str) -> ParsedMetrics {
    let mut misses = Vec::new();
    let mut metrics = SliceMetrics::default();
    let mut header_mass = None;

    match header {
        Some(header) => {
            match extract_mass(header) {
                Ok(g) => header_mass = Some(g),
                Err(m) => misses.push(m),
            }
            match extract_filament_length(header) {
                Ok(mm) => metrics.filament_length_mm = Some(round2(mm)),
                Err(m) => misses.push(m),
            }
            match extract_print_time(header) {
                Ok(secs) => metrics.print_duration_seconds = secs,
                Err(m) => misses.push(m),
            }
            match extract_layer_count(header) {
                Ok(n) => metrics.layer_count = Some(n),
                Err(m) => misses.push(m),
            }
        }
        None => misses.push(miss("header", "artifact header unavailable")),
    }

    // The fallback only fills a mass the header did not provide; a small
    // but non-zero header value is kept as is.
    let mass = match header_mass {
        Some(g) if g != 0.0 => Some(g),
        _ => match extract_console_mass(output) {
            Ok(g) => Some(g),
            Err(m) => {
                misses.push(m);
                header_mass
            }
        },
    };
    metrics.mass_grams = mass.map(round2).unwrap_or(0.0);

    ParsedMetrics { metrics, misses }
}

/// Read the leading comment block of `path`.
///
/// Lines before the first comment line are skipped; the block ends at the
/// first non-comment line after it. Returns `Ok(None)` when the file does
/// not exist or contains no comment lines.
pub async fn read_header(path: &Path) -> std::io::Result<Option<String>> {
    let file = match tokio::fs::File::open(path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut reader = BufReader::new(file);
    let mut header = String::new();
    let mut in_block = false;
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).await? == 0 {
            break;
        }
        if line.first() == Some(&COMMENT_MARKER) {
            in_block = true;
            header.push_str(&String::from_utf8_lossy(&line));
            if !header.ends_with('\n') {
                header.push('\n');
            }
        } else if in_block {
            break;
        }
    }

    Ok(in_block.then_some(header))
}

// ---------------------------------------------------------------------------
// Field extractors
// ---------------------------------------------------------------------------

fn capture<'h>(re: &Regex, text: &'h str, field: &'static str) -> Extraction<&'h str> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| miss(field, "pattern not found"))
}

fn parse_number<T: std::str::FromStr>(raw: &str, field: &'static str) -> Extraction<T> {
    raw.parse::<T>()
        .map_err(|_| miss(field, format!("unparseable value '{raw}'")))
}

fn extract_mass(header: &str) -> Extraction<f64> {
    parse_number(capture(&MASS_RE, header, "mass")?, "mass")
}

fn extract_filament_length(header: &str) -> Extraction<f64> {
    parse_number(capture(&LENGTH_RE, header, "filament_length")?, "filament_length")
}

fn extract_print_time(header: &str) -> Extraction<u64> {
    Ok(parse_duration(capture(&PRINT_TIME_RE, header, "print_time")?))
}

fn extract_layer_count(header: &str) -> Extraction<u32> {
    parse_number(capture(&LAYERS_RE, header, "layer_count")?, "layer_count")
}

fn extract_console_mass(output: &str) -> Extraction<f64> {
    parse_number(capture(&CONSOLE_MASS_RE, output, "console_mass")?, "console_mass")
}

/// Sum a duration of the form `[Nd] [Nh] [Nm] [Ns]` into seconds.
///
/// Any component may be absent and counts as zero; text with no
/// recognisable component yields `0`.
pub fn parse_duration(text: &str) -> u64 {
    let Some(caps) = DURATION_RE.captures(text) else {
        return 0;
    };
    let component = |idx: usize| -> u64 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };
    component(1)
        .saturating_mul(86_400)
        .saturating_add(component(2).saturating_mul(3_600))
        .saturating_add(component(3).saturating_mul(60))
        .saturating_add(component(4))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
