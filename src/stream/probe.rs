//! Bitrate probe
//!
//! Asks an external analysis tool (`sox --i -B <file>` by default) for the
//! nominal bitrate of the source. The tool is treated as untrusted: any
//! failure degrades to the configured fallback bitrate instead of stopping
//! the stream from starting.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::config::ProbeConfig;
use crate::error::ProbeError;

/// Max bytes read from either output channel
const OUTPUT_LIMIT: usize = 4096;

/// Subprocess-backed bitrate detector
#[derive(Debug, Clone)]
pub struct BitrateProbe {
    program: String,
    args: Vec<String>,
    fallback_bitrate: u64,
    timeout: Duration,
}

impl BitrateProbe {
    pub fn new(config: &ProbeConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            fallback_bitrate: config.fallback_bitrate,
            timeout: config.timeout(),
        }
    }

    /// Bitrate of `source` in bits/sec, or the fallback if probing fails
    pub async fn probe(&self, source: &Path) -> u64 {
        match self.try_probe(source).await {
            Ok(bitrate) => {
                tracing::debug!(source = %source.display(), bitrate, "Probed bitrate");
                bitrate
            }
            Err(e) => {
                tracing::warn!(
                    source = %source.display(),
                    error = %e,
                    fallback = self.fallback_bitrate,
                    "Bitrate probe failed, using fallback"
                );
                self.fallback_bitrate
            }
        }
    }

    /// Run the tool once and report exactly why it failed, if it did
    pub async fn try_probe(&self, source: &Path) -> Result<u64, ProbeError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| ProbeError::Spawn {
                program: self.program.clone(),
                source: err,
            })?;

        let mut stdout = child.stdout.take().ok_or(ProbeError::MissingPipe("stdout"))?;
        let mut stderr = child.stderr.take().ok_or(ProbeError::MissingPipe("stderr"))?;

        let mut result = vec![0u8; OUTPUT_LIMIT];
        let mut diagnostic = vec![0u8; OUTPUT_LIMIT];

        // Each read returns as soon as its channel has data or hits EOF, so a
        // tool that lingers after answering does not hold us until it exits.
        let (result_len, diagnostic_len) = tokio::time::timeout(self.timeout, async {
            tokio::try_join!(stdout.read(&mut result), stderr.read(&mut diagnostic))
        })
        .await
        .map_err(|_| ProbeError::Timeout(self.timeout))??;

        let diagnostic = String::from_utf8_lossy(&diagnostic[..diagnostic_len]);
        let diagnostic = diagnostic.trim();
        if !diagnostic.is_empty() {
            return Err(ProbeError::Diagnostic(diagnostic.to_string()));
        }

        parse_bitrate(&String::from_utf8_lossy(&result[..result_len]))
    }
}

/// Parse tool output such as `"128k"`, `"320000"` or `"1.41M"` into bits/sec
pub fn parse_bitrate(output: &str) -> Result<u64, ProbeError> {
    let trimmed = output.trim();
    let (number, multiplier) = match trimmed.char_indices().last() {
        Some((idx, 'k' | 'K')) => (&trimmed[..idx], 1_000.0),
        Some((idx, 'M')) => (&trimmed[..idx], 1_000_000.0),
        _ => (trimmed, 1.0),
    };

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| ProbeError::Parse(trimmed.to_string()))?;
    let bitrate = (value * multiplier).round();

    if !bitrate.is_finite() || bitrate < 1.0 {
        return Err(ProbeError::Parse(trimmed.to_string()));
    }

    Ok(bitrate as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe_with(program: &str, args: &[&str], timeout_ms: u64) -> BitrateProbe {
        BitrateProbe::new(&ProbeConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            fallback_bitrate: 96_000,
            timeout_ms,
        })
    }

    #[test]
    fn test_parse_bitrate() {
        assert_eq!(parse_bitrate("128k").unwrap(), 128_000);
        assert_eq!(parse_bitrate("320000").unwrap(), 320_000);
        assert_eq!(parse_bitrate("  192k\n").unwrap(), 192_000);
        assert_eq!(parse_bitrate("1.41M").unwrap(), 1_410_000);
        assert_eq!(parse_bitrate("64.5K").unwrap(), 64_500);
    }

    #[test]
    fn test_parse_bitrate_rejects_garbage() {
        assert!(matches!(parse_bitrate(""), Err(ProbeError::Parse(_))));
        assert!(matches!(parse_bitrate("k"), Err(ProbeError::Parse(_))));
        assert!(matches!(parse_bitrate("fast"), Err(ProbeError::Parse(_))));
        assert!(matches!(parse_bitrate("0"), Err(ProbeError::Parse(_))));
        assert!(matches!(parse_bitrate("-128k"), Err(ProbeError::Parse(_))));
        assert!(matches!(parse_bitrate("inf"), Err(ProbeError::Parse(_))));
    }

    #[tokio::test]
    async fn test_missing_executable_falls_back() {
        let probe = probe_with("radio-relay-no-such-probe", &[], 1000);

        let err = probe.try_probe(Path::new("song.mp3")).await.unwrap_err();
        assert!(matches!(err, ProbeError::Spawn { .. }));
        assert_eq!(probe.probe(Path::new("song.mp3")).await, 96_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_reads_tool_output() {
        // The source path arrives as $1 and is ignored
        let probe = probe_with("sh", &["-c", "echo 192k", "probe"], 5000);
        assert_eq!(probe.try_probe(Path::new("song.mp3")).await.unwrap(), 192_000);
        assert_eq!(probe.probe(Path::new("song.mp3")).await, 192_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_diagnostic_output_fails() {
        let probe = probe_with("sh", &["-c", "echo 'sox FAIL formats' >&2", "probe"], 5000);

        let err = probe.try_probe(Path::new("song.mp3")).await.unwrap_err();
        assert!(matches!(err, ProbeError::Diagnostic(ref msg) if msg.contains("FAIL")));
        assert_eq!(probe.probe(Path::new("song.mp3")).await, 96_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unparseable_output_falls_back() {
        let probe = probe_with("sh", &["-c", "echo unknown", "probe"], 5000);

        let err = probe.try_probe(Path::new("song.mp3")).await.unwrap_err();
        assert!(matches!(err, ProbeError::Parse(_)));
        assert_eq!(probe.probe(Path::new("song.mp3")).await, 96_000);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_tool_times_out() {
        let probe = probe_with("sh", &["-c", "sleep 5", "probe"], 100);

        let err = probe.try_probe(Path::new("song.mp3")).await.unwrap_err();
        assert!(matches!(err, ProbeError::Timeout(_)));
    }
}
