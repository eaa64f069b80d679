use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

/// Fields per generated line; above the 77 the pipeline needs.
const FIELDS: usize = 80;

/// splitmix64; reproducible filler, not statistics-grade noise.
struct TraceRng(u64);

impl TraceRng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform in `[-scale, scale]`.
    fn jitter(&mut self, scale: f64) -> f64 {
        (2.0 * self.unit() - 1.0) * scale
    }
}

/// One 10 ms sample: a slowly oscillating congestion window plus noise in
/// the projected columns, filler elsewhere.
fn trace_line(step: usize, owd: f64, bw: f64, rng: &mut TraceRng) -> String {
    let phase = step as f64 / 50.0;
    let cwnd = (bw / 8.0 * (1.0 + 0.3 * phase.sin()) + rng.jitter(2.0)).max(1.0);
    let rtt = 2.0 * owd + rng.jitter(owd * 0.05).abs();
    let throughput = (bw * (0.8 + 0.1 * phase.cos()) + rng.jitter(1.0)).max(0.0);
    let loss = if rng.unit() < 0.01 { 1.0 } else { 0.0 };
    let inflight = cwnd * (0.9 + 0.1 * rng.unit());

    let mut line = String::new();
    for col in 0..FIELDS {
        let value = match col {
            0 => step as f64 * 10.0,
            2 => cwnd,
            3 => rtt,
            7 => throughput,
            67 => loss,
            76 => inflight,
            _ => rng.unit(),
        };
        if col > 0 {
            line.push(' ');
        }
        let _ = write!(line, "{value:.4}");
    }
    line
}

fn main() -> Result<()> {
    let out_dir = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("sample_traces"));
    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating '{}'", out_dir.display()))?;

    let mut rng = TraceRng(42);

    let algorithms = ["cubic", "bbr", "hybla"];
    // (one-way delay ms, bandwidth Mbit/s)
    let links = [(10.0, 48.0), (40.0, 96.0), (80.0, 640.0)];
    let lines_per_run = 3000;

    let mut written = 0;
    for cc in &algorithms {
        for &(owd, bw) in &links {
            let name = format!("{cc}_wired{bw}_{owd}_{bw}_0_cwnd.txt");
            let mut text = String::new();
            for step in 0..lines_per_run {
                // Occasional truncated records, as left behind by a killed logger.
                if rng.unit() < 0.002 {
                    text.push_str("0.0 0.0 0.0\n");
                    continue;
                }
                text.push_str(&trace_line(step, owd, bw, &mut rng));
                text.push('\n');
            }
            let path = out_dir.join(&name);
            fs::write(&path, text).with_context(|| format!("writing '{}'", path.display()))?;
            written += 1;
        }
    }

    println!(
        "Wrote {written} traces ({lines_per_run} lines each) to {}",
        out_dir.display()
    );
    Ok(())
}
