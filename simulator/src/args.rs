use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Randomized prov-cpl backend simulator")]
pub(crate) struct Args {
    #[arg(long, value_parser = humantime::parse_duration)]
    pub(crate) duration: Option<Duration>,
    /// Operations per worker.
    #[arg(long)]
    pub(crate) iterations: Option<u64>,
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    #[arg(long, default_value_t = 4)]
    pub(crate) pool_size: usize,
    #[arg(long, default_value_t = 8)]
    pub(crate) workers: usize,
    /// Chance per operation of queueing a dropped link before it runs.
    #[arg(long, default_value_t = 0.02)]
    pub(crate) link_failure_rate: f64,
    #[arg(long, default_value_t = 0.01)]
    pub(crate) fetch_failure_rate: f64,
    #[arg(long, default_value_t = 0.002)]
    pub(crate) reconnect_rate: f64,
    #[arg(long, default_value_t = 0.02)]
    pub(crate) delete_rate: f64,
    /// Database file; a temporary one is used when absent.
    #[arg(long)]
    pub(crate) db: Option<PathBuf>,
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(long)]
    pub(crate) quick: bool,
    #[arg(long)]
    pub(crate) stress: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimConfig {
    pub(crate) duration_ms: Option<u64>,
    pub(crate) iterations: Option<u64>,
    pub(crate) seed: u64,
    pub(crate) pool_size: usize,
    pub(crate) workers: usize,
    pub(crate) link_failure_rate: f64,
    pub(crate) fetch_failure_rate: f64,
    pub(crate) reconnect_rate: f64,
    pub(crate) delete_rate: f64,
    pub(crate) db: Option<PathBuf>,
    pub(crate) log: Option<PathBuf>,
    pub(crate) preset: Option<String>,
    pub(crate) first_steps: usize,
    pub(crate) tail_steps: usize,
}

impl SimConfig {
    pub(crate) fn from_args(args: Args) -> Self {
        let mut config = SimConfig {
            duration_ms: args
                .duration
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            iterations: args.iterations,
            seed: args.seed.unwrap_or_else(random_seed),
            pool_size: args.pool_size.max(1),
            workers: args.workers.max(1),
            link_failure_rate: clamp_rate(args.link_failure_rate),
            fetch_failure_rate: clamp_rate(args.fetch_failure_rate),
            reconnect_rate: clamp_rate(args.reconnect_rate),
            delete_rate: clamp_rate(args.delete_rate),
            db: args.db,
            log: args.log,
            preset: None,
            first_steps: 30,
            tail_steps: 80,
        };

        if args.quick {
            config.apply_quick();
        }
        if args.stress {
            config.apply_stress();
        }

        config
    }

    fn apply_quick(&mut self) {
        self.preset = Some("quick".to_string());
        self.iterations = Some(500);
        self.duration_ms = None;
        self.pool_size = 2;
        self.workers = 4;
        self.link_failure_rate = 0.02;
        self.fetch_failure_rate = 0.01;
        self.reconnect_rate = 0.002;
        self.delete_rate = 0.02;
    }

    fn apply_stress(&mut self) {
        self.preset = Some("stress".to_string());
        self.iterations = Some(20_000);
        self.duration_ms = None;
        self.pool_size = 4;
        self.workers = 32;
        self.link_failure_rate = 0.05;
        self.fetch_failure_rate = 0.02;
        self.reconnect_rate = 0.005;
        self.delete_rate = 0.03;
    }

    /// Seed for one worker's generator, derived from the run seed.
    pub(crate) fn worker_seed(&self, worker: usize) -> u64 {
        self.seed ^ (worker as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    }
}

fn clamp_rate(value: f64) -> f64 {
    if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) }
}

fn random_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    now.as_secs() ^ u64::from(now.subsec_nanos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_rate_limits_bounds() {
        assert_eq!(clamp_rate(-1.0), 0.0);
        assert_eq!(clamp_rate(2.0), 1.0);
        assert_eq!(clamp_rate(0.5), 0.5);
        assert_eq!(clamp_rate(f64::NAN), 0.0);
    }

    #[test]
    fn presets_override_flags() {
        let args = Args::parse_from(["simulator", "--workers", "3", "--quick", "--seed", "9"]);
        let config = SimConfig::from_args(args);
        assert_eq!(config.preset.as_deref(), Some("quick"));
        assert_eq!(config.workers, 4);
        assert_eq!(config.seed, 9);
        assert_ne!(config.worker_seed(0), config.worker_seed(1));
    }
}
