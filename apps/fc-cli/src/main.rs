use clap::{Args, Parser, Subcommand};
use fc_app::{
    AppResult, ControlLoop, LoopConfig, ScriptedApi, StepOutcome, TickOutcome, load_config,
    load_scenario,
};
use fc_controls::BoundEstimator;
use fc_core::{Clock, ManualClock, SystemClock};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flowctl")]
#[command(about = "flowctl - Multi-zone boiler flow-temperature controller", long_about = None)]
struct Cli {
    /// Path to the configuration YAML file (defaults apply when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration and print the effective values
    CheckConfig,
    /// Show the flow ceiling for an outdoor temperature
    Ceiling {
        /// Outdoor temperature in degrees Celsius
        #[arg(allow_negative_numbers = true)]
        outside: f64,
    },
    /// Replay a scripted scenario through the control loop
    Replay {
        /// Path to the scenario YAML file
        scenario_path: PathBuf,
        /// Stop after this many steps even if the scenario has more
        #[arg(long)]
        max_steps: Option<usize>,
    },
}

/// Per-value overrides, applied on top of the configuration file.
#[derive(Args, Debug, Default)]
struct Overrides {
    #[arg(long, env = "FLOW_MIN", global = true)]
    flow_min: Option<f64>,
    #[arg(long, env = "FLOW_MAX_MINUS10", global = true)]
    flow_max_at_low_temp: Option<f64>,
    #[arg(long, env = "FLOW_MAX_PLUS20", global = true)]
    flow_max_at_high_temp: Option<f64>,
    #[arg(long, env = "PARAM_KP", global = true)]
    kp: Option<f64>,
    #[arg(long, env = "PARAM_KI", global = true)]
    ki: Option<f64>,
    #[arg(long, env = "PARAM_KD", global = true)]
    kd: Option<f64>,
    #[arg(long, env = "PARAM_KPOM", global = true)]
    kpom: Option<f64>,
    #[arg(long, env = "PARAM_POM_WEIGHT", global = true)]
    weight_pom: Option<f64>,
    #[arg(long, env = "PARAM_POM_FADE", global = true)]
    fade_pom: Option<f64>,
}

impl Overrides {
    fn apply(&self, config: &mut LoopConfig) {
        let targets = [
            (self.flow_min, &mut config.bounds.flow_min),
            (self.flow_max_at_low_temp, &mut config.bounds.flow_max_at_low_temp),
            (self.flow_max_at_high_temp, &mut config.bounds.flow_max_at_high_temp),
            (self.kp, &mut config.gains.kp),
            (self.ki, &mut config.gains.ki),
            (self.kd, &mut config.gains.kd),
            (self.kpom, &mut config.gains.kpom),
            (self.weight_pom, &mut config.gains.weight_pom),
            (self.fade_pom, &mut config.gains.fade_pom),
        ];
        for (value, target) in targets {
            if let Some(value) = value {
                *target = value;
            }
        }
    }
}

fn main() -> AppResult<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = effective_config(cli.config.as_deref(), &cli.overrides)?;

    match cli.command {
        Commands::CheckConfig => cmd_check_config(&config),
        Commands::Ceiling { outside } => cmd_ceiling(&config, outside),
        Commands::Replay {
            scenario_path,
            max_steps,
        } => cmd_replay(&config, &scenario_path, max_steps),
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn effective_config(path: Option<&Path>, overrides: &Overrides) -> AppResult<LoopConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => LoopConfig::default(),
    };
    overrides.apply(&mut config);
    config.validate()?;
    tracing::debug!(?config, "Effective configuration");
    Ok(config)
}

fn cmd_check_config(config: &LoopConfig) -> AppResult<()> {
    println!("✓ Configuration is valid");
    print!("{}", config.to_yaml()?);
    Ok(())
}

fn cmd_ceiling(config: &LoopConfig, outside: f64) -> AppResult<()> {
    let estimator = BoundEstimator::new(config.bounds)?;
    let ceiling = estimator.interpolate(outside);
    println!(
        "Outside {:.1} °C -> flow range [{:.0}, {:.0}]",
        outside, config.bounds.flow_min, ceiling
    );
    Ok(())
}

fn cmd_replay(config: &LoopConfig, scenario_path: &Path, max_steps: Option<usize>) -> AppResult<()> {
    println!("Replaying scenario: {}", scenario_path.display());
    let scenario = load_scenario(scenario_path)?;
    let api = ScriptedApi::new(scenario);
    let clock = ManualClock::new(SystemClock.now());
    let mut control_loop = ControlLoop::new(api, clock, config.clone())?;

    let mut steps = 0usize;
    let mut failures = 0usize;
    control_loop.run_while(|cl, outcome| {
        steps += 1;
        match outcome {
            StepOutcome::Initialized { flow } => println!("  init      flow={flow}"),
            StepOutcome::Ticked(TickOutcome::Applied { flow, previous }) => {
                println!("  tick {:>3}  flow={previous} -> {flow}", cl.ticks())
            }
            StepOutcome::Ticked(TickOutcome::Unchanged { flow }) => {
                println!("  tick {:>3}  flow={flow}", cl.ticks())
            }
            StepOutcome::Ticked(TickOutcome::Idle) => {
                println!("  tick {:>3}  idle", cl.ticks())
            }
            StepOutcome::Failed(err) => {
                failures += 1;
                println!("  failed    {err}");
            }
        }
        !cl.api().is_exhausted() && max_steps.is_none_or(|max| steps < max)
    });

    let api = control_loop.api();
    println!(
        "✓ Replay finished: {} ticks served, {} commands sent, {} failures",
        api.ticks_served(),
        api.commands().len(),
        failures
    );
    if let Some(last) = control_loop.last_sent() {
        println!("  Final flow: {}", last.flow);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn overrides_replace_only_given_values() {
        let mut config = LoopConfig::default();
        let overrides = Overrides {
            flow_min: Some(25.0),
            ki: Some(0.05),
            ..Overrides::default()
        };
        overrides.apply(&mut config);
        assert_eq!(config.bounds.flow_min, 25.0);
        assert_eq!(config.gains.ki, 0.05);
        assert_eq!(config.gains.kpom, 6.0);
        assert_eq!(config.bounds.flow_max_at_low_temp, 70.0);
    }

    #[test]
    fn invalid_override_fails_validation() {
        let overrides = Overrides {
            flow_min: Some(80.0),
            ..Overrides::default()
        };
        assert!(effective_config(None, &overrides).is_err());
    }
}
