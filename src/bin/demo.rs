//! Infers the scale of a Rayleigh distribution from simulated data with adaptive static HMC.

use mini_hmc::config::{HmcConfig, MetricKind, SampleConfig};
use mini_hmc::distributions::{rayleigh, Arg, Mode};
use mini_hmc::hmc::StaticHmc;
use mini_hmc::model::Model;
use mini_hmc::services::run_adaptive_sampler;
use mini_hmc::transitions::BarProgress;
use mini_hmc::writer::{McmcWriter, MemoryWriter, NoopWriter, StreamWriter};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::error::Error;
use std::io::Write;
use std::ops::ControlFlow;

/// Rayleigh observations with unknown scale, parameterized by `u = ln σ`.
struct RayleighScale {
    data: Vec<f64>,
}

impl Model for RayleighScale {
    fn num_params(&self) -> usize {
        1
    }

    fn param_names(&self) -> Vec<String> {
        vec!["sigma".to_string()]
    }

    fn log_prob_grad(&self, q: &[f64], grad: &mut [f64], _msgs: &mut dyn Write) -> mini_hmc::Result<f64> {
        let sigma = q[0].exp();
        let lp = rayleigh::log_density(Arg::constant(&self.data), Arg::variable(sigma), Mode::UpToConstant)?;
        let d_sigma = lp.partial(1).map_or(0.0, |d| d[0]);
        // Change of variables adds ln|dσ/du| = u.
        grad[0] = d_sigma * sigma + 1.0;
        Ok(lp.value + q[0])
    }

    fn constrained_params(&self, q: &[f64]) -> mini_hmc::Result<Vec<f64>> {
        Ok(vec![q[0].exp()])
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    const TRUE_SCALE: f64 = 2.0;
    const N_OBS: usize = 500;
    const SEED: u64 = 42;

    let mut rng = SmallRng::seed_from_u64(SEED);
    let data = (0..N_OBS)
        .map(|_| rayleigh::sample(TRUE_SCALE, &mut rng))
        .collect::<Result<Vec<f64>, _>>()?;
    let model = RayleighScale { data };

    let sample_config = SampleConfig {
        num_warmup: 500,
        num_samples: 2000,
        ..Default::default()
    };
    let hmc_config = HmcConfig {
        metric: MetricKind::Diag,
        seed: Some(SEED),
        ..Default::default()
    };
    let mut sampler = StaticHmc::from_config(&model, &hmc_config, sample_config.num_warmup)?;

    let mut samples = MemoryWriter::default();
    let mut diagnostics = NoopWriter;
    let mut messages = StreamWriter::with_prefix(std::io::stdout(), "# ");
    let mut errors = StreamWriter::with_prefix(std::io::stderr(), "# ");
    let mut progress = BarProgress::new("Chain 0");
    let mut writer = McmcWriter::new(&mut samples, &mut diagnostics, &mut messages, &mut errors);

    let outcome = run_adaptive_sampler(
        &mut sampler,
        &model,
        &[0.0],
        &sample_config,
        &mut writer,
        &mut progress,
        &mut || ControlFlow::Continue(()),
    )?;
    println!("Run finished: {outcome:?}");

    let draws: Vec<f64> = samples.values().map(|row| row[row.len() - 1]).collect();
    let mean = draws.iter().sum::<f64>() / draws.len() as f64;
    let accept = samples.values().map(|row| row[1]).sum::<f64>() / draws.len() as f64;
    println!("Kept {} draws", draws.len());
    println!("Posterior mean of sigma: {mean:.3} (true value {TRUE_SCALE})");
    println!("Mean acceptance statistic: {accept:.3}");
    println!("Final step size: {:.4}", sampler.nominal_stepsize());

    Ok(())
}
