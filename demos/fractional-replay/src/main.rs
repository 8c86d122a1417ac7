use std::io::Write;

use env_logger::Builder;

use harvest_sim::config::sim_config::SimulationConfig;
use harvest_sim::{FractionalSimulation, SimResult};

fn main() -> SimResult<()> {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "configs/config.yaml".to_string());
    let config = SimulationConfig::from_file(&config_path)?;

    let mut simulation = FractionalSimulation::new(config)?;
    simulation.run()?;
    Ok(())
}
