use std::io::Write;

use env_logger::Builder;

use harvest_sim::config::sim_config::SimulationConfig;
use harvest_sim::{
    FractionalSimulation, ParallelSimulationsLauncher, SimResult, WholeTaskSimulation,
};

fn main() -> SimResult<()> {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let mut launcher = ParallelSimulationsLauncher::default();

    let whole_task = SimulationConfig::from_file("configs/whole_task.yaml")?;
    launcher.add_simulation(WholeTaskSimulation::new(whole_task)?)?;

    let fractional = SimulationConfig::from_file("configs/fractional.yaml")?;
    launcher.add_simulation(FractionalSimulation::new(fractional)?)?;

    launcher.run_simulations();
    Ok(())
}
