use std::collections::HashSet;

use crate::error::{SimError, SimResult};
use crate::simulation::{FractionalSimulation, WholeTaskSimulation};

/// A configured simulation ready to launch.
pub enum SimulationJob {
    WholeTask(WholeTaskSimulation),
    Fractional(FractionalSimulation),
}

impl SimulationJob {
    fn get_output_dir(&self) -> Option<String> {
        match self {
            SimulationJob::WholeTask(sim) => sim.get_output_dir(),
            SimulationJob::Fractional(sim) => sim.get_output_dir(),
        }
    }

    fn run(&mut self) -> SimResult<()> {
        match self {
            SimulationJob::WholeTask(sim) => sim.run().map(|_| ()),
            SimulationJob::Fractional(sim) => sim.run().map(|_| ()),
        }
    }
}

impl From<WholeTaskSimulation> for SimulationJob {
    fn from(sim: WholeTaskSimulation) -> Self {
        SimulationJob::WholeTask(sim)
    }
}

impl From<FractionalSimulation> for SimulationJob {
    fn from(sim: FractionalSimulation) -> Self {
        SimulationJob::Fractional(sim)
    }
}

/// Runs several configured simulations on separate threads, one thread per
/// simulation. Simulations that write reports must target distinct output
/// directories.
#[derive(Default)]
pub struct ParallelSimulationsLauncher {
    simulations: Vec<SimulationJob>,
    output_dirs: HashSet<String>,
}

impl ParallelSimulationsLauncher {
    pub fn add_simulation(&mut self, simulation: impl Into<SimulationJob>) -> SimResult<()> {
        let simulation = simulation.into();
        if let Some(output_dir) = simulation.get_output_dir() {
            if !self.output_dirs.insert(output_dir.clone()) {
                return Err(SimError::InvalidConfig(format!(
                    "output dir {} is already in use",
                    output_dir
                )));
            }
        }
        self.simulations.push(simulation);
        Ok(())
    }

    pub fn run_simulations(self) {
        let mut threads = Vec::new();
        for mut simulation in self.simulations.into_iter() {
            threads.push(std::thread::spawn(move || {
                if let Err(e) = simulation.run() {
                    log::error!("simulation failed: {}", e);
                }
            }));
        }

        for thread in threads {
            if thread.join().is_err() {
                log::error!("simulation thread panicked");
            }
        }
    }
}
