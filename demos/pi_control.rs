use std::path::Path;

use cstr_control::{ControllerType, Cstr, PidGains, ReactionModel, RunSettings, SimulationLoop};

fn main() {
    // A -> B at steady state, then a feed step; PI control of B through the flow
    let reaction = ReactionModel::from_equation("A -> B", 0.5).expect("valid equation");
    let c_a = 1.0 / (1.0 + 0.5 * 2.0 / 0.4);
    let reactor = Cstr::new(2.0, 0.4, reaction, vec![c_a, 1.0 - c_a], vec![1.0, 0.0], 1)
        .expect("valid reactor");

    let mut settings = RunSettings::uncontrolled(0.0, 40.0, 0.5, 1e-6);
    settings.controller_type = ControllerType::PI;
    settings.gains = PidGains::new(-2.0, 4.0, 0.0);
    settings.controller_bias = 0.4;
    settings.setpoint = 1.0 - c_a;
    settings.dead_time = 1.0;
    settings.disturbances = vec![(10.0, 1.2), (25.0, 0.9)];

    let mut simulation = SimulationLoop::new(reactor, settings).expect("valid settings");
    match simulation.run() {
        Ok(record) => {
            println!("{}", record);
            let path = Path::new("./pi_control.csv");
            match record.save_csv(path) {
                Ok(written) => println!("Saved in: '{}'", written.display()),
                Err(e) => println!("Could not write to file. Error: {}", e),
            }
        }
        Err(e) => println!("an error occurred: {}", e),
    }
}
