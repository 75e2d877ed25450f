// Longitudinal trajectory optimization around a slower vehicle
//
// Plans from rest toward 20 m/s over a 10 s horizon, first on a free road
// and then with a vehicle occupying 90..110 m between samples 10 and 15.
// Set RUST_LOG=debug to trace every evaluated mode.

use tracing_subscriber::EnvFilter;

use longitudinal_planner::common::{Obstacle, TimeGrid, VehicleInitialState};
use longitudinal_planner::path_planning::longitudinal::{
    KinematicModel, LongitudinalPlanner, PlanningRequest, PlanningResult,
};

fn print_result(title: &str, grid: &TimeGrid, result: &PlanningResult) {
    println!("== {} ==", title);
    println!(
        "status: {}, cost: {:.4}, mode: {:?}",
        result.status,
        result.cost,
        result.mode.sides()
    );

    let sample = KinematicModel::new(grid).derive(&result.trajectory.positions);
    println!("{:>4} {:>8} {:>10} {:>10} {:>10}", "i", "t[s]", "s[m]", "v[m/s]", "a[m/ss]");
    for (i, s) in result.trajectory.positions.iter().enumerate() {
        let v = sample.velocity.get(i).copied().unwrap_or(f64::NAN);
        let a = sample.acceleration.get(i).copied().unwrap_or(f64::NAN);
        println!(
            "{:>4} {:>8.3} {:>10.3} {:>10.3} {:>10.3}",
            i,
            grid.time_at(i),
            s,
            v,
            a
        );
    }
    println!();
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let planner = LongitudinalPlanner::with_defaults();
    let config = planner.config();
    let grid = match TimeGrid::new(config.horizon, config.num_samples) {
        Ok(grid) => grid,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };

    let scenarios = [
        ("free road", PlanningRequest::new(VehicleInitialState::at_rest())),
        (
            "vehicle at 90..110 m",
            PlanningRequest::new(VehicleInitialState::at_rest())
                .with_obstacle(Obstacle::new(10, 15, 90.0, 110.0)),
        ),
    ];

    for (title, request) in &scenarios {
        match planner.plan(request) {
            Ok(result) => print_result(title, &grid, &result),
            Err(e) => println!("== {} ==\nplanning failed: {}\n", title, e),
        }
    }
}
