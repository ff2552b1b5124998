//! ganttdeps - precedence constraints for project schedules

use std::process::ExitCode;

use ganttdeps::storage::DependencyError;

fn main() -> ExitCode {
    if let Err(e) = ganttdeps::cli::run() {
        match e.downcast_ref::<DependencyError>() {
            Some(dep_err) => eprintln!("error[{}]: {:#}", dep_err.code(), e),
            None => eprintln!("Error: {:#}", e),
        }
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
