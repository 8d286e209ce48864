use std::process::ExitCode;

use tree_move::output as out;
use tree_move::{TreeMoveError, cli};

mod app;
mod logging;

fn main() -> ExitCode {
    let args = cli::parse();
    match app::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            out::print_error(&format!("{e:#}"));
            match e.downcast_ref::<TreeMoveError>() {
                Some(TreeMoveError::Interrupted) => ExitCode::from(130),
                _ => ExitCode::FAILURE,
            }
        }
    }
}
