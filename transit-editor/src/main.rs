use clap::Parser;
use transit_editor::app::{EditorApp, EditorAppError};

fn main() -> Result<(), EditorAppError> {
    env_logger::init();
    let args = EditorApp::parse();
    args.op.run()
}
