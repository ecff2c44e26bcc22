//! Play Publisher - upload an Android App Bundle to a Google Play track.

use play_publisher::cli;
use play_publisher::cli::OutputManager;
use std::process;

#[tokio::main]
async fn main() {
    env_logger::init();

    match cli::run().await {
        Ok(exit_code) => {
            process::exit(exit_code);
        }
        Err(e) => {
            // Never quiet for fatal errors
            let output = OutputManager::new(false, false);
            let suggestions = e.recovery_suggestions();
            if !suggestions.is_empty() {
                output.error_detail("💡 Recovery suggestions:");
                for suggestion in suggestions {
                    output.error_detail(&format!("  • {}", suggestion));
                }
            }
            output.error(&format!("Fatal error: {e}"));

            process::exit(1);
        }
    }
}
