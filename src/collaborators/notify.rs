use anyhow::Result;
use log::info;

use super::Notifier;

/// Prints notifications to stdout and mirrors them to the log. Stands in for a
/// chat transport when none is wired.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, text: &str) -> Result<()> {
        info!("notify: {} chars", text.chars().count());
        println!("{text}");
        Ok(())
    }
}
